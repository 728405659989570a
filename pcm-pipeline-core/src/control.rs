//! Boolean control surface over the capture and playback engines.
//!
//! Each handle owns exactly one engine. Failures are reported as `false` and
//! the detail goes to the log.

use std::path::Path;

use crate::engine::capture::CaptureEngine;
use crate::engine::playback::PlaybackEngine;
use crate::models::config::EngineConfig;
use crate::models::error::PipelineError;
use crate::traits::audio_backend::AudioBackend;

fn report(operation: &str, result: Result<(), PipelineError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            log::error!("{} failed: {}", operation, e);
            false
        }
    }
}

pub struct CaptureHandle<B: AudioBackend> {
    engine: CaptureEngine<B>,
}

impl<B: AudioBackend> CaptureHandle<B> {
    pub fn new(backend: B, config: EngineConfig) -> Self {
        Self {
            engine: CaptureEngine::new(backend, config),
        }
    }

    pub fn initialize(&mut self) -> bool {
        report("capture initialize", self.engine.initialize())
    }

    pub fn start(&mut self, path: impl AsRef<Path>) -> bool {
        report("capture start", self.engine.start(path))
    }

    pub fn stop(&mut self) -> bool {
        report("capture stop", self.engine.stop())
    }

    pub fn is_active(&self) -> bool {
        self.engine.is_active()
    }

    pub fn teardown(&mut self) {
        self.engine.teardown();
    }

    pub fn engine(&self) -> &CaptureEngine<B> {
        &self.engine
    }
}

pub struct PlaybackHandle<B: AudioBackend> {
    engine: PlaybackEngine<B>,
}

impl<B: AudioBackend> PlaybackHandle<B> {
    pub fn new(backend: B, config: EngineConfig) -> Self {
        Self {
            engine: PlaybackEngine::new(backend, config),
        }
    }

    pub fn initialize(&mut self) -> bool {
        report("playback initialize", self.engine.initialize())
    }

    pub fn load(&mut self, path: impl AsRef<Path>) -> bool {
        report("playback load", self.engine.load(path))
    }

    pub fn start(&mut self) -> bool {
        report("playback start", self.engine.start())
    }

    pub fn stop(&mut self) -> bool {
        report("playback stop", self.engine.stop())
    }

    pub fn is_active(&self) -> bool {
        self.engine.is_active()
    }

    pub fn teardown(&mut self) {
        self.engine.teardown();
    }

    pub fn engine(&self) -> &PlaybackEngine<B> {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::virtual_device::{Fault, SignalSource, VirtualBackend};
    use std::fs;
    use std::path::PathBuf;

    fn temp_file_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("pcm_pipeline_control_{}", name))
    }

    fn small_config() -> EngineConfig {
        EngineConfig::default().with_buffer_size(64)
    }

    #[test]
    fn capture_handle_reports_failures_as_false() {
        let backend = VirtualBackend::new();
        let mut handle = CaptureHandle::new(backend, small_config());

        assert!(!handle.start(temp_file_path("never.wav")));
        assert!(!handle.stop());
        assert!(handle.initialize());
        assert!(!handle.initialize());
    }

    #[test]
    fn record_then_play_through_handles() {
        let backend = VirtualBackend::with_source(SignalSource::Counter { next: 0 });
        let device = backend.device();
        let path = temp_file_path("round_trip.wav");

        let mut capture = CaptureHandle::new(backend.clone(), small_config());
        assert!(capture.initialize());
        assert!(capture.start(&path));
        assert!(capture.is_active());
        for _ in 0..3 {
            assert!(device.complete_capture_buffer());
        }
        assert!(capture.stop());
        assert!(!capture.is_active());
        assert_eq!(capture.engine().last_recording().map(|r| r.sample_count), Some(192));
        capture.teardown();

        let mut playback = PlaybackHandle::new(backend, small_config());
        assert!(playback.initialize());
        assert!(playback.load(&path));
        assert!(playback.start());
        device.drain_playback(100);
        assert!(!playback.is_active());
        assert!(!playback.stop());

        let expected: Vec<i16> = (0..192).collect();
        assert_eq!(device.played_samples(), expected);
        playback.teardown();
        assert_eq!(device.open_sessions(), 0);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn playback_handle_rejects_missing_file() {
        let mut handle = PlaybackHandle::new(VirtualBackend::new(), small_config());
        assert!(handle.initialize());
        assert!(!handle.load(temp_file_path("does_not_exist.wav")));
        assert!(!handle.start());
    }

    #[test]
    fn injected_init_failure_is_false() {
        let backend = VirtualBackend::new();
        backend.device().fail_next(Fault::CreateSession);
        let mut handle = PlaybackHandle::new(backend.clone(), small_config());
        assert!(!handle.initialize());
        assert!(handle.initialize());
    }
}
