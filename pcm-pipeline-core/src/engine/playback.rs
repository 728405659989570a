use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::config::EngineConfig;
use crate::models::diagnostics::{DiagnosticCounters, EngineDiagnostics};
use crate::models::error::PipelineError;
use crate::models::state::{AtomicEngineState, EngineState};
use crate::processing::wav_format;
use crate::traits::audio_backend::{
    AudioBackend, EngineSession, PlayState, PlaybackCallback, PlayerObject, SampleChunk, SampleQueue,
};

type Player<B> = <<B as AudioBackend>::Session as EngineSession>::Player;

/// Loaded samples plus the index of the next sample to submit.
struct PlaybackCursor {
    store: Arc<[i16]>,
    position: usize,
}

struct PlaybackShared {
    state: AtomicEngineState,
    cursor: Mutex<PlaybackCursor>,
    buffer_size: usize,
    diagnostics: DiagnosticCounters,
}

impl PlaybackShared {
    /// Submit the next chunk and advance the cursor.
    ///
    /// Returns `Ok(false)` when there is nothing left to submit, after
    /// moving the engine to idle. The last chunk is submitted while still
    /// active; the stream is marked finished on the following call, once
    /// the device has played it.
    fn submit_next(&self, queue: &dyn SampleQueue<SampleChunk>) -> Result<bool, PipelineError> {
        let mut cursor = self.cursor.lock();
        if !self.state.is_active() || cursor.position >= cursor.store.len() {
            self.state.store(EngineState::Idle);
            return Ok(false);
        }

        let start = cursor.position;
        let len = self.buffer_size.min(cursor.store.len() - start);
        let chunk = SampleChunk::new(Arc::clone(&cursor.store), start..start + len);

        match queue.enqueue(chunk) {
            Ok(()) => {
                cursor.position += len;
                self.diagnostics.record_enqueue(true);
                self.diagnostics.record_samples(len);
                Ok(true)
            }
            Err(e) => {
                self.diagnostics.record_enqueue(false);
                Err(e)
            }
        }
    }

    fn on_chunk_complete(&self, queue: &dyn SampleQueue<SampleChunk>) {
        self.diagnostics.record_callback();
        let was_active = self.state.is_active();
        match self.submit_next(queue) {
            Ok(true) => {}
            Ok(false) => {
                if was_active {
                    log::info!("Playback finished");
                }
            }
            Err(e) => log::error!("Failed to enqueue playback chunk: {}", e),
        }
    }
}

fn playback_callback(shared: Arc<PlaybackShared>) -> PlaybackCallback {
    Arc::new(move |queue: &dyn SampleQueue<SampleChunk>| shared.on_chunk_complete(queue))
}

/// Plays a waveform file loaded fully into memory.
///
/// Each completion callback submits the next `config.buffer_size` samples
/// of the store. The store is immutable while playing; only the cursor is
/// locked.
pub struct PlaybackEngine<B: AudioBackend> {
    backend: B,
    config: EngineConfig,
    session: Option<B::Session>,
    player: Option<Player<B>>,
    shared: Arc<PlaybackShared>,
    source: Option<PathBuf>,
}

impl<B: AudioBackend> PlaybackEngine<B> {
    pub fn new(backend: B, config: EngineConfig) -> Self {
        let buffer_size = config.buffer_size;
        Self {
            backend,
            config,
            session: None,
            player: None,
            shared: Arc::new(PlaybackShared {
                state: AtomicEngineState::default(),
                cursor: Mutex::new(PlaybackCursor {
                    store: Arc::from(Vec::<i16>::new()),
                    position: 0,
                }),
                buffer_size,
                diagnostics: DiagnosticCounters::default(),
            }),
            source: None,
        }
    }

    /// Acquire this engine's own subsystem session.
    pub fn initialize(&mut self) -> Result<(), PipelineError> {
        if self.session.is_some() {
            log::warn!("Playback engine already initialized");
            return Err(PipelineError::AlreadyInitialized);
        }
        self.config.validate().map_err(PipelineError::Config)?;

        let session = self
            .backend
            .create_session()
            .inspect_err(|e| log::error!("Failed to create player engine: {}", e))?;
        self.session = Some(session);
        log::info!("Playback engine initialized");
        Ok(())
    }

    /// Load `path` into memory, replacing the previous store.
    ///
    /// The 44-byte header is skipped, not parsed: the file is assumed to be
    /// in the engine's format. Rejected while playing.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), PipelineError> {
        let path = path.as_ref();
        if self.shared.state.is_active() {
            log::error!("Cannot load {} while playing", path.display());
            return Err(PipelineError::AlreadyActive);
        }

        let file = File::open(path).map_err(|e| {
            log::error!("Failed to open audio file: {}", path.display());
            PipelineError::FileOpen(format!("{}: {}", path.display(), e))
        })?;
        let samples = wav_format::read_samples(&mut BufReader::new(file))?;
        let count = samples.len();

        {
            let mut cursor = self.shared.cursor.lock();
            cursor.store = Arc::from(samples);
            cursor.position = 0;
        }
        self.source = Some(path.to_path_buf());

        log::info!("Loaded audio file: {}, samples: {}", path.display(), count);
        if count == 0 {
            return Err(PipelineError::EmptyFile(path.display().to_string()));
        }
        Ok(())
    }

    /// Start playing the loaded store from the beginning.
    pub fn start(&mut self) -> Result<(), PipelineError> {
        if self.shared.state.is_active() {
            return Err(PipelineError::AlreadyActive);
        }
        if self.loaded_samples() == 0 {
            return Err(PipelineError::EmptyFile("no audio loaded".into()));
        }
        // A stream that ran to completion leaves its player behind.
        self.player = None;
        let session = self.session.as_mut().ok_or(PipelineError::NotInitialized)?;

        let mut player = session
            .create_player(&self.config.format)
            .inspect_err(|e| log::error!("Failed to create audio player: {}", e))?;
        player
            .register_callback(playback_callback(Arc::clone(&self.shared)))
            .inspect_err(|e| log::error!("Failed to register player callback: {}", e))?;
        player
            .set_play_state(PlayState::Playing)
            .inspect_err(|e| log::error!("Failed to start playback: {}", e))?;

        self.shared.cursor.lock().position = 0;
        self.shared.diagnostics.reset();
        self.shared.state.store(EngineState::Active);

        match self.shared.submit_next(&player) {
            Ok(true) => {}
            Ok(false) => {
                self.shared.state.store(EngineState::Idle);
                return Err(PipelineError::EmptyFile("no audio loaded".into()));
            }
            Err(e) => {
                self.shared.state.store(EngineState::Idle);
                log::error!("Failed to enqueue first playback chunk: {}", e);
                return Err(e);
            }
        }

        self.player = Some(player);
        log::info!("Playback started");
        Ok(())
    }

    /// Stop playing and release the player and its output mix.
    pub fn stop(&mut self) -> Result<(), PipelineError> {
        if !self.shared.state.is_active() {
            return Err(PipelineError::NotActive);
        }
        self.shared.state.store(EngineState::Idle);

        let stopped = match self.player.as_mut() {
            Some(player) => player.set_play_state(PlayState::Stopped),
            None => Ok(()),
        };
        if let Err(e) = &stopped {
            log::error!("Failed to stop player: {}", e);
        }
        self.player = None;

        log::info!("Playback stopped");
        stopped
    }

    pub fn is_active(&self) -> bool {
        self.shared.state.is_active()
    }

    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    /// Release the player and the subsystem session, stopping first if
    /// playing. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        if self.shared.state.is_active() {
            let _ = self.stop();
        }
        self.player = None;
        if self.session.take().is_some() {
            log::info!("Playback engine released");
        }
    }

    /// Samples submitted so far in the current session.
    pub fn position(&self) -> usize {
        self.shared.cursor.lock().position
    }

    pub fn loaded_samples(&self) -> usize {
        self.shared.cursor.lock().store.len()
    }

    /// The loaded store, shared with any chunks still queued.
    pub fn samples(&self) -> Arc<[i16]> {
        Arc::clone(&self.shared.cursor.lock().store)
    }

    pub fn duration_secs(&self) -> f64 {
        self.config.format.duration_secs(self.loaded_samples())
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn diagnostics(&self) -> EngineDiagnostics {
        self.shared.diagnostics.snapshot()
    }
}

impl<B: AudioBackend> Drop for PlaybackEngine<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use approx::assert_relative_eq;

    use crate::backend::virtual_device::{Fault, SubmittedChunk, VirtualBackend};
    use crate::models::config::PcmFormat;

    const BUFFER: usize = 100;

    fn temp_file_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("pcm_pipeline_playback_{}", name))
    }

    fn write_fixture(name: &str, samples: &[i16]) -> PathBuf {
        let path = temp_file_path(name);
        let mut file = File::create(&path).unwrap();
        wav_format::write_wav(&mut file, samples, &PcmFormat::default()).unwrap();
        path
    }

    fn ramp(len: usize) -> Vec<i16> {
        (0..len).map(|i| (i as i32 * 7 - 20_000) as i16).collect()
    }

    fn engine() -> (PlaybackEngine<VirtualBackend>, VirtualBackend) {
        let backend = VirtualBackend::new();
        let mut engine =
            PlaybackEngine::new(backend.clone(), EngineConfig::default().with_buffer_size(BUFFER));
        engine.initialize().unwrap();
        (engine, backend)
    }

    #[test]
    fn load_round_trips_codec_output() {
        let (mut engine, _backend) = engine();
        for len in [1usize, 2, 99, 100, 101, 4096, 10_000] {
            let input = ramp(len);
            let path = write_fixture(&format!("round_trip_{}.wav", len), &input);

            engine.load(&path).unwrap();
            assert_eq!(engine.loaded_samples(), len);
            assert_eq!(&*engine.samples(), input.as_slice());
            assert_eq!(engine.position(), 0);

            fs::remove_file(&path).ok();
        }
    }

    #[test]
    fn played_samples_match_file() {
        let input = ramp(3 * BUFFER + 5);
        let path = write_fixture("played.wav", &input);
        let (mut engine, backend) = engine();
        let device = backend.device();

        engine.load(&path).unwrap();
        engine.start().unwrap();
        device.drain_playback(100);

        assert_eq!(device.played_samples(), input);
        assert!(!engine.is_active());
        fs::remove_file(&path).ok();
    }

    #[test]
    fn load_missing_file_fails() {
        let (mut engine, _backend) = engine();
        let err = engine.load(temp_file_path("does_not_exist.wav")).unwrap_err();
        assert!(matches!(err, PipelineError::FileOpen(_)));
    }

    #[test]
    fn load_header_only_file_is_empty_and_replaces_store() {
        let full = write_fixture("before_empty.wav", &ramp(10));
        let empty = write_fixture("header_only.wav", &[]);
        let (mut engine, _backend) = engine();

        engine.load(&full).unwrap();
        assert!(matches!(engine.load(&empty), Err(PipelineError::EmptyFile(_))));
        assert_eq!(engine.loaded_samples(), 0);
        assert!(matches!(engine.start(), Err(PipelineError::EmptyFile(_))));

        fs::remove_file(&full).ok();
        fs::remove_file(&empty).ok();
    }

    #[test]
    fn start_requires_initialize() {
        let path = write_fixture("uninit.wav", &ramp(10));
        let mut engine = PlaybackEngine::new(VirtualBackend::new(), EngineConfig::default());
        engine.load(&path).unwrap();
        assert_eq!(engine.start(), Err(PipelineError::NotInitialized));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn termination_is_one_callback_late() {
        let k = 3;
        let r = 37;
        let path = write_fixture("termination.wav", &ramp(BUFFER * k + r));
        let (mut engine, backend) = engine();
        let device = backend.device();

        engine.load(&path).unwrap();
        engine.start().unwrap();
        assert_eq!(device.submissions().len(), 1);

        for completed in 1..=k {
            assert!(device.complete_playback_chunk());
            assert_eq!(device.submissions().len(), completed + 1);
            assert!(engine.is_active(), "finished early after {} chunks", completed);
        }
        assert_eq!(engine.position(), BUFFER * k + r);

        assert!(device.complete_playback_chunk());
        assert!(!engine.is_active());
        assert!(!device.complete_playback_chunk());

        let submissions = device.submissions();
        assert_eq!(submissions.len(), k + 1);
        for (i, chunk) in submissions[..k].iter().enumerate() {
            assert_eq!(*chunk, SubmittedChunk { offset: i * BUFFER, len: BUFFER });
        }
        assert_eq!(submissions[k], SubmittedChunk { offset: k * BUFFER, len: r });
        assert_eq!(engine.diagnostics().callback_count, (k + 1) as u64);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn exact_multiple_ends_after_last_full_chunk() {
        let path = write_fixture("exact.wav", &ramp(2 * BUFFER));
        let (mut engine, backend) = engine();
        let device = backend.device();

        engine.load(&path).unwrap();
        engine.start().unwrap();
        assert_eq!(device.drain_playback(10), 2);

        assert_eq!(device.submissions().len(), 2);
        assert!(!engine.is_active());
        fs::remove_file(&path).ok();
    }

    #[test]
    fn stop_releases_player() {
        let path = write_fixture("stop.wav", &ramp(5 * BUFFER));
        let (mut engine, backend) = engine();
        let device = backend.device();

        engine.load(&path).unwrap();
        engine.start().unwrap();
        device.complete_playback_chunk();

        assert_eq!(engine.stop(), Ok(()));
        assert!(!engine.is_active());
        assert_eq!(device.open_players(), 0);
        assert_eq!(device.open_sessions(), 1);
        assert_eq!(engine.stop(), Err(PipelineError::NotActive));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn second_start_and_load_rejected_while_playing() {
        let path = write_fixture("busy.wav", &ramp(5 * BUFFER));
        let (mut engine, backend) = engine();
        let device = backend.device();

        engine.load(&path).unwrap();
        engine.start().unwrap();

        assert_eq!(engine.start(), Err(PipelineError::AlreadyActive));
        assert_eq!(engine.load(&path), Err(PipelineError::AlreadyActive));
        assert!(engine.is_active());
        assert_eq!(device.submissions().len(), 1);

        device.complete_playback_chunk();
        assert_eq!(engine.position(), 2 * BUFFER);
        engine.stop().unwrap();
        fs::remove_file(&path).ok();
    }

    #[test]
    fn restart_after_completion() {
        let path = write_fixture("restart.wav", &ramp(BUFFER + 1));
        let (mut engine, backend) = engine();
        let device = backend.device();

        engine.load(&path).unwrap();
        engine.start().unwrap();
        device.drain_playback(10);
        assert!(!engine.is_active());
        assert_eq!(engine.stop(), Err(PipelineError::NotActive));

        device.clear_output_log();
        engine.start().unwrap();
        assert_eq!(device.open_players(), 1);
        assert_eq!(engine.position(), BUFFER);
        device.drain_playback(10);
        assert_eq!(device.submissions().len(), 2);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn failed_enqueue_stalls_playback() {
        let path = write_fixture("stall.wav", &ramp(5 * BUFFER));
        let (mut engine, backend) = engine();
        let device = backend.device();

        engine.load(&path).unwrap();
        engine.start().unwrap();
        device.fail_next(Fault::Enqueue);

        assert!(device.complete_playback_chunk());
        assert!(!device.complete_playback_chunk());
        assert!(engine.is_active());
        assert_eq!(engine.position(), BUFFER);
        assert_eq!(engine.diagnostics().enqueue_failures, 1);

        engine.stop().unwrap();
        fs::remove_file(&path).ok();
    }

    #[test]
    fn start_failures_leave_engine_idle() {
        let path = write_fixture("start_fail.wav", &ramp(BUFFER));
        let (mut engine, backend) = engine();
        let device = backend.device();
        engine.load(&path).unwrap();

        device.fail_next(Fault::CreatePlayer);
        assert!(matches!(engine.start(), Err(PipelineError::Config(_))));

        device.fail_next(Fault::SetState);
        assert!(matches!(engine.start(), Err(PipelineError::Device(_))));

        device.fail_next(Fault::Enqueue);
        assert!(matches!(engine.start(), Err(PipelineError::Device(_))));

        assert!(!engine.is_active());
        assert_eq!(device.open_players(), 0);

        engine.start().unwrap();
        assert!(engine.is_active());
        fs::remove_file(&path).ok();
    }

    #[test]
    fn teardown_releases_everything() {
        let path = write_fixture("teardown.wav", &ramp(3 * BUFFER));
        let (mut engine, backend) = engine();
        let device = backend.device();

        engine.load(&path).unwrap();
        engine.start().unwrap();
        engine.teardown();
        engine.teardown();

        assert!(!engine.is_active());
        assert_eq!(device.open_players(), 0);
        assert_eq!(device.open_sessions(), 0);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn duration_follows_loaded_samples() {
        let path = write_fixture("duration.wav", &vec![0i16; 22_050]);
        let (mut engine, _backend) = engine();
        engine.load(&path).unwrap();
        assert_relative_eq!(engine.duration_secs(), 0.5);
        assert_eq!(engine.source(), Some(path.as_path()));
        fs::remove_file(&path).ok();
    }
}
