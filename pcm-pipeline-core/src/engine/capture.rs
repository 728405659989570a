use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::config::EngineConfig;
use crate::models::diagnostics::{DiagnosticCounters, EngineDiagnostics};
use crate::models::error::PipelineError;
use crate::models::state::{AtomicEngineState, EngineState};
use crate::processing::wav_format;
use crate::traits::audio_backend::{
    AudioBackend, CaptureCallback, EngineSession, RecordState, RecorderObject, SampleQueue,
};

type Recorder<B> = <<B as AudioBackend>::Session as EngineSession>::Recorder;

/// A waveform file written by `CaptureEngine::stop`.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedRecording {
    pub path: PathBuf,
    pub sample_count: usize,
    pub duration_secs: f64,
}

/// State shared between the control thread and the hardware callback.
struct CaptureShared {
    state: AtomicEngineState,
    accumulator: Mutex<Vec<i16>>,
    diagnostics: DiagnosticCounters,
}

impl CaptureShared {
    /// Append a filled scratch buffer and hand it back to the queue.
    fn on_buffer_complete(&self, queue: &dyn SampleQueue<Box<[i16]>>, buffer: Box<[i16]>) {
        self.diagnostics.record_callback();
        if !self.state.is_active() {
            return;
        }

        self.accumulator.lock().extend_from_slice(&buffer);
        self.diagnostics.record_samples(buffer.len());

        if self.state.is_active() {
            match queue.enqueue(buffer) {
                Ok(()) => self.diagnostics.record_enqueue(true),
                Err(e) => {
                    self.diagnostics.record_enqueue(false);
                    log::error!("Failed to re-enqueue capture buffer: {}", e);
                }
            }
        }
    }
}

fn capture_callback(shared: Arc<CaptureShared>) -> CaptureCallback {
    Arc::new(move |queue: &dyn SampleQueue<Box<[i16]>>, buffer: Box<[i16]>| {
        shared.on_buffer_complete(queue, buffer)
    })
}

/// Records from the input device into memory and saves a waveform on stop.
///
/// One scratch buffer of `config.buffer_size` samples circulates between
/// the hardware queue and the completion callback. Each completed buffer is
/// appended to a mutex-guarded accumulator and resubmitted while the
/// session is active.
///
/// ```text
/// [input device] → scratch → callback ─┬→ accumulator ── stop ──▶ file.wav
///        ▲                             │
///        └────────── re-enqueue ◀──────┘
/// ```
pub struct CaptureEngine<B: AudioBackend> {
    backend: B,
    config: EngineConfig,
    session: Option<B::Session>,
    recorder: Option<Recorder<B>>,
    shared: Arc<CaptureShared>,
    destination: Option<PathBuf>,
    last_recording: Option<CapturedRecording>,
}

impl<B: AudioBackend> CaptureEngine<B> {
    pub fn new(backend: B, config: EngineConfig) -> Self {
        Self {
            backend,
            config,
            session: None,
            recorder: None,
            shared: Arc::new(CaptureShared {
                state: AtomicEngineState::default(),
                accumulator: Mutex::new(Vec::new()),
                diagnostics: DiagnosticCounters::default(),
            }),
            destination: None,
            last_recording: None,
        }
    }

    /// Acquire the audio subsystem session.
    ///
    /// A second call on an initialized engine is rejected and leaves the
    /// existing session in place.
    pub fn initialize(&mut self) -> Result<(), PipelineError> {
        if self.session.is_some() {
            log::warn!("Capture engine already initialized");
            return Err(PipelineError::AlreadyInitialized);
        }
        self.config.validate().map_err(PipelineError::Config)?;

        let session = self
            .backend
            .create_session()
            .inspect_err(|e| log::error!("Failed to create capture engine: {}", e))?;
        self.session = Some(session);
        log::info!("Capture engine initialized");
        Ok(())
    }

    /// Start recording. The file is written to `destination` on `stop`.
    ///
    /// On failure every object created by this call is released and the
    /// engine stays idle.
    pub fn start(&mut self, destination: impl AsRef<Path>) -> Result<(), PipelineError> {
        if self.shared.state.is_active() {
            log::error!("Already recording");
            return Err(PipelineError::AlreadyActive);
        }
        self.recorder = None;
        let session = self.session.as_mut().ok_or(PipelineError::NotInitialized)?;

        self.shared.accumulator.lock().clear();
        self.shared.diagnostics.reset();

        let mut recorder = session
            .create_recorder(&self.config.format)
            .inspect_err(|e| log::error!("Failed to create audio recorder: {}", e))?;
        recorder
            .register_callback(capture_callback(Arc::clone(&self.shared)))
            .inspect_err(|e| log::error!("Failed to register callback: {}", e))?;

        let scratch = vec![0i16; self.config.buffer_size].into_boxed_slice();
        recorder
            .enqueue(scratch)
            .inspect_err(|e| log::error!("Failed to enqueue buffer: {}", e))?;
        self.shared.diagnostics.record_enqueue(true);

        // Active before the device runs, so the first callback is not dropped.
        self.shared.state.store(EngineState::Active);
        if let Err(e) = recorder.set_record_state(RecordState::Recording) {
            self.shared.state.store(EngineState::Idle);
            log::error!("Failed to start recording: {}", e);
            return Err(e);
        }

        let destination = destination.as_ref().to_path_buf();
        log::info!("Recording started: {}", destination.display());
        self.destination = Some(destination);
        self.recorder = Some(recorder);
        Ok(())
    }

    /// Stop recording, save the accumulated samples, and release the
    /// recorder. The subsystem session is kept for the next recording.
    ///
    /// Returns the outcome of the hardware stop. Saving is best-effort:
    /// a write failure is logged and does not change the result.
    pub fn stop(&mut self) -> Result<(), PipelineError> {
        if !self.shared.state.is_active() {
            log::error!("Not recording");
            return Err(PipelineError::NotActive);
        }
        self.shared.state.store(EngineState::Idle);

        let stopped = match self.recorder.as_mut() {
            Some(recorder) => recorder.set_record_state(RecordState::Stopped),
            None => Ok(()),
        };
        if let Err(e) = &stopped {
            log::error!("Failed to stop recorder: {}", e);
        }

        self.save_to_file();
        self.recorder = None;

        log::info!("Recording stopped");
        stopped
    }

    pub fn is_active(&self) -> bool {
        self.shared.state.is_active()
    }

    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    /// Release the recorder and the subsystem session, stopping first if
    /// recording. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        if self.shared.state.is_active() {
            let _ = self.stop();
        }
        self.recorder = None;
        if self.session.take().is_some() {
            log::info!("Capture engine released");
        }
    }

    /// Samples accumulated in the current or most recent session.
    pub fn captured_samples(&self) -> usize {
        self.shared.accumulator.lock().len()
    }

    pub fn last_recording(&self) -> Option<&CapturedRecording> {
        self.last_recording.as_ref()
    }

    pub fn diagnostics(&self) -> EngineDiagnostics {
        self.shared.diagnostics.snapshot()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn save_to_file(&mut self) {
        let Some(path) = self.destination.clone() else {
            return;
        };

        let samples = self.shared.accumulator.lock();
        if samples.is_empty() {
            log::warn!("No audio data to save");
            return;
        }

        match write_waveform(&path, &samples, &self.config) {
            Ok(()) => {
                log::info!("Audio saved to: {} ({} samples)", path.display(), samples.len());
                self.last_recording = Some(CapturedRecording {
                    sample_count: samples.len(),
                    duration_secs: self.config.format.duration_secs(samples.len()),
                    path,
                });
            }
            Err(e) => log::error!("Failed to save {}: {}", path.display(), e),
        }
    }
}

impl<B: AudioBackend> Drop for CaptureEngine<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn write_waveform(path: &Path, samples: &[i16], config: &EngineConfig) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| PipelineError::Io(format!("failed to create directory: {}", e)))?;
    }
    let file = File::create(path)
        .map_err(|e| PipelineError::Io(format!("failed to create file: {}", e)))?;
    let mut writer = BufWriter::new(file);
    wav_format::write_wav(&mut writer, samples, &config.format)
}
