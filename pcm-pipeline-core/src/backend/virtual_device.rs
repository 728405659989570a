//! Software audio device implementing the backend traits.
//!
//! One input line and one output line. Completion callbacks fire when the
//! device is pumped, either manually (`complete_capture_buffer`,
//! `complete_playback_chunk`) or by a `DeviceClock` thread. Callbacks for a
//! line are serialized, and stopping a line waits for an in-flight callback
//! to return.

use std::collections::VecDeque;
use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::config::PcmFormat;
use crate::models::error::PipelineError;
use crate::traits::audio_backend::{
    AudioBackend, CaptureCallback, EngineSession, PlayState, PlaybackCallback, PlayerObject,
    RecordState, RecorderObject, SampleChunk, SampleQueue,
};

/// Signal produced by the virtual input device.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalSource {
    Silence,
    /// Sine wave; `amplitude` in 0.0-1.0 of full scale.
    Tone { frequency: f64, amplitude: f64 },
    /// Consecutive values starting at `next`, wrapping at `i16::MAX`.
    Counter { next: i16 },
}

/// Fills buffers from a `SignalSource`, keeping phase across buffers.
#[derive(Debug)]
struct SignalGenerator {
    source: SignalSource,
    position: u64,
}

impl SignalGenerator {
    fn fill(&mut self, buffer: &mut [i16], sample_rate: u32) {
        match &mut self.source {
            SignalSource::Silence => buffer.fill(0),
            SignalSource::Tone { frequency, amplitude } => {
                let scale = amplitude.clamp(0.0, 1.0) * i16::MAX as f64;
                for sample in buffer.iter_mut() {
                    let t = self.position as f64 / sample_rate.max(1) as f64;
                    *sample = ((TAU * *frequency * t).sin() * scale).round() as i16;
                    self.position += 1;
                }
                return;
            }
            SignalSource::Counter { next } => {
                for sample in buffer.iter_mut() {
                    *sample = *next;
                    *next = next.wrapping_add(1);
                }
            }
        }
        self.position += buffer.len() as u64;
    }
}

/// Device operations that can be made to fail once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    CreateSession,
    CreateRecorder,
    CreatePlayer,
    RegisterCallback,
    Enqueue,
    SetState,
}

/// A chunk handed to the output queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmittedChunk {
    pub offset: usize,
    pub len: usize,
}

/// State shared by the device and its open lines.
#[derive(Debug, Default)]
struct DeviceShared {
    faults: Mutex<Vec<Fault>>,
    submissions: Mutex<Vec<SubmittedChunk>>,
    played: Mutex<Vec<i16>>,
    open_sessions: AtomicUsize,
    open_recorders: AtomicUsize,
    open_players: AtomicUsize,
}

impl DeviceShared {
    fn check(&self, fault: Fault, err: impl FnOnce() -> PipelineError) -> Result<(), PipelineError> {
        let mut faults = self.faults.lock();
        match faults.iter().position(|f| *f == fault) {
            Some(index) => {
                faults.remove(index);
                Err(err())
            }
            None => Ok(()),
        }
    }
}

struct CaptureLine {
    shared: Arc<DeviceShared>,
    sample_rate: u32,
    state: Mutex<RecordState>,
    callback: Mutex<Option<CaptureCallback>>,
    pending: Mutex<VecDeque<Box<[i16]>>>,
    serial: Mutex<()>,
}

impl SampleQueue<Box<[i16]>> for CaptureLine {
    fn enqueue(&self, buffer: Box<[i16]>) -> Result<(), PipelineError> {
        self.shared
            .check(Fault::Enqueue, || PipelineError::Device("input queue rejected buffer".into()))?;
        self.pending.lock().push_back(buffer);
        Ok(())
    }
}

impl CaptureLine {
    fn complete(&self, generator: &Mutex<SignalGenerator>) -> bool {
        let _serial = self.serial.lock();
        if *self.state.lock() != RecordState::Recording {
            return false;
        }
        let Some(mut buffer) = self.pending.lock().pop_front() else {
            return false;
        };
        generator.lock().fill(&mut buffer, self.sample_rate);

        let Some(callback) = self.callback.lock().clone() else {
            return false;
        };
        callback(self, buffer);
        true
    }
}

struct PlaybackLine {
    shared: Arc<DeviceShared>,
    state: Mutex<PlayState>,
    callback: Mutex<Option<PlaybackCallback>>,
    pending: Mutex<VecDeque<SampleChunk>>,
    serial: Mutex<()>,
}

impl SampleQueue<SampleChunk> for PlaybackLine {
    fn enqueue(&self, chunk: SampleChunk) -> Result<(), PipelineError> {
        self.shared
            .check(Fault::Enqueue, || PipelineError::Device("output queue rejected chunk".into()))?;
        self.shared.submissions.lock().push(SubmittedChunk {
            offset: chunk.offset(),
            len: chunk.len(),
        });
        self.pending.lock().push_back(chunk);
        Ok(())
    }
}

impl PlaybackLine {
    fn complete(&self) -> bool {
        let _serial = self.serial.lock();
        if *self.state.lock() != PlayState::Playing {
            return false;
        }
        let Some(chunk) = self.pending.lock().pop_front() else {
            return false;
        };
        self.shared.played.lock().extend_from_slice(chunk.samples());

        let Some(callback) = self.callback.lock().clone() else {
            return false;
        };
        callback(self);
        true
    }
}

/// The virtual device: one input line, one output line.
pub struct VirtualDevice {
    shared: Arc<DeviceShared>,
    generator: Mutex<SignalGenerator>,
    capture: Mutex<Option<Arc<CaptureLine>>>,
    playback: Mutex<Option<Arc<PlaybackLine>>>,
}

impl VirtualDevice {
    fn new(source: SignalSource) -> Self {
        Self {
            shared: Arc::new(DeviceShared::default()),
            generator: Mutex::new(SignalGenerator { source, position: 0 }),
            capture: Mutex::new(None),
            playback: Mutex::new(None),
        }
    }

    /// Replace the input signal. Takes effect from the next filled buffer.
    pub fn set_source(&self, source: SignalSource) {
        *self.generator.lock() = SignalGenerator { source, position: 0 };
    }

    /// Make the next occurrence of `fault` fail.
    pub fn fail_next(&self, fault: Fault) {
        self.shared.faults.lock().push(fault);
    }

    /// Fill the oldest pending input buffer and fire the capture callback.
    ///
    /// Returns `false` when nothing was delivered (no recorder, not
    /// recording, or no buffer queued).
    pub fn complete_capture_buffer(&self) -> bool {
        let Some(line) = self.capture.lock().clone() else {
            return false;
        };
        line.complete(&self.generator)
    }

    /// Play the oldest pending chunk and fire the playback callback.
    pub fn complete_playback_chunk(&self) -> bool {
        let Some(line) = self.playback.lock().clone() else {
            return false;
        };
        line.complete()
    }

    /// Pump the output line until it runs dry or `limit` chunks complete.
    /// Returns the number of completions.
    pub fn drain_playback(&self, limit: usize) -> usize {
        let mut completed = 0;
        while completed < limit && self.complete_playback_chunk() {
            completed += 1;
        }
        completed
    }

    pub fn pending_capture_buffers(&self) -> usize {
        self.capture
            .lock()
            .as_ref()
            .map(|line| line.pending.lock().len())
            .unwrap_or(0)
    }

    /// Every chunk submitted to the output queue, in order.
    pub fn submissions(&self) -> Vec<SubmittedChunk> {
        self.shared.submissions.lock().clone()
    }

    /// Samples the output line has finished playing.
    pub fn played_samples(&self) -> Vec<i16> {
        self.shared.played.lock().clone()
    }

    pub fn clear_output_log(&self) {
        self.shared.submissions.lock().clear();
        self.shared.played.lock().clear();
    }

    pub fn open_sessions(&self) -> usize {
        self.shared.open_sessions.load(Ordering::SeqCst)
    }

    pub fn open_recorders(&self) -> usize {
        self.shared.open_recorders.load(Ordering::SeqCst)
    }

    pub fn open_players(&self) -> usize {
        self.shared.open_players.load(Ordering::SeqCst)
    }
}

/// `AudioBackend` over a shared `VirtualDevice`.
///
/// Clones share the device, so a test can keep one clone to pump and
/// inspect while an engine owns another.
#[derive(Clone)]
pub struct VirtualBackend {
    device: Arc<VirtualDevice>,
}

impl VirtualBackend {
    pub fn new() -> Self {
        Self::with_source(SignalSource::Silence)
    }

    pub fn with_source(source: SignalSource) -> Self {
        Self {
            device: Arc::new(VirtualDevice::new(source)),
        }
    }

    pub fn device(&self) -> Arc<VirtualDevice> {
        Arc::clone(&self.device)
    }
}

impl Default for VirtualBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for VirtualBackend {
    type Session = VirtualSession;

    fn create_session(&self) -> Result<VirtualSession, PipelineError> {
        self.device
            .shared
            .check(Fault::CreateSession, || PipelineError::Init("failed to create engine".into()))?;
        self.device.shared.open_sessions.fetch_add(1, Ordering::SeqCst);
        log::debug!("virtual session created");
        Ok(VirtualSession {
            device: Arc::clone(&self.device),
        })
    }
}

pub struct VirtualSession {
    device: Arc<VirtualDevice>,
}

impl EngineSession for VirtualSession {
    type Recorder = VirtualRecorder;
    type Player = VirtualPlayer;

    fn create_recorder(&mut self, format: &PcmFormat) -> Result<VirtualRecorder, PipelineError> {
        let shared = &self.device.shared;
        shared.check(Fault::CreateRecorder, || {
            PipelineError::Config("failed to create audio recorder".into())
        })?;

        let mut slot = self.device.capture.lock();
        if slot.is_some() {
            return Err(PipelineError::Config("input device busy".into()));
        }

        let line = Arc::new(CaptureLine {
            shared: Arc::clone(shared),
            sample_rate: format.sample_rate,
            state: Mutex::new(RecordState::Stopped),
            callback: Mutex::new(None),
            pending: Mutex::new(VecDeque::new()),
            serial: Mutex::new(()),
        });
        *slot = Some(Arc::clone(&line));
        shared.open_recorders.fetch_add(1, Ordering::SeqCst);

        Ok(VirtualRecorder {
            device: Arc::clone(&self.device),
            line,
        })
    }

    fn create_player(&mut self, _format: &PcmFormat) -> Result<VirtualPlayer, PipelineError> {
        let shared = &self.device.shared;
        shared.check(Fault::CreatePlayer, || {
            PipelineError::Config("failed to create audio player".into())
        })?;

        let mut slot = self.device.playback.lock();
        if slot.is_some() {
            return Err(PipelineError::Config("output device busy".into()));
        }

        let line = Arc::new(PlaybackLine {
            shared: Arc::clone(shared),
            state: Mutex::new(PlayState::Stopped),
            callback: Mutex::new(None),
            pending: Mutex::new(VecDeque::new()),
            serial: Mutex::new(()),
        });
        *slot = Some(Arc::clone(&line));
        shared.open_players.fetch_add(1, Ordering::SeqCst);

        Ok(VirtualPlayer {
            device: Arc::clone(&self.device),
            line,
        })
    }
}

impl Drop for VirtualSession {
    fn drop(&mut self) {
        self.device.shared.open_sessions.fetch_sub(1, Ordering::SeqCst);
        log::debug!("virtual session destroyed");
    }
}

pub struct VirtualRecorder {
    device: Arc<VirtualDevice>,
    line: Arc<CaptureLine>,
}

impl SampleQueue<Box<[i16]>> for VirtualRecorder {
    fn enqueue(&self, buffer: Box<[i16]>) -> Result<(), PipelineError> {
        self.line.enqueue(buffer)
    }
}

impl RecorderObject for VirtualRecorder {
    fn register_callback(&mut self, callback: CaptureCallback) -> Result<(), PipelineError> {
        self.device.shared.check(Fault::RegisterCallback, || {
            PipelineError::Config("failed to register callback".into())
        })?;
        *self.line.callback.lock() = Some(callback);
        Ok(())
    }

    fn set_record_state(&mut self, state: RecordState) -> Result<(), PipelineError> {
        self.device.shared.check(Fault::SetState, || {
            PipelineError::Device(format!("failed to set record state {:?}", state))
        })?;
        let _serial = self.line.serial.lock();
        *self.line.state.lock() = state;
        Ok(())
    }
}

impl Drop for VirtualRecorder {
    fn drop(&mut self) {
        let mut slot = self.device.capture.lock();
        if slot.as_ref().is_some_and(|line| Arc::ptr_eq(line, &self.line)) {
            *slot = None;
        }
        self.line.callback.lock().take();
        self.device.shared.open_recorders.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct VirtualPlayer {
    device: Arc<VirtualDevice>,
    line: Arc<PlaybackLine>,
}

impl SampleQueue<SampleChunk> for VirtualPlayer {
    fn enqueue(&self, chunk: SampleChunk) -> Result<(), PipelineError> {
        self.line.enqueue(chunk)
    }
}

impl PlayerObject for VirtualPlayer {
    fn register_callback(&mut self, callback: PlaybackCallback) -> Result<(), PipelineError> {
        self.device.shared.check(Fault::RegisterCallback, || {
            PipelineError::Config("failed to register player callback".into())
        })?;
        *self.line.callback.lock() = Some(callback);
        Ok(())
    }

    fn set_play_state(&mut self, state: PlayState) -> Result<(), PipelineError> {
        self.device.shared.check(Fault::SetState, || {
            PipelineError::Device(format!("failed to set play state {:?}", state))
        })?;
        let _serial = self.line.serial.lock();
        *self.line.state.lock() = state;
        Ok(())
    }
}

impl Drop for VirtualPlayer {
    fn drop(&mut self) {
        let mut slot = self.device.playback.lock();
        if slot.as_ref().is_some_and(|line| Arc::ptr_eq(line, &self.line)) {
            *slot = None;
        }
        self.line.callback.lock().take();
        self.device.shared.open_players.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Background thread that pumps both lines at a fixed period, standing in
/// for the hardware's buffer-completion interrupts.
pub struct DeviceClock {
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl DeviceClock {
    pub fn start(device: Arc<VirtualDevice>, period: Duration) -> Result<Self, PipelineError> {
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name("virtual-audio-clock".into())
            .spawn(move || {
                while thread_running.load(Ordering::SeqCst) {
                    thread::sleep(period);
                    device.complete_capture_buffer();
                    device.complete_playback_chunk();
                }
            })
            .map_err(|e| PipelineError::Init(format!("failed to spawn clock thread: {}", e)))?;

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for DeviceClock {
    fn drop(&mut self) {
        self.stop();
    }
}
