use std::ops::Range;
use std::sync::Arc;

use crate::models::config::PcmFormat;
use crate::models::error::PipelineError;

/// A hardware buffer queue.
///
/// Accepts buffers for the device to fill (capture) or drain (playback).
/// Each accepted buffer produces exactly one completion callback once the
/// device is done with it.
pub trait SampleQueue<B>: Send + Sync {
    /// Submit a buffer. Must not block on device I/O.
    fn enqueue(&self, buffer: B) -> Result<(), PipelineError>;
}

/// Completion callback for a capture queue.
///
/// Receives the queue (for resubmission) and the filled buffer, whose
/// ownership returns to the engine until it is enqueued again.
/// Fires on the device's callback thread, never concurrently with itself
/// for the same queue.
pub type CaptureCallback =
    Arc<dyn Fn(&dyn SampleQueue<Box<[i16]>>, Box<[i16]>) + Send + Sync + 'static>;

/// Completion callback for a playback queue, fired each time the device
/// finishes playing a submitted chunk.
pub type PlaybackCallback = Arc<dyn Fn(&dyn SampleQueue<SampleChunk>) + Send + Sync + 'static>;

/// A borrowed window of an immutable sample store, submitted for playback
/// without copying.
#[derive(Debug, Clone)]
pub struct SampleChunk {
    store: Arc<[i16]>,
    range: Range<usize>,
}

impl SampleChunk {
    /// Panics if `range` is out of bounds for `store`.
    pub fn new(store: Arc<[i16]>, range: Range<usize>) -> Self {
        assert!(range.start <= range.end && range.end <= store.len());
        Self { store, range }
    }

    pub fn samples(&self) -> &[i16] {
        &self.store[self.range.clone()]
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Offset of the first sample within the store.
    pub fn offset(&self) -> usize {
        self.range.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Stopped,
    Recording,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Stopped,
    Playing,
}

/// Entry point of a platform audio subsystem.
pub trait AudioBackend: Send + Sync {
    type Session: EngineSession;

    /// Create, realize, and query the subsystem engine.
    ///
    /// Failures map to `PipelineError::Init`.
    fn create_session(&self) -> Result<Self::Session, PipelineError>;
}

/// A realized subsystem session. Dropping it destroys the session.
///
/// Objects created from a session must not outlive their use by the engine;
/// the engines always drop them before the session.
pub trait EngineSession: Send {
    type Recorder: RecorderObject;
    type Player: PlayerObject;

    /// Build an input-device source and a queue sink at `format`, then
    /// create and realize the recorder. Failures map to `PipelineError::Config`.
    fn create_recorder(&mut self, format: &PcmFormat) -> Result<Self::Recorder, PipelineError>;

    /// Create and realize an output mix, then a queue-fed player bound to it.
    /// The output mix is released together with the player.
    fn create_player(&mut self, format: &PcmFormat) -> Result<Self::Player, PipelineError>;
}

/// A realized capture object with its record and queue interfaces.
/// Dropping it destroys the object.
pub trait RecorderObject: SampleQueue<Box<[i16]>> {
    fn register_callback(&mut self, callback: CaptureCallback) -> Result<(), PipelineError>;

    fn set_record_state(&mut self, state: RecordState) -> Result<(), PipelineError>;
}

/// A realized playback object with its play and queue interfaces.
/// Dropping it destroys the object and its output mix.
pub trait PlayerObject: SampleQueue<SampleChunk> {
    fn register_callback(&mut self, callback: PlaybackCallback) -> Result<(), PipelineError>;

    fn set_play_state(&mut self, state: PlayState) -> Result<(), PipelineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_views_store_window() {
        let store: Arc<[i16]> = Arc::from(vec![1i16, 2, 3, 4, 5]);
        let chunk = SampleChunk::new(Arc::clone(&store), 1..4);

        assert_eq!(chunk.samples(), &[2, 3, 4]);
        assert_eq!(chunk.len(), 3);
        assert_eq!(chunk.offset(), 1);
        assert!(!chunk.is_empty());
    }

    #[test]
    #[should_panic]
    fn chunk_out_of_bounds_panics() {
        let store: Arc<[i16]> = Arc::from(vec![1i16, 2]);
        let _ = SampleChunk::new(store, 0..3);
    }
}
