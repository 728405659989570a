//! # pcm-pipeline-core
//!
//! Mono 16-bit PCM capture and playback over a callback-driven audio
//! subsystem.
//!
//! The capture engine accumulates fixed-size buffers delivered by the
//! recorder and persists them as a WAV file on stop. The playback engine
//! loads a WAV file into memory and streams it back in fixed-size chunks,
//! detecting end of stream one callback after the final chunk.
//!
//! Engines talk to the hardware only through the `AudioBackend` seam. The
//! bundled `VirtualBackend` is a software device that tests and the CLI pump
//! by hand or with a `DeviceClock`.
//!
//! ## Architecture
//!
//! ```text
//! pcm-pipeline-core (this crate)
//! ├── traits/       ← AudioBackend, EngineSession, RecorderObject, PlayerObject, SampleQueue
//! ├── models/       ← PipelineError, EngineState, EngineConfig, PcmFormat, diagnostics
//! ├── processing/   ← WAV header generation and parsing
//! ├── engine/       ← CaptureEngine, PlaybackEngine
//! ├── backend/      ← VirtualBackend, DeviceClock
//! ├── control       ← CaptureHandle, PlaybackHandle
//! └── storage/      ← RecordingLibrary, metadata sidecars
//! ```

pub mod backend;
pub mod control;
pub mod engine;
pub mod models;
pub mod processing;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use backend::virtual_device::{DeviceClock, Fault, SignalSource, VirtualBackend, VirtualDevice};
pub use control::{CaptureHandle, PlaybackHandle};
pub use engine::capture::{CaptureEngine, CapturedRecording};
pub use engine::playback::PlaybackEngine;
pub use models::config::{EngineConfig, PcmFormat, BUFFER_SIZE};
pub use models::diagnostics::EngineDiagnostics;
pub use models::error::PipelineError;
pub use models::recording::RecordingMetadata;
pub use models::state::EngineState;
pub use storage::library::{format_duration, RecordingLibrary};
pub use traits::audio_backend::{AudioBackend, EngineSession, PlayerObject, RecorderObject, SampleChunk, SampleQueue};
