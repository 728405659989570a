use thiserror::Error;

/// Errors that can occur during capture, playback, and waveform I/O.
///
/// None of these cross the control surface: `CaptureHandle` and
/// `PlaybackHandle` log them and collapse them to `false`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The audio subsystem could not be created, realized, or queried.
    #[error("subsystem initialization failed: {0}")]
    Init(String),

    /// A data source/sink or recorder/player object could not be built.
    #[error("configuration failed: {0}")]
    Config(String),

    /// A hardware state transition or buffer submission failed.
    #[error("device error: {0}")]
    Device(String),

    #[error("failed to open {0}")]
    FileOpen(String),

    #[error("no samples in {0}")]
    EmptyFile(String),

    #[error("i/o error: {0}")]
    Io(String),

    #[error("invalid waveform: {0}")]
    InvalidFormat(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("session already active")]
    AlreadyActive,

    #[error("no active session")]
    NotActive,

    #[error("engine not initialized")]
    NotInitialized,

    #[error("engine already initialized")]
    AlreadyInitialized,
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
