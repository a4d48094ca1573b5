//! Error types for the decoder stage

use thiserror::Error;

/// Errors surfaced by the decoder stage and its collaborators.
///
/// `InitFailed` is sticky: once the codec context fails to initialize, every
/// later `submit` returns a clone of the same error. `DecodeFailed` and
/// `SinkRejected` only concern the unit or frame that triggered them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("failed to initialize codec: {0}")]
    InitFailed(String),

    #[error("failed to decode unit: {0}")]
    DecodeFailed(String),

    #[error("frame sink rejected frame: {0}")]
    SinkRejected(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("paced delivery requires a running tokio runtime")]
    NoRuntime,

    #[error("invalid frame data: {0}")]
    InvalidFrame(String),
}

/// Result type for decoder stage operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the stage can keep processing after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::DecodeFailed(_) | Error::SinkRejected(_))
    }
}
