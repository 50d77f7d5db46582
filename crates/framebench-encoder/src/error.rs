//! Error types for the encoder module.

use thiserror::Error;

/// Errors that can occur during encoding operations.
#[derive(Debug, Error)]
pub enum EncoderError {
    /// General initialization error.
    #[error("Initialization failed: {0}")]
    Initialization(String),

    /// General encoding error.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Invalid input data.
    #[error("Invalid input data: {0}")]
    InvalidInput(String),

    /// Frame submitted after end-of-stream was signalled.
    #[error("Encoder already flushed")]
    AlreadyFlushed,

    /// Encoder used after close.
    #[error("Encoder closed")]
    Closed,
}
