//! Error types for the sink module.

use framebench_types::ConfigError;
use thiserror::Error;

/// Errors that can occur while writing encoded output.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Queue configuration rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Sink refused a packet.
    #[error("Sink write failed: {0}")]
    WriteFailed(String),

    /// Packet pushed after the queue was stopped.
    #[error("Write queue closed")]
    QueueClosed,

    /// Writer thread could not be started.
    #[error("Failed to spawn writer thread: {0}")]
    SpawnFailed(#[source] std::io::Error),

    /// Writer thread panicked.
    #[error("Writer thread panicked")]
    WriterPanicked,
}
