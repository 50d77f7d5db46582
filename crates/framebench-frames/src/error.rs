//! Error types for the frame cache.

use std::path::PathBuf;

use framebench_types::ConfigError;
use thiserror::Error;

/// Errors that can occur while generating or reading cached frames.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Configuration rejected before generation started.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Disk cache directory could not be created.
    #[error("Failed to create cache directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A generation worker failed to persist a frame.
    #[error("Failed to write frame {index} to {}: {source}", path.display())]
    WriteFrame {
        index: usize,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A cached frame file could not be read back.
    #[error("Failed to read frame {index} from {}: {source}", path.display())]
    ReadFrame {
        index: usize,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Requested frame is outside the generated range.
    #[error("Frame index {index} out of range (total {total})")]
    IndexOutOfRange { index: usize, total: usize },

    /// A frame slot was left empty after generation.
    #[error("Frame {index} was not generated")]
    MissingFrame { index: usize },

    /// Cache has not been initialized.
    #[error("Frame cache not initialized")]
    NotInitialized,

    /// Generation stopped by a cancellation request.
    #[error("Frame generation cancelled")]
    Cancelled,

    /// A generation worker could not be spawned.
    #[error("Failed to spawn generation worker: {0}")]
    SpawnFailed(#[source] std::io::Error),
}
