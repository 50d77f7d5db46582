//! Error types for the engine.

use framebench_encoder::EncoderError;
use framebench_frames::CacheError;
use framebench_sink::SinkError;
use framebench_types::ConfigError;
use thiserror::Error;

/// Errors that end a benchmark run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration rejected before any thread started.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Frame cache could not be populated or read.
    #[error("Frame cache error: {0}")]
    Cache(#[from] CacheError),

    /// Encoder rejected a frame.
    #[error("Encoder failed on frame {index}: {source}")]
    Encode {
        index: usize,
        #[source]
        source: EncoderError,
    },

    /// Encoder failed while draining buffered frames.
    #[error("Encoder flush failed: {0}")]
    Flush(#[source] EncoderError),

    /// Write queue failure.
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
}

impl EngineError {
    /// Whether the run ended because of a cancellation request.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cache(CacheError::Cancelled))
    }
}
