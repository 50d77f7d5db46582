//! Configuration errors.

use thiserror::Error;

/// Errors raised while validating a run configuration.
///
/// These are always detected before any worker or writer thread starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Width or height is zero or not divisible by two.
    #[error("Invalid frame dimensions {width}x{height}: both must be non-zero and even")]
    InvalidDimensions { width: u32, height: u32 },

    /// The run has no frames.
    #[error("Frame count must be greater than zero")]
    ZeroFrameCount,

    /// Explicit worker override of zero threads.
    #[error("Worker thread count must be greater than zero")]
    ZeroWorkerThreads,

    /// Write queue would never accept a packet.
    #[error("Write queue capacity must be greater than zero")]
    ZeroQueueCapacity,

    /// Progress reporting stride of zero.
    #[error("Reporting stride must be greater than zero")]
    ZeroReportingStride,

    /// Nominal frame rate of zero.
    #[error("Frame rate must be greater than zero")]
    ZeroFrameRate,
}
