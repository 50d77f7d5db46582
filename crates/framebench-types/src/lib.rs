//! Shared types for the framebench harness.
//!
//! This crate defines the configuration, run state and metrics snapshot
//! types passed between the frame cache, write queue and benchmark engine.

mod cancel;
mod config;
mod error;
mod metrics;
mod state;

pub use cancel::CancelToken;
pub use config::{BenchConfig, CacheConfig, EncoderSettings};
pub use error::ConfigError;
pub use metrics::{PerfSnapshot, TimingSummary};
pub use state::RunState;

/// Result type for configuration validation.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Size in bytes of one planar YUV 4:2:0 frame.
pub fn yuv420_frame_size(width: u32, height: u32) -> usize {
    // Y plane (width * height) + U and V planes (width/2 * height/2 each)
    let y_size = width as usize * height as usize;
    y_size + y_size / 2
}

/// Check that frame dimensions are usable for 4:2:0 subsampling.
pub fn validate_dimensions(width: u32, height: u32) -> ConfigResult<()> {
    if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
        return Err(ConfigError::InvalidDimensions { width, height });
    }
    Ok(())
}
