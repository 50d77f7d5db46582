//! Synthetic frame supply for encoder benchmarks.
//!
//! This crate produces deterministic planar YUV 4:2:0 frames and
//! pre-generates a whole run's worth of them across worker threads,
//! either into memory or onto per-frame files on disk.

mod cache;
mod error;
mod frame;
mod partition;
mod progress;

pub use cache::{FrameCache, GenerationStatus};
pub use error::CacheError;
pub use frame::{Frame, FrameSource, SyntheticPattern};
pub use partition::partition;
pub use progress::ProgressCallback;

use std::path::{Path, PathBuf};

/// Result type for frame cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Path of the cache file holding frame `index`.
pub fn frame_file_path(cache_dir: &Path, index: usize) -> PathBuf {
    cache_dir.join(format!("frame_{index}.yuv"))
}
