//! Benchmark and frame cache configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{validate_dimensions, yuv420_frame_size, ConfigError, ConfigResult};

/// Default worker multiplier for in-memory generation.
pub const DEFAULT_MEMORY_THREAD_MULTIPLIER: usize = 4;

/// Default worker multiplier for disk-backed generation.
pub const DEFAULT_DISK_THREAD_MULTIPLIER: usize = 1;

/// Default capacity of the packet write queue.
pub const DEFAULT_WRITE_QUEUE_CAPACITY: usize = 8;

/// Frame cache configuration, fixed for the lifetime of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Number of frames to pre-generate.
    pub total_frame_count: usize,

    /// Spill frames to per-index files instead of holding them in memory.
    pub use_disk_cache: bool,

    /// Directory holding `frame_<index>.yuv` files in disk mode.
    pub cache_dir: PathBuf,

    /// Explicit generation worker count (None uses the multipliers below).
    pub worker_threads: Option<usize>,

    /// Workers per hardware thread when generating into memory.
    pub memory_thread_multiplier: usize,

    /// Workers per hardware thread when generating onto disk.
    pub disk_thread_multiplier: usize,
}

impl CacheConfig {
    /// Create an in-memory cache configuration.
    pub fn in_memory(width: u32, height: u32, total_frame_count: usize) -> Self {
        Self {
            width,
            height,
            total_frame_count,
            ..Default::default()
        }
    }

    /// Create a disk-backed cache configuration.
    pub fn on_disk(
        width: u32,
        height: u32,
        total_frame_count: usize,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            width,
            height,
            total_frame_count,
            use_disk_cache: true,
            cache_dir: cache_dir.into(),
            ..Default::default()
        }
    }

    /// Set an explicit worker count.
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }

    /// Size in bytes of every frame in this run.
    pub fn frame_size(&self) -> usize {
        yuv420_frame_size(self.width, self.height)
    }

    /// Validate dimensions, frame count and worker override.
    pub fn validate(&self) -> ConfigResult<()> {
        validate_dimensions(self.width, self.height)?;
        if self.total_frame_count == 0 {
            return Err(ConfigError::ZeroFrameCount);
        }
        if self.worker_threads == Some(0) {
            return Err(ConfigError::ZeroWorkerThreads);
        }
        Ok(())
    }

    /// Number of generation workers to spawn given the available hardware parallelism.
    ///
    /// Always within `[1, total_frame_count]`.
    pub fn resolve_worker_count(&self, available_parallelism: usize) -> usize {
        let requested = self.worker_threads.unwrap_or_else(|| {
            let multiplier = if self.use_disk_cache {
                self.disk_thread_multiplier
            } else {
                self.memory_thread_multiplier
            };
            available_parallelism.saturating_mul(multiplier)
        });
        requested.clamp(1, self.total_frame_count.max(1))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            total_frame_count: 300,
            use_disk_cache: false,
            cache_dir: std::env::temp_dir().join("framebench-cache"),
            worker_threads: None,
            memory_thread_multiplier: DEFAULT_MEMORY_THREAD_MULTIPLIER,
            disk_thread_multiplier: DEFAULT_DISK_THREAD_MULTIPLIER,
        }
    }
}

/// Settings handed to the encoder under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderSettings {
    /// Target bitrate in kbps.
    pub bitrate_kbps: u32,

    /// Distance between keyframes, in frames.
    pub keyframe_interval: u32,

    /// Frames the encoder may hold before emitting output (B-frame lookahead).
    pub lookahead: u32,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            bitrate_kbps: 6000,
            keyframe_interval: 60,
            lookahead: 2,
        }
    }
}

/// Configuration for one benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Number of frames to encode.
    pub frame_count: usize,

    /// Nominal frame rate, used to derive the output bitrate.
    pub fps: u32,

    /// Pre-generate frames to disk rather than memory.
    pub use_disk_cache: bool,

    /// Location of the disk cache.
    pub cache_dir: PathBuf,

    /// Explicit generation worker count.
    pub worker_threads: Option<usize>,

    /// Workers per hardware thread when generating into memory.
    pub memory_thread_multiplier: usize,

    /// Workers per hardware thread when generating onto disk.
    pub disk_thread_multiplier: usize,

    /// Maximum number of encoded packets waiting for the writer.
    pub write_queue_capacity: usize,

    /// Invoke the progress callback every this many frames (and on the last one).
    pub reporting_stride: usize,

    /// Encoder settings.
    pub encoder: EncoderSettings,
}

impl BenchConfig {
    /// Validate the whole configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        self.cache_config().validate()?;
        if self.fps == 0 {
            return Err(ConfigError::ZeroFrameRate);
        }
        if self.write_queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.reporting_stride == 0 {
            return Err(ConfigError::ZeroReportingStride);
        }
        Ok(())
    }

    /// Derive the frame cache configuration for this run.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            width: self.width,
            height: self.height,
            total_frame_count: self.frame_count,
            use_disk_cache: self.use_disk_cache,
            cache_dir: self.cache_dir.clone(),
            worker_threads: self.worker_threads,
            memory_thread_multiplier: self.memory_thread_multiplier,
            disk_thread_multiplier: self.disk_thread_multiplier,
        }
    }

    /// Size in bytes of every frame in this run.
    pub fn frame_size(&self) -> usize {
        yuv420_frame_size(self.width, self.height)
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        let cache = CacheConfig::default();
        Self {
            width: cache.width,
            height: cache.height,
            frame_count: cache.total_frame_count,
            fps: 60,
            use_disk_cache: cache.use_disk_cache,
            cache_dir: cache.cache_dir,
            worker_threads: cache.worker_threads,
            memory_thread_multiplier: cache.memory_thread_multiplier,
            disk_thread_multiplier: cache.disk_thread_multiplier,
            write_queue_capacity: DEFAULT_WRITE_QUEUE_CAPACITY,
            reporting_stride: 30,
            encoder: EncoderSettings::default(),
        }
    }
}
