//! Parallel frame pre-generation with optional disk spill.

use std::fs::{self, File};
use std::io::Read;
use std::num::NonZeroUsize;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, instrument, trace, warn};

use framebench_types::{CacheConfig, CancelToken};

use crate::error::CacheError;
use crate::frame::{Frame, FrameSource, SyntheticPattern};
use crate::partition::partition;
use crate::progress::{ProgressCallback, ProgressGate};
use crate::{frame_file_path, CacheResult};

/// Snapshot of generation progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationStatus {
    /// Frames stored so far.
    pub completed_frames: usize,

    /// Frames in the run.
    pub total_frames: usize,

    /// Last fraction handed to the progress callback.
    pub last_reported_progress: f64,

    /// Whether workers are currently running.
    pub generating: bool,
}

/// Where generated frames live.
enum Backing {
    Memory(Vec<Bytes>),
    Disk {
        dir: PathBuf,
        /// Topmost directory this cache had to create, if any.
        created_root: Option<PathBuf>,
    },
}

/// A fully generated run of frames.
struct FrameStore {
    config: CacheConfig,
    backing: Backing,
}

/// Pre-generated frames for one benchmark run.
///
/// Frames are produced by a pool of worker threads before the timed encode
/// loop starts and can then be read concurrently from any thread.
///
/// Retrieval never shares scratch state: [`FrameCache::get_frame`] returns an
/// owned [`Frame`] (a reference-counted view in memory mode, a fresh buffer in
/// disk mode) and [`FrameCache::read_frame_into`] fills a buffer the caller owns.
pub struct FrameCache {
    source: Arc<dyn FrameSource>,
    progress_callback: Option<ProgressCallback>,
    cancel: CancelToken,
    init_lock: Mutex<()>,
    gate: RwLock<Option<Arc<ProgressGate>>>,
    store: RwLock<Option<FrameStore>>,
}

impl FrameCache {
    /// Create a cache backed by the given frame source.
    pub fn new(source: Arc<dyn FrameSource>) -> Self {
        Self {
            source,
            progress_callback: None,
            cancel: CancelToken::new(),
            init_lock: Mutex::new(()),
            gate: RwLock::new(None),
            store: RwLock::new(None),
        }
    }

    /// Create a cache producing [`SyntheticPattern`] frames.
    pub fn synthetic() -> Self {
        Self::new(Arc::new(SyntheticPattern))
    }

    /// Register a callback for generation progress in `(0, 1]`.
    pub fn set_progress_callback<F>(&mut self, callback: F)
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
    }

    /// Share a run-level cancellation token with the generation workers.
    pub fn set_cancel_token(&mut self, cancel: CancelToken) {
        self.cancel = cancel;
    }

    /// Generate every frame described by `config`.
    ///
    /// Blocks until all workers have finished. Returns immediately if the
    /// cache already holds frames for an identical configuration.
    #[instrument(name = "frame_cache_init", skip(self, config), fields(
        width = config.width,
        height = config.height,
        frames = config.total_frame_count,
        disk = config.use_disk_cache,
    ))]
    pub fn initialize(&self, config: &CacheConfig) -> CacheResult<()> {
        let _init = self.init_lock.lock();

        if let Some(ref store) = *self.store.read() {
            if store.config == *config {
                debug!("Frame cache already initialized for this configuration");
                return Ok(());
            }
        }

        config.validate()?;

        // Release frames from a previous configuration first
        self.reset();

        let available = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        let workers = config.resolve_worker_count(available);
        let ranges = partition(config.total_frame_count, workers);

        let gate = Arc::new(ProgressGate::new(
            config.total_frame_count,
            self.progress_callback.clone(),
        ));
        *self.gate.write() = Some(Arc::clone(&gate));

        info!(
            workers = ranges.len(),
            frame_size = config.frame_size(),
            "Generating frames"
        );

        let start = Instant::now();
        gate.set_generating(true);
        let result = if config.use_disk_cache {
            self.generate_to_disk(config, &ranges, &gate)
        } else {
            self.generate_to_memory(config, &ranges, &gate)
        };
        gate.set_generating(false);

        let backing = result?;
        *self.store.write() = Some(FrameStore {
            config: config.clone(),
            backing,
        });

        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Frame generation complete"
        );
        Ok(())
    }

    fn generate_to_memory(
        &self,
        config: &CacheConfig,
        ranges: &[Range<usize>],
        gate: &ProgressGate,
    ) -> CacheResult<Backing> {
        let mut slots: Vec<Option<Bytes>> = vec![None; config.total_frame_count];
        let ctx = WorkerContext::new(self.source.as_ref(), config, gate, &self.cancel);

        thread::scope(|scope| {
            let mut rest: &mut [Option<Bytes>] = &mut slots;
            for (worker, range) in ranges.iter().enumerate() {
                let (mine, tail) = std::mem::take(&mut rest).split_at_mut(range.len());
                rest = tail;

                let ctx = &ctx;
                let range = range.clone();
                let spawned = thread::Builder::new()
                    .name(format!("framegen-{worker}"))
                    .spawn_scoped(scope, move || {
                        let first = range.start;
                        ctx.run(worker, range, |index, buf| {
                            mine[index - first] = Some(Bytes::from(std::mem::take(buf)));
                            Ok(())
                        });
                    });

                if let Err(e) = spawned {
                    ctx.record_error(CacheError::SpawnFailed(e));
                    self.cancel_workers_after_spawn_failure();
                    break;
                }
            }
        });

        ctx.finish()?;

        let frames = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| slot.ok_or(CacheError::MissingFrame { index }))
            .collect::<CacheResult<Vec<_>>>()?;

        Ok(Backing::Memory(frames))
    }

    fn generate_to_disk(
        &self,
        config: &CacheConfig,
        ranges: &[Range<usize>],
        gate: &ProgressGate,
    ) -> CacheResult<Backing> {
        let dir = config.cache_dir.clone();
        let created_root = first_missing_ancestor(&dir);
        fs::create_dir_all(&dir).map_err(|source| CacheError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        debug!(
            dir = %dir.display(),
            created = created_root.is_some(),
            "Disk cache directory ready"
        );

        let written: Vec<AtomicBool> = (0..config.total_frame_count)
            .map(|_| AtomicBool::new(false))
            .collect();
        let ctx = WorkerContext::new(self.source.as_ref(), config, gate, &self.cancel);

        thread::scope(|scope| {
            for (worker, range) in ranges.iter().enumerate() {
                let ctx = &ctx;
                let dir = dir.as_path();
                let written = &written;
                let range = range.clone();
                let spawned = thread::Builder::new()
                    .name(format!("framegen-{worker}"))
                    .spawn_scoped(scope, move || {
                        ctx.run(worker, range, |index, buf| {
                            let path = frame_file_path(dir, index);
                            fs::write(&path, buf.as_slice()).map_err(|source| {
                                CacheError::WriteFrame {
                                    index,
                                    path,
                                    source,
                                }
                            })?;
                            written[index].store(true, Ordering::Relaxed);
                            Ok(())
                        });
                    });

                if let Err(e) = spawned {
                    ctx.record_error(CacheError::SpawnFailed(e));
                    self.cancel_workers_after_spawn_failure();
                    break;
                }
            }
        });

        if let Err(e) = ctx.finish() {
            // A failed pass is never served, so nothing it wrote is kept
            let partial = written
                .iter()
                .enumerate()
                .filter(|(_, done)| done.load(Ordering::Relaxed))
                .map(|(index, _)| index);
            let removed = remove_disk_frames(&dir, partial, created_root.as_deref());
            debug!(removed, "Partial disk cache removed");
            return Err(e);
        }

        Ok(Backing::Disk { dir, created_root })
    }

    fn cancel_workers_after_spawn_failure(&self) {
        warn!("Worker spawn failed, stopping generation");
        self.cancel.cancel();
    }

    /// Retrieve frame `index` as an owned frame.
    pub fn get_frame(&self, index: usize) -> CacheResult<Frame> {
        let store = self.store.read();
        let store = store.as_ref().ok_or(CacheError::NotInitialized)?;
        store.check_index(index)?;

        let data = match store.backing {
            Backing::Memory(ref frames) => frames[index].clone(),
            Backing::Disk { ref dir, .. } => {
                let mut buf = Vec::with_capacity(store.config.frame_size());
                read_frame_file(dir, index, store.config.frame_size(), &mut buf)?;
                Bytes::from(buf)
            }
        };

        Ok(Frame::new(
            index,
            store.config.width,
            store.config.height,
            data,
        ))
    }

    /// Copy frame `index` into a caller-owned buffer, replacing its contents.
    pub fn read_frame_into(&self, index: usize, buf: &mut Vec<u8>) -> CacheResult<()> {
        let store = self.store.read();
        let store = store.as_ref().ok_or(CacheError::NotInitialized)?;
        store.check_index(index)?;

        match store.backing {
            Backing::Memory(ref frames) => {
                buf.clear();
                buf.extend_from_slice(&frames[index]);
                Ok(())
            }
            Backing::Disk { ref dir, .. } => {
                read_frame_file(dir, index, store.config.frame_size(), buf)
            }
        }
    }

    /// Whether frames are available for retrieval.
    pub fn is_ready(&self) -> bool {
        self.store.read().is_some()
    }

    /// Configuration of the currently generated frames.
    pub fn config(&self) -> Option<CacheConfig> {
        self.store.read().as_ref().map(|store| store.config.clone())
    }

    /// Progress of the most recent generation pass.
    pub fn generation_status(&self) -> Option<GenerationStatus> {
        self.gate.read().as_ref().map(|gate| GenerationStatus {
            completed_frames: gate.completed(),
            total_frames: gate.total(),
            last_reported_progress: gate.last_reported(),
            generating: gate.is_generating(),
        })
    }

    /// Release all generated frames, deleting cache files written by this cache.
    ///
    /// Directories the cache created are removed too, up to the topmost one,
    /// as long as they are empty. A failed generation pass cleans up after
    /// itself before `initialize` returns.
    pub fn reset(&self) {
        let Some(store) = self.store.write().take() else {
            return;
        };

        if let Backing::Disk { dir, created_root } = store.backing {
            let removed = remove_disk_frames(
                &dir,
                0..store.config.total_frame_count,
                created_root.as_deref(),
            );
            debug!(removed, "Disk cache cleared");
        } else {
            debug!("Memory cache cleared");
        }
    }
}

impl Default for FrameCache {
    fn default() -> Self {
        Self::synthetic()
    }
}

impl Drop for FrameCache {
    fn drop(&mut self) {
        self.reset();
    }
}

impl FrameStore {
    fn check_index(&self, index: usize) -> CacheResult<()> {
        let total = self.config.total_frame_count;
        if index >= total {
            return Err(CacheError::IndexOutOfRange { index, total });
        }
        Ok(())
    }
}

fn read_frame_file(dir: &Path, index: usize, frame_size: usize, buf: &mut Vec<u8>) -> CacheResult<()> {
    let path = frame_file_path(dir, index);
    let read = File::open(&path).and_then(|mut file| {
        buf.resize(frame_size, 0);
        file.read_exact(buf)
    });
    read.map_err(|source| CacheError::ReadFrame {
        index,
        path,
        source,
    })
}

/// Topmost directory on the way to `dir` that does not exist yet.
fn first_missing_ancestor(dir: &Path) -> Option<PathBuf> {
    dir.ancestors()
        .take_while(|path| !path.as_os_str().is_empty() && !path.exists())
        .last()
        .map(Path::to_path_buf)
}

/// Delete the given frame files, then the directories up to `created_root`.
fn remove_disk_frames(
    dir: &Path,
    indices: impl IntoIterator<Item = usize>,
    created_root: Option<&Path>,
) -> usize {
    let mut removed = 0usize;
    for index in indices {
        let path = frame_file_path(dir, index);
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %path.display(), "Failed to remove cached frame: {}", e),
        }
    }

    if let Some(root) = created_root {
        for created in dir.ancestors() {
            if let Err(e) = fs::remove_dir(created) {
                debug!(dir = %created.display(), "Cache directory left in place: {}", e);
                break;
            }
            if created == root {
                break;
            }
        }
    }

    removed
}

/// State shared by the workers of one generation pass.
struct WorkerContext<'a> {
    source: &'a dyn FrameSource,
    width: u32,
    height: u32,
    frame_size: usize,
    gate: &'a ProgressGate,
    cancel: &'a CancelToken,
    first_error: Mutex<Option<CacheError>>,
}

impl<'a> WorkerContext<'a> {
    fn new(
        source: &'a dyn FrameSource,
        config: &CacheConfig,
        gate: &'a ProgressGate,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            source,
            width: config.width,
            height: config.height,
            frame_size: config.frame_size(),
            gate,
            cancel,
            first_error: Mutex::new(None),
        }
    }

    /// Generate and store every frame in `range`.
    ///
    /// Stops early on cancellation or when this worker's own store fails;
    /// failures elsewhere do not interrupt it.
    fn run<F>(&self, worker: usize, range: Range<usize>, mut store: F)
    where
        F: FnMut(usize, &mut Vec<u8>) -> CacheResult<()>,
    {
        trace!(worker, start = range.start, end = range.end, "Worker starting");

        let mut buf = Vec::with_capacity(self.frame_size);
        let mut generated = 0usize;
        for index in range {
            if self.cancel.is_cancelled() {
                debug!(worker, index, "Worker cancelled");
                return;
            }

            buf.resize(self.frame_size, 0);
            self.source.fill(self.width, self.height, index, &mut buf);

            if let Err(e) = store(index, &mut buf) {
                warn!(worker, index, "Frame store failed: {}", e);
                self.record_error(e);
                return;
            }

            self.gate.record_completed();
            generated += 1;
        }

        trace!(worker, generated, "Worker finished");
    }

    /// Keep the first error reported by any worker.
    fn record_error(&self, error: CacheError) {
        let mut slot = self.first_error.lock();
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    /// Surface the first worker error, or cancellation if frames are missing.
    fn finish(self) -> CacheResult<()> {
        if let Some(e) = self.first_error.into_inner() {
            return Err(e);
        }
        if self.gate.completed() < self.gate.total() {
            if self.cancel.is_cancelled() {
                info!(
                    completed = self.gate.completed(),
                    total = self.gate.total(),
                    "Frame generation cancelled"
                );
                return Err(CacheError::Cancelled);
            }
            return Err(CacheError::MissingFrame {
                index: self.gate.completed(),
            });
        }
        Ok(())
    }
}
