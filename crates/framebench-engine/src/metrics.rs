//! Online per-frame timing statistics.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use framebench_sink::WriteObserver;
use framebench_types::{PerfSnapshot, TimingSummary};

/// Running sum and maximum of one timing series.
#[derive(Debug, Clone, Copy, Default)]
struct RunningTiming {
    total: Duration,
    max: Duration,
}

impl RunningTiming {
    fn record(&mut self, sample: Duration) {
        self.total += sample;
        self.max = self.max.max(sample);
    }

    fn summary(&self, frames: u64) -> TimingSummary {
        let total_ms = duration_ms(self.total);
        TimingSummary {
            total_ms,
            avg_ms: if frames > 0 {
                total_ms / frames as f64
            } else {
                0.0
            },
            max_ms: duration_ms(self.max),
        }
    }
}

fn duration_ms(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1e6
}

/// Accumulates per-frame copy, encode, push and sink write timings.
///
/// Only sums and maxima are kept, so memory use does not grow with the
/// number of frames. Owned by the encode loop thread; sink write times
/// arrive from the writer thread through [`MetricsAccumulator::write_observer`].
#[derive(Debug, Clone)]
pub struct MetricsAccumulator {
    nominal_fps: u32,
    started: Option<Instant>,
    frames: u64,
    bytes: u64,
    copy: RunningTiming,
    encode: RunningTiming,
    push: RunningTiming,
    frame: RunningTiming,
    write: Arc<Mutex<RunningTiming>>,
}

impl MetricsAccumulator {
    /// Create an accumulator. `nominal_fps` converts output size into bitrate.
    pub fn new(nominal_fps: u32) -> Self {
        Self {
            nominal_fps,
            started: None,
            frames: 0,
            bytes: 0,
            copy: RunningTiming::default(),
            encode: RunningTiming::default(),
            push: RunningTiming::default(),
            frame: RunningTiming::default(),
            write: Arc::new(Mutex::new(RunningTiming::default())),
        }
    }

    /// Start the wall clock used for fps.
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Record one frame's round trip through the encode loop.
    pub fn record(&mut self, copy: Duration, encode: Duration, push: Duration) {
        self.frames += 1;
        self.copy.record(copy);
        self.encode.record(encode);
        self.push.record(push);
        self.frame.record(copy + encode + push);
    }

    /// Handle for the write queue that feeds sink write times back here.
    pub fn write_observer(&self) -> WriteObserver {
        let write = Arc::clone(&self.write);
        Arc::new(move |elapsed| write.lock().record(elapsed))
    }

    /// Count encoded payload bytes.
    pub fn add_bytes(&mut self, bytes: usize) {
        self.bytes += bytes as u64;
    }

    /// Frames recorded so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Wall-clock time since [`MetricsAccumulator::start`].
    pub fn elapsed(&self) -> Duration {
        self.started.map(|s| s.elapsed()).unwrap_or_default()
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> PerfSnapshot {
        self.snapshot_at(self.elapsed())
    }

    /// Snapshot with an explicit elapsed time.
    pub fn snapshot_at(&self, elapsed: Duration) -> PerfSnapshot {
        let elapsed_secs = elapsed.as_secs_f64();
        let fps = if elapsed_secs > 0.0 {
            self.frames as f64 / elapsed_secs
        } else {
            0.0
        };

        // Bitrate at playback speed, independent of how fast we encoded
        let bitrate_kbps = if self.frames > 0 && self.nominal_fps > 0 {
            let media_secs = self.frames as f64 / f64::from(self.nominal_fps);
            (self.bytes * 8) as f64 / media_secs / 1000.0
        } else {
            0.0
        };

        PerfSnapshot {
            frames: self.frames,
            bytes: self.bytes,
            elapsed_secs,
            fps,
            bitrate_kbps,
            copy: self.copy.summary(self.frames),
            encode: self.encode.summary(self.frames),
            push: self.push.summary(self.frames),
            write: self.write.lock().summary(self.frames),
            frame: self.frame.summary(self.frames),
        }
    }
}
