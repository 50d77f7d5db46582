//! Metrics snapshot types reported during and after a run.

use serde::{Deserialize, Serialize};

/// Aggregate of one per-frame timing series, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingSummary {
    /// Sum over all recorded frames.
    pub total_ms: f64,

    /// Mean per frame.
    pub avg_ms: f64,

    /// Slowest single frame.
    pub max_ms: f64,
}

/// Cumulative run metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerfSnapshot {
    /// Frames that completed the copy/encode/write round trip.
    pub frames: u64,

    /// Encoded payload bytes handed to the write queue.
    pub bytes: u64,

    /// Wall-clock seconds since the encode loop started.
    pub elapsed_secs: f64,

    /// Frames per second of wall-clock time.
    pub fps: f64,

    /// Output bitrate in kbps at the nominal frame rate.
    pub bitrate_kbps: f64,

    /// Time spent copying frames out of the cache.
    pub copy: TimingSummary,

    /// Time spent inside the encoder.
    pub encode: TimingSummary,

    /// Time spent handing packets to the write queue, including backpressure waits.
    pub push: TimingSummary,

    /// Time the writer thread spent inside the sink, averaged over frames.
    /// `max_ms` is the slowest single sink write.
    pub write: TimingSummary,

    /// Encode loop round trip per frame: copy, encode and push.
    pub frame: TimingSummary,
}
