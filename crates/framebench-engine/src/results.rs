//! Final benchmark results.

use serde::{Deserialize, Serialize};

use framebench_sink::WriteReport;
use framebench_types::{PerfSnapshot, RunState};

/// Everything reported at the end of a run, including failed ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResults {
    /// Terminal run state.
    pub state: RunState,

    /// Error that ended the run, if any.
    pub failure: Option<String>,

    /// Run stopped early by a cancellation request.
    pub cancelled: bool,

    /// The sink failed; packets after the failure were discarded.
    pub write_failed: bool,

    /// Encoder name.
    pub encoder: String,

    /// Frames the run was configured for.
    pub frames_requested: usize,

    /// Frames that completed the encode round trip.
    pub frames_encoded: u64,

    /// Time spent pre-generating frames.
    pub generation_secs: f64,

    /// Wall-clock time from the first frame until the writer drained.
    pub encode_secs: f64,

    /// Frames per second over `encode_secs`.
    pub fps: f64,

    /// Output bitrate in kbps at the nominal frame rate.
    pub bitrate_kbps: f64,

    /// Per-frame timing aggregates.
    pub metrics: PerfSnapshot,

    /// Writer thread statistics.
    pub write: WriteReport,
}

impl BenchmarkResults {
    /// Whether every requested frame was encoded and written.
    pub fn is_success(&self) -> bool {
        matches!(self.state, RunState::Completed) && !self.cancelled && !self.write_failed
    }
}
