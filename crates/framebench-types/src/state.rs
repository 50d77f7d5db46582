//! Benchmark run state machine types.

use serde::{Deserialize, Serialize};

/// The current state of a benchmark run.
///
/// A run moves `Idle -> Initializing -> Running -> Draining -> Completed`,
/// and may enter `Failed` from any non-idle state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum RunState {
    /// No run in progress.
    #[default]
    Idle,

    /// Frame cache is being populated.
    Initializing,

    /// Frames are being fed to the encoder.
    Running {
        /// Frames submitted so far.
        frames_encoded: u64,
    },

    /// Encoder is flushing and the write queue is draining.
    Draining,

    /// Run finished and results are available.
    Completed,

    /// Run aborted.
    Failed {
        /// Error message.
        message: String,
    },
}

impl RunState {
    /// Returns true if no run is active.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns true while frames are being encoded.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    /// Returns true if the run has failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Returns true once the run can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed { .. })
    }

    /// Returns a simple string representation of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Initializing => "Initializing",
            Self::Running { .. } => "Running",
            Self::Draining => "Draining",
            Self::Completed => "Completed",
            Self::Failed { .. } => "Failed",
        }
    }
}
