//! Generation progress tracking shared by workers.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Callback receiving the completed fraction of a generation pass.
pub type ProgressCallback = Arc<dyn Fn(f64) + Send + Sync>;

/// Completed-frame counter plus a monotonic reporting gate.
///
/// The counter is lock-free; only the "strictly larger than last reported"
/// check and the callback invocation happen under the mutex, so callbacks
/// observe a non-decreasing sequence without duplicates.
pub(crate) struct ProgressGate {
    completed: AtomicUsize,
    total: usize,
    last_reported: Mutex<f64>,
    generating: AtomicBool,
    callback: Option<ProgressCallback>,
}

impl ProgressGate {
    pub(crate) fn new(total: usize, callback: Option<ProgressCallback>) -> Self {
        Self {
            completed: AtomicUsize::new(0),
            total,
            last_reported: Mutex::new(0.0),
            generating: AtomicBool::new(false),
            callback,
        }
    }

    /// Count one stored frame and report progress if it advanced.
    pub(crate) fn record_completed(&self) -> usize {
        let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        let fraction = if self.total == 0 {
            1.0
        } else {
            done as f64 / self.total as f64
        };

        let mut last = self.last_reported.lock();
        if fraction > *last {
            *last = fraction;
            if let Some(ref callback) = self.callback {
                callback(fraction);
            }
        }

        done
    }

    pub(crate) fn set_generating(&self, generating: bool) {
        self.generating.store(generating, Ordering::SeqCst);
    }

    pub(crate) fn is_generating(&self) -> bool {
        self.generating.load(Ordering::SeqCst)
    }

    pub(crate) fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub(crate) fn total(&self) -> usize {
        self.total
    }

    pub(crate) fn last_reported(&self) -> f64 {
        *self.last_reported.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_gate_reports_each_step_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let gate = ProgressGate::new(4, Some(Arc::new(move |f| sink.lock().push(f))));

        for _ in 0..4 {
            gate.record_completed();
        }

        assert_eq!(*seen.lock(), vec![0.25, 0.5, 0.75, 1.0]);
        assert_eq!(gate.completed(), 4);
        assert_eq!(gate.last_reported(), 1.0);
    }

    #[test]
    fn test_gate_is_monotonic_under_contention() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let gate = Arc::new(ProgressGate::new(
            800,
            Some(Arc::new(move |f| sink.lock().push(f))),
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = Arc::clone(&gate);
                thread::spawn(move || {
                    for _ in 0..100 {
                        gate.record_completed();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let seen = seen.lock();
        assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(seen.last().copied(), Some(1.0));
        assert_eq!(gate.completed(), 800);
    }
}
