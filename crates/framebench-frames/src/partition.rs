//! Splitting a frame range across generation workers.

use std::ops::Range;

/// Split `[0, total)` into contiguous ranges, one per worker.
///
/// The first `total % workers` ranges receive one extra frame, so range
/// lengths differ by at most one. `workers` is clamped to `[1, total]`.
pub fn partition(total: usize, workers: usize) -> Vec<Range<usize>> {
    let workers = workers.clamp(1, total.max(1));
    let base = total / workers;
    let remainder = total % workers;

    let mut start = 0;
    (0..workers)
        .map(|worker| {
            let len = base + usize::from(worker < remainder);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}
