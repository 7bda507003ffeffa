// src/partition.rs

use std::ops::Range;

/// Split `[0, len)` into `workers` contiguous half-open ranges.
///
/// The first `len % workers` ranges get one extra index, so sizes differ by at most one.
/// Trailing ranges are empty when there are fewer indices than workers.
pub fn partition(len: usize, workers: usize) -> Vec<Range<usize>> {
    let workers = workers.max(1);
    let (quotient, remainder) = (len / workers, len % workers);

    (0..workers)
        .map(|i| {
            let start = i * quotient + i.min(remainder);
            let end = (i + 1) * quotient + (i + 1).min(remainder);
            start..end
        })
        .collect()
}
