//! Sequential references, plus the rayon versions benchmarked as the
//! multi-threaded CPU variants. Integer sums wrap on overflow.

use std::cmp::Ordering;

use rayon::prelude::*;

use crate::primitives::MaxPrefix;

/// Elements per rayon task in [`par_max_prefix_sum`].
const PREFIX_CHUNK: usize = 1 << 16;

pub fn sum(data: &[i32]) -> i32 {
    data.iter().fold(0i32, |acc, &x| acc.wrapping_add(x))
}

pub fn par_sum(data: &[i32]) -> i32 {
    data.par_iter().copied().reduce(|| 0, i32::wrapping_add)
}

/// First (shortest) prefix with the largest sum; `None` for an empty input.
pub fn max_prefix_sum(data: &[i32]) -> Option<MaxPrefix> {
    let (&first, rest) = data.split_first()?;
    let mut best = MaxPrefix { sum: first, len: 1 };
    let mut running = first;
    for (i, &x) in rest.iter().enumerate() {
        running = running.wrapping_add(x);
        if running > best.sum {
            best = MaxPrefix {
                sum: running,
                len: i + 2,
            };
        }
    }
    Some(best)
}

/// Chunked two-phase scan: every chunk is scanned in parallel, then the
/// chunk results are combined in order.
pub fn par_max_prefix_sum(data: &[i32]) -> Option<MaxPrefix> {
    let chunks: Vec<(MaxPrefix, i32)> = data
        .par_chunks(PREFIX_CHUNK)
        .enumerate()
        .filter_map(|(c, chunk)| {
            let local = max_prefix_sum(chunk)?;
            let global = MaxPrefix {
                sum: local.sum,
                len: c * PREFIX_CHUNK + local.len,
            };
            Some((global, sum(chunk)))
        })
        .collect();

    let (first, rest) = chunks.split_first()?;
    let (mut best, mut cumulative) = *first;
    for &(local, total) in rest {
        let candidate = cumulative.wrapping_add(local.sum);
        if candidate > best.sum {
            best = MaxPrefix {
                sum: candidate,
                len: local.len,
            };
        }
        cumulative = cumulative.wrapping_add(total);
    }
    Some(best)
}

fn cmp_f32(a: &f32, b: &f32) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

/// Stable ascending sort.
pub fn sort_f32(data: &[f32]) -> Vec<f32> {
    let mut sorted = data.to_vec();
    sorted.sort_by(cmp_f32);
    sorted
}

pub fn par_sort_f32(data: &[f32]) -> Vec<f32> {
    let mut sorted = data.to_vec();
    sorted.par_sort_by(cmp_f32);
    sorted
}

pub fn sort_u32(data: &[u32]) -> Vec<u32> {
    let mut sorted = data.to_vec();
    sorted.sort_unstable();
    sorted
}

pub fn par_sort_u32(data: &[u32]) -> Vec<u32> {
    let mut sorted = data.to_vec();
    sorted.par_sort_unstable();
    sorted
}
