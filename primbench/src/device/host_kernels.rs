//! CPU bodies for the kernel entry points. Each function executes one
//! work-group and follows the same argument contract and memory layout as
//! the WGSL entry point of the same name.

use super::host::{Group, HostBuffer};
use super::Bound;
use crate::kernels::{VALUES_PER_DIGIT, VALUES_PER_LANE};

pub(crate) type GroupFn = fn(&Group, &Bound<'_, HostBuffer>);

pub(crate) fn lookup(module: &str, entry: &str) -> Option<GroupFn> {
    let body: GroupFn = match (module, entry) {
        ("sum", "sum") => sum,
        ("sum", "sum_fast") => sum_fast,
        ("max_prefix_sum", "max_prefix_sum") => max_prefix_sum,
        ("max_prefix_sum", "max_prefix_sum_fast") => max_prefix_sum_fast,
        ("merge", "find_diagonal_indexes") => find_diagonal_indexes,
        ("merge", "merge") => merge,
        ("radix", "radix") => radix,
        ("radix", "permute") => permute,
        _ => return None,
    };
    Some(body)
}

/// Element range `[start, end)` owned by a group, clipped to `n`.
fn group_range(group: &Group, per_lane: u32, n: u32) -> (usize, usize) {
    let chunk = group.size as usize * per_lane as usize;
    let start = group.id as usize * chunk;
    let end = (start + chunk).min(n as usize);
    (start.min(n as usize), end)
}

fn reduce_sum(group: &Group, args: &Bound<'_, HostBuffer>, per_lane: u32) {
    let (input, partials) = (args.buffers[0], args.buffers[1]);
    let n = args.scalars[0];
    let (start, end) = group_range(group, per_lane, n);

    let total = (start..end).fold(0i32, |acc, i| acc.wrapping_add(input.load_i32(i)));
    if (group.id as usize) < partials.len() {
        partials.store(group.id as usize, total as u32);
    }
}

fn sum(group: &Group, args: &Bound<'_, HostBuffer>) {
    reduce_sum(group, args, 1);
}

fn sum_fast(group: &Group, args: &Bound<'_, HostBuffer>) {
    reduce_sum(group, args, VALUES_PER_LANE);
}

fn scan_max_prefix(group: &Group, args: &Bound<'_, HostBuffer>, per_lane: u32) {
    let input = args.buffers[0];
    let (max_sums, prefixes, group_sums) = (args.buffers[1], args.buffers[2], args.buffers[3]);
    let n = args.scalars[0];
    let (start, end) = group_range(group, per_lane, n);
    if start >= end || group.id as usize >= max_sums.len() {
        return;
    }

    let mut running = 0i32;
    let mut best = i32::MIN;
    let mut best_len = 0u32;
    for i in start..end {
        running = running.wrapping_add(input.load_i32(i));
        if running > best {
            best = running;
            best_len = i as u32 + 1;
        }
    }

    let g = group.id as usize;
    max_sums.store(g, best as u32);
    prefixes.store(g, best_len);
    group_sums.store(g, running as u32);
}

fn max_prefix_sum(group: &Group, args: &Bound<'_, HostBuffer>) {
    scan_max_prefix(group, args, 1);
}

fn max_prefix_sum_fast(group: &Group, args: &Bound<'_, HostBuffer>) {
    scan_max_prefix(group, args, VALUES_PER_LANE);
}

/// The two sorted runs merged by the pass that writes output index `pos`.
#[derive(Copy, Clone, Debug)]
struct RunPair {
    start: usize,
    mid: usize,
    end: usize,
}

impl RunPair {
    fn containing(pos: usize, split_size: usize, n: usize) -> Self {
        let start = pos / (2 * split_size) * (2 * split_size);
        let mid = (start + split_size).min(n);
        let end = (start + 2 * split_size).min(n);
        Self { start, mid, end }
    }
}

/// How many of the first `d` merged outputs come from `a`; ties go to `a`.
fn co_rank(d: usize, a_len: usize, b_len: usize, a: impl Fn(usize) -> f32, b: impl Fn(usize) -> f32) -> usize {
    let mut lo = d.saturating_sub(b_len);
    let mut hi = d.min(a_len);
    while lo < hi {
        let i = (lo + hi) / 2;
        if b(d - i - 1) < a(i) {
            hi = i;
        } else {
            lo = i + 1;
        }
    }
    lo
}

/// Elements of `src[from..to]` strictly less than `x` (or `<=` when `inclusive`).
fn rank_in(src: &HostBuffer, from: usize, to: usize, x: f32, inclusive: bool) -> usize {
    let (mut lo, mut hi) = (from, to);
    while lo < hi {
        let m = (lo + hi) / 2;
        let v = src.load_f32(m);
        if v < x || (inclusive && v == x) {
            lo = m + 1;
        } else {
            hi = m;
        }
    }
    lo - from
}

fn find_diagonal_indexes(group: &Group, args: &Bound<'_, HostBuffer>) {
    let src = args.buffers[0];
    let (first, second) = (args.buffers[1], args.buffers[2]);
    let n = args.scalars[0] as usize;
    let split_size = args.scalars[1] as usize;
    // One lane per merge chunk; merge chunks are as wide as this group.
    let chunk = group.size as usize;

    for lane in 0..group.size as usize {
        let index = group.id as usize * chunk + lane;
        let pos = index * chunk;
        if pos >= n || index >= first.len() {
            break;
        }
        let pair = RunPair::containing(pos, split_size, n);
        let d = pos - pair.start;
        let i = co_rank(
            d,
            pair.mid - pair.start,
            pair.end - pair.mid,
            |k| src.load_f32(pair.start + k),
            |k| src.load_f32(pair.mid + k),
        );
        first.store(index, i as u32);
        second.store(index, (d - i) as u32);
    }
}

fn merge(group: &Group, args: &Bound<'_, HostBuffer>) {
    let (src, dst) = (args.buffers[0], args.buffers[1]);
    let (first, second) = (args.buffers[2], args.buffers[3]);
    let n = args.scalars[0] as usize;
    let split_size = args.scalars[1] as usize;
    let size = group.size as usize;
    let (start, end) = group_range(group, 1, n as u32);
    if start >= end {
        return;
    }

    if split_size < size {
        // Whole run pairs fit in one group: place every element by its rank
        // in the opposite run.
        for i in start..end {
            let pair = RunPair::containing(i, split_size, n);
            let x = src.load_f32(i);
            let out = if i < pair.mid {
                i + rank_in(src, pair.mid, pair.end, x, false)
            } else {
                (i - pair.mid) + pair.start + rank_in(src, pair.start, pair.mid, x, true)
            };
            dst.store(out, x.to_bits());
        }
        return;
    }

    let g = group.id as usize;
    let pair = RunPair::containing(start, split_size, n);
    let (a_len, b_len) = (pair.mid - pair.start, pair.end - pair.mid);
    let (a0, b0) = (first.load(g) as usize, second.load(g) as usize);
    let (a1, b1) = if end == pair.end {
        (a_len, b_len)
    } else {
        (first.load(g + 1) as usize, second.load(g + 1) as usize)
    };
    let a = |k: usize| src.load_f32(pair.start + a0 + k);
    let b = |k: usize| src.load_f32(pair.mid + b0 + k);
    let (sub_a, sub_b) = (a1 - a0, b1 - b0);

    for (t, out) in (start..end).enumerate() {
        let i = co_rank(t, sub_a, sub_b, a, b);
        let j = t - i;
        let take_a = i < sub_a && (j >= sub_b || a(i) <= b(j));
        let x = if take_a { a(i) } else { b(j) };
        dst.store(out, x.to_bits());
    }
}

fn digit(key: u32, mask: u32) -> usize {
    ((key / mask) % VALUES_PER_DIGIT) as usize
}

fn radix(group: &Group, args: &Bound<'_, HostBuffer>) {
    let (src, ranks, counts) = (args.buffers[0], args.buffers[1], args.buffers[2]);
    let mask = args.scalars[0];
    let n = args.scalars[1];
    let (start, end) = group_range(group, 1, n);
    let groups = (n as usize).div_ceil(group.size as usize);
    if start >= end {
        return;
    }

    let mut histogram = [0u32; VALUES_PER_DIGIT as usize];
    for i in start..end {
        let d = digit(src.load(i), mask);
        ranks.store(i, histogram[d]);
        histogram[d] += 1;
    }
    for (bucket, &count) in histogram.iter().enumerate() {
        counts.store(bucket * groups + group.id as usize, count);
    }
}

fn permute(group: &Group, args: &Bound<'_, HostBuffer>) {
    let (src, ranks, offsets, dst) = (
        args.buffers[0],
        args.buffers[1],
        args.buffers[2],
        args.buffers[3],
    );
    let mask = args.scalars[0];
    let n = args.scalars[1];
    let (start, end) = group_range(group, 1, n);
    let groups = (n as usize).div_ceil(group.size as usize);

    for i in start..end {
        let key = src.load(i);
        let base = offsets.load(digit(key, mask) * groups + group.id as usize);
        dst.store((base + ranks.load(i)) as usize, key);
    }
}
