//! Benchmark inputs. Every generator seeds from the problem size, so one run
//! sees the same data for a given `n`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn rng(n: usize) -> StdRng {
    StdRng::seed_from_u64(n as u64)
}

/// Largest bound `b` such that `n` values in `[0, b]` cannot overflow `i32`.
fn per_element_bound(n: usize) -> i32 {
    (i32::MAX as usize / n.max(1)) as i32
}

/// Non-negative values whose total fits in an `i32`.
pub fn sum_input(n: usize) -> Vec<i32> {
    let hi = per_element_bound(n);
    let mut rng = rng(n);
    (0..n).map(|_| rng.gen_range(0..=hi)).collect()
}

/// Values in `[-r, r]` with `r = min(1023, i32::MAX / n)`.
pub fn max_prefix_sum_input(n: usize) -> Vec<i32> {
    let r = per_element_bound(n).min(1023);
    let mut rng = rng(n);
    (0..n).map(|_| rng.gen_range(-r..=r)).collect()
}

/// Uniform floats in `[0, 1)`.
pub fn merge_input(n: usize) -> Vec<f32> {
    let mut rng = rng(n);
    (0..n).map(|_| rng.gen::<f32>()).collect()
}

/// Keys in `[0, i32::MAX]`.
pub fn radix_input(n: usize) -> Vec<u32> {
    let mut rng = rng(n);
    (0..n).map(|_| rng.gen_range(0..=i32::MAX as u32)).collect()
}
