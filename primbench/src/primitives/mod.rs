//! Group-parallel primitives. Each one launches its kernels on a [`Device`]
//! and finishes the work on the host: combining per-group partials, scanning
//! cross-group offsets, copying the last ping-pong result home.
//!
//! [`Device`]: crate::device::Device

mod max_prefix_sum;
mod merge;
mod radix;
mod sum;

pub use max_prefix_sum::{combine_group_prefixes, DeviceMaxPrefixSum, MaxPrefix};
pub use merge::DeviceMergeSort;
pub use radix::{exclusive_scan, DeviceRadixSort};
pub use sum::{combine_partial_sums, DeviceSum};

use crate::kernels::VALUES_PER_LANE;
use crate::Error;

/// Plain kernels take one element per lane, fast ones `VALUES_PER_LANE`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Unroll {
    Plain,
    Fast,
}

impl Unroll {
    pub fn per_lane(self) -> u32 {
        match self {
            Unroll::Plain => 1,
            Unroll::Fast => VALUES_PER_LANE,
        }
    }
}

/// Whether pass `pass` reads from the primary buffer of a ping-pong pair.
pub fn current_is_primary(pass: usize) -> bool {
    pass % 2 == 0
}

/// Two buffers that trade the source and destination roles every pass.
pub struct PingPong<B> {
    primary: B,
    secondary: B,
}

impl<B> PingPong<B> {
    pub fn new(primary: B, secondary: B) -> Self {
        Self { primary, secondary }
    }

    pub fn primary(&self) -> &B {
        &self.primary
    }

    pub fn source(&self, pass: usize) -> &B {
        if current_is_primary(pass) {
            &self.primary
        } else {
            &self.secondary
        }
    }

    pub fn destination(&self, pass: usize) -> &B {
        if current_is_primary(pass) {
            &self.secondary
        } else {
            &self.primary
        }
    }

    /// The buffer holding the result after `passes` passes, and whether it
    /// still has to be copied back to the primary.
    pub fn result(&self, passes: usize) -> (&B, bool) {
        (self.source(passes), !current_is_primary(passes))
    }
}

/// Element counts travel to kernels as `u32`.
fn element_count(entry: &str, n: usize) -> Result<u32, Error> {
    u32::try_from(n).map_err(|_| Error::Argument {
        entry: entry.to_string(),
        reason: format!("{} elements exceed the 32-bit index range", n),
    })
}

/// Merge widths of a bottom-up merge sort over `n` elements: 1, 2, 4, ...
/// while below `n`.
pub fn split_sizes(n: usize) -> impl Iterator<Item = usize> {
    std::iter::successors(Some(1usize), |s| s.checked_mul(2)).take_while(move |&s| s < n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parity_alternates_from_primary() {
        let pp = PingPong::new("a", "b");
        assert_eq!((*pp.source(0), *pp.destination(0)), ("a", "b"));
        assert_eq!((*pp.source(1), *pp.destination(1)), ("b", "a"));
        assert_eq!((*pp.source(6), *pp.destination(6)), ("a", "b"));
    }

    #[test]
    fn odd_pass_counts_need_a_copy_back() {
        let pp = PingPong::new(0, 1);
        assert_eq!(pp.result(0), (&0, false));
        assert_eq!(pp.result(3), (&1, true));
        assert_eq!(pp.result(8), (&0, false));
    }

    #[test]
    fn split_sizes_double_until_n() {
        assert_eq!(split_sizes(1).count(), 0);
        assert_eq!(split_sizes(2).collect::<Vec<_>>(), vec![1]);
        assert_eq!(split_sizes(5).collect::<Vec<_>>(), vec![1, 2, 4]);
        assert_eq!(split_sizes(8).collect::<Vec<_>>(), vec![1, 2, 4]);
        assert_eq!(split_sizes(1 << 20).count(), 20);
    }

    #[test]
    fn element_count_rejects_oversized_inputs() {
        assert_eq!(element_count("sum", 7).unwrap(), 7);
        assert!(matches!(
            element_count("sum", u32::MAX as usize + 1),
            Err(Error::Argument { .. })
        ));
    }
}
