use primbench_types::KernelManifest;
use tracing::debug;

use super::{element_count, Unroll};
use crate::device::{Arg, Device, WorkSize};
use crate::harness::Lap;
use crate::kernels::{self, MAX_PREFIX_SUM, MAX_PREFIX_SUM_GROUP_SIZE};
use crate::Error;

/// The largest sum over the non-empty prefixes of a sequence, and the length
/// of the shortest prefix reaching it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MaxPrefix {
    pub sum: i32,
    pub len: usize,
}

/// Walk the per-group results in order. `max_sums[g]` is relative to the
/// start of group `g`, `prefixes[g]` is already a global prefix length. A
/// later group wins only with a strictly larger sum.
pub fn combine_group_prefixes(
    max_sums: &[i32],
    prefixes: &[u32],
    group_sums: &[i32],
) -> Option<MaxPrefix> {
    let (&first_max, &first_len) = (max_sums.first()?, prefixes.first()?);
    let mut best = MaxPrefix {
        sum: first_max,
        len: first_len as usize,
    };
    let mut cumulative = *group_sums.first()?;

    for ((&max_sum, &len), &group_sum) in max_sums.iter().zip(prefixes).zip(group_sums).skip(1) {
        let candidate = cumulative.wrapping_add(max_sum);
        if candidate > best.sum {
            best = MaxPrefix {
                sum: candidate,
                len: len as usize,
            };
        }
        cumulative = cumulative.wrapping_add(group_sum);
    }
    Some(best)
}

struct GroupOutputs<B> {
    max_sums: B,
    prefixes: B,
    group_sums: B,
}

pub struct DeviceMaxPrefixSum<'d, D: Device> {
    device: &'d D,
    plain: D::Kernel,
    fast: D::Kernel,
    input: D::Buffer,
    outputs: GroupOutputs<D::Buffer>,
    capacity: usize,
}

impl<'d, D: Device> DeviceMaxPrefixSum<'d, D> {
    pub fn new(device: &'d D, manifest: &KernelManifest, capacity: usize) -> Result<Self, Error> {
        let program = device.compile(&kernels::lookup(manifest, &MAX_PREFIX_SUM)?)?;
        let groups = WorkSize::covering(capacity, MAX_PREFIX_SUM_GROUP_SIZE, 1).group_count as usize;
        Ok(Self {
            device,
            plain: device.kernel(&program, "max_prefix_sum")?,
            fast: device.kernel(&program, "max_prefix_sum_fast")?,
            input: device.alloc("max prefix sum input", capacity)?,
            outputs: GroupOutputs {
                max_sums: device.alloc("max sums", groups)?,
                prefixes: device.alloc("prefixes", groups)?,
                group_sums: device.alloc("group sums", groups)?,
            },
            capacity,
        })
    }

    pub fn entry_point(unroll: Unroll) -> &'static str {
        match unroll {
            Unroll::Plain => "max_prefix_sum",
            Unroll::Fast => "max_prefix_sum_fast",
        }
    }

    /// `None` for an empty input, which has no non-empty prefix.
    pub fn run(&self, data: &[i32], unroll: Unroll, lap: &mut Lap) -> Result<Option<MaxPrefix>, Error> {
        let entry = Self::entry_point(unroll);
        let n = element_count(entry, data.len())?;
        if data.len() > self.capacity {
            return Err(Error::Argument {
                entry: entry.to_string(),
                reason: format!("{} elements exceed capacity {}", data.len(), self.capacity),
            });
        }
        if data.is_empty() {
            return Ok(None);
        }

        self.device.write(&self.input, data)?;
        lap.restart();

        let work = WorkSize::covering(data.len(), MAX_PREFIX_SUM_GROUP_SIZE, unroll.per_lane());
        let kernel = match unroll {
            Unroll::Plain => &self.plain,
            Unroll::Fast => &self.fast,
        };
        let out = &self.outputs;
        self.device.launch(
            kernel,
            &[
                Arg::Buffer(&self.input),
                Arg::U32(n),
                Arg::Buffer(&out.max_sums),
                Arg::Buffer(&out.prefixes),
                Arg::Buffer(&out.group_sums),
            ],
            work,
        )?;

        let groups = work.group_count as usize;
        let mut max_sums = vec![0i32; groups];
        let mut prefixes = vec![0u32; groups];
        let mut group_sums = vec![0i32; groups];
        self.device.read(&out.max_sums, &mut max_sums)?;
        self.device.read(&out.prefixes, &mut prefixes)?;
        self.device.read(&out.group_sums, &mut group_sums)?;

        let best = combine_group_prefixes(&max_sums, &prefixes, &group_sums);
        debug!(entry, groups, ?best, "max prefix sum combined");
        Ok(best)
    }
}
