use primbench_types::KernelManifest;
use tracing::debug;

use super::{element_count, Unroll};
use crate::device::{Arg, Device, WorkSize};
use crate::harness::Lap;
use crate::kernels::{self, SUM, SUM_GROUP_SIZE};
use crate::Error;

/// Adds the per-group partial sums. Overflow wraps, as on the device.
pub fn combine_partial_sums(partials: &[i32]) -> i32 {
    partials.iter().fold(0i32, |acc, &p| acc.wrapping_add(p))
}

/// Sum reduction: every group reduces its slice into its own slot of a
/// partials buffer, then the host adds the partials.
pub struct DeviceSum<'d, D: Device> {
    device: &'d D,
    plain: D::Kernel,
    fast: D::Kernel,
    input: D::Buffer,
    partials: D::Buffer,
    capacity: usize,
}

impl<'d, D: Device> DeviceSum<'d, D> {
    /// Compile the module and allocate buffers for inputs of up to
    /// `capacity` elements.
    pub fn new(device: &'d D, manifest: &KernelManifest, capacity: usize) -> Result<Self, Error> {
        let program = device.compile(&kernels::lookup(manifest, &SUM)?)?;
        let groups = WorkSize::covering(capacity, SUM_GROUP_SIZE, 1).group_count as usize;
        Ok(Self {
            device,
            plain: device.kernel(&program, "sum")?,
            fast: device.kernel(&program, "sum_fast")?,
            input: device.alloc("sum input", capacity)?,
            partials: device.alloc("sum partials", groups)?,
            capacity,
        })
    }

    pub fn entry_point(unroll: Unroll) -> &'static str {
        match unroll {
            Unroll::Plain => "sum",
            Unroll::Fast => "sum_fast",
        }
    }

    /// Upload `data`, then time the kernel and the combine step.
    pub fn run(&self, data: &[i32], unroll: Unroll, lap: &mut Lap) -> Result<i32, Error> {
        let entry = Self::entry_point(unroll);
        let n = element_count(entry, data.len())?;
        if data.len() > self.capacity {
            return Err(Error::Argument {
                entry: entry.to_string(),
                reason: format!("{} elements exceed capacity {}", data.len(), self.capacity),
            });
        }

        self.device.write(&self.input, data)?;
        lap.restart();

        let work = WorkSize::covering(data.len(), SUM_GROUP_SIZE, unroll.per_lane());
        let kernel = match unroll {
            Unroll::Plain => &self.plain,
            Unroll::Fast => &self.fast,
        };
        self.device.launch(
            kernel,
            &[
                Arg::Buffer(&self.input),
                Arg::Buffer(&self.partials),
                Arg::U32(n),
            ],
            work,
        )?;

        let mut partials = vec![0i32; work.group_count as usize];
        self.device.read(&self.partials, &mut partials)?;
        let total = combine_partial_sums(&partials);
        debug!(entry, groups = partials.len(), total, "sum combined");
        Ok(total)
    }
}
