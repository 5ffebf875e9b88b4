use primbench_types::KernelManifest;
use tracing::debug;

use super::{element_count, PingPong};
use crate::device::{Arg, Device, WorkSize};
use crate::harness::Lap;
use crate::kernels::{self, DIGITS_PER_STEP, RADIX, RADIX_GROUP_SIZE, VALUES_PER_DIGIT};
use crate::Error;

/// Replace every count with the sum of the counts before it; returns the
/// total. Applied to the bucket-major counts this gives each
/// (bucket, group) pair its first output slot.
pub fn exclusive_scan(counts: &mut [u32]) -> u32 {
    let mut running = 0u32;
    for c in counts.iter_mut() {
        let count = *c;
        *c = running;
        running += count;
    }
    running
}

/// LSD radix sort of `u32` keys, `DIGITS_PER_STEP` bits per pass.
pub struct DeviceRadixSort<'d, D: Device> {
    device: &'d D,
    radix: D::Kernel,
    permute: D::Kernel,
    buffers: PingPong<D::Buffer>,
    ranks: D::Buffer,
    counts: D::Buffer,
    capacity: usize,
}

impl<'d, D: Device> DeviceRadixSort<'d, D> {
    pub const PASSES: usize = (32 / DIGITS_PER_STEP) as usize;

    pub fn new(device: &'d D, manifest: &KernelManifest, capacity: usize) -> Result<Self, Error> {
        let program = device.compile(&kernels::lookup(manifest, &RADIX)?)?;
        let groups = capacity.div_ceil(RADIX_GROUP_SIZE as usize);
        Ok(Self {
            device,
            radix: device.kernel(&program, "radix")?,
            permute: device.kernel(&program, "permute")?,
            buffers: PingPong::new(
                device.alloc("radix primary", capacity)?,
                device.alloc("radix secondary", capacity)?,
            ),
            ranks: device.alloc("radix ranks", capacity)?,
            counts: device.alloc("radix counts", groups * VALUES_PER_DIGIT as usize)?,
            capacity,
        })
    }

    pub fn run(&self, data: &[u32], lap: &mut Lap) -> Result<Vec<u32>, Error> {
        let n = element_count("radix", data.len())?;
        if data.len() > self.capacity {
            return Err(Error::Argument {
                entry: "radix".to_string(),
                reason: format!("{} elements exceed capacity {}", data.len(), self.capacity),
            });
        }
        if data.is_empty() {
            return Ok(Vec::new());
        }

        self.device.write(self.buffers.primary(), data)?;
        lap.restart();

        let work = WorkSize::covering(data.len(), RADIX_GROUP_SIZE, 1);
        let mut counts = vec![0u32; work.group_count as usize * VALUES_PER_DIGIT as usize];
        for pass in 0..Self::PASSES {
            let src = self.buffers.source(pass);
            let dst = self.buffers.destination(pass);
            let mask = 1u32 << (pass as u32 * DIGITS_PER_STEP);

            self.device.launch(
                &self.radix,
                &[
                    Arg::Buffer(src),
                    Arg::Buffer(&self.ranks),
                    Arg::Buffer(&self.counts),
                    Arg::U32(mask),
                    Arg::U32(n),
                ],
                work,
            )?;

            self.device.read(&self.counts, &mut counts)?;
            let total = exclusive_scan(&mut counts);
            debug_assert_eq!(total as usize, data.len());
            self.device.write(&self.counts, &counts)?;

            self.device.launch(
                &self.permute,
                &[
                    Arg::Buffer(src),
                    Arg::Buffer(&self.ranks),
                    Arg::Buffer(&self.counts),
                    Arg::Buffer(dst),
                    Arg::U32(mask),
                    Arg::U32(n),
                ],
                work,
            )?;
        }

        let (result, copy_back) = self.buffers.result(Self::PASSES);
        if copy_back {
            self.device.copy(result, self.buffers.primary(), data.len())?;
        }
        lap.stop();
        debug!(passes = Self::PASSES, groups = work.group_count, "radix sort done");

        let mut sorted = vec![0u32; data.len()];
        self.device.read(self.buffers.primary(), &mut sorted)?;
        Ok(sorted)
    }
}
