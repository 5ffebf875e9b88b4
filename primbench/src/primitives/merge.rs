use primbench_types::KernelManifest;
use tracing::debug;

use super::{element_count, split_sizes, PingPong};
use crate::device::{Arg, Device, WorkSize};
use crate::harness::Lap;
use crate::kernels::{self, MERGE, MERGE_GROUP_SIZE};
use crate::Error;

/// Bottom-up merge sort of `f32` keys, one `merge` launch per doubling of
/// the run width. Once runs are at least a group wide, a
/// `find_diagonal_indexes` launch first splits every run pair into
/// group-sized output chunks.
pub struct DeviceMergeSort<'d, D: Device> {
    device: &'d D,
    find_diagonals: D::Kernel,
    merge: D::Kernel,
    buffers: PingPong<D::Buffer>,
    diagonal_first: D::Buffer,
    diagonal_second: D::Buffer,
    capacity: usize,
}

impl<'d, D: Device> DeviceMergeSort<'d, D> {
    pub fn new(device: &'d D, manifest: &KernelManifest, capacity: usize) -> Result<Self, Error> {
        let program = device.compile(&kernels::lookup(manifest, &MERGE)?)?;
        let chunks = capacity.div_ceil(MERGE_GROUP_SIZE as usize);
        Ok(Self {
            device,
            find_diagonals: device.kernel(&program, "find_diagonal_indexes")?,
            merge: device.kernel(&program, "merge")?,
            buffers: PingPong::new(
                device.alloc("merge primary", capacity)?,
                device.alloc("merge secondary", capacity)?,
            ),
            diagonal_first: device.alloc("diagonal first", chunks)?,
            diagonal_second: device.alloc("diagonal second", chunks)?,
            capacity,
        })
    }

    /// Upload `data`, sort it on the device and read the result back. The
    /// lap covers the passes and the copy-back, not the transfers.
    pub fn run(&self, data: &[f32], lap: &mut Lap) -> Result<Vec<f32>, Error> {
        let n = element_count("merge", data.len())?;
        if data.len() > self.capacity {
            return Err(Error::Argument {
                entry: "merge".to_string(),
                reason: format!("{} elements exceed capacity {}", data.len(), self.capacity),
            });
        }
        if data.is_empty() {
            return Ok(Vec::new());
        }

        self.device.write(self.buffers.primary(), data)?;
        lap.restart();

        let group = MERGE_GROUP_SIZE as usize;
        let chunks = data.len().div_ceil(group);
        let mut passes = 0;
        for (pass, split_size) in split_sizes(data.len()).enumerate() {
            let src = self.buffers.source(pass);
            let dst = self.buffers.destination(pass);
            let split = split_size as u32;

            if split_size >= group {
                self.device.launch(
                    &self.find_diagonals,
                    &[
                        Arg::Buffer(src),
                        Arg::U32(n),
                        Arg::U32(split),
                        Arg::Buffer(&self.diagonal_first),
                        Arg::Buffer(&self.diagonal_second),
                    ],
                    WorkSize::covering(chunks, MERGE_GROUP_SIZE, 1),
                )?;
            }
            self.device.launch(
                &self.merge,
                &[
                    Arg::Buffer(src),
                    Arg::Buffer(dst),
                    Arg::U32(n),
                    Arg::U32(split),
                    Arg::Buffer(&self.diagonal_first),
                    Arg::Buffer(&self.diagonal_second),
                ],
                WorkSize::covering(data.len(), MERGE_GROUP_SIZE, 1),
            )?;
            passes = pass + 1;
        }

        let (result, copy_back) = self.buffers.result(passes);
        if copy_back {
            self.device.copy(result, self.buffers.primary(), data.len())?;
        }
        lap.stop();
        debug!(passes, copy_back, "merge sort done");

        let mut sorted = vec![0f32; data.len()];
        self.device.read(self.buffers.primary(), &mut sorted)?;
        Ok(sorted)
    }
}

#[cfg(test)]
mod tests {
    use quanta::Clock;

    use super::*;
    use crate::device::HostDevice;
    use crate::{data, oracle};

    #[test]
    fn odd_pass_count_copies_back_to_primary() {
        let dev = HostDevice::new();
        let manifest = kernels::load_embedded().unwrap();
        let sort = DeviceMergeSort::new(&dev, &manifest, 300).unwrap();

        // 300 elements take nine passes, so the last one lands in secondary.
        assert_eq!(split_sizes(300).count(), 9);
        let (last, copy_back) = sort.buffers.result(9);
        assert!(copy_back);

        let input = data::merge_input(300);
        let sorted = sort.run(&input, &mut Lap::start(&Clock::new())).unwrap();
        assert_eq!(sorted, oracle::sort_f32(&input));

        let mut primary = vec![0f32; 300];
        let mut secondary = vec![0f32; 300];
        dev.read(sort.buffers.primary(), &mut primary).unwrap();
        dev.read(last, &mut secondary).unwrap();
        assert_eq!(primary, sorted);
        assert_eq!(secondary, sorted);
    }

    #[test]
    fn even_pass_count_needs_no_copy() {
        let dev = HostDevice::new();
        let manifest = kernels::load_embedded().unwrap();
        let sort = DeviceMergeSort::new(&dev, &manifest, 256).unwrap();

        assert_eq!(split_sizes(256).count(), 8);
        assert!(!sort.buffers.result(8).1);

        let input = data::merge_input(256);
        let sorted = sort.run(&input, &mut Lap::start(&Clock::new())).unwrap();
        assert_eq!(sorted, oracle::sort_f32(&input));
    }
}
