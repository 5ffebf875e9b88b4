use std::sync::atomic::{AtomicU32, Ordering};

use rayon::prelude::*;
use tracing::{debug, info};

use super::host_kernels::{self, GroupFn};
use super::{bind, Arg, Bound, Device, Word, WorkSize};
use crate::kernels::{EntryPoint, KernelModule, ModuleSpec};
use crate::Error;

/// Device memory for the host emulation. Work-groups run concurrently and
/// scatter into the same buffer, so every word is an atomic.
pub struct HostBuffer {
    label: String,
    words: Box<[AtomicU32]>,
}

impl HostBuffer {
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub(crate) fn load(&self, index: usize) -> u32 {
        self.words[index].load(Ordering::Relaxed)
    }

    pub(crate) fn store(&self, index: usize, value: u32) {
        self.words[index].store(value, Ordering::Relaxed);
    }

    pub(crate) fn load_i32(&self, index: usize) -> i32 {
        self.load(index) as i32
    }

    pub(crate) fn load_f32(&self, index: usize) -> f32 {
        f32::from_bits(self.load(index))
    }
}

pub struct HostProgram {
    spec: &'static ModuleSpec,
}

pub struct HostKernel {
    entry: &'static EntryPoint,
    body: GroupFn,
}

/// One work-group as seen by a host kernel body.
#[derive(Copy, Clone, Debug)]
pub struct Group {
    pub id: u32,
    pub size: u32,
}

/// Executes the kernel entry points on the CPU, one rayon task per
/// work-group.
#[derive(Default)]
pub struct HostDevice {
    max_groups_per_dim: Option<u32>,
}

impl HostDevice {
    pub fn new() -> Self {
        info!(threads = rayon::current_num_threads(), "host device created");
        HostDevice::default()
    }

    /// A host device that tiles launches the way a GPU with at most `limit`
    /// groups per grid dimension does, running the padded groups as well.
    pub fn with_group_limit(limit: u32) -> Self {
        let limit = limit.max(1);
        info!(threads = rayon::current_num_threads(), limit, "host device created");
        HostDevice {
            max_groups_per_dim: Some(limit),
        }
    }

    /// Groups actually run for `work`, padding included.
    fn dispatched_groups(&self, work: WorkSize) -> u32 {
        match self.max_groups_per_dim {
            Some(limit) => {
                let (x, y) = work.grid(limit);
                x * y
            }
            None => work.group_count,
        }
    }

    fn check_len(buffer: &HostBuffer, len: usize) -> Result<(), Error> {
        if len > buffer.len() {
            return Err(Error::Transfer(format!(
                "{} elements do not fit `{}` of {}",
                len,
                buffer.label,
                buffer.len()
            )));
        }
        Ok(())
    }
}

impl Device for HostDevice {
    type Buffer = HostBuffer;
    type Program = HostProgram;
    type Kernel = HostKernel;

    fn label(&self) -> &'static str {
        "Host"
    }

    fn name(&self) -> &str {
        "host emulation"
    }

    fn compile(&self, module: &KernelModule<'_>) -> Result<HostProgram, Error> {
        if module.source.trim().is_empty() {
            return Err(Error::Setup(format!(
                "empty source for kernel module `{}`",
                module.spec.name
            )));
        }
        let missing: Vec<&str> = module
            .spec
            .entry_points
            .iter()
            .filter(|e| !module.source.contains(&format!("fn {}(", e.name)))
            .map(|e| e.name)
            .collect();
        if !missing.is_empty() {
            return Err(Error::Build {
                module: module.spec.name.to_string(),
                log: format!("entry points not defined in source: {}", missing.join(", ")),
            });
        }
        info!(module = module.spec.name, version = module.version, "kernel module loaded");
        Ok(HostProgram { spec: module.spec })
    }

    fn kernel(&self, program: &HostProgram, name: &str) -> Result<HostKernel, Error> {
        let entry = program.spec.entry_point(name);
        let body = host_kernels::lookup(program.spec.name, name);
        match (entry, body) {
            (Some(entry), Some(body)) => Ok(HostKernel { entry, body }),
            _ => Err(Error::Build {
                module: program.spec.name.to_string(),
                log: format!("no entry point named `{}`", name),
            }),
        }
    }

    fn alloc(&self, label: &str, words: usize) -> Result<HostBuffer, Error> {
        let mut storage = Vec::new();
        storage
            .try_reserve_exact(words.max(1))
            .map_err(|e| Error::Allocation(format!("`{}`: {}", label, e)))?;
        storage.extend((0..words.max(1)).map(|_| AtomicU32::new(0)));
        Ok(HostBuffer {
            label: label.to_string(),
            words: storage.into_boxed_slice(),
        })
    }

    fn write<T: Word>(&self, buffer: &HostBuffer, data: &[T]) -> Result<(), Error> {
        Self::check_len(buffer, data.len())?;
        let raw: &[u32] = bytemuck::cast_slice(data);
        buffer.words[..raw.len()]
            .par_iter()
            .zip(raw.par_iter())
            .for_each(|(word, &value)| word.store(value, Ordering::Relaxed));
        Ok(())
    }

    fn read<T: Word>(&self, buffer: &HostBuffer, out: &mut [T]) -> Result<(), Error> {
        Self::check_len(buffer, out.len())?;
        let raw: &mut [u32] = bytemuck::cast_slice_mut(out);
        raw.par_iter_mut()
            .zip(buffer.words.par_iter())
            .for_each(|(value, word)| *value = word.load(Ordering::Relaxed));
        Ok(())
    }

    fn copy(&self, src: &HostBuffer, dst: &HostBuffer, words: usize) -> Result<(), Error> {
        Self::check_len(src, words)?;
        Self::check_len(dst, words)?;
        dst.words[..words]
            .par_iter()
            .zip(src.words[..words].par_iter())
            .for_each(|(d, s)| d.store(s.load(Ordering::Relaxed), Ordering::Relaxed));
        Ok(())
    }

    fn launch(
        &self,
        kernel: &HostKernel,
        args: &[Arg<'_, HostBuffer>],
        work: WorkSize,
    ) -> Result<(), Error> {
        let bound: Bound<'_, HostBuffer> = bind(kernel.entry, args)?;
        let dispatched = self.dispatched_groups(work);
        debug!(
            entry = kernel.entry.name,
            groups = work.group_count,
            dispatched,
            "host_dispatch"
        );

        (0..dispatched).into_par_iter().for_each(|id| {
            let group = Group {
                id,
                size: work.group_size,
            };
            (kernel.body)(&group, &bound);
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::{KernelModule, SUM};

    #[test]
    fn write_read_copy_round_trip_words() {
        let dev = HostDevice::new();
        let a = dev.upload("a", &[1.5f32, -2.0, 3.25]).unwrap();
        let b = dev.alloc("b", 3).unwrap();
        dev.copy(&a, &b, 3).unwrap();

        let mut out = [0f32; 3];
        dev.read(&b, &mut out).unwrap();
        assert_eq!(out, [1.5, -2.0, 3.25]);
    }

    #[test]
    fn oversized_transfer_is_rejected() {
        let dev = HostDevice::new();
        let buf = dev.alloc("small", 2).unwrap();
        assert!(matches!(
            dev.write(&buf, &[1u32, 2, 3]),
            Err(Error::Transfer(_))
        ));
    }

    #[test]
    fn compile_reports_undeclared_entry_points() {
        let dev = HostDevice::new();
        let module = KernelModule {
            spec: &SUM,
            source: "fn sum(x: u32) {}",
            version: "test",
        };
        match dev.compile(&module) {
            Err(Error::Build { module, log }) => {
                assert_eq!(module, "sum");
                assert!(log.contains("sum_fast"));
            }
            _ => panic!("expected a build failure"),
        }
    }

    #[test]
    fn group_limit_pads_the_grid() {
        let work = WorkSize {
            group_size: 128,
            group_count: 23,
        };
        assert_eq!(HostDevice::new().dispatched_groups(work), 23);
        assert_eq!(HostDevice::with_group_limit(4).dispatched_groups(work), 24);
        assert_eq!(HostDevice::with_group_limit(23).dispatched_groups(work), 23);
        assert_eq!(HostDevice::with_group_limit(0).dispatched_groups(work), 23);
    }

    #[test]
    fn unknown_kernel_name_is_a_build_error() {
        let dev = HostDevice::new();
        let module = KernelModule {
            spec: &SUM,
            source: "fn sum( fn sum_fast(",
            version: "test",
        };
        let program = dev.compile(&module).unwrap();
        assert!(dev.kernel(&program, "sum").is_ok());
        assert!(matches!(
            dev.kernel(&program, "sum_slow"),
            Err(Error::Build { .. })
        ));
    }
}
