//! The device execution service: compile kernel modules, own buffers, launch
//! entry points. Every call blocks until the device is done with it.

use bytemuck::Pod;
use primbench_types::KernelManifest;
use tracing::info;

use crate::kernels::{self, ArgSlot, EntryPoint, KernelModule, MODULES};
use crate::Error;

mod gpu;
mod host;
mod host_kernels;

pub use gpu::{GpuBuffer, GpuDevice, GpuKernel, GpuProgram};
pub use host::{HostBuffer, HostDevice, HostKernel, HostProgram};

/// Element types that can live in a device buffer: 32-bit plain data.
pub trait Word: Pod + Send + Sync {}

impl Word for i32 {}
impl Word for u32 {}
impl Word for f32 {}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DeviceKind {
    Gpu,
    Host,
}

/// Device-selection arguments as they arrive from the command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceSelection {
    pub kind: DeviceKind,
    pub backend: Option<String>,
    pub adapter: Option<usize>,
}

impl Default for DeviceSelection {
    fn default() -> Self {
        Self {
            kind: DeviceKind::Gpu,
            backend: None,
            adapter: None,
        }
    }
}

/// A launch grid: `group_count` work-groups of `group_size` lanes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WorkSize {
    pub group_size: u32,
    pub group_count: u32,
}

impl WorkSize {
    /// Enough groups for `elements` items when each lane takes `per_lane` of them.
    pub fn covering(elements: usize, group_size: u32, per_lane: u32) -> Self {
        let lanes = elements.div_ceil(per_lane as usize);
        Self {
            group_size,
            group_count: lanes.div_ceil(group_size as usize) as u32,
        }
    }

    /// Tile the group count into `(x, y)` so neither dimension exceeds
    /// `max_per_dim`. Kernels linearize as `y * x_count + x` and mask the tail.
    pub fn grid(&self, max_per_dim: u32) -> (u32, u32) {
        if self.group_count <= max_per_dim {
            (self.group_count, 1)
        } else {
            (max_per_dim, self.group_count.div_ceil(max_per_dim))
        }
    }
}

/// A positional kernel argument.
pub enum Arg<'a, B> {
    Buffer(&'a B),
    U32(u32),
}

/// Arguments checked against an entry point's signature.
pub struct Bound<'a, B> {
    /// Buffers in positional order.
    pub buffers: Vec<&'a B>,
    /// Binding index of each entry in `buffers`.
    pub bindings: Vec<u32>,
    /// Scalars in positional order, as raw 32-bit words.
    pub scalars: Vec<u32>,
}

pub fn bind<'a, B>(entry: &EntryPoint, args: &[Arg<'a, B>]) -> Result<Bound<'a, B>, Error> {
    if args.len() != entry.args.len() {
        return Err(Error::Argument {
            entry: entry.name.to_string(),
            reason: format!("expected {} arguments, got {}", entry.args.len(), args.len()),
        });
    }

    let mut bound = Bound {
        buffers: Vec::new(),
        bindings: Vec::new(),
        scalars: Vec::new(),
    };
    for (position, (slot, arg)) in entry.args.iter().zip(args).enumerate() {
        match (slot, arg) {
            (ArgSlot::Buffer(binding), Arg::Buffer(buffer)) => {
                bound.buffers.push(*buffer);
                bound.bindings.push(*binding);
            }
            (ArgSlot::Scalar, Arg::U32(v)) => bound.scalars.push(*v),
            (ArgSlot::Buffer(_), _) => {
                return Err(Error::Argument {
                    entry: entry.name.to_string(),
                    reason: format!("argument {} must be a buffer", position),
                })
            }
            (ArgSlot::Scalar, Arg::Buffer(_)) => {
                return Err(Error::Argument {
                    entry: entry.name.to_string(),
                    reason: format!("argument {} must be a scalar", position),
                })
            }
        }
    }
    Ok(bound)
}

pub trait Device {
    type Buffer;
    type Program;
    type Kernel;

    /// Short label used to name variants in reports, e.g. `GPU`.
    fn label(&self) -> &'static str;

    /// Adapter or implementation name.
    fn name(&self) -> &str;

    fn compile(&self, module: &KernelModule<'_>) -> Result<Self::Program, Error>;

    fn kernel(&self, program: &Self::Program, name: &str) -> Result<Self::Kernel, Error>;

    /// A zero-filled buffer of `words` 32-bit elements.
    fn alloc(&self, label: &str, words: usize) -> Result<Self::Buffer, Error>;

    fn write<T: Word>(&self, buffer: &Self::Buffer, data: &[T]) -> Result<(), Error>;

    fn read<T: Word>(&self, buffer: &Self::Buffer, out: &mut [T]) -> Result<(), Error>;

    fn copy(&self, src: &Self::Buffer, dst: &Self::Buffer, words: usize) -> Result<(), Error>;

    fn launch(
        &self,
        kernel: &Self::Kernel,
        args: &[Arg<'_, Self::Buffer>],
        work: WorkSize,
    ) -> Result<(), Error>;

    fn upload<T: Word>(&self, label: &str, data: &[T]) -> Result<Self::Buffer, Error> {
        let buffer = self.alloc(label, data.len())?;
        self.write(&buffer, data)?;
        Ok(buffer)
    }
}

/// Compile every kernel module in `manifest` and create each of its entry
/// points, discarding the results.
pub fn compile_all<D: Device>(device: &D, manifest: &KernelManifest) -> Result<(), Error> {
    for spec in MODULES {
        let program = device.compile(&kernels::lookup(manifest, spec)?)?;
        for entry in spec.entry_points {
            device.kernel(&program, entry.name)?;
        }
    }
    info!(device = device.label(), modules = MODULES.len(), "all kernel modules compiled");
    Ok(())
}
