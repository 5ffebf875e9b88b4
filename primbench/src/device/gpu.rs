use std::sync::mpsc;

use pollster::block_on;
use tracing::{debug, info, info_span, warn};
use wgpu::util::DeviceExt;
use wgpu::{
    Backends, BindGroupDescriptor, BindGroupEntry, BufferDescriptor, BufferUsages,
    CommandEncoderDescriptor, ComputePassDescriptor, ComputePipelineDescriptor, DeviceDescriptor,
    ErrorFilter, InstanceDescriptor, PipelineCompilationOptions, PowerPreference,
    RequestAdapterOptions, ShaderModuleDescriptor, ShaderSource,
};

use super::{bind, Arg, Device, Word, WorkSize};
use crate::kernels::{EntryPoint, KernelModule, ModuleSpec};
use crate::Error;

pub struct GpuBuffer {
    buffer: wgpu::Buffer,
    words: usize,
}

pub struct GpuProgram {
    module: wgpu::ShaderModule,
    spec: &'static ModuleSpec,
}

pub struct GpuKernel {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
    entry: &'static EntryPoint,
    params_binding: u32,
}

/// wgpu-backed execution service.
pub struct GpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    name: String,
    max_workgroups_per_dim: u32,
    max_binding_size: u64,
}

fn parse_backends(name: Option<&str>) -> Result<Backends, Error> {
    match name.map(str::to_ascii_lowercase).as_deref() {
        None | Some("all") => Ok(Backends::all()),
        Some("vulkan") => Ok(Backends::VULKAN),
        Some("metal") => Ok(Backends::METAL),
        Some("dx12") => Ok(Backends::DX12),
        Some("gl") => Ok(Backends::GL),
        Some(other) => Err(Error::Setup(format!("unknown backend `{}`", other))),
    }
}

impl GpuDevice {
    pub fn new(backend: Option<&str>, adapter_index: Option<usize>) -> Result<Self, Error> {
        let backends = parse_backends(backend)?;
        let _span = info_span!("gpu_init", ?backends, adapter = ?adapter_index).entered();

        let instance = wgpu::Instance::new(InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let adapter = match adapter_index {
            Some(index) => {
                let mut adapters = instance.enumerate_adapters(backends);
                if index >= adapters.len() {
                    warn!(index, available = adapters.len(), "adapter index out of range");
                    return Err(Error::Setup(format!(
                        "adapter {} requested but only {} available",
                        index,
                        adapters.len()
                    )));
                }
                adapters.swap_remove(index)
            }
            None => block_on(instance.request_adapter(&RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                ..Default::default()
            }))
            .ok_or_else(|| Error::Setup("no compatible GPU adapter found".into()))?,
        };

        let info = adapter.get_info();
        let limits = adapter.limits();
        info!(name = %info.name, backend = ?info.backend, "GPU adapter acquired");

        let (device, queue) = block_on(adapter.request_device(
            &DeviceDescriptor {
                label: Some("primbench"),
                required_limits: limits.clone(),
                ..Default::default()
            },
            None,
        ))
        .map_err(|e| Error::Setup(format!("failed to create device: {}", e)))?;
        info!("GPU device created");

        Ok(Self {
            device,
            queue,
            name: info.name,
            max_workgroups_per_dim: limits.max_compute_workgroups_per_dimension,
            max_binding_size: limits.max_storage_buffer_binding_size as u64,
        })
    }

    fn wait(&self) {
        self.device.poll(wgpu::Maintain::Wait);
    }

    fn check_len(&self, buffer: &GpuBuffer, len: usize) -> Result<(), Error> {
        if len > buffer.words {
            return Err(Error::Transfer(format!(
                "{} elements do not fit a buffer of {}",
                len, buffer.words
            )));
        }
        Ok(())
    }
}

impl Device for GpuDevice {
    type Buffer = GpuBuffer;
    type Program = GpuProgram;
    type Kernel = GpuKernel;

    fn label(&self) -> &'static str {
        "GPU"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn compile(&self, module: &KernelModule<'_>) -> Result<GpuProgram, Error> {
        self.device.push_error_scope(ErrorFilter::Validation);
        let shader = self.device.create_shader_module(ShaderModuleDescriptor {
            label: Some(module.spec.name),
            source: ShaderSource::Wgsl(module.source.into()),
        });
        if let Some(err) = block_on(self.device.pop_error_scope()) {
            return Err(Error::Build {
                module: module.spec.name.to_string(),
                log: err.to_string(),
            });
        }
        info!(module = module.spec.name, version = module.version, "kernel module compiled");

        Ok(GpuProgram {
            module: shader,
            spec: module.spec,
        })
    }

    fn kernel(&self, program: &GpuProgram, name: &str) -> Result<GpuKernel, Error> {
        let entry = program.spec.entry_point(name).ok_or_else(|| Error::Build {
            module: program.spec.name.to_string(),
            log: format!("no entry point named `{}`", name),
        })?;

        self.device.push_error_scope(ErrorFilter::Validation);
        let pipeline = self.device.create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some(entry.name),
            layout: None,
            module: &program.module,
            entry_point: entry.name,
            compilation_options: PipelineCompilationOptions::default(),
        });
        if let Some(err) = block_on(self.device.pop_error_scope()) {
            return Err(Error::Build {
                module: program.spec.name.to_string(),
                log: err.to_string(),
            });
        }
        let layout = pipeline.get_bind_group_layout(0);

        Ok(GpuKernel {
            pipeline,
            layout,
            entry,
            params_binding: program.spec.params_binding,
        })
    }

    fn alloc(&self, label: &str, words: usize) -> Result<GpuBuffer, Error> {
        let size = (words.max(1) * 4) as u64;
        if size > self.max_binding_size {
            return Err(Error::Allocation(format!(
                "`{}` needs {} bytes, device binding limit is {}",
                label, size, self.max_binding_size
            )));
        }

        self.device.push_error_scope(ErrorFilter::Validation);
        self.device.push_error_scope(ErrorFilter::OutOfMemory);
        let buffer = self.device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let oom = block_on(self.device.pop_error_scope());
        let invalid = block_on(self.device.pop_error_scope());
        if let Some(err) = oom.or(invalid) {
            return Err(Error::Allocation(format!("`{}`: {}", label, err)));
        }
        debug!(label, words, "buffer allocated");

        Ok(GpuBuffer { buffer, words })
    }

    fn write<T: Word>(&self, buffer: &GpuBuffer, data: &[T]) -> Result<(), Error> {
        self.check_len(buffer, data.len())?;
        if data.is_empty() {
            return Ok(());
        }
        self.queue
            .write_buffer(&buffer.buffer, 0, bytemuck::cast_slice(data));
        self.queue.submit(std::iter::empty());
        self.wait();
        Ok(())
    }

    fn read<T: Word>(&self, buffer: &GpuBuffer, out: &mut [T]) -> Result<(), Error> {
        self.check_len(buffer, out.len())?;
        if out.is_empty() {
            return Ok(());
        }
        let size = (out.len() * 4) as u64;
        let staging = self.device.create_buffer(&BufferDescriptor {
            label: Some("Staging"),
            size,
            usage: BufferUsages::COPY_DST | BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("Readback Encoder"),
        });
        encoder.copy_buffer_to_buffer(&buffer.buffer, 0, &staging, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.wait();
        rx.recv()
            .map_err(|e| Error::Transfer(e.to_string()))?
            .map_err(|e| Error::Transfer(e.to_string()))?;

        {
            let mapped = slice.get_mapped_range();
            out.copy_from_slice(bytemuck::cast_slice(&mapped[..]));
        }
        staging.unmap();
        Ok(())
    }

    fn copy(&self, src: &GpuBuffer, dst: &GpuBuffer, words: usize) -> Result<(), Error> {
        self.check_len(src, words)?;
        self.check_len(dst, words)?;
        let mut encoder = self.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("Copy Encoder"),
        });
        encoder.copy_buffer_to_buffer(&src.buffer, 0, &dst.buffer, 0, (words * 4) as u64);
        self.queue.submit(Some(encoder.finish()));
        self.wait();
        Ok(())
    }

    fn launch(
        &self,
        kernel: &GpuKernel,
        args: &[Arg<'_, GpuBuffer>],
        work: WorkSize,
    ) -> Result<(), Error> {
        let bound = bind(kernel.entry, args)?;
        let (x, y) = work.grid(self.max_workgroups_per_dim);
        debug!(
            entry = kernel.entry.name,
            groups = work.group_count,
            grid_x = x,
            grid_y = y,
            "gpu_dispatch"
        );
        if work.group_count == 0 {
            return Ok(());
        }

        // Uniform blocks are sized in 16-byte steps.
        let mut params = bound.scalars.clone();
        params.resize(params.len().div_ceil(4).max(1) * 4, 0);
        let params_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Params"),
                contents: bytemuck::cast_slice(&params),
                usage: BufferUsages::UNIFORM,
            });

        let mut entries: Vec<BindGroupEntry> = bound
            .bindings
            .iter()
            .zip(&bound.buffers)
            .map(|(binding, buffer)| BindGroupEntry {
                binding: *binding,
                resource: buffer.buffer.as_entire_binding(),
            })
            .collect();
        entries.push(BindGroupEntry {
            binding: kernel.params_binding,
            resource: params_buffer.as_entire_binding(),
        });

        self.device.push_error_scope(ErrorFilter::Validation);
        let bind_group = self.device.create_bind_group(&BindGroupDescriptor {
            label: Some(kernel.entry.name),
            layout: &kernel.layout,
            entries: &entries,
        });

        let mut encoder = self.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("Compute Encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&ComputePassDescriptor {
                label: Some(kernel.entry.name),
                timestamp_writes: None,
            });
            pass.set_pipeline(&kernel.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(x, y, 1);
        }
        self.queue.submit(Some(encoder.finish()));
        if let Some(err) = block_on(self.device.pop_error_scope()) {
            return Err(Error::Launch {
                entry: kernel.entry.name.to_string(),
                reason: err.to_string(),
            });
        }
        self.wait();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names_are_case_insensitive() {
        assert_eq!(parse_backends(None).unwrap(), Backends::all());
        assert_eq!(parse_backends(Some("Vulkan")).unwrap(), Backends::VULKAN);
        assert_eq!(parse_backends(Some("dx12")).unwrap(), Backends::DX12);
        assert!(matches!(parse_backends(Some("cuda")), Err(Error::Setup(_))));
    }
}
