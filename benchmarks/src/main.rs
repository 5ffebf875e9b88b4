mod cli;
mod harness;
mod max_prefix_sum_bench;
mod merge_bench;
mod radix_bench;
mod sum_bench;

use std::path::Path;

use primbench::device::{compile_all, Device, DeviceKind, GpuDevice, HostDevice};
use primbench::{kernels, BenchConfig, Error, KernelManifest};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::cli::Command;

fn load_manifest() -> Result<KernelManifest, Error> {
    match std::env::var_os("PRIMBENCH_KERNEL_DIR") {
        Some(dir) => kernels::load_dir(Path::new(&dir)),
        None => kernels::load_embedded(),
    }
}

fn run_all<D: Device>(device: &D, manifest: &KernelManifest, cfg: &BenchConfig) -> Result<(), Error> {
    println!("Device: {} ({})", device.name(), device.label());
    println!("CPU threads: {}", rayon::current_num_threads());
    compile_all(device, manifest)?;
    info!(iterations = cfg.iterations, "starting benchmarks");

    harness::print_table(&sum_bench::run(device, manifest, cfg)?);
    harness::print_table(&max_prefix_sum_bench::run(device, manifest, cfg)?);
    harness::print_table(&merge_bench::run(device, manifest, cfg)?);
    harness::print_table(&radix_bench::run(device, manifest, cfg)?);
    Ok(())
}

fn main() {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_filter(
                    EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| EnvFilter::new("off")),
                ),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let selection = match cli::parse_args(&args) {
        Ok(Command::Run(selection)) => selection,
        Ok(Command::Help) => {
            cli::print_usage();
            return;
        }
        Err(msg) => {
            eprintln!("{}", msg);
            cli::print_usage();
            std::process::exit(1);
        }
    };

    let cfg = BenchConfig::default();
    let result = cfg.validate().and_then(|()| {
        let manifest = load_manifest()?;
        match selection.kind {
            DeviceKind::Gpu => {
                let device = GpuDevice::new(selection.backend.as_deref(), selection.adapter)?;
                run_all(&device, &manifest, &cfg)
            }
            DeviceKind::Host => run_all(&HostDevice::new(), &manifest, &cfg),
        }
    });

    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
