//! Benchmark harness for group-parallel primitives: sum, max prefix sum,
//! merge sort and LSD radix sort, each run as work-group kernels on a
//! [`Device`](device::Device) with a host combine step and checked against a
//! sequential oracle.

pub mod config;
pub mod data;
pub mod device;
pub mod harness;
pub mod kernels;
pub mod oracle;
pub mod primitives;

mod error;

pub use config::BenchConfig;
pub use error::Error;
pub use primbench_types::{KernelManifest, KernelSource};
