use primbench::device::Device;
use primbench::harness::{measure, OraclePolicy};
use primbench::primitives::{DeviceMaxPrefixSum, Unroll};
use primbench::{data, oracle, BenchConfig, Error, KernelManifest};
use tracing::info_span;

use crate::harness::BenchResult;

pub fn run<D: Device>(
    device: &D,
    manifest: &KernelManifest,
    cfg: &BenchConfig,
) -> Result<Vec<BenchResult>, Error> {
    let mut results = Vec::new();
    let policy = OraclePolicy::EveryIteration;

    for &n in &cfg.max_prefix_sum_sizes {
        let _span = info_span!("max_prefix_sum_bench", n).entered();
        let input = data::max_prefix_sum_input(n);
        let reference = || oracle::max_prefix_sum(&input);

        let mut measurements = vec![
            measure("CPU", n, cfg.iterations, policy, reference, |_| {
                Ok(oracle::max_prefix_sum(&input))
            })?,
            measure("CPU rayon", n, cfg.iterations, policy, reference, |_| {
                Ok(oracle::par_max_prefix_sum(&input))
            })?,
        ];

        let mps = DeviceMaxPrefixSum::new(device, manifest, n)?;
        for unroll in [Unroll::Plain, Unroll::Fast] {
            let name = format!(
                "{} {}",
                device.label(),
                DeviceMaxPrefixSum::<D>::entry_point(unroll)
            );
            measurements.push(measure(&name, n, cfg.iterations, policy, reference, |lap| {
                mps.run(&input, unroll, lap)
            })?);
        }

        results.push(BenchResult {
            primitive: "Max prefix sum",
            n,
            measurements,
        });
    }
    Ok(results)
}
