use primbench::device::Device;
use primbench::harness::{measure, OraclePolicy};
use primbench::primitives::DeviceMergeSort;
use primbench::{data, oracle, BenchConfig, Error, KernelManifest};
use tracing::info_span;

use crate::harness::BenchResult;

pub fn run<D: Device>(
    device: &D,
    manifest: &KernelManifest,
    cfg: &BenchConfig,
) -> Result<Vec<BenchResult>, Error> {
    let mut results = Vec::new();
    let policy = OraclePolicy::Once;

    for &n in &cfg.merge_sizes {
        let _span = info_span!("merge_bench", n).entered();
        let input = data::merge_input(n);
        let reference = || oracle::sort_f32(&input);

        let mut measurements = vec![
            measure("CPU", n, cfg.iterations, policy, reference, |_| {
                Ok(oracle::sort_f32(&input))
            })?,
            measure("CPU rayon", n, cfg.iterations, policy, reference, |_| {
                Ok(oracle::par_sort_f32(&input))
            })?,
        ];

        let sort = DeviceMergeSort::new(device, manifest, n)?;
        let name = format!("{} merge", device.label());
        measurements.push(measure(&name, n, cfg.iterations, policy, reference, |lap| {
            sort.run(&input, lap)
        })?);

        results.push(BenchResult {
            primitive: "Merge sort",
            n,
            measurements,
        });
    }
    Ok(results)
}
