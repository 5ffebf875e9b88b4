use primbench::device::Device;
use primbench::harness::{measure, OraclePolicy};
use primbench::primitives::{DeviceSum, Unroll};
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

    for &n in &cfg.sum_sizes {
        let _span = info_span!("sum_bench", n).entered();
        let input = data::sum_input(n);
        let reference = || oracle::sum(&input);

        let mut measurements = vec![
            measure("CPU", n, cfg.iterations, policy, reference, |_| {
                Ok(oracle::sum(&input))
            })?,
            measure("CPU rayon", n, cfg.iterations, policy, reference, |_| {
                Ok(oracle::par_sum(&input))
            })?,
        ];

        let sum = DeviceSum::new(device, manifest, n)?;
        for unroll in [Unroll::Plain, Unroll::Fast] {
            let name = format!("{} {}", device.label(), DeviceSum::<D>::entry_point(unroll));
            measurements.push(measure(&name, n, cfg.iterations, policy, reference, |lap| {
                sum.run(&input, unroll, lap)
            })?);
        }

        results.push(BenchResult {
            primitive: "Sum",
            n,
            measurements,
        });
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use primbench::device::HostDevice;
    use primbench::kernels;

    #[test]
    fn runs_every_variant_on_the_host_device() {
        let cfg = BenchConfig {
            iterations: 2,
            sum_sizes: vec![1, 1000],
            ..BenchConfig::default()
        };
        let dev = HostDevice::new();
        let results = run(&dev, &kernels::load_embedded().unwrap(), &cfg).unwrap();

        assert_eq!(results.len(), 2);
        let names: Vec<&str> = results[1].measurements.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["CPU", "CPU rayon", "Host sum", "Host sum_fast"]);
        assert!(results.iter().all(|r| r.measurements.iter().all(|m| m.samples.len() == 2)));
    }
}
