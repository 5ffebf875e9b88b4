use primbench::device::Device;
use primbench::harness::{measure, OraclePolicy};
use primbench::primitives::DeviceRadixSort;
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

    for &n in &cfg.radix_sizes {
        let _span = info_span!("radix_bench", n).entered();
        let input = data::radix_input(n);
        let reference = || oracle::sort_u32(&input);

        let mut measurements = vec![
            measure("CPU", n, cfg.iterations, policy, reference, |_| {
                Ok(oracle::sort_u32(&input))
            })?,
            measure("CPU rayon", n, cfg.iterations, policy, reference, |_| {
                Ok(oracle::par_sort_u32(&input))
            })?,
        ];

        let sort = DeviceRadixSort::new(device, manifest, n)?;
        let name = format!("{} radix", device.label());
        measurements.push(measure(&name, n, cfg.iterations, policy, reference, |lap| {
            sort.run(&input, lap)
        })?);

        results.push(BenchResult {
            primitive: "Radix sort",
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
            radix_sizes: vec![129, 5000],
            ..BenchConfig::default()
        };
        let dev = HostDevice::new();
        let results = run(&dev, &kernels::load_embedded().unwrap(), &cfg).unwrap();

        assert_eq!(results.len(), 2);
        let names: Vec<&str> = results[0].measurements.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["CPU", "CPU rayon", "Host radix"]);
        assert!(results[1].measurements.iter().all(|m| m.n == 5000));
    }
}
