//! Runs the WGSL kernels on a real adapter. Skips when none is available.

use primbench::data;
use primbench::device::GpuDevice;
use primbench::harness::Lap;
use primbench::kernels;
use primbench::oracle;
use primbench::primitives::{DeviceMaxPrefixSum, DeviceMergeSort, DeviceRadixSort, DeviceSum, Unroll};
use quanta::Clock;

fn gpu() -> Option<GpuDevice> {
    match GpuDevice::new(None, None) {
        Ok(dev) => Some(dev),
        Err(e) => {
            eprintln!("SKIP: {}", e);
            None
        }
    }
}

#[test]
fn primitives_agree_with_oracles_on_gpu() {
    let Some(dev) = gpu() else { return };
    let manifest = kernels::load_embedded().unwrap();
    let clock = Clock::new();
    let n = 100_003;

    let sum = DeviceSum::new(&dev, &manifest, n).unwrap();
    let input = data::sum_input(n);
    for unroll in [Unroll::Plain, Unroll::Fast] {
        let got = sum.run(&input, unroll, &mut Lap::start(&clock)).unwrap();
        assert_eq!(got, oracle::sum(&input));
    }

    let mps = DeviceMaxPrefixSum::new(&dev, &manifest, n).unwrap();
    let input = data::max_prefix_sum_input(n);
    for unroll in [Unroll::Plain, Unroll::Fast] {
        let got = mps.run(&input, unroll, &mut Lap::start(&clock)).unwrap();
        assert_eq!(got, oracle::max_prefix_sum(&input));
    }

    let merge = DeviceMergeSort::new(&dev, &manifest, n).unwrap();
    let input = data::merge_input(n);
    let got = merge.run(&input, &mut Lap::start(&clock)).unwrap();
    assert_eq!(got, oracle::sort_f32(&input));

    let radix = DeviceRadixSort::new(&dev, &manifest, n).unwrap();
    let input = data::radix_input(n);
    let got = radix.run(&input, &mut Lap::start(&clock)).unwrap();
    assert_eq!(got, oracle::sort_u32(&input));
}
