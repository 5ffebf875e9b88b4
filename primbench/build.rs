use std::env;
use std::fs;
use std::path::Path;
use primbench_types::{KernelManifest, KernelSource};

const MODULES: [&str; 4] = ["sum", "max_prefix_sum", "merge", "radix"];

fn main() {
    println!("cargo:rerun-if-changed=kernels");

    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    let version = env::var("CARGO_PKG_VERSION").unwrap();
    let kernel_dir = Path::new(&manifest_dir).join("kernels");

    let mut manifest = KernelManifest::default();
    for name in MODULES {
        let path = kernel_dir.join(format!("{}.wgsl", name));
        println!("cargo:rerun-if-changed={}", path.display());

        let source = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("Failed to read kernel {}: {}", path.display(), e));
        if source.trim().is_empty() {
            panic!("BUILD FAILED: kernel {} is empty", path.display());
        }

        manifest.insert(KernelSource {
            name: name.to_string(),
            version: version.clone(),
            source,
        });
    }

    let out_dir = env::var("OUT_DIR").unwrap();

    let json = serde_json::to_string_pretty(&manifest).expect("Failed to encode manifest JSON");
    fs::write(format!("{}/kernels.json", out_dir), json).expect("Failed to write debug JSON");

    let binary = bincode::serialize(&manifest).expect("Failed to serialize manifest to bincode");
    fs::write(format!("{}/kernels.bin", out_dir), binary).expect("Failed to write kernel manifest");
}
