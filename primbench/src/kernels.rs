//! Kernel modules, their entry-point signatures, and the manifest that
//! carries their source text.
//!
//! The build script bundles `kernels/*.wgsl` into a bincode manifest which is
//! embedded in the library. A directory with the same file names can stand in
//! for it at runtime.

use std::fs;
use std::path::Path;

use primbench_types::{KernelManifest, KernelSource};
use tracing::info;

use crate::Error;

const EMBEDDED_MANIFEST: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/kernels.bin"));

pub const SUM_GROUP_SIZE: u32 = 256;
pub const MAX_PREFIX_SUM_GROUP_SIZE: u32 = 256;
pub const MERGE_GROUP_SIZE: u32 = 128;
pub const RADIX_GROUP_SIZE: u32 = 128;

/// Elements handled by one lane in the `_fast` entry points.
pub const VALUES_PER_LANE: u32 = 4;

pub const DIGITS_PER_STEP: u32 = 4;
pub const VALUES_PER_DIGIT: u32 = 1 << DIGITS_PER_STEP;

/// One positional kernel argument.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArgSlot {
    /// A device buffer bound at the given binding index.
    Buffer(u32),
    /// A 32-bit scalar, packed in order into the module's parameter block.
    Scalar,
}

#[derive(Debug)]
pub struct EntryPoint {
    pub name: &'static str,
    pub args: &'static [ArgSlot],
}

#[derive(Debug)]
pub struct ModuleSpec {
    pub name: &'static str,
    /// Binding of the uniform block holding the scalar arguments.
    pub params_binding: u32,
    pub entry_points: &'static [EntryPoint],
}

impl ModuleSpec {
    pub fn entry_point(&self, name: &str) -> Option<&'static EntryPoint> {
        self.entry_points.iter().find(|e| e.name == name)
    }
}

use ArgSlot::{Buffer, Scalar};

/// `(input, partial_sums, n)`
const SUM_ARGS: &[ArgSlot] = &[Buffer(0), Buffer(1), Scalar];

/// `(input, n, max_sums, prefixes, group_sums)`
const MAX_PREFIX_SUM_ARGS: &[ArgSlot] = &[Buffer(0), Scalar, Buffer(1), Buffer(2), Buffer(3)];

pub static SUM: ModuleSpec = ModuleSpec {
    name: "sum",
    params_binding: 2,
    entry_points: &[
        EntryPoint { name: "sum", args: SUM_ARGS },
        EntryPoint { name: "sum_fast", args: SUM_ARGS },
    ],
};

pub static MAX_PREFIX_SUM: ModuleSpec = ModuleSpec {
    name: "max_prefix_sum",
    params_binding: 4,
    entry_points: &[
        EntryPoint { name: "max_prefix_sum", args: MAX_PREFIX_SUM_ARGS },
        EntryPoint { name: "max_prefix_sum_fast", args: MAX_PREFIX_SUM_ARGS },
    ],
};

pub static MERGE: ModuleSpec = ModuleSpec {
    name: "merge",
    params_binding: 4,
    entry_points: &[
        // (src, n, split_size, diagonal_first, diagonal_second)
        EntryPoint {
            name: "find_diagonal_indexes",
            args: &[Buffer(0), Scalar, Scalar, Buffer(2), Buffer(3)],
        },
        // (src, dst, n, split_size, diagonal_first, diagonal_second)
        EntryPoint {
            name: "merge",
            args: &[Buffer(0), Buffer(1), Scalar, Scalar, Buffer(2), Buffer(3)],
        },
    ],
};

pub static RADIX: ModuleSpec = ModuleSpec {
    name: "radix",
    params_binding: 4,
    entry_points: &[
        // (src, ranks, counts, mask, n)
        EntryPoint {
            name: "radix",
            args: &[Buffer(0), Buffer(1), Buffer(2), Scalar, Scalar],
        },
        // (src, ranks, offsets, dst, mask, n)
        EntryPoint {
            name: "permute",
            args: &[Buffer(0), Buffer(1), Buffer(2), Buffer(3), Scalar, Scalar],
        },
    ],
};

pub static MODULES: [&ModuleSpec; 4] = [&SUM, &MAX_PREFIX_SUM, &MERGE, &RADIX];

/// Source text of one module, paired with its signature table.
#[derive(Debug, Clone, Copy)]
pub struct KernelModule<'a> {
    pub spec: &'static ModuleSpec,
    pub source: &'a str,
    pub version: &'a str,
}

/// The manifest compiled into the library.
pub fn load_embedded() -> Result<KernelManifest, Error> {
    let manifest: KernelManifest = bincode::deserialize(EMBEDDED_MANIFEST)
        .map_err(|e| Error::Setup(format!("embedded kernel manifest is corrupt: {}", e)))?;
    info!(modules = manifest.modules.len(), "kernel manifest loaded");
    Ok(manifest)
}

/// Read `<dir>/<module>.wgsl` for every known module. A missing or empty
/// file fails the whole load.
pub fn load_dir(dir: &Path) -> Result<KernelManifest, Error> {
    let mut manifest = KernelManifest::default();
    for spec in MODULES {
        let path = dir.join(format!("{}.wgsl", spec.name));
        let source = fs::read_to_string(&path).map_err(|e| {
            Error::Setup(format!("cannot read kernel source {}: {}", path.display(), e))
        })?;
        if source.trim().is_empty() {
            return Err(Error::Setup(format!(
                "empty kernel source {}; is the kernel directory configured properly?",
                path.display()
            )));
        }
        manifest.insert(KernelSource {
            name: spec.name.to_string(),
            version: format!("file:{}", path.display()),
            source,
        });
    }
    info!(dir = %dir.display(), "kernel manifest loaded from directory");
    Ok(manifest)
}

/// Look a module up by its spec, rejecting absent or empty sources.
pub fn lookup<'a>(
    manifest: &'a KernelManifest,
    spec: &'static ModuleSpec,
) -> Result<KernelModule<'a>, Error> {
    let module = manifest
        .module(spec.name)
        .ok_or_else(|| Error::Setup(format!("kernel module `{}` is missing", spec.name)))?;
    if module.source.trim().is_empty() {
        return Err(Error::Setup(format!(
            "empty source for kernel module `{}`; is the kernel directory configured properly?",
            spec.name
        )));
    }
    Ok(KernelModule {
        spec,
        source: &module.source,
        version: &module.version,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_manifest_has_every_module() {
        let manifest = load_embedded().unwrap();
        for spec in MODULES {
            let module = lookup(&manifest, spec).unwrap();
            assert_eq!(module.version, env!("CARGO_PKG_VERSION"));
            for entry in spec.entry_points {
                assert!(
                    module.source.contains(&format!("fn {}(", entry.name)),
                    "{} does not define {}",
                    spec.name,
                    entry.name
                );
            }
        }
    }

    #[test]
    fn sources_agree_on_group_size() {
        let manifest = load_embedded().unwrap();
        let sizes = [
            (&SUM, SUM_GROUP_SIZE),
            (&MAX_PREFIX_SUM, MAX_PREFIX_SUM_GROUP_SIZE),
            (&MERGE, MERGE_GROUP_SIZE),
            (&RADIX, RADIX_GROUP_SIZE),
        ];
        for (spec, group_size) in sizes {
            let module = lookup(&manifest, spec).unwrap();
            let decl = format!("const GROUP_SIZE: u32 = {}u;", group_size);
            assert!(module.source.contains(&decl), "{} lacks `{}`", spec.name, decl);
        }
        let radix = lookup(&manifest, &RADIX).unwrap();
        assert!(radix
            .source
            .contains(&format!("const VALUES_PER_DIGIT: u32 = {}u;", VALUES_PER_DIGIT)));
    }

    #[test]
    fn no_buffer_takes_the_params_binding() {
        for spec in MODULES {
            for entry in spec.entry_points {
                assert!(entry.args.contains(&ArgSlot::Scalar));
                for slot in entry.args {
                    if let ArgSlot::Buffer(binding) = slot {
                        assert_ne!(*binding, spec.params_binding, "{}", entry.name);
                    }
                }
            }
        }
    }

    #[test]
    fn empty_module_is_a_setup_failure() {
        let mut manifest = KernelManifest::default();
        manifest.insert(KernelSource {
            name: "sum".into(),
            version: "test".into(),
            source: "  \n".into(),
        });
        assert!(matches!(lookup(&manifest, &SUM), Err(Error::Setup(_))));
        assert!(matches!(lookup(&manifest, &RADIX), Err(Error::Setup(_))));
    }
}
