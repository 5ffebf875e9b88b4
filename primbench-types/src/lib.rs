use serde::{Deserialize, Serialize};

/// One kernel module as shipped with the binary.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct KernelSource {
    pub name: String,
    pub version: String,
    pub source: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct KernelManifest {
    pub modules: Vec<KernelSource>,
}

impl KernelManifest {
    pub fn module(&self, name: &str) -> Option<&KernelSource> {
        self.modules.iter().find(|m| m.name == name)
    }

    pub fn insert(&mut self, module: KernelSource) {
        match self.modules.iter_mut().find(|m| m.name == module.name) {
            Some(existing) => *existing = module,
            None => self.modules.push(module),
        }
    }
}
