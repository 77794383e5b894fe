//! Frozen weight artifact: named parameter tensors, postcard-encoded.

use std::collections::BTreeMap;
use std::path::Path;

use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VisionError};

const ARTIFACT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct TensorRecord {
    shape: Vec<usize>,
    data: Vec<f32>,
}

#[derive(Serialize, Deserialize)]
struct Artifact {
    version: u32,
    tensors: BTreeMap<String, TensorRecord>,
}

/// Parameter tensors keyed by their dotted module path, e.g. `encoder.0.weight`.
#[derive(Debug, Clone, Default)]
pub struct StateDict {
    tensors: BTreeMap<String, ArrayD<f32>>,
}

impl StateDict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, tensor: ArrayD<f32>) {
        self.tensors.insert(name.into(), tensor);
    }

    pub fn get(&self, name: &str) -> Option<&ArrayD<f32>> {
        self.tensors.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<ArrayD<f32>> {
        self.tensors.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArrayD<f32>)> {
        self.tensors.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let artifact: Artifact = postcard::from_bytes(bytes)
            .map_err(|e| VisionError::model_load(format!("malformed weight artifact: {e}")))?;

        if artifact.version != ARTIFACT_VERSION {
            return Err(VisionError::model_load(format!(
                "unsupported weight artifact version {} (expected {})",
                artifact.version, ARTIFACT_VERSION
            )));
        }

        let mut tensors = BTreeMap::new();
        for (name, record) in artifact.tensors {
            let tensor = ArrayD::from_shape_vec(IxDyn(&record.shape), record.data).map_err(|e| {
                VisionError::model_load(format!("tensor {name} does not match its shape: {e}"))
            })?;
            tensors.insert(name, tensor);
        }
        Ok(Self { tensors })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let tensors = self
            .tensors
            .iter()
            .map(|(name, t)| {
                let record = TensorRecord {
                    shape: t.shape().to_vec(),
                    data: t.iter().copied().collect(),
                };
                (name.clone(), record)
            })
            .collect();
        let artifact = Artifact {
            version: ARTIFACT_VERSION,
            tensors,
        };
        postcard::to_allocvec(&artifact)
            .map_err(|e| VisionError::model_load(format!("encoding weight artifact: {e}")))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|source| VisionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = self.to_bytes()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| VisionError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, data).map_err(|source| VisionError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
