use ndarray::{Array1, Array4};

use crate::error::Result;
use crate::normalize::Tensor;

/// Length of the encoder output.
pub const EMBEDDING_DIM: usize = 128;

/// Encoder output for one normalized image.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub vector: Array1<f32>,
}

impl Embedding {
    pub fn from_vec(values: Vec<f32>) -> Self {
        Self {
            vector: Array1::from(values),
        }
    }

    pub fn len(&self) -> usize {
        self.vector.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vector.is_empty()
    }
}

/// Two entry points over one parameter set: the encoder head alone, used for
/// matching, and the full autoencoder pass that also yields the reconstruction.
pub trait EmbeddingModel: Send + Sync {
    fn encode(&self, input: &Tensor) -> Result<Embedding>;

    fn forward(&self, input: &Tensor) -> Result<(Embedding, Array4<f32>)>;
}
