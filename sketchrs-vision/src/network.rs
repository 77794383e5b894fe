use std::path::Path;

use ndarray::{Array, Array1, Array2, Array4, ArrayD, Axis, Dimension};

use crate::embedding::{Embedding, EmbeddingModel, EMBEDDING_DIM};
use crate::error::{Result, VisionError};
use crate::layers;
use crate::normalize::{Tensor, INPUT_SIZE};
use crate::weights::StateDict;

/// Channels and spatial side of the bottleneck feature map.
const LATENT_CHANNELS: usize = 64;
const LATENT_SIZE: usize = 32;
const LATENT_LEN: usize = LATENT_CHANNELS * LATENT_SIZE * LATENT_SIZE;

/// Parameter names and shapes, in PyTorch `state_dict` naming.
pub const PARAMETERS: [(&str, &[usize]); 12] = [
    ("encoder.0.weight", &[32, 1, 3, 3]),
    ("encoder.0.bias", &[32]),
    ("encoder.3.weight", &[64, 32, 3, 3]),
    ("encoder.3.bias", &[64]),
    ("fc1.weight", &[EMBEDDING_DIM, LATENT_LEN]),
    ("fc1.bias", &[EMBEDDING_DIM]),
    ("fc2.weight", &[LATENT_LEN, EMBEDDING_DIM]),
    ("fc2.bias", &[LATENT_LEN]),
    ("decoder.0.weight", &[64, 32, 3, 3]),
    ("decoder.0.bias", &[32]),
    ("decoder.2.weight", &[32, 1, 3, 3]),
    ("decoder.2.bias", &[1]),
];

/// Parameters the matching path cannot run without.
fn is_encoder_param(name: &str) -> bool {
    name.starts_with("encoder.") || name.starts_with("fc1.")
}

struct Conv {
    weight: Array4<f32>,
    bias: Array1<f32>,
}

struct Dense {
    weight: Array2<f32>,
    bias: Array1<f32>,
}

/// Convolutional autoencoder: two conv/pool stages down to a 64x32x32 map,
/// a dense projection to the 128-d embedding, and the mirrored decoder.
pub struct CiteNet {
    conv1: Conv,
    conv2: Conv,
    fc1: Dense,
    fc2: Dense,
    deconv1: Conv,
    deconv2: Conv,
}

impl CiteNet {
    pub fn load(path: &Path) -> Result<Self> {
        let dict = StateDict::load(path)?;
        Self::from_state_dict(&dict)
    }

    /// Build the network from a state dict.
    ///
    /// Extra keys are ignored. Fails when the artifact shares no parameter with
    /// the network, when a shared parameter has the wrong shape, or when an
    /// encoder parameter is missing. Missing decoder parameters are zero-filled.
    pub fn from_state_dict(dict: &StateDict) -> Result<Self> {
        let overlap = PARAMETERS
            .iter()
            .filter(|(name, _)| dict.contains(name))
            .count();
        if overlap == 0 {
            return Err(VisionError::model_load(format!(
                "weight artifact shares no parameters with the network ({} unrelated keys)",
                dict.len()
            )));
        }

        let ignored = dict.len() - overlap;
        if ignored > 0 {
            log::debug!("ignoring {} weight(s) not used by the network", ignored);
        }

        let params = ParamReader { dict };
        Ok(Self {
            conv1: Conv {
                weight: params.take("encoder.0.weight")?,
                bias: params.take("encoder.0.bias")?,
            },
            conv2: Conv {
                weight: params.take("encoder.3.weight")?,
                bias: params.take("encoder.3.bias")?,
            },
            fc1: Dense {
                weight: params.take("fc1.weight")?,
                bias: params.take("fc1.bias")?,
            },
            fc2: Dense {
                weight: params.take("fc2.weight")?,
                bias: params.take("fc2.bias")?,
            },
            deconv1: Conv {
                weight: params.take("decoder.0.weight")?,
                bias: params.take("decoder.0.bias")?,
            },
            deconv2: Conv {
                weight: params.take("decoder.2.weight")?,
                bias: params.take("decoder.2.bias")?,
            },
        })
    }

    /// Flattened bottleneck features for a single image.
    fn features(&self, input: &Tensor) -> Result<Array1<f32>> {
        let size = INPUT_SIZE as usize;
        if input.dim() != (1, 1, size, size) {
            return Err(VisionError::Inference(format!(
                "expected input of shape [1, 1, {size}, {size}], got {:?}",
                input.shape()
            )));
        }
        let x = input.index_axis(Axis(0), 0).to_owned();

        let mut x = layers::conv2d(&x, &self.conv1.weight, &self.conv1.bias, 1)?;
        layers::relu_inplace(&mut x);
        let x = layers::max_pool2d(&x, 2);

        let mut x = layers::conv2d(&x, &self.conv2.weight, &self.conv2.bias, 1)?;
        layers::relu_inplace(&mut x);
        let x = layers::max_pool2d(&x, 2);

        Ok(x.into_shape_with_order(LATENT_LEN)?)
    }

    fn embed(&self, input: &Tensor) -> Result<Embedding> {
        let features = self.features(input)?;
        let vector = layers::linear(features.view(), &self.fc1.weight, &self.fc1.bias);
        Ok(Embedding { vector })
    }

    fn reconstruct(&self, embedding: &Embedding) -> Result<Array4<f32>> {
        let latent = layers::linear(embedding.vector.view(), &self.fc2.weight, &self.fc2.bias);
        let x = latent.into_shape_with_order((LATENT_CHANNELS, LATENT_SIZE, LATENT_SIZE))?;

        let mut x = layers::conv_transpose2d(&x, &self.deconv1.weight, &self.deconv1.bias, 2, 1, 1)?;
        layers::relu_inplace(&mut x);
        let mut x = layers::conv_transpose2d(&x, &self.deconv2.weight, &self.deconv2.bias, 2, 1, 1)?;
        layers::sigmoid_inplace(&mut x);

        Ok(x.insert_axis(Axis(0)))
    }
}

impl EmbeddingModel for CiteNet {
    fn encode(&self, input: &Tensor) -> Result<Embedding> {
        self.embed(input)
    }

    fn forward(&self, input: &Tensor) -> Result<(Embedding, Array4<f32>)> {
        let embedding = self.embed(input)?;
        let reconstruction = self.reconstruct(&embedding)?;
        Ok((embedding, reconstruction))
    }
}

struct ParamReader<'a> {
    dict: &'a StateDict,
}

impl ParamReader<'_> {
    fn take<D: Dimension>(&self, name: &str) -> Result<Array<f32, D>> {
        let expected = PARAMETERS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, shape)| *shape)
            .ok_or_else(|| VisionError::model_load(format!("unknown parameter {name}")))?;

        let tensor = match self.dict.get(name) {
            Some(t) if t.shape() != expected => {
                return Err(VisionError::model_load(format!(
                    "parameter {name} has shape {:?}, expected {:?}",
                    t.shape(),
                    expected
                )))
            }
            Some(t) if t.iter().any(|v| !v.is_finite()) => {
                return Err(VisionError::model_load(format!(
                    "parameter {name} contains non-finite values"
                )))
            }
            Some(t) => t.clone(),
            None if is_encoder_param(name) => {
                return Err(VisionError::model_load(format!(
                    "weight artifact is missing encoder parameter {name}"
                )))
            }
            None => {
                log::warn!("weight artifact is missing {name}, zero-filling");
                ArrayD::zeros(expected)
            }
        };

        Ok(tensor.into_dimensionality::<D>()?)
    }
}
