use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use ndarray::Array4;
use ort::{
    ep::{self, ExecutionProvider},
    session::{
        builder::{GraphOptimizationLevel, SessionBuilder},
        Session,
    },
    value::Value,
};

use crate::embedding::{Embedding, EmbeddingModel, EMBEDDING_DIM};
use crate::error::VisionError;
use crate::network::CiteNet;
use crate::normalize::{self, Tensor, INPUT_SIZE};

/// Load the embedding network from a weight artifact.
///
/// `.onnx` files run through onnxruntime; anything else is read as a
/// state-dict artifact and evaluated natively.
pub fn load_model(path: &Path) -> Result<Box<dyn EmbeddingModel>, VisionError> {
    let is_onnx = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("onnx"));

    if is_onnx {
        log::info!("loading onnx model from {}", path.display());
        Ok(Box::new(OnnxNet::load(path)?))
    } else {
        log::info!("loading weight artifact from {}", path.display());
        Ok(Box::new(CiteNet::load(path)?))
    }
}

pub fn session_builder() -> Result<SessionBuilder> {
    #[allow(unused_mut)]
    let mut builder =
        Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;

    #[cfg(feature = "openvino")]
    {
        let ep = ep::OpenVINO::default();
        if ep.is_available()? {
            ep.register(&mut builder)?;
        } else {
            log::warn!("openvino feature is enabled, onnx runtime not compiled with openvino")
        }
    }

    #[cfg(feature = "cuda")]
    {
        let ep = ep::CUDA::default();
        if ep.is_available()? {
            ep.register(&mut builder)?;
        } else {
            log::warn!("cuda feature is enabled, onnx runtime not compiled with cuda")
        }
    }

    Ok(builder)
}

pub fn embedding_session(model: &[u8]) -> Result<Session> {
    session_builder()?
        .commit_from_memory(model)
        .context("load embedding model")
}

/// ONNX export of the autoencoder: input `[1, 1, 128, 128]`, outputs the
/// `[1, 128]` embedding followed by the `[1, 1, 128, 128]` reconstruction.
pub struct OnnxNet {
    session: Mutex<Session>,
}

impl OnnxNet {
    pub fn load(path: &Path) -> Result<Self, VisionError> {
        let bytes = std::fs::read(path).map_err(|source| VisionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_memory(&bytes)
    }

    pub fn from_memory(bytes: &[u8]) -> Result<Self, VisionError> {
        let session =
            embedding_session(bytes).map_err(|e| VisionError::model_load(format!("{e:#}")))?;

        let net = Self {
            session: Mutex::new(session),
        };

        // probe once so an incompatible export fails at start-up, not per request
        let outputs = net
            .run(&normalize::blank())
            .map_err(|e| VisionError::model_load(format!("probe inference failed: {e:#}")))?;
        match outputs.first() {
            Some((_, data)) if data.len() == EMBEDDING_DIM => Ok(net),
            Some((shape, _)) => Err(VisionError::model_load(format!(
                "model emits embedding of shape {shape:?}, expected [1, {EMBEDDING_DIM}]"
            ))),
            None => Err(VisionError::model_load("model has no outputs")),
        }
    }

    fn run(&self, input: &Tensor) -> Result<Vec<(Vec<i64>, Vec<f32>)>> {
        let input_tensor = Value::from_array(input.clone())?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("onnx session poisoned"))?;
        let outputs = session.run(ort::inputs![input_tensor])?;

        let mut output_data = Vec::new();
        for (_name, output) in outputs.iter() {
            let (shape, data) = output.try_extract_tensor::<f32>()?;
            output_data.push((shape.iter().copied().collect(), data.to_vec()));
        }
        Ok(output_data)
    }
}

impl EmbeddingModel for OnnxNet {
    fn encode(&self, input: &Tensor) -> Result<Embedding, VisionError> {
        let mut outputs = self
            .run(input)
            .map_err(|e| VisionError::Inference(format!("{e:#}")))?;
        if outputs.is_empty() {
            return Err(VisionError::Inference("model has no outputs".into()));
        }
        let (_, data) = outputs.swap_remove(0);
        Ok(Embedding::from_vec(data))
    }

    fn forward(&self, input: &Tensor) -> Result<(Embedding, Array4<f32>), VisionError> {
        let mut outputs = self
            .run(input)
            .map_err(|e| VisionError::Inference(format!("{e:#}")))?
            .into_iter();

        let (_, embedding) = outputs
            .next()
            .ok_or_else(|| VisionError::Inference("model has no outputs".into()))?;
        let (_, reconstruction) = outputs.next().ok_or_else(|| {
            VisionError::Inference("model export has no reconstruction output".into())
        })?;

        let size = INPUT_SIZE as usize;
        let reconstruction = Array4::from_shape_vec((1, 1, size, size), reconstruction)?;
        Ok((Embedding::from_vec(embedding), reconstruction))
    }
}
