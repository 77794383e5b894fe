use std::path::PathBuf;

/// Errors produced while turning image bytes into embeddings.
#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    /// Input bytes are not a supported raster image.
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    /// Weight artifact is incompatible with the network definition.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("tensor shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl VisionError {
    pub fn model_load(msg: impl Into<String>) -> Self {
        Self::ModelLoad(msg.into())
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

pub type Result<T, E = VisionError> = std::result::Result<T, E>;
