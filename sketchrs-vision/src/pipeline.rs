use std::path::Path;

use crate::embedding::{Embedding, EmbeddingModel};
use crate::error::Result;
use crate::normalize;

/// Full pipeline: decode → normalize → encode.
///
/// Gallery photos and query sketches must go through the same instance so
/// their embeddings are comparable.
pub struct Pipeline {
    model: Box<dyn EmbeddingModel>,
}

impl Pipeline {
    pub fn new(model: Box<dyn EmbeddingModel>) -> Self {
        Self { model }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Ok(Self::new(crate::model::load_model(path)?))
    }

    /// Embed raw image bytes; fails with `Decode` on anything that is not an image.
    pub fn extract_embedding(&self, bytes: &[u8]) -> Result<Embedding> {
        let tensor = normalize::normalize(bytes)?;
        self.model.encode(&tensor)
    }
}
