//! Request-path operations shared by the HTTP server and the CLI.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::gallery::{self, GalleryIndex};
use crate::matcher::{self, MatchError, Scoring};
use crate::storage::{ImageStore, StoreError};
use crate::{Pipeline, VisionError};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to process the sketch")]
    Sketch(#[source] VisionError),

    #[error("No sketch file provided")]
    MissingSketch,

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("No gallery available")]
    NoGallery,

    #[error("Image not found")]
    ImageNotFound(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchResponse {
    pub matched_image_id: String,
    pub similarity: f64,
}

#[derive(Debug, Clone)]
pub struct Photo {
    pub data: Vec<u8>,
    pub content_type: &'static str,
}

#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub photo_prefix: String,
    pub extensions: Vec<String>,
    pub scoring: Scoring,
}

impl From<&crate::config::Config> for ServiceOptions {
    fn from(cfg: &crate::config::Config) -> Self {
        Self {
            photo_prefix: cfg.photo_prefix.clone(),
            extensions: cfg.extensions.clone(),
            scoring: cfg.scoring,
        }
    }
}

/// Owns the pipeline, the store and the current gallery.
///
/// The gallery is replaced wholesale by [`SketchService::rebuild`]; requests in
/// flight keep the `Arc` they started with.
pub struct SketchService {
    store: Arc<dyn ImageStore>,
    pipeline: Pipeline,
    gallery: RwLock<Arc<GalleryIndex>>,
    options: ServiceOptions,
}

impl SketchService {
    /// Starts with an empty gallery; call [`SketchService::rebuild`] before serving.
    pub fn new(store: Arc<dyn ImageStore>, pipeline: Pipeline, options: ServiceOptions) -> Self {
        Self {
            store,
            pipeline,
            gallery: RwLock::new(Arc::new(GalleryIndex::default())),
            options,
        }
    }

    /// Re-scan the photo prefix and swap in a freshly built gallery.
    pub fn rebuild(&self) -> Result<usize, ServiceError> {
        let keys = gallery::discover_keys(
            self.store.as_ref(),
            &self.options.photo_prefix,
            &self.options.extensions,
        )?;
        log::info!(
            "building gallery from {} photo(s) under {}",
            keys.len(),
            self.options.photo_prefix
        );
        let index = GalleryIndex::build(self.store.as_ref(), &self.pipeline, &keys);
        let len = index.len();

        let mut slot = self.gallery.write().unwrap_or_else(|e| e.into_inner());
        *slot = Arc::new(index);
        Ok(len)
    }

    pub fn gallery(&self) -> Arc<GalleryIndex> {
        self.gallery
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn match_sketch(&self, bytes: &[u8]) -> Result<MatchResponse, ServiceError> {
        let query = self
            .pipeline
            .extract_embedding(bytes)
            .map_err(|e| match e {
                VisionError::Decode(_) => ServiceError::Sketch(e),
                other => ServiceError::Internal(other.to_string()),
            })?;

        let gallery = self.gallery();
        let result = matcher::best_match_with(&query, &gallery, self.options.scoring)
            .map_err(|e| match e {
                MatchError::NoMatch => ServiceError::NoGallery,
                other => ServiceError::Internal(other.to_string()),
            })?;

        log::info!(
            "sketch matched {} (distance {:.4}, similarity {:.2})",
            result.key,
            result.distance,
            result.similarity
        );
        Ok(MatchResponse {
            matched_image_id: result.key,
            similarity: result.similarity,
        })
    }

    /// Fetch a gallery photo. `image_id` is either relative to the photo prefix
    /// or a full key as returned in [`MatchResponse::matched_image_id`].
    pub fn photo(&self, image_id: &str) -> Result<Photo, ServiceError> {
        let relative = image_id
            .strip_prefix(self.options.photo_prefix.as_str())
            .unwrap_or(image_id);
        let key = format!("{}{}", self.options.photo_prefix, relative);
        let data = self.store.get(&key).map_err(|e| match e {
            StoreError::NotFound(_) => ServiceError::ImageNotFound(image_id.to_string()),
            other => ServiceError::Store(other),
        })?;
        Ok(Photo {
            data,
            content_type: content_type_for(image_id),
        })
    }
}

fn content_type_for(image_id: &str) -> &'static str {
    image::ImageFormat::from_path(image_id)
        .map(|f| f.to_mime_type())
        .unwrap_or("image/jpeg")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type() {
        assert_eq!(content_type_for("a.png"), "image/png");
        assert_eq!(content_type_for("a.JPG"), "image/jpeg");
        assert_eq!(content_type_for("noext"), "image/jpeg");
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(ServiceError::ImageNotFound("x".into()).to_string(), "Image not found");
        assert_eq!(ServiceError::NoGallery.to_string(), "No gallery available");
    }
}
