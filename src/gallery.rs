//! In-memory cache of gallery photo embeddings.

use std::collections::HashSet;

use rayon::prelude::*;

use crate::storage::{ImageStore, StoreError};
use crate::{Embedding, Pipeline};

#[derive(Debug, Clone)]
pub struct GalleryEntry {
    pub key: String,
    pub embedding: Embedding,
}

/// Ordered, read-only collection of gallery embeddings.
///
/// Entry order is the order of the key list the index was built from, which
/// is what the matcher's tie-breaking relies on.
#[derive(Debug, Clone, Default)]
pub struct GalleryIndex {
    entries: Vec<GalleryEntry>,
}

impl GalleryIndex {
    /// Fetch and embed every key. Images that cannot be fetched or decoded are
    /// logged and left out; the index is built from whatever succeeds.
    pub fn build(store: &dyn ImageStore, pipeline: &Pipeline, keys: &[String]) -> Self {
        let mut seen = HashSet::new();
        let unique: Vec<&String> = keys
            .iter()
            .filter(|k| {
                let fresh = seen.insert(k.as_str());
                if !fresh {
                    log::warn!("duplicate gallery key {}, keeping first", k);
                }
                fresh
            })
            .collect();

        let embedded: Vec<Option<GalleryEntry>> = unique
            .par_iter()
            .map(|key| match embed_one(store, pipeline, key) {
                Ok(embedding) => Some(GalleryEntry {
                    key: key.to_string(),
                    embedding,
                }),
                Err(e) => {
                    log::warn!("skipping gallery image {}: {}", key, e);
                    None
                }
            })
            .collect();

        let entries: Vec<GalleryEntry> = embedded.into_iter().flatten().collect();
        log::info!(
            "gallery built: {} of {} image(s) embedded",
            entries.len(),
            unique.len()
        );
        Self { entries }
    }

    pub fn from_entries(entries: Vec<GalleryEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&Embedding> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| &e.embedding)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
enum EmbedError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Vision(#[from] sketchrs_vision::VisionError),
}

fn embed_one(
    store: &dyn ImageStore,
    pipeline: &Pipeline,
    key: &str,
) -> Result<Embedding, EmbedError> {
    let bytes = store.get(key)?;
    Ok(pipeline.extract_embedding(&bytes)?)
}

/// Gallery photo keys under `prefix` whose extension is in `extensions`
/// (case-insensitive), sorted.
pub fn discover_keys(
    store: &dyn ImageStore,
    prefix: &str,
    extensions: &[String],
) -> Result<Vec<String>, StoreError> {
    let mut keys: Vec<String> = store
        .list(prefix)?
        .into_iter()
        .filter(|key| {
            key.rsplit_once('.').is_some_and(|(_, ext)| {
                extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
        })
        .collect();
    keys.sort();
    Ok(keys)
}
