use serde::{Deserialize, Serialize};

use crate::gallery::GalleryIndex;
use crate::Embedding;

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("no gallery available")]
    NoMatch,

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// How a raw distance becomes a [0, 100] similarity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Scoring {
    /// `100 * (1 - best / max)` over the distances of the current query. Depends on
    /// the spread of the gallery; a one-photo gallery always scores 0.
    #[default]
    Relative,
    /// `100 * (1 - best / reference_distance)`, clamped. Comparable across galleries.
    Calibrated { reference_distance: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub key: String,
    pub distance: f64,
    pub similarity: f64,
}

pub fn euclidean_distance(a: &Embedding, b: &Embedding) -> f64 {
    a.vector
        .iter()
        .zip(b.vector.iter())
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

pub fn best_match(query: &Embedding, index: &GalleryIndex) -> Result<MatchResult, MatchError> {
    best_match_with(query, index, Scoring::Relative)
}

/// Nearest gallery entry by Euclidean distance; ties go to the earliest entry.
pub fn best_match_with(
    query: &Embedding,
    index: &GalleryIndex,
    scoring: Scoring,
) -> Result<MatchResult, MatchError> {
    let mut best: Option<(usize, f64)> = None;
    let mut max_distance = 0.0_f64;

    for (i, entry) in index.entries().iter().enumerate() {
        if entry.embedding.len() != query.len() {
            return Err(MatchError::DimensionMismatch {
                expected: entry.embedding.len(),
                got: query.len(),
            });
        }
        let d = euclidean_distance(query, &entry.embedding);
        max_distance = max_distance.max(d);
        match best {
            Some((_, best_d)) if best_d <= d => {}
            _ => best = Some((i, d)),
        }
    }

    let (i, distance) = best.ok_or(MatchError::NoMatch)?;
    let similarity = match scoring {
        Scoring::Relative => relative_similarity(distance, max_distance),
        Scoring::Calibrated { reference_distance } => {
            calibrated_similarity(distance, reference_distance)
        }
    };

    Ok(MatchResult {
        key: index.entries()[i].key.clone(),
        distance,
        similarity,
    })
}

/// 0 whenever `best == max`: a single entry, or every entry equally far.
pub fn relative_similarity(best: f64, max: f64) -> f64 {
    if max <= best {
        return 0.0;
    }
    (100.0 * (1.0 - best / max)).clamp(0.0, 100.0)
}

pub fn calibrated_similarity(distance: f64, reference_distance: f64) -> f64 {
    if reference_distance <= 0.0 {
        return 0.0;
    }
    (100.0 * (1.0 - distance / reference_distance)).clamp(0.0, 100.0)
}
