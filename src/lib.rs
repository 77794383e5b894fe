pub mod config;
pub mod gallery;
pub mod matcher;
pub mod server;
pub mod service;
pub mod storage;

// Re-export vision types for convenience
pub use sketchrs_vision::{normalize, Embedding, EmbeddingModel, Pipeline, VisionError};
