pub mod embedding;
pub mod error;
pub mod layers;
pub mod model;
pub mod network;
pub mod normalize;
pub mod pipeline;
pub mod weights;

// Re-export commonly used types
pub use embedding::{Embedding, EmbeddingModel, EMBEDDING_DIM};
pub use error::VisionError;
pub use network::CiteNet;
pub use normalize::{normalize, Tensor, INPUT_SIZE};
pub use pipeline::Pipeline;
pub use weights::StateDict;
