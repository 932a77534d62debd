//! Semantic Embeddings Module
//!
//! The vector math and serialization are always available; model inference
//! (fastembed, ONNX) sits behind the `embeddings` feature so the engine can
//! be built without pulling in an inference runtime. Model absence is
//! degradation, never an error.

mod vector;

#[cfg(feature = "embeddings")]
mod background;
#[cfg(feature = "embeddings")]
mod local;

pub use vector::{cosine_similarity, Embedding, EMBEDDING_DIMENSIONS, MAX_TEXT_LENGTH};

#[cfg(feature = "embeddings")]
pub use background::{BackgroundEmbedder, DEFAULT_MAX_PENDING};
#[cfg(feature = "embeddings")]
pub use local::{EmbeddingError, EmbeddingService, BATCH_SIZE};
