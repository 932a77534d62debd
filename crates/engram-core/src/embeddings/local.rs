//! Local Embedding Model
//!
//! Wraps fastembed (ONNX) for fully local inference with all-MiniLM-L6-v2:
//! 384 dimensions, mean-pooled, unit-normalized. The engine treats the model
//! as a fallible function producing optional vectors; when it cannot be
//! initialized the caller degrades to keyword-only behavior.

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::{Mutex, OnceLock};

use super::vector::{Embedding, EMBEDDING_DIMENSIONS, MAX_TEXT_LENGTH};

/// Batch size for bulk embedding
pub const BATCH_SIZE: usize = 32;

// ============================================================================
// GLOBAL MODEL
// ============================================================================

/// Result of the one-time model initialization
static EMBEDDING_MODEL_RESULT: OnceLock<Result<Mutex<TextEmbedding>, String>> = OnceLock::new();

/// Cache directory for downloaded model files
///
/// `ENGRAM_MODEL_CACHE` overrides; otherwise the platform cache directory.
fn model_cache_dir() -> std::path::PathBuf {
    if let Ok(path) = std::env::var("ENGRAM_MODEL_CACHE") {
        return std::path::PathBuf::from(path);
    }

    if let Some(proj_dirs) = directories::ProjectDirs::from("com", "engram", "core") {
        return proj_dirs.cache_dir().join("fastembed");
    }

    std::path::PathBuf::from(".engram_model_cache")
}

fn get_model() -> Result<std::sync::MutexGuard<'static, TextEmbedding>, EmbeddingError> {
    let result = EMBEDDING_MODEL_RESULT.get_or_init(|| {
        let cache_dir = model_cache_dir();
        if let Err(e) = std::fs::create_dir_all(&cache_dir) {
            tracing::warn!("Failed to create model cache dir {:?}: {}", cache_dir, e);
        }

        let options = InitOptions::new(EmbeddingModel::AllMiniLML6V2)
            .with_show_download_progress(false)
            .with_cache_dir(cache_dir);

        TextEmbedding::try_new(options).map(Mutex::new).map_err(|e| {
            format!(
                "Failed to initialize all-MiniLM-L6-v2: {}. \
                Ensure the ONNX runtime is available and model files can be fetched.",
                e
            )
        })
    });

    match result {
        Ok(model) => model
            .lock()
            .map_err(|e| EmbeddingError::ModelInit(format!("Lock poisoned: {}", e))),
        Err(err) => Err(EmbeddingError::ModelInit(err.clone())),
    }
}

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Embedding error type
#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum EmbeddingError {
    /// Failed to initialize the model
    #[error("Model initialization failed: {0}")]
    ModelInit(String),
    /// Failed to generate an embedding
    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),
    /// Empty or otherwise unusable input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

// ============================================================================
// EMBEDDING SERVICE
// ============================================================================

/// Service for generating embeddings
#[derive(Default, Clone, Copy)]
pub struct EmbeddingService {
    _unused: (),
}

impl EmbeddingService {
    /// Create a new embedding service
    pub fn new() -> Self {
        Self { _unused: () }
    }

    /// Check whether the model is ready without treating absence as an error
    pub fn is_ready(&self) -> bool {
        match get_model() {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("Embedding model not ready: {}", e);
                false
            }
        }
    }

    /// Model name
    pub fn model_name(&self) -> &'static str {
        "sentence-transformers/all-MiniLM-L6-v2"
    }

    /// Embedding dimensions
    pub fn dimensions(&self) -> usize {
        EMBEDDING_DIMENSIONS
    }

    /// Generate an embedding for a single text
    pub fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("Text cannot be empty".into()));
        }

        let mut model = get_model()?;
        let text = truncate_on_boundary(text, MAX_TEXT_LENGTH);

        let vectors = model
            .embed(vec![text], None)
            .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))?;

        match vectors.into_iter().next() {
            Some(v) => {
                let mut embedding = Embedding::new(v);
                embedding.normalize();
                Ok(embedding)
            }
            None => Err(EmbeddingError::EmbeddingFailed(
                "No embedding generated".into(),
            )),
        }
    }

    /// Generate embeddings for multiple texts
    pub fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let mut model = get_model()?;
        let mut all = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(BATCH_SIZE) {
            let truncated: Vec<&str> = chunk
                .iter()
                .map(|t| truncate_on_boundary(t, MAX_TEXT_LENGTH))
                .collect();

            let vectors = model
                .embed(truncated, None)
                .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))?;

            for v in vectors {
                let mut embedding = Embedding::new(v);
                embedding.normalize();
                all.push(embedding);
            }
        }

        Ok(all)
    }
}

fn truncate_on_boundary(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    &text[..cut]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "héllo wörld ".repeat(400);
        let cut = truncate_on_boundary(&text, MAX_TEXT_LENGTH);
        assert!(cut.len() <= MAX_TEXT_LENGTH);
        assert!(cut.chars().count() > 0);
    }

    #[test]
    fn test_empty_input_rejected() {
        let service = EmbeddingService::new();
        assert!(matches!(
            service.embed("   "),
            Err(EmbeddingError::InvalidInput(_))
        ));
    }
}
