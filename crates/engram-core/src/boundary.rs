//! External Boundary Contracts
//!
//! The engine grows by passive observation, but the observers themselves -
//! coding-agent hooks, version-control walkers, import scanners, session-log
//! importers, file watchers, snippet extractors - live outside this crate.
//! These traits pin down what those collaborators provide to and consume from
//! the engine, so host integrations can be swapped without touching engine
//! internals. The engine does not distinguish sources once events arrive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::{EngineError, Engine};
use crate::memory::{Neuron, NeuronType, RecallResult, SnippetKind};

// ============================================================================
// REFERENCE SEED WEIGHTS
// ============================================================================
//
// Fixed weights the bootstrap collaborators use for their edges. They live
// here rather than in the collaborators so all sources agree on the scale.

/// Import-graph scanner edge weight
pub const IMPORT_EDGE_WEIGHT: f64 = 0.5;

/// Filename-pattern scanner edge weight
pub const FILENAME_EDGE_WEIGHT: f64 = 0.3;

/// Structural (wiki-link) scanner edge weight
pub const WIKILINK_EDGE_WEIGHT: f64 = 0.6;

/// Session-log importer co-access weight
pub const SESSION_LOG_EDGE_WEIGHT: f64 = 0.4;

/// Commit bipartite-projection weight range
pub const COMMIT_EDGE_WEIGHT_RANGE: (f64, f64) = (0.05, 0.95);

// ============================================================================
// SEED BATCHES
// ============================================================================

/// A neuron to seed without triggering Hebbian updates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedNeuron {
    pub path: String,
    pub neuron_type: NeuronType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// A bidirectional edge to seed with MAX-merge semantics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedSynapse {
    pub path_a: String,
    pub path_b: String,
    pub weight: f64,
    #[serde(default)]
    pub co_access_count: Option<i64>,
}

/// One batch of bootstrap output
///
/// Sources emit batches at natural boundaries (one commit, one scanned file)
/// so the engine can clear its co-access window between logical groups.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedBatch {
    #[serde(default)]
    pub neurons: Vec<SeedNeuron>,
    #[serde(default)]
    pub synapses: Vec<SeedSynapse>,
}

/// A snippet row produced by an external extractor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetRecord {
    pub file_path: String,
    pub name: String,
    pub kind: SnippetKind,
    pub start_line: i64,
    pub end_line: i64,
    pub source: String,
    pub content_hash: String,
}

// ============================================================================
// TRAITS
// ============================================================================

/// What the engine offers observation producers
///
/// Hooks wrap these calls in their own safety timeout and swallow errors -
/// a failing observation must never block the host agent.
pub trait ObservationSink {
    /// Record one observation (file read/write, tool invocation, lookup)
    fn observe(
        &mut self,
        path: &str,
        neuron_type: NeuronType,
        query: Option<&str>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Neuron, EngineError>;

    /// Record an error occurrence; returns the error neuron and fix candidates
    fn observe_error(
        &mut self,
        raw_error: &str,
        query: Option<&str>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<(Neuron, Vec<RecallResult>), EngineError>;

    /// Record which files fixed a previously observed error
    fn observe_resolution(
        &mut self,
        raw_error: &str,
        fix_paths: &[String],
        context: Option<&str>,
    ) -> Result<(), EngineError>;
}

impl ObservationSink for Engine {
    fn observe(
        &mut self,
        path: &str,
        neuron_type: NeuronType,
        query: Option<&str>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Neuron, EngineError> {
        self.record(path, neuron_type, query, timestamp)
    }

    fn observe_error(
        &mut self,
        raw_error: &str,
        query: Option<&str>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<(Neuron, Vec<RecallResult>), EngineError> {
        self.record_error(raw_error, query, timestamp)
    }

    fn observe_resolution(
        &mut self,
        raw_error: &str,
        fix_paths: &[String],
        context: Option<&str>,
    ) -> Result<(), EngineError> {
        self.resolve_error(raw_error, fix_paths, context)
    }
}

/// A bootstrap source: commit history walker, import scanner, session-log
/// importer, filename heuristics
pub trait BootstrapSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Next batch of seeds, or `None` when exhausted
    fn next_batch(&mut self) -> Result<Option<SeedBatch>, Self::Error>;
}

/// An external snippet extractor (grammar-library based, out of process)
pub trait SnippetProvider {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Extract snippet rows for one file path
    fn snippets_for(&mut self, file_path: &str) -> Result<Vec<SnippetRecord>, Self::Error>;
}

/// A sentence embedding model as the engine sees it
///
/// Returning `None` means the model is unavailable; callers degrade to
/// keyword-only behavior. Returned vectors are unit-normalized with a fixed
/// dimension.
pub trait TextEmbedder {
    /// Embed a text, or `None` when the model is unavailable
    fn embed_text(&self, text: &str) -> Option<Vec<f32>>;

    /// Fixed output dimension
    fn dimensions(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_batch_deserializes_with_defaults() {
        let batch: SeedBatch = serde_json::from_str("{}").unwrap();
        assert!(batch.neurons.is_empty());
        assert!(batch.synapses.is_empty());

        let batch: SeedBatch = serde_json::from_str(
            r#"{"synapses": [{"pathA": "/a", "pathB": "/b", "weight": 0.5}]}"#,
        )
        .unwrap();
        assert_eq!(batch.synapses.len(), 1);
        assert!(batch.synapses[0].co_access_count.is_none());
    }

    #[test]
    fn test_weight_range_sanity() {
        let (lo, hi) = COMMIT_EDGE_WEIGHT_RANGE;
        assert!(lo < hi && lo >= 0.0 && hi <= 1.0);
    }
}
