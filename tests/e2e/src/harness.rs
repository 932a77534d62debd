//! Test Harness
//!
//! Isolated engine instances backed by temporary databases, with a fixed
//! clock so every scenario is deterministic. Embeddings are disabled: the
//! scenarios exercise the graph mechanics, and the keyword path is what runs
//! when no model is available anyway.

use std::path::PathBuf;

use chrono::{DateTime, Duration, TimeZone, Utc};
use engram_core::{Engine, EngineConfig, EngineOptions, Neuron, NeuronType};
use tempfile::TempDir;

/// Fixed scenario epoch
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 7, 30, 9, 0, 0).unwrap()
}

/// Seconds after the epoch
pub fn at(seconds: i64) -> DateTime<Utc> {
    t0() + Duration::seconds(seconds)
}

/// An engine on a throwaway store
///
/// The temp directory lives as long as the harness; dropping it deletes the
/// database.
pub struct TestEngine {
    pub engine: Engine,
    db_path: PathBuf,
    _dir: TempDir,
}

impl TestEngine {
    /// Fresh engine with default config and embeddings off
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Fresh engine with a custom config
    pub fn with_config(config: EngineConfig) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let db_path = dir.path().join("engram.db");
        let engine = Engine::with_options(EngineOptions {
            db_path: Some(db_path.clone()),
            config,
            enable_embeddings: false,
        })
        .expect("create engine");
        Self {
            engine,
            db_path,
            _dir: dir,
        }
    }

    /// Reopen a second engine over the same store (process-restart shape)
    pub fn reopen(&self) -> Engine {
        Engine::with_options(EngineOptions {
            db_path: Some(self.db_path.clone()),
            config: EngineConfig::default(),
            enable_embeddings: false,
        })
        .expect("reopen engine")
    }

    /// Record a file at a fixed time
    pub fn file(&mut self, path: &str, query: Option<&str>, when: DateTime<Utc>) -> Neuron {
        self.engine
            .record(path, NeuronType::File, query, Some(when))
            .expect("record file")
    }

    /// Record a tool at a fixed time
    pub fn tool(&mut self, name: &str, query: Option<&str>, when: DateTime<Utc>) -> Neuron {
        self.engine
            .record(name, NeuronType::Tool, query, Some(when))
            .expect("record tool")
    }

    /// Synapse weight, if the edge exists
    pub fn weight(&self, source: &str, target: &str) -> Option<f64> {
        self.engine
            .store()
            .get_synapse(source, target)
            .expect("read synapse")
            .map(|s| s.weight)
    }

    /// Assert the universal graph invariants hold right now
    pub fn assert_invariants(&self) {
        let synapses = self
            .engine
            .store()
            .strongest_synapses(100_000, 0)
            .expect("read synapses");
        for s in &synapses {
            assert!(
                (0.0..=1.0).contains(&s.weight),
                "weight out of range: {} -> {} = {}",
                s.source_id,
                s.target_id,
                s.weight
            );
            let mirror = self
                .engine
                .store()
                .get_synapse(&s.target_id, &s.source_id)
                .expect("read mirror");
            assert!(
                mirror.is_some(),
                "missing symmetric synapse for {} -> {}",
                s.source_id,
                s.target_id
            );
        }

        let neurons = self
            .engine
            .store()
            .all_neurons(100_000, 0)
            .expect("read neurons");
        for n in &neurons {
            assert!((0.0..=0.95 + 1e-9).contains(&n.myelination), "myelination: {}", n.id);
            assert!((0.0..=1.0).contains(&n.activation), "activation: {}", n.id);
            assert!(n.contexts.len() <= 20, "context cap: {}", n.id);
            let mut dedup = n.contexts.clone();
            dedup.sort();
            dedup.dedup();
            assert_eq!(dedup.len(), n.contexts.len(), "context dedup: {}", n.id);
        }
    }
}

impl Default for TestEngine {
    fn default() -> Self {
        Self::new()
    }
}
