//! # Engram Core
//!
//! Associative memory engine for AI coding agents. Watches an agent's tool
//! calls and, before each new turn, proposes a small ranked set of files,
//! tools, and error fixes likely relevant to the task at hand. Local,
//! persistent, grown entirely by passive observation - no labels, no
//! fine-tuning.
//!
//! The mechanics borrow from memory research:
//!
//! - **Hebbian learning** (Hebb, 1949): neurons that fire together inside a
//!   sliding sequential window wire together, in both directions.
//! - **BCM sliding threshold** (Bienenstock, Cooper & Munro, 1982):
//!   myelination increments shrink as consolidation and access count grow.
//! - **SNAP plasticity**: a sigmoid gate that freezes strong synapses so
//!   repeated co-access cannot run weights away.
//! - **Synaptic tag-and-capture** (Frey & Morris, 1997): new edges are born
//!   tagged; a touch within the capture window promotes them to a
//!   consolidated floor.
//! - **Spreading activation** (Collins & Loftus, 1975): recall follows
//!   synapses outward from direct hits, discounted by edge weight, target
//!   myelination, and fan-out, with max-merge on convergence.
//! - **Ebbinghaus review & sleep consolidation**: an offline pass replays
//!   sessions, reviews resting memories, and mines cross-session patterns.
//! - **Homeostasis** (Tononi & Cirelli, 2006): network-wide scaling keeps
//!   average myelination and weight near target without changing rank.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use engram_core::{Engine, NeuronType};
//!
//! let mut engine = Engine::new(None)?;
//!
//! // Observe the agent working
//! engine.record("/src/auth/session.rs", NeuronType::File, Some("fix token refresh"), None)?;
//! engine.record("Grep", NeuronType::Tool, Some("fix token refresh"), None)?;
//!
//! // Before the next turn, ask what matters
//! for hit in engine.recall("token refresh")? {
//!     println!("{:.2} {} ({})", hit.confidence, hit.neuron.path, hit.activation_path);
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `embeddings` (default): local semantic embeddings via fastembed
//! - `bundled-sqlite` (default): compile SQLite into the binary

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod boundary;
pub mod canon;
pub mod config;
pub mod engine;
pub mod memory;
pub mod snippets;
pub mod storage;

/// Semantic embeddings: vector math always, model inference behind `embeddings`
pub mod embeddings;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Data model
pub use memory::{
    neuron_id, AccessLogEntry, EngineStats, Neuron, NeuronType, RecallResult, SessionRecord,
    Snippet, SnippetKind, SnippetMatch, Synapse, TokenReport,
};

// Configuration
pub use config::EngineConfig;

// Error canonicalization
pub use canon::{fingerprint, normalize, ErrorFingerprint};

// Storage layer
pub use storage::{Store, StoreError, DB_PATH_ENV};

// Engine
pub use engine::{
    AntiRecallState, ConsolidationReport, Engine, EngineError, EngineOptions, HomeostasisReport,
    HubReport, MaintenanceReport, Prediction, StaleNeuron, TypeFilter,
};

// Boundary contracts
pub use boundary::{
    BootstrapSource, ObservationSink, SeedBatch, SeedNeuron, SeedSynapse, SnippetProvider,
    SnippetRecord, TextEmbedder,
};

// Embeddings
pub use embeddings::{cosine_similarity, Embedding, EMBEDDING_DIMENSIONS};

#[cfg(feature = "embeddings")]
pub use embeddings::{EmbeddingError, EmbeddingService};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model (all-MiniLM-L6-v2, 384 dimensions, unit-norm)
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        Engine, EngineConfig, EngineError, EngineOptions, EngineStats, Neuron, NeuronType,
        RecallResult, Store, StoreError, Synapse, TypeFilter,
    };

    #[cfg(feature = "embeddings")]
    pub use crate::{Embedding, EmbeddingService};
}
