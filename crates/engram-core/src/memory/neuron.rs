//! Neuron - The fundamental unit of the memory graph
//!
//! Each neuron is a directed memory node with:
//! - A type discriminator (file, tool, error, semantic)
//! - Short-term activation and long-term myelination
//! - A bounded context list (the queries that activated it)
//! - Optional semantic embedding metadata
//!
//! Synapses are directed weighted edges between neurons; both directions of a
//! co-access are stored as independent rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// NEURON TYPES
// ============================================================================

/// Types of memory neurons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NeuronType {
    /// A file in the observed source tree
    #[default]
    File,
    /// A tool the agent invoked (grep, bash, editor, ...)
    Tool,
    /// A normalized error string or error fingerprint
    Error,
    /// An opaque concept key (commit:<hash>, session:<id>, ...)
    Semantic,
}

impl NeuronType {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            NeuronType::File => "file",
            NeuronType::Tool => "tool",
            NeuronType::Error => "error",
            NeuronType::Semantic => "semantic",
        }
    }

    /// Parse from string name
    pub fn parse_name(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "file" => NeuronType::File,
            "tool" => NeuronType::Tool,
            "error" => NeuronType::Error,
            "semantic" => NeuronType::Semantic,
            _ => NeuronType::File,
        }
    }
}

impl std::fmt::Display for NeuronType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Build the stable neuron id `<type>:<path>`
pub fn neuron_id(neuron_type: NeuronType, path: &str) -> String {
    format!("{}:{}", neuron_type.as_str(), path)
}

// ============================================================================
// NEURON
// ============================================================================

/// A neuron in the memory graph
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Neuron {
    /// Stable id of the form `<type>:<path>`
    pub id: String,
    /// Type discriminator - every operation branches on this at runtime
    pub neuron_type: NeuronType,
    /// Filesystem path, tool name, normalized error, or concept key
    pub path: String,
    /// Short-term excitement, decays quickly (0.0 - 1.0)
    pub activation: f64,
    /// Long-term consolidation, grows slowly (0.0 - 0.95)
    pub myelination: f64,
    /// Total recorded accesses
    pub access_count: i64,
    /// When the neuron last fired
    pub last_accessed: DateTime<Utc>,
    /// When the neuron was created
    pub created_at: DateTime<Utc>,
    /// Bounded, deduplicated list of activating queries/contexts
    pub contexts: Vec<String>,
    /// Whether a semantic embedding is stored for this neuron
    pub has_embedding: bool,
    /// Optional project tag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Consecutive sessions this neuron was recalled but never opened
    pub ignore_streak: i64,
}

impl Neuron {
    /// Basename stem of the path (file name without extension)
    ///
    /// For non-file neurons this is just the final path segment.
    pub fn stem(&self) -> &str {
        let base = self
            .path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(self.path.as_str());
        base.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(base)
    }

    /// File extension, lowercased, if any
    pub fn extension(&self) -> Option<String> {
        let base = self.path.rsplit(['/', '\\']).next()?;
        base.rsplit_once('.').map(|(_, ext)| ext.to_lowercase())
    }

    /// Whether this neuron has crossed into superhighway territory
    pub fn is_superhighway(&self) -> bool {
        self.myelination > 0.5
    }
}

/// Append a context string to a bounded, deduplicated context list
///
/// Re-adding an existing context is a no-op. When the list exceeds `cap`, the
/// oldest entries are trimmed from the front.
pub fn push_context(contexts: &mut Vec<String>, context: &str, cap: usize) {
    let context = context.trim();
    if context.is_empty() || contexts.iter().any(|c| c == context) {
        return;
    }
    contexts.push(context.to_string());
    if contexts.len() > cap {
        let excess = contexts.len() - cap;
        contexts.drain(..excess);
    }
}

// ============================================================================
// SYNAPSE
// ============================================================================

/// A directed weighted edge between two neurons
///
/// Both directions of a co-access exist as independent rows; their weights
/// start equal and may diverge under asymmetric access patterns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Synapse {
    pub source_id: String,
    pub target_id: String,
    /// Edge strength (0.0 - 1.0)
    pub weight: f64,
    /// Number of co-access events that touched this edge
    pub co_access_count: i64,
    /// When the edge last fired
    pub last_fired: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Synaptic tag - set at birth, cleared by capture or expiry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tagged_at: Option<DateTime<Utc>>,
}

// ============================================================================
// ACCESS LOG / SESSIONS
// ============================================================================

/// One row per `record` call - the episodic memory trace
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogEntry {
    pub id: i64,
    pub neuron_id: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub token_cost: i64,
    /// Monotonic position within the session
    pub access_order: i64,
}

/// Aggregate counters for one observation session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub total_accesses: i64,
    pub tokens_used: i64,
    pub tokens_saved: i64,
    pub hit_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
}

// ============================================================================
// SNIPPETS
// ============================================================================

/// Kinds of extracted code snippets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SnippetKind {
    #[default]
    Function,
    Class,
    Method,
    Struct,
    Trait,
    Enum,
}

impl SnippetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnippetKind::Function => "function",
            SnippetKind::Class => "class",
            SnippetKind::Method => "method",
            SnippetKind::Struct => "struct",
            SnippetKind::Trait => "trait",
            SnippetKind::Enum => "enum",
        }
    }

    pub fn parse_name(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "class" => SnippetKind::Class,
            "method" => SnippetKind::Method,
            "struct" => SnippetKind::Struct,
            "trait" => SnippetKind::Trait,
            "enum" => SnippetKind::Enum,
            _ => SnippetKind::Function,
        }
    }
}

/// A code snippet extracted from a file neuron by an external process
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub id: String,
    /// File neuron this snippet belongs to (cascade-deleted with it)
    pub parent_neuron_id: String,
    pub name: String,
    pub kind: SnippetKind,
    pub start_line: i64,
    pub end_line: i64,
    pub source: String,
    pub has_embedding: bool,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A snippet hit attached to a recall result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetMatch {
    pub snippet_id: String,
    pub name: String,
    pub kind: SnippetKind,
    pub start_line: i64,
    pub end_line: i64,
    pub similarity: f64,
}

// ============================================================================
// RECALL RESULTS
// ============================================================================

/// One ranked recall suggestion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecallResult {
    pub neuron: Neuron,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// How the neuron was reached: `direct`, `spread(k) via ...`,
    /// `myelinated`, `episodic`, `fingerprint: ...`, `snippet`,
    /// `error→fix (resolved)`
    pub activation_path: String,
    /// Estimated tokens the caller avoids spending by being pointed here
    pub tokens_saved: i64,
    /// Snippet-level matches, when the snippet phase contributed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub snippets: Vec<SnippetMatch>,
}

// ============================================================================
// STATS
// ============================================================================

/// Aggregate statistics over the whole store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    pub total_neurons: i64,
    pub file_neurons: i64,
    pub tool_neurons: i64,
    pub error_neurons: i64,
    pub semantic_neurons: i64,
    pub total_synapses: i64,
    pub average_weight: f64,
    pub average_myelination: f64,
    pub superhighways: i64,
    pub tagged_synapses: i64,
    pub access_log_rows: i64,
    pub sessions: i64,
    pub snippets: i64,
    pub neurons_with_embeddings: i64,
}

/// Token accounting across sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenReport {
    pub tokens_used: i64,
    pub tokens_saved: i64,
    pub net: i64,
    pub sessions_counted: i64,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neuron_type_roundtrip() {
        for t in [
            NeuronType::File,
            NeuronType::Tool,
            NeuronType::Error,
            NeuronType::Semantic,
        ] {
            assert_eq!(NeuronType::parse_name(t.as_str()), t);
        }
    }

    #[test]
    fn test_neuron_id_format() {
        assert_eq!(neuron_id(NeuronType::File, "/src/main.rs"), "file:/src/main.rs");
        assert_eq!(neuron_id(NeuronType::Tool, "Grep"), "tool:Grep");
    }

    #[test]
    fn test_stem_and_extension() {
        let n = Neuron {
            id: neuron_id(NeuronType::File, "/src/auth/session.rs"),
            neuron_type: NeuronType::File,
            path: "/src/auth/session.rs".into(),
            activation: 1.0,
            myelination: 0.0,
            access_count: 1,
            last_accessed: Utc::now(),
            created_at: Utc::now(),
            contexts: vec![],
            has_embedding: false,
            project: None,
            ignore_streak: 0,
        };
        assert_eq!(n.stem(), "session");
        assert_eq!(n.extension().as_deref(), Some("rs"));
    }

    #[test]
    fn test_push_context_dedup_and_cap() {
        let mut contexts = vec![];
        push_context(&mut contexts, "auth flow", 3);
        push_context(&mut contexts, "auth flow", 3);
        assert_eq!(contexts.len(), 1);

        push_context(&mut contexts, "token refresh", 3);
        push_context(&mut contexts, "login", 3);
        push_context(&mut contexts, "logout", 3);
        // Trimmed from the front
        assert_eq!(contexts, vec!["token refresh", "login", "logout"]);
    }

    #[test]
    fn test_push_context_ignores_empty() {
        let mut contexts = vec![];
        push_context(&mut contexts, "   ", 5);
        assert!(contexts.is_empty());
    }
}
