//! Memory Graph Module
//!
//! The data model: neurons (typed memory nodes), synapses (directed weighted
//! edges), the episodic access log, sessions, and extracted code snippets.

mod neuron;

pub use neuron::{
    neuron_id, push_context, AccessLogEntry, EngineStats, Neuron, NeuronType, RecallResult,
    SessionRecord, Snippet, SnippetKind, SnippetMatch, Synapse, TokenReport,
};
