//! Engine Configuration
//!
//! Every numeric knob of the memory engine lives here. These are behavioral
//! constants: changing any of them changes learning, recall, and maintenance
//! outcomes, so they are grouped in one struct instead of being scattered as
//! magic numbers.

use serde::{Deserialize, Serialize};

/// Configuration for the associative memory engine
///
/// `Default` gives the reference behavior. Construct a custom config only for
/// experiments; persisted graphs trained under one config remain readable
/// under another, they just evolve differently from then on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    // ========== Hebbian write path ==========
    /// Sequential co-access window size (distinct neurons)
    pub window_size: usize,
    /// Recent tool sequence length kept for prediction
    pub tool_chain_size: usize,
    /// Base Hebbian learning rate
    pub learning_rate: f64,
    /// Delta multiplier when either endpoint is an error neuron
    pub error_boost: f64,
    /// Delta multiplier when either endpoint is a hub
    pub hub_penalty: f64,
    /// Outgoing-synapse count above which a neuron counts as a hub
    pub hub_degree_threshold: i64,
    /// SNAP sigmoid steepness
    pub snap_steepness: f64,
    /// SNAP sigmoid midpoint
    pub snap_midpoint: f64,

    // ========== Myelination (BCM) ==========
    /// Base myelination increment per access
    pub myelination_base: f64,
    /// Hard myelination ceiling
    pub myelination_ceiling: f64,

    // ========== Synaptic tag-and-capture ==========
    /// Consolidated weight floor applied on capture
    pub tag_capture_floor: f64,
    /// Minutes a tag stays capturable before expiry
    pub capture_window_minutes: i64,

    // ========== Recall ==========
    /// Confidence gate for every phase except the myelinated fallback
    pub confidence_gate: f64,
    /// Lower gate used by the myelinated fallback
    pub myelin_gate: f64,
    /// Maximum BFS spreading depth
    pub spread_max_hops: usize,
    /// Strongest outgoing synapses followed per seed
    pub spread_top_k: usize,
    /// Minimum synapse weight eligible for traversal
    pub min_traversal_weight: f64,
    /// Fan-out cap inside the spreading discount
    pub fanout_cap: i64,
    /// Cosine similarity admission threshold for semantic candidates
    pub semantic_threshold: f64,
    /// Cosine gate for snippet matches
    pub snippet_gate: f64,
    /// Snippet matches considered per recall
    pub snippet_top_k: usize,
    /// Approximate token cost charged per emitted file result
    pub file_token_cost: i64,
    /// Approximate token cost charged per emitted tool/lookup result
    pub lookup_token_cost: i64,
    /// Default recall token budget
    pub default_token_budget: i64,
    /// Default recall result limit
    pub default_limit: usize,
    /// Days of access log considered by the episodic phase
    pub episodic_window_days: i64,

    // ========== Maintenance ==========
    /// Multiplicative activation decay per maintenance pass
    pub activation_decay: f64,
    /// Multiplicative myelination decay per maintenance pass
    pub myelination_decay: f64,
    /// Multiplicative synapse weight decay per maintenance pass
    pub synapse_decay: f64,
    /// Extra weakening applied to detected noise bridges
    pub noise_bridge_factor: f64,
    /// Homeostatic target for average file myelination
    pub myelination_target: f64,
    /// Homeostatic target for average synapse weight
    pub weight_target: f64,

    // ========== Anti-recall ==========
    /// Per-streak weakening rate for ignored recalls
    pub anti_recall_rate: f64,
    /// Weight floor anti-recall never crosses
    pub anti_recall_floor: f64,

    // ========== Episodic retention ==========
    /// Access-log rows older than this are truncated by consolidation
    pub access_log_max_age_days: i64,
    /// Hard cap on retained access-log rows
    pub access_log_cap: i64,

    // ========== Sessions ==========
    /// Idle minutes after which a new session starts
    pub session_idle_minutes: i64,

    // ========== Neuron state ==========
    /// Maximum contexts retained per neuron
    pub contexts_cap: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_size: 25,
            tool_chain_size: 10,
            learning_rate: 0.1,
            error_boost: 2.0,
            hub_penalty: 0.5,
            hub_degree_threshold: 20,
            snap_steepness: 8.0,
            snap_midpoint: 0.5,
            myelination_base: 0.02,
            myelination_ceiling: 0.95,
            tag_capture_floor: 0.3,
            capture_window_minutes: 60,
            confidence_gate: 0.4,
            myelin_gate: 0.15,
            spread_max_hops: 3,
            spread_top_k: 10,
            min_traversal_weight: 0.3,
            fanout_cap: 50,
            semantic_threshold: 0.25,
            snippet_gate: 0.35,
            snippet_top_k: 20,
            file_token_cost: 1500,
            lookup_token_cost: 500,
            default_token_budget: 10_000,
            default_limit: 5,
            episodic_window_days: 7,
            activation_decay: 0.15,
            myelination_decay: 0.005,
            synapse_decay: 0.02,
            noise_bridge_factor: 0.2,
            myelination_target: 0.15,
            weight_target: 0.35,
            anti_recall_rate: 0.1,
            anti_recall_floor: 0.1,
            access_log_max_age_days: 30,
            access_log_cap: 5000,
            session_idle_minutes: 15,
            contexts_cap: 20,
        }
    }
}

impl EngineConfig {
    /// SNAP plasticity multiplier for a current weight
    ///
    /// A logistic gate that freezes strong synapses: near-zero weights pass
    /// almost the full delta through, weights near 1.0 almost none.
    pub fn snap(&self, weight: f64) -> f64 {
        1.0 / (1.0 + (self.snap_steepness * (weight - self.snap_midpoint)).exp())
    }

    /// BCM-style myelination delta for an existing neuron
    ///
    /// `access_count` is the number of accesses recorded so far (before the
    /// one being applied). Deltas shrink as both myelination and access count
    /// grow, and go to zero at the ceiling.
    pub fn myelination_delta(&self, myelination: f64, access_count: i64) -> f64 {
        let headroom = 1.0 - myelination / self.myelination_ceiling;
        let rate = (1.0 / (access_count.max(1) as f64).sqrt()).max(0.1);
        self.myelination_base * headroom.max(0.0) * rate
    }

    /// Token cost charged for a recall result of the given neuron type
    pub fn token_cost(&self, neuron_type: crate::memory::NeuronType) -> i64 {
        match neuron_type {
            crate::memory::NeuronType::File => self.file_token_cost,
            _ => self.lookup_token_cost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snap_is_sigmoid() {
        let cfg = EngineConfig::default();
        // Fresh synapses pass nearly the full delta
        assert!(cfg.snap(0.0) > 0.95);
        // Midpoint passes half
        assert!((cfg.snap(0.5) - 0.5).abs() < 1e-9);
        // Strong synapses are nearly frozen
        assert!(cfg.snap(0.85) < 0.1);
        assert!(cfg.snap(1.0) < cfg.snap(0.9));
    }

    #[test]
    fn test_myelination_delta_shrinks() {
        let cfg = EngineConfig::default();
        let d1 = cfg.myelination_delta(0.0, 1);
        let d2 = cfg.myelination_delta(d1, 2);
        let d3 = cfg.myelination_delta(d1 + d2, 3);
        assert!(d1 > d2 && d2 > d3);
        assert!(d1 <= cfg.myelination_base);
    }

    #[test]
    fn test_myelination_delta_zero_at_ceiling() {
        let cfg = EngineConfig::default();
        assert!(cfg.myelination_delta(0.95, 10).abs() < 1e-12);
    }

    #[test]
    fn test_rate_floor_for_heavy_neurons() {
        let cfg = EngineConfig::default();
        // 1/sqrt(10_000) = 0.01 < 0.1 floor
        let d = cfg.myelination_delta(0.0, 10_000);
        assert!((d - cfg.myelination_base * 0.1).abs() < 1e-12);
    }
}
