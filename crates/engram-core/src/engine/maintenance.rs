//! Maintenance Pass
//!
//! The self-healing cycle (Tononi & Cirelli 2006 synaptic homeostasis, in
//! spirit): multiplicative decay, noise-bridge weakening, tiered pruning,
//! dead-neuron and orphan cleanup, then network-wide homeostatic scaling.
//! Runs on session rotation, idle timers, or operator demand; the whole pass
//! executes inside one store transaction, and an individual step that fails
//! is logged and skipped rather than aborting the pass.

use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{Engine, Result};

/// Prune tier 1: very weak edges idle for a week
const PRUNE_WEAK_DAYS: i64 = 7;

/// Prune tier 2: weak single-shot edges idle for three days
const PRUNE_SPARSE_DAYS: i64 = 3;

/// Prune tier 3: sub-consolidated edges idle for a month
const PRUNE_STALE_DAYS: i64 = 30;

// ============================================================================
// REPORTS
// ============================================================================

/// Counters from one homeostasis pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeostasisReport {
    /// Scaling ratio applied to file myelination, when the average ran hot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub myelination_scale: Option<f64>,
    /// Scaling ratio applied to synapse weights, when the average ran hot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_scale: Option<f64>,
    pub hyperactive_penalized: usize,
    pub underactive_boosted: usize,
    pub tags_expired: usize,
}

/// Counters from one full maintenance pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceReport {
    pub neurons_decayed: usize,
    pub synapses_decayed: usize,
    pub noise_bridges_weakened: usize,
    pub synapses_pruned: usize,
    pub dead_neurons_pruned: usize,
    pub orphan_files_pruned: usize,
    pub homeostasis: HomeostasisReport,
    pub duration_ms: u64,
}

impl Engine {
    // ========================================================================
    // DECAY
    // ========================================================================

    /// Run the full maintenance cycle now
    pub fn decay(&mut self) -> Result<MaintenanceReport> {
        self.decay_at(Utc::now())
    }

    /// Run the full maintenance cycle relative to an explicit clock
    pub fn decay_at(&mut self, now: DateTime<Utc>) -> Result<MaintenanceReport> {
        let start = Instant::now();
        let config = self.config.clone();
        let mut report = MaintenanceReport::default();

        self.store.exclusive(|ops| {
            // 1. Multiplicative decay
            match ops.decay_neurons(
                config.activation_decay,
                config.myelination_decay,
                config.myelination_ceiling,
            ) {
                Ok(n) => report.neurons_decayed = n,
                Err(e) => tracing::warn!("Neuron decay failed: {}", e),
            }
            match ops.decay_synapses(config.synapse_decay) {
                Ok(n) => report.synapses_decayed = n,
                Err(e) => tracing::warn!("Synapse decay failed: {}", e),
            }

            // 2. Noise-bridge weakening: low-signal edges into cold files
            match ops.weaken_noise_bridges(config.noise_bridge_factor, 0.3, 2, 0.1, 0.05) {
                Ok(n) => report.noise_bridges_weakened = n,
                Err(e) => tracing::warn!("Noise-bridge weakening failed: {}", e),
            }

            // 3. Tiered pruning plus the flat safety net
            match ops.prune_synapses_tiered(
                now - Duration::days(PRUNE_WEAK_DAYS),
                now - Duration::days(PRUNE_SPARSE_DAYS),
                now - Duration::days(PRUNE_STALE_DAYS),
            ) {
                Ok(n) => report.synapses_pruned = n,
                Err(e) => tracing::warn!("Synapse pruning failed: {}", e),
            }

            // 4. Dead neurons
            match ops.prune_dead_neurons() {
                Ok(n) => report.dead_neurons_pruned = n,
                Err(e) => tracing::warn!("Dead-neuron pruning failed: {}", e),
            }

            // 5. Orphaned files
            match ops.prune_orphan_files() {
                Ok(n) => report.orphan_files_pruned = n,
                Err(e) => tracing::warn!("Orphan pruning failed: {}", e),
            }

            // 6. Homeostasis
            report.homeostasis = run_homeostasis(ops, &config, now);

            Ok(())
        })?;

        // Pruning may have removed neurons the in-memory window still names;
        // scrub them so the next record never wires against a dead id
        if report.dead_neurons_pruned > 0 || report.orphan_files_pruned > 0 {
            self.scrub_window()?;
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "Maintenance: {} synapses pruned, {} dead neurons, {} orphans",
            report.synapses_pruned,
            report.dead_neurons_pruned,
            report.orphan_files_pruned
        );
        Ok(report)
    }

    /// Drop window and tool-chain entries whose neurons no longer exist
    fn scrub_window(&mut self) -> Result<()> {
        let mut live = Vec::with_capacity(self.window.len());
        for id in self.window.iter().chain(self.tool_chain.iter()) {
            if self.store.read(|ops| ops.get_neuron(id))?.is_some() {
                live.push(id.clone());
            }
        }
        self.window.retain(|id| live.contains(id));
        self.tool_chain.retain(|id| live.contains(id));
        Ok(())
    }

    // ========================================================================
    // HOMEOSTASIS
    // ========================================================================

    /// Run homeostatic scaling on its own (operator surface)
    pub fn homeostasis(&mut self) -> Result<HomeostasisReport> {
        self.homeostasis_at(Utc::now())
    }

    /// Homeostasis relative to an explicit clock
    pub fn homeostasis_at(&mut self, now: DateTime<Utc>) -> Result<HomeostasisReport> {
        let config = self.config.clone();
        self.store
            .exclusive(|ops| Ok(run_homeostasis(ops, &config, now)))
    }
}

/// Network-wide balance without changing rank order
///
/// Scaling is uniform, so relative ordering of myelination and weights is
/// preserved; only the absolute level is pulled back to target.
fn run_homeostasis(
    ops: &crate::storage::Ops<'_>,
    config: &crate::config::EngineConfig,
    now: DateTime<Utc>,
) -> HomeostasisReport {
    let mut report = HomeostasisReport::default();

    // Average file myelination back to target
    match ops.avg_file_myelination() {
        Ok(avg) if avg > config.myelination_target => {
            let ratio = config.myelination_target / avg;
            match ops.scale_file_myelination(ratio, config.myelination_ceiling) {
                Ok(_) => report.myelination_scale = Some(ratio),
                Err(e) => tracing::warn!("Myelination scaling failed: {}", e),
            }
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("Myelination average unavailable: {}", e),
    }

    // Average synapse weight back to target
    match ops.avg_synapse_weight() {
        Ok(avg) if avg > config.weight_target => {
            let ratio = config.weight_target / avg;
            match ops.scale_synapse_weights(ratio) {
                Ok(_) => report.weight_scale = Some(ratio),
                Err(e) => tracing::warn!("Weight scaling failed: {}", e),
            }
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("Weight average unavailable: {}", e),
    }

    // Hyperactive neurons cool off, underactive-but-valuable ones warm up
    match ops.avg_file_access_count() {
        Ok(avg) if avg > 0.0 => {
            match ops.penalize_hyperactive(avg * 3.0, 0.9) {
                Ok(n) => report.hyperactive_penalized = n,
                Err(e) => tracing::warn!("Hyperactive penalty failed: {}", e),
            }
            match ops.boost_underactive(avg / 3.0, 0.05, 1.05, config.myelination_ceiling) {
                Ok(n) => report.underactive_boosted = n,
                Err(e) => tracing::warn!("Underactive boost failed: {}", e),
            }
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("Access average unavailable: {}", e),
    }

    // Expire synaptic tags past the capture window
    match ops.expire_tags(now - Duration::minutes(config.capture_window_minutes)) {
        Ok(n) => report.tags_expired = n,
        Err(e) => tracing::warn!("Tag expiry failed: {}", e),
    }

    report
}
