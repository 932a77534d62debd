//! Sleep Consolidation
//!
//! The offline pass that reinforces existing structure and mines patterns
//! the online write path cannot see: whole-session replay, Ebbinghaus-style
//! review of resting myelination, cross-session and temporal co-occurrence
//! mining, directional weighting, and triplet closure. Finishes by truncating
//! the episodic log.
//!
//! Replay strengthens only synapses that already exist - consolidation never
//! invents first-time associations from replayed history, only the discovery
//! miners (steps 3 and 4) may create edges, and those are born tagged like
//! any other new edge.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::memory::AccessLogEntry;
use crate::storage::Ops;

use super::{Engine, Result};

/// Sessions replayed per pass
const REPLAY_MAX_SESSIONS: usize = 5;

/// Minimum accesses for a session to be worth replaying
const REPLAY_MIN_ACCESSES: i64 = 5;

/// Replay strengthening is a tenth of the online learning rate
const REPLAY_RATE_DIVISOR: f64 = 10.0;

/// Sessions a file pair must share before a cross-session edge is created
const CROSS_SESSION_MIN: usize = 3;

/// Seconds within which two accesses count as temporally proximate
const TEMPORAL_WINDOW_SECS: i64 = 60;

/// Proximate row-pairs required before a temporal edge is created
const TEMPORAL_MIN_PAIRS: usize = 3;

/// Access-order gap that still counts as a directed follow
const DIRECTIONAL_MAX_GAP: i64 = 5;

/// Observations required before a direction is considered dominant
const DIRECTIONAL_MIN_COUNT: usize = 5;

/// Neighbors scanned pairwise per node during triplet mining
const TRIPLET_NEIGHBOR_CAP: usize = 20;

/// Counters from one consolidation pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidationReport {
    pub sessions_replayed: usize,
    pub replay_reinforced: usize,
    pub reviews_boosted: usize,
    pub reviews_faded: usize,
    pub cross_session_created: usize,
    pub cross_session_reinforced: usize,
    pub temporal_created: usize,
    pub temporal_reinforced: usize,
    pub directional_boosted: usize,
    pub triplets_closed: usize,
    pub access_rows_pruned: usize,
    pub duration_ms: u64,
}

impl Engine {
    /// Run the consolidation pass now
    pub fn consolidate(&mut self) -> Result<ConsolidationReport> {
        self.consolidate_at(Utc::now())
    }

    /// Run the consolidation pass relative to an explicit clock
    pub fn consolidate_at(&mut self, now: DateTime<Utc>) -> Result<ConsolidationReport> {
        let start = Instant::now();
        let config = self.config.clone();
        let mut report = ConsolidationReport::default();

        self.store.exclusive(|ops| {
            if let Err(e) = replay_sessions(ops, &config, now, &mut report) {
                tracing::warn!("Session replay failed: {}", e);
            }
            if let Err(e) = ebbinghaus_review(ops, &config, now, &mut report) {
                tracing::warn!("Ebbinghaus review failed: {}", e);
            }
            let pairs = match cross_session_discovery(ops, &config, now, &mut report) {
                Ok(pairs) => pairs,
                Err(e) => {
                    tracing::warn!("Cross-session discovery failed: {}", e);
                    Vec::new()
                }
            };
            if let Err(e) = temporal_mining(ops, &config, now, &mut report) {
                tracing::warn!("Temporal mining failed: {}", e);
            }
            if let Err(e) = directional_weighting(ops, &config, now, &mut report) {
                tracing::warn!("Directional weighting failed: {}", e);
            }
            if let Err(e) = triplet_mining(ops, &config, now, &pairs, &mut report) {
                tracing::warn!("Triplet mining failed: {}", e);
            }
            match ops.prune_access_log(
                now - Duration::days(config.access_log_max_age_days),
                config.access_log_cap,
            ) {
                Ok(n) => report.access_rows_pruned = n,
                Err(e) => tracing::warn!("Episodic pruning failed: {}", e),
            }
            Ok(())
        })?;

        report.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "Consolidation: {} sessions replayed, {} cross-session edges, {} triplets",
            report.sessions_replayed,
            report.cross_session_created,
            report.triplets_closed
        );
        Ok(report)
    }
}

// ============================================================================
// STEP 1 - SESSION REPLAY
// ============================================================================

/// Re-walk recent sessions through a simulated window, strengthening only
/// synapses that already exist
fn replay_sessions(
    ops: &Ops<'_>,
    config: &EngineConfig,
    now: DateTime<Utc>,
    report: &mut ConsolidationReport,
) -> crate::storage::Result<()> {
    let since = now - Duration::days(config.episodic_window_days);
    let sessions = ops.sessions_with_min_accesses(since, REPLAY_MIN_ACCESSES, REPLAY_MAX_SESSIONS)?;

    for session_id in &sessions {
        let entries = ops.session_entries(session_id)?;
        let mut window: VecDeque<String> = VecDeque::new();

        for entry in &entries {
            for peer in window.iter().filter(|p| **p != entry.neuron_id) {
                for (source, target) in [
                    (peer.as_str(), entry.neuron_id.as_str()),
                    (entry.neuron_id.as_str(), peer.as_str()),
                ] {
                    if let Some(synapse) = ops.get_synapse(source, target)? {
                        let delta = (config.learning_rate / REPLAY_RATE_DIVISOR)
                            * config.snap(synapse.weight);
                        ops.upsert_synapse(source, target, delta, now)?;
                        report.replay_reinforced += 1;
                    }
                }
            }
            if let Some(pos) = window.iter().position(|p| *p == entry.neuron_id) {
                window.remove(pos);
            }
            window.push_back(entry.neuron_id.clone());
            while window.len() > config.window_size {
                window.pop_front();
            }
        }
        report.sessions_replayed += 1;
    }
    Ok(())
}

// ============================================================================
// STEP 2 - EBBINGHAUS REVIEW
// ============================================================================

/// Recently-rested files get a quarter review boost; long-idle ones fade
fn ebbinghaus_review(
    ops: &Ops<'_>,
    config: &EngineConfig,
    now: DateTime<Utc>,
    report: &mut ConsolidationReport,
) -> crate::storage::Result<()> {
    use crate::memory::NeuronType;

    let day_ago = now - Duration::days(1);
    let week_ago = now - Duration::days(7);

    // Rested 1-7 days: quarter of a normal BCM increment
    for neuron in ops.neurons_accessed_between(NeuronType::File, 0.05, day_ago, Some(week_ago))? {
        let delta = 0.25 * config.myelination_delta(neuron.myelination, neuron.access_count);
        ops.set_myelination(
            &neuron.id,
            neuron.myelination + delta,
            config.myelination_ceiling,
        )?;
        report.reviews_boosted += 1;
    }

    // Idle beyond a week: gentle fade
    for neuron in ops.neurons_accessed_between(NeuronType::File, 0.05, week_ago, None)? {
        ops.set_myelination(
            &neuron.id,
            neuron.myelination * 0.95,
            config.myelination_ceiling,
        )?;
        report.reviews_faded += 1;
    }
    Ok(())
}

// ============================================================================
// STEP 3 - CROSS-SESSION DISCOVERY
// ============================================================================

/// Unordered file pairs that co-occur across enough distinct sessions
///
/// Returns the discovered pair set for triplet mining.
fn cross_session_discovery(
    ops: &Ops<'_>,
    config: &EngineConfig,
    now: DateTime<Utc>,
    report: &mut ConsolidationReport,
) -> crate::storage::Result<Vec<(String, String)>> {
    let since = now - Duration::days(config.episodic_window_days);
    let entries = ops.entries_since(since, true)?;

    // Distinct file set per session
    let mut per_session: HashMap<String, HashSet<String>> = HashMap::new();
    for entry in &entries {
        per_session
            .entry(entry.session_id.clone())
            .or_default()
            .insert(entry.neuron_id.clone());
    }

    // Unordered pair -> distinct session count
    let mut pair_sessions: HashMap<(String, String), usize> = HashMap::new();
    for files in per_session.values() {
        let mut sorted: Vec<&String> = files.iter().collect();
        sorted.sort();
        for (i, a) in sorted.iter().enumerate() {
            for b in sorted.iter().skip(i + 1) {
                *pair_sessions
                    .entry(((*a).clone(), (*b).clone()))
                    .or_default() += 1;
            }
        }
    }

    let mut discovered = Vec::new();
    for ((a, b), sessions) in pair_sessions {
        if sessions < CROSS_SESSION_MIN {
            continue;
        }
        match ops.get_synapse(&a, &b)? {
            None => {
                // Born at 0.15, tagged like every new edge
                ops.upsert_synapse(&a, &b, 0.15, now)?;
                ops.upsert_synapse(&b, &a, 0.15, now)?;
                report.cross_session_created += 1;
            }
            Some(synapse) if synapse.weight < 0.2 => {
                let delta = 0.05 * config.snap(synapse.weight);
                ops.upsert_synapse(&a, &b, delta, now)?;
                ops.upsert_synapse(&b, &a, delta, now)?;
                report.cross_session_reinforced += 1;
            }
            Some(_) => {}
        }
        discovered.push((a, b));
    }
    Ok(discovered)
}

// ============================================================================
// STEP 4 - TEMPORAL PROXIMITY MINING
// ============================================================================

/// File pairs repeatedly accessed within seconds of each other
fn temporal_mining(
    ops: &Ops<'_>,
    config: &EngineConfig,
    now: DateTime<Utc>,
    report: &mut ConsolidationReport,
) -> crate::storage::Result<()> {
    let since = now - Duration::days(14);
    let entries = ops.entries_since(since, true)?;

    // Group by session, sorted by timestamp
    let mut per_session: HashMap<String, Vec<&AccessLogEntry>> = HashMap::new();
    for entry in &entries {
        per_session
            .entry(entry.session_id.clone())
            .or_default()
            .push(entry);
    }

    // Unordered pair -> (count of proximate row pairs, summed gap seconds)
    let mut proximity: HashMap<(String, String), (usize, i64)> = HashMap::new();
    for rows in per_session.values_mut() {
        rows.sort_by_key(|e| e.timestamp);
        for i in 0..rows.len() {
            for j in (i + 1)..rows.len() {
                let gap = (rows[j].timestamp - rows[i].timestamp).num_seconds();
                if gap >= TEMPORAL_WINDOW_SECS {
                    break;
                }
                if rows[i].neuron_id == rows[j].neuron_id {
                    continue;
                }
                let key = ordered_pair(&rows[i].neuron_id, &rows[j].neuron_id);
                let slot = proximity.entry(key).or_default();
                slot.0 += 1;
                slot.1 += gap;
            }
        }
    }

    for ((a, b), (count, total_secs)) in proximity {
        if count < TEMPORAL_MIN_PAIRS {
            continue;
        }
        let avg_secs = total_secs as f64 / count as f64;
        match ops.get_synapse(&a, &b)? {
            None => {
                let weight = 0.15 + 0.15 * (1.0 - avg_secs / TEMPORAL_WINDOW_SECS as f64);
                ops.upsert_synapse(&a, &b, weight, now)?;
                ops.upsert_synapse(&b, &a, weight, now)?;
                report.temporal_created += 1;
            }
            Some(synapse) if synapse.weight < 0.3 => {
                let delta = 0.05 * config.snap(synapse.weight);
                ops.upsert_synapse(&a, &b, delta, now)?;
                ops.upsert_synapse(&b, &a, delta, now)?;
                report.temporal_reinforced += 1;
            }
            Some(_) => {}
        }
    }
    Ok(())
}

// ============================================================================
// STEP 5 - DIRECTIONAL WEIGHTING
// ============================================================================

/// When A reliably precedes B, the forward edge earns extra weight
fn directional_weighting(
    ops: &Ops<'_>,
    config: &EngineConfig,
    now: DateTime<Utc>,
    report: &mut ConsolidationReport,
) -> crate::storage::Result<()> {
    let since = now - Duration::days(14);
    let entries = ops.entries_since(since, true)?;

    let mut per_session: HashMap<String, Vec<&AccessLogEntry>> = HashMap::new();
    for entry in &entries {
        per_session
            .entry(entry.session_id.clone())
            .or_default()
            .push(entry);
    }

    // Ordered pair -> follow count
    let mut follows: HashMap<(String, String), usize> = HashMap::new();
    for rows in per_session.values_mut() {
        rows.sort_by_key(|e| e.access_order);
        for i in 0..rows.len() {
            for j in (i + 1)..rows.len() {
                let gap = rows[j].access_order - rows[i].access_order;
                if gap > DIRECTIONAL_MAX_GAP {
                    break;
                }
                if rows[i].neuron_id == rows[j].neuron_id {
                    continue;
                }
                *follows
                    .entry((rows[i].neuron_id.clone(), rows[j].neuron_id.clone()))
                    .or_default() += 1;
            }
        }
    }

    for ((first, second), count) in &follows {
        if *count < DIRECTIONAL_MIN_COUNT {
            continue;
        }
        let reverse = follows
            .get(&(second.clone(), first.clone()))
            .copied()
            .unwrap_or(0);
        if *count <= 2 * reverse {
            continue;
        }
        if let Some(synapse) = ops.get_synapse(first, second)? {
            if synapse.weight > 0.1 && synapse.weight < 0.8 {
                let delta = 0.2 * synapse.weight * config.snap(synapse.weight);
                ops.upsert_synapse(first, second, delta, now)?;
                report.directional_boosted += 1;
            }
        }
    }
    Ok(())
}

// ============================================================================
// STEP 6 - TRIPLET MINING
// ============================================================================

/// Close triangles inside the cross-session pair set
fn triplet_mining(
    ops: &Ops<'_>,
    config: &EngineConfig,
    now: DateTime<Utc>,
    pairs: &[(String, String)],
    report: &mut ConsolidationReport,
) -> crate::storage::Result<()> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for (a, b) in pairs {
        adjacency.entry(a.as_str()).or_default().push(b.as_str());
        adjacency.entry(b.as_str()).or_default().push(a.as_str());
    }

    let mut seen: HashSet<[&str; 3]> = HashSet::new();
    for (node, neighbors) in &adjacency {
        let scan = &neighbors[..neighbors.len().min(TRIPLET_NEIGHBOR_CAP)];
        for (i, x) in scan.iter().enumerate() {
            for y in scan.iter().skip(i + 1) {
                if ops.get_synapse(x, y)?.is_none() {
                    continue;
                }
                let mut key = [*node, *x, *y];
                key.sort_unstable();
                if !seen.insert(key) {
                    continue;
                }
                for (a, b) in [(*node, *x), (*node, *y), (*x, *y)] {
                    for (s, t) in [(a, b), (b, a)] {
                        if let Some(synapse) = ops.get_synapse(s, t)? {
                            let delta = 0.05 * synapse.weight * config.snap(synapse.weight);
                            ops.upsert_synapse(s, t, delta, now)?;
                        }
                    }
                }
                report.triplets_closed += 1;
            }
        }
    }
    Ok(())
}

/// Canonical unordered pair key
fn ordered_pair(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_pair_is_canonical() {
        assert_eq!(ordered_pair("b", "a"), ordered_pair("a", "b"));
        assert_eq!(ordered_pair("a", "b"), ("a".into(), "b".into()));
    }
}
