//! Auxiliary Engine Operations
//!
//! Negative feedback (anti-recall), tool-sequence prediction, project
//! tagging, hub and staleness reports, session intent capture, and the
//! aggregate stats surfaces.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::memory::{neuron_id, EngineStats, Neuron, NeuronType, TokenReport};

use super::{Engine, EngineError, Result};

/// Tools returned by `predict_next`
const PREDICT_TOOL_LIMIT: usize = 3;

/// Files returned by `predict_next`
const PREDICT_FILE_LIMIT: usize = 5;

/// Prediction score ceiling
const PREDICT_SCORE_CAP: f64 = 0.99;

/// Myelination level that counts as a superhighway
const SUPERHIGHWAY_THRESHOLD: f64 = 0.5;

/// Default staleness thresholds for the alert surface
const STALE_ALERT_MIN_MYELIN: f64 = 0.3;
const STALE_ALERT_IDLE_DAYS: i64 = 14;

/// Words too common to carry session intent
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "can", "had", "her", "was", "one",
    "our", "out", "day", "get", "has", "him", "his", "how", "man", "new", "now", "old", "see",
    "two", "way", "who", "did", "its", "let", "put", "say", "she", "too", "use", "that", "with",
    "have", "this", "will", "your", "from", "they", "know", "want", "been", "good", "much",
    "some", "time", "very", "when", "come", "here", "just", "like", "long", "make", "many",
    "more", "only", "over", "such", "take", "than", "them", "well", "were", "what", "then",
    "into", "also", "need", "should", "would", "could", "about", "which", "their", "there",
];

// ============================================================================
// RESULT TYPES
// ============================================================================

/// Snapshot of the anti-recall bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AntiRecallState {
    pub session_id: String,
    pub recalled: Vec<String>,
    pub opened: Vec<String>,
    /// Recalled but never opened (weakened on rotation)
    pub ignored: Vec<String>,
    /// Neurons carrying a non-zero ignore streak
    pub streaks: Vec<(String, i64)>,
}

/// Predicted continuation of the current tool sequence
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    /// (tool name, score), strongest first
    pub next_tools: Vec<(String, f64)>,
    /// (file path, score), strongest first
    pub likely_files: Vec<(String, f64)>,
}

/// One hub neuron with its strongest connections
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HubReport {
    pub neuron: Neuron,
    pub out_degree: i64,
    /// (target path, weight), strongest first
    pub strongest: Vec<(String, f64)>,
}

/// A myelinated neuron going stale
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaleNeuron {
    pub neuron: Neuron,
    pub days_idle: i64,
    /// Myelination projected forward under resting decay
    pub projected_myelination: f64,
}

impl Engine {
    // ========================================================================
    // ANTI-RECALL
    // ========================================================================

    /// Weaken edges to files that keep being suggested but never opened
    ///
    /// With `escalate`, each ignored file's streak grows and the weakening
    /// compounds as `1 - (1 - rate)^streak`; the flat variant applies a single
    /// `rate` step without touching history. Weights never drop below the
    /// anti-recall floor. Returns the number of ignored files processed.
    pub fn apply_anti_recall(&mut self, escalate: bool) -> Result<usize> {
        let ignored: Vec<String> = self
            .recalled
            .difference(&self.opened)
            .cloned()
            .collect();

        for id in &ignored {
            let factor = if escalate {
                let streak = self.store.write(|ops| ops.increment_ignore_streak(id))?;
                1.0 - (1.0 - self.config.anti_recall_rate).powi(streak as i32)
            } else {
                self.config.anti_recall_rate
            };
            self.store
                .write(|ops| ops.weaken_incident(id, factor, self.config.anti_recall_floor))?;
        }
        Ok(ignored.len())
    }

    /// Non-escalating anti-recall for callers that do not want history
    pub fn apply_anti_recall_flat(&mut self) -> Result<usize> {
        self.apply_anti_recall(false)
    }

    /// Current anti-recall bookkeeping
    pub fn get_anti_recall_state(&self) -> Result<AntiRecallState> {
        let streaks = self
            .store
            .read(|ops| ops.neurons_with_streak(1))?
            .into_iter()
            .map(|n| (n.id, n.ignore_streak))
            .collect();
        Ok(AntiRecallState {
            session_id: self.session_id.clone(),
            recalled: self.recalled.iter().cloned().collect(),
            opened: self.opened.iter().cloned().collect(),
            ignored: self
                .recalled
                .difference(&self.opened)
                .cloned()
                .collect(),
            streaks,
        })
    }

    // ========================================================================
    // TOOL SEQUENCE PREDICTION
    // ========================================================================

    /// Predict the next tools and the files they will likely touch
    ///
    /// Traverses the current tool's outgoing synapses; targets score
    /// `weight * (1 + myelination)` capped just below certainty.
    pub fn predict_next(&self, current_tool: Option<&str>) -> Result<Prediction> {
        let tool_id = match current_tool {
            Some(name) => neuron_id(NeuronType::Tool, name.trim()),
            None => match self.tool_chain.back() {
                Some(id) => id.clone(),
                None => return Ok(Prediction::default()),
            },
        };

        let outgoing = self.store.read(|ops| {
            ops.strongest_outgoing(&tool_id, self.config.min_traversal_weight, 50)
        })?;

        let mut tools: Vec<(String, f64)> = Vec::new();
        let mut files: Vec<(String, f64)> = Vec::new();
        for synapse in outgoing {
            let Some(target) = self.store.read(|ops| ops.get_neuron(&synapse.target_id))? else {
                continue;
            };
            let score = (synapse.weight * (1.0 + target.myelination)).min(PREDICT_SCORE_CAP);
            match target.neuron_type {
                NeuronType::Tool => tools.push((target.path, score)),
                NeuronType::File => files.push((target.path, score)),
                _ => {}
            }
        }
        tools.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        files.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        tools.truncate(PREDICT_TOOL_LIMIT);
        files.truncate(PREDICT_FILE_LIMIT);

        Ok(Prediction {
            next_tools: tools,
            likely_files: files,
        })
    }

    /// The recent tool sequence, oldest first
    pub fn tool_chain(&self) -> Vec<String> {
        self.tool_chain.iter().cloned().collect()
    }

    // ========================================================================
    // PROJECT TAGGING
    // ========================================================================

    /// Tag every file neuron under `root` with a project name
    pub fn tag_project(&mut self, root: &str, name: &str) -> Result<usize> {
        let root = root.trim();
        let name = name.trim();
        if root.is_empty() || name.is_empty() {
            return Err(EngineError::Input("project root and name required".into()));
        }
        Ok(self.store.write(|ops| ops.tag_project(root, name))?)
    }

    /// Every neuron tagged with the project
    pub fn get_project_neurons(&self, name: &str) -> Result<Vec<Neuron>> {
        Ok(self.store.read(|ops| ops.neurons_by_project(name))?)
    }

    /// Known project tags with neuron counts
    pub fn list_projects(&self) -> Result<Vec<(String, i64)>> {
        Ok(self.store.read(|ops| ops.list_projects())?)
    }

    // ========================================================================
    // HUB / STALENESS REPORTS
    // ========================================================================

    /// Neurons with the highest out-degree, with their strongest connections
    pub fn get_hubs(&self, limit: usize) -> Result<Vec<HubReport>> {
        let top = self.store.read(|ops| ops.top_sources_by_degree(limit))?;
        let mut reports = Vec::with_capacity(top.len());
        for (id, out_degree) in top {
            let Some(neuron) = self.store.read(|ops| ops.get_neuron(&id))? else {
                continue;
            };
            let strongest = self
                .store
                .read(|ops| ops.strongest_outgoing(&id, 0.0, 5))?
                .into_iter()
                .map(|s| {
                    let path = s
                        .target_id
                        .split_once(':')
                        .map(|(_, p)| p.to_string())
                        .unwrap_or(s.target_id);
                    (path, s.weight)
                })
                .collect();
            reports.push(HubReport {
                neuron,
                out_degree,
                strongest,
            });
        }
        Ok(reports)
    }

    /// Myelinated neurons whose last access is older than the cutoff
    pub fn detect_stale(&self, min_myelination: f64, days_inactive: i64) -> Result<Vec<StaleNeuron>> {
        let now = Utc::now();
        let cutoff = now - chrono::Duration::days(days_inactive);
        let neurons = self
            .store
            .read(|ops| ops.stale_neurons(min_myelination, cutoff))?;
        Ok(neurons
            .into_iter()
            .map(|neuron| {
                let days_idle = (now - neuron.last_accessed).num_days().max(0);
                let projected = neuron.myelination * 0.995_f64.powi(days_idle as i32);
                StaleNeuron {
                    neuron,
                    days_idle,
                    projected_myelination: projected,
                }
            })
            .collect())
    }

    /// Human-readable staleness summary
    pub fn get_staleness_alerts(&self) -> Result<String> {
        let stale = self.detect_stale(STALE_ALERT_MIN_MYELIN, STALE_ALERT_IDLE_DAYS)?;
        if stale.is_empty() {
            return Ok("No stale pathways detected.".to_string());
        }
        let mut out = format!("{} myelinated pathway(s) going stale:\n", stale.len());
        for s in &stale {
            out.push_str(&format!(
                "  {} - idle {}d, myelination {:.2} (projected {:.2})\n",
                s.neuron.path, s.days_idle, s.neuron.myelination, s.projected_myelination
            ));
        }
        Ok(out)
    }

    // ========================================================================
    // INTENT CAPTURE
    // ========================================================================

    /// Distill conversation messages into a semantic session neuron
    ///
    /// The neuron's contexts become the most frequent non-stopword tokens, so
    /// later sessions can recall what this one was actually about.
    pub fn capture_session_context(&mut self, messages: &[String]) -> Result<Neuron> {
        if messages.is_empty() {
            return Err(EngineError::Input("no messages to capture".into()));
        }

        let mut freq: HashMap<String, usize> = HashMap::new();
        for message in messages {
            for token in message
                .to_lowercase()
                .split(|c: char| !c.is_alphanumeric() && c != '_')
                .filter(|t| t.len() >= 3)
                .filter(|t| !STOPWORDS.contains(t))
            {
                *freq.entry(token.to_string()).or_default() += 1;
            }
        }
        let mut ranked: Vec<(String, usize)> = freq.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let contexts: Vec<String> = ranked
            .into_iter()
            .take(self.config.contexts_cap)
            .map(|(token, _)| token)
            .collect();

        let path = format!("session:{}", self.session_id);
        let id = neuron_id(NeuronType::Semantic, &path);
        let now = Utc::now();
        self.store.write(|ops| {
            ops.insert_neuron_if_absent(&id, NeuronType::Semantic, &path, 0.5, now, None)?;
            ops.update_contexts(&id, &contexts)
        })?;
        self.store
            .read(|ops| ops.get_neuron(&id))?
            .ok_or(EngineError::UnknownNeuron(id))
    }

    // ========================================================================
    // STATS
    // ========================================================================

    /// Aggregate statistics over the whole store
    pub fn stats(&self) -> Result<EngineStats> {
        Ok(self.store.read(|ops| {
            Ok(EngineStats {
                total_neurons: ops.neuron_count()?,
                file_neurons: ops.neuron_count_by_type(NeuronType::File)?,
                tool_neurons: ops.neuron_count_by_type(NeuronType::Tool)?,
                error_neurons: ops.neuron_count_by_type(NeuronType::Error)?,
                semantic_neurons: ops.neuron_count_by_type(NeuronType::Semantic)?,
                total_synapses: ops.synapse_count()?,
                average_weight: ops.avg_synapse_weight()?,
                average_myelination: ops.avg_myelination()?,
                superhighways: ops.superhighway_count(SUPERHIGHWAY_THRESHOLD)?,
                tagged_synapses: ops.tagged_synapse_count()?,
                access_log_rows: ops.access_log_count()?,
                sessions: ops.session_count()?,
                snippets: ops.snippet_count()?,
                neurons_with_embeddings: ops.embedded_neuron_count()?,
            })
        })?)
    }

    /// Token accounting across sessions
    pub fn token_report(&self) -> Result<TokenReport> {
        let (used, saved, sessions) = self.store.read(|ops| ops.token_totals())?;
        Ok(TokenReport {
            tokens_used: used,
            tokens_saved: saved,
            net: saved - used,
            sessions_counted: sessions,
        })
    }

    /// Neurons above the superhighway threshold, most consolidated first
    pub fn highways(&self, limit: usize) -> Result<Vec<Neuron>> {
        let top = self.store.read(|ops| ops.top_myelinated(None, false, limit))?;
        Ok(top
            .into_iter()
            .filter(|n| n.myelination > SUPERHIGHWAY_THRESHOLD)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopwords_are_lowercase() {
        for word in STOPWORDS {
            assert_eq!(*word, word.to_lowercase());
            assert!(word.len() >= 3);
        }
    }
}
