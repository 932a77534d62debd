//! Multi-Phase Recall
//!
//! Recall runs a fixed phase sequence, each phase folding candidates into a
//! shared state object (Collins & Loftus 1975 convergence: a neuron reached
//! twice keeps its first label and the maximum confidence):
//!
//! 0. fingerprint shortcut for error-shaped queries
//! 1. direct match - context keywords, embedding cosine, filename stems
//! 2. multi-hop BFS spreading over strong synapses
//! 3. myelinated fallback when results are thin
//! 4. episodic pass over the recent access log
//! 5. snippet merge from the cached snippet embeddings
//!
//! Confidence is multiplicative: a zero context score yields zero confidence
//! regardless of myelination. That gate is the central invariant - myelin and
//! recency only amplify relevance, they never invent it.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};

use crate::canon;
use crate::embeddings::cosine_similarity;
use crate::memory::{Neuron, NeuronType, RecallResult, SnippetMatch};
use crate::snippets;

use super::{Engine, EngineError, Result};

/// Extensions scoring the source-code bonus
const SOURCE_EXTS: &[&str] = &[
    "rs", "ts", "tsx", "js", "jsx", "mjs", "py", "go", "java", "c", "h", "cc", "cpp", "hpp",
    "cs", "rb", "php", "swift", "kt", "scala", "zig", "sql", "sh",
];

/// Extensions scoring the documentation penalty
const DOC_EXTS: &[&str] = &["md", "txt", "rst", "adoc", "org"];

/// Minimum token length for keyword matching
const MIN_TOKEN_LEN: usize = 3;

/// Minimum token length for stem/episodic matching
const MIN_LONG_TOKEN_LEN: usize = 4;

/// Frequency at which an episodic hit saturates
const EPISODIC_SATURATION: f64 = 5.0;

// ============================================================================
// TYPE FILTER
// ============================================================================

/// Restricts which neuron types recall may emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeFilter {
    /// Emit any non-tool neuron
    #[default]
    Any,
    /// Emit only the given type
    Only(NeuronType),
}

impl TypeFilter {
    fn admits(&self, neuron_type: NeuronType) -> bool {
        // Tools are never emitted, regardless of filter
        if neuron_type == NeuronType::Tool {
            return false;
        }
        match self {
            TypeFilter::Any => true,
            TypeFilter::Only(t) => *t == neuron_type,
        }
    }
}

// ============================================================================
// RECALL STATE
// ============================================================================

/// Shared state threaded through the recall phases
struct RecallState {
    tokens: Vec<String>,
    long_tokens: Vec<String>,
    query_embedding: Option<crate::embeddings::Embedding>,
    filter: TypeFilter,
    limit: usize,
    budget_remaining: i64,
    now: DateTime<Utc>,
    results: Vec<RecallResult>,
    /// Emitted neuron id -> index into `results`
    result_index: HashMap<String, usize>,
    /// Every neuron touched by any phase, including bridge-traversed tools
    visited: HashSet<String>,
}

impl RecallState {
    fn merge_max(&mut self, id: &str, confidence: f64) {
        if let Some(&idx) = self.result_index.get(id) {
            if confidence > self.results[idx].confidence {
                self.results[idx].confidence = confidence;
            }
        }
    }
}

/// A BFS frontier entry: neuron id, accumulated confidence, display chain
struct FrontierEntry {
    id: String,
    confidence: f64,
    chain: Vec<String>,
}

impl Engine {
    // ========================================================================
    // PUBLIC ENTRY POINTS
    // ========================================================================

    /// Recall with default budget and limit
    pub fn recall(&mut self, query: &str) -> Result<Vec<RecallResult>> {
        self.recall_at(
            query,
            self.config.default_token_budget,
            self.config.default_limit,
            TypeFilter::Any,
            Utc::now(),
        )
    }

    /// Recall with explicit budget, limit, and type filter
    pub fn recall_with(
        &mut self,
        query: &str,
        token_budget: i64,
        limit: usize,
        filter: TypeFilter,
    ) -> Result<Vec<RecallResult>> {
        self.recall_at(query, token_budget, limit, filter, Utc::now())
    }

    /// Recall relative to an explicit clock (deterministic callers)
    pub fn recall_at(
        &mut self,
        query: &str,
        token_budget: i64,
        limit: usize,
        filter: TypeFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<RecallResult>> {
        let query = query.trim();
        if query.len() < MIN_TOKEN_LEN {
            return Err(EngineError::Input("query too short".into()));
        }

        let tokens = tokenize(query, MIN_TOKEN_LEN);
        let long_tokens = tokenize(query, MIN_LONG_TOKEN_LEN);
        let query_embedding = self.query_embedding(query);

        let mut state = RecallState {
            tokens,
            long_tokens,
            query_embedding,
            filter,
            limit: limit.max(1),
            budget_remaining: token_budget,
            now,
            results: Vec::new(),
            result_index: HashMap::new(),
            visited: HashSet::new(),
        };

        self.phase_fingerprint(query, &mut state)?;
        self.phase_direct(&mut state)?;
        self.phase_spreading(&mut state)?;
        self.phase_myelinated(&mut state)?;
        self.phase_episodic(&mut state)?;
        self.phase_snippets(&mut state)?;

        let mut results = state.results;
        results.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(state.limit);

        for result in &results {
            if result.neuron.neuron_type == NeuronType::File {
                self.recalled.insert(result.neuron.id.clone());
            }
        }

        self.recall_calls += 1;
        if !results.is_empty() {
            self.recall_hits += 1;
        }
        self.record_recall_accounting(&results);

        Ok(results)
    }

    /// Episodic-only recall (operator surface)
    pub fn recall_episodic(&mut self, query: &str, limit: usize) -> Result<Vec<RecallResult>> {
        let query = query.trim();
        if query.len() < MIN_TOKEN_LEN {
            return Err(EngineError::Input("query too short".into()));
        }
        let mut state = RecallState {
            tokens: tokenize(query, MIN_TOKEN_LEN),
            long_tokens: tokenize(query, MIN_LONG_TOKEN_LEN),
            query_embedding: None,
            filter: TypeFilter::Any,
            limit: limit.max(1),
            budget_remaining: self.config.default_token_budget,
            now: Utc::now(),
            results: Vec::new(),
            result_index: HashMap::new(),
            visited: HashSet::new(),
        };
        self.phase_episodic(&mut state)?;
        let mut results = state.results;
        results.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(state.limit);
        Ok(results)
    }

    /// Recall restricted to a project tag
    pub fn recall_for_project(&mut self, query: &str, project: &str) -> Result<Vec<RecallResult>> {
        let wide = self.recall_with(
            query,
            self.config.default_token_budget,
            self.config.default_limit * 4,
            TypeFilter::Any,
        )?;
        let limit = self.config.default_limit;
        Ok(wide
            .into_iter()
            .filter(|r| r.neuron.project.as_deref() == Some(project))
            .take(limit)
            .collect())
    }

    /// Best-effort session accounting; read-only consumers skip silently
    fn record_recall_accounting(&mut self, results: &[RecallResult]) {
        let saved: i64 = results.iter().map(|r| r.tokens_saved).sum();
        let hit_rate = self.recall_hits as f64 / self.recall_calls.max(1) as f64;
        let session_id = self.session_id.clone();
        let outcome = self.store.write(|ops| {
            ops.bump_session(&session_id, 0, 0, saved)?;
            ops.set_session_hit_rate(&session_id, hit_rate)
        });
        if let Err(e) = outcome {
            tracing::debug!("Recall accounting skipped: {}", e);
        }
    }

    // ========================================================================
    // EMISSION
    // ========================================================================

    /// Emit a result if the token budget permits; over-budget results are
    /// skipped individually, not the whole call
    fn try_emit(
        &self,
        state: &mut RecallState,
        neuron: Neuron,
        confidence: f64,
        label: String,
    ) -> bool {
        let cost = self.config.token_cost(neuron.neuron_type);
        if cost > state.budget_remaining {
            return false;
        }
        state.budget_remaining -= cost;
        state.visited.insert(neuron.id.clone());
        state
            .result_index
            .insert(neuron.id.clone(), state.results.len());
        state.results.push(RecallResult {
            confidence: confidence.min(1.0),
            activation_path: label,
            tokens_saved: cost,
            snippets: Vec::new(),
            neuron,
        });
        true
    }

    // ========================================================================
    // PHASE 0 - FINGERPRINT SHORTCUT
    // ========================================================================

    /// Error-shaped queries jump straight through the fingerprint neuron
    fn phase_fingerprint(&mut self, query: &str, state: &mut RecallState) -> Result<()> {
        if !canon::looks_like_error(query) {
            return Ok(());
        }
        let fp = canon::fingerprint(query);
        let fp_id = crate::memory::neuron_id(NeuronType::Error, &fp.key);
        if self.store.read(|ops| ops.get_neuron(&fp_id))?.is_none() {
            return Ok(());
        }

        let outgoing = self.store.read(|ops| {
            ops.strongest_outgoing(&fp_id, self.config.min_traversal_weight, 50)
        })?;
        for synapse in outgoing {
            if state.visited.contains(&synapse.target_id) {
                continue;
            }
            let Some(neuron) = self.store.read(|ops| ops.get_neuron(&synapse.target_id))? else {
                continue;
            };
            if !state.filter.admits(neuron.neuron_type) {
                continue;
            }
            let confidence = synapse.weight;
            if confidence < self.config.confidence_gate {
                continue;
            }
            self.try_emit(state, neuron, confidence, format!("fingerprint: {}", fp.key));
        }
        Ok(())
    }

    // ========================================================================
    // PHASE 1 - DIRECT MATCH
    // ========================================================================

    /// Keyword, semantic, and filename-stem admission with the multiplicative
    /// confidence formula
    fn phase_direct(&mut self, state: &mut RecallState) -> Result<()> {
        let mut candidates: HashMap<String, Neuron> = HashMap::new();

        // 1a: context keyword match (tools excluded at the query)
        for token in &state.tokens {
            for neuron in self
                .store
                .read(|ops| ops.neurons_by_context_token(token, true))?
            {
                candidates.entry(neuron.id.clone()).or_insert(neuron);
            }
        }

        // 1b: semantic admission over every stored embedding
        if let Some(query_emb) = &state.query_embedding {
            for (id, embedding) in self.store.read(|ops| ops.embedded_neurons(None))? {
                if candidates.contains_key(&id) {
                    continue;
                }
                let sim = cosine_similarity(&query_emb.vector, &embedding.vector) as f64;
                if sim > self.config.semantic_threshold {
                    if let Some(neuron) = self.store.read(|ops| ops.get_neuron(&id))? {
                        candidates.entry(id).or_insert(neuron);
                    }
                }
            }
        }

        // 1b: filename-stem admission
        for token in &state.long_tokens {
            for neuron in self
                .store
                .read(|ops| ops.file_neurons_by_path_token(token))?
            {
                if neuron.stem().to_lowercase().contains(token.as_str()) {
                    candidates.entry(neuron.id.clone()).or_insert(neuron);
                }
            }
        }

        let mut scored: Vec<(f64, Neuron)> = Vec::new();
        for (_, neuron) in candidates {
            if !state.filter.admits(neuron.neuron_type) {
                continue;
            }
            if state.visited.contains(&neuron.id) {
                continue;
            }
            let confidence = self.direct_confidence(&neuron, state)?;
            if confidence >= self.config.confidence_gate {
                scored.push((confidence, neuron));
            }
        }
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        for (confidence, neuron) in scored {
            self.try_emit(state, neuron, confidence, "direct".to_string());
        }
        Ok(())
    }

    /// Multiplicative confidence: context relevance gates everything, then
    /// myelination, recency, path hits, stems, and extension class amplify
    fn direct_confidence(&self, neuron: &Neuron, state: &RecallState) -> Result<f64> {
        let token_count = state.tokens.len().max(1) as f64;

        let mut context_score = match (&state.query_embedding, neuron.has_embedding) {
            (Some(query_emb), true) => {
                match self.store.read(|ops| ops.get_neuron_embedding(&neuron.id))? {
                    Some(stored) => {
                        cosine_similarity(&query_emb.vector, &stored.vector).max(0.0) as f64
                    }
                    None => keyword_score(neuron, &state.tokens) / token_count,
                }
            }
            _ => keyword_score(neuron, &state.tokens) / token_count,
        };

        let stem = neuron.stem().to_lowercase();
        let stem_match = state
            .long_tokens
            .iter()
            .any(|t| stem.contains(t.as_str()));
        if stem_match {
            context_score = context_score.max(0.5);
        }

        let age_hours = (state.now - neuron.last_accessed).num_minutes() as f64 / 60.0;
        let recency = (1.0 - age_hours / 168.0).clamp(0.0, 1.0);

        let path_lower = neuron.path.to_lowercase();
        let path_hits = state
            .tokens
            .iter()
            .filter(|t| path_lower.contains(t.as_str()))
            .count() as f64;

        let ext_bonus = match neuron.extension() {
            Some(ext) if SOURCE_EXTS.contains(&ext.as_str()) => 0.3,
            Some(ext) if DOC_EXTS.contains(&ext.as_str()) => -0.15,
            _ => 0.0,
        };

        let bonuses = neuron.myelination.min(0.5) * 0.3
            + recency * 0.2
            + (path_hits / token_count) * 0.4
            + if stem_match { 0.4 } else { 0.0 }
            + ext_bonus;

        Ok((context_score * (1.0 + bonuses)).min(1.0))
    }

    // ========================================================================
    // PHASE 2 - MULTI-HOP SPREADING
    // ========================================================================

    /// BFS over strong synapses, discounted by edge weight, target
    /// myelination, and consolidated fan-out. Tools bridge but never emit.
    fn phase_spreading(&mut self, state: &mut RecallState) -> Result<()> {
        let mut frontier: Vec<FrontierEntry> = state
            .results
            .iter()
            .map(|r| FrontierEntry {
                id: r.neuron.id.clone(),
                confidence: r.confidence,
                chain: vec![display_name(&r.neuron)],
            })
            .collect();

        for hop in 1..=self.config.spread_max_hops {
            if frontier.is_empty() || state.budget_remaining <= 0 {
                break;
            }
            let mut next_frontier: Vec<FrontierEntry> = Vec::new();

            for entry in &frontier {
                let outgoing = self.store.read(|ops| {
                    ops.strongest_outgoing(
                        &entry.id,
                        self.config.min_traversal_weight,
                        self.config.spread_top_k,
                    )
                })?;

                for synapse in outgoing {
                    let target_id = synapse.target_id.clone();
                    if state.result_index.contains_key(&target_id) {
                        // Collins-Loftus convergence: max-merge, original label
                        let degree = self.spread_degree(&target_id)?;
                        let Some(target) =
                            self.store.read(|ops| ops.get_neuron(&target_id))?
                        else {
                            continue;
                        };
                        let confidence =
                            self.spread_confidence(entry.confidence, synapse.weight, &target, degree);
                        state.merge_max(&target_id, confidence);
                        continue;
                    }
                    if state.visited.contains(&target_id) {
                        continue;
                    }
                    let Some(target) = self.store.read(|ops| ops.get_neuron(&target_id))? else {
                        continue;
                    };

                    let degree = self.spread_degree(&target_id)?;
                    let confidence =
                        self.spread_confidence(entry.confidence, synapse.weight, &target, degree);
                    if confidence < self.config.confidence_gate {
                        continue;
                    }

                    let mut chain = entry.chain.clone();
                    if target.neuron_type == NeuronType::Tool {
                        // Traversable bridge, never emitted
                        state.visited.insert(target_id.clone());
                        chain.push(display_name(&target));
                        next_frontier.push(FrontierEntry {
                            id: target_id,
                            confidence,
                            chain,
                        });
                        continue;
                    }
                    if !state.filter.admits(target.neuron_type) {
                        continue;
                    }

                    let label = format!("spread({}) via {}", hop, chain.join(" → "));
                    let name = display_name(&target);
                    if self.try_emit(state, target, confidence, label) {
                        chain.push(name);
                        next_frontier.push(FrontierEntry {
                            id: target_id,
                            confidence,
                            chain,
                        });
                    }
                }
            }
            frontier = next_frontier;
        }
        Ok(())
    }

    /// Fan-out over consolidated edges only: weights at the capture floor
    /// (fresh co-access noise) do not dilute the discount
    fn spread_degree(&self, id: &str) -> Result<i64> {
        let degree = self
            .store
            .read(|ops| ops.out_degree_above(id, self.config.tag_capture_floor))?;
        Ok(degree.clamp(1, self.config.fanout_cap))
    }

    fn spread_confidence(
        &self,
        seed_confidence: f64,
        weight: f64,
        target: &Neuron,
        degree: i64,
    ) -> f64 {
        seed_confidence
            * weight
            * (1.0 + target.myelination.min(0.5))
            * (1.0 / (degree as f64).sqrt())
    }

    // ========================================================================
    // PHASE 3 - MYELINATED FALLBACK
    // ========================================================================

    /// When direct + spread produced too little, surface the superhighways
    fn phase_myelinated(&mut self, state: &mut RecallState) -> Result<()> {
        if state.results.len() >= state.limit {
            return Ok(());
        }
        let type_filter = match state.filter {
            TypeFilter::Only(t) => Some(t),
            TypeFilter::Any => None,
        };
        let top = self
            .store
            .read(|ops| ops.top_myelinated(type_filter, true, state.limit * 2))?;
        for neuron in top {
            if state.visited.contains(&neuron.id) {
                continue;
            }
            if !state.filter.admits(neuron.neuron_type) {
                continue;
            }
            let confidence = neuron.myelination * 0.5;
            if confidence < self.config.myelin_gate {
                continue;
            }
            self.try_emit(state, neuron, confidence, "myelinated".to_string());
            if state.results.len() >= state.limit {
                break;
            }
        }
        Ok(())
    }

    // ========================================================================
    // PHASE 4 - EPISODIC PASS
    // ========================================================================

    /// Sessions that asked similar questions recently point at the files they
    /// actually touched
    fn phase_episodic(&mut self, state: &mut RecallState) -> Result<()> {
        if state.long_tokens.is_empty() {
            return Ok(());
        }
        let since = state.now - Duration::days(self.config.episodic_window_days);

        let mut session_ids: HashSet<String> = HashSet::new();
        for token in &state.long_tokens {
            for sid in self
                .store
                .read(|ops| ops.sessions_matching_query_token(since, token))?
            {
                session_ids.insert(sid);
            }
        }
        if session_ids.is_empty() {
            return Ok(());
        }

        // Frequency + latest touch per file neuron across the matched sessions
        let mut freq: HashMap<String, (i64, DateTime<Utc>)> = HashMap::new();
        for sid in &session_ids {
            for entry in self.store.read(|ops| ops.session_entries(sid))? {
                if !entry.neuron_id.starts_with("file:") {
                    continue;
                }
                let slot = freq
                    .entry(entry.neuron_id.clone())
                    .or_insert((0, entry.timestamp));
                slot.0 += 1;
                if entry.timestamp > slot.1 {
                    slot.1 = entry.timestamp;
                }
            }
        }

        let mut scored: Vec<(f64, String)> = freq
            .into_iter()
            .map(|(id, (count, latest))| {
                let age_days = (state.now - latest).num_hours() as f64 / 24.0;
                let recency = (1.0 - age_days / 7.0).clamp(0.0, 1.0);
                let confidence =
                    (count as f64 / EPISODIC_SATURATION).min(1.0) * (0.5 + recency * 0.5);
                (confidence, id)
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        for (confidence, id) in scored {
            if confidence < self.config.confidence_gate {
                continue;
            }
            if state.result_index.contains_key(&id) {
                state.merge_max(&id, confidence);
                continue;
            }
            if state.visited.contains(&id) {
                continue;
            }
            let Some(neuron) = self.store.read(|ops| ops.get_neuron(&id))? else {
                continue;
            };
            if !state.filter.admits(neuron.neuron_type) {
                continue;
            }
            self.try_emit(state, neuron, confidence, "episodic".to_string());
        }
        Ok(())
    }

    // ========================================================================
    // PHASE 5 - SNIPPET MERGE
    // ========================================================================

    /// Snippet-level hits boost their parent files or surface new ones
    fn phase_snippets(&mut self, state: &mut RecallState) -> Result<()> {
        let Some(query_emb) = state.query_embedding.clone() else {
            return Ok(());
        };
        let cached = snippets::cached_snippets(&self.store)?;
        if cached.is_empty() {
            return Ok(());
        }

        let mut sims: Vec<(f64, &crate::snippets::CachedSnippet)> = cached
            .iter()
            .filter_map(|s| {
                let sim = cosine_similarity(&query_emb.vector, &s.embedding.vector) as f64;
                (sim >= self.config.snippet_gate).then_some((sim, s))
            })
            .collect();
        sims.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        sims.truncate(self.config.snippet_top_k);

        // Aggregate to parent file neurons
        let mut by_parent: HashMap<String, (f64, Vec<SnippetMatch>)> = HashMap::new();
        for (sim, snippet) in sims {
            let slot = by_parent
                .entry(snippet.parent_neuron_id.clone())
                .or_insert((0.0, Vec::new()));
            slot.0 = slot.0.max(sim);
            slot.1.push(SnippetMatch {
                snippet_id: snippet.snippet_id.clone(),
                name: snippet.name.clone(),
                kind: snippet.kind,
                start_line: snippet.start_line,
                end_line: snippet.end_line,
                similarity: sim,
            });
        }

        for (parent_id, (best, matches)) in by_parent {
            if let Some(&idx) = state.result_index.get(&parent_id) {
                let existing = state.results[idx].confidence;
                state.results[idx].confidence = (existing.max(best) * 1.15).min(0.99);
                if !state.results[idx].activation_path.ends_with("+snippet") {
                    state.results[idx].activation_path.push_str("+snippet");
                }
                state.results[idx].snippets = matches;
                continue;
            }
            let confidence = (best * 1.15).min(0.99);
            if confidence < self.config.confidence_gate {
                continue;
            }
            let Some(neuron) = self.store.read(|ops| ops.get_neuron(&parent_id))? else {
                continue;
            };
            if !state.filter.admits(neuron.neuron_type) {
                continue;
            }
            if self.try_emit(state, neuron, confidence, "snippet".to_string()) {
                let idx = state.results.len() - 1;
                state.results[idx].snippets = matches;
            }
        }
        Ok(())
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Lowercased alphanumeric tokens of at least `min_len` characters
fn tokenize(query: &str, min_len: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| t.len() >= min_len)
        .filter(|t| seen.insert(t.to_string()))
        .map(|t| t.to_string())
        .collect()
}

/// Count of query tokens present in any of the neuron's contexts
fn keyword_score(neuron: &Neuron, tokens: &[String]) -> f64 {
    let contexts_lower: Vec<String> = neuron.contexts.iter().map(|c| c.to_lowercase()).collect();
    tokens
        .iter()
        .filter(|t| contexts_lower.iter().any(|c| c.contains(t.as_str())))
        .count() as f64
}

/// Human-readable name used in spreading chains
fn display_name(neuron: &Neuron) -> String {
    match neuron.neuron_type {
        NeuronType::File | NeuronType::Tool => neuron.stem().to_string(),
        _ => neuron.path.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_filters_and_dedups() {
        let tokens = tokenize("Fix the auth auth-flow in a2b", 3);
        assert_eq!(tokens, vec!["fix", "the", "auth", "flow", "a2b"]);

        let long = tokenize("fix the auth flow", 4);
        assert_eq!(long, vec!["auth", "flow"]);
    }

    #[test]
    fn test_type_filter_never_admits_tools() {
        assert!(!TypeFilter::Any.admits(NeuronType::Tool));
        assert!(!TypeFilter::Only(NeuronType::Tool).admits(NeuronType::Tool));
        assert!(TypeFilter::Only(NeuronType::File).admits(NeuronType::File));
        assert!(!TypeFilter::Only(NeuronType::File).admits(NeuronType::Error));
    }
}
