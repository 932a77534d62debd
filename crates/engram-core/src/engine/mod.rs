//! Memory Engine
//!
//! The write path of the associative memory: observation recording with
//! Hebbian strengthening over a sliding sequential window, BCM myelination,
//! synaptic tag-and-capture, error wiring, and the seeding API used by
//! bootstrap collaborators.
//!
//! The engine is stateless apart from the in-memory sequential window, the
//! recent tool chain, and the per-session recalled/opened sets. Everything
//! else lives in the store, which is why the window is rebuilt from the last
//! hour of the access log at construction: co-access keeps accumulating
//! across short-lived processes.

mod auxiliary;
mod consolidation;
mod maintenance;
mod recall;

pub use auxiliary::{AntiRecallState, HubReport, Prediction, StaleNeuron};
pub use consolidation::ConsolidationReport;
pub use maintenance::{HomeostasisReport, MaintenanceReport};
pub use recall::TypeFilter;

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::canon;
use crate::config::EngineConfig;
use crate::memory::{neuron_id, push_context, Neuron, NeuronType, RecallResult};
use crate::storage::{ObservationWrite, Store, StoreError, SynapseWrite};

#[cfg(feature = "embeddings")]
use crate::embeddings::{BackgroundEmbedder, Embedding, EmbeddingService, DEFAULT_MAX_PENDING};
#[cfg(feature = "embeddings")]
use lru::LruCache;
#[cfg(feature = "embeddings")]
use std::num::NonZeroUsize;

/// Weight written when wiring errors to their fixes
const ERROR_FIX_WEIGHT: f64 = 0.85;

/// Activation assigned to a seeded neuron
const SEED_ACTIVATION: f64 = 0.5;

/// How far back the access log is read to rebuild the window
const WINDOW_REBUILD_HOURS: i64 = 1;

#[cfg(feature = "embeddings")]
const QUERY_CACHE_CAPACITY: usize = 100;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Engine error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Storage failure (propagated, fatal for the operation)
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Invalid input; state was not mutated
    #[error("Invalid input: {0}")]
    Input(String),
    /// A referenced neuron does not exist
    #[error("Unknown neuron: {0}")]
    UnknownNeuron(String),
}

/// Engine result type
pub type Result<T> = std::result::Result<T, EngineError>;

// ============================================================================
// OPTIONS
// ============================================================================

/// Engine construction options
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Database location; `None` resolves via `ENGRAM_DB_PATH` or platform dirs
    pub db_path: Option<PathBuf>,
    /// Behavioral constants
    pub config: EngineConfig,
    /// Enable the embedding model (background auto-embed, semantic recall)
    pub enable_embeddings: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            db_path: None,
            config: EngineConfig::default(),
            enable_embeddings: true,
        }
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// The associative memory engine
///
/// Single writer per store; construct read-only engines for concurrent
/// consumers in other processes.
pub struct Engine {
    pub(crate) store: Arc<Store>,
    pub(crate) config: EngineConfig,
    pub(crate) session_id: String,
    /// Last N distinct neurons, oldest at the front
    pub(crate) window: VecDeque<String>,
    /// Recent tool neurons for sequence prediction
    pub(crate) tool_chain: VecDeque<String>,
    /// File neurons recalled this session (anti-recall accounting)
    pub(crate) recalled: HashSet<String>,
    /// File neurons opened this session
    pub(crate) opened: HashSet<String>,
    pub(crate) recall_calls: u64,
    pub(crate) recall_hits: u64,
    pub(crate) enable_embeddings: bool,
    #[cfg(feature = "embeddings")]
    pub(crate) embedding_service: EmbeddingService,
    #[cfg(feature = "embeddings")]
    pub(crate) embedder: Option<BackgroundEmbedder>,
    #[cfg(feature = "embeddings")]
    pub(crate) query_cache: LruCache<String, Embedding>,
}

impl Engine {
    /// Open (or create) the engine with default options
    pub fn new(db_path: Option<PathBuf>) -> Result<Self> {
        Self::with_options(EngineOptions {
            db_path,
            ..Default::default()
        })
    }

    /// Open with explicit options
    pub fn with_options(options: EngineOptions) -> Result<Self> {
        let store = Arc::new(Store::new(options.db_path)?);
        Self::build(store, options.config, options.enable_embeddings, false, Utc::now())
    }

    /// Open against an existing store read-only (recall-only consumer)
    pub fn open_read_only(db_path: Option<PathBuf>) -> Result<Self> {
        let store = Arc::new(Store::open_read_only(db_path)?);
        Self::build(store, EngineConfig::default(), false, true, Utc::now())
    }

    fn build(
        store: Arc<Store>,
        config: EngineConfig,
        enable_embeddings: bool,
        read_only: bool,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let session_id = if read_only {
            store
                .read(|ops| ops.latest_session())?
                .map(|s| s.id)
                .unwrap_or_else(|| "read-only".to_string())
        } else {
            Self::resolve_session(&store, &config, now)?
        };
        let (window, tool_chain) = Self::rebuild_window(&store, &config, now)?;

        #[cfg(feature = "embeddings")]
        let embedder = if enable_embeddings {
            match BackgroundEmbedder::new(DEFAULT_MAX_PENDING) {
                Ok(e) => Some(e),
                Err(e) => {
                    tracing::warn!("Background embedder unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            store,
            config,
            session_id,
            window,
            tool_chain,
            recalled: HashSet::new(),
            opened: HashSet::new(),
            recall_calls: 0,
            recall_hits: 0,
            enable_embeddings,
            #[cfg(feature = "embeddings")]
            embedding_service: EmbeddingService::new(),
            #[cfg(feature = "embeddings")]
            embedder,
            #[cfg(feature = "embeddings")]
            query_cache: LruCache::new(
                NonZeroUsize::new(QUERY_CACHE_CAPACITY).expect("capacity is non-zero"),
            ),
        })
    }

    /// Reuse the latest open session when it is still warm, else start fresh
    fn resolve_session(
        store: &Store,
        config: &EngineConfig,
        now: DateTime<Utc>,
    ) -> crate::storage::Result<String> {
        let idle_gap = Duration::minutes(config.session_idle_minutes);
        if let Some(latest) = store.read(|ops| ops.latest_session())? {
            if latest.ended_at.is_none() {
                let last_activity = store
                    .read(|ops| ops.last_session_activity(&latest.id))?
                    .unwrap_or(latest.started_at);
                if now - last_activity < idle_gap {
                    return Ok(latest.id);
                }
            }
        }
        let id = Uuid::new_v4().to_string();
        store.write(|ops| ops.insert_session(&id, now))?;
        Ok(id)
    }

    /// Rebuild window and tool chain from the last hour of the access log,
    /// deduplicated in arrival order
    fn rebuild_window(
        store: &Store,
        config: &EngineConfig,
        now: DateTime<Utc>,
    ) -> crate::storage::Result<(VecDeque<String>, VecDeque<String>)> {
        let since = now - Duration::hours(WINDOW_REBUILD_HOURS);
        let ids = store.read(|ops| ops.recent_access_neuron_ids(since))?;

        let mut window: VecDeque<String> = VecDeque::new();
        let mut tool_chain: VecDeque<String> = VecDeque::new();
        for id in ids {
            if id.starts_with("tool:") {
                reinsert(&mut tool_chain, &id, config.tool_chain_size);
            }
            reinsert(&mut window, &id, config.window_size);
        }
        Ok((window, tool_chain))
    }

    /// Current session id
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Behavioral constants in effect
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Shared handle to the backing store
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    // ========================================================================
    // WRITE PATH
    // ========================================================================

    /// Record one observation
    ///
    /// Upserts the neuron (BCM myelination on update), appends an access-log
    /// row, strengthens both directions of every window-peer synapse with a
    /// SNAP-gated Hebbian delta, runs the tag-capture pass, then pushes the
    /// neuron onto the window. Never blocks on the embedding model.
    pub fn record(
        &mut self,
        path: &str,
        neuron_type: NeuronType,
        query: Option<&str>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Neuron> {
        let path = path.trim();
        if path.is_empty() {
            return Err(EngineError::Input("path must not be empty".into()));
        }

        let now = timestamp.unwrap_or_else(Utc::now);
        let id = neuron_id(neuron_type, path);
        let existing = self.store.read(|ops| ops.get_neuron(&id))?;

        let (myelination, mut contexts, is_new) = match &existing {
            Some(n) => {
                let delta = self.config.myelination_delta(n.myelination, n.access_count);
                let m = (n.myelination + delta).min(self.config.myelination_ceiling);
                (m, n.contexts.clone(), false)
            }
            None => (0.0, Vec::new(), true),
        };
        if let Some(q) = query {
            push_context(&mut contexts, q, self.config.contexts_cap);
        }

        // The window admits the current neuron first: peers are whatever
        // survives the trim, so a 26th distinct record never wires to the
        // evicted head.
        reinsert(&mut self.window, &id, self.config.window_size);
        let synapses = self.window_deltas(&id, neuron_type)?;
        let access_order = self
            .store
            .read(|ops| ops.next_access_order(&self.session_id))?;

        let obs = ObservationWrite {
            neuron_id: id.clone(),
            neuron_type,
            path: path.to_string(),
            activation: 1.0,
            myelination,
            contexts,
            session_id: self.session_id.clone(),
            query: query.map(|q| q.to_string()),
            timestamp: now,
            token_cost: self.config.token_cost(neuron_type),
            access_order,
            synapses,
            capture_floor: self.config.tag_capture_floor,
            capture_window_start: now - Duration::minutes(self.config.capture_window_minutes),
        };
        let mut neuron = self.store.commit_observation(&obs)?;

        if neuron_type == NeuronType::Tool {
            reinsert(&mut self.tool_chain, &id, self.config.tool_chain_size);
        }
        if neuron_type == NeuronType::File {
            self.opened.insert(id.clone());
            if neuron.ignore_streak > 0 {
                self.store.write(|ops| ops.reset_ignore_streak(&id))?;
                neuron.ignore_streak = 0;
            }
        }

        #[cfg(feature = "embeddings")]
        if is_new {
            self.schedule_embed(&neuron);
        }
        #[cfg(not(feature = "embeddings"))]
        let _ = is_new;

        Ok(neuron)
    }

    /// Hebbian deltas for every distinct window peer, both directions
    fn window_deltas(&self, id: &str, neuron_type: NeuronType) -> Result<Vec<SynapseWrite>> {
        let window_len = self.window.len();
        if window_len <= 1 {
            return Ok(Vec::new());
        }

        let current_is_error = neuron_type == NeuronType::Error;
        let current_is_hub =
            self.store.read(|ops| ops.out_degree(id))? > self.config.hub_degree_threshold;

        let mut writes = Vec::with_capacity(window_len * 2);
        for (i, peer) in self.window.iter().enumerate() {
            if peer == id {
                continue;
            }

            let peer_is_error = peer.starts_with("error:");
            let peer_is_hub = self.store.read(|ops| ops.out_degree(peer))?
                > self.config.hub_degree_threshold;

            let mut base = self.config.learning_rate;
            if current_is_error || peer_is_error {
                base *= self.config.error_boost;
            }
            if current_is_hub || peer_is_hub {
                base *= self.config.hub_penalty;
            }
            // Oldest window entries contribute the weakest associations
            base *= (i + 1) as f64 / window_len as f64;

            let w_forward = self
                .store
                .read(|ops| ops.get_synapse(peer, id))?
                .map(|s| s.weight)
                .unwrap_or(0.0);
            let w_reverse = self
                .store
                .read(|ops| ops.get_synapse(id, peer))?
                .map(|s| s.weight)
                .unwrap_or(0.0);

            writes.push(SynapseWrite {
                source: peer.clone(),
                target: id.to_string(),
                delta: base * self.config.snap(w_forward),
            });
            writes.push(SynapseWrite {
                source: id.to_string(),
                target: peer.clone(),
                delta: base * self.config.snap(w_reverse),
            });
        }
        Ok(writes)
    }

    /// Record an error occurrence and surface candidate fixes
    ///
    /// Normalizes the raw error, records it plus its fingerprint as error
    /// neurons wired at 0.85, then fishes fix candidates out of both the
    /// recall pipeline and a direct traversal of the error's own synapses
    /// (spreading seeds are type-filtered, the traversal is not).
    pub fn record_error(
        &mut self,
        raw: &str,
        query: Option<&str>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<(Neuron, Vec<RecallResult>)> {
        if raw.trim().is_empty() {
            return Err(EngineError::Input("error text must not be empty".into()));
        }

        let now = timestamp.unwrap_or_else(Utc::now);
        let normalized = canon::normalize(raw);
        let fp = canon::fingerprint(raw);

        let error_neuron = self.record(&normalized, NeuronType::Error, query, Some(now))?;
        self.record(&fp.key, NeuronType::Error, query, Some(now))?;

        let error_id = error_neuron.id.clone();
        let fp_id = neuron_id(NeuronType::Error, &fp.key);
        self.store.write(|ops| {
            ops.set_synapse(&error_id, &fp_id, ERROR_FIX_WEIGHT, now)?;
            ops.set_synapse(&fp_id, &error_id, ERROR_FIX_WEIGHT, now)
        })?;

        let mut fixes = self.recall_at(
            &normalized,
            self.config.default_token_budget,
            self.config.default_limit,
            TypeFilter::Only(NeuronType::File),
            now,
        )?;

        // Direct traversal catches resolved fixes the spreading seeds missed
        let outgoing = self.store.read(|ops| {
            ops.strongest_outgoing(&error_id, self.config.min_traversal_weight, 50)
        })?;
        for synapse in outgoing {
            if !synapse.target_id.starts_with("file:") {
                continue;
            }
            if fixes.iter().any(|r| r.neuron.id == synapse.target_id) {
                continue;
            }
            if let Some(neuron) = self.store.read(|ops| ops.get_neuron(&synapse.target_id))? {
                fixes.push(RecallResult {
                    confidence: synapse.weight.min(0.99),
                    activation_path: "error→fix (resolved)".to_string(),
                    tokens_saved: self.config.token_cost(neuron.neuron_type),
                    snippets: Vec::new(),
                    neuron,
                });
            }
        }
        fixes.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok((error_neuron, fixes))
    }

    /// Wire an error (and its fingerprint) to the files that fixed it
    ///
    /// The only operation that sets synapse weights directly instead of
    /// strengthening incrementally.
    pub fn resolve_error(
        &mut self,
        raw: &str,
        fix_paths: &[String],
        context: Option<&str>,
    ) -> Result<()> {
        if raw.trim().is_empty() {
            return Err(EngineError::Input("error text must not be empty".into()));
        }
        if fix_paths.is_empty() {
            return Err(EngineError::Input("at least one fix path required".into()));
        }

        let now = Utc::now();
        let normalized = canon::normalize(raw);
        let fp = canon::fingerprint(raw);

        let error_neuron = self.record(&normalized, NeuronType::Error, context, Some(now))?;
        self.record(&fp.key, NeuronType::Error, context, Some(now))?;
        let error_id = error_neuron.id;
        let fp_id = neuron_id(NeuronType::Error, &fp.key);

        for fix in fix_paths {
            let fix_neuron = self.record(fix, NeuronType::File, context, Some(now))?;
            let fix_id = fix_neuron.id;
            self.store.write(|ops| {
                for err in [error_id.as_str(), fp_id.as_str()] {
                    ops.set_synapse(err, &fix_id, ERROR_FIX_WEIGHT, now)?;
                    ops.set_synapse(&fix_id, err, ERROR_FIX_WEIGHT, now)?;
                }
                Ok(())
            })?;
        }
        Ok(())
    }

    // ========================================================================
    // SEEDING API (bootstrap collaborators)
    // ========================================================================

    /// Upsert a neuron without Hebbian updates or window membership
    pub fn seed_neuron(
        &mut self,
        path: &str,
        neuron_type: NeuronType,
        first_context: Option<&str>,
    ) -> Result<Neuron> {
        let path = path.trim();
        if path.is_empty() {
            return Err(EngineError::Input("path must not be empty".into()));
        }
        let id = neuron_id(neuron_type, path);
        let now = Utc::now();
        let created = self.store.write(|ops| {
            ops.insert_neuron_if_absent(&id, neuron_type, path, SEED_ACTIVATION, now, first_context)
        })?;
        if !created {
            if let Some(context) = first_context {
                self.append_context(&id, context)?;
            }
        }
        self.store
            .read(|ops| ops.get_neuron(&id))?
            .ok_or(EngineError::UnknownNeuron(id))
    }

    /// Write a bidirectional synapse with MAX-merge semantics
    ///
    /// Endpoints are created as file neurons when absent, so bootstrap sources
    /// can emit edges without seeding every node first.
    pub fn seed_synapse(
        &mut self,
        path_a: &str,
        path_b: &str,
        weight: f64,
        co_access_count: Option<i64>,
    ) -> Result<()> {
        let (path_a, path_b) = (path_a.trim(), path_b.trim());
        if path_a.is_empty() || path_b.is_empty() || path_a == path_b {
            return Err(EngineError::Input(
                "seed synapse requires two distinct non-empty paths".into(),
            ));
        }
        let now = Utc::now();
        let id_a = self.resolve_or_seed(path_a, now)?;
        let id_b = self.resolve_or_seed(path_b, now)?;
        let co = co_access_count.unwrap_or(1).max(1);
        self.store.write(|ops| {
            ops.seed_synapse(&id_a, &id_b, weight, co, now)?;
            ops.seed_synapse(&id_b, &id_a, weight, co, now)
        })?;
        Ok(())
    }

    /// Resolve a seed path to an existing neuron id of any type, creating a
    /// file neuron when nothing matches
    fn resolve_or_seed(&self, path: &str, now: DateTime<Utc>) -> Result<String> {
        for t in [
            NeuronType::File,
            NeuronType::Semantic,
            NeuronType::Tool,
            NeuronType::Error,
        ] {
            let id = neuron_id(t, path);
            if self.store.read(|ops| ops.get_neuron(&id))?.is_some() {
                return Ok(id);
            }
        }
        let id = neuron_id(NeuronType::File, path);
        self.store.write(|ops| {
            ops.insert_neuron_if_absent(&id, NeuronType::File, path, SEED_ACTIVATION, now, None)
        })?;
        Ok(id)
    }

    /// Append a context to a neuron, respecting the cap and dedup
    pub fn append_context(&mut self, neuron_id: &str, context: &str) -> Result<()> {
        let mut neuron = self
            .store
            .read(|ops| ops.get_neuron(neuron_id))?
            .ok_or_else(|| EngineError::UnknownNeuron(neuron_id.to_string()))?;
        push_context(&mut neuron.contexts, context, self.config.contexts_cap);
        self.store
            .write(|ops| ops.update_contexts(&neuron.id, &neuron.contexts))?;
        Ok(())
    }

    /// Drop the in-memory co-access window (logical group boundary)
    pub fn clear_co_access_window(&mut self) {
        self.window.clear();
    }

    /// Apply one bootstrap batch; returns (neurons seeded, synapses seeded)
    ///
    /// The window is cleared afterwards so co-access never leaks across
    /// logical groups (commit boundaries and the like).
    pub fn apply_seed_batch(&mut self, batch: &crate::boundary::SeedBatch) -> Result<(usize, usize)> {
        let mut neurons = 0;
        let mut synapses = 0;
        for seed in &batch.neurons {
            self.seed_neuron(&seed.path, seed.neuron_type, seed.context.as_deref())?;
            neurons += 1;
        }
        for seed in &batch.synapses {
            self.seed_synapse(
                &seed.path_a,
                &seed.path_b,
                seed.weight,
                seed.co_access_count,
            )?;
            synapses += 1;
        }
        self.clear_co_access_window();
        Ok((neurons, synapses))
    }

    /// Ingest externally-extracted snippets for their parent file neurons
    pub fn ingest_snippets(&mut self, records: &[crate::boundary::SnippetRecord]) -> Result<usize> {
        let now = Utc::now();
        let mut ingested = 0;
        for record in records {
            let parent_id = neuron_id(NeuronType::File, record.file_path.trim());
            self.store.write(|ops| {
                ops.insert_neuron_if_absent(
                    &parent_id,
                    NeuronType::File,
                    record.file_path.trim(),
                    SEED_ACTIVATION,
                    now,
                    None,
                )
            })?;
            // Content-addressed id keeps re-extraction idempotent
            let snippet_id = format!("{}#{}:{}", parent_id, record.name, record.start_line);
            self.store.write(|ops| {
                ops.upsert_snippet(
                    &snippet_id,
                    &parent_id,
                    &record.name,
                    record.kind,
                    record.start_line,
                    record.end_line,
                    &record.source,
                    &record.content_hash,
                    None,
                    now,
                )
            })?;
            ingested += 1;
        }
        if ingested > 0 {
            crate::snippets::invalidate();
        }
        Ok(ingested)
    }

    // ========================================================================
    // SESSIONS
    // ========================================================================

    /// Finalize the current session and start a new one
    ///
    /// Applies anti-recall to files that were suggested but never opened,
    /// writes the final hit rate, then resets per-session state. Callers
    /// typically follow rotation with `decay` and `consolidate`.
    pub fn rotate_session(&mut self, timestamp: Option<DateTime<Utc>>) -> Result<String> {
        let now = timestamp.unwrap_or_else(Utc::now);

        self.apply_anti_recall(true)?;

        let hit_rate = if self.recall_calls > 0 {
            self.recall_hits as f64 / self.recall_calls as f64
        } else {
            0.0
        };
        let old_id = self.session_id.clone();
        self.store.write(|ops| {
            ops.set_session_hit_rate(&old_id, hit_rate)?;
            ops.end_session(&old_id, now)
        })?;

        let new_id = Uuid::new_v4().to_string();
        self.store.write(|ops| ops.insert_session(&new_id, now))?;
        self.session_id = new_id.clone();
        self.recalled.clear();
        self.opened.clear();
        self.recall_calls = 0;
        self.recall_hits = 0;

        Ok(new_id)
    }

    /// Attach an intent string to the current session
    pub fn set_session_intent(&mut self, intent: &str) -> Result<()> {
        let intent = intent.trim();
        if intent.is_empty() {
            return Err(EngineError::Input("intent must not be empty".into()));
        }
        let id = self.session_id.clone();
        self.store
            .write(|ops| ops.set_session_intent(&id, intent))?;
        Ok(())
    }

    // ========================================================================
    // BACKGROUND EMBEDDING
    // ========================================================================

    #[cfg(feature = "embeddings")]
    fn schedule_embed(&self, neuron: &Neuron) {
        let Some(embedder) = &self.embedder else {
            return;
        };
        let text = embed_text(neuron);
        embedder.submit(Arc::clone(&self.store), neuron.id.clone(), text);
    }

    /// Query embedding with an LRU cache; `None` when the model is unavailable
    #[cfg(feature = "embeddings")]
    pub(crate) fn query_embedding(&mut self, query: &str) -> Option<Embedding> {
        if !self.enable_embeddings {
            return None;
        }
        if let Some(hit) = self.query_cache.get(query) {
            return Some(hit.clone());
        }
        if !self.embedding_service.is_ready() {
            return None;
        }
        match self.embedding_service.embed(query) {
            Ok(embedding) => {
                self.query_cache.put(query.to_string(), embedding.clone());
                Some(embedding)
            }
            Err(e) => {
                tracing::debug!("Query embedding unavailable: {}", e);
                None
            }
        }
    }

    #[cfg(not(feature = "embeddings"))]
    pub(crate) fn query_embedding(&mut self, _query: &str) -> Option<crate::embeddings::Embedding> {
        None
    }

    /// Back-fill missing neuron and snippet embeddings in batches
    ///
    /// Returns (neurons embedded, snippets embedded).
    #[cfg(feature = "embeddings")]
    pub fn embed_pending(&mut self, limit: usize) -> Result<(usize, usize)> {
        if !self.enable_embeddings || !self.embedding_service.is_ready() {
            return Ok((0, 0));
        }

        let neurons = self.store.read(|ops| ops.neurons_missing_embedding(limit))?;
        let mut neurons_done = 0;
        if !neurons.is_empty() {
            let texts: Vec<String> = neurons.iter().map(embed_text).collect();
            let refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
            if let Ok(embeddings) = self.embedding_service.embed_batch(&refs) {
                for (neuron, embedding) in neurons.iter().zip(embeddings.iter()) {
                    self.store
                        .write(|ops| ops.set_neuron_embedding(&neuron.id, embedding))?;
                    neurons_done += 1;
                }
            }
        }

        let snippets = self
            .store
            .read(|ops| ops.snippets_missing_embedding(limit))?;
        let mut snippets_done = 0;
        if !snippets.is_empty() {
            let texts: Vec<String> = snippets
                .iter()
                .map(|s| format!("{} {}", s.name, s.source))
                .collect();
            let refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
            if let Ok(embeddings) = self.embedding_service.embed_batch(&refs) {
                for (snippet, embedding) in snippets.iter().zip(embeddings.iter()) {
                    self.store
                        .write(|ops| ops.set_snippet_embedding(&snippet.id, embedding))?;
                    snippets_done += 1;
                }
                crate::snippets::invalidate();
            }
        }

        Ok((neurons_done, snippets_done))
    }
}

/// Text embedded for a neuron: its path plus accumulated contexts
#[cfg(feature = "embeddings")]
fn embed_text(neuron: &Neuron) -> String {
    if neuron.contexts.is_empty() {
        neuron.path.clone()
    } else {
        format!("{} {}", neuron.path, neuron.contexts.join(" "))
    }
}

/// Push an id onto a bounded deque, displacing an existing occurrence
fn reinsert(deque: &mut VecDeque<String>, id: &str, cap: usize) {
    if let Some(pos) = deque.iter().position(|x| x == id) {
        deque.remove(pos);
    }
    deque.push_back(id.to_string());
    while deque.len() > cap {
        deque.pop_front();
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reinsert_dedups_and_trims() {
        let mut deque = VecDeque::new();
        for id in ["a", "b", "c", "b"] {
            reinsert(&mut deque, id, 3);
        }
        assert_eq!(deque, VecDeque::from(vec!["a".to_string(), "c".into(), "b".into()]));

        reinsert(&mut deque, "d", 3);
        assert_eq!(deque.front().map(String::as_str), Some("c"));
        assert_eq!(deque.len(), 3);
    }

    #[test]
    fn test_engine_options_default() {
        let options = EngineOptions::default();
        assert!(options.db_path.is_none());
        assert!(options.enable_embeddings);
        assert_eq!(options.config.window_size, 25);
    }
}
