//! SQLite Storage Implementation
//!
//! Persistent relational storage for the memory graph. Single-writer with
//! cross-process read-only consumers: a writer and a reader connection behind
//! mutexes make the store `Send + Sync` without handing out connections.
//!
//! The store executes rows and predicates; the engine owns all semantic
//! decisions. Multi-row writes that must be atomic (observation commits,
//! maintenance passes) run through `exclusive`, which wraps an IMMEDIATE
//! transaction around a batch of operations.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

use crate::embeddings::Embedding;
use crate::memory::{
    AccessLogEntry, Neuron, NeuronType, SessionRecord, Snippet, SnippetKind, Synapse,
};

/// Environment variable overriding the store location (sandboxed testing)
pub const DB_PATH_ENV: &str = "ENGRAM_DB_PATH";

/// Default database file name
const DB_FILE_NAME: &str = "engram.db";

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Storage error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Invalid persisted timestamp
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
    /// Initialization error
    #[error("Initialization error: {0}")]
    Init(String),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StoreError>;

// ============================================================================
// TIMESTAMP HELPERS
// ============================================================================

/// Serialize a timestamp in the single canonical format
///
/// Every persisted timestamp uses microsecond precision and a numeric offset
/// so ISO-8601 lexicographic ordering equals temporal ordering.
pub fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Parse a persisted timestamp
pub fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|_| StoreError::InvalidTimestamp(s.to_string()))
}

fn parse_ts_opt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
    s.map(|v| parse_ts(&v)).transpose()
}

fn contexts_to_json(contexts: &[String]) -> String {
    serde_json::to_string(contexts).unwrap_or_else(|_| "[]".to_string())
}

fn contexts_from_json(json: &str) -> Vec<String> {
    serde_json::from_str(json).unwrap_or_default()
}

// ============================================================================
// OBSERVATION WRITE
// ============================================================================

/// One precomputed directed synapse strengthening
#[derive(Debug, Clone)]
pub struct SynapseWrite {
    pub source: String,
    pub target: String,
    /// Hebbian delta, already SNAP-gated by the engine
    pub delta: f64,
}

/// Everything one `record` call persists, committed atomically
#[derive(Debug, Clone)]
pub struct ObservationWrite {
    pub neuron_id: String,
    pub neuron_type: NeuronType,
    pub path: String,
    pub activation: f64,
    pub myelination: f64,
    pub contexts: Vec<String>,
    pub session_id: String,
    pub query: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub token_cost: i64,
    pub access_order: i64,
    /// Both directions of every window-peer strengthening
    pub synapses: Vec<SynapseWrite>,
    /// Tag-capture floor applied to tagged incident synapses
    pub capture_floor: f64,
    /// Start of the capture window (tags older than this are left for expiry)
    pub capture_window_start: DateTime<Utc>,
}

// ============================================================================
// STORE
// ============================================================================

/// Persistent store for neurons, synapses, access log, sessions, and snippets
///
/// All methods take `&self`; interior mutability via the connection mutexes
/// keeps the store shareable with the background embedder.
pub struct Store {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    path: PathBuf,
}

impl Store {
    /// Resolve the database path: explicit > `ENGRAM_DB_PATH` > platform dir
    pub fn resolve_path(db_path: Option<PathBuf>) -> Result<PathBuf> {
        if let Some(p) = db_path {
            return Ok(p);
        }
        if let Ok(p) = std::env::var(DB_PATH_ENV) {
            if !p.is_empty() {
                return Ok(PathBuf::from(p));
            }
        }
        let proj_dirs = ProjectDirs::from("com", "engram", "core")
            .ok_or_else(|| StoreError::Init("Could not determine project directories".into()))?;
        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;
        Ok(data_dir.join(DB_FILE_NAME))
    }

    /// Apply PRAGMAs to a connection
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -32000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    /// Open (or create) the store and apply migrations
    pub fn new(db_path: Option<PathBuf>) -> Result<Self> {
        let path = Self::resolve_path(db_path)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let writer_conn = Connection::open(&path)?;
        Self::configure_connection(&writer_conn)?;
        super::migrations::apply_migrations(&writer_conn)?;

        let reader_conn = Connection::open(&path)?;
        Self::configure_connection(&reader_conn)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
            path,
        })
    }

    /// Open an existing store read-only (cross-process consumers)
    pub fn open_read_only(db_path: Option<PathBuf>) -> Result<Self> {
        let path = Self::resolve_path(db_path)?;
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let open = || -> Result<Connection> {
            let conn = Connection::open_with_flags(&path, flags)?;
            conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
            Ok(conn)
        };
        Ok(Self {
            writer: Mutex::new(open()?),
            reader: Mutex::new(open()?),
            path,
        })
    }

    /// Path of the backing database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_writer(&self) -> Result<MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| StoreError::Init("Writer lock poisoned".into()))
    }

    fn lock_reader(&self) -> Result<MutexGuard<'_, Connection>> {
        self.reader
            .lock()
            .map_err(|_| StoreError::Init("Reader lock poisoned".into()))
    }

    /// Run read-only operations on the reader connection
    pub(crate) fn read<T>(&self, f: impl FnOnce(&Ops<'_>) -> Result<T>) -> Result<T> {
        let guard = self.lock_reader()?;
        f(&Ops { conn: &guard })
    }

    /// Run a single write operation on the writer connection
    pub(crate) fn write<T>(&self, f: impl FnOnce(&Ops<'_>) -> Result<T>) -> Result<T> {
        let guard = self.lock_writer()?;
        f(&Ops { conn: &guard })
    }

    /// Run a batch of operations inside one IMMEDIATE transaction
    ///
    /// Rolls back if the closure errors. Used for observation commits and the
    /// maintenance/consolidation passes.
    pub(crate) fn exclusive<T>(&self, f: impl FnOnce(&Ops<'_>) -> Result<T>) -> Result<T> {
        let guard = self.lock_writer()?;
        guard.execute_batch("BEGIN IMMEDIATE")?;
        let ops = Ops { conn: &guard };
        match f(&ops) {
            Ok(value) => {
                guard.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(e) => {
                let _ = guard.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    /// Commit everything one `record` call writes, atomically
    ///
    /// Visible order inside the transaction: neuron upsert, access-log append,
    /// peer synapse upserts (new edges born tagged), capture pass, session
    /// counters.
    pub fn commit_observation(&self, obs: &ObservationWrite) -> Result<Neuron> {
        self.exclusive(|ops| {
            ops.upsert_neuron(
                &obs.neuron_id,
                obs.neuron_type,
                &obs.path,
                obs.activation,
                obs.myelination,
                obs.timestamp,
                &obs.contexts,
            )?;
            ops.append_access(
                &obs.neuron_id,
                &obs.session_id,
                obs.query.as_deref(),
                obs.timestamp,
                obs.token_cost,
                obs.access_order,
            )?;
            for s in &obs.synapses {
                ops.upsert_synapse(&s.source, &s.target, s.delta, obs.timestamp)?;
            }
            ops.capture_tagged_incident(
                &obs.neuron_id,
                obs.capture_floor,
                obs.capture_window_start,
                obs.timestamp,
            )?;
            ops.bump_session(&obs.session_id, 1, obs.token_cost, 0)?;
            ops.get_neuron(&obs.neuron_id)?
                .ok_or_else(|| StoreError::NotFound(obs.neuron_id.clone()))
        })
    }

    // ========================================================================
    // PUBLIC CONVENIENCE WRAPPERS
    // ========================================================================
    //
    // The engine mostly goes through read/write/exclusive; these exist for
    // external consumers (CLI inspection commands, tests, cross-process
    // readers).

    pub fn get_neuron(&self, id: &str) -> Result<Option<Neuron>> {
        self.read(|ops| ops.get_neuron(id))
    }

    pub fn get_synapse(&self, source: &str, target: &str) -> Result<Option<Synapse>> {
        self.read(|ops| ops.get_synapse(source, target))
    }

    pub fn incident_synapses(&self, id: &str) -> Result<Vec<Synapse>> {
        self.read(|ops| ops.incident_synapses(id))
    }

    pub fn strongest_outgoing(
        &self,
        source: &str,
        min_weight: f64,
        limit: usize,
    ) -> Result<Vec<Synapse>> {
        self.read(|ops| ops.strongest_outgoing(source, min_weight, limit))
    }

    pub fn out_degree(&self, source: &str) -> Result<i64> {
        self.read(|ops| ops.out_degree(source))
    }

    pub fn access_rows_for_neuron(&self, id: &str) -> Result<i64> {
        self.read(|ops| ops.access_rows_for_neuron(id))
    }

    pub fn get_session(&self, id: &str) -> Result<Option<SessionRecord>> {
        self.read(|ops| ops.get_session(id))
    }

    pub fn list_sessions(&self, limit: usize) -> Result<Vec<SessionRecord>> {
        self.read(|ops| ops.list_sessions(limit))
    }

    pub fn all_neurons(&self, limit: usize, offset: usize) -> Result<Vec<Neuron>> {
        self.read(|ops| ops.all_neurons(limit, offset))
    }

    pub fn strongest_synapses(&self, limit: usize, offset: usize) -> Result<Vec<Synapse>> {
        self.read(|ops| ops.strongest_synapses(limit, offset))
    }

    pub fn get_neuron_embedding(&self, id: &str) -> Result<Option<Embedding>> {
        self.read(|ops| ops.get_neuron_embedding(id))
    }

    pub fn set_neuron_embedding(&self, id: &str, embedding: &Embedding) -> Result<()> {
        self.write(|ops| ops.set_neuron_embedding(id, embedding))
    }

    pub fn snippets_for_parent(&self, parent_id: &str) -> Result<Vec<Snippet>> {
        self.read(|ops| ops.snippets_for_parent(parent_id))
    }

    pub fn snippet_count(&self) -> Result<i64> {
        self.read(|ops| ops.snippet_count())
    }

    pub fn tool_sequences(&self, limit: usize) -> Result<Vec<Synapse>> {
        self.read(|ops| ops.tool_sequence_synapses(limit))
    }

    /// Promote a tagged synapse to the consolidated floor, clearing its tag
    pub fn capture_synapse(&self, source: &str, target: &str, floor: f64) -> Result<()> {
        self.write(|ops| ops.capture_synapse(source, target, floor))
    }

    /// Weaken one synapse multiplicatively, clamped at the floor
    pub fn weaken_synapse(&self, source: &str, target: &str, factor: f64, floor: f64) -> Result<()> {
        self.write(|ops| ops.weaken_synapse(source, target, factor, floor))
    }

    pub fn neurons_missing_embedding(&self, limit: usize) -> Result<Vec<Neuron>> {
        self.read(|ops| ops.neurons_missing_embedding(limit))
    }

    pub fn snippets_missing_embedding(&self, limit: usize) -> Result<Vec<Snippet>> {
        self.read(|ops| ops.snippets_missing_embedding(limit))
    }

    pub fn set_snippet_embedding(&self, id: &str, embedding: &Embedding) -> Result<()> {
        self.write(|ops| ops.set_snippet_embedding(id, embedding))
    }
}

// ============================================================================
// OPERATIONS
// ============================================================================

/// Operations bound to one live connection
///
/// Inside `Store::exclusive` these all share the surrounding transaction.
pub(crate) struct Ops<'a> {
    conn: &'a Connection,
}

const NEURON_COLS: &str = "id, neuron_type, path, activation, myelination, access_count, \
     last_accessed, created_at, contexts, embedding IS NOT NULL, project, ignore_streak";

const SYNAPSE_COLS: &str =
    "source_id, target_id, weight, co_access_count, last_fired, created_at, tagged_at";

const ACCESS_COLS: &str =
    "id, neuron_id, session_id, query, timestamp, token_cost, access_order";

const SESSION_COLS: &str =
    "id, started_at, ended_at, total_accesses, tokens_used, tokens_saved, hit_rate, intent";

const SNIPPET_COLS: &str = "id, parent_neuron_id, name, kind, start_line, end_line, source, \
     embedding IS NOT NULL, content_hash, created_at, updated_at";

fn neuron_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(Neuron, String, String)> {
    let type_str: String = row.get(1)?;
    let contexts_json: String = row.get(8)?;
    let last_accessed: String = row.get(6)?;
    let created_at: String = row.get(7)?;
    let neuron = Neuron {
        id: row.get(0)?,
        neuron_type: NeuronType::parse_name(&type_str),
        path: row.get(2)?,
        activation: row.get(3)?,
        myelination: row.get(4)?,
        access_count: row.get(5)?,
        last_accessed: Utc::now(), // replaced by caller after parse
        created_at: Utc::now(),
        contexts: contexts_from_json(&contexts_json),
        has_embedding: row.get(9)?,
        project: row.get(10)?,
        ignore_streak: row.get(11)?,
    };
    Ok((neuron, last_accessed, created_at))
}

fn finish_neuron(parts: (Neuron, String, String)) -> Result<Neuron> {
    let (mut neuron, last_accessed, created_at) = parts;
    neuron.last_accessed = parse_ts(&last_accessed)?;
    neuron.created_at = parse_ts(&created_at)?;
    // Out-of-range state in the store is a programmer error: loud in debug,
    // clamped in release
    debug_assert!(
        (0.0..=1.0).contains(&neuron.activation),
        "activation out of range for {}",
        neuron.id
    );
    debug_assert!(
        (0.0..=0.95).contains(&neuron.myelination),
        "myelination out of range for {}",
        neuron.id
    );
    neuron.activation = neuron.activation.clamp(0.0, 1.0);
    neuron.myelination = neuron.myelination.clamp(0.0, 0.95);
    Ok(neuron)
}

fn synapse_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(Synapse, String, String, Option<String>)> {
    let last_fired: String = row.get(4)?;
    let created_at: String = row.get(5)?;
    let tagged_at: Option<String> = row.get(6)?;
    let synapse = Synapse {
        source_id: row.get(0)?,
        target_id: row.get(1)?,
        weight: row.get(2)?,
        co_access_count: row.get(3)?,
        last_fired: Utc::now(),
        created_at: Utc::now(),
        tagged_at: None,
    };
    Ok((synapse, last_fired, created_at, tagged_at))
}

fn finish_synapse(parts: (Synapse, String, String, Option<String>)) -> Result<Synapse> {
    let (mut synapse, last_fired, created_at, tagged_at) = parts;
    synapse.last_fired = parse_ts(&last_fired)?;
    synapse.created_at = parse_ts(&created_at)?;
    synapse.tagged_at = parse_ts_opt(tagged_at)?;
    debug_assert!(
        (0.0..=1.0).contains(&synapse.weight),
        "weight out of range for {} -> {}",
        synapse.source_id,
        synapse.target_id
    );
    synapse.weight = synapse.weight.clamp(0.0, 1.0);
    Ok(synapse)
}

fn access_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(AccessLogEntry, String)> {
    let timestamp: String = row.get(4)?;
    let entry = AccessLogEntry {
        id: row.get(0)?,
        neuron_id: row.get(1)?,
        session_id: row.get(2)?,
        query: row.get(3)?,
        timestamp: Utc::now(),
        token_cost: row.get(5)?,
        access_order: row.get(6)?,
    };
    Ok((entry, timestamp))
}

fn finish_access(parts: (AccessLogEntry, String)) -> Result<AccessLogEntry> {
    let (mut entry, timestamp) = parts;
    entry.timestamp = parse_ts(&timestamp)?;
    Ok(entry)
}

fn session_from_row(
    row: &rusqlite::Row<'_>,
) -> rusqlite::Result<(SessionRecord, String, Option<String>)> {
    let started: String = row.get(1)?;
    let ended: Option<String> = row.get(2)?;
    let record = SessionRecord {
        id: row.get(0)?,
        started_at: Utc::now(),
        ended_at: None,
        total_accesses: row.get(3)?,
        tokens_used: row.get(4)?,
        tokens_saved: row.get(5)?,
        hit_rate: row.get(6)?,
        intent: row.get(7)?,
    };
    Ok((record, started, ended))
}

fn finish_session(parts: (SessionRecord, String, Option<String>)) -> Result<SessionRecord> {
    let (mut record, started, ended) = parts;
    record.started_at = parse_ts(&started)?;
    record.ended_at = parse_ts_opt(ended)?;
    Ok(record)
}

fn snippet_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(Snippet, String, String)> {
    let kind: String = row.get(3)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;
    let snippet = Snippet {
        id: row.get(0)?,
        parent_neuron_id: row.get(1)?,
        name: row.get(2)?,
        kind: SnippetKind::parse_name(&kind),
        start_line: row.get(4)?,
        end_line: row.get(5)?,
        source: row.get(6)?,
        has_embedding: row.get(7)?,
        content_hash: row.get(8)?,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    Ok((snippet, created_at, updated_at))
}

fn finish_snippet(parts: (Snippet, String, String)) -> Result<Snippet> {
    let (mut snippet, created_at, updated_at) = parts;
    snippet.created_at = parse_ts(&created_at)?;
    snippet.updated_at = parse_ts(&updated_at)?;
    Ok(snippet)
}

impl Ops<'_> {
    // ========================================================================
    // NEURONS
    // ========================================================================

    /// Observation upsert: bumps access_count and refreshes last_accessed
    #[allow(clippy::too_many_arguments)]
    pub fn upsert_neuron(
        &self,
        id: &str,
        neuron_type: NeuronType,
        path: &str,
        activation: f64,
        myelination: f64,
        now: DateTime<Utc>,
        contexts: &[String],
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO neurons (id, neuron_type, path, activation, myelination, access_count,
                                  last_accessed, created_at, contexts)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                 activation = excluded.activation,
                 myelination = excluded.myelination,
                 contexts = excluded.contexts,
                 access_count = access_count + 1,
                 last_accessed = excluded.last_accessed",
            params![
                id,
                neuron_type.as_str(),
                path,
                activation.clamp(0.0, 1.0),
                myelination,
                ts(now),
                contexts_to_json(contexts),
            ],
        )?;
        Ok(())
    }

    /// Bootstrap insert: no access bump, no access-log row; returns created
    pub fn insert_neuron_if_absent(
        &self,
        id: &str,
        neuron_type: NeuronType,
        path: &str,
        activation: f64,
        now: DateTime<Utc>,
        context: Option<&str>,
    ) -> Result<bool> {
        let contexts = context
            .map(|c| vec![c.to_string()])
            .unwrap_or_default();
        let changed = self.conn.execute(
            "INSERT INTO neurons (id, neuron_type, path, activation, myelination, access_count,
                                  last_accessed, created_at, contexts)
             VALUES (?1, ?2, ?3, ?4, 0.0, 0, ?5, ?5, ?6)
             ON CONFLICT(id) DO NOTHING",
            params![
                id,
                neuron_type.as_str(),
                path,
                activation.clamp(0.0, 1.0),
                ts(now),
                contexts_to_json(&contexts),
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn get_neuron(&self, id: &str) -> Result<Option<Neuron>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM neurons WHERE id = ?1", NEURON_COLS),
                params![id],
                neuron_from_row,
            )
            .optional()?;
        row.map(finish_neuron).transpose()
    }

    pub fn update_contexts(&self, id: &str, contexts: &[String]) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE neurons SET contexts = ?2 WHERE id = ?1",
            params![id, contexts_to_json(contexts)],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    pub fn set_neuron_embedding(&self, id: &str, embedding: &Embedding) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE neurons SET embedding = ?2 WHERE id = ?1",
            params![id, embedding.to_bytes()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    pub fn get_neuron_embedding(&self, id: &str) -> Result<Option<Embedding>> {
        let bytes: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT embedding FROM neurons WHERE id = ?1 AND embedding IS NOT NULL",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(bytes.and_then(|b| Embedding::from_bytes(&b)))
    }

    /// Every stored (neuron id, embedding) pair, optionally filtered by type
    pub fn embedded_neurons(
        &self,
        neuron_type: Option<NeuronType>,
    ) -> Result<Vec<(String, Embedding)>> {
        let mut out = Vec::new();
        let mut push = |id: String, bytes: Vec<u8>| {
            if let Some(e) = Embedding::from_bytes(&bytes) {
                out.push((id, e));
            }
        };
        match neuron_type {
            Some(t) => {
                let mut stmt = self.conn.prepare_cached(
                    "SELECT id, embedding FROM neurons
                     WHERE embedding IS NOT NULL AND neuron_type = ?1",
                )?;
                let rows = stmt.query_map(params![t.as_str()], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
                })?;
                for row in rows {
                    let (id, bytes) = row?;
                    push(id, bytes);
                }
            }
            None => {
                let mut stmt = self
                    .conn
                    .prepare_cached("SELECT id, embedding FROM neurons WHERE embedding IS NOT NULL")?;
                let rows = stmt.query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
                })?;
                for row in rows {
                    let (id, bytes) = row?;
                    push(id, bytes);
                }
            }
        }
        Ok(out)
    }

    /// Neurons whose context list contains the (lowercased) token
    pub fn neurons_by_context_token(&self, token: &str, exclude_tools: bool) -> Result<Vec<Neuron>> {
        let sql = format!(
            "SELECT {} FROM neurons
             WHERE LOWER(contexts) LIKE '%' || ?1 || '%' {}",
            NEURON_COLS,
            if exclude_tools { "AND neuron_type != 'tool'" } else { "" }
        );
        self.collect_neurons(&sql, params![token])
    }

    /// File neurons whose path contains the (lowercased) token
    pub fn file_neurons_by_path_token(&self, token: &str) -> Result<Vec<Neuron>> {
        let sql = format!(
            "SELECT {} FROM neurons
             WHERE neuron_type = 'file' AND LOWER(path) LIKE '%' || ?1 || '%'",
            NEURON_COLS
        );
        self.collect_neurons(&sql, params![token])
    }

    pub fn top_myelinated(
        &self,
        neuron_type: Option<NeuronType>,
        exclude_tools: bool,
        limit: usize,
    ) -> Result<Vec<Neuron>> {
        let sql = match neuron_type {
            Some(_) => format!(
                "SELECT {} FROM neurons WHERE neuron_type = ?1 AND myelination > 0.0
                 ORDER BY myelination DESC LIMIT ?2",
                NEURON_COLS
            ),
            None => format!(
                "SELECT {} FROM neurons WHERE myelination > 0.0 {}
                 ORDER BY myelination DESC LIMIT ?1",
                NEURON_COLS,
                if exclude_tools { "AND neuron_type != 'tool'" } else { "" }
            ),
        };
        match neuron_type {
            Some(t) => self.collect_neurons(&sql, params![t.as_str(), limit as i64]),
            None => self.collect_neurons(&sql, params![limit as i64]),
        }
    }

    pub fn all_neurons(&self, limit: usize, offset: usize) -> Result<Vec<Neuron>> {
        let sql = format!(
            "SELECT {} FROM neurons ORDER BY last_accessed DESC LIMIT ?1 OFFSET ?2",
            NEURON_COLS
        );
        self.collect_neurons(&sql, params![limit as i64, offset as i64])
    }

    fn collect_neurons<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Neuron>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params, neuron_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(finish_neuron(row?)?);
        }
        Ok(out)
    }

    pub fn neuron_count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM neurons", [], |r| r.get(0))?)
    }

    pub fn neuron_count_by_type(&self, neuron_type: NeuronType) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM neurons WHERE neuron_type = ?1",
            params![neuron_type.as_str()],
            |r| r.get(0),
        )?)
    }

    pub fn embedded_neuron_count(&self) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM neurons WHERE embedding IS NOT NULL",
            [],
            |r| r.get(0),
        )?)
    }

    pub fn superhighway_count(&self, threshold: f64) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM neurons WHERE myelination > ?1",
            params![threshold],
            |r| r.get(0),
        )?)
    }

    pub fn avg_file_myelination(&self) -> Result<f64> {
        Ok(self.conn.query_row(
            "SELECT COALESCE(AVG(myelination), 0.0) FROM neurons WHERE neuron_type = 'file'",
            [],
            |r| r.get(0),
        )?)
    }

    pub fn avg_myelination(&self) -> Result<f64> {
        Ok(self.conn.query_row(
            "SELECT COALESCE(AVG(myelination), 0.0) FROM neurons",
            [],
            |r| r.get(0),
        )?)
    }

    pub fn avg_file_access_count(&self) -> Result<f64> {
        Ok(self.conn.query_row(
            "SELECT COALESCE(AVG(access_count), 0.0) FROM neurons WHERE neuron_type = 'file'",
            [],
            |r| r.get(0),
        )?)
    }

    pub fn scale_file_myelination(&self, ratio: f64, ceiling: f64) -> Result<usize> {
        Ok(self.conn.execute(
            "UPDATE neurons SET myelination = MIN(myelination * ?1, ?2)
             WHERE neuron_type = 'file'",
            params![ratio, ceiling],
        )?)
    }

    pub fn penalize_hyperactive(&self, access_threshold: f64, factor: f64) -> Result<usize> {
        Ok(self.conn.execute(
            "UPDATE neurons SET myelination = myelination * ?2
             WHERE neuron_type = 'file' AND access_count > ?1",
            params![access_threshold, factor],
        )?)
    }

    pub fn boost_underactive(
        &self,
        access_threshold: f64,
        min_myelination: f64,
        factor: f64,
        ceiling: f64,
    ) -> Result<usize> {
        Ok(self.conn.execute(
            "UPDATE neurons SET myelination = MIN(myelination * ?3, ?4)
             WHERE neuron_type = 'file' AND access_count < ?1 AND myelination > ?2",
            params![access_threshold, min_myelination, factor, ceiling],
        )?)
    }

    pub fn decay_neurons(
        &self,
        activation_factor: f64,
        myelination_factor: f64,
        ceiling: f64,
    ) -> Result<usize> {
        Ok(self.conn.execute(
            "UPDATE neurons SET
                 activation = MAX(activation * (1.0 - ?1), 0.0),
                 myelination = MIN(MAX(myelination * (1.0 - ?2), 0.0), ?3)",
            params![activation_factor, myelination_factor, ceiling],
        )?)
    }

    pub fn prune_dead_neurons(&self) -> Result<usize> {
        Ok(self.conn.execute(
            "DELETE FROM neurons
             WHERE activation < 0.01 AND myelination < 0.01 AND access_count < 2",
            [],
        )?)
    }

    pub fn prune_orphan_files(&self) -> Result<usize> {
        Ok(self.conn.execute(
            "DELETE FROM neurons
             WHERE neuron_type = 'file' AND access_count < 3 AND myelination < 0.05
               AND NOT EXISTS (SELECT 1 FROM synapses
                               WHERE source_id = neurons.id OR target_id = neurons.id)",
            [],
        )?)
    }

    pub fn increment_ignore_streak(&self, id: &str) -> Result<i64> {
        self.conn.execute(
            "UPDATE neurons SET ignore_streak = ignore_streak + 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(self.conn.query_row(
            "SELECT ignore_streak FROM neurons WHERE id = ?1",
            params![id],
            |r| r.get(0),
        )?)
    }

    pub fn reset_ignore_streak(&self, id: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE neurons SET ignore_streak = 0 WHERE id = ?1 AND ignore_streak > 0",
            params![id],
        )?;
        Ok(())
    }

    pub fn neurons_with_streak(&self, min_streak: i64) -> Result<Vec<Neuron>> {
        let sql = format!(
            "SELECT {} FROM neurons WHERE ignore_streak >= ?1 ORDER BY ignore_streak DESC",
            NEURON_COLS
        );
        self.collect_neurons(&sql, params![min_streak])
    }

    pub fn tag_project(&self, root: &str, name: &str) -> Result<usize> {
        Ok(self.conn.execute(
            "UPDATE neurons SET project = ?2
             WHERE neuron_type = 'file' AND path LIKE ?1 || '%'",
            params![root, name],
        )?)
    }

    pub fn neurons_by_project(&self, name: &str) -> Result<Vec<Neuron>> {
        let sql = format!(
            "SELECT {} FROM neurons WHERE project = ?1 ORDER BY myelination DESC",
            NEURON_COLS
        );
        self.collect_neurons(&sql, params![name])
    }

    pub fn list_projects(&self) -> Result<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT project, COUNT(*) FROM neurons
             WHERE project IS NOT NULL GROUP BY project ORDER BY COUNT(*) DESC",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Stale superhighways: myelinated above the threshold, idle past the cutoff
    pub fn stale_neurons(&self, min_myelination: f64, idle_cutoff: DateTime<Utc>) -> Result<Vec<Neuron>> {
        let sql = format!(
            "SELECT {} FROM neurons
             WHERE myelination >= ?1 AND last_accessed < ?2
             ORDER BY myelination DESC",
            NEURON_COLS
        );
        self.collect_neurons(&sql, params![min_myelination, ts(idle_cutoff)])
    }

    /// File neurons for the Ebbinghaus review window
    pub fn neurons_accessed_between(
        &self,
        neuron_type: NeuronType,
        min_myelination: f64,
        older_than: DateTime<Utc>,
        newer_than: Option<DateTime<Utc>>,
    ) -> Result<Vec<Neuron>> {
        match newer_than {
            Some(n) => {
                let sql = format!(
                    "SELECT {} FROM neurons
                     WHERE neuron_type = ?1 AND myelination > ?2
                       AND last_accessed < ?3 AND last_accessed >= ?4",
                    NEURON_COLS
                );
                self.collect_neurons(
                    &sql,
                    params![neuron_type.as_str(), min_myelination, ts(older_than), ts(n)],
                )
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM neurons
                     WHERE neuron_type = ?1 AND myelination > ?2 AND last_accessed < ?3",
                    NEURON_COLS
                );
                self.collect_neurons(
                    &sql,
                    params![neuron_type.as_str(), min_myelination, ts(older_than)],
                )
            }
        }
    }

    pub fn set_myelination(&self, id: &str, myelination: f64, ceiling: f64) -> Result<()> {
        self.conn.execute(
            "UPDATE neurons SET myelination = MIN(MAX(?2, 0.0), ?3) WHERE id = ?1",
            params![id, myelination, ceiling],
        )?;
        Ok(())
    }

    // ========================================================================
    // SYNAPSES
    // ========================================================================

    pub fn get_synapse(&self, source: &str, target: &str) -> Result<Option<Synapse>> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM synapses WHERE source_id = ?1 AND target_id = ?2",
                    SYNAPSE_COLS
                ),
                params![source, target],
                synapse_from_row,
            )
            .optional()?;
        row.map(finish_synapse).transpose()
    }

    /// Hebbian upsert: soft-bounded strengthening, new edges born tagged
    pub fn upsert_synapse(
        &self,
        source: &str,
        target: &str,
        delta: f64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO synapses (source_id, target_id, weight, co_access_count,
                                   last_fired, created_at, tagged_at)
             VALUES (?1, ?2, MIN(MAX(?3, 0.0), 1.0), 1, ?4, ?4, ?4)
             ON CONFLICT(source_id, target_id) DO UPDATE SET
                 weight = MIN(weight + ?3 * (1.0 - weight), 1.0),
                 co_access_count = co_access_count + 1,
                 last_fired = excluded.last_fired",
            params![source, target, delta, ts(now)],
        )?;
        Ok(())
    }

    /// Direct weight write (error→fix wiring); untagged on insert
    pub fn set_synapse(&self, source: &str, target: &str, weight: f64, now: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "INSERT INTO synapses (source_id, target_id, weight, co_access_count,
                                   last_fired, created_at, tagged_at)
             VALUES (?1, ?2, MIN(MAX(?3, 0.0), 1.0), 1, ?4, ?4, NULL)
             ON CONFLICT(source_id, target_id) DO UPDATE SET
                 weight = MIN(MAX(?3, 0.0), 1.0),
                 last_fired = excluded.last_fired",
            params![source, target, weight, ts(now)],
        )?;
        Ok(())
    }

    /// Bootstrap merge: MAX(existing, supplied) for weight and co-access
    pub fn seed_synapse(
        &self,
        source: &str,
        target: &str,
        weight: f64,
        co_access_count: i64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO synapses (source_id, target_id, weight, co_access_count,
                                   last_fired, created_at, tagged_at)
             VALUES (?1, ?2, MIN(MAX(?3, 0.0), 1.0), MAX(?4, 1), ?5, ?5, NULL)
             ON CONFLICT(source_id, target_id) DO UPDATE SET
                 weight = MAX(weight, MIN(MAX(?3, 0.0), 1.0)),
                 co_access_count = MAX(co_access_count, ?4),
                 last_fired = excluded.last_fired",
            params![source, target, weight, co_access_count, ts(now)],
        )?;
        Ok(())
    }

    /// Promote a tagged synapse to the consolidated floor, clearing the tag
    pub fn capture_synapse(&self, source: &str, target: &str, floor: f64) -> Result<()> {
        self.conn.execute(
            "UPDATE synapses SET weight = MAX(weight, ?3), tagged_at = NULL
             WHERE source_id = ?1 AND target_id = ?2",
            params![source, target, floor],
        )?;
        Ok(())
    }

    /// Capture pass for one observation
    ///
    /// Floors every tagged synapse incident to the neuron whose tag is inside
    /// the capture window. Tags placed by earlier calls are cleared; tags
    /// placed at `now` (edges born in this very observation) survive so a
    /// later touch can consolidate them.
    pub fn capture_tagged_incident(
        &self,
        neuron_id: &str,
        floor: f64,
        window_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        Ok(self.conn.execute(
            "UPDATE synapses SET
                 weight = MAX(weight, ?2),
                 tagged_at = CASE WHEN tagged_at = ?4 THEN tagged_at ELSE NULL END
             WHERE (source_id = ?1 OR target_id = ?1)
               AND tagged_at IS NOT NULL
               AND tagged_at >= ?3",
            params![neuron_id, floor, ts(window_start), ts(now)],
        )?)
    }

    pub fn weaken_synapse(&self, source: &str, target: &str, factor: f64, floor: f64) -> Result<()> {
        self.conn.execute(
            "UPDATE synapses SET weight = MAX(weight * (1.0 - ?3), ?4)
             WHERE source_id = ?1 AND target_id = ?2",
            params![source, target, factor, floor],
        )?;
        Ok(())
    }

    /// Weaken every synapse incident to a neuron (anti-recall)
    pub fn weaken_incident(&self, neuron_id: &str, factor: f64, floor: f64) -> Result<usize> {
        Ok(self.conn.execute(
            "UPDATE synapses SET weight = MAX(weight * (1.0 - ?2), ?3)
             WHERE source_id = ?1 OR target_id = ?1",
            params![neuron_id, factor, floor],
        )?)
    }

    pub fn strongest_outgoing(
        &self,
        source: &str,
        min_weight: f64,
        limit: usize,
    ) -> Result<Vec<Synapse>> {
        let sql = format!(
            "SELECT {} FROM synapses
             WHERE source_id = ?1 AND weight >= ?2
             ORDER BY weight DESC LIMIT ?3",
            SYNAPSE_COLS
        );
        self.collect_synapses(&sql, params![source, min_weight, limit as i64])
    }

    pub fn incident_synapses(&self, id: &str) -> Result<Vec<Synapse>> {
        let sql = format!(
            "SELECT {} FROM synapses WHERE source_id = ?1 OR target_id = ?1",
            SYNAPSE_COLS
        );
        self.collect_synapses(&sql, params![id])
    }

    pub fn strongest_synapses(&self, limit: usize, offset: usize) -> Result<Vec<Synapse>> {
        let sql = format!(
            "SELECT {} FROM synapses ORDER BY weight DESC LIMIT ?1 OFFSET ?2",
            SYNAPSE_COLS
        );
        self.collect_synapses(&sql, params![limit as i64, offset as i64])
    }

    /// Tool→tool edges, strongest first (sequence chains)
    pub fn tool_sequence_synapses(&self, limit: usize) -> Result<Vec<Synapse>> {
        let sql = format!(
            "SELECT {} FROM synapses
             WHERE source_id LIKE 'tool:%' AND target_id LIKE 'tool:%'
             ORDER BY weight DESC LIMIT ?1",
            SYNAPSE_COLS
        );
        self.collect_synapses(&sql, params![limit as i64])
    }

    fn collect_synapses<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Synapse>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params, synapse_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(finish_synapse(row?)?);
        }
        Ok(out)
    }

    pub fn out_degree(&self, source: &str) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM synapses WHERE source_id = ?1",
            params![source],
            |r| r.get(0),
        )?)
    }

    /// Out-degree over consolidated edges (weight strictly above the floor)
    pub fn out_degree_above(&self, source: &str, weight: f64) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM synapses WHERE source_id = ?1 AND weight > ?2",
            params![source, weight],
            |r| r.get(0),
        )?)
    }

    pub fn synapse_count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM synapses", [], |r| r.get(0))?)
    }

    pub fn tagged_synapse_count(&self) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM synapses WHERE tagged_at IS NOT NULL",
            [],
            |r| r.get(0),
        )?)
    }

    pub fn avg_synapse_weight(&self) -> Result<f64> {
        Ok(self.conn.query_row(
            "SELECT COALESCE(AVG(weight), 0.0) FROM synapses",
            [],
            |r| r.get(0),
        )?)
    }

    pub fn scale_synapse_weights(&self, ratio: f64) -> Result<usize> {
        Ok(self.conn.execute(
            "UPDATE synapses SET weight = MIN(MAX(weight * ?1, 0.0), 1.0)",
            params![ratio],
        )?)
    }

    pub fn decay_synapses(&self, factor: f64) -> Result<usize> {
        Ok(self.conn.execute(
            "UPDATE synapses SET weight = MAX(weight * (1.0 - ?1), 0.0)",
            params![factor],
        )?)
    }

    /// Weaken low-signal bridges into cold file neurons
    pub fn weaken_noise_bridges(
        &self,
        factor: f64,
        max_weight: f64,
        max_co_access: i64,
        max_activation: f64,
        max_myelination: f64,
    ) -> Result<usize> {
        Ok(self.conn.execute(
            "UPDATE synapses SET weight = MAX(weight * (1.0 - ?1), 0.0)
             WHERE weight < ?2 AND co_access_count <= ?3
               AND target_id IN (SELECT id FROM neurons
                                 WHERE neuron_type = 'file'
                                   AND activation < ?4 AND myelination < ?5)",
            params![factor, max_weight, max_co_access, max_activation, max_myelination],
        )?)
    }

    /// Tiered synapse pruning; returns total deleted
    pub fn prune_synapses_tiered(
        &self,
        weak_cutoff: DateTime<Utc>,
        sparse_cutoff: DateTime<Utc>,
        stale_cutoff: DateTime<Utc>,
    ) -> Result<usize> {
        let mut total = 0;
        total += self.conn.execute(
            "DELETE FROM synapses WHERE weight < 0.05 AND last_fired < ?1",
            params![ts(weak_cutoff)],
        )?;
        total += self.conn.execute(
            "DELETE FROM synapses WHERE weight < 0.15 AND co_access_count <= 1 AND last_fired < ?1",
            params![ts(sparse_cutoff)],
        )?;
        total += self.conn.execute(
            "DELETE FROM synapses WHERE weight < 0.3 AND last_fired < ?1",
            params![ts(stale_cutoff)],
        )?;
        // Flat safety net
        total += self
            .conn
            .execute("DELETE FROM synapses WHERE weight < 0.05", [])?;
        Ok(total)
    }

    /// Clear tags older than the cutoff (capture window expiry)
    pub fn expire_tags(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        Ok(self.conn.execute(
            "UPDATE synapses SET tagged_at = NULL WHERE tagged_at IS NOT NULL AND tagged_at < ?1",
            params![ts(cutoff)],
        )?)
    }

    pub fn top_sources_by_degree(&self, limit: usize) -> Result<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT source_id, COUNT(*) AS degree FROM synapses
             GROUP BY source_id ORDER BY degree DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    // ========================================================================
    // ACCESS LOG
    // ========================================================================

    pub fn append_access(
        &self,
        neuron_id: &str,
        session_id: &str,
        query: Option<&str>,
        now: DateTime<Utc>,
        token_cost: i64,
        access_order: i64,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO access_log (neuron_id, session_id, query, timestamp, token_cost, access_order)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![neuron_id, session_id, query, ts(now), token_cost, access_order],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn next_access_order(&self, session_id: &str) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COALESCE(MAX(access_order), 0) + 1 FROM access_log WHERE session_id = ?1",
            params![session_id],
            |r| r.get(0),
        )?)
    }

    pub fn access_rows_for_neuron(&self, neuron_id: &str) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM access_log WHERE neuron_id = ?1",
            params![neuron_id],
            |r| r.get(0),
        )?)
    }

    pub fn access_log_count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM access_log", [], |r| r.get(0))?)
    }

    /// Neuron ids accessed since the cutoff, in arrival order (window rebuild)
    pub fn recent_access_neuron_ids(&self, since: DateTime<Utc>) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT neuron_id FROM access_log WHERE timestamp >= ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![ts(since)], |row| row.get(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn session_entries(&self, session_id: &str) -> Result<Vec<AccessLogEntry>> {
        let sql = format!(
            "SELECT {} FROM access_log WHERE session_id = ?1 ORDER BY access_order ASC",
            ACCESS_COLS
        );
        self.collect_accesses(&sql, params![session_id])
    }

    /// All access rows since the cutoff, grouped by session then order
    pub fn entries_since(&self, since: DateTime<Utc>, files_only: bool) -> Result<Vec<AccessLogEntry>> {
        let sql = format!(
            "SELECT {} FROM access_log WHERE timestamp >= ?1 {}
             ORDER BY session_id, access_order ASC",
            ACCESS_COLS,
            if files_only { "AND neuron_id LIKE 'file:%'" } else { "" }
        );
        self.collect_accesses(&sql, params![ts(since)])
    }

    fn collect_accesses<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<AccessLogEntry>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params, access_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(finish_access(row?)?);
        }
        Ok(out)
    }

    /// Sessions since the cutoff with at least `min` recorded accesses
    pub fn sessions_with_min_accesses(
        &self,
        since: DateTime<Utc>,
        min: i64,
        limit: usize,
    ) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT session_id FROM access_log
             WHERE timestamp >= ?1
             GROUP BY session_id HAVING COUNT(*) >= ?2
             ORDER BY MAX(timestamp) DESC LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![ts(since), min, limit as i64], |row| row.get(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Sessions whose recorded queries contain the (lowercased) token
    pub fn sessions_matching_query_token(
        &self,
        since: DateTime<Utc>,
        token: &str,
    ) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT DISTINCT session_id FROM access_log
             WHERE timestamp >= ?1 AND query IS NOT NULL
               AND LOWER(query) LIKE '%' || ?2 || '%'",
        )?;
        let rows = stmt.query_map(params![ts(since), token], |row| row.get(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Most recent access timestamp within a session, if any
    pub fn last_session_activity(&self, session_id: &str) -> Result<Option<DateTime<Utc>>> {
        let raw: Option<String> = self.conn.query_row(
            "SELECT MAX(timestamp) FROM access_log WHERE session_id = ?1",
            params![session_id],
            |r| r.get(0),
        )?;
        parse_ts_opt(raw)
    }

    /// Truncate the episodic log: drop rows older than the cutoff, then keep
    /// only the `cap` newest
    pub fn prune_access_log(&self, cutoff: DateTime<Utc>, cap: i64) -> Result<usize> {
        let mut total = self.conn.execute(
            "DELETE FROM access_log WHERE timestamp < ?1",
            params![ts(cutoff)],
        )?;
        total += self.conn.execute(
            "DELETE FROM access_log
             WHERE id NOT IN (SELECT id FROM access_log ORDER BY id DESC LIMIT ?1)",
            params![cap],
        )?;
        Ok(total)
    }

    // ========================================================================
    // SESSIONS
    // ========================================================================

    pub fn insert_session(&self, id: &str, started_at: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO sessions (id, started_at) VALUES (?1, ?2)",
            params![id, ts(started_at)],
        )?;
        Ok(())
    }

    pub fn get_session(&self, id: &str) -> Result<Option<SessionRecord>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM sessions WHERE id = ?1", SESSION_COLS),
                params![id],
                session_from_row,
            )
            .optional()?;
        row.map(finish_session).transpose()
    }

    pub fn latest_session(&self) -> Result<Option<SessionRecord>> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM sessions ORDER BY started_at DESC LIMIT 1",
                    SESSION_COLS
                ),
                [],
                session_from_row,
            )
            .optional()?;
        row.map(finish_session).transpose()
    }

    pub fn list_sessions(&self, limit: usize) -> Result<Vec<SessionRecord>> {
        let sql = format!(
            "SELECT {} FROM sessions ORDER BY started_at DESC LIMIT ?1",
            SESSION_COLS
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params![limit as i64], session_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(finish_session(row?)?);
        }
        Ok(out)
    }

    pub fn session_count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))?)
    }

    pub fn bump_session(&self, id: &str, accesses: i64, used: i64, saved: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE sessions SET
                 total_accesses = total_accesses + ?2,
                 tokens_used = tokens_used + ?3,
                 tokens_saved = tokens_saved + ?4
             WHERE id = ?1",
            params![id, accesses, used, saved],
        )?;
        Ok(())
    }

    pub fn set_session_hit_rate(&self, id: &str, hit_rate: f64) -> Result<()> {
        self.conn.execute(
            "UPDATE sessions SET hit_rate = ?2 WHERE id = ?1",
            params![id, hit_rate],
        )?;
        Ok(())
    }

    pub fn end_session(&self, id: &str, ended_at: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "UPDATE sessions SET ended_at = ?2 WHERE id = ?1",
            params![id, ts(ended_at)],
        )?;
        Ok(())
    }

    pub fn set_session_intent(&self, id: &str, intent: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE sessions SET intent = ?2 WHERE id = ?1",
            params![id, intent],
        )?;
        Ok(())
    }

    /// Total token accounting across all sessions
    pub fn token_totals(&self) -> Result<(i64, i64, i64)> {
        Ok(self.conn.query_row(
            "SELECT COALESCE(SUM(tokens_used), 0), COALESCE(SUM(tokens_saved), 0), COUNT(*)
             FROM sessions",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )?)
    }

    // ========================================================================
    // SNIPPETS
    // ========================================================================

    #[allow(clippy::too_many_arguments)]
    pub fn upsert_snippet(
        &self,
        id: &str,
        parent_neuron_id: &str,
        name: &str,
        kind: SnippetKind,
        start_line: i64,
        end_line: i64,
        source: &str,
        content_hash: &str,
        embedding: Option<&Embedding>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO snippets (id, parent_neuron_id, name, kind, start_line, end_line,
                                   source, embedding, content_hash, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 kind = excluded.kind,
                 start_line = excluded.start_line,
                 end_line = excluded.end_line,
                 source = excluded.source,
                 embedding = COALESCE(excluded.embedding, embedding),
                 content_hash = excluded.content_hash,
                 updated_at = excluded.updated_at",
            params![
                id,
                parent_neuron_id,
                name,
                kind.as_str(),
                start_line,
                end_line,
                source,
                embedding.map(|e| e.to_bytes()),
                content_hash,
                ts(now),
            ],
        )?;
        Ok(())
    }

    pub fn snippets_for_parent(&self, parent_id: &str) -> Result<Vec<Snippet>> {
        let sql = format!(
            "SELECT {} FROM snippets WHERE parent_neuron_id = ?1 ORDER BY start_line ASC",
            SNIPPET_COLS
        );
        self.collect_snippets(&sql, params![parent_id])
    }

    pub fn snippet_count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM snippets", [], |r| r.get(0))?)
    }

    /// Every snippet with a stored embedding (snippet cache load)
    pub fn embedded_snippets(&self) -> Result<Vec<(Snippet, Embedding)>> {
        let sql = format!(
            "SELECT {}, embedding FROM snippets WHERE embedding IS NOT NULL",
            SNIPPET_COLS
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map([], |row| {
            let parts = snippet_from_row(row)?;
            let bytes: Vec<u8> = row.get(11)?;
            Ok((parts, bytes))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (parts, bytes) = row?;
            if let Some(embedding) = Embedding::from_bytes(&bytes) {
                out.push((finish_snippet(parts)?, embedding));
            }
        }
        Ok(out)
    }

    pub fn snippets_missing_embedding(&self, limit: usize) -> Result<Vec<Snippet>> {
        let sql = format!(
            "SELECT {} FROM snippets WHERE embedding IS NULL LIMIT ?1",
            SNIPPET_COLS
        );
        self.collect_snippets(&sql, params![limit as i64])
    }

    pub fn set_snippet_embedding(&self, id: &str, embedding: &Embedding) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE snippets SET embedding = ?2 WHERE id = ?1",
            params![id, embedding.to_bytes()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Neurons missing an embedding, most recently touched first
    pub fn neurons_missing_embedding(&self, limit: usize) -> Result<Vec<Neuron>> {
        let sql = format!(
            "SELECT {} FROM neurons WHERE embedding IS NULL
             ORDER BY last_accessed DESC LIMIT ?1",
            NEURON_COLS
        );
        self.collect_neurons(&sql, params![limit as i64])
    }

    fn collect_snippets<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Snippet>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params, snippet_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(finish_snippet(row?)?);
        }
        Ok(out)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_store() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(Some(dir.path().join("test.db"))).unwrap();
        (store, dir)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_ts_roundtrip_and_ordering() {
        let a = t0();
        let b = a + chrono::Duration::microseconds(1);
        assert_eq!(parse_ts(&ts(a)).unwrap(), a);
        // Lexicographic order equals temporal order in the canonical format
        assert!(ts(a) < ts(b));
    }

    #[test]
    fn test_upsert_neuron_increments_access_count() {
        let (store, _dir) = test_store();
        store
            .write(|ops| {
                ops.upsert_neuron("file:/a", NeuronType::File, "/a", 1.0, 0.0, t0(), &[])?;
                ops.upsert_neuron("file:/a", NeuronType::File, "/a", 1.0, 0.01, t0(), &[])
            })
            .unwrap();
        let n = store.get_neuron("file:/a").unwrap().unwrap();
        assert_eq!(n.access_count, 2);
        assert!((n.myelination - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_upsert_synapse_soft_bound() {
        let (store, _dir) = test_store();
        store
            .write(|ops| {
                ops.upsert_neuron("file:/a", NeuronType::File, "/a", 1.0, 0.0, t0(), &[])?;
                ops.upsert_neuron("file:/b", NeuronType::File, "/b", 1.0, 0.0, t0(), &[])?;
                ops.upsert_synapse("file:/a", "file:/b", 0.5, t0())?;
                ops.upsert_synapse("file:/a", "file:/b", 0.5, t0())
            })
            .unwrap();
        let s = store.get_synapse("file:/a", "file:/b").unwrap().unwrap();
        // 0.5 then 0.5 + 0.5*(1-0.5) = 0.75
        assert!((s.weight - 0.75).abs() < 1e-9);
        assert_eq!(s.co_access_count, 2);
        // New edge is born tagged, update leaves the tag alone
        assert!(s.tagged_at.is_some());
    }

    #[test]
    fn test_seed_synapse_max_merge() {
        let (store, _dir) = test_store();
        store
            .write(|ops| {
                ops.insert_neuron_if_absent("file:/a", NeuronType::File, "/a", 0.5, t0(), None)?;
                ops.insert_neuron_if_absent("file:/b", NeuronType::File, "/b", 0.5, t0(), None)?;
                ops.seed_synapse("file:/a", "file:/b", 0.6, 3, t0())?;
                ops.seed_synapse("file:/a", "file:/b", 0.2, 1, t0())
            })
            .unwrap();
        let s = store.get_synapse("file:/a", "file:/b").unwrap().unwrap();
        assert!((s.weight - 0.6).abs() < 1e-9);
        assert_eq!(s.co_access_count, 3);
        assert!(s.tagged_at.is_none());
    }

    #[test]
    fn test_capture_clears_tag_and_floors() {
        let (store, _dir) = test_store();
        store
            .write(|ops| {
                ops.upsert_neuron("file:/a", NeuronType::File, "/a", 1.0, 0.0, t0(), &[])?;
                ops.upsert_neuron("file:/b", NeuronType::File, "/b", 1.0, 0.0, t0(), &[])?;
                ops.upsert_synapse("file:/a", "file:/b", 0.1, t0())?;
                ops.capture_synapse("file:/a", "file:/b", 0.3)
            })
            .unwrap();
        let s = store.get_synapse("file:/a", "file:/b").unwrap().unwrap();
        assert!((s.weight - 0.3).abs() < 1e-9);
        assert!(s.tagged_at.is_none());
    }

    #[test]
    fn test_cascade_delete_synapses() {
        let (store, _dir) = test_store();
        store
            .write(|ops| {
                ops.upsert_neuron("file:/a", NeuronType::File, "/a", 0.0, 0.0, t0(), &[])?;
                ops.upsert_neuron("file:/b", NeuronType::File, "/b", 1.0, 0.5, t0(), &[])?;
                ops.upsert_synapse("file:/a", "file:/b", 0.5, t0())?;
                ops.upsert_synapse("file:/b", "file:/a", 0.5, t0())?;
                Ok(())
            })
            .unwrap();
        // "/a" has activation 0, myelination 0, access_count 1 -> dead
        let pruned = store.write(|ops| ops.prune_dead_neurons()).unwrap();
        assert_eq!(pruned, 1);
        assert!(store.get_synapse("file:/a", "file:/b").unwrap().is_none());
        assert!(store.get_synapse("file:/b", "file:/a").unwrap().is_none());
    }

    #[test]
    fn test_exclusive_rolls_back_on_error() {
        let (store, _dir) = test_store();
        let result: Result<()> = store.exclusive(|ops| {
            ops.upsert_neuron("file:/x", NeuronType::File, "/x", 1.0, 0.0, t0(), &[])?;
            Err(StoreError::NotFound("forced".into()))
        });
        assert!(result.is_err());
        assert!(store.get_neuron("file:/x").unwrap().is_none());
    }

    #[test]
    fn test_prune_access_log_cap() {
        let (store, _dir) = test_store();
        store
            .write(|ops| {
                ops.upsert_neuron("file:/a", NeuronType::File, "/a", 1.0, 0.0, t0(), &[])?;
                for i in 0..10 {
                    ops.append_access("file:/a", "s1", None, t0(), 0, i)?;
                }
                Ok(())
            })
            .unwrap();
        store
            .write(|ops| ops.prune_access_log(t0() - chrono::Duration::days(30), 5))
            .unwrap();
        let count = store.read(|ops| ops.access_log_count()).unwrap();
        assert_eq!(count, 5);
    }
}
