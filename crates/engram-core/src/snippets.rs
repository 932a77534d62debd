//! Snippet Embedding Cache
//!
//! Recall phase 5 scans every snippet embedding; reloading them from the
//! store on each recall would dominate the hot path. The cache is
//! process-global with a 60-second TTL and safe for concurrent readers.
//! Any code path that writes snippets must call `invalidate` - invalidation
//! is idempotent.

use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use crate::embeddings::Embedding;
use crate::memory::SnippetKind;
use crate::storage::{Result, Store};

/// How long a loaded cache stays valid
pub const SNIPPET_CACHE_TTL: Duration = Duration::from_secs(60);

/// The slice of a snippet the recall pipeline needs
#[derive(Debug, Clone)]
pub struct CachedSnippet {
    pub snippet_id: String,
    pub parent_neuron_id: String,
    pub name: String,
    pub kind: SnippetKind,
    pub start_line: i64,
    pub end_line: i64,
    pub embedding: Embedding,
}

#[derive(Default)]
struct CacheState {
    loaded_at: Option<Instant>,
    entries: Arc<Vec<CachedSnippet>>,
}

static SNIPPET_CACHE: OnceLock<Mutex<CacheState>> = OnceLock::new();

fn cache() -> &'static Mutex<CacheState> {
    SNIPPET_CACHE.get_or_init(|| Mutex::new(CacheState::default()))
}

/// Snippet embeddings, loading from the store when the cache is cold or stale
pub fn cached_snippets(store: &Store) -> Result<Arc<Vec<CachedSnippet>>> {
    {
        let state = cache().lock().unwrap_or_else(|e| e.into_inner());
        if let Some(loaded_at) = state.loaded_at {
            if loaded_at.elapsed() < SNIPPET_CACHE_TTL {
                return Ok(Arc::clone(&state.entries));
            }
        }
    }

    let rows = store.read(|ops| ops.embedded_snippets())?;
    let entries: Vec<CachedSnippet> = rows
        .into_iter()
        .map(|(snippet, embedding)| CachedSnippet {
            snippet_id: snippet.id,
            parent_neuron_id: snippet.parent_neuron_id,
            name: snippet.name,
            kind: snippet.kind,
            start_line: snippet.start_line,
            end_line: snippet.end_line,
            embedding,
        })
        .collect();

    let entries = Arc::new(entries);
    let mut state = cache().lock().unwrap_or_else(|e| e.into_inner());
    state.loaded_at = Some(Instant::now());
    state.entries = Arc::clone(&entries);
    Ok(entries)
}

/// Drop the cached snippets; the next read reloads from the store
///
/// Called by every code path that writes the snippet table. Safe to call any
/// number of times, including on an already-cold cache.
pub fn invalidate() {
    let mut state = cache().lock().unwrap_or_else(|e| e.into_inner());
    state.loaded_at = None;
    state.entries = Arc::new(Vec::new());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalidate_is_idempotent() {
        invalidate();
        invalidate();
        let state = cache().lock().unwrap();
        assert!(state.loaded_at.is_none());
        assert!(state.entries.is_empty());
    }
}
