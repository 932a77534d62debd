//! Database Migrations
//!
//! Schema migration definitions for the storage layer. Migrations are
//! additive and idempotent: every CREATE uses IF NOT EXISTS and column
//! additions go through `add_column_if_missing`, so re-applying any version
//! is a silent no-op.

/// Migration definitions
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema: neurons, synapses, access log, sessions",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "Code snippets with cascade delete on parent file neuron",
        up: MIGRATION_V2_UP,
    },
    Migration {
        version: 3,
        description: "Project tagging and anti-recall streaks",
        up: MIGRATION_V3_UP,
    },
];

/// A database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Version number
    pub version: u32,
    /// Description
    pub description: &'static str,
    /// SQL to apply
    pub up: &'static str,
}

/// V1: Initial schema
const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS neurons (
    id TEXT PRIMARY KEY,
    neuron_type TEXT NOT NULL DEFAULT 'file',
    path TEXT NOT NULL,
    activation REAL NOT NULL DEFAULT 0.0,
    myelination REAL NOT NULL DEFAULT 0.0,
    access_count INTEGER NOT NULL DEFAULT 1,
    last_accessed TEXT NOT NULL,
    created_at TEXT NOT NULL,
    contexts TEXT NOT NULL DEFAULT '[]',
    embedding BLOB
);

CREATE INDEX IF NOT EXISTS idx_neurons_type ON neurons(neuron_type);
CREATE INDEX IF NOT EXISTS idx_neurons_myelination ON neurons(myelination DESC);

CREATE TABLE IF NOT EXISTS synapses (
    source_id TEXT NOT NULL REFERENCES neurons(id) ON DELETE CASCADE,
    target_id TEXT NOT NULL REFERENCES neurons(id) ON DELETE CASCADE,
    weight REAL NOT NULL DEFAULT 0.0,
    co_access_count INTEGER NOT NULL DEFAULT 1,
    last_fired TEXT NOT NULL,
    created_at TEXT NOT NULL,
    tagged_at TEXT,
    PRIMARY KEY (source_id, target_id)
);

CREATE INDEX IF NOT EXISTS idx_synapses_weight ON synapses(weight DESC);
CREATE INDEX IF NOT EXISTS idx_synapses_target ON synapses(target_id);

CREATE TABLE IF NOT EXISTS access_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    neuron_id TEXT NOT NULL REFERENCES neurons(id) ON DELETE CASCADE,
    session_id TEXT NOT NULL,
    query TEXT,
    timestamp TEXT NOT NULL,
    token_cost INTEGER NOT NULL DEFAULT 0,
    access_order INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_access_session_time ON access_log(session_id, timestamp);
CREATE INDEX IF NOT EXISTS idx_access_neuron ON access_log(neuron_id);

CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    started_at TEXT NOT NULL,
    ended_at TEXT,
    total_accesses INTEGER NOT NULL DEFAULT 0,
    tokens_used INTEGER NOT NULL DEFAULT 0,
    tokens_saved INTEGER NOT NULL DEFAULT 0,
    hit_rate REAL NOT NULL DEFAULT 0.0,
    intent TEXT
);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);

INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, datetime('now'));
"#;

/// V2: Snippets - populated by an external extractor, embeddings feed recall
const MIGRATION_V2_UP: &str = r#"
CREATE TABLE IF NOT EXISTS snippets (
    id TEXT PRIMARY KEY,
    parent_neuron_id TEXT NOT NULL REFERENCES neurons(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    kind TEXT NOT NULL DEFAULT 'function',
    start_line INTEGER NOT NULL DEFAULT 0,
    end_line INTEGER NOT NULL DEFAULT 0,
    source TEXT NOT NULL DEFAULT '',
    embedding BLOB,
    content_hash TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_snippets_parent ON snippets(parent_neuron_id);
CREATE INDEX IF NOT EXISTS idx_snippets_name ON snippets(name);

UPDATE schema_version SET version = 2, applied_at = datetime('now');
"#;

/// V3: Project tagging + anti-recall streaks
///
/// The ALTER TABLE statements run through `add_column_if_missing` in
/// `apply_migrations`; only the index and version bump live here.
const MIGRATION_V3_UP: &str = r#"
CREATE INDEX IF NOT EXISTS idx_neurons_project ON neurons(project);

UPDATE schema_version SET version = 3, applied_at = datetime('now');
"#;

/// Get current schema version from database
pub fn get_current_version(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .or(Ok(0))
}

/// Add a column unless it already exists
///
/// SQLite has no ADD COLUMN IF NOT EXISTS; a duplicate-column error from a
/// re-applied migration is swallowed here, which is what keeps migrations
/// idempotent.
pub fn add_column_if_missing(
    conn: &rusqlite::Connection,
    table: &str,
    column: &str,
    declaration: &str,
) -> rusqlite::Result<()> {
    let sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, declaration);
    match conn.execute_batch(&sql) {
        Ok(()) => Ok(()),
        Err(e) if e.to_string().contains("duplicate column name") => Ok(()),
        Err(e) => Err(e),
    }
}

/// Apply pending migrations
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    let current_version = get_current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                "Applying migration v{}: {}",
                migration.version,
                migration.description
            );

            // V3 column additions can't be expressed as plain batch SQL
            if migration.version == 3 {
                add_column_if_missing(conn, "neurons", "project", "TEXT")?;
                add_column_if_missing(
                    conn,
                    "neurons",
                    "ignore_streak",
                    "INTEGER NOT NULL DEFAULT 0",
                )?;
            }

            conn.execute_batch(migration.up)?;
            applied += 1;
        }
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_migrations_apply_cleanly() {
        let conn = Connection::open_in_memory().unwrap();
        let applied = apply_migrations(&conn).unwrap();
        assert_eq!(applied as usize, MIGRATIONS.len());
        assert_eq!(get_current_version(&conn).unwrap(), 3);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        apply_migrations(&conn).unwrap();
        // Second run applies nothing and errors on nothing
        assert_eq!(apply_migrations(&conn).unwrap(), 0);

        // Re-adding an existing column is a silent no-op
        add_column_if_missing(&conn, "neurons", "project", "TEXT").unwrap();
    }

    #[test]
    fn test_versions_are_ordered() {
        let mut last = 0;
        for m in MIGRATIONS {
            assert!(m.version > last);
            last = m.version;
        }
    }
}
