//! Storage Module
//!
//! SQLite-based storage layer: schema and migrations, prepared hot-path
//! statements, atomic observation commits, and the prune/decay predicates.
//! Single-writer semantics with cross-process read-only consumers.

mod migrations;
mod sqlite;

pub use migrations::{add_column_if_missing, apply_migrations, Migration, MIGRATIONS};
pub use sqlite::{
    parse_ts, ts, ObservationWrite, Result, Store, StoreError, SynapseWrite, DB_PATH_ENV,
};

pub(crate) use sqlite::Ops;
