//! SQLite-backed storage engine.

mod adrs;
mod criteria;
pub mod import;
mod iterations;
mod metadata;
pub mod migrate;
mod roadmaps;
pub mod schema;
mod tasks;
mod tracks;

use std::path::Path;
use std::time::Duration;

use rusqlite::types::{Type, Value};
use rusqlite::{
    Connection, InterruptHandle, OptionalExtension, Params, Transaction, TransactionBehavior,
};
use tracing::debug;

use crate::error::{self, Error, Result};
pub use import::ImportReport;
pub use migrate::{MigrationReport, MigrationStatus, Migrator};
pub use schema::CURRENT_SCHEMA_VERSION;

/// Per-store settings. Foreign keys are always enforced and cannot be turned off.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// How long a call waits for another writer before failing as busy.
    pub busy_timeout: Duration,
    /// `source` segment of emitted event names.
    pub event_source: String,
    /// Project code used until one is stored in the project metadata.
    pub default_project_code: String,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
            event_source: "task-manager".to_string(),
            default_project_code: "DW".to_string(),
        }
    }
}

/// One project's store. Owns its connection exclusively.
pub struct Database {
    conn: Connection,
    options: StoreOptions,
}

impl Database {
    /// Opens (creating if needed) the store file. Call [`Database::migrate`]
    /// before using it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, StoreOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::Internal(format!("creating {}: {}", parent.display(), e))
                })?;
            }
        }
        debug!(path = %path.display(), "opening store");
        Self::from_connection(Connection::open(path)?, options)
    }

    /// In-memory store with the current schema already applied.
    pub fn open_memory() -> Result<Self> {
        let db = Self::from_connection(Connection::open_in_memory()?, StoreOptions::default())?;
        db.migrate()?;
        Ok(db)
    }

    fn from_connection(conn: Connection, options: StoreOptions) -> Result<Self> {
        conn.busy_timeout(options.busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(Self { conn, options })
    }

    pub fn migrate(&self) -> Result<MigrationReport> {
        Migrator::new(&self.conn).run()
    }

    pub fn migration_status(&self) -> Result<MigrationStatus> {
        Migrator::new(&self.conn).status()
    }

    /// Handle that can abort a running statement from another thread.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.conn.get_interrupt_handle()
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Transaction holding the writer lock from `BEGIN`. A competing writer
    /// is waited on for up to `busy_timeout` before the call fails as busy.
    pub(crate) fn write_tx(&self) -> Result<Transaction<'_>> {
        Ok(Transaction::new_unchecked(
            &self.conn,
            TransactionBehavior::Immediate,
        )?)
    }

    /// Runs `f` against the raw connection.
    pub fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        f(&self.conn)
    }
}

pub(crate) fn row_exists<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<bool> {
    Ok(conn.query_row(sql, params, |_| Ok(()))
        .optional()?
        .is_some())
}

pub(crate) fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    row_exists(
        conn,
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
    )
}

pub(crate) fn table_has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    row_exists(
        conn,
        "SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2",
        [table, column],
    )
}

/// Maps a stored wire string back onto its enum, failing the row on unknown values.
pub(crate) fn parse_column<T>(
    idx: usize,
    raw: String,
    parse: fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unexpected value '{raw}'").into(),
        )
    })
}

/// `column IN (?, ?, ...)` with one placeholder per value, or `None` when
/// the set is empty and the filter should match everything.
pub(crate) fn in_clause(column: &str, len: usize) -> Option<String> {
    if len == 0 {
        return None;
    }
    let marks = vec!["?"; len].join(", ");
    Some(format!("{column} IN ({marks})"))
}

pub(crate) fn rank_values(ranks: &[u16]) -> impl Iterator<Item = Value> + '_ {
    ranks.iter().map(|r| Value::Integer(i64::from(*r)))
}

/// Inserts a row whose parents were already checked, mapping a key collision
/// to `AlreadyExists` for `entity`/`id`.
pub(crate) fn insert_row<P: Params>(
    conn: &Connection,
    entity: &'static str,
    id: &str,
    sql: &str,
    params: P,
) -> Result<()> {
    match conn.execute(sql, params) {
        Ok(_) => Ok(()),
        Err(e) if error::is_unique_violation(&e) => Err(Error::already_exists(entity, id)),
        Err(e) if error::is_foreign_key_violation(&e) => Err(Error::NotFound {
            entity,
            id: format!("parent of {id}"),
        }),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_enforces_foreign_keys() {
        let db = Database::open_memory().unwrap();
        let on: bool = db
            .with_connection(|c| Ok(c.query_row("PRAGMA foreign_keys", [], |r| r.get(0))?))
            .unwrap();
        assert!(on);
    }

    #[test]
    fn in_clause_matches_everything_when_empty() {
        assert_eq!(in_clause("status", 0), None);
        assert_eq!(
            in_clause("status", 3).as_deref(),
            Some("status IN (?, ?, ?)")
        );
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("projects").join("demo").join("roadmap.db");
        let db = Database::open(&path).unwrap();
        db.migrate().unwrap();
        assert!(path.exists());
    }
}
