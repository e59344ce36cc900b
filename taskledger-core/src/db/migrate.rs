//! Versioned schema migrator.
//!
//! The version lives in `project_metadata` under `schema_version`. Stores
//! written before the marker existed are recognised by their table shape.
//! Every step inspects the live shape before touching anything, so re-running
//! after a partial failure skips the steps that already committed.

use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde::Serialize;
use tracing::{debug, info};

use super::schema::{CURRENT_SCHEMA_VERSION, SCHEMA};
use super::{table_exists, table_has_column};
use crate::error::{Error, Result};

const VERSION_KEY: &str = "schema_version";
const STEPS: [u32; 3] = [4, 5, 6];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    /// `None` for an empty store.
    pub version: Option<u32>,
    pub target: u32,
    pub pending: Vec<u32>,
}

impl MigrationStatus {
    pub fn is_current(&self) -> bool {
        self.version == Some(self.target)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub from: Option<u32>,
    pub to: u32,
    pub applied: Vec<u32>,
}

pub struct Migrator<'a> {
    conn: &'a Connection,
}

impl<'a> Migrator<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Reports where the store stands without changing it.
    pub fn status(&self) -> Result<MigrationStatus> {
        let version = self.detect_version()?;
        check_supported(version)?;
        Ok(MigrationStatus {
            version,
            target: CURRENT_SCHEMA_VERSION,
            pending: pending_steps(version),
        })
    }

    /// Brings the store to [`CURRENT_SCHEMA_VERSION`]. A no-op on a current store.
    pub fn run(&self) -> Result<MigrationReport> {
        let status = self.status()?;
        if status.is_current() {
            debug!(version = CURRENT_SCHEMA_VERSION, "schema is current");
            return Ok(MigrationReport {
                from: status.version,
                to: CURRENT_SCHEMA_VERSION,
                applied: Vec::new(),
            });
        }

        // Shadow-table copies drop parent tables; with foreign keys on that
        // drop would cascade into the children. The pragma is a no-op inside
        // a transaction, so it is toggled around the whole run.
        self.conn.pragma_update(None, "foreign_keys", false)?;
        let result = self.apply(&status.pending);
        let restored = self.conn.pragma_update(None, "foreign_keys", true);
        result?;
        restored?;

        info!(
            from = ?status.version,
            to = CURRENT_SCHEMA_VERSION,
            "schema migrated"
        );
        Ok(MigrationReport {
            from: status.version,
            to: CURRENT_SCHEMA_VERSION,
            applied: status.pending,
        })
    }

    fn apply(&self, pending: &[u32]) -> Result<()> {
        for &step in pending {
            let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
            match step {
                4 => priority_to_rank(&tx)?,
                5 => add_testing_instructions(&tx)?,
                6 => single_current_iteration(&tx)?,
                other => return Err(Error::Internal(format!("no migration step {other}"))),
            }
            tx.commit()?;
            info!(step, "applied schema step");
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute_batch(SCHEMA)?;
        tx.execute(
            "INSERT OR REPLACE INTO project_metadata (key, value) VALUES (?1, ?2)",
            params![VERSION_KEY, CURRENT_SCHEMA_VERSION.to_string()],
        )?;
        let orphans = {
            let mut stmt = tx.prepare("PRAGMA foreign_key_check")?;
            let mut rows = stmt.query([])?;
            let mut count = 0usize;
            while rows.next()?.is_some() {
                count += 1;
            }
            count
        };
        if orphans > 0 {
            return Err(Error::Internal(format!(
                "{orphans} rows reference missing parents after migration"
            )));
        }
        tx.commit()?;
        Ok(())
    }

    fn detect_version(&self) -> Result<Option<u32>> {
        if table_exists(self.conn, "project_metadata")? {
            let stored: Option<String> = self
                .conn
                .query_row(
                    "SELECT value FROM project_metadata WHERE key = ?1",
                    [VERSION_KEY],
                    |r| r.get(0),
                )
                .optional()?;
            if let Some(raw) = stored {
                return raw
                    .parse()
                    .map(Some)
                    .map_err(|_| Error::Internal(format!("unreadable schema version '{raw}'")));
            }
        }

        if !table_exists(self.conn, "tracks")? {
            return Ok(None);
        }
        if table_has_column(self.conn, "tracks", "priority")? {
            return Ok(Some(3));
        }
        if table_exists(self.conn, "acceptance_criteria")?
            && !table_has_column(self.conn, "acceptance_criteria", "testing_instructions")?
        {
            return Ok(Some(4));
        }
        Ok(Some(5))
    }
}

fn check_supported(version: Option<u32>) -> Result<()> {
    match version {
        Some(v) if v > CURRENT_SCHEMA_VERSION => Err(Error::Internal(format!(
            "store schema version {v} is newer than supported version {CURRENT_SCHEMA_VERSION}"
        ))),
        _ => Ok(()),
    }
}

fn pending_steps(version: Option<u32>) -> Vec<u32> {
    match version {
        None => Vec::new(),
        Some(v) => STEPS.iter().copied().filter(|s| *s > v).collect(),
    }
}

const RANK_FROM_PRIORITY: &str = "CASE priority \
    WHEN 'critical' THEN 100 \
    WHEN 'high' THEN 200 \
    WHEN 'medium' THEN 300 \
    WHEN 'low' THEN 400 \
    ELSE 500 END";

/// 3 -> 4: tracks and tasks trade `priority` text for an integer rank;
/// iterations gain a rank column.
fn priority_to_rank(conn: &Connection) -> Result<()> {
    if table_has_column(conn, "tracks", "priority")? {
        conn.execute_batch(&format!(
            r#"
CREATE TABLE tracks_new (
    id TEXT PRIMARY KEY,
    roadmap_id TEXT NOT NULL REFERENCES roadmaps(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT,
    status TEXT NOT NULL CHECK (status IN ('not-started', 'in-progress', 'complete', 'blocked', 'waiting')),
    rank INTEGER NOT NULL DEFAULT 500 CHECK (rank BETWEEN 1 AND 1000),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
INSERT INTO tracks_new (id, roadmap_id, title, description, status, rank, created_at, updated_at)
    SELECT id, roadmap_id, title, description, status, {RANK_FROM_PRIORITY}, created_at, updated_at
    FROM tracks;
DROP TABLE tracks;
ALTER TABLE tracks_new RENAME TO tracks;
CREATE INDEX IF NOT EXISTS idx_tracks_roadmap_id ON tracks(roadmap_id);
CREATE INDEX IF NOT EXISTS idx_tracks_status ON tracks(status);
"#
        ))?;
        info!("tracks: priority replaced by rank");
    }

    if table_exists(conn, "tasks")? && table_has_column(conn, "tasks", "priority")? {
        conn.execute_batch(&format!(
            r#"
CREATE TABLE tasks_new (
    id TEXT PRIMARY KEY,
    track_id TEXT NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT,
    status TEXT NOT NULL CHECK (status IN ('todo', 'in-progress', 'done')),
    rank INTEGER NOT NULL DEFAULT 500 CHECK (rank BETWEEN 1 AND 1000),
    branch TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
INSERT INTO tasks_new (id, track_id, title, description, status, rank, branch, created_at, updated_at)
    SELECT id, track_id, title, description, status, {RANK_FROM_PRIORITY}, branch, created_at, updated_at
    FROM tasks;
DROP TABLE tasks;
ALTER TABLE tasks_new RENAME TO tasks;
CREATE INDEX IF NOT EXISTS idx_tasks_track_id ON tasks(track_id);
CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
"#
        ))?;
        info!("tasks: priority replaced by rank");
    }

    if table_exists(conn, "iterations")? && !table_has_column(conn, "iterations", "rank")? {
        conn.execute(
            "ALTER TABLE iterations ADD COLUMN rank INTEGER NOT NULL DEFAULT 500",
            [],
        )?;
        info!("iterations: rank column added");
    }
    Ok(())
}

/// 4 -> 5: acceptance criteria gain testing instructions, empty for existing rows.
fn add_testing_instructions(conn: &Connection) -> Result<()> {
    if !table_exists(conn, "acceptance_criteria")?
        || table_has_column(conn, "acceptance_criteria", "testing_instructions")?
    {
        return Ok(());
    }
    conn.execute_batch(
        r#"
CREATE TABLE acceptance_criteria_new (
    id TEXT PRIMARY KEY,
    task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
    description TEXT NOT NULL,
    verification_type TEXT NOT NULL CHECK (verification_type IN ('manual', 'automated')),
    status TEXT NOT NULL CHECK (status IN ('not_started', 'pending_human_review', 'verified', 'automatically_verified', 'failed')),
    notes TEXT,
    testing_instructions TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
INSERT INTO acceptance_criteria_new
    (id, task_id, description, verification_type, status, notes, testing_instructions, created_at, updated_at)
    SELECT id, task_id, description, verification_type, status, notes, '', created_at, updated_at
    FROM acceptance_criteria;
DROP TABLE acceptance_criteria;
ALTER TABLE acceptance_criteria_new RENAME TO acceptance_criteria;
CREATE INDEX IF NOT EXISTS idx_ac_task_id ON acceptance_criteria(task_id);
CREATE INDEX IF NOT EXISTS idx_ac_status ON acceptance_criteria(status);
"#,
    )?;
    info!("acceptance_criteria: testing_instructions added");
    Ok(())
}

/// 5 -> 6: at most one iteration may be current.
fn single_current_iteration(conn: &Connection) -> Result<()> {
    if !table_exists(conn, "iterations")? {
        return Ok(());
    }
    let current: i64 = conn.query_row(
        "SELECT COUNT(*) FROM iterations WHERE status = 'current'",
        [],
        |r| r.get(0),
    )?;
    if current > 1 {
        return Err(Error::Internal(format!(
            "{current} iterations are current; complete all but one before migrating"
        )));
    }
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_one_current_iteration \
         ON iterations(status) WHERE status = 'current'",
        [],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_steps_follow_version() {
        assert_eq!(pending_steps(None), Vec::<u32>::new());
        assert_eq!(pending_steps(Some(3)), vec![4, 5, 6]);
        assert_eq!(pending_steps(Some(5)), vec![6]);
        assert_eq!(pending_steps(Some(6)), Vec::<u32>::new());
    }

    #[test]
    fn fresh_store_is_created_at_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        let migrator = Migrator::new(&conn);
        assert_eq!(migrator.status().unwrap().version, None);

        let report = migrator.run().unwrap();
        assert_eq!(report.from, None);
        assert!(report.applied.is_empty());
        assert!(migrator.status().unwrap().is_current());
    }

    #[test]
    fn newer_store_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE project_metadata (key TEXT PRIMARY KEY, value TEXT NOT NULL);
             INSERT INTO project_metadata VALUES ('schema_version', '99');",
        )
        .unwrap();
        let err = Migrator::new(&conn).run().unwrap_err();
        assert!(err.to_string().contains("newer"));
    }

    #[test]
    fn two_current_iterations_fail_closed() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE roadmaps (id TEXT PRIMARY KEY, vision TEXT NOT NULL, success_criteria TEXT NOT NULL, created_at TEXT NOT NULL, updated_at TEXT NOT NULL);
             CREATE TABLE tracks (id TEXT PRIMARY KEY, roadmap_id TEXT NOT NULL, title TEXT NOT NULL, description TEXT, status TEXT NOT NULL, rank INTEGER NOT NULL, created_at TEXT NOT NULL, updated_at TEXT NOT NULL);
             CREATE TABLE iterations (number INTEGER PRIMARY KEY, name TEXT NOT NULL, goal TEXT, status TEXT NOT NULL, rank INTEGER NOT NULL DEFAULT 500, deliverable TEXT, started_at TEXT, completed_at TEXT, created_at TEXT NOT NULL, updated_at TEXT NOT NULL);
             INSERT INTO iterations (number, name, status, created_at, updated_at) VALUES (1, 'a', 'current', '2024-01-01 00:00:00+00:00', '2024-01-01 00:00:00+00:00');
             INSERT INTO iterations (number, name, status, created_at, updated_at) VALUES (2, 'b', 'current', '2024-01-01 00:00:00+00:00', '2024-01-01 00:00:00+00:00');",
        )
        .unwrap();
        let migrator = Migrator::new(&conn);
        assert_eq!(migrator.status().unwrap().version, Some(5));
        assert!(migrator.run().is_err());
        assert_eq!(migrator.status().unwrap().version, Some(5));
    }
}
