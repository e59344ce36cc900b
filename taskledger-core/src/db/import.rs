//! One-shot import of tasks kept as one JSON file each, from before the
//! SQLite store existed. Imported tasks land on a dedicated legacy track.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::Database;
use crate::error::{Error, Result};
use crate::models::{
    NewTrack, Roadmap, Task, TaskStatus, Track, TrackStatus, DEFAULT_RANK, MAX_RANK, MIN_RANK,
};
use crate::repository::{RoadmapStore, TaskStore, TrackStore};

pub const LEGACY_ROADMAP_ID: &str = "legacy-roadmap";
pub const LEGACY_TRACK_ID: &str = "track-legacy-tasks";
const LEGACY_TRACK_RANK: u16 = 300;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: Vec<String>,
    /// Files that could not be read, parsed or stored.
    pub skipped: Vec<PathBuf>,
}

/// Shape of a task file. The file's own track id is ignored.
#[derive(Debug, Deserialize)]
struct LegacyTask {
    id: String,
    title: String,
    #[serde(default)]
    description: String,
    status: String,
    #[serde(default)]
    rank: i64,
    #[serde(default)]
    branch: Option<String>,
    #[serde(default = "Utc::now")]
    created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    updated_at: DateTime<Utc>,
}

impl LegacyTask {
    fn into_task(self) -> Result<Task> {
        let rank = u16::try_from(self.rank)
            .ok()
            .filter(|r| (MIN_RANK..=MAX_RANK).contains(r))
            .unwrap_or(DEFAULT_RANK);
        let task = Task {
            status: TaskStatus::parse(&self.status)?,
            id: self.id,
            track_id: LEGACY_TRACK_ID.to_string(),
            title: self.title,
            description: self.description,
            rank,
            branch: self.branch.filter(|b| !b.trim().is_empty()),
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        task.validate()?;
        Ok(task)
    }
}

impl Database {
    /// Imports every `*.json` task file in `dir`.
    ///
    /// Does nothing when `dir` is missing, holds no task files, or the store
    /// already has tasks. A file that fails to parse or store is logged and
    /// reported as skipped; the rest are still imported.
    pub fn import_legacy_tasks(&self, dir: impl AsRef<Path>) -> Result<ImportReport> {
        let dir = dir.as_ref();
        let mut report = ImportReport::default();
        if !dir.is_dir() {
            return Ok(report);
        }
        let existing: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tasks", [], |r| r.get(0))?;
        if existing > 0 {
            info!(tasks = existing, "store already has tasks, skipping legacy import");
            return Ok(report);
        }

        let files = task_files(dir)?;
        if files.is_empty() {
            return Ok(report);
        }
        self.ensure_legacy_track()?;

        for path in files {
            match self.import_file(&path) {
                Ok(id) => report.imported.push(id),
                Err(err) => {
                    warn!(file = %path.display(), error = %err, "skipping legacy task file");
                    report.skipped.push(path);
                }
            }
        }
        info!(
            imported = report.imported.len(),
            skipped = report.skipped.len(),
            "legacy tasks imported"
        );
        Ok(report)
    }

    fn ensure_legacy_track(&self) -> Result<()> {
        if self.get_roadmap(LEGACY_ROADMAP_ID).is_err() {
            self.save_roadmap(&Roadmap::new(
                LEGACY_ROADMAP_ID,
                "Legacy Tasks from File Storage",
                "Migrate existing tasks to database",
            )?)?;
        }
        if self.get_track(LEGACY_TRACK_ID).is_err() {
            self.save_track(&Track::new(NewTrack {
                id: LEGACY_TRACK_ID.into(),
                roadmap_id: LEGACY_ROADMAP_ID.into(),
                title: "Legacy Tasks".into(),
                description: "Tasks migrated from file-based storage".into(),
                status: TrackStatus::NotStarted,
                rank: LEGACY_TRACK_RANK,
                dependencies: Vec::new(),
            })?)?;
        }
        Ok(())
    }

    fn import_file(&self, path: &Path) -> Result<String> {
        let raw = fs::read_to_string(path)
            .map_err(|e| Error::Internal(format!("reading {}: {e}", path.display())))?;
        let legacy: LegacyTask = serde_json::from_str(&raw)
            .map_err(|e| Error::Internal(format!("parsing {}: {e}", path.display())))?;
        let task = legacy.into_task()?;
        self.save_task(&task)?;
        Ok(task.id)
    }
}

/// `*.json` files directly under `dir`, in name order.
fn task_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .map_err(|e| Error::Internal(format!("reading {}: {e}", dir.display())))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| Error::Internal(format!("reading {}: {e}", dir.display())))?
            .path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskFilter;

    fn write(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn missing_directory_is_a_no_op() {
        let db = Database::open_memory().unwrap();
        let report = db.import_legacy_tasks("/nonexistent/taskledger/tasks").unwrap();
        assert_eq!(report, ImportReport::default());
        assert!(db.get_roadmap(LEGACY_ROADMAP_ID).is_err());
    }

    #[test]
    fn imports_onto_the_legacy_track_and_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "a.json",
            r#"{"id":"DW-task-1","track_id":"elsewhere","title":"Port parser","status":"in-progress",
                "rank":120,"branch":"feat/parser","created_at":"2024-05-01T10:00:00Z","updated_at":"2024-05-02T10:00:00Z"}"#,
        );
        write(
            dir.path(),
            "b.json",
            r#"{"id":"DW-task-2","title":"Old priority","status":"todo","rank":0,"branch":""}"#,
        );
        write(dir.path(), "c.json", r#"{"id":"DW-task-3","title":"Bad","status":"blocked"}"#);
        write(dir.path(), "d.json", "not json");
        write(dir.path(), "notes.txt", "ignored");

        let db = Database::open_memory().unwrap();
        let report = db.import_legacy_tasks(dir.path()).unwrap();
        assert_eq!(report.imported, vec!["DW-task-1", "DW-task-2"]);
        assert_eq!(report.skipped.len(), 2);

        let track = db.get_track(LEGACY_TRACK_ID).unwrap();
        assert_eq!(track.rank, 300);
        assert_eq!(track.roadmap_id, LEGACY_ROADMAP_ID);

        let first = db.get_task("DW-task-1").unwrap();
        assert_eq!(first.track_id, LEGACY_TRACK_ID);
        assert_eq!(first.status, TaskStatus::InProgress);
        assert_eq!(first.rank, 120);
        assert_eq!(first.branch.as_deref(), Some("feat/parser"));

        let second = db.get_task("DW-task-2").unwrap();
        assert_eq!(second.rank, DEFAULT_RANK);
        assert_eq!(second.branch, None);
    }

    #[test]
    fn stores_with_tasks_are_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.json", r#"{"id":"DW-task-1","title":"A","status":"todo"}"#);
        let db = Database::open_memory().unwrap();
        db.import_legacy_tasks(dir.path()).unwrap();

        write(dir.path(), "b.json", r#"{"id":"DW-task-2","title":"B","status":"todo"}"#);
        let again = db.import_legacy_tasks(dir.path()).unwrap();
        assert!(again.imported.is_empty());
        assert_eq!(db.list_tasks(&TaskFilter::default()).unwrap().len(), 1);
    }
}
