use speculate2::speculate;

speculate! {
    use std::path::Path;

    use rusqlite::Connection;
    use taskledger_core::models::*;
    use taskledger_core::*;

    const TS: &str = "2024-03-01 09:30:00+00:00";

    /// A store as written before ranks, testing instructions and the
    /// version marker existed.
    fn write_legacy_store(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(&format!(
            r#"
CREATE TABLE roadmaps (id TEXT PRIMARY KEY, vision TEXT NOT NULL, success_criteria TEXT NOT NULL,
    created_at TEXT NOT NULL, updated_at TEXT NOT NULL);
CREATE TABLE tracks (id TEXT PRIMARY KEY, roadmap_id TEXT NOT NULL REFERENCES roadmaps(id) ON DELETE CASCADE,
    title TEXT NOT NULL, description TEXT, status TEXT NOT NULL, priority TEXT NOT NULL,
    created_at TEXT NOT NULL, updated_at TEXT NOT NULL);
CREATE TABLE track_dependencies (track_id TEXT NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
    depends_on_id TEXT NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
    PRIMARY KEY (track_id, depends_on_id));
CREATE TABLE tasks (id TEXT PRIMARY KEY, track_id TEXT NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
    title TEXT NOT NULL, description TEXT, status TEXT NOT NULL, priority TEXT NOT NULL, branch TEXT,
    created_at TEXT NOT NULL, updated_at TEXT NOT NULL);
CREATE TABLE iterations (number INTEGER PRIMARY KEY, name TEXT NOT NULL, goal TEXT, status TEXT NOT NULL,
    deliverable TEXT, started_at TEXT, completed_at TEXT, created_at TEXT NOT NULL, updated_at TEXT NOT NULL);
CREATE TABLE iteration_tasks (iteration_number INTEGER NOT NULL REFERENCES iterations(number) ON DELETE CASCADE,
    task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE, PRIMARY KEY (iteration_number, task_id));
CREATE TABLE acceptance_criteria (id TEXT PRIMARY KEY, task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
    description TEXT NOT NULL, verification_type TEXT NOT NULL, status TEXT NOT NULL, notes TEXT,
    created_at TEXT NOT NULL, updated_at TEXT NOT NULL);

INSERT INTO roadmaps VALUES ('roadmap-1', 'Ship v1', 'Everything done', '{TS}', '{TS}');
INSERT INTO tracks VALUES ('DW-track-1', 'roadmap-1', 'Storage', NULL, 'in-progress', 'high', '{TS}', '{TS}');
INSERT INTO tracks VALUES ('DW-track-2', 'roadmap-1', 'Sync', 'Replication', 'not-started', 'low', '{TS}', '{TS}');
INSERT INTO tracks VALUES ('track-legacy', 'roadmap-1', 'Old', NULL, 'complete', 'unknown', '{TS}', '{TS}');
INSERT INTO track_dependencies VALUES ('DW-track-2', 'DW-track-1');
INSERT INTO tasks VALUES ('DW-task-1', 'DW-track-1', 'Schema', NULL, 'done', 'critical', 'feat/schema', '{TS}', '{TS}');
INSERT INTO tasks VALUES ('DW-task-2', 'DW-track-2', 'Wire', NULL, 'todo', 'medium', NULL, '{TS}', '{TS}');
INSERT INTO iterations VALUES (1, 'First', NULL, 'current', NULL, '{TS}', NULL, '{TS}', '{TS}');
INSERT INTO iteration_tasks VALUES (1, 'DW-task-1');
INSERT INTO acceptance_criteria VALUES ('DW-ac-1', 'DW-task-1', 'Tables exist', 'automated', 'verified', 'ok', '{TS}', '{TS}');
INSERT INTO acceptance_criteria VALUES ('DW-ac-2', 'DW-task-1', 'Docs written', 'manual', 'not_started', NULL, '{TS}', '{TS}');
"#
        ))
        .unwrap();
    }

    fn criteria_rows(path: &Path) -> Vec<Vec<Option<String>>> {
        let conn = Connection::open(path).unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, task_id, description, verification_type, status, notes, created_at, updated_at \
                 FROM acceptance_criteria ORDER BY id",
            )
            .unwrap();
        stmt.query_map([], |row| {
            (0..8)
                .map(|i| row.get::<_, Option<String>>(i))
                .collect::<rusqlite::Result<Vec<_>>>()
        })
        .unwrap()
        .collect::<rusqlite::Result<Vec<_>>>()
        .unwrap()
    }

    describe "migrator" {
        it "creates an empty store and is idempotent" {
            let dir = tempfile::tempdir().unwrap();
            let db = Database::open(dir.path().join("store").join("roadmap.db")).unwrap();

            let first = db.migrate().unwrap();
            assert_eq!(first.from, None);
            assert_eq!(first.to, 6);

            let second = db.migrate().unwrap();
            assert_eq!(second.from, Some(6));
            assert!(second.applied.is_empty());
            assert!(db.migration_status().unwrap().is_current());
            assert_eq!(db.project_code().unwrap(), "DW");
        }

        it "upgrades a legacy store without losing data" {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("roadmap.db");
            write_legacy_store(&path);
            let before = criteria_rows(&path);

            let db = Database::open(&path).unwrap();
            let status = db.migration_status().unwrap();
            assert_eq!(status.version, Some(3));
            assert_eq!(status.pending, vec![4, 5, 6]);

            let report = db.migrate().unwrap();
            assert_eq!(report.from, Some(3));
            assert_eq!(report.applied, vec![4, 5, 6]);
            drop(db);

            assert_eq!(criteria_rows(&path), before);

            let db = Database::open(&path).unwrap();
            assert!(db.migration_status().unwrap().is_current());
            assert_eq!(db.get_track("DW-track-1").unwrap().rank, 200);
            assert_eq!(db.get_track("DW-track-2").unwrap().rank, 400);
            assert_eq!(db.get_track("track-legacy").unwrap().rank, 500);
            assert_eq!(db.get_track("DW-track-2").unwrap().dependencies, vec!["DW-track-1"]);
            assert_eq!(db.get_task("DW-task-1").unwrap().rank, 100);
            assert_eq!(db.get_task("DW-task-1").unwrap().branch.as_deref(), Some("feat/schema"));
            assert_eq!(db.get_task("DW-task-2").unwrap().rank, 300);

            let iteration = db.current_iteration().unwrap().unwrap();
            assert_eq!(iteration.rank, 500);
            assert_eq!(iteration.task_ids, vec!["DW-task-1"]);

            let ac = db.get_criterion("DW-ac-1").unwrap();
            assert_eq!(ac.testing_instructions, "");
            assert_eq!(ac.notes, "ok");
            assert_eq!(db.get_criterion("DW-ac-2").unwrap().notes, "");

            assert_eq!(db.next_id(EntityKind::Track).unwrap(), "DW-track-3");
        }

        it "keeps cascades working after the upgrade" {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("roadmap.db");
            write_legacy_store(&path);
            let db = Database::open(&path).unwrap();
            db.migrate().unwrap();

            db.delete_track("DW-track-1").unwrap();
            assert_eq!(db.get_task("DW-task-1").unwrap_err().kind(), ErrorKind::NotFound);
            assert!(db.get_criterion("DW-ac-1").is_err());
            assert!(db.get_track("DW-track-2").unwrap().dependencies.is_empty());
            assert!(db.iteration_tasks(1).unwrap().is_empty());
        }

        it "leaves a half-migrated store resumable" {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("roadmap.db");
            write_legacy_store(&path);
            {
                let conn = Connection::open(&path).unwrap();
                conn.execute(
                    "INSERT INTO iterations VALUES (2, 'Second', NULL, 'current', NULL, ?1, NULL, ?1, ?1)",
                    [TS],
                )
                .unwrap();
            }

            let db = Database::open(&path).unwrap();
            assert!(db.migrate().is_err());
            assert_eq!(db.migration_status().unwrap().pending, vec![6]);

            db.with_connection(|conn| {
                conn.execute("UPDATE iterations SET status = 'complete' WHERE number = 2", [])?;
                Ok(())
            })
            .unwrap();
            let report = db.migrate().unwrap();
            assert_eq!(report.applied, vec![6]);
            assert!(db.migration_status().unwrap().is_current());
        }
    }
}
