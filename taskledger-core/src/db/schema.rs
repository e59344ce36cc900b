/// Bumped whenever a step is added to the migrator.
pub const CURRENT_SCHEMA_VERSION: u32 = 6;

/// Shape of a current store. Every statement is idempotent; the migrator runs
/// this after any pending steps so that tables missing from older stores are
/// created alongside the reshaped ones.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS roadmaps (
    id TEXT PRIMARY KEY,
    vision TEXT NOT NULL,
    success_criteria TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tracks (
    id TEXT PRIMARY KEY,
    roadmap_id TEXT NOT NULL REFERENCES roadmaps(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT,
    status TEXT NOT NULL CHECK (status IN ('not-started', 'in-progress', 'complete', 'blocked', 'waiting')),
    rank INTEGER NOT NULL DEFAULT 500 CHECK (rank BETWEEN 1 AND 1000),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS track_dependencies (
    track_id TEXT NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
    depends_on_id TEXT NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
    PRIMARY KEY (track_id, depends_on_id)
);

CREATE TABLE IF NOT EXISTS tasks (
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

CREATE TABLE IF NOT EXISTS iterations (
    number INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    goal TEXT,
    status TEXT NOT NULL CHECK (status IN ('planned', 'current', 'complete')),
    rank INTEGER NOT NULL DEFAULT 500,
    deliverable TEXT,
    started_at TEXT,
    completed_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS iteration_tasks (
    iteration_number INTEGER NOT NULL REFERENCES iterations(number) ON DELETE CASCADE,
    task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
    PRIMARY KEY (iteration_number, task_id)
);

CREATE TABLE IF NOT EXISTS acceptance_criteria (
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

CREATE TABLE IF NOT EXISTS adrs (
    id TEXT PRIMARY KEY,
    track_id TEXT NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('proposed', 'accepted', 'deprecated', 'superseded')),
    context TEXT NOT NULL,
    decision TEXT NOT NULL,
    consequences TEXT NOT NULL,
    alternatives TEXT,
    superseded_by TEXT REFERENCES adrs(id) ON DELETE SET NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS project_metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tracks_roadmap_id ON tracks(roadmap_id);
CREATE INDEX IF NOT EXISTS idx_tracks_status ON tracks(status);
CREATE INDEX IF NOT EXISTS idx_track_deps_depends_on ON track_dependencies(depends_on_id);
CREATE INDEX IF NOT EXISTS idx_tasks_track_id ON tasks(track_id);
CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
CREATE INDEX IF NOT EXISTS idx_iterations_status ON iterations(status);
CREATE INDEX IF NOT EXISTS idx_iteration_tasks_iteration ON iteration_tasks(iteration_number);
CREATE INDEX IF NOT EXISTS idx_iteration_tasks_task ON iteration_tasks(task_id);
CREATE INDEX IF NOT EXISTS idx_ac_task_id ON acceptance_criteria(task_id);
CREATE INDEX IF NOT EXISTS idx_ac_status ON acceptance_criteria(status);
CREATE INDEX IF NOT EXISTS idx_adrs_track_id ON adrs(track_id);
CREATE INDEX IF NOT EXISTS idx_adrs_status ON adrs(status);

-- Only one current iteration at a time
CREATE UNIQUE INDEX IF NOT EXISTS idx_one_current_iteration
    ON iterations(status) WHERE status = 'current';
"#;
