//! Storage contract, split per entity.
//!
//! [`Database`](crate::Database) implements every trait against SQLite and
//! [`EventEmittingRepository`](crate::events::EventEmittingRepository)
//! implements them again by delegation, so callers can hold either behind
//! [`Repository`].
//!
//! Save fails with `AlreadyExists` when the key is taken and with `NotFound`
//! when a parent row is missing. Get, update and delete fail with `NotFound`
//! when the row is absent. Updates replace the whole record, including its
//! edge set (track dependencies, iteration membership).

use crate::error::Result;
use crate::models::*;

pub trait RoadmapStore {
    fn save_roadmap(&self, roadmap: &Roadmap) -> Result<()>;
    fn get_roadmap(&self, id: &str) -> Result<Roadmap>;
    /// The most recently created roadmap, if any exists.
    fn active_roadmap(&self) -> Result<Option<Roadmap>>;
    fn list_roadmaps(&self) -> Result<Vec<Roadmap>>;
    fn update_roadmap(&self, roadmap: &Roadmap) -> Result<()>;
    /// Removes the roadmap and, through cascades, everything under it.
    fn delete_roadmap(&self, id: &str) -> Result<()>;
    fn roadmap_with_tracks(&self, id: &str) -> Result<RoadmapWithTracks>;
}

pub trait TrackStore {
    fn save_track(&self, track: &Track) -> Result<()>;
    fn get_track(&self, id: &str) -> Result<Track>;
    fn list_tracks(&self, roadmap_id: &str, filter: &TrackFilter) -> Result<Vec<Track>>;
    fn update_track(&self, track: &Track) -> Result<()>;
    fn delete_track(&self, id: &str) -> Result<()>;
    fn add_track_dependency(&self, track_id: &str, depends_on: &str) -> Result<()>;
    fn remove_track_dependency(&self, track_id: &str, depends_on: &str) -> Result<()>;
    fn track_dependencies(&self, track_id: &str) -> Result<Vec<String>>;
    fn validate_no_cycles(&self, track_id: &str) -> Result<()>;
    fn track_with_tasks(&self, id: &str) -> Result<TrackWithTasks>;
}

pub trait TaskStore {
    fn save_task(&self, task: &Task) -> Result<()>;
    fn get_task(&self, id: &str) -> Result<Task>;
    fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>>;
    fn update_task(&self, task: &Task) -> Result<()>;
    fn delete_task(&self, id: &str) -> Result<()>;
    fn move_task_to_track(&self, task_id: &str, track_id: &str) -> Result<Task>;
    /// Tasks that belong to no iteration and are not done.
    fn backlog_tasks(&self) -> Result<Vec<Task>>;
}

pub trait IterationStore {
    fn save_iteration(&self, iteration: &Iteration) -> Result<()>;
    fn get_iteration(&self, number: u32) -> Result<Iteration>;
    fn current_iteration(&self) -> Result<Option<Iteration>>;
    fn next_planned_iteration(&self) -> Result<Option<Iteration>>;
    fn list_iterations(&self) -> Result<Vec<Iteration>>;
    fn update_iteration(&self, iteration: &Iteration) -> Result<()>;
    fn delete_iteration(&self, number: u32) -> Result<()>;
    fn add_task_to_iteration(&self, number: u32, task_id: &str) -> Result<()>;
    fn remove_task_from_iteration(&self, number: u32, task_id: &str) -> Result<()>;
    fn iteration_tasks(&self, number: u32) -> Result<Vec<Task>>;
    fn iterations_for_task(&self, task_id: &str) -> Result<Vec<Iteration>>;
    fn start_iteration(&self, number: u32) -> Result<Iteration>;
    fn complete_iteration(&self, number: u32) -> Result<Iteration>;
}

pub trait CriteriaStore {
    fn save_criterion(&self, criterion: &Criterion) -> Result<()>;
    fn get_criterion(&self, id: &str) -> Result<Criterion>;
    fn list_criteria(&self, task_id: &str) -> Result<Vec<Criterion>>;
    fn update_criterion(&self, criterion: &Criterion) -> Result<()>;
    fn delete_criterion(&self, id: &str) -> Result<()>;
    fn criteria_for_track(&self, track_id: &str) -> Result<Vec<Criterion>>;
    fn criteria_for_iteration(&self, number: u32) -> Result<Vec<Criterion>>;
}

pub trait AdrStore {
    fn save_adr(&self, adr: &Adr) -> Result<()>;
    fn get_adr(&self, id: &str) -> Result<Adr>;
    fn list_adrs(&self, track_id: Option<&str>) -> Result<Vec<Adr>>;
    fn update_adr(&self, adr: &Adr) -> Result<()>;
    fn supersede_adr(&self, id: &str, superseded_by: &str) -> Result<Adr>;
    fn deprecate_adr(&self, id: &str) -> Result<Adr>;
    fn delete_adr(&self, id: &str) -> Result<()>;
}

pub trait ProjectStore {
    fn project_metadata(&self, key: &str) -> Result<Option<String>>;
    fn set_project_metadata(&self, key: &str, value: &str) -> Result<()>;
    fn project_code(&self) -> Result<String>;
    fn set_project_code(&self, code: &str) -> Result<()>;
    /// Next free number in an id family: max existing suffix plus one.
    fn next_sequence_number(&self, kind: EntityKind) -> Result<u32>;
    fn next_id(&self, kind: EntityKind) -> Result<String>;
}

pub trait Repository:
    RoadmapStore + TrackStore + TaskStore + IterationStore + CriteriaStore + AdrStore + ProjectStore
{
}

impl<T> Repository for T where
    T: RoadmapStore
        + TrackStore
        + TaskStore
        + IterationStore
        + CriteriaStore
        + AdrStore
        + ProjectStore
{
}
