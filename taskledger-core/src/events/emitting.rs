use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{Event, EventSink, DEFAULT_EVENT_SOURCE};
use crate::db::Database;
use crate::error::Result;
use crate::models::*;
use crate::repository::*;

/// Repository wrapper that publishes one event per successful mutation.
///
/// Reads pass straight through. Publishing happens after the inner call has
/// returned `Ok`; a failed publish is logged and never changes the result.
pub struct EventEmittingRepository<R, S> {
    inner: R,
    sink: S,
    source: String,
}

impl<R, S: EventSink> EventEmittingRepository<R, S> {
    pub fn new(inner: R, sink: S) -> Self {
        Self::with_source(inner, sink, DEFAULT_EVENT_SOURCE)
    }

    pub fn with_source(inner: R, sink: S, source: impl Into<String>) -> Self {
        Self {
            inner,
            sink,
            source: source.into(),
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn emit<T: Serialize>(&self, entity: &str, action: &str, payload: &T) {
        match serde_json::to_value(payload) {
            Ok(value) => self.publish(entity, action, value),
            Err(err) => warn!(entity, action, error = %err, "failed to build event payload"),
        }
    }

    fn emit_status_change<T: Serialize>(
        &self,
        entity: &str,
        action: &str,
        payload: &T,
        previous_status: &str,
    ) {
        match serde_json::to_value(payload) {
            Ok(mut value) => {
                if let Value::Object(map) = &mut value {
                    map.insert("previous_status".into(), json!(previous_status));
                }
                self.publish(entity, action, value);
            }
            Err(err) => warn!(entity, action, error = %err, "failed to build event payload"),
        }
    }

    fn publish(&self, entity: &str, action: &str, payload: Value) {
        let event = Event::new(&self.source, entity, action, payload);
        match self.sink.publish(&event) {
            Ok(()) => debug!(event = %event.name, "published event"),
            Err(err) => warn!(event = %event.name, error = %err, "failed to publish event"),
        }
    }

    /// Payload for deletes: the snapshot taken before the call, or just the id.
    fn emit_deleted<T: Serialize>(&self, entity: &str, snapshot: Option<T>, id: Value) {
        match snapshot {
            Some(snapshot) => self.emit(entity, "deleted", &snapshot),
            None => self.publish(entity, "deleted", json!({ "id": id })),
        }
    }
}

impl<S: EventSink> EventEmittingRepository<Database, S> {
    /// Uses the event source configured on the store.
    pub fn over_database(db: Database, sink: S) -> Self {
        let source = db.options().event_source.clone();
        Self::with_source(db, sink, source)
    }
}

pub(crate) fn track_action(previous: Option<TrackStatus>, next: TrackStatus) -> &'static str {
    match previous {
        Some(prev) if prev != next => match next {
            TrackStatus::Complete => "completed",
            TrackStatus::Blocked => "blocked",
            _ => "status_changed",
        },
        _ => "updated",
    }
}

pub(crate) fn task_action(previous: Option<TaskStatus>, next: TaskStatus) -> &'static str {
    match previous {
        Some(prev) if prev != next => match next {
            TaskStatus::Done => "completed",
            _ => "status_changed",
        },
        _ => "updated",
    }
}

pub(crate) fn criterion_action(
    previous: Option<CriterionStatus>,
    next: CriterionStatus,
) -> &'static str {
    match previous {
        Some(prev) if prev != next => match next {
            CriterionStatus::Verified => "verified",
            CriterionStatus::AutomaticallyVerified => "automatically_verified",
            CriterionStatus::PendingHumanReview => "pending_review",
            CriterionStatus::Failed => "failed",
            CriterionStatus::NotStarted => "updated",
        },
        _ => "updated",
    }
}

impl<R: RoadmapStore, S: EventSink> RoadmapStore for EventEmittingRepository<R, S> {
    fn save_roadmap(&self, roadmap: &Roadmap) -> Result<()> {
        self.inner.save_roadmap(roadmap)?;
        self.emit("roadmap", "created", roadmap);
        Ok(())
    }

    fn get_roadmap(&self, id: &str) -> Result<Roadmap> {
        self.inner.get_roadmap(id)
    }

    fn active_roadmap(&self) -> Result<Option<Roadmap>> {
        self.inner.active_roadmap()
    }

    fn list_roadmaps(&self) -> Result<Vec<Roadmap>> {
        self.inner.list_roadmaps()
    }

    fn update_roadmap(&self, roadmap: &Roadmap) -> Result<()> {
        self.inner.update_roadmap(roadmap)?;
        self.emit("roadmap", "updated", roadmap);
        Ok(())
    }

    fn delete_roadmap(&self, id: &str) -> Result<()> {
        let snapshot = self.inner.get_roadmap(id).ok();
        self.inner.delete_roadmap(id)?;
        self.emit_deleted("roadmap", snapshot, json!(id));
        Ok(())
    }

    fn roadmap_with_tracks(&self, id: &str) -> Result<RoadmapWithTracks> {
        self.inner.roadmap_with_tracks(id)
    }
}

impl<R: TrackStore, S: EventSink> EventEmittingRepository<R, S> {
    fn emit_track_refresh(&self, track_id: &str) {
        match self.inner.get_track(track_id) {
            Ok(track) => self.emit("track", "updated", &track),
            Err(err) => warn!(track_id, error = %err, "could not reload track for event"),
        }
    }
}

impl<R: TrackStore, S: EventSink> TrackStore for EventEmittingRepository<R, S> {
    fn save_track(&self, track: &Track) -> Result<()> {
        self.inner.save_track(track)?;
        self.emit("track", "created", track);
        Ok(())
    }

    fn get_track(&self, id: &str) -> Result<Track> {
        self.inner.get_track(id)
    }

    fn list_tracks(&self, roadmap_id: &str, filter: &TrackFilter) -> Result<Vec<Track>> {
        self.inner.list_tracks(roadmap_id, filter)
    }

    fn update_track(&self, track: &Track) -> Result<()> {
        let previous = self.inner.get_track(&track.id).ok().map(|t| t.status);
        self.inner.update_track(track)?;
        match (track_action(previous, track.status), previous) {
            (action, Some(prev)) if action != "updated" => {
                self.emit_status_change("track", action, track, prev.as_str())
            }
            (action, _) => self.emit("track", action, track),
        }
        Ok(())
    }

    fn delete_track(&self, id: &str) -> Result<()> {
        let snapshot = self.inner.get_track(id).ok();
        self.inner.delete_track(id)?;
        self.emit_deleted("track", snapshot, json!(id));
        Ok(())
    }

    fn add_track_dependency(&self, track_id: &str, depends_on: &str) -> Result<()> {
        self.inner.add_track_dependency(track_id, depends_on)?;
        self.emit_track_refresh(track_id);
        Ok(())
    }

    fn remove_track_dependency(&self, track_id: &str, depends_on: &str) -> Result<()> {
        self.inner.remove_track_dependency(track_id, depends_on)?;
        self.emit_track_refresh(track_id);
        Ok(())
    }

    fn track_dependencies(&self, track_id: &str) -> Result<Vec<String>> {
        self.inner.track_dependencies(track_id)
    }

    fn validate_no_cycles(&self, track_id: &str) -> Result<()> {
        self.inner.validate_no_cycles(track_id)
    }

    fn track_with_tasks(&self, id: &str) -> Result<TrackWithTasks> {
        self.inner.track_with_tasks(id)
    }
}

impl<R: TaskStore, S: EventSink> TaskStore for EventEmittingRepository<R, S> {
    fn save_task(&self, task: &Task) -> Result<()> {
        self.inner.save_task(task)?;
        self.emit("task", "created", task);
        Ok(())
    }

    fn get_task(&self, id: &str) -> Result<Task> {
        self.inner.get_task(id)
    }

    fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        self.inner.list_tasks(filter)
    }

    fn update_task(&self, task: &Task) -> Result<()> {
        let previous = self.inner.get_task(&task.id).ok().map(|t| t.status);
        self.inner.update_task(task)?;
        match (task_action(previous, task.status), previous) {
            (action, Some(prev)) if action != "updated" => {
                self.emit_status_change("task", action, task, prev.as_str())
            }
            (action, _) => self.emit("task", action, task),
        }
        Ok(())
    }

    fn delete_task(&self, id: &str) -> Result<()> {
        let snapshot = self.inner.get_task(id).ok();
        self.inner.delete_task(id)?;
        self.emit_deleted("task", snapshot, json!(id));
        Ok(())
    }

    fn move_task_to_track(&self, task_id: &str, track_id: &str) -> Result<Task> {
        let task = self.inner.move_task_to_track(task_id, track_id)?;
        self.emit("task", "updated", &task);
        Ok(task)
    }

    fn backlog_tasks(&self) -> Result<Vec<Task>> {
        self.inner.backlog_tasks()
    }
}

impl<R: IterationStore, S: EventSink> EventEmittingRepository<R, S> {
    fn emit_iteration_refresh(&self, number: u32) {
        match self.inner.get_iteration(number) {
            Ok(iteration) => self.emit("iteration", "updated", &iteration),
            Err(err) => warn!(number, error = %err, "could not reload iteration for event"),
        }
    }
}

impl<R: IterationStore, S: EventSink> IterationStore for EventEmittingRepository<R, S> {
    fn save_iteration(&self, iteration: &Iteration) -> Result<()> {
        self.inner.save_iteration(iteration)?;
        self.emit("iteration", "created", iteration);
        Ok(())
    }

    fn get_iteration(&self, number: u32) -> Result<Iteration> {
        self.inner.get_iteration(number)
    }

    fn current_iteration(&self) -> Result<Option<Iteration>> {
        self.inner.current_iteration()
    }

    fn next_planned_iteration(&self) -> Result<Option<Iteration>> {
        self.inner.next_planned_iteration()
    }

    fn list_iterations(&self) -> Result<Vec<Iteration>> {
        self.inner.list_iterations()
    }

    fn update_iteration(&self, iteration: &Iteration) -> Result<()> {
        self.inner.update_iteration(iteration)?;
        self.emit("iteration", "updated", iteration);
        Ok(())
    }

    fn delete_iteration(&self, number: u32) -> Result<()> {
        let snapshot = self.inner.get_iteration(number).ok();
        self.inner.delete_iteration(number)?;
        self.emit_deleted("iteration", snapshot, json!(number));
        Ok(())
    }

    fn add_task_to_iteration(&self, number: u32, task_id: &str) -> Result<()> {
        self.inner.add_task_to_iteration(number, task_id)?;
        self.emit_iteration_refresh(number);
        Ok(())
    }

    fn remove_task_from_iteration(&self, number: u32, task_id: &str) -> Result<()> {
        self.inner.remove_task_from_iteration(number, task_id)?;
        self.emit_iteration_refresh(number);
        Ok(())
    }

    fn iteration_tasks(&self, number: u32) -> Result<Vec<Task>> {
        self.inner.iteration_tasks(number)
    }

    fn iterations_for_task(&self, task_id: &str) -> Result<Vec<Iteration>> {
        self.inner.iterations_for_task(task_id)
    }

    fn start_iteration(&self, number: u32) -> Result<Iteration> {
        let iteration = self.inner.start_iteration(number)?;
        self.emit_status_change(
            "iteration",
            "started",
            &iteration,
            IterationStatus::Planned.as_str(),
        );
        Ok(iteration)
    }

    fn complete_iteration(&self, number: u32) -> Result<Iteration> {
        let iteration = self.inner.complete_iteration(number)?;
        self.emit_status_change(
            "iteration",
            "completed",
            &iteration,
            IterationStatus::Current.as_str(),
        );
        Ok(iteration)
    }
}

impl<R: CriteriaStore, S: EventSink> CriteriaStore for EventEmittingRepository<R, S> {
    fn save_criterion(&self, criterion: &Criterion) -> Result<()> {
        self.inner.save_criterion(criterion)?;
        self.emit("ac", "created", criterion);
        Ok(())
    }

    fn get_criterion(&self, id: &str) -> Result<Criterion> {
        self.inner.get_criterion(id)
    }

    fn list_criteria(&self, task_id: &str) -> Result<Vec<Criterion>> {
        self.inner.list_criteria(task_id)
    }

    fn update_criterion(&self, criterion: &Criterion) -> Result<()> {
        let previous = self.inner.get_criterion(&criterion.id).ok().map(|c| c.status);
        self.inner.update_criterion(criterion)?;
        match (criterion_action(previous, criterion.status), previous) {
            (action, Some(prev)) if action != "updated" => {
                self.emit_status_change("ac", action, criterion, prev.as_str())
            }
            (action, _) => self.emit("ac", action, criterion),
        }
        Ok(())
    }

    fn delete_criterion(&self, id: &str) -> Result<()> {
        let snapshot = self.inner.get_criterion(id).ok();
        self.inner.delete_criterion(id)?;
        self.emit_deleted("ac", snapshot, json!(id));
        Ok(())
    }

    fn criteria_for_track(&self, track_id: &str) -> Result<Vec<Criterion>> {
        self.inner.criteria_for_track(track_id)
    }

    fn criteria_for_iteration(&self, number: u32) -> Result<Vec<Criterion>> {
        self.inner.criteria_for_iteration(number)
    }
}

impl<R: AdrStore, S: EventSink> AdrStore for EventEmittingRepository<R, S> {
    fn save_adr(&self, adr: &Adr) -> Result<()> {
        self.inner.save_adr(adr)?;
        self.emit("adr", "created", adr);
        Ok(())
    }

    fn get_adr(&self, id: &str) -> Result<Adr> {
        self.inner.get_adr(id)
    }

    fn list_adrs(&self, track_id: Option<&str>) -> Result<Vec<Adr>> {
        self.inner.list_adrs(track_id)
    }

    fn update_adr(&self, adr: &Adr) -> Result<()> {
        self.inner.update_adr(adr)?;
        self.emit("adr", "updated", adr);
        Ok(())
    }

    fn supersede_adr(&self, id: &str, superseded_by: &str) -> Result<Adr> {
        let adr = self.inner.supersede_adr(id, superseded_by)?;
        self.emit("adr", "superseded", &adr);
        Ok(adr)
    }

    fn deprecate_adr(&self, id: &str) -> Result<Adr> {
        let adr = self.inner.deprecate_adr(id)?;
        self.emit("adr", "deprecated", &adr);
        Ok(adr)
    }

    fn delete_adr(&self, id: &str) -> Result<()> {
        let snapshot = self.inner.get_adr(id).ok();
        self.inner.delete_adr(id)?;
        self.emit_deleted("adr", snapshot, json!(id));
        Ok(())
    }
}

impl<R: ProjectStore, S: EventSink> ProjectStore for EventEmittingRepository<R, S> {
    fn project_metadata(&self, key: &str) -> Result<Option<String>> {
        self.inner.project_metadata(key)
    }

    fn set_project_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.inner.set_project_metadata(key, value)?;
        self.publish("project", "metadata_updated", json!({ "key": key, "value": value }));
        Ok(())
    }

    fn project_code(&self) -> Result<String> {
        self.inner.project_code()
    }

    fn set_project_code(&self, code: &str) -> Result<()> {
        self.inner.set_project_code(code)?;
        self.publish(
            "project",
            "metadata_updated",
            json!({ "key": "project_code", "value": code }),
        );
        Ok(())
    }

    fn next_sequence_number(&self, kind: EntityKind) -> Result<u32> {
        self.inner.next_sequence_number(kind)
    }

    fn next_id(&self, kind: EntityKind) -> Result<String> {
        self.inner.next_id(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_actions() {
        use TrackStatus::*;
        assert_eq!(track_action(Some(InProgress), Complete), "completed");
        assert_eq!(track_action(Some(InProgress), Blocked), "blocked");
        assert_eq!(track_action(Some(NotStarted), InProgress), "status_changed");
        assert_eq!(track_action(Some(Blocked), Blocked), "updated");
        assert_eq!(track_action(None, Complete), "updated");
    }

    #[test]
    fn task_actions() {
        use TaskStatus::*;
        assert_eq!(task_action(Some(InProgress), Done), "completed");
        assert_eq!(task_action(Some(Todo), InProgress), "status_changed");
        assert_eq!(task_action(Some(Done), Done), "updated");
    }

    #[test]
    fn criterion_actions() {
        use CriterionStatus::*;
        assert_eq!(criterion_action(Some(NotStarted), Verified), "verified");
        assert_eq!(
            criterion_action(Some(NotStarted), AutomaticallyVerified),
            "automatically_verified"
        );
        assert_eq!(criterion_action(Some(NotStarted), PendingHumanReview), "pending_review");
        assert_eq!(criterion_action(Some(Verified), Failed), "failed");
        assert_eq!(criterion_action(Some(Failed), Failed), "updated");
    }
}
