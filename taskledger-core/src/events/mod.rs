//! Domain events published after successful mutations.

mod emitting;

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use emitting::EventEmittingRepository;

pub const DEFAULT_EVENT_SOURCE: &str = "task-manager";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: Uuid,
    /// `{source}.{entity}.{action}`, e.g. `task-manager.track.completed`.
    pub name: String,
    pub source: String,
    pub entity: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl Event {
    pub fn new(source: &str, entity: &str, action: &str, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: format!("{source}.{entity}.{action}"),
            source: source.to_string(),
            entity: entity.to_string(),
            action: action.to_string(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("event channel closed")]
    Closed,
    #[error("event sink failed: {0}")]
    Sink(String),
}

/// Receiver of published events. Implementations must not block the caller
/// for long; the decorator publishes synchronously after each mutation.
pub trait EventSink {
    fn publish(&self, event: &Event) -> Result<(), PublishError>;
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn publish(&self, event: &Event) -> Result<(), PublishError> {
        (**self).publish(event)
    }
}

impl<S: EventSink + ?Sized> EventSink for &S {
    fn publish(&self, event: &Event) -> Result<(), PublishError> {
        (**self).publish(event)
    }
}

/// Forwards events into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<Event>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<Event>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn publish(&self, event: &Event) -> Result<(), PublishError> {
        self.tx.send(event.clone()).map_err(|_| PublishError::Closed)
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<Event>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.lock().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.lock().iter().map(|e| e.name.clone()).collect()
    }

    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Event>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EventSink for MemorySink {
    fn publish(&self, event: &Event) -> Result<(), PublishError> {
        self.lock().push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_joins_source_entity_action() {
        let event = Event::new("task-manager", "track", "created", serde_json::json!({}));
        assert_eq!(event.name, "task-manager.track.created");
        assert_eq!(event.entity, "track");
    }

    #[test]
    fn channel_sink_reports_closed_receiver() {
        let (sink, rx) = ChannelSink::new();
        let event = Event::new("s", "task", "created", serde_json::Value::Null);
        sink.publish(&event).unwrap();
        assert_eq!(rx.recv().unwrap().id, event.id);

        drop(rx);
        assert!(matches!(sink.publish(&event), Err(PublishError::Closed)));
    }

    #[test]
    fn memory_sink_take_drains() {
        let sink = MemorySink::new();
        sink.publish(&Event::new("s", "adr", "created", serde_json::Value::Null))
            .unwrap();
        assert_eq!(sink.names(), vec!["s.adr.created"]);
        assert_eq!(sink.take().len(), 1);
        assert!(sink.events().is_empty());
    }
}
