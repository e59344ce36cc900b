//! Core library for taskledger.
//!
//! Persists a roadmap hierarchy (roadmap, tracks, tasks, iterations) with
//! acceptance criteria and architecture decision records in one SQLite file
//! per project. Provides entity validation, a transactional repository,
//! track dependency cycle checks, schema migration and an event-publishing
//! repository wrapper.
//!
//! # Usage
//!
//! ```no_run
//! use taskledger_core::models::*;
//! use taskledger_core::{Database, EntityKind, ProjectStore, RoadmapStore, TrackStore};
//!
//! let db = Database::open("roadmap.db")?;
//! db.migrate()?;
//!
//! let roadmap = Roadmap::new("roadmap-1", "Ship v1", "All tracks complete")?;
//! db.save_roadmap(&roadmap)?;
//!
//! let track = Track::new(NewTrack {
//!     id: db.next_id(EntityKind::Track)?,
//!     roadmap_id: roadmap.id.clone(),
//!     title: "Storage".into(),
//!     rank: 200,
//!     ..Default::default()
//! })?;
//! db.save_track(&track)?;
//! # Ok::<(), taskledger_core::Error>(())
//! ```

pub mod db;
pub mod error;
pub mod events;
pub mod graph;
pub mod models;
pub mod repository;

// Re-export commonly used types at crate root
pub use db::{Database, StoreOptions};
pub use error::{Error, ErrorKind, Result};
pub use models::EntityKind;
pub use repository::*;
