use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{check_rank, first_duplicate, require, Task, DEFAULT_RANK};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Track {
    pub id: String,
    pub roadmap_id: String,
    pub title: String,
    pub description: String,
    pub status: TrackStatus,
    pub rank: u16,
    /// Ids of the tracks this one depends on, kept sorted and unique.
    pub dependencies: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TrackStatus {
    #[default]
    NotStarted,
    InProgress,
    Complete,
    Blocked,
    Waiting,
}

impl TrackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not-started",
            Self::InProgress => "in-progress",
            Self::Complete => "complete",
            Self::Blocked => "blocked",
            Self::Waiting => "waiting",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "not-started" => Some(Self::NotStarted),
            "in-progress" => Some(Self::InProgress),
            "complete" => Some(Self::Complete),
            "blocked" => Some(Self::Blocked),
            "waiting" => Some(Self::Waiting),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        Self::from_str(s).ok_or_else(|| Error::invalid("track", format!("unknown status '{s}'")))
    }
}

#[derive(Debug, Clone)]
pub struct NewTrack {
    pub id: String,
    pub roadmap_id: String,
    pub title: String,
    pub description: String,
    pub status: TrackStatus,
    pub rank: u16,
    pub dependencies: Vec<String>,
}

impl Default for NewTrack {
    fn default() -> Self {
        Self {
            id: String::new(),
            roadmap_id: String::new(),
            title: String::new(),
            description: String::new(),
            status: TrackStatus::NotStarted,
            rank: DEFAULT_RANK,
            dependencies: Vec::new(),
        }
    }
}

/// Optional filters for listing tracks. Empty sets match everything.
#[derive(Debug, Clone, Default)]
pub struct TrackFilter {
    pub statuses: Vec<TrackStatus>,
    pub ranks: Vec<u16>,
}

fn structured_id() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z0-9]+-track-[0-9]+$").expect("valid track id pattern"))
}

fn legacy_id() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^track-[a-z0-9]+(-[a-z0-9]+)*$").expect("valid legacy track id pattern")
    })
}

pub(crate) fn self_dependency(id: &str) -> Error {
    Error::invalid("track", format!("{id} cannot depend on itself"))
}

pub fn is_valid_track_id(id: &str) -> bool {
    structured_id().is_match(id) || legacy_id().is_match(id)
}

impl Track {
    pub fn new(input: NewTrack) -> Result<Self> {
        let now = Utc::now();
        let mut track = Self {
            id: input.id,
            roadmap_id: input.roadmap_id,
            title: input.title,
            description: input.description,
            status: input.status,
            rank: input.rank,
            dependencies: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        for dep in input.dependencies {
            track.add_dependency(dep)?;
        }
        track.validate()?;
        Ok(track)
    }

    pub fn validate(&self) -> Result<()> {
        if !is_valid_track_id(&self.id) {
            return Err(Error::invalid(
                "track",
                format!(
                    "id '{}' must look like CODE-track-N or track-<slug>",
                    self.id
                ),
            ));
        }
        require("track", &self.id, "roadmap id", &self.roadmap_id)?;
        require("track", &self.id, "title", &self.title)?;
        check_rank("track", &self.id, self.rank)?;
        if self.dependencies.iter().any(|d| d == &self.id) {
            return Err(self_dependency(&self.id));
        }
        if let Some(dup) = first_duplicate(&self.dependencies) {
            return Err(Error::invalid(
                "track",
                format!("{} lists dependency {dup} more than once", self.id),
            ));
        }
        Ok(())
    }

    pub fn add_dependency(&mut self, dep: impl Into<String>) -> Result<()> {
        let dep = dep.into();
        if dep == self.id {
            return Err(self_dependency(&self.id));
        }
        if let Err(pos) = self.dependencies.binary_search(&dep) {
            self.dependencies.insert(pos, dep);
        }
        Ok(())
    }

    pub fn remove_dependency(&mut self, dep: &str) {
        self.dependencies.retain(|d| d != dep);
    }

    pub fn has_dependency(&self, dep: &str) -> bool {
        self.dependencies.iter().any(|d| d == dep)
    }

    pub fn is_blocked(&self) -> bool {
        self.status == TrackStatus::Blocked
    }

    pub fn progress(&self) -> f64 {
        match self.status {
            TrackStatus::Complete => 1.0,
            TrackStatus::InProgress => 0.5,
            _ => 0.0,
        }
    }
}

/// A track together with its tasks, in rank order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackWithTasks {
    #[serde(flatten)]
    pub track: Track,
    pub tasks: Vec<Task>,
}
