use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{require, Track};
use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Roadmap {
    pub id: String,
    pub vision: String,
    pub success_criteria: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Roadmap {
    pub fn new(
        id: impl Into<String>,
        vision: impl Into<String>,
        success_criteria: impl Into<String>,
    ) -> Result<Self> {
        let now = Utc::now();
        let roadmap = Self {
            id: id.into(),
            vision: vision.into(),
            success_criteria: success_criteria.into(),
            created_at: now,
            updated_at: now,
        };
        roadmap.validate()?;
        Ok(roadmap)
    }

    pub fn validate(&self) -> Result<()> {
        require("roadmap", &self.id, "id", &self.id)?;
        require("roadmap", &self.id, "vision", &self.vision)?;
        require("roadmap", &self.id, "success criteria", &self.success_criteria)
    }
}

/// A roadmap together with every track it owns, in rank order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadmapWithTracks {
    #[serde(flatten)]
    pub roadmap: Roadmap,
    pub tracks: Vec<Track>,
}
