use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::require;
use crate::error::{Error, Result};

/// Acceptance criterion attached to a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Criterion {
    pub id: String,
    pub task_id: String,
    pub description: String,
    pub verification: VerificationType,
    pub status: CriterionStatus,
    pub notes: String,
    pub testing_instructions: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CriterionStatus {
    #[default]
    NotStarted,
    PendingHumanReview,
    Verified,
    AutomaticallyVerified,
    Failed,
}

impl CriterionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::PendingHumanReview => "pending_human_review",
            Self::Verified => "verified",
            Self::AutomaticallyVerified => "automatically_verified",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "not_started" => Some(Self::NotStarted),
            "pending_human_review" => Some(Self::PendingHumanReview),
            "verified" => Some(Self::Verified),
            "automatically_verified" => Some(Self::AutomaticallyVerified),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        Self::from_str(s).ok_or_else(|| {
            Error::invalid("acceptance criterion", format!("unknown status '{s}'"))
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum VerificationType {
    #[default]
    Manual,
    Automated,
}

impl VerificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Automated => "automated",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(Self::Manual),
            "automated" => Some(Self::Automated),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        Self::from_str(s).ok_or_else(|| {
            Error::invalid(
                "acceptance criterion",
                format!("unknown verification type '{s}'"),
            )
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewCriterion {
    pub id: String,
    pub task_id: String,
    pub description: String,
    pub verification: VerificationType,
    pub testing_instructions: String,
}

impl Criterion {
    /// New criteria always start as `not_started` with empty notes.
    pub fn new(input: NewCriterion) -> Result<Self> {
        let now = Utc::now();
        let criterion = Self {
            id: input.id,
            task_id: input.task_id,
            description: input.description,
            verification: input.verification,
            status: CriterionStatus::NotStarted,
            notes: String::new(),
            testing_instructions: input.testing_instructions,
            created_at: now,
            updated_at: now,
        };
        criterion.validate()?;
        Ok(criterion)
    }

    pub fn validate(&self) -> Result<()> {
        require("acceptance criterion", &self.id, "id", &self.id)?;
        require("acceptance criterion", &self.id, "task id", &self.task_id)?;
        require("acceptance criterion", &self.id, "description", &self.description)
    }

    pub fn is_verified(&self) -> bool {
        matches!(
            self.status,
            CriterionStatus::Verified | CriterionStatus::AutomaticallyVerified
        )
    }

    pub fn is_failed(&self) -> bool {
        self.status == CriterionStatus::Failed
    }

    pub fn is_pending_review(&self) -> bool {
        self.status == CriterionStatus::PendingHumanReview
    }
}
