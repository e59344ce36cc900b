use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{check_rank, first_duplicate, require, DEFAULT_RANK};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Iteration {
    pub number: u32,
    pub name: String,
    pub goal: String,
    pub deliverable: String,
    pub status: IterationStatus,
    pub rank: u16,
    /// Member task ids, sorted and unique.
    pub task_ids: Vec<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum IterationStatus {
    #[default]
    Planned,
    Current,
    Complete,
}

impl IterationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::Current => "current",
            Self::Complete => "complete",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "planned" => Some(Self::Planned),
            "current" => Some(Self::Current),
            "complete" => Some(Self::Complete),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        Self::from_str(s)
            .ok_or_else(|| Error::invalid("iteration", format!("unknown status '{s}'")))
    }

    /// planned -> current -> complete, one step at a time and never backwards.
    pub fn can_transition_to(&self, next: IterationStatus) -> bool {
        next.ordinal() == self.ordinal() || next.ordinal() == self.ordinal() + 1
    }

    fn ordinal(&self) -> u8 {
        match self {
            Self::Planned => 0,
            Self::Current => 1,
            Self::Complete => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewIteration {
    pub number: u32,
    pub name: String,
    pub goal: String,
    pub deliverable: String,
    pub status: IterationStatus,
    pub rank: u16,
    pub task_ids: Vec<String>,
}

impl Default for NewIteration {
    fn default() -> Self {
        Self {
            number: 0,
            name: String::new(),
            goal: String::new(),
            deliverable: String::new(),
            status: IterationStatus::Planned,
            rank: DEFAULT_RANK,
            task_ids: Vec::new(),
        }
    }
}

impl Iteration {
    pub fn new(input: NewIteration) -> Result<Self> {
        let now = Utc::now();
        let mut iteration = Self {
            number: input.number,
            name: input.name,
            goal: input.goal,
            deliverable: input.deliverable,
            status: input.status,
            rank: input.rank,
            task_ids: Vec::new(),
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        for id in input.task_ids {
            iteration.add_task(id);
        }
        iteration.validate()?;
        Ok(iteration)
    }

    pub fn validate(&self) -> Result<()> {
        if self.number == 0 {
            return Err(Error::invalid(
                "iteration",
                format!("iteration {} must be numbered from 1", self.number),
            ));
        }
        let id = self.number.to_string();
        require("iteration", &id, "name", &self.name)?;
        check_rank("iteration", &id, self.rank)?;
        if let Some(dup) = first_duplicate(&self.task_ids) {
            return Err(Error::invalid(
                "iteration",
                format!("iteration {} lists task {dup} more than once", self.number),
            ));
        }
        Ok(())
    }

    pub fn add_task(&mut self, task_id: impl Into<String>) {
        let task_id = task_id.into();
        if let Err(pos) = self.task_ids.binary_search(&task_id) {
            self.task_ids.insert(pos, task_id);
        }
    }

    pub fn remove_task(&mut self, task_id: &str) {
        self.task_ids.retain(|t| t != task_id);
    }

    pub fn has_task(&self, task_id: &str) -> bool {
        self.task_ids.iter().any(|t| t == task_id)
    }

    pub fn task_count(&self) -> usize {
        self.task_ids.len()
    }

    pub fn is_current(&self) -> bool {
        self.status == IterationStatus::Current
    }
}
