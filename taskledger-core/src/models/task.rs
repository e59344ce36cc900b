use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{check_rank, require, DEFAULT_RANK};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: String,
    pub track_id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub rank: u16,
    pub branch: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in-progress",
            Self::Done => "done",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "todo" => Some(Self::Todo),
            "in-progress" => Some(Self::InProgress),
            "done" => Some(Self::Done),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        Self::from_str(s).ok_or_else(|| Error::invalid("task", format!("unknown status '{s}'")))
    }
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub id: String,
    pub track_id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub rank: u16,
    pub branch: Option<String>,
}

impl Default for NewTask {
    fn default() -> Self {
        Self {
            id: String::new(),
            track_id: String::new(),
            title: String::new(),
            description: String::new(),
            status: TaskStatus::Todo,
            rank: DEFAULT_RANK,
            branch: None,
        }
    }
}

/// Optional filters for listing tasks; combined with AND.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub track_id: Option<String>,
    pub statuses: Vec<TaskStatus>,
    pub ranks: Vec<u16>,
}

impl Task {
    pub fn new(input: NewTask) -> Result<Self> {
        let now = Utc::now();
        let task = Self {
            id: input.id,
            track_id: input.track_id,
            title: input.title,
            description: input.description,
            status: input.status,
            rank: input.rank,
            branch: input.branch.filter(|b| !b.trim().is_empty()),
            created_at: now,
            updated_at: now,
        };
        task.validate()?;
        Ok(task)
    }

    pub fn validate(&self) -> Result<()> {
        require("task", &self.id, "id", &self.id)?;
        require("task", &self.id, "track id", &self.track_id)?;
        require("task", &self.id, "title", &self.title)?;
        check_rank("task", &self.id, self.rank)
    }

    pub fn transition_to(&mut self, status: TaskStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    pub fn progress(&self) -> f64 {
        match self.status {
            TaskStatus::Done => 1.0,
            TaskStatus::InProgress => 0.5,
            TaskStatus::Todo => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn input() -> NewTask {
        NewTask {
            id: "DW-task-1".into(),
            track_id: "DW-track-1".into(),
            title: "Write parser".into(),
            ..Default::default()
        }
    }

    #[test]
    fn requires_title_and_track() {
        assert!(Task::new(input()).is_ok());
        let err = Task::new(NewTask { title: "".into(), ..input() }).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = Task::new(NewTask { track_id: "".into(), ..input() }).unwrap_err();
        assert!(err.to_string().contains("track id"));
    }

    #[test]
    fn blank_branch_is_dropped() {
        let task = Task::new(NewTask { branch: Some(" ".into()), ..input() }).unwrap();
        assert_eq!(task.branch, None);
    }

    #[test]
    fn transition_updates_status_and_progress() {
        let mut task = Task::new(input()).unwrap();
        task.transition_to(TaskStatus::InProgress);
        assert_eq!(task.progress(), 0.5);
        task.transition_to(TaskStatus::Done);
        assert_eq!(task.progress(), 1.0);
    }

    #[test]
    fn only_three_statuses_exist() {
        assert!(TaskStatus::parse("review").is_err());
        assert_eq!(TaskStatus::parse("in-progress").unwrap(), TaskStatus::InProgress);
    }
}
