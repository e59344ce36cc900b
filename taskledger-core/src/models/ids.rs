use serde::{Deserialize, Serialize};

/// Identifier family. Every string id has the shape `{CODE}-{kind}-{n}`;
/// iterations are keyed by their number and only use the family for counting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Track,
    Task,
    Iter,
    Ac,
    Adr,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::Task => "task",
            Self::Iter => "iter",
            Self::Ac => "ac",
            Self::Adr => "adr",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "track" => Some(Self::Track),
            "task" => Some(Self::Task),
            "iter" => Some(Self::Iter),
            "ac" => Some(Self::Ac),
            "adr" => Some(Self::Adr),
            _ => None,
        }
    }

    /// Table holding string ids of this family. `None` for iterations.
    pub(crate) fn table(&self) -> Option<&'static str> {
        match self {
            Self::Track => Some("tracks"),
            Self::Task => Some("tasks"),
            Self::Ac => Some("acceptance_criteria"),
            Self::Adr => Some("adrs"),
            Self::Iter => None,
        }
    }
}

pub fn format_id(code: &str, kind: EntityKind, n: u32) -> String {
    format!("{}-{}-{}", code, kind.as_str(), n)
}

/// Trailing sequence number of an id such as `DW-task-12`.
///
/// Ids with fewer than three dash-separated parts, a family segment other
/// than `kind`, or a non-numeric suffix yield `None` and are skipped by id
/// allocation.
pub fn parse_sequence(id: &str, kind: EntityKind) -> Option<u32> {
    let parts: Vec<&str> = id.split('-').collect();
    if parts.len() < 3 || parts[parts.len() - 2] != kind.as_str() {
        return None;
    }
    let suffix = parts.last()?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}
