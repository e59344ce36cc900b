use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::require;
use crate::error::{Error, Result};

/// Architecture decision record attached to a track.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Adr {
    pub id: String,
    pub track_id: String,
    pub title: String,
    pub status: AdrStatus,
    pub context: String,
    pub decision: String,
    pub consequences: String,
    pub alternatives: Option<String>,
    pub superseded_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AdrStatus {
    #[default]
    Proposed,
    Accepted,
    Deprecated,
    Superseded,
}

impl AdrStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proposed => "proposed",
            Self::Accepted => "accepted",
            Self::Deprecated => "deprecated",
            Self::Superseded => "superseded",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "proposed" => Some(Self::Proposed),
            "accepted" => Some(Self::Accepted),
            "deprecated" => Some(Self::Deprecated),
            "superseded" => Some(Self::Superseded),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        Self::from_str(s).ok_or_else(|| Error::invalid("adr", format!("unknown status '{s}'")))
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewAdr {
    pub id: String,
    pub track_id: String,
    pub title: String,
    pub status: AdrStatus,
    pub context: String,
    pub decision: String,
    pub consequences: String,
    pub alternatives: Option<String>,
    pub superseded_by: Option<String>,
}

impl Adr {
    pub fn new(input: NewAdr) -> Result<Self> {
        let now = Utc::now();
        let adr = Self {
            id: input.id,
            track_id: input.track_id,
            title: input.title,
            status: input.status,
            context: input.context,
            decision: input.decision,
            consequences: input.consequences,
            alternatives: input.alternatives.filter(|a| !a.trim().is_empty()),
            superseded_by: input.superseded_by.filter(|s| !s.trim().is_empty()),
            created_at: now,
            updated_at: now,
        };
        adr.validate()?;
        Ok(adr)
    }

    pub fn validate(&self) -> Result<()> {
        require("adr", &self.id, "id", &self.id)?;
        require("adr", &self.id, "track id", &self.track_id)?;
        require("adr", &self.id, "title", &self.title)?;
        require("adr", &self.id, "context", &self.context)?;
        require("adr", &self.id, "decision", &self.decision)?;
        require("adr", &self.id, "consequences", &self.consequences)?;
        if self.status == AdrStatus::Superseded && self.superseded_by.is_none() {
            return Err(Error::invalid(
                "adr",
                format!("{} is superseded but names no superseding ADR", self.id),
            ));
        }
        if self.superseded_by.as_deref() == Some(self.id.as_str()) {
            return Err(Error::invalid(
                "adr",
                format!("{} cannot supersede itself", self.id),
            ));
        }
        Ok(())
    }

    pub fn is_accepted(&self) -> bool {
        self.status == AdrStatus::Accepted
    }

    pub fn is_superseded(&self) -> bool {
        self.status == AdrStatus::Superseded
    }

    pub fn is_deprecated(&self) -> bool {
        self.status == AdrStatus::Deprecated
    }

    pub fn to_markdown(&self) -> String {
        let mut out = format!("# {}: {}\n\n", self.id, self.title);
        out.push_str(&format!("**Status**: {}\n", self.status.as_str()));
        if let Some(by) = &self.superseded_by {
            out.push_str(&format!("**Superseded by**: {}\n", by));
        }
        out.push_str(&format!("**Track**: {}\n", self.track_id));
        out.push_str(&format!(
            "**Date**: {}\n\n",
            self.created_at.format("%Y-%m-%d")
        ));
        out.push_str(&format!("## Context\n\n{}\n\n", self.context));
        out.push_str(&format!("## Decision\n\n{}\n\n", self.decision));
        out.push_str(&format!("## Consequences\n\n{}\n", self.consequences));
        if let Some(alternatives) = &self.alternatives {
            out.push_str(&format!("\n## Alternatives Considered\n\n{}\n", alternatives));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn input() -> NewAdr {
        NewAdr {
            id: "DW-adr-1".into(),
            track_id: "DW-track-1".into(),
            title: "Use SQLite".into(),
            context: "Need embedded storage".into(),
            decision: "Bundle SQLite".into(),
            consequences: "Single writer".into(),
            ..Default::default()
        }
    }

    #[test]
    fn superseded_requires_reference() {
        let err = Adr::new(NewAdr {
            status: AdrStatus::Superseded,
            ..input()
        })
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let adr = Adr::new(NewAdr {
            status: AdrStatus::Superseded,
            superseded_by: Some("DW-adr-2".into()),
            ..input()
        })
        .unwrap();
        assert!(adr.is_superseded());
    }

    #[test]
    fn required_sections() {
        for broken in [
            NewAdr { context: "".into(), ..input() },
            NewAdr { decision: "".into(), ..input() },
            NewAdr { consequences: " ".into(), ..input() },
            NewAdr { title: "".into(), ..input() },
        ] {
            assert!(Adr::new(broken).is_err());
        }
    }

    #[test]
    fn markdown_contains_sections() {
        let adr = Adr::new(NewAdr {
            alternatives: Some("Postgres".into()),
            ..input()
        })
        .unwrap();
        let md = adr.to_markdown();
        assert!(md.starts_with("# DW-adr-1: Use SQLite"));
        assert!(md.contains("**Status**: proposed"));
        assert!(md.contains("## Decision\n\nBundle SQLite"));
        assert!(md.contains("## Alternatives Considered\n\nPostgres"));
    }
}
