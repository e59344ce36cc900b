use std::sync::OnceLock;

use regex::Regex;
use rusqlite::{params, OptionalExtension};
use tracing::debug;

use super::Database;
use crate::error::{Error, Result};
use crate::models::{format_id, parse_sequence, EntityKind};
use crate::repository::ProjectStore;

const PROJECT_CODE_KEY: &str = "project_code";

fn project_code_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z0-9]+$").expect("valid project code pattern"))
}

impl ProjectStore for Database {
    fn project_metadata(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT value FROM project_metadata WHERE key = ?1",
                [key],
                |r| r.get(0),
            )
            .optional()?)
    }

    fn set_project_metadata(&self, key: &str, value: &str) -> Result<()> {
        if key.trim().is_empty() {
            return Err(Error::invalid("project metadata", "key is required"));
        }
        self.conn.execute(
            "INSERT OR REPLACE INTO project_metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        debug!(key, "set project metadata");
        Ok(())
    }

    fn project_code(&self) -> Result<String> {
        Ok(self
            .project_metadata(PROJECT_CODE_KEY)?
            .unwrap_or_else(|| self.options.default_project_code.clone()))
    }

    fn set_project_code(&self, code: &str) -> Result<()> {
        if !project_code_pattern().is_match(code) {
            return Err(Error::invalid(
                "project code",
                format!("'{code}' must be uppercase letters and digits"),
            ));
        }
        self.set_project_metadata(PROJECT_CODE_KEY, code)
    }

    fn next_sequence_number(&self, kind: EntityKind) -> Result<u32> {
        let Some(table) = kind.table() else {
            let next: u32 = self.conn.query_row(
                "SELECT COALESCE(MAX(number), 0) + 1 FROM iterations",
                [],
                |r| r.get(0),
            )?;
            return Ok(next);
        };

        let mut stmt = self.conn.prepare(&format!("SELECT id FROM {table}"))?;
        let ids = stmt.query_map([], |r| r.get::<_, String>(0))?;
        let mut max = 0u32;
        for id in ids {
            if let Some(n) = parse_sequence(&id?, kind) {
                max = max.max(n);
            }
        }
        max.checked_add(1)
            .ok_or_else(|| Error::Internal(format!("{} id sequence exhausted", kind.as_str())))
    }

    fn next_id(&self, kind: EntityKind) -> Result<String> {
        let code = self.project_code()?;
        let n = self.next_sequence_number(kind)?;
        Ok(format_id(&code, kind, n))
    }
}
