mod adr;
mod criterion;
mod ids;
mod iteration;
mod roadmap;
mod task;
mod track;

pub use adr::*;
pub use criterion::*;
pub use ids::*;
pub use iteration::*;
pub use roadmap::*;
pub use task::*;
pub use track::*;

use std::collections::HashSet;

use crate::error::{Error, Result};

/// Lower rank means higher priority.
pub const MIN_RANK: u16 = 1;
pub const MAX_RANK: u16 = 1000;
pub const DEFAULT_RANK: u16 = 500;

pub(crate) fn check_rank(entity: &'static str, id: &str, rank: u16) -> Result<()> {
    if !(MIN_RANK..=MAX_RANK).contains(&rank) {
        return Err(Error::invalid(
            entity,
            format!("{}rank {rank} outside [{MIN_RANK}, {MAX_RANK}]", subject(id)),
        ));
    }
    Ok(())
}

pub(crate) fn require(entity: &'static str, id: &str, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::invalid(
            entity,
            format!("{}{field} is required", subject(id)),
        ));
    }
    Ok(())
}

/// `"<id>: "` prefix for validation messages, empty while the id itself is missing.
fn subject(id: &str) -> String {
    if id.trim().is_empty() {
        String::new()
    } else {
        format!("{id}: ")
    }
}

/// First id that appears more than once.
pub(crate) fn first_duplicate(ids: &[String]) -> Option<&str> {
    let mut seen = HashSet::new();
    ids.iter().map(String::as_str).find(|id| !seen.insert(*id))
}
