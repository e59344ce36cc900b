//! Error taxonomy shared by the entity model, the storage engine and the migrator.

use rusqlite::ErrorCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse category of an [`Error`], stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    Internal,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid {entity}: {reason}")]
    InvalidArgument { entity: &'static str, reason: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} {id} already exists")]
    AlreadyExists { entity: &'static str, id: String },

    #[error("internal error: {0}")]
    Internal(String),

    #[error("sqlite: {0}")]
    Store(#[from] rusqlite::Error),
}

impl Error {
    pub fn invalid(entity: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            entity,
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn already_exists(entity: &'static str, id: impl ToString) -> Self {
        Self::AlreadyExists {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::Internal(_) | Self::Store(_) => ErrorKind::Internal,
        }
    }

    /// True when SQLite refused the call because another connection holds the lock.
    ///
    /// The engine never retries these; callers decide whether to try again.
    pub fn is_busy(&self) -> bool {
        match self {
            Self::Store(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

/// True for primary-key / unique violations.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && matches!(
                    e.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                        | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                )
        }
        _ => false,
    }
}

pub(crate) fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_variants() {
        assert_eq!(Error::invalid("track", "bad").kind(), ErrorKind::InvalidArgument);
        assert_eq!(Error::not_found("task", "DW-task-1").kind(), ErrorKind::NotFound);
        assert_eq!(Error::already_exists("iteration", 3).kind(), ErrorKind::AlreadyExists);
        assert_eq!(Error::Internal("boom".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn messages_name_entity_and_id() {
        let err = Error::not_found("track", "DW-track-9");
        assert_eq!(err.to_string(), "track DW-track-9 not found");
    }

    #[test]
    fn busy_detection() {
        let busy = Error::Store(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        ));
        assert!(busy.is_busy());
        assert_eq!(busy.kind(), ErrorKind::Internal);
        assert!(!Error::Internal("x".into()).is_busy());
    }
}
