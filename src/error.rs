/// Domain error taxonomy shared by every core component
///
/// Validation and not-found outcomes are recovered by callers into explicit
/// negative results; I/O and race errors surface as retryable server errors.

use thiserror::Error;

/// Errors produced by the audited update, attachment and deletion paths
#[derive(Debug, Error)]
pub enum Error {
    /// Entity, comment or attachment id does not resolve
    #[error("{0} not found")]
    NotFound(String),

    /// Request payload rejected before touching storage
    #[error("validation rejected: {0}")]
    Validation(String),

    /// Physical file write or delete failed
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The write lock could not be taken for the snapshot the diff was computed from
    #[error("concurrent write detected while applying update")]
    ConflictRace,

    /// Any other relational store failure
    #[error("database error: {0}")]
    Database(sqlx::Error),

    /// Startup configuration is malformed or incomplete
    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    /// Whether the caller may retry the whole unit of work
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConflictRace)
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        if is_lock_contention(&err) {
            Self::ConflictRace
        } else {
            Self::Database(err)
        }
    }
}

/// SQLITE_BUSY (5) and SQLITE_LOCKED (6), including their extended codes
fn is_lock_contention(err: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db_err) = err else {
        return false;
    };
    db_err
        .code()
        .and_then(|code| code.parse::<i32>().ok())
        .map(|code| matches!(code & 0xff, 5 | 6))
        .unwrap_or(false)
}
