use rusqlite;
use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FibermapError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Config error: {0}")]
    ConfigError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),
    #[error("Not empty: {0}")]
    NotEmpty(String),
    #[error("Has dependents: {0}")]
    HasDependents(String),
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    #[error("Broken reference: {0}")]
    BrokenReference(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Stable error kind reported at the request boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    CapacityExceeded,
    NotEmpty,
    HasDependents,
    InvalidQuery,
    BrokenReference,
    Conflict,
    Validation,
    Unavailable,
    Internal,
}

impl ErrorKind {
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::CapacityExceeded => 409,
            ErrorKind::NotEmpty => 400,
            ErrorKind::HasDependents => 409,
            ErrorKind::InvalidQuery => 400,
            ErrorKind::BrokenReference => 422,
            ErrorKind::Conflict => 409,
            ErrorKind::Validation => 400,
            ErrorKind::Unavailable => 503,
            ErrorKind::Internal => 500,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::CapacityExceeded => "CapacityExceeded",
            ErrorKind::NotEmpty => "NotEmpty",
            ErrorKind::HasDependents => "HasDependents",
            ErrorKind::InvalidQuery => "InvalidQuery",
            ErrorKind::BrokenReference => "BrokenReference",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::Validation => "Validation",
            ErrorKind::Unavailable => "Unavailable",
            ErrorKind::Internal => "Internal",
        }
    }
}

impl FibermapError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FibermapError::RusqliteError(e) => sqlite_kind(e),
            FibermapError::IoError(_) | FibermapError::ConfigError(_) => ErrorKind::Internal,
            FibermapError::JsonError(_) | FibermapError::ValidationError(_) => {
                ErrorKind::Validation
            }
            FibermapError::NotFound(_) => ErrorKind::NotFound,
            FibermapError::CapacityExceeded(_) => ErrorKind::CapacityExceeded,
            FibermapError::NotEmpty(_) => ErrorKind::NotEmpty,
            FibermapError::HasDependents(_) => ErrorKind::HasDependents,
            FibermapError::InvalidQuery(_) => ErrorKind::InvalidQuery,
            FibermapError::BrokenReference(_) => ErrorKind::BrokenReference,
            FibermapError::Conflict(_) => ErrorKind::Conflict,
            FibermapError::Unavailable(_) => ErrorKind::Unavailable,
        }
    }

    /// Human-readable detail without the kind prefix.
    pub fn detail(&self) -> String {
        match self {
            FibermapError::ConfigError(s)
            | FibermapError::ValidationError(s)
            | FibermapError::NotFound(s)
            | FibermapError::CapacityExceeded(s)
            | FibermapError::NotEmpty(s)
            | FibermapError::HasDependents(s)
            | FibermapError::InvalidQuery(s)
            | FibermapError::BrokenReference(s)
            | FibermapError::Conflict(s)
            | FibermapError::Unavailable(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

fn sqlite_kind(err: &rusqlite::Error) -> ErrorKind {
    match err {
        rusqlite::Error::SqliteFailure(code, _) => match code.code {
            rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => {
                ErrorKind::Unavailable
            }
            rusqlite::ErrorCode::ConstraintViolation => ErrorKind::Conflict,
            rusqlite::ErrorCode::CannotOpen => ErrorKind::Unavailable,
            _ => ErrorKind::Internal,
        },
        _ => ErrorKind::Internal,
    }
}
