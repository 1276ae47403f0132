use rusqlite::ErrorCode;
use rusqlite::ffi;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    /// A row the operation needs (or references) does not exist.
    #[error("referenced row not found")]
    NotFound,

    /// Unique or primary key constraint hit, e.g. a double follow.
    #[error("row already exists")]
    Duplicate,

    /// The caller does not own the row it tried to change.
    #[error("operation not permitted for this user")]
    Forbidden,

    #[error("request rejected: {0}")]
    Rejected(&'static str),

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Sqlite(rusqlite::Error),
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
                match e.extended_code {
                    ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Self::NotFound,
                    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                        Self::Duplicate
                    }
                    _ => Self::Sqlite(err),
                }
            }
            rusqlite::Error::QueryReturnedNoRows => Self::NotFound,
            _ => Self::Sqlite(err),
        }
    }
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
