use recipebook_types::validation::ValidationError;
use rusqlite::ffi;
use thiserror::Error;

pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Failure kinds surfaced by store operations.
///
/// Every variant except `Store` and `Internal` carries a message meant for
/// the client.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("database error: {0}")]
    Store(rusqlite::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "validation",
            CoreError::Conflict(_) => "conflict",
            CoreError::NotFound(_) => "not_found",
            CoreError::Forbidden(_) => "forbidden",
            CoreError::Store(_) | CoreError::Internal(_) => "internal",
        }
    }
}

/// Constraint violations are the last guard against check-then-insert races,
/// so they map to client-facing kinds instead of internal errors.
impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ref e, _) = err {
            match e.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    return CoreError::Conflict("Such a record already exists".into());
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                    return CoreError::NotFound("Referenced record does not exist".into());
                }
                _ => {}
            }
        }
        CoreError::Store(err)
    }
}
