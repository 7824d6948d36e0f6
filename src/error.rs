use rusqlite::ffi;

/// Failure of a domain operation.
///
/// The first four kinds are user-facing: the message is what the web layer
/// flashes back to the requester. `Db` and `Internal` are server faults.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    NotAuthorized(String),
    #[error("{0}")]
    Duplicate(String),
    #[error("{0}")]
    BadParams(String),
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn not_authorized(message: impl Into<String>) -> Self {
        Self::NotAuthorized(message.into())
    }

    pub fn duplicate(message: impl Into<String>) -> Self {
        Self::Duplicate(message.into())
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::BadParams(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::NotAuthorized(_) => "not_authorized",
            AppError::Duplicate(_) => "duplicate",
            AppError::BadParams(_) => "bad_params",
            AppError::Db(_) => "db_query_failed",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn is_user_facing(&self) -> bool {
        !matches!(self, AppError::Db(_) | AppError::Internal(_))
    }
}

/// Maps a UNIQUE violation from an insert to `Duplicate`, so that the loser
/// of two racing submissions sees the same message as a pre-checked one.
pub fn on_unique_violation(e: rusqlite::Error, message: &str) -> AppError {
    match &e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            AppError::duplicate(message)
        }
        _ => AppError::Db(e),
    }
}

pub type AppResult<T> = Result<T, AppError>;
