use rusqlite::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("medical record {0} not found")]
    NotFound(i64),
    #[error("only the assigned doctor may amend this record's notes")]
    NotAssignedDoctor,
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("conflicting concurrent write: {0}")]
    Conflict(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type RecordResult<T> = std::result::Result<T, RecordError>;

impl RecordError {
    /// Classifies a failure raised on the write path.
    ///
    /// Unique-constraint violations and lock timeouts mean another writer got there first; those
    /// become [`RecordError::Conflict`] so the service can retry. Everything else stays a
    /// database error.
    pub(crate) fn from_write(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, _) = &err {
            let unique_violation = failure.code == ErrorCode::ConstraintViolation
                && matches!(
                    failure.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                        | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                );
            let lock_timeout = matches!(
                failure.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            );
            if unique_violation || lock_timeout {
                return Self::Conflict(err.to_string());
            }
        }
        Self::Database(err)
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
