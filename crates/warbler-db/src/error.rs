use rusqlite::ErrorCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    /// A write broke a UNIQUE, NOT NULL, CHECK or foreign-key constraint.
    /// The unit of work has been rolled back by the store.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// A previous commit on this session failed; call `rollback` first.
    #[error("session has a failed commit pending rollback")]
    PendingRollback,

    #[error("database lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("corrupt row in {table}: {detail}")]
    Corrupt { table: &'static str, detail: String },

    #[error(transparent)]
    Sqlite(rusqlite::Error),
}

impl DbError {
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::Constraint(_))
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => {
                let detail = match &err {
                    rusqlite::Error::SqliteFailure(_, Some(msg)) => msg.clone(),
                    other => other.to_string(),
                };
                Self::Constraint(detail)
            }
            _ => Self::Sqlite(err),
        }
    }
}
