use thiserror::Error;
use uuid::Uuid;

use warbler_db::DbError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Rejected input, raised before anything is staged.
    #[error("validation failed: {0}")]
    Validation(&'static str),

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: Uuid },

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl Error {
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::Db(e) if e.is_constraint_violation())
    }
}
