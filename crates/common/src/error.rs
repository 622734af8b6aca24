use thiserror::Error;

#[derive(Debug, Error)]
pub enum NewsroomError {
    #[error("configuration error: {0}")]
    Config(String),

    /// The store could not be reached or failed outside of a single statement.
    #[error("database error: {0}")]
    Database(String),

    /// A unique key already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The store rejected the statement (check, not-null, foreign key).
    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl NewsroomError {
    /// Whether the error concerns a single statement rather than the store as a whole.
    pub fn is_statement_level(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Constraint(_))
    }
}

pub type NewsroomResult<T> = Result<T, NewsroomError>;
