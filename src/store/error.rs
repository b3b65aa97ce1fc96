use thiserror::Error;

/// Store-layer error type, following the repository-pattern convention of
/// distinguishing expected outcomes (`NotFound`, `Conflict`) from unexpected
/// database errors (`Sqlx`) and data-corruption cases (`Internal`).
#[derive(Debug, Error)]
pub enum DbError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error("internal store error: {0}")]
    Internal(String),
}

pub type DbResult<T> = std::result::Result<T, DbError>;
