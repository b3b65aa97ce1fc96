use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::github::GatewayError;
use crate::store::DbError;

/// The single error type returned across firewatch's public API.
///
/// Internal layers (store, gateway) return their own typed errors and
/// propagate them untouched; this type only adds context at the outermost
/// boundary, per the crate's error-handling design.
#[derive(Debug, Error)]
pub enum FirewatchError {
    #[error("config error: {0}")]
    Config(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("could not detect repository: {0}")]
    RepoDetect(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Surfaced as success-with-flag by callers (already-acked,
    /// already-resolved), never as a hard failure.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("graphql error: {0:?}")]
    GraphQl(Vec<String>),

    #[error("rate limited, resets at {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("store error: {0}")]
    Store(#[from] DbError),

    #[error("fatal error: {0}")]
    Fatal(String),
}

impl From<GatewayError> for FirewatchError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Auth(msg) => FirewatchError::Auth(msg),
            GatewayError::RateLimited { reset_at } => FirewatchError::RateLimited { reset_at },
            GatewayError::NotFound(msg) => FirewatchError::NotFound(msg),
            GatewayError::Conflict(msg) => FirewatchError::Conflict(msg),
            GatewayError::Transport(msg) => FirewatchError::Transport(msg),
            GatewayError::GraphQl(errors) => FirewatchError::GraphQl(errors),
        }
    }
}

pub type Result<T> = std::result::Result<T, FirewatchError>;
