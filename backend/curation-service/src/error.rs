use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CurationError {
    /// Precomputed ranking source failed. Recovered by the fallback path.
    #[error("Upstream ranking source unavailable: {0}")]
    Upstream(String),

    #[error("Upstream ranking source timed out after {0:?}")]
    Timeout(Duration),

    #[error("Candidate repository error: {0}")]
    Repository(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CurationError>;
