use thiserror::Error;

/// Persistence failures. Any of these rolls back the enclosing unit of work.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage backend error: {0}")]
    Backend(String),

    /// A sequence counter would overflow.
    #[error("{0} id space exhausted")]
    IdsExhausted(&'static str),
}

pub type StoreResult<T> = Result<T, StoreError>;
