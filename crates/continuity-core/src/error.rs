use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid chunking parameters: overlap {overlap} must be smaller than chunk size {chunk_size}")]
    InvalidChunking { chunk_size: usize, overlap: usize },

    #[error("Embedding dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Corrupt persisted index: {0}")]
    CorruptIndex(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sidecar serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    /// True for failures of persisted state that a full rebuild can repair.
    pub fn is_rebuildable(&self) -> bool {
        matches!(self, Error::CorruptIndex(_) | Error::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
