//! Document model, chunking, classification and corpus sweep for the
//! continuity retrieval engine.

pub mod chunker;
pub mod classify;
pub mod config;
pub mod corpus;
pub mod error;
pub mod traits;
pub mod types;

pub use corpus::{Corpus, DocumentScanner, ScanOutcome};
pub use error::{Error, Result};
pub use types::{Category, Chunk, ChunkMeta, RetrievalResult, SkippedDocument};
