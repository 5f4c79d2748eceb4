//! Domain types shared by the scanner, the vector index and the assembler.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse document kind, derived once from the document's file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Portfolio,
    Project,
    Session,
    Theory,
    General,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Portfolio,
        Category::Project,
        Category::Session,
        Category::Theory,
        Category::General,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Portfolio => "portfolio",
            Category::Project => "project",
            Category::Session => "session",
            Category::Theory => "theory",
            Category::General => "general",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-chunk metadata persisted in the index sidecar.
///
/// - `source_path`: document path relative to the corpus root, `/` separated
/// - `sequence_index`: position of the chunk in the chunker output for its document
/// - `category`: label from [`crate::classify::classify`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMeta {
    pub source_path: String,
    pub sequence_index: usize,
    pub category: Category,
}

/// The atomic retrieval unit: a substring of one document plus its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub meta: ChunkMeta,
}

impl Chunk {
    pub fn category(&self) -> Category {
        self.meta.category
    }
}

/// A ranked hit produced by the retriever.
///
/// `distance` is the squared Euclidean distance between query and chunk
/// embeddings; `relevance` is `1 / (1 + distance)`, so an exact match scores
/// 1.0. `position` is the chunk's slot in the indexed corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk: Chunk,
    pub position: usize,
    pub distance: f32,
    pub relevance: f32,
}

pub fn relevance_from_distance(distance: f32) -> f32 {
    1.0 / (1.0 + distance)
}

/// A document the sweep matched but could not use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDocument {
    pub path: String,
    pub reason: String,
}
