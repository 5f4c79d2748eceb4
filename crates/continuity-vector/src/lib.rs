//! Flat vector index, persisted index pair and retriever for the continuity
//! corpus.

pub mod flat;
pub mod search;
pub mod sidecar;
pub mod store;

pub use flat::{FlatL2Index, Neighbor};
pub use search::Retriever;
pub use store::IndexedCorpus;
