use continuity_core::error::{Error, Result};
use continuity_core::traits::Embedder;
use continuity_core::types::{relevance_from_distance, RetrievalResult};

use crate::store::IndexedCorpus;

/// Query-time view over an indexed corpus and the embedder that built it.
///
/// The embedder must be the same model (and dimension) used at rebuild time;
/// a different dimension surfaces as [`Error::DimensionMismatch`].
pub struct Retriever<'a> {
    corpus: &'a IndexedCorpus,
    embedder: &'a dyn Embedder,
}

impl<'a> Retriever<'a> {
    pub fn new(corpus: &'a IndexedCorpus, embedder: &'a dyn Embedder) -> Self {
        Self { corpus, embedder }
    }

    pub fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievalResult>> {
        if self.corpus.is_empty() {
            return Ok(Vec::new());
        }
        let query_vector = self
            .embedder
            .embed_batch(&[query.to_string()])
            .map_err(|e| Error::Embedding(format!("{e:#}")))?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("embedder returned no vector for the query".into()))?;
        self.retrieve_by_vector(&query_vector, top_k)
    }

    pub fn retrieve_by_vector(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<RetrievalResult>> {
        if self.corpus.is_empty() {
            return Ok(Vec::new());
        }
        let k = top_k.min(self.corpus.len());
        self.corpus
            .search(query_vector, k)?
            .into_iter()
            .map(|hit| {
                let chunk = self.corpus.chunk(hit.position).cloned().ok_or_else(|| {
                    Error::CorruptIndex(format!("search returned position {} outside the corpus", hit.position))
                })?;
                Ok(RetrievalResult {
                    chunk,
                    position: hit.position,
                    distance: hit.distance,
                    relevance: relevance_from_distance(hit.distance),
                })
            })
            .collect()
    }
}
