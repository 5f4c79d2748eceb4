//! The indexed corpus: chunk records paired with their vectors by position.
//!
//! An [`IndexedCorpus`] is immutable once built. The chunk list and the flat
//! index are only ever created together, by [`IndexedCorpus::rebuild`] or
//! [`IndexedCorpus::load`], and both constructors check that they have the
//! same length.

use std::fs;
use std::path::Path;

use chrono::Utc;
use tracing::{debug, info};

use continuity_core::corpus::Corpus;
use continuity_core::error::{Error, Result};
use continuity_core::traits::Embedder;
use continuity_core::types::Chunk;

use crate::flat::{FlatL2Index, Neighbor};
use crate::sidecar::{checksum, sidecar_path, Sidecar, SIDECAR_VERSION};

#[derive(Debug, Clone, PartialEq)]
pub struct IndexedCorpus {
    chunks: Vec<Chunk>,
    index: FlatL2Index,
}

impl IndexedCorpus {
    pub fn empty(dim: usize) -> Result<Self> {
        Ok(Self { chunks: Vec::new(), index: FlatL2Index::new(dim)? })
    }

    pub fn from_parts(chunks: Vec<Chunk>, index: FlatL2Index) -> Result<Self> {
        if chunks.len() != index.len() {
            return Err(Error::CorruptIndex(format!(
                "{} chunks paired with {} vectors",
                chunks.len(),
                index.len()
            )));
        }
        Ok(Self { chunks, index })
    }

    /// Embed every chunk in one batch and index the vectors in corpus order.
    pub fn rebuild(corpus: Corpus, embedder: &dyn Embedder) -> Result<Self> {
        if corpus.is_empty() {
            return Self::empty(embedder.dim());
        }
        let texts = corpus.texts();
        info!(chunks = texts.len(), dim = embedder.dim(), "embedding corpus");
        let vectors = embedder
            .embed_batch(&texts)
            .map_err(|e| Error::Embedding(format!("{e:#}")))?;
        if vectors.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        let index = FlatL2Index::from_vectors(embedder.dim(), &vectors)?;
        Self::from_parts(corpus.into_chunks(), index)
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk(&self, position: usize) -> Option<&Chunk> {
        self.chunks.get(position)
    }

    pub fn index(&self) -> &FlatL2Index {
        &self.index
    }

    pub fn dim(&self) -> usize {
        self.index.dim()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        self.index.search(query_vector, k)
    }

    /// Write the blob at `path` and the sidecar next to it.
    pub fn persist(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let blob = self.index.to_bytes();
        let sidecar = Sidecar {
            version: SIDECAR_VERSION,
            dimension: self.index.dim(),
            built_at: Utc::now().timestamp_millis(),
            blob_checksum: checksum(&blob),
            documents: self.chunks.iter().map(|c| c.text.clone()).collect(),
            metadata: self.chunks.iter().map(|c| c.meta.clone()).collect(),
        };
        write_replace(path, &blob)?;
        write_replace(&sidecar_path(path), &serde_json::to_vec(&sidecar)?)?;
        info!(path = %path.display(), chunks = self.len(), "index persisted");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotFound(format!("no index at {}", path.display())));
        }
        let blob = fs::read(path)?;
        let index = FlatL2Index::from_bytes(&blob)?;

        let meta_path = sidecar_path(path);
        let raw = fs::read(&meta_path).map_err(|e| {
            Error::CorruptIndex(format!("sidecar {} unreadable: {e}", meta_path.display()))
        })?;
        let sidecar: Sidecar = serde_json::from_slice(&raw).map_err(|e| {
            Error::CorruptIndex(format!("sidecar {} malformed: {e}", meta_path.display()))
        })?;

        if sidecar.version != SIDECAR_VERSION {
            return Err(Error::CorruptIndex(format!("unsupported sidecar version {}", sidecar.version)));
        }
        if sidecar.documents.len() != sidecar.metadata.len() || sidecar.documents.len() != index.len() {
            return Err(Error::CorruptIndex(format!(
                "sidecar lists {} documents and {} metadata entries for {} vectors",
                sidecar.documents.len(),
                sidecar.metadata.len(),
                index.len()
            )));
        }
        if sidecar.dimension != index.dim() {
            return Err(Error::CorruptIndex(format!(
                "sidecar dimension {} but blob dimension {}",
                sidecar.dimension,
                index.dim()
            )));
        }
        if sidecar.blob_checksum != checksum(&blob) {
            return Err(Error::CorruptIndex("blob checksum does not match sidecar".into()));
        }

        let chunks = sidecar
            .documents
            .into_iter()
            .zip(sidecar.metadata)
            .map(|(text, meta)| Chunk { text, meta })
            .collect();
        debug!(path = %path.display(), built_at = sidecar.built_at, "index loaded");
        Self::from_parts(chunks, index)
    }

    pub fn exists(path: &Path) -> bool {
        path.exists() && sidecar_path(path).exists()
    }
}

fn write_replace(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
