//! The continuity engine: one indexed corpus, one embedder, many readers.
//!
//! State lives in `RwLock<Arc<IndexedCorpus>>`. Readers clone the `Arc` and
//! search that snapshot without holding the lock. `rebuild` and `load` build
//! the replacement completely, then swap it in, so a failure leaves the
//! previous state in place. Mutations are serialised by `writer`.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{info, warn};

use continuity_core::config::Settings;
use continuity_core::corpus::DocumentScanner;
use continuity_core::error::{Error, Result};
use continuity_core::traits::Embedder;
use continuity_core::types::{RetrievalResult, SkippedDocument};
use continuity_vector::{IndexedCorpus, Retriever};

use crate::assemble::{default_query, render_context};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub files_matched: usize,
    pub files_indexed: usize,
    pub chunks: usize,
    pub skipped: Vec<SkippedDocument>,
}

/// How [`ContinuityEngine::load_or_build`] obtained its state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Startup {
    Loaded { chunks: usize },
    Built(BuildReport),
}

impl Startup {
    pub fn chunks(&self) -> usize {
        match self {
            Startup::Loaded { chunks } => *chunks,
            Startup::Built(report) => report.chunks,
        }
    }
}

pub struct ContinuityEngine {
    settings: Settings,
    embedder: Box<dyn Embedder>,
    state: RwLock<Arc<IndexedCorpus>>,
    writer: Mutex<()>,
}

impl ContinuityEngine {
    pub fn new(settings: Settings, embedder: Box<dyn Embedder>) -> Result<Self> {
        settings.validate()?;
        if embedder.dim() != settings.embedding.dimension {
            return Err(Error::DimensionMismatch {
                expected: settings.embedding.dimension,
                actual: embedder.dim(),
            });
        }
        let empty = IndexedCorpus::empty(embedder.dim())?;
        Ok(Self { settings, embedder, state: RwLock::new(Arc::new(empty)), writer: Mutex::new(()) })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn index_path(&self) -> PathBuf {
        self.settings.index_path()
    }

    /// Sweep the corpus root, embed, persist, then swap the new state in.
    /// A sweep with no chunks swaps in the empty state without persisting.
    pub fn rebuild(&self) -> Result<BuildReport> {
        let _guard = self.writer.lock().map_err(|_| poisoned("writer"))?;
        let root = self.settings.corpus_root();
        info!(root = %root.display(), "rebuilding continuity index");

        let outcome = DocumentScanner::new(self.settings.corpus.clone())?.build(&root)?;
        let report = BuildReport {
            files_matched: outcome.files_matched,
            files_indexed: outcome.files_indexed,
            chunks: outcome.corpus.len(),
            skipped: outcome.skipped,
        };
        let indexed = IndexedCorpus::rebuild(outcome.corpus, self.embedder.as_ref())?;
        // an empty sweep is not saved, so the next startup scans again
        if indexed.is_empty() {
            warn!(root = %root.display(), "nothing to index, persisted index left untouched");
        } else {
            indexed.persist(&self.index_path())?;
        }
        self.swap(indexed)?;
        info!(chunks = report.chunks, files = report.files_indexed, "index ready");
        Ok(report)
    }

    /// Replace the current state with the persisted index pair.
    pub fn load(&self) -> Result<usize> {
        let _guard = self.writer.lock().map_err(|_| poisoned("writer"))?;
        let path = self.index_path();
        let indexed = IndexedCorpus::load(&path)?;
        if indexed.dim() != self.embedder.dim() {
            return Err(Error::DimensionMismatch { expected: indexed.dim(), actual: self.embedder.dim() });
        }
        let chunks = indexed.len();
        self.swap(indexed)?;
        info!(path = %path.display(), chunks, "loaded existing index");
        Ok(chunks)
    }

    pub fn load_or_build(&self, force_rebuild: bool) -> Result<Startup> {
        if !force_rebuild && IndexedCorpus::exists(&self.index_path()) {
            match self.load() {
                Ok(chunks) => return Ok(Startup::Loaded { chunks }),
                Err(err @ Error::CorruptIndex(_)) => {
                    warn!(error = %err, "persisted index unusable, rebuilding");
                }
                Err(err) => return Err(err),
            }
        }
        self.rebuild().map(Startup::Built)
    }

    /// Consistent view of the current state, unaffected by later swaps.
    pub fn snapshot(&self) -> Result<Arc<IndexedCorpus>> {
        let state = self.state.read().map_err(|_| poisoned("state"))?;
        Ok(Arc::clone(&*state))
    }

    pub fn len(&self) -> usize {
        self.state.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievalResult>> {
        let snapshot = self.snapshot()?;
        Retriever::new(&snapshot, self.embedder.as_ref()).retrieve(query, top_k)
    }

    pub fn assemble_session_context(&self, query_override: Option<&str>, project_filter: Option<&str>) -> Result<String> {
        let query = match query_override {
            Some(q) => q.to_string(),
            None => default_query(project_filter),
        };
        let results = self.retrieve(&query, self.settings.context.top_k)?;
        Ok(render_context(&results))
    }

    fn swap(&self, indexed: IndexedCorpus) -> Result<()> {
        let mut state = self.state.write().map_err(|_| poisoned("state"))?;
        *state = Arc::new(indexed);
        Ok(())
    }
}

fn poisoned(what: &str) -> Error {
    Error::Operation(format!("{what} lock poisoned"))
}
