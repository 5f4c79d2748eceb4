//! Document sweep: finds continuity documents under a root directory, chunks
//! and classifies them into an ordered [`Corpus`].

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::chunker;
use crate::classify::classify_path;
use crate::config::CorpusSettings;
use crate::error::Result;
use crate::types::{Chunk, ChunkMeta, SkippedDocument};

/// Ordered chunks of every indexed document, in file-then-sequence order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    chunks: Vec<Chunk>,
}

impl Corpus {
    pub fn new(chunks: Vec<Chunk>) -> Self {
        Self { chunks }
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn texts(&self) -> Vec<String> {
        self.chunks.iter().map(|c| c.text.clone()).collect()
    }

    pub fn into_chunks(self) -> Vec<Chunk> {
        self.chunks
    }
}

/// Result of a sweep. Unreadable documents are reported, never fatal.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub corpus: Corpus,
    pub files_matched: usize,
    pub files_indexed: usize,
    pub skipped: Vec<SkippedDocument>,
}

pub struct DocumentScanner {
    settings: CorpusSettings,
}

impl DocumentScanner {
    pub fn new(settings: CorpusSettings) -> Result<Self> {
        chunker::validate_params(settings.chunk_size, settings.overlap)?;
        Ok(Self { settings })
    }

    pub fn build(&self, root: &Path) -> Result<ScanOutcome> {
        let files = self.list_documents(root);
        let mut outcome = ScanOutcome { files_matched: files.len(), ..ScanOutcome::default() };
        let mut chunks = Vec::new();

        for (file_index, file_path) in files.iter().enumerate() {
            let relative = relative_path(root, file_path);
            debug!(file = %relative, "processing {}/{}", file_index + 1, files.len());
            let content = match read_document(file_path) {
                Ok(content) => content,
                Err(reason) => {
                    warn!(file = %relative, %reason, "skipping unreadable document");
                    outcome.skipped.push(SkippedDocument { path: relative, reason });
                    continue;
                }
            };
            let before = chunks.len();
            chunks.extend(self.chunk_document(&content, file_path, &relative)?);
            if chunks.len() > before {
                outcome.files_indexed += 1;
            }
        }

        if chunks.is_empty() {
            warn!(root = %root.display(), "no documents found to index");
        } else {
            info!(files = outcome.files_indexed, chunks = chunks.len(), "document sweep complete");
        }
        outcome.corpus = Corpus::new(chunks);
        Ok(outcome)
    }

    fn chunk_document(&self, content: &str, file_path: &Path, relative: &str) -> Result<Vec<Chunk>> {
        let category = classify_path(file_path);
        let pieces = chunker::chunk_text(content, self.settings.chunk_size, self.settings.overlap)?;
        Ok(pieces
            .into_iter()
            .enumerate()
            .filter(|(_, text)| text.trim().chars().count() >= self.settings.min_chunk_chars)
            .map(|(sequence_index, text)| Chunk {
                text,
                meta: ChunkMeta { source_path: relative.to_string(), sequence_index, category },
            })
            .collect())
    }

    fn list_documents(&self, root: &Path) -> Vec<PathBuf> {
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !self.is_excluded(&relative_path(root, entry.path())));

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "failed to walk entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let matched = {
                let name = entry.file_name().to_string_lossy();
                self.settings.patterns.iter().any(|p| wildcard_match(p, &name))
            };
            if matched {
                files.push(entry.into_path());
            }
        }
        files
    }

    fn is_excluded(&self, relative: &str) -> bool {
        self.settings
            .exclusions
            .iter()
            .any(|needle| !needle.is_empty() && relative.contains(needle.as_str()))
    }
}

/// Sweep `root` with the default chunking parameters.
pub fn build(root: &Path, patterns: &[String], exclusions: &[String]) -> Result<ScanOutcome> {
    let settings = CorpusSettings {
        patterns: patterns.to_vec(),
        exclusions: exclusions.to_vec(),
        ..CorpusSettings::default()
    };
    DocumentScanner::new(settings)?.build(root)
}

fn read_document(path: &Path) -> std::result::Result<String, String> {
    let bytes = fs::read(path).map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|e| format!("not valid UTF-8: {e}"))
}

fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Match a file name against a pattern where `*` spans any run of characters
/// and `?` a single one. A leading `**/` is accepted and ignored.
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.trim_start_matches("**/").chars().collect();
    let name: Vec<char> = name.chars().collect();
    let (mut pi, mut ni) = (0usize, 0usize);
    let mut backtrack: Option<(usize, usize)> = None;

    while ni < name.len() {
        if pi < pattern.len() && pattern[pi] == '*' {
            backtrack = Some((pi, ni));
            pi += 1;
        } else if pi < pattern.len() && (pattern[pi] == '?' || pattern[pi] == name[ni]) {
            pi += 1;
            ni += 1;
        } else if let Some((star, matched)) = backtrack {
            pi = star + 1;
            ni = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    pattern[pi..].iter().all(|&c| c == '*')
}
