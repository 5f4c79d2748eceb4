use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::chunker::{self, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP};
use crate::error::Error;

pub const DEFAULT_PATTERNS: [&str; 6] = [
    "PORTFOLIO_CONTEXT.md",
    "PROJECT_CONTEXT.md",
    "SESSION_BRIEFING*.md",
    "CONTINUITY*.md",
    "*_CONTEXT.md",
    "README.md",
];

pub const DEFAULT_EXCLUSIONS: [&str; 4] = [".git", "node_modules", "__pycache__", "venv"];

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_in(Path::new("."))
    }

    /// Merge defaults, `config.toml`, `config.<env>.toml` and `APP_*` vars,
    /// looking for the TOML files under `dir`.
    pub fn load_in(dir: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?.validate()?;
        Ok(config)
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub corpus: CorpusSettings,
    pub index: IndexSettings,
    pub embedding: EmbeddingSettings,
    pub context: ContextSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusSettings {
    pub root: String,
    pub patterns: Vec<String>,
    pub exclusions: Vec<String>,
    pub chunk_size: usize,
    pub overlap: usize,
    /// Chunks whose trimmed length is below this many characters are dropped.
    pub min_chunk_chars: usize,
}

impl Default for CorpusSettings {
    fn default() -> Self {
        Self {
            root: ".".to_string(),
            patterns: DEFAULT_PATTERNS.iter().map(|p| (*p).to_string()).collect(),
            exclusions: DEFAULT_EXCLUSIONS.iter().map(|e| (*e).to_string()).collect(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
            min_chunk_chars: 51,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Blob file name; the sidecar lives next to it as `<file>.meta.json`.
    pub file: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self { file: "continuity.index".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub dimension: usize,
    pub model_dir: String,
    pub max_len: usize,
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            dimension: 384,
            model_dir: "models/all-MiniLM-L6-v2".to_string(),
            max_len: 256,
            batch_size: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    pub top_k: usize,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self { top_k: 10 }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), Error> {
        chunker::validate_params(self.corpus.chunk_size, self.corpus.overlap)?;
        if self.corpus.patterns.is_empty() {
            return Err(Error::InvalidConfig("corpus.patterns must not be empty".into()));
        }
        if self.embedding.dimension == 0 {
            return Err(Error::InvalidConfig("embedding.dimension must be positive".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size must be positive".into()));
        }
        if self.context.top_k == 0 {
            return Err(Error::InvalidConfig("context.top_k must be positive".into()));
        }
        Ok(())
    }

    pub fn corpus_root(&self) -> PathBuf {
        expand_path(&self.corpus.root)
    }

    /// Index blob path; relative names are placed under the corpus root.
    pub fn index_path(&self) -> PathBuf {
        resolve_with_base(&self.corpus_root(), &self.index.file)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
