//! JSON sidecar stored next to the index blob.
//!
//! `documents[i]` and `metadata[i]` describe the vector at position `i` of the
//! blob. `blob_checksum` is the BLAKE3 hex digest of the blob bytes written in
//! the same rebuild, so a blob and sidecar from different builds are rejected.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use continuity_core::types::ChunkMeta;

pub const SIDECAR_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sidecar {
    pub version: u32,
    pub dimension: usize,
    /// Unix milliseconds.
    pub built_at: i64,
    pub blob_checksum: String,
    pub documents: Vec<String>,
    pub metadata: Vec<ChunkMeta>,
}

pub fn sidecar_path(blob: &Path) -> PathBuf {
    let mut name = blob.file_name().unwrap_or_default().to_os_string();
    name.push(".meta.json");
    blob.with_file_name(name)
}

pub fn checksum(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}
