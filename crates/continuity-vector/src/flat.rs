//! Exact nearest-neighbour index: every query scans all stored vectors.
//!
//! Distances are squared Euclidean. Results are ordered by ascending distance
//! and then ascending position, so equal distances never reorder between runs.
//!
//! Blob layout (little endian):
//! `b"CFLX"` | version `u32` | dimension `u32` | count `u64` | `count * dim` `f32`

use std::fs;
use std::path::Path;

use continuity_core::error::{Error, Result};

const MAGIC: &[u8; 4] = b"CFLX";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub distance: f32,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlatL2Index {
    dim: usize,
    data: Vec<f32>,
}

impl FlatL2Index {
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 || u32::try_from(dim).is_err() {
            return Err(Error::InvalidConfig(format!("unsupported index dimension {dim}")));
        }
        Ok(Self { dim, data: Vec::new() })
    }

    pub fn from_vectors(dim: usize, vectors: &[Vec<f32>]) -> Result<Self> {
        let mut index = Self::new(dim)?;
        index.data.reserve(vectors.len() * dim);
        for v in vectors {
            index.add(v)?;
        }
        Ok(index)
    }

    pub fn add(&mut self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: vector.len() });
        }
        self.data.extend_from_slice(vector);
        Ok(())
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dim)?;
        self.data.get(start..start + self.dim)
    }

    /// Up to `k` nearest stored vectors; `k` larger than the index returns all.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: query.len() });
        }
        let mut neighbors: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(position, stored)| Neighbor { distance: squared_l2(query, stored), position })
            .collect();
        neighbors.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.position.cmp(&b.position))
        });
        neighbors.truncate(k.min(self.len()));
        Ok(neighbors)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.data.len() * 4);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        // new() guarantees the dimension fits in a u32
        bytes.extend_from_slice(&(self.dim as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.len() as u64).to_le_bytes());
        for value in &self.data {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(corrupt(format!("blob is {} bytes, shorter than its header", bytes.len())));
        }
        if &bytes[0..4] != MAGIC {
            return Err(corrupt("blob magic does not match".to_string()));
        }
        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != FORMAT_VERSION {
            return Err(corrupt(format!("unsupported blob version {version}")));
        }
        let dim = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        let mut count_bytes = [0u8; 8];
        count_bytes.copy_from_slice(&bytes[12..HEADER_LEN]);
        let count = usize::try_from(u64::from_le_bytes(count_bytes))
            .map_err(|_| corrupt("vector count overflows".to_string()))?;
        if dim == 0 {
            return Err(corrupt("blob dimension is zero".to_string()));
        }

        let expected = count
            .checked_mul(dim)
            .and_then(|n| n.checked_mul(4))
            .and_then(|n| n.checked_add(HEADER_LEN))
            .ok_or_else(|| corrupt("vector payload size overflows".to_string()))?;
        if bytes.len() != expected {
            return Err(corrupt(format!(
                "blob holds {} bytes, header promises {expected} ({count} x {dim})",
                bytes.len()
            )));
        }

        let data = bytes[HEADER_LEN..]
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self { dim, data })
    }

    pub fn persist(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_bytes())?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_bytes(&fs::read(path)?)
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

fn corrupt(msg: String) -> Error {
    Error::CorruptIndex(msg)
}
