//! Exact nearest-neighbour search over embedding vectors.
//!
//! [`FlatL2Index`] stores every vector contiguously and scans all of them
//! per query. Endpoint catalogs are small enough that exactness is worth
//! more than sub-linear search.
//!
//! # Serialized Format
//!
//! ```text
//! magic   b"EPFL"          4 bytes
//! version u32 LE           4 bytes
//! dims    u32 LE           4 bytes
//! rows    u64 LE           8 bytes
//! data    f32 LE × rows × dims
//! ```

use anyhow::{bail, Result};

const MAGIC: &[u8; 4] = b"EPFL";
const VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

/// A vector index searchable by row position.
pub trait VectorIndex: Send + Sync {
    fn dims(&self) -> usize;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// The `k` nearest rows as `(row_index, distance)`, nearest first.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>>;
    fn to_bytes(&self) -> Vec<u8>;
}

/// Flat index using squared Euclidean distance.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatL2Index {
    dims: usize,
    data: Vec<f32>,
}

impl FlatL2Index {
    /// Build an index whose row `i` is `vectors[i]`.
    pub fn build(dims: usize, vectors: &[Vec<f32>]) -> Result<Self> {
        if dims == 0 {
            bail!("index dimensionality must be > 0");
        }
        let mut data = Vec::with_capacity(dims * vectors.len());
        for (row, vector) in vectors.iter().enumerate() {
            if vector.len() != dims {
                bail!(
                    "row {} has {} dimensions, index expects {}",
                    row,
                    vector.len(),
                    dims
                );
            }
            data.extend_from_slice(vector);
        }
        Ok(Self { dims, data })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            bail!("index truncated: {} bytes is shorter than the header", bytes.len());
        }
        if &bytes[..4] != MAGIC {
            bail!("not an index file (bad magic)");
        }

        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != VERSION {
            bail!("unsupported index version {}", version);
        }
        let dims = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        let mut rows_bytes = [0u8; 8];
        rows_bytes.copy_from_slice(&bytes[12..20]);
        let rows = u64::from_le_bytes(rows_bytes) as usize;

        if dims == 0 {
            bail!("index header declares zero dimensions");
        }
        let expected = rows
            .checked_mul(dims)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| anyhow::anyhow!("index header overflows: {} × {}", rows, dims))?;
        let payload = &bytes[HEADER_LEN..];
        if payload.len() != expected {
            bail!(
                "index payload is {} bytes, header declares {} rows × {} dims",
                payload.len(),
                rows,
                dims
            );
        }

        let data = payload
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self { dims, data })
    }

    fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dims)
    }
}

impl VectorIndex for FlatL2Index {
    fn dims(&self) -> usize {
        self.dims
    }

    fn len(&self) -> usize {
        self.data.len() / self.dims
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dims {
            bail!(
                "query has {} dimensions, index expects {}",
                query.len(),
                self.dims
            );
        }

        let mut scored: Vec<(usize, f32)> = self
            .rows()
            .enumerate()
            .map(|(i, row)| (i, squared_l2(query, row)))
            .collect();

        // Stable sort keeps lower row indices first on equal distance.
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);
        Ok(scored)
    }

    fn to_bytes(&self) -> Vec<u8> {
        let rows = self.len() as u64;
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.data.len() * 4);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        bytes.extend_from_slice(&(self.dims as u32).to_le_bytes());
        bytes.extend_from_slice(&rows.to_le_bytes());
        for v in &self.data {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes
    }
}

/// Squared Euclidean distance. Slices must have equal length.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
