//! Deterministic feature-hashing embedder.
//!
//! Each whitespace token is hashed with SHA-256; the first eight bytes pick
//! a bucket and the ninth byte picks a sign. The bucket counts are then
//! L2-normalized. Texts sharing tokens land close together, which is enough
//! for offline runs and tests without downloading a model.

use anyhow::{bail, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::Embedder;

pub(super) const DEFAULT_DIMS: usize = 256;

pub struct HashingProvider {
    name: String,
    dims: usize,
}

impl HashingProvider {
    pub fn new(dims: usize) -> Result<Self> {
        if dims == 0 {
            bail!("hashing provider needs dims > 0");
        }
        Ok(Self {
            name: format!("hashing-{}", dims),
            dims,
        })
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dims];

        for token in text.split_whitespace() {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dims as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashingProvider {
    fn model_name(&self) -> &str {
        &self.name
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq_dist(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
    }

    #[test]
    fn test_deterministic_and_normalized() {
        let p = HashingProvider::new(32).unwrap();
        let a = p.embed_one("delete user account");
        let b = p.embed_one("delete user account");
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let p = HashingProvider::new(8).unwrap();
        assert_eq!(p.embed_one(""), vec![0.0; 8]);
    }

    #[test]
    fn test_shared_tokens_are_closer() {
        let p = HashingProvider::new(512).unwrap();
        let q = p.embed_one("invoice list");
        let near = p.embed_one("invoice list customer");
        let far = p.embed_one("weather forecast tomorrow");
        assert!(sq_dist(&q, &near) < sq_dist(&q, &far));
    }

    #[test]
    fn test_zero_dims_rejected() {
        assert!(HashingProvider::new(0).is_err());
    }
}
