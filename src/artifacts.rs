//! Publication and loading of training artifacts.
//!
//! A training run produces four files that only make sense together: the
//! vector index, the row metadata, the raw embedding matrix and a manifest.
//! They are written as one *generation* directory and made visible by
//! swapping a single pointer file, so readers see either the previous pair
//! or the new pair and never a mix.
//!
//! ```text
//! <model.dir>/
//!   CURRENT                      name of the published generation
//!   gen-20260118T101500.123Z-1a2b3c4d/
//!     index.bin                  FlatL2Index bytes
//!     metadata.json              {"0": {...}, "1": {...}}
//!     embeddings.npy             float32 (rows, dims), diagnostics only
//!     manifest.json
//! ```
//!
//! # Publish Protocol
//!
//! 1. Write and fsync every file inside a hidden staging directory.
//! 2. Rename the staging directory to its generation name.
//! 3. Write `CURRENT.tmp`, fsync, rename over `CURRENT`.
//! 4. Prune generations older than the previous one.
//!
//! A failure before step 3 leaves `CURRENT` untouched.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::ArtifactError;
use crate::index::{FlatL2Index, VectorIndex};
use crate::models::EndpointMeta;

const CURRENT: &str = "CURRENT";
const CURRENT_TMP: &str = "CURRENT.tmp";
const INDEX_FILE: &str = "index.bin";
const METADATA_FILE: &str = "metadata.json";
const EMBEDDINGS_FILE: &str = "embeddings.npy";
const MANIFEST_FILE: &str = "manifest.json";
const GENERATION_PREFIX: &str = "gen-";
const STAGING_PREFIX: &str = ".staging-";
/// Generations kept on disk: the current one and its predecessor.
const KEEP_GENERATIONS: usize = 2;

/// Row metadata keyed by the decimal row index.
pub type Metadata = BTreeMap<String, EndpointMeta>;

/// Description of one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub generation: String,
    pub model: String,
    pub dims: usize,
    pub rows: usize,
    pub created_at: String,
    pub corpus_digest: String,
}

/// Everything a training run publishes.
pub struct TrainingArtifacts<'a> {
    pub index: &'a FlatL2Index,
    pub metadata: &'a Metadata,
    pub embeddings: &'a [Vec<f32>],
    pub model: &'a str,
    pub corpus_digest: &'a str,
}

/// A loaded, immutable generation.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub generation: String,
    pub index: FlatL2Index,
    pub metadata: HashMap<String, EndpointMeta>,
    pub manifest: Option<Manifest>,
}

/// Filesystem home of the published generations.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Name of the published generation, if any.
    pub fn current_generation(&self) -> Result<Option<String>, ArtifactError> {
        match fs::read_to_string(self.dir.join(CURRENT)) {
            Ok(name) => {
                let name = name.trim().to_string();
                Ok((!name.is_empty()).then_some(name))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether a complete index/metadata pair is published.
    pub fn exists(&self) -> bool {
        match self.current_generation() {
            Ok(Some(generation)) => {
                let dir = self.dir.join(generation);
                dir.join(INDEX_FILE).is_file() && dir.join(METADATA_FILE).is_file()
            }
            _ => false,
        }
    }

    /// Publish a new generation and make it current.
    ///
    /// Returns the generation name.
    pub fn publish(&self, artifacts: &TrainingArtifacts<'_>) -> Result<String, ArtifactError> {
        fs::create_dir_all(&self.dir)?;

        let id = uuid::Uuid::new_v4().simple().to_string();
        let generation = format!(
            "{}{}-{}",
            GENERATION_PREFIX,
            Utc::now().format("%Y%m%dT%H%M%S%.3fZ"),
            &id[..8]
        );
        let staging = self.dir.join(format!("{}{}", STAGING_PREFIX, id));

        let manifest = Manifest {
            generation: generation.clone(),
            model: artifacts.model.to_string(),
            dims: artifacts.index.dims(),
            rows: artifacts.index.len(),
            created_at: Utc::now().to_rfc3339(),
            corpus_digest: artifacts.corpus_digest.to_string(),
        };

        if let Err(e) = self.stage(&staging, artifacts, &manifest) {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        let target = self.dir.join(&generation);
        if let Err(source) = fs::rename(&staging, &target) {
            let _ = fs::remove_dir_all(&staging);
            return Err(ArtifactError::Publish {
                artifact: "generation directory",
                source,
            });
        }

        let tmp = self.dir.join(CURRENT_TMP);
        let swapped = write_synced(&tmp, generation.as_bytes())
            .and_then(|_| fs::rename(&tmp, self.dir.join(CURRENT)));
        if let Err(source) = swapped {
            let _ = fs::remove_dir_all(&target);
            return Err(ArtifactError::Publish {
                artifact: "CURRENT pointer",
                source,
            });
        }

        tracing::info!(
            generation = %generation,
            rows = manifest.rows,
            dims = manifest.dims,
            "published training artifacts"
        );

        self.prune(&generation);
        Ok(generation)
    }

    fn stage(
        &self,
        staging: &Path,
        artifacts: &TrainingArtifacts<'_>,
        manifest: &Manifest,
    ) -> Result<(), ArtifactError> {
        fs::create_dir_all(staging).map_err(|source| ArtifactError::Publish {
            artifact: "staging directory",
            source,
        })?;

        write_synced(&staging.join(INDEX_FILE), &artifacts.index.to_bytes()).map_err(
            |source| ArtifactError::Publish {
                artifact: "index",
                source,
            },
        )?;

        let metadata = serde_json::to_vec_pretty(artifacts.metadata).map_err(|e| {
            ArtifactError::Corrupt {
                artifact: "metadata",
                message: e.to_string(),
            }
        })?;
        write_synced(&staging.join(METADATA_FILE), &metadata).map_err(|source| {
            ArtifactError::Publish {
                artifact: "metadata",
                source,
            }
        })?;

        let npy = encode_npy_f32(artifacts.embeddings, artifacts.index.dims());
        write_synced(&staging.join(EMBEDDINGS_FILE), &npy).map_err(|source| {
            ArtifactError::Publish {
                artifact: "embeddings",
                source,
            }
        })?;

        let manifest = serde_json::to_vec_pretty(manifest).map_err(|e| ArtifactError::Corrupt {
            artifact: "manifest",
            message: e.to_string(),
        })?;
        write_synced(&staging.join(MANIFEST_FILE), &manifest).map_err(|source| {
            ArtifactError::Publish {
                artifact: "manifest",
                source,
            }
        })?;

        Ok(())
    }

    /// Remove generations older than the previous one. Failures are logged.
    fn prune(&self, current: &str) {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "could not list model directory for pruning");
                return;
            }
        };

        let mut generations: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.starts_with(GENERATION_PREFIX))
            .collect();
        generations.sort();

        let excess = generations.len().saturating_sub(KEEP_GENERATIONS);
        for name in generations.into_iter().take(excess) {
            if name == current {
                continue;
            }
            if let Err(e) = fs::remove_dir_all(self.dir.join(&name)) {
                tracing::warn!(generation = %name, error = %e, "could not prune old generation");
            } else {
                tracing::debug!(generation = %name, "pruned old generation");
            }
        }
    }

    /// Load the published generation.
    pub fn load(&self) -> Result<Snapshot, ArtifactError> {
        let generation = self
            .current_generation()?
            .ok_or_else(|| ArtifactError::Missing(self.dir.display().to_string()))?;
        self.load_generation(&generation)
    }

    pub fn load_generation(&self, generation: &str) -> Result<Snapshot, ArtifactError> {
        let dir = self.dir.join(generation);
        let missing = || ArtifactError::Missing(dir.display().to_string());

        let index_bytes = read_optional(&dir.join(INDEX_FILE))?.ok_or_else(missing)?;
        let index = FlatL2Index::from_bytes(&index_bytes).map_err(|e| ArtifactError::Corrupt {
            artifact: "index",
            message: e.to_string(),
        })?;

        let metadata_bytes = read_optional(&dir.join(METADATA_FILE))?.ok_or_else(missing)?;
        let metadata: HashMap<String, EndpointMeta> = serde_json::from_slice(&metadata_bytes)
            .map_err(|e| ArtifactError::Corrupt {
                artifact: "metadata",
                message: e.to_string(),
            })?;

        let manifest = match read_optional(&dir.join(MANIFEST_FILE))? {
            Some(bytes) => Some(serde_json::from_slice::<Manifest>(&bytes).map_err(|e| {
                ArtifactError::Corrupt {
                    artifact: "manifest",
                    message: e.to_string(),
                }
            })?),
            None => None,
        };

        if index.len() != metadata.len() {
            tracing::warn!(
                generation,
                index_rows = index.len(),
                metadata_rows = metadata.len(),
                "index and metadata row counts differ"
            );
        }

        Ok(Snapshot {
            generation: generation.to_string(),
            index,
            metadata,
            manifest,
        })
    }
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, ArtifactError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Encode a row-major float32 matrix in NumPy `.npy` (format 1.0).
pub fn encode_npy_f32(rows: &[Vec<f32>], dims: usize) -> Vec<u8> {
    let dict = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': ({}, {}), }}",
        rows.len(),
        dims
    );
    // magic(6) + version(2) + header_len(2) + dict + padding + '\n' must be a multiple of 64.
    let unpadded = 10 + dict.len() + 1;
    let padding = (64 - unpadded % 64) % 64;
    let header_len = dict.len() + padding + 1;

    let mut out = Vec::with_capacity(10 + header_len + rows.len() * dims * 4);
    out.extend_from_slice(b"\x93NUMPY");
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header_len as u16).to_le_bytes());
    out.extend_from_slice(dict.as_bytes());
    out.extend(std::iter::repeat(b' ').take(padding));
    out.push(b'\n');
    for row in rows {
        for v in row {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn meta(id: &str, method: &str) -> EndpointMeta {
        EndpointMeta {
            id: id.to_string(),
            module_id: "m1".to_string(),
            module_name: "billing".to_string(),
            method: method.to_string(),
            path: format!("/{}", id),
            operation_id: format!("op{}", id),
            visibility: "public".to_string(),
            keywords: "invoice".to_string(),
            description: "Crea una factura — con acentos".to_string(),
            normalized_text: "post invoice".to_string(),
            raw_text: "POST /x".to_string(),
        }
    }

    fn publish_two(store: &ArtifactStore) -> (String, Metadata) {
        let vectors = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let index = FlatL2Index::build(2, &vectors).unwrap();
        let mut metadata = Metadata::new();
        metadata.insert("0".to_string(), meta("a", "GET"));
        metadata.insert("1".to_string(), meta("b", "POST"));
        let generation = store
            .publish(&TrainingArtifacts {
                index: &index,
                metadata: &metadata,
                embeddings: &vectors,
                model: "hashing-2",
                corpus_digest: "abc",
            })
            .unwrap();
        (generation, metadata)
    }

    #[test]
    fn test_load_without_training_is_missing() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path().join("model"));
        assert!(!store.exists());
        assert!(matches!(store.load(), Err(ArtifactError::Missing(_))));
    }

    #[test]
    fn test_publish_then_load_round_trips_metadata() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path().join("model"));
        let (generation, metadata) = publish_two(&store);

        assert!(store.exists());
        assert_eq!(store.current_generation().unwrap(), Some(generation.clone()));

        let snapshot = store.load().unwrap();
        assert_eq!(snapshot.generation, generation);
        assert_eq!(snapshot.index.len(), 2);
        for (key, row) in &metadata {
            assert_eq!(snapshot.metadata.get(key), Some(row));
        }
        let manifest = snapshot.manifest.unwrap();
        assert_eq!(manifest.rows, 2);
        assert_eq!(manifest.model, "hashing-2");

        let gen_dir = tmp.path().join("model").join(&generation);
        for file in [INDEX_FILE, METADATA_FILE, EMBEDDINGS_FILE, MANIFEST_FILE] {
            assert!(gen_dir.join(file).is_file(), "missing {}", file);
        }
    }

    #[test]
    fn test_failed_publish_keeps_previous_generation() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("model");
        let store = ArtifactStore::new(&dir);
        let (first, _) = publish_two(&store);

        // A directory squatting on the temp pointer makes the final swap fail.
        fs::create_dir_all(dir.join(CURRENT_TMP)).unwrap();

        let vectors = vec![vec![0.5, 0.5]];
        let index = FlatL2Index::build(2, &vectors).unwrap();
        let mut metadata = Metadata::new();
        metadata.insert("0".to_string(), meta("c", "DELETE"));
        let err = store
            .publish(&TrainingArtifacts {
                index: &index,
                metadata: &metadata,
                embeddings: &vectors,
                model: "hashing-2",
                corpus_digest: "def",
            })
            .unwrap_err();

        assert!(matches!(err, ArtifactError::Publish { artifact: "CURRENT pointer", .. }));
        assert_eq!(store.current_generation().unwrap(), Some(first));
        assert_eq!(store.load().unwrap().index.len(), 2);
    }

    #[test]
    fn test_missing_metadata_file_is_missing() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("model");
        let store = ArtifactStore::new(&dir);
        let (generation, _) = publish_two(&store);
        fs::remove_file(dir.join(&generation).join(METADATA_FILE)).unwrap();

        assert!(!store.exists());
        assert!(matches!(store.load(), Err(ArtifactError::Missing(_))));
    }

    #[test]
    fn test_prune_keeps_two_generations() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("model");
        let store = ArtifactStore::new(&dir);
        let mut last = String::new();
        for _ in 0..4 {
            last = publish_two(&store).0;
            std::thread::sleep(std::time::Duration::from_millis(5));
        }

        let generations: Vec<String> = fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|n| n.starts_with(GENERATION_PREFIX))
            .collect();
        assert_eq!(generations.len(), KEEP_GENERATIONS);
        assert!(generations.contains(&last));
    }

    #[test]
    fn test_npy_header_is_aligned() {
        let npy = encode_npy_f32(&[vec![1.0, 2.0, 3.0]], 3);
        assert_eq!(&npy[..6], b"\x93NUMPY");
        let header_len = u16::from_le_bytes([npy[8], npy[9]]) as usize;
        assert_eq!((10 + header_len) % 64, 0);
        assert_eq!(npy[10 + header_len - 1], b'\n');
        let header = std::str::from_utf8(&npy[10..10 + header_len]).unwrap();
        assert!(header.contains("'shape': (1, 3)"));
        assert_eq!(npy.len(), 10 + header_len + 12);
    }
}
