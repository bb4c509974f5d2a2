//! Optional similarity-embedding layer for search ranking
//!
//! Embedding vectors are consumed from a prebuilt binary artifact, never
//! trained here. The layer is a soft dependency: a missing or malformed
//! artifact logs a warning and disables itself, leaving keyword scoring
//! untouched. Vectors are normalized at load time so similarity reduces to
//! a dot product.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{LexMapError, Result};

/// On-disk artifact layout
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawEmbeddings {
    dim: usize,
    items: Vec<RawItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawItem {
    id: String,
    vector: Vec<f32>,
}

/// In-memory vector index keyed by search entry identifier
#[derive(Debug, Clone, Default)]
pub struct EmbeddingIndex {
    dim: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl EmbeddingIndex {
    /// Build an index from raw (id, vector) pairs.
    ///
    /// Vectors with the wrong dimension are dropped; the rest are
    /// L2-normalized.
    pub fn new(dim: usize, items: Vec<(String, Vec<f32>)>) -> Self {
        let mut vectors = HashMap::with_capacity(items.len());
        for (id, mut vector) in items {
            if vector.len() != dim {
                warn!(id = %id, "dropping embedding with mismatched dimension");
                continue;
            }
            normalize(&mut vector);
            vectors.insert(id, vector);
        }
        Self { dim, vectors }
    }

    /// Load the artifact, degrading to `None` on any failure
    pub fn load(path: &Path) -> Option<Self> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "embedding artifact unavailable; keyword-only scoring");
                return None;
            }
        };
        let raw: RawEmbeddings = match bincode::deserialize_from(BufReader::new(file)) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "embedding artifact malformed; keyword-only scoring");
                return None;
            }
        };

        let index = Self::new(
            raw.dim,
            raw.items.into_iter().map(|i| (i.id, i.vector)).collect(),
        );
        info!(
            vectors = index.vectors.len(),
            dim = index.dim,
            "embedding index loaded"
        );
        Some(index)
    }

    /// Persist the artifact next to a snapshot
    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = RawEmbeddings {
            dim: self.dim,
            items: self
                .vectors
                .iter()
                .map(|(id, vector)| RawItem {
                    id: id.clone(),
                    vector: vector.clone(),
                })
                .collect(),
        };
        let file = File::create(path)?;
        bincode::serialize_into(BufWriter::new(file), &raw).map_err(|e| {
            LexMapError::IndexArtifact {
                path: path.display().to_string(),
                message: e.to_string(),
            }
        })
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Cosine similarity between an indexed entry and a query vector.
    /// Returns `None` for unknown ids or mismatched query dimensions.
    pub fn similarity(&self, id: &str, query: &[f32]) -> Option<f32> {
        if query.len() != self.dim {
            return None;
        }
        let vector = self.vectors.get(id)?;
        let norm = l2(query);
        if norm == 0.0 {
            return None;
        }
        let dot: f32 = vector.iter().zip(query).map(|(a, b)| a * b).sum();
        Some(dot / norm)
    }
}

fn l2(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn normalize(v: &mut [f32]) {
    let norm = l2(v);
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> EmbeddingIndex {
        EmbeddingIndex::new(
            3,
            vec![
                ("A".into(), vec![1.0, 0.0, 0.0]),
                ("B".into(), vec![0.0, 2.0, 0.0]),
            ],
        )
    }

    #[test]
    fn test_similarity_is_cosine() {
        let index = sample();
        let sim = index.similarity("A", &[1.0, 0.0, 0.0]).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
        let sim = index.similarity("B", &[1.0, 0.0, 0.0]).unwrap();
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_unknown_id_and_bad_dims() {
        let index = sample();
        assert!(index.similarity("C", &[1.0, 0.0, 0.0]).is_none());
        assert!(index.similarity("A", &[1.0, 0.0]).is_none());
        assert!(index.similarity("A", &[0.0, 0.0, 0.0]).is_none());
    }

    #[test]
    fn test_mismatched_vectors_dropped() {
        let index = EmbeddingIndex::new(3, vec![("A".into(), vec![1.0])]);
        assert!(index.is_empty());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("embeddings.bin");
        sample().save(&path).unwrap();

        let loaded = EmbeddingIndex::load(&path).expect("artifact loads");
        assert_eq!(loaded.len(), 2);
        let sim = loaded.similarity("A", &[1.0, 0.0, 0.0]).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_artifact_degrades() {
        let dir = tempdir().unwrap();
        assert!(EmbeddingIndex::load(&dir.path().join("nope.bin")).is_none());
    }

    #[test]
    fn test_malformed_artifact_degrades() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("garbage.bin");
        std::fs::write(&path, b"not an embedding artifact").unwrap();
        assert!(EmbeddingIndex::load(&path).is_none());
    }
}
