/// Flat vector index with exact squared-Euclidean search
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::ops::Range;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VectorIndexError {
    #[error("Invalid dimension: {0} (must be greater than 0)")]
    InvalidDimension(usize),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Identity of a stored vector: its 0-based insertion position
pub type VectorId = u64;

/// Search hit with ID and squared Euclidean distance (lower is closer)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchResult {
    pub id: VectorId,
    pub distance: f32,
}

/// On-disk form of an index: dimension plus `(id, vector)` pairs in id order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub dimension: usize,
    pub entries: Vec<IndexEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: VectorId,
    pub vector: Vec<f32>,
}

/// Append-only vector store searched by linear scan.
///
/// Vectors live back to back in one buffer, so identity `i` occupies
/// `data[i * dimension..(i + 1) * dimension]`. Search takes `&self` and keeps no
/// scratch state, so a populated index can be shared across threads and
/// searched concurrently.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl VectorIndex {
    /// Create an empty index fixed to `dimension`
    pub fn new(dimension: usize) -> Result<Self, VectorIndexError> {
        if dimension == 0 {
            return Err(VectorIndexError::InvalidDimension(dimension));
        }

        Ok(Self {
            dimension,
            data: Vec::new(),
        })
    }

    /// Create an empty index with room for `capacity` vectors
    pub fn with_capacity(dimension: usize, capacity: usize) -> Result<Self, VectorIndexError> {
        let mut index = Self::new(dimension)?;
        index.data.reserve(capacity.saturating_mul(dimension));
        Ok(index)
    }

    /// Append a vector and return its identity
    pub fn add(&mut self, vector: &[f32]) -> Result<VectorId, VectorIndexError> {
        self.validate(vector)?;

        let id = self.len();
        self.data.extend_from_slice(vector);
        Ok(id)
    }

    /// Append several vectors, all or nothing
    ///
    /// Every vector is checked before any is stored; the returned range holds
    /// the identities assigned, in input order.
    pub fn add_batch(&mut self, vectors: &[Vec<f32>]) -> Result<Range<VectorId>, VectorIndexError> {
        for vector in vectors {
            self.validate(vector)?;
        }

        let start = self.len();
        self.data.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        Ok(start..self.len())
    }

    /// Search for the `k` nearest neighbors of `query`
    ///
    /// Returns `min(k, len)` hits sorted by ascending distance; equal distances
    /// are ordered by ascending identity.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>, VectorIndexError> {
        self.validate(query)?;
        if k == 0 {
            return Err(VectorIndexError::InvalidArgument(
                "k must be greater than 0".to_string(),
            ));
        }

        let mut hits: Vec<SearchResult> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(id, stored)| SearchResult {
                id: id as VectorId,
                distance: squared_l2(query, stored),
            })
            .collect();

        let take = k.min(hits.len());
        if take == 0 {
            return Ok(hits);
        }
        if take < hits.len() {
            hits.select_nth_unstable_by(take - 1, rank);
            hits.truncate(take);
        }
        hits.sort_unstable_by(rank);

        Ok(hits)
    }

    /// Stored vector for `id`, if it exists
    pub fn get(&self, id: VectorId) -> Option<&[f32]> {
        let start = usize::try_from(id).ok()?.checked_mul(self.dimension)?;
        let end = start.checked_add(self.dimension)?;
        self.data.get(start..end)
    }

    /// Get the number of vectors in the index
    pub fn len(&self) -> u64 {
        (self.data.len() / self.dimension) as u64
    }

    /// Check if index is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get vector dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn to_snapshot(&self) -> IndexSnapshot {
        IndexSnapshot {
            dimension: self.dimension,
            entries: self
                .data
                .chunks_exact(self.dimension)
                .enumerate()
                .map(|(id, vector)| IndexEntry {
                    id: id as VectorId,
                    vector: vector.to_vec(),
                })
                .collect(),
        }
    }

    /// Rebuild an index from a snapshot
    ///
    /// Entries must carry identities `0..N` in order, each with `dimension` values.
    pub fn from_snapshot(snapshot: IndexSnapshot) -> Result<Self, VectorIndexError> {
        let mut index = Self::with_capacity(snapshot.dimension, snapshot.entries.len())?;

        for (position, entry) in snapshot.entries.iter().enumerate() {
            if entry.id != position as VectorId {
                return Err(VectorIndexError::SerializationError(format!(
                    "entry {} has identity {}, identities must be dense and ordered",
                    position, entry.id
                )));
            }
            index.add(&entry.vector)?;
        }

        Ok(index)
    }

    /// Write the index to `path` as JSON
    pub fn save(&self, path: &Path) -> Result<(), VectorIndexError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, &self.to_snapshot())
            .map_err(|e| VectorIndexError::SerializationError(e.to_string()))
    }

    /// Load an index written by [`VectorIndex::save`]
    pub fn load(path: &Path) -> Result<Self, VectorIndexError> {
        let reader = BufReader::new(File::open(path)?);
        let snapshot: IndexSnapshot = serde_json::from_reader(reader)
            .map_err(|e| VectorIndexError::SerializationError(e.to_string()))?;
        Self::from_snapshot(snapshot)
    }

    fn validate(&self, vector: &[f32]) -> Result<(), VectorIndexError> {
        if vector.len() != self.dimension {
            return Err(VectorIndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(VectorIndexError::InvalidArgument(
                "vector contains NaN or infinite values".to_string(),
            ));
        }
        Ok(())
    }
}

/// Sum of squared per-dimension differences
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

fn rank(a: &SearchResult, b: &SearchResult) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| a.id.cmp(&b.id))
}
