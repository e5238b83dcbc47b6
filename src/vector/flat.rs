//! Exact flat index over contiguous vector storage.
//!
//! Every query scans all stored vectors and ranks them by Euclidean distance.
//! The index stores positions only; callers keep their own payloads aligned
//! with insertion order.

use crate::error::VectorResult;
use crate::vector::types::{VectorDimension, l2_distance};

/// Brute-force L2 index.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: VectorDimension,
    /// Row-major vector data, `len * dimension` values
    vectors: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dimension: VectorDimension) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
        }
    }

    /// Appends a vector and returns its position.
    pub fn add(&mut self, vector: &[f32]) -> VectorResult<usize> {
        self.dimension.validate_vector(vector)?;
        let position = self.len();
        self.vectors.extend_from_slice(vector);
        Ok(position)
    }

    /// Returns `(position, distance)` pairs for the `k` closest vectors,
    /// nearest first, ties broken by position.
    pub fn search(&self, query: &[f32], k: usize) -> VectorResult<Vec<(usize, f32)>> {
        self.dimension.validate_vector(query)?;

        let mut hits: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dimension.get())
            .enumerate()
            .map(|(position, vector)| (position, l2_distance(query, vector)))
            .collect();

        if k < hits.len() {
            hits.select_nth_unstable_by(k, |a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
            hits.truncate(k);
        }
        hits.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

        Ok(hits)
    }

    /// Drops every stored vector, keeping the dimension.
    pub fn clear(&mut self) {
        self.vectors.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len() / self.dimension.get()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }
}
