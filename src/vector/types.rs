//! Type-safe wrappers and shared kernels for vector search.
//!
//! Newtypes keep record identifiers, bucket keys and dimensions from being
//! mixed up with plain integers, and the distance kernels here are the single
//! definition every backend scores with.

use crate::error::{VectorError, VectorResult};

/// Epsilon below which a vector norm is treated as zero.
const EPSILON: f32 = 1e-10;

/// Identifier of a record in an [`LshIndex`](crate::vector::LshIndex).
///
/// Identifiers are dense positions in the record store, assigned in
/// insertion order starting at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(u32);

impl RecordId {
    /// Creates a new `RecordId`.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the underlying u32 value.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Returns the id as a position in the record store.
    #[must_use]
    pub const fn as_index(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bucket key of a vector under one table's hash family.
///
/// Bit `i` is set when the vector lies on the positive side of hyperplane `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketKey(u64);

impl BucketKey {
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(&self) -> u64 {
        self.0
    }

    /// Renders the key as a bit string, most significant hyperplane last.
    #[must_use]
    pub fn to_bit_string(&self, width: usize) -> String {
        (0..width)
            .map(|i| if self.0 >> i & 1 == 1 { '1' } else { '0' })
            .collect()
    }
}

/// Type-safe wrapper for vector dimensions.
///
/// Ensures runtime validation of vector dimensions to prevent
/// dimension mismatches during operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorDimension(usize);

impl VectorDimension {
    /// Creates a new `VectorDimension` with validation.
    ///
    /// Returns an error if the dimension is zero.
    pub fn new(dim: usize) -> VectorResult<Self> {
        if dim == 0 {
            return Err(VectorError::InvalidDimension {
                dimension: 0,
                reason: "Vector dimension cannot be zero",
            });
        }
        Ok(Self(dim))
    }

    /// Returns the underlying dimension value.
    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }

    /// Validates that a vector has the expected dimension.
    pub fn validate_vector(&self, vector: &[f32]) -> VectorResult<()> {
        if vector.len() != self.0 {
            return Err(VectorError::DimensionMismatch {
                expected: self.0,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

/// How a backend's scores are to be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreKind {
    /// Smaller is better; results are sorted ascending.
    Distance,
    /// Larger is better; results are sorted descending.
    Similarity,
}

impl ScoreKind {
    /// Whether score `a` ranks strictly ahead of score `b`.
    #[must_use]
    pub fn is_better(&self, a: f32, b: f32) -> bool {
        match self {
            Self::Distance => a < b,
            Self::Similarity => a > b,
        }
    }
}

#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[inline]
pub fn norm(a: &[f32]) -> f32 {
    dot(a, a).sqrt()
}

/// Cosine similarity in `[-1, 1]`; zero when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let denom = norm(a) * norm(b);
    if denom < EPSILON {
        return 0.0;
    }
    (dot(a, b) / denom).clamp(-1.0, 1.0)
}

/// Euclidean (L2) distance.
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Angular distance `sqrt(2 - 2 cos)`: the L2 distance between the
/// normalized vectors, in `[0, 2]`.
pub fn angular_distance(a: &[f32], b: &[f32]) -> f32 {
    (2.0 - 2.0 * cosine_similarity(a, b)).max(0.0).sqrt()
}
