//! Random-hyperplane hash family for angular LSH.
//!
//! Each table owns `hash_size` unit-length hyperplanes drawn from a Gaussian
//! distribution. A vector's bucket key has one bit per hyperplane, set when
//! the vector lies on the hyperplane's positive side, so two vectors collide
//! on a bit with probability `1 - angle / pi`.

use rand::Rng;

use crate::vector::types::{BucketKey, dot, norm};

/// Smallest accepted uniform sample, keeps `ln` finite in Box-Muller.
const MIN_UNIFORM: f32 = 1e-12;

/// Hyperplanes for one hash table, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomHyperplanes {
    dimension: usize,
    hash_size: usize,
    planes: Vec<f32>,
}

impl RandomHyperplanes {
    /// Samples `hash_size` unit-length Gaussian hyperplanes.
    pub fn sample<R: Rng>(rng: &mut R, dimension: usize, hash_size: usize) -> Self {
        let mut planes = Vec::with_capacity(dimension * hash_size);

        for _ in 0..hash_size {
            let mut plane: Vec<f32> = (0..dimension).map(|_| gaussian(rng)).collect();
            let len = norm(&plane);
            if len > 0.0 {
                plane.iter_mut().for_each(|x| *x /= len);
            }
            planes.extend_from_slice(&plane);
        }

        Self {
            dimension,
            hash_size,
            planes,
        }
    }

    /// Rebuilds a family from its raw row-major planes.
    ///
    /// Returns `None` when `planes` does not hold `hash_size` rows of
    /// `dimension` values.
    pub fn from_raw(dimension: usize, hash_size: usize, planes: Vec<f32>) -> Option<Self> {
        (planes.len() == dimension * hash_size).then_some(Self {
            dimension,
            hash_size,
            planes,
        })
    }

    /// Computes the bucket key of `vector`.
    ///
    /// The caller validates the vector's dimension.
    pub fn hash(&self, vector: &[f32]) -> BucketKey {
        let bits = self
            .planes
            .chunks_exact(self.dimension)
            .enumerate()
            .fold(0u64, |acc, (i, plane)| {
                if dot(plane, vector) > 0.0 {
                    acc | (1 << i)
                } else {
                    acc
                }
            });
        BucketKey::from_bits(bits)
    }

    #[must_use]
    pub fn hash_size(&self) -> usize {
        self.hash_size
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Row-major plane coefficients, for persistence.
    #[must_use]
    pub fn as_raw(&self) -> &[f32] {
        &self.planes
    }
}

/// Standard normal sample via the Box-Muller transform.
fn gaussian<R: Rng>(rng: &mut R) -> f32 {
    let u1: f32 = rng.random::<f32>().max(MIN_UNIFORM);
    let u2: f32 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos()
}
