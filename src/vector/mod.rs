//! Approximate nearest-neighbor search.
//!
//! # Architecture
//! The core is [`LshIndex`], a multi-table random-hyperplane LSH engine whose
//! query cost depends on bucket occupancy rather than corpus size. Two
//! optional backends sit beside it: [`FlatIndex`] (exact L2 scan, feature
//! `flat`) and [`RpForest`] (random projection forest, feature `tree`).
//! [`VectorSearchAdapter`] picks one at construction and exposes a single
//! `add`/`search`/`clear`/`len` contract over it.
//!
//! None of these types lock internally. Wrap an adapter in [`SharedAdapter`]
//! to share it across threads.

mod adapter;
mod concurrent;
#[cfg(feature = "flat")]
mod flat;
mod lsh;
mod persistence;
mod projection;
#[cfg(feature = "tree")]
mod tree;
mod types;

// Re-export core types for public API
pub use adapter::{BackendKind, VectorSearchAdapter};
pub use concurrent::SharedAdapter;
#[cfg(feature = "flat")]
pub use flat::FlatIndex;
pub use lsh::{IndexStats, LshIndex, Neighbor, Record};
pub use projection::RandomHyperplanes;
#[cfg(feature = "tree")]
pub use tree::{BuildState, RpForest};
pub use types::{
    BucketKey, RecordId, ScoreKind, VectorDimension, angular_distance, cosine_similarity,
    l2_distance,
};
