//! Approximate vector search with pluggable backends.
//!
//! [`LshIndex`] is a multi-table locality-sensitive hashing engine.
//! [`VectorSearchAdapter`] selects the best compiled backend and gives all of
//! them the same interface.

pub mod config;
pub mod error;
pub mod logging;
pub mod vector;

// Explicit exports for better API clarity
pub use config::{LshConfig, Settings, TreeConfig};
pub use error::{VectorError, VectorResult};
pub use vector::{
    BackendKind, LshIndex, Neighbor, ScoreKind, SharedAdapter, VectorSearchAdapter,
};
