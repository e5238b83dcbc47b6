//! Thread-safe handle over a [`VectorSearchAdapter`].

use std::sync::Arc;

use crate::error::VectorResult;
use crate::vector::adapter::{BackendKind, VectorSearchAdapter};

/// Cloneable adapter handle guarded by a reader-writer lock.
///
/// Searches share the lock unless the tree backend needs a rebuild, in which
/// case the first searcher takes it exclusively.
pub struct SharedAdapter<M = serde_json::Value> {
    inner: Arc<parking_lot::RwLock<VectorSearchAdapter<M>>>,
}

impl<M> SharedAdapter<M> {
    pub fn new(adapter: VectorSearchAdapter<M>) -> Self {
        Self {
            inner: Arc::new(parking_lot::RwLock::new(adapter)),
        }
    }

    /// Inserts with exclusive access.
    pub fn add(&self, vector: Vec<f32>, metadata: M) -> VectorResult<()> {
        self.inner.write().add(vector, metadata)
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    #[must_use]
    pub fn backend(&self) -> BackendKind {
        self.inner.read().backend()
    }
}

impl<M: Clone> SharedAdapter<M> {
    pub fn search(&self, query: &[f32], k: usize) -> VectorResult<Vec<(f32, M)>> {
        {
            let adapter = self.inner.read();
            if adapter.is_built() {
                return adapter.search_built(query, k);
            }
        }
        self.inner.write().search(query, k)
    }
}

impl<M> Clone for SharedAdapter<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M> std::fmt::Debug for SharedAdapter<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner.try_read() {
            Some(adapter) => write!(f, "SharedAdapter {{ adapter: {adapter:?} }}"),
            None => write!(f, "SharedAdapter {{ <locked> }}"),
        }
    }
}
