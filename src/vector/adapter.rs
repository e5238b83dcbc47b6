//! One search interface over every compiled backend.
//!
//! [`VectorSearchAdapter`] owns exactly one backend, picked at construction:
//!
//! | backend | cargo feature | score | best first |
//! |---|---|---|---|
//! | [`FlatIndex`] | `flat` | L2 distance | ascending |
//! | [`RpForest`] | `tree` | angular distance | ascending |
//! | [`LshIndex`] | always on | cosine similarity | descending |
//!
//! Scores are reported as each backend computes them; use
//! [`VectorSearchAdapter::score_kind`] to interpret them. The flat and tree
//! backends only store vectors, so the adapter keeps their metadata in a side
//! list indexed by insertion position.
//!
//! Dimension checks are left to the active backend.

use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;

use crate::config::{LshConfig, Settings, TreeConfig};
use crate::error::{VectorError, VectorResult};
#[cfg(feature = "flat")]
use crate::vector::flat::FlatIndex;
use crate::vector::lsh::LshIndex;
#[cfg(feature = "tree")]
use crate::vector::tree::{BuildState, RpForest};
#[cfg(any(feature = "flat", feature = "tree"))]
use crate::vector::types::VectorDimension;
use crate::vector::types::ScoreKind;

/// Backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Best compiled backend: flat, then tree, then LSH
    Auto,
    Flat,
    Tree,
    Lsh,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Flat => "flat",
            Self::Tree => "tree",
            Self::Lsh => "lsh",
        }
    }

    /// Cargo feature a backend needs, `None` for always-present ones.
    pub fn feature(&self) -> Option<&'static str> {
        match self {
            Self::Flat => Some("flat"),
            Self::Tree => Some("tree"),
            Self::Auto | Self::Lsh => None,
        }
    }

    /// Whether this backend was compiled in.
    pub fn is_available(&self) -> bool {
        match self {
            Self::Flat => cfg!(feature = "flat"),
            Self::Tree => cfg!(feature = "tree"),
            Self::Auto | Self::Lsh => true,
        }
    }

    /// Concrete backends compiled into this build, in preference order.
    pub fn available() -> Vec<BackendKind> {
        [Self::Flat, Self::Tree, Self::Lsh]
            .into_iter()
            .filter(Self::is_available)
            .collect()
    }

    /// Picks the first available backend in preference order.
    fn auto() -> Self {
        for kind in [Self::Flat, Self::Tree] {
            if kind.is_available() {
                return kind;
            }
            tracing::debug!("{kind} backend not compiled in, trying next");
        }
        Self::Lsh
    }

    fn unavailable(&self) -> VectorError {
        VectorError::BackendUnavailable {
            backend: self.as_str(),
            feature: self.feature().unwrap_or("default"),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = VectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "flat" | "faiss" => Ok(Self::Flat),
            "tree" | "annoy" => Ok(Self::Tree),
            "lsh" | "o1" => Ok(Self::Lsh),
            _ => Err(VectorError::UnknownBackend {
                name: s.to_string(),
            }),
        }
    }
}

enum Backend<M> {
    #[cfg(feature = "flat")]
    Flat { index: FlatIndex, metadata: Vec<M> },
    #[cfg(feature = "tree")]
    Tree { forest: RpForest, metadata: Vec<M> },
    Lsh(LshIndex<M>),
}

impl<M> Backend<M> {
    fn kind(&self) -> BackendKind {
        match self {
            #[cfg(feature = "flat")]
            Self::Flat { .. } => BackendKind::Flat,
            #[cfg(feature = "tree")]
            Self::Tree { .. } => BackendKind::Tree,
            Self::Lsh(_) => BackendKind::Lsh,
        }
    }
}

/// Uniform `add`/`search`/`clear`/`len` over one selected backend.
pub struct VectorSearchAdapter<M = serde_json::Value> {
    backend: Backend<M>,
}

impl<M> VectorSearchAdapter<M> {
    /// Creates an adapter from a backend name with default backend settings.
    ///
    /// Names are case-insensitive: `"auto"`, `"flat"` (or `"faiss"`),
    /// `"tree"` (or `"annoy"`), `"lsh"` (or `"o1"`). Only `"auto"` falls back
    /// silently; naming a backend that is not compiled in is an error.
    pub fn new(dimension: usize, backend: &str) -> VectorResult<Self> {
        Self::with_backend(
            dimension,
            backend.parse()?,
            &LshConfig::default(),
            &TreeConfig::default(),
        )
    }

    /// Creates an adapter from the `[index]`, `[lsh]` and `[tree]` settings.
    pub fn from_settings(settings: &Settings) -> VectorResult<Self> {
        settings.validate()?;
        Self::with_backend(
            settings.index.dimension,
            settings.index.backend.parse()?,
            &settings.lsh,
            &settings.tree,
        )
    }

    #[cfg_attr(not(feature = "tree"), allow(unused_variables))]
    pub fn with_backend(
        dimension: usize,
        kind: BackendKind,
        lsh: &LshConfig,
        tree: &TreeConfig,
    ) -> VectorResult<Self> {
        let resolved = match kind {
            BackendKind::Auto => BackendKind::auto(),
            explicit => explicit,
        };

        let backend = match resolved {
            #[cfg(feature = "flat")]
            BackendKind::Flat => Backend::Flat {
                index: FlatIndex::new(VectorDimension::new(dimension)?),
                metadata: Vec::new(),
            },
            #[cfg(feature = "tree")]
            BackendKind::Tree => Backend::Tree {
                forest: RpForest::new(VectorDimension::new(dimension)?, tree)?,
                metadata: Vec::new(),
            },
            BackendKind::Lsh => Backend::Lsh(LshIndex::with_config(dimension, lsh)?),
            #[allow(unreachable_patterns)]
            missing => return Err(missing.unavailable()),
        };

        tracing::info!(
            "vector search backend: {resolved} (requested {kind}, dimension {dimension})"
        );

        Ok(Self { backend })
    }

    /// Inserts a vector and its metadata.
    pub fn add(&mut self, vector: Vec<f32>, metadata: M) -> VectorResult<()> {
        match &mut self.backend {
            #[cfg(feature = "flat")]
            Backend::Flat {
                index,
                metadata: side,
            } => {
                let position = index.add(&vector)?;
                debug_assert_eq!(position, side.len());
                side.push(metadata);
            }
            #[cfg(feature = "tree")]
            Backend::Tree {
                forest,
                metadata: side,
            } => {
                let position = forest.add(&vector)?;
                debug_assert_eq!(position, side.len());
                side.push(metadata);
            }
            Backend::Lsh(index) => {
                index.add(vector, metadata)?;
            }
        }
        Ok(())
    }

    /// Rebuilds the tree backend if it has pending insertions.
    pub fn build(&mut self) {
        #[cfg(feature = "tree")]
        if let Backend::Tree { forest, .. } = &mut self.backend {
            forest.build();
        }
    }

    /// Whether searches can run without a rebuild.
    pub fn is_built(&self) -> bool {
        match &self.backend {
            #[cfg(feature = "tree")]
            Backend::Tree { forest, .. } => forest.state() == BuildState::Fresh,
            _ => true,
        }
    }

    /// Drops every record, keeping the same backend and its settings.
    pub fn clear(&mut self) {
        match &mut self.backend {
            #[cfg(feature = "flat")]
            Backend::Flat { index, metadata } => {
                index.clear();
                metadata.clear();
            }
            #[cfg(feature = "tree")]
            Backend::Tree { forest, metadata } => {
                forest.clear();
                metadata.clear();
            }
            Backend::Lsh(index) => index.clear(),
        }
    }

    pub fn len(&self) -> usize {
        match &self.backend {
            #[cfg(feature = "flat")]
            Backend::Flat { metadata, .. } => metadata.len(),
            #[cfg(feature = "tree")]
            Backend::Tree { metadata, .. } => metadata.len(),
            Backend::Lsh(index) => index.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The concrete backend in use, never [`BackendKind::Auto`].
    pub fn backend(&self) -> BackendKind {
        self.backend.kind()
    }

    /// How to read scores returned by [`search`](Self::search).
    pub fn score_kind(&self) -> ScoreKind {
        match self.backend.kind() {
            BackendKind::Lsh => ScoreKind::Similarity,
            _ => ScoreKind::Distance,
        }
    }

    /// The LSH engine, when that is the active backend.
    pub fn lsh_index(&self) -> Option<&LshIndex<M>> {
        match &self.backend {
            Backend::Lsh(index) => Some(index),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }
}

impl<M: Clone> VectorSearchAdapter<M> {
    /// Returns up to `k` `(score, metadata)` pairs, best first.
    ///
    /// The tree backend is rebuilt first if anything was added since the
    /// last build.
    pub fn search(&mut self, query: &[f32], k: usize) -> VectorResult<Vec<(f32, M)>> {
        #[cfg(feature = "tree")]
        if let Backend::Tree { forest, metadata } = &mut self.backend {
            // Validates the query before paying for a rebuild
            return Ok(resolve(forest.search(query, k)?, metadata));
        }
        self.search_built(query, k)
    }

    /// Searches without rebuilding. Callers check [`is_built`](Self::is_built)
    /// first.
    pub(crate) fn search_built(&self, query: &[f32], k: usize) -> VectorResult<Vec<(f32, M)>> {
        match &self.backend {
            #[cfg(feature = "flat")]
            Backend::Flat { index, metadata } => Ok(resolve(index.search(query, k)?, metadata)),
            #[cfg(feature = "tree")]
            Backend::Tree { forest, metadata } => {
                forest.dimension().validate_vector(query)?;
                Ok(resolve(forest.query(query, k), metadata))
            }
            Backend::Lsh(index) => Ok(index
                .search(query, k)?
                .into_iter()
                .map(|hit| (hit.score, hit.metadata.clone()))
                .collect()),
        }
    }
}

impl<M: Clone + Send + Sync> VectorSearchAdapter<M> {
    /// Answers several queries in parallel after a single rebuild.
    pub fn search_batch(
        &mut self,
        queries: &[Vec<f32>],
        k: usize,
    ) -> VectorResult<Vec<Vec<(f32, M)>>> {
        #[cfg(feature = "tree")]
        if let Backend::Tree { forest, .. } = &self.backend {
            for query in queries {
                forest.dimension().validate_vector(query)?;
            }
        }
        self.build();
        let adapter = &*self;
        queries
            .par_iter()
            .map(|query| adapter.search_built(query, k))
            .collect()
    }
}

impl<M> fmt::Debug for VectorSearchAdapter<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorSearchAdapter")
            .field("backend", &self.backend())
            .field("len", &self.len())
            .finish()
    }
}

/// Maps backend positions back to side-list metadata.
#[cfg(any(feature = "flat", feature = "tree"))]
fn resolve<M: Clone>(hits: Vec<(usize, f32)>, metadata: &[M]) -> Vec<(f32, M)> {
    hits.into_iter()
        .map(|(position, score)| (score, metadata[position].clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn basis(dim: usize, axis: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[axis] = 1.0;
        v
    }

    fn seeded(kind: BackendKind, dimension: usize) -> VectorSearchAdapter<Value> {
        let tree = TreeConfig {
            seed: Some(11),
            ..TreeConfig::default()
        };
        VectorSearchAdapter::with_backend(dimension, kind, &LshConfig::seeded(10, 8, 11), &tree)
            .unwrap()
    }

    #[test]
    fn test_parse_names_and_aliases() {
        assert_eq!("auto".parse::<BackendKind>().unwrap(), BackendKind::Auto);
        assert_eq!("FAISS".parse::<BackendKind>().unwrap(), BackendKind::Flat);
        assert_eq!("annoy".parse::<BackendKind>().unwrap(), BackendKind::Tree);
        assert_eq!(" Lsh ".parse::<BackendKind>().unwrap(), BackendKind::Lsh);
        assert_eq!("o1".parse::<BackendKind>().unwrap(), BackendKind::Lsh);

        let err = "hnsw".parse::<BackendKind>().unwrap_err();
        assert_eq!(err.status_code(), "UNKNOWN_BACKEND");
        assert!(VectorSearchAdapter::<Value>::new(4, "hnsw").is_err());
    }

    #[test]
    fn test_auto_prefers_first_available() {
        let adapter = VectorSearchAdapter::<Value>::new(4, "auto").unwrap();
        assert_eq!(adapter.backend(), BackendKind::available()[0]);
        assert_ne!(adapter.backend(), BackendKind::Auto);
    }

    #[cfg(all(feature = "flat", feature = "tree"))]
    #[test]
    fn test_auto_is_flat_with_default_features() {
        let adapter = VectorSearchAdapter::<Value>::new(4, "auto").unwrap();
        assert_eq!(adapter.backend(), BackendKind::Flat);
        assert_eq!(adapter.score_kind(), ScoreKind::Distance);
    }

    #[cfg(not(feature = "tree"))]
    #[test]
    fn test_missing_backend_is_explicit_error() {
        let err = VectorSearchAdapter::<Value>::new(4, "tree").unwrap_err();
        assert_eq!(err.status_code(), "BACKEND_UNAVAILABLE");
    }

    #[test]
    fn test_lsh_is_always_available() {
        let adapter = VectorSearchAdapter::<Value>::new(4, "lsh").unwrap();
        assert_eq!(adapter.backend(), BackendKind::Lsh);
        assert_eq!(adapter.score_kind(), ScoreKind::Similarity);
        assert!(adapter.lsh_index().is_some());
        assert!(BackendKind::available().contains(&BackendKind::Lsh));
    }

    #[test]
    fn test_basis_vectors_every_backend() {
        for kind in BackendKind::available() {
            let mut adapter = seeded(kind, 5);
            for i in 0..3 {
                adapter.add(basis(5, i), json!({ "id": i + 1 })).unwrap();
            }
            assert_eq!(adapter.len(), 3);

            let hits = adapter.search(&basis(5, 0), 1).unwrap();
            assert_eq!(hits.len(), 1, "backend {kind}");
            assert_eq!(hits[0].1["id"], 1, "backend {kind}");

            let perfect = match adapter.score_kind() {
                ScoreKind::Similarity => 1.0,
                ScoreKind::Distance => 0.0,
            };
            assert!((hits[0].0 - perfect).abs() < 1e-5, "backend {kind}");
        }
    }

    #[test]
    fn test_dimension_mismatch_every_backend() {
        for kind in BackendKind::available() {
            let mut adapter = seeded(kind, 4);
            adapter.add(vec![1.0, 0.0, 0.0, 0.0], json!("a")).unwrap();

            let err = adapter.add(vec![1.0, 0.0], json!("b")).unwrap_err();
            assert_eq!(err.status_code(), "DIMENSION_MISMATCH", "backend {kind}");
            assert_eq!(adapter.len(), 1, "backend {kind}");

            let err = adapter.search(&[1.0; 5], 1).unwrap_err();
            assert_eq!(err.status_code(), "DIMENSION_MISMATCH", "backend {kind}");
        }
    }

    #[test]
    fn test_clear_keeps_backend() {
        for kind in BackendKind::available() {
            let mut adapter = seeded(kind, 3);
            adapter.add(vec![1.0, 2.0, 3.0], json!(1)).unwrap();
            adapter.clear();

            assert!(adapter.is_empty());
            assert_eq!(adapter.backend(), kind);
            assert!(adapter.search(&[1.0, 2.0, 3.0], 5).unwrap().is_empty());

            adapter.add(vec![3.0, 2.0, 1.0], json!(2)).unwrap();
            let hits = adapter.search(&[3.0, 2.0, 1.0], 5).unwrap();
            assert_eq!(hits.len(), 1);
            assert_eq!(hits[0].1, json!(2));
        }
    }

    #[cfg(feature = "tree")]
    #[test]
    fn test_tree_rebuilds_after_add() {
        let mut adapter = seeded(BackendKind::Tree, 3);
        adapter.add(vec![1.0, 0.0, 0.0], json!("x")).unwrap();
        assert!(!adapter.is_built());

        adapter.search(&[1.0, 0.0, 0.0], 1).unwrap();
        assert!(adapter.is_built());

        adapter.add(vec![0.0, 1.0, 0.0], json!("y")).unwrap();
        assert!(!adapter.is_built());
        let hits = adapter.search(&[0.0, 1.0, 0.0], 1).unwrap();
        assert_eq!(hits[0].1, json!("y"));
    }

    #[cfg(feature = "tree")]
    #[test]
    fn test_tree_rejects_bad_query_before_rebuild() {
        let mut adapter = seeded(BackendKind::Tree, 3);
        adapter.add(vec![1.0, 0.0, 0.0], json!("x")).unwrap();

        let err = adapter.search(&[1.0, 0.0], 1).unwrap_err();
        assert_eq!(err.status_code(), "DIMENSION_MISMATCH");
        assert!(!adapter.is_built());

        let queries = vec![vec![1.0, 0.0, 0.0], vec![1.0]];
        assert!(adapter.search_batch(&queries, 1).is_err());
        assert!(!adapter.is_built());
    }

    #[test]
    fn test_results_best_first() {
        for kind in BackendKind::available() {
            let mut adapter = seeded(kind, 2);
            for i in 0..20 {
                let angle = i as f32 * 0.05;
                adapter.add(vec![angle.cos(), angle.sin()], json!(i)).unwrap();
            }
            let hits = adapter.search(&[1.0, 0.0], 10).unwrap();
            assert!(!hits.is_empty());
            let score_kind = adapter.score_kind();
            for pair in hits.windows(2) {
                assert!(!score_kind.is_better(pair[1].0, pair[0].0), "backend {kind}");
            }
        }
    }

    #[test]
    fn test_search_batch_matches_search() {
        for kind in BackendKind::available() {
            let mut adapter = seeded(kind, 3);
            for i in 0..3 {
                adapter.add(basis(3, i), json!(i)).unwrap();
            }
            let queries: Vec<Vec<f32>> = (0..3).map(|i| basis(3, i)).collect();
            let batch = adapter.search_batch(&queries, 1).unwrap();
            for (i, hits) in batch.iter().enumerate() {
                assert_eq!(hits[0].1, json!(i), "backend {kind}");
            }
        }
    }

    #[test]
    fn test_from_settings() {
        let mut settings = Settings::default();
        settings.index.dimension = 8;
        settings.index.backend = "lsh".to_string();
        settings.lsh = LshConfig::seeded(4, 6, 3);

        let adapter = VectorSearchAdapter::<Value>::from_settings(&settings).unwrap();
        let index = adapter.lsh_index().unwrap();
        assert_eq!(index.num_tables(), 4);
        assert_eq!(index.hash_size(), 6);
        assert_eq!(index.seed(), 3);

        settings.lsh.hash_size = 65;
        let err = VectorSearchAdapter::<Value>::from_settings(&settings).unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_zero_dimension_rejected() {
        for kind in BackendKind::available() {
            assert!(VectorSearchAdapter::<Value>::with_backend(
                0,
                kind,
                &LshConfig::default(),
                &TreeConfig::default()
            )
            .is_err());
        }
    }
}
