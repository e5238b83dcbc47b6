//! Multi-table locality-sensitive hashing index.
//!
//! The engine keeps `num_tables` independent hash tables. Each table owns a
//! [`RandomHyperplanes`] family sampled once at construction and maps bucket
//! keys to the records that hashed there. A query only inspects the union of
//! its own buckets, so search cost depends on bucket occupancy rather than on
//! the number of stored records.
//!
//! # Recall
//! Neighbors whose key differs from the query's key in every table are never
//! seen. More tables raise recall; more hash bits shrink buckets.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::LshConfig;
use crate::error::{VectorError, VectorResult};
use crate::vector::persistence;
use crate::vector::projection::RandomHyperplanes;
use crate::vector::types::{BucketKey, RecordId, VectorDimension, cosine_similarity};

/// One hash table: a hash family plus its buckets.
#[derive(Debug, Clone)]
pub(crate) struct HashTable {
    pub(crate) family: RandomHyperplanes,
    pub(crate) buckets: HashMap<BucketKey, Vec<RecordId>>,
}

impl HashTable {
    fn new(family: RandomHyperplanes) -> Self {
        Self {
            family,
            buckets: HashMap::new(),
        }
    }

    fn bucket(&self, vector: &[f32]) -> &[RecordId] {
        self.buckets
            .get(&self.family.hash(vector))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// A stored vector and its caller-defined payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<M> {
    pub vector: Vec<f32>,
    pub metadata: M,
}

/// A search hit borrowed from the index.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor<'a, M> {
    /// Cosine similarity to the query, higher is closer
    pub score: f32,
    pub id: RecordId,
    pub metadata: &'a M,
}

/// Bucket occupancy figures for an index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexStats {
    pub records: usize,
    pub tables: usize,
    /// Non-empty buckets summed over all tables
    pub buckets: usize,
    pub max_bucket_size: usize,
    pub mean_bucket_size: f32,
}

/// Multi-table random-hyperplane LSH index.
///
/// `M` is an opaque metadata payload returned verbatim on match. It only
/// needs `Serialize`/`DeserializeOwned` for [`save`](Self::save) and
/// [`load`](Self::load).
#[derive(Debug, Clone)]
pub struct LshIndex<M = serde_json::Value> {
    dimension: VectorDimension,
    num_tables: usize,
    hash_size: usize,
    seed: u64,
    pub(crate) tables: Vec<HashTable>,
    pub(crate) records: Vec<Record<M>>,
}

impl<M> LshIndex<M> {
    /// Creates an empty index with the default table settings and a fresh seed.
    pub fn new(dimension: usize) -> VectorResult<Self> {
        Self::with_config(dimension, &LshConfig::default())
    }

    /// Creates an empty index.
    ///
    /// When `config.seed` is unset a random seed is drawn; the seed actually
    /// used is available from [`seed`](Self::seed) and stored on save.
    pub fn with_config(dimension: usize, config: &LshConfig) -> VectorResult<Self> {
        let dimension = VectorDimension::new(dimension)?;
        config.validate()?;

        let seed = config.seed.unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(seed);
        let tables = (0..config.num_tables)
            .map(|_| {
                let family = RandomHyperplanes::sample(&mut rng, dimension.get(), config.hash_size);
                HashTable::new(family)
            })
            .collect();

        tracing::debug!(
            "created LSH index: dimension={}, tables={}, hash_size={}, seed={seed}",
            dimension.get(),
            config.num_tables,
            config.hash_size
        );

        Ok(Self {
            dimension,
            num_tables: config.num_tables,
            hash_size: config.hash_size,
            seed,
            tables,
            records: Vec::new(),
        })
    }

    /// Reassembles an index from decoded parts. Used by the loader after it
    /// has checked every table and record against the header.
    pub(crate) fn from_parts(
        dimension: VectorDimension,
        hash_size: usize,
        seed: u64,
        tables: Vec<HashTable>,
        records: Vec<Record<M>>,
    ) -> Self {
        Self {
            dimension,
            num_tables: tables.len(),
            hash_size,
            seed,
            tables,
            records,
        }
    }

    /// Inserts a vector and returns its record id.
    ///
    /// Cost is `num_tables * hash_size * dimension`, independent of how many
    /// records are already stored.
    pub fn add(&mut self, vector: Vec<f32>, metadata: M) -> VectorResult<RecordId> {
        self.dimension.validate_vector(&vector)?;

        let id = next_id(self.records.len())?;

        for table in &mut self.tables {
            let key = table.family.hash(&vector);
            table.buckets.entry(key).or_default().push(id);
        }
        self.records.push(Record { vector, metadata });

        Ok(id)
    }

    /// Returns up to `k` records from the query's buckets, most similar first.
    ///
    /// Ties are broken by record id. An empty index or `k == 0` yields an
    /// empty list.
    pub fn search(&self, query: &[f32], k: usize) -> VectorResult<Vec<Neighbor<'_, M>>> {
        self.dimension.validate_vector(query)?;

        if k == 0 || self.records.is_empty() {
            return Ok(Vec::new());
        }

        let candidates = self.candidates(query);
        let mut hits: Vec<Neighbor<'_, M>> = candidates
            .into_iter()
            .map(|id| {
                let record = &self.records[id.as_index()];
                Neighbor {
                    score: cosine_similarity(query, &record.vector),
                    id,
                    metadata: &record.metadata,
                }
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));
        hits.truncate(k);

        Ok(hits)
    }

    /// Union of the query's buckets across all tables, in id order.
    pub(crate) fn candidates(&self, query: &[f32]) -> BTreeSet<RecordId> {
        self.tables
            .iter()
            .flat_map(|table| table.bucket(query).iter().copied())
            .collect()
    }

    /// Looks up a stored record.
    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<&Record<M>> {
        self.records.get(id.as_index())
    }

    /// Bucket key of `vector` in every table, as bit strings.
    pub fn bucket_keys(&self, vector: &[f32]) -> VectorResult<Vec<String>> {
        self.dimension.validate_vector(vector)?;
        Ok(self
            .tables
            .iter()
            .map(|table| table.family.hash(vector).to_bit_string(self.hash_size))
            .collect())
    }

    /// Drops all records, keeping the hash families.
    pub fn clear(&mut self) {
        for table in &mut self.tables {
            table.buckets.clear();
        }
        self.records.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    #[must_use]
    pub fn num_tables(&self) -> usize {
        self.num_tables
    }

    #[must_use]
    pub fn hash_size(&self) -> usize {
        self.hash_size
    }

    /// Seed the hash families were sampled from.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The configuration that reproduces this index's hash families.
    #[must_use]
    pub fn config(&self) -> LshConfig {
        LshConfig::seeded(self.num_tables, self.hash_size, self.seed)
    }

    /// Bucket occupancy summary.
    #[must_use]
    pub fn stats(&self) -> IndexStats {
        let sizes = self
            .tables
            .iter()
            .flat_map(|table| table.buckets.values().map(Vec::len));
        let (buckets, total, max) = sizes.fold((0, 0, 0), |(n, sum, max), len| {
            (n + 1, sum + len, max.max(len))
        });

        IndexStats {
            records: self.records.len(),
            tables: self.tables.len(),
            buckets,
            max_bucket_size: max,
            mean_bucket_size: if buckets == 0 {
                0.0
            } else {
                total as f32 / buckets as f32
            },
        }
    }
}

impl<M: Sync> LshIndex<M> {
    /// Answers several queries in parallel. Fails on the first query with a
    /// wrong dimension.
    pub fn search_batch(
        &self,
        queries: &[Vec<f32>],
        k: usize,
    ) -> VectorResult<Vec<Vec<Neighbor<'_, M>>>> {
        queries
            .par_iter()
            .map(|query| self.search(query, k))
            .collect()
    }
}

impl<M: Serialize + DeserializeOwned> LshIndex<M> {
    /// Writes the full index state to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> VectorResult<()> {
        persistence::save(self, path.as_ref())
    }

    /// Reads an index written by [`save`](Self::save).
    pub fn load(path: impl AsRef<Path>) -> VectorResult<Self> {
        persistence::load(path.as_ref())
    }

    /// Reads an index and checks it was built with `dimension` and the
    /// table settings of `config`. A seed in `config` must match too.
    pub fn load_compatible(
        path: impl AsRef<Path>,
        dimension: usize,
        config: &LshConfig,
    ) -> VectorResult<Self> {
        let index = Self::load(path)?;

        let found = index.config();
        let seed_matches = config.seed.is_none_or(|seed| seed == index.seed);
        if index.dimension.get() != dimension
            || found.num_tables != config.num_tables
            || found.hash_size != config.hash_size
            || !seed_matches
        {
            tracing::warn!(
                "rejected index: dimension={}, tables={}, hash_size={}",
                index.dimension.get(),
                found.num_tables,
                found.hash_size
            );
            return Err(VectorError::IncompatibleIndex {
                expected: describe(dimension, config),
                found: describe(index.dimension.get(), &found),
            });
        }

        Ok(index)
    }

    /// Encodes the full index state in the on-disk format.
    pub fn to_bytes(&self) -> VectorResult<Vec<u8>> {
        persistence::encode(self)
    }

    /// Decodes an index from [`to_bytes`](Self::to_bytes) output.
    pub fn from_bytes(bytes: &[u8]) -> VectorResult<Self> {
        persistence::decode(bytes)
    }
}

/// Id for the record stored after `len` others.
fn next_id(len: usize) -> VectorResult<RecordId> {
    u32::try_from(len)
        .map(RecordId::new)
        .map_err(|_| VectorError::IndexFull { capacity: len })
}

fn describe(dimension: usize, config: &LshConfig) -> String {
    format!(
        "dimension={dimension}, num_tables={}, hash_size={}",
        config.num_tables, config.hash_size
    )
}
