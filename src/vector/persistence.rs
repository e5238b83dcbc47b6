//! On-disk format for [`LshIndex`].
//!
//! # Storage Format
//!
//! - Header (20 bytes): magic, format version, dimension, table count,
//!   hash size; all little-endian `u32`
//! - Body: bincode-encoded seed, per-table hyperplanes and buckets (sorted
//!   by key), and records. Metadata is embedded as JSON bytes so any serde
//!   payload round-trips.
//!
//! Loading checks the body against the header and refuses anything that
//! would leave a record missing from a table or a bucket pointing past the
//! record store.

use std::collections::HashMap;
use std::path::Path;

use bincode::{Decode, Encode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::LshConfig;
use crate::error::{IoContext, VectorError, VectorResult};
use crate::vector::lsh::{HashTable, LshIndex, Record};
use crate::vector::projection::RandomHyperplanes;
use crate::vector::types::{BucketKey, RecordId, VectorDimension};

/// Current storage format version.
const FORMAT_VERSION: u32 = 1;

/// Size of the storage header in bytes.
const HEADER_SIZE: usize = 20;

/// Magic bytes to identify index files.
const MAGIC_BYTES: &[u8; 4] = b"O1LS";

/// Upper bound on memory the body decoder may claim, 1 GiB.
///
/// Length prefixes are checked against this before anything is allocated, so
/// a corrupted prefix fails as a format error instead of a huge allocation.
const MAX_BODY_BYTES: usize = 1 << 30;

#[derive(Encode, Decode)]
struct IndexBody {
    seed: u64,
    tables: Vec<TableBody>,
    records: Vec<RecordBody>,
}

#[derive(Encode, Decode)]
struct TableBody {
    planes: Vec<f32>,
    buckets: Vec<(u64, Vec<u32>)>,
}

#[derive(Encode, Decode)]
struct RecordBody {
    vector: Vec<f32>,
    metadata: Vec<u8>,
}

/// Fixed-size prefix of every index file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Header {
    version: u32,
    dimension: u32,
    num_tables: u32,
    hash_size: u32,
}

impl Header {
    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(MAGIC_BYTES);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.dimension.to_le_bytes());
        out.extend_from_slice(&self.num_tables.to_le_bytes());
        out.extend_from_slice(&self.hash_size.to_le_bytes());
    }

    fn read(bytes: &[u8]) -> VectorResult<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(invalid("file too small to contain header"));
        }

        // Check magic bytes
        if &bytes[0..4] != MAGIC_BYTES {
            return Err(invalid("missing O1LS magic bytes"));
        }

        let field = |at: usize| {
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };

        Ok(Self {
            version: field(4),
            dimension: field(8),
            num_tables: field(12),
            hash_size: field(16),
        })
    }
}

fn body_config() -> impl bincode::config::Config {
    bincode::config::standard().with_limit::<MAX_BODY_BYTES>()
}

fn invalid(reason: impl Into<String>) -> VectorError {
    VectorError::InvalidFormat {
        reason: reason.into(),
    }
}

fn to_u32(value: usize, what: &str) -> VectorResult<u32> {
    u32::try_from(value).map_err(|_| invalid(format!("{what} {value} does not fit the header")))
}

/// Encodes the full index state.
pub(crate) fn encode<M: Serialize>(index: &LshIndex<M>) -> VectorResult<Vec<u8>> {
    let header = Header {
        version: FORMAT_VERSION,
        dimension: to_u32(index.dimension().get(), "dimension")?,
        num_tables: to_u32(index.num_tables(), "table count")?,
        hash_size: to_u32(index.hash_size(), "hash size")?,
    };

    let tables = index
        .tables
        .iter()
        .map(|table| {
            let mut buckets: Vec<(u64, Vec<u32>)> = table
                .buckets
                .iter()
                .map(|(key, ids)| (key.bits(), ids.iter().map(RecordId::get).collect()))
                .collect();
            buckets.sort_unstable_by_key(|(key, _)| *key);
            TableBody {
                planes: table.family.as_raw().to_vec(),
                buckets,
            }
        })
        .collect();

    let records = index
        .records
        .iter()
        .map(|record| {
            Ok(RecordBody {
                vector: record.vector.clone(),
                metadata: serde_json::to_vec(&record.metadata)
                    .map_err(|e| VectorError::Serialization(e.to_string()))?,
            })
        })
        .collect::<VectorResult<Vec<_>>>()?;

    let body = IndexBody {
        seed: index.seed(),
        tables,
        records,
    };

    let mut out = Vec::with_capacity(HEADER_SIZE);
    header.write(&mut out);
    let encoded = bincode::encode_to_vec(body, body_config())
        .map_err(|e| VectorError::Serialization(e.to_string()))?;
    out.extend_from_slice(&encoded);

    Ok(out)
}

/// Decodes and validates an index.
pub(crate) fn decode<M: DeserializeOwned>(bytes: &[u8]) -> VectorResult<LshIndex<M>> {
    let header = Header::read(bytes)?;

    if header.version != FORMAT_VERSION {
        return Err(VectorError::VersionMismatch {
            expected: FORMAT_VERSION,
            actual: header.version,
        });
    }

    let dimension = VectorDimension::new(header.dimension as usize)
        .map_err(|_| invalid("header dimension is zero"))?;
    let config = LshConfig {
        num_tables: header.num_tables as usize,
        hash_size: header.hash_size as usize,
        seed: None,
    };
    config
        .validate()
        .map_err(|e| invalid(format!("header carries an unusable configuration: {e}")))?;

    let (body, consumed): (IndexBody, usize) =
        bincode::decode_from_slice(&bytes[HEADER_SIZE..], body_config())
            .map_err(|e| invalid(format!("corrupted body: {e}")))?;
    if HEADER_SIZE + consumed != bytes.len() {
        return Err(invalid("trailing bytes after index body"));
    }

    if body.tables.len() != config.num_tables {
        return Err(invalid(format!(
            "header declares {} tables, body holds {}",
            config.num_tables,
            body.tables.len()
        )));
    }

    let records = body
        .records
        .into_iter()
        .enumerate()
        .map(|(i, record)| {
            if record.vector.len() != dimension.get() {
                return Err(invalid(format!(
                    "record {i} has {} components, expected {}",
                    record.vector.len(),
                    dimension.get()
                )));
            }
            let metadata = serde_json::from_slice(&record.metadata)
                .map_err(|e| invalid(format!("record {i} metadata is unreadable: {e}")))?;
            Ok(Record {
                vector: record.vector,
                metadata,
            })
        })
        .collect::<VectorResult<Vec<_>>>()?;

    let tables = body
        .tables
        .into_iter()
        .enumerate()
        .map(|(t, table)| decode_table(t, table, dimension, config.hash_size, &records))
        .collect::<VectorResult<Vec<_>>>()?;

    Ok(LshIndex::from_parts(
        dimension,
        config.hash_size,
        body.seed,
        tables,
        records,
    ))
}

/// Rebuilds one table, checking every record appears in exactly one bucket
/// and that it is the bucket the table's hyperplanes assign to it.
fn decode_table<M>(
    t: usize,
    table: TableBody,
    dimension: VectorDimension,
    hash_size: usize,
    records: &[Record<M>],
) -> VectorResult<HashTable> {
    let family = RandomHyperplanes::from_raw(dimension.get(), hash_size, table.planes)
        .ok_or_else(|| invalid(format!("table {t} hyperplanes do not match the header")))?;

    let mut seen = vec![false; records.len()];
    let mut buckets = HashMap::with_capacity(table.buckets.len());

    for (key, ids) in table.buckets {
        if hash_size < 64 && key >> hash_size != 0 {
            return Err(invalid(format!("table {t} has a key wider than {hash_size} bits")));
        }
        for &id in &ids {
            match seen.get_mut(id as usize) {
                Some(slot) if !*slot => *slot = true,
                Some(_) => return Err(invalid(format!("table {t} lists record {id} twice"))),
                None => return Err(invalid(format!("table {t} references missing record {id}"))),
            }
            if family.hash(&records[id as usize].vector).bits() != key {
                return Err(invalid(format!(
                    "table {t} files record {id} under a bucket its vector does not hash to"
                )));
            }
        }
        let replaced = buckets.insert(
            BucketKey::from_bits(key),
            ids.into_iter().map(RecordId::new).collect::<Vec<_>>(),
        );
        if replaced.is_some() {
            return Err(invalid(format!("table {t} lists bucket {key} twice")));
        }
    }

    if seen.iter().any(|present| !present) {
        return Err(invalid(format!("table {t} is missing records")));
    }

    Ok(HashTable { family, buckets })
}

pub(crate) fn save<M: Serialize>(index: &LshIndex<M>, path: &Path) -> VectorResult<()> {
    let bytes = encode(index)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_path(parent)?;
    }
    std::fs::write(path, &bytes).with_path(path)?;

    tracing::info!(
        "saved LSH index with {} records to {} ({} bytes)",
        index.len(),
        path.display(),
        bytes.len()
    );
    Ok(())
}

pub(crate) fn load<M: DeserializeOwned>(path: &Path) -> VectorResult<LshIndex<M>> {
    let bytes = std::fs::read(path).with_path(path)?;

    let index = decode(&bytes).inspect_err(|e| {
        tracing::warn!("failed to load LSH index from {}: {e}", path.display());
    })?;

    tracing::info!(
        "loaded LSH index with {} records from {}",
        index.len(),
        path.display()
    );
    Ok(index)
}
