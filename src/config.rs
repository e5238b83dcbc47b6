//! Configuration module for the vector search engine.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `O1_` and use double underscores
//! to separate nested levels:
//! - `O1_INDEX__BACKEND=lsh` sets `index.backend`
//! - `O1_LSH__NUM_TABLES=16` sets `lsh.num_tables`
//! - `O1_DEBUG=true` sets `debug`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{VectorError, VectorResult};

/// Directory searched for a settings file, from the working directory upward.
const CONFIG_DIR: &str = ".o1search";

/// Largest hash width; bucket keys are packed into a `u64`.
pub const MAX_HASH_SIZE: usize = 64;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Global debug mode
    #[serde(default = "default_false")]
    pub debug: bool,

    /// Index shape and backend selection
    #[serde(default)]
    pub index: IndexConfig,

    /// LSH engine settings
    #[serde(default)]
    pub lsh: LshConfig,

    /// Tree backend settings
    #[serde(default)]
    pub tree: TreeConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct IndexConfig {
    /// Vector dimension (must match the embedding model)
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Backend name: "auto", "flat", "tree" or "lsh"
    #[serde(default = "default_backend")]
    pub backend: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct LshConfig {
    /// Number of independent hash tables
    #[serde(default = "default_num_tables")]
    pub num_tables: usize,

    /// Hyperplanes per table (bits per bucket key)
    #[serde(default = "default_hash_size")]
    pub hash_size: usize,

    /// Seed for the random projections; a fresh one is drawn when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct TreeConfig {
    /// Number of trees in the forest
    #[serde(default = "default_num_trees")]
    pub num_trees: usize,

    /// Largest number of items a leaf may hold
    #[serde(default = "default_max_leaf_size")]
    pub max_leaf_size: usize,

    /// Candidates inspected per query (defaults to num_trees * k)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_k: Option<usize>,

    /// Seed for split-point sampling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_false() -> bool {
    false
}
fn default_dimension() -> usize {
    384
}
fn default_backend() -> String {
    "auto".to_string()
}
fn default_num_tables() -> usize {
    10
}
fn default_hash_size() -> usize {
    8
}
fn default_num_trees() -> usize {
    10
}
fn default_max_leaf_size() -> usize {
    32
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            debug: false,
            index: IndexConfig::default(),
            lsh: LshConfig::default(),
            tree: TreeConfig::default(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            backend: default_backend(),
        }
    }
}

impl Default for LshConfig {
    fn default() -> Self {
        Self {
            num_tables: default_num_tables(),
            hash_size: default_hash_size(),
            seed: None,
        }
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            num_trees: default_num_trees(),
            max_leaf_size: default_max_leaf_size(),
            search_k: None,
            seed: None,
        }
    }
}

impl LshConfig {
    /// Config with an explicit seed, for reproducible hash families.
    #[must_use]
    pub fn seeded(num_tables: usize, hash_size: usize, seed: u64) -> Self {
        Self {
            num_tables,
            hash_size,
            seed: Some(seed),
        }
    }

    /// Checks table count and hash width bounds.
    pub fn validate(&self) -> VectorResult<()> {
        if self.num_tables == 0 {
            return Err(VectorError::InvalidConfig {
                reason: "lsh.num_tables must be at least 1".to_string(),
            });
        }
        if self.hash_size == 0 || self.hash_size > MAX_HASH_SIZE {
            return Err(VectorError::InvalidConfig {
                reason: format!(
                    "lsh.hash_size must be between 1 and {MAX_HASH_SIZE}, got {}",
                    self.hash_size
                ),
            });
        }
        Ok(())
    }
}

impl TreeConfig {
    /// Checks forest size and leaf bounds.
    pub fn validate(&self) -> VectorResult<()> {
        if self.num_trees == 0 {
            return Err(VectorError::InvalidConfig {
                reason: "tree.num_trees must be at least 1".to_string(),
            });
        }
        if self.max_leaf_size == 0 {
            return Err(VectorError::InvalidConfig {
                reason: "tree.max_leaf_size must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("settings.toml"));

        Self::figment(config_path).extract().map_err(Box::new)
    }

    /// Load configuration from a specific file, still honoring `O1_` overrides
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, Box<figment::Error>> {
        Self::figment(path.as_ref().to_path_buf())
            .extract()
            .map_err(Box::new)
    }

    fn figment(config_path: PathBuf) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_path))
            // Double underscore separates nested levels, single underscore
            // stays within field names
            .merge(Env::prefixed("O1_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
    }

    /// Find the settings file by looking for the config directory
    /// Searches from current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(CONFIG_DIR);
            if config_dir.is_dir() {
                return Some(config_dir.join("settings.toml"));
            }
        }

        None
    }

    /// Save current configuration to file
    pub fn save(
        &self,
        path: impl AsRef<std::path::Path>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Validates every section that has bounds.
    pub fn validate(&self) -> VectorResult<()> {
        if self.index.dimension == 0 {
            return Err(VectorError::InvalidDimension {
                dimension: 0,
                reason: "Vector dimension cannot be zero",
            });
        }
        self.lsh.validate()?;
        self.tree.validate()
    }
}
