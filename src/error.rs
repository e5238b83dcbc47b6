//! Error types for the vector search engine
//!
//! This module provides structured error types using thiserror for better
//! error handling and actionable error messages.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for index and adapter operations
#[derive(Error, Debug)]
pub enum VectorError {
    /// Configuration errors
    #[error(
        "Unknown backend '{name}'\nSuggestion: Use one of \"auto\", \"flat\", \"tree\" or \"lsh\""
    )]
    UnknownBackend { name: String },

    #[error(
        "Backend '{backend}' is not available in this build\nSuggestion: Enable the '{feature}' cargo feature or construct the adapter with \"auto\""
    )]
    BackendUnavailable {
        backend: &'static str,
        feature: &'static str,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Invalid vector dimension: {dimension}\nReason: {reason}")]
    InvalidDimension {
        dimension: usize,
        reason: &'static str,
    },

    /// Per-call input errors
    #[error(
        "Vector dimension mismatch: expected {expected}, got {actual}\nSuggestion: Ensure all vectors use the same embedding model"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error(
        "Index is full at {capacity} records\nSuggestion: Split the corpus across several indexes"
    )]
    IndexFull { capacity: usize },

    /// Persistence errors
    #[error("Failed to access index file '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(
        "Invalid index format: {reason}\nSuggestion: Check that the file was written by LshIndex::save and is not corrupted"
    )]
    InvalidFormat { reason: String },

    #[error(
        "Invalid index version: expected {expected}, got {actual}\nSuggestion: Rebuild the index with the current version"
    )]
    VersionMismatch { expected: u32, actual: u32 },

    #[error(
        "Index configuration mismatch: file has {found}, expected {expected}\nSuggestion: Load with the configuration the index was built with"
    )]
    IncompatibleIndex { expected: String, found: String },

    #[error("Serialization error: {0}\nSuggestion: Check that metadata values are serializable")]
    Serialization(String),
}

impl VectorError {
    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that callers can use for programmatic
    /// error handling.
    pub fn status_code(&self) -> String {
        match self {
            Self::UnknownBackend { .. } => "UNKNOWN_BACKEND",
            Self::BackendUnavailable { .. } => "BACKEND_UNAVAILABLE",
            Self::InvalidConfig { .. } => "CONFIG_ERROR",
            Self::InvalidDimension { .. } => "INVALID_DIMENSION",
            Self::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            Self::IndexFull { .. } => "INDEX_FULL",
            Self::Io { .. } => "IO_ERROR",
            Self::InvalidFormat { .. } => "INVALID_FORMAT",
            Self::VersionMismatch { .. } => "VERSION_MISMATCH",
            Self::IncompatibleIndex { .. } => "INCOMPATIBLE_INDEX",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
        .to_string()
    }

    /// Whether this error was raised at construction time rather than per call.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownBackend { .. }
                | Self::BackendUnavailable { .. }
                | Self::InvalidConfig { .. }
                | Self::InvalidDimension { .. }
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::BackendUnavailable { .. } => vec![
                "Rebuild with default features to get every backend",
                "Use the \"auto\" backend to fall back to LSH silently",
            ],
            Self::DimensionMismatch { .. } => vec![
                "The index was not modified, retry with a vector of the right length",
                "Check that queries and stored vectors come from the same embedding model",
            ],
            Self::InvalidFormat { .. } | Self::VersionMismatch { .. } => vec![
                "Re-create the index from the source vectors and save it again",
            ],
            Self::IncompatibleIndex { .. } => vec![
                "Load the file with LshIndex::load to inspect its configuration",
                "Update [index] and [lsh] settings to match the stored index",
            ],
            Self::Io { .. } => vec![
                "Check that the file exists and you have read/write permissions",
                "Check available disk space",
            ],
            _ => vec![],
        }
    }
}

/// Result type alias for vector search operations
pub type VectorResult<T> = Result<T, VectorError>;

/// Helper trait for attaching a path to I/O errors
pub trait IoContext<T> {
    /// Wrap an I/O error together with the path that caused it
    fn with_path(self, path: &std::path::Path) -> VectorResult<T>;
}

impl<T> IoContext<T> for Result<T, std::io::Error> {
    fn with_path(self, path: &std::path::Path) -> VectorResult<T> {
        self.map_err(|source| VectorError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
