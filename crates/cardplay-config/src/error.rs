//! Error types for configuration operations.

use std::path::PathBuf;

use cardplay_core::{GraphError, NodeId, RegistryError};
use thiserror::Error;

/// Errors that can occur while loading, saving or hydrating projects.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("failed to write file '{path}': {source}")]
    WriteFile {
        /// Path of the file that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to create directory
    #[error("failed to create directory '{path}': {source}")]
    CreateDir {
        /// Path of the directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to serialize TOML
    #[error("failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Failed to parse or serialize JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The file declares a schema version this build cannot read
    #[error("unsupported project version {found} (supported: 1..={supported})")]
    UnsupportedVersion {
        /// Version found in the file.
        found: u32,
        /// Newest supported version.
        supported: u32,
    },

    /// A graph with provisional nodes cannot be persisted
    #[error("graph has provisional nodes that must be materialized first: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    ProvisionalNodes(Vec<NodeId>),

    /// A listed pack is not bundled with this build
    #[error("unknown pack: {0}")]
    UnknownPack(String),

    /// Registering project types or packs failed
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Building the graph failed
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// Validation errors
    #[error("validation failed: {0}")]
    Validation(#[from] crate::validation::ValidationError),
}

impl ConfigError {
    /// Create a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Create a write file error.
    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::WriteFile {
            path: path.into(),
            source,
        }
    }

    /// Create a create directory error.
    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::CreateDir {
            path: path.into(),
            source,
        }
    }
}
