//! Error types for the trigger store and the metadata reader.

use std::path::PathBuf;

use thiserror::Error;

/// Failures while persisting the trigger store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create store directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to encode trigger store: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failures while reading embedded metadata from an adapter file.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("unsupported adapter format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("adapter file {} is {size} bytes, above the {limit} byte limit", .path.display())]
    TooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid safetensors header: {0}")]
    Parse(String),

    #[error("no metadata table in {}", .0.display())]
    NoMetadata(PathBuf),
}

/// Why a metadata trigger lookup produced nothing.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("LoRA file not found: {0}")]
    AdapterNotFound(String),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error("no trigger words found in metadata of {0}")]
    NoTriggers(String),
}
