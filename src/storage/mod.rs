//! Filesystem sinks for match results.
//!
//! Nothing here is read back by the engine; files are an audit trail for
//! external tooling.

pub mod jsonl;

use thiserror::Error;

pub use jsonl::{JsonlReader, JsonlResultLogger, JsonlWriter, LoggedMatch};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
