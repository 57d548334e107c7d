//! Error types for pcat-sync
//!
//! Only conditions fatal to a whole invocation are errors here. Per-row
//! problems are reported as `SyncIssue`s in the summary.

use pcat_common::EntityKind;
use std::path::PathBuf;
use thiserror::Error;

/// Store operation error
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database operation error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Operation `index` of a write batch failed; the batch was rolled back
    #[error("Write batch failed at operation {index} ({operation}): {source}")]
    Batch {
        index: usize,
        operation: String,
        #[source]
        source: sqlx::Error,
    },
}

impl StoreError {
    /// Index of the failed batch operation, if this came from a batch
    pub fn failed_operation(&self) -> Option<usize> {
        match self {
            StoreError::Batch { index, .. } => Some(*index),
            _ => None,
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Sync invocation error
#[derive(Debug, Error)]
pub enum SyncError {
    /// Source file missing or unreadable
    #[error("Source unavailable: {path}: {reason}")]
    SourceUnavailable { path: PathBuf, reason: String },

    /// Header row unusable (e.g. no identity column)
    #[error("Invalid header in {kind} source: {message}")]
    InvalidHeader { kind: EntityKind, message: String },

    /// Store failure outside any single row
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// pcat-common error
    #[error("Common error: {0}")]
    Common(#[from] pcat_common::Error),
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;
