//! pcat-sync library interface
//!
//! Synchronizes catalog entity kinds from flat source files into the
//! catalog store. Exposed as a library for the binary and integration tests.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod store;

pub use crate::error::{StoreError, SyncError, SyncResult};
pub use crate::models::{ErrorSeverity, IssueCode, SyncIssue, SyncSummary};
pub use crate::services::{CatalogSync, RecordParser};
pub use crate::store::{CatalogStore, SqliteStore};
