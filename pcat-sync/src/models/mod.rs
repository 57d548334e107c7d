//! Data models for catalog sync runs

pub mod sync_result;

pub use sync_result::{ErrorSeverity, IssueCode, SyncIssue, SyncSummary};
