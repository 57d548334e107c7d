//! Sync run results and per-row issues
//!
//! Every sync invocation produces a [`SyncSummary`]. Row-level problems never
//! abort the run; they are collected as [`SyncIssue`] values so the caller
//! can tell partial success from full success.

use chrono::{DateTime, Utc};
use pcat_common::EntityKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Issue severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ErrorSeverity {
    /// Row applied, something was dropped (e.g. an unresolved reference)
    Warning,
    /// Row not applied, sync continues
    Skip,
    /// Sync cannot continue
    Critical,
}

/// Issue categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    /// Cell failed type conversion; row excluded
    ParseError,
    /// Source file missing or unreadable
    SourceUnavailable,
    /// Referenced entity not found; reference left unset
    ForeignKeyUnresolved,
    /// Entity vanished between identity scan and update
    NotFound,
    /// A later step of a multi-step row write failed; row rolled back
    PartialWriteFailure,
    /// The row's entity write failed
    WriteFailed,
    /// Dimensions could not be classified
    InvalidDimension,
    /// Insert missing a required field
    InvalidRecord,
    /// Row not dispatched because the run was cancelled
    Cancelled,
    /// Delete-on-absence skipped: a rejected row had no readable identity
    DeletionSkipped,
}

impl IssueCode {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            IssueCode::ForeignKeyUnresolved | IssueCode::DeletionSkipped => ErrorSeverity::Warning,
            IssueCode::SourceUnavailable => ErrorSeverity::Critical,
            _ => ErrorSeverity::Skip,
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IssueCode::ParseError => "PARSE_ERROR",
            IssueCode::SourceUnavailable => "SOURCE_UNAVAILABLE",
            IssueCode::ForeignKeyUnresolved => "FOREIGN_KEY_UNRESOLVED",
            IssueCode::NotFound => "NOT_FOUND",
            IssueCode::PartialWriteFailure => "PARTIAL_WRITE_FAILURE",
            IssueCode::WriteFailed => "WRITE_FAILED",
            IssueCode::InvalidDimension => "INVALID_DIMENSION",
            IssueCode::InvalidRecord => "INVALID_RECORD",
            IssueCode::Cancelled => "CANCELLED",
            IssueCode::DeletionSkipped => "DELETION_SKIPPED",
        };
        f.write_str(s)
    }
}

/// One per-row (or per-run) problem
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncIssue {
    pub code: IssueCode,

    pub severity: ErrorSeverity,

    /// Identity of the affected record, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<i64>,

    /// 1-based source line (header is line 1), when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,

    /// Human-readable message
    pub message: String,

    /// When the issue occurred
    pub occurred_at: DateTime<Utc>,
}

impl SyncIssue {
    pub fn new(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: code.severity(),
            identity: None,
            line: None,
            message: message.into(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_identity(mut self, identity: i64) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_line(mut self, line: u64) -> Self {
        self.line = Some(line);
        self
    }
}

/// Result of one sync run for one entity kind
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub kind: EntityKind,

    /// False only when the run could not start (source unavailable)
    pub success: bool,

    pub message: String,

    pub inserted: usize,

    pub updated: usize,

    /// Present only for kinds that delete on absence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<usize>,

    /// Updates whose entity vanished mid-run
    pub not_found: usize,

    /// Rows whose write failed or was rejected
    pub failed: usize,

    /// Rows never dispatched because of cancellation
    pub cancelled: usize,

    pub issues: Vec<SyncIssue>,

    pub duration_ms: u64,
}

impl SyncSummary {
    /// Empty summary for a run that is about to start
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            success: true,
            message: String::new(),
            inserted: 0,
            updated: 0,
            deleted: kind.schema().delete_on_absence.then_some(0),
            not_found: 0,
            failed: 0,
            cancelled: 0,
            issues: Vec::new(),
            duration_ms: 0,
        }
    }

    /// Summary for a run that could not start (unreadable source or header)
    pub fn aborted(kind: EntityKind, code: IssueCode, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut summary = Self::new(kind);
        summary.success = false;
        summary.deleted = None;
        let mut issue = SyncIssue::new(code, message.clone());
        issue.severity = ErrorSeverity::Critical;
        summary.issues.push(issue);
        summary.message = message;
        summary
    }

    /// Build the count message once all rows have resolved
    pub fn finish(&mut self) {
        let mut message = format!("Inserted: {}\nUpdated: {}", self.inserted, self.updated);
        if let Some(deleted) = self.deleted {
            message.push_str(&format!("\nDeleted: {}", deleted));
        }
        if self.not_found > 0 {
            message.push_str(&format!("\nNot found: {}", self.not_found));
        }
        if self.failed > 0 {
            message.push_str(&format!("\nFailed: {}", self.failed));
        }
        if self.cancelled > 0 {
            message.push_str(&format!("\nCancelled: {}", self.cancelled));
        }
        self.message = message;
    }

    /// Count issues by severity
    pub fn count_by_severity(&self, severity: ErrorSeverity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    /// Count issues by code
    pub fn count_by_code(&self, code: IssueCode) -> usize {
        self.issues.iter().filter(|i| i.code == code).count()
    }
}
