//! Catalog sync engine
//!
//! Reconciles a parsed batch against the store for one entity kind:
//!
//! 1. Scan existing identities once
//! 2. Partition imported records into insert / update (and, for kinds that
//!    delete on absence, the stored identities missing from the batch)
//! 3. Apply every row through a bounded worker pool
//! 4. Report counts only after every dispatched row has resolved
//!
//! Each row's writes (entity, join cleanup, join inserts) go to the store as
//! one ordered batch, so join deletion always precedes join insertion and a
//! failed step rolls the whole row back.
//!
//! **Cancellation:** rows not yet dispatched when the token fires are
//! skipped and counted as cancelled; in-flight rows finish.

use futures::stream::{self, StreamExt};
use pcat_common::catalog::JoinSpec;
use pcat_common::{CatalogEntity, EntityKind, FieldPatch, FieldValue};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{StoreError, SyncError, SyncResult};
use crate::models::{IssueCode, SyncIssue, SyncSummary};
use crate::services::record_parser::{ImportRecord, ParsedBatch, RecordParser};
use crate::store::{CatalogStore, JoinFilter, JoinRecord, WriteBatch, WriteOp};

/// Rows completed between progress log lines
const PROGRESS_INTERVAL: usize = 10;

/// Imported identities split by what must happen to them
#[derive(Debug, Default)]
pub struct Partition {
    pub to_insert: Vec<ImportRecord>,
    pub to_update: Vec<ImportRecord>,
    pub to_delete: Vec<i64>,
}

/// Split a batch against the existing identity set
///
/// `to_insert` and `to_update` are disjoint and together cover every
/// imported record. `to_delete` is only filled when `delete_on_absence`;
/// identities of rows the parser rejected (`rejected`) still count as
/// present, so a bad cell never deletes a stored entity.
pub fn partition(
    records: Vec<ImportRecord>,
    rejected: &BTreeSet<i64>,
    existing: &BTreeSet<i64>,
    delete_on_absence: bool,
) -> Partition {
    let mut imported: BTreeSet<i64> = records.iter().map(|r| r.id).collect();
    imported.extend(rejected.iter().copied());
    let (to_update, to_insert): (Vec<_>, Vec<_>) =
        records.into_iter().partition(|r| existing.contains(&r.id));

    let to_delete = if delete_on_absence {
        existing.difference(&imported).copied().collect()
    } else {
        Vec::new()
    };

    Partition {
        to_insert,
        to_update,
        to_delete,
    }
}

#[derive(Debug)]
enum RowTask {
    Insert(ImportRecord),
    Update(ImportRecord),
    Delete(i64),
}

impl RowTask {
    fn identity(&self) -> i64 {
        match self {
            RowTask::Insert(r) | RowTask::Update(r) => r.id,
            RowTask::Delete(id) => *id,
        }
    }

    fn line(&self) -> Option<u64> {
        match self {
            RowTask::Insert(r) | RowTask::Update(r) => Some(r.line),
            RowTask::Delete(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowOutcome {
    Inserted,
    Updated,
    Deleted,
    NotFound,
    Failed,
    Cancelled,
}

/// Result of one row: outcome plus any issues raised along the way
#[derive(Debug)]
struct RowReport {
    outcome: RowOutcome,
    issues: Vec<SyncIssue>,
}

/// Row-level failure carrying its issue code
struct RowFailure {
    code: IssueCode,
    message: String,
}

impl RowFailure {
    fn new(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn from_store(err: StoreError) -> Self {
        match err.failed_operation() {
            Some(index) if index > 0 => Self::new(IssueCode::PartialWriteFailure, err.to_string()),
            _ => Self::new(IssueCode::WriteFailed, err.to_string()),
        }
    }
}

/// Synchronizes entity kinds from their source files into a store
pub struct CatalogSync<S> {
    store: S,
    workers: usize,
}

impl<S: CatalogStore> CatalogSync<S> {
    /// Create an engine applying up to `workers` rows concurrently (min 1)
    pub fn new(store: S, workers: usize) -> Self {
        Self {
            store,
            workers: workers.max(1),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Synchronize one kind from its fixed file inside `data_dir`
    ///
    /// Always returns a summary; a run that cannot start has `success: false`.
    pub async fn sync_kind(&self, kind: EntityKind, data_dir: &Path, cancel: &CancellationToken) -> SyncSummary {
        self.sync_file(kind, &data_dir.join(kind.file_name()), cancel).await
    }

    /// Synchronize every kind in dependency order
    ///
    /// A kind whose source is unavailable does not stop the others.
    pub async fn sync_all(&self, data_dir: &Path, cancel: &CancellationToken) -> Vec<SyncSummary> {
        let mut summaries = Vec::with_capacity(EntityKind::ALL.len());
        for kind in EntityKind::ALL {
            summaries.push(self.sync_kind(kind, data_dir, cancel).await);
        }
        summaries
    }

    /// Synchronize one kind from an explicit file path
    pub async fn sync_file(&self, kind: EntityKind, path: &Path, cancel: &CancellationToken) -> SyncSummary {
        let started = Instant::now();
        info!(kind = %kind, path = %path.display(), "Starting sync");

        let result = match RecordParser::new(kind).parse_file(path) {
            Ok(batch) => self.reconcile(kind, batch, cancel).await,
            Err(e) => Err(e),
        };

        let mut summary = result.unwrap_or_else(|e| {
            error!(kind = %kind, "Sync aborted: {}", e);
            let code = match e {
                SyncError::SourceUnavailable { .. } => IssueCode::SourceUnavailable,
                SyncError::InvalidHeader { .. } => IssueCode::ParseError,
                SyncError::Store(_) | SyncError::Common(_) => IssueCode::WriteFailed,
            };
            SyncSummary::aborted(kind, code, e.to_string())
        });
        summary.duration_ms = elapsed_ms(started.elapsed());
        summary
    }

    /// Reconcile a parsed batch against the store
    ///
    /// Errors only when the identity scan fails; every row-level problem is
    /// reported in the summary instead.
    pub async fn reconcile(
        &self,
        kind: EntityKind,
        batch: ParsedBatch,
        cancel: &CancellationToken,
    ) -> SyncResult<SyncSummary> {
        let schema = kind.schema();
        let mut summary = SyncSummary::new(kind);
        let rejected: BTreeSet<i64> = batch.issues.iter().filter_map(|i| i.identity).collect();
        let unidentified = batch.issues.iter().filter(|i| i.identity.is_none()).count();
        summary.issues = batch.issues;

        // A rejected row without an identity might be any stored entity
        let delete_on_absence = schema.delete_on_absence && unidentified == 0;
        if schema.delete_on_absence && !delete_on_absence {
            warn!(kind = %kind, unidentified, "Skipping deletions: rejected rows without identity");
            summary.issues.push(SyncIssue::new(
                IssueCode::DeletionSkipped,
                format!(
                    "{} rejected row(s) had no readable identity; absent entities were not deleted",
                    unidentified
                ),
            ));
        }

        let existing = self.store.find_all_ids(kind).await?;
        let Partition {
            to_insert,
            to_update,
            to_delete,
        } = partition(batch.records, &rejected, &existing, delete_on_absence);

        info!(
            kind = %kind,
            existing = existing.len(),
            to_insert = to_insert.len(),
            to_update = to_update.len(),
            to_delete = to_delete.len(),
            "Partitioned import"
        );

        let tasks: Vec<RowTask> = to_insert
            .into_iter()
            .map(RowTask::Insert)
            .chain(to_update.into_iter().map(RowTask::Update))
            .chain(to_delete.into_iter().map(RowTask::Delete))
            .collect();
        let total = tasks.len();

        let store = &self.store;
        let mut reports = stream::iter(tasks)
            .map(|task| async move {
                // Checked when the row is dispatched, not when it was queued
                if cancel.is_cancelled() {
                    let mut issue = SyncIssue::new(IssueCode::Cancelled, "sync cancelled before row was applied")
                        .with_identity(task.identity());
                    issue.line = task.line();
                    return RowReport {
                        outcome: RowOutcome::Cancelled,
                        issues: vec![issue],
                    };
                }
                apply_row(store, kind, task).await
            })
            .buffer_unordered(self.workers);

        let mut completed = 0;
        while let Some(report) = reports.next().await {
            completed += 1;
            match report.outcome {
                RowOutcome::Inserted => summary.inserted += 1,
                RowOutcome::Updated => summary.updated += 1,
                RowOutcome::Deleted => {
                    if let Some(deleted) = summary.deleted.as_mut() {
                        *deleted += 1;
                    }
                }
                RowOutcome::NotFound => summary.not_found += 1,
                RowOutcome::Failed => summary.failed += 1,
                RowOutcome::Cancelled => summary.cancelled += 1,
            }
            summary.issues.extend(report.issues);

            if completed % PROGRESS_INTERVAL == 0 {
                info!(kind = %kind, "Progress: {}/{} rows", completed, total);
            }
        }

        summary.finish();
        info!(
            kind = %kind,
            inserted = summary.inserted,
            updated = summary.updated,
            deleted = summary.deleted.unwrap_or(0),
            not_found = summary.not_found,
            failed = summary.failed,
            cancelled = summary.cancelled,
            issues = summary.issues.len(),
            "Sync complete"
        );
        Ok(summary)
    }
}

/// Milliseconds, saturating at `u64::MAX`
fn elapsed_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

async fn apply_row<S: CatalogStore>(store: &S, kind: EntityKind, task: RowTask) -> RowReport {
    let id = task.identity();
    let line = task.line();
    let mut issues = Vec::new();

    let result = match task {
        RowTask::Insert(record) => insert_row(store, kind, record, &mut issues).await,
        RowTask::Update(record) => update_row(store, kind, record, &mut issues).await,
        RowTask::Delete(id) => delete_row(store, kind, id).await,
    };

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(failure) => {
            let outcome = if failure.code == IssueCode::NotFound {
                warn!(kind = %kind, id, "{}", failure.message);
                RowOutcome::NotFound
            } else {
                warn!(kind = %kind, id, code = %failure.code, "Row failed: {}", failure.message);
                RowOutcome::Failed
            };
            issues.push(SyncIssue::new(failure.code, failure.message).with_identity(id));
            outcome
        }
    };

    if let Some(line) = line {
        for issue in issues.iter_mut().filter(|i| i.line.is_none()) {
            issue.line = Some(line);
        }
    }

    RowReport { outcome, issues }
}

async fn insert_row<S: CatalogStore>(
    store: &S,
    kind: EntityKind,
    record: ImportRecord,
    issues: &mut Vec<SyncIssue>,
) -> Result<RowOutcome, RowFailure> {
    let schema = kind.schema();
    let mut entity = CatalogEntity::new(kind, record.id);

    for spec in schema.fields {
        if let Some(default) = spec.default {
            entity.set(spec.name, default.to_value());
        }
    }
    overlay(&mut entity, &record);

    let missing: Vec<&str> = schema
        .fields
        .iter()
        .filter(|f| !f.nullable && entity.get(f.name).is_none())
        .map(|f| f.name)
        .collect();
    if !missing.is_empty() {
        return Err(RowFailure::new(
            IssueCode::InvalidRecord,
            format!("missing required fields: {}", missing.join(", ")),
        ));
    }

    resolve_foreign_keys(store, &mut entity, &record, issues).await?;

    let mut ops = Vec::new();
    for (field, ids) in &record.joins {
        if let Some(join) = schema.join(field) {
            let targets = resolve_join_targets(store, join, record.id, ids, issues).await?;
            ops.extend(targets.into_iter().map(WriteOp::InsertJoin));
        }
    }

    persist(store, entity, WriteOp::Insert, ops).await?;
    debug!(kind = %kind, id = record.id, "Inserted");
    Ok(RowOutcome::Inserted)
}

async fn update_row<S: CatalogStore>(
    store: &S,
    kind: EntityKind,
    record: ImportRecord,
    issues: &mut Vec<SyncIssue>,
) -> Result<RowOutcome, RowFailure> {
    let schema = kind.schema();
    let mut entity = store
        .find_by_id(kind, record.id)
        .await
        .map_err(RowFailure::from_store)?
        .ok_or_else(|| {
            RowFailure::new(
                IssueCode::NotFound,
                format!("{} {} vanished before it could be updated", kind, record.id),
            )
        })?;

    overlay(&mut entity, &record);
    resolve_foreign_keys(store, &mut entity, &record, issues).await?;

    // Full replace of every join list present in the file
    let mut ops = Vec::new();
    for (field, ids) in &record.joins {
        if let Some(join) = schema.join(field) {
            let targets = resolve_join_targets(store, join, record.id, ids, issues).await?;
            ops.push(WriteOp::DeleteWhere(JoinFilter::OwnedBy {
                join,
                owner_id: record.id,
            }));
            ops.extend(targets.into_iter().map(WriteOp::InsertJoin));
        }
    }

    persist(store, entity, WriteOp::Save, ops).await?;
    debug!(kind = %kind, id = record.id, "Updated");
    Ok(RowOutcome::Updated)
}

async fn delete_row<S: CatalogStore>(store: &S, kind: EntityKind, id: i64) -> Result<RowOutcome, RowFailure> {
    let exists = store.exists(kind, id).await.map_err(RowFailure::from_store)?;
    if !exists {
        return Err(RowFailure::new(
            IssueCode::NotFound,
            format!("{} {} vanished before it could be deleted", kind, id),
        ));
    }

    // Owned join records go first
    let mut batch = WriteBatch::new();
    for join in kind.schema().joins {
        batch.push(WriteOp::DeleteWhere(JoinFilter::OwnedBy { join, owner_id: id }));
    }
    batch.push(WriteOp::Delete { kind, id });

    store.commit(batch).await.map_err(RowFailure::from_store)?;
    debug!(kind = %kind, id, "Deleted");
    Ok(RowOutcome::Deleted)
}

/// Apply present fields; `Clear` removes the value
fn overlay(entity: &mut CatalogEntity, record: &ImportRecord) {
    for (name, patch) in &record.fields {
        match patch {
            FieldPatch::Set(value) => entity.set(*name, value.clone()),
            FieldPatch::Clear => entity.clear(*name),
        }
    }
}

/// Check every reference set by this record; unresolved ones are left unset
async fn resolve_foreign_keys<S: CatalogStore>(
    store: &S,
    entity: &mut CatalogEntity,
    record: &ImportRecord,
    issues: &mut Vec<SyncIssue>,
) -> Result<(), RowFailure> {
    for fk in entity.kind.schema().foreign_keys {
        let Some(FieldPatch::Set(FieldValue::Int(target_id))) = record.fields.get(fk.field) else {
            continue;
        };
        let found = store
            .exists(fk.target, *target_id)
            .await
            .map_err(RowFailure::from_store)?;
        if !found {
            entity.clear(fk.field);
            warn!(kind = %entity.kind, id = entity.id, field = fk.field, target_id, "Unresolved reference");
            issues.push(
                SyncIssue::new(
                    IssueCode::ForeignKeyUnresolved,
                    format!("{} {} not found; {} left unset", fk.target, target_id, fk.field),
                )
                .with_identity(entity.id),
            );
        }
    }
    Ok(())
}

/// Keep join targets that exist; drop the rest with a warning
async fn resolve_join_targets<S: CatalogStore>(
    store: &S,
    join: &'static JoinSpec,
    owner_id: i64,
    ids: &[i64],
    issues: &mut Vec<SyncIssue>,
) -> Result<Vec<JoinRecord>, RowFailure> {
    let mut records = Vec::with_capacity(ids.len());
    for &target_id in ids {
        let found = store
            .exists(join.target, target_id)
            .await
            .map_err(RowFailure::from_store)?;
        if found {
            records.push(JoinRecord {
                join,
                owner_id,
                target_id,
            });
        } else {
            warn!(owner_id, target_id, table = join.table, "Unresolved join target");
            issues.push(
                SyncIssue::new(
                    IssueCode::ForeignKeyUnresolved,
                    format!("{} {} not found; dropped from {}", join.target, target_id, join.field),
                )
                .with_identity(owner_id),
            );
        }
    }
    Ok(records)
}

/// Single persist choke point: recompute derived fields, then write the
/// entity and its join operations as one batch
async fn persist<S: CatalogStore>(
    store: &S,
    mut entity: CatalogEntity,
    write: fn(CatalogEntity) -> WriteOp,
    join_ops: Vec<WriteOp>,
) -> Result<(), RowFailure> {
    entity.recompute_derived().map_err(|e| match e {
        pcat_common::Error::InvalidDimension(msg) => RowFailure::new(IssueCode::InvalidDimension, msg),
        other => RowFailure::new(IssueCode::InvalidRecord, other.to_string()),
    })?;

    let mut batch = WriteBatch::new();
    batch.push(write(entity));
    for op in join_ops {
        batch.push(op);
    }

    store.commit(batch).await.map_err(RowFailure::from_store)
}
