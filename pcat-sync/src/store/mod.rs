//! Catalog store contract
//!
//! The sync engine only reads and writes entities through [`CatalogStore`].
//! Concurrent `save` calls for the same identity are last-write-wins.
//! Multi-step row writes go through [`CatalogStore::commit`], which applies
//! a [`WriteBatch`] atomically and in order.

pub mod sqlite;

use async_trait::async_trait;
use pcat_common::catalog::JoinSpec;
use pcat_common::{CatalogEntity, EntityKind};
use std::collections::BTreeSet;

use crate::error::StoreResult;

pub use sqlite::SqliteStore;

/// Association between an owning entity and one join target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinRecord {
    pub join: &'static JoinSpec,
    pub owner_id: i64,
    pub target_id: i64,
}

/// Selects join records for bulk deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinFilter {
    /// Every record of one join table owned by one entity
    OwnedBy {
        join: &'static JoinSpec,
        owner_id: i64,
    },
}

/// One step of a row write
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Insert(CatalogEntity),
    Save(CatalogEntity),
    Delete { kind: EntityKind, id: i64 },
    DeleteWhere(JoinFilter),
    InsertJoin(JoinRecord),
}

impl WriteOp {
    /// Short description for logs and batch errors
    pub fn describe(&self) -> String {
        match self {
            WriteOp::Insert(e) => format!("insert {} {}", e.kind, e.id),
            WriteOp::Save(e) => format!("save {} {}", e.kind, e.id),
            WriteOp::Delete { kind, id } => format!("delete {} {}", kind, id),
            WriteOp::DeleteWhere(JoinFilter::OwnedBy { join, owner_id }) => {
                format!("delete {} where {} = {}", join.table, join.owner_column, owner_id)
            }
            WriteOp::InsertJoin(r) => {
                format!("insert {} ({}, {})", r.join.table, r.owner_id, r.target_id)
            }
        }
    }
}

/// Ordered write operations applied in one transaction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: WriteOp) {
        self.ops.push(op);
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Persistence contract consumed by the sync engine
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Every stored identity of one kind (single full scan)
    async fn find_all_ids(&self, kind: EntityKind) -> StoreResult<BTreeSet<i64>>;

    async fn find_all(&self, kind: EntityKind) -> StoreResult<Vec<CatalogEntity>>;

    async fn find_by_id(&self, kind: EntityKind, id: i64) -> StoreResult<Option<CatalogEntity>>;

    async fn exists(&self, kind: EntityKind, id: i64) -> StoreResult<bool>;

    /// Target identities of one join table owned by `owner_id`, ascending
    async fn find_join_targets(&self, join: &'static JoinSpec, owner_id: i64) -> StoreResult<Vec<i64>>;

    /// Insert a new entity; fails if the identity exists
    async fn insert(&self, entity: &CatalogEntity) -> StoreResult<()>;

    /// Upsert; the last write for an identity wins
    async fn save(&self, entity: &CatalogEntity) -> StoreResult<()>;

    /// Remove one entity; returns whether it existed
    async fn delete(&self, kind: EntityKind, id: i64) -> StoreResult<bool>;

    /// Remove join records matching `filter`; returns the number removed
    async fn delete_where(&self, filter: &JoinFilter) -> StoreResult<u64>;

    /// Apply every operation in order, all or nothing
    async fn commit(&self, batch: WriteBatch) -> StoreResult<()>;
}
