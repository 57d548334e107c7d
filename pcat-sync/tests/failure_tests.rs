//! Row failure handling: partial writes and vanished identities

mod helpers;

use async_trait::async_trait;
use helpers::{photo_row, TestCatalog, PHOTO_HEADER};
use pcat_common::catalog::JoinSpec;
use pcat_common::{CatalogEntity, EntityKind};
use pcat_sync::error::StoreResult;
use pcat_sync::store::{JoinFilter, WriteBatch};
use pcat_sync::{CatalogStore, CatalogSync, IssueCode, SqliteStore};
use std::collections::BTreeSet;
use tokio_util::sync::CancellationToken;

/// Reports identities that are not actually stored
struct PhantomStore {
    inner: SqliteStore,
    phantom: BTreeSet<i64>,
}

#[async_trait]
impl CatalogStore for PhantomStore {
    async fn find_all_ids(&self, kind: EntityKind) -> StoreResult<BTreeSet<i64>> {
        let mut ids = self.inner.find_all_ids(kind).await?;
        ids.extend(self.phantom.iter().copied());
        Ok(ids)
    }

    async fn find_all(&self, kind: EntityKind) -> StoreResult<Vec<CatalogEntity>> {
        self.inner.find_all(kind).await
    }

    async fn find_by_id(&self, kind: EntityKind, id: i64) -> StoreResult<Option<CatalogEntity>> {
        self.inner.find_by_id(kind, id).await
    }

    async fn exists(&self, kind: EntityKind, id: i64) -> StoreResult<bool> {
        self.inner.exists(kind, id).await
    }

    async fn find_join_targets(&self, join: &'static JoinSpec, owner_id: i64) -> StoreResult<Vec<i64>> {
        self.inner.find_join_targets(join, owner_id).await
    }

    async fn insert(&self, entity: &CatalogEntity) -> StoreResult<()> {
        self.inner.insert(entity).await
    }

    async fn save(&self, entity: &CatalogEntity) -> StoreResult<()> {
        self.inner.save(entity).await
    }

    async fn delete(&self, kind: EntityKind, id: i64) -> StoreResult<bool> {
        self.inner.delete(kind, id).await
    }

    async fn delete_where(&self, filter: &JoinFilter) -> StoreResult<u64> {
        self.inner.delete_where(filter).await
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        self.inner.commit(batch).await
    }
}

#[tokio::test]
async fn test_failed_join_insert_rolls_back_row() {
    let catalog = TestCatalog::new().await;
    catalog.seed_taxonomy().await;
    sqlx::query("DROP TABLE photo_tags")
        .execute(catalog.store.pool())
        .await
        .unwrap();

    let with_tag = photo_row(1, 5, ",,,,,1,");
    // Second file has no tag column at all
    let header = PHOTO_HEADER.replace(",tagIds", "");
    let without_tags = photo_row(2, 5, ",,,,1,");
    catalog.write_source(EntityKind::Photo, &[PHOTO_HEADER, &with_tag]);
    let summary = catalog
        .engine(2)
        .sync_kind(EntityKind::Photo, &catalog.data_dir(), &CancellationToken::new())
        .await;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.inserted, 0);
    assert_eq!(summary.count_by_code(IssueCode::PartialWriteFailure), 1);
    // Row failures are reported, the run itself still completes
    assert!(summary.success);
    assert!(!catalog.store.exists(EntityKind::Photo, 1).await.unwrap());

    let summary = catalog.sync(EntityKind::Photo, &[&header, &without_tags]).await;
    assert_eq!(summary.inserted, 1, "{:?}", summary.issues);
    assert_eq!(catalog.join_count("photo_subjects", 2).await, 1);
}

#[tokio::test]
async fn test_failed_entity_write_is_not_partial() {
    let catalog = TestCatalog::new().await;
    sqlx::query("DROP TABLE tags")
        .execute(catalog.store.pool())
        .await
        .unwrap();
    sqlx::query("CREATE TABLE tags (id INTEGER PRIMARY KEY, sort_index INTEGER NOT NULL CHECK (sort_index > 0), name TEXT NOT NULL, description TEXT, created_at TEXT, updated_at TEXT)")
        .execute(catalog.store.pool())
        .await
        .unwrap();

    let summary = catalog
        .sync(EntityKind::Tag, &["id,sortIndex,name", "1,0,rejected by table", "2,2,ok"])
        .await;

    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.count_by_code(IssueCode::WriteFailed), 1);
    assert_eq!(summary.count_by_code(IssueCode::PartialWriteFailure), 0);
}

#[tokio::test]
async fn test_update_of_vanished_entity_is_not_found() {
    let catalog = TestCatalog::new().await;
    catalog.sync(EntityKind::Tag, &["id,sortIndex,name", "1,1,real"]).await;

    let store = PhantomStore {
        inner: catalog.store.clone(),
        phantom: [5].into_iter().collect(),
    };
    catalog.write_source(EntityKind::Tag, &["id,sortIndex,name", "1,1,real", "5,5,ghost"]);
    let summary = CatalogSync::new(store, 2)
        .sync_kind(EntityKind::Tag, &catalog.data_dir(), &CancellationToken::new())
        .await;

    assert_eq!(summary.updated, 1);
    assert_eq!(summary.not_found, 1);
    assert_eq!(summary.inserted, 0);
    let issue = summary
        .issues
        .iter()
        .find(|i| i.code == IssueCode::NotFound)
        .unwrap();
    assert_eq!(issue.identity, Some(5));
    assert_eq!(issue.line, Some(3));
    assert!(!catalog.store.exists(EntityKind::Tag, 5).await.unwrap());
}

#[tokio::test]
async fn test_delete_of_vanished_entity_is_not_found() {
    let catalog = TestCatalog::new().await;
    catalog
        .sync(EntityKind::Photo, &[PHOTO_HEADER, &photo_row(1, 5, ",,,,,,")])
        .await;

    let store = PhantomStore {
        inner: catalog.store.clone(),
        phantom: [9].into_iter().collect(),
    };
    let summary = CatalogSync::new(store, 2)
        .sync_kind(EntityKind::Photo, &catalog.data_dir(), &CancellationToken::new())
        .await;

    assert_eq!(summary.updated, 1);
    assert_eq!(summary.deleted, Some(0));
    assert_eq!(summary.not_found, 1);
    assert!(summary.message.contains("Not found: 1"), "{}", summary.message);
}
