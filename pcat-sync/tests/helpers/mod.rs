//! Test Helper Utilities
//!
//! Shared fixtures for pcat-sync integration tests

#![allow(dead_code)]

use pcat_common::db::init_database;
use pcat_common::EntityKind;
use pcat_sync::{CatalogSync, SqliteStore, SyncSummary};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Header used by photo fixtures
pub const PHOTO_HEADER: &str = "id,title,rating,basePrice12,basePrice16,basePrice20,basePrice24,basePrice30,\
photographerId,locationId,photoImageId,shareImageId,subjectIds,tagIds,collectionIds";

/// Temporary root folder with a file-backed catalog database
///
/// The TempDir must be kept alive for the duration of the test.
pub struct TestCatalog {
    pub temp: TempDir,
    pub store: SqliteStore,
}

impl TestCatalog {
    pub async fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let pool = init_database(&temp.path().join("catalog.db")).await.unwrap();
        std::fs::create_dir_all(temp.path().join("data")).unwrap();
        Self {
            temp,
            store: SqliteStore::new(pool),
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.temp.path().join("data")
    }

    pub fn engine(&self, workers: usize) -> CatalogSync<SqliteStore> {
        CatalogSync::new(self.store.clone(), workers)
    }

    /// Write the fixed source file for `kind`
    pub fn write_source(&self, kind: EntityKind, lines: &[&str]) {
        write_source(&self.data_dir(), kind, lines);
    }

    /// Write then synchronize one kind with four workers
    pub async fn sync(&self, kind: EntityKind, lines: &[&str]) -> SyncSummary {
        self.write_source(kind, lines);
        self.engine(4)
            .sync_kind(kind, &self.data_dir(), &CancellationToken::new())
            .await
    }

    /// Subjects, tags and collections with ids 1..=3
    pub async fn seed_taxonomy(&self) {
        for kind in [EntityKind::Subject, EntityKind::Tag, EntityKind::Collection] {
            let summary = self
                .sync(
                    kind,
                    &["id,sortIndex,name", "1,1,one", "2,2,two", "3,3,three"],
                )
                .await;
            assert_eq!(summary.inserted, 3, "{:?}", summary.issues);
        }
    }

    /// Number of join rows owned by `photo_id` in `table`
    pub async fn join_count(&self, table: &str, photo_id: i64) -> i64 {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE photo_id = ?", table);
        sqlx::query_scalar(&sql)
            .bind(photo_id)
            .fetch_one(self.store.pool())
            .await
            .unwrap()
    }
}

pub fn write_source(dir: &Path, kind: EntityKind, lines: &[&str]) {
    let mut content = lines.join("\n");
    content.push('\n');
    std::fs::write(dir.join(kind.file_name()), content).unwrap();
}

/// Photo row with fixed prices; relation cells passed through verbatim
pub fn photo_row(id: i64, rating: i64, relations: &str) -> String {
    format!("{},Photo {},{},120,160,200,240,300,{}", id, id, rating, relations)
}

/// Frame row; `dims` is "d1,d2"
pub fn frame_row(id: i64, dims: &str, base: &str, modifier: &str) -> String {
    format!(
        "{},{},Frame {},oak,natural,PAPER,FR-{},{},25,{},{}",
        id, id, id, id, dims, base, modifier
    )
}

pub const FRAME_HEADER: &str =
    "id,sortIndex,displayName,material,color,printType,frameSku,dimension1,dimension2,cost,basePrice,priceModifier";
