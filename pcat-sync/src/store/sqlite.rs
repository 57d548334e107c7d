//! SQLite catalog store
//!
//! Statements are built from each kind's static field map, so one
//! implementation serves every entity kind.

use async_trait::async_trait;
use pcat_common::catalog::{FieldType, JoinSpec, StoredColumn};
use pcat_common::{CatalogEntity, EntityKind, FieldValue};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool};
use std::collections::BTreeSet;
use tracing::debug;

use super::{CatalogStore, JoinFilter, JoinRecord, WriteBatch, WriteOp};
use crate::error::{StoreError, StoreResult};

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// [`CatalogStore`] over an sqlx SQLite pool
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wrap a pool whose catalog tables already exist
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn column_list(columns: &[StoredColumn]) -> String {
    std::iter::once("id")
        .chain(columns.iter().map(|c| c.column))
        .collect::<Vec<_>>()
        .join(", ")
}

fn insert_sql(kind: EntityKind, columns: &[StoredColumn]) -> String {
    let placeholders = vec!["?"; columns.len() + 1].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        kind.table(),
        column_list(columns),
        placeholders
    )
}

fn upsert_sql(kind: EntityKind, columns: &[StoredColumn]) -> String {
    let assignments: Vec<String> = columns
        .iter()
        .map(|c| format!("{0} = excluded.{0}", c.column))
        .chain(std::iter::once("updated_at = CURRENT_TIMESTAMP".to_string()))
        .collect();
    format!(
        "{} ON CONFLICT(id) DO UPDATE SET {}",
        insert_sql(kind, columns),
        assignments.join(", ")
    )
}

fn bind_value<'q>(query: SqliteQuery<'q>, value: Option<&FieldValue>) -> SqliteQuery<'q> {
    match value {
        Some(FieldValue::Int(v)) => query.bind(*v),
        Some(FieldValue::Float(v)) => query.bind(*v),
        Some(FieldValue::Bool(v)) => query.bind(*v),
        Some(FieldValue::Text(v)) => query.bind(v.clone()),
        Some(FieldValue::TextList(v)) => query.bind(v.join(",")),
        None => query.bind(None::<String>),
    }
}

async fn write_entity(
    conn: &mut SqliteConnection,
    entity: &CatalogEntity,
    upsert: bool,
) -> Result<(), sqlx::Error> {
    let columns = entity.kind.schema().stored_columns();
    let sql = if upsert {
        upsert_sql(entity.kind, &columns)
    } else {
        insert_sql(entity.kind, &columns)
    };

    let mut query = sqlx::query(&sql).bind(entity.id);
    for column in &columns {
        query = bind_value(query, entity.get(column.name));
    }
    query.execute(&mut *conn).await?;
    Ok(())
}

async fn delete_entity(conn: &mut SqliteConnection, kind: EntityKind, id: i64) -> Result<bool, sqlx::Error> {
    let sql = format!("DELETE FROM {} WHERE id = ?", kind.table());
    let result = sqlx::query(&sql).bind(id).execute(&mut *conn).await?;
    Ok(result.rows_affected() > 0)
}

async fn delete_joins(conn: &mut SqliteConnection, filter: &JoinFilter) -> Result<u64, sqlx::Error> {
    let JoinFilter::OwnedBy { join, owner_id } = filter;
    let sql = format!("DELETE FROM {} WHERE {} = ?", join.table, join.owner_column);
    let result = sqlx::query(&sql).bind(*owner_id).execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

async fn insert_join(conn: &mut SqliteConnection, record: &JoinRecord) -> Result<(), sqlx::Error> {
    let sql = format!(
        "INSERT OR IGNORE INTO {} ({}, {}) VALUES (?, ?)",
        record.join.table, record.join.owner_column, record.join.target_column
    );
    sqlx::query(&sql)
        .bind(record.owner_id)
        .bind(record.target_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn apply(conn: &mut SqliteConnection, op: &WriteOp) -> Result<(), sqlx::Error> {
    match op {
        WriteOp::Insert(entity) => write_entity(conn, entity, false).await,
        WriteOp::Save(entity) => write_entity(conn, entity, true).await,
        WriteOp::Delete { kind, id } => delete_entity(conn, *kind, *id).await.map(|_| ()),
        WriteOp::DeleteWhere(filter) => delete_joins(conn, filter).await.map(|_| ()),
        WriteOp::InsertJoin(record) => insert_join(conn, record).await,
    }
}

fn decode_row(kind: EntityKind, columns: &[StoredColumn], row: &SqliteRow) -> StoreResult<CatalogEntity> {
    let id: i64 = row.try_get("id")?;
    let mut entity = CatalogEntity::new(kind, id);

    for column in columns {
        let value = match column.ty {
            FieldType::Int => row.try_get::<Option<i64>, _>(column.column)?.map(FieldValue::Int),
            FieldType::Float => row.try_get::<Option<f64>, _>(column.column)?.map(FieldValue::Float),
            FieldType::Bool => row
                .try_get::<Option<i64>, _>(column.column)?
                .map(|v| FieldValue::Bool(v != 0)),
            FieldType::Text => row.try_get::<Option<String>, _>(column.column)?.map(FieldValue::Text),
            FieldType::TextList => row.try_get::<Option<String>, _>(column.column)?.map(|s| {
                FieldValue::TextList(
                    s.split(',')
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string)
                        .collect(),
                )
            }),
        };
        if let Some(value) = value {
            entity.set(column.name, value);
        }
    }

    Ok(entity)
}

#[async_trait]
impl CatalogStore for SqliteStore {
    async fn find_all_ids(&self, kind: EntityKind) -> StoreResult<BTreeSet<i64>> {
        let sql = format!("SELECT id FROM {}", kind.table());
        let ids: Vec<i64> = sqlx::query_scalar(&sql).fetch_all(&self.pool).await?;
        Ok(ids.into_iter().collect())
    }

    async fn find_all(&self, kind: EntityKind) -> StoreResult<Vec<CatalogEntity>> {
        let columns = kind.schema().stored_columns();
        let sql = format!("SELECT {} FROM {} ORDER BY id", column_list(&columns), kind.table());
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(|row| decode_row(kind, &columns, row)).collect()
    }

    async fn find_by_id(&self, kind: EntityKind, id: i64) -> StoreResult<Option<CatalogEntity>> {
        let columns = kind.schema().stored_columns();
        let sql = format!("SELECT {} FROM {} WHERE id = ?", column_list(&columns), kind.table());
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.map(|row| decode_row(kind, &columns, &row)).transpose()
    }

    async fn exists(&self, kind: EntityKind, id: i64) -> StoreResult<bool> {
        let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?)", kind.table());
        let exists: bool = sqlx::query_scalar(&sql).bind(id).fetch_one(&self.pool).await?;
        Ok(exists)
    }

    async fn find_join_targets(&self, join: &'static JoinSpec, owner_id: i64) -> StoreResult<Vec<i64>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ? ORDER BY {}",
            join.target_column, join.table, join.owner_column, join.target_column
        );
        let ids: Vec<i64> = sqlx::query_scalar(&sql).bind(owner_id).fetch_all(&self.pool).await?;
        Ok(ids)
    }

    async fn insert(&self, entity: &CatalogEntity) -> StoreResult<()> {
        let mut conn = self.pool.acquire().await?;
        write_entity(&mut conn, entity, false).await?;
        Ok(())
    }

    async fn save(&self, entity: &CatalogEntity) -> StoreResult<()> {
        let mut conn = self.pool.acquire().await?;
        write_entity(&mut conn, entity, true).await?;
        Ok(())
    }

    async fn delete(&self, kind: EntityKind, id: i64) -> StoreResult<bool> {
        let mut conn = self.pool.acquire().await?;
        Ok(delete_entity(&mut conn, kind, id).await?)
    }

    async fn delete_where(&self, filter: &JoinFilter) -> StoreResult<u64> {
        let mut conn = self.pool.acquire().await?;
        Ok(delete_joins(&mut conn, filter).await?)
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        for (index, op) in batch.ops().iter().enumerate() {
            if let Err(source) = apply(&mut *tx, op).await {
                debug!(index, operation = %op.describe(), "Write batch failed, rolling back");
                // Dropping the transaction rolls it back
                return Err(StoreError::Batch {
                    index,
                    operation: op.describe(),
                    source,
                });
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcat_common::db::create_catalog_tables;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        create_catalog_tables(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    fn tag(id: i64, name: &str) -> CatalogEntity {
        let mut e = CatalogEntity::new(EntityKind::Tag, id);
        e.set("sortIndex", FieldValue::Int(id));
        e.set("name", FieldValue::Text(name.to_string()));
        e
    }

    #[test]
    fn test_upsert_sql_shape() {
        let columns = EntityKind::Tag.schema().stored_columns();
        let sql = upsert_sql(EntityKind::Tag, &columns);
        assert!(sql.starts_with("INSERT INTO tags (id, sort_index, name, description) VALUES (?, ?, ?, ?)"));
        assert!(sql.contains("ON CONFLICT(id) DO UPDATE SET sort_index = excluded.sort_index"));
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = setup_store().await;
        store.insert(&tag(1, "sunset")).await.unwrap();

        let found = store.find_by_id(EntityKind::Tag, 1).await.unwrap().unwrap();
        assert_eq!(found, tag(1, "sunset"));
        assert!(store.exists(EntityKind::Tag, 1).await.unwrap());
        assert!(!store.exists(EntityKind::Tag, 2).await.unwrap());
        assert!(store.find_by_id(EntityKind::Tag, 2).await.unwrap().is_none());

        // Insert of an existing identity is rejected
        assert!(store.insert(&tag(1, "dupe")).await.is_err());
    }

    #[tokio::test]
    async fn test_save_is_last_write_wins() {
        let store = setup_store().await;
        store.save(&tag(1, "first")).await.unwrap();
        store.save(&tag(1, "second")).await.unwrap();

        let all = store.find_all(EntityKind::Tag).await.unwrap();
        assert_eq!(all, vec![tag(1, "second")]);
    }

    #[tokio::test]
    async fn test_text_list_and_bool_roundtrip() {
        let store = setup_store().await;
        let mut image = CatalogEntity::new(EntityKind::ShareImage, 4);
        for spec in EntityKind::ShareImage.schema().fields {
            if let Some(default) = spec.default {
                image.set(spec.name, default.to_value());
            }
        }
        image.set("width", FieldValue::Int(1200));
        image.set("height", FieldValue::Int(500));
        image.recompute_derived().unwrap();
        store.insert(&image).await.unwrap();

        let found = store.find_by_id(EntityKind::ShareImage, 4).await.unwrap().unwrap();
        assert_eq!(found.get("isPanoramic"), Some(&FieldValue::Bool(true)));
        assert_eq!(found.get("isPortrait"), Some(&FieldValue::Bool(false)));
        assert_eq!(found, image);
    }

    #[tokio::test]
    async fn test_commit_rolls_back_on_failure() {
        let store = setup_store().await;
        store.insert(&tag(1, "kept")).await.unwrap();

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::Save(tag(2, "rolled back")));
        batch.push(WriteOp::Insert(tag(1, "conflict")));

        let err = store.commit(batch).await.unwrap_err();
        assert_eq!(err.failed_operation(), Some(1));
        assert!(!store.exists(EntityKind::Tag, 2).await.unwrap());
    }

    #[tokio::test]
    async fn test_joins_delete_where() {
        let store = setup_store().await;
        let join = EntityKind::Photo.schema().join("tagIds").unwrap();
        store.insert(&tag(1, "a")).await.unwrap();
        store.insert(&tag(2, "b")).await.unwrap();

        let mut photo = CatalogEntity::new(EntityKind::Photo, 10);
        for spec in EntityKind::Photo.schema().fields {
            match spec.default {
                Some(default) => photo.set(spec.name, default.to_value()),
                None => photo.set(spec.name, FieldValue::Float(100.0)),
            }
        }
        photo.recompute_derived().unwrap();

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::Insert(photo));
        for target_id in [2, 1] {
            batch.push(WriteOp::InsertJoin(JoinRecord { join, owner_id: 10, target_id }));
        }
        store.commit(batch).await.unwrap();
        assert_eq!(store.find_join_targets(join, 10).await.unwrap(), vec![1, 2]);

        // Owned join records block deletion of the owner
        assert!(store.delete(EntityKind::Photo, 10).await.is_err());

        let removed = store
            .delete_where(&JoinFilter::OwnedBy { join, owner_id: 10 })
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert!(store.delete(EntityKind::Photo, 10).await.unwrap());
        assert!(!store.delete(EntityKind::Photo, 10).await.unwrap());
    }
}
