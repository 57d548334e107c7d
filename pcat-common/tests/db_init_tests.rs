//! Database initialization tests

use pcat_common::db::{catalog_tables, init_database, SchemaIntrospector};

#[tokio::test]
async fn test_database_creation_when_missing() {
    let temp = tempfile::tempdir().unwrap();
    let db_path = temp.path().join("sub").join("catalog.db");

    let pool = init_database(&db_path).await.unwrap();

    assert!(db_path.exists(), "Database file was not created");
    for table in catalog_tables() {
        assert!(
            SchemaIntrospector::table_exists(&pool, &table.name).await.unwrap(),
            "missing table {}",
            table.name
        );
    }
}

#[tokio::test]
async fn test_database_opens_existing() {
    let temp = tempfile::tempdir().unwrap();
    let db_path = temp.path().join("catalog.db");

    let pool1 = init_database(&db_path).await.unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_foreign_keys_enforced() {
    let temp = tempfile::tempdir().unwrap();
    let pool = init_database(&temp.path().join("catalog.db")).await.unwrap();

    let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(enabled, 1);

    // Join record pointing at a missing photo is rejected
    let result = sqlx::query("INSERT INTO photo_tags (photo_id, tag_id) VALUES (1, 1)")
        .execute(&pool)
        .await;
    assert!(result.is_err());
}
