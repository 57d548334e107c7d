//! Automatic schema synchronization
//!
//! Table definitions are derived from the catalog field maps, so adding a
//! field to an entity kind adds the column on the next startup.
//!
//! Two-phase initialization:
//! 1. **CREATE TABLE IF NOT EXISTS** - create missing tables
//! 2. **Auto-sync** - add missing columns via ALTER TABLE
//!
//! Type or constraint drift is reported but never rewritten.

use crate::catalog::{EntityKind, FieldType};
use crate::Result;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

/// Column definition with SQL constraints
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    /// SQL type ("TEXT", "INTEGER", "REAL")
    pub sql_type: String,
    pub not_null: bool,
    pub primary_key: bool,
    pub default_value: Option<String>,
    /// REFERENCES clause target (table, column, on-delete action)
    pub references: Option<(String, String, &'static str)>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            not_null: false,
            primary_key: false,
            default_value: None,
            references: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn references(
        mut self,
        table: impl Into<String>,
        column: impl Into<String>,
        on_delete: &'static str,
    ) -> Self {
        self.references = Some((table.into(), column.into(), on_delete));
        self
    }

    fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.sql_type);
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default_value {
            sql.push_str(&format!(" DEFAULT {}", default));
        }
        if let Some((table, column, on_delete)) = &self.references {
            sql.push_str(&format!(" REFERENCES {}({}) ON DELETE {}", table, column, on_delete));
        }
        sql
    }
}

/// Expected shape of one table
#[derive(Debug, Clone)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    /// Composite primary key (join tables)
    pub composite_key: Option<Vec<String>>,
}

impl TableDefinition {
    pub fn create_sql(&self) -> String {
        let mut parts: Vec<String> = self.columns.iter().map(ColumnDefinition::to_sql).collect();
        if let Some(key) = &self.composite_key {
            parts.push(format!("PRIMARY KEY ({})", key.join(", ")));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            self.name,
            parts.join(",\n    ")
        )
    }
}

/// Entity table for one kind: identity, scalars, foreign keys, derived columns
pub fn entity_table(kind: EntityKind) -> TableDefinition {
    let schema = kind.schema();
    let mut columns = vec![ColumnDefinition::new("id", "INTEGER").primary_key()];

    for field in schema.fields {
        let mut col = ColumnDefinition::new(field.column, field.ty.sql_type());
        if !field.nullable {
            col = col.not_null();
        }
        if let Some(default) = field.default {
            col = col.default(default.sql_literal());
        }
        columns.push(col);
    }

    for fk in schema.foreign_keys {
        columns.push(
            ColumnDefinition::new(fk.column, FieldType::Int.sql_type()).references(
                fk.target.table(),
                "id",
                "SET NULL",
            ),
        );
    }

    for derived in schema.derived.columns() {
        let mut col = ColumnDefinition::new(derived.column, derived.ty.sql_type());
        if let Some(default) = derived.default {
            col = col.default(default.sql_literal());
        }
        columns.push(col);
    }

    columns.push(
        ColumnDefinition::new("created_at", "TEXT")
            .not_null()
            .default("CURRENT_TIMESTAMP"),
    );
    columns.push(
        ColumnDefinition::new("updated_at", "TEXT")
            .not_null()
            .default("CURRENT_TIMESTAMP"),
    );

    TableDefinition {
        name: kind.table().to_string(),
        columns,
        composite_key: None,
    }
}

/// Join tables owned by one kind
///
/// The owner reference has no ON DELETE action: owned join records must be
/// removed before their owner, and the database enforces that order.
pub fn join_tables(kind: EntityKind) -> Vec<TableDefinition> {
    kind.schema()
        .joins
        .iter()
        .map(|join| TableDefinition {
            name: join.table.to_string(),
            columns: vec![
                ColumnDefinition::new(join.owner_column, "INTEGER")
                    .not_null()
                    .references(kind.table(), "id", "NO ACTION"),
                ColumnDefinition::new(join.target_column, "INTEGER")
                    .not_null()
                    .references(join.target.table(), "id", "CASCADE"),
            ],
            composite_key: Some(vec![
                join.owner_column.to_string(),
                join.target_column.to_string(),
            ]),
        })
        .collect()
}

/// Every catalog table in creation order
pub fn catalog_tables() -> Vec<TableDefinition> {
    let mut tables: Vec<TableDefinition> = EntityKind::ALL.iter().map(|k| entity_table(*k)).collect();
    for kind in EntityKind::ALL {
        tables.extend(join_tables(kind));
    }
    tables
}

/// Actual column from PRAGMA table_info
#[derive(Debug, Clone)]
pub struct ActualColumn {
    pub name: String,
    pub type_name: String,
    pub not_null: bool,
}

/// Drift between expected and actual schema
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaDrift {
    MissingColumn { table: String, column: ColumnDefinition },
    TypeMismatch { table: String, column: String, expected: String, actual: String },
}

pub struct SchemaIntrospector;

impl SchemaIntrospector {
    pub async fn introspect_table(pool: &SqlitePool, table_name: &str) -> Result<Vec<ActualColumn>> {
        let query = format!("PRAGMA table_info({})", table_name);
        let rows = sqlx::query(&query).fetch_all(pool).await?;

        Ok(rows
            .iter()
            .map(|row| ActualColumn {
                name: row.get("name"),
                type_name: row.get("type"),
                not_null: row.get::<i32, _>("notnull") != 0,
            })
            .collect())
    }

    pub async fn table_exists(pool: &SqlitePool, table_name: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM sqlite_master
                WHERE type='table' AND name = ?
            )
            "#,
        )
        .bind(table_name)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }
}

/// Compare expected columns with the live table
pub fn compare(table: &TableDefinition, actual: &[ActualColumn]) -> Vec<SchemaDrift> {
    table
        .columns
        .iter()
        .filter_map(|expected| match actual.iter().find(|c| c.name == expected.name) {
            None => Some(SchemaDrift::MissingColumn {
                table: table.name.clone(),
                column: expected.clone(),
            }),
            Some(found) if !types_compatible(&expected.sql_type, &found.type_name) => {
                Some(SchemaDrift::TypeMismatch {
                    table: table.name.clone(),
                    column: expected.name.clone(),
                    expected: expected.sql_type.clone(),
                    actual: found.type_name.clone(),
                })
            }
            Some(_) => None,
        })
        .collect()
}

/// SQLite type affinity comparison
fn types_compatible(expected: &str, actual: &str) -> bool {
    let affinity = |t: &str| {
        let t = t.to_uppercase();
        if t.contains("INT") {
            "INTEGER"
        } else if t.contains("CHAR") || t.contains("TEXT") || t.contains("CLOB") {
            "TEXT"
        } else if t.contains("REAL") || t.contains("FLOA") || t.contains("DOUB") {
            "REAL"
        } else {
            "NUMERIC"
        }
    };
    affinity(expected) == affinity(actual)
}

/// Create the table if missing, then add any missing columns
pub async fn sync_table(pool: &SqlitePool, table: &TableDefinition) -> Result<()> {
    sqlx::query(&table.create_sql()).execute(pool).await?;

    let actual = SchemaIntrospector::introspect_table(pool, &table.name).await?;
    let drift = compare(table, &actual);

    if drift.is_empty() {
        debug!("Schema up to date for '{}'", table.name);
        return Ok(());
    }

    for change in drift {
        match change {
            SchemaDrift::MissingColumn { table, column } => add_column(pool, &table, &column).await?,
            SchemaDrift::TypeMismatch { table, column, expected, actual } => {
                warn!(
                    "Type mismatch in {}.{}: expected '{}', found '{}'. Manual migration required.",
                    table, column, expected, actual
                );
            }
        }
    }

    Ok(())
}

async fn add_column(pool: &SqlitePool, table: &str, column: &ColumnDefinition) -> Result<()> {
    let mut sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, column.name, column.sql_type);

    // SQLite only accepts NOT NULL on an added column when it has a constant default
    let default = column
        .default_value
        .as_ref()
        .filter(|d| !d.starts_with("CURRENT_"));
    match (default, column.not_null) {
        (Some(default), true) => sql.push_str(&format!(" NOT NULL DEFAULT {}", default)),
        (Some(default), false) => sql.push_str(&format!(" DEFAULT {}", default)),
        (None, true) => warn!(
            "Cannot add NOT NULL column {}.{} without DEFAULT value. Column will be nullable.",
            table, column.name
        ),
        (None, false) => {}
    }

    info!("Adding column: {}.{} ({})", table, column.name, column.sql_type);

    match sqlx::query(&sql).execute(pool).await {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(db_err)) if db_err.message().contains("duplicate column") => {
            info!("Column {}.{} already added (concurrent initialization)", table, column.name);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Create or update every catalog table
pub async fn sync_all_tables(pool: &SqlitePool) -> Result<()> {
    for table in catalog_tables() {
        sync_table(pool, &table).await?;
    }
    info!("Catalog schema synchronized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[test]
    fn test_column_definition_sql() {
        let col = ColumnDefinition::new("price_modifier", "REAL")
            .not_null()
            .default("1.0");
        assert_eq!(col.to_sql(), "price_modifier REAL NOT NULL DEFAULT 1.0");

        let fk = ColumnDefinition::new("product_image_id", "INTEGER")
            .references("product_images", "id", "SET NULL");
        assert_eq!(
            fk.to_sql(),
            "product_image_id INTEGER REFERENCES product_images(id) ON DELETE SET NULL"
        );
    }

    #[test]
    fn test_photo_tables() {
        let photos = entity_table(EntityKind::Photo);
        let names: Vec<_> = photos.columns.iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"share_image_id"));
        assert!(names.contains(&"sku"));
        assert!(names.contains(&"print_types"));

        let joins = join_tables(EntityKind::Photo);
        assert_eq!(joins.len(), 3);
        assert!(joins[0].create_sql().contains("PRIMARY KEY (photo_id, subject_id)"));
    }

    #[test]
    fn test_types_compatible() {
        assert!(types_compatible("INTEGER", "INT"));
        assert!(types_compatible("TEXT", "VARCHAR(20)"));
        assert!(types_compatible("REAL", "DOUBLE"));
        assert!(!types_compatible("TEXT", "INTEGER"));
    }

    #[tokio::test]
    async fn test_sync_all_tables_idempotent() {
        let pool = setup_test_db().await;
        sync_all_tables(&pool).await.unwrap();
        sync_all_tables(&pool).await.unwrap();

        for table in catalog_tables() {
            assert!(SchemaIntrospector::table_exists(&pool, &table.name).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_missing_column_added() {
        let pool = setup_test_db().await;
        sqlx::query("CREATE TABLE tags (id INTEGER PRIMARY KEY, sort_index INTEGER NOT NULL, name TEXT NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();

        sync_table(&pool, &entity_table(EntityKind::Tag)).await.unwrap();

        let actual = SchemaIntrospector::introspect_table(&pool, "tags").await.unwrap();
        assert!(actual.iter().any(|c| c.name == "description"));
        assert!(actual.iter().any(|c| c.name == "updated_at"));
    }
}
