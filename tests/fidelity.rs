//! Executes compiled SQL against a live in-memory SQLite database and checks
//! it reaches the same shape the apply engine computes for the same record.

use schemamigrate::prelude::*;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;

async fn in_memory_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .expect("failed to open in-memory sqlite pool")
}

async fn execute_all(pool: &SqlitePool, statements: &[String]) {
    for statement in statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .unwrap_or_else(|err| panic!("statement failed: {statement}: {err}"));
    }
}

async fn live_table_names(pool: &SqlitePool) -> Vec<String> {
    let rows = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table'")
        .fetch_all(pool)
        .await
        .unwrap();
    rows.iter().map(|row| row.get::<String, _>("name")).collect()
}

async fn live_column_names(pool: &SqlitePool, table: &str) -> Vec<String> {
    let rows = sqlx::query(&format!("PRAGMA table_info({table})"))
        .fetch_all(pool)
        .await
        .unwrap();
    rows.iter().map(|row| row.get::<String, _>("name")).collect()
}

#[tokio::test]
async fn empty_schema_creates_two_tables_with_a_foreign_key() {
    let pool = in_memory_pool().await;

    let mut first = TableMigration::new(None, Some("FirstTable"));
    first.add_column_migration(ColumnMigration::new(
        None,
        Some(&Column::new("NewCol", "INTEGER").with_constraints(vec!["NOT NULL".into(), "DEFAULT 1".into()])),
    ));
    first.add_column_migration(ColumnMigration::new(None, Some(&Column::new("SecondCol", "INTEGER"))));
    first.add_fkey_migration(FKeyMigration::new(
        None,
        Some(&ForeignKey::new("NewCol", "SecondTable", "ID").on_update("CASCADE").on_delete("CASCADE")),
    ));

    let mut second = TableMigration::new(None, Some("SecondTable"));
    second.add_column_migration(ColumnMigration::new(
        None,
        Some(&Column::new("ID", "INTEGER").with_constraints(vec!["PRIMARY KEY AUTOINCREMENT".into()])),
    ));

    let mut migration = SchemaMigration::new(0, None);
    migration.add_table_migration(second);
    migration.add_table_migration(first);

    let pre_schema = Schema::new(vec![]);
    let compiled = compile(&migration, &pre_schema);
    execute_all(&pool, &compiled.sql_statements).await;

    let mut expected = pre_schema.copy();
    apply(&mut expected, &migration);

    let live_tables = live_table_names(&pool).await;
    assert!(live_tables.contains(&"FirstTable".to_string()));
    assert!(live_tables.contains(&"SecondTable".to_string()));
    assert!(expected.get_table("FirstTable").is_some());
    assert!(expected.get_table("SecondTable").is_some());
}

#[tokio::test]
async fn pure_rename_preserves_existing_rows() {
    let pool = in_memory_pool().await;
    sqlx::query("CREATE TABLE FirstTable (NewCol INTEGER, SecondCol INTEGER)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO FirstTable (NewCol, SecondCol) VALUES (5, 6)")
        .execute(&pool)
        .await
        .unwrap();

    let mut first = Table::new("FirstTable");
    first.add_column(Column::new("NewCol", "INTEGER"));
    first.add_column(Column::new("SecondCol", "INTEGER"));
    let pre_schema = Schema::new(vec![first.clone()]);

    let mut migration = SchemaMigration::new(0, None);
    migration.add_table_migration(TableMigration::new(Some(&first), Some("REALFirstTable")));

    let compiled = compile(&migration, &pre_schema);
    assert_eq!(
        compiled.sql_statements,
        vec![
            "ALTER TABLE FirstTable RENAME TO PRE_MIGRATION_TABLE_FirstTable;".to_string(),
            "ALTER TABLE PRE_MIGRATION_TABLE_FirstTable RENAME TO REALFirstTable;".to_string(),
        ]
    );
    execute_all(&pool, &compiled.sql_statements).await;

    let row: (i64, i64) = sqlx::query_as("SELECT NewCol, SecondCol FROM REALFirstTable")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(row, (5, 6));
}

#[tokio::test]
async fn adding_a_column_does_not_disturb_existing_rows() {
    let pool = in_memory_pool().await;
    sqlx::query("CREATE TABLE FirstTable (NewCol INTEGER, SecondCol INTEGER)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO FirstTable (NewCol, SecondCol) VALUES (1, 2)")
        .execute(&pool)
        .await
        .unwrap();

    let mut first = Table::new("FirstTable");
    first.add_column(Column::new("NewCol", "INTEGER"));
    first.add_column(Column::new("SecondCol", "INTEGER"));
    let pre_schema = Schema::new(vec![first.clone()]);

    let mut tm = TableMigration::new(Some(&first), Some("FirstTable"));
    tm.add_column_migration(ColumnMigration::new(
        None,
        Some(&Column::new("ThirdColumn", "VARCHAR(255)").with_constraints(vec![
            "NOT NULL".into(),
            "DEFAULT 'TestValue'".into(),
        ])),
    ));
    let mut migration = SchemaMigration::new(0, None);
    migration.add_table_migration(tm);

    let compiled = compile(&migration, &pre_schema);
    execute_all(&pool, &compiled.sql_statements).await;

    let columns = live_column_names(&pool, "FirstTable").await;
    assert!(columns.contains(&"ThirdColumn".to_string()));

    let row: (i64, i64, String) = sqlx::query_as("SELECT NewCol, SecondCol, ThirdColumn FROM FirstTable")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(row, (1, 2, "TestValue".to_string()));
}

#[tokio::test]
async fn removing_a_column_keeps_the_surviving_values() {
    let pool = in_memory_pool().await;
    sqlx::query("CREATE TABLE FirstTable (NewCol INTEGER, SecondCol INTEGER)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO FirstTable (NewCol, SecondCol) VALUES (125, 251)")
        .execute(&pool)
        .await
        .unwrap();

    let mut first = Table::new("FirstTable");
    first.add_column(Column::new("NewCol", "INTEGER"));
    first.add_column(Column::new("SecondCol", "INTEGER"));
    let pre_schema = Schema::new(vec![first.clone()]);

    let mut tm = TableMigration::new(Some(&first), Some("FirstTable"));
    tm.add_column_migration(ColumnMigration::new(Some(&Column::new("NewCol", "INTEGER")), None));
    let mut migration = SchemaMigration::new(0, None);
    migration.add_table_migration(tm);

    let compiled = compile(&migration, &pre_schema);
    execute_all(&pool, &compiled.sql_statements).await;

    let columns = live_column_names(&pool, "FirstTable").await;
    assert_eq!(columns, vec!["SecondCol".to_string()]);

    let row: (i64,) = sqlx::query_as("SELECT SecondCol FROM FirstTable").fetch_one(&pool).await.unwrap();
    assert_eq!(row.0, 251);
}

#[tokio::test]
async fn renaming_a_column_preserves_values_by_position() {
    let pool = in_memory_pool().await;
    sqlx::query("CREATE TABLE FirstTable (NewCol INTEGER, SecondCol INTEGER)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO FirstTable (NewCol, SecondCol) VALUES (123, 456)")
        .execute(&pool)
        .await
        .unwrap();

    let mut first = Table::new("FirstTable");
    first.add_column(Column::new("NewCol", "INTEGER"));
    first.add_column(Column::new("SecondCol", "INTEGER"));
    let pre_schema = Schema::new(vec![first.clone()]);

    let mut tm = TableMigration::new(Some(&first), Some("FirstTable"));
    tm.add_column_migration(ColumnMigration::new(
        Some(&Column::new("NewCol", "INTEGER")),
        Some(&Column::new("ChangedNameCol", "INTEGER")),
    ));
    let mut migration = SchemaMigration::new(0, None);
    migration.add_table_migration(tm);

    let compiled = compile(&migration, &pre_schema);
    execute_all(&pool, &compiled.sql_statements).await;

    let row: (i64, i64) = sqlx::query_as("SELECT ChangedNameCol, SecondCol FROM FirstTable")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(row, (123, 456));
}

#[tokio::test]
async fn removing_a_table_drops_only_that_table() {
    let pool = in_memory_pool().await;
    sqlx::query("CREATE TABLE FirstTable (x INTEGER)").execute(&pool).await.unwrap();
    sqlx::query("CREATE TABLE Other (y INTEGER)").execute(&pool).await.unwrap();

    let first = Table::new("FirstTable");
    let pre_schema = Schema::new(vec![first.clone(), Table::new("Other")]);

    let mut migration = SchemaMigration::new(0, None);
    migration.add_table_migration(TableMigration::new(Some(&first), None));

    let compiled = compile(&migration, &pre_schema);
    assert_eq!(compiled.sql_statements, vec!["DROP TABLE FirstTable;".to_string()]);
    execute_all(&pool, &compiled.sql_statements).await;

    let live_tables = live_table_names(&pool).await;
    assert!(!live_tables.contains(&"FirstTable".to_string()));
    assert!(live_tables.contains(&"Other".to_string()));
}
