//! Integration tests for database adapters
//!
//! SQLite tests run everywhere. Tests requiring a PostgreSQL server are
//! marked with `#[ignore]`:
//!
//! ```bash
//! cargo test -p schemamend-catalog --test integration_tests
//!
//! PGHOST=localhost PGPORT=5432 PGDATABASE=students PGUSER=app PGPASSWORD=pass \
//! cargo test -p schemamend-catalog --features postgres --test integration_tests -- --ignored
//! ```

use schemamend_catalog::{connect, CatalogError, DatabaseAdapter, SqliteAdapter};
use schemamend_core::{Config, DatabaseEngine, KeyRole, LogicalType};

/// Check if PostgreSQL credentials are available
#[allow(dead_code)]
fn has_postgres_credentials() -> bool {
    std::env::var("PGHOST").is_ok()
}

#[allow(dead_code)]
fn postgres_conn_str() -> String {
    format!(
        "host={} port={} dbname={} user={} password={}",
        std::env::var("PGHOST").unwrap_or_else(|_| "localhost".to_string()),
        std::env::var("PGPORT").unwrap_or_else(|_| "5432".to_string()),
        std::env::var("PGDATABASE").unwrap_or_else(|_| "postgres".to_string()),
        std::env::var("PGUSER").unwrap_or_else(|_| "postgres".to_string()),
        std::env::var("PGPASSWORD").unwrap_or_default(),
    )
}

// =============================================================================
// SQLite
// =============================================================================

#[tokio::test]
async fn test_sqlite_file_roundtrip_through_connect() {
    let dir = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.project_root = dir.path().to_path_buf();
    config.database.url = "students.sqlite3".to_string();
    config.database.create = true;

    let adapter = connect(&config).await.unwrap();
    assert_eq!(adapter.name(), "SQLite");
    assert_eq!(adapter.engine(), DatabaseEngine::Sqlite);
    adapter.test_connection().await.unwrap();

    adapter
        .execute("CREATE TABLE courses (id INTEGER PRIMARY KEY AUTOINCREMENT, course_name VARCHAR(150))")
        .await
        .unwrap();
    adapter
        .execute("INSERT INTO courses (course_name) VALUES ('Welding')")
        .await
        .unwrap();

    assert!(dir.path().join("students.sqlite3").exists());

    // A fresh connection sees the committed schema and data
    config.database.create = false;
    let reopened = connect(&config).await.unwrap();
    assert!(reopened.has_table("courses").await.unwrap());
    assert!(reopened.has_column("courses", "course_name").await.unwrap());
    assert_eq!(reopened.count_rows("courses").await.unwrap(), 1);

    let columns = reopened.fetch_columns("courses").await.unwrap();
    assert_eq!(columns[0].key, KeyRole::Primary);
    assert_eq!(columns[1].logical_type, LogicalType::String);
}

#[tokio::test]
async fn test_sqlite_failed_statement_leaves_schema_unchanged() {
    let adapter = SqliteAdapter::open_in_memory().unwrap();
    adapter
        .execute_batch(
            "CREATE TABLE fees (id INTEGER PRIMARY KEY, amount DECIMAL(10,2));
             INSERT INTO fees (amount) VALUES (1500.00);",
        )
        .await
        .unwrap();

    let err = adapter
        .execute("ALTER TABLE fees ADD COLUMN created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP")
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Query(_)));
    assert!(!adapter.has_column("fees", "created_at").await.unwrap());

    // The connection remains usable after a failure
    adapter
        .execute("ALTER TABLE fees ADD COLUMN paid_on DATE")
        .await
        .unwrap();
    assert!(adapter.has_column("fees", "paid_on").await.unwrap());
}

#[tokio::test]
async fn test_connect_missing_sqlite_file_without_create() {
    let dir = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.project_root = dir.path().to_path_buf();
    config.database.url = "typo_students.sqlite3".to_string();

    let err = connect(&config).await.err().unwrap();
    assert!(err.is_connectivity());
    assert!(!dir.path().join("typo_students.sqlite3").exists());
}

#[tokio::test]
async fn test_connect_unreachable_sqlite_path() {
    let mut config = Config::default();
    config.database.url = "/nonexistent-schemamend-dir/deeper/app.sqlite3".to_string();

    let err = connect(&config).await.err().unwrap();
    assert!(err.is_connectivity());
}

// =============================================================================
// PostgreSQL (requires a server)
// =============================================================================

#[cfg(feature = "postgres")]
#[tokio::test]
#[ignore]
async fn test_postgres_introspection() {
    use schemamend_catalog::PostgresAdapter;

    if !has_postgres_credentials() {
        eprintln!("Skipping PostgreSQL test: PGHOST not set");
        return;
    }

    let adapter = PostgresAdapter::connect(&postgres_conn_str(), false).await.unwrap();
    adapter.test_connection().await.unwrap();

    adapter
        .execute("DROP TABLE IF EXISTS schemamend_probe")
        .await
        .unwrap();
    adapter
        .execute(
            "CREATE TABLE schemamend_probe (id SERIAL PRIMARY KEY, email VARCHAR(150) UNIQUE, amount NUMERIC(10,2))",
        )
        .await
        .unwrap();

    let columns = adapter.fetch_columns("schemamend_probe").await.unwrap();
    assert_eq!(columns.len(), 3);
    assert_eq!(columns[0].key, KeyRole::Primary);
    assert_eq!(columns[1].key, KeyRole::Unique);
    assert_eq!(columns[1].declared_type, "character varying(150)");
    assert_eq!(
        columns[2].logical_type,
        LogicalType::Decimal { precision: Some(10), scale: Some(2) }
    );

    assert!(adapter.probe("DELETE FROM schemamend_probe").await.is_err());

    adapter.execute("DROP TABLE schemamend_probe").await.unwrap();
}

#[cfg(feature = "postgres")]
#[tokio::test]
#[ignore]
async fn test_postgres_missing_table_is_empty() {
    use schemamend_catalog::PostgresAdapter;

    if !has_postgres_credentials() {
        eprintln!("Skipping PostgreSQL test: PGHOST not set");
        return;
    }

    let adapter = PostgresAdapter::connect(&postgres_conn_str(), false).await.unwrap();
    let columns = adapter.fetch_columns("schemamend_does_not_exist").await.unwrap();
    assert!(columns.is_empty());
}
