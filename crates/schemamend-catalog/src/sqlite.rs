//! SQLite adapter using `sqlite_master` and `PRAGMA table_info`
//!
//! The connection lives behind an async mutex so the adapter satisfies the
//! `Send + Sync` bound of [`DatabaseAdapter`]. All statement work happens in
//! plain synchronous helpers while the lock is held; no rusqlite statement
//! crosses an await point.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let adapter = SqliteAdapter::open("students.sqlite3")?;
//! let fresh = SqliteAdapter::open_or_create("scratch.sqlite3")?;
//! let columns = adapter.fetch_columns("batches").await?;
//! ```

use crate::adapter::{quote_ident, CatalogError, DatabaseAdapter};
use rusqlite::{Connection, ErrorCode, OpenFlags};
use schemamend_core::{ColumnDescriptor, DatabaseEngine, KeyRole, Nullability};
use std::collections::HashSet;
use std::path::Path;
use tokio::sync::Mutex;

/// SQLite database adapter
pub struct SqliteAdapter {
    conn: Mutex<Connection>,

    /// File path, or ":memory:"
    path: String,
}

impl SqliteAdapter {
    /// Open an existing database file
    ///
    /// A missing file is a [`CatalogError::Connection`]; nothing is created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        Self::open_with(path.as_ref(), false)
    }

    /// Open a database file, creating it when it does not exist
    pub fn open_or_create(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        Self::open_with(path.as_ref(), true)
    }

    fn open_with(path: &Path, create: bool) -> Result<Self, CatalogError> {
        if !create && !path.exists() {
            return Err(CatalogError::Connection(format!(
                "SQLite database {} does not exist (set database.create = true to create it)",
                path.display()
            )));
        }

        let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        if create {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }

        let conn = Connection::open_with_flags(path, flags).map_err(|e| {
            CatalogError::Connection(format!("Failed to open SQLite database {}: {}", path.display(), e))
        })?;

        tracing::debug!(path = %path.display(), create, "opened SQLite database");

        Ok(Self {
            conn: Mutex::new(conn),
            path: path.display().to_string(),
        })
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, CatalogError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CatalogError::Connection(e.to_string()))?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap an existing connection
    pub fn from_connection(conn: Connection) -> Self {
        let path = conn
            .path()
            .filter(|p| !p.is_empty())
            .map(|p| p.to_string())
            .unwrap_or_else(|| ":memory:".to_string());

        Self {
            conn: Mutex::new(conn),
            path,
        }
    }

    /// Run arbitrary SQL outside the reconciliation flow (fixtures, seeding)
    pub async fn execute_batch(&self, sql: &str) -> Result<(), CatalogError> {
        let conn = self.conn.lock().await;
        conn.execute_batch(sql).map_err(map_sqlite_error)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
            [table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn list_tables_sync(conn: &Connection) -> rusqlite::Result<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    /// Columns covered by a single-column UNIQUE index
    fn unique_columns(conn: &Connection, table: &str) -> rusqlite::Result<HashSet<String>> {
        let mut indexes = Vec::new();
        {
            let mut stmt = conn.prepare(&format!("PRAGMA index_list({})", quote_ident(table)))?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let name: String = row.get("name")?;
                let unique: i64 = row.get("unique")?;
                let origin: String = row.get("origin")?;
                if unique == 1 && origin != "pk" {
                    indexes.push(name);
                }
            }
        }

        let mut columns = HashSet::new();
        for index in indexes {
            let mut stmt = conn.prepare(&format!("PRAGMA index_info({})", quote_ident(&index)))?;
            let names = stmt
                .query_map([], |row| row.get::<_, Option<String>>("name"))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            if let [Some(name)] = names.as_slice() {
                columns.insert(name.clone());
            }
        }

        Ok(columns)
    }

    fn fetch_columns_sync(conn: &Connection, table: &str) -> rusqlite::Result<Vec<ColumnDescriptor>> {
        if !Self::table_exists(conn, table)? {
            return Ok(Vec::new());
        }

        let unique = Self::unique_columns(conn, table)?;

        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
        let mut rows = stmt.query([])?;
        let mut columns = Vec::new();

        while let Some(row) = rows.next()? {
            let cid: i64 = row.get("cid")?;
            let name: String = row.get("name")?;
            let declared_type: String = row.get("type")?;
            let not_null: i64 = row.get("notnull")?;
            let default: Option<String> = row.get("dflt_value")?;
            let pk: i64 = row.get("pk")?;

            let key = if pk > 0 {
                KeyRole::Primary
            } else if unique.contains(&name) {
                KeyRole::Unique
            } else {
                KeyRole::None
            };

            // SQLite reports INTEGER PRIMARY KEY as nullable even though rowid aliases never are
            let nullable = if not_null == 1 || pk > 0 {
                Nullability::No
            } else {
                Nullability::Yes
            };

            columns.push(
                ColumnDescriptor::new(name, declared_type, (cid + 1) as usize)
                    .with_nullability(nullable)
                    .with_key(key)
                    .with_default(default),
            );
        }

        Ok(columns)
    }

    fn probe_sync(conn: &Connection, sql: &str) -> Result<u64, CatalogError> {
        let mut stmt = conn.prepare(sql).map_err(map_sqlite_error)?;
        if !stmt.readonly() {
            return Err(CatalogError::Query(
                "statement would modify the database; only read queries can be probed".to_string(),
            ));
        }

        let mut rows = stmt.query([]).map_err(map_sqlite_error)?;
        let mut count = 0u64;
        while rows.next().map_err(map_sqlite_error)?.is_some() {
            count += 1;
        }
        Ok(count)
    }
}

/// Map rusqlite errors onto the catalog taxonomy
fn map_sqlite_error(e: rusqlite::Error) -> CatalogError {
    match e.sqlite_error_code() {
        Some(ErrorCode::CannotOpen) | Some(ErrorCode::NotADatabase) => {
            CatalogError::Connection(e.to_string())
        }
        Some(ErrorCode::PermissionDenied) | Some(ErrorCode::ReadOnly) => {
            CatalogError::PermissionDenied(e.to_string())
        }
        _ => CatalogError::Query(e.to_string()),
    }
}

#[async_trait::async_trait]
impl DatabaseAdapter for SqliteAdapter {
    fn name(&self) -> &'static str {
        "SQLite"
    }

    fn engine(&self) -> DatabaseEngine {
        DatabaseEngine::Sqlite
    }

    fn target(&self) -> String {
        self.path.clone()
    }

    async fn test_connection(&self) -> Result<(), CatalogError> {
        let conn = self.conn.lock().await;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map(|_| ())
            .map_err(|e| match map_sqlite_error(e) {
                CatalogError::Query(msg) => CatalogError::Connection(msg),
                other => other,
            })
    }

    async fn list_tables(&self) -> Result<Vec<String>, CatalogError> {
        let conn = self.conn.lock().await;
        Self::list_tables_sync(&conn).map_err(map_sqlite_error)
    }

    async fn fetch_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>, CatalogError> {
        let conn = self.conn.lock().await;
        Self::fetch_columns_sync(&conn, table).map_err(map_sqlite_error)
    }

    async fn count_where(&self, table: &str, predicate: Option<&str>) -> Result<u64, CatalogError> {
        let sql = match predicate {
            Some(predicate) => format!("SELECT COUNT(*) FROM {} WHERE {}", quote_ident(table), predicate),
            None => format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
        };

        let conn = self.conn.lock().await;
        let count: i64 = conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(map_sqlite_error)?;
        Ok(count.max(0) as u64)
    }

    async fn execute(&self, sql: &str) -> Result<u64, CatalogError> {
        tracing::debug!(sql, "executing on SQLite");

        let mut conn = self.conn.lock().await;
        let tx = conn.transaction().map_err(map_sqlite_error)?;
        let affected = tx.execute(sql, []).map_err(map_sqlite_error)?;
        tx.commit().map_err(map_sqlite_error)?;
        Ok(affected as u64)
    }

    async fn probe(&self, sql: &str) -> Result<u64, CatalogError> {
        let conn = self.conn.lock().await;
        Self::probe_sync(&conn, sql)
    }
}
