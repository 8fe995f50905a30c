//! PostgreSQL adapter using information_schema
//!
//! Columns come from `information_schema.columns` and key roles from
//! `table_constraints`, both restricted to `current_schema()`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let adapter = PostgresAdapter::connect(
//!     "host=localhost port=5432 dbname=students user=app password=secret",
//!     false,
//! ).await?;
//!
//! // TLS; sslmode in the string is ignored, TLS is always used
//! let adapter = PostgresAdapter::connect("postgres://app@db.example.com/students", true).await?;
//! ```
//!
//! Without the `postgres` feature every constructor returns
//! [`CatalogError::Config`].

use crate::adapter::{CatalogError, DatabaseAdapter};
use schemamend_core::{ColumnDescriptor, DatabaseEngine};

#[cfg(feature = "postgres")]
use crate::adapter::quote_ident;

#[cfg(feature = "postgres")]
use schemamend_core::{KeyRole, Nullability};

#[cfg(feature = "postgres")]
use tokio_postgres::{config::Host, error::SqlState, Client, Config as PgConfig, NoTls};

#[cfg(feature = "postgres")]
use postgres_native_tls::MakeTlsConnector;

#[cfg(feature = "postgres")]
use native_tls::TlsConnector;

#[cfg(feature = "postgres")]
use tokio::sync::Mutex;

#[cfg(not(feature = "postgres"))]
const NOT_COMPILED: &str =
    "PostgreSQL support not compiled. Rebuild with: cargo build --features postgres";

/// PostgreSQL database adapter
pub struct PostgresAdapter {
    /// Transactions need `&mut Client`
    #[cfg(feature = "postgres")]
    client: Mutex<Client>,

    host: String,

    port: u16,

    database: String,
}

impl PostgresAdapter {
    /// Connect using a key/value or URL connection string
    #[cfg(feature = "postgres")]
    pub async fn connect(conn_str: &str, tls: bool) -> Result<Self, CatalogError> {
        let config: PgConfig = conn_str
            .parse()
            .map_err(|e| CatalogError::Config(format!("Invalid connection string: {}", e)))?;

        let host = config
            .get_hosts()
            .first()
            .map(|h| match h {
                Host::Tcp(name) => name.clone(),
                #[allow(unreachable_patterns)]
                other => format!("{:?}", other),
            })
            .unwrap_or_else(|| "localhost".to_string());
        let port = config.get_ports().first().copied().unwrap_or(5432);
        let database = config.get_dbname().unwrap_or("postgres").to_string();

        let client = if tls {
            let connector = TlsConnector::builder()
                .build()
                .map_err(|e| CatalogError::Config(format!("Failed to create TLS connector: {}", e)))?;

            let (client, connection) = config
                .connect(MakeTlsConnector::new(connector))
                .await
                .map_err(|e| CatalogError::Connection(format!(
                    "Failed to connect to PostgreSQL at {}:{} with TLS: {}",
                    host, port, e
                )))?;

            let (h, p) = (host.clone(), port);
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::error!(host = %h, port = p, "PostgreSQL TLS connection error: {}", e);
                }
            });
            client
        } else {
            let (client, connection) = config.connect(NoTls).await.map_err(|e| {
                CatalogError::Connection(format!(
                    "Failed to connect to PostgreSQL at {}:{}: {}",
                    host, port, e
                ))
            })?;

            let (h, p) = (host.clone(), port);
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::error!(host = %h, port = p, "PostgreSQL connection error: {}", e);
                }
            });
            client
        };

        tracing::debug!(%host, port, %database, tls, "connected to PostgreSQL");

        Ok(Self {
            client: Mutex::new(client),
            host,
            port,
            database,
        })
    }

    /// Create adapter without postgres feature (returns error)
    #[cfg(not(feature = "postgres"))]
    pub async fn connect(_conn_str: &str, _tls: bool) -> Result<Self, CatalogError> {
        Err(CatalogError::Config(NOT_COMPILED.to_string()))
    }

    /// Rebuild a full type string from information_schema parts
    ///
    /// `numeric` gains its precision/scale and character types their length,
    /// so the result parses the same way as declared DDL types.
    pub fn full_type(
        data_type: &str,
        precision: Option<i32>,
        scale: Option<i32>,
        max_length: Option<i32>,
    ) -> String {
        match data_type {
            "numeric" | "decimal" => match (precision, scale) {
                (Some(p), Some(s)) => format!("numeric({},{})", p, s),
                (Some(p), None) => format!("numeric({})", p),
                _ => data_type.to_string(),
            },
            "character varying" | "character" => match max_length {
                Some(len) => format!("{}({})", data_type, len),
                None => data_type.to_string(),
            },
            _ => data_type.to_string(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn database(&self) -> &str {
        &self.database
    }
}

#[cfg(feature = "postgres")]
fn map_pg_error(e: tokio_postgres::Error) -> CatalogError {
    if is_connection_loss(e.is_closed(), std::error::Error::source(&e)) {
        return CatalogError::Connection(e.to_string());
    }

    match e.as_db_error() {
        Some(db) if *db.code() == SqlState::INSUFFICIENT_PRIVILEGE => {
            CatalogError::PermissionDenied(db.message().to_string())
        }
        Some(db) => CatalogError::Query(db.message().to_string()),
        None => CatalogError::Query(e.to_string()),
    }
}

/// Closed client, or an I/O error anywhere in the cause chain (reset socket, EOF)
#[cfg(any(feature = "postgres", test))]
fn is_connection_loss(closed: bool, source: Option<&(dyn std::error::Error + 'static)>) -> bool {
    closed
        || std::iter::successors(source, |e| e.source()).any(|e| e.is::<std::io::Error>())
}

#[async_trait::async_trait]
impl DatabaseAdapter for PostgresAdapter {
    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    fn engine(&self) -> DatabaseEngine {
        DatabaseEngine::Postgres
    }

    fn target(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }

    #[cfg(feature = "postgres")]
    async fn test_connection(&self) -> Result<(), CatalogError> {
        let client = self.client.lock().await;
        client
            .query("SELECT 1", &[])
            .await
            .map_err(|e| CatalogError::Connection(format!("Connection test failed: {}", e)))?;
        Ok(())
    }

    #[cfg(feature = "postgres")]
    async fn list_tables(&self) -> Result<Vec<String>, CatalogError> {
        let query = r#"
            SELECT table_name::text
            FROM information_schema.tables
            WHERE table_schema = current_schema()
              AND table_type = 'BASE TABLE'
            ORDER BY table_name
        "#;

        let client = self.client.lock().await;
        let rows = client.query(query, &[]).await.map_err(map_pg_error)?;
        Ok(rows.iter().map(|row| row.get::<_, String>(0)).collect())
    }

    #[cfg(feature = "postgres")]
    async fn fetch_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>, CatalogError> {
        let columns_query = r#"
            SELECT
                column_name::text,
                data_type::text,
                is_nullable::text,
                ordinal_position::int4,
                numeric_precision::int4,
                numeric_scale::int4,
                character_maximum_length::int4,
                column_default::text
            FROM information_schema.columns
            WHERE table_schema = current_schema()
              AND table_name = $1
            ORDER BY ordinal_position
        "#;

        let keys_query = r#"
            SELECT kcu.column_name::text, tc.constraint_type::text
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
              ON tc.constraint_name = kcu.constraint_name
             AND tc.table_schema = kcu.table_schema
             AND tc.table_name = kcu.table_name
            WHERE tc.table_schema = current_schema()
              AND tc.table_name = $1
              AND tc.constraint_type IN ('PRIMARY KEY', 'UNIQUE')
        "#;

        let client = self.client.lock().await;
        let rows = client.query(columns_query, &[&table]).await.map_err(map_pg_error)?;
        let key_rows = client.query(keys_query, &[&table]).await.map_err(map_pg_error)?;

        let key_of = |column: &str| -> KeyRole {
            let mut role = KeyRole::None;
            for row in &key_rows {
                let name: String = row.get(0);
                if name != column {
                    continue;
                }
                let constraint: String = row.get(1);
                if constraint == "PRIMARY KEY" {
                    return KeyRole::Primary;
                }
                role = KeyRole::Unique;
            }
            role
        };

        let mut columns = Vec::new();
        for row in rows {
            let name: String = row.get(0);
            let data_type: String = row.get(1);
            let is_nullable: String = row.get(2);
            let ordinal: i32 = row.get(3);
            let precision: Option<i32> = row.get(4);
            let scale: Option<i32> = row.get(5);
            let max_length: Option<i32> = row.get(6);
            let default: Option<String> = row.get(7);

            let nullable = match is_nullable.to_uppercase().as_str() {
                "YES" => Nullability::Yes,
                "NO" => Nullability::No,
                _ => Nullability::Unknown,
            };
            let key = key_of(&name);

            columns.push(
                ColumnDescriptor::new(
                    name,
                    Self::full_type(&data_type, precision, scale, max_length),
                    ordinal.max(0) as usize,
                )
                .with_nullability(nullable)
                .with_key(key)
                .with_default(default),
            );
        }

        Ok(columns)
    }

    #[cfg(feature = "postgres")]
    async fn count_where(&self, table: &str, predicate: Option<&str>) -> Result<u64, CatalogError> {
        let sql = match predicate {
            Some(predicate) => format!("SELECT COUNT(*) FROM {} WHERE {}", quote_ident(table), predicate),
            None => format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
        };

        let client = self.client.lock().await;
        let row = client.query_one(sql.as_str(), &[]).await.map_err(map_pg_error)?;
        let count: i64 = row.get(0);
        Ok(count.max(0) as u64)
    }

    #[cfg(feature = "postgres")]
    async fn execute(&self, sql: &str) -> Result<u64, CatalogError> {
        tracing::debug!(sql, "executing on PostgreSQL");

        let mut client = self.client.lock().await;
        let tx = client.transaction().await.map_err(map_pg_error)?;
        let affected = tx.execute(sql, &[]).await.map_err(map_pg_error)?;
        tx.commit().await.map_err(map_pg_error)?;
        Ok(affected)
    }

    #[cfg(feature = "postgres")]
    async fn probe(&self, sql: &str) -> Result<u64, CatalogError> {
        let mut client = self.client.lock().await;
        let tx = client
            .build_transaction()
            .read_only(true)
            .start()
            .await
            .map_err(map_pg_error)?;
        let rows = tx.query(sql, &[]).await.map_err(map_pg_error)?;
        tx.rollback().await.map_err(map_pg_error)?;
        Ok(rows.len() as u64)
    }

    #[cfg(not(feature = "postgres"))]
    async fn test_connection(&self) -> Result<(), CatalogError> {
        Err(CatalogError::Config(NOT_COMPILED.to_string()))
    }

    #[cfg(not(feature = "postgres"))]
    async fn list_tables(&self) -> Result<Vec<String>, CatalogError> {
        Err(CatalogError::Config(NOT_COMPILED.to_string()))
    }

    #[cfg(not(feature = "postgres"))]
    async fn fetch_columns(&self, _table: &str) -> Result<Vec<ColumnDescriptor>, CatalogError> {
        Err(CatalogError::Config(NOT_COMPILED.to_string()))
    }

    #[cfg(not(feature = "postgres"))]
    async fn count_where(&self, _table: &str, _predicate: Option<&str>) -> Result<u64, CatalogError> {
        Err(CatalogError::Config(NOT_COMPILED.to_string()))
    }

    #[cfg(not(feature = "postgres"))]
    async fn execute(&self, _sql: &str) -> Result<u64, CatalogError> {
        Err(CatalogError::Config(NOT_COMPILED.to_string()))
    }

    #[cfg(not(feature = "postgres"))]
    async fn probe(&self, _sql: &str) -> Result<u64, CatalogError> {
        Err(CatalogError::Config(NOT_COMPILED.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemamend_core::LogicalType;

    #[test]
    fn test_full_type_numeric() {
        assert_eq!(PostgresAdapter::full_type("numeric", Some(10), Some(2), None), "numeric(10,2)");
        assert_eq!(PostgresAdapter::full_type("numeric", Some(10), None, None), "numeric(10)");
        assert_eq!(PostgresAdapter::full_type("numeric", None, None, None), "numeric");
    }

    #[test]
    fn test_full_type_character() {
        assert_eq!(
            PostgresAdapter::full_type("character varying", None, None, Some(100)),
            "character varying(100)"
        );
        assert_eq!(PostgresAdapter::full_type("text", None, None, None), "text");
    }

    #[test]
    fn test_catalog_types_compare_with_declared() {
        let observed = LogicalType::from_sql_type(&PostgresAdapter::full_type(
            "numeric",
            Some(10),
            Some(2),
            None,
        ));
        assert!(LogicalType::from_sql_type("DECIMAL(10,2)").is_compatible_with(&observed));

        let observed = LogicalType::from_sql_type(&PostgresAdapter::full_type(
            "character varying",
            None,
            None,
            Some(100),
        ));
        assert!(LogicalType::from_sql_type("VARCHAR(100)").is_compatible_with(&observed));

        let observed = LogicalType::from_sql_type("timestamp without time zone");
        assert!(LogicalType::from_sql_type("TIMESTAMP").is_compatible_with(&observed));
    }

    #[test]
    fn test_io_failures_count_as_connection_loss() {
        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset by peer");
        let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "unexpected EOF");

        assert!(is_connection_loss(false, Some(&reset)));
        assert!(is_connection_loss(false, Some(&eof)));
        assert!(is_connection_loss(true, None));
        assert!(!is_connection_loss(false, None));
        assert!(!is_connection_loss(false, Some(&std::fmt::Error)));
    }

    #[cfg(not(feature = "postgres"))]
    #[tokio::test]
    async fn test_disabled_feature_reports_config_error() {
        let err = PostgresAdapter::connect("host=localhost", false).await.err().unwrap();
        assert!(matches!(err, CatalogError::Config(_)));
        assert!(err.to_string().contains("--features postgres"));
    }
}
