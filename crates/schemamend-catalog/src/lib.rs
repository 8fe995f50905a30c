//! Database catalog adapters for schema reconciliation
//!
//! Each adapter wraps one connection and exposes just enough of the catalog
//! to inspect tables and columns, count rows, and run single statements.
//!
//! ## Features
//!
//! - SQLite is always available (bundled)
//! - `postgres` - PostgreSQL support
//!
//! ## Example
//!
//! ```rust,ignore
//! use schemamend_catalog::{connect, DatabaseAdapter};
//!
//! let adapter = connect(&config).await?;
//! let columns = adapter.fetch_columns("students").await?;
//! ```

pub mod adapter;
pub mod postgres;
pub mod sqlite;

pub use adapter::{quote_ident, CatalogError, DatabaseAdapter};
pub use postgres::PostgresAdapter;
pub use sqlite::SqliteAdapter;

use schemamend_core::{Config, DatabaseEngine};

/// Open the adapter selected by `[database]` in the config
///
/// Relative SQLite paths resolve against the project root. A missing SQLite
/// file is only created when `database.create` is set.
pub async fn connect(config: &Config) -> Result<Box<dyn DatabaseAdapter>, CatalogError> {
    let url = config.resolved_database_url();

    tracing::info!(engine = %config.database.engine, "connecting to database");

    match config.database.engine {
        DatabaseEngine::Sqlite => {
            let adapter = if url == ":memory:" {
                SqliteAdapter::open_in_memory()?
            } else if config.database.create {
                SqliteAdapter::open_or_create(&url)?
            } else {
                SqliteAdapter::open(&url)?
            };
            Ok(Box::new(adapter))
        }
        DatabaseEngine::Postgres => {
            let adapter = PostgresAdapter::connect(&url, config.database.tls).await?;
            Ok(Box::new(adapter))
        }
    }
}
