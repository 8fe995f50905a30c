//! Database adapter trait for inspecting and changing a live schema

use schemamend_core::{ColumnDescriptor, DatabaseEngine};

/// Errors that can occur when talking to the database
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// The database cannot be reached; aborts a run
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CatalogError {
    /// Whether this error means the database is unreachable
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

/// Quote an identifier for SQLite and PostgreSQL alike
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Trait for adapters that expose one database connection
///
/// A missing table is never an error: `fetch_columns` returns an empty list
/// for it. Every method uses the single connection held by the adapter, so
/// callers run statements strictly one after another.
#[async_trait::async_trait]
pub trait DatabaseAdapter: Send + Sync {
    /// Get the adapter name (e.g., "SQLite", "PostgreSQL")
    fn name(&self) -> &'static str;

    fn engine(&self) -> DatabaseEngine;

    /// Short human-readable target, e.g. file path or host/database
    fn target(&self) -> String;

    /// Test the connection to the database
    async fn test_connection(&self) -> Result<(), CatalogError>;

    /// Names of all base tables in the current schema
    async fn list_tables(&self) -> Result<Vec<String>, CatalogError>;

    /// Ordered column descriptors, empty when the table does not exist
    async fn fetch_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>, CatalogError>;

    /// `SELECT COUNT(*) FROM table [WHERE predicate]`
    ///
    /// The predicate is SQL built by the caller from quoted identifiers.
    async fn count_where(&self, table: &str, predicate: Option<&str>) -> Result<u64, CatalogError>;

    /// Execute one statement inside its own transaction, returning affected rows
    async fn execute(&self, sql: &str) -> Result<u64, CatalogError>;

    /// Run a read query and return how many rows it produced
    async fn probe(&self, sql: &str) -> Result<u64, CatalogError>;

    async fn count_rows(&self, table: &str) -> Result<u64, CatalogError> {
        self.count_where(table, None).await
    }

    async fn has_table(&self, table: &str) -> Result<bool, CatalogError> {
        let case = self.engine().identifier_case();
        Ok(self.list_tables().await?.iter().any(|t| case.matches(t, table)))
    }

    async fn has_column(&self, table: &str, column: &str) -> Result<bool, CatalogError> {
        let case = self.engine().identifier_case();
        Ok(self
            .fetch_columns(table)
            .await?
            .iter()
            .any(|c| case.matches(&c.name, column)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("batch_name"), "\"batch_name\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_connectivity_class() {
        assert!(CatalogError::Connection("refused".into()).is_connectivity());
        assert!(!CatalogError::Query("no such column".into()).is_connectivity());
    }
}
