//! Schema Inspector: reads the live schema of declared tables
//!
//! Read-only. Every call goes to the database; nothing is cached between
//! runs.

use crate::ddl;
use schemamend_catalog::{CatalogError, DatabaseAdapter};
use schemamend_core::{ColumnDescriptor, ObservedSchema, SchemaDeclaration, TableObservation};

pub struct Inspector<'a> {
    adapter: &'a dyn DatabaseAdapter,
}

impl<'a> Inspector<'a> {
    pub fn new(adapter: &'a dyn DatabaseAdapter) -> Self {
        Self { adapter }
    }

    /// Ordered columns of one table, empty when the table does not exist
    pub async fn inspect_table(&self, table: &str) -> Result<Vec<ColumnDescriptor>, CatalogError> {
        self.adapter.fetch_columns(table).await
    }

    /// Observe every declared table that exists
    ///
    /// Tables are listed once; each existing declared table then gets its
    /// columns, row count and pending backfill counts.
    pub async fn inspect(&self, declaration: &SchemaDeclaration) -> Result<ObservedSchema, CatalogError> {
        let identifier_case = self.adapter.engine().identifier_case();
        let existing = self.adapter.list_tables().await?;
        let mut observed = ObservedSchema::with_identifier_case(identifier_case);

        for table in &declaration.tables {
            if !existing.iter().any(|t| identifier_case.matches(t, &table.name)) {
                tracing::debug!(table = %table.name, "declared table is missing");
                continue;
            }

            let columns = self.adapter.fetch_columns(&table.name).await?;
            let mut observation =
                TableObservation::new(&table.name, columns).with_identifier_case(identifier_case);
            observation.row_count = self.adapter.count_rows(&table.name).await?;

            for column in &table.columns {
                if !observation.has_column(&column.name) {
                    continue;
                }

                for legacy in &column.legacy_names {
                    if !observation.has_column(legacy) {
                        continue;
                    }
                    let predicate = ddl::legacy_pending_predicate(&column.name, legacy);
                    let pending = self.adapter.count_where(&table.name, Some(&predicate)).await?;
                    if pending > 0 {
                        observation
                            .pending_backfills
                            .insert(TableObservation::legacy_key(&column.name, legacy), pending);
                    }
                }

                if column.backfill_nulls && column.default.is_some() {
                    let predicate = ddl::null_predicate(&column.name);
                    let pending = self.adapter.count_where(&table.name, Some(&predicate)).await?;
                    if pending > 0 {
                        observation.pending_backfills.insert(column.name.clone(), pending);
                    }
                }
            }

            tracing::debug!(
                table = %table.name,
                columns = observation.columns.len(),
                rows = observation.row_count,
                "inspected table"
            );
            observed.insert(observation);
        }

        Ok(observed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemamend_catalog::SqliteAdapter;
    use schemamend_core::{ColumnSpec, TableSpec};

    fn declaration() -> SchemaDeclaration {
        SchemaDeclaration::new(vec![
            TableSpec::new(
                "batches",
                vec![
                    ColumnSpec::new("id", "INTEGER").auto_primary_key(),
                    ColumnSpec::new("batch_name", "VARCHAR(100)").with_legacy_name("name"),
                ],
            ),
            TableSpec::new(
                "students",
                vec![
                    ColumnSpec::new("id", "INTEGER").auto_primary_key(),
                    ColumnSpec::new("status", "VARCHAR(20)")
                        .with_default("'active'")
                        .with_backfill_nulls(),
                ],
            ),
            TableSpec::new("fees", vec![ColumnSpec::new("id", "INTEGER").auto_primary_key()]),
        ])
    }

    #[tokio::test]
    async fn test_inspect_counts_pending_backfills() {
        let adapter = SqliteAdapter::open_in_memory().unwrap();
        adapter
            .execute_batch(
                "CREATE TABLE batches (id INTEGER PRIMARY KEY, name TEXT, batch_name TEXT);
                 INSERT INTO batches (name, batch_name) VALUES ('A', NULL), ('B', 'B'), (NULL, NULL);
                 CREATE TABLE students (id INTEGER PRIMARY KEY, status TEXT);
                 INSERT INTO students (status) VALUES (NULL), (NULL), ('active');",
            )
            .await
            .unwrap();

        let observed = Inspector::new(&adapter).inspect(&declaration()).await.unwrap();

        assert!(!observed.has_table("fees"));

        let batches = observed.table("batches").unwrap();
        assert_eq!(batches.row_count, 3);
        assert_eq!(batches.pending_legacy_copy("batch_name", "name"), 1);

        let students = observed.table("students").unwrap();
        assert_eq!(students.pending_backfill("status"), 2);
    }

    #[tokio::test]
    async fn test_inspect_ignores_identifier_case_on_sqlite() {
        let adapter = SqliteAdapter::open_in_memory().unwrap();
        adapter
            .execute_batch(
                "CREATE TABLE Batches (ID INTEGER PRIMARY KEY, Name TEXT, Batch_Name TEXT);
                 INSERT INTO Batches (Name, Batch_Name) VALUES ('A', NULL);",
            )
            .await
            .unwrap();

        let observed = Inspector::new(&adapter).inspect(&declaration()).await.unwrap();

        let batches = observed.table("batches").unwrap();
        assert!(batches.has_column("batch_name"));
        assert_eq!(batches.pending_legacy_copy("batch_name", "name"), 1);
        assert!(observed.uncovered(&declaration()).iter().all(|c| !c.starts_with("batches.")));
    }

    #[tokio::test]
    async fn test_inspect_table_missing_is_empty() {
        let adapter = SqliteAdapter::open_in_memory().unwrap();
        let columns = Inspector::new(&adapter).inspect_table("fees").await.unwrap();
        assert!(columns.is_empty());
    }
}
