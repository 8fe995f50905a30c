//! SQL text for corrective statements
//!
//! Identifiers are always quoted. Types and defaults come from the
//! declaration and are emitted verbatim.

use schemamend_catalog::quote_ident;
use schemamend_core::{ColumnSpec, DatabaseEngine, TableSpec};

/// `CREATE TABLE IF NOT EXISTS` with every declared column
pub fn create_table(table: &TableSpec, engine: DatabaseEngine) -> String {
    let primary_keys: Vec<&ColumnSpec> = table.columns.iter().filter(|c| c.primary_key).collect();
    let inline_pk = primary_keys.len() == 1;

    let mut lines: Vec<String> = table
        .columns
        .iter()
        .map(|column| create_column_definition(column, engine, inline_pk))
        .collect();

    if primary_keys.len() > 1 {
        let names: Vec<String> = primary_keys.iter().map(|c| quote_ident(&c.name)).collect();
        lines.push(format!("PRIMARY KEY ({})", names.join(", ")));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        quote_ident(&table.name),
        lines.join(",\n    ")
    )
}

fn create_column_definition(column: &ColumnSpec, engine: DatabaseEngine, inline_pk: bool) -> String {
    let name = quote_ident(&column.name);

    if column.auto_increment {
        return match engine {
            DatabaseEngine::Sqlite => format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", name),
            DatabaseEngine::Postgres => {
                let serial = if column.sql_type.to_ascii_lowercase().contains("big") {
                    "BIGSERIAL"
                } else {
                    "SERIAL"
                };
                format!("{} {} PRIMARY KEY", name, serial)
            }
        };
    }

    let mut definition = format!("{} {}", name, column.sql_type);
    if column.primary_key && inline_pk {
        definition.push_str(" PRIMARY KEY");
    }
    if !column.nullable {
        definition.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        definition.push_str(&format!(" DEFAULT {}", default));
    }
    definition
}

/// `ALTER TABLE ... ADD COLUMN`
///
/// NOT NULL is only emitted together with a default. Existing rows could not
/// satisfy it otherwise.
pub fn add_column(table: &str, column: &ColumnSpec) -> String {
    let mut definition = format!("{} {}", quote_ident(&column.name), column.sql_type);
    if let Some(default) = &column.default {
        if !column.nullable {
            definition.push_str(" NOT NULL");
        }
        definition.push_str(&format!(" DEFAULT {}", default));
    }
    format!("ALTER TABLE {} ADD COLUMN {}", quote_ident(table), definition)
}

/// Add the canonical column next to a legacy one
///
/// No default and no constraint: existing rows must start NULL so the
/// follow-up copy can fill them from the legacy column.
pub fn add_alias_column(table: &str, column: &ColumnSpec) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        quote_ident(table),
        quote_ident(&column.name),
        column.sql_type
    )
}

/// Copy values from a legacy column where the canonical one is NULL
pub fn copy_from_legacy(table: &str, column: &str, legacy: &str) -> String {
    format!(
        "UPDATE {} SET {} = {} WHERE {} IS NULL",
        quote_ident(table),
        quote_ident(column),
        quote_ident(legacy),
        quote_ident(column)
    )
}

/// Set NULLs to the declared default
pub fn backfill_default(table: &str, column: &str, default: &str) -> String {
    format!(
        "UPDATE {} SET {} = {} WHERE {} IS NULL",
        quote_ident(table),
        quote_ident(column),
        default,
        quote_ident(column)
    )
}

pub fn drop_column(table: &str, column: &str) -> String {
    format!(
        "ALTER TABLE {} DROP COLUMN {}",
        quote_ident(table),
        quote_ident(column)
    )
}

/// Rows a legacy copy would touch
pub fn legacy_pending_predicate(column: &str, legacy: &str) -> String {
    format!(
        "{} IS NULL AND {} IS NOT NULL",
        quote_ident(column),
        quote_ident(legacy)
    )
}

pub fn null_predicate(column: &str) -> String {
    format!("{} IS NULL", quote_ident(column))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fees() -> TableSpec {
        TableSpec::new(
            "fees",
            vec![
                ColumnSpec::new("id", "INTEGER").auto_primary_key(),
                ColumnSpec::new("amount", "DECIMAL(10,2)").not_null().with_default("0"),
                ColumnSpec::new("paid_on", "DATE"),
            ],
        )
    }

    #[test]
    fn test_create_table_sqlite() {
        assert_eq!(
            create_table(&fees(), DatabaseEngine::Sqlite),
            "CREATE TABLE IF NOT EXISTS \"fees\" (\n    \
             \"id\" INTEGER PRIMARY KEY AUTOINCREMENT,\n    \
             \"amount\" DECIMAL(10,2) NOT NULL DEFAULT 0,\n    \
             \"paid_on\" DATE\n)"
        );
    }

    #[test]
    fn test_create_table_postgres_serial() {
        let sql = create_table(&fees(), DatabaseEngine::Postgres);
        assert!(sql.contains("\"id\" SERIAL PRIMARY KEY"));
    }

    #[test]
    fn test_composite_primary_key() {
        let table = TableSpec::new(
            "enrollments",
            vec![
                ColumnSpec { primary_key: true, ..ColumnSpec::new("student_id", "INTEGER") },
                ColumnSpec { primary_key: true, ..ColumnSpec::new("course_id", "INTEGER") },
            ],
        );
        let sql = create_table(&table, DatabaseEngine::Sqlite);
        assert!(sql.contains("PRIMARY KEY (\"student_id\", \"course_id\")"));
        assert!(!sql.contains("INTEGER PRIMARY KEY"));
    }

    #[test]
    fn test_add_column_not_null_needs_default() {
        let without_default = ColumnSpec::new("student_id", "INTEGER").not_null();
        assert_eq!(
            add_column("fees", &without_default),
            "ALTER TABLE \"fees\" ADD COLUMN \"student_id\" INTEGER"
        );

        let with_default = ColumnSpec::new("amount", "DECIMAL(10,2)").not_null().with_default("0");
        assert_eq!(
            add_column("fees", &with_default),
            "ALTER TABLE \"fees\" ADD COLUMN \"amount\" DECIMAL(10,2) NOT NULL DEFAULT 0"
        );
    }

    #[test]
    fn test_legacy_copy() {
        assert_eq!(
            copy_from_legacy("batches", "batch_name", "name"),
            "UPDATE \"batches\" SET \"batch_name\" = \"name\" WHERE \"batch_name\" IS NULL"
        );
    }
}
