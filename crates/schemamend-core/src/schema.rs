//! Schema types: what the application declares and what the database holds

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

/// Portable logical type system
///
/// Maps engine-specific type names to a common representation so a declared
/// `VARCHAR(100)` and an observed `character varying` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogicalType {
    /// Boolean type
    Bool,

    /// Integer type (any precision)
    Int,

    /// Floating point (any precision)
    Float,

    /// Decimal with precision and scale
    Decimal {
        precision: Option<u16>,
        scale: Option<u16>,
    },

    /// String/text type
    String,

    /// Date (no time component)
    Date,

    /// Timestamp (with time component)
    Timestamp,

    /// JSON type
    Json,

    /// Unknown type (cannot infer)
    Unknown,
}

impl LogicalType {
    /// Parse an SQL type name as written in DDL or reported by a catalog
    ///
    /// Handles SQLite declared types, PostgreSQL `information_schema`
    /// names and the MySQL spellings the application historically used.
    pub fn from_sql_type(sql_type: &str) -> LogicalType {
        let trimmed = sql_type.trim();
        let base = trimmed
            .split('(')
            .next()
            .unwrap_or(trimmed)
            .trim()
            .to_lowercase();

        if let Some(logical) = Self::from_base_name(&base, trimmed) {
            return logical;
        }

        // "INT UNSIGNED", "BIGINT NOT NULL" and friends
        let first_word = base.split_whitespace().next().unwrap_or("");
        Self::from_base_name(first_word, trimmed).unwrap_or(LogicalType::Unknown)
    }

    fn from_base_name(base: &str, full: &str) -> Option<LogicalType> {
        let logical = match base {
            "boolean" | "bool" => LogicalType::Bool,

            "smallint" | "int2" | "integer" | "int" | "int4" | "bigint" | "int8" | "tinyint"
            | "mediumint" | "serial" | "serial4" | "bigserial" | "serial8" | "smallserial"
            | "serial2" => LogicalType::Int,

            "real" | "float4" | "double precision" | "float8" | "float" | "double" => {
                LogicalType::Float
            }

            "numeric" | "decimal" => parse_decimal(full),
            "money" => LogicalType::Decimal {
                precision: Some(19),
                scale: Some(2),
            },

            "character varying" | "varchar" | "character" | "char" | "bpchar" | "text"
            | "tinytext" | "mediumtext" | "longtext" | "name" | "citext" | "uuid" | "enum"
            | "clob" | "nvarchar" | "nchar" => LogicalType::String,

            "date" => LogicalType::Date,
            "timestamp" | "timestamp without time zone" | "timestamp with time zone"
            | "timestamptz" | "datetime" => LogicalType::Timestamp,

            "json" | "jsonb" => LogicalType::Json,

            _ => return None,
        };
        Some(logical)
    }

    /// Check whether an observed type satisfies a declared one
    ///
    /// Unknown on either side matches; decimals match when precision and
    /// scale agree or one side leaves them open.
    pub fn is_compatible_with(&self, observed: &LogicalType) -> bool {
        match (self, observed) {
            (LogicalType::Unknown, _) | (_, LogicalType::Unknown) => true,
            (
                LogicalType::Decimal { precision: p1, scale: s1 },
                LogicalType::Decimal { precision: p2, scale: s2 },
            ) => {
                let precision_ok = p1.is_none() || p2.is_none() || p1 == p2;
                let scale_ok = s1.is_none() || s2.is_none() || s1 == s2;
                precision_ok && scale_ok
            }
            (expected, actual) => expected == actual,
        }
    }
}

/// Parse `numeric`, `numeric(10)` or `decimal(10, 2)`
fn parse_decimal(type_str: &str) -> LogicalType {
    if let Some(params) = type_str.split('(').nth(1) {
        if let Some(params) = params.trim().strip_suffix(')') {
            let parts: Vec<&str> = params.split(',').collect();
            if parts.len() == 2 {
                let precision = parts[0].trim().parse().ok();
                let scale = parts[1].trim().parse().ok();
                return LogicalType::Decimal { precision, scale };
            } else if parts.len() == 1 {
                let precision = parts[0].trim().parse().ok();
                return LogicalType::Decimal { precision, scale: Some(0) };
            }
        }
    }

    LogicalType::Decimal {
        precision: None,
        scale: None,
    }
}

impl std::fmt::Display for LogicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool => write!(f, "BOOL"),
            Self::Int => write!(f, "INT"),
            Self::Float => write!(f, "FLOAT"),
            Self::Decimal { precision, scale } => match (precision, scale) {
                (Some(p), Some(s)) => write!(f, "DECIMAL({}, {})", p, s),
                (Some(p), None) => write!(f, "DECIMAL({})", p),
                _ => write!(f, "DECIMAL"),
            },
            Self::String => write!(f, "STRING"),
            Self::Date => write!(f, "DATE"),
            Self::Timestamp => write!(f, "TIMESTAMP"),
            Self::Json => write!(f, "JSON"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Nullability state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Nullability {
    /// Definitely nullable
    Yes,

    /// Definitely not nullable
    No,

    /// Cannot determine nullability
    Unknown,
}

impl std::fmt::Display for Nullability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Yes => write!(f, "NULL"),
            Self::No => write!(f, "NOT NULL"),
            Self::Unknown => write!(f, "?"),
        }
    }
}

/// Role a column plays in the table's keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyRole {
    Primary,
    Unique,
    None,
}

impl std::fmt::Display for KeyRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "PRI"),
            Self::Unique => write!(f, "UNI"),
            Self::None => write!(f, ""),
        }
    }
}

/// A column the application expects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Canonical column name
    pub name: String,

    /// SQL type, rendered verbatim into DDL
    #[serde(rename = "type")]
    pub sql_type: String,

    /// Whether NULL is allowed
    #[serde(default = "default_true")]
    pub nullable: bool,

    /// Default value as an SQL literal or expression
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub primary_key: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub auto_increment: bool,

    /// Older names of this column still referenced by some code paths
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub legacy_names: Vec<String>,

    /// Set existing NULLs to the declared default
    #[serde(default, skip_serializing_if = "is_false")]
    pub backfill_nulls: bool,
}

fn default_true() -> bool {
    true
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl ColumnSpec {
    /// Create a nullable column with no default
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            nullable: true,
            default: None,
            primary_key: false,
            auto_increment: false,
            legacy_names: Vec::new(),
            backfill_nulls: false,
        }
    }

    /// Mark as NOT NULL
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Set the default expression
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Mark as an auto-incrementing primary key
    pub fn auto_primary_key(mut self) -> Self {
        self.primary_key = true;
        self.auto_increment = true;
        self.nullable = false;
        self
    }

    /// Add a legacy name this column replaces
    pub fn with_legacy_name(mut self, legacy: impl Into<String>) -> Self {
        self.legacy_names.push(legacy.into());
        self
    }

    /// Enable NULL backfilling with the declared default
    pub fn with_backfill_nulls(mut self) -> Self {
        self.backfill_nulls = true;
        self
    }

    pub fn logical_type(&self) -> LogicalType {
        LogicalType::from_sql_type(&self.sql_type)
    }
}

/// A table the application expects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    pub name: String,

    /// Columns explicitly declared for removal
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub obsolete_columns: Vec<String>,

    /// Ordered list of declared columns
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
}

impl TableSpec {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnSpec>) -> Self {
        Self {
            name: name.into(),
            obsolete_columns: Vec::new(),
            columns,
        }
    }

    /// Declare a column obsolete
    pub fn with_obsolete(mut self, column: impl Into<String>) -> Self {
        self.obsolete_columns.push(column.into());
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// The schema the application expects, declared in configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDeclaration {
    /// Free-form version label of the declaration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default)]
    pub tables: Vec<TableSpec>,
}

impl SchemaDeclaration {
    pub fn new(tables: Vec<TableSpec>) -> Self {
        Self {
            version: None,
            tables,
        }
    }

    /// Find a table by name
    pub fn table(&self, name: &str) -> Option<&TableSpec> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    /// SHA-256 of the canonical JSON form, hex encoded
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&canonical))
    }

    /// Check the declaration is internally consistent
    ///
    /// Every identifier ends up interpolated into DDL, so names are held to
    /// plain SQL identifier syntax.
    pub fn validate(&self) -> Result<(), DeclarationError> {
        let mut seen_tables = HashSet::new();

        for table in &self.tables {
            check_identifier(&table.name)?;
            if !seen_tables.insert(table.name.as_str()) {
                return Err(DeclarationError::DuplicateTable(table.name.clone()));
            }
            if table.columns.is_empty() {
                return Err(DeclarationError::EmptyTable(table.name.clone()));
            }

            let mut seen_columns = HashSet::new();
            let mut auto_increment = 0;

            for column in &table.columns {
                check_identifier(&column.name)?;
                if !seen_columns.insert(column.name.as_str()) {
                    return Err(DeclarationError::DuplicateColumn {
                        table: table.name.clone(),
                        column: column.name.clone(),
                    });
                }
                if column.sql_type.trim().is_empty() {
                    return Err(DeclarationError::MissingType {
                        table: table.name.clone(),
                        column: column.name.clone(),
                    });
                }
                if column.auto_increment {
                    auto_increment += 1;
                    if !column.primary_key {
                        return Err(DeclarationError::AutoIncrement(table.name.clone()));
                    }
                }
                if column.backfill_nulls && column.default.is_none() {
                    return Err(DeclarationError::BackfillWithoutDefault {
                        table: table.name.clone(),
                        column: column.name.clone(),
                    });
                }
                for legacy in &column.legacy_names {
                    check_identifier(legacy)?;
                }
            }

            if auto_increment > 1 {
                return Err(DeclarationError::AutoIncrement(table.name.clone()));
            }

            for column in &table.columns {
                for legacy in &column.legacy_names {
                    if seen_columns.contains(legacy.as_str()) {
                        return Err(DeclarationError::LegacyCollision {
                            table: table.name.clone(),
                            column: legacy.clone(),
                        });
                    }
                }
            }

            for obsolete in &table.obsolete_columns {
                check_identifier(obsolete)?;
                let is_legacy = table
                    .columns
                    .iter()
                    .any(|c| c.legacy_names.iter().any(|l| l == obsolete));
                if seen_columns.contains(obsolete.as_str()) || is_legacy {
                    return Err(DeclarationError::ObsoleteInUse {
                        table: table.name.clone(),
                        column: obsolete.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

fn identifier_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok())
        .as_ref()
}

fn check_identifier(name: &str) -> Result<(), DeclarationError> {
    if identifier_pattern().map_or(false, |pattern| pattern.is_match(name)) {
        Ok(())
    } else {
        Err(DeclarationError::InvalidIdentifier(name.to_string()))
    }
}

/// Declaration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeclarationError {
    #[error("Invalid identifier '{0}': expected letters, digits and underscores")]
    InvalidIdentifier(String),

    #[error("Table '{0}' is declared more than once")]
    DuplicateTable(String),

    #[error("Table '{0}' declares no columns")]
    EmptyTable(String),

    #[error("Column '{table}.{column}' is declared more than once")]
    DuplicateColumn { table: String, column: String },

    #[error("Column '{table}.{column}' has no type")]
    MissingType { table: String, column: String },

    #[error("Table '{0}': auto_increment needs exactly one primary key column")]
    AutoIncrement(String),

    #[error("Column '{table}.{column}' sets backfill_nulls without a default")]
    BackfillWithoutDefault { table: String, column: String },

    #[error("Legacy name '{table}.{column}' collides with a declared column")]
    LegacyCollision { table: String, column: String },

    #[error("Column '{table}.{column}' is declared obsolete but is still in use")]
    ObsoleteInUse { table: String, column: String },
}

/// How the database matches table and column names
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierCase {
    /// Names match byte for byte (quoted PostgreSQL identifiers)
    #[default]
    Sensitive,

    /// ASCII case is ignored (SQLite)
    Insensitive,
}

impl IdentifierCase {
    pub fn matches(self, a: &str, b: &str) -> bool {
        match self {
            Self::Sensitive => a == b,
            Self::Insensitive => a.eq_ignore_ascii_case(b),
        }
    }
}

/// A column as it exists in the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,

    /// Type text as reported by the engine
    pub declared_type: String,

    pub logical_type: LogicalType,

    pub nullable: Nullability,

    pub key: KeyRole,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// 1-indexed position in the table
    pub ordinal: usize,
}

impl ColumnDescriptor {
    /// Create a descriptor, deriving the logical type from the type text
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>, ordinal: usize) -> Self {
        let declared_type = declared_type.into();
        Self {
            name: name.into(),
            logical_type: LogicalType::from_sql_type(&declared_type),
            declared_type,
            nullable: Nullability::Unknown,
            key: KeyRole::None,
            default: None,
            ordinal,
        }
    }

    pub fn with_nullability(mut self, nullable: Nullability) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn with_key(mut self, key: KeyRole) -> Self {
        self.key = key;
        self
    }

    pub fn with_default(mut self, default: Option<String>) -> Self {
        self.default = default;
        self
    }
}

/// One existing table at inspection time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableObservation {
    pub name: String,

    pub columns: Vec<ColumnDescriptor>,

    pub row_count: u64,

    /// Rows a backfill would touch
    ///
    /// Keyed by target column for NULL-to-default backfills, and by
    /// `column=legacy` for copies out of a legacy column.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pending_backfills: BTreeMap<String, u64>,

    #[serde(skip)]
    pub identifier_case: IdentifierCase,
}

impl TableObservation {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            name: name.into(),
            columns,
            row_count: 0,
            pending_backfills: BTreeMap::new(),
            identifier_case: IdentifierCase::default(),
        }
    }

    pub fn with_identifier_case(mut self, identifier_case: IdentifierCase) -> Self {
        self.identifier_case = identifier_case;
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns
            .iter()
            .find(|c| self.identifier_case.matches(&c.name, name))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn pending_backfill(&self, column: &str) -> u64 {
        self.pending_backfills.get(column).copied().unwrap_or(0)
    }

    pub fn pending_legacy_copy(&self, column: &str, legacy: &str) -> u64 {
        self.pending_backfill(&Self::legacy_key(column, legacy))
    }

    /// Key under which a copy from `legacy` into `column` is counted
    pub fn legacy_key(column: &str, legacy: &str) -> String {
        format!("{}={}", column, legacy)
    }
}

/// The schema as found in the database, rebuilt on every run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedSchema {
    pub tables: BTreeMap<String, TableObservation>,

    #[serde(skip)]
    pub identifier_case: IdentifierCase,
}

impl ObservedSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identifier_case(identifier_case: IdentifierCase) -> Self {
        Self {
            tables: BTreeMap::new(),
            identifier_case,
        }
    }

    pub fn insert(&mut self, observation: TableObservation) {
        self.tables.insert(observation.name.clone(), observation);
    }

    pub fn table(&self, name: &str) -> Option<&TableObservation> {
        self.tables.get(name).or_else(|| match self.identifier_case {
            IdentifierCase::Sensitive => None,
            IdentifierCase::Insensitive => self
                .tables
                .values()
                .find(|t| t.name.eq_ignore_ascii_case(name)),
        })
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.table(table).map_or(false, |t| t.has_column(column))
    }

    /// Declared `table.column` pairs not present in this observation
    ///
    /// Empty when the observed schema is a superset of the declaration.
    pub fn uncovered(&self, declaration: &SchemaDeclaration) -> Vec<String> {
        declaration
            .tables
            .iter()
            .flat_map(|table| {
                table
                    .columns
                    .iter()
                    .filter(|column| !self.has_column(&table.name, &column.name))
                    .map(move |column| format!("{}.{}", table.name, column.name))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn batches() -> TableSpec {
        TableSpec::new(
            "batches",
            vec![
                ColumnSpec::new("id", "INTEGER").auto_primary_key(),
                ColumnSpec::new("batch_name", "VARCHAR(100)").with_legacy_name("name"),
            ],
        )
    }

    #[test]
    fn logical_type_parsing() {
        assert_eq!(LogicalType::from_sql_type("VARCHAR(100)"), LogicalType::String);
        assert_eq!(LogicalType::from_sql_type("character varying"), LogicalType::String);
        assert_eq!(LogicalType::from_sql_type("INT UNSIGNED"), LogicalType::Int);
        assert_eq!(LogicalType::from_sql_type("DATETIME"), LogicalType::Timestamp);
        assert_eq!(
            LogicalType::from_sql_type("decimal(10, 2)"),
            LogicalType::Decimal { precision: Some(10), scale: Some(2) }
        );
        assert_eq!(LogicalType::from_sql_type("geometry"), LogicalType::Unknown);
    }

    #[test]
    fn logical_type_display() {
        assert_eq!(LogicalType::Bool.to_string(), "BOOL");
        assert_eq!(
            LogicalType::Decimal { precision: Some(10), scale: Some(2) }.to_string(),
            "DECIMAL(10, 2)"
        );
    }

    #[test]
    fn type_compatibility() {
        let money = LogicalType::Decimal { precision: Some(10), scale: Some(2) };
        let open = LogicalType::Decimal { precision: None, scale: None };
        let narrow = LogicalType::Decimal { precision: Some(8), scale: Some(0) };

        assert!(money.is_compatible_with(&open));
        assert!(!money.is_compatible_with(&narrow));
        assert!(LogicalType::Int.is_compatible_with(&LogicalType::Unknown));
        assert!(!LogicalType::Int.is_compatible_with(&LogicalType::String));
    }

    #[test]
    fn declaration_lookup() {
        let declaration = SchemaDeclaration::new(vec![batches()]);
        let table = declaration.table("batches").unwrap();

        assert_eq!(table.column_names(), vec!["id", "batch_name"]);
        assert!(table.column("batch_name").is_some());
        assert!(declaration.table("fees").is_none());
    }

    #[test]
    fn validate_accepts_well_formed_declaration() {
        let declaration = SchemaDeclaration::new(vec![batches().with_obsolete("old_code")]);
        assert_eq!(declaration.validate(), Ok(()));
    }

    #[test]
    fn validate_rejects_bad_identifiers() {
        let declaration = SchemaDeclaration::new(vec![TableSpec::new(
            "students; DROP TABLE x",
            vec![ColumnSpec::new("id", "INTEGER")],
        )]);
        assert!(matches!(
            declaration.validate(),
            Err(DeclarationError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn validate_rejects_obsolete_legacy_column() {
        let declaration = SchemaDeclaration::new(vec![batches().with_obsolete("name")]);
        assert!(matches!(
            declaration.validate(),
            Err(DeclarationError::ObsoleteInUse { .. })
        ));
    }

    #[test]
    fn validate_rejects_backfill_without_default() {
        let declaration = SchemaDeclaration::new(vec![TableSpec::new(
            "students",
            vec![ColumnSpec::new("status", "VARCHAR(20)").with_backfill_nulls()],
        )]);
        assert!(matches!(
            declaration.validate(),
            Err(DeclarationError::BackfillWithoutDefault { .. })
        ));
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = SchemaDeclaration::new(vec![batches()]);
        let mut b = a.clone();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);

        b.tables[0].columns.push(ColumnSpec::new("start_date", "DATE"));
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn uncovered_columns() {
        let declaration = SchemaDeclaration::new(vec![batches()]);
        let mut observed = ObservedSchema::new();
        observed.insert(TableObservation::new(
            "batches",
            vec![
                ColumnDescriptor::new("id", "INTEGER", 1),
                ColumnDescriptor::new("name", "TEXT", 2),
            ],
        ));

        assert_eq!(observed.uncovered(&declaration), vec!["batches.batch_name"]);
        assert!(observed.has_column("batches", "name"));
        assert!(!observed.has_table("fees"));
    }

    #[test]
    fn identifier_case_matching() {
        assert!(IdentifierCase::Insensitive.matches("Batch_Name", "batch_name"));
        assert!(!IdentifierCase::Sensitive.matches("Batch_Name", "batch_name"));
        assert!(IdentifierCase::Sensitive.matches("batch_name", "batch_name"));
    }

    #[test]
    fn case_insensitive_observation_covers_mixed_case_names() {
        let declaration = SchemaDeclaration::new(vec![batches()]);
        let columns = vec![
            ColumnDescriptor::new("ID", "INTEGER", 1),
            ColumnDescriptor::new("Batch_Name", "VARCHAR(100)", 2),
        ];

        let mut sensitive = ObservedSchema::new();
        sensitive.insert(TableObservation::new("Batches", columns.clone()));
        assert!(!sensitive.has_table("batches"));

        let mut insensitive = ObservedSchema::with_identifier_case(IdentifierCase::Insensitive);
        insensitive.insert(
            TableObservation::new("Batches", columns).with_identifier_case(IdentifierCase::Insensitive),
        );
        assert!(insensitive.has_column("batches", "batch_name"));
        assert!(insensitive.uncovered(&declaration).is_empty());
    }
}
