//! Configuration schema (schemamend.toml)

use crate::report::OutputFormat;
use crate::schema::{DeclarationError, IdentifierCase, SchemaDeclaration};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Environment variable overriding `database.url`
pub const DATABASE_URL_ENV: &str = "SCHEMAMEND_DATABASE_URL";

/// Environment variable overriding `database.engine`
pub const DATABASE_ENGINE_ENV: &str = "SCHEMAMEND_DATABASE_ENGINE";

/// Database engine behind the application
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseEngine {
    /// SQLite database file
    #[default]
    Sqlite,

    /// PostgreSQL server
    #[serde(alias = "postgresql")]
    Postgres,
}

impl DatabaseEngine {
    /// How this engine matches table and column names
    pub fn identifier_case(&self) -> IdentifierCase {
        match self {
            Self::Sqlite => IdentifierCase::Insensitive,
            Self::Postgres => IdentifierCase::Sensitive,
        }
    }
}

impl std::str::FromStr for DatabaseEngine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(format!("unknown database engine '{}'", other)),
        }
    }
}

impl std::fmt::Display for DatabaseEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite => write!(f, "sqlite"),
            Self::Postgres => write!(f, "postgres"),
        }
    }
}

/// Database connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub engine: DatabaseEngine,

    /// SQLite file path, or a PostgreSQL connection string
    pub url: String,

    /// Use TLS (PostgreSQL only)
    #[serde(default)]
    pub tls: bool,

    /// Create the SQLite file when it does not exist
    #[serde(default)]
    pub create: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            engine: DatabaseEngine::Sqlite,
            url: "schemamend.sqlite3".to_string(),
            tls: false,
            create: false,
        }
    }
}

/// Report output settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub format: OutputFormat,

    /// Write the report here instead of stdout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

/// A representative application query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmokeTest {
    pub name: String,

    pub sql: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SmokeTest {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
            description: None,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub report: ReportConfig,

    /// Expected schema
    #[serde(default)]
    pub declaration: SchemaDeclaration,

    #[serde(default)]
    pub smoke_tests: Vec<SmokeTest>,

    /// Project root path (for resolving relative paths)
    #[serde(skip)]
    pub project_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            report: ReportConfig::default(),
            declaration: SchemaDeclaration::default(),
            smoke_tests: Vec::new(),
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        let mut config = Self::from_toml(&contents)?;

        // Set project root to parent of config file
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.project_root = std::env::current_dir().unwrap_or_default();
        Ok(config)
    }

    /// Apply `SCHEMAMEND_DATABASE_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup
    pub fn apply_overrides_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(engine) = lookup(DATABASE_ENGINE_ENV) {
            self.database.engine = engine.parse().map_err(ConfigError::Invalid)?;
        }
        if let Some(url) = lookup(DATABASE_URL_ENV) {
            self.database.url = url;
        }
        Ok(())
    }

    /// Database target with relative SQLite paths resolved against the project root
    pub fn resolved_database_url(&self) -> String {
        match self.database.engine {
            DatabaseEngine::Sqlite if self.database.url != ":memory:" => {
                let path = Path::new(&self.database.url);
                if path.is_relative() {
                    self.project_root.join(path).display().to_string()
                } else {
                    self.database.url.clone()
                }
            }
            _ => self.database.url.clone(),
        }
    }

    /// Check declaration and smoke tests
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.declaration.validate()?;

        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Invalid("database.url is empty".to_string()));
        }

        let mut names = HashSet::new();
        for test in &self.smoke_tests {
            if test.name.trim().is_empty() {
                return Err(ConfigError::Invalid("smoke test without a name".to_string()));
            }
            if test.sql.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("smoke test '{}' has no sql", test.name)));
            }
            if !names.insert(test.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "smoke test '{}' is declared more than once",
                    test.name
                )));
            }
        }

        Ok(())
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid declaration: {0}")]
    Declaration(#[from] DeclarationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    const MINIMAL: &str = r#"
        [database]
        engine = "sqlite"
        url = "students.sqlite3"

        [declaration]
        version = "2024.3"

        [[declaration.tables]]
        name = "batches"
        obsolete_columns = ["old_code"]

        [[declaration.tables.columns]]
        name = "id"
        type = "INTEGER"
        primary_key = true
        auto_increment = true
        nullable = false

        [[declaration.tables.columns]]
        name = "batch_name"
        type = "VARCHAR(100)"
        legacy_names = ["name"]

        [[smoke_tests]]
        name = "batch list"
        sql = "SELECT id, batch_name FROM batches"
    "#;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.database.engine, DatabaseEngine::Sqlite);
        assert_eq!(config.report.format, OutputFormat::Json);
        assert!(!config.database.create);
    }

    #[test]
    fn parse_declaration() {
        let config = Config::from_toml(MINIMAL).unwrap();
        let batches = config.declaration.table("batches").unwrap();

        assert_eq!(config.declaration.version.as_deref(), Some("2024.3"));
        assert_eq!(batches.column_names(), vec!["id", "batch_name"]);
        assert_eq!(batches.obsolete_columns, vec!["old_code"]);
        assert_eq!(batches.column("batch_name").unwrap().legacy_names, vec!["name"]);
        assert!(batches.column("batch_name").unwrap().nullable);
        assert!(!batches.column("id").unwrap().nullable);
        assert_eq!(config.smoke_tests.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides() {
        let mut config = Config::from_toml(MINIMAL).unwrap();
        let env: HashMap<&str, &str> = [
            (DATABASE_ENGINE_ENV, "postgresql"),
            (DATABASE_URL_ENV, "host=db user=school"),
        ]
        .into_iter()
        .collect();

        config
            .apply_overrides_from(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.database.engine, DatabaseEngine::Postgres);
        assert_eq!(config.resolved_database_url(), "host=db user=school");
    }

    #[test]
    fn relative_sqlite_path_resolves_against_project_root() {
        let mut config = Config::from_toml(MINIMAL).unwrap();
        config.project_root = PathBuf::from("/srv/school");
        assert_eq!(config.resolved_database_url(), "/srv/school/students.sqlite3");

        config.database.url = ":memory:".to_string();
        assert_eq!(config.resolved_database_url(), ":memory:");
    }

    #[test]
    fn duplicate_smoke_tests_rejected() {
        let mut config = Config::from_toml(MINIMAL).unwrap();
        config.smoke_tests.push(SmokeTest::new("batch list", "SELECT 1"));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn config_toml_roundtrip() {
        let config = Config::from_toml(MINIMAL).unwrap();
        let toml = toml::to_string(&config).unwrap();
        let parsed = Config::from_toml(&toml).unwrap();
        assert_eq!(config.declaration, parsed.declaration);
    }

    #[test]
    fn bundled_student_app_config_is_valid() {
        let config = Config::from_toml(include_str!("../../../demos/student-app/schemamend.toml")).unwrap();
        assert!(config.validate().is_ok());
        assert!(config.declaration.table("fees").is_some());
        assert!(!config.smoke_tests.is_empty());
    }
}
