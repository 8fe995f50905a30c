//! Discrepancies between the declared and the observed schema
//!
//! IMPORTANT: Discrepancy kinds are versioned and stable.
//! NEVER rename or remove kinds - they are part of the report contract.
//! Add new kinds with new names only.

use serde::{Deserialize, Serialize};

/// Discrepancy kind registry (v1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscrepancyKind {
    /// A declared table does not exist
    MissingTable,

    /// A declared column does not exist in an existing table
    MissingColumn,

    /// A column exists with a type incompatible with the declaration
    WrongType,

    /// Rows need a value copied or defaulted into a declared column
    NeedsBackfill,

    /// A column declared obsolete is still present
    ObsoleteColumn,
}

impl DiscrepancyKind {
    /// Get the kind as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingTable => "MISSING_TABLE",
            Self::MissingColumn => "MISSING_COLUMN",
            Self::WrongType => "WRONG_TYPE",
            Self::NeedsBackfill => "NEEDS_BACKFILL",
            Self::ObsoleteColumn => "OBSOLETE_COLUMN",
        }
    }

    /// Default severity for this kind
    pub fn severity(&self) -> Severity {
        match self {
            Self::MissingTable | Self::MissingColumn => Severity::Error,
            Self::WrongType | Self::NeedsBackfill => Severity::Warn,
            Self::ObsoleteColumn => Severity::Info,
        }
    }
}

impl std::fmt::Display for DiscrepancyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Discrepancy severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,

    /// Should be reviewed, does not break the application
    Warn,

    /// The application will fail on this code path
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One difference between declared and observed schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub table: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,

    pub kind: DiscrepancyKind,

    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Expected value (for comparison discrepancies)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,

    /// Actual value (for comparison discrepancies)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

impl Discrepancy {
    /// Create a discrepancy with the kind's default severity
    pub fn new(kind: DiscrepancyKind, table: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: None,
            kind,
            severity: kind.severity(),
            message: message.into(),
            expected: None,
            actual: None,
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Set expected/actual values
    pub fn with_comparison(mut self, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }

    /// `table` or `table.column`
    pub fn target(&self) -> String {
        match &self.column {
            Some(column) => format!("{}.{}", self.table, column),
            None => self.table.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_stability() {
        assert_eq!(DiscrepancyKind::MissingTable.as_str(), "MISSING_TABLE");
        assert_eq!(DiscrepancyKind::NeedsBackfill.as_str(), "NEEDS_BACKFILL");
    }

    #[test]
    fn severity_defaults() {
        let missing = Discrepancy::new(DiscrepancyKind::MissingColumn, "batches", "missing");
        let obsolete = Discrepancy::new(DiscrepancyKind::ObsoleteColumn, "batches", "old");

        assert_eq!(missing.severity, Severity::Error);
        assert_eq!(obsolete.severity, Severity::Info);
    }

    #[test]
    fn discrepancy_serialization() {
        let discrepancy = Discrepancy::new(
            DiscrepancyKind::WrongType,
            "fees",
            "Column 'amount' has type TEXT",
        )
        .with_column("amount")
        .with_comparison("DECIMAL(10, 2)", "STRING");

        assert_eq!(discrepancy.target(), "fees.amount");

        let json = serde_json::to_string(&discrepancy).unwrap();
        assert!(json.contains("WRONG_TYPE"));
        assert!(json.contains("\"warn\""));
    }
}
