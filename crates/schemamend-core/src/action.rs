//! Corrective actions and their outcomes

use serde::{Deserialize, Serialize};

/// Kind of corrective statement (stable, part of the report contract)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    CreateTable,
    AddColumn,
    Backfill,
    DropColumn,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateTable => "create_table",
            Self::AddColumn => "add_column",
            Self::Backfill => "backfill",
            Self::DropColumn => "drop_column",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One DDL or DML statement that moves the database toward the declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectiveAction {
    pub table: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,

    pub kind: ActionKind,

    /// Statement to execute
    pub sql: String,

    /// Human-readable description
    pub description: String,

    /// Removes data; only ever produced from an explicit obsolete declaration
    pub destructive: bool,
}

impl CorrectiveAction {
    pub fn new(
        kind: ActionKind,
        table: impl Into<String>,
        sql: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            column: None,
            kind,
            sql: sql.into(),
            description: description.into(),
            destructive: kind == ActionKind::DropColumn,
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }
}

/// What happened to an action during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// Dry run: computed, not executed
    Planned,

    /// Executed successfully
    Applied { rows_affected: u64 },

    /// Guard found nothing to do, or the action was withheld
    Skipped { reason: String },

    /// The statement failed; later actions still ran
    Failed { error: String },
}

impl ActionOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

impl std::fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Planned => write!(f, "planned"),
            Self::Applied { rows_affected } => write!(f, "applied ({} rows)", rows_affected),
            Self::Skipped { reason } => write!(f, "skipped: {}", reason),
            Self::Failed { error } => write!(f, "failed: {}", error),
        }
    }
}

/// An action paired with its outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    #[serde(flatten)]
    pub action: CorrectiveAction,

    pub outcome: ActionOutcome,
}

impl ActionRecord {
    pub fn planned(action: CorrectiveAction) -> Self {
        Self {
            action,
            outcome: ActionOutcome::Planned,
        }
    }
}
