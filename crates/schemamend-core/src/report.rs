//! Report schema (stable v1)
//!
//! This schema is STABLE and VERSIONED.
//! Breaking changes require a new version.

use crate::action::ActionRecord;
use crate::discrepancy::Discrepancy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Output format chosen by the operator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Html,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "html" => Ok(Self::Html),
            other => Err(format!("unknown format '{}', expected json or html", other)),
        }
    }
}

/// Overall outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Nothing failed and nothing is left to do
    Success,

    /// Non-fatal failures, or declared schema still not covered
    Degraded,

    /// The run aborted (database unreachable)
    Error,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Degraded => write!(f, "degraded"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// What a run did to one declared table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableStatus {
    /// Already compliant
    Ok,

    /// Did not exist and was created
    Created,

    /// Existed and was changed
    Altered,

    /// Discrepancies remain because nothing was applied (dry run)
    Pending,

    /// An action failed or declared columns are still missing
    Failed,
}

impl std::fmt::Display for TableStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Created => write!(f, "created"),
            Self::Altered => write!(f, "altered"),
            Self::Pending => write!(f, "pending"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Per-table line of the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableReport {
    pub name: String,

    pub status: TableStatus,

    /// Declared columns still absent after the run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uncovered_columns: Vec<String>,
}

/// Outcome of one smoke test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub check: String,

    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Rows returned when the query ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<u64>,
}

impl VerificationResult {
    pub fn passed(check: impl Into<String>, rows: u64) -> Self {
        Self {
            check: check.into(),
            passed: true,
            detail: None,
            rows: Some(rows),
        }
    }

    pub fn failed(check: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            passed: false,
            detail: Some(detail.into()),
            rows: None,
        }
    }
}

/// Run report (report.json v1)
///
/// `tables_exist`, `tables_missing` and `missing_tables` describe the database
/// before reconciliation; `tables` and `demo_data` describe it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Schema version
    pub version: ReportVersion,

    /// Timestamp (ISO 8601)
    pub timestamp: String,

    /// Adapter name and target, e.g. "SQLite students.sqlite3"
    pub database: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub declaration_fingerprint: Option<String>,

    pub status: RunStatus,

    pub tables_exist: usize,

    pub tables_missing: usize,

    pub missing_tables: Vec<String>,

    pub tables: Vec<TableReport>,

    pub discrepancies: Vec<Discrepancy>,

    pub actions: Vec<ActionRecord>,

    pub verification: Vec<VerificationResult>,

    pub all_passed: bool,

    /// Row count per existing declared table
    pub demo_data: BTreeMap<String, u64>,

    /// Fatal error, surfaced verbatim
    pub error: Option<String>,
}

impl Report {
    /// Create an empty report for a database
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            database: database.into(),
            declaration_fingerprint: None,
            status: RunStatus::Success,
            tables_exist: 0,
            tables_missing: 0,
            missing_tables: Vec::new(),
            tables: Vec::new(),
            discrepancies: Vec::new(),
            actions: Vec::new(),
            verification: Vec::new(),
            all_passed: true,
            demo_data: BTreeMap::new(),
            error: None,
        }
    }

    /// Report for a run that aborted before doing anything
    pub fn fatal(database: impl Into<String>, error: impl Into<String>) -> Self {
        let mut report = Self::new(database);
        report.error = Some(error.into());
        report.all_passed = false;
        report.status = RunStatus::Error;
        report
    }

    /// Derive `all_passed` and `status` from the collected results
    pub fn finalize(&mut self) {
        self.all_passed = self.error.is_none() && self.verification.iter().all(|v| v.passed);

        self.status = if self.error.is_some() {
            RunStatus::Error
        } else if !self.all_passed
            || self.actions.iter().any(|a| a.outcome.is_failed())
            || self
                .tables
                .iter()
                .any(|t| matches!(t.status, TableStatus::Failed | TableStatus::Pending))
        {
            RunStatus::Degraded
        } else {
            RunStatus::Success
        };
    }

    pub fn table_status(&self, name: &str) -> Option<TableStatus> {
        self.tables.iter().find(|t| t.name == name).map(|t| t.status)
    }

    pub fn failed_actions(&self) -> usize {
        self.actions.iter().filter(|a| a.outcome.is_failed()).count()
    }

    pub fn failed_checks(&self) -> usize {
        self.verification.iter().filter(|v| !v.passed).count()
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Render a standalone HTML page for operators
    pub fn to_html(&self) -> String {
        let mut html = String::new();

        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        html.push_str("<title>Schema Reconciliation Report</title>\n");
        html.push_str(
            "<style>body{font-family:sans-serif;margin:2em}table{border-collapse:collapse;margin-bottom:1.5em}\
             td,th{border:1px solid #ccc;padding:4px 8px;text-align:left}\
             .pass{color:#1a7f37}.fail{color:#cf222e}.warn{color:#9a6700}code{font-size:90%}</style>\n",
        );
        html.push_str("</head>\n<body>\n<h1>Schema Reconciliation Report</h1>\n");

        let status_class = match self.status {
            RunStatus::Success => "pass",
            RunStatus::Degraded => "warn",
            RunStatus::Error => "fail",
        };
        let _ = writeln!(
            html,
            "<p><strong>Status:</strong> <span class=\"{}\">{}</span></p>",
            status_class, self.status
        );
        let _ = writeln!(html, "<p><strong>Database:</strong> {}</p>", escape_html(&self.database));
        let _ = writeln!(html, "<p><strong>Timestamp:</strong> {}</p>", escape_html(&self.timestamp));
        let _ = writeln!(html, "<p><strong>Report version:</strong> {}</p>", self.version);
        if let Some(fingerprint) = &self.declaration_fingerprint {
            let _ = writeln!(html, "<p><strong>Declaration:</strong> <code>{}</code></p>", fingerprint);
        }

        if let Some(error) = &self.error {
            let _ = writeln!(html, "<p class=\"fail\"><strong>Error:</strong> {}</p>", escape_html(error));
            html.push_str("</body>\n</html>\n");
            return html;
        }

        let _ = writeln!(
            html,
            "<p>Tables present: {} &middot; missing: {}{}</p>",
            self.tables_exist,
            self.tables_missing,
            if self.missing_tables.is_empty() {
                String::new()
            } else {
                format!(" ({})", escape_html(&self.missing_tables.join(", ")))
            }
        );

        html.push_str("<h2>Tables</h2>\n<table>\n<tr><th>Table</th><th>Status</th><th>Rows</th><th>Uncovered</th></tr>\n");
        for table in &self.tables {
            let class = match table.status {
                TableStatus::Ok | TableStatus::Created | TableStatus::Altered => "pass",
                TableStatus::Pending => "warn",
                TableStatus::Failed => "fail",
            };
            let rows = self
                .demo_data
                .get(&table.name)
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(
                html,
                "<tr><td>{}</td><td class=\"{}\">{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&table.name),
                class,
                table.status,
                rows,
                escape_html(&table.uncovered_columns.join(", "))
            );
        }
        html.push_str("</table>\n");

        if !self.discrepancies.is_empty() {
            html.push_str("<h2>Discrepancies</h2>\n<table>\n<tr><th>Kind</th><th>Target</th><th>Message</th></tr>\n");
            for discrepancy in &self.discrepancies {
                let _ = writeln!(
                    html,
                    "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                    discrepancy.kind,
                    escape_html(&discrepancy.target()),
                    escape_html(&discrepancy.message)
                );
            }
            html.push_str("</table>\n");
        }

        if !self.actions.is_empty() {
            html.push_str("<h2>Corrective actions</h2>\n<table>\n<tr><th>#</th><th>Action</th><th>SQL</th><th>Outcome</th></tr>\n");
            for (i, record) in self.actions.iter().enumerate() {
                let class = match record.outcome {
                    crate::action::ActionOutcome::Failed { .. } => "fail",
                    crate::action::ActionOutcome::Applied { .. } => "pass",
                    _ => "warn",
                };
                let destructive = if record.action.destructive { " <strong>(destructive)</strong>" } else { "" };
                let _ = writeln!(
                    html,
                    "<tr><td>{}</td><td>{}{}</td><td><code>{}</code></td><td class=\"{}\">{}</td></tr>",
                    i + 1,
                    escape_html(&record.action.description),
                    destructive,
                    escape_html(&record.action.sql),
                    class,
                    escape_html(&record.outcome.to_string())
                );
            }
            html.push_str("</table>\n");
        }

        if !self.verification.is_empty() {
            html.push_str("<h2>Smoke tests</h2>\n<table>\n<tr><th>Check</th><th>Result</th><th>Detail</th></tr>\n");
            for result in &self.verification {
                let (class, label) = if result.passed { ("pass", "passed") } else { ("fail", "failed") };
                let detail = match (&result.detail, result.rows) {
                    (Some(detail), _) => escape_html(detail),
                    (None, Some(rows)) => format!("{} rows", rows),
                    (None, None) => String::new(),
                };
                let _ = writeln!(
                    html,
                    "<tr><td>{}</td><td class=\"{}\">{}</td><td>{}</td></tr>",
                    escape_html(&result.check),
                    class,
                    label,
                    detail
                );
            }
            html.push_str("</table>\n");
        }

        html.push_str("</body>\n</html>\n");
        html
    }

    /// Render in the requested format
    pub fn render(&self, format: OutputFormat) -> Result<String, serde_json::Error> {
        match format {
            OutputFormat::Json => self.to_json(),
            OutputFormat::Html => Ok(self.to_html()),
        }
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path, format: OutputFormat) -> Result<(), std::io::Error> {
        let rendered = self.render(format)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, rendered)
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
