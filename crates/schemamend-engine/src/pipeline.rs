//! Inspect → plan → apply → verify → report
//!
//! The pipeline never returns an error. Anything fatal (the database cannot
//! be reached) ends up in [`Report::error`] with status `error`; everything
//! else is recorded per action or per smoke test.

use crate::inspector::Inspector;
use crate::reconciler::{ApplyOptions, Reconciler};
use crate::verifier::Verifier;
use schemamend_catalog::{connect, CatalogError, DatabaseAdapter};
use schemamend_core::{
    ActionRecord, Config, DatabaseEngine, ObservedSchema, Report, TableReport, TableStatus,
};

/// What a run is allowed to do
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Execute the plan; when false every action is reported as planned
    pub apply: bool,

    /// Also execute destructive actions
    pub allow_destructive: bool,
}

impl RunOptions {
    pub fn dry_run() -> Self {
        Self::default()
    }

    pub fn apply() -> Self {
        Self {
            apply: true,
            allow_destructive: false,
        }
    }

    pub fn with_destructive(mut self, allow: bool) -> Self {
        self.allow_destructive = allow;
        self
    }
}

pub struct Pipeline {
    config: Config,
    options: RunOptions,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            options: RunOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Connect using `[database]`, then run
    pub async fn run_with_config(&self) -> Report {
        match connect(&self.config).await {
            Ok(adapter) => self.run(adapter.as_ref()).await,
            Err(e) => {
                tracing::error!("cannot connect: {}", e);
                Report::fatal(self.config_target(), e.to_string())
            }
        }
    }

    /// Run every stage against an open adapter
    pub async fn run(&self, adapter: &dyn DatabaseAdapter) -> Report {
        let database = describe(adapter);

        if let Err(e) = adapter.test_connection().await {
            tracing::error!(%database, "connection test failed: {}", e);
            return Report::fatal(database, e.to_string());
        }

        let mut report = Report::new(&database);
        if let Err(e) = self.run_stages(adapter, &mut report).await {
            tracing::error!(%database, "run aborted: {}", e);
            report.error = Some(e.to_string());
        }

        report.finalize();
        tracing::info!(status = %report.status, "run finished");
        report
    }

    /// Smoke tests only; the schema is not inspected or changed
    pub async fn verify(&self, adapter: &dyn DatabaseAdapter) -> Report {
        let database = describe(adapter);

        if let Err(e) = adapter.test_connection().await {
            return Report::fatal(database, e.to_string());
        }

        let mut report = Report::new(&database);
        report.declaration_fingerprint = Some(self.config.declaration.fingerprint());

        match Verifier::new(adapter).run(&self.config.smoke_tests).await {
            Ok(verification) => report.verification = verification.results,
            Err(e) => report.error = Some(e.to_string()),
        }

        report.finalize();
        report
    }

    async fn run_stages(&self, adapter: &dyn DatabaseAdapter, report: &mut Report) -> Result<(), CatalogError> {
        let declaration = &self.config.declaration;
        report.declaration_fingerprint = Some(declaration.fingerprint());

        tracing::info!(tables = declaration.tables.len(), "inspecting schema");
        let inspector = Inspector::new(adapter);
        let before = inspector.inspect(declaration).await?;

        report.missing_tables = declaration
            .tables
            .iter()
            .filter(|t| !before.has_table(&t.name))
            .map(|t| t.name.clone())
            .collect();
        report.tables_missing = report.missing_tables.len();
        report.tables_exist = declaration.tables.len() - report.tables_missing;

        let reconciler = Reconciler::new(declaration, adapter.engine());
        report.discrepancies = reconciler.discrepancies(&before);
        let plan = reconciler.plan(&before);
        tracing::info!(
            discrepancies = report.discrepancies.len(),
            actions = plan.len(),
            "planned reconciliation"
        );

        let after = if self.options.apply && !plan.is_empty() {
            let applied = reconciler
                .apply(
                    adapter,
                    plan,
                    ApplyOptions {
                        allow_destructive: self.options.allow_destructive,
                    },
                )
                .await;
            tracing::info!(
                applied = applied.applied_count(),
                failed = applied.failed_count(),
                "applied corrective actions"
            );
            report.actions = applied.records;
            if let Some(e) = applied.aborted {
                return Err(e);
            }
            inspector.inspect(declaration).await?
        } else {
            report.actions = plan.into_iter().map(ActionRecord::planned).collect();
            before.clone()
        };

        report.tables = self.table_reports(&before, &after, &report.actions);
        report.demo_data = after
            .tables
            .values()
            .map(|t| (t.name.clone(), t.row_count))
            .collect();

        tracing::info!(checks = self.config.smoke_tests.len(), "running smoke tests");
        let verification = Verifier::new(adapter).run(&self.config.smoke_tests).await?;
        report.verification = verification.results;

        Ok(())
    }

    fn table_reports(
        &self,
        before: &ObservedSchema,
        after: &ObservedSchema,
        actions: &[ActionRecord],
    ) -> Vec<TableReport> {
        let unresolved = if self.options.apply {
            TableStatus::Failed
        } else {
            TableStatus::Pending
        };

        self.config
            .declaration
            .tables
            .iter()
            .map(|table| {
                let uncovered_columns: Vec<String> = table
                    .columns
                    .iter()
                    .filter(|c| !after.has_column(&table.name, &c.name))
                    .map(|c| c.name.clone())
                    .collect();

                let records: Vec<&ActionRecord> =
                    actions.iter().filter(|r| r.action.table == table.name).collect();

                let status = if !after.has_table(&table.name) || !uncovered_columns.is_empty() {
                    unresolved
                } else if records.iter().any(|r| r.outcome.is_failed()) {
                    TableStatus::Failed
                } else if !before.has_table(&table.name) {
                    TableStatus::Created
                } else if records.iter().any(|r| r.outcome.is_applied()) {
                    TableStatus::Altered
                } else if !self.options.apply && records.iter().any(|r| !r.action.destructive) {
                    TableStatus::Pending
                } else {
                    TableStatus::Ok
                };

                TableReport {
                    name: table.name.clone(),
                    status,
                    uncovered_columns,
                }
            })
            .collect()
    }

    /// Connection strings may carry credentials; only SQLite paths are shown
    fn config_target(&self) -> String {
        match self.config.database.engine {
            DatabaseEngine::Sqlite => format!("SQLite {}", self.config.resolved_database_url()),
            DatabaseEngine::Postgres => "PostgreSQL".to_string(),
        }
    }
}

fn describe(adapter: &dyn DatabaseAdapter) -> String {
    format!("{} {}", adapter.name(), adapter.target())
}
