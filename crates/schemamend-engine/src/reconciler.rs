//! Reconciler: compares the declaration with the observed schema, plans
//! corrective actions and applies them
//!
//! Planning is pure. Applying checks each action's guard against the live
//! database right before executing it, so a second run (or a concurrent one)
//! finds nothing left to do.

use crate::ddl;
use schemamend_catalog::{CatalogError, DatabaseAdapter};
use schemamend_core::{
    ActionKind, ActionOutcome, ActionRecord, ColumnSpec, CorrectiveAction, DatabaseEngine,
    Discrepancy, DiscrepancyKind, ObservedSchema, SchemaDeclaration, TableObservation, TableSpec,
};

/// Options controlling `apply`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Execute `drop_column` actions instead of skipping them
    pub allow_destructive: bool,
}

/// Result of applying a batch
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedActions {
    /// One record per planned action, in plan order
    pub records: Vec<ActionRecord>,

    /// Set when the database became unreachable; later actions were skipped
    pub aborted: Option<CatalogError>,
}

impl AppliedActions {
    pub fn applied_count(&self) -> usize {
        self.records.iter().filter(|r| r.outcome.is_applied()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.records.iter().filter(|r| r.outcome.is_failed()).count()
    }
}

pub struct Reconciler<'a> {
    declaration: &'a SchemaDeclaration,
    engine: DatabaseEngine,
}

impl<'a> Reconciler<'a> {
    pub fn new(declaration: &'a SchemaDeclaration, engine: DatabaseEngine) -> Self {
        Self { declaration, engine }
    }

    /// Every difference between the declaration and the observed schema
    pub fn discrepancies(&self, observed: &ObservedSchema) -> Vec<Discrepancy> {
        let mut found = Vec::new();

        for table in &self.declaration.tables {
            let Some(observation) = observed.table(&table.name) else {
                found.push(Discrepancy::new(
                    DiscrepancyKind::MissingTable,
                    &table.name,
                    format!("Table '{}' does not exist", table.name),
                ));
                continue;
            };

            for column in &table.columns {
                let Some(actual) = observation.column(&column.name) else {
                    let message = match present_legacy(column, observation).first() {
                        Some(legacy) => format!(
                            "Column '{}' is missing; legacy column '{}' holds its values",
                            column.name, legacy
                        ),
                        None => format!("Column '{}' is missing", column.name),
                    };
                    found.push(
                        Discrepancy::new(DiscrepancyKind::MissingColumn, &table.name, message)
                            .with_column(&column.name),
                    );
                    continue;
                };

                if !column.logical_type().is_compatible_with(&actual.logical_type) {
                    found.push(
                        Discrepancy::new(
                            DiscrepancyKind::WrongType,
                            &table.name,
                            format!(
                                "Column '{}' has type {}, expected {}",
                                column.name, actual.declared_type, column.sql_type
                            ),
                        )
                        .with_column(&column.name)
                        .with_comparison(&column.sql_type, &actual.declared_type),
                    );
                }

                for legacy in &column.legacy_names {
                    let pending = observation.pending_legacy_copy(&column.name, legacy);
                    if pending > 0 {
                        found.push(
                            Discrepancy::new(
                                DiscrepancyKind::NeedsBackfill,
                                &table.name,
                                format!(
                                    "{} row(s) have '{}' set but '{}' empty",
                                    pending, legacy, column.name
                                ),
                            )
                            .with_column(&column.name),
                        );
                    }
                }

                let pending = observation.pending_backfill(&column.name);
                if pending > 0 {
                    found.push(
                        Discrepancy::new(
                            DiscrepancyKind::NeedsBackfill,
                            &table.name,
                            format!("{} row(s) have NULL '{}'", pending, column.name),
                        )
                        .with_column(&column.name),
                    );
                }
            }

            for obsolete in &table.obsolete_columns {
                if observation.has_column(obsolete) {
                    found.push(
                        Discrepancy::new(
                            DiscrepancyKind::ObsoleteColumn,
                            &table.name,
                            format!("Column '{}' is declared obsolete but still present", obsolete),
                        )
                        .with_column(obsolete),
                    );
                }
            }
        }

        found
    }

    /// Ordered corrective actions, empty when the database already complies
    ///
    /// Tables follow declaration order. Within a table: create, or adds
    /// followed by backfills followed by drops.
    pub fn plan(&self, observed: &ObservedSchema) -> Vec<CorrectiveAction> {
        let mut actions = Vec::new();

        for table in &self.declaration.tables {
            match observed.table(&table.name) {
                None => actions.push(self.create_action(table)),
                Some(observation) => actions.extend(self.alter_actions(table, observation)),
            }
        }

        actions
    }

    fn create_action(&self, table: &TableSpec) -> CorrectiveAction {
        CorrectiveAction::new(
            ActionKind::CreateTable,
            &table.name,
            ddl::create_table(table, self.engine),
            format!("Create table '{}' with {} column(s)", table.name, table.columns.len()),
        )
    }

    fn alter_actions(&self, table: &TableSpec, observation: &TableObservation) -> Vec<CorrectiveAction> {
        let mut adds = Vec::new();
        let mut backfills = Vec::new();
        let mut drops = Vec::new();

        for column in &table.columns {
            let legacy = present_legacy(column, observation);

            if !observation.has_column(&column.name) {
                if legacy.is_empty() {
                    adds.push(
                        CorrectiveAction::new(
                            ActionKind::AddColumn,
                            &table.name,
                            ddl::add_column(&table.name, column),
                            format!("Add column '{}' {}", column.name, column.sql_type),
                        )
                        .with_column(&column.name),
                    );
                    continue;
                }

                let mut description = format!(
                    "Add column '{}' {} alongside legacy '{}'",
                    column.name, column.sql_type, legacy[0]
                );
                if let Some(omitted) = alias_omissions(column) {
                    description.push_str(&format!(" (declared {} not applied)", omitted));
                }
                adds.push(
                    CorrectiveAction::new(
                        ActionKind::AddColumn,
                        &table.name,
                        ddl::add_alias_column(&table.name, column),
                        description,
                    )
                    .with_column(&column.name),
                );
                for name in &legacy {
                    backfills.push(copy_action(&table.name, &column.name, name));
                }
                if let Some(action) = default_backfill_action(&table.name, column) {
                    backfills.push(action);
                }
                continue;
            }

            for name in &legacy {
                if observation.pending_legacy_copy(&column.name, name) > 0 {
                    backfills.push(copy_action(&table.name, &column.name, name));
                }
            }

            if observation.pending_backfill(&column.name) > 0 {
                if let Some(action) = default_backfill_action(&table.name, column) {
                    backfills.push(action);
                }
            }
        }

        for obsolete in &table.obsolete_columns {
            if observation.has_column(obsolete) {
                drops.push(
                    CorrectiveAction::new(
                        ActionKind::DropColumn,
                        &table.name,
                        ddl::drop_column(&table.name, obsolete),
                        format!("Drop obsolete column '{}'", obsolete),
                    )
                    .with_column(obsolete),
                );
            }
        }

        adds.extend(backfills);
        adds.extend(drops);
        adds
    }

    /// Apply actions one at a time, each in its own transaction
    ///
    /// A failed action is recorded and the batch continues. Only a lost
    /// connection stops the batch.
    pub async fn apply(
        &self,
        adapter: &dyn DatabaseAdapter,
        actions: Vec<CorrectiveAction>,
        options: ApplyOptions,
    ) -> AppliedActions {
        let mut records = Vec::with_capacity(actions.len());
        let mut aborted: Option<CatalogError> = None;

        for action in actions {
            if aborted.is_some() {
                records.push(ActionRecord {
                    action,
                    outcome: ActionOutcome::Skipped {
                        reason: "run aborted: database unreachable".to_string(),
                    },
                });
                continue;
            }

            let outcome = match self.execute_one(adapter, &action, options).await {
                Ok(outcome) => outcome,
                Err(e) if e.is_connectivity() => {
                    tracing::error!(table = %action.table, "database unreachable: {}", e);
                    let outcome = ActionOutcome::Failed { error: e.to_string() };
                    aborted = Some(e);
                    outcome
                }
                Err(e) => {
                    tracing::warn!(
                        table = %action.table,
                        kind = %action.kind,
                        "corrective action failed: {}",
                        e
                    );
                    ActionOutcome::Failed { error: e.to_string() }
                }
            };

            records.push(ActionRecord { action, outcome });
        }

        AppliedActions { records, aborted }
    }

    async fn execute_one(
        &self,
        adapter: &dyn DatabaseAdapter,
        action: &CorrectiveAction,
        options: ApplyOptions,
    ) -> Result<ActionOutcome, CatalogError> {
        if action.destructive && !options.allow_destructive {
            return Ok(ActionOutcome::Skipped {
                reason: "destructive action not allowed for this run".to_string(),
            });
        }

        if let Some(reason) = guard(adapter, action).await? {
            tracing::debug!(table = %action.table, kind = %action.kind, %reason, "skipping action");
            return Ok(ActionOutcome::Skipped { reason });
        }

        let rows_affected = adapter.execute(&action.sql).await?;
        tracing::info!(
            table = %action.table,
            kind = %action.kind,
            rows_affected,
            "applied {}",
            action.description
        );
        Ok(ActionOutcome::Applied { rows_affected })
    }
}

/// Check-before-mutate: a reason to skip, or None to proceed
async fn guard(adapter: &dyn DatabaseAdapter, action: &CorrectiveAction) -> Result<Option<String>, CatalogError> {
    let column = action.column.as_deref().unwrap_or_default();

    let reason = match action.kind {
        ActionKind::CreateTable => adapter
            .has_table(&action.table)
            .await?
            .then(|| format!("table '{}' already exists", action.table)),
        ActionKind::AddColumn => adapter
            .has_column(&action.table, column)
            .await?
            .then(|| format!("column '{}' already present", column)),
        ActionKind::DropColumn => (!adapter.has_column(&action.table, column).await?)
            .then(|| format!("column '{}' already absent", column)),
        ActionKind::Backfill => (!adapter.has_column(&action.table, column).await?)
            .then(|| format!("column '{}' is missing", column)),
    };

    Ok(reason)
}

/// Legacy names of `column` that exist in the observed table
fn present_legacy<'c>(column: &'c ColumnSpec, observation: &TableObservation) -> Vec<&'c str> {
    column
        .legacy_names
        .iter()
        .filter(|legacy| observation.has_column(legacy))
        .map(String::as_str)
        .collect()
}

/// Declared constraints an alias column is added without, e.g. `DEFAULT 0, NOT NULL`
fn alias_omissions(column: &ColumnSpec) -> Option<String> {
    let mut omitted = Vec::new();
    if let Some(default) = &column.default {
        omitted.push(format!("DEFAULT {}", default));
    }
    if !column.nullable {
        omitted.push("NOT NULL".to_string());
    }
    (!omitted.is_empty()).then(|| omitted.join(", "))
}

fn copy_action(table: &str, column: &str, legacy: &str) -> CorrectiveAction {
    CorrectiveAction::new(
        ActionKind::Backfill,
        table,
        ddl::copy_from_legacy(table, column, legacy),
        format!("Copy '{}' into '{}' where empty", legacy, column),
    )
    .with_column(column)
}

fn default_backfill_action(table: &str, column: &ColumnSpec) -> Option<CorrectiveAction> {
    if !column.backfill_nulls {
        return None;
    }
    let default = column.default.as_deref()?;
    Some(
        CorrectiveAction::new(
            ActionKind::Backfill,
            table,
            ddl::backfill_default(table, &column.name, default),
            format!("Set NULL '{}' to {}", column.name, default),
        )
        .with_column(&column.name),
    )
}
