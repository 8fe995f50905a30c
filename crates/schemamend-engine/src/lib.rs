//! Reconciliation engine: inspect, plan, apply, verify, report
//!
//! Stages are plain structs borrowing one [`DatabaseAdapter`] for the length
//! of a run. [`Pipeline`] chains them and always produces a
//! [`schemamend_core::Report`].
//!
//! [`DatabaseAdapter`]: schemamend_catalog::DatabaseAdapter

pub mod ddl;
pub mod inspector;
pub mod pipeline;
pub mod reconciler;
pub mod verifier;

pub use inspector::Inspector;
pub use pipeline::{Pipeline, RunOptions};
pub use reconciler::{AppliedActions, ApplyOptions, Reconciler};
pub use verifier::{check_read_only, Verification, Verifier};

/// Engine error types
///
/// Database failures stay [`schemamend_catalog::CatalogError`]s; the pipeline
/// turns them into report entries instead of returning them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// A smoke test that would write
    #[error("Smoke test is not read-only: {0}")]
    NotReadOnly(String),
}
