//! schemamend core
//!
//! Core domain model with stable, versioned types.
//! Never rename discrepancy or action kinds - they are part of the report contract.

pub mod action;
pub mod config;
pub mod discrepancy;
pub mod report;
pub mod schema;

pub use action::{ActionKind, ActionOutcome, ActionRecord, CorrectiveAction};
pub use config::{Config, ConfigError, DatabaseConfig, DatabaseEngine, ReportConfig, SmokeTest};
pub use discrepancy::{Discrepancy, DiscrepancyKind, Severity};
pub use report::{
    OutputFormat, Report, ReportVersion, RunStatus, TableReport, TableStatus, VerificationResult,
};
pub use schema::{
    ColumnDescriptor, ColumnSpec, DeclarationError, IdentifierCase, KeyRole, LogicalType, Nullability,
    ObservedSchema, SchemaDeclaration, TableObservation, TableSpec,
};
