//! Idempotent, additive schema migration.
//!
//! A run reads the live schema ([`SchemaInspector`]), compares it with the
//! static [`DesiredSchema`] ([`plan`]) and applies what is missing
//! ([`MigrationExecutor`]). Nothing is ever dropped or altered, and a second
//! run against the same database applies nothing.
//!
//! Runs are not locked against each other; two operators migrating the same
//! database at once is unsupported.

mod executor;
mod inspector;
mod planner;

use std::fmt;

use madrasa_common::Result;
use rusqlite::Connection;
use tracing::info;

pub use executor::MigrationExecutor;
pub use inspector::{SchemaInspector, SchemaSnapshot};
pub use planner::{MigrationPlan, PlannedStep, plan};

use crate::schema::{MASALA, MODELS, SMS_LOG, TableModel};

/// A column that must exist, and the statement that adds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DesiredColumn {
    pub table: &'static str,
    pub column: &'static str,
    pub ddl: &'static str,
}

/// The target shape of the schema: required tables, required columns (in
/// the order they are applied) and the models used to create tables.
#[derive(Debug, Clone, Copy)]
pub struct DesiredSchema {
    pub tables: &'static [&'static str],
    pub columns: &'static [DesiredColumn],
    pub models: &'static [TableModel],
}

const REQUIRED_TABLES: &[&str] = &[MASALA.name, SMS_LOG.name];

const REQUIRED_COLUMNS: &[DesiredColumn] = &[DesiredColumn {
    table: "user",
    column: "sms_count",
    ddl: "ALTER TABLE user ADD COLUMN sms_count INTEGER DEFAULT 0",
}];

pub fn desired_schema() -> DesiredSchema {
    DesiredSchema {
        tables: REQUIRED_TABLES,
        columns: REQUIRED_COLUMNS,
        models: MODELS,
    }
}

/// One unit of schema work. There is deliberately no variant that drops or
/// changes an existing object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationAction {
    /// Create every declared model that is missing. `tables` names the
    /// required tables this step covers.
    CreateAllMissingTables { tables: Vec<&'static str> },
    AddColumn(DesiredColumn),
}

impl fmt::Display for MigrationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationAction::CreateAllMissingTables { tables } => {
                write!(f, "tables {}", tables.join(", "))
            }
            MigrationAction::AddColumn(col) => write!(f, "column {}.{}", col.table, col.column),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationResult {
    Applied,
    AlreadyPresent,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub action: MigrationAction,
    pub result: MigrationResult,
}

#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    pub outcomes: Vec<ActionOutcome>,
}

impl MigrationReport {
    fn count(&self, pred: impl Fn(&MigrationResult) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.result)).count()
    }

    pub fn applied(&self) -> usize {
        self.count(|r| matches!(r, MigrationResult::Applied))
    }

    pub fn already_present(&self) -> usize {
        self.count(|r| matches!(r, MigrationResult::AlreadyPresent))
    }

    pub fn failed(&self) -> usize {
        self.count(|r| matches!(r, MigrationResult::Failed(_)))
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }
}

/// Inspect, plan and execute in one pass. `observe` sees each outcome as
/// soon as its step finishes.
///
/// Only a failure to read the schema is returned as an error; per-step
/// failures are recorded in the report.
pub fn run<F>(conn: &mut Connection, desired: &DesiredSchema, observe: F) -> Result<MigrationReport>
where
    F: FnMut(&ActionOutcome),
{
    let snapshot = SchemaInspector::new(conn).snapshot()?;
    let plan = plan(&snapshot, desired);
    info!(
        tables = snapshot.len(),
        pending = plan.pending().count(),
        "migration planned"
    );

    let report = MigrationExecutor::new(conn, desired.models).execute(plan, observe);
    info!(
        applied = report.applied(),
        already_present = report.already_present(),
        failed = report.failed(),
        "migration finished"
    );
    Ok(report)
}

/// Actions a run would apply right now, without applying them.
pub fn pending_actions(conn: &Connection, desired: &DesiredSchema) -> Result<Vec<MigrationAction>> {
    let snapshot = SchemaInspector::new(conn).snapshot()?;
    Ok(plan(&snapshot, desired).pending().cloned().collect())
}
