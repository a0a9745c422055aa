use madrasa_common::Error;
use rusqlite::Connection;
use tracing::{info, warn};

use super::{
    ActionOutcome, DesiredColumn, MigrationAction, MigrationPlan, MigrationReport,
    MigrationResult, SchemaInspector,
};
use crate::schema::{self, TableModel};

/// Applies a [`MigrationPlan`] step by step.
///
/// Every step is isolated: a failure is recorded and the next step still
/// runs. Each column addition commits in its own transaction, so a later
/// failure never undoes an earlier change.
pub struct MigrationExecutor<'a> {
    conn: &'a mut Connection,
    models: &'a [TableModel],
}

impl<'a> MigrationExecutor<'a> {
    pub fn new(conn: &'a mut Connection, models: &'a [TableModel]) -> Self {
        Self { conn, models }
    }

    pub fn execute<F>(&mut self, plan: MigrationPlan, mut observe: F) -> MigrationReport
    where
        F: FnMut(&ActionOutcome),
    {
        let mut report = MigrationReport::default();
        for step in plan.steps {
            let result = if step.pending {
                self.apply(&step.action)
            } else {
                MigrationResult::AlreadyPresent
            };

            let outcome = ActionOutcome {
                action: step.action,
                result,
            };
            observe(&outcome);
            report.outcomes.push(outcome);
        }
        report
    }

    fn apply(&mut self, action: &MigrationAction) -> MigrationResult {
        match action {
            MigrationAction::CreateAllMissingTables { .. } => self.create_missing_tables(),
            MigrationAction::AddColumn(column) => self.add_column(column),
        }
    }

    fn create_missing_tables(&mut self) -> MigrationResult {
        match schema::create_all(&*self.conn, self.models) {
            Ok(created) if created.is_empty() => MigrationResult::AlreadyPresent,
            Ok(created) => {
                info!("created tables: {}", created.join(", "));
                MigrationResult::Applied
            }
            Err(e) => {
                warn!("table creation failed: {e}");
                failed(format!("failed to create tables: {e}"))
            }
        }
    }

    fn add_column(&mut self, column: &DesiredColumn) -> MigrationResult {
        // An earlier step may already have created the column.
        match SchemaInspector::new(&*self.conn).column_names(column.table) {
            Ok(existing) if existing.contains(column.column) => {
                return MigrationResult::AlreadyPresent;
            }
            Ok(_) => {}
            Err(e) => return failed(format!("failed to read columns of {}: {e}", column.table)),
        }

        let tx = match self.conn.transaction() {
            Ok(tx) => tx,
            Err(e) => return failed(format!("failed to begin transaction: {e}")),
        };

        match tx.execute_batch(column.ddl) {
            Ok(()) => match tx.commit() {
                Ok(()) => {
                    info!("added column {}.{}", column.table, column.column);
                    MigrationResult::Applied
                }
                Err(e) => {
                    warn!("commit failed for {}.{}: {e}", column.table, column.column);
                    failed(format!(
                        "failed to commit {}.{}: {e}",
                        column.table, column.column
                    ))
                }
            },
            Err(e) => {
                warn!("failed to add {}.{}: {e}", column.table, column.column);
                if let Err(rollback) = tx.rollback() {
                    warn!("rollback failed: {rollback}");
                }
                failed(format!(
                    "failed to add {}.{}: {e}",
                    column.table, column.column
                ))
            }
        }
    }
}

/// A step failure, described through [`Error::Migration`].
fn failed(reason: String) -> MigrationResult {
    MigrationResult::Failed(Error::Migration(reason).to_string())
}
