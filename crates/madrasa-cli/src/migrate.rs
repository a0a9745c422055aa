use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use madrasa_db::migrations::{self, ActionOutcome, MigrationReport, MigrationResult};
use tracing::warn;

const RULE_WIDTH: usize = 60;

/// Bring the database at `db_path` up to the current schema, printing one
/// line per step to `out`.
///
/// Per-step failures are printed and logged but do not fail the command;
/// only an unreachable or unreadable database does.
pub fn run_migration(db_path: &Path, out: &mut impl Write) -> Result<MigrationReport> {
    let rule = "=".repeat(RULE_WIDTH);
    writeln!(out, "{rule}")?;
    writeln!(out, "VPS DATABASE MIGRATION")?;
    writeln!(out, "{rule}")?;
    writeln!(out, "Database: {}", db_path.display())?;

    let mut conn = madrasa_db::open_for_migration(db_path)
        .with_context(|| format!("failed to open database {}", db_path.display()))?;

    let mut write_err = None;
    let report = migrations::run(&mut conn, &migrations::desired_schema(), |outcome| {
        if let Err(e) = writeln!(out, "{}", outcome_line(outcome)) {
            write_err.get_or_insert(e);
        }
    })
    .context("failed to inspect database schema")?;
    if let Some(e) = write_err {
        return Err(e.into());
    }

    for outcome in &report.outcomes {
        if let MigrationResult::Failed(reason) = &outcome.result {
            warn!("migration step {} failed: {reason}", outcome.action);
        }
    }

    writeln!(out)?;
    writeln!(
        out,
        "Applied: {}  Already present: {}  Failed: {}",
        report.applied(),
        report.already_present(),
        report.failed()
    )?;
    writeln!(out)?;
    writeln!(out, "{rule}")?;
    writeln!(out, "MIGRATION COMPLETED")?;
    writeln!(out, "{rule}")?;
    writeln!(out)?;
    writeln!(out, "Next steps:")?;
    writeln!(out, "1. Restart the application: sudo systemctl restart madrasha")?;
    writeln!(out, "2. Check application status: sudo systemctl status madrasha")?;
    writeln!(out, "3. Test login with all user roles")?;
    writeln!(out, "{rule}")?;

    Ok(report)
}

fn outcome_line(outcome: &ActionOutcome) -> String {
    match &outcome.result {
        MigrationResult::Applied => format!("✅ Applied {}", outcome.action),
        MigrationResult::AlreadyPresent => format!("✓ {} already present", outcome.action),
        MigrationResult::Failed(reason) => format!("⚠ Error applying {}: {reason}", outcome.action),
    }
}
