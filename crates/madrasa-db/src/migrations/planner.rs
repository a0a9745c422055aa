use super::{DesiredSchema, MigrationAction, SchemaSnapshot};

/// A check the planner made, and whether it still needs work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    pub action: MigrationAction,
    pub pending: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationPlan {
    pub steps: Vec<PlannedStep>,
}

impl MigrationPlan {
    pub fn pending(&self) -> impl Iterator<Item = &MigrationAction> {
        self.steps.iter().filter(|s| s.pending).map(|s| &s.action)
    }

    pub fn is_up_to_date(&self) -> bool {
        self.steps.iter().all(|s| !s.pending)
    }
}

/// Compare `snapshot` with `desired`.
///
/// The table step always comes first and is emitted once no matter how
/// many tables are missing. Column steps follow in declaration order, and
/// only for tables present in the snapshot: a table created by this run
/// gets its columns from the model definition.
pub fn plan(snapshot: &SchemaSnapshot, desired: &DesiredSchema) -> MigrationPlan {
    let mut steps = Vec::with_capacity(desired.columns.len() + 1);

    let missing: Vec<&'static str> = desired
        .tables
        .iter()
        .copied()
        .filter(|table| !snapshot.has_table(table))
        .collect();
    let pending = !missing.is_empty();
    steps.push(PlannedStep {
        action: MigrationAction::CreateAllMissingTables {
            tables: if pending {
                missing
            } else {
                desired.tables.to_vec()
            },
        },
        pending,
    });

    for column in desired.columns {
        if !snapshot.has_table(column.table) {
            continue;
        }
        steps.push(PlannedStep {
            action: MigrationAction::AddColumn(*column),
            pending: !snapshot.has_column(column.table, column.column),
        });
    }

    MigrationPlan { steps }
}
