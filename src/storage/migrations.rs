use std::collections::{BTreeMap, BTreeSet};

use jiff::civil::Date;
use uuid::Uuid;

use crate::storage::StorageError;

/// One CSV row keyed by column name
pub type Row = BTreeMap<String, String>;

type MigrationFn = fn(Vec<Row>, &MigrationContext) -> Result<Vec<Row>, StorageError>;

/// Layout written by the first release: no title, no remaining days
pub const V1_COLUMNS: [&str; 5] = ["Description", "Due Date", "Priority", "Suggestion", "Email"];

/// Adds a title and a remaining-days snapshot
pub const V2_COLUMNS: [&str; 7] = [
    "Title",
    "Description",
    "Due Date",
    "Priority",
    "Suggestion",
    "Days Left",
    "Email",
];

/// Current layout: stable ids in front
pub const V3_COLUMNS: [&str; 8] = [
    "Id",
    "Title",
    "Description",
    "Due Date",
    "Priority",
    "Suggestion",
    "Days Left",
    "Email",
];

pub struct MigrationContext {
    /// Date used to snapshot remaining days for rows that never had one
    pub today: Date,
}

fn get_migrations() -> Vec<MigrationFn> {
    vec![migrate_v1_to_v2, migrate_v2_to_v3]
}

/// Column order is not significant. Returns None for layouts we don't know.
pub fn detect_version(headers: &[String]) -> Option<u32> {
    let found: BTreeSet<&str> = headers.iter().map(|h| h.trim()).collect();
    let matches = |columns: &[&str]| found == columns.iter().copied().collect::<BTreeSet<_>>();

    if matches(&V3_COLUMNS) {
        Some(3)
    } else if matches(&V2_COLUMNS) {
        Some(2)
    } else if matches(&V1_COLUMNS) {
        Some(1)
    } else {
        None
    }
}

/// Migrations are applied sequentially: v1→v2→v3→...→target
pub fn apply_migrations(
    mut rows: Vec<Row>,
    from_version: u32,
    to_version: u32,
    context: &MigrationContext,
) -> Result<Vec<Row>, StorageError> {
    if from_version == to_version {
        return Ok(rows);
    }

    if from_version == 0 || from_version > to_version {
        return Err(StorageError::UnsupportedVersion(from_version));
    }

    let migrations = get_migrations();

    for version in from_version..to_version {
        let migration_idx = (version - 1) as usize; // v1→v2 is at index 0

        if migration_idx >= migrations.len() {
            return Err(StorageError::UnsupportedVersion(version));
        }

        log::debug!("Migrating {} rows from v{} to v{}", rows.len(), version, version + 1);
        rows = migrations[migration_idx](rows, context)?;
    }

    Ok(rows)
}

fn migrate_v1_to_v2(rows: Vec<Row>, context: &MigrationContext) -> Result<Vec<Row>, StorageError> {
    rows.into_iter()
        .enumerate()
        .map(|(index, mut row)| {
            let due = row.get("Due Date").map(|d| d.trim()).unwrap_or_default();
            let due_date: Date = due.parse().map_err(|e| StorageError::MigrationFailed {
                from: 1,
                message: format!("row {}: invalid due date '{}': {}", index + 1, due, e),
            })?;
            let days_left = i64::from((due_date - context.today).get_days());

            row.insert("Title".to_string(), String::new());
            row.insert("Days Left".to_string(), days_left.to_string());
            Ok(row)
        })
        .collect()
}

fn migrate_v2_to_v3(rows: Vec<Row>, _context: &MigrationContext) -> Result<Vec<Row>, StorageError> {
    Ok(rows
        .into_iter()
        .map(|mut row| {
            row.insert("Id".to_string(), Uuid::new_v4().to_string());
            row
        })
        .collect())
}
