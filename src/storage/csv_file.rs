use std::{
    collections::HashSet,
    fs::{self, OpenOptions, rename, write},
    path::{Path, PathBuf},
};

use fs2::FileExt;
use jiff::civil::Date;
use uuid::Uuid;

use crate::{
    models::{priority::Priority, store::Store, task::TaskRecord},
    storage::{
        Storage, StorageError,
        migrations::{MigrationContext, Row, V3_COLUMNS},
    },
};

/// Number of previous store files kept under `backups/`
const MAX_BACKUPS: usize = 5;

pub struct CsvFileStorage {
    path: PathBuf,
}

impl CsvFileStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn backup_dir(&self) -> PathBuf {
        self.path
            .parent()
            .unwrap_or(Path::new("."))
            .join("backups")
    }

    /// Backups are named `<store file>-<nanoseconds>`, zero-padded so that
    /// lexical order is age order
    fn backup_prefix(&self) -> String {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "store".to_string());
        format!("{}-", file_name)
    }

    /// Copies the current file into `backups/`, then prunes this store's
    /// backups down to the newest `MAX_BACKUPS`
    fn rotate_backups(&self) -> Result<(), StorageError> {
        if !self.path.is_file() {
            return Ok(());
        }

        let dir = self.backup_dir();
        let prefix = self.backup_prefix();
        let timestamp = jiff::Timestamp::now().as_nanosecond();
        let backup_path = dir.join(format!("{}{:020}", prefix, timestamp));

        fs::create_dir_all(&dir)
            .and_then(|_| fs::copy(&self.path, &backup_path))
            .map_err(|e| StorageError::BackupFailed {
                path: backup_path.clone(),
                source: e,
            })?;
        log::debug!("Backed up store to {}", backup_path.display());

        let cleanup_failed = |e| StorageError::CleanupFailed {
            dir: dir.clone(),
            source: e,
        };
        let mut backups: Vec<PathBuf> = fs::read_dir(&dir)
            .map_err(cleanup_failed)?
            .flatten()
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(&prefix))
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        backups.sort_unstable();

        let expired = backups.len().saturating_sub(MAX_BACKUPS);
        for path in backups.drain(..expired) {
            fs::remove_file(&path).map_err(cleanup_failed)?;
            log::debug!("Pruned backup {}", path.display());
        }

        Ok(())
    }

    /// Also reports whether the rows were migrated from an older layout
    fn parse(&self, content: &str) -> Result<(Store, bool), StorageError> {
        use crate::models::store::CURRENT_VERSION;
        use crate::storage::migrations::{apply_migrations, detect_version};

        if content.trim().is_empty() {
            return Ok((Store::default(), false));
        }

        let parse_failed = |e| StorageError::ParseFailed {
            path: self.path.clone(),
            source: e,
        };

        let mut reader = csv::Reader::from_reader(content.as_bytes());
        let headers: Vec<String> = reader
            .headers()
            .map_err(parse_failed)?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let file_version =
            detect_version(&headers).ok_or_else(|| StorageError::UnsupportedLayout {
                path: self.path.clone(),
                headers: headers.clone(),
            })?;

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(parse_failed)?;
            let row: Row = headers
                .iter()
                .cloned()
                .zip(record.iter().map(str::to_string))
                .collect();
            rows.push(row);
        }

        if file_version < CURRENT_VERSION {
            log::info!(
                "Migrating {} from schema v{} to v{}",
                self.path.display(),
                file_version,
                CURRENT_VERSION
            );
            let context = MigrationContext {
                today: jiff::Zoned::now().date(),
            };
            rows = apply_migrations(rows, file_version, CURRENT_VERSION, &context)?;
        }

        let mut seen = HashSet::new();
        let mut tasks = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            let invalid_row = |message| StorageError::InvalidRow {
                path: self.path.clone(),
                // line 1 is the header
                line: index as u64 + 2,
                message,
            };
            let task = record_from_row(row).map_err(invalid_row)?;
            if !seen.insert(task.id) {
                return Err(invalid_row(format!("duplicate id '{}'", task.id)));
            }
            tasks.push(task);
        }

        Ok((Store { tasks }, file_version < CURRENT_VERSION))
    }

    fn serialize(store: &Store) -> Result<Vec<u8>, StorageError> {
        let serialize_failed = |e| StorageError::SerializeFailed { source: e };

        let mut writer = csv::Writer::from_writer(vec![]);
        writer.write_record(V3_COLUMNS).map_err(serialize_failed)?;

        for task in &store.tasks {
            let due_date = task.due_date.to_string();
            let days_left = task.days_remaining.to_string();
            let id = task.id.to_string();
            writer
                .write_record([
                    id.as_str(),
                    task.title.as_deref().unwrap_or_default(),
                    task.description.as_str(),
                    due_date.as_str(),
                    task.priority.as_str(),
                    task.suggestion(),
                    days_left.as_str(),
                    task.notify_email.as_deref().unwrap_or_default(),
                ])
                .map_err(serialize_failed)?;
        }

        writer.into_inner().map_err(|e| StorageError::SerializeFailed {
            source: csv::Error::from(e.into_error()),
        })
    }
}

fn optional(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn required<'a>(row: &'a Row, column: &str) -> Result<&'a str, String> {
    row.get(column)
        .map(|v| v.trim())
        .ok_or_else(|| format!("missing column '{}'", column))
}

/// Suggestion is not read back: it is always derived from the priority.
fn record_from_row(row: &Row) -> Result<TaskRecord, String> {
    let id = required(row, "Id")?;
    let id = Uuid::parse_str(id).map_err(|e| format!("invalid id '{}': {}", id, e))?;

    let description = row
        .get("Description")
        .cloned()
        .ok_or_else(|| "missing column 'Description'".to_string())?;

    let due_date = required(row, "Due Date")?;
    let due_date: Date = due_date
        .parse()
        .map_err(|e| format!("invalid due date '{}': {}", due_date, e))?;

    let priority: Priority = required(row, "Priority")?
        .parse()
        .map_err(|e: crate::models::priority::ParsePriorityError| e.to_string())?;

    let days_left = required(row, "Days Left")?;
    // older writers stored this column as a float
    let days_remaining = days_left
        .parse::<i64>()
        .or_else(|_| days_left.parse::<f64>().map(|d| d.trunc() as i64))
        .map_err(|_| format!("invalid days left '{}'", days_left))?;

    Ok(TaskRecord {
        id,
        title: optional(row.get("Title")),
        description,
        due_date,
        priority,
        days_remaining,
        notify_email: optional(row.get("Email")),
    })
}

impl Storage for CsvFileStorage {
    fn load(&self) -> Result<Store, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                let (store, migrated) = self.parse(&content)?;
                log::debug!("Loaded {} tasks from {}", store.tasks.len(), self.path.display());
                // Migrated rows carry freshly assigned ids, so persist them once
                if migrated {
                    self.save(&store)?;
                }
                Ok(store)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Store::default()),
            Err(e) => Err(StorageError::LoadFailed {
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    fn save(&self, store: &Store) -> Result<(), StorageError> {
        let content = Self::serialize(store)?;

        let unique_temp = format!("{}.tmp.{}", self.path.display(), Uuid::new_v4());
        let temp_path = PathBuf::from(&unique_temp);
        write(&temp_path, content).map_err(|e| StorageError::SaveFailed {
            path: temp_path.clone(),
            source: e,
        })?;

        let lock_file_path = self.path.with_extension("lock");
        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_file_path)
            .map_err(|e| StorageError::SaveFailed {
                path: lock_file_path.clone(),
                source: e,
            })?;
        lock_file
            .lock_exclusive()
            .map_err(|e| StorageError::SaveFailed {
                path: lock_file_path,
                source: e,
            })?;

        self.rotate_backups()?;

        rename(&temp_path, &self.path).map_err(|e| StorageError::SaveFailed {
            path: self.path.clone(),
            source: e,
        })?;

        lock_file.unlock().map_err(|e| StorageError::SaveFailed {
            path: self.path.clone(),
            source: e,
        })?;

        log::debug!("Saved {} tasks to {}", store.tasks.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    use crate::models::task::{DerivedFields, TaskFields};

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("triage-{}-{}", name, Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn record(description: &str, priority: Priority) -> TaskRecord {
        let today = date(2026, 3, 1);
        TaskRecord::from_fields(
            Uuid::new_v4(),
            TaskFields {
                title: Some("Chores".to_string()),
                description: description.to_string(),
                due_date: date(2026, 3, 5),
                notify_email: None,
                derived: DerivedFields::compute(priority, date(2026, 3, 5), today),
            },
        )
    }

    #[test]
    fn test_save_and_load() {
        let dir = test_dir("save-load");
        let storage = CsvFileStorage::new(dir.join("tasks.csv"));

        let mut with_email = record("Call the bank, \"urgently\"", Priority::High);
        with_email.notify_email = Some("me@example.com".to_string());
        let store = Store {
            tasks: vec![with_email, record("Water plants\nand herbs", Priority::Low)],
        };

        storage.save(&store).unwrap();
        let loaded = storage.load().unwrap();

        assert_eq!(loaded, store);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_written_header_is_canonical() {
        let dir = test_dir("header");
        let path = dir.join("tasks.csv");
        let storage = CsvFileStorage::new(path.clone());

        storage.save(&Store::default()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(
            content.trim_end(),
            "Id,Title,Description,Due Date,Priority,Suggestion,Days Left,Email"
        );
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = test_dir("missing");
        let storage = CsvFileStorage::new(dir.join("nothing-here.csv"));

        let store = storage.load().unwrap();

        assert!(store.tasks.is_empty());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_v1_layout() {
        let dir = test_dir("v1");
        let path = dir.join("tasks.csv");
        fs::write(
            &path,
            "Description,Due Date,Priority,Suggestion,Email\n\
             Pay rent,2026-03-04,High,🚨 High priority. Do this ASAP.,\n\
             Read a book,2026-04-01,Low,✅ Low priority. Defer if needed.,me@example.com\n",
        )
        .unwrap();

        let store = CsvFileStorage::new(path).load().unwrap();

        assert_eq!(store.tasks.len(), 2);
        let first = &store.tasks[0];
        assert_eq!(first.title, None);
        assert_eq!(first.priority, Priority::High);
        assert_eq!(first.notify_email, None);
        let today = jiff::Zoned::now().date();
        assert_eq!(
            first.days_remaining,
            i64::from((date(2026, 3, 4) - today).get_days())
        );
        assert_eq!(
            store.tasks[1].notify_email.as_deref(),
            Some("me@example.com")
        );
        assert_ne!(store.tasks[0].id, store.tasks[1].id);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_v2_layout_with_float_days() {
        let dir = test_dir("v2");
        let path = dir.join("tasks.csv");
        fs::write(
            &path,
            "Title,Description,Due Date,Priority,Suggestion,Days Left,Email\n\
             Taxes,Finish tax filing,2026-03-02,High,x,1.0,\n",
        )
        .unwrap();

        let store = CsvFileStorage::new(path).load().unwrap();

        assert_eq!(store.tasks.len(), 1);
        assert_eq!(store.tasks[0].title.as_deref(), Some("Taxes"));
        assert_eq!(store.tasks[0].days_remaining, 1);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_unknown_layout() {
        let dir = test_dir("unknown");
        let path = dir.join("tasks.csv");
        fs::write(&path, "Name,When\nfoo,bar\n").unwrap();

        let result = CsvFileStorage::new(path).load();

        match result {
            Err(StorageError::UnsupportedLayout { headers, .. }) => {
                assert_eq!(headers, vec!["Name".to_string(), "When".to_string()]);
            }
            other => panic!("Expected UnsupportedLayout, got {:?}", other.map(|s| s.tasks.len())),
        }
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_invalid_row_reports_line() {
        let dir = test_dir("invalid-row");
        let path = dir.join("tasks.csv");
        let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
        fs::write(
            &path,
            format!(
                "Id,Title,Description,Due Date,Priority,Suggestion,Days Left,Email\n\
                 {first},,Pay rent,2026-03-04,High,,3,\n\
                 {second},,Pay rent,2026-03-04,Critical,,3,\n"
            ),
        )
        .unwrap();

        let result = CsvFileStorage::new(path).load();

        assert!(matches!(result, Err(StorageError::InvalidRow { line: 3, .. })));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_rejects_duplicate_ids() {
        let dir = test_dir("duplicate-id");
        let path = dir.join("tasks.csv");
        let id = Uuid::new_v4();
        fs::write(
            &path,
            format!(
                "Id,Title,Description,Due Date,Priority,Suggestion,Days Left,Email\n\
                 {id},,Pay rent,2026-03-04,High,,3,\n\
                 {id},,Read a book,2026-04-01,Low,,31,\n"
            ),
        )
        .unwrap();

        let result = CsvFileStorage::new(path).load();

        match result {
            Err(StorageError::InvalidRow { line, message, .. }) => {
                assert_eq!(line, 3);
                assert!(message.contains("duplicate id"), "{}", message);
            }
            other => panic!("Expected InvalidRow, got {:?}", other.map(|s| s.tasks.len())),
        }
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_legacy_file_is_rewritten_once_with_stable_ids() {
        let dir = test_dir("v2-stable");
        let path = dir.join("task_data.csv");
        fs::write(
            &path,
            "Title,Description,Due Date,Priority,Suggestion,Days Left,Email\n\
             Taxes,Finish tax filing,2026-03-02,High,x,1.0,\n\
             ,Read a book,2026-04-01,Low,x,30,\n",
        )
        .unwrap();
        let storage = CsvFileStorage::new(path.clone());

        let first = storage.load().unwrap();
        let second = storage.load().unwrap();

        assert_eq!(first, second);
        let header = fs::read_to_string(&path).unwrap();
        assert!(header.starts_with("Id,Title,Description"));
        // the legacy file is kept as a backup
        assert_eq!(fs::read_dir(dir.join("backups")).unwrap().count(), 1);

        let mut store = second;
        let removed = store.remove_task(first.tasks[0].id);
        assert!(removed.is_some());
        storage.save(&store).unwrap();

        let remaining = storage.load().unwrap();
        assert_eq!(remaining.tasks.len(), 1);
        assert_eq!(remaining.tasks[0].id, first.tasks[1].id);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_backup_creation_and_cleanup() {
        let dir = test_dir("backups");
        let storage = CsvFileStorage::new(dir.join("tasks.csv"));

        let mut store = Store::default();
        for i in 1..=7 {
            store.add_task(record(&format!("Task {}", i), Priority::Medium));
            storage.save(&store).unwrap();

            std::thread::sleep(std::time::Duration::from_millis(10));
        }

        let backup_count = fs::read_dir(dir.join("backups"))
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.metadata().map(|m| m.is_file()).unwrap_or(false))
            .count();

        assert_eq!(backup_count, MAX_BACKUPS, "Should keep exactly 5 backups");
        assert_eq!(storage.load().unwrap().tasks.len(), 7);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_cleanup_only_prunes_own_backups() {
        let dir = test_dir("backups-shared");
        let storage = CsvFileStorage::new(dir.join("tasks.csv"));
        fs::create_dir_all(dir.join("backups")).unwrap();
        fs::write(dir.join("backups").join("notes.txt"), "keep me").unwrap();

        for _ in 0..(MAX_BACKUPS + 3) {
            storage.save(&Store::default()).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2));
        }

        let names: Vec<String> = fs::read_dir(dir.join("backups"))
            .unwrap()
            .flatten()
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.contains(&"notes.txt".to_string()));
        assert_eq!(
            names.iter().filter(|n| n.starts_with("tasks.csv-")).count(),
            MAX_BACKUPS
        );
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_backup_directory_created_on_second_save() {
        let dir = test_dir("backup-dir");
        let storage = CsvFileStorage::new(dir.join("tasks.csv"));
        let backups_dir = dir.join("backups");

        storage.save(&Store::default()).unwrap();
        assert!(
            !backups_dir.exists(),
            "Backups dir should not exist after first save"
        );

        storage.save(&Store::default()).unwrap();
        assert!(
            backups_dir.is_dir(),
            "Backups dir should be created on second save"
        );
        fs::remove_dir_all(&dir).unwrap();
    }
}
