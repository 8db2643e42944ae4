use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{
        priority::Priority,
        task::{TaskFields, TaskRecord},
    },
    storage::{Storage, StorageError},
};

#[derive(Debug, Error)]
pub enum RecordStoreError {
    #[error("Task description must not be empty")]
    EmptyDescription,

    #[error("Task '{0}' already exists")]
    DuplicateId(Uuid),

    #[error("Task '{0}' not found")]
    TaskNotFound(String),

    #[error("Task id '{prefix}' is ambiguous. Multiple tasks found: {}", .matches.join(", "))]
    AmbiguousId { prefix: String, matches: Vec<String> },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ListFilter {
    pub priority: Option<Priority>,
}

impl ListFilter {
    pub fn priority(priority: Priority) -> Self {
        Self {
            priority: Some(priority),
        }
    }

    fn matches(&self, record: &TaskRecord) -> bool {
        self.priority.is_none_or(|p| record.priority == p)
    }
}

/// Ordered, persisted collection of task records.
///
/// Holds no copy of the records: every call loads the whole file and every
/// mutation writes it back before returning.
pub struct TaskRecordStore<S: Storage> {
    storage: S,
}

impl<S: Storage> TaskRecordStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn append(&self, record: TaskRecord) -> Result<(), RecordStoreError> {
        if record.description.trim().is_empty() {
            return Err(RecordStoreError::EmptyDescription);
        }

        let mut store = self.storage.load()?;
        if store.contains(record.id) {
            return Err(RecordStoreError::DuplicateId(record.id));
        }

        store.add_task(record);
        self.storage.save(&store)?;
        Ok(())
    }

    /// Replaces every field but the id, keeping the record's position
    pub fn update(&self, id: Uuid, fields: TaskFields) -> Result<TaskRecord, RecordStoreError> {
        if fields.description.trim().is_empty() {
            return Err(RecordStoreError::EmptyDescription);
        }

        let mut store = self.storage.load()?;
        let record = store
            .get_task_mut(id)
            .ok_or_else(|| RecordStoreError::TaskNotFound(id.to_string()))?;
        record.apply(fields);
        let updated = record.clone();

        self.storage.save(&store)?;
        Ok(updated)
    }

    pub fn delete(&self, id: Uuid) -> Result<TaskRecord, RecordStoreError> {
        let mut store = self.storage.load()?;
        let removed = store
            .remove_task(id)
            .ok_or_else(|| RecordStoreError::TaskNotFound(id.to_string()))?;

        self.storage.save(&store)?;
        Ok(removed)
    }

    pub fn list(&self, filter: ListFilter) -> Result<Vec<TaskRecord>, RecordStoreError> {
        let store = self.storage.load()?;
        Ok(store
            .tasks
            .into_iter()
            .filter(|record| filter.matches(record))
            .collect())
    }

    /// Removes every record. Returns how many were removed.
    pub fn clear(&self) -> Result<usize, RecordStoreError> {
        let mut store = self.storage.load()?;
        let removed = store.tasks.len();
        store.tasks.clear();

        self.storage.save(&store)?;
        Ok(removed)
    }

    pub fn get(&self, id: Uuid) -> Result<TaskRecord, RecordStoreError> {
        let store = self.storage.load()?;
        store
            .get_task(id)
            .cloned()
            .ok_or_else(|| RecordStoreError::TaskNotFound(id.to_string()))
    }

    /// Finds the one record whose id starts with `prefix`
    pub fn resolve(&self, prefix: &str) -> Result<TaskRecord, RecordStoreError> {
        if prefix.trim().is_empty() {
            return Err(RecordStoreError::TaskNotFound(prefix.to_string()));
        }

        let store = self.storage.load()?;
        let matching: Vec<_> = store.find_by_id_prefix(prefix).collect();

        match matching.len() {
            0 => Err(RecordStoreError::TaskNotFound(prefix.to_string())),
            1 => Ok(matching[0].clone()),
            _ => Err(RecordStoreError::AmbiguousId {
                prefix: prefix.to_string(),
                matches: matching.iter().map(|t| t.short_id()).collect(),
            }),
        }
    }
}
