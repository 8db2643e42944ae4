use jiff::civil::Date;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    classifier::{ClassifierError, PriorityClassifier},
    clock::Clock,
    models::task::{DerivedFields, TaskFields, TaskRecord},
    notify::{NotificationError, Notifier},
    services::records::{ListFilter, RecordStoreError, TaskRecordStore},
    storage::Storage,
};

#[derive(Debug, Error)]
pub enum CreateTaskError {
    #[error("Task description must not be empty")]
    EmptyDescription,

    #[error("Due date {due_date} is before today ({today})")]
    DueDateInPast { due_date: Date, today: Date },

    #[error("Classification failed: {0}")]
    Classification(#[from] ClassifierError),

    #[error(transparent)]
    Store(#[from] RecordStoreError),
}

#[derive(Debug, Error)]
pub enum UpdateTaskError {
    #[error("Task description must not be empty")]
    EmptyDescription,

    #[error("Task '{0}' not found")]
    TaskNotFound(String),

    #[error("Classification failed: {0}")]
    Classification(#[from] ClassifierError),

    #[error(transparent)]
    Store(#[from] RecordStoreError),
}

#[derive(Debug, Error)]
pub enum AnalyzeTaskError {
    #[error("Task description must not be empty")]
    EmptyDescription,

    #[error("Classification failed: {0}")]
    Classification(#[from] ClassifierError),
}

pub struct CreateTaskParameters {
    pub title: Option<String>,
    pub description: String,
    pub due_date: Date,
    pub email: Option<String>,
}

/// The complete new state of a task. Fields left out of an edit must be
/// carried over by the caller.
pub struct UpdateTaskParameters {
    pub title: Option<String>,
    pub description: String,
    pub due_date: Date,
    pub email: Option<String>,
}

#[derive(Debug)]
pub enum NotificationOutcome {
    /// No address on the task
    NotRequested,
    Sent { address: String },
    Failed {
        address: String,
        error: NotificationError,
    },
}

/// A stored record plus what happened to its reminder. The record is stored
/// whatever the notification outcome.
#[derive(Debug)]
pub struct TaskOutcome {
    pub record: TaskRecord,
    pub notification: NotificationOutcome,
}

impl TaskOutcome {
    pub fn warning(&self) -> Option<String> {
        match &self.notification {
            NotificationOutcome::Failed { address, error } => Some(format!(
                "Task saved, but the reminder to {} was not sent: {}",
                address, error
            )),
            _ => None,
        }
    }
}

/// Derived fields for a description that is not stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Analysis {
    pub due_date: Date,
    pub derived: DerivedFields,
}

pub struct TaskService<S, P, N, C>
where
    S: Storage,
    P: PriorityClassifier,
    N: Notifier,
    C: Clock,
{
    records: TaskRecordStore<S>,
    classifier: P,
    notifier: N,
    clock: C,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl<S, P, N, C> TaskService<S, P, N, C>
where
    S: Storage,
    P: PriorityClassifier,
    N: Notifier,
    C: Clock,
{
    pub fn new(records: TaskRecordStore<S>, classifier: P, notifier: N, clock: C) -> Self {
        Self {
            records,
            classifier,
            notifier,
            clock,
        }
    }

    pub fn records(&self) -> &TaskRecordStore<S> {
        &self.records
    }

    /// Classifies `description` and computes urgency against `due_date`.
    /// Shared by create and update so both derive fields the same way.
    fn compute_derived_fields(
        &self,
        description: &str,
        due_date: Date,
    ) -> Result<DerivedFields, ClassifierError> {
        let priority = self.classifier.classify(description)?;
        let derived = DerivedFields::compute(priority, due_date, self.clock.today());
        log::debug!(
            "Classified {:?} as {} ({} days left)",
            description,
            priority,
            derived.days_remaining()
        );
        Ok(derived)
    }

    fn notify(&self, record: &TaskRecord) -> NotificationOutcome {
        let Some(address) = record.notify_email.clone() else {
            return NotificationOutcome::NotRequested;
        };

        match self.notifier.send(record, &address) {
            Ok(()) => NotificationOutcome::Sent { address },
            Err(error) => {
                log::warn!("Reminder for task {} to {} failed: {}", record.id, address, error);
                NotificationOutcome::Failed { address, error }
            }
        }
    }

    pub fn create_task(
        &self,
        parameters: CreateTaskParameters,
    ) -> Result<TaskOutcome, CreateTaskError> {
        // 1. Validate before any side effect
        if parameters.description.trim().is_empty() {
            return Err(CreateTaskError::EmptyDescription);
        }
        let today = self.clock.today();
        if parameters.due_date < today {
            return Err(CreateTaskError::DueDateInPast {
                due_date: parameters.due_date,
                today,
            });
        }

        // 2. Classify and derive
        let derived = self.compute_derived_fields(&parameters.description, parameters.due_date)?;

        // 3. Build and persist the record
        let record = TaskRecord::from_fields(
            Uuid::new_v4(),
            TaskFields {
                title: non_blank(parameters.title),
                description: parameters.description,
                due_date: parameters.due_date,
                notify_email: non_blank(parameters.email),
                derived,
            },
        );
        self.records.append(record.clone())?;
        log::info!("Created task {} ({})", record.id, record.priority);

        // 4. Best-effort reminder
        let notification = self.notify(&record);

        Ok(TaskOutcome {
            record,
            notification,
        })
    }

    pub fn update_task(
        &self,
        id: Uuid,
        parameters: UpdateTaskParameters,
    ) -> Result<TaskOutcome, UpdateTaskError> {
        if parameters.description.trim().is_empty() {
            return Err(UpdateTaskError::EmptyDescription);
        }

        // Never trust the stored priority: always reclassify
        let derived = self.compute_derived_fields(&parameters.description, parameters.due_date)?;

        let fields = TaskFields {
            title: non_blank(parameters.title),
            description: parameters.description,
            due_date: parameters.due_date,
            notify_email: non_blank(parameters.email),
            derived,
        };
        let record = self.records.update(id, fields).map_err(|e| match e {
            RecordStoreError::TaskNotFound(id) => UpdateTaskError::TaskNotFound(id),
            other => UpdateTaskError::Store(other),
        })?;
        log::info!("Updated task {} ({})", record.id, record.priority);

        let notification = self.notify(&record);

        Ok(TaskOutcome {
            record,
            notification,
        })
    }

    pub fn delete_task(&self, id: Uuid) -> Result<TaskRecord, RecordStoreError> {
        let removed = self.records.delete(id)?;
        log::info!("Deleted task {}", id);
        Ok(removed)
    }

    pub fn clear_tasks(&self) -> Result<usize, RecordStoreError> {
        let removed = self.records.clear()?;
        log::info!("Cleared {} tasks", removed);
        Ok(removed)
    }

    pub fn list_tasks(&self, filter: ListFilter) -> Result<Vec<TaskRecord>, RecordStoreError> {
        self.records.list(filter)
    }

    /// Predicts without storing anything
    pub fn analyze(&self, description: &str, due_date: Date) -> Result<Analysis, AnalyzeTaskError> {
        if description.trim().is_empty() {
            return Err(AnalyzeTaskError::EmptyDescription);
        }
        let derived = self.compute_derived_fields(description, due_date)?;
        Ok(Analysis { due_date, derived })
    }
}
