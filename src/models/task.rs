use jiff::civil::Date;
use serde::{Serialize, ser::SerializeStruct};
use uuid::Uuid;

use crate::models::priority::Priority;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    /// UUID to identify the task, never reused
    pub id: Uuid,
    /// Optional short title
    pub title: Option<String>,
    /// What the task is about, fed to the classifier
    pub description: String,
    /// When the task is due
    pub due_date: Date,
    /// Classifier output for the current description
    pub priority: Priority,
    /// Days between the last create/edit and the due date
    pub days_remaining: i64,
    /// Where reminders go, if anywhere
    pub notify_email: Option<String>,
}

impl TaskRecord {
    pub fn from_fields(id: Uuid, fields: TaskFields) -> Self {
        Self {
            id,
            title: fields.title,
            description: fields.description,
            due_date: fields.due_date,
            priority: fields.derived.priority,
            days_remaining: fields.derived.days_remaining,
            notify_email: fields.notify_email,
        }
    }

    /// Replaces every field except `id`
    pub fn apply(&mut self, fields: TaskFields) {
        let id = self.id;
        *self = TaskRecord::from_fields(id, fields);
    }

    pub fn suggestion(&self) -> &'static str {
        self.priority.suggestion()
    }

    /// Derived fields as of the last create/edit
    pub fn derived(&self) -> DerivedFields {
        DerivedFields {
            priority: self.priority,
            days_remaining: self.days_remaining,
        }
    }

    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }

    /// Title if present, otherwise the description
    pub fn label(&self) -> &str {
        match self.title.as_deref() {
            Some(title) if !title.trim().is_empty() => title,
            _ => &self.description,
        }
    }

    /// Uses the live date, unlike `days_remaining` which is a snapshot
    pub fn is_overdue(&self, today: Date) -> bool {
        self.due_date < today
    }
}

/// Serialized with the suggestion alongside the priority it derives from
impl Serialize for TaskRecord {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("TaskRecord", 8)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("title", &self.title)?;
        state.serialize_field("description", &self.description)?;
        state.serialize_field("due_date", &self.due_date)?;
        state.serialize_field("priority", &self.priority)?;
        state.serialize_field("suggestion", self.suggestion())?;
        state.serialize_field("days_remaining", &self.days_remaining)?;
        state.serialize_field("notify_email", &self.notify_email)?;
        state.end()
    }
}

/// Fields computed from the description and due date. Only
/// [`DerivedFields::compute`] builds them, so priority and urgency always
/// come from the same classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedFields {
    priority: Priority,
    days_remaining: i64,
}

impl DerivedFields {
    pub fn compute(priority: Priority, due_date: Date, today: Date) -> Self {
        let days_remaining = i64::from((due_date - today).get_days());
        Self {
            priority,
            days_remaining,
        }
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn days_remaining(&self) -> i64 {
        self.days_remaining
    }

    pub fn suggestion(&self) -> &'static str {
        self.priority.suggestion()
    }
}

/// Everything a record holds apart from its id
#[derive(Debug, Clone)]
pub struct TaskFields {
    pub title: Option<String>,
    pub description: String,
    pub due_date: Date,
    pub notify_email: Option<String>,
    pub derived: DerivedFields,
}
