use thiserror::Error;

use crate::models::task::TaskRecord;

pub mod smtp;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Email reminders are not configured (set [smtp] host and from)")]
    NotConfigured,

    #[error("Invalid email address '{address}': {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },

    #[error("Failed to build reminder message: {0}")]
    BuildFailed(#[from] lettre::error::Error),

    #[error("Failed to send reminder: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// Sends a reminder about a task. One attempt, no retry.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier {
    fn send(&self, record: &TaskRecord, address: &str) -> Result<(), NotificationError>;
}

impl<T: Notifier + ?Sized> Notifier for Box<T> {
    fn send(&self, record: &TaskRecord, address: &str) -> Result<(), NotificationError> {
        (**self).send(record, address)
    }
}

/// Used when no mail transport is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledNotifier;

impl Notifier for DisabledNotifier {
    fn send(&self, _record: &TaskRecord, _address: &str) -> Result<(), NotificationError> {
        Err(NotificationError::NotConfigured)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderMessage {
    pub subject: String,
    pub body: String,
}

impl ReminderMessage {
    pub fn for_record(record: &TaskRecord) -> Self {
        let subject = match record.title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => format!("Task Reminder: {}", title),
            _ => format!(
                "[Task Reminder] {} Priority Task Due on {}",
                record.priority, record.due_date
            ),
        };

        let mut body = String::new();
        if let Some(title) = record.title.as_deref().filter(|t| !t.trim().is_empty()) {
            body.push_str(&format!("Task: {}\n", title));
        }
        body.push_str(&format!("Description: {}\n", record.description));
        body.push_str(&format!("Priority: {}\n", record.priority));
        body.push_str(&format!("Suggestion: {}\n", record.suggestion()));
        body.push_str(&format!("Due Date: {}\n", record.due_date));
        body.push_str(&format!("Due in: {} day(s)\n", record.days_remaining));
        body.push_str("\nSent by triage\n");

        Self { subject, body }
    }
}
