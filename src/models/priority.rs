use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Priority label assigned to a task by the classifier
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown priority '{0}'. Expected one of: High, Medium, Low")]
pub struct ParsePriorityError(pub String);

impl Priority {
    /// Display order used by the dashboard, most urgent first
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }

    /// Human-readable advice shown next to a task of this priority
    pub fn suggestion(&self) -> &'static str {
        match self {
            Priority::High => "🚨 High priority. Do this ASAP.",
            Priority::Medium => "⚠️ Medium priority. Schedule soon.",
            Priority::Low => "✅ Low priority. Defer if needed.",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Priority::High => "🔴",
            Priority::Medium => "🟡",
            Priority::Low => "🟢",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `pad` so width specifiers line up in tables
        f.pad(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ParsePriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            _ => Err(ParsePriorityError(s.to_string())),
        }
    }
}
