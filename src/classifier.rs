use std::path::PathBuf;

use thiserror::Error;

use crate::models::priority::Priority;

pub mod linear;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Failed to read model from '{path}': {source}")]
    LoadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse model: {source}")]
    ParseFailed {
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Model produced unknown priority label '{0}'")]
    UnknownLabel(String),

    #[error("Cannot classify an empty description")]
    EmptyInput,
}

/// Assigns a priority to a task description
#[cfg_attr(test, mockall::automock)]
pub trait PriorityClassifier {
    fn classify(&self, text: &str) -> Result<Priority, ClassifierError>;
}
