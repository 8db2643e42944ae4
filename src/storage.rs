use std::path::PathBuf;

use thiserror::Error;

use crate::models::store::Store;

pub mod csv_file;
pub mod memory;
pub mod migrations;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to load store from '{path}': {source}")]
    LoadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse CSV from '{path}': {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Invalid task on line {line} of '{path}': {message}")]
    InvalidRow {
        path: PathBuf,
        line: u64,
        message: String,
    },

    #[error("Failed to save store to '{path}': {source}")]
    SaveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize store to CSV: {source}")]
    SerializeFailed {
        #[source]
        source: csv::Error,
    },

    #[error("Failed to create backup at '{path}': {source}")]
    BackupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to cleanup old backups in '{dir}': {source}")]
    CleanupFailed {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Store file '{path}' has an unrecognised column layout: {}", .headers.join(", ")
    )]
    UnsupportedLayout { path: PathBuf, headers: Vec<String> },

    #[error("Store file has unsupported version {0}. This version of triage cannot read this file.")]
    UnsupportedVersion(u32),

    #[error("Failed to migrate store from version {from}: {message}")]
    MigrationFailed { from: u32, message: String },
}

pub trait Storage {
    fn load(&self) -> Result<Store, StorageError>;
    fn save(&self, store: &Store) -> Result<(), StorageError>;
}
