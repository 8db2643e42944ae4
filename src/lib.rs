//! Task records with a classifier-assigned priority, stored in a CSV file,
//! with optional email reminders.

pub mod classifier;
pub mod clock;
pub mod config;
pub mod models;
pub mod notify;
pub mod services;
pub mod storage;
