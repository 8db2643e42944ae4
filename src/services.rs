pub mod records;
pub mod tasks;
