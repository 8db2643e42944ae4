pub mod priority;
pub mod store;
pub mod task;
