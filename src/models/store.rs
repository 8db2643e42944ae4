use uuid::Uuid;

use crate::models::task::TaskRecord;

/// Current schema version of the persisted task file
pub const CURRENT_VERSION: u32 = 3;

/// In-memory copy of the persisted task file, in file order
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Store {
    pub tasks: Vec<TaskRecord>,
}

impl Store {
    pub fn get_task(&self, id: Uuid) -> Option<&TaskRecord> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn get_task_mut(&mut self, id: Uuid) -> Option<&mut TaskRecord> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.get_task(id).is_some()
    }

    pub fn add_task(&mut self, task: TaskRecord) {
        self.tasks.push(task);
    }

    pub fn remove_task(&mut self, id: Uuid) -> Option<TaskRecord> {
        let position = self.tasks.iter().position(|t| t.id == id)?;
        Some(self.tasks.remove(position))
    }

    /// Tasks whose id, in simple hex form, starts with `prefix`
    pub fn find_by_id_prefix(&self, prefix: &str) -> impl Iterator<Item = &TaskRecord> {
        let prefix = prefix.trim().to_lowercase();
        self.tasks.iter().filter(move |t| {
            t.id.simple().to_string().starts_with(&prefix) || t.id.to_string().starts_with(&prefix)
        })
    }
}
