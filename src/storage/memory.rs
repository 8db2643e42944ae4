use std::cell::{Cell, RefCell};

use crate::{
    models::store::Store,
    storage::{Storage, StorageError},
};

/// Keeps the store in memory. Counts saves so callers can check that every
/// mutation was persisted.
#[derive(Default)]
pub struct MemoryStorage {
    store: RefCell<Store>,
    saves: Cell<usize>,
}

impl MemoryStorage {
    pub fn new(store: Store) -> Self {
        Self {
            store: RefCell::new(store),
            saves: Cell::new(0),
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.get()
    }

    pub fn snapshot(&self) -> Store {
        self.store.borrow().clone()
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> Result<Store, StorageError> {
        Ok(self.store.borrow().clone())
    }

    fn save(&self, store: &Store) -> Result<(), StorageError> {
        *self.store.borrow_mut() = store.clone();
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}
