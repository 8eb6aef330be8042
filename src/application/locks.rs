//! Per-workflow concurrency guard.
//!
//! A global directory hands out one exclusive lock per workflow (and per
//! source instrument, to serialize idempotent creation). Locks are created
//! on first use and retained for the life of the registry. The directory
//! mutex is only held while fetching or inserting an entry — callers receive
//! the lock handle and await it after the directory is released, so the
//! durable-I/O critical section never blocks unrelated lookups.

use crate::domain::identifier::{SourceId, WorkflowId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub type WorkflowLock = Arc<tokio::sync::Mutex<()>>;

#[derive(Default, Clone)]
pub struct LockRegistry {
    locks: Arc<Mutex<HashMap<String, WorkflowLock>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The exclusive lock serializing all mutations of one workflow.
    pub fn lock_for(&self, id: &WorkflowId) -> WorkflowLock {
        self.entry(format!("workflow:{id}"))
    }

    /// The lock serializing creation attempts for one source instrument.
    pub fn lock_for_source(&self, source: &SourceId) -> WorkflowLock {
        self.entry(format!("source:{source}"))
    }

    fn entry(&self, key: String) -> WorkflowLock {
        // A poisoned directory can only have missed an insert, so the map is
        // still consistent and safe to reuse.
        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks.entry(key).or_default().clone()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        match self.locks.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}
