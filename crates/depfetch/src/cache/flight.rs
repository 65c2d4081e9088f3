//! In-flight download handle shared by every caller waiting on one URL

use super::CacheError;
use parking_lot::{Condvar, Mutex};
use std::path::PathBuf;

pub(crate) struct Flight {
    result: Mutex<Option<Result<PathBuf, CacheError>>>,
    done: Condvar,
}

impl Flight {
    pub(crate) fn new() -> Self {
        Self {
            result: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    /// Publish the result and wake every waiter; only the first result sticks
    pub(crate) fn complete(&self, result: Result<PathBuf, CacheError>) {
        let mut guard = self.result.lock();
        if guard.is_none() {
            *guard = Some(result);
        }
        drop(guard);
        self.done.notify_all();
    }

    /// Block until the leader publishes a result
    pub(crate) fn wait(&self) -> Result<PathBuf, CacheError> {
        let mut guard = self.result.lock();
        loop {
            if let Some(result) = guard.as_ref() {
                return result.clone();
            }
            self.done.wait(&mut guard);
        }
    }
}
