use std::collections::HashSet;
use std::sync::{Condvar, Mutex, PoisonError};

use tracing::trace;

/// Advisory lock serializing mutating operations per root. At most one
/// [`RootGuard`] exists per key; acquisition blocks without a timeout.  
/// 依根目錄序列化修改操作的建議鎖。
#[derive(Debug, Default)]
pub struct RootLock {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

impl RootLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until `key` is free, then holds it until the guard drops.
    pub fn acquire(&self, key: &str) -> RootGuard<'_> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        while held.contains(key) {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        held.insert(key.to_string());
        trace!(key, "root lock acquired");
        RootGuard {
            lock: self,
            key: key.to_string(),
        }
    }

    /// Acquires `key` only if nobody holds it.
    #[cfg(test)]
    fn try_acquire(&self, key: &str) -> Option<RootGuard<'_>> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if !held.insert(key.to_string()) {
            return None;
        }
        Some(RootGuard {
            lock: self,
            key: key.to_string(),
        })
    }

    #[cfg(test)]
    fn is_held(&self, key: &str) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }
}

/// Releases its key on drop.
#[derive(Debug)]
pub struct RootGuard<'a> {
    lock: &'a RootLock,
    key: String,
}

impl Drop for RootGuard<'_> {
    fn drop(&mut self) {
        let mut held = self
            .lock
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        held.remove(&self.key);
        self.lock.released.notify_all();
        trace!(key = %self.key, "root lock released");
    }
}
