//! Swappable in-memory snapshots.
//!
//! The similarity index and trending lists are rebuilt wholesale by
//! background jobs and replaced in one step; readers always observe either
//! the previous complete snapshot or the new one, never a partial rebuild.

use std::sync::{Arc, RwLock};

pub struct SnapshotStore<T> {
    inner: RwLock<Arc<T>>,
}

impl<T> SnapshotStore<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: RwLock::new(Arc::new(initial)),
        }
    }

    /// Cheap clone of the current snapshot pointer
    pub fn current(&self) -> Arc<T> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the snapshot; readers holding the old Arc are unaffected
    pub fn swap(&self, next: T) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_replaces_snapshot() {
        let store = SnapshotStore::new(vec![1, 2, 3]);
        let before = store.current();
        store.swap(vec![4]);

        // The old handle keeps the old data; new reads see the new data.
        assert_eq!(*before, vec![1, 2, 3]);
        assert_eq!(*store.current(), vec![4]);
    }

    #[test]
    fn test_concurrent_readers() {
        let store = Arc::new(SnapshotStore::new(0u64));
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(std::thread::spawn(move || {
                store.swap(i);
                *store.current()
            }));
        }
        for handle in handles {
            let seen = handle.join().unwrap();
            assert!(seen < 8);
        }
    }
}
