//! Bounded pre-allocated object pool
//!
//! The reservoir is built up front so the hot path never allocates; when it
//! runs dry `acquire` reports exhaustion instead of growing. Slots are not
//! reset on release; entries are reused in place by their next holder.

use std::sync::{Arc, Mutex};

struct PoolInner<T> {
    slots: Vec<Mutex<T>>,
    free: Mutex<Vec<usize>>,
}

/// Fixed-capacity reservoir of `T` handed out as RAII slots.
pub struct MemoryPool<T> {
    inner: Arc<PoolInner<T>>,
}

/// Exclusive handle to one pool entry.
///
/// Dropping the slot is the explicit release: the index returns to the free
/// list and the entry's contents are left as-is for the next holder.
pub struct PoolSlot<T> {
    inner: Arc<PoolInner<T>>,
    index: usize,
}

impl<T: Default> MemoryPool<T> {
    /// Pre-construct `capacity` default entries.
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity).map(|_| Mutex::new(T::default())).collect();
        let free = (0..capacity).rev().collect();
        Self {
            inner: Arc::new(PoolInner {
                slots,
                free: Mutex::new(free),
            }),
        }
    }
}

impl<T> MemoryPool<T> {
    /// Take a free entry; None means the pool is exhausted.
    pub fn acquire(&self) -> Option<PoolSlot<T>> {
        let index = self
            .inner
            .free
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop()?;
        Some(PoolSlot {
            inner: Arc::clone(&self.inner),
            index,
        })
    }

    /// Total number of entries.
    pub fn capacity(&self) -> usize {
        self.inner.slots.len()
    }

    /// Entries currently free.
    pub fn available(&self) -> usize {
        self.inner.free.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl<T> PoolSlot<T> {
    /// Run `f` with exclusive access to the entry.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.inner.slots[self.index]
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}

impl<T> Drop for PoolSlot<T> {
    fn drop(&mut self) {
        self.inner
            .free
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(self.index);
    }
}
