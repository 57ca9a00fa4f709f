//! Striped per-cell lock table, keyed by hash. Replaces a monitor lock
//! co-located with each index entry with a fixed-size table of `RwLock`s;
//! stripe count is a configuration constant, so contention falls as it
//! grows at the cost of a little memory.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

pub struct LockStripe {
    stripes: Vec<RwLock<()>>,
}

impl LockStripe {
    pub fn new(count: usize) -> Self {
        let count = count.max(1);
        Self { stripes: (0..count).map(|_| RwLock::new(())).collect() }
    }

    fn index(&self, hash: u64) -> usize {
        (hash as usize) % self.stripes.len()
    }

    pub fn read(&self, hash: u64) -> RwLockReadGuard<'_, ()> {
        self.stripes[self.index(hash)].read().unwrap()
    }

    pub fn write(&self, hash: u64) -> RwLockWriteGuard<'_, ()> {
        self.stripes[self.index(hash)].write().unwrap()
    }
}
