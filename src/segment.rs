//! Fixed-size slab with bump-pointer allocation.
//!
//! Foreground allocators hold the segment's read-lock while they copy their
//! already-reserved, disjoint byte range into the backing buffer — the lock
//! itself never guards those bytes (two concurrent allocators never touch
//! the same offset, by construction of the `append_head` CAS). The
//! defragmenter takes the write-lock for exclusive access while it relocates
//! live cells and resets the append head.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::interval_set::IntervalSet;

pub struct Segment {
    id: u32,
    size: usize,
    data: UnsafeCell<Box<[u8]>>,
    lock: RwLock<()>,
    append_head: AtomicUsize,
    dead_bytes: AtomicUsize,
    fragments: std::sync::Mutex<IntervalSet>,
}

// SAFETY: all mutable access to `data` goes through `slice_mut`, whose
// callers are required to hold either the segment read-lock over a range
// they exclusively reserved via `try_acquire_space`, or the write-lock
// during defragmentation.
unsafe impl Sync for Segment {}

pub struct SegmentReadGuard<'a>(#[allow(dead_code)] RwLockReadGuard<'a, ()>);
pub struct SegmentWriteGuard<'a>(#[allow(dead_code)] RwLockWriteGuard<'a, ()>);

impl Segment {
    pub fn new(id: u32, size: usize) -> Self {
        Self {
            id,
            size,
            data: UnsafeCell::new(vec![0u8; size].into_boxed_slice()),
            lock: RwLock::new(()),
            append_head: AtomicUsize::new(0),
            dead_bytes: AtomicUsize::new(0),
            fragments: std::sync::Mutex::new(IntervalSet::new()),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn append_head(&self) -> usize {
        self.append_head.load(Ordering::Acquire)
    }

    pub fn dead_bytes(&self) -> usize {
        self.dead_bytes.load(Ordering::Acquire)
    }

    /// `1 - dead_bytes / used_bytes`. A segment with nothing allocated yet
    /// is fully alive.
    pub fn alive_ratio(&self) -> f64 {
        let used = self.append_head();
        if used == 0 {
            return 1.0;
        }
        1.0 - (self.dead_bytes() as f64 / used as f64)
    }

    pub fn acquire_read(&self) -> SegmentReadGuard<'_> {
        SegmentReadGuard(self.lock.read().unwrap())
    }

    pub fn acquire_write(&self) -> SegmentWriteGuard<'_> {
        SegmentWriteGuard(self.lock.write().unwrap())
    }

    /// Atomically reserve `len` bytes at the current append head. Returns
    /// the pre-increment offset on success, `None` if the segment can't
    /// fit `len` more bytes.
    pub fn try_acquire_space(&self, len: usize) -> Option<usize> {
        let mut cur = self.append_head.load(Ordering::Acquire);
        loop {
            let new = cur.checked_add(len)?;
            if new > self.size {
                return None;
            }
            match self.append_head.compare_exchange_weak(cur, new, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return Some(cur),
                Err(observed) => cur = observed,
            }
        }
    }

    pub fn inc_dead(&self, n: usize) {
        self.dead_bytes.fetch_add(n, Ordering::AcqRel);
    }

    pub fn add_fragment(&self, lo: usize, hi: usize) {
        self.fragments.lock().unwrap().insert(lo, hi);
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.lock().unwrap().ranges().count()
    }

    /// Read `len` bytes at `off`. Safe: readers never observe a range that
    /// hasn't finished being written, because the cell index (the
    /// linearization point) is only updated after the write completes.
    pub fn slice(&self, off: usize, len: usize) -> &[u8] {
        unsafe {
            let ptr = (*self.data.get()).as_ptr().add(off);
            std::slice::from_raw_parts(ptr, len)
        }
    }

    /// # Safety
    /// The caller must own exclusive access to `[off, off+len)`: either it
    /// just reserved that range via `try_acquire_space`, or it holds the
    /// segment write-lock during defragmentation.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn slice_mut(&self, off: usize, len: usize) -> &mut [u8] {
        let ptr = (*self.data.get()).as_mut_ptr().add(off);
        std::slice::from_raw_parts_mut(ptr, len)
    }

    /// Defragmentation-only: reset the append head after compaction and
    /// zero the bytes beyond it, clearing dead-byte and fragment tracking.
    ///
    /// # Safety
    /// Caller must hold the segment write-lock.
    pub unsafe fn finish_compaction(&self, new_head: usize) {
        let old_head = self.append_head.swap(new_head, Ordering::AcqRel);
        if old_head > new_head {
            self.slice_mut(new_head, old_head - new_head).fill(0);
        }
        self.dead_bytes.store(0, Ordering::Release);
        self.fragments.lock().unwrap().clear();
    }

    pub fn fill_zero(&self) {
        let _guard = self.acquire_write();
        unsafe {
            (*self.data.get()).fill(0);
        }
        self.append_head.store(0, Ordering::Release);
        self.dead_bytes.store(0, Ordering::Release);
        self.fragments.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invariants_hold_after_allocations() {
        let seg = Segment::new(0, 1024);
        let a = seg.try_acquire_space(100).unwrap();
        let b = seg.try_acquire_space(200).unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 100);
        assert_eq!(seg.append_head(), 300);
        assert!(seg.dead_bytes() <= seg.append_head());
        assert!(seg.append_head() <= seg.size());
    }

    #[test]
    fn allocation_fails_past_capacity() {
        let seg = Segment::new(0, 16);
        assert!(seg.try_acquire_space(16).is_some());
        assert!(seg.try_acquire_space(1).is_none());
    }

    #[test]
    fn exact_fit_succeeds_one_more_byte_fails() {
        let seg = Segment::new(0, 100);
        assert_eq!(seg.try_acquire_space(100), Some(0));
        let seg2 = Segment::new(0, 99);
        assert!(seg2.try_acquire_space(100).is_none());
    }

    #[test]
    fn concurrent_allocations_produce_disjoint_ranges() {
        use std::sync::Arc;
        use std::thread;

        let seg = Arc::new(Segment::new(0, 10_000));
        let mut handles = vec![];
        for _ in 0..8 {
            let seg = Arc::clone(&seg);
            handles.push(thread::spawn(move || {
                let mut offsets = vec![];
                for _ in 0..100 {
                    offsets.push(seg.try_acquire_space(10).unwrap());
                }
                offsets
            }));
        }
        let mut all = vec![];
        for h in handles {
            all.extend(h.join().unwrap());
        }
        all.sort_unstable();
        for w in all.windows(2) {
            assert!(w[1] - w[0] >= 10, "overlapping allocation: {:?}", w);
        }
        assert_eq!(seg.append_head(), 8 * 100 * 10);
    }

    #[test]
    fn alive_ratio_reflects_dead_bytes() {
        let seg = Segment::new(0, 1000);
        seg.try_acquire_space(500).unwrap();
        assert_eq!(seg.alive_ratio(), 1.0);
        seg.inc_dead(100);
        assert!((seg.alive_ratio() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn fill_zero_resets_everything() {
        let seg = Segment::new(0, 100);
        let off = seg.try_acquire_space(10).unwrap();
        unsafe { seg.slice_mut(off, 10).fill(7) };
        seg.inc_dead(5);
        seg.add_fragment(0, 5);
        seg.fill_zero();
        assert_eq!(seg.append_head(), 0);
        assert_eq!(seg.dead_bytes(), 0);
        assert_eq!(seg.fragment_count(), 0);
        assert_eq!(seg.slice(0, 10), &[0u8; 10]);
    }
}
