//! Coalesced, sorted `[lo, hi)` byte-interval set. Backs both a segment's
//! fragment set and a trunk's per-segment dirty-range tracking: inserting an
//! interval merges it with any existing interval it touches or overlaps.

use std::collections::BTreeMap;

#[derive(Debug, Default, Clone)]
pub struct IntervalSet {
    /// start -> end, kept non-overlapping and non-adjacent.
    ranges: BTreeMap<usize, usize>,
}

impl IntervalSet {
    pub fn new() -> Self {
        Self { ranges: BTreeMap::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
    }

    /// Merge `[lo, hi)` into the set, absorbing any interval that touches
    /// `[lo-1, hi+1]`.
    pub fn insert(&mut self, lo: usize, hi: usize) {
        if lo >= hi {
            return;
        }
        let mut new_lo = lo;
        let mut new_hi = hi;

        // Absorb the interval starting at or before new_lo that might reach
        // into [lo, hi).
        if let Some((&start, &end)) = self.ranges.range(..=new_lo).next_back() {
            if end >= new_lo {
                new_lo = new_lo.min(start);
                new_hi = new_hi.max(end);
            }
        }

        // Absorb every interval overlapping or touching the (possibly
        // widened) range, up to and including one that starts at new_hi
        // (adjacency merge).
        let touched: Vec<usize> = self
            .ranges
            .range(new_lo..=new_hi)
            .map(|(&start, _)| start)
            .collect();
        for start in touched {
            if let Some(end) = self.ranges.remove(&start) {
                new_hi = new_hi.max(end);
            }
        }

        self.ranges.insert(new_lo, new_hi);
    }

    pub fn ranges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.ranges.iter().map(|(&lo, &hi)| (lo, hi))
    }

    /// Remove and return every interval, leaving the set empty. Ranges
    /// inserted concurrently with a drain are not observed by it.
    pub fn drain(&mut self) -> Vec<(usize, usize)> {
        std::mem::take(&mut self.ranges).into_iter().collect()
    }

    pub fn total_len(&self) -> usize {
        self.ranges.iter().map(|(&lo, &hi)| hi - lo).sum()
    }
}
