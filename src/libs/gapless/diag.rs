use std::collections::BTreeMap;
use std::num::NonZeroUsize;

use lru::LruCache;

const RING_SIZE: usize = 4096;

/// Per-scan memory of diagonals (target minus query position).
///
/// `recent` keeps the last query position hit on recently seen diagonals
/// for the two-hit rule; `ends` keeps where the last extension on each
/// diagonal stopped so the same stretch is never extended twice.
pub struct DiagState {
    recent: LruCache<i64, usize>,
    ends: BTreeMap<i64, usize>,
}

impl Default for DiagState {
    fn default() -> Self {
        Self::new(RING_SIZE)
    }
}

impl DiagState {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            recent: LruCache::new(capacity),
            ends: BTreeMap::new(),
        }
    }

    /// True unless `q_pos` lies beyond the end of the last extension on
    /// `diag`.
    pub fn covered(&self, diag: i64, q_pos: usize) -> bool {
        self.ends.get(&diag).is_some_and(|&end| q_pos <= end)
    }

    pub fn record_extension(&mut self, diag: i64, q_end: usize) {
        let end = self.ends.entry(diag).or_insert(0);
        if q_end > *end {
            *end = q_end;
        }
    }

    /// Records a hit and reports whether an earlier hit on the same
    /// diagonal lies within `window` query bases.
    pub fn second_hit(&mut self, diag: i64, q_pos: usize, window: usize) -> bool {
        let paired = match self.recent.get(&diag) {
            Some(&prev) => prev < q_pos && q_pos - prev <= window,
            None => false,
        };
        self.recent.put(diag, q_pos);
        paired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_hit_rule() {
        let mut diag = DiagState::default();
        assert!(!diag.second_hit(5, 10, 40));
        assert!(diag.second_hit(5, 30, 40));
        assert!(!diag.second_hit(5, 100, 40));
        assert!(!diag.second_hit(6, 101, 40));
    }

    #[test]
    fn ring_forgets_old_diagonals() {
        let mut diag = DiagState::new(2);
        diag.second_hit(1, 0, 50);
        diag.second_hit(2, 0, 50);
        diag.second_hit(3, 0, 50);
        assert!(!diag.second_hit(1, 10, 50));
        assert!(diag.second_hit(3, 10, 50));
    }

    #[test]
    fn extension_cover() {
        let mut diag = DiagState::default();
        assert!(!diag.covered(0, 5));
        diag.record_extension(0, 20);
        assert!(diag.covered(0, 19));
        assert!(diag.covered(0, 20));
        assert!(!diag.covered(0, 21));
        assert!(!diag.covered(1, 5));
    }
}
