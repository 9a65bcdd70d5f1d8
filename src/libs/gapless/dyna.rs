use std::io::Write;

use fxhash::FxHashMap;

use crate::libs::seed::SpacedSeed;

/// What the scanner should do with a seed hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynaVerdict {
    Proceed,
    /// Drop this hit only.
    SkipTarget,
    /// Drop every remaining hit of this query position.
    SkipQuery,
}

/// Usage counters that cap how often any target position, query position
/// or seed word takes part in extensions.
///
/// Each index keeps its own target counters, cleared once per query so
/// both strands share them. Query counters are cleared for each query
/// strand. Word counters live as long as the mask so a batch run can
/// report every word that hit its cap.
#[derive(Debug)]
pub struct DynaMask {
    pub limit_t: u32,
    pub limit_q: u32,
    pub limit_word: u32,
    t_counts: Vec<Vec<u32>>,
    current: usize,
    q_counts: Vec<u32>,
    word_counts: FxHashMap<(usize, u32), u32>,
}

impl DynaMask {
    pub fn new(limit_t: u32, limit_q: u32, limit_word: u32) -> Self {
        Self {
            limit_t,
            limit_q,
            limit_word,
            t_counts: vec![],
            current: 0,
            q_counts: vec![],
            word_counts: FxHashMap::default(),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(u32::MAX, u32::MAX, u32::MAX)
    }

    /// Clears the target counters of all `targets` indexes for a new query.
    pub fn begin_query(&mut self, targets: usize) {
        self.t_counts.clear();
        self.t_counts.resize(targets, vec![]);
        self.current = 0;
    }

    /// Makes index `slot` the one further hits are counted against.
    pub fn select_target(&mut self, slot: usize, t_size: usize) {
        if slot >= self.t_counts.len() {
            self.t_counts.resize(slot + 1, vec![]);
        }
        self.current = slot;
        let counts = &mut self.t_counts[slot];
        if self.limit_t != u32::MAX && counts.len() < t_size {
            counts.resize(t_size, 0);
        }
    }

    pub fn reset_query(&mut self, q_size: usize) {
        self.q_counts.clear();
        if self.limit_q != u32::MAX {
            self.q_counts.resize(q_size, 0);
        }
    }

    /// Checks a hit of seed `word` (of `weight`) at `t_pos`/`q_pos` and,
    /// when it may proceed, counts it.
    pub fn check(&mut self, t_pos: usize, q_pos: usize, weight: usize, word: u32) -> DynaVerdict {
        if self.limit_word != u32::MAX {
            let count = self.word_counts.get(&(weight, word)).copied().unwrap_or(0);
            if count >= self.limit_word {
                return DynaVerdict::SkipTarget;
            }
        }
        if let Some(&c) = self.t_counts.get(self.current).and_then(|v| v.get(t_pos)) {
            if c >= self.limit_t {
                return DynaVerdict::SkipTarget;
            }
        }
        if let Some(&c) = self.q_counts.get(q_pos) {
            if c >= self.limit_q {
                return DynaVerdict::SkipQuery;
            }
        }

        if let Some(c) = self
            .t_counts
            .get_mut(self.current)
            .and_then(|v| v.get_mut(t_pos))
        {
            *c += 1;
        }
        if let Some(c) = self.q_counts.get_mut(q_pos) {
            *c += 1;
        }
        if self.limit_word != u32::MAX {
            *self.word_counts.entry((weight, word)).or_insert(0) += 1;
        }
        DynaVerdict::Proceed
    }

    pub fn target_count(&self, t_pos: usize) -> u32 {
        self.t_counts
            .get(self.current)
            .and_then(|v| v.get(t_pos))
            .copied()
            .unwrap_or(0)
    }

    /// Words that reached the word limit, with their hit counts, sorted.
    pub fn masked_words(&self) -> Vec<(String, u32)> {
        if self.limit_word == u32::MAX {
            return vec![];
        }
        let mut words: Vec<(String, u32)> = self
            .word_counts
            .iter()
            .filter(|(_, &c)| c >= self.limit_word)
            .filter_map(|(&(weight, key), &c)| {
                let bases = SpacedSeed::new(weight).decode(key)?;
                Some((String::from_utf8_lossy(&bases).into_owned(), c))
            })
            .collect();
        words.sort();
        words
    }

    pub fn write_word_report<W: Write + ?Sized>(&self, writer: &mut W) -> std::io::Result<()> {
        for (word, hits) in self.masked_words() {
            writeln!(writer, "{}\t{}", word, hits)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_limit_bounds_hits() {
        let mut mask = DynaMask::new(3, u32::MAX, u32::MAX);
        mask.begin_query(2);
        mask.select_target(0, 10);
        mask.reset_query(10);

        let accepted = (0..10)
            .filter(|&q| mask.check(4, q, 6, 0) == DynaVerdict::Proceed)
            .count();
        assert_eq!(accepted, 3);
        assert_eq!(mask.target_count(4), 3);
        assert_eq!(mask.check(5, 0, 6, 0), DynaVerdict::Proceed);

        // another index has its own counters
        mask.select_target(1, 10);
        assert_eq!(mask.check(4, 0, 6, 0), DynaVerdict::Proceed);

        // the other strand of the same query does not start afresh
        mask.reset_query(10);
        mask.select_target(0, 10);
        assert_eq!(mask.check(4, 0, 6, 0), DynaVerdict::SkipTarget);

        mask.begin_query(2);
        mask.select_target(0, 10);
        assert_eq!(mask.check(4, 0, 6, 0), DynaVerdict::Proceed);
    }

    #[test]
    fn query_limit_skips_query() {
        let mut mask = DynaMask::new(u32::MAX, 2, u32::MAX);
        mask.begin_query(1);
        mask.select_target(0, 10);
        mask.reset_query(10);
        assert_eq!(mask.check(0, 1, 6, 0), DynaVerdict::Proceed);
        assert_eq!(mask.check(1, 1, 6, 0), DynaVerdict::Proceed);
        assert_eq!(mask.check(2, 1, 6, 0), DynaVerdict::SkipQuery);
    }

    #[test]
    fn word_report() -> std::io::Result<()> {
        let seed = SpacedSeed::new(6);
        let word = seed.encode(b"ACGTAC").unwrap();
        let mut mask = DynaMask::new(u32::MAX, u32::MAX, 2);

        assert_eq!(mask.check(0, 0, 6, word), DynaVerdict::Proceed);
        assert_eq!(mask.check(1, 1, 6, word), DynaVerdict::Proceed);
        assert_eq!(mask.check(2, 2, 6, word), DynaVerdict::SkipTarget);

        let mut buf = vec![];
        mask.write_word_report(&mut buf)?;
        assert_eq!(String::from_utf8(buf).unwrap(), "ACGTAC\t2\n");
        Ok(())
    }
}
