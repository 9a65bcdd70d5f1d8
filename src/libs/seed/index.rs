use std::sync::Arc;

use crate::libs::seed::SpacedSeed;
use crate::libs::seq::DnaSeq;

/// Positions of every seed key inside a window of one target sequence.
///
/// Positions for all keys live in one arena; `offsets[key]..offsets[key + 1]`
/// is the slot of `key`. Positions are absolute target coordinates, strictly
/// increasing within a slot.
#[derive(Debug)]
pub struct SeedIndex {
    pub target: Arc<DnaSeq>,
    pub t_start: usize,
    pub t_end: usize,
    pub seed: SpacedSeed,
    pub unmask: bool,
    offsets: Vec<u32>,
    positions: Vec<u32>,
    /// Windows with a valid key, before the word limit applies.
    pub valid_windows: usize,
    /// Keys dropped for exceeding the word limit.
    pub suppressed_words: usize,
}

impl SeedIndex {
    /// Two passes over `target[t_start..t_end]`: count keys, then scatter
    /// positions. With a nonzero `word_limit`, keys occurring more often
    /// are left empty.
    pub fn build(
        target: Arc<DnaSeq>,
        t_start: usize,
        t_end: usize,
        weight: usize,
        word_limit: usize,
        unmask: bool,
    ) -> Self {
        let seed = SpacedSeed::new(weight);
        let t_end = t_end.min(target.len());
        let t_start = t_start.min(t_end);
        let seq = &target.seq[..t_end];

        let mut counts = vec![0u32; seed.key_space() + 1];
        let mut valid_windows = 0;
        for pos in t_start..t_end {
            if let Some(key) = seed.key_at(seq, pos, unmask) {
                counts[key as usize] += 1;
                valid_windows += 1;
            }
        }

        let mut suppressed_words = 0;
        if word_limit > 0 {
            for c in counts.iter_mut() {
                if *c as usize > word_limit {
                    *c = 0;
                    suppressed_words += 1;
                }
            }
        }

        // prefix sums; counts is reused as the write cursor
        let mut offsets = vec![0u32; counts.len()];
        let mut total = 0u32;
        for (key, c) in counts.iter().enumerate() {
            offsets[key] = total;
            total += c;
        }

        let mut positions = vec![0u32; total as usize];
        let mut cursor = offsets.clone();
        for pos in t_start..t_end {
            if let Some(key) = seed.key_at(seq, pos, unmask) {
                let key = key as usize;
                if counts[key] == 0 {
                    continue;
                }
                positions[cursor[key] as usize] = pos as u32;
                cursor[key] += 1;
            }
        }

        log::debug!(
            "Indexed {}:{}-{} w={}: {} windows, {} positions, {} words over limit",
            target.name,
            t_start,
            t_end,
            weight,
            valid_windows,
            positions.len(),
            suppressed_words
        );

        Self {
            target,
            t_start,
            t_end,
            seed,
            unmask,
            offsets,
            positions,
            valid_windows,
            suppressed_words,
        }
    }

    /// Whole-sequence index.
    pub fn new(target: Arc<DnaSeq>, weight: usize, word_limit: usize, unmask: bool) -> Self {
        let len = target.len();
        Self::build(target, 0, len, weight, word_limit, unmask)
    }

    pub fn lookup(&self, key: u32) -> &[u32] {
        let key = key as usize;
        if key + 1 >= self.offsets.len() {
            return &[];
        }
        let start = self.offsets[key] as usize;
        let end = self.offsets[key + 1] as usize;
        &self.positions[start..end]
    }

    pub fn stored_positions(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
