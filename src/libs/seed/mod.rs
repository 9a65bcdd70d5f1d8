//! Spaced seeds and their 2-bit keys.
//!
//! A spaced seed is a window of `span` bases of which only `weight`
//! positions are compared. Keys pack the cared bases two bits each, first
//! cared base in the most significant pair.

pub mod index;

pub use index::SeedIndex;

use crate::libs::nt::{BASE_TO_CODE, BASE_TO_CODE_ANY_CASE, CODE_TO_BASE};

pub const MIN_WEIGHT: usize = 1;
pub const MAX_WEIGHT: usize = 15;

// '1' marks a cared position
const SEED_PATTERNS: [&str; MAX_WEIGHT] = [
    "1",
    "11",
    "1011",
    "11011",
    "1101011",
    "11011011",
    "110110111",
    "11011011011",
    "110110110111",
    "11011011011011",
    "110110110110111",
    "11011011011011011",
    "110110110110110111",
    "11011011011011011011",
    "110110110110110110111",
];

fn pattern(weight: usize) -> &'static str {
    let weight = weight.clamp(MIN_WEIGHT, MAX_WEIGHT);
    SEED_PATTERNS[weight - 1]
}

/// Offsets of the cared positions of the seed of `weight`, strictly
/// increasing.
///
/// ```
/// use blatz::libs::seed::spaced_seed_offsets;
/// assert_eq!(spaced_seed_offsets(6), vec![0, 1, 3, 4, 6, 7]);
/// ```
pub fn spaced_seed_offsets(weight: usize) -> Vec<usize> {
    pattern(weight)
        .bytes()
        .enumerate()
        .filter(|(_, c)| *c == b'1')
        .map(|(i, _)| i)
        .collect()
}

/// Window length of the seed of `weight`.
pub fn spaced_seed_span(weight: usize) -> usize {
    pattern(weight).len()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpacedSeed {
    pub weight: usize,
    pub span: usize,
    pub offsets: Vec<usize>,
}

impl SpacedSeed {
    pub fn new(weight: usize) -> Self {
        Self {
            weight,
            span: spaced_seed_span(weight),
            offsets: spaced_seed_offsets(weight),
        }
    }

    /// Number of distinct keys, 4^weight.
    pub fn key_space(&self) -> usize {
        1usize << (2 * self.weight)
    }

    /// Key of the window starting at `pos`. `None` when the window runs off
    /// the sequence or a cared base is not ACGT. Lowercase bases count as
    /// invalid unless `unmask` is set.
    pub fn key_at(&self, seq: &[u8], pos: usize, unmask: bool) -> Option<u32> {
        if pos + self.span > seq.len() {
            return None;
        }
        let table = if unmask {
            &BASE_TO_CODE_ANY_CASE
        } else {
            &BASE_TO_CODE
        };

        let mut key = 0u32;
        for &off in &self.offsets {
            let code = table[seq[pos + off] as usize];
            if code > 3 {
                return None;
            }
            key = (key << 2) | code as u32;
        }
        Some(key)
    }

    /// Encodes exactly `weight` bases; used for reports and tests.
    pub fn encode(&self, bases: &[u8]) -> Option<u32> {
        if bases.len() != self.weight {
            return None;
        }
        let mut key = 0u32;
        for &b in bases {
            let code = BASE_TO_CODE_ANY_CASE[b as usize];
            if code > 3 {
                return None;
            }
            key = (key << 2) | code as u32;
        }
        Some(key)
    }

    /// Cared bases of `key`, uppercase. `None` when the key is out of range.
    pub fn decode(&self, key: u32) -> Option<Vec<u8>> {
        if key as usize >= self.key_space() {
            return None;
        }
        let bases = (0..self.weight)
            .rev()
            .map(|i| CODE_TO_BASE[((key >> (2 * i)) & 3) as usize])
            .collect();
        Some(bases)
    }

    /// The `weight` keys reachable by a single transition at one cared base.
    pub fn transition_variants(&self, key: u32) -> impl Iterator<Item = u32> + '_ {
        (0..self.weight).map(move |i| key ^ (1 << (2 * i)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_and_span() {
        for w in MIN_WEIGHT..=MAX_WEIGHT {
            let offsets = spaced_seed_offsets(w);
            assert_eq!(offsets.len(), w);
            assert!(offsets.windows(2).all(|p| p[0] < p[1]));
            assert!(spaced_seed_span(w) >= w);
            assert_eq!(*offsets.last().unwrap() + 1, spaced_seed_span(w));
        }
        assert_eq!(spaced_seed_span(9), 12);
        assert_eq!(spaced_seed_span(12), 17);
    }

    #[test]
    fn key_round_trip() {
        let seed = SpacedSeed::new(6);
        let key = seed.encode(b"ACGTTG").unwrap();
        assert_eq!(seed.decode(key).unwrap(), b"ACGTTG".to_vec());
        assert_eq!(seed.encode(b"ACNTTG"), None);
        assert_eq!(seed.encode(b"ACG"), None);
        assert_eq!(seed.decode(1 << 12), None);
    }

    #[test]
    fn key_at_skips_dont_care() {
        let seed = SpacedSeed::new(6);
        // pattern 11011011: positions 2 and 5 are ignored
        let a = seed.key_at(b"ACNGTNCA", 0, false);
        let b = seed.key_at(b"ACTGTACA", 0, false);
        assert!(a.is_some());
        assert_eq!(a, b);
        assert_eq!(seed.key_at(b"ACTGTACa", 0, false), None);
        assert_eq!(
            seed.key_at(b"ACTGTACa", 0, true),
            seed.key_at(b"ACTGTACA", 0, false)
        );
        assert_eq!(seed.key_at(b"ACTGTAC", 0, false), None);
    }

    #[test]
    fn transition_variant_is_one_base_change() {
        let seed = SpacedSeed::new(6);
        let key = seed.encode(b"AAAAAA").unwrap();
        let variants: Vec<Vec<u8>> = seed
            .transition_variants(key)
            .map(|k| seed.decode(k).unwrap())
            .collect();
        assert_eq!(variants.len(), 6);
        assert!(variants.contains(&b"AAAAAG".to_vec()));
        assert!(variants.contains(&b"GAAAAA".to_vec()));
    }
}
