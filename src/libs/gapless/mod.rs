//! Seed scanning and ungapped X-drop extension into maximal segment pairs.

pub mod diag;
pub mod dyna;

pub use diag::DiagState;
pub use dyna::{DynaMask, DynaVerdict};

use std::ops::Range;

use crate::libs::chain::SubMatrix;
use crate::libs::nt;
use crate::libs::params::AlignParams;
use crate::libs::seed::SeedIndex;

/// Entropy (bits) at and above which an extension keeps its full score.
const FULL_ENTROPY: f64 = 1.5;

/// A maximal ungapped match, query coordinates on the scanned strand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Msp {
    pub q_start: usize,
    pub q_end: usize,
    pub t_start: usize,
    pub t_end: usize,
    pub score: i32,
}

impl Msp {
    pub fn len(&self) -> usize {
        self.q_end - self.q_start
    }

    pub fn is_empty(&self) -> bool {
        self.q_end == self.q_start
    }

    pub fn diagonal(&self) -> i64 {
        self.t_start as i64 - self.q_start as i64
    }
}

/// Score multiplier for low-complexity segments, `min(1, H / 1.5)`.
pub fn entropy_factor(seq: &[u8]) -> f64 {
    (nt::entropy(seq) / FULL_ENTROPY).min(1.0)
}

/// Extends a seed hit of `span` bases at (`t_pos`, `q_pos`) both ways,
/// stopping a direction once its running score falls more than `max_drop`
/// below its best. Extension stays inside `t_lim` and `q_lim`.
///
/// Returns the extended segment with its raw score.
pub fn extend_hit(
    matrix: &SubMatrix,
    target: &[u8],
    query: &[u8],
    t_pos: usize,
    q_pos: usize,
    span: usize,
    max_drop: i32,
    t_lim: &Range<usize>,
    q_lim: &Range<usize>,
) -> Msp {
    let seed_score = matrix.score_ungapped(
        &target[t_pos..t_pos + span],
        &query[q_pos..q_pos + span],
    );

    // right
    let (mut score, mut best, mut best_len) = (0, 0, 0);
    let mut t = t_pos + span;
    let mut q = q_pos + span;
    while t < t_lim.end && q < q_lim.end {
        score += matrix.score(target[t], query[q]);
        t += 1;
        q += 1;
        if score > best {
            best = score;
            best_len = t - (t_pos + span);
        } else if best - score > max_drop {
            break;
        }
    }
    let right = (best, best_len);

    // left
    let (mut score, mut best, mut best_len) = (0, 0, 0);
    let (mut t, mut q) = (t_pos, q_pos);
    while t > t_lim.start && q > q_lim.start {
        t -= 1;
        q -= 1;
        score += matrix.score(target[t], query[q]);
        if score > best {
            best = score;
            best_len = t_pos - t;
        } else if best - score > max_drop {
            break;
        }
    }
    let left = (best, best_len);

    Msp {
        q_start: q_pos - left.1,
        q_end: q_pos + span + right.1,
        t_start: t_pos - left.1,
        t_end: t_pos + span + right.1,
        score: seed_score + left.0 + right.0,
    }
}

/// Scans `query[q_range]` against `index` and returns the extensions that
/// pass `min_gapless` after entropy scaling.
///
/// Every seed hit is first offered to the dynamic mask, then skipped when
/// an earlier extension on its diagonal already passed it, and, with
/// `multi_hits` set, held back until a second hit on the diagonal turns up.
pub fn gapless_scan(
    params: &AlignParams,
    index: &SeedIndex,
    query: &[u8],
    q_range: Range<usize>,
    mask: &mut DynaMask,
) -> Vec<Msp> {
    let seed = &index.seed;
    let target = &index.target.seq;
    let t_lim = index.t_start..index.t_end;
    let q_lim = q_range.start..q_range.end.min(query.len());

    let mut diag = DiagState::default();
    let mut msps = vec![];
    let mut variants: Vec<u32> = Vec::with_capacity(seed.weight + 1);

    if q_lim.end < q_lim.start + seed.span {
        return msps;
    }

    for q_pos in q_lim.start..=(q_lim.end - seed.span) {
        let Some(key) = seed.key_at(query, q_pos, index.unmask) else {
            continue;
        };
        variants.clear();
        variants.push(key);
        if params.transition {
            variants.extend(seed.transition_variants(key));
        }

        'keys: for &word in &variants {
            for &t_pos in index.lookup(word) {
                let t_pos = t_pos as usize;
                match mask.check(t_pos, q_pos, seed.weight, word) {
                    DynaVerdict::Proceed => {}
                    DynaVerdict::SkipTarget => continue,
                    DynaVerdict::SkipQuery => break 'keys,
                }

                let d = t_pos as i64 - q_pos as i64;
                if diag.covered(d, q_pos) {
                    continue;
                }
                if params.multi_hits > 0 && !diag.second_hit(d, q_pos, params.multi_hits) {
                    continue;
                }

                let msp = extend_hit(
                    &params.matrix,
                    target,
                    query,
                    t_pos,
                    q_pos,
                    seed.span,
                    params.max_drop,
                    &t_lim,
                    &q_lim,
                );
                diag.record_extension(d, msp.q_end);

                let factor = entropy_factor(&query[msp.q_start..msp.q_end]);
                let score = (msp.score as f64 * factor) as i32;
                if score >= params.min_gapless {
                    msps.push(Msp { score, ..msp });
                }
            }
        }
    }

    log::debug!(
        "gapless scan of {}..{} against {}: {} MSPs",
        q_lim.start,
        q_lim.end,
        index.target.name,
        msps.len()
    );
    msps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::seq::DnaSeq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::Arc;

    fn random_seq(len: usize, seed: u64) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..len).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect()
    }

    fn simple_params() -> AlignParams {
        let mut p = AlignParams::default();
        p.apply_option("matrix", "simple").unwrap();
        p.apply_option("max-drop", "100000").unwrap();
        p
    }

    #[test]
    fn identical_sequences_give_one_msp() {
        let seq = random_seq(500, 17);
        let params = simple_params();
        let index = SeedIndex::new(Arc::new(DnaSeq::new("t", &seq)), 9, 0, false);
        let mut mask = DynaMask::unbounded();

        let msps = gapless_scan(&params, &index, &seq, 0..seq.len(), &mut mask);
        assert_eq!(msps.len(), 1);
        let msp = msps[0];
        assert_eq!((msp.q_start, msp.q_end), (0, 500));
        assert_eq!((msp.t_start, msp.t_end), (0, 500));
        assert_eq!(msp.score, 500 * 100);
    }

    #[test]
    fn x_drop_stops_at_divergence() {
        let matrix = SubMatrix::default();
        let target = random_seq(100, 1);
        let mut query = target.clone();
        // tail of mismatches after base 60
        for b in query[60..].iter_mut() {
            *b = nt::complement(*b);
        }

        let msp = extend_hit(&matrix, &target, &query, 20, 20, 12, 500, &(0..100), &(0..100));
        assert_eq!((msp.q_start, msp.q_end), (0, 60));
        assert_eq!(msp.score, 6000);
    }

    #[test]
    fn min_gapless_filters_monotonically() {
        let target = random_seq(3000, 23);
        let mut query = target[500..1500].to_vec();
        for i in (0..query.len()).step_by(17) {
            query[i] = nt::complement(query[i]);
        }
        let index = SeedIndex::new(Arc::new(DnaSeq::new("t", &target)), 9, 0, false);

        let mut last = usize::MAX;
        for min in [0, 1000, 5000, 20000, 200000] {
            let mut params = simple_params();
            params.min_gapless = min;
            params.max_drop = 1000;
            let mut mask = DynaMask::unbounded();
            let n = gapless_scan(&params, &index, &query, 0..query.len(), &mut mask).len();
            assert!(n <= last);
            last = n;
        }
        assert_eq!(last, 0);
    }

    #[test]
    fn low_entropy_is_penalised() {
        assert_eq!(entropy_factor(b"AAAAAAAAAAAA"), 0.0);
        assert_eq!(entropy_factor(b"ACGTACGTACGT"), 1.0);
        let f = entropy_factor(b"ATATATATATAT");
        assert!(f > 0.6 && f < 0.7);
    }

    #[test]
    fn dyna_mask_limits_target_use() {
        let unit = random_seq(40, 29);
        let target = unit.clone();
        let query = unit.repeat(5);
        let index = SeedIndex::new(Arc::new(DnaSeq::new("t", &target)), 9, 0, false);

        let mut params = simple_params();
        params.min_gapless = 0;
        let mut mask = DynaMask::new(1, u32::MAX, u32::MAX);
        mask.begin_query(1);
        mask.select_target(0, target.len());
        mask.reset_query(query.len());
        gapless_scan(&params, &index, &query, 0..query.len(), &mut mask);
        for t in 0..target.len() {
            assert!(mask.target_count(t) <= 1);
        }
    }

    #[test]
    fn transitions_seed_diverged_queries() {
        let target = random_seq(600, 31);
        // every 12 bp window of the weight 9 seed then holds at least one
        // mismatch on a cared position, and some hold exactly one
        let mut query = target.clone();
        for i in (1..query.len()).step_by(5) {
            query[i] = match query[i] {
                b'A' => b'G',
                b'G' => b'A',
                b'C' => b'T',
                _ => b'C',
            };
        }
        let index = SeedIndex::new(Arc::new(DnaSeq::new("t", &target)), 9, 0, false);

        let mut params = simple_params();
        params.min_gapless = 0;
        let mut mask = DynaMask::unbounded();
        let msps = gapless_scan(&params, &index, &query, 0..query.len(), &mut mask);
        assert!(msps.iter().all(|m| m.diagonal() != 0));

        params.transition = true;
        let mut mask = DynaMask::unbounded();
        let msps = gapless_scan(&params, &index, &query, 0..query.len(), &mut mask);
        let main = msps
            .iter()
            .filter(|m| m.diagonal() == 0)
            .max_by_key(|m| m.score)
            .unwrap();
        assert_eq!((main.q_start, main.q_end), (0, 600));
    }

    #[test]
    fn multi_hits_needs_two_hits() {
        let target = random_seq(1000, 37);
        let index = SeedIndex::new(Arc::new(DnaSeq::new("t", &target)), 9, 0, false);
        let mut params = simple_params();
        params.min_gapless = 0;

        // a lone seed window
        let lone = &target[300..312];
        let mut mask = DynaMask::unbounded();
        let msps = gapless_scan(&params, &index, lone, 0..lone.len(), &mut mask);
        assert!(msps.iter().any(|m| m.t_start == 300 && m.t_end == 312));

        params.multi_hits = 200;
        let mut mask = DynaMask::unbounded();
        assert!(gapless_scan(&params, &index, lone, 0..lone.len(), &mut mask).is_empty());

        let long = &target[..500];
        let mut mask = DynaMask::unbounded();
        let msps = gapless_scan(&params, &index, long, 0..long.len(), &mut mask);
        assert!(msps
            .iter()
            .any(|m| (m.q_start, m.q_end, m.t_start, m.t_end) == (0, 500, 0, 500)));
    }
}
