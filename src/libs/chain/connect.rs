use std::cmp::Ordering;

use crate::libs::chain::algo::KdTree;
use crate::libs::chain::gap_calc::GapCalc;
use crate::libs::chain::record::{Block, Chain, ChainHeader};
use crate::libs::chain::sub_matrix::SubMatrix;

/// Sequences the blocks refer to. `q_seq` is the query on the strand being
/// aligned, so block coordinates index it directly.
pub struct ScoreContext<'a> {
    pub t_seq: &'a [u8],
    pub q_seq: &'a [u8],
    pub matrix: &'a SubMatrix,
}

impl ScoreContext<'_> {
    pub fn block_score(&self, b: &Block) -> f64 {
        let t = &self.t_seq[b.t_start as usize..b.t_end as usize];
        let q = &self.q_seq[b.q_start as usize..b.q_end as usize];
        self.matrix.score_ungapped(t, q) as f64
    }

    /// Matrix score of every block minus the cost of every gap.
    pub fn chain_score(&self, blocks: &[Block], gap_calc: &GapCalc) -> f64 {
        let mut score = 0.0;
        for (i, b) in blocks.iter().enumerate() {
            score += self.block_score(b);
            if i > 0 {
                let prev = &blocks[i - 1];
                let dt = b.t_start as i64 - prev.t_end as i64;
                let dq = b.q_start as i64 - prev.q_end as i64;
                score -= gap_calc.calc(dq as i32, dt as i32) as f64;
            }
        }
        score
    }
}

/// Names and sizes written into the headers of the chains built.
#[derive(Debug, Clone)]
pub struct ChainMeta {
    pub t_name: String,
    pub t_size: u64,
    pub q_name: String,
    pub q_size: u64,
    pub q_strand: char,
}

struct DpEntry {
    best_pred: Option<usize>,
    total_score: f64,
    hit: bool,
}

/// Links blocks into chains by dynamic programming over a KD-tree.
///
/// A predecessor must start strictly before its successor on both sequences
/// and must not contain it. Chains are peeled off by descending total
/// score, overlaps are trimmed at the best crossover and scores recomputed
/// exactly. Chains scoring zero or less are dropped; the rest come back by
/// descending score.
pub fn chain_blocks(
    blocks: &[Block],
    gap_calc: &GapCalc,
    ctx: &ScoreContext,
    meta: &ChainMeta,
) -> Vec<Chain> {
    if blocks.is_empty() {
        return Vec::new();
    }

    let mut blocks = blocks.to_vec();
    blocks.sort_by(|a, b| {
        a.t_start
            .cmp(&b.t_start)
            .then(a.q_start.cmp(&b.q_start))
            .then(a.t_end.cmp(&b.t_end))
    });

    let mut dp: Vec<DpEntry> = blocks
        .iter()
        .map(|b| DpEntry {
            best_pred: None,
            total_score: b.score,
            hit: false,
        })
        .collect();

    let mut leaf_indices: Vec<usize> = (0..blocks.len()).collect();
    let mut tree = KdTree::build(&mut leaf_indices, &blocks);

    for i in 0..blocks.len() {
        let link = |cand_idx: usize, target_idx: usize| -> Option<f64> {
            let cand = &blocks[cand_idx];
            let target = &blocks[target_idx];

            if cand.t_start >= target.t_start || cand.q_start >= target.q_start {
                return None;
            }
            if cand.t_end >= target.t_end || cand.q_end >= target.q_end {
                return None;
            }

            let dt = target.t_start as i64 - cand.t_end as i64;
            let dq = target.q_start as i64 - cand.q_end as i64;

            let mut overlap_penalty = 0.0;
            if dt < 0 || dq < 0 {
                let overlap = (-dt).max(-dq).max(0) as f64;
                let density = |b: &Block| {
                    let len = b.size() as f64;
                    if len > 0.0 {
                        b.score / len
                    } else {
                        0.0
                    }
                };
                overlap_penalty = overlap * density(cand).max(density(target));
            }

            let cost = gap_calc.calc(dq as i32, dt as i32) as f64;
            Some(dp[cand_idx].total_score + target.score - cost - overlap_penalty)
        };
        let lower_bound = |dq: u64, dt: u64| -> f64 { gap_calc.calc(dq as i32, dt as i32) as f64 };

        let (best_score, best_pred) =
            tree.best_predecessor(i, dp[i].total_score, &blocks, &link, &lower_bound);

        if best_score > dp[i].total_score {
            dp[i].total_score = best_score;
            dp[i].best_pred = best_pred;
        }
        tree.update_scores(i, dp[i].total_score, &blocks);
    }

    let mut order: Vec<usize> = (0..dp.len()).collect();
    order.sort_by(|&a, &b| {
        dp[b]
            .total_score
            .partial_cmp(&dp[a].total_score)
            .unwrap_or(Ordering::Equal)
    });

    let mut chains = Vec::new();
    for &leaf in &order {
        if dp[leaf].hit {
            continue;
        }

        let mut members = Vec::new();
        let mut curr = leaf;
        loop {
            dp[curr].hit = true;
            members.push(blocks[curr].clone());
            match dp[curr].best_pred {
                Some(pred) if !dp[pred].hit => curr = pred,
                _ => break,
            }
        }
        members.reverse();

        remove_exact_overlaps(&mut members);
        trim_overlaps(&mut members, ctx);
        merge_abutting_blocks(&mut members);
        if members.is_empty() {
            continue;
        }
        for b in members.iter_mut() {
            b.score = ctx.block_score(b);
        }

        let score = ctx.chain_score(&members, gap_calc);
        if score <= 0.0 {
            continue;
        }

        let mut chain = Chain {
            header: ChainHeader {
                score,
                t_name: meta.t_name.clone(),
                t_size: meta.t_size,
                t_strand: '+',
                q_name: meta.q_name.clone(),
                q_size: meta.q_size,
                q_strand: meta.q_strand,
                ..Default::default()
            },
            blocks: members,
        };
        chain.update_bounds();
        chains.push(chain);
    }

    sort_chains(&mut chains);
    chains
}

/// Descending score, ties by position so output is deterministic.
pub fn sort_chains(chains: &mut [Chain]) {
    chains.sort_by(|a, b| {
        b.header
            .score
            .partial_cmp(&a.header.score)
            .unwrap_or(Ordering::Equal)
            .then(a.header.q_strand.cmp(&b.header.q_strand))
            .then(a.header.t_name.cmp(&b.header.t_name))
            .then(a.header.t_start.cmp(&b.header.t_start))
            .then(a.header.q_start.cmp(&b.header.q_start))
    });
}

/// Moves the boundary of each overlapping pair of neighbours to the point
/// that keeps the best-scoring bases of each side.
fn trim_overlaps(blocks: &mut Vec<Block>, ctx: &ScoreContext) {
    let mut i = 0;
    while i + 1 < blocks.len() {
        let (prev, next) = (&blocks[i], &blocks[i + 1]);
        let ov_t = prev.t_end as i64 - next.t_start as i64;
        let ov_q = prev.q_end as i64 - next.q_start as i64;
        let overlap = ov_t.max(ov_q);

        if overlap <= 0 {
            i += 1;
            continue;
        }
        let overlap = overlap as u64;

        if overlap >= next.size() {
            blocks.remove(i + 1);
            continue;
        }
        if overlap >= prev.size() {
            blocks.remove(i);
            i = i.saturating_sub(1);
            continue;
        }

        let cut = find_crossover(&blocks[i], &blocks[i + 1], overlap, ctx);
        let trim_left = overlap - cut;
        blocks[i].t_end -= trim_left;
        blocks[i].q_end -= trim_left;
        blocks[i + 1].t_start += cut;
        blocks[i + 1].q_start += cut;
        i += 1;
    }
    blocks.retain(|b| b.t_end > b.t_start);
}

/// Number of overlapping bases the left block keeps.
fn find_crossover(left: &Block, right: &Block, overlap: u64, ctx: &ScoreContext) -> u64 {
    let ov = overlap as usize;
    let l_t = &ctx.t_seq[left.t_end as usize - ov..left.t_end as usize];
    let l_q = &ctx.q_seq[left.q_end as usize - ov..left.q_end as usize];
    let r_t = &ctx.t_seq[right.t_start as usize..right.t_start as usize + ov];
    let r_q = &ctx.q_seq[right.q_start as usize..right.q_start as usize + ov];

    let mut current_l = 0;
    let mut current_r = ctx.matrix.score_ungapped(r_t, r_q);
    let mut best_score = i32::MIN;
    let mut best_pos = 0;

    for i in 0..=ov {
        let score = current_l + current_r;
        if score > best_score {
            best_score = score;
            best_pos = i;
        }
        if i < ov {
            current_l += ctx.matrix.score(l_t[i], l_q[i]);
            current_r -= ctx.matrix.score(r_t[i], r_q[i]);
        }
    }

    best_pos as u64
}

fn remove_exact_overlaps(blocks: &mut Vec<Block>) {
    blocks.dedup_by(|curr, prev| {
        curr.t_start == prev.t_start
            && curr.q_start == prev.q_start
            && curr.t_end == prev.t_end
            && curr.q_end == prev.q_end
    });
}

/// Joins neighbours that continue each other on the same diagonal.
pub fn merge_abutting_blocks(blocks: &mut Vec<Block>) {
    if blocks.len() < 2 {
        return;
    }

    let mut merged: Vec<Block> = Vec::with_capacity(blocks.len());
    for b in blocks.drain(..) {
        match merged.last_mut() {
            Some(prev) if b.t_start == prev.t_end && b.q_start == prev.q_end => {
                prev.t_end = b.t_end;
                prev.q_end = b.q_end;
                prev.score += b.score;
            }
            _ => merged.push(b),
        }
    }
    *blocks = merged;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_seq(len: usize, seed: u64) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..len).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect()
    }

    fn meta() -> ChainMeta {
        ChainMeta {
            t_name: "t".into(),
            t_size: 200,
            q_name: "q".into(),
            q_size: 200,
            q_strand: '+',
        }
    }

    #[test]
    fn chains_colinear_blocks() {
        let seq = random_seq(200, 3);
        let matrix = SubMatrix::default();
        let ctx = ScoreContext {
            t_seq: &seq,
            q_seq: &seq,
            matrix: &matrix,
        };
        let blocks = vec![
            Block::new(0, 0, 30, 3000.0),
            Block::new(40, 40, 30, 3000.0),
            // off-diagonal conflict
            Block::new(10, 60, 5, 500.0),
        ];

        let chains = chain_blocks(&blocks, &GapCalc::medium(), &ctx, &meta());
        assert!(!chains.is_empty());
        let best = &chains[0];
        assert_eq!(best.blocks.len(), 2);
        assert_eq!(best.header.t_start, 0);
        assert_eq!(best.header.t_end, 70);
        // two blocks of 30 matches, one double-sided gap of 10
        assert_eq!(best.header.score, 6000.0 - GapCalc::medium().calc(10, 10) as f64);
        assert!(chains
            .windows(2)
            .all(|w| w[0].header.score >= w[1].header.score));
    }

    #[test]
    fn overlapping_blocks_are_trimmed() {
        let seq = random_seq(200, 5);
        let matrix = SubMatrix::default();
        let ctx = ScoreContext {
            t_seq: &seq,
            q_seq: &seq,
            matrix: &matrix,
        };
        let blocks = vec![Block::new(0, 0, 50, 5000.0), Block::new(40, 40, 50, 5000.0)];

        let chains = chain_blocks(&blocks, &GapCalc::medium(), &ctx, &meta());
        assert_eq!(chains.len(), 1);
        // trimmed and then merged back into one block on the diagonal
        assert_eq!(chains[0].blocks.len(), 1);
        assert_eq!(chains[0].blocks[0].t_start, 0);
        assert_eq!(chains[0].blocks[0].t_end, 90);
        assert_eq!(chains[0].header.score, 9000.0);
    }

    #[test]
    fn merge_and_dedup() {
        let mut blocks = vec![
            Block::new(0, 0, 10, 100.0),
            Block::new(0, 0, 10, 100.0),
            Block::new(10, 10, 10, 100.0),
            Block::new(25, 25, 5, 100.0),
        ];
        remove_exact_overlaps(&mut blocks);
        assert_eq!(blocks.len(), 3);
        merge_abutting_blocks(&mut blocks);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].t_end, 20);
        assert_eq!(blocks[0].score, 200.0);
        assert_eq!(blocks[1].t_start, 25);
    }
}
