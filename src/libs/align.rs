//! The alignment pipeline.
//!
//! Seeds are extended into MSPs, chained with cheap gap costs, shrunk and
//! band-extended, then rechained with the full gap model. Space around good
//! chains is searched again with a finer seed before the final chaining and
//! gap clean-up.

use std::ops::Range;
use std::sync::Arc;

use rayon::prelude::*;

use crate::libs::boxes::{chain_boxes, clump_boxes};
use crate::libs::chain::{
    band_ext_backward, band_ext_forward, chain_blocks, sort_chains, Block, Chain, ChainMeta,
    ExtBlock, GapCalc, ScoreContext,
};
use crate::libs::gapless::{gapless_scan, DynaMask};
use crate::libs::params::AlignParams;
use crate::libs::seed::SeedIndex;
use crate::libs::seq::{mask_tail_poly_a, DnaSeq};

/// Bases removed from each block, split between its ends, before banded
/// extension re-grows it.
const SHRINK: u64 = 200;
/// Equal double-sided gaps below this are tried as plain matches.
const MAX_FILL_GAP: usize = 200;
/// Double-sided gaps with a side below this are tried as single-sided.
const MAX_SHIFT_GAP: usize = 30;

/// One index per target sequence, built in parallel.
pub fn build_indexes(targets: Vec<DnaSeq>, params: &AlignParams) -> Vec<SeedIndex> {
    targets
        .into_par_iter()
        .map(|target| {
            if !params.unmask && !target.has_upper_acgt() {
                log::warn!(
                    "Target {} has no unmasked bases and will not be seeded",
                    target.name
                );
            }
            SeedIndex::new(
                Arc::new(target),
                params.weight,
                params.word_limit,
                params.unmask,
            )
        })
        .collect()
}

/// Aligns both strands of `query` against every index.
///
/// Chains come back by descending score with ids numbered from 1. Minus
/// strand chains carry query coordinates on the reverse complement.
pub fn align(
    params: &AlignParams,
    indexes: &[SeedIndex],
    query: &DnaSeq,
    mask: &mut DynaMask,
) -> Vec<Chain> {
    if !params.unmask && !query.has_upper_acgt() {
        log::warn!(
            "Query {} is entirely masked or N, no alignments attempted",
            query.name
        );
        return vec![];
    }

    let mut plus = query.clone();
    if params.rna {
        let masked = mask_tail_poly_a(&mut plus.seq);
        if masked > 0 {
            log::debug!("{}: masked {} bases of poly-A tail", query.name, masked);
        }
    }
    let minus = plus.rev_comp();

    let mut chains = vec![];
    mask.begin_query(indexes.len());
    for (strand, seq) in [('+', &plus), ('-', &minus)] {
        mask.reset_query(seq.len());
        for (slot, index) in indexes.iter().enumerate() {
            mask.select_target(slot, index.target.len());
            chains.extend(align_one(params, index, seq, strand, mask));
        }
    }

    sort_chains(&mut chains);
    if params.best_chain_only {
        chains.truncate(1);
    }
    for (i, chain) in chains.iter_mut().enumerate() {
        chain.header.id = i as u64 + 1;
    }

    if chains.is_empty() {
        log::info!("{}: no alignments", query.name);
    } else {
        log::debug!("{}: {} chains", query.name, chains.len());
    }
    chains
}

/// One strand of the query against one index.
fn align_one(
    params: &AlignParams,
    index: &SeedIndex,
    query: &DnaSeq,
    strand: char,
    mask: &mut DynaMask,
) -> Vec<Chain> {
    let target = &index.target;
    let meta = ChainMeta {
        t_name: target.name.clone(),
        t_size: target.len() as u64,
        q_name: query.name.clone(),
        q_size: query.len() as u64,
        q_strand: strand,
    };
    let ctx = ScoreContext {
        t_seq: &target.seq,
        q_seq: &query.seq,
        matrix: &params.matrix,
    };

    let chains = chain_against_index(params, index, &query.seq, 0..query.len(), &meta, mask);

    let mut blocks = vec![];
    if params.expand_window > 0 && !chains.is_empty() {
        blocks = expand_around(params, index, &query.seq, &chains, &meta, mask);
    }
    blocks.extend(chains.into_iter().flat_map(|c| c.blocks));
    if blocks.is_empty() {
        return vec![];
    }

    remove_simple_overlaps(&mut blocks);
    let mut chains = chain_blocks(&blocks, &params.gap_calc, &ctx, &meta);
    chains.retain(|c| c.header.score >= params.min_score as f64);

    for chain in chains.iter_mut() {
        reduce_gaps(&mut chain.blocks, &ctx, &params.gap_calc);
        if params.rna {
            slide_introns(&mut chain.blocks, &ctx);
        }
        for b in chain.blocks.iter_mut() {
            b.score = ctx.block_score(b);
        }
        chain.header.score = ctx.chain_score(&chain.blocks, &params.gap_calc);
        chain.update_bounds();
    }
    chains
}

/// Scan, cheap chaining, banded extension and rechaining inside the
/// index's target window and `q_range`.
fn chain_against_index(
    params: &AlignParams,
    index: &SeedIndex,
    query: &[u8],
    q_range: Range<usize>,
    meta: &ChainMeta,
    mask: &mut DynaMask,
) -> Vec<Chain> {
    let msps = gapless_scan(params, index, query, q_range.clone(), mask);
    if msps.is_empty() {
        return vec![];
    }

    let ctx = ScoreContext {
        t_seq: &index.target.seq,
        q_seq: query,
        matrix: &params.matrix,
    };
    let blocks: Vec<Block> = msps
        .iter()
        .map(|m| {
            let mut b = Block::new(m.t_start as u64, m.q_start as u64, m.len() as u64, 0.0);
            b.score = ctx.block_score(&b);
            b
        })
        .collect();

    let mut chains = chain_blocks(&blocks, &params.cheap_gap, &ctx, meta);
    if params.best_chain_only {
        chains.truncate(1);
    } else if params.max_chains > 0 {
        chains.truncate(params.max_chains);
    }
    chains.retain(|c| c.header.score >= params.min_chain as f64);
    log::debug!(
        "{} vs {} ({}): {} MSPs, {} chains over {}",
        meta.q_name,
        meta.t_name,
        meta.q_strand,
        msps.len(),
        chains.len(),
        params.min_chain
    );

    let t_lim = index.t_start..index.t_end;
    let q_lim = q_range.start..q_range.end.min(query.len());
    let mut pooled = vec![];
    for chain in &chains {
        if params.max_extend > 0 {
            pooled.extend(band_extend_chain(params, &ctx, chain, &t_lim, &q_lim));
        } else {
            pooled.extend(chain.blocks.iter().cloned());
        }
    }
    if pooled.is_empty() {
        return vec![];
    }
    chain_blocks(&pooled, &params.gap_calc, &ctx, meta)
}

/// Blocks trimmed towards their middles, each keeping at least one base.
fn shrink_blocks(blocks: &[Block]) -> Vec<Block> {
    blocks
        .iter()
        .map(|b| {
            let size = b.size();
            let keep = size.saturating_sub(SHRINK).max(1);
            let diff = size.saturating_sub(keep);
            let add_start = diff / 2;
            let sub_end = diff - add_start;
            Block {
                t_start: b.t_start + add_start,
                t_end: b.t_end - sub_end,
                q_start: b.q_start + add_start,
                q_end: b.q_end - sub_end,
                score: b.score,
            }
        })
        .collect()
}

/// The chain's shrunken blocks plus banded extensions before the first
/// block, from both sides of every gap and after the last block.
fn band_extend_chain(
    params: &AlignParams,
    ctx: &ScoreContext,
    chain: &Chain,
    t_lim: &Range<usize>,
    q_lim: &Range<usize>,
) -> Vec<Block> {
    let blocks = shrink_blocks(&chain.blocks);
    let (Some(first), Some(last)) = (blocks.first(), blocks.last()) else {
        return vec![];
    };

    let mut out = extend_region(
        params,
        ctx,
        t_lim.start..first.t_start as usize,
        q_lim.start..first.q_start as usize,
        false,
    );
    for (i, b) in blocks.iter().enumerate() {
        out.push(b.clone());
        if let Some(next) = blocks.get(i + 1) {
            let t = b.t_end as usize..next.t_start as usize;
            let q = b.q_end as usize..next.q_start as usize;
            out.extend(extend_region(params, ctx, t.clone(), q.clone(), true));
            out.extend(extend_region(params, ctx, t, q, false));
        }
    }
    out.extend(extend_region(
        params,
        ctx,
        last.t_end as usize..t_lim.end,
        last.q_end as usize..q_lim.end,
        true,
    ));
    out
}

/// Banded extension over at most `max_extend` bases of a region, anchored
/// at its start (`forward`) or its end.
fn extend_region(
    params: &AlignParams,
    ctx: &ScoreContext,
    t: Range<usize>,
    q: Range<usize>,
    forward: bool,
) -> Vec<Block> {
    if t.is_empty() || q.is_empty() {
        return vec![];
    }
    let t_size = t.len().min(params.max_extend);
    let q_size = q.len().min(params.max_extend);
    let (ts, qs) = if forward {
        (t.start, q.start)
    } else {
        (t.end - t_size, q.end - q_size)
    };

    let t_slice = &ctx.t_seq[ts..ts + t_size];
    let q_slice = &ctx.q_seq[qs..qs + q_size];
    let ext: Vec<ExtBlock> = if forward {
        band_ext_forward(ctx.matrix, t_slice, q_slice, params.max_band_gap)
    } else {
        band_ext_backward(ctx.matrix, t_slice, q_slice, params.max_band_gap)
    };

    ext.into_iter()
        .map(|e| {
            let mut b = Block::new((ts + e.t_off) as u64, (qs + e.q_off) as u64, e.len as u64, 0.0);
            b.score = ctx.block_score(&b);
            b
        })
        .collect()
}

/// Searches the boxes around chains scoring at least `min_expand` with
/// finer parameters and returns the blocks found there.
fn expand_around(
    params: &AlignParams,
    index: &SeedIndex,
    query: &[u8],
    chains: &[Chain],
    meta: &ChainMeta,
    mask: &mut DynaMask,
) -> Vec<Block> {
    let fine = params.expansion();
    let min_size = 2 * params.weight;

    let mut boxes = vec![];
    for chain in chains
        .iter()
        .filter(|c| c.header.score >= params.min_expand as f64)
    {
        boxes.extend(chain_boxes(
            chain,
            index.target.len(),
            query.len(),
            min_size,
            params.expand_window,
        ));
    }
    let clumps = clump_boxes(&boxes);

    let mut blocks = vec![];
    for clump in &clumps {
        let sub = SeedIndex::build(
            index.target.clone(),
            clump.t_start,
            clump.t_end,
            fine.weight,
            0,
            index.unmask,
        );
        if sub.is_empty() {
            continue;
        }
        for chain in chain_against_index(
            &fine,
            &sub,
            query,
            clump.q_start..clump.q_end,
            meta,
            mask,
        ) {
            blocks.extend(chain.blocks);
        }
    }
    log::debug!(
        "{} vs {} ({}): {} boxes, {} clumps, {} new blocks",
        meta.q_name,
        meta.t_name,
        meta.q_strand,
        boxes.len(),
        clumps.len(),
        blocks.len()
    );
    blocks
}

/// Folds blocks that overlap on the same diagonal into one.
fn remove_simple_overlaps(blocks: &mut Vec<Block>) {
    blocks.sort_by(|a, b| {
        a.diagonal()
            .cmp(&b.diagonal())
            .then(a.q_start.cmp(&b.q_start))
    });

    let mut kept: Vec<Block> = Vec::with_capacity(blocks.len());
    for b in blocks.drain(..) {
        match kept.last_mut() {
            Some(last) if last.diagonal() == b.diagonal() && last.q_end >= b.q_start => {
                last.q_end = last.q_end.max(b.q_end);
                last.t_end = last.t_end.max(b.t_end);
            }
            _ => kept.push(b),
        }
    }
    *blocks = kept;
}

/// Turns small double-sided gaps into matches or single-sided gaps when
/// the score does not drop.
fn reduce_gaps(blocks: &mut Vec<Block>, ctx: &ScoreContext, gap_calc: &GapCalc) {
    let mut i = 0;
    while i + 1 < blocks.len() {
        let (b1, b2) = (&blocks[i], &blocks[i + 1]);
        let dq = (b2.q_start - b1.q_end) as usize;
        let dt = (b2.t_start - b1.t_end) as usize;
        if dq == 0 || dt == 0 {
            i += 1;
            continue;
        }

        let (t0, q0) = (b1.t_end as usize, b1.q_end as usize);
        let current = -gap_calc.calc(dq as i32, dt as i32);

        if dq == dt && dt < MAX_FILL_GAP {
            let filled = ctx
                .matrix
                .score_ungapped(&ctx.t_seq[t0..t0 + dt], &ctx.q_seq[q0..q0 + dq]);
            if filled >= current {
                let b2 = blocks.remove(i + 1);
                blocks[i].t_end = b2.t_end;
                blocks[i].q_end = b2.q_end;
                continue;
            }
        } else if dq < MAX_SHIFT_GAP || dt < MAX_SHIFT_GAP {
            let overlap = dq.min(dt);
            let (new_dq, new_dt) = (dq - overlap, dt - overlap);
            let new_gap = -gap_calc.calc(new_dq as i32, new_dt as i32);
            let (pos, matched) = best_gap_pos(ctx, t0, q0, dt, dq, overlap);

            if new_gap + matched >= current {
                blocks[i].t_end += pos as u64;
                blocks[i].q_end += pos as u64;
                blocks[i + 1].t_start = blocks[i].t_end + new_dt as u64;
                blocks[i + 1].q_start = blocks[i].q_end + new_dq as u64;
            }
        }
        i += 1;
    }
}

/// Where to put a single-sided gap inside a `dt` x `dq` gap so the
/// `matched` bases aligned around it score best. Returns the number of
/// bases taken on the left and their total score.
fn best_gap_pos(
    ctx: &ScoreContext,
    t0: usize,
    q0: usize,
    dt: usize,
    dq: usize,
    matched: usize,
) -> (usize, i32) {
    let mut best = (0, i32::MIN);
    for pos in 0..=matched {
        let right = matched - pos;
        let mut score = ctx
            .matrix
            .score_ungapped(&ctx.t_seq[t0..t0 + pos], &ctx.q_seq[q0..q0 + pos]);
        score += ctx.matrix.score_ungapped(
            &ctx.t_seq[t0 + dt - right..t0 + dt],
            &ctx.q_seq[q0 + dq - right..q0 + dq],
        );
        if score > best.1 {
            best = (pos, score);
        }
    }
    best
}

/// Consensus score of an intron starting `a b` and ending `y z`, best of
/// GT..AG and its reverse complement CT..AC.
fn score_intron(a: u8, b: u8, y: u8, z: u8) -> u8 {
    let fwd = [a == b'g', b == b't', y == b'a', z == b'g'];
    let rev = [a == b'c', b == b't', y == b'a', z == b'c'];
    let count = |v: [bool; 4]| v.iter().filter(|&&x| x).count() as u8;
    count(fwd).max(count(rev))
}

/// Slides every target gap that is at most two query bases wide along the
/// stretch of equivalent placements to the one with the best splice
/// consensus.
fn slide_introns(blocks: &mut Vec<Block>, ctx: &ScoreContext) {
    let q = |i: u64| ctx.q_seq[i as usize].to_ascii_lowercase();
    let t = |i: u64| ctx.t_seq[i as usize].to_ascii_lowercase();

    for i in 1..blocks.len() {
        let (left, right) = (&blocks[i - 1], &blocks[i]);
        if right.t_start < left.t_end + 4 || right.q_start > left.q_end + 2 {
            continue;
        }

        let (mut n_left, mut h_left) = (left.q_end, left.t_end);
        let (mut n_right, mut h_right) = (right.q_start, right.t_start);

        while n_left > left.q_start {
            let (nl, hl) = (q(n_left - 1), t(h_left - 1));
            let (nr, hr) = (q(n_right - 1), t(h_right - 1));
            if !(nl == b'n' && nr == b'n') && (nl != hl || nr != hr || hl != hr) {
                break;
            }
            n_left -= 1;
            h_left -= 1;
            n_right -= 1;
            h_right -= 1;
        }

        let mut best: Option<(u8, u64)> = None;
        while n_right < right.q_end {
            let score = score_intron(t(h_left), t(h_left + 1), t(h_right - 2), t(h_right - 1));
            if best.map_or(true, |(s, _)| score > s) {
                best = Some((score, n_left));
            }
            let (nl, hl) = (q(n_left), t(h_left));
            if nl != b'n' && nl != hl {
                break;
            }
            let (nr, hr) = (q(n_right), t(h_right));
            if nr != b'n' && nr != hr {
                break;
            }
            if hl != hr {
                break;
            }
            n_left += 1;
            h_left += 1;
            n_right += 1;
            h_right += 1;
        }

        let Some((_, best_left)) = best else {
            continue;
        };
        let offset = best_left as i64 - blocks[i - 1].q_end as i64;
        if offset == 0 {
            continue;
        }
        let shift = |v: u64| (v as i64 + offset) as u64;
        blocks[i - 1].q_end = shift(blocks[i - 1].q_end);
        blocks[i - 1].t_end = shift(blocks[i - 1].t_end);
        blocks[i].q_start = shift(blocks[i].q_start);
        blocks[i].t_start = shift(blocks[i].t_start);
    }
    blocks.retain(|b| b.t_end > b.t_start);
}
