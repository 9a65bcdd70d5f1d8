//! Banded gapped extension with affine gap costs.
//!
//! The alignment is anchored at the start of both slices and may end
//! anywhere; the best-scoring end on an aligned pair wins. Cells further
//! than `band` from the anchor diagonal are never visited.

use crate::libs::chain::sub_matrix::SubMatrix;

const NEG: i32 = i32::MIN / 4;

/// An ungapped run inside an extension, offsets relative to the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtBlock {
    pub t_off: usize,
    pub q_off: usize,
    pub len: usize,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Match,
    // consumes target only
    TGap,
    // consumes query only
    QGap,
}

struct Band {
    width: usize,
    band: usize,
    m: Vec<i32>,
    e: Vec<i32>,
    f: Vec<i32>,
}

impl Band {
    fn new(rows: usize, band: usize) -> Self {
        let width = 2 * band + 1;
        Self {
            width,
            band,
            m: vec![NEG; rows * width],
            e: vec![NEG; rows * width],
            f: vec![NEG; rows * width],
        }
    }

    #[inline]
    fn idx(&self, i: usize, j: usize) -> Option<usize> {
        let k = j as isize - i as isize + self.band as isize;
        if k < 0 || k as usize >= self.width {
            None
        } else {
            Some(i * self.width + k as usize)
        }
    }

    #[inline]
    fn get(&self, v: &[i32], i: usize, j: usize) -> i32 {
        self.idx(i, j).map_or(NEG, |x| v[x])
    }

    #[inline]
    fn h(&self, i: usize, j: usize) -> (i32, State) {
        let m = self.get(&self.m, i, j);
        let e = self.get(&self.e, i, j);
        let f = self.get(&self.f, i, j);
        if m >= e && m >= f {
            (m, State::Match)
        } else if e >= f {
            (e, State::TGap)
        } else {
            (f, State::QGap)
        }
    }
}

/// Extends forward from the start of `t` and `q`. Returns the aligned
/// blocks of the best-scoring extension, empty when nothing scores above
/// zero.
pub fn band_ext_forward(matrix: &SubMatrix, t: &[u8], q: &[u8], band: usize) -> Vec<ExtBlock> {
    let n = t.len();
    let m_len = q.len();
    if n == 0 || m_len == 0 {
        return vec![];
    }

    let open = matrix.gap_open;
    let ext = matrix.gap_extend;
    let mut dp = Band::new(n + 1, band);
    if let Some(x) = dp.idx(0, 0) {
        dp.m[x] = 0;
    }

    let mut best = 0;
    let mut best_cell = None;

    for i in 0..=n {
        let j_lo = i.saturating_sub(band);
        let j_hi = (i + band).min(m_len);
        for j in j_lo..=j_hi {
            if i == 0 && j == 0 {
                continue;
            }
            let Some(x) = dp.idx(i, j) else { continue };

            if i > 0 && j > 0 {
                let (h, _) = dp.h(i - 1, j - 1);
                if h > NEG {
                    dp.m[x] = h + matrix.score(t[i - 1], q[j - 1]);
                }
            }
            if i > 0 {
                let (h, _) = dp.h(i - 1, j);
                let e_prev = dp.get(&dp.e, i - 1, j);
                dp.e[x] = (h - open - ext).max(e_prev - ext).max(NEG);
            }
            if j > 0 {
                let (h, _) = dp.h(i, j - 1);
                let f_prev = dp.get(&dp.f, i, j - 1);
                dp.f[x] = (h - open - ext).max(f_prev - ext).max(NEG);
            }

            if dp.m[x] > best {
                best = dp.m[x];
                best_cell = Some((i, j));
            }
        }
    }

    let Some((mut i, mut j)) = best_cell else {
        return vec![];
    };

    // walk back, collecting aligned pairs in reverse
    let mut pairs: Vec<(usize, usize)> = vec![];
    let mut state = State::Match;
    while i > 0 || j > 0 {
        match state {
            State::Match => {
                pairs.push((i - 1, j - 1));
                i -= 1;
                j -= 1;
                state = dp.h(i, j).1;
            }
            State::TGap => {
                let cur = dp.get(&dp.e, i, j);
                let e_prev = dp.get(&dp.e, i - 1, j);
                i -= 1;
                if e_prev > NEG && cur == e_prev - ext {
                    state = State::TGap;
                } else {
                    state = dp.h(i, j).1;
                }
            }
            State::QGap => {
                let cur = dp.get(&dp.f, i, j);
                let f_prev = dp.get(&dp.f, i, j - 1);
                j -= 1;
                if f_prev > NEG && cur == f_prev - ext {
                    state = State::QGap;
                } else {
                    state = dp.h(i, j).1;
                }
            }
        }
    }
    pairs.reverse();

    let mut blocks: Vec<ExtBlock> = vec![];
    for (ti, qi) in pairs {
        match blocks.last_mut() {
            Some(b) if b.t_off + b.len == ti && b.q_off + b.len == qi => b.len += 1,
            _ => blocks.push(ExtBlock {
                t_off: ti,
                q_off: qi,
                len: 1,
            }),
        }
    }
    blocks
}

/// Extends backward from the end of `t` and `q`. Offsets in the result are
/// relative to the start of the slices.
pub fn band_ext_backward(matrix: &SubMatrix, t: &[u8], q: &[u8], band: usize) -> Vec<ExtBlock> {
    let t_rev: Vec<u8> = t.iter().rev().copied().collect();
    let q_rev: Vec<u8> = q.iter().rev().copied().collect();

    let mut blocks: Vec<ExtBlock> = band_ext_forward(matrix, &t_rev, &q_rev, band)
        .into_iter()
        .map(|b| ExtBlock {
            t_off: t.len() - b.t_off - b.len,
            q_off: q.len() - b.q_off - b.len,
            len: b.len,
        })
        .collect();
    blocks.reverse();
    blocks
}
