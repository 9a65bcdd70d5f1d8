//! Unaligned regions around chains, searched again at a finer seed weight.

use crate::libs::chain::Chain;

/// A rectangle of target x query space, half-open on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SearchBox {
    pub t_start: usize,
    pub t_end: usize,
    pub q_start: usize,
    pub q_end: usize,
}

impl SearchBox {
    pub fn t_size(&self) -> usize {
        self.t_end - self.t_start
    }

    pub fn q_size(&self) -> usize {
        self.q_end - self.q_start
    }

    /// Overlapping or touching on both axes.
    pub fn touches(&self, other: &SearchBox) -> bool {
        self.t_start <= other.t_end
            && other.t_start <= self.t_end
            && self.q_start <= other.q_end
            && other.q_start <= self.q_end
    }

    fn cover(&mut self, other: &SearchBox) {
        self.t_start = self.t_start.min(other.t_start);
        self.t_end = self.t_end.max(other.t_end);
        self.q_start = self.q_start.min(other.q_start);
        self.q_end = self.q_end.max(other.q_end);
    }
}

/// Adds a box unless either side is shorter than `min_size`. A box longer
/// than `window` on either side is replaced by its two corner windows.
pub fn add_clipped_box(boxes: &mut Vec<SearchBox>, b: SearchBox, min_size: usize, window: usize) {
    if b.t_end <= b.t_start || b.q_end <= b.q_start {
        return;
    }
    if b.t_size() < min_size || b.q_size() < min_size {
        return;
    }

    if b.t_size() <= window && b.q_size() <= window {
        boxes.push(b);
        return;
    }

    let t_win = b.t_size().min(window);
    let q_win = b.q_size().min(window);
    boxes.push(SearchBox {
        t_start: b.t_start,
        t_end: b.t_start + t_win,
        q_start: b.q_start,
        q_end: b.q_start + q_win,
    });
    boxes.push(SearchBox {
        t_start: b.t_end - t_win,
        t_end: b.t_end,
        q_start: b.q_end - q_win,
        q_end: b.q_end,
    });
}

/// Boxes before the first block, in every gap, and after the last block of
/// `chain`, limited to `window` bases beyond the chain ends and to the
/// sequence sizes.
pub fn chain_boxes(
    chain: &Chain,
    t_size: usize,
    q_size: usize,
    min_size: usize,
    window: usize,
) -> Vec<SearchBox> {
    let mut boxes = vec![];
    let (Some(first), Some(last)) = (chain.blocks.first(), chain.blocks.last()) else {
        return boxes;
    };

    let (ft, fq) = (first.t_start as usize, first.q_start as usize);
    add_clipped_box(
        &mut boxes,
        SearchBox {
            t_start: ft.saturating_sub(window),
            t_end: ft,
            q_start: fq.saturating_sub(window),
            q_end: fq,
        },
        min_size,
        window,
    );

    for pair in chain.blocks.windows(2) {
        add_clipped_box(
            &mut boxes,
            SearchBox {
                t_start: pair[0].t_end as usize,
                t_end: pair[1].t_start as usize,
                q_start: pair[0].q_end as usize,
                q_end: pair[1].q_start as usize,
            },
            min_size,
            window,
        );
    }

    let (lt, lq) = (last.t_end as usize, last.q_end as usize);
    add_clipped_box(
        &mut boxes,
        SearchBox {
            t_start: lt,
            t_end: (lt + window).min(t_size),
            q_start: lq,
            q_end: (lq + window).min(q_size),
        },
        min_size,
        window,
    );

    boxes
}

/// Disjoint sets over box indices.
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        UnionFind {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    fn union(&mut self, x: usize, y: usize) {
        let (rx, ry) = (self.find(x), self.find(y));
        if rx == ry {
            return;
        }
        if self.rank[rx] < self.rank[ry] {
            self.parent[rx] = ry;
        } else if self.rank[rx] > self.rank[ry] {
            self.parent[ry] = rx;
        } else {
            self.parent[ry] = rx;
            self.rank[rx] += 1;
        }
    }
}

/// Lumps touching boxes and returns the bounding box of each lump, sorted.
pub fn clump_boxes(boxes: &[SearchBox]) -> Vec<SearchBox> {
    let mut uf = UnionFind::new(boxes.len());
    for i in 0..boxes.len() {
        for j in (i + 1)..boxes.len() {
            if boxes[i].touches(&boxes[j]) {
                uf.union(i, j);
            }
        }
    }

    let mut clumps: Vec<Option<SearchBox>> = vec![None; boxes.len()];
    for (i, b) in boxes.iter().enumerate() {
        let root = uf.find(i);
        match &mut clumps[root] {
            Some(c) => c.cover(b),
            slot => *slot = Some(*b),
        }
    }

    let mut clumps: Vec<SearchBox> = clumps.into_iter().flatten().collect();
    clumps.sort();
    clumps
}
