/// A block the chainer can link: half-open coordinates on both sequences
/// and a score.
pub trait ChainItem {
    fn q_start(&self) -> u64;
    fn q_end(&self) -> u64;
    fn t_start(&self) -> u64;
    fn t_end(&self) -> u64;
    fn score(&self) -> f64;
}

enum KdNode {
    Leaf {
        idx: usize,
        max_q: u64,
        max_t: u64,
        max_score: f64,
    },
    Internal {
        cut: u64,
        lo: Box<KdNode>,
        hi: Box<KdNode>,
        max_q: u64,
        max_t: u64,
        max_score: f64,
    },
}

impl KdNode {
    fn bounds(&self) -> (u64, u64, f64) {
        match self {
            KdNode::Leaf {
                max_q,
                max_t,
                max_score,
                ..
            }
            | KdNode::Internal {
                max_q,
                max_t,
                max_score,
                ..
            } => (*max_q, *max_t, *max_score),
        }
    }
}

struct Best {
    score: f64,
    pred: Option<usize>,
}

/// 2-D tree over block starts, alternating query and target splits.
///
/// Every node carries the largest end coordinates and the best chain score
/// below it, which lets predecessor searches skip subtrees that cannot beat
/// the current best.
pub struct KdTree {
    root: Option<Box<KdNode>>,
}

fn coord<T: ChainItem>(item: &T, dim: usize) -> u64 {
    if dim == 0 {
        item.q_start()
    } else {
        item.t_start()
    }
}

impl KdTree {
    pub fn build<T: ChainItem>(indices: &mut [usize], items: &[T]) -> Self {
        if indices.is_empty() {
            return KdTree { root: None };
        }
        KdTree {
            root: Some(Self::build_node(indices, items, 0)),
        }
    }

    fn build_node<T: ChainItem>(indices: &mut [usize], items: &[T], dim: usize) -> Box<KdNode> {
        if indices.len() == 1 {
            let item = &items[indices[0]];
            return Box::new(KdNode::Leaf {
                idx: indices[0],
                max_q: item.q_end(),
                max_t: item.t_end(),
                max_score: 0.0,
            });
        }

        indices.sort_by_key(|&i| coord(&items[i], dim));
        let mid = indices.len() / 2;
        let cut = coord(&items[indices[mid]], dim);

        let (left, right) = indices.split_at_mut(mid);
        let lo = Self::build_node(left, items, 1 - dim);
        let hi = Self::build_node(right, items, 1 - dim);

        let (lo_q, lo_t, _) = lo.bounds();
        let (hi_q, hi_t, _) = hi.bounds();

        Box::new(KdNode::Internal {
            cut,
            lo,
            hi,
            max_q: lo_q.max(hi_q),
            max_t: lo_t.max(hi_t),
            max_score: 0.0,
        })
    }

    /// Records `score` as the best chain ending at item `idx`.
    pub fn update_scores<T: ChainItem>(&mut self, idx: usize, score: f64, items: &[T]) {
        if let Some(root) = &mut self.root {
            Self::update_node(root, idx, score, items, 0);
        }
    }

    // Items equal to the cut can sit on either side of it.
    fn update_node<T: ChainItem>(
        node: &mut KdNode,
        target: usize,
        score: f64,
        items: &[T],
        dim: usize,
    ) -> bool {
        match node {
            KdNode::Leaf { idx, max_score, .. } => {
                if *idx != target {
                    return false;
                }
                if score > *max_score {
                    *max_score = score;
                }
                true
            }
            KdNode::Internal {
                cut,
                lo,
                hi,
                max_score,
                ..
            } => {
                let c = coord(&items[target], dim);
                let found = if c < *cut {
                    Self::update_node(lo, target, score, items, 1 - dim)
                } else if c > *cut {
                    Self::update_node(hi, target, score, items, 1 - dim)
                } else {
                    Self::update_node(lo, target, score, items, 1 - dim)
                        || Self::update_node(hi, target, score, items, 1 - dim)
                };
                if found && score > *max_score {
                    *max_score = score;
                }
                found
            }
        }
    }

    /// Finds the predecessor of `target` that maximises the chained score.
    ///
    /// `link(candidate, target)` returns the total score of the chain ending
    /// at `target` through `candidate`, or `None` when they cannot be linked.
    /// `lower_bound(dq, dt)` must never exceed the gap cost of a link
    /// spanning at least `dq` query and `dt` target bases.
    pub fn best_predecessor<T, F, L>(
        &self,
        target: usize,
        current_score: f64,
        items: &[T],
        link: &F,
        lower_bound: &L,
    ) -> (f64, Option<usize>)
    where
        T: ChainItem,
        F: Fn(usize, usize) -> Option<f64>,
        L: Fn(u64, u64) -> f64,
    {
        let mut best = Best {
            score: current_score,
            pred: None,
        };
        if let Some(root) = &self.root {
            Self::search(root, target, items, link, lower_bound, 0, &mut best);
        }
        (best.score, best.pred)
    }

    fn search<T, F, L>(
        node: &KdNode,
        target: usize,
        items: &[T],
        link: &F,
        lower_bound: &L,
        dim: usize,
        best: &mut Best,
    ) where
        T: ChainItem,
        F: Fn(usize, usize) -> Option<f64>,
        L: Fn(u64, u64) -> f64,
    {
        let item = &items[target];
        let (max_q, max_t, max_score) = node.bounds();

        let ceiling = max_score + item.score();
        if ceiling < best.score {
            return;
        }
        let dq = item.q_start().saturating_sub(max_q);
        let dt = item.t_start().saturating_sub(max_t);
        if ceiling - lower_bound(dq, dt) < best.score {
            return;
        }

        match node {
            KdNode::Leaf { idx, .. } => {
                if let Some(score) = link(*idx, target) {
                    if score > best.score {
                        best.score = score;
                        best.pred = Some(*idx);
                    }
                }
            }
            KdNode::Internal { cut, lo, hi, .. } => {
                // predecessors start strictly before the target
                if coord(item, dim) > *cut {
                    Self::search(hi, target, items, link, lower_bound, 1 - dim, best);
                }
                Self::search(lo, target, items, link, lower_bound, 1 - dim, best);
            }
        }
    }
}
