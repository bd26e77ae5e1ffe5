//! Sankoff small parsimony over the cost matrix.
//!
//! For every weighted segment `s`, node `n` and candidate leaf `i`, the cache
//! row holds the cheapest cost of the subtree under `n` given that `n` carries
//! witness `i`'s text:
//!
//! ```text
//! cost[n][i] = Σ_{c ∈ children(n)} contrib(c, i)        (∞ unless i is unique in s)
//! contrib(leaf c, i)     = PairCost[i][c]               (0 if c is empty and missing text is free)
//! contrib(internal c, i) = min_{j unique} cost[c][j] + PairCost[i][j]
//! ```
//!
//! Leaf rows are 0 at the leaf's own id and ∞ elsewhere. The segment's cost is
//! the root row minimum; the tree's cost is the weighted sum over segments.

use crate::cost::Cost;
use crate::error::{Result, StemmaError};
use crate::matrix::CostMatrix;
use crate::tree::{NodeId, Tree};

#[derive(Clone, Copy, Debug)]
pub struct Sankoff<'a> {
    matrix: &'a CostMatrix,
    weights: &'a [u32],
    empty_is_missing: bool,
}

impl<'a> Sankoff<'a> {
    pub fn new(matrix: &'a CostMatrix, weights: &'a [u32], empty_is_missing: bool) -> Result<Self> {
        if weights.len() != matrix.segments() {
            return Err(StemmaError::MalformedTable(format!(
                "{} bootstrap weights for {} segments",
                weights.len(),
                matrix.segments()
            )));
        }
        Ok(Self { matrix, weights, empty_is_missing })
    }

    pub fn matrix(&self) -> &'a CostMatrix {
        self.matrix
    }

    pub fn weights(&self) -> &'a [u32] {
        self.weights
    }

    /// Segments that count towards the total, with their weights.
    pub fn weighted_segments(&self) -> impl Iterator<Item = (usize, u32)> {
        self.weights.iter().copied().enumerate().filter(|&(_, w)| w > 0)
    }

    /// Recompute every row of every weighted segment and return the total cost.
    pub fn eval_tree(&self, tree: &mut Tree) -> Cost {
        let order = tree.postorder();
        let root = tree.root();
        let mut total = Cost::ZERO;
        for (s, w) in self.weighted_segments() {
            let mut root_min = Cost::ZERO;
            for &id in &order {
                let m = self.eval_node(tree, id, s);
                if id == root {
                    root_min = m;
                }
            }
            total = total + root_min.weighted(w);
        }
        total
    }

    /// Recompute rows from `from` upwards, stopping below `stop` (or at the
    /// root when `stop` is `None`). Returns the minimum of the last row written.
    ///
    /// Only correct when every node whose children changed lies on that path.
    pub fn eval_uptree(&self, tree: &mut Tree, from: NodeId, stop: Option<NodeId>, segment: usize) -> Cost {
        let mut node = from;
        loop {
            let m = self.eval_node(tree, node, segment);
            match tree.parent(node) {
                Some(p) if Some(p) != stop => node = p,
                _ => return m,
            }
        }
    }

    /// Rescore after an edit whose changed rows all lie on the root paths of
    /// `ra` and `rb`. The path from `ra` stops below their common ancestor; the
    /// path from `rb` runs to the root and yields the segment cost.
    pub fn eval_move(&self, tree: &mut Tree, ra: NodeId, rb: NodeId) -> Cost {
        let stop = tree.lca(ra, rb);
        let mut total = Cost::ZERO;
        for (s, w) in self.weighted_segments() {
            self.eval_uptree(tree, ra, Some(stop), s);
            total = total + self.eval_uptree(tree, rb, None, s).weighted(w);
        }
        total
    }

    /// Snapshot the rows on `from`'s root path for every weighted segment.
    pub fn store_cost_uptree(&self, tree: &mut Tree, from: NodeId) {
        let path: Vec<NodeId> = tree.path_to_root(from).collect();
        let cache = tree.cache_mut();
        for id in path {
            for (s, _) in self.weighted_segments() {
                cache.store(id, s);
            }
        }
    }

    /// Bring back the rows saved by [`Sankoff::store_cost_uptree`] along
    /// `from`'s current root path.
    pub fn restore_cost_uptree(&self, tree: &mut Tree, from: NodeId) {
        let path: Vec<NodeId> = tree.path_to_root(from).collect();
        let cache = tree.cache_mut();
        for id in path {
            for (s, _) in self.weighted_segments() {
                cache.restore(id, s);
            }
        }
    }

    /// Cost of one segment as currently cached at the root.
    pub fn segment_cost(&self, tree: &Tree, segment: usize) -> Cost {
        tree.cache().row(tree.root(), segment).iter().copied().min().unwrap_or(Cost::INFINITE)
    }

    fn eval_node(&self, tree: &mut Tree, id: NodeId, s: usize) -> Cost {
        let Some((l, r)) = tree.node(id).children() else {
            let row = tree.cache_mut().row_mut(id, s);
            row.fill(Cost::INFINITE);
            row[id] = Cost::ZERO;
            return Cost::ZERO;
        };

        let mut best = Cost::INFINITE;
        for i in 0..self.matrix.leaves() {
            let c = if self.matrix.is_unique(i, s) {
                self.contribution(tree, l, i, s) + self.contribution(tree, r, i, s)
            } else {
                Cost::INFINITE
            };
            tree.cache_mut().row_mut(id, s)[i] = c;
            best = best.min(c);
        }
        best
    }

    /// Cost of deriving child `c`'s subtree from a parent holding witness `i`.
    fn contribution(&self, tree: &Tree, c: NodeId, i: usize, s: usize) -> Cost {
        if tree.is_leaf(c) {
            if self.empty_is_missing && self.matrix.is_empty(c, s) {
                return Cost::ZERO;
            }
            return Cost::from(self.matrix.pair_cost(i, c, s));
        }
        let row = tree.cache().row(c, s);
        let pair = self.matrix.pair_row(i, s);
        let unique = self.matrix.unique_row(s);
        row.iter()
            .zip(pair)
            .zip(unique)
            .filter(|(_, u)| **u)
            .map(|((&cost, &p), _)| cost + Cost::from(p))
            .min()
            .unwrap_or(Cost::INFINITE)
    }
}
