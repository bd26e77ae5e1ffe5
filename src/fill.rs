//! Ancestral fill: which witness best stands for each node, per segment.
//!
//! Runs top-down on a fully evaluated tree. The root picks the witness that
//! minimizes `SelfCost[i] + cost[root][i]`; every other node picks the one
//! minimizing `PairCost[fill(parent)][i] + cost[n][i]`. Ties go to the lowest
//! witness index. Segments with zero weight keep their previous fill.

use crate::cost::Cost;
use crate::matrix::CostMatrix;
use crate::parsimony::Sankoff;
use crate::tree::{Node, Tree};

pub fn assign_fill(sankoff: &Sankoff<'_>, tree: &mut Tree) {
    let matrix = sankoff.matrix();
    for id in tree.preorder() {
        let parent = tree.parent(id);
        for (s, _) in sankoff.weighted_segments() {
            let row = tree.cache().row(id, s);
            let from = parent.map(|p| tree.node(p).fill[s]);
            let mut best: Option<(usize, Cost)> = None;
            for (i, &below) in row.iter().enumerate() {
                let above = match from {
                    Some(f) => matrix.pair_cost(f, i, s),
                    None => matrix.self_cost(i, s),
                };
                let c = Cost::from(above) + below;
                if best.is_none_or(|(_, b)| c < b) {
                    best = Some((i, c));
                }
            }
            if let Some((i, _)) = best {
                tree.node_mut(id).fill[s] = i;
            }
        }
    }
}

/// Transformation cost along the edge `a`–`b`: per weighted segment, the
/// cheaper direction between the two fills.
pub fn edge_label(matrix: &CostMatrix, weights: &[u32], a: &Node, b: &Node) -> u64 {
    weights
        .iter()
        .enumerate()
        .filter(|&(_, &w)| w > 0)
        .map(|(s, _)| {
            let (fa, fb) = (a.fill[s], b.fill[s]);
            u64::from(matrix.pair_cost(fa, fb, s).min(matrix.pair_cost(fb, fa, s)))
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix() -> CostMatrix {
        CostMatrix::from_tables(
            vec![vec![10, 10], vec![12, 10], vec![30, 10]],
            vec![
                vec![vec![0, 0], vec![2, 1], vec![9, 7]],
                vec![vec![3, 1], vec![0, 0], vec![9, 7]],
                vec![vec![9, 7], vec![9, 7], vec![0, 0]],
            ],
            vec![vec![false; 2]; 3],
            vec![vec![true; 2]; 3],
        )
        .unwrap()
    }

    #[test]
    fn leaves_fill_themselves() {
        let m = matrix();
        let w = [1, 1];
        let sankoff = Sankoff::new(&m, &w, false).unwrap();
        let mut tree = Tree::from_children(3, 2, &[(0, 1), (3, 2)]).unwrap();
        sankoff.eval_tree(&mut tree);
        assign_fill(&sankoff, &mut tree);
        for leaf in 0..3 {
            assert_eq!(tree.node(leaf).fill, vec![leaf, leaf]);
        }
    }

    #[test]
    fn root_prefers_cheap_self_cost() {
        let m = matrix();
        let w = [1, 0];
        let sankoff = Sankoff::new(&m, &w, false).unwrap();
        let mut tree = Tree::from_children(3, 2, &[(0, 1), (3, 2)]).unwrap();
        sankoff.eval_tree(&mut tree);
        assign_fill(&sankoff, &mut tree);
        // root row for segment 0 is [11, 12, 11]; self costs break it towards 0
        assert_eq!(tree.node(4).fill[0], 0);
        assert_eq!(tree.node(3).fill[0], 0);
        // zero-weight segment untouched
        assert_eq!(tree.node(4).fill[1], 0);
    }

    #[test]
    fn edge_label_takes_cheaper_direction() {
        let m = matrix();
        let mut a = Tree::from_children(3, 2, &[(0, 1), (3, 2)]).unwrap().node(0).clone();
        let b = Tree::from_children(3, 2, &[(0, 1), (3, 2)]).unwrap().node(1).clone();
        assert_eq!(edge_label(&m, &[1, 1], &a, &b), 2 + 1);
        assert_eq!(edge_label(&m, &[0, 3], &a, &b), 1);
        a.fill = vec![1, 1];
        assert_eq!(edge_label(&m, &[1, 1], &a, &b), 0);
    }
}
