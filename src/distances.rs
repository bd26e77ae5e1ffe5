//! Topological comparison of stemmata.
//!
//! Replicates of one bootstrap run are compared pairwise, and optionally each
//! against a reference stemma, with two clade metrics:
//!
//! 1. **Robinson-Foulds (RF)**: the number of splits present in one tree but
//!    not the other, plus 2 when both trees are rooted at different places.
//!
//! 2. **Weighted Robinson-Foulds**: shared splits add `|length_a - length_b|`,
//!    unshared splits add their full length. For stemmata the length of a
//!    branch is its edge label, the summed derivation cost along it.

use phylotree::tree::Tree as PhyloTree;
use rayon::prelude::*;
use tracing::debug;

use crate::error::{Result, StemmaError};
use crate::snapshot::TreeSnapshot;

/// RF distance between two parsed trees.
///
/// ```text
/// Tree 1:  ((A,B),(C,D))     splits: {C,D}
/// Tree 2:  ((A,C),(B,D))     splits: {B,D}
///
/// RF = 1 + 1 - 2*0 = 2, plus 2 for the different root placement
/// ```
pub fn robinson_foulds(tree_a: &PhyloTree, tree_b: &PhyloTree) -> Result<usize> {
    let snap_a = TreeSnapshot::from_tree(tree_a)?;
    let snap_b = TreeSnapshot::from_tree(tree_b)?;
    ensure_same_leaves(&snap_a, &snap_b)?;
    Ok(rf_from_snapshots(&snap_a, &snap_b))
}

/// RF from two snapshots over the same leaves: `|A| + |B| - 2|A ∩ B|`.
pub fn rf_from_snapshots(a: &TreeSnapshot, b: &TreeSnapshot) -> usize {
    let inter = a.parts.intersection(&b.parts).count();
    let rf = a.parts.len() + b.parts.len() - 2 * inter;
    let same_root = a.root_children == b.root_children;
    if a.rooted && b.rooted && rf != 0 && !same_root { rf + 2 } else { rf }
}

pub fn weighted_robinson_foulds(tree_a: &PhyloTree, tree_b: &PhyloTree) -> Result<f64> {
    let snap_a = TreeSnapshot::from_tree(tree_a)?;
    let snap_b = TreeSnapshot::from_tree(tree_b)?;
    ensure_same_leaves(&snap_a, &snap_b)?;
    Ok(weighted_rf_from_snapshots(&snap_a, &snap_b))
}

pub fn weighted_rf_from_snapshots(a: &TreeSnapshot, b: &TreeSnapshot) -> f64 {
    let mut distance = 0.0;

    for part in &a.parts {
        let length_a = a.lengths.get(part).unwrap_or(&0.0);
        match b.lengths.get(part) {
            Some(length_b) => distance += (length_a - length_b).abs(),
            None => distance += length_a,
        }
    }
    for part in &b.parts {
        if !a.parts.contains(part) {
            distance += b.lengths.get(part).unwrap_or(&0.0);
        }
    }

    distance
}

fn ensure_same_leaves(a: &TreeSnapshot, b: &TreeSnapshot) -> Result<()> {
    if a.same_leaves(b) {
        Ok(())
    } else {
        Err(StemmaError::Phylo(format!(
            "trees cover different witnesses: [{}] vs [{}]",
            a.leaves.join(","),
            b.leaves.join(",")
        )))
    }
}

/// Snapshot every replicate and check they all cover the same witnesses.
pub fn replicate_snapshots<S: AsRef<str> + Sync>(newicks: &[S]) -> Result<Vec<TreeSnapshot>> {
    let snaps: Vec<TreeSnapshot> =
        newicks.par_iter().map(|nwk| TreeSnapshot::from_newick(nwk.as_ref())).collect::<Result<_>>()?;
    if let Some(first) = snaps.first() {
        snaps.iter().skip(1).try_for_each(|s| ensure_same_leaves(first, s))?;
    }
    Ok(snaps)
}

/// Symmetric matrix of `metric` over all pairs, computed in parallel.
fn pairwise<T, F>(snaps: &[TreeSnapshot], zero: T, metric: F) -> Vec<Vec<T>>
where
    T: Copy + Send,
    F: Fn(&TreeSnapshot, &TreeSnapshot) -> T + Sync,
{
    let n = snaps.len();
    debug!("Comparing {} stemma pairs.", n * n.saturating_sub(1) / 2);
    let pairs: Vec<(usize, usize, T)> = (0..n)
        .into_par_iter()
        .flat_map_iter(|i| (i + 1..n).map(move |j| (i, j)))
        .map(|(i, j)| (i, j, metric(&snaps[i], &snaps[j])))
        .collect();

    let mut mat = vec![vec![zero; n]; n];
    for (i, j, d) in pairs {
        mat[i][j] = d;
        mat[j][i] = d;
    }
    mat
}

pub fn pairwise_rf(snaps: &[TreeSnapshot]) -> Vec<Vec<usize>> {
    pairwise(snaps, 0, rf_from_snapshots)
}

pub fn pairwise_weighted_rf(snaps: &[TreeSnapshot]) -> Vec<Vec<f64>> {
    pairwise(snaps, 0.0, weighted_rf_from_snapshots)
}

/// Distance of one replicate from the reference stemma.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReferenceDistance {
    pub rf: usize,
    pub weighted_rf: f64,
}

/// Compare each replicate with a reference tree over the same witness names.
pub fn against_reference(snaps: &[TreeSnapshot], reference: &TreeSnapshot) -> Result<Vec<ReferenceDistance>> {
    snaps
        .par_iter()
        .map(|s| {
            ensure_same_leaves(s, reference)?;
            Ok(ReferenceDistance {
                rf: rf_from_snapshots(s, reference),
                weighted_rf: weighted_rf_from_snapshots(s, reference),
            })
        })
        .collect()
}
