//! Clade snapshots of stemmata for tree comparison.
//!
//! A snapshot keeps, for every internal branch of a tree, the leaf set it cuts
//! off together with the branch length. Leaves are indexed by *name* in sorted
//! order, never by parser node id, so a replicate stemma and a reference
//! stemma parsed from different files line up.
//!
//! Each split `{X}|{Y}` is stored once, as the side that does not hold leaf 0:
//!
//! ```text
//!        root
//!       /    \
//!     n1      n2          n1 = {A,B} (holds A = leaf 0)  →  stored as {C,D}
//!    /  \    /  \         n2 = {C,D}                      →  stored as {C,D}
//!   A    B  C    D
//! ```

use std::collections::{HashMap, HashSet};

use phylotree::tree::{Tree as PhyloTree, TreeError};

use crate::bitset::Bitset;
use crate::error::{Result, StemmaError};

fn phylo(e: TreeError) -> StemmaError {
    StemmaError::Phylo(e.to_string())
}

#[derive(Debug, Clone)]
pub struct TreeSnapshot {
    /// Leaf names in bit order.
    pub leaves: Vec<String>,
    /// Canonical non-trivial splits.
    pub parts: HashSet<Bitset>,
    /// Branch length per canonical split; missing lengths count as 0. The two
    /// root edges of a rooted tree add up to a single branch.
    pub lengths: HashMap<Bitset, f64>,
    /// Leaf sets directly under the root, sorted, to tell root placements apart.
    pub root_children: Vec<Bitset>,
    pub rooted: bool,
}

impl TreeSnapshot {
    pub fn from_newick(newick: &str) -> Result<Self> {
        let tree = PhyloTree::from_newick(newick).map_err(|e| StemmaError::Newick(e.to_string()))?;
        Self::from_tree(&tree)
    }

    /// Snapshot a parsed tree. Every leaf must carry a distinct name.
    pub fn from_tree(tree: &PhyloTree) -> Result<Self> {
        let rooted = tree.is_rooted().map_err(phylo)?;

        let mut named: Vec<(String, usize)> = Vec::new();
        for id in tree.get_leaves() {
            let name = tree
                .get(&id)
                .map_err(phylo)?
                .name
                .clone()
                .ok_or_else(|| StemmaError::Phylo(format!("leaf {id} has no name")))?;
            named.push((name, id));
        }
        named.sort();
        if let Some(pair) = named.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(StemmaError::Phylo(format!("leaf name '{}' appears twice", pair[0].0)));
        }

        let n = named.len();
        let words = Bitset::words_for(n);
        let bit_of: HashMap<usize, usize> = named.iter().enumerate().map(|(bit, &(_, id))| (id, bit)).collect();

        let root = tree.get_root().map_err(phylo)?;
        let mut below: HashMap<usize, Bitset> = HashMap::new();
        clade(tree, root, &bit_of, words, &mut below)?;

        let mut parts = HashSet::with_capacity(below.len());
        let mut lengths: HashMap<Bitset, f64> = HashMap::with_capacity(below.len());
        for (&id, set) in &below {
            let size = set.count_ones();
            // a clade of one leaf, or of all but one, is a trivial split
            if id == root || size <= 1 || size + 1 >= n {
                continue;
            }
            let length = tree.get(&id).map_err(phylo)?.parent_edge.unwrap_or(0.0);
            let canonical = if set.contains(0) { set.complement(n) } else { set.clone() };
            parts.insert(canonical.clone());
            // both root edges of a rooted tree cut the same split; one branch
            *lengths.entry(canonical).or_insert(0.0) += length;
        }

        let mut root_children: Vec<Bitset> = tree
            .get(&root)
            .map_err(phylo)?
            .children
            .iter()
            .filter_map(|c| below.get(c).cloned())
            .collect();
        root_children.sort_unstable();

        Ok(Self {
            leaves: named.into_iter().map(|(name, _)| name).collect(),
            parts,
            lengths,
            root_children,
            rooted,
        })
    }

    pub fn same_leaves(&self, other: &TreeSnapshot) -> bool {
        self.leaves == other.leaves
    }
}

/// Leaf set under `id`, memoised for every visited node.
fn clade(
    tree: &PhyloTree,
    id: usize,
    bit_of: &HashMap<usize, usize>,
    words: usize,
    below: &mut HashMap<usize, Bitset>,
) -> Result<Bitset> {
    let node = tree.get(&id).map_err(phylo)?;
    let mut set = Bitset::zeros(words);
    if node.children.is_empty() {
        let bit = bit_of.get(&id).ok_or_else(|| StemmaError::Phylo(format!("leaf {id} not indexed")))?;
        set.set(*bit);
    } else {
        for child in &node.children {
            set.or_assign(&clade(tree, *child, bit_of, words, below)?);
        }
    }
    below.insert(id, set.clone());
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(leaves: usize, idx: &[usize]) -> Bitset {
        let mut b = Bitset::zeros(Bitset::words_for(leaves));
        idx.iter().for_each(|&i| b.set(i));
        b
    }

    #[test]
    fn leaves_are_ordered_by_name() {
        let snap = TreeSnapshot::from_newick("((D:1,B:1):1,(C:1,A:1):1);").unwrap();
        assert_eq!(snap.leaves, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn splits_are_canonical() {
        // (A,B) and (C,D) hang from the root: one split, stored as {C,D}
        let snap = TreeSnapshot::from_newick("((A:1,B:1):2,(C:1,D:1):3);").unwrap();
        assert_eq!(snap.parts.len(), 1);
        assert!(snap.parts.contains(&bits(4, &[2, 3])));
        assert_eq!(snap.root_children, vec![bits(4, &[0, 1]), bits(4, &[2, 3])]);
    }

    #[test]
    fn branch_lengths_follow_splits() {
        let snap = TreeSnapshot::from_newick("(A:1,(B:1,(C:1,D:1):4):5);").unwrap();
        assert_eq!(snap.lengths.get(&bits(4, &[2, 3])), Some(&4.0));
        // {B,C,D} only separates A
        assert_eq!(snap.lengths.get(&bits(4, &[1, 2, 3])), None);
        assert_eq!(snap.parts.len(), 1);
    }

    #[test]
    fn root_edges_merge_into_one_length() {
        for _ in 0..50 {
            let snap = TreeSnapshot::from_newick("((A:1,B:1):2,(C:1,D:1):3);").unwrap();
            assert_eq!(snap.lengths.get(&bits(4, &[2, 3])), Some(&5.0));
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        assert!(matches!(TreeSnapshot::from_newick("((A,B),(A,C));"), Err(StemmaError::Phylo(_))));
    }
}
