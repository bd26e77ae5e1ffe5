//! Local tree edits for the annealer.
//!
//! Two kinds of edit alternate: a *swap* exchanges two subtrees between their
//! parents, a *regraft* cuts a subtree out (its former parent collapses into the
//! sibling) and re-inserts it as the sibling of another node, reusing the
//! freed parent. Both keep the node count and the full-binary shape.
//!
//! `apply` records the links it overwrites so a rejected edit can be undone
//! exactly, pointer for pointer.

use rand::Rng;

use crate::tree::{NodeId, Tree};

/// Random draws before falling back to enumerating every valid pair.
const DRAWS_PER_NODE: usize = 64;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MoveKind {
    Swap,
    Regraft,
}

impl MoveKind {
    pub fn other(self) -> Self {
        match self {
            MoveKind::Swap => MoveKind::Regraft,
            MoveKind::Regraft => MoveKind::Swap,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Proposal {
    pub kind: MoveKind,
    pub a: NodeId,
    pub b: NodeId,
}

impl Proposal {
    /// Whether the edit is well-defined on `tree`.
    ///
    /// Neither node may be the root, lie on the other's root path, or share its
    /// parent. A regraft also needs both parents to have parents themselves, so
    /// the collapsed parent always has a grandparent to hand its sibling to.
    pub fn is_valid(&self, tree: &Tree) -> bool {
        let (a, b) = (self.a, self.b);
        let (Some(pa), Some(pb)) = (tree.parent(a), tree.parent(b)) else {
            return false;
        };
        if a == b || pa == pb || tree.same_branch(a, b) {
            return false;
        }
        match self.kind {
            MoveKind::Swap => true,
            MoveKind::Regraft => tree.parent(pa).is_some() && tree.parent(pb).is_some(),
        }
    }
}

/// Draw a valid proposal of `kind`, or `None` when the tree admits none.
pub fn propose<R: Rng + ?Sized>(tree: &Tree, kind: MoveKind, rng: &mut R) -> Option<Proposal> {
    let n = tree.node_count();
    if n < 2 {
        return None;
    }

    for _ in 0..DRAWS_PER_NODE * n {
        let a = rng.random_range(0..n);
        let mut b = rng.random_range(0..n - 1);
        if b >= a {
            b += 1;
        }
        let p = Proposal { kind, a, b };
        if p.is_valid(tree) {
            return Some(p);
        }
    }

    let valid: Vec<Proposal> = (0..n)
        .flat_map(|a| (0..n).map(move |b| Proposal { kind, a, b }))
        .filter(|p| p.is_valid(tree))
        .collect();
    if valid.is_empty() {
        None
    } else {
        Some(valid[rng.random_range(0..valid.len())])
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Links {
    parent: Option<NodeId>,
    left: Option<NodeId>,
    right: Option<NodeId>,
}

/// What an applied edit overwrote, plus where incremental scoring starts.
#[derive(Clone, Debug)]
pub struct MoveDiff {
    saved: Vec<(NodeId, Links)>,
    root: NodeId,
    /// The two nodes whose root paths cover every changed row.
    pub endpoints: (NodeId, NodeId),
}

impl MoveDiff {
    fn capture(tree: &Tree, touched: &[NodeId], endpoints: (NodeId, NodeId)) -> Self {
        let mut saved: Vec<(NodeId, Links)> = Vec::with_capacity(touched.len());
        for &id in touched {
            if saved.iter().any(|&(s, _)| s == id) {
                continue;
            }
            let node = tree.node(id);
            saved.push((id, Links { parent: node.parent, left: node.left, right: node.right }));
        }
        Self { saved, root: tree.root(), endpoints }
    }
}

/// Apply a valid proposal in place.
pub fn apply(tree: &mut Tree, p: Proposal) -> MoveDiff {
    debug_assert!(p.is_valid(tree), "applying invalid {p:?}");
    match p.kind {
        MoveKind::Swap => swap(tree, p.a, p.b),
        MoveKind::Regraft => regraft(tree, p.a, p.b),
    }
}

/// Undo an edit, restoring every overwritten link and the root.
pub fn revert(tree: &mut Tree, diff: &MoveDiff) {
    for &(id, links) in &diff.saved {
        let node = tree.node_mut(id);
        node.parent = links.parent;
        node.left = links.left;
        node.right = links.right;
    }
    tree.set_root(diff.root);
}

fn parent_of(tree: &Tree, id: NodeId) -> NodeId {
    match tree.parent(id) {
        Some(p) => p,
        None => unreachable!("move endpoint {id} has no parent"),
    }
}

fn swap(tree: &mut Tree, a: NodeId, b: NodeId) -> MoveDiff {
    let pa = parent_of(tree, a);
    let pb = parent_of(tree, b);
    let diff = MoveDiff::capture(tree, &[a, b, pa, pb], (a, b));

    tree.replace_child(pa, a, b);
    tree.replace_child(pb, b, a);
    tree.node_mut(a).parent = Some(pb);
    tree.node_mut(b).parent = Some(pa);
    diff
}

fn regraft(tree: &mut Tree, a: NodeId, b: NodeId) -> MoveDiff {
    let pa = parent_of(tree, a);
    let gp = parent_of(tree, pa);
    let sibling = match tree.sibling(a) {
        Some(s) => s,
        None => unreachable!("node {a} has no sibling"),
    };
    let pb = parent_of(tree, b);
    let diff = MoveDiff::capture(tree, &[a, b, pa, gp, sibling, pb], (a, sibling));

    // the sibling takes the collapsed parent's place
    tree.replace_child(gp, pa, sibling);
    tree.node_mut(sibling).parent = Some(gp);

    // the freed parent goes into b's slot, holding b and a
    tree.replace_child(pb, b, pa);
    let freed = tree.node_mut(pa);
    freed.parent = Some(pb);
    freed.left = Some(b);
    freed.right = Some(a);
    tree.node_mut(b).parent = Some(pa);
    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    ///            8
    ///          /   \
    ///         7     6
    ///        / \   / \
    ///       5   2 3   4
    ///      / \
    ///     0   1
    fn sample() -> Tree {
        Tree::from_children(5, 1, &[(0, 1), (3, 4), (5, 2), (7, 6)]).unwrap()
    }

    fn links(tree: &Tree) -> Vec<(Option<NodeId>, Option<NodeId>, Option<NodeId>)> {
        tree.nodes().iter().map(|n| (n.parent, n.left, n.right)).collect()
    }

    #[test]
    fn validity_rules() {
        let tree = sample();
        let swap = |a, b| Proposal { kind: MoveKind::Swap, a, b }.is_valid(&tree);
        let regraft = |a, b| Proposal { kind: MoveKind::Regraft, a, b }.is_valid(&tree);
        assert!(!swap(8, 3), "root");
        assert!(!swap(0, 7), "same branch");
        assert!(!swap(3, 4), "shared parent");
        assert!(swap(0, 3));
        assert!(swap(2, 6));
        assert!(regraft(0, 3));
        assert!(regraft(2, 3));
        assert!(swap(6, 0));
        assert!(!regraft(6, 0), "6 hangs from the root");
        assert!(!regraft(0, 6), "target hangs from the root");
    }

    #[test]
    fn swap_exchanges_parents() {
        let mut tree = sample();
        apply(&mut tree, Proposal { kind: MoveKind::Swap, a: 0, b: 4 });
        tree.validate().unwrap();
        assert_eq!(tree.parent(0), Some(6));
        assert_eq!(tree.parent(4), Some(5));
        assert_eq!(tree.node(5).left, Some(4));
        assert_eq!(tree.node(6).right, Some(0));
    }

    #[test]
    fn regraft_moves_subtree_next_to_target() {
        let mut tree = sample();
        let diff = apply(&mut tree, Proposal { kind: MoveKind::Regraft, a: 0, b: 3 });
        tree.validate().unwrap();
        // 1 replaces 5 under 7; 5 now holds (3, 0) under 6
        assert_eq!(tree.parent(1), Some(7));
        assert_eq!(tree.node(5).children(), Some((3, 0)));
        assert_eq!(tree.parent(5), Some(6));
        assert_eq!(diff.endpoints, (0, 1));
        assert_eq!(tree.root(), 8);
    }

    #[test]
    fn regraft_next_to_parent_sibling() {
        let mut tree = sample();
        apply(&mut tree, Proposal { kind: MoveKind::Regraft, a: 0, b: 2 });
        tree.validate().unwrap();
        assert_eq!(tree.node(7).children(), Some((1, 5)));
        assert_eq!(tree.node(5).children(), Some((2, 0)));
    }

    #[test]
    fn revert_restores_every_link() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut tree = Tree::random(9, 1, &mut rng).unwrap();
        let mut kind = MoveKind::Swap;
        for _ in 0..200 {
            let before = links(&tree);
            let root = tree.root();
            let p = propose(&tree, kind, &mut rng).unwrap();
            let diff = apply(&mut tree, p);
            tree.validate().unwrap();
            revert(&mut tree, &diff);
            assert_eq!(links(&tree), before);
            assert_eq!(tree.root(), root);
            kind = kind.other();
        }
    }

    #[test]
    fn no_proposal_on_tiny_trees() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let two = Tree::random(2, 1, &mut rng).unwrap();
        assert!(propose(&two, MoveKind::Swap, &mut rng).is_none());
        let three = Tree::random(3, 1, &mut rng).unwrap();
        assert!(propose(&three, MoveKind::Regraft, &mut rng).is_none());
        assert!(propose(&three, MoveKind::Swap, &mut rng).is_some());
        let one = Tree::random(1, 1, &mut rng).unwrap();
        assert!(propose(&one, MoveKind::Swap, &mut rng).is_none());
    }
}
