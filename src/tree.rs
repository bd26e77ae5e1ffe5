//! Arena-backed binary stemma over witness leaves.
//!
//! Nodes live in one `Vec` and are addressed by id: leaves are `0..leaf_count`,
//! internal nodes `leaf_count..2 * leaf_count - 1`. Parent and child links are
//! ids, so the id→node lookup is the arena index itself and there are no
//! ownership cycles. The tree also owns the evaluator's cost cache; cloning a
//! tree deep-copies both as a unit.

use rand::Rng;

use crate::cache::CostCache;
use crate::cost::Cost;
use crate::error::{Result, StemmaError};

pub type NodeId = usize;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub left: Option<NodeId>,
    pub right: Option<NodeId>,
    /// Per segment, the leaf whose text best stands for this node.
    pub fill: Vec<usize>,
}

impl Node {
    fn new(id: NodeId, segments: usize, fill: usize) -> Self {
        Self { id, parent: None, left: None, right: None, fill: vec![fill; segments] }
    }

    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    pub fn children(&self) -> Option<(NodeId, NodeId)> {
        Some((self.left?, self.right?))
    }
}

#[derive(Clone, Debug)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
    leaf_count: usize,
    segments: usize,
    cache: CostCache,
}

impl Tree {
    /// A random binary tree over leaves `0..leaf_count`.
    ///
    /// Leaves are drawn one at a time in random order. The first hangs as the
    /// right child of a fresh internal root, the second fills the root's free
    /// left slot, and every later leaf gets a new internal parent that adopts
    /// the current root as its right child and becomes the root.
    pub fn random<R: Rng + ?Sized>(leaf_count: usize, segments: usize, rng: &mut R) -> Result<Self> {
        if leaf_count == 0 {
            return Err(StemmaError::EmptyCorpus);
        }
        if leaf_count == 1 {
            let nodes = vec![Node::new(0, segments, 0)];
            let cache = CostCache::new(1, 1, segments)?;
            return Ok(Self { nodes, root: 0, leaf_count, segments, cache });
        }

        let node_count = 2 * leaf_count - 1;
        let mut nodes: Vec<Node> = (0..node_count)
            .map(|id| Node::new(id, segments, if id < leaf_count { id } else { 0 }))
            .collect();
        let mut pool: Vec<usize> = (0..leaf_count).collect();
        let mut next_internal = leaf_count;
        let mut root: Option<NodeId> = None;

        for i in 0..leaf_count {
            let pick = rng.random_range(0..leaf_count - i);
            let leaf = pool[pick];
            pool[pick] = pool[leaf_count - i - 1];

            match root {
                None => {
                    let up = next_internal;
                    next_internal += 1;
                    nodes[up].right = Some(leaf);
                    nodes[leaf].parent = Some(up);
                    root = Some(up);
                }
                Some(r) if nodes[r].left.is_none() => {
                    nodes[r].left = Some(leaf);
                    nodes[leaf].parent = Some(r);
                }
                Some(r) => {
                    let up = next_internal;
                    next_internal += 1;
                    nodes[up].left = Some(leaf);
                    nodes[up].right = Some(r);
                    nodes[leaf].parent = Some(up);
                    nodes[r].parent = Some(up);
                    root = Some(up);
                }
            }
        }

        let root = root.unwrap_or(0);
        let cache = CostCache::new(node_count, leaf_count, segments)?;
        Ok(Self { nodes, root, leaf_count, segments, cache })
    }

    /// Build a tree from explicit children: `children[k]` holds the two
    /// children of internal node `leaf_count + k`.
    pub fn from_children(leaf_count: usize, segments: usize, children: &[(NodeId, NodeId)]) -> Result<Self> {
        if leaf_count == 0 {
            return Err(StemmaError::EmptyCorpus);
        }
        let node_count = leaf_count + children.len();
        let mut nodes: Vec<Node> = (0..node_count)
            .map(|id| Node::new(id, segments, if id < leaf_count { id } else { 0 }))
            .collect();
        for (k, &(l, r)) in children.iter().enumerate() {
            let id = leaf_count + k;
            if l >= node_count || r >= node_count || nodes[l].parent.is_some() || nodes[r].parent.is_some() {
                return Err(StemmaError::Invariant(format!("node {id} has an invalid child pair ({l}, {r})")));
            }
            nodes[id].left = Some(l);
            nodes[id].right = Some(r);
            nodes[l].parent = Some(id);
            nodes[r].parent = Some(id);
        }
        let root = nodes
            .iter()
            .find(|n| n.parent.is_none())
            .map(|n| n.id)
            .ok_or_else(|| StemmaError::Invariant("tree has no root".to_string()))?;
        let cache = CostCache::new(node_count, leaf_count, segments)?;
        let tree = Self { nodes, root, leaf_count, segments, cache };
        tree.validate()?;
        Ok(tree)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn segments(&self) -> usize {
        self.segments
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    #[inline]
    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.nodes[id].is_leaf()
    }

    pub fn cache(&self) -> &CostCache {
        &self.cache
    }

    pub(crate) fn cache_mut(&mut self) -> &mut CostCache {
        &mut self.cache
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub(crate) fn set_root(&mut self, id: NodeId) {
        self.root = id;
    }

    /// The other child of `id`'s parent.
    pub fn sibling(&self, id: NodeId) -> Option<NodeId> {
        let (l, r) = self.nodes[self.parent(id)?].children()?;
        Some(if l == id { r } else { l })
    }

    /// Point whichever child slot of `parent` holds `old` at `new`.
    pub(crate) fn replace_child(&mut self, parent: NodeId, old: NodeId, new: NodeId) {
        let node = &mut self.nodes[parent];
        if node.left == Some(old) {
            node.left = Some(new);
        } else {
            node.right = Some(new);
        }
    }

    /// Edges between `id` and the root.
    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).count()
    }

    /// Proper ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&n| self.parent(n))
    }

    /// `id` followed by its ancestors up to the root.
    pub fn path_to_root(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(id), move |&n| self.parent(n))
    }

    /// True when one node lies on the other's root path (or they are equal).
    pub fn same_branch(&self, a: NodeId, b: NodeId) -> bool {
        a == b || self.ancestors(a).any(|n| n == b) || self.ancestors(b).any(|n| n == a)
    }

    /// Lowest common ancestor.
    ///
    /// Both nodes belong to this tree, so the walk always meets at the root at
    /// the latest.
    pub fn lca(&self, a: NodeId, b: NodeId) -> NodeId {
        let (mut a, mut b) = (a, b);
        let (mut da, mut db) = (self.depth(a), self.depth(b));
        while da > db {
            a = self.up(a);
            da -= 1;
        }
        while db > da {
            b = self.up(b);
            db -= 1;
        }
        while a != b {
            a = self.up(a);
            b = self.up(b);
        }
        a
    }

    fn up(&self, id: NodeId) -> NodeId {
        match self.nodes[id].parent {
            Some(p) => p,
            None => unreachable!("walked above the root from node {id}"),
        }
    }

    /// Nodes in pre-order (root first, then left and right subtrees).
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            order.push(id);
            if let Some((l, r)) = self.nodes[id].children() {
                stack.push(r);
                stack.push(l);
            }
        }
        order
    }

    /// Nodes in post-order (children before parents).
    pub fn postorder(&self) -> Vec<NodeId> {
        let mut order = self.preorder_right_first();
        order.reverse();
        order
    }

    fn preorder_right_first(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            order.push(id);
            if let Some((l, r)) = self.nodes[id].children() {
                stack.push(l);
                stack.push(r);
            }
        }
        order
    }

    /// Check the structural invariants of a full binary tree over the leaves.
    pub fn validate(&self) -> Result<()> {
        let expected = 2 * self.leaf_count - 1;
        if self.nodes.len() != expected {
            return Err(StemmaError::Invariant(format!(
                "{} nodes for {} leaves, expected {expected}",
                self.nodes.len(),
                self.leaf_count
            )));
        }
        let roots: Vec<NodeId> = self.nodes.iter().filter(|n| n.parent.is_none()).map(|n| n.id).collect();
        if roots != [self.root] {
            return Err(StemmaError::Invariant(format!("parentless nodes {roots:?}, root is {}", self.root)));
        }
        for node in &self.nodes {
            let leaf = node.id < self.leaf_count;
            match (leaf, node.left, node.right) {
                (true, None, None) => {}
                (false, Some(l), Some(r)) => {
                    if self.nodes[l].parent != Some(node.id) || self.nodes[r].parent != Some(node.id) {
                        return Err(StemmaError::Invariant(format!("children of {} do not point back", node.id)));
                    }
                }
                _ => {
                    return Err(StemmaError::Invariant(format!("node {} has the wrong number of children", node.id)));
                }
            }
        }
        if self.preorder().len() != self.nodes.len() {
            return Err(StemmaError::Invariant("not every node is reachable from the root".to_string()));
        }
        Ok(())
    }

    /// Freeze structure and fills together with their cost.
    pub fn snapshot(&self, cost: Cost) -> ScoredTree {
        ScoredTree {
            nodes: self.nodes.clone(),
            root: self.root,
            leaf_count: self.leaf_count,
            segments: self.segments,
            cost,
        }
    }
}

/// A finished stemma: structure, ancestral fills and total cost, without the
/// evaluator's working memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScoredTree {
    pub nodes: Vec<Node>,
    pub root: NodeId,
    pub leaf_count: usize,
    pub segments: usize,
    pub cost: Cost,
}

impl ScoredTree {
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        id < self.leaf_count
    }

    /// Height of the subtree under `id` (a leaf has height 1).
    pub fn height(&self, id: NodeId) -> usize {
        match self.nodes[id].children() {
            Some((l, r)) => 1 + self.height(l).max(self.height(r)),
            None => 1,
        }
    }

    /// Children with the taller subtree first, for drawing.
    pub fn display_children(&self, id: NodeId) -> Option<(NodeId, NodeId)> {
        let (l, r) = self.nodes[id].children()?;
        Some(if self.height(l) < self.height(r) { (r, l) } else { (l, r) })
    }

    /// `(parent, child)` pairs, in-order (left subtree, own edge, right subtree).
    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        let mut out = Vec::with_capacity(self.nodes.len().saturating_sub(1));
        self.collect_edges(self.root, &mut out);
        out
    }

    fn collect_edges(&self, id: NodeId, out: &mut Vec<(NodeId, NodeId)>) {
        let node = &self.nodes[id];
        if let Some(l) = node.left {
            self.collect_edges(l, out);
        }
        if let Some(p) = node.parent {
            out.push((p, id));
        }
        if let Some(r) = node.right {
            self.collect_edges(r, out);
        }
    }

    /// Leaves under `id`.
    pub fn leaves_under(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            match self.nodes[n].children() {
                Some((l, r)) => {
                    stack.push(r);
                    stack.push(l);
                }
                None => out.push(n),
            }
        }
        out
    }
}
