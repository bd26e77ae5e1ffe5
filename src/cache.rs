//! Per-node Sankoff cost rows, with a scratch half for cheap rollback.
//!
//! The table holds `2 × nodes × segments × leaves` costs. Slot `id` is the live
//! row of node `id`; slot `nodes + id` is its snapshot. Rows are contiguous in
//! the leaf dimension because the evaluator fills one `(node, segment)` row at a
//! time.

use crate::cost::Cost;
use crate::error::Result;
use crate::matrix::try_alloc;
use crate::tree::NodeId;

#[derive(Clone, Debug)]
pub struct CostCache {
    data: Vec<Cost>,
    nodes: usize,
    leaves: usize,
    segments: usize,
}

impl CostCache {
    pub fn new(nodes: usize, leaves: usize, segments: usize) -> Result<Self> {
        let mut data = try_alloc::<Cost>(2 * nodes * segments * leaves, "cost cache")?;
        data.fill(Cost::INFINITE);
        Ok(Self { data, nodes, leaves, segments })
    }

    pub fn leaves(&self) -> usize {
        self.leaves
    }

    pub fn segments(&self) -> usize {
        self.segments
    }

    #[inline]
    fn offset(&self, slot: usize, segment: usize) -> usize {
        (slot * self.segments + segment) * self.leaves
    }

    /// Live row of `id` for `segment`, indexed by candidate leaf.
    #[inline]
    pub fn row(&self, id: NodeId, segment: usize) -> &[Cost] {
        let start = self.offset(id, segment);
        &self.data[start..start + self.leaves]
    }

    #[inline]
    pub fn row_mut(&mut self, id: NodeId, segment: usize) -> &mut [Cost] {
        let start = self.offset(id, segment);
        &mut self.data[start..start + self.leaves]
    }

    /// Snapshot row of `id` for `segment`.
    #[inline]
    pub fn scratch_row(&self, id: NodeId, segment: usize) -> &[Cost] {
        let start = self.offset(self.nodes + id, segment);
        &self.data[start..start + self.leaves]
    }

    /// Copy the live row into the snapshot slot.
    #[inline]
    pub fn store(&mut self, id: NodeId, segment: usize) {
        let src = self.offset(id, segment);
        let dst = self.offset(self.nodes + id, segment);
        self.data.copy_within(src..src + self.leaves, dst);
    }

    /// Copy the snapshot slot back over the live row.
    #[inline]
    pub fn restore(&mut self, id: NodeId, segment: usize) {
        let src = self.offset(self.nodes + id, segment);
        let dst = self.offset(id, segment);
        self.data.copy_within(src..src + self.leaves, dst);
    }

    /// The live half only, for comparisons in tests and debugging.
    pub fn live(&self) -> &[Cost] {
        &self.data[..self.nodes * self.segments * self.leaves]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_then_restore_round_trips() {
        let mut cache = CostCache::new(3, 2, 2).unwrap();
        cache.row_mut(1, 1).copy_from_slice(&[Cost::new(4), Cost::new(9)]);
        cache.store(1, 1);
        cache.row_mut(1, 1)[0] = Cost::new(100);
        assert_eq!(cache.scratch_row(1, 1), &[Cost::new(4), Cost::new(9)]);
        cache.restore(1, 1);
        assert_eq!(cache.row(1, 1), &[Cost::new(4), Cost::new(9)]);
    }

    #[test]
    fn rows_do_not_overlap() {
        let mut cache = CostCache::new(2, 3, 2).unwrap();
        cache.row_mut(0, 1).fill(Cost::new(1));
        cache.row_mut(1, 0).fill(Cost::new(2));
        assert!(cache.row(0, 0).iter().all(|c| !c.is_finite()));
        assert!(cache.row(0, 1).iter().all(|&c| c == Cost::new(1)));
        assert!(cache.row(1, 0).iter().all(|&c| c == Cost::new(2)));
        assert!(cache.row(1, 1).iter().all(|c| !c.is_finite()));
        assert_eq!(cache.live().len(), 2 * 3 * 2);
    }
}
