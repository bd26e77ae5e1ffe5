//! Segment cost matrix: compressed sizes as an information-distance oracle.
//!
//! For every witness `w` and segment `s` we measure `C(w_s)`, the DEFLATE size of
//! the segment alone, and for every ordered pair `(w, w')` the marginal cost
//! `C(w_s ‖ w'_s) − C(w_s)` of appending `w'`'s segment after `w`'s. The latter
//! approximates the information needed to derive `w'_s` from `w_s`, and is
//! asymmetric by construction.
//!
//! Tables are stored segment-major so the evaluator's inner loops (fixed segment,
//! varying witness) walk contiguous memory.

use std::collections::HashSet;
use std::io::Write;

use flate2::Compression;
use flate2::write::DeflateEncoder;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::NormalizeOptions;
use crate::corpus::{Corpus, SegmentText};
use crate::error::{Result, StemmaError};

/// Options that shape how costs are measured.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MatrixOptions {
    pub normalize: NormalizeOptions,
    /// Byte-identical segments get pair cost 0 without a compression call.
    pub exact_copy_is_free: bool,
}

impl Default for MatrixOptions {
    fn default() -> Self {
        Self { normalize: NormalizeOptions::default(), exact_copy_is_free: true }
    }
}

/// `SelfCost`, `PairCost`, `Empty` and `Unique` for one corpus.
#[derive(Clone, Debug)]
pub struct CostMatrix {
    leaves: usize,
    segments: usize,
    /// `[s * leaves + w]`
    self_cost: Vec<u32>,
    /// `[(s * leaves + from) * leaves + to]`
    pair_cost: Vec<u32>,
    /// `[s * leaves + w]`
    empty: Vec<bool>,
    /// `[s * leaves + w]`
    unique: Vec<bool>,
}

impl CostMatrix {
    /// Measure every segment of every witness, and every ordered pair.
    pub fn build(corpus: &Corpus, opts: &MatrixOptions) -> Result<Self> {
        let leaves = corpus.len();
        let segments = corpus.segment_count();
        if leaves == 0 {
            return Err(StemmaError::EmptyCorpus);
        }

        let texts: Vec<Vec<SegmentText>> = (0..leaves)
            .map(|w| (0..segments).map(|s| corpus.segment(w, s, &opts.normalize)).collect())
            .collect();

        let mut self_cost = try_alloc::<u32>(leaves * segments, "self-cost table")?;
        let mut pair_cost = try_alloc::<u32>(leaves * leaves * segments, "pair-cost table")?;
        let mut empty = try_alloc::<bool>(leaves * segments, "empty flags")?;

        // one independent row of measurements per source witness
        let rows: Vec<Result<MeasuredRow>> = (0..leaves)
            .into_par_iter()
            .map(|from| measure_row(&texts, from, opts.exact_copy_is_free))
            .collect();

        for (from, row) in rows.into_iter().enumerate() {
            let row = row?;
            for s in 0..segments {
                self_cost[s * leaves + from] = row.self_cost[s];
                empty[s * leaves + from] = texts[from][s].empty;
                for to in 0..leaves {
                    pair_cost[(s * leaves + from) * leaves + to] = row.pair_cost[to * segments + s];
                }
            }
            debug!(witness = from, "cost row measured");
        }

        let unique = mark_unique(&texts, leaves, segments);
        let matrix = Self { leaves, segments, self_cost, pair_cost, empty, unique };
        info!(
            "{} witnesses, {} segments of {} lines, {}/{} unique.",
            leaves,
            segments,
            corpus.segment_size(),
            matrix.unique_count(),
            leaves * segments
        );
        Ok(matrix)
    }

    /// Assemble a matrix from precomputed tables, laid out per witness:
    /// `self_cost[w][s]`, `pair_cost[from][to][s]`, `empty[w][s]`, `unique[w][s]`.
    pub fn from_tables(
        self_cost: Vec<Vec<u32>>,
        pair_cost: Vec<Vec<Vec<u32>>>,
        empty: Vec<Vec<bool>>,
        unique: Vec<Vec<bool>>,
    ) -> Result<Self> {
        let leaves = self_cost.len();
        if leaves == 0 {
            return Err(StemmaError::EmptyCorpus);
        }
        let segments = self_cost[0].len();
        let shape_ok = self_cost.iter().all(|r| r.len() == segments)
            && pair_cost.len() == leaves
            && pair_cost.iter().all(|r| r.len() == leaves && r.iter().all(|c| c.len() == segments))
            && empty.len() == leaves
            && empty.iter().all(|r| r.len() == segments)
            && unique.len() == leaves
            && unique.iter().all(|r| r.len() == segments);
        if !shape_ok {
            return Err(StemmaError::MalformedTable(format!(
                "tables do not match {leaves} witnesses x {segments} segments"
            )));
        }
        if (0..segments).any(|s| !unique[0][s]) {
            return Err(StemmaError::MalformedTable(
                "the first witness is always unique".to_string(),
            ));
        }

        let mut m = Self {
            leaves,
            segments,
            self_cost: vec![0; leaves * segments],
            pair_cost: vec![0; leaves * leaves * segments],
            empty: vec![false; leaves * segments],
            unique: vec![false; leaves * segments],
        };
        for w in 0..leaves {
            for s in 0..segments {
                m.self_cost[s * leaves + w] = self_cost[w][s];
                m.empty[s * leaves + w] = empty[w][s];
                m.unique[s * leaves + w] = unique[w][s];
                for to in 0..leaves {
                    m.pair_cost[(s * leaves + w) * leaves + to] = pair_cost[w][to][s];
                }
            }
        }
        Ok(m)
    }

    pub fn leaves(&self) -> usize {
        self.leaves
    }

    pub fn segments(&self) -> usize {
        self.segments
    }

    #[inline]
    pub fn self_cost(&self, witness: usize, segment: usize) -> u32 {
        self.self_cost[segment * self.leaves + witness]
    }

    /// Cost of deriving `to`'s segment from `from`'s.
    #[inline]
    pub fn pair_cost(&self, from: usize, to: usize, segment: usize) -> u32 {
        self.pair_cost[(segment * self.leaves + from) * self.leaves + to]
    }

    /// `pair_cost(from, ·, segment)` as a slice indexed by the target witness.
    #[inline]
    pub fn pair_row(&self, from: usize, segment: usize) -> &[u32] {
        let start = (segment * self.leaves + from) * self.leaves;
        &self.pair_cost[start..start + self.leaves]
    }

    #[inline]
    pub fn is_empty(&self, witness: usize, segment: usize) -> bool {
        self.empty[segment * self.leaves + witness]
    }

    #[inline]
    pub fn is_unique(&self, witness: usize, segment: usize) -> bool {
        self.unique[segment * self.leaves + witness]
    }

    /// Uniqueness flags of one segment, indexed by witness.
    #[inline]
    pub fn unique_row(&self, segment: usize) -> &[bool] {
        &self.unique[segment * self.leaves..(segment + 1) * self.leaves]
    }

    pub fn unique_count(&self) -> usize {
        self.unique.iter().filter(|&&u| u).count()
    }
}

struct MeasuredRow {
    /// `[s]`
    self_cost: Vec<u32>,
    /// `[to * segments + s]`
    pair_cost: Vec<u32>,
}

fn measure_row(texts: &[Vec<SegmentText>], from: usize, exact_copy_is_free: bool) -> Result<MeasuredRow> {
    let segments = texts[from].len();
    let mut self_cost = Vec::with_capacity(segments);
    let mut pair_cost = vec![0u32; texts.len() * segments];
    let mut joint = Vec::new();

    for seg in &texts[from] {
        self_cost.push(compressed_len(&seg.bytes)?);
    }

    for (to, target) in texts.iter().enumerate() {
        for s in 0..segments {
            let a = &texts[from][s].bytes;
            let b = &target[s].bytes;
            if exact_copy_is_free && a == b {
                continue;
            }
            joint.clear();
            joint.extend_from_slice(a);
            joint.extend_from_slice(b);
            pair_cost[to * segments + s] = compressed_len(&joint)?.saturating_sub(self_cost[s]);
        }
    }

    Ok(MeasuredRow { self_cost, pair_cost })
}

/// Size in bytes of `data` after raw DEFLATE with a sync flush.
pub fn compressed_len(data: &[u8]) -> Result<u32> {
    let mut enc = DeflateEncoder::new(Vec::with_capacity(data.len() / 2 + 16), Compression::default());
    enc.write_all(data).map_err(StemmaError::Compression)?;
    enc.flush().map_err(StemmaError::Compression)?;
    Ok(u32::try_from(enc.total_out()).unwrap_or(u32::MAX))
}

/// The lowest-indexed witness of every group of byte-identical segments stays unique.
fn mark_unique(texts: &[Vec<SegmentText>], leaves: usize, segments: usize) -> Vec<bool> {
    let mut unique = vec![true; leaves * segments];
    for s in 0..segments {
        let mut seen: HashSet<&[u8]> = HashSet::with_capacity(leaves);
        for (w, row) in texts.iter().enumerate() {
            if !seen.insert(row[s].bytes.as_slice()) {
                unique[s * leaves + w] = false;
            }
        }
    }
    unique
}

/// Allocate a zeroed table, reporting allocation failure instead of aborting.
pub(crate) fn try_alloc<T: Default + Clone>(len: usize, what: &'static str) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len).map_err(|_| StemmaError::ResourceExhausted {
        what,
        bytes: len.saturating_mul(std::mem::size_of::<T>()),
    })?;
    v.resize(len, T::default());
    Ok(v)
}
