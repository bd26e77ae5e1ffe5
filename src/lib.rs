//! Crate root: module orchestration and public re-exports.
//!
//! Stemma reconstruction from aligned witness texts. Segments are measured with
//! a compression distance, and a binary tree over the witnesses is then searched
//! by simulated annealing under Sankoff parsimony. Bootstrap replicates resample
//! the segments.
//!
//! Modules:
//! - `corpus`, `matrix`, `cost`: witness texts, segment text and the cost tables.
//! - `tree`, `cache`, `moves`: the mutable stemma topology and its local edits.
//! - `parsimony`, `fill`: incremental Sankoff scoring and ancestral fills.
//! - `anneal`, `bootstrap`, `stemma`: the search and the replicate driver.
//! - `io`: witness loading and DOT / edge list / Newick / TSV output.
//! - `bitset`, `snapshot`, `distances`: RF comparison of stemmata.
//! - `api`: Python bindings via `pyo3` (gated behind "python" feature).

pub mod anneal;
pub mod bitset;
pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod corpus;
pub mod cost;
pub mod distances;
pub mod error;
pub mod fill;
pub mod io;
pub mod matrix;
pub mod moves;
pub mod parsimony;
pub mod snapshot;
pub mod stemma;
pub mod tree;

#[cfg(feature = "python")]
pub mod api;

pub use bitset::Bitset;
pub use config::{Cooling, Resampling, RunConfig};
pub use corpus::{Corpus, Witness};
pub use cost::Cost;
pub use error::{Result, StemmaError};
pub use io::{read_witness_dir, write_matrix_tsv};
pub use matrix::CostMatrix;
pub use snapshot::TreeSnapshot;
pub use stemma::{ReplicateResult, Stemma, seeded_rng};
pub use tree::{ScoredTree, Tree};
