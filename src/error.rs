//! Error taxonomy for stemma reconstruction.
//!
//! Every failure is fatal for the run: the computation is a deterministic batch
//! job, so there is nothing to retry. Variants carry enough context to tell the
//! user which precondition failed.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StemmaError {
    #[error("corpus contains no witnesses")]
    EmptyCorpus,

    #[error("no witness files found in {0:?}")]
    NoWitnessFiles(PathBuf),

    #[error("failed to read witness {path:?}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("segment size must be positive, got {0}")]
    InvalidSegmentSize(usize),

    #[error("corpus was segmented by {corpus} lines but the run expects {config}")]
    SegmentSizeMismatch { corpus: usize, config: usize },

    #[error("witness '{witness}' has {found} segments, expected {expected}")]
    InconsistentSegments {
        witness: String,
        expected: usize,
        found: usize,
    },

    #[error("bootstrap replicate count must be at least 1, got {0}")]
    InvalidReplicates(usize),

    #[error("cannot allocate {bytes} bytes for {what}")]
    ResourceExhausted { what: &'static str, bytes: usize },

    #[error("compressor failed: {0}")]
    Compression(#[source] io::Error),

    #[error("malformed cost table: {0}")]
    MalformedTable(String),

    #[error("failed to parse Newick tree: {0}")]
    Newick(String),

    #[error("phylogenetic tree error: {0}")]
    Phylo(String),

    #[error("tree invariant violated: {0}")]
    Invariant(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, StemmaError>;
