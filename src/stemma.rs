//! Whole-corpus driver: measure once, then one annealing run per replicate.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::anneal::{Annealer, Observer, SearchStats};
use crate::bootstrap::BootstrapWeights;
use crate::config::RunConfig;
use crate::corpus::Corpus;
use crate::error::{Result, StemmaError};
use crate::matrix::{CostMatrix, MatrixOptions};
use crate::parsimony::Sankoff;
use crate::tree::{ScoredTree, Tree};

/// The best stemma of one bootstrap replicate.
#[derive(Clone, Debug)]
pub struct ReplicateResult {
    pub index: usize,
    pub weights: BootstrapWeights,
    pub best: ScoredTree,
    pub stats: SearchStats,
}

/// A measured corpus ready for reconstruction.
#[derive(Clone, Debug)]
pub struct Stemma {
    names: Vec<String>,
    matrix: CostMatrix,
    config: RunConfig,
}

/// The process-wide generator: ChaCha8 from an explicit or clock-derived seed.
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

impl Stemma {
    /// Validate the configuration and build the cost matrix.
    pub fn prepare(corpus: &Corpus, config: RunConfig) -> Result<Self> {
        config.validate()?;
        if corpus.segment_size() != config.segment_size {
            return Err(StemmaError::SegmentSizeMismatch {
                corpus: corpus.segment_size(),
                config: config.segment_size,
            });
        }
        let opts = MatrixOptions { normalize: config.normalize, exact_copy_is_free: config.exact_copy_is_free };
        let matrix = CostMatrix::build(corpus, &opts)?;
        Ok(Self { names: corpus.names(), matrix, config })
    }

    /// Use an already measured matrix.
    pub fn from_matrix(names: Vec<String>, matrix: CostMatrix, config: RunConfig) -> Result<Self> {
        config.validate()?;
        if names.len() != matrix.leaves() {
            return Err(StemmaError::MalformedTable(format!(
                "{} names for {} witnesses",
                names.len(),
                matrix.leaves()
            )));
        }
        Ok(Self { names, matrix, config })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn matrix(&self) -> &CostMatrix {
        &self.matrix
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Segment weights for the next replicate.
    pub fn draw_weights<R: Rng + ?Sized>(&self, rng: &mut R) -> BootstrapWeights {
        BootstrapWeights::draw(self.matrix.segments(), self.config.replicates, self.config.resampling, rng)
    }

    /// Anneal one replicate from a fresh random tree.
    pub fn run_replicate<R, O>(
        &self,
        index: usize,
        weights: &BootstrapWeights,
        rng: &mut R,
        observer: &mut O,
    ) -> Result<ReplicateResult>
    where
        R: Rng + ?Sized,
        O: Observer + ?Sized,
    {
        info!("Replicate {}/{}: weights {:?}.", index + 1, self.config.replicates, weights.as_slice());
        let sankoff = Sankoff::new(&self.matrix, weights.as_slice(), self.config.empty_is_missing)?;
        let tree = Tree::random(self.matrix.leaves(), self.matrix.segments(), rng)?;
        let outcome = Annealer::new(sankoff, self.config.cooling, self.config.iterations).run(tree, rng, observer)?;
        info!("Replicate {} best cost {}.", index + 1, outcome.best.cost);
        Ok(ReplicateResult { index, weights: weights.clone(), best: outcome.best, stats: outcome.stats })
    }

    /// Every replicate in order, sharing one generator.
    pub fn run<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<ReplicateResult>> {
        (0..self.config.replicates)
            .map(|r| {
                let weights = self.draw_weights(rng);
                self.run_replicate(r, &weights, rng, &mut ())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Witness;

    fn witness(name: &str, lines: &[&str]) -> Witness {
        Witness::new(name, lines.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn segment_size_must_match() {
        let corpus = Corpus::new(vec![witness("A", &["x"])], 2).unwrap();
        let err = Stemma::prepare(&corpus, RunConfig::new(3, 10)).unwrap_err();
        assert!(matches!(err, StemmaError::SegmentSizeMismatch { corpus: 2, config: 3 }));
        assert_eq!(err.to_string(), "corpus was segmented by 2 lines but the run expects 3");
    }

    #[test]
    fn names_must_match_matrix() {
        let m = CostMatrix::from_tables(vec![vec![1]], vec![vec![vec![0]]], vec![vec![false]], vec![vec![true]]).unwrap();
        assert!(Stemma::from_matrix(vec!["A".into(), "B".into()], m, RunConfig::new(1, 1)).is_err());
    }

    #[test]
    fn same_seed_same_result() {
        let corpus = Corpus::new(
            vec![
                witness("A", &["in principio erat verbum", "et verbum erat apud deum"]),
                witness("B", &["in principio erat verbum", "et verbum erat apud dominum"]),
                witness("C", &["in principio fuit verbum", "et uerbum erat apud deum"]),
                witness("D", &["principio erat sermo", "et sermo erat apud deum"]),
            ],
            1,
        )
        .unwrap();
        let cfg = RunConfig::new(1, 200).with_replicates(2);
        let stemma = Stemma::prepare(&corpus, cfg).unwrap();
        let a = stemma.run(&mut seeded_rng(5)).unwrap();
        let b = stemma.run(&mut seeded_rng(5)).unwrap();
        assert_eq!(a.len(), 2);
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.best, y.best);
            assert_eq!(x.weights, y.weights);
            assert_eq!(x.weights.0.iter().sum::<u32>(), 2);
        }
    }
}
