//! Bootstrap segment weights.

use rand::Rng;

use crate::config::Resampling;

/// How many times each segment counts in one replicate. Weights always sum to
/// the segment count.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootstrapWeights(pub Vec<u32>);

impl BootstrapWeights {
    /// Every segment once.
    pub fn uniform(segments: usize) -> Self {
        Self(vec![1; segments])
    }

    /// Weights for one replicate of a run with `replicates` replicates.
    ///
    /// A single replicate is never resampled.
    pub fn draw<R: Rng + ?Sized>(segments: usize, replicates: usize, resampling: Resampling, rng: &mut R) -> Self {
        if replicates <= 1 || resampling == Resampling::Sequential || segments == 0 {
            return Self::uniform(segments);
        }
        let mut weights = vec![0u32; segments];
        for _ in 0..segments {
            weights[rng.random_range(0..segments)] += 1;
        }
        Self(weights)
    }

    /// Resampling is off when every weight is one.
    pub fn is_resampled(&self) -> bool {
        self.0.iter().any(|&w| w != 1)
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn single_replicate_is_all_ones() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let w = BootstrapWeights::draw(7, 1, Resampling::Uniform, &mut rng);
        assert_eq!(w.0, vec![1; 7]);
        assert!(!w.is_resampled());
    }

    #[test]
    fn sequential_never_resamples() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let w = BootstrapWeights::draw(5, 10, Resampling::Sequential, &mut rng);
        assert_eq!(w, BootstrapWeights::uniform(5));
    }

    #[test]
    fn resampled_weights_sum_to_segment_count() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        for _ in 0..20 {
            let w = BootstrapWeights::draw(13, 4, Resampling::Uniform, &mut rng);
            assert_eq!(w.0.len(), 13);
            assert_eq!(w.0.iter().sum::<u32>(), 13);
        }
    }
}
