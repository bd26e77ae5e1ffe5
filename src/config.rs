//! Run configuration.
//!
//! The binary builds a `RunConfig` from its command line, the Python layer from
//! keyword arguments; the library only ever sees this validated value.

use crate::error::{Result, StemmaError};

/// How bootstrap replicates draw their segment weights.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Resampling {
    /// Draw `segment_count` segments uniformly with replacement.
    #[default]
    Uniform,
    /// Every segment once, in order (the "no-resample" policy).
    Sequential,
}

/// Temperature schedule of the annealer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Cooling {
    /// `T *= alpha` with `alpha = 0.05^(1/iterations)`, starting at 10.
    #[default]
    Geometric,
    /// `T = 5 (1 - i/N)^2`.
    Quadratic,
}

/// Text folding applied to every segment before measuring it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct NormalizeOptions {
    pub fold_case: bool,
    pub fold_v_to_u: bool,
    pub fold_diacritics: bool,
    /// A line consisting of a lone `&` is read as `et`.
    pub amp_as_et: bool,
}

#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Lines per segment. Required, no default.
    pub segment_size: usize,
    /// Bootstrap replicates; 1 disables resampling.
    pub replicates: usize,
    /// Annealing iterations per replicate.
    pub iterations: usize,
    /// Generator seed; `None` seeds from the clock once per process.
    pub seed: Option<u64>,
    pub resampling: Resampling,
    pub cooling: Cooling,
    pub normalize: NormalizeOptions,
    /// Identical segments cost nothing instead of paying a compression call.
    pub exact_copy_is_free: bool,
    /// An empty leaf segment costs nothing to derive (treated as lost text).
    pub empty_is_missing: bool,
    /// Rewrite the DOT file of a replicate on every improvement.
    pub export_dot: bool,
}

impl RunConfig {
    pub fn new(segment_size: usize, iterations: usize) -> Self {
        Self {
            segment_size,
            replicates: 1,
            iterations,
            seed: None,
            resampling: Resampling::default(),
            cooling: Cooling::default(),
            normalize: NormalizeOptions::default(),
            exact_copy_is_free: true,
            empty_is_missing: false,
            export_dot: false,
        }
    }

    pub fn with_replicates(mut self, replicates: usize) -> Self {
        self.replicates = replicates;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.segment_size == 0 {
            return Err(StemmaError::InvalidSegmentSize(self.segment_size));
        }
        if self.replicates == 0 {
            return Err(StemmaError::InvalidReplicates(self.replicates));
        }
        Ok(())
    }

    /// The configured seed, or one derived from the wall clock.
    pub fn resolve_seed(&self) -> u64 {
        self.seed.unwrap_or_else(clock_seed)
    }
}

fn clock_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() ^ u64::from(d.subsec_micros()) << 20)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_segment_size() {
        let cfg = RunConfig::new(0, 10);
        assert!(matches!(cfg.validate(), Err(StemmaError::InvalidSegmentSize(0))));
    }

    #[test]
    fn rejects_zero_replicates() {
        let cfg = RunConfig::new(5, 10).with_replicates(0);
        assert!(matches!(cfg.validate(), Err(StemmaError::InvalidReplicates(0))));
    }

    #[test]
    fn defaults() {
        let cfg = RunConfig::new(5, 10);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.replicates, 1);
        assert!(cfg.exact_copy_is_free);
        assert_eq!(cfg.resampling, Resampling::Uniform);
        assert_eq!(cfg.with_seed(7).resolve_seed(), 7);
    }
}
