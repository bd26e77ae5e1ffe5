//! Simulated annealing over tree topologies.
//!
//! Each iteration proposes one local edit (swap and regraft alternate),
//! applies it in place, rescores only the affected root paths and either keeps
//! it or rolls back both the links and the cached rows. The best tree seen is
//! snapshotted together with its ancestral fills whenever it improves.

use rand::Rng;
use tracing::{debug, info, trace};

use crate::config::Cooling;
use crate::cost::Cost;
use crate::error::Result;
use crate::fill::assign_fill;
use crate::moves::{self, MoveKind};
use crate::parsimony::Sankoff;
use crate::tree::{ScoredTree, Tree};

const START_TEMPERATURE: f64 = 10.0;
/// Geometric cooling reaches `START_TEMPERATURE * FINAL_RATIO` after all iterations.
const FINAL_RATIO: f64 = 0.05;
/// Past this share of the run the search turns greedy.
const FREEZE_AFTER: f64 = 0.95;
/// Uphill moves with a scaled difference below this are never taken.
const MIN_LOG_ACCEPT: f64 = -10.0;
const PROGRESS_EVERY: usize = 250;

/// Temperatures for iterations `1..=iterations`.
#[derive(Clone, Debug)]
pub struct Schedule {
    cooling: Cooling,
    iterations: usize,
    iter: usize,
    temperature: f64,
    alpha: f64,
}

impl Schedule {
    pub fn new(cooling: Cooling, iterations: usize) -> Self {
        let alpha = if iterations == 0 { 1.0 } else { FINAL_RATIO.powf(1.0 / iterations as f64) };
        Self { cooling, iterations, iter: 0, temperature: START_TEMPERATURE, alpha }
    }
}

impl Iterator for Schedule {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.iter >= self.iterations {
            return None;
        }
        self.iter += 1;
        self.temperature = if self.iter as f64 > FREEZE_AFTER * self.iterations as f64 {
            0.0
        } else {
            match self.cooling {
                Cooling::Geometric => self.temperature * self.alpha,
                Cooling::Quadratic => {
                    let t = 1.0 - self.iter as f64 / self.iterations as f64;
                    5.0 * t * t
                }
            }
        };
        Some(self.temperature)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.iterations - self.iter;
        (left, Some(left))
    }
}

/// Metropolis rule: downhill and sideways moves always pass; uphill ones pass
/// with probability `exp((current - candidate) / T)` while `T > 0`.
pub fn accept<R: Rng + ?Sized>(current: Cost, candidate: Cost, temperature: f64, rng: &mut R) -> bool {
    if candidate <= current {
        return true;
    }
    if temperature <= 0.0 {
        return false;
    }
    let dif = current.delta(candidate) / temperature;
    dif > MIN_LOG_ACCEPT && rng.random::<f64>() < dif.exp()
}

/// Hook called on every new best tree.
pub trait Observer {
    fn on_improvement(&mut self, best: &ScoredTree, iteration: usize) -> Result<()>;
}

impl Observer for () {
    fn on_improvement(&mut self, _best: &ScoredTree, _iteration: usize) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub iterations: usize,
    pub accepted: usize,
    pub rejected: usize,
    /// Iterations where the tree admitted no valid edit.
    pub skipped: usize,
    pub improvements: usize,
}

#[derive(Clone, Debug)]
pub struct SearchOutcome {
    pub best: ScoredTree,
    /// The live tree at the end of the run, with a consistent cost cache.
    pub tree: Tree,
    pub current_cost: Cost,
    pub stats: SearchStats,
}

pub struct Annealer<'a> {
    sankoff: Sankoff<'a>,
    cooling: Cooling,
    iterations: usize,
}

impl<'a> Annealer<'a> {
    pub fn new(sankoff: Sankoff<'a>, cooling: Cooling, iterations: usize) -> Self {
        Self { sankoff, cooling, iterations }
    }

    pub fn run<R, O>(&self, mut tree: Tree, rng: &mut R, observer: &mut O) -> Result<SearchOutcome>
    where
        R: Rng + ?Sized,
        O: Observer + ?Sized,
    {
        let sankoff = &self.sankoff;
        let mut current = sankoff.eval_tree(&mut tree);
        assign_fill(sankoff, &mut tree);
        let mut best = tree.snapshot(current);
        observer.on_improvement(&best, 0)?;
        info!("Annealing {} iterations from cost {}.", self.iterations, current);

        let mut stats = SearchStats::default();
        let mut kind = MoveKind::Swap;

        for (i, temperature) in Schedule::new(self.cooling, self.iterations).enumerate() {
            let iter = i + 1;
            stats.iterations = iter;
            let proposal = moves::propose(&tree, kind, rng);
            kind = kind.other();

            match proposal {
                None => stats.skipped += 1,
                Some(p) => {
                    sankoff.store_cost_uptree(&mut tree, p.a);
                    sankoff.store_cost_uptree(&mut tree, p.b);
                    let diff = moves::apply(&mut tree, p);
                    let (ra, rb) = diff.endpoints;
                    let candidate = sankoff.eval_move(&mut tree, ra, rb);

                    if accept(current, candidate, temperature, rng) {
                        stats.accepted += 1;
                        if candidate < best.cost {
                            assign_fill(sankoff, &mut tree);
                            best = tree.snapshot(candidate);
                            stats.improvements += 1;
                            debug!(iter, temperature, cost = %candidate, "new best");
                            observer.on_improvement(&best, iter)?;
                        }
                        current = candidate;
                    } else {
                        moves::revert(&mut tree, &diff);
                        sankoff.restore_cost_uptree(&mut tree, p.a);
                        sankoff.restore_cost_uptree(&mut tree, p.b);
                        stats.rejected += 1;
                        trace!(iter, ?p, %candidate, "rejected");
                    }
                }
            }

            if iter % PROGRESS_EVERY == 0 {
                debug!("best score {} now {} (iter {}/{} temp {:.2})", best.cost, current, iter, self.iterations, temperature);
            }
        }

        info!(
            "Annealing done: best {}, {} accepted, {} rejected, {} skipped.",
            best.cost, stats.accepted, stats.rejected, stats.skipped
        );
        Ok(SearchOutcome { best, tree, current_cost: current, stats })
    }
}
