use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use rhm_stemma::config::{Cooling, NormalizeOptions, Resampling, RunConfig};
use rhm_stemma::corpus::Corpus;
use rhm_stemma::distances::{against_reference, pairwise_rf, replicate_snapshots};
use rhm_stemma::io::{DotExporter, read_newick, read_witness_dir, to_newick, write_matrix_tsv, write_replicate};
use rhm_stemma::snapshot::TreeSnapshot;
use rhm_stemma::stemma::{Stemma, seeded_rng};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Reconstruct a stemma from a directory of aligned witness files and write
/// one DOT graph, edge list and Newick tree per bootstrap replicate.
#[derive(Parser, Debug)]
#[command(name = "rhm-stemma", version, about = "Stemma reconstruction by compression distance and annealing")]
struct Args {
    /// Directory of witness `.txt` files, one verse per line
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Lines per segment
    #[arg(short = 's', long = "segment-size")]
    segment_size: usize,

    /// Annealing iterations per replicate
    #[arg(short = 'n', long = "iterations")]
    iterations: usize,

    /// Bootstrap replicates (1 disables resampling)
    #[arg(short = 'b', long = "bootstrap", default_value_t = 1)]
    bootstrap: usize,

    /// Output directory
    #[arg(short = 'o', long = "output", default_value = ".")]
    output: PathBuf,

    /// Generator seed; derived from the clock when absent
    #[arg(long = "seed")]
    seed: Option<u64>,

    /// Use every segment once per replicate instead of resampling
    #[arg(long = "sequential", default_value_t = false)]
    sequential: bool,

    /// Quadratic instead of geometric cooling
    #[arg(long = "quadratic", default_value_t = false)]
    quadratic: bool,

    #[arg(long = "fold-case", default_value_t = false)]
    fold_case: bool,

    #[arg(long = "fold-v-to-u", default_value_t = false)]
    fold_v_to_u: bool,

    #[arg(long = "fold-diacritics", default_value_t = false)]
    fold_diacritics: bool,

    /// Read a line holding a lone `&` as `et`
    #[arg(long = "amp-as-et", default_value_t = false)]
    amp_as_et: bool,

    /// Compress identical segments too instead of costing them 0
    #[arg(long = "measure-copies", default_value_t = false)]
    measure_copies: bool,

    /// Empty leaf segments count as lost text and cost nothing
    #[arg(long = "empty-is-missing", default_value_t = false)]
    empty_is_missing: bool,

    /// Rewrite the DOT file on every improvement
    #[arg(long = "dot", default_value_t = false)]
    dot: bool,

    /// Reference stemma (Newick) to compare every replicate against
    #[arg(long = "reference")]
    reference: Option<PathBuf>,

    /// Only warnings and errors
    #[arg(short = 'q', long = "quiet", default_value_t = false)]
    quiet: bool,

    /// Debug output, including search progress
    #[arg(short = 'v', long = "verbose", default_value_t = false)]
    verbose: bool,
}

impl Args {
    fn run_config(&self) -> RunConfig {
        let mut config = RunConfig::new(self.segment_size, self.iterations).with_replicates(self.bootstrap);
        config.seed = self.seed;
        if self.sequential {
            config.resampling = Resampling::Sequential;
        }
        if self.quadratic {
            config.cooling = Cooling::Quadratic;
        }
        config.normalize = NormalizeOptions {
            fold_case: self.fold_case,
            fold_v_to_u: self.fold_v_to_u,
            fold_diacritics: self.fold_diacritics,
            amp_as_et: self.amp_as_et,
        };
        config.exact_copy_is_free = !self.measure_copies;
        config.empty_is_missing = self.empty_is_missing;
        config.export_dot = self.dot;
        config
    }
}

fn init_logging(quiet: bool, verbose: bool) {
    let default = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.quiet, args.verbose);
    let config = args.run_config();
    config.validate()?;

    let t0 = Instant::now();
    let witnesses = read_witness_dir(&args.input).with_context(|| format!("loading witnesses from {:?}", args.input))?;
    let corpus = Corpus::new(witnesses, config.segment_size).context("segmenting witnesses")?;
    info!("Read {} witnesses, {} segments in {:.3}s", corpus.len(), corpus.segment_count(), t0.elapsed().as_secs_f64());

    let t1 = Instant::now();
    let stemma = Stemma::prepare(&corpus, config).context("building the cost matrix")?;
    info!("Cost matrix built in {:.3}s", t1.elapsed().as_secs_f64());

    fs::create_dir_all(&args.output).with_context(|| format!("creating {:?}", args.output))?;
    let seed = stemma.config().resolve_seed();
    info!("Seed {seed}");
    let mut rng = seeded_rng(seed);
    let names = stemma.names();

    let t2 = Instant::now();
    let mut newicks = Vec::with_capacity(stemma.config().replicates);
    for r in 0..stemma.config().replicates {
        let weights = stemma.draw_weights(&mut rng);
        let result = if stemma.config().export_dot {
            let mut exporter = DotExporter::new(&args.output, r, names, stemma.matrix(), &weights);
            stemma.run_replicate(r, &weights, &mut rng, &mut exporter)
        } else {
            stemma.run_replicate(r, &weights, &mut rng, &mut ())
        }
        .with_context(|| format!("replicate {r}"))?;

        write_replicate(&args.output, &result, names, stemma.matrix())
            .with_context(|| format!("writing replicate {r} to {:?}", args.output))?;
        newicks.push(to_newick(&result.best, names, stemma.matrix(), &result.weights));
    }
    info!("{} replicates in {:.3}s", newicks.len(), t2.elapsed().as_secs_f64());

    if newicks.len() < 2 && args.reference.is_none() {
        return Ok(());
    }
    let snaps = replicate_snapshots(&newicks).context("snapshotting replicate stemmata")?;
    let labels: Vec<String> = (0..snaps.len()).map(|r| format!("rep{r}")).collect();

    if snaps.len() > 1 {
        let path = args.output.join("replicate_rf.tsv");
        write_matrix_tsv(&path, &labels, &pairwise_rf(&snaps)).with_context(|| format!("writing {path:?}"))?;
        info!("Replicate RF distances written to {:?}", path);
    }

    if let Some(reference) = &args.reference {
        let tree = read_newick(reference).with_context(|| format!("reading reference {reference:?}"))?;
        let reference_snap = TreeSnapshot::from_tree(&tree).context("snapshotting the reference stemma")?;
        let dists = against_reference(&snaps, &reference_snap).context("comparing with the reference stemma")?;

        let path = args.output.join("reference_distances.tsv");
        let mut out = String::from("replicate\trf\tweighted_rf\n");
        for (label, d) in labels.iter().zip(&dists) {
            out.push_str(&format!("{label}\t{}\t{}\n", d.rf, d.weighted_rf));
        }
        fs::write(&path, out).with_context(|| format!("writing {path:?}"))?;
        info!("Reference distances written to {:?}", path);
    }
    Ok(())
}
