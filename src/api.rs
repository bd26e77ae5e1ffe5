//! Python binding layer for stemma reconstruction.
//!
//! Exposes the whole pipeline (read witnesses, measure, anneal every
//! replicate) as one function, plus RF comparison of Newick stemmata.

use std::path::PathBuf;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::config::{Cooling, Resampling, RunConfig};
use crate::corpus::Corpus;
use crate::distances::{pairwise_rf, replicate_snapshots};
use crate::error::StemmaError;
use crate::io::{DotExporter, read_witness_dir, named_edges, to_newick, write_replicate};
use crate::stemma::{Stemma, seeded_rng};

fn py_err(e: StemmaError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

/// Reconstruct a stemma from a folder of witness files.
///
/// Args:
///     folder: Directory holding one `.txt` file per witness, one line per verse
///     segment_size: Lines per segment
///     iterations: Annealing iterations per replicate
///     bootstrap: Number of bootstrap replicates (default: 1, no resampling)
///     seed: Generator seed (default: derived from the clock)
///     print_dot: Rewrite the DOT file on every improvement (needs output_dir)
///     output_dir: Where to write DOT, edge list and Newick files (default: none)
///
/// Returns:
///     A list with one `(cost, edges, newick)` tuple per replicate, where
///     `edges` holds `(parent, child)` name pairs and `cost` is None when
///     no finite stemma exists.
///
/// Raises:
///     ValueError: If the folder holds no witnesses or the parameters are invalid
#[pyfunction]
#[pyo3(signature = (folder, segment_size, iterations, bootstrap=1, seed=None, print_dot=false, output_dir=None, quadratic=false, sequential=false))]
#[allow(clippy::too_many_arguments)]
fn compute_stemma(
    folder: String,
    segment_size: usize,
    iterations: usize,
    bootstrap: usize,
    seed: Option<u64>,
    print_dot: bool,
    output_dir: Option<String>,
    quadratic: bool,
    sequential: bool,
) -> PyResult<Vec<(Option<u64>, Vec<(String, String)>, String)>> {
    let mut config = RunConfig::new(segment_size, iterations).with_replicates(bootstrap);
    config.seed = seed;
    config.export_dot = print_dot;
    if quadratic {
        config.cooling = Cooling::Quadratic;
    }
    if sequential {
        config.resampling = Resampling::Sequential;
    }

    let witnesses = read_witness_dir(&folder).map_err(py_err)?;
    let corpus = Corpus::new(witnesses, segment_size).map_err(py_err)?;
    let stemma = Stemma::prepare(&corpus, config).map_err(py_err)?;
    let mut rng = seeded_rng(stemma.config().resolve_seed());
    let out_dir = output_dir.map(PathBuf::from);
    let names = stemma.names();

    let mut results = Vec::with_capacity(bootstrap);
    for r in 0..stemma.config().replicates {
        let weights = stemma.draw_weights(&mut rng);
        let result = match (&out_dir, print_dot) {
            (Some(dir), true) => {
                let mut exporter = DotExporter::new(dir, r, names, stemma.matrix(), &weights);
                stemma.run_replicate(r, &weights, &mut rng, &mut exporter)
            }
            _ => stemma.run_replicate(r, &weights, &mut rng, &mut ()),
        }
        .map_err(py_err)?;

        if let Some(dir) = &out_dir {
            write_replicate(dir, &result, names, stemma.matrix()).map_err(py_err)?;
        }
        let edges = named_edges(&result.best, names);
        let newick = to_newick(&result.best, names, stemma.matrix(), &result.weights);
        results.push((result.best.cost.value(), edges, newick));
    }
    Ok(results)
}

/// Pairwise Robinson-Foulds distances between Newick stemmata.
///
/// Raises:
///     ValueError: If a tree does not parse or the trees cover different witnesses
#[pyfunction]
fn stemma_rf(newicks: Vec<String>) -> PyResult<Vec<Vec<usize>>> {
    let snaps = replicate_snapshots(&newicks).map_err(py_err)?;
    Ok(pairwise_rf(&snaps))
}

#[pymodule]
fn rhm_stemma(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(compute_stemma, m)?)?;
    m.add_function(wrap_pyfunction!(stemma_rf, m)?)?;
    Ok(())
}
