use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use itertools::Itertools;
use phylotree::tree::Tree as PhyloTree;
use tracing::{debug, info};

use crate::anneal::Observer;
use crate::bootstrap::BootstrapWeights;
use crate::corpus::Witness;
use crate::error::{Result, StemmaError};
use crate::fill::edge_label;
use crate::matrix::CostMatrix;
use crate::stemma::ReplicateResult;
use crate::tree::{NodeId, ScoredTree};

/// DOT edge length; purely cosmetic.
const EDGE_LEN: f64 = 0.7;

/// Witness files are visible `*.txt` files whose names do not look like our
/// own output.
fn is_witness_file(name: &str) -> bool {
    !name.starts_with('.')
        && name.ends_with(".txt")
        && !name.contains("edge")
        && !name.contains("rhm")
        && !name.contains("RHM")
}

/// Load every witness of a directory, ordered by file name. The witness name
/// is the file stem.
pub fn read_witness_dir<P: AsRef<Path>>(dir: P) -> Result<Vec<Witness>> {
    let dir = dir.as_ref();
    let unreadable = |path: &Path| {
        let path = path.to_path_buf();
        move |source| StemmaError::Unreadable { path, source }
    };

    let mut files: Vec<(String, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir).map_err(unreadable(dir))? {
        let path = entry.map_err(unreadable(dir))?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if is_witness_file(name) {
            files.push((name.to_string(), path));
        }
    }
    if files.is_empty() {
        return Err(StemmaError::NoWitnessFiles(dir.to_path_buf()));
    }
    files.sort();

    let witnesses = files
        .into_iter()
        .map(|(name, path)| {
            let bytes = fs::read(&path).map_err(unreadable(&path))?;
            let stem = name.trim_end_matches(".txt");
            let witness = Witness::from_text(stem, &String::from_utf8_lossy(&bytes));
            debug!(witness = stem, lines = witness.lines.len(), "witness loaded");
            Ok(witness)
        })
        .collect::<Result<Vec<_>>>()?;
    info!("Read {} witnesses from {:?}.", witnesses.len(), dir);
    Ok(witnesses)
}

/// Parse a Newick file (reference stemma) with `phylotree`.
pub fn read_newick<P: AsRef<Path>>(path: P) -> Result<PhyloTree> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| StemmaError::Unreadable { path: path.to_path_buf(), source })?;
    PhyloTree::from_newick(text.trim()).map_err(|e| StemmaError::Newick(format!("{}: {e}", path.display())))
}

/// Characters that would break a Newick or DOT label.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_whitespace() || "()[]:;,'\"".contains(c) { '_' } else { c })
        .collect()
}

/// Escape a name for a double-quoted DOT label.
fn dot_escape(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Render the stemma as an undirected DOT graph.
///
/// The root is not drawn; its two children are joined directly. Internal
/// nodes are labelled with the witness filling each segment (`-` when that
/// witness is empty there, `_` for segments left out of the replicate).
pub fn render_dot(best: &ScoredTree, names: &[String], matrix: &CostMatrix, weights: &BootstrapWeights) -> String {
    let mut out = String::new();
    let boot = if weights.is_resampled() { weights.as_slice().iter().join(",") } else { "off".to_string() };
    let _ = writeln!(out, "graph \"sankoff-tree\" {{");
    let _ = writeln!(out, "label=\"sankoff-score {} bootstrap {boot}\";", best.cost);
    let _ = writeln!(out, "edge [style=bold];");
    let _ = writeln!(out, "node[shape=plaintext fontsize=20];");
    dot_subtree(&mut out, best, best.root, names, matrix, weights.as_slice());
    let _ = writeln!(out, "}}");
    out
}

fn dot_subtree(out: &mut String, t: &ScoredTree, id: NodeId, names: &[String], matrix: &CostMatrix, weights: &[u32]) {
    let children = t.display_children(id);
    if let Some((first, second)) = children {
        dot_subtree(out, t, first, names, matrix, weights);
        dot_subtree(out, t, second, names, matrix, weights);
    }

    if t.node(id).parent.is_none() {
        if let Some((first, second)) = children {
            let _ = writeln!(out, "{first} -- {second} [len={EDGE_LEN:.4}];");
        }
        return;
    }

    if t.is_leaf(id) {
        let _ = writeln!(out, "{id} [label=\"{}\" fillcolor=oldlace];", dot_escape(&names[id]));
    } else {
        let segments = weights.len();
        let mut label = String::from("f:");
        for (s, &w) in weights.iter().enumerate() {
            label.push_str(match s {
                0 => "",
                _ if s == segments / 2 => "\\n",
                _ => ":",
            });
            let fill = t.node(id).fill[s];
            if w == 0 {
                label.push('_');
            } else if matrix.is_empty(fill, s) {
                label.push('-');
            } else {
                label.push_str(&dot_escape(&names[fill]));
            }
        }
        let _ = writeln!(out, "{id} [label=\"{label}\"];");
    }

    if let Some((first, second)) = children {
        let _ = writeln!(out, "{id} -- {first} [len={EDGE_LEN:.4}];");
        let _ = writeln!(out, "{id} -- {second} [len={EDGE_LEN:.4}];");
    }
}

fn node_name(t: &ScoredTree, id: NodeId, names: &[String]) -> String {
    if t.is_leaf(id) { names[id].clone() } else { format!("N_{id}") }
}

/// `(parent, child)` name pairs in print order; internal nodes are `N_<id>`.
pub fn named_edges(best: &ScoredTree, names: &[String]) -> Vec<(String, String)> {
    best.edges().into_iter().map(|(p, c)| (node_name(best, p, names), node_name(best, c, names))).collect()
}

/// One `(parent, child)` line per edge.
pub fn render_edge_list(best: &ScoredTree, names: &[String]) -> String {
    named_edges(best, names).into_iter().map(|(p, c)| format!("({p}, {c})\n")).collect()
}

/// Newick with edge labels as branch lengths.
pub fn to_newick(best: &ScoredTree, names: &[String], matrix: &CostMatrix, weights: &BootstrapWeights) -> String {
    fn walk(out: &mut String, t: &ScoredTree, id: NodeId, names: &[String], matrix: &CostMatrix, w: &[u32]) {
        match t.node(id).children() {
            None => out.push_str(&sanitize(&names[id])),
            Some((l, r)) => {
                out.push('(');
                for (k, child) in [l, r].into_iter().enumerate() {
                    if k > 0 {
                        out.push(',');
                    }
                    walk(out, t, child, names, matrix, w);
                    let len = edge_label(matrix, w, t.node(id), t.node(child));
                    let _ = write!(out, ":{len}");
                }
                out.push(')');
            }
        }
    }

    let mut out = String::new();
    walk(&mut out, best, best.root, names, matrix, weights.as_slice());
    out.push(';');
    out
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    out.write_all(text.as_bytes())?;
    out.flush()?;
    Ok(())
}

pub fn write_dot<P: AsRef<Path>>(
    path: P,
    best: &ScoredTree,
    names: &[String],
    matrix: &CostMatrix,
    weights: &BootstrapWeights,
) -> Result<()> {
    write_text(path.as_ref(), &render_dot(best, names, matrix, weights))
}

/// `<dir>/<stem>_rep<r>.<ext>`
pub fn replicate_path(dir: &Path, stem: &str, replicate: usize, ext: &str) -> PathBuf {
    dir.join(format!("{stem}_rep{replicate}.{ext}"))
}

/// Write the DOT graph, edge list and Newick tree of a finished replicate.
pub fn write_replicate(dir: &Path, result: &ReplicateResult, names: &[String], matrix: &CostMatrix) -> Result<()> {
    let r = result.index;
    write_dot(replicate_path(dir, "stemma", r, "dot"), &result.best, names, matrix, &result.weights)?;
    write_text(&replicate_path(dir, "edges", r, "txt"), &render_edge_list(&result.best, names))?;
    write_text(
        &replicate_path(dir, "stemma", r, "nwk"),
        &to_newick(&result.best, names, matrix, &result.weights),
    )?;
    debug!(replicate = r, dir = %dir.display(), "replicate written");
    Ok(())
}

/// Rewrites a replicate's DOT file on every improvement.
pub struct DotExporter<'a> {
    path: PathBuf,
    names: &'a [String],
    matrix: &'a CostMatrix,
    weights: &'a BootstrapWeights,
}

impl<'a> DotExporter<'a> {
    pub fn new(dir: &Path, replicate: usize, names: &'a [String], matrix: &'a CostMatrix, weights: &'a BootstrapWeights) -> Self {
        Self { path: replicate_path(dir, "stemma", replicate, "dot"), names, matrix, weights }
    }
}

impl Observer for DotExporter<'_> {
    fn on_improvement(&mut self, best: &ScoredTree, _iteration: usize) -> Result<()> {
        write_dot(&self.path, best, self.names, self.matrix, self.weights)
    }
}

/// Write a labelled square matrix as TSV. A `.gz` path is gzip-compressed.
pub fn write_matrix_tsv<P: AsRef<Path>, T: std::fmt::Display>(path: P, names: &[String], mat: &[Vec<T>]) -> Result<()> {
    let p = path.as_ref();
    let file = File::create(p)?;
    let mut out: Box<dyn Write> = if p.to_string_lossy().ends_with(".gz") {
        Box::new(BufWriter::new(GzEncoder::new(file, Compression::default())))
    } else {
        Box::new(BufWriter::new(file))
    };

    writeln!(out, "\t{}", names.iter().join("\t"))?;
    for (name, row) in names.iter().zip(mat) {
        writeln!(out, "{name}\t{}", row.iter().join("\t"))?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::Cost;
    use crate::tree::Tree;

    fn names() -> Vec<String> {
        ["A", "B", "C"].iter().map(|s| s.to_string()).collect()
    }

    fn matrix() -> CostMatrix {
        CostMatrix::from_tables(
            vec![vec![10, 10]; 3],
            vec![
                vec![vec![0, 0], vec![2, 1], vec![9, 7]],
                vec![vec![3, 1], vec![0, 0], vec![9, 7]],
                vec![vec![9, 7], vec![9, 7], vec![0, 0]],
            ],
            vec![vec![false, false], vec![false, true], vec![false, false]],
            vec![vec![true; 2]; 3],
        )
        .unwrap()
    }

    /// ((A, B), C) with node 3 filled by A then B.
    fn scored() -> ScoredTree {
        let tree = Tree::from_children(3, 2, &[(0, 1), (3, 2)]).unwrap();
        let mut t = tree.snapshot(Cost::new(42));
        t.nodes[3].fill = vec![0, 1];
        t.nodes[4].fill = vec![0, 0];
        t
    }

    #[test]
    fn witness_file_filter() {
        assert!(is_witness_file("A.txt"));
        assert!(!is_witness_file(".A.txt"));
        assert!(!is_witness_file("edges_0.txt"));
        assert!(!is_witness_file("rhm-tree.txt"));
        assert!(!is_witness_file("A.dot"));
    }

    #[test]
    fn dot_layout() {
        let dot = render_dot(&scored(), &names(), &matrix(), &BootstrapWeights::uniform(2));
        let expected = "graph \"sankoff-tree\" {\n\
                        label=\"sankoff-score 42 bootstrap off\";\n\
                        edge [style=bold];\n\
                        node[shape=plaintext fontsize=20];\n\
                        0 [label=\"A\" fillcolor=oldlace];\n\
                        1 [label=\"B\" fillcolor=oldlace];\n\
                        3 [label=\"f:A\\n-\"];\n\
                        3 -- 0 [len=0.7000];\n\
                        3 -- 1 [len=0.7000];\n\
                        2 [label=\"C\" fillcolor=oldlace];\n\
                        3 -- 2 [len=0.7000];\n\
                        }\n";
        assert_eq!(dot, expected);
    }

    #[test]
    fn dot_labels_are_escaped() {
        let names: Vec<String> = ["A\"x", "B\\y", "C"].iter().map(|s| s.to_string()).collect();
        let dot = render_dot(&scored(), &names, &matrix(), &BootstrapWeights::uniform(2));
        assert!(dot.contains("0 [label=\"A\\\"x\" fillcolor=oldlace];"), "{dot}");
        assert!(dot.contains("1 [label=\"B\\\\y\" fillcolor=oldlace];"), "{dot}");
        assert!(dot.contains("3 [label=\"f:A\\\"x\\n-\"];"), "{dot}");
    }

    #[test]
    fn dot_marks_resampled_segments() {
        let w = BootstrapWeights(vec![2, 0]);
        let dot = render_dot(&scored(), &names(), &matrix(), &w);
        assert!(dot.contains("bootstrap 2,0"));
        assert!(dot.contains("3 [label=\"f:A\\n_\"];"));
    }

    #[test]
    fn edge_list_names_internal_nodes() {
        let edges = render_edge_list(&scored(), &names());
        assert_eq!(edges, "(N_3, A)\n(N_4, N_3)\n(N_3, B)\n(N_4, C)\n");
    }

    #[test]
    fn newick_branch_lengths_are_edge_labels() {
        let nwk = to_newick(&scored(), &names(), &matrix(), &BootstrapWeights::uniform(2));
        // node 3 (A, B) vs A: 0 + min(1, 1); vs B: min(2, 3) + 0
        assert_eq!(nwk, "((A:1,B:2):1,C:16);");
        assert!(PhyloTree::from_newick(&nwk).is_ok());
    }

    #[test]
    fn sanitize_replaces_reserved_characters() {
        assert_eq!(sanitize("Ms (a): 1"), "Ms__a___1");
    }

    #[test]
    fn matrix_tsv_plain_and_gzip() {
        use flate2::read::GzDecoder;
        use std::io::Read;

        let dir = tempfile::tempdir().unwrap();
        let names = names();
        let mat = vec![vec![0, 1, 2], vec![1, 0, 3], vec![2, 3, 0]];
        let plain = dir.path().join("m.tsv");
        write_matrix_tsv(&plain, &names, &mat).unwrap();
        let text = fs::read_to_string(&plain).unwrap();
        assert_eq!(text, "\tA\tB\tC\nA\t0\t1\t2\nB\t1\t0\t3\nC\t2\t3\t0\n");

        let gz = dir.path().join("m.tsv.gz");
        write_matrix_tsv(&gz, &names, &mat).unwrap();
        let mut decoded = String::new();
        GzDecoder::new(File::open(&gz).unwrap()).read_to_string(&mut decoded).unwrap();
        assert_eq!(decoded, text);
    }
}
