use std::fs;

use rhm_stemma::io::{DotExporter, read_witness_dir, replicate_path, write_replicate};
use rhm_stemma::{Corpus, RunConfig, Stemma, StemmaError, seeded_rng};
use tempfile::tempdir;

#[test]
fn witness_dir_is_filtered_and_sorted() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("C.txt"), "gamma\n").unwrap();
    fs::write(dir.path().join("A.txt"), "alpha\nbeta\n").unwrap();
    fs::write(dir.path().join("edges_rep0.txt"), "(N_3, A)\n").unwrap();
    fs::write(dir.path().join("rhm-tree.txt"), "x\n").unwrap();
    fs::write(dir.path().join(".hidden.txt"), "x\n").unwrap();
    fs::write(dir.path().join("notes.md"), "x\n").unwrap();
    fs::create_dir(dir.path().join("sub.txt")).unwrap();

    let witnesses = read_witness_dir(dir.path()).unwrap();
    let names: Vec<&str> = witnesses.iter().map(|w| w.name.as_str()).collect();
    assert_eq!(names, ["A", "C"]);
    assert_eq!(witnesses[0].lines, ["alpha", "beta"]);
}

#[test]
fn empty_dir_has_no_witnesses() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("readme.md"), "x").unwrap();
    assert!(matches!(read_witness_dir(dir.path()), Err(StemmaError::NoWitnessFiles(_))));
}

#[test]
fn missing_dir_is_unreadable() {
    let dir = tempdir().unwrap();
    assert!(matches!(read_witness_dir(dir.path().join("nope")), Err(StemmaError::Unreadable { .. })));
}

#[test]
fn replicate_files_are_written() {
    let input = tempdir().unwrap();
    let lines = ["et verbum caro factum est", "et habitavit in nobis", "plenum gratiae et veritatis"];
    for (name, edit) in [("A", ""), ("B", " amen"), ("C", " alleluia"), ("D", " amen alleluia")] {
        let text: String = lines.iter().map(|l| format!("{l}{edit}\n")).collect();
        fs::write(input.path().join(format!("{name}.txt")), text).unwrap();
    }
    let out = tempdir().unwrap();

    let corpus = Corpus::new(read_witness_dir(input.path()).unwrap(), 2).unwrap();
    let stemma = Stemma::prepare(&corpus, RunConfig::new(2, 200).with_replicates(2)).unwrap();
    let mut rng = seeded_rng(8);
    for r in 0..2 {
        let weights = stemma.draw_weights(&mut rng);
        let mut exporter = DotExporter::new(out.path(), r, stemma.names(), stemma.matrix(), &weights);
        let result = stemma.run_replicate(r, &weights, &mut rng, &mut exporter).unwrap();
        write_replicate(out.path(), &result, stemma.names(), stemma.matrix()).unwrap();
    }

    for r in 0..2 {
        let dot = fs::read_to_string(replicate_path(out.path(), "stemma", r, "dot")).unwrap();
        assert!(dot.starts_with("graph \"sankoff-tree\" {\n"));
        assert!(dot.contains("[label=\"A\" fillcolor=oldlace];"));

        let edges = fs::read_to_string(replicate_path(out.path(), "edges", r, "txt")).unwrap();
        // 4 leaves, 7 nodes, 6 edges
        assert_eq!(edges.lines().count(), 6);

        let newick = fs::read_to_string(replicate_path(out.path(), "stemma", r, "nwk")).unwrap();
        assert!(newick.ends_with(';'));
        for name in ["A", "B", "C", "D"] {
            assert!(newick.contains(name));
        }
    }

    // our own output is never read back as a witness
    fs::write(out.path().join("E.txt"), "x\n").unwrap();
    let back = read_witness_dir(out.path()).unwrap();
    assert_eq!(back.len(), 1);
}
