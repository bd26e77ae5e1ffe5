//! Witnesses and their segmentation into fixed-size line windows.

use crate::config::NormalizeOptions;
use crate::error::{Result, StemmaError};

/// Lines that stand for a gap in the transcription; each becomes a bare newline.
const GAP_MARKERS: [&str; 2] = ["PUUT", "POIS"];

/// One transcribed manuscript: a name and its aligned lines.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Witness {
    pub name: String,
    pub lines: Vec<String>,
}

impl Witness {
    pub fn new(name: impl Into<String>, lines: Vec<String>) -> Self {
        Self { name: name.into(), lines }
    }

    /// Split raw text into lines, dropping the terminators (`\n` or `\r\n`).
    pub fn from_text(name: impl Into<String>, text: &str) -> Self {
        let lines = text
            .lines()
            .map(|l| l.strip_suffix('\r').unwrap_or(l).to_string())
            .collect();
        Self::new(name, lines)
    }

    fn segment_count(&self, segment_size: usize) -> usize {
        self.lines.len().div_ceil(segment_size).max(1)
    }

    fn window(&self, segment: usize, segment_size: usize) -> &[String] {
        let start = (segment * segment_size).min(self.lines.len());
        let end = ((segment + 1) * segment_size).min(self.lines.len());
        &self.lines[start..end]
    }
}

/// A segment after normalization, ready for the compressor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentText {
    pub bytes: Vec<u8>,
    /// No non-whitespace character in the raw window.
    pub empty: bool,
}

/// The ordered witnesses of one run, cut into equally many segments.
#[derive(Clone, Debug)]
pub struct Corpus {
    witnesses: Vec<Witness>,
    segment_size: usize,
    segment_count: usize,
}

impl Corpus {
    /// Validate the witnesses against a segment size.
    ///
    /// The segment count comes from the first witness; every other witness must
    /// produce the same count.
    pub fn new(witnesses: Vec<Witness>, segment_size: usize) -> Result<Self> {
        if segment_size == 0 {
            return Err(StemmaError::InvalidSegmentSize(segment_size));
        }
        let first = witnesses.first().ok_or(StemmaError::EmptyCorpus)?;
        let segment_count = first.segment_count(segment_size);

        for w in &witnesses[1..] {
            let found = w.segment_count(segment_size);
            if found != segment_count {
                return Err(StemmaError::InconsistentSegments {
                    witness: w.name.clone(),
                    expected: segment_count,
                    found,
                });
            }
        }

        Ok(Self { witnesses, segment_size, segment_count })
    }

    pub fn witnesses(&self) -> &[Witness] {
        &self.witnesses
    }

    pub fn names(&self) -> Vec<String> {
        self.witnesses.iter().map(|w| w.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.witnesses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.witnesses.is_empty()
    }

    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    pub fn segment_count(&self) -> usize {
        self.segment_count
    }

    /// Normalized text of segment `segment` of witness `witness`.
    pub fn segment(&self, witness: usize, segment: usize, opts: &NormalizeOptions) -> SegmentText {
        let window = self.witnesses[witness].window(segment, self.segment_size);
        join_window(window, opts)
    }
}

fn join_window(window: &[String], opts: &NormalizeOptions) -> SegmentText {
    let mut buf = String::new();
    let mut empty = true;

    for raw in window {
        if buf.ends_with('\n') {
            buf.pop();
            buf.push(' ');
        }
        if raw.chars().any(|c| !c.is_whitespace()) {
            empty = false;
        }
        let line = if opts.amp_as_et && raw == "&" { "et" } else { raw.as_str() };
        if GAP_MARKERS.contains(&line) {
            buf.push('\n');
        } else {
            buf.push_str(line);
            buf.push('\n');
        }
    }
    if !buf.ends_with('\n') {
        buf.push('\n');
    }

    SegmentText { bytes: fold(buf, opts).into_bytes(), empty }
}

fn fold(text: String, opts: &NormalizeOptions) -> String {
    if !opts.fold_case && !opts.fold_v_to_u && !opts.fold_diacritics {
        return text;
    }
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        let c = if opts.fold_diacritics { strip_diacritic(c) } else { c };
        if opts.fold_case {
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    if opts.fold_v_to_u {
        out = out.replace('v', "u").replace('V', "U");
    }
    out
}

fn strip_diacritic(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => 'a',
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' | 'Ā' | 'Ă' | 'Ą' => 'A',
        'ç' | 'ć' | 'č' => 'c',
        'Ç' | 'Ć' | 'Č' => 'C',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => 'e',
        'È' | 'É' | 'Ê' | 'Ë' | 'Ē' | 'Ė' | 'Ę' | 'Ě' => 'E',
        'ì' | 'í' | 'î' | 'ï' | 'ī' | 'į' => 'i',
        'Ì' | 'Í' | 'Î' | 'Ï' | 'Ī' | 'Į' => 'I',
        'ñ' | 'ń' | 'ň' => 'n',
        'Ñ' | 'Ń' | 'Ň' => 'N',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => 'o',
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' | 'Ō' | 'Ő' => 'O',
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' | 'ų' => 'u',
        'Ù' | 'Ú' | 'Û' | 'Ü' | 'Ū' | 'Ů' | 'Ű' | 'Ų' => 'U',
        'ý' | 'ÿ' => 'y',
        'Ý' | 'Ÿ' => 'Y',
        'š' | 'ś' => 's',
        'Š' | 'Ś' => 'S',
        'ž' | 'ź' | 'ż' => 'z',
        'Ž' | 'Ź' | 'Ż' => 'Z',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn segment_count_from_first_witness() {
        let corpus = Corpus::new(
            vec![
                Witness::new("A", lines(&["a", "b", "c", "d", "e"])),
                Witness::new("B", lines(&["a", "b", "c", "d", " "])),
            ],
            2,
        )
        .unwrap();
        assert_eq!(corpus.segment_count(), 3);
        // short final window holding only blanks
        let seg = corpus.segment(1, 2, &NormalizeOptions::default());
        assert!(seg.empty);
        assert_eq!(seg.bytes, b" \n");
    }

    #[test]
    fn inconsistent_segment_counts_are_fatal() {
        let err = Corpus::new(
            vec![
                Witness::new("A", lines(&["a", "b", "c", "d"])),
                Witness::new("B", lines(&["a"])),
            ],
            1,
        )
        .unwrap_err();
        assert!(matches!(err, StemmaError::InconsistentSegments { ref witness, expected: 4, found: 1 } if witness == "B"));
    }

    #[test]
    fn empty_corpus_is_fatal() {
        assert!(matches!(Corpus::new(vec![], 3), Err(StemmaError::EmptyCorpus)));
    }

    #[test]
    fn lines_are_joined_with_spaces() {
        let corpus = Corpus::new(vec![Witness::new("A", lines(&["in", "principio", "erat"]))], 3).unwrap();
        let seg = corpus.segment(0, 0, &NormalizeOptions::default());
        assert_eq!(seg.bytes, b"in principio erat\n");
        assert!(!seg.empty);
    }

    #[test]
    fn gap_markers_become_newlines() {
        let corpus = Corpus::new(vec![Witness::new("A", lines(&["verbum", "PUUT"]))], 2).unwrap();
        let seg = corpus.segment(0, 0, &NormalizeOptions::default());
        assert_eq!(seg.bytes, b"verbum \n");
    }

    #[test]
    fn whitespace_only_window_is_empty() {
        let corpus = Corpus::new(vec![Witness::new("A", lines(&["  ", "\t"]))], 2).unwrap();
        assert!(corpus.segment(0, 0, &NormalizeOptions::default()).empty);
    }

    #[test]
    fn folding_options() {
        let corpus = Corpus::new(vec![Witness::new("A", lines(&["Vérbum", "&"]))], 2).unwrap();
        let opts = NormalizeOptions {
            fold_case: true,
            fold_v_to_u: true,
            fold_diacritics: true,
            amp_as_et: true,
        };
        assert_eq!(corpus.segment(0, 0, &opts).bytes, b"uerbum et\n");
        let plain = corpus.segment(0, 0, &NormalizeOptions::default());
        assert_eq!(plain.bytes, "Vérbum &\n".as_bytes());
    }

    #[test]
    fn from_text_strips_carriage_returns() {
        let w = Witness::from_text("A", "one\r\ntwo\n");
        assert_eq!(w.lines, vec!["one".to_string(), "two".to_string()]);
    }
}
