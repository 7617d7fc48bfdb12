//! Suffix-array exact-match engine.
//!
//! Finds every maximal substring shared verbatim between two or more
//! documents by:
//! 1. Concatenating all document texts with sentinel separators
//! 2. Sorting all suffix start offsets lexicographically (suffix array)
//! 3. Scanning adjacent-pair longest common prefixes (LCP)
//! 4. Deduplicating candidates longest-first against covered spans
//!
//! The engine works on characters, not bytes: offsets and lengths are
//! character counts, so multi-byte scripts index the same way short ASCII
//! test fixtures do.

use std::collections::{HashMap, HashSet};

/// Separates documents in the corpus. Never appears in real text, so a
/// shared prefix can never silently cross a document boundary; LCP
/// computation stops at it.
pub const SENTINEL: char = '\u{1}';

/// One occurrence of a shared segment in corpus-free coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Occurrence {
    /// Index into the input text list.
    pub doc: usize,
    /// Character offset of the segment within that document's text.
    pub start: usize,
    /// Segment length over document text length, in `(0, 1]`.
    pub ratio: f64,
}

/// A candidate shared prefix from one adjacent suffix-array pair.
struct Candidate {
    /// Corpus offset of one occurrence; the segment text is
    /// `corpus[repr..repr + len]`.
    repr: usize,
    len: usize,
    /// Both suffix positions as `(corpus_start, doc_index)`.
    occs: [(usize, usize); 2],
}

/// Find all maximal segments of at least `min_len` characters shared by
/// two or more of the given texts.
///
/// Returns a map from segment text to its deduplicated occurrences.
/// Fewer than two input texts yields an empty map; empty texts
/// participate but cannot contribute matches. Occurrences within a
/// single document never count as a match on their own.
pub fn find_shared_segments(texts: &[&str], min_len: usize) -> HashMap<String, Vec<Occurrence>> {
    if texts.len() < 2 {
        return HashMap::new();
    }

    // Corpus with per-offset owner bookkeeping. Each document contributes
    // its characters plus one trailing sentinel, all owned by it.
    let mut corpus: Vec<char> = Vec::new();
    let mut owner: Vec<usize> = Vec::new();
    let mut doc_starts = Vec::with_capacity(texts.len());
    let mut doc_lens = Vec::with_capacity(texts.len());
    for (i, text) in texts.iter().enumerate() {
        doc_starts.push(corpus.len());
        let before = corpus.len();
        corpus.extend(text.chars());
        doc_lens.push(corpus.len() - before);
        corpus.push(SENTINEL);
        owner.resize(corpus.len(), i);
    }

    let mut sa: Vec<usize> = (0..corpus.len()).collect();
    sa.sort_unstable_by(|&a, &b| corpus[a..].cmp(&corpus[b..]));

    // Adjacent pairs whose shared prefix is long enough and spans two
    // distinct documents.
    let mut candidates: Vec<Candidate> = Vec::new();
    for pair in sa.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let len = common_prefix_len(&corpus, a, b);
        if len < min_len {
            continue;
        }
        let (doc_a, doc_b) = (owner[a], owner[b]);
        if doc_a == doc_b {
            continue;
        }
        candidates.push(Candidate {
            repr: b,
            len,
            occs: [(a, doc_a), (b, doc_b)],
        });
    }

    // Longest-first maximality pass. A candidate whose every occurrence
    // span lies inside a span accepted for a longer segment is subsumed.
    // Spans are tracked as corpus-offset intervals rather than by
    // materializing each substring value, which keeps the pass linear in
    // accepted span count instead of quadratic in segment length.
    candidates.sort_by(|a, b| b.len.cmp(&a.len));

    let mut segments: HashMap<String, Vec<Occurrence>> = HashMap::new();
    let mut covered: Vec<(usize, usize)> = Vec::new();
    for cand in &candidates {
        let subsumed = cand
            .occs
            .iter()
            .all(|&(start, _)| span_covered(&covered, start, start + cand.len));
        if subsumed {
            continue;
        }

        let text: String = corpus[cand.repr..cand.repr + cand.len].iter().collect();
        let entry = segments.entry(text).or_default();
        for &(start, doc) in &cand.occs {
            entry.push(Occurrence {
                doc,
                start: start - doc_starts[doc],
                ratio: cand.len as f64 / doc_lens[doc] as f64,
            });
            covered.push((start, start + cand.len));
        }
    }

    // Merge pass bookkeeping: the same segment discovered through several
    // adjacent pairs shares occurrences; keep each (doc, start) once.
    for occs in segments.values_mut() {
        let mut seen = HashSet::new();
        occs.retain(|o| seen.insert((o.doc, o.start)));
    }
    segments.retain(|_, occs| occs.len() >= 2);

    segments
}

/// Length of the common prefix of the suffixes at `i` and `j`, stopping
/// at the sentinel so segments never include a document boundary.
fn common_prefix_len(corpus: &[char], mut i: usize, mut j: usize) -> usize {
    let mut len = 0;
    while i < corpus.len() && j < corpus.len() && corpus[i] == corpus[j] && corpus[i] != SENTINEL {
        len += 1;
        i += 1;
        j += 1;
    }
    len
}

fn span_covered(covered: &[(usize, usize)], start: usize, end: usize) -> bool {
    covered.iter().any(|&(s, e)| s <= start && end <= e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fewer_than_two_documents_is_empty() {
        assert!(find_shared_segments(&[], 4).is_empty());
        assert!(find_shared_segments(&["ABCDEFG"], 4).is_empty());
    }

    #[test]
    fn end_to_end_three_documents() {
        let segments = find_shared_segments(&["ABCDEFG", "XYZDEFGH", "QRS"], 4);
        assert_eq!(segments.len(), 1);

        let occs = &segments["DEFG"];
        assert_eq!(occs.len(), 2);
        assert!(occs.contains(&Occurrence {
            doc: 0,
            start: 3,
            ratio: 4.0 / 7.0
        }));
        assert!(occs.contains(&Occurrence {
            doc: 1,
            start: 3,
            ratio: 4.0 / 8.0
        }));
        assert!(occs.iter().all(|o| o.doc != 2));
    }

    #[test]
    fn repeats_within_one_document_are_not_matches() {
        let segments = find_shared_segments(&["ABCDABCD", "ZZZZZZ"], 4);
        assert!(segments.is_empty());
    }

    #[test]
    fn segments_never_cross_the_sentinel() {
        let segments = find_shared_segments(&["WXYZ", "WXYZ"], 4);
        assert_eq!(segments.len(), 1);
        let occs = &segments["WXYZ"];
        assert_eq!(occs.len(), 2);
        assert!(occs.iter().all(|o| o.ratio == 1.0));
    }

    #[test]
    fn shorter_candidates_are_subsumed_by_the_maximal_segment() {
        let segments = find_shared_segments(&["HELLO WORLD", "HELLO WORLD"], 4);
        // Every trailing sub-span ("ELLO WORLD", "LLO WORLD", ...) was a
        // candidate; only the maximal segment survives.
        assert_eq!(segments.len(), 1);
        assert!(segments.contains_key("HELLO WORLD"));
    }

    #[test]
    fn occurrences_merge_across_three_documents() {
        let segments = find_shared_segments(&["ABCD", "ABCD", "ABCD"], 4);
        assert_eq!(segments.len(), 1);

        let occs = &segments["ABCD"];
        assert_eq!(occs.len(), 3, "duplicate (doc, start) pairs must be dropped");
        let docs: HashSet<usize> = occs.iter().map(|o| o.doc).collect();
        assert_eq!(docs, HashSet::from([0, 1, 2]));
    }

    #[test]
    fn empty_documents_participate_harmlessly() {
        let segments = find_shared_segments(&["", "ABCD", "ABCD"], 4);
        assert_eq!(segments.len(), 1);
        assert!(segments["ABCD"].iter().all(|o| o.doc != 0));
    }

    #[test]
    fn min_len_threshold_applies() {
        assert!(find_shared_segments(&["ABC", "ABC"], 4).is_empty());
        assert_eq!(find_shared_segments(&["ABC", "ABC"], 3).len(), 1);
    }

    #[test]
    fn multibyte_offsets_are_character_counts() {
        let segments = find_shared_segments(&["前言：世界你好。", "结语、世界你好！"], 4);
        assert_eq!(segments.len(), 1);
        let occs = &segments["世界你好"];
        assert_eq!(occs.len(), 2);
        assert!(occs.iter().all(|o| o.start == 3));
        assert!(occs.iter().all(|o| o.ratio == 0.5));
    }
}
