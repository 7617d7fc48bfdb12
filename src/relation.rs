//! Overlap matrix and relation evidence builder.
//!
//! Consumes the engine's match occurrences, remaps each one into its
//! containing block via the position mapper, and accumulates a pairwise
//! overlap-contribution matrix plus the per-pair evidence list. The
//! matrix is structurally square and recorded symmetrically, but each
//! direction accumulates its own side's ratio, so the two mirror cells
//! generally hold different values.

use std::collections::{BTreeMap, HashMap};

use crate::engine::Occurrence;
use crate::models::{CompareReport, DocumentText, RelationEntry, SegmentSite};
use crate::position::floor_breakpoint;

/// Build the compare report from engine output.
///
/// `docs` are the parsed documents the engine ran over, indexed by the
/// occurrences' document indices. `all_names` seeds the matrices, so
/// documents that were collected but never parsed still appear with zero
/// rows and columns.
///
/// Per segment the pairwise pass is quadratic in occurrence count, which
/// is bounded by the document count.
pub fn build_report(
    segments: &HashMap<String, Vec<Occurrence>>,
    docs: &[DocumentText],
    all_names: &[String],
) -> CompareReport {
    let mut ratio_matrix: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
    let mut relation_matrix: BTreeMap<String, BTreeMap<String, Vec<RelationEntry>>> =
        BTreeMap::new();
    for a in all_names {
        let zero_row = all_names.iter().map(|b| (b.clone(), 0.0)).collect();
        let empty_row = all_names.iter().map(|b| (b.clone(), Vec::new())).collect();
        ratio_matrix.insert(a.clone(), zero_row);
        relation_matrix.insert(a.clone(), empty_row);
    }

    let mut same_segments: BTreeMap<String, Vec<SegmentSite>> = BTreeMap::new();

    // BTreeMap ordering keeps the accumulation deterministic run to run.
    let ordered: BTreeMap<&String, &Vec<Occurrence>> = segments.iter().collect();
    for (segment, occurrences) in ordered {
        let mut sites: Vec<SegmentSite> = Vec::with_capacity(occurrences.len());
        for occ in occurrences {
            let doc = &docs[occ.doc];
            let breakpoints: Vec<usize> = doc.blocks.iter().map(|(start, _)| *start).collect();
            let Some(block_start) = floor_breakpoint(&breakpoints, occ.start as i64) else {
                eprintln!(
                    "Warning: no containing block for offset {} in {}",
                    occ.start, doc.name
                );
                continue;
            };
            // The breakpoint came from the block list, so the lookup
            // always succeeds.
            let Some((_, block)) = doc.blocks.iter().find(|(start, _)| *start == block_start)
            else {
                continue;
            };
            sites.push(SegmentSite {
                file: doc.name.clone(),
                block: block.clone(),
                local_offset: occ.start - block_start,
                ratio: occ.ratio,
            });
        }

        for i in 0..sites.len() {
            for j in (i + 1)..sites.len() {
                let (a, b) = (&sites[i], &sites[j]);
                if a.file == b.file {
                    // A segment repeated within one document carries no
                    // cross-document evidence; self entries stay zero.
                    continue;
                }
                *ratio_matrix
                    .entry(a.file.clone())
                    .or_default()
                    .entry(b.file.clone())
                    .or_insert(0.0) += a.ratio;
                *ratio_matrix
                    .entry(b.file.clone())
                    .or_default()
                    .entry(a.file.clone())
                    .or_insert(0.0) += b.ratio;
                relation_matrix
                    .entry(a.file.clone())
                    .or_default()
                    .entry(b.file.clone())
                    .or_default()
                    .push(RelationEntry {
                        segment: segment.clone(),
                        block_a: a.block.clone(),
                        block_b: b.block.clone(),
                        ratio: a.ratio,
                    });
                relation_matrix
                    .entry(b.file.clone())
                    .or_default()
                    .entry(a.file.clone())
                    .or_default()
                    .push(RelationEntry {
                        segment: segment.clone(),
                        block_a: b.block.clone(),
                        block_b: a.block.clone(),
                        ratio: b.ratio,
                    });
            }
        }

        same_segments.insert(segment.clone(), sites);
    }

    CompareReport {
        same_segments,
        ratio_matrix,
        relation_matrix,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TextBlock;

    fn block(text: &str, page: i64) -> TextBlock {
        TextBlock {
            block_type: "text".to_string(),
            text: text.to_string(),
            page_idx: page,
            bbox: vec![0.0, 0.0, 1.0, 1.0],
        }
    }

    fn doc(name: &str, blocks: &[(&str, i64)]) -> DocumentText {
        let mut start = 0;
        let mut out = Vec::new();
        let mut text = String::new();
        for (block_text, page) in blocks {
            out.push((start, block(block_text, *page)));
            start += block_text.chars().count();
            text.push_str(block_text);
        }
        DocumentText {
            name: name.to_string(),
            text,
            blocks: out,
        }
    }

    fn shared_segment_fixture() -> (HashMap<String, Vec<Occurrence>>, Vec<DocumentText>) {
        // Documents 0 and 1 share "DEFG"; document 2 shares nothing.
        let docs = vec![
            doc("a.pdf", &[("ABC", 0), ("DEFG", 1)]),
            doc("b.pdf", &[("XYZDEFGH", 0)]),
            doc("c.pdf", &[("QRS", 0)]),
        ];
        let mut segments = HashMap::new();
        segments.insert(
            "DEFG".to_string(),
            vec![
                Occurrence {
                    doc: 0,
                    start: 3,
                    ratio: 4.0 / 7.0,
                },
                Occurrence {
                    doc: 1,
                    start: 3,
                    ratio: 4.0 / 8.0,
                },
            ],
        );
        (segments, docs)
    }

    #[test]
    fn matrix_is_symmetrically_recorded() {
        let (segments, docs) = shared_segment_fixture();
        let names: Vec<String> = docs.iter().map(|d| d.name.clone()).collect();
        let report = build_report(&segments, &docs, &names);

        assert_eq!(report.ratio_matrix["a.pdf"]["b.pdf"], 4.0 / 7.0);
        assert_eq!(report.ratio_matrix["b.pdf"]["a.pdf"], 4.0 / 8.0);
        assert_eq!(report.relation_matrix["a.pdf"]["b.pdf"].len(), 1);
        assert_eq!(report.relation_matrix["b.pdf"]["a.pdf"].len(), 1);

        let forward = &report.relation_matrix["a.pdf"]["b.pdf"][0];
        assert_eq!(forward.segment, "DEFG");
        assert_eq!(forward.block_a.text, "DEFG");
        assert_eq!(forward.block_b.text, "XYZDEFGH");
        assert_eq!(forward.ratio, 4.0 / 7.0);
    }

    #[test]
    fn uninvolved_documents_have_zero_rows() {
        let (segments, docs) = shared_segment_fixture();
        let names: Vec<String> = docs.iter().map(|d| d.name.clone()).collect();
        let report = build_report(&segments, &docs, &names);

        for other in ["a.pdf", "b.pdf", "c.pdf"] {
            assert_eq!(report.ratio_matrix["c.pdf"][other], 0.0);
            assert_eq!(report.ratio_matrix[other]["c.pdf"], 0.0);
            assert!(report.relation_matrix["c.pdf"][other].is_empty());
        }
        assert_eq!(report.ratio_matrix["a.pdf"]["a.pdf"], 0.0);
    }

    #[test]
    fn occurrences_map_to_containing_blocks() {
        let (segments, docs) = shared_segment_fixture();
        let names: Vec<String> = docs.iter().map(|d| d.name.clone()).collect();
        let report = build_report(&segments, &docs, &names);

        let sites = &report.same_segments["DEFG"];
        assert_eq!(sites.len(), 2);
        let a_site = sites.iter().find(|s| s.file == "a.pdf").unwrap();
        // Offset 3 lands at the start of the second block.
        assert_eq!(a_site.block.page_idx, 1);
        assert_eq!(a_site.local_offset, 0);
        let b_site = sites.iter().find(|s| s.file == "b.pdf").unwrap();
        assert_eq!(b_site.local_offset, 3);
    }

    #[test]
    fn unparsed_documents_are_still_seeded() {
        let (segments, docs) = shared_segment_fixture();
        let mut names: Vec<String> = docs.iter().map(|d| d.name.clone()).collect();
        names.push("pending.pdf".to_string());
        let report = build_report(&segments, &docs, &names);

        assert_eq!(report.ratio_matrix["pending.pdf"].len(), 4);
        assert_eq!(report.ratio_matrix["pending.pdf"]["a.pdf"], 0.0);
        assert!(report.relation_matrix["a.pdf"]["pending.pdf"].is_empty());
    }
}
