//! Compare query over parsed sidecars.
//!
//! Loads every completed sidecar, flattens each document's `"text"`
//! blocks into its comparison text while recording block breakpoints,
//! runs the exact-match engine, and assembles the overlap report. Pure
//! read-only computation: it only consumes sidecar files the
//! orchestrator has already persisted, so it is safe to run while a scan
//! is in flight.

use anyhow::{Context, Result};

use crate::collect::collect_documents;
use crate::config::Config;
use crate::engine::find_shared_segments;
use crate::models::{CompareReport, DocEntry, DocumentText, ParsedDocument};
use crate::relation::build_report;

/// Load the flattened text of every document whose sidecar exists.
///
/// Unreadable or malformed sidecars are skipped with a warning rather
/// than failing the batch; the affected document is simply excluded from
/// comparison. Non-`"text"` blocks never enter the corpus.
pub fn load_parsed_documents(entries: &[DocEntry]) -> Vec<DocumentText> {
    let mut docs = Vec::new();
    for entry in entries {
        if !entry.sidecar.exists() {
            continue;
        }
        let parsed = match read_sidecar(entry) {
            Ok(parsed) => parsed,
            Err(err) => {
                eprintln!(
                    "Warning: skipping malformed sidecar {}: {}",
                    entry.sidecar.display(),
                    err
                );
                continue;
            }
        };

        let mut text = String::new();
        let mut blocks = Vec::new();
        let mut start = 0;
        for block in parsed.metadata.text_block {
            if !block.is_text() {
                continue;
            }
            let len = block.text.chars().count();
            text.push_str(&block.text);
            blocks.push((start, block));
            start += len;
        }

        docs.push(DocumentText {
            name: entry.path.to_string_lossy().to_string(),
            text,
            blocks,
        });
    }
    docs
}

fn read_sidecar(entry: &DocEntry) -> Result<ParsedDocument> {
    let content = std::fs::read_to_string(&entry.sidecar)?;
    Ok(serde_json::from_str(&content)?)
}

/// Run the full compare: collect, load sidecars, match, remap.
///
/// The report is seeded for every collected document, parsed or not, so
/// consumers always find a row per known document. With fewer than two
/// parsed documents the engine yields nothing and the report is all
/// zeros.
pub fn run_compare(config: &Config) -> Result<CompareReport> {
    let entries = collect_documents(config)?;
    let all_names: Vec<String> = entries
        .iter()
        .map(|e| e.path.to_string_lossy().to_string())
        .collect();
    let docs = load_parsed_documents(&entries);

    let texts: Vec<&str> = docs.iter().map(|d| d.text.as_str()).collect();
    let segments = find_shared_segments(&texts, config.engine.min_match_len);

    Ok(build_report(&segments, &docs, &all_names))
}

/// CLI wrapper: run the compare and print the report as pretty JSON.
pub fn run_compare_cli(config: &Config) -> Result<()> {
    let report = run_compare(config)?;
    let json = serde_json::to_string_pretty(&report).context("serializing compare report")?;
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DocumentsConfig, EngineConfig, ParserConfig, ServerConfig};
    use serde_json::json;
    use std::fs;
    use std::path::PathBuf;

    fn test_config(root: PathBuf) -> Config {
        Config {
            documents: DocumentsConfig {
                root,
                include_globs: vec!["**/*.pdf".to_string()],
                sidecar_suffix: ".json".to_string(),
            },
            parser: ParserConfig {
                url: "http://parser.local/".to_string(),
                username: "u".to_string(),
                token: "t".to_string(),
                result_dir: "result".to_string(),
                timeout_secs: 30,
                poll_interval_ms: 500,
                idle_interval_ms: 1000,
            },
            engine: EngineConfig::default(),
            server: ServerConfig {
                bind: "127.0.0.1:0".to_string(),
            },
        }
    }

    fn write_document(root: &std::path::Path, name: &str, blocks: &[(&str, &str)]) {
        fs::write(root.join(name), b"pdf").unwrap();
        let text_blocks: Vec<_> = blocks
            .iter()
            .enumerate()
            .map(|(i, (block_type, text))| {
                json!({
                    "type": block_type,
                    "text": text,
                    "page_idx": i,
                    "bbox": [0.0, 0.0, 100.0, 20.0]
                })
            })
            .collect();
        let sidecar = json!({"metadata": {"text_block": text_blocks}});
        fs::write(
            root.join(format!("{name}.json")),
            serde_json::to_string(&sidecar).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn flattens_text_blocks_and_skips_others() {
        let tmp = tempfile::TempDir::new().unwrap();
        write_document(
            tmp.path(),
            "a.pdf",
            &[("text", "ABC"), ("figure", "CAPTION"), ("text", "DEFG")],
        );

        let config = test_config(tmp.path().to_path_buf());
        let entries = collect_documents(&config).unwrap();
        let docs = load_parsed_documents(&entries);

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "ABCDEFG");
        assert_eq!(docs[0].blocks.len(), 2);
        assert_eq!(docs[0].blocks[0].0, 0);
        assert_eq!(docs[0].blocks[1].0, 3);
    }

    #[test]
    fn malformed_sidecars_are_skipped() {
        let tmp = tempfile::TempDir::new().unwrap();
        write_document(tmp.path(), "good.pdf", &[("text", "ABCD")]);
        fs::write(tmp.path().join("bad.pdf"), b"pdf").unwrap();
        fs::write(tmp.path().join("bad.pdf.json"), b"not json at all").unwrap();

        let config = test_config(tmp.path().to_path_buf());
        let entries = collect_documents(&config).unwrap();
        let docs = load_parsed_documents(&entries);

        assert_eq!(docs.len(), 1);
        assert!(docs[0].name.ends_with("good.pdf"));
    }

    #[test]
    fn compare_reports_shared_segment_with_block_evidence() {
        let tmp = tempfile::TempDir::new().unwrap();
        write_document(tmp.path(), "a.pdf", &[("text", "ABC"), ("text", "DEFG")]);
        write_document(tmp.path(), "b.pdf", &[("text", "XYZDEFGH")]);
        write_document(tmp.path(), "c.pdf", &[("text", "QRS")]);

        let config = test_config(tmp.path().to_path_buf());
        let report = run_compare(&config).unwrap();

        assert_eq!(report.same_segments.len(), 1);
        let sites = &report.same_segments["DEFG"];
        assert_eq!(sites.len(), 2);

        let a_name = tmp.path().join("a.pdf").to_string_lossy().to_string();
        let b_name = tmp.path().join("b.pdf").to_string_lossy().to_string();
        let c_name = tmp.path().join("c.pdf").to_string_lossy().to_string();

        let a_site = sites.iter().find(|s| s.file == a_name).unwrap();
        assert_eq!(a_site.block.text, "DEFG");
        assert_eq!(a_site.block.page_idx, 1);
        assert_eq!(a_site.local_offset, 0);

        assert_eq!(report.ratio_matrix[&a_name][&b_name], 4.0 / 7.0);
        assert_eq!(report.ratio_matrix[&b_name][&a_name], 4.0 / 8.0);
        assert_eq!(report.ratio_matrix[&c_name][&a_name], 0.0);
        assert_eq!(report.relation_matrix[&a_name][&b_name].len(), 1);
    }

    #[test]
    fn unparsed_documents_still_get_matrix_rows() {
        let tmp = tempfile::TempDir::new().unwrap();
        write_document(tmp.path(), "a.pdf", &[("text", "ABCD")]);
        // No sidecar for this one.
        fs::write(tmp.path().join("pending.pdf"), b"pdf").unwrap();

        let config = test_config(tmp.path().to_path_buf());
        let report = run_compare(&config).unwrap();

        assert!(report.same_segments.is_empty());
        let pending = tmp.path().join("pending.pdf").to_string_lossy().to_string();
        assert_eq!(report.ratio_matrix[&pending].len(), 2);
    }
}
