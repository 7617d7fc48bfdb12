//! Document tree collection.
//!
//! Walks the configured documents root and pairs every matching source
//! file with its sidecar path. The sidecar path is the document path with
//! the configured suffix appended, so `report.pdf` persists to
//! `report.pdf.json` with the defaults.

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::PathBuf;
use walkdir::WalkDir;

use crate::config::Config;
use crate::models::DocEntry;

/// Collect all source documents under the configured root.
///
/// A missing root is an empty collection, not an error: nothing may have
/// been uploaded yet. Results are sorted by path for deterministic
/// ordering.
pub fn collect_documents(config: &Config) -> Result<Vec<DocEntry>> {
    let root = &config.documents.root;
    if !root.exists() {
        return Ok(Vec::new());
    }

    let include_set = build_globset(&config.documents.include_globs)?;
    let suffix = &config.documents.sidecar_suffix;

    let mut entries = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if !include_set.is_match(relative.to_string_lossy().as_ref()) {
            continue;
        }

        let sidecar = PathBuf::from(format!("{}{}", path.display(), suffix));
        entries.push(DocEntry {
            path: path.to_path_buf(),
            sidecar,
        });
    }

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
