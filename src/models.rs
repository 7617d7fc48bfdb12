//! Core data types shared across the scan and compare pipelines.
//!
//! The sidecar shapes ([`ParsedDocument`], [`TextBlock`]) mirror what the
//! external parsing service returns and are persisted verbatim; everything
//! else is internal state or a report surfaced over the HTTP API.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::parser_client::JobHandle;

/// A single structured text block from a parsed document sidecar.
///
/// Only blocks with `type == "text"` participate in comparison; other
/// block types (tables, figures, equations) are carried through untouched
/// when the sidecar is persisted but never enter the corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub text: String,
    /// Zero-based page number within the source document.
    #[serde(default)]
    pub page_idx: i64,
    /// Bounding box on the page as `[x0, y0, x1, y1]`.
    #[serde(default)]
    pub bbox: Vec<f64>,
}

impl TextBlock {
    pub fn is_text(&self) -> bool {
        self.block_type == "text"
    }
}

/// Sidecar artifact shape: the parsed result as returned by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub metadata: ParsedMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedMetadata {
    #[serde(default)]
    pub text_block: Vec<TextBlock>,
}

/// A source document discovered in the document tree, paired with the
/// sidecar path its parsed result lives (or will live) at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocEntry {
    pub path: PathBuf,
    pub sidecar: PathBuf,
}

/// A parsed document flattened for comparison: the concatenation of its
/// text blocks plus the breakpoint metadata needed to map flat offsets
/// back into blocks.
#[derive(Debug, Clone)]
pub struct DocumentText {
    /// Document identity used as the matrix key (path string).
    pub name: String,
    /// Concatenated text of all `"text"` blocks, in sidecar order.
    pub text: String,
    /// `(start_offset, block)` pairs, ordered by start offset. Offsets
    /// are character counts into `text`.
    pub blocks: Vec<(usize, TextBlock)>,
}

/// Lifecycle state of a document inside the scan pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanState {
    /// Discovered, not yet submitted to the parsing service.
    Pending,
    /// Submitted; the remote job has not started processing yet.
    Queued,
    /// The remote job is running and reporting page progress.
    Progressing,
    /// The sidecar artifact exists; the document is ready for comparison.
    Completed,
    /// The remote job failed. Absorbing until the next full collect.
    Error,
}

/// Human-readable state plus message, as surfaced in status reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusDetail {
    pub state: ScanState,
    pub message: String,
}

impl StatusDetail {
    pub fn new(state: ScanState, message: impl Into<String>) -> Self {
        Self {
            state,
            message: message.into(),
        }
    }
}

/// Mutable per-document record owned by the scan orchestrator.
///
/// Created during collection, mutated only under the orchestrator's lock,
/// replaced wholesale by the next collect.
#[derive(Debug, Clone)]
pub struct DocumentStatus {
    /// Display name (file name component of the path).
    pub name: String,
    pub path: PathBuf,
    pub sidecar: PathBuf,
    /// Remote job handle once a parse job has been submitted.
    pub job: Option<JobHandle>,
    pub status: StatusDetail,
    /// Progress percent in `0..=100`.
    pub progress: u8,
}

/// Per-file entry in the status report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStatus {
    pub name: String,
    pub status: StatusDetail,
    pub progress: u8,
}

/// Snapshot of every tracked document plus the derived readiness flags
/// that gate whether a compare is meaningful.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanStatusReport {
    pub files: Vec<FileStatus>,
    /// More than one document completed. Kept as the observed contract;
    /// the front end gates the compare button on this.
    pub partial_done: bool,
    pub all_done: bool,
}

/// One occurrence of a shared segment, remapped into document structure.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentSite {
    /// Document identity (path string, matrix key).
    pub file: String,
    /// The block containing the occurrence.
    pub block: TextBlock,
    /// Character offset of the segment within the block's text.
    pub local_offset: usize,
    /// Segment length over document text length, in `(0, 1]`.
    pub ratio: f64,
}

/// Evidence for one shared segment between a document pair, recorded in
/// both directions.
#[derive(Debug, Clone, Serialize)]
pub struct RelationEntry {
    pub segment: String,
    pub block_a: TextBlock,
    pub block_b: TextBlock,
    /// The ratio of the occurrence on the `a` side of this direction.
    pub ratio: f64,
}

/// Result of the compare query.
///
/// All matrix maps are pre-seeded with zero or empty entries for every
/// known document, so consumers never see a missing key. `BTreeMap` keeps
/// the JSON rendering deterministic.
#[derive(Debug, Clone, Serialize)]
pub struct CompareReport {
    /// Shared segment text to its remapped occurrences.
    pub same_segments: BTreeMap<String, Vec<SegmentSite>>,
    /// Accumulated overlap contribution per document pair. Structurally
    /// square; each direction accumulates its own side's ratio.
    pub ratio_matrix: BTreeMap<String, BTreeMap<String, f64>>,
    /// Per-pair evidence entries, mirrored across both directions.
    pub relation_matrix: BTreeMap<String, BTreeMap<String, Vec<RelationEntry>>>,
}
