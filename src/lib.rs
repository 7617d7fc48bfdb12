//! # Overlap Scan
//!
//! Exact duplicate-passage detection across a collection of scanned
//! documents.
//!
//! Documents (typically PDFs) are parsed into structured text blocks by an
//! external parsing service. Once parsed results are persisted as sidecar
//! files next to each document, the engine finds every maximal substring
//! shared verbatim between two or more documents, maps each occurrence back
//! to its page and bounding box, and aggregates a pairwise overlap matrix
//! with per-pair evidence.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌───────────┐
//! │ Document │──▶│    Scan      │──▶│  Sidecar  │
//! │   tree   │   │ Orchestrator │   │   files   │
//! └──────────┘   └──────┬───────┘   └─────┬─────┘
//!                       │                 │
//!                ┌──────▼───────┐   ┌─────▼─────┐
//!                │   Parsing    │   │  Compare  │
//!                │   service    │   │  (engine) │
//!                └──────────────┘   └───────────┘
//! ```
//!
//! The orchestrator drives each document through the remote parsing
//! pipeline (submit, poll, fetch) on a single background worker, exposing
//! live per-document progress. The compare query is a pure computation over
//! the persisted sidecars: suffix-array common-substring discovery followed
//! by position remapping into document structure.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types and report shapes |
//! | [`collect`] | Document tree collection |
//! | [`position`] | Offset-to-block floor mapping |
//! | [`engine`] | Suffix-array exact-match engine |
//! | [`relation`] | Overlap matrix and evidence builder |
//! | [`parser_client`] | External parsing service client |
//! | [`scan`] | Scan orchestrator state machine |
//! | [`compare`] | Compare query over parsed sidecars |
//! | [`server`] | HTTP API |

pub mod collect;
pub mod compare;
pub mod config;
pub mod engine;
pub mod models;
pub mod parser_client;
pub mod position;
pub mod relation;
pub mod scan;
pub mod server;
