//! HTTP API.
//!
//! Exposes the scan pipeline and the compare query as a JSON HTTP API for
//! the web front end.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/backend/upload` | Upload a zip archive of documents |
//! | `POST` | `/backend/cleanup` | Clear the document tree |
//! | `POST` | `/backend/collect` | Re-walk the document tree |
//! | `POST` | `/backend/scan` | Ensure the scan worker is running |
//! | `GET`  | `/backend/scan/status` | Per-document scan progress |
//! | `GET`  | `/backend/compare` | Overlap report over parsed documents |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses carry a JSON body:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "only zip archives are accepted" } }
//! ```
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted; the front end is
//! served from a different origin during development.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::compare::run_compare;
use crate::config::Config;
use crate::scan::ScanOrchestrator;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    orchestrator: Arc<ScanOrchestrator>,
}

/// Start the HTTP server on the configured bind address.
///
/// Runs until the process is terminated. The orchestrator instance is
/// shared with the background scan worker; this function never spawns
/// the worker itself, the `/backend/scan` endpoint does.
pub async fn run_server(config: &Config, orchestrator: Arc<ScanOrchestrator>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState {
        config: Arc::new(config.clone()),
        orchestrator,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/backend/upload", post(handle_upload))
        .route("/backend/cleanup", post(handle_cleanup))
        .route("/backend/collect", post(handle_collect))
        .route("/backend/scan", post(handle_scan_start))
        .route("/backend/scan/status", get(handle_scan_status))
        .route("/backend/compare", get(handle_compare))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("overlap-scan server listening on http://{bind_addr}");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ Handlers ============

/// `POST /backend/upload` — accept a zip archive and extract it into the
/// documents root, then re-collect.
async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        if !file_name.ends_with(".zip") {
            return Err(bad_request("only zip archives are accepted"));
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("failed to read upload: {e}")))?;

        let root = state.config.documents.root.clone();
        let extracted = tokio::task::spawn_blocking(move || extract_zip(&bytes, &root))
            .await
            .map_err(|e| internal(e.to_string()))?
            .map_err(|e| bad_request(e.to_string()))?;

        let tracked = state
            .orchestrator
            .collect()
            .map_err(|e| internal(e.to_string()))?;
        return Ok(Json(json!({
            "message": "archive uploaded and extracted",
            "extracted": extracted,
            "tracked": tracked,
        })));
    }
    Err(bad_request("missing 'file' field"))
}

/// `POST /backend/cleanup` — clear the documents root and drop all
/// tracked state.
async fn handle_cleanup(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = &state.config.documents.root;
    if root.exists() {
        tokio::fs::remove_dir_all(root)
            .await
            .map_err(|e| internal(e.to_string()))?;
    }
    tokio::fs::create_dir_all(root)
        .await
        .map_err(|e| internal(e.to_string()))?;

    state
        .orchestrator
        .collect()
        .map_err(|e| internal(e.to_string()))?;
    Ok(Json(json!({ "message": "documents root cleared" })))
}

/// `POST /backend/collect` — re-walk the document tree.
async fn handle_collect(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let tracked = state
        .orchestrator
        .collect()
        .map_err(|e| internal(e.to_string()))?;
    Ok(Json(json!({ "tracked": tracked })))
}

/// `POST /backend/scan` — idempotently ensure the scan worker runs.
async fn handle_scan_start(State(state): State<AppState>) -> Json<serde_json::Value> {
    let started = state.orchestrator.start();
    Json(json!({ "started": started }))
}

/// `GET /backend/scan/status` — live per-document progress.
async fn handle_scan_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.orchestrator.status())
}

/// `GET /backend/compare` — run the overlap computation.
///
/// Rejected until more than one document has completed parsing; a
/// comparison over fewer documents cannot produce matches.
async fn handle_compare(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let report = state.orchestrator.status();
    if !report.partial_done {
        return Err(bad_request(
            "fewer than two documents have completed parsing",
        ));
    }

    // CPU-bound; keep it off the runtime worker threads.
    let config = state.config.clone();
    let report = tokio::task::spawn_blocking(move || run_compare(&config))
        .await
        .map_err(|e| internal(e.to_string()))?
        .map_err(|e| internal(e.to_string()))?;

    serde_json::to_value(&report)
        .map(Json)
        .map_err(|e| internal(e.to_string()))
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ============ Zip extraction ============

/// Extract an uploaded archive into the documents root, preserving
/// nested paths. Entries whose names would escape the destination are
/// rejected outright.
fn extract_zip(bytes: &[u8], dest: &Path) -> anyhow::Result<usize> {
    let reader = std::io::Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(reader)?;

    let mut extracted = 0;
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let Some(relative) = file.enclosed_name() else {
            anyhow::bail!("archive entry escapes the destination: {}", file.name());
        };
        let out_path = dest.join(relative);

        if file.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = std::fs::File::create(&out_path)?;
        std::io::copy(&mut file, &mut out)?;
        extracted += 1;
    }
    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn make_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            for (name, content) in entries {
                writer
                    .start_file(name.to_string(), SimpleFileOptions::default())
                    .unwrap();
                writer.write_all(content).unwrap();
            }
            writer.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn extracts_nested_entries() {
        let tmp = tempfile::TempDir::new().unwrap();
        let bytes = make_zip(&[("a.pdf", b"one"), ("nested/b.pdf", b"two")]);

        let extracted = extract_zip(&bytes, tmp.path()).unwrap();
        assert_eq!(extracted, 2);
        assert_eq!(std::fs::read(tmp.path().join("a.pdf")).unwrap(), b"one");
        assert_eq!(
            std::fs::read(tmp.path().join("nested/b.pdf")).unwrap(),
            b"two"
        );
    }

    #[test]
    fn rejects_traversal_entries() {
        let tmp = tempfile::TempDir::new().unwrap();
        let bytes = make_zip(&[("../escape.pdf", b"nope")]);
        assert!(extract_zip(&bytes, tmp.path()).is_err());
    }
}
