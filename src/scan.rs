//! Scan orchestrator.
//!
//! Owns the per-document state machine that drives every collected
//! document through the external parsing pipeline:
//!
//! ```text
//! pending ──▶ queued ──▶ progressing ──▶ completed
//!                │             │
//!                └──────▶ error ◀──────┘
//! ```
//!
//! `completed` is also reached directly at collection time when the
//! sidecar artifact already exists. A single background worker submits
//! and polls jobs sequentially; all mutation of the status map happens
//! under one mutex held only for the per-document critical section,
//! never across an external call. No error of any kind aborts the worker
//! loop: transient submit and poll failures are retried on the next
//! pass, a remote `failed` verdict parks the document in `error` until
//! the next full collect, and unknown remote statuses are logged no-ops.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::collect::collect_documents;
use crate::config::Config;
use crate::models::{DocumentStatus, FileStatus, ScanState, ScanStatusReport, StatusDetail};
use crate::parser_client::{JobHandle, JobState, ParseClient};

const MSG_AWAITING: &str = "found file awaiting scan";
const MSG_EXISTING: &str = "found existing scan result";
const MSG_QUEUED: &str = "scan job queued";
const MSG_FINISHED: &str = "scan finished";

/// What the worker decided to do with one document this tick.
enum Tick {
    /// Nothing to do (completed, errored, or just transitioned).
    Skip,
    /// The document vanished from tracking; a collect replaced the map
    /// mid-pass, so stop this pass and take a fresh snapshot.
    Halt,
    /// No job handle yet: submit a parse job.
    Submit,
    /// Poll the existing job.
    Poll(JobHandle),
}

/// Drives documents through the external parsing pipeline and exposes
/// live per-document progress.
///
/// One instance is shared (via `Arc`) between the HTTP server and the
/// background worker; there are no process-wide singletons.
pub struct ScanOrchestrator {
    config: Config,
    client: Arc<dyn ParseClient>,
    statuses: Mutex<HashMap<PathBuf, DocumentStatus>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ScanOrchestrator {
    pub fn new(config: Config, client: Arc<dyn ParseClient>) -> Self {
        Self {
            config,
            client,
            statuses: Mutex::new(HashMap::new()),
            worker: Mutex::new(None),
        }
    }

    fn lock_statuses(&self) -> MutexGuard<'_, HashMap<PathBuf, DocumentStatus>> {
        self.statuses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the entire status map from a fresh walk of the document
    /// tree. Documents whose sidecar already exists start out
    /// `completed`; everything else starts `pending` with no job handle.
    ///
    /// Returns the number of tracked documents.
    pub fn collect(&self) -> Result<usize> {
        let entries = collect_documents(&self.config).context("document collection failed")?;

        let mut map = HashMap::with_capacity(entries.len());
        for entry in entries {
            let name = entry
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let completed = entry.sidecar.exists();
            map.insert(
                entry.path.clone(),
                DocumentStatus {
                    name,
                    path: entry.path,
                    sidecar: entry.sidecar,
                    job: None,
                    status: if completed {
                        StatusDetail::new(ScanState::Completed, MSG_EXISTING)
                    } else {
                        StatusDetail::new(ScanState::Pending, MSG_AWAITING)
                    },
                    progress: if completed { 100 } else { 0 },
                },
            );
        }

        let count = map.len();
        *self.lock_statuses() = map;
        Ok(count)
    }

    /// Idempotently ensure exactly one background worker is running.
    ///
    /// Returns `true` when a worker was spawned. A second call while one
    /// is alive is a no-op; a worker that has died is respawned, so the
    /// idempotent-start contract stays meaningful after a panic.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut worker = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(handle) = worker.as_ref() {
            if !handle.is_finished() {
                return false;
            }
        }
        let orchestrator = Arc::clone(self);
        *worker = Some(tokio::spawn(orchestrator.worker_loop()));
        true
    }

    /// Snapshot of every tracked document plus the derived readiness
    /// flags gating the compare query.
    pub fn status(&self) -> ScanStatusReport {
        let statuses = self.lock_statuses();
        let mut files: Vec<FileStatus> = statuses
            .values()
            .map(|doc| FileStatus {
                name: doc.name.clone(),
                status: doc.status.clone(),
                progress: doc.progress,
            })
            .collect();
        files.sort_by(|a, b| a.name.cmp(&b.name));

        let completed = statuses
            .values()
            .filter(|doc| doc.status.state == ScanState::Completed)
            .count();
        ScanStatusReport {
            files,
            partial_done: completed > 1,
            all_done: completed == statuses.len(),
        }
    }

    async fn worker_loop(self: Arc<Self>) {
        loop {
            let paths: Vec<PathBuf> = {
                let statuses = self.lock_statuses();
                let mut paths: Vec<_> = statuses.keys().cloned().collect();
                paths.sort();
                paths
            };

            if paths.is_empty() {
                sleep(Duration::from_millis(self.config.parser.idle_interval_ms)).await;
                continue;
            }

            for path in paths {
                let tick = {
                    let mut statuses = self.lock_statuses();
                    match statuses.get_mut(&path) {
                        None => Tick::Halt,
                        Some(doc) => {
                            if matches!(doc.status.state, ScanState::Completed | ScanState::Error) {
                                Tick::Skip
                            } else if doc.sidecar.exists() {
                                // Produced out of band; nothing to drive.
                                doc.status = StatusDetail::new(ScanState::Completed, MSG_EXISTING);
                                doc.progress = 100;
                                Tick::Skip
                            } else if let Some(handle) = doc.job.clone() {
                                Tick::Poll(handle)
                            } else {
                                Tick::Submit
                            }
                        }
                    }
                };

                match tick {
                    Tick::Halt => break,
                    Tick::Skip => {}
                    Tick::Submit => self.submit_document(&path).await,
                    Tick::Poll(handle) => self.poll_document(&path, &handle).await,
                }

                // Throttle the polling rate.
                sleep(Duration::from_millis(self.config.parser.poll_interval_ms)).await;
            }
        }
    }

    async fn submit_document(&self, path: &Path) {
        match self.client.submit(path).await {
            Ok(handle) => {
                let mut statuses = self.lock_statuses();
                if let Some(doc) = statuses.get_mut(path) {
                    doc.job = Some(handle);
                    doc.status = StatusDetail::new(ScanState::Queued, MSG_QUEUED);
                    doc.progress = 0;
                }
            }
            Err(err) => {
                // Transient: the document stays pending and the submit is
                // retried on the next pass.
                eprintln!("Warning: submit failed for {}: {}", path.display(), err);
            }
        }
    }

    async fn poll_document(&self, path: &Path, handle: &JobHandle) {
        let state = match self.client.poll(handle).await {
            Ok(state) => state,
            Err(err) => {
                eprintln!("Warning: poll failed for {}: {}", path.display(), err);
                return;
            }
        };

        match state {
            JobState::Started {
                stage,
                page_id,
                total_page,
            } => {
                let message = progress_message(stage.as_deref(), page_id, total_page);
                let percent = progress_percent(page_id, total_page);
                let mut statuses = self.lock_statuses();
                if let Some(doc) = statuses.get_mut(path) {
                    doc.status = StatusDetail::new(ScanState::Progressing, message);
                    doc.progress = percent;
                }
            }
            JobState::Finished => {
                let result = match self.client.fetch(handle).await {
                    Ok(result) => result,
                    Err(err) => {
                        eprintln!("Warning: fetch failed for {}: {}", path.display(), err);
                        return;
                    }
                };
                let sidecar = self.lock_statuses().get(path).map(|doc| doc.sidecar.clone());
                let Some(sidecar) = sidecar else {
                    return;
                };
                if let Err(err) = write_sidecar(&sidecar, &result).await {
                    eprintln!(
                        "Warning: failed to persist sidecar {}: {}",
                        sidecar.display(),
                        err
                    );
                    return;
                }
                let mut statuses = self.lock_statuses();
                if let Some(doc) = statuses.get_mut(path) {
                    doc.status = StatusDetail::new(ScanState::Completed, MSG_FINISHED);
                    doc.progress = 100;
                }
            }
            JobState::Failed { message } => {
                // Terminal for this document until the next collect.
                let mut statuses = self.lock_statuses();
                if let Some(doc) = statuses.get_mut(path) {
                    doc.status = StatusDetail::new(ScanState::Error, message);
                }
            }
            JobState::Queued | JobState::Cancelled => {}
            JobState::Unknown { raw } => {
                eprintln!(
                    "Warning: unknown parse status for {}: {}",
                    path.display(),
                    raw
                );
            }
        }
    }
}

/// Overwrite the sidecar artifact with the fetched structured result.
async fn write_sidecar(sidecar: &Path, result: &serde_json::Value) -> Result<()> {
    let bytes = serde_json::to_vec(result)?;
    tokio::fs::write(sidecar, bytes)
        .await
        .with_context(|| format!("writing {}", sidecar.display()))?;
    Ok(())
}

/// Progress percent from the remote page counters: floored page/total,
/// negative pages clamped to zero, zero total reported as zero.
fn progress_percent(page_id: i64, total_page: i64) -> u8 {
    let page = page_id.max(0);
    if total_page > 0 {
        ((page * 100) / total_page).clamp(0, 100) as u8
    } else {
        0
    }
}

fn progress_message(stage: Option<&str>, page_id: i64, total_page: i64) -> String {
    let page = page_id.max(0);
    match stage {
        Some(stage) => format!("parsing stage: {stage} [{page} / {total_page}]"),
        None => "parse progress unknown".to_string(),
    }
}
