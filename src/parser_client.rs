//! External parsing service client.
//!
//! The parsing service converts uploaded documents into structured text
//! asynchronously: a submit returns a job handle, the job is polled until
//! it finishes, and the full structured result is then fetched. All calls
//! can fail either at the transport level or with a service-reported
//! error; [`ClientError`] keeps the two distinguishable.
//!
//! The remote status payload is loosely typed; [`JobState`] models it as
//! a closed variant set, with anything unparseable collapsing into
//! [`JobState::Unknown`] so one malformed response can never crash the
//! polling loop.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::config::ParserConfig;

/// Opaque reference to a submitted parse job: the remote result path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle(pub String);

/// Client-boundary error taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP exchange itself failed (connect, timeout, decode).
    #[error("parse service transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The service answered with an error of its own.
    #[error("parse service error: {0}")]
    Service(String),
    /// The local file to submit could not be read.
    #[error("failed to read document: {0}")]
    Io(#[from] std::io::Error),
}

/// Remote job state, parsed from the service's status response.
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    /// The job is being processed; the payload carries page progress.
    Started {
        stage: Option<String>,
        page_id: i64,
        total_page: i64,
    },
    Queued,
    Finished,
    Failed { message: String },
    Cancelled,
    /// Anything the service reports that we cannot interpret. Treated as
    /// a no-op tick by the orchestrator, never as an error.
    Unknown { raw: String },
}

/// Wire shape of the `started` progress payload.
#[derive(Debug, Deserialize)]
struct ProgressPayload {
    #[serde(default)]
    stage: Option<String>,
    #[serde(default)]
    page_id: i64,
    #[serde(default = "default_total_page")]
    total_page: i64,
}

fn default_total_page() -> i64 {
    1
}

/// Map a raw `(status, message)` pair from the service onto [`JobState`].
pub fn classify_status(status: &str, message: &str) -> JobState {
    match status {
        "started" => match serde_json::from_str::<ProgressPayload>(message) {
            Ok(progress) => JobState::Started {
                stage: progress.stage,
                page_id: progress.page_id,
                total_page: progress.total_page,
            },
            Err(_) => JobState::Unknown {
                raw: format!("started with malformed progress: {message}"),
            },
        },
        "queued" => JobState::Queued,
        "finished" => JobState::Finished,
        "failed" => JobState::Failed {
            message: message.to_string(),
        },
        "cancelled" => JobState::Cancelled,
        other => JobState::Unknown {
            raw: other.to_string(),
        },
    }
}

/// One entry of the service-wide status listing.
#[derive(Debug, Clone)]
pub struct RemoteJobStatus {
    pub result_path: String,
    pub status: String,
    pub message: String,
}

/// The parsing service boundary.
///
/// The orchestrator only ever talks to this trait, so tests drive the
/// state machine with a scripted implementation instead of a live
/// service.
#[async_trait]
pub trait ParseClient: Send + Sync {
    /// Submit a document for parsing, returning the job handle.
    async fn submit(&self, file: &Path) -> Result<JobHandle, ClientError>;

    /// Poll a submitted job's state.
    async fn poll(&self, handle: &JobHandle) -> Result<JobState, ClientError>;

    /// Fetch the full structured result of a finished job.
    async fn fetch(&self, handle: &JobHandle) -> Result<serde_json::Value, ClientError>;

    /// Cancel the service's current parse activity.
    async fn cancel(&self) -> Result<(), ClientError>;

    /// Delete a job's remote result.
    async fn delete(&self, handle: &JobHandle) -> Result<(), ClientError>;

    /// List the status of every job known to the service.
    async fn list_all(&self) -> Result<Vec<RemoteJobStatus>, ClientError>;
}

/// HTTP implementation of [`ParseClient`].
pub struct KbClient {
    http: reqwest::Client,
    /// Base URL with a guaranteed trailing slash.
    base: String,
    username: String,
    token: String,
    result_dir: String,
}

impl KbClient {
    pub fn new(config: &ParserConfig) -> Result<Self> {
        let mut base = config.url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base,
            username: config.username.clone(),
            token: config.token.clone(),
            result_dir: config.result_dir.clone(),
        })
    }

    fn auth_query(&self) -> [(&'static str, String); 2] {
        [
            ("username", self.username.clone()),
            ("token", self.token.clone()),
        ]
    }

    /// Remote result path for a submitted file: `<result_dir>/<name>`.
    fn result_path(&self, file_name: &str) -> String {
        if self.result_dir.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", self.result_dir.trim_end_matches('/'), file_name)
        }
    }
}

/// Extract the service-reported error from a non-OK response body.
///
/// The service uses `{"error": ...}` for internal failures and
/// `{"message": ...}` otherwise.
async fn service_error(response: reqwest::Response) -> ClientError {
    let status = response.status();
    let body: serde_json::Value = match response.json().await {
        Ok(body) => body,
        Err(err) => return ClientError::Transport(err),
    };
    let message = body
        .get("error")
        .or_else(|| body.get("message"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {status}: {body}"));
    ClientError::Service(message)
}

#[async_trait]
impl ParseClient for KbClient {
    async fn submit(&self, file: &Path) -> Result<JobHandle, ClientError> {
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let bytes = tokio::fs::read(file).await?;

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.clone());
        let form = reqwest::multipart::Form::new()
            .text("username", self.username.clone())
            .text("token", self.token.clone())
            .text("folder", self.result_dir.clone())
            .part("file", part);

        let response = self
            .http
            .post(format!("{}pdf_parse", self.base))
            .multipart(form)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(JobHandle(self.result_path(&file_name)))
        } else {
            Err(service_error(response).await)
        }
    }

    async fn poll(&self, handle: &JobHandle) -> Result<JobState, ClientError> {
        let response = self
            .http
            .get(format!("{}status", self.base))
            .query(&self.auth_query())
            .query(&[("file_path", handle.0.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(service_error(response).await);
        }

        #[derive(Deserialize)]
        struct StatusBody {
            status: String,
            #[serde(default)]
            message: String,
        }
        let body: StatusBody = response.json().await?;
        Ok(classify_status(&body.status, &body.message))
    }

    async fn fetch(&self, handle: &JobHandle) -> Result<serde_json::Value, ClientError> {
        let response = self
            .http
            .get(format!("{}get_result", self.base))
            .header("Accept-Encoding", "gzip")
            .query(&self.auth_query())
            .query(&[("file_path", handle.0.as_str())])
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            Err(service_error(response).await)
        }
    }

    async fn cancel(&self) -> Result<(), ClientError> {
        let response = self
            .http
            .post(format!("{}cancel_parse", self.base))
            .query(&self.auth_query())
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(service_error(response).await)
        }
    }

    async fn delete(&self, handle: &JobHandle) -> Result<(), ClientError> {
        let response = self
            .http
            .delete(format!("{}delete", self.base))
            .query(&self.auth_query())
            .query(&[("file_path", handle.0.as_str())])
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(service_error(response).await)
        }
    }

    async fn list_all(&self) -> Result<Vec<RemoteJobStatus>, ClientError> {
        let response = self
            .http
            .get(format!("{}all_status", self.base))
            .query(&self.auth_query())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(service_error(response).await);
        }

        // Wire shape: { "<result_path>": ["<status>", "<message>"], ... }
        let body: serde_json::Value = response.json().await?;
        let mut statuses = Vec::new();
        if let Some(entries) = body.as_object() {
            for (result_path, entry) in entries {
                let status = entry
                    .get(0)
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown")
                    .to_string();
                let message = entry
                    .get(1)
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                statuses.push(RemoteJobStatus {
                    result_path: result_path.clone(),
                    status,
                    message,
                });
            }
        }
        Ok(statuses)
    }
}
