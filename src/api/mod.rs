//! Workflow client: the five remote operations of the processing service.
//!
//! ```text
//! authenticate ──► Credential
//!  start_session(Credential, Tool) ──► Session {token, task, server, tool}
//!   upload(Session, path)            ──► UploadedFile
//!    process(Session, UploadedFile)   ──► ProcessResult
//!     download(Session, dest)          ──► Downloaded
//! ```
//!
//! Each operation is a thin adapter: build a request from typed input, hand
//! it to [`Transport`], decode a typed response. [`PdfClient`] keeps no state
//! between calls; the correlation data lives in the [`Session`] value the
//! caller threads through. The session pins every later call to the backend
//! node that allocated the task, so it is immutable once built.
//!
//! Only [`PdfClient::authenticate`] and [`PdfClient::start_session`] retry,
//! and only on transient failures (see [`ApiError::is_transient`]).

pub mod auth;
pub mod download;
pub mod process;
pub mod session;
pub mod upload;

pub use auth::Credential;
pub use download::Downloaded;
pub use process::ProcessResult;
pub use session::Session;
pub use upload::UploadedFile;

use crate::config::WorkflowConfig;
use crate::error::ApiError;
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::str::FromStr;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use tracing::warn;

// ── Step ─────────────────────────────────────────────────────────────────

/// One of the five workflow steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Authenticate,
    StartSession,
    Upload,
    Process,
    Download,
}

impl Step {
    pub const ALL: [Step; 5] = [
        Step::Authenticate,
        Step::StartSession,
        Step::Upload,
        Step::Process,
        Step::Download,
    ];
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Authenticate => "authenticate",
            Step::StartSession => "start session",
            Step::Upload => "upload",
            Step::Process => "process",
            Step::Download => "download",
        })
    }
}

// ── Tool ─────────────────────────────────────────────────────────────────

/// Transformation the remote service applies to a task.
///
/// The same serialised value appears in the start URL
/// (`start/{tool}`) and in the process payload (`"tool": "…"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    /// Reduce file size. (default)
    #[default]
    Compress,
    Merge,
    Split,
    OfficePdf,
    PdfJpg,
    ImagePdf,
    Unlock,
    Protect,
    Rotate,
    Repair,
    PdfA,
    PageNumbers,
    Watermark,
    PdfOcr,
}

impl Tool {
    pub fn as_str(self) -> &'static str {
        match self {
            Tool::Compress => "compress",
            Tool::Merge => "merge",
            Tool::Split => "split",
            Tool::OfficePdf => "officepdf",
            Tool::PdfJpg => "pdfjpg",
            Tool::ImagePdf => "imagepdf",
            Tool::Unlock => "unlock",
            Tool::Protect => "protect",
            Tool::Rotate => "rotate",
            Tool::Repair => "repair",
            Tool::PdfA => "pdfa",
            Tool::PageNumbers => "pagenumbers",
            Tool::Watermark => "watermark",
            Tool::PdfOcr => "pdfocr",
        }
    }

    pub const ALL: [Tool; 14] = [
        Tool::Compress,
        Tool::Merge,
        Tool::Split,
        Tool::OfficePdf,
        Tool::PdfJpg,
        Tool::ImagePdf,
        Tool::Unlock,
        Tool::Protect,
        Tool::Rotate,
        Tool::Repair,
        Tool::PdfA,
        Tool::PageNumbers,
        Tool::Watermark,
        Tool::PdfOcr,
    ];
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Tool::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| format!("unknown tool '{s}'"))
    }
}

// ── Client ───────────────────────────────────────────────────────────────

/// Stateless client for the processing service.
///
/// Cloning is cheap (the HTTP pool is shared); one client can serve many
/// concurrent workflow runs because nothing run-specific is stored here.
#[derive(Clone)]
pub struct PdfClient {
    transport: Transport,
    base_url: String,
    public_key: String,
    session_scheme: String,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl fmt::Debug for PdfClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdfClient")
            .field("base_url", &self.base_url)
            .field("public_key", &"<redacted>")
            .field("session_scheme", &self.session_scheme)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl PdfClient {
    /// Build a client (and its HTTP pool) from `config`.
    pub fn new(config: &WorkflowConfig) -> Result<Self, ApiError> {
        let transport = Transport::new(config.request_timeout_secs, config.connect_timeout_secs)?;
        Ok(Self::with_transport(transport, config))
    }

    /// Build a client over an existing transport, sharing its pool.
    pub fn with_transport(transport: Transport, config: &WorkflowConfig) -> Self {
        Self {
            transport,
            base_url: config.base_url.clone(),
            public_key: config.public_key.clone(),
            session_scheme: config.session_scheme.clone(),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// URL of an endpoint on the fixed API host.
    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// URL of an endpoint on the server pinned by `session`.
    fn server_url(&self, session: &Session, path: &str) -> String {
        format!("{}://{}/v1/{}", self.session_scheme, session.server(), path)
    }

    /// Run `op` until it succeeds, fails permanently, or `max_retries`
    /// transient failures have been retried.
    ///
    /// Backoff doubles from `retry_backoff_ms`; the wait observes `cancel`.
    async fn with_retry<T, F, Fut>(
        &self,
        step: Step,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let backoff = self
                        .retry_backoff_ms
                        .saturating_mul(2u64.saturating_pow(attempt - 1));
                    warn!(
                        "{}: retry {}/{} after {}ms: {}",
                        step, attempt, self.max_retries, backoff, e
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                        _ = sleep(Duration::from_millis(backoff)) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// `true` when `name` names a file directly inside a directory: not empty,
/// no separators, not `.` or `..`.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(['/', '\\', '\0'])
        && Path::new(name).file_name() == Some(OsStr::new(name))
}
