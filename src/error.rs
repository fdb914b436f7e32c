//! Error types for the pdftask library.
//!
//! Two layers reflect two questions a caller asks about a failure:
//!
//! * [`ApiError`]: **what went wrong** in a single call: the network broke,
//!   the service answered with a non-2xx status, the service answered in a
//!   shape we could not decode, or a local file could not be read or written.
//!   Returned by every operation in [`crate::api`].
//!
//! * [`WorkflowError`]: **where it went wrong**: the step of the workflow
//!   (and the file involved) wrapping the underlying [`ApiError`]. Returned by
//!   [`crate::workflow::Workflow::run`] and the top-level `process_file*`
//!   functions.
//!
//! Keeping "service rejected us" ([`ApiError::Status`]) apart from "service
//! responded in an unexpected shape" ([`ApiError::Decode`]) lets callers
//! decide whether re-running with a different input could ever help.

use crate::api::Step;
use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// A failure of one remote call or of the local I/O around it.
#[derive(Debug, Error)]
pub enum ApiError {
    // ── Transport errors ──────────────────────────────────────────────────
    /// DNS, connect, TLS or mid-body failure.
    #[error("request to '{url}' failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The request did not complete within the configured timeout.
    #[error("request to '{url}' timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    /// The caller's cancellation token fired before or during the call.
    #[error("operation cancelled")]
    Cancelled,

    // ── Protocol errors ───────────────────────────────────────────────────
    /// The service answered with a non-2xx status.
    ///
    /// `body` holds the first few KiB of the response so the service's own
    /// reason is visible in logs.
    #[error("got response status {status} from '{url}'{}", body_suffix(.body))]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },

    // ── Decoding errors ───────────────────────────────────────────────────
    /// The response body did not match the expected schema.
    #[error("failed to decode response from '{url}': {detail}")]
    Decode { url: String, detail: String },

    /// The service handed back a file name we refuse to write to disk.
    #[error("refusing unsafe file name '{name}' from service")]
    UnsafeFilename { name: String },

    // ── Local I/O errors ──────────────────────────────────────────────────
    /// Source file for an upload does not exist.
    #[error("file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the source file.
    #[error("permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// Source file exists but could not be opened or read.
    #[error("failed to read '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Destination file could not be created.
    #[error("failed to create '{path}': {source}")]
    FileCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Destination file could not be written or moved into place.
    #[error("failed to write '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// A request could not be built (bad header value, bad URL).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

fn body_suffix(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        String::new()
    } else {
        format!(": {body}")
    }
}

impl ApiError {
    /// `true` when the failure is the caller's cancellation, not the service's.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }

    /// HTTP status of a protocol failure.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// `true` for failures that a later identical request may not hit:
    /// connection problems, timeouts, 429 and 5xx.
    ///
    /// 4xx answers (bad key, unknown tool) are permanent and never retried.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport { .. } | ApiError::Timeout { .. } => true,
            ApiError::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            _ => false,
        }
    }
}

/// A workflow failure, naming the step and the file it happened on.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("authentication failed: {source}")]
    Authentication {
        #[source]
        source: ApiError,
    },

    #[error("session start failed: {source}")]
    SessionStart {
        #[source]
        source: ApiError,
    },

    #[error("failed to upload file '{file}': {source}")]
    Upload {
        file: String,
        #[source]
        source: ApiError,
    },

    #[error("failed to process file '{file}': {source}")]
    Process {
        file: String,
        #[source]
        source: ApiError,
    },

    #[error("failed to download file '{file}': {source}")]
    Download {
        file: String,
        #[source]
        source: ApiError,
    },

    /// The caller passed an empty name or a path instead of a file name.
    #[error("invalid file name '{name}': expected a plain file name inside the working directory")]
    InvalidFileName { name: String },

    /// Builder validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl WorkflowError {
    /// Which of the five steps failed, if the failure came from one.
    pub fn step(&self) -> Option<Step> {
        match self {
            WorkflowError::Authentication { .. } => Some(Step::Authenticate),
            WorkflowError::SessionStart { .. } => Some(Step::StartSession),
            WorkflowError::Upload { .. } => Some(Step::Upload),
            WorkflowError::Process { .. } => Some(Step::Process),
            WorkflowError::Download { .. } => Some(Step::Download),
            WorkflowError::InvalidFileName { .. } | WorkflowError::InvalidConfig(_) => None,
        }
    }

    /// The underlying call failure, if any.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            WorkflowError::Authentication { source }
            | WorkflowError::SessionStart { source }
            | WorkflowError::Upload { source, .. }
            | WorkflowError::Process { source, .. }
            | WorkflowError::Download { source, .. } => Some(source),
            WorkflowError::InvalidFileName { .. } | WorkflowError::InvalidConfig(_) => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.api_error().is_some_and(ApiError::is_cancelled)
    }

    /// Wrap `source` with the context of the step it happened in.
    pub(crate) fn at(step: Step, subject: &str, source: ApiError) -> Self {
        let file = subject.to_string();
        match step {
            Step::Authenticate => WorkflowError::Authentication { source },
            Step::StartSession => WorkflowError::SessionStart { source },
            Step::Upload => WorkflowError::Upload { file, source },
            Step::Process => WorkflowError::Process { file, source },
            Step::Download => WorkflowError::Download { file, source },
        }
    }
}
