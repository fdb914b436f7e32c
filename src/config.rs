//! Configuration for a workflow run.
//!
//! Everything a run needs (the project key, where the remote service lives,
//! which directories to read from and write to, timeouts and retry policy)
//! is collected into one [`WorkflowConfig`] value that is built once at
//! startup and passed by reference. There is no process-wide state.
//!
//! # Design choice: builder over constructor
//! Most callers only set the project key and the two directories; the
//! builder lets them rely on documented defaults for the rest and validates
//! the combination once in [`WorkflowConfigBuilder::build`].

use crate::api::Tool;
use crate::error::WorkflowError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;

/// Default API root of the iLovePDF service.
pub const DEFAULT_BASE_URL: &str = "https://api.ilovepdf.com/v1/";

/// Configuration for one or more workflow runs.
///
/// Built via [`WorkflowConfig::builder()`].
///
/// # Example
/// ```rust
/// use pdftask::WorkflowConfig;
///
/// let config = WorkflowConfig::builder()
///     .public_key("project_public_key")
///     .working_dir("pdfs")
///     .output_dir("pdfc")
///     .build()
///     .unwrap();
/// assert_eq!(config.tool.as_str(), "compress");
/// ```
#[derive(Clone)]
pub struct WorkflowConfig {
    /// Project public key sent to the auth endpoint. Required.
    pub public_key: String,

    /// API root for the auth and start endpoints. Default: [`DEFAULT_BASE_URL`].
    ///
    /// A trailing slash is optional.
    pub base_url: String,

    /// Directory the input file is read from. Default: `.`.
    pub working_dir: PathBuf,

    /// Directory the processed file is written to. Default: `.`.
    ///
    /// Must already exist; the workflow never creates it.
    pub output_dir: PathBuf,

    /// Transformation to run. Default: [`Tool::Compress`].
    pub tool: Tool,

    /// Scheme used for the per-session server host returned by the start
    /// endpoint. Default: `https`.
    ///
    /// Only local test servers need `http`.
    pub session_scheme: String,

    /// Request timeout in seconds. Default: 120.
    ///
    /// Auth, start and process calls must finish within it. Upload and
    /// download have no total deadline: for them it bounds the wait for a
    /// response and each silence between received chunks, so large files
    /// transfer as long as bytes keep moving.
    pub request_timeout_secs: u64,

    /// TCP/TLS connect timeout in seconds. Default: 10.
    pub connect_timeout_secs: u64,

    /// Retries for the authenticate and start-session steps on transient
    /// failures. Default: 2.
    ///
    /// Upload, process and download are never retried: re-submitting them
    /// without knowing the server-side task state could process a file twice.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled after each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Receives step-level progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            public_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            working_dir: PathBuf::from("."),
            output_dir: PathBuf::from("."),
            tool: Tool::default(),
            session_scheme: "https".to_string(),
            request_timeout_secs: 120,
            connect_timeout_secs: 10,
            max_retries: 2,
            retry_backoff_ms: 500,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for WorkflowConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowConfig")
            .field("public_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("working_dir", &self.working_dir)
            .field("output_dir", &self.output_dir)
            .field("tool", &self.tool)
            .field("session_scheme", &self.session_scheme)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn WorkflowProgressCallback>"),
            )
            .finish()
    }
}

impl WorkflowConfig {
    /// Create a new builder for `WorkflowConfig`.
    pub fn builder() -> WorkflowConfigBuilder {
        WorkflowConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`WorkflowConfig`].
#[derive(Debug)]
pub struct WorkflowConfigBuilder {
    config: WorkflowConfig,
}

impl WorkflowConfigBuilder {
    pub fn public_key(mut self, key: impl Into<String>) -> Self {
        self.config.public_key = key.into();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.working_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn tool(mut self, tool: Tool) -> Self {
        self.config.tool = tool;
        self
    }

    pub fn session_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.config.session_scheme = scheme.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.connect_timeout_secs = secs;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<WorkflowConfig, WorkflowError> {
        let c = &self.config;
        if c.public_key.trim().is_empty() {
            return Err(WorkflowError::InvalidConfig(
                "project public key must not be empty".into(),
            ));
        }
        if !(c.base_url.starts_with("https://") || c.base_url.starts_with("http://")) {
            return Err(WorkflowError::InvalidConfig(format!(
                "base URL must start with http:// or https://, got '{}'",
                c.base_url
            )));
        }
        if c.session_scheme != "https" && c.session_scheme != "http" {
            return Err(WorkflowError::InvalidConfig(format!(
                "session scheme must be 'http' or 'https', got '{}'",
                c.session_scheme
            )));
        }
        if c.request_timeout_secs == 0 || c.connect_timeout_secs == 0 {
            return Err(WorkflowError::InvalidConfig(
                "timeouts must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}
