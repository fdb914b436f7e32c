//! # pdftask
//!
//! Drive a remote PDF-processing service (iLovePDF-style REST API) from
//! Rust: authenticate, allocate a processing session, upload a local file,
//! run a tool over it, and download the result.
//!
//! ## Workflow Overview
//!
//! ```text
//! local file
//!  │
//!  ├─ 1. Authenticate  POST {base}/auth                 → bearer token
//!  ├─ 2. Start         GET  {base}/start/{tool}         → task id + server host
//!  ├─ 3. Upload        POST https://{server}/v1/upload   → server filename
//!  ├─ 4. Process       POST https://{server}/v1/process  → download filename
//!  └─ 5. Download      GET  https://{server}/v1/download/{task} → output file
//! ```
//!
//! The service is a sharded fleet: the start call pins the task to one
//! server, and every later call must go to that server with that task id.
//! [`Session`] carries the pair (plus the token and tool) as one immutable
//! value so the pinning cannot be broken by accident.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdftask::{process_file, WorkflowConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WorkflowConfig::builder()
//!         .public_key("project_public_…")
//!         .working_dir("pdfs")
//!         .output_dir("pdfc")
//!         .build()?;
//!     let output = process_file("report.pdf", &config).await?;
//!     eprintln!("{} bytes → {}",
//!         output.bytes_written,
//!         output.output_path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature   | Default | Description |
//! |-----------|---------|-------------|
//! | `cli`     | on      | Enables the `pdftask` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `webhook` | on      | Enables the notification receiver ([`webhook`] module, `pdftask-webhook` binary) |
//!
//! Disable both when using only the library:
//! ```toml
//! pdftask = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod api;
pub mod config;
pub mod error;
pub mod output;
pub mod progress;
pub mod transport;
#[cfg(feature = "webhook")]
pub mod webhook;
pub mod workflow;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use api::{Credential, Downloaded, PdfClient, ProcessResult, Session, Step, Tool, UploadedFile};
pub use config::{WorkflowConfig, WorkflowConfigBuilder, DEFAULT_BASE_URL};
pub use error::{ApiError, WorkflowError};
pub use output::{StepTiming, WorkflowOutput, WorkflowStats};
pub use progress::{NoopProgressCallback, ProgressCallback, WorkflowProgressCallback};
pub use tokio_util::sync::CancellationToken;
pub use workflow::{process_file, process_file_sync, Workflow};
