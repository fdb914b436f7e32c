//! Orchestrator: run the five steps for one file, in order, fail-fast.
//!
//! ```text
//! file_name
//!  │
//!  ├─ 1. Authenticate   public key      → Credential
//!  ├─ 2. StartSession   Credential+tool → Session {task, server}
//!  ├─ 3. Upload         working_dir/file_name under Session → server filename
//!  ├─ 4. Process        Session + server filename + file_name → download filename
//!  └─ 5. Download       output_dir/download filename
//! ```
//!
//! Every value a step needs comes from the step before it, so there is
//! nothing to parallelise within one run. Separate runs are independent:
//! each builds its own credential and session, and [`Workflow`] holds no
//! per-run state, so `run` can be called concurrently on a shared workflow.

use crate::api::{is_plain_file_name, PdfClient, Step};
use crate::config::WorkflowConfig;
use crate::error::{ApiError, WorkflowError};
use crate::output::{StepTiming, WorkflowOutput, WorkflowStats};
use crate::progress::WorkflowProgressCallback;
use std::future::Future;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A configured workflow, reusable across files.
#[derive(Debug, Clone)]
pub struct Workflow {
    client: PdfClient,
    config: WorkflowConfig,
}

impl Workflow {
    /// Build a workflow and its HTTP client from `config`.
    pub fn new(config: WorkflowConfig) -> Result<Self, WorkflowError> {
        let client =
            PdfClient::new(&config).map_err(|e| WorkflowError::InvalidConfig(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Build a workflow over an existing client (sharing its connection pool).
    pub fn with_client(client: PdfClient, config: WorkflowConfig) -> Self {
        Self { client, config }
    }

    pub fn client(&self) -> &PdfClient {
        &self.client
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Run the whole workflow for `file_name` (a name inside `working_dir`).
    ///
    /// # Errors
    /// The first failing step, wrapped with the step and the file involved.
    /// Nothing after a failing step runs. If `cancel` fires, the current
    /// step aborts with a cancellation error.
    pub async fn run(
        &self,
        file_name: &str,
        cancel: &CancellationToken,
    ) -> Result<WorkflowOutput, WorkflowError> {
        if !is_plain_file_name(file_name) {
            return Err(WorkflowError::InvalidFileName {
                name: file_name.to_string(),
            });
        }

        let total_start = Instant::now();
        info!("Starting {} workflow for {}", self.config.tool, file_name);

        let callback = self.config.progress_callback.as_deref();
        if let Some(cb) = callback {
            cb.on_workflow_start(file_name);
        }

        let mut tracker = StepTracker {
            callback,
            timings: Vec::with_capacity(Step::ALL.len()),
        };
        let result = self.run_steps(file_name, cancel, &mut tracker).await;

        if let Some(cb) = callback {
            cb.on_workflow_complete(result.is_ok());
        }

        let mut output = result?;
        output.stats = WorkflowStats {
            total_duration_ms: total_start.elapsed().as_millis() as u64,
            steps: tracker.timings,
        };
        info!(
            "Workflow complete: {} → {} ({} bytes, {}ms)",
            file_name,
            output.output_path.display(),
            output.bytes_written,
            output.stats.total_duration_ms
        );
        Ok(output)
    }

    async fn run_steps(
        &self,
        file_name: &str,
        cancel: &CancellationToken,
        tracker: &mut StepTracker<'_>,
    ) -> Result<WorkflowOutput, WorkflowError> {
        // ── Step 1: Authenticate ─────────────────────────────────────────────
        let credential = tracker
            .run(Step::Authenticate, file_name, self.client.authenticate(cancel))
            .await?;

        // ── Step 2: Start session ────────────────────────────────────────────
        let session = tracker
            .run(
                Step::StartSession,
                file_name,
                self.client.start_session(&credential, self.config.tool, cancel),
            )
            .await?;

        // ── Step 3: Upload ───────────────────────────────────────────────────
        let source = self.config.working_dir.join(file_name);
        let uploaded = tracker
            .run(
                Step::Upload,
                file_name,
                self.client.upload(&session, &source, cancel),
            )
            .await?;

        // ── Step 4: Process ──────────────────────────────────────────────────
        let process = tracker
            .run(
                Step::Process,
                file_name,
                self.client.process(&session, &uploaded, file_name, cancel),
            )
            .await?;

        // ── Step 5: Download ─────────────────────────────────────────────────
        let download_name = process.download_filename.as_str();
        let downloaded = tracker
            .run(Step::Download, download_name, async {
                if !is_plain_file_name(download_name) {
                    return Err(ApiError::UnsafeFilename {
                        name: download_name.to_string(),
                    });
                }
                let destination = self.config.output_dir.join(download_name);
                self.client.download(&session, &destination, cancel).await
            })
            .await?;

        Ok(WorkflowOutput {
            file_name: file_name.to_string(),
            tool: session.tool(),
            task: session.task().to_string(),
            server: session.server().to_string(),
            output_path: downloaded.path,
            bytes_written: downloaded.bytes,
            process,
            stats: WorkflowStats::default(),
        })
    }
}

/// Times each step, reports it to the progress callback, and wraps its
/// failure with the step and subject.
struct StepTracker<'a> {
    callback: Option<&'a dyn WorkflowProgressCallback>,
    timings: Vec<StepTiming>,
}

impl StepTracker<'_> {
    async fn run<T>(
        &mut self,
        step: Step,
        subject: &str,
        fut: impl Future<Output = Result<T, ApiError>>,
    ) -> Result<T, WorkflowError> {
        if let Some(cb) = self.callback {
            cb.on_step_start(step);
        }
        let start = Instant::now();

        match fut.await {
            Ok(value) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                debug!("Step {} finished in {}ms", step, duration_ms);
                self.timings.push(StepTiming { step, duration_ms });
                if let Some(cb) = self.callback {
                    cb.on_step_complete(step, duration_ms);
                }
                Ok(value)
            }
            Err(e) => {
                let err = WorkflowError::at(step, subject, e);
                warn!("{}", err);
                if let Some(cb) = self.callback {
                    cb.on_step_error(step, &err.to_string());
                }
                Err(err)
            }
        }
    }
}

/// Run the workflow for one file with a fresh cancellation token.
///
/// This is the primary entry point for the library.
///
/// # Example
/// ```rust,no_run
/// use pdftask::{process_file, WorkflowConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = WorkflowConfig::builder()
///         .public_key(std::env::var("PDF_API_PROJECT_KEY")?)
///         .working_dir("pdfs")
///         .output_dir("pdfc")
///         .build()?;
///     let out = process_file("report.pdf", &config).await?;
///     println!("{} → {}", out.file_name, out.output_path.display());
///     Ok(())
/// }
/// ```
pub async fn process_file(
    file_name: impl AsRef<str>,
    config: &WorkflowConfig,
) -> Result<WorkflowOutput, WorkflowError> {
    let workflow = Workflow::new(config.clone())?;
    workflow
        .run(file_name.as_ref(), &CancellationToken::new())
        .await
}

/// Synchronous wrapper around [`process_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn process_file_sync(
    file_name: impl AsRef<str>,
    config: &WorkflowConfig,
) -> Result<WorkflowOutput, WorkflowError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| WorkflowError::InvalidConfig(format!("failed to create tokio runtime: {e}")))?
        .block_on(process_file(file_name, config))
}
