//! Progress-callback trait for step-level workflow events.
//!
//! Inject an [`Arc<dyn WorkflowProgressCallback>`] via
//! [`crate::config::WorkflowConfigBuilder::progress_callback`] to be told as
//! the workflow moves through authenticate, start session, upload, process
//! and download.
//!
//! # Example
//!
//! ```rust
//! use pdftask::{Step, WorkflowConfig, WorkflowProgressCallback};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl WorkflowProgressCallback for Printer {
//!     fn on_step_complete(&self, step: Step, elapsed_ms: u64) {
//!         eprintln!("{step} done in {elapsed_ms}ms");
//!     }
//! }
//!
//! let config = WorkflowConfig::builder()
//!     .public_key("project_public_key")
//!     .progress_callback(Arc::new(Printer) as Arc<dyn WorkflowProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::api::Step;
use std::sync::Arc;

/// Called by the workflow as it runs each step.
///
/// Implementations must be `Send + Sync`: one config (and its callback) may
/// drive several workflow runs on different tasks at once. All methods have
/// default no-op implementations.
pub trait WorkflowProgressCallback: Send + Sync {
    /// Called once before the first step.
    fn on_workflow_start(&self, file_name: &str) {
        let _ = file_name;
    }

    /// Called just before a step's first network call.
    fn on_step_start(&self, step: Step) {
        let _ = step;
    }

    /// Called when a step succeeds.
    fn on_step_complete(&self, step: Step, elapsed_ms: u64) {
        let _ = (step, elapsed_ms);
    }

    /// Called when a step fails; no further steps run afterwards.
    fn on_step_error(&self, step: Step, error: &str) {
        let _ = (step, error);
    }

    /// Called once when the run ends, successfully or not.
    fn on_workflow_complete(&self, success: bool) {
        let _ = success;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl WorkflowProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::WorkflowConfig`].
pub type ProgressCallback = Arc<dyn WorkflowProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl WorkflowProgressCallback for Recorder {
        fn on_step_start(&self, step: Step) {
            self.events.lock().unwrap().push(format!("start {step}"));
        }

        fn on_step_error(&self, step: Step, error: &str) {
            self.events.lock().unwrap().push(format!("error {step}: {error}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_workflow_start("a.pdf");
        cb.on_step_start(Step::Upload);
        cb.on_step_complete(Step::Upload, 12);
        cb.on_step_error(Step::Process, "boom");
        cb.on_workflow_complete(false);
    }

    #[test]
    fn overridden_methods_receive_events() {
        let rec = Recorder::default();
        rec.on_step_start(Step::Authenticate);
        rec.on_step_complete(Step::Authenticate, 5);
        rec.on_step_error(Step::StartSession, "503");
        assert_eq!(
            *rec.events.lock().unwrap(),
            vec!["start authenticate", "error start session: 503"]
        );
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_step_start(Step::Download);
    }
}
