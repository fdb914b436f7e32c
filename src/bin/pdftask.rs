//! CLI binary for pdftask.
//!
//! A thin shim over the library crate that maps CLI flags and environment
//! variables to `WorkflowConfig`, runs one workflow, and prints the result.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdftask::{
    CancellationToken, ProgressCallback, Step, Workflow, WorkflowConfig, WorkflowOutput,
    WorkflowProgressCallback, DEFAULT_BASE_URL,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: a spinner naming the running step, and one log line
/// per finished step.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Starting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl WorkflowProgressCallback for CliProgressCallback {
    fn on_workflow_start(&self, file_name: &str) {
        self.bar.set_message(file_name.to_string());
    }

    fn on_step_start(&self, step: Step) {
        self.bar.set_prefix(step.to_string());
    }

    fn on_step_complete(&self, step: Step, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} {:<14} {}",
            green("✓"),
            step.to_string(),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_step_error(&self, step: Step, _error: &str) {
        self.bar
            .println(format!("  {} {}", red("✗"), step));
    }

    fn on_workflow_complete(&self, _success: bool) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Compress ./report.pdf into ./out/
  pdftask compress-file --output-dir out/ report.pdf

  # Directories and key from the environment
  export PDF_API_PROJECT_KEY=project_public_...
  export PDF_API_WORKING_DIR=~/pdfs
  export PDF_API_OUTPUT_DIR=~/pdfc
  pdftask compress-file report.pdf

  # Machine-readable result
  pdftask compress-file --json report.pdf > result.json

ENVIRONMENT VARIABLES:
  PDF_API_PROJECT_KEY   Project public key (required)
  PDF_API_WORKING_DIR   Directory the input file is read from
  PDF_API_OUTPUT_DIR    Directory the result is written to (must exist)
  PDF_API_BASE_URL      API root (default https://api.ilovepdf.com/v1/)
  RUST_LOG              Override log filter (e.g. pdftask=debug)
"#;

/// Process PDF files with a remote PDF service.
#[derive(Parser, Debug)]
#[command(
    name = "pdftask",
    version,
    about = "Process PDF files with a remote PDF service",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDFTASK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDFTASK_QUIET")]
    quiet: bool,

    /// Disable the progress spinner.
    #[arg(long, global = true, env = "PDFTASK_NO_PROGRESS")]
    no_progress: bool,

    /// Print the result as JSON on stdout.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compress one PDF from the working directory into the output directory.
    CompressFile(CompressArgs),
}

#[derive(clap::Args, Debug)]
struct CompressArgs {
    /// File name inside the working directory.
    file: String,

    /// Project public key.
    #[arg(long, env = "PDF_API_PROJECT_KEY", hide = true, hide_env_values = true)]
    project_key: String,

    /// Directory the input file is read from.
    #[arg(long, env = "PDF_API_WORKING_DIR", default_value = ".")]
    working_dir: PathBuf,

    /// Directory the processed file is written to.
    #[arg(long, env = "PDF_API_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// API root of the service.
    #[arg(long, env = "PDF_API_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives enough feedback on its own; library INFO logs would
    // just interleave with it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::CompressFile(ref args) => compress_file(&cli, args, show_progress).await,
    }
}

async fn compress_file(cli: &Cli, args: &CompressArgs, show_progress: bool) -> Result<()> {
    let mut builder = WorkflowConfig::builder()
        .public_key(&args.project_key)
        .base_url(&args.base_url)
        .working_dir(&args.working_dir)
        .output_dir(&args.output_dir);
    if show_progress {
        builder = builder.progress_callback(CliProgressCallback::new() as ProgressCallback);
    }
    let config = builder.build().context("Invalid configuration")?;
    let workflow = Workflow::new(config).context("Failed to set up HTTP client")?;

    // ── Ctrl-C cancels the in-flight step ────────────────────────────────
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });

    let output = workflow
        .run(&args.file, &cancel)
        .await
        .with_context(|| format!("Failed to handle file: {}", args.file))?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&output);
    }
    Ok(())
}

fn print_summary(output: &WorkflowOutput) {
    let p = &output.process;
    let saved = match p.ratio() {
        Some(r) => format!("  ({:.0}% of original)", r * 100.0),
        None => String::new(),
    };
    eprintln!(
        "{}  {}  →  {}{}",
        green("✔"),
        output.file_name,
        bold(&output.output_path.display().to_string()),
        saved,
    );
    eprintln!(
        "   {}",
        dim(&format!(
            "task {} on {}  ·  {} bytes  ·  {}ms",
            output.task, output.server, output.bytes_written, output.stats.total_duration_ms
        )),
    );
}
