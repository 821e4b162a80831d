//! Sanity - model sanity checker CLI
//!
//! The `sanity` command runs the sanity checks stored in a model document.
//!
//! ## Commands
//!
//! - `run`: Run the checks and print one line per result
//! - `trace`: Run the checks and show the trace behind one result
//! - `checks`: List the available checks and their parameters
//! - `validate`: Parse a check specification without running it

mod render;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sanity_core::{
    CatalogRunner, CheckCatalog, CheckSpecSet, Document, MemoryDocumentProvider,
    OrchestratorConfig, ParameterKind, RunCompletion, RunEvent, SanitySession, Trace, TraceSink,
    Trigger,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn, Level};

use render::{render_json, render_spec, render_text, OutputFormat};

/// Exit status of a run that finished with failing checks.
const EXIT_UNSATISFIED: i32 = 1;

/// Exit status of a run cancelled with Ctrl-C.
const EXIT_CANCELLED: i32 = 130;

#[derive(Parser)]
#[command(name = "sanity")]
#[command(author = "Stevedores Org")]
#[command(version = sanity_core::VERSION)]
#[command(about = "Sanity checks for timed-automata model documents", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the checks of a model document
    ///
    /// Press Ctrl-C once to cancel the run; nothing is reported for it.
    Run {
        /// Path to the model document (JSON)
        #[arg(short, long, env = "SANITY_MODEL")]
        model: PathBuf,

        /// Check specification file overriding the one stored in the model
        #[arg(short, long, env = "SANITY_SPEC")]
        spec: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Run the checks and show the trace attached to one result
    Trace {
        /// Path to the model document (JSON)
        #[arg(short, long, env = "SANITY_MODEL")]
        model: PathBuf,

        /// Check specification file overriding the one stored in the model
        #[arg(short, long, env = "SANITY_SPEC")]
        spec: Option<PathBuf>,

        /// Result number as printed by `sanity run` (starting at 1)
        #[arg(short, long)]
        index: usize,
    },

    /// List the available checks
    Checks,

    /// Parse a check specification and print its entries
    Validate {
        /// Check specification file
        #[arg(short, long, env = "SANITY_SPEC")]
        spec: PathBuf,
    },
}

/// Prints traces to stdout as they are shown.
struct StdoutTraceSink;

impl TraceSink for StdoutTraceSink {
    fn show(&self, trace: &Trace) {
        print!("{trace}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    sanity_core::telemetry::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run {
            model,
            spec,
            format,
        } => cmd_run(&model, spec.as_deref(), format).await,
        Commands::Trace { model, spec, index } => cmd_trace(&model, spec.as_deref(), index).await,
        Commands::Checks => cmd_checks(),
        Commands::Validate { spec } => cmd_validate(&spec),
    }
}

fn load_session(model: &Path, spec: Option<&Path>, traces: Arc<dyn TraceSink>) -> Result<SanitySession> {
    let text = std::fs::read_to_string(model)
        .with_context(|| format!("Failed to read model {}", model.display()))?;
    let document = Document::from_json(&text)
        .with_context(|| format!("Failed to parse model {}", model.display()))?;
    info!(model = %document.name, templates = document.templates.len(), "model loaded");

    let runner = CatalogRunner::new(CheckCatalog::builtin(), traces);
    let session = SanitySession::new(
        Arc::new(MemoryDocumentProvider::new(document)),
        Arc::new(runner),
        OrchestratorConfig::from_env(),
        Handle::current(),
    );

    if let Some(path) = spec {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read specification {}", path.display()))?;
        session.set_spec_text(text);
    }
    Ok(session)
}

/// Trigger one run and wait for its outcome. Ctrl-C toggles the run off.
///
/// Returns `None` if the run was cancelled.
async fn run_once(session: &SanitySession) -> Result<Option<Arc<RunCompletion>>> {
    let mut events = session.subscribe();
    session.trigger(Trigger::Button);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(RunEvent::Completed(completion)) => return Ok(Some(completion)),
                Ok(RunEvent::Cancelled { run_id }) => {
                    debug!(run_id = %run_id, "run cancelled");
                    return Ok(None);
                }
                Ok(RunEvent::Progress { completed, check, .. }) => {
                    debug!(completed = completed, check = %check, "check finished");
                }
                Ok(RunEvent::Started { .. }) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped = skipped, "missed run events"),
                Err(RecvError::Closed) => anyhow::bail!("Orchestrator stopped unexpectedly"),
            },
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                eprintln!("Cancelling...");
                session.trigger(Trigger::Button);
            }
        }
    }
}

async fn cmd_run(model: &Path, spec: Option<&Path>, format: OutputFormat) -> Result<()> {
    let session = load_session(model, spec, Arc::new(StdoutTraceSink))?;

    let Some(completion) = run_once(&session).await? else {
        eprintln!("Run cancelled");
        std::process::exit(EXIT_CANCELLED);
    };

    match format {
        OutputFormat::Text => print!("{}", render_text(&completion)),
        OutputFormat::Json => println!("{}", render_json(&completion)?),
    }

    if !completion.overall_satisfied {
        std::process::exit(EXIT_UNSATISFIED);
    }
    Ok(())
}

async fn cmd_trace(model: &Path, spec: Option<&Path>, index: usize) -> Result<()> {
    let session = load_session(model, spec, Arc::new(StdoutTraceSink))?;

    let Some(completion) = run_once(&session).await? else {
        eprintln!("Run cancelled");
        std::process::exit(EXIT_CANCELLED);
    };

    let result = index
        .checked_sub(1)
        .and_then(|i| completion.results.get(i))
        .with_context(|| {
            format!(
                "No result #{index}; the run produced {} result(s)",
                completion.results.len()
            )
        })?;

    let Some(token) = result.trace_token else {
        anyhow::bail!("Result #{index} ({}) has no trace", result.record.check());
    };

    println!("{}: {}", result.record.check(), result.record.message());
    session
        .invoke_trace(token)
        .with_context(|| format!("Failed to show {token}"))?;
    Ok(())
}

fn cmd_checks() -> Result<()> {
    let catalog = CheckCatalog::builtin();
    for check in catalog.iter() {
        println!("{} ({})", check.short_name(), check.name());
        for param in check.parameters() {
            let kind = match param.kind {
                ParameterKind::Text => "text",
                ParameterKind::CheckerType => "symbolic|concrete",
            };
            let required = if param.required { ", required" } else { "" };
            println!("    {}: {} [{}{}]", param.name, param.description, kind, required);
        }
    }
    Ok(())
}

fn cmd_validate(path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read specification {}", path.display()))?;
    let spec = CheckSpecSet::parse(&text)
        .with_context(|| format!("Invalid specification {}", path.display()))?;

    print!("{}", render_spec(&spec));

    let malformed = spec.malformed_count();
    if malformed > 0 {
        anyhow::bail!("{malformed} malformed check entr{}", if malformed == 1 { "y" } else { "ies" });
    }
    Ok(())
}
