//! Sanity Core Library
//!
//! Check-execution orchestration for model documents: parses a check
//! specification, runs the checks off the caller's thread one run at a time,
//! and publishes the records together with tokens for their deferred traces.

pub mod cancel;
pub mod catalog;
pub mod checks;
pub mod config;
pub mod domain;
pub mod error;
pub mod fakes;
pub mod obs;
pub mod orchestrator;
pub mod registry;
pub mod runner;
pub mod session;
pub mod spec;
pub mod telemetry;

pub use cancel::{CancelSignal, CancelToken};
pub use catalog::{
    CheckCatalog, CheckContext, CheckerType, ParameterKind, ParameterSpec, SanityCheck,
    CHECKER_PARAMETER,
};
pub use config::OrchestratorConfig;
pub use domain::{
    overall_satisfied, Document, DocumentProvider, Edge, LogTraceSink, MemoryDocumentProvider,
    Problem, ProblemList, ProblemOrigin, RecordSummary, RecordingTraceSink, ResultRecord,
    Severity, SyncKind, Synchronisation, Template, Trace, TraceAction, TraceSink, TraceStep,
    RUNNER_LABEL, SPECIFICATION_LABEL,
};
pub use error::{Result, SanityError, SpecParseError};
pub use obs::{
    emit_cancel_requested, emit_check_finished, emit_run_cancelled, emit_run_completed,
    emit_run_started, emit_runner_failed, emit_trace_invoked, run_span,
};
pub use orchestrator::{
    Orchestrator, PublishedResult, RunCompletion, RunEvent, RunState, StartOutcome,
};
pub use registry::{TraceActionRegistry, TraceToken};
pub use runner::{CatalogRunner, CheckRunner};
pub use session::{SanitySession, Trigger};
pub use spec::{CheckEntry, CheckParams, CheckRequest, CheckSpecSet, EMPTY_SPECIFICATION};

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
