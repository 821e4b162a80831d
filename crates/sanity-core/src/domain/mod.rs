//! Domain types shared by the runner, the orchestrator and their collaborators.

pub mod document;
pub mod problem;
pub mod result;
pub mod trace;

pub use document::{
    Document, DocumentProvider, Edge, MemoryDocumentProvider, SyncKind, Synchronisation, Template,
};
pub use problem::{Problem, ProblemList, ProblemOrigin, Severity};
pub use result::{
    overall_satisfied, RecordSummary, ResultRecord, TraceAction, RUNNER_LABEL, SPECIFICATION_LABEL,
};
pub use trace::{LogTraceSink, RecordingTraceSink, Trace, TraceSink, TraceStep};
