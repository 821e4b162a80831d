//! Counter-example traces and the sink that displays them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, PoisonError};
use tracing::info;

/// One transition of a counter-example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceStep {
    pub source: String,
    pub target: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync: Option<String>,
}

/// A counter-example: a path through one template, starting at its initial location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    pub template: String,
    pub steps: Vec<TraceStep>,
}

impl Trace {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            steps: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "trace through {} ({} step(s))", self.template, self.steps.len())?;
        for (i, step) in self.steps.iter().enumerate() {
            match &step.sync {
                Some(sync) => writeln!(
                    f,
                    "  {:>3}. {}.{} -> {}.{} [{}]",
                    i + 1,
                    self.template,
                    step.source,
                    self.template,
                    step.target,
                    sync
                )?,
                None => writeln!(
                    f,
                    "  {:>3}. {}.{} -> {}.{}",
                    i + 1,
                    self.template,
                    step.source,
                    self.template,
                    step.target
                )?,
            }
        }
        Ok(())
    }
}

/// Display collaborator for counter-example traces (simulator pane, terminal, ...).
pub trait TraceSink: Send + Sync {
    fn show(&self, trace: &Trace);
}

/// Sink that only logs the trace.
#[derive(Debug, Default)]
pub struct LogTraceSink;

impl TraceSink for LogTraceSink {
    fn show(&self, trace: &Trace) {
        info!(
            event = "trace.shown",
            template = %trace.template,
            steps = trace.steps.len(),
        );
    }
}

/// Sink that keeps every shown trace, for callers that render later.
#[derive(Debug, Default)]
pub struct RecordingTraceSink {
    shown: Mutex<Vec<Trace>>,
}

impl RecordingTraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shown(&self) -> Vec<Trace> {
        self.shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TraceSink for RecordingTraceSink {
    fn show(&self, trace: &Trace) {
        self.shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(trace.clone());
    }
}
