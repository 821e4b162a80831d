//! Outcome of a single sanity check.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::SanityError;

/// Deferred, parameterless operation that displays a counter-example.
pub type TraceAction = Arc<dyn Fn() + Send + Sync>;

/// Label used for records synthesized from specification parse errors.
pub const SPECIFICATION_LABEL: &str = "specification";

/// Label used for records synthesized from runner failures.
pub const RUNNER_LABEL: &str = "runner";

/// Outcome of one check: message, verdict and an optional trace action.
///
/// Never mutated once handed to the orchestrator.
#[derive(Clone)]
pub struct ResultRecord {
    check: String,
    message: String,
    satisfied: bool,
    trace_action: Option<TraceAction>,
}

impl ResultRecord {
    /// A passing outcome.
    pub fn satisfied(check: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            message: message.into(),
            satisfied: true,
            trace_action: None,
        }
    }

    /// A failing outcome.
    pub fn violated(check: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            message: message.into(),
            satisfied: false,
            trace_action: None,
        }
    }

    /// A failing outcome describing an error rather than a check verdict.
    pub fn from_error(check: impl Into<String>, error: &SanityError) -> Self {
        Self::violated(check, error.to_string())
    }

    /// Attach the action that reconstructs this outcome's counter-example.
    pub fn with_trace(mut self, action: TraceAction) -> Self {
        self.trace_action = Some(action);
        self
    }

    /// Short name of the check (or synthetic label) that produced this record.
    pub fn check(&self) -> &str {
        &self.check
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_satisfied(&self) -> bool {
        self.satisfied
    }

    pub fn has_trace(&self) -> bool {
        self.trace_action.is_some()
    }

    pub fn trace_action(&self) -> Option<&TraceAction> {
        self.trace_action.as_ref()
    }

    /// Comparable, serializable view of this record.
    pub fn summary(&self) -> RecordSummary {
        RecordSummary {
            check: self.check.clone(),
            message: self.message.clone(),
            satisfied: self.satisfied,
            has_trace: self.has_trace(),
        }
    }
}

impl fmt::Debug for ResultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultRecord")
            .field("check", &self.check)
            .field("message", &self.message)
            .field("satisfied", &self.satisfied)
            .field("has_trace", &self.has_trace())
            .finish()
    }
}

/// Content of a [`ResultRecord`] without its action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSummary {
    pub check: String,
    pub message: String,
    pub satisfied: bool,
    pub has_trace: bool,
}

/// Logical AND over all verdicts; vacuously true for no records.
pub fn overall_satisfied<'a, I>(records: I) -> bool
where
    I: IntoIterator<Item = &'a ResultRecord>,
{
    records.into_iter().all(ResultRecord::is_satisfied)
}
