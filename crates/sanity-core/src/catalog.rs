//! Catalog of available sanity checks, keyed by short name.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::checks::{DeadlockLocations, ReceiveSyncs, TemplateLocations};
use crate::domain::{Document, ResultRecord, Trace, TraceSink};
use crate::error::{Result, SanityError};
use crate::spec::CheckRequest;

/// Parameter selecting the verification back end, shared by every check.
pub const CHECKER_PARAMETER: &str = "checker";

/// Kind of value a check parameter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    Text,
    CheckerType,
}

/// A parameter a check understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: ParameterKind,
    pub required: bool,
}

impl ParameterSpec {
    pub const fn text(name: &'static str, description: &'static str, required: bool) -> Self {
        Self {
            name,
            description,
            kind: ParameterKind::Text,
            required,
        }
    }

    pub const fn checker() -> Self {
        Self {
            name: CHECKER_PARAMETER,
            description: "Checker type",
            kind: ParameterKind::CheckerType,
            required: false,
        }
    }
}

/// Verification back end a check should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckerType {
    #[default]
    Symbolic,
    Concrete,
}

impl CheckerType {
    /// Read the checker type from a request, defaulting to symbolic.
    pub fn from_request(request: &CheckRequest) -> Result<Self> {
        match request.param_str(CHECKER_PARAMETER) {
            None => Ok(Self::default()),
            Some(value) => value.parse().map_err(|reason| SanityError::CheckExecution {
                check: request.check_type.clone(),
                reason,
            }),
        }
    }
}

impl CheckerType {
    /// Whether failing results from this checker come with a trace.
    ///
    /// The concrete checker explores single runs and reports verdicts only.
    pub fn produces_traces(self) -> bool {
        matches!(self, Self::Symbolic)
    }
}

impl FromStr for CheckerType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "symbolic" => Ok(Self::Symbolic),
            "concrete" => Ok(Self::Concrete),
            other => Err(format!("unknown checker type '{other}'")),
        }
    }
}

impl fmt::Display for CheckerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Symbolic => f.write_str("symbolic"),
            Self::Concrete => f.write_str("concrete"),
        }
    }
}

/// Everything a check may look at while it runs.
pub struct CheckContext<'a> {
    pub document: &'a Document,
    pub request: &'a CheckRequest,
    pub checker: CheckerType,
    pub cancel: &'a CancelToken,

    /// Where trace actions produced by this check display their trace.
    pub traces: &'a Arc<dyn TraceSink>,
}

impl CheckContext<'_> {
    /// Attach a display action for `trace` to `record`, unless the selected
    /// checker does not produce traces.
    pub fn attach_trace(&self, record: ResultRecord, trace: Trace) -> ResultRecord {
        if !self.checker.produces_traces() {
            return record;
        }
        let sink = Arc::clone(self.traces);
        record.with_trace(Arc::new(move || sink.show(&trace)))
    }
}

/// One validation rule evaluated against a document.
pub trait SanityCheck: Send + Sync {
    /// Display name.
    fn name(&self) -> &'static str;

    /// Identifier used in the specification's `type` field.
    fn short_name(&self) -> &'static str;

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![ParameterSpec::checker()]
    }

    /// Evaluate the check. Long traversals should poll `ctx.cancel`.
    fn check(&self, ctx: &CheckContext<'_>) -> Result<ResultRecord>;
}

/// Registry of checks by short name.
#[derive(Clone, Default)]
pub struct CheckCatalog {
    checks: Vec<Arc<dyn SanityCheck>>,
}

impl CheckCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog containing every builtin check.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.register(Arc::new(TemplateLocations));
        catalog.register(Arc::new(ReceiveSyncs));
        catalog.register(Arc::new(DeadlockLocations));
        catalog
    }

    /// Add a check, replacing any earlier check with the same short name.
    pub fn register(&mut self, check: Arc<dyn SanityCheck>) {
        self.checks.retain(|c| c.short_name() != check.short_name());
        self.checks.push(check);
    }

    pub fn get(&self, short_name: &str) -> Option<&Arc<dyn SanityCheck>> {
        self.checks.iter().find(|c| c.short_name() == short_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn SanityCheck>> {
        self.checks.iter()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

impl fmt::Debug for CheckCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.checks.iter().map(|c| c.short_name()))
            .finish()
    }
}
