//! Shared problem list that several collaborators contribute to.
//!
//! Entries are tagged with their origin so the sanity checker only ever
//! removes what it added itself.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};

/// Who contributed a problem entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemOrigin {
    /// Added by the sanity checker.
    Sanity,

    /// Added by another collaborator (parser, type checker, ...).
    External(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// One entry of the problem list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub origin: ProblemOrigin,
    pub severity: Severity,

    /// Where in the model the problem applies.
    pub path: String,

    pub description: String,
}

impl Problem {
    pub fn sanity(path: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            origin: ProblemOrigin::Sanity,
            severity: Severity::Error,
            path: path.into(),
            description: description.into(),
        }
    }

    pub fn external(
        origin: impl Into<String>,
        path: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            origin: ProblemOrigin::External(origin.into()),
            severity: Severity::Error,
            path: path.into(),
            description: description.into(),
        }
    }
}

/// Ordered, shareable problem list. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct ProblemList {
    entries: Arc<Mutex<Vec<Problem>>>,
}

impl ProblemList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, problem: Problem) {
        self.lock().push(problem);
    }

    /// Remove every entry contributed by `origin`, returning how many were removed.
    pub fn remove_origin(&self, origin: &ProblemOrigin) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|p| &p.origin != origin);
        before - entries.len()
    }

    /// Copy of the current entries in insertion order.
    pub fn snapshot(&self) -> Vec<Problem> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Problem>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_origin_keeps_external_entries() {
        let problems = ProblemList::new();
        problems.push(Problem::external("parser", "Train", "syntax error"));
        problems.push(Problem::sanity("receivesyncs", "missed sync"));
        problems.push(Problem::external("typechecker", "Gate", "type mismatch"));
        problems.push(Problem::sanity("template-locations", "unreachable"));

        let removed = problems.remove_origin(&ProblemOrigin::Sanity);
        assert_eq!(removed, 2);

        let remaining = problems.snapshot();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0].description, "syntax error");
        assert_eq!(remaining[1].description, "type mismatch");
    }

    #[test]
    fn test_remove_origin_on_empty_list() {
        let problems = ProblemList::new();
        assert_eq!(problems.remove_origin(&ProblemOrigin::Sanity), 0);
        assert!(problems.is_empty());
    }

    #[test]
    fn test_clones_share_entries() {
        let problems = ProblemList::new();
        let shared = problems.clone();
        shared.push(Problem::sanity("deadlock-locations", "dead end"));
        assert_eq!(problems.len(), 1);
    }
}
