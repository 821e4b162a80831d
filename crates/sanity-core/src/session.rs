//! Application-level context tying a document source to an orchestrator.
//!
//! One session per application window. It owns the shared problem list and
//! trace registry, keeps the check specification of the active document and
//! decides whether a finished run should be announced.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::OrchestratorConfig;
use crate::domain::{Document, DocumentProvider, ProblemList};
use crate::error::Result;
use crate::orchestrator::{Orchestrator, RunEvent, StartOutcome};
use crate::registry::{TraceActionRegistry, TraceToken};
use crate::runner::CheckRunner;
use crate::spec::EMPTY_SPECIFICATION;

/// How the user asked for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Button,
    Shortcut,
}

pub struct SanitySession {
    documents: Arc<dyn DocumentProvider>,
    orchestrator: Orchestrator,
    runtime: Handle,
    spec_text: Mutex<String>,
    last_trigger: Mutex<Option<Trigger>>,
    announcements_suppressed: AtomicBool,
}

impl SanitySession {
    /// Build a session with a fresh problem list and trace registry.
    pub fn new(
        documents: Arc<dyn DocumentProvider>,
        runner: Arc<dyn CheckRunner>,
        config: OrchestratorConfig,
        runtime: Handle,
    ) -> Self {
        let orchestrator = Orchestrator::new(
            runner,
            ProblemList::new(),
            Arc::new(TraceActionRegistry::new()),
            config,
            runtime.clone(),
        );
        let session = Self {
            documents,
            orchestrator,
            runtime,
            spec_text: Mutex::new(EMPTY_SPECIFICATION.to_string()),
            last_trigger: Mutex::new(None),
            announcements_suppressed: AtomicBool::new(false),
        };
        session.document_changed();
        session
    }

    /// Start a run over the active document, or cancel the one in flight.
    pub fn trigger(&self, trigger: Trigger) -> StartOutcome {
        let document = self.documents.current();
        let spec = self.spec_text();
        let outcome = self.orchestrator.start(&spec, document);

        if let StartOutcome::Started { run_id } = outcome {
            debug!(run_id = %run_id, trigger = ?trigger, "run triggered");
            *self
                .last_trigger
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(trigger);
        }
        outcome
    }

    /// Reload the check specification from the active document.
    pub fn document_changed(&self) {
        let document = self.documents.current();
        let text = document
            .stored_specification()
            .unwrap_or(EMPTY_SPECIFICATION)
            .to_string();
        debug!(document = %document.name, "specification reloaded");
        *self.lock_spec() = text;
    }

    /// Follow `changes` and reload on every document switch.
    pub fn watch_documents(
        self: &Arc<Self>,
        mut changes: watch::Receiver<Arc<Document>>,
    ) -> JoinHandle<()> {
        let session = Arc::clone(self);
        self.runtime.spawn(async move {
            while changes.changed().await.is_ok() {
                session.document_changed();
            }
        })
    }

    pub fn spec_text(&self) -> String {
        self.lock_spec().clone()
    }

    /// Replace the specification text for subsequent runs.
    pub fn set_spec_text(&self, text: impl Into<String>) {
        *self.lock_spec() = text.into();
    }

    /// Whether the completion of the last started run should be announced.
    ///
    /// Only shortcut-triggered runs announce, and only until the user opts out.
    pub fn should_announce(&self) -> bool {
        let last = *self
            .last_trigger
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        last == Some(Trigger::Shortcut) && !self.announcements_suppressed.load(Ordering::SeqCst)
    }

    /// Stop announcing completed runs for the rest of the session.
    pub fn suppress_announcements(&self) {
        self.announcements_suppressed.store(true, Ordering::SeqCst);
    }

    pub fn invoke_trace(&self, token: TraceToken) -> Result<()> {
        self.orchestrator.registry().invoke(token)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.orchestrator.subscribe()
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn problems(&self) -> &ProblemList {
        self.orchestrator.problems()
    }

    pub fn registry(&self) -> &Arc<TraceActionRegistry> {
        self.orchestrator.registry()
    }

    fn lock_spec(&self) -> std::sync::MutexGuard<'_, String> {
        self.spec_text.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SanitySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SanitySession")
            .field("orchestrator", &self.orchestrator)
            .field("announcements_suppressed", &self.announcements_suppressed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MemoryDocumentProvider, ResultRecord};
    use crate::fakes::ScriptedRunner;
    use std::time::Duration;

    fn session(provider: Arc<MemoryDocumentProvider>) -> SanitySession {
        SanitySession::new(
            provider,
            Arc::new(ScriptedRunner::new(vec![ResultRecord::satisfied("a", "ok")])),
            OrchestratorConfig::default(),
            Handle::current(),
        )
    }

    #[tokio::test]
    async fn test_loads_stored_specification() {
        let provider = Arc::new(MemoryDocumentProvider::new(
            Document::new("m").with_specification(r#"{"checks": [{"type": "deadlock-locations"}]}"#),
        ));
        let session = session(provider);
        assert!(session.spec_text().contains("deadlock-locations"));
    }

    #[tokio::test]
    async fn test_missing_specification_defaults_to_empty_set() {
        let session = session(Arc::new(MemoryDocumentProvider::new(Document::new("m"))));
        assert_eq!(session.spec_text(), EMPTY_SPECIFICATION);
    }

    #[tokio::test]
    async fn test_announcement_policy() {
        let session = session(Arc::new(MemoryDocumentProvider::new(Document::new("m"))));
        assert!(!session.should_announce());

        session.trigger(Trigger::Button);
        session.orchestrator().join().await;
        assert!(!session.should_announce());

        session.trigger(Trigger::Shortcut);
        session.orchestrator().join().await;
        assert!(session.should_announce());

        session.suppress_announcements();
        assert!(!session.should_announce());
    }

    #[tokio::test]
    async fn test_watch_documents_reloads_specification() {
        let provider = Arc::new(MemoryDocumentProvider::new(Document::new("first")));
        let session = Arc::new(session(Arc::clone(&provider)));
        let watcher = session.watch_documents(provider.changes());

        provider.set(Document::new("second").with_specification(r#"{"checks": [{"type": "x"}]}"#));

        let mut reloaded = false;
        for _ in 0..100 {
            if session.spec_text().contains(r#""x""#) {
                reloaded = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(reloaded);
        watcher.abort();
    }
}
