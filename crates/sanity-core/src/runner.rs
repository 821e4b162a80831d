//! Synchronous execution of one check set against one document.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cancel::CancelToken;
use crate::catalog::{CheckCatalog, CheckContext, CheckerType};
use crate::domain::{Document, LogTraceSink, ResultRecord, TraceSink, SPECIFICATION_LABEL};
use crate::error::{Result, SanityError};
use crate::obs::emit_check_finished;
use crate::spec::{CheckEntry, CheckRequest, CheckSpecSet};

/// Executes a check set, streaming each record to `on_result` as it completes.
///
/// Implementations poll `cancel` between checks (and ideally within them)
/// and return [`SanityError::Cancelled`] once it fires. Any other `Err` is a
/// failure of the run as a whole.
pub trait CheckRunner: Send + Sync {
    fn run(
        &self,
        spec: &CheckSpecSet,
        document: &Document,
        cancel: &CancelToken,
        on_result: &mut dyn FnMut(ResultRecord),
    ) -> Result<()>;

    /// Interrupt a long-running primitive the run `run_id` may be blocked in.
    ///
    /// Called while the orchestrator lock is held and `run_id` is still the
    /// active run. Must return promptly and must not call back into the
    /// orchestrator.
    fn interrupt(&self, _run_id: Uuid) {}
}

/// Runner that resolves each request against a [`CheckCatalog`] and runs the
/// checks sequentially, isolating failures per check.
pub struct CatalogRunner {
    catalog: CheckCatalog,
    traces: Arc<dyn TraceSink>,
}

impl CatalogRunner {
    pub fn new(catalog: CheckCatalog, traces: Arc<dyn TraceSink>) -> Self {
        Self { catalog, traces }
    }

    /// Builtin checks, traces only logged.
    pub fn builtin() -> Self {
        Self::new(CheckCatalog::builtin(), Arc::new(LogTraceSink))
    }

    pub fn catalog(&self) -> &CheckCatalog {
        &self.catalog
    }

    fn run_request(
        &self,
        request: &CheckRequest,
        document: &Document,
        cancel: &CancelToken,
    ) -> Result<ResultRecord> {
        let Some(check) = self.catalog.get(&request.check_type) else {
            return Err(SanityError::UnknownCheck(request.check_type.clone()));
        };

        let ctx = CheckContext {
            document,
            request,
            checker: CheckerType::from_request(request)?,
            cancel,
            traces: &self.traces,
        };

        match catch_unwind(AssertUnwindSafe(|| check.check(&ctx))) {
            Ok(outcome) => outcome,
            Err(payload) => Err(SanityError::CheckExecution {
                check: request.check_type.clone(),
                reason: format!("panicked: {}", panic_message(payload.as_ref())),
            }),
        }
    }
}

impl CheckRunner for CatalogRunner {
    fn run(
        &self,
        spec: &CheckSpecSet,
        document: &Document,
        cancel: &CancelToken,
        on_result: &mut dyn FnMut(ResultRecord),
    ) -> Result<()> {
        for entry in spec.entries() {
            cancel.check()?;

            let record = match entry {
                CheckEntry::Malformed { error, .. } => {
                    ResultRecord::violated(SPECIFICATION_LABEL, error.to_string())
                }
                CheckEntry::Check(request) => match self.run_request(request, document, cancel) {
                    Ok(record) => record,
                    Err(SanityError::Cancelled) => return Err(SanityError::Cancelled),
                    Err(e) => {
                        warn!(check = %request.check_type, error = %e, "check failed");
                        ResultRecord::from_error(request.check_type.clone(), &e)
                    }
                },
            };

            emit_check_finished(record.check(), record.is_satisfied(), record.has_trace());
            on_result(record);
        }

        debug!(entries = spec.len(), "check set finished");
        Ok(())
    }
}

impl std::fmt::Debug for CatalogRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogRunner")
            .field("catalog", &self.catalog)
            .finish()
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
