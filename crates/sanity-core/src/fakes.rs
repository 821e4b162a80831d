//! In-memory runner fakes (testing only)
//!
//! Provides `ScriptedRunner` and `GatedRunner`, which satisfy the
//! [`CheckRunner`] contract without evaluating any checks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use uuid::Uuid;

use crate::cancel::CancelToken;
use crate::domain::{Document, ResultRecord};
use crate::error::{Result, SanityError};
use crate::runner::CheckRunner;
use crate::spec::CheckSpecSet;

// ---------------------------------------------------------------------------
// ScriptedRunner
// ---------------------------------------------------------------------------

/// One step of a scripted run.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Deliver this record.
    Record(ResultRecord),

    /// Fail the whole run with a runner error.
    Fail(String),

    /// Panic inside the runner.
    Panic(String),
}

/// Replays the same script on every run, ignoring the check set.
#[derive(Debug)]
pub struct ScriptedRunner {
    steps: Vec<ScriptStep>,
    runs: AtomicUsize,
}

impl ScriptedRunner {
    /// Runner that delivers `records` in order.
    pub fn new(records: Vec<ResultRecord>) -> Self {
        Self::with_steps(records.into_iter().map(ScriptStep::Record).collect())
    }

    pub fn with_steps(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps,
            runs: AtomicUsize::new(0),
        }
    }

    /// Number of runs started so far.
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl CheckRunner for ScriptedRunner {
    fn run(
        &self,
        _spec: &CheckSpecSet,
        _document: &Document,
        cancel: &CancelToken,
        on_result: &mut dyn FnMut(ResultRecord),
    ) -> Result<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);

        for step in &self.steps {
            cancel.check()?;
            match step {
                ScriptStep::Record(record) => on_result(record.clone()),
                ScriptStep::Fail(reason) => return Err(SanityError::RunnerFatal(reason.clone())),
                ScriptStep::Panic(message) => panic!("{message}"),
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// GatedRunner
// ---------------------------------------------------------------------------

const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Blocks each run until a permit is released or the run is cancelled.
///
/// Records listed in `before_gate` are delivered before blocking, the rest
/// after the gate opens.
#[derive(Debug)]
pub struct GatedRunner {
    before_gate: Vec<ResultRecord>,
    after_gate: Vec<ResultRecord>,
    honours_cancel: bool,
    permits: Mutex<usize>,
    runs: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    interrupted: Mutex<Vec<Uuid>>,
}

impl GatedRunner {
    pub fn new(after_gate: Vec<ResultRecord>) -> Self {
        Self {
            before_gate: Vec::new(),
            after_gate,
            honours_cancel: true,
            permits: Mutex::new(0),
            runs: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            interrupted: Mutex::new(Vec::new()),
        }
    }

    pub fn with_records_before_gate(mut self, records: Vec<ResultRecord>) -> Self {
        self.before_gate = records;
        self
    }

    /// Keep waiting for a permit even after cancellation, like a runner
    /// stuck in a primitive it cannot interrupt.
    pub fn ignoring_cancel(mut self) -> Self {
        self.honours_cancel = false;
        self
    }

    /// Let one blocked (or future) run pass its gate.
    pub fn release(&self) {
        *self.permits.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    /// Highest number of runs observed executing at the same time.
    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Run ids passed to `interrupt`, in call order.
    pub fn interrupted_runs(&self) -> Vec<Uuid> {
        self.interrupted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Wait until at least `n` runs have started. Returns false on timeout.
    pub async fn wait_for_runs(&self, n: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.runs() < n {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        true
    }

    fn take_permit(&self) -> bool {
        let mut permits = self.permits.lock().unwrap_or_else(PoisonError::into_inner);
        if *permits > 0 {
            *permits -= 1;
            true
        } else {
            false
        }
    }

    fn gated_run(&self, cancel: &CancelToken, on_result: &mut dyn FnMut(ResultRecord)) -> Result<()> {
        for record in &self.before_gate {
            on_result(record.clone());
        }

        while !self.take_permit() {
            if self.honours_cancel {
                cancel.check()?;
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        for record in &self.after_gate {
            if self.honours_cancel {
                cancel.check()?;
            }
            on_result(record.clone());
        }
        Ok(())
    }
}

impl CheckRunner for GatedRunner {
    fn run(
        &self,
        _spec: &CheckSpecSet,
        _document: &Document,
        cancel: &CancelToken,
        on_result: &mut dyn FnMut(ResultRecord),
    ) -> Result<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        let outcome = self.gated_run(cancel, on_result);

        self.active.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    fn interrupt(&self, run_id: Uuid) {
        self.interrupted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(run_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelSignal;

    fn spec() -> CheckSpecSet {
        CheckSpecSet::parse(r#"{"checks": []}"#).unwrap()
    }

    #[test]
    fn test_scripted_runner_stops_at_failure() {
        let runner = ScriptedRunner::with_steps(vec![
            ScriptStep::Record(ResultRecord::satisfied("a", "ok")),
            ScriptStep::Fail("disk on fire".into()),
            ScriptStep::Record(ResultRecord::satisfied("b", "ok")),
        ]);
        let mut records = Vec::new();
        let err = runner
            .run(&spec(), &Document::new("m"), &CancelToken::never(), &mut |r| records.push(r))
            .unwrap_err();
        assert!(err.to_string().contains("disk on fire"));
        assert_eq!(records.len(), 1);
        assert_eq!(runner.runs(), 1);
    }

    #[test]
    fn test_gated_runner_passes_with_permit() {
        let runner = GatedRunner::new(vec![ResultRecord::satisfied("a", "ok")]);
        runner.release();
        let mut records = Vec::new();
        runner
            .run(&spec(), &Document::new("m"), &CancelToken::never(), &mut |r| records.push(r))
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(runner.max_concurrency(), 1);
    }

    #[test]
    fn test_gated_runner_honours_cancel() {
        let runner = GatedRunner::new(vec![ResultRecord::satisfied("a", "ok")]);
        let (signal, token) = CancelSignal::new();
        signal.cancel();
        let err = runner
            .run(&spec(), &Document::new("m"), &token, &mut |_| {})
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
