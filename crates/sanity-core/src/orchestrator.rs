//! Single-flight check-run orchestration.
//!
//! The orchestrator is an explicit three-state machine guarded by one lock:
//!
//! ```text
//!   IDLE --start--> RUNNING --start--> CANCELLING
//!    ^                 |                   |
//!    +---completed-----+----cancelled------+
//! ```
//!
//! `start` never blocks: while idle it launches a run on the tokio runtime,
//! while running it requests cancellation, while cancelling it does nothing.
//! A cancelled run is silent towards result consumers. Every failure inside a
//! run ends up as a failing record; the machine always returns to idle.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn, Instrument};
use uuid::Uuid;

use crate::cancel::{CancelSignal, CancelToken};
use crate::config::OrchestratorConfig;
use crate::domain::{
    overall_satisfied, Document, Problem, ProblemList, ProblemOrigin, ResultRecord, RUNNER_LABEL,
    SPECIFICATION_LABEL,
};
use crate::error::{SanityError, SpecParseError};
use crate::obs::{
    emit_cancel_requested, emit_run_cancelled, emit_run_completed, emit_run_started,
    emit_runner_failed, run_span,
};
use crate::registry::{TraceActionRegistry, TraceToken};
use crate::runner::{panic_message, CheckRunner};
use crate::spec::CheckSpecSet;

/// Orchestrator lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Cancelling,
}

/// What a call to [`Orchestrator::start`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new run was launched.
    Started { run_id: Uuid },

    /// The active run was asked to stop; no new run was queued.
    CancelRequested { run_id: Uuid },

    /// A cancellation is already in flight.
    AlreadyCancelling,
}

/// A record as handed to the caller, with the token for its trace action.
#[derive(Debug, Clone)]
pub struct PublishedResult {
    pub record: ResultRecord,
    pub trace_token: Option<TraceToken>,
}

/// Completion notification of a run that was not cancelled.
#[derive(Debug, Clone)]
pub struct RunCompletion {
    pub run_id: Uuid,

    /// Digest of the parsed check specification; `None` if it did not parse.
    pub spec_digest: Option<String>,

    /// Records in arrival order.
    pub results: Vec<PublishedResult>,

    /// AND over all records; true for zero records.
    pub overall_satisfied: bool,

    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl RunCompletion {
    pub fn records(&self) -> impl Iterator<Item = &ResultRecord> {
        self.results.iter().map(|r| &r.record)
    }

    pub fn failed_count(&self) -> usize {
        self.records().filter(|r| !r.is_satisfied()).count()
    }
}

/// Lifecycle notifications, in the order they happen.
///
/// For any run, `Completed` or `Cancelled` is sent before the next run's
/// `Started`.
#[derive(Debug, Clone)]
pub enum RunEvent {
    Started {
        run_id: Uuid,
        spec_digest: Option<String>,
    },

    /// Progress only; findings are published with `Completed`.
    Progress {
        run_id: Uuid,
        completed: usize,
        check: String,
    },

    Completed(Arc<RunCompletion>),

    Cancelled {
        run_id: Uuid,
    },
}

struct ActiveRun {
    run_id: Uuid,
    generation: u64,
    signal: CancelSignal,
}

struct Inner {
    state: RunState,
    generation: u64,
    active: Option<ActiveRun>,
    handle: Option<JoinHandle<()>>,
    published_tokens: Vec<TraceToken>,
    last_completion: Option<Arc<RunCompletion>>,
}

struct Shared {
    inner: Mutex<Inner>,
    runner: Arc<dyn CheckRunner>,
    problems: ProblemList,
    registry: Arc<TraceActionRegistry>,
    events: broadcast::Sender<RunEvent>,
    config: OrchestratorConfig,
}

/// How a run's background work ended.
enum RunOutcome {
    Finished(Vec<ResultRecord>),
    Cancelled { discarded: usize },
}

/// Runs check sets off the caller's thread, one at a time.
pub struct Orchestrator {
    shared: Arc<Shared>,
    runtime: Handle,
}

impl Orchestrator {
    /// Create an orchestrator that spawns runs on `runtime`.
    ///
    /// The problem list and registry are owned by the application context
    /// and shared with the UI layer.
    pub fn new(
        runner: Arc<dyn CheckRunner>,
        problems: ProblemList,
        registry: Arc<TraceActionRegistry>,
        config: OrchestratorConfig,
        runtime: Handle,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                state: RunState::Idle,
                generation: 0,
                active: None,
                handle: None,
                published_tokens: Vec::new(),
                last_completion: None,
            }),
            runner,
            problems,
            registry,
            events,
            config,
        });
        Self { shared, runtime }
    }

    /// Start a run, or cancel the active one.
    ///
    /// Never blocks on check execution. A parse failure of `spec_text` still
    /// starts a run whose only record describes the failure.
    pub fn start(&self, spec_text: &str, document: Arc<Document>) -> StartOutcome {
        let mut inner = self.shared.lock();

        match inner.state {
            RunState::Cancelling => {
                debug!("start ignored, cancellation already in flight");
                StartOutcome::AlreadyCancelling
            }
            RunState::Running => {
                inner.state = RunState::Cancelling;
                let run_id = match &inner.active {
                    Some(active) => {
                        active.signal.cancel();
                        active.run_id
                    }
                    None => Uuid::nil(),
                };

                emit_cancel_requested(&run_id.to_string());
                // Still under the lock: the run cannot finish and be replaced
                // before the runner has seen the interrupt.
                self.shared.runner.interrupt(run_id);
                drop(inner);

                StartOutcome::CancelRequested { run_id }
            }
            RunState::Idle => {
                let spec = CheckSpecSet::parse(spec_text);
                let spec_digest = spec.as_ref().ok().map(CheckSpecSet::digest);
                let checks = spec.as_ref().map(CheckSpecSet::len).unwrap_or(0);

                inner.generation += 1;
                let generation = inner.generation;
                let run_id = Uuid::new_v4();
                let (signal, cancel) = CancelSignal::new();

                inner.state = RunState::Running;
                inner.active = Some(ActiveRun {
                    run_id,
                    generation,
                    signal,
                });

                emit_run_started(&run_id.to_string(), generation, spec_digest.as_deref(), checks);
                let _ = self.shared.events.send(RunEvent::Started {
                    run_id,
                    spec_digest: spec_digest.clone(),
                });

                let shared = Arc::clone(&self.shared);
                let work = async move {
                    shared
                        .execute(run_id, generation, spec, spec_digest, document, cancel)
                        .await;
                }
                .instrument(run_span(&run_id.to_string()));
                inner.handle = Some(self.runtime.spawn(work));

                StartOutcome::Started { run_id }
            }
        }
    }

    pub fn state(&self) -> RunState {
        self.shared.lock().state
    }

    /// Whether a run is active (running or being cancelled).
    pub fn is_running(&self) -> bool {
        self.state() != RunState::Idle
    }

    /// Subscribe to lifecycle events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.shared.events.subscribe()
    }

    /// Most recent completion, until superseded by the next completed run.
    pub fn last_completion(&self) -> Option<Arc<RunCompletion>> {
        self.shared.lock().last_completion.clone()
    }

    pub fn registry(&self) -> &Arc<TraceActionRegistry> {
        &self.shared.registry
    }

    pub fn problems(&self) -> &ProblemList {
        &self.shared.problems
    }

    /// Wait until the most recently launched run has been fully processed.
    pub async fn join(&self) {
        let handle = self.shared.lock().handle.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "run task did not finish cleanly");
            }
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        if let Some(active) = &self.shared.lock().active {
            active.signal.cancel();
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("state", &self.state())
            .field("config", &self.shared.config)
            .finish()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn execute(
        self: Arc<Self>,
        run_id: Uuid,
        generation: u64,
        spec: Result<CheckSpecSet, SpecParseError>,
        spec_digest: Option<String>,
        document: Arc<Document>,
        cancel: CancelToken,
    ) {
        let started = Instant::now();

        let removed = self.problems.remove_origin(&ProblemOrigin::Sanity);
        debug!(removed = removed, "cleared previous sanity problems");

        let outcome = match spec {
            Err(e) => RunOutcome::Finished(vec![ResultRecord::violated(
                SPECIFICATION_LABEL,
                e.to_string(),
            )]),
            Ok(spec) => self.run_checks(run_id, spec, document, cancel.clone()).await,
        };

        let outcome = match outcome {
            RunOutcome::Finished(records) if cancel.is_cancelled() => RunOutcome::Cancelled {
                discarded: records.len(),
            },
            other => other,
        };

        self.finish(run_id, generation, spec_digest, outcome, started);
    }

    async fn run_checks(
        self: &Arc<Self>,
        run_id: Uuid,
        spec: CheckSpecSet,
        document: Arc<Document>,
        cancel: CancelToken,
    ) -> RunOutcome {
        let shared = Arc::clone(self);
        let span = tracing::Span::current();
        let joined = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            let mut buffer: Vec<ResultRecord> = Vec::new();
            let outcome = shared.runner.run(&spec, &document, &cancel, &mut |record| {
                let _ = shared.events.send(RunEvent::Progress {
                    run_id,
                    completed: buffer.len() + 1,
                    check: record.check().to_string(),
                });
                buffer.push(record);
            });
            (buffer, outcome)
        })
        .await;

        let error = match joined {
            Ok((records, Ok(()))) => return RunOutcome::Finished(records),
            Ok((records, Err(SanityError::Cancelled))) => {
                return RunOutcome::Cancelled {
                    discarded: records.len(),
                }
            }
            Ok((_, Err(e))) => SanityError::RunnerFatal(e.to_string()),
            Err(e) if e.is_panic() => {
                SanityError::RunnerFatal(format!("panicked: {}", panic_message(&*e.into_panic())))
            }
            Err(e) => SanityError::RunnerFatal(e.to_string()),
        };

        emit_runner_failed(&run_id.to_string(), &error);
        RunOutcome::Finished(vec![ResultRecord::from_error(RUNNER_LABEL, &error)])
    }

    fn finish(
        &self,
        run_id: Uuid,
        generation: u64,
        spec_digest: Option<String>,
        outcome: RunOutcome,
        started: Instant,
    ) {
        let mut inner = self.lock();

        if inner.generation != generation {
            warn!(generation = generation, current = inner.generation, "stale run finished");
            return;
        }

        match outcome {
            RunOutcome::Cancelled { discarded } => {
                emit_run_cancelled(&run_id.to_string(), discarded);
                let _ = self.events.send(RunEvent::Cancelled { run_id });
            }
            RunOutcome::Finished(records) => {
                let revoked = self.registry.revoke(&inner.published_tokens);
                debug!(revoked = revoked, "revoked superseded trace tokens");

                let results: Vec<PublishedResult> = records
                    .into_iter()
                    .map(|record| {
                        let trace_token = record
                            .trace_action()
                            .map(|action| self.registry.register(Arc::clone(action)));
                        PublishedResult {
                            record,
                            trace_token,
                        }
                    })
                    .collect();

                inner.published_tokens = results.iter().filter_map(|r| r.trace_token).collect();

                if self.config.publish_problems {
                    for result in results.iter().filter(|r| !r.record.is_satisfied()) {
                        self.problems
                            .push(Problem::sanity(result.record.check(), result.record.message()));
                    }
                }

                let completion = Arc::new(RunCompletion {
                    run_id,
                    spec_digest,
                    overall_satisfied: overall_satisfied(results.iter().map(|r| &r.record)),
                    results,
                    finished_at: Utc::now(),
                    duration_ms: started.elapsed().as_millis() as u64,
                });

                emit_run_completed(
                    &run_id.to_string(),
                    completion.duration_ms,
                    completion.results.len(),
                    completion.overall_satisfied,
                );
                inner.last_completion = Some(Arc::clone(&completion));
                let _ = self.events.send(RunEvent::Completed(completion));
            }
        }

        inner.active = None;
        inner.state = RunState::Idle;
    }
}
