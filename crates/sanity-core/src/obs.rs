//! Structured observability hooks for the check-run lifecycle.
//!
//! This module provides:
//! - Run-scoped tracing spans via [`run_span`]
//! - Emission functions for key lifecycle events: start, per-check completion,
//!   cancel request, completion, cancellation and trace invocation
//!
//! Events are emitted at `info!` level (configurable via `RUST_LOG`).

use tracing::{info, warn};

/// Span covering one background run; attach with `Instrument::instrument`.
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("sanity.run", run_id = %run_id)
}

/// Emit event: run started with the digest of its check specification.
pub fn emit_run_started(run_id: &str, generation: u64, spec_digest: Option<&str>, checks: usize) {
    info!(
        event = "run.started",
        run_id = %run_id,
        generation = generation,
        spec_digest = spec_digest.unwrap_or("<unparsed>"),
        checks = checks,
    );
}

/// Emit event: one check produced its record.
pub fn emit_check_finished(check: &str, satisfied: bool, has_trace: bool) {
    info!(
        event = "check.finished",
        check = %check,
        satisfied = satisfied,
        has_trace = has_trace,
    );
}

/// Emit event: a start request arrived while a run was active.
pub fn emit_cancel_requested(run_id: &str) {
    info!(event = "run.cancel_requested", run_id = %run_id);
}

/// Emit event: run finished normally.
pub fn emit_run_completed(run_id: &str, duration_ms: u64, results: usize, satisfied: bool) {
    info!(
        event = "run.completed",
        run_id = %run_id,
        duration_ms = duration_ms,
        results = results,
        satisfied = satisfied,
    );
}

/// Emit event: run stopped after cancellation; its findings are discarded.
pub fn emit_run_cancelled(run_id: &str, discarded: usize) {
    info!(event = "run.cancelled", run_id = %run_id, discarded = discarded);
}

/// Emit event: the runner failed as a whole (warning level).
pub fn emit_runner_failed(run_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "run.runner_failed", run_id = %run_id, error = %error);
}

/// Emit event: a trace token was invoked.
pub fn emit_trace_invoked(token: &str, found: bool) {
    if found {
        info!(event = "trace.invoked", token = %token);
    } else {
        warn!(event = "trace.stale_token", token = %token);
    }
}
