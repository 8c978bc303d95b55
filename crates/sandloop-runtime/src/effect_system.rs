#![forbid(unsafe_code)]

//! Effect observability: tracing spans and process-wide counters.
//!
//! - `effect.command` span around every command task, with
//!   `command_type`, `duration_us`, and `result` fields.
//! - `effect.subscription` span on subscription start/stop.
//! - Monotonic counters: [`effects_command_total`],
//!   [`effects_recovered_total`], [`effects_subscription_total`].

use std::sync::atomic::{AtomicU64, Ordering};
use web_time::Instant;

use crate::dispatcher::CommandOutcome;

static EFFECTS_COMMAND_TOTAL: AtomicU64 = AtomicU64::new(0);
static EFFECTS_RECOVERED_TOTAL: AtomicU64 = AtomicU64::new(0);
static EFFECTS_SUBSCRIPTION_TOTAL: AtomicU64 = AtomicU64::new(0);

/// Command tasks executed in this process.
#[must_use]
pub fn effects_command_total() -> u64 {
    EFFECTS_COMMAND_TOTAL.load(Ordering::Relaxed)
}

/// Command tasks whose stream failed and was converted by recovery.
#[must_use]
pub fn effects_recovered_total() -> u64 {
    EFFECTS_RECOVERED_TOTAL.load(Ordering::Relaxed)
}

/// Subscriptions started in this process.
#[must_use]
pub fn effects_subscription_total() -> u64 {
    EFFECTS_SUBSCRIPTION_TOTAL.load(Ordering::Relaxed)
}

/// Commands plus subscriptions.
#[must_use]
pub fn effects_executed_total() -> u64 {
    effects_command_total() + effects_subscription_total()
}

/// Run a command task inside an `effect.command` span.
pub fn trace_command_effect<F>(sandbox: &str, command_type: &str, f: F) -> CommandOutcome
where
    F: FnOnce() -> CommandOutcome,
{
    EFFECTS_COMMAND_TOTAL.fetch_add(1, Ordering::Relaxed);

    let start = Instant::now();
    let span = tracing::debug_span!(
        "effect.command",
        sandbox = %sandbox,
        command_type = %command_type,
        duration_us = tracing::field::Empty,
        result = tracing::field::Empty,
    );
    let _entered = span.enter();

    tracing::debug!(
        target: "sandloop.effect",
        command_type = %command_type,
        "command effect started"
    );

    let outcome = f();
    let duration_us = start.elapsed().as_micros() as u64;
    span.record("duration_us", duration_us);
    span.record("result", outcome.label());

    match outcome {
        CommandOutcome::Recovered { messages } => {
            EFFECTS_RECOVERED_TOTAL.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                target: "sandloop.effect",
                command_type = %command_type,
                messages,
                duration_us,
                "command failed, recovery message emitted"
            );
        }
        CommandOutcome::Completed { messages } | CommandOutcome::Cancelled { messages } => {
            tracing::debug!(
                target: "sandloop.effect",
                command_type = %command_type,
                messages,
                duration_us,
                result = outcome.label(),
                "command effect completed"
            );
        }
    }

    outcome
}

/// Record a subscription start.
pub fn record_subscription_start(sandbox: &str, sub_id: u64) {
    EFFECTS_SUBSCRIPTION_TOTAL.fetch_add(1, Ordering::Relaxed);

    let _span = tracing::debug_span!(
        "effect.subscription",
        sandbox = %sandbox,
        sub_id = sub_id,
        active = true,
    )
    .entered();

    tracing::debug!(
        target: "sandloop.effect",
        sub_id = sub_id,
        active = true,
        "subscription started"
    );
}

/// Record a subscription stop.
pub fn record_subscription_stop(sandbox: &str, sub_id: u64) {
    let _span = tracing::debug_span!(
        "effect.subscription",
        sandbox = %sandbox,
        sub_id = sub_id,
        active = false,
    )
    .entered();

    tracing::debug!(
        target: "sandloop.effect",
        sub_id = sub_id,
        active = false,
        "subscription stopped"
    );
}

/// Report a stage that is unwinding from a panic.
pub fn error_stage_panic(sandbox: &str, stage: &str) {
    tracing::error!(
        target: "sandloop.lifecycle",
        sandbox = %sandbox,
        stage = %stage,
        "stage panicked, sandbox disposed"
    );
}
