#![forbid(unsafe_code)]

//! Per-sandbox counters.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::dispatcher::CommandOutcome;

/// Point-in-time copy of a sandbox's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SandboxStats {
    /// Messages admitted into the channel.
    pub accepted: u64,
    /// Update function invocations.
    pub applied: u64,
    /// View callback invocations.
    pub rendered: u64,
    /// Command tasks started.
    pub commands_started: u64,
    /// Command tasks that ended through recovery.
    pub commands_recovered: u64,
    /// Command tasks stopped by disposal.
    pub commands_cancelled: u64,
    /// Messages or states discarded because the sandbox was disposed.
    pub dropped: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    accepted: AtomicU64,
    applied: AtomicU64,
    rendered: AtomicU64,
    commands_started: AtomicU64,
    commands_recovered: AtomicU64,
    commands_cancelled: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    pub(crate) fn accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn applied(&self) -> u64 {
        self.applied.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn rendered(&self) {
        self.rendered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn command_started(&self) {
        self.commands_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn command_finished(&self, outcome: CommandOutcome) {
        match outcome {
            CommandOutcome::Completed { .. } => {}
            CommandOutcome::Recovered { .. } => {
                self.commands_recovered.fetch_add(1, Ordering::Relaxed);
            }
            CommandOutcome::Cancelled { .. } => {
                self.commands_cancelled.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub(crate) fn dropped(&self, n: u64) {
        self.dropped.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> SandboxStats {
        SandboxStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            rendered: self.rendered.load(Ordering::Relaxed),
            commands_started: self.commands_started.load(Ordering::Relaxed),
            commands_recovered: self.commands_recovered.load(Ordering::Relaxed),
            commands_cancelled: self.commands_cancelled.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}
