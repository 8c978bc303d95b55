#![forbid(unsafe_code)]

//! Weak message entry points.
//!
//! An [`Emitter`] feeds messages into a sandbox without keeping it alive.
//! Subscriptions receive one, and [`Sandbox::emitter`](crate::Sandbox::emitter)
//! hands one out to code (such as a view) that must not own the sandbox.

use std::sync::Weak;

use crate::stats::SandboxStats;

/// Type-erased operations of a running pipeline.
pub(crate) trait Stage<M>: Send + Sync {
    fn name(&self) -> &str;
    fn accept(&self, message: M) -> bool;
    fn dispose(&self) -> bool;
    fn is_disposed(&self) -> bool;
    fn stats(&self) -> SandboxStats;
}

/// Cloneable, non-owning message sink.
pub struct Emitter<M> {
    stage: Weak<dyn Stage<M>>,
}

impl<M> Emitter<M> {
    pub(crate) fn new(stage: Weak<dyn Stage<M>>) -> Self {
        Self { stage }
    }

    /// Feed `message` into the sandbox.
    ///
    /// Returns `false` once the sandbox is disposed or dropped; sources
    /// should stop producing at that point.
    pub fn emit(&self, message: M) -> bool {
        match self.stage.upgrade() {
            Some(stage) => stage.accept(message),
            None => false,
        }
    }

    /// Whether the sandbox still accepts messages.
    pub fn is_live(&self) -> bool {
        self.stage
            .upgrade()
            .is_some_and(|stage| !stage.is_disposed())
    }
}

impl<M> Clone for Emitter<M> {
    fn clone(&self) -> Self {
        Self {
            stage: Weak::clone(&self.stage),
        }
    }
}

impl<M> std::fmt::Debug for Emitter<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("live", &self.is_live())
            .finish()
    }
}
