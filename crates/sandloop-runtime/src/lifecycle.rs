#![forbid(unsafe_code)]

//! Disposal tracking for everything a sandbox starts.
//!
//! A sandbox owns heterogeneous background work: command tasks and
//! subscription threads. Each one registers a cancellable handle in a single
//! [`TaskRegistry`]. Disposal flips the registry to `Disposed` and cancels
//! every handle in one pass; registration after that point is refused, so
//! nothing can slip in behind the sweep.
//!
//! ```text
//!   Active ──dispose()──▶ Disposed
//!     ▲                     │
//!     └── track() ok        └── track() -> None, dispose() -> false
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use sandloop_core::{CancellationSource, CancellationToken};

/// Identifier of a registered handle.
pub type TaskId = u64;

/// Something disposal can stop.
pub trait Cancel: Send {
    /// Request the underlying work to stop. Must not block on it.
    fn cancel(self: Box<Self>);
}

impl Cancel for CancellationSource {
    fn cancel(self: Box<Self>) {
        CancellationSource::cancel(&self);
    }
}

/// Lifecycle phase of a sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Accepting messages.
    Active,
    /// Terminal.
    Disposed,
}

struct Arena {
    phase: Phase,
    next_id: TaskId,
    entries: HashMap<TaskId, Box<dyn Cancel>>,
}

/// Arena of cancellable handles with a one-way disposal switch.
pub struct TaskRegistry {
    arena: Mutex<Arena>,
}

impl TaskRegistry {
    /// Create an active, empty registry.
    pub fn new() -> Self {
        Self {
            arena: Mutex::new(Arena {
                phase: Phase::Active,
                next_id: 0,
                entries: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Arena> {
        self.arena.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// Whether disposal has happened.
    pub fn is_disposed(&self) -> bool {
        self.phase() == Phase::Disposed
    }

    /// Register an arbitrary handle.
    ///
    /// After disposal the handle is handed back in `Err` so the caller can
    /// stop it.
    pub fn register(&self, handle: Box<dyn Cancel>) -> Result<TaskId, Box<dyn Cancel>> {
        let mut arena = self.lock();
        if arena.phase == Phase::Disposed {
            return Err(handle);
        }
        let id = arena.next_id;
        arena.next_id += 1;
        arena.entries.insert(id, handle);
        Ok(id)
    }

    /// Remove a handle without cancelling it (its work finished).
    pub fn remove(&self, id: TaskId) -> bool {
        self.lock().entries.remove(&id).is_some()
    }

    /// Register a fresh cancellation scope for a task.
    ///
    /// Returns `None` once disposed.
    pub fn track(self: &Arc<Self>) -> Option<TaskGuard> {
        let source = CancellationSource::new();
        let token = source.token();
        let id = self.register(Box::new(source)).ok()?;
        Some(TaskGuard {
            id,
            token,
            registry: Arc::clone(self),
        })
    }

    /// Number of live handles.
    pub fn live(&self) -> usize {
        self.lock().entries.len()
    }

    /// Switch to `Disposed` and cancel every live handle.
    ///
    /// Returns `true` only for the call that performed the transition.
    pub fn dispose(&self) -> bool {
        let drained: Vec<Box<dyn Cancel>> = {
            let mut arena = self.lock();
            if arena.phase == Phase::Disposed {
                return false;
            }
            arena.phase = Phase::Disposed;
            arena.entries.drain().map(|(_, handle)| handle).collect()
        };
        let cancelled = drained.len();
        for handle in drained {
            handle.cancel();
        }
        tracing::debug!(target: "sandloop.lifecycle", cancelled, "registry disposed");
        true
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let arena = self.lock();
        f.debug_struct("TaskRegistry")
            .field("phase", &arena.phase)
            .field("live", &arena.entries.len())
            .finish()
    }
}

/// Registration of one in-flight task.
///
/// Dropping the guard deregisters the task.
pub struct TaskGuard {
    id: TaskId,
    token: CancellationToken,
    registry: Arc<TaskRegistry>,
}

impl TaskGuard {
    /// Registry id.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Token that flips when the sandbox is disposed.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}

/// Disposes the sandbox if a stage unwinds while this guard is alive.
///
/// The panic itself keeps propagating to the executing context.
pub(crate) struct UnwindGuard<'a> {
    sandbox: &'a str,
    stage: &'static str,
    dispose: &'a dyn Fn(),
}

impl<'a> UnwindGuard<'a> {
    pub(crate) fn new(sandbox: &'a str, stage: &'static str, dispose: &'a dyn Fn()) -> Self {
        Self {
            sandbox,
            stage,
            dispose,
        }
    }
}

impl Drop for UnwindGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            crate::effect_system::error_stage_panic(self.sandbox, self.stage);
            (self.dispose)();
        }
    }
}
