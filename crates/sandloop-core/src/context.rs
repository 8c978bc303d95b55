#![forbid(unsafe_code)]

//! Execution contexts: where pipeline work runs.
//!
//! The runtime never spawns threads for its stages on its own. Every reducer
//! drain, command task, and render drain is handed to a [`Context`] as a
//! [`Job`]. Three contexts ship with the crate:
//!
//! | Context | Behavior |
//! |---------|----------|
//! | [`Immediate`] | Runs the job inline on the caller's thread |
//! | [`WorkerThread`] | One named background thread, FIFO queue |
//! | [`SpawnThread`] | A fresh named thread per job |
//!
//! Contexts do not have to be serial. The runtime keeps ordering itself by
//! allowing only one drain per stage queue to be in flight.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread::{self, JoinHandle};

/// A unit of work submitted to a context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Somewhere jobs can run.
pub trait Context: Send + Sync + 'static {
    /// Run `job` now or later. Must not block waiting for the job.
    fn execute(&self, job: Job);

    /// Label used in tracing output.
    fn name(&self) -> &str {
        "context"
    }
}

impl<T: Context + ?Sized> Context for Arc<T> {
    fn execute(&self, job: Job) {
        (**self).execute(job);
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Errors raised while constructing a context.
#[derive(Debug)]
pub enum ContextError {
    /// The OS refused to start a thread.
    Spawn(io::Error),
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn(e) => write!(f, "failed to spawn context thread: {e}"),
        }
    }
}

impl std::error::Error for ContextError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn(e) => Some(e),
        }
    }
}

impl From<io::Error> for ContextError {
    fn from(e: io::Error) -> Self {
        Self::Spawn(e)
    }
}

// ---------------------------------------------------------------------------
// Immediate
// ---------------------------------------------------------------------------

/// Runs every job synchronously on the submitting thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

impl Context for Immediate {
    #[inline]
    fn execute(&self, job: Job) {
        job();
    }

    fn name(&self) -> &str {
        "immediate"
    }
}

// ---------------------------------------------------------------------------
// WorkerThread
// ---------------------------------------------------------------------------

/// A single background thread draining a FIFO job queue.
///
/// Jobs run one at a time, in submission order. A panicking job takes the
/// thread down; later submissions are dropped with a warning.
pub struct WorkerThread {
    name: String,
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerThread {
    /// Start a worker named `name`.
    pub fn start(name: impl Into<String>) -> io::Result<Self> {
        let name = name.into();
        let (tx, rx) = mpsc::channel::<Job>();
        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            while let Ok(job) = rx.recv() {
                job();
            }
        })?;
        tracing::debug!(target: "sandloop.context", worker = %name, "worker started");
        Ok(Self {
            name,
            sender: Mutex::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Stop accepting jobs, let queued jobs finish, and join the thread.
    ///
    /// Safe to call more than once and from the worker itself (in which case
    /// the join is skipped).
    pub fn shutdown(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        drop(sender);
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                tracing::warn!(target: "sandloop.context", worker = %self.name, "worker exited by panic");
            }
        }
    }

    /// Whether the worker still accepts jobs.
    pub fn is_running(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

impl Context for WorkerThread {
    fn execute(&self, job: Job) {
        let guard = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        let delivered = match guard.as_ref() {
            Some(tx) => tx.send(job).is_ok(),
            None => false,
        };
        if !delivered {
            tracing::warn!(
                target: "sandloop.context",
                worker = %self.name,
                "job dropped: worker is not running"
            );
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for WorkerThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for WorkerThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerThread")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// SpawnThread
// ---------------------------------------------------------------------------

/// Runs each job on its own freshly spawned thread.
///
/// Jobs run concurrently. If the OS refuses a new thread the job runs inline
/// so it is never lost.
#[derive(Debug)]
pub struct SpawnThread {
    prefix: String,
    spawned: AtomicU64,
}

impl SpawnThread {
    /// Create a context whose threads are named `{prefix}-{n}`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            spawned: AtomicU64::new(0),
        }
    }

    /// Number of threads spawned so far.
    pub fn spawned(&self) -> u64 {
        self.spawned.load(Ordering::Relaxed)
    }
}

impl Context for SpawnThread {
    fn execute(&self, job: Job) {
        let n = self.spawned.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::new(Mutex::new(Some(job)));
        let remote = Arc::clone(&slot);
        let spawned = thread::Builder::new()
            .name(format!("{}-{n}", self.prefix))
            .spawn(move || {
                let job = remote.lock().unwrap_or_else(|e| e.into_inner()).take();
                if let Some(job) = job {
                    job();
                }
            });
        if let Err(e) = spawned {
            tracing::error!(
                target: "sandloop.context",
                prefix = %self.prefix,
                error = %e,
                "thread spawn failed, running job inline"
            );
            let job = slot.lock().unwrap_or_else(|e| e.into_inner()).take();
            if let Some(job) = job {
                job();
            }
        }
    }

    fn name(&self) -> &str {
        &self.prefix
    }
}

// ---------------------------------------------------------------------------
// ContextKind
// ---------------------------------------------------------------------------

/// Configuration-level choice of a built-in context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ContextKind {
    /// [`Immediate`].
    #[default]
    Immediate,
    /// A dedicated [`WorkerThread`].
    Worker,
    /// [`SpawnThread`].
    Spawn,
}

impl ContextKind {
    /// Instantiate the context, using `label` for thread names.
    pub fn build(self, label: &str) -> Result<Arc<dyn Context>, ContextError> {
        Ok(match self {
            Self::Immediate => Arc::new(Immediate),
            Self::Worker => Arc::new(WorkerThread::start(label)?),
            Self::Spawn => Arc::new(SpawnThread::new(label)),
        })
    }
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Immediate => "immediate",
            Self::Worker => "worker",
            Self::Spawn => "spawn",
        })
    }
}
