#![forbid(unsafe_code)]

//! A context driven by the test.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use sandloop_core::{Context, Job};

/// Queues submitted jobs; nothing runs until the test asks.
///
/// Clones share one queue, so a test can hand a clone to the sandbox builder
/// and keep another to step through the work.
///
/// A queued job owns the sandbox internals, and those own this context, so
/// jobs left in the queue keep each other alive. Finish a test with
/// [`run_until_idle`](Self::run_until_idle) or [`clear`](Self::clear) when
/// work may still be pending.
#[derive(Clone, Default)]
pub struct ManualContext {
    jobs: Arc<Mutex<VecDeque<Job>>>,
}

impl ManualContext {
    /// An empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    fn pop(&self) -> Option<Job> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner()).pop_front()
    }

    /// Run the oldest queued job. Returns `false` if none was queued.
    pub fn run_next(&self) -> bool {
        match self.pop() {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Run jobs, including ones queued while running, until the queue is
    /// empty. Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }

    /// Discard every queued job without running it.
    ///
    /// Dropping the jobs releases whatever they hold, including sandbox
    /// internals no handle refers to any more.
    pub fn clear(&self) -> usize {
        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        let n = jobs.len();
        jobs.clear();
        n
    }

    /// Jobs waiting to run.
    pub fn pending(&self) -> usize {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Context for ManualContext {
    fn execute(&self, job: Job) {
        self.jobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(job);
    }

    fn name(&self) -> &str {
        "manual"
    }
}

impl std::fmt::Debug for ManualContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualContext")
            .field("pending", &self.pending())
            .finish()
    }
}
