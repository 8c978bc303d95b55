#![forbid(unsafe_code)]

//! Cooperative cancellation for command tasks and subscriptions.
//!
//! A [`CancellationSource`] is held by whoever may cancel (the sandbox's task
//! registry); any number of [`CancellationToken`]s observe it. Work that
//! cannot be interrupted polls [`CancellationToken::is_cancelled`] between
//! units of work, or parks in [`CancellationToken::wait_timeout`] instead of
//! sleeping.
//!
//! ```
//! use sandloop_core::cancellation::CancellationSource;
//! use std::time::Duration;
//!
//! let source = CancellationSource::new();
//! let token = source.token();
//!
//! let worker = std::thread::spawn(move || {
//!     let mut ticks = 0u32;
//!     while !token.wait_timeout(Duration::from_millis(5)) {
//!         ticks += 1;
//!     }
//!     ticks
//! });
//!
//! source.cancel();
//! let _ticks = worker.join().unwrap();
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use web_time::{Duration, Instant};

/// Cloneable, thread-safe view of a cancellation request.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Shared>,
}

/// Control side of a cancellation pair.
///
/// Dropping the source does not cancel; call [`cancel`](Self::cancel).
pub struct CancellationSource {
    inner: Arc<Shared>,
}

struct Shared {
    cancelled: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

impl CancellationSource {
    /// Create an uncancelled source.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Shared {
                cancelled: AtomicBool::new(false),
                lock: Mutex::new(()),
                wake: Condvar::new(),
            }),
        }
    }

    /// Hand out a token bound to this source.
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Request cancellation and wake every waiter.
    ///
    /// Returns `true` if this call performed the transition.
    pub fn cancel(&self) -> bool {
        let first = !self.inner.cancelled.swap(true, Ordering::AcqRel);
        let _guard = self.inner.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.inner.wake.notify_all();
        first
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationSource")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl CancellationToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        CancellationSource::new().token()
    }

    /// Whether cancellation was requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Park until cancelled or until `duration` elapses.
    ///
    /// Returns `true` if cancelled, `false` on timeout. A `duration` too
    /// large for the clock (such as `Duration::MAX`) waits for cancellation
    /// only.
    pub fn wait_timeout(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        let mut guard = self.inner.lock.lock().unwrap_or_else(|e| e.into_inner());
        // Past the end of the clock: park until cancelled.
        let Some(deadline) = Instant::now().checked_add(duration) else {
            while !self.is_cancelled() {
                guard = self.inner.wake.wait(guard).unwrap_or_else(|e| e.into_inner());
            }
            return true;
        };
        loop {
            if self.is_cancelled() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (next, _) = self
                .inner
                .wake
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            guard = next;
        }
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
