#![forbid(unsafe_code)]

//! External message sources merged into a sandbox.
//!
//! Subscriptions are handed to the builder and started exactly once, when
//! the sandbox starts, each on its own named thread. Their messages enter the
//! same channel as [`Sandbox::accept`](crate::Sandbox::accept) and are
//! reduced on the update context.
//!
//! # How it works
//!
//! 1. The builder collects subscriptions; duplicates by [`SubId`] start once
//! 2. Each gets an [`Emitter`] and a stop token registered with the sandbox
//! 3. [`Subscription::run`] loops until the token is cancelled or
//!    [`Emitter::emit`] returns `false`
//! 4. Disposal cancels every token; threads are not joined

use std::thread;
use std::time::Duration;

use sandloop_core::CancellationToken;

use crate::effect_system::{record_subscription_start, record_subscription_stop};
use crate::emitter::Emitter;
use crate::lifecycle::TaskGuard;

/// A unique identifier for a subscription.
pub type SubId = u64;

/// A long-running message source.
pub trait Subscription<M: Send + 'static>: Send {
    /// Identifier used to start duplicates only once.
    fn id(&self) -> SubId;

    /// Produce messages until `stop` is cancelled or `emitter` rejects one.
    ///
    /// Runs on a dedicated background thread.
    fn run(&self, emitter: Emitter<M>, stop: CancellationToken);
}

/// Start `sub` on its own thread. The guard keeps it registered for
/// disposal until the thread exits.
pub(crate) fn spawn<M: Send + 'static>(
    sandbox: &str,
    sub: Box<dyn Subscription<M>>,
    emitter: Emitter<M>,
    guard: TaskGuard,
) -> std::io::Result<()> {
    let id = sub.id();
    let label = sandbox.to_string();
    thread::Builder::new()
        .name(format!("{sandbox}-sub-{id}"))
        .spawn(move || {
            record_subscription_start(&label, id);
            sub.run(emitter, guard.token().clone());
            record_subscription_stop(&label, id);
            drop(guard);
        })?;
    Ok(())
}

// --- Built-in subscriptions ---

/// A subscription that fires at a fixed interval.
///
/// # Example
///
/// ```ignore
/// let sandbox = Sandbox::builder(seed, update, view)
///     .subscribe(Every::new(Duration::from_secs(1), || Msg::Tick))
///     .start()?;
/// ```
pub struct Every<M: Send + 'static> {
    id: SubId,
    interval: Duration,
    make_msg: Box<dyn Fn() -> M + Send + Sync>,
}

impl<M: Send + 'static> Every<M> {
    /// Tick subscription whose id derives from the interval.
    pub fn new(interval: Duration, make_msg: impl Fn() -> M + Send + Sync + 'static) -> Self {
        let id = interval.as_nanos() as u64 ^ 0x5449_434B;
        Self::with_id(id, interval, make_msg)
    }

    /// Tick subscription with an explicit id.
    pub fn with_id(
        id: SubId,
        interval: Duration,
        make_msg: impl Fn() -> M + Send + Sync + 'static,
    ) -> Self {
        Self {
            id,
            interval,
            make_msg: Box::new(make_msg),
        }
    }
}

impl<M: Send + 'static> Subscription<M> for Every<M> {
    fn id(&self) -> SubId {
        self.id
    }

    fn run(&self, emitter: Emitter<M>, stop: CancellationToken) {
        while !stop.wait_timeout(self.interval) {
            if !emitter.emit((self.make_msg)()) {
                break;
            }
        }
    }
}

/// Emits a fixed sequence of messages, then ends.
pub struct FromIter<M: Send + 'static> {
    id: SubId,
    messages: std::sync::Mutex<Option<Vec<M>>>,
}

impl<M: Send + 'static> FromIter<M> {
    /// Replay `messages` once.
    pub fn new(id: SubId, messages: impl IntoIterator<Item = M>) -> Self {
        Self {
            id,
            messages: std::sync::Mutex::new(Some(messages.into_iter().collect())),
        }
    }
}

impl<M: Send + 'static> Subscription<M> for FromIter<M> {
    fn id(&self) -> SubId {
        self.id
    }

    fn run(&self, emitter: Emitter<M>, stop: CancellationToken) {
        let messages = self
            .messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .unwrap_or_default();
        for msg in messages {
            if stop.is_cancelled() || !emitter.emit(msg) {
                break;
            }
        }
    }
}
