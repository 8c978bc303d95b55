#![forbid(unsafe_code)]

//! The sandbox: a running update loop.
//!
//! A [`Sandbox`] wires four stages together:
//!
//! ```text
//!   accept ─▶ channel ─▶ reducer ─┬─▶ render sink ─▶ view
//!     ▲                           │
//!     └──────── command task ◀────┘ (Effect only)
//! ```
//!
//! Messages are reduced strictly one at a time in acceptance order. Each
//! result is published to the view; an `Effect` result additionally starts a
//! command task whose messages re-enter the channel. Disposal is terminal:
//! it cancels every command task and subscription and closes both queues.
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use sandloop_runtime::Sandbox;
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let log = Arc::clone(&seen);
//! let sandbox = Sandbox::pure(0i32, |delta: i32, count: &i32| count + delta, move |count: &i32| {
//!     log.lock().unwrap().push(*count);
//! })
//! .start()
//! .unwrap();
//!
//! sandbox.accept(2);
//! sandbox.accept(-5);
//! assert_eq!(*seen.lock().unwrap(), vec![0, 2, -3]);
//! ```

use std::collections::HashSet;
use std::convert::Infallible;
use std::fmt;
use std::sync::{Arc, Weak};

use sandloop_core::{Context, Immediate, Return};

use crate::channel::{MessageChannel, Offer};
use crate::config::SandboxConfig;
use crate::dispatcher::{Dispatch, NoCommands, drive};
use crate::effect_system::trace_command_effect;
use crate::emitter::{Emitter, Stage};
use crate::error::SandboxError;
use crate::lifecycle::{TaskGuard, TaskRegistry, UnwindGuard};
use crate::reducer::{Reducer, Update};
use crate::render::{RenderSink, View};
use crate::stats::{Counters, SandboxStats};
use crate::subscription::{self, Subscription};

struct Pipeline<S, M, C, D> {
    name: Arc<str>,
    reducer: Reducer<S, M, C>,
    channel: MessageChannel<M>,
    render: Arc<RenderSink<S>>,
    dispatcher: D,
    update_context: Arc<dyn Context>,
    registry: Arc<TaskRegistry>,
    counters: Arc<Counters>,
    this: Weak<Self>,
}

impl<S, M, C, D> Pipeline<S, M, C, D> {
    fn shut(&self) -> bool {
        let first = self.registry.dispose();
        // A panicking render drain may have flipped the registry already;
        // the queues still need closing.
        let dropped = self.channel.close() + self.render.close();
        self.counters.dropped(dropped as u64);
        if first {
            tracing::info!(
                target: "sandloop.lifecycle",
                sandbox = %self.name,
                dropped,
                "sandbox disposed"
            );
        }
        first
    }
}

/// What user handles and emitters point at. Jobs hold the pipeline
/// directly, so releasing every handle disposes even while work runs.
struct Handle<S, M, C, D> {
    pipeline: Arc<Pipeline<S, M, C, D>>,
}

impl<S, M, C, D> Drop for Handle<S, M, C, D> {
    fn drop(&mut self) {
        self.pipeline.shut();
    }
}

impl<S, M, C, D> Pipeline<S, M, C, D>
where
    S: Send + Sync + 'static,
    M: Send + 'static,
    C: Send + 'static,
    D: Dispatch<C, M>,
{
    fn offer(&self, message: M) -> bool {
        if self.registry.is_disposed() {
            self.counters.dropped(1);
            return false;
        }
        match self.channel.offer(message) {
            Offer::Claimed => {
                self.counters.accepted();
                match self.this.upgrade() {
                    Some(this) => self.update_context.execute(Box::new(move || this.drain())),
                    // Pipeline is being torn down; nothing will reduce this.
                    None => self.channel.release(),
                }
                true
            }
            Offer::Queued => {
                self.counters.accepted();
                true
            }
            Offer::Closed => {
                self.counters.dropped(1);
                tracing::trace!(target: "sandloop.channel", sandbox = %self.name, "message dropped after disposal");
                false
            }
        }
    }

    fn drain(&self) {
        let _span = tracing::debug_span!(target: "sandloop.channel", "sandbox.drain", sandbox = %self.name).entered();
        let dispose = || {
            self.shut();
        };
        let _guard = UnwindGuard::new(&self.name, "reducer", &dispose);
        while let Some(message) = self.channel.next() {
            if self.registry.is_disposed() {
                let dropped = self.channel.close() as u64 + 1;
                self.counters.dropped(dropped);
                continue;
            }
            let step = self.counters.applied();
            let result = {
                let _update =
                    tracing::trace_span!(target: "sandloop.reducer", "sandbox.update", sandbox = %self.name, step)
                        .entered();
                self.reducer.step(message)
            };
            self.emit(result);
        }
    }

    fn emit(&self, result: Return<Arc<S>, C>) {
        match result {
            Return::Pure(state) => self.render.publish(state),
            Return::Effect(state, command) => {
                self.render.publish(state);
                self.dispatch(command);
            }
        }
    }

    fn dispatch(&self, command: C) {
        let Some(task) = self.registry.track() else {
            self.counters.dropped(1);
            return;
        };
        let Some(this) = self.this.upgrade() else {
            return;
        };
        self.counters.command_started();
        self.update_context
            .execute(Box::new(move || this.run_command(command, task)));
    }

    fn run_command(&self, command: C, task: TaskGuard) {
        let dispose = || {
            self.shut();
        };
        let _guard = UnwindGuard::new(&self.name, "command", &dispose);
        let kind = self.dispatcher.kind(&command);
        let outcome = trace_command_effect(&self.name, kind, || {
            drive(&self.dispatcher, command, task.token(), |message| self.offer(message))
        });
        self.counters.command_finished(outcome);
        drop(task);
    }
}

impl<S, M, C, D> Stage<M> for Handle<S, M, C, D>
where
    S: Send + Sync + 'static,
    M: Send + 'static,
    C: Send + 'static,
    D: Dispatch<C, M>,
{
    fn name(&self) -> &str {
        &self.pipeline.name
    }

    fn accept(&self, message: M) -> bool {
        self.pipeline.offer(message)
    }

    fn dispose(&self) -> bool {
        self.pipeline.shut()
    }

    fn is_disposed(&self) -> bool {
        self.pipeline.registry.is_disposed()
    }

    fn stats(&self) -> SandboxStats {
        self.pipeline.counters.snapshot()
    }
}

/// Handle to a running update loop.
///
/// Cloning is cheap; every clone drives the same instance. When the last
/// handle is dropped the sandbox is disposed, including while command tasks
/// are still running: their tokens are cancelled like on [`dispose`](Self::dispose).
/// Background work and [`Emitter`]s never count as handles.
pub struct Sandbox<M> {
    stage: Arc<dyn Stage<M>>,
}

impl<M: Send + 'static> Sandbox<M> {
    /// Start configuring a sandbox from a seed computation.
    ///
    /// The seed state is rendered once at start and, if the seed is an
    /// `Effect`, its command is dispatched before any accepted message is
    /// reduced. Commands need a dispatcher: see [`SandboxBuilder::commands`].
    pub fn builder<S, C, U, V>(
        seed: Return<S, C>,
        update: U,
        view: V,
    ) -> SandboxBuilder<S, M, C, NoCommands>
    where
        U: Fn(M, &S) -> Return<S, C> + Send + Sync + 'static,
        V: Fn(&S) + Send + Sync + 'static,
    {
        SandboxBuilder {
            seed,
            update: Box::new(update),
            view: Box::new(view),
            dispatcher: NoCommands,
            config: SandboxConfig::default(),
            update_context: None,
            render_context: None,
            subscriptions: Vec::new(),
        }
    }

    /// Builder for an update function that never requests commands.
    pub fn pure<S, U, V>(
        seed: S,
        update: U,
        view: V,
    ) -> SandboxBuilder<S, M, Infallible, NoCommands>
    where
        S: 'static,
        U: Fn(M, &S) -> S + Send + Sync + 'static,
        V: Fn(&S) + Send + Sync + 'static,
    {
        Self::builder(
            Return::Pure(seed),
            move |message: M, state: &S| Return::Pure(update(message, state)),
            view,
        )
    }

    /// Start a sandbox with default settings.
    ///
    /// Every stage runs on the calling thread, so `accept` returns after the
    /// message and everything it triggers synchronously has been processed.
    pub fn create<S, C, D, U, V>(seed: Return<S, C>, update: U, view: V, dispatcher: D) -> Self
    where
        S: Send + Sync + 'static,
        C: Send + 'static,
        D: Dispatch<C, M>,
        U: Fn(M, &S) -> Return<S, C> + Send + Sync + 'static,
        V: Fn(&S) + Send + Sync + 'static,
    {
        let pipeline = assemble(
            Arc::from(SandboxConfig::default().name.as_str()),
            seed,
            Box::new(update),
            Box::new(view),
            dispatcher,
            Arc::new(Immediate),
            Arc::new(Immediate),
        );
        Self {
            stage: Arc::new(Handle { pipeline }),
        }
    }

    /// Feed a message into the loop. Ignored once disposed.
    pub fn accept(&self, message: M) {
        self.stage.accept(message);
    }

    /// Stop the sandbox. Only the first call has any effect.
    pub fn dispose(&self) {
        self.stage.dispose();
    }

    /// Whether [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.stage.is_disposed()
    }

    /// Counters for this instance.
    pub fn stats(&self) -> SandboxStats {
        self.stage.stats()
    }

    /// Configured name.
    pub fn name(&self) -> &str {
        self.stage.name()
    }

    /// A non-owning message sink for this sandbox.
    pub fn emitter(&self) -> Emitter<M> {
        Emitter::new(Arc::downgrade(&self.stage))
    }
}

impl<M> Clone for Sandbox<M> {
    fn clone(&self) -> Self {
        Self {
            stage: Arc::clone(&self.stage),
        }
    }
}

impl<M> fmt::Debug for Sandbox<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sandbox")
            .field("name", &self.stage.name())
            .field("disposed", &self.stage.is_disposed())
            .finish()
    }
}

/// Configures and starts a [`Sandbox`].
#[must_use = "call .start() to run the sandbox"]
pub struct SandboxBuilder<S, M, C, D> {
    seed: Return<S, C>,
    update: Update<S, M, C>,
    view: View<S>,
    dispatcher: D,
    config: SandboxConfig,
    update_context: Option<Arc<dyn Context>>,
    render_context: Option<Arc<dyn Context>>,
    subscriptions: Vec<Box<dyn Subscription<M>>>,
}

impl<S, M, C, D> SandboxBuilder<S, M, C, D>
where
    M: Send + 'static,
{
    /// Resolve commands with `dispatcher`.
    pub fn commands<D2>(self, dispatcher: D2) -> SandboxBuilder<S, M, C, D2>
    where
        D2: Dispatch<C, M>,
    {
        SandboxBuilder {
            seed: self.seed,
            update: self.update,
            view: self.view,
            dispatcher,
            config: self.config,
            update_context: self.update_context,
            render_context: self.render_context,
            subscriptions: self.subscriptions,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: SandboxConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the name used in logs and thread names.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Run the reducer and command tasks on `context`.
    pub fn update_context(mut self, context: impl Context) -> Self {
        self.update_context = Some(Arc::new(context));
        self
    }

    /// Run the view on `context`.
    pub fn render_context(mut self, context: impl Context) -> Self {
        self.render_context = Some(Arc::new(context));
        self
    }

    /// Merge messages from `subscription`. Subscriptions sharing an id start once.
    pub fn subscribe(mut self, subscription: impl Subscription<M> + 'static) -> Self {
        self.subscriptions.push(Box::new(subscription));
        self
    }

    /// Validate the configuration, start every stage, and emit the seed.
    pub fn start(self) -> Result<Sandbox<M>, SandboxError>
    where
        S: Send + Sync + 'static,
        C: Send + 'static,
        D: Dispatch<C, M>,
    {
        let Self {
            seed,
            update,
            view,
            dispatcher,
            config,
            update_context,
            render_context,
            subscriptions,
        } = self;
        let config = config.validated()?;
        let update_context = match update_context {
            Some(context) => context,
            None => config.update_context.build(&format!("{}-update", config.name))?,
        };
        let render_context = match render_context {
            Some(context) => context,
            None => config.render_context.build(&format!("{}-render", config.name))?,
        };
        let name: Arc<str> = Arc::from(config.name.as_str());
        let pipeline = assemble(
            Arc::clone(&name),
            seed,
            update,
            view,
            dispatcher,
            update_context,
            render_context,
        );
        let registry = Arc::clone(&pipeline.registry);
        let sandbox = Sandbox {
            stage: Arc::new(Handle { pipeline }),
        };

        let mut started = HashSet::new();
        for sub in subscriptions {
            let id = sub.id();
            if !started.insert(id) {
                tracing::debug!(target: "sandloop.subscription", sandbox = %name, sub_id = id, "duplicate subscription skipped");
                continue;
            }
            let Some(guard) = registry.track() else {
                break;
            };
            if let Err(err) = subscription::spawn(&name, sub, sandbox.emitter(), guard) {
                tracing::error!(target: "sandloop.subscription", sandbox = %name, sub_id = id, error = %err, "subscription thread failed to start");
                sandbox.dispose();
                return Err(err.into());
            }
        }
        Ok(sandbox)
    }
}

fn assemble<S, M, C, D>(
    name: Arc<str>,
    seed: Return<S, C>,
    update: Update<S, M, C>,
    view: View<S>,
    dispatcher: D,
    update_context: Arc<dyn Context>,
    render_context: Arc<dyn Context>,
) -> Arc<Pipeline<S, M, C, D>>
where
    S: Send + Sync + 'static,
    M: Send + 'static,
    C: Send + 'static,
    D: Dispatch<C, M>,
{
    let registry = Arc::new(TaskRegistry::new());
    let counters = Arc::new(Counters::default());
    let (state, command) = seed.into_parts();
    let state = Arc::new(state);
    tracing::info!(
        target: "sandloop.lifecycle",
        sandbox = %name,
        update_context = update_context.name(),
        render_context = render_context.name(),
        "sandbox started"
    );
    let render = Arc::new(RenderSink::new(
        Arc::clone(&name),
        view,
        render_context,
        Arc::clone(&registry),
        Arc::clone(&counters),
    ));
    let pipeline = Arc::new_cyclic(|this| Pipeline {
        name,
        reducer: Reducer::new(update, Arc::clone(&state)),
        channel: MessageChannel::new(),
        render,
        dispatcher,
        update_context,
        registry,
        counters,
        this: Weak::clone(this),
    });
    pipeline.emit(Return::with_command(state, command));
    pipeline
}
