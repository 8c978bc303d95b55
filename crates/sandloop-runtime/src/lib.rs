#![forbid(unsafe_code)]

//! Runtime for sandloop: a serialized update loop with command dispatch and
//! ordered rendering.
//!
//! A [`Sandbox`] folds messages through an update function, publishes every
//! resulting state to a view callback, and resolves the commands the update
//! function requests into further messages. Where each stage runs is decided
//! by [`Context`](sandloop_core::Context) implementations, chosen directly or
//! through [`SandboxConfig`].
//!
//! # Key components
//!
//! - [`Sandbox`] / [`SandboxBuilder`] - the running instance and its setup
//! - [`Dispatch`] - turns commands into message streams and recovers failures
//! - [`Subscription`] - long-running external message sources
//! - [`StageQueue`] - the single-drain FIFO behind both ordered stages
//! - [`TaskRegistry`] - disposal bookkeeping for background work
//! - [`effect_system`] - tracing spans and global effect counters
//!
//! # Role in sandloop
//! `sandloop-core` defines the computation value and the contexts; this
//! crate composes them into the loop. The `sandloop` facade re-exports both.

pub mod channel;
pub mod config;
pub mod dispatcher;
pub mod effect_system;
pub mod emitter;
pub mod error;
pub mod lifecycle;
pub mod reducer;
pub mod render;
pub mod sandbox;
pub mod stats;
pub mod subscription;

pub use channel::{MessageChannel, Offer, StageQueue};
pub use config::{ConfigError, SandboxConfig};
pub use dispatcher::{CommandOutcome, Dispatch, FnDispatch, MessageStream, NoCommands, dispatch, drive};
pub use emitter::Emitter;
pub use error::SandboxError;
pub use lifecycle::{Cancel, Phase, TaskGuard, TaskId, TaskRegistry};
pub use reducer::{Reducer, Update};
pub use render::{RenderSink, View};
pub use sandbox::{Sandbox, SandboxBuilder};
pub use stats::SandboxStats;
pub use subscription::{Every, FromIter, SubId, Subscription};
