#![forbid(unsafe_code)]

//! Core types for sandloop.
//!
//! - [`Return`] - Result of one state transition: a new state, optionally
//!   paired with a command to execute
//! - [`Context`] - Where a piece of pipeline work runs
//! - [`CancellationSource`] / [`CancellationToken`] - Cooperative cancellation
//!   for in-flight command tasks
//!
//! # Role in sandloop
//! `sandloop-core` holds the vocabulary shared by the runtime and by
//! applications. It has no knowledge of queues, reducers, or views; those
//! live in `sandloop-runtime`.

pub mod cancellation;
pub mod computation;
pub mod context;

pub use cancellation::{CancellationSource, CancellationToken};
pub use computation::Return;
pub use context::{
    Context, ContextError, ContextKind, Immediate, Job, SpawnThread, WorkerThread,
};
