#![forbid(unsafe_code)]

//! sandloop public facade.
//!
//! Re-exports the computation value and contexts from `sandloop-core` and the
//! loop itself from `sandloop-runtime`. Most applications only need the
//! [`prelude`].
//!
//! ```
//! use sandloop::prelude::*;
//!
//! #[derive(Debug)]
//! enum Msg { Incr, Decr }
//!
//! let sandbox = Sandbox::pure(
//!     0i32,
//!     |msg: Msg, n: &i32| match msg {
//!         Msg::Incr => n + 1,
//!         Msg::Decr => n - 1,
//!     },
//!     |n: &i32| println!("count = {n}"),
//! )
//! .name("counter")
//! .start()?;
//!
//! sandbox.accept(Msg::Incr);
//! sandbox.accept(Msg::Decr);
//! assert_eq!(sandbox.stats().applied, 2);
//! # Ok::<(), sandloop::Error>(())
//! ```

// --- Core re-exports -------------------------------------------------------

pub use sandloop_core::{
    CancellationSource, CancellationToken, Context, ContextError, ContextKind, Immediate, Job,
    Return, SpawnThread, WorkerThread,
};

// --- Runtime re-exports ----------------------------------------------------

pub use sandloop_runtime::dispatcher::stream;
pub use sandloop_runtime::{
    CommandOutcome, ConfigError, Dispatch, Emitter, Every, FromIter, MessageStream, NoCommands,
    Sandbox, SandboxBuilder, SandboxConfig, SandboxStats, SubId, Subscription, dispatch,
};

// --- Errors ----------------------------------------------------------------

/// Top-level error type.
pub use sandloop_runtime::SandboxError as Error;

/// Standard result type for sandloop APIs.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything needed to define and run a sandbox.
pub mod prelude {
    pub use crate::{
        Context, ContextKind, Dispatch, Emitter, Error, Result, Return, Sandbox, SandboxConfig,
        Subscription, dispatch, stream,
    };

    pub use crate::{core, runtime};
}

pub use sandloop_core as core;
pub use sandloop_runtime as runtime;
