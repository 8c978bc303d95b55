#![forbid(unsafe_code)]

//! Command resolution.
//!
//! When the reducer produces [`Return::Effect`](sandloop_core::Return), the
//! sandbox hands the command to a [`Dispatch`] implementation on the update
//! context. The dispatcher turns it into a lazy [`MessageStream`]: zero, one,
//! or many messages, each of which re-enters the message channel as soon as
//! it is pulled.
//!
//! # Failure handling
//!
//! - An `Err` item is a *recoverable* failure. The stream is dropped and
//!   [`Dispatch::recover`] converts the error into one substitute message.
//! - A panic inside `resolve` or inside the stream is a programming defect
//!   and is not caught here.
//!
//! # Example
//!
//! ```
//! use sandloop_runtime::dispatcher::{dispatch, stream};
//!
//! #[derive(Debug)]
//! enum Cmd { Fetch(u32) }
//! #[derive(Debug)]
//! enum Msg { Fetched(u32), Failed(String) }
//!
//! let commands = dispatch(
//!     |cmd: &Cmd| match cmd {
//!         Cmd::Fetch(0) => stream::fail("id 0 is reserved".to_string()),
//!         Cmd::Fetch(id) => stream::just(Msg::Fetched(*id)),
//!     },
//!     |_cmd: Cmd, err: String| Msg::Failed(err),
//! );
//! # let _ = commands;
//! ```

use std::convert::Infallible;
use std::marker::PhantomData;

use sandloop_core::CancellationToken;

/// Lazily produced follow-up messages of one command.
pub type MessageStream<M, E> = Box<dyn Iterator<Item = Result<M, E>> + Send>;

/// Resolves commands into messages and converts failures.
pub trait Dispatch<C, M>: Send + Sync + 'static {
    /// Recoverable failure raised by a stream.
    type Error: Send + 'static;

    /// Start resolving `command`.
    ///
    /// `cancel` flips when the sandbox is disposed; long-running streams
    /// should poll it or park on it.
    fn resolve(&self, command: &C, cancel: &CancellationToken) -> MessageStream<M, Self::Error>;

    /// Turn a failure into a message. Must not fail.
    fn recover(&self, command: C, error: Self::Error) -> M;

    /// Short label for the `command_type` tracing field.
    fn kind(&self, _command: &C) -> &'static str {
        "command"
    }
}

/// Constructors for [`MessageStream`]s.
pub mod stream {
    use super::MessageStream;

    /// A stream yielding exactly one message.
    pub fn just<M, E>(message: M) -> MessageStream<M, E>
    where
        M: Send + 'static,
        E: Send + 'static,
    {
        Box::new(std::iter::once(Ok(message)))
    }

    /// A stream that completes without messages.
    pub fn empty<M, E>() -> MessageStream<M, E>
    where
        M: Send + 'static,
        E: Send + 'static,
    {
        Box::new(std::iter::empty())
    }

    /// A stream that fails immediately.
    pub fn fail<M, E>(error: E) -> MessageStream<M, E>
    where
        M: Send + 'static,
        E: Send + 'static,
    {
        Box::new(std::iter::once(Err(error)))
    }

    /// A stream over successful messages.
    pub fn from_iter<M, E, I>(messages: I) -> MessageStream<M, E>
    where
        I: IntoIterator<Item = M>,
        I::IntoIter: Send + 'static,
        M: Send + 'static,
        E: Send + 'static,
    {
        Box::new(messages.into_iter().map(Ok))
    }

    /// A stream over already-fallible items.
    pub fn from_results<M, E, I>(items: I) -> MessageStream<M, E>
    where
        I: IntoIterator<Item = Result<M, E>>,
        I::IntoIter: Send + 'static,
    {
        Box::new(items.into_iter())
    }
}

// ---------------------------------------------------------------------------
// Closure-backed dispatcher
// ---------------------------------------------------------------------------

/// [`Dispatch`] built from a resolve closure and a recover closure.
pub struct FnDispatch<R, F, E> {
    resolve: R,
    recover: F,
    _error: PhantomData<fn() -> E>,
}

/// Build a dispatcher from closures.
pub fn dispatch<C, M, E, R, F>(resolve: R, recover: F) -> FnDispatch<R, F, E>
where
    R: Fn(&C) -> MessageStream<M, E> + Send + Sync + 'static,
    F: Fn(C, E) -> M + Send + Sync + 'static,
    E: Send + 'static,
{
    FnDispatch {
        resolve,
        recover,
        _error: PhantomData,
    }
}

impl<C, M, E, R, F> Dispatch<C, M> for FnDispatch<R, F, E>
where
    R: Fn(&C) -> MessageStream<M, E> + Send + Sync + 'static,
    F: Fn(C, E) -> M + Send + Sync + 'static,
    E: Send + 'static,
{
    type Error = E;

    fn resolve(&self, command: &C, _cancel: &CancellationToken) -> MessageStream<M, E> {
        (self.resolve)(command)
    }

    fn recover(&self, command: C, error: E) -> M {
        (self.recover)(command, error)
    }
}

/// Dispatcher for sandboxes whose update never requests commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCommands;

impl<M: 'static> Dispatch<Infallible, M> for NoCommands {
    type Error = Infallible;

    fn resolve(&self, command: &Infallible, _cancel: &CancellationToken) -> MessageStream<M, Infallible> {
        match *command {}
    }

    fn recover(&self, command: Infallible, _error: Infallible) -> M {
        match command {}
    }
}

// ---------------------------------------------------------------------------
// Driving one command
// ---------------------------------------------------------------------------

/// How a command task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Stream exhausted normally.
    Completed {
        /// Messages fed back.
        messages: usize,
    },
    /// Stream failed; the last message fed back came from recovery.
    Recovered {
        /// Messages fed back, including the recovery message.
        messages: usize,
    },
    /// Disposal stopped the task; later items were discarded.
    Cancelled {
        /// Messages fed back before cancellation.
        messages: usize,
    },
}

impl CommandOutcome {
    /// Messages this task fed back into the channel.
    pub fn messages(&self) -> usize {
        match *self {
            Self::Completed { messages }
            | Self::Recovered { messages }
            | Self::Cancelled { messages } => messages,
        }
    }

    /// Value for the `result` tracing field.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Recovered { .. } => "recovered",
            Self::Cancelled { .. } => "cancelled",
        }
    }
}

/// Resolve `command` and feed every produced message to `emit`.
///
/// `emit` returns `false` when the sandbox no longer accepts messages, which
/// ends the task as cancelled. The token is checked before every pull and
/// before every delivery.
pub fn drive<C, M, D>(
    dispatcher: &D,
    command: C,
    cancel: &CancellationToken,
    mut emit: impl FnMut(M) -> bool,
) -> CommandOutcome
where
    D: Dispatch<C, M> + ?Sized,
{
    let mut stream = dispatcher.resolve(&command, cancel);
    let mut messages = 0;
    loop {
        if cancel.is_cancelled() {
            return CommandOutcome::Cancelled { messages };
        }
        match stream.next() {
            None => return CommandOutcome::Completed { messages },
            Some(Ok(message)) => {
                if cancel.is_cancelled() || !emit(message) {
                    return CommandOutcome::Cancelled { messages };
                }
                messages += 1;
            }
            Some(Err(error)) => {
                drop(stream);
                if cancel.is_cancelled() {
                    return CommandOutcome::Cancelled { messages };
                }
                let substitute = dispatcher.recover(command, error);
                if !emit(substitute) {
                    return CommandOutcome::Cancelled { messages };
                }
                return CommandOutcome::Recovered {
                    messages: messages + 1,
                };
            }
        }
    }
}
