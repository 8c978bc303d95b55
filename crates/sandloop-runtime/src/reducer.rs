#![forbid(unsafe_code)]

//! The state reducer stage.
//!
//! Holds the update function and the last state. [`Reducer::step`] is only
//! ever called by the message channel's drain, which admits one caller at a
//! time, so the update function effectively runs single-threaded even when
//! messages arrive from many threads.

use std::sync::{Arc, Mutex};

use sandloop_core::Return;

/// Update function type: `(message, &state) -> next result`.
pub type Update<S, M, C> = Box<dyn Fn(M, &S) -> Return<S, C> + Send + Sync>;

/// Folds messages into a chain of computation results.
pub struct Reducer<S, M, C> {
    update: Update<S, M, C>,
    last: Mutex<Arc<S>>,
}

impl<S, M, C> Reducer<S, M, C> {
    /// Create a reducer seeded with `state`.
    pub fn new(update: Update<S, M, C>, state: Arc<S>) -> Self {
        Self {
            update,
            last: Mutex::new(state),
        }
    }

    /// The most recent state.
    pub fn current(&self) -> Arc<S> {
        Arc::clone(&self.last.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Apply one message and record the resulting state.
    ///
    /// The update function runs without any lock held.
    pub fn step(&self, message: M) -> Return<Arc<S>, C> {
        let current = self.current();
        let (state, command) = (self.update)(message, &current).into_parts();
        let state = Arc::new(state);
        *self.last.lock().unwrap_or_else(|e| e.into_inner()) = Arc::clone(&state);
        Return::with_command(state, command)
    }
}

#[cfg(test)]
impl<S, M> Reducer<S, M, std::convert::Infallible>
where
    S: 'static,
    M: 'static,
{
    /// Reducer for an update function that never requests commands.
    pub(crate) fn pure<U>(update: U, state: Arc<S>) -> Self
    where
        U: Fn(M, &S) -> S + Send + Sync + 'static,
    {
        Self::new(Box::new(move |m: M, s: &S| Return::Pure(update(m, s))), state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Msg {
        Add(i64),
        Persist,
    }

    #[derive(Debug, PartialEq)]
    enum Cmd {
        Save(i64),
    }

    fn reducer() -> Reducer<i64, Msg, Cmd> {
        Reducer::new(
            Box::new(|msg: Msg, state: &i64| match msg {
                Msg::Add(n) => Return::Pure(state + n),
                Msg::Persist => Return::Effect(*state, Cmd::Save(*state)),
            }),
            Arc::new(0),
        )
    }

    #[test]
    fn step_threads_state() {
        let r = reducer();
        assert_eq!(*r.step(Msg::Add(2)).into_state(), 2);
        assert_eq!(*r.step(Msg::Add(3)).into_state(), 5);
        assert_eq!(*r.current(), 5);
    }

    #[test]
    fn step_carries_command() {
        let r = reducer();
        let _ = r.step(Msg::Add(4));
        let result = r.step(Msg::Persist);
        assert_eq!(result.command(), Some(&Cmd::Save(4)));
        assert_eq!(**result.state(), 4);
    }

    #[test]
    fn pure_reducer_never_effects() {
        let r: Reducer<u32, u32, _> = Reducer::pure(|m, s: &u32| s + m, Arc::new(1));
        let result = r.step(10);
        assert!(!result.is_effect());
        assert_eq!(*r.current(), 11);
    }

    #[test]
    fn seed_is_current_before_any_step() {
        let r = reducer();
        assert_eq!(*r.current(), 0);
    }
}
