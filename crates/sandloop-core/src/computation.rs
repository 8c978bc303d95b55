#![forbid(unsafe_code)]

//! The computation result produced by every state transition.
//!
//! An update function never mutates state in place. It returns a fresh
//! [`Return`]: either the next state alone, or the next state together with
//! one command the runtime should execute.
//!
//! # Example
//!
//! ```
//! use sandloop_core::Return;
//!
//! #[derive(Debug, PartialEq)]
//! struct Counter(i32);
//!
//! #[derive(Debug, PartialEq)]
//! enum Cmd {
//!     Save(i32),
//! }
//!
//! fn bump(counter: &Counter) -> Return<Counter, Cmd> {
//!     let next = counter.0 + 1;
//!     if next % 10 == 0 {
//!         Return::effect(Counter(next), Cmd::Save(next))
//!     } else {
//!         Return::pure(Counter(next))
//!     }
//! }
//!
//! assert_eq!(bump(&Counter(1)), Return::Pure(Counter(2)));
//! assert_eq!(bump(&Counter(9)).command(), Some(&Cmd::Save(10)));
//! ```

use std::convert::Infallible;

/// Next state, optionally paired with a command.
///
/// Consumers match both variants exhaustively; there is no "missing state"
/// case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Return<S, C> {
    /// State only; nothing to execute.
    Pure(S),
    /// State plus one command for the dispatcher.
    Effect(S, C),
}

impl<S, C> Return<S, C> {
    /// Wrap a state with no command.
    #[inline]
    pub fn pure(state: S) -> Self {
        Self::Pure(state)
    }

    /// Wrap a state with a command.
    #[inline]
    pub fn effect(state: S, command: C) -> Self {
        Self::Effect(state, command)
    }

    /// Build from a state and an optional command.
    pub fn with_command(state: S, command: Option<C>) -> Self {
        match command {
            Some(command) => Self::Effect(state, command),
            None => Self::Pure(state),
        }
    }

    /// Borrow the state.
    #[inline]
    pub fn state(&self) -> &S {
        match self {
            Self::Pure(state) | Self::Effect(state, _) => state,
        }
    }

    /// Borrow the pending command, if any.
    #[inline]
    pub fn command(&self) -> Option<&C> {
        match self {
            Self::Pure(_) => None,
            Self::Effect(_, command) => Some(command),
        }
    }

    /// True for [`Return::Effect`].
    #[inline]
    pub fn is_effect(&self) -> bool {
        matches!(self, Self::Effect(..))
    }

    /// Split into state and optional command.
    pub fn into_parts(self) -> (S, Option<C>) {
        match self {
            Self::Pure(state) => (state, None),
            Self::Effect(state, command) => (state, Some(command)),
        }
    }

    /// Discard the command and keep the state.
    pub fn into_state(self) -> S {
        self.into_parts().0
    }

    /// Transform the state, keeping the variant.
    pub fn map_state<T>(self, f: impl FnOnce(S) -> T) -> Return<T, C> {
        match self {
            Self::Pure(state) => Return::Pure(f(state)),
            Self::Effect(state, command) => Return::Effect(f(state), command),
        }
    }

    /// Transform the command, keeping the variant.
    pub fn map_command<D>(self, f: impl FnOnce(C) -> D) -> Return<S, D> {
        match self {
            Self::Pure(state) => Return::Pure(state),
            Self::Effect(state, command) => Return::Effect(state, f(command)),
        }
    }
}

impl<S> Return<S, Infallible> {
    /// Lift a pure result into any command type.
    ///
    /// The `Effect` arm is uninhabited, so this is always a `Pure`.
    pub fn widen<C>(self) -> Return<S, C> {
        match self {
            Self::Pure(state) => Return::Pure(state),
            Self::Effect(_, never) => match never {},
        }
    }
}

impl<S, C> From<(S, Option<C>)> for Return<S, C> {
    fn from((state, command): (S, Option<C>)) -> Self {
        Self::with_command(state, command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Cmd {
        Load,
        Store(u8),
    }

    #[test]
    fn pure_has_no_command() {
        let r: Return<i32, Cmd> = Return::pure(3);
        assert_eq!(r.state(), &3);
        assert!(r.command().is_none());
        assert!(!r.is_effect());
    }

    #[test]
    fn effect_exposes_command() {
        let r = Return::effect(7, Cmd::Load);
        assert_eq!(r.state(), &7);
        assert_eq!(r.command(), Some(&Cmd::Load));
        assert!(r.is_effect());
    }

    #[test]
    fn with_command_picks_variant() {
        assert_eq!(Return::<_, Cmd>::with_command(1, None), Return::Pure(1));
        assert_eq!(
            Return::with_command(1, Some(Cmd::Store(2))),
            Return::Effect(1, Cmd::Store(2))
        );
    }

    #[test]
    fn into_parts_splits() {
        assert_eq!(Return::<_, Cmd>::Pure("a").into_parts(), ("a", None));
        assert_eq!(
            Return::Effect("b", Cmd::Load).into_parts(),
            ("b", Some(Cmd::Load))
        );
    }

    #[test]
    fn map_state_keeps_variant() {
        let r = Return::effect(2, Cmd::Load).map_state(|s| s * 10);
        assert_eq!(r, Return::Effect(20, Cmd::Load));
        let r = Return::<_, Cmd>::pure(2).map_state(|s| s + 1);
        assert_eq!(r, Return::Pure(3));
    }

    #[test]
    fn map_command_keeps_state() {
        let r = Return::effect(1, Cmd::Store(4)).map_command(|c| format!("{c:?}"));
        assert_eq!(r, Return::Effect(1, "Store(4)".to_string()));
    }

    #[test]
    fn widen_pure_result() {
        let r: Return<u8, Infallible> = Return::pure(9);
        let widened: Return<u8, Cmd> = r.widen();
        assert_eq!(widened, Return::Pure(9));
    }

    #[test]
    fn from_tuple() {
        let r: Return<i32, Cmd> = (5, Some(Cmd::Load)).into();
        assert!(r.is_effect());
        assert_eq!(r.into_state(), 5);
    }

    mod laws {
        use super::super::Return;
        use proptest::prelude::*;

        fn arb_return() -> impl Strategy<Value = Return<i32, u8>> {
            prop_oneof![
                any::<i32>().prop_map(Return::Pure),
                (any::<i32>(), any::<u8>()).prop_map(|(s, c)| Return::Effect(s, c)),
            ]
        }

        proptest! {
            #[test]
            fn map_state_composes(r in arb_return()) {
                let f = |s: i32| s.wrapping_mul(3);
                let g = |s: i32| s.wrapping_sub(11);
                prop_assert_eq!(r.clone().map_state(f).map_state(g), r.map_state(|s| g(f(s))));
            }

            #[test]
            fn mapping_never_changes_variant(r in arb_return()) {
                let effect = r.is_effect();
                prop_assert_eq!(r.clone().map_state(|s| s ^ 1).is_effect(), effect);
                prop_assert_eq!(r.map_command(u16::from).is_effect(), effect);
            }
        }
    }
}
