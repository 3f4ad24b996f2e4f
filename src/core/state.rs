//! State trait for machine states.
//!
//! Machine states are plain enums. The engine keys its transition table by
//! [`State::name`], so two variants must never share a name.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Trait for machine states.
///
/// # Required Traits
///
/// - `Clone`: the current state is copied into every published snapshot
/// - `PartialEq`: self-transitions are detected by comparing states
/// - `Debug`: states show up in logs and errors
/// - `Serialize` + `Deserialize`: states are part of checkpoints
///
/// # Example
///
/// ```rust
/// use headless_machine::core::State;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
/// enum MenuState {
///     Idle,
///     Focused,
///     Open,
/// }
///
/// impl State for MenuState {
///     fn name(&self) -> &str {
///         match self {
///             Self::Idle => "idle",
///             Self::Focused => "focused",
///             Self::Open => "open",
///         }
///     }
/// }
///
/// assert_eq!(MenuState::Open.name(), "open");
/// assert!(!MenuState::Open.is_final());
/// ```
pub trait State:
    Clone + PartialEq + Debug + Serialize + for<'de> Deserialize<'de> + Send + Sync + 'static
{
    /// Unique name of the state, used as the transition table key.
    fn name(&self) -> &str;

    /// Check if this is a terminal state.
    ///
    /// Terminal states are allowed but never required; UI machines are
    /// usually cyclic. Default implementation returns `false`.
    fn is_final(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
    enum TestState {
        Idle,
        Focused,
        Open,
        Disposed,
    }

    impl State for TestState {
        fn name(&self) -> &str {
            match self {
                Self::Idle => "idle",
                Self::Focused => "focused",
                Self::Open => "open",
                Self::Disposed => "disposed",
            }
        }

        fn is_final(&self) -> bool {
            matches!(self, Self::Disposed)
        }
    }

    #[test]
    fn state_name_returns_correct_value() {
        assert_eq!(TestState::Idle.name(), "idle");
        assert_eq!(TestState::Focused.name(), "focused");
        assert_eq!(TestState::Open.name(), "open");
        assert_eq!(TestState::Disposed.name(), "disposed");
    }

    #[test]
    fn is_final_identifies_terminal_states() {
        assert!(!TestState::Idle.is_final());
        assert!(!TestState::Open.is_final());
        assert!(TestState::Disposed.is_final());
    }

    #[test]
    fn state_serializes_correctly() {
        let state = TestState::Open;
        let json = serde_json::to_string(&state).unwrap();
        let deserialized: TestState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, deserialized);
    }
}
