//! Transition history of a machine instance.
//!
//! UI machines run for as long as their widget is mounted, so the history is
//! bounded: once `limit` entries are stored, recording drops the oldest one.

use super::state::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Default number of transitions a machine remembers.
pub const DEFAULT_HISTORY_LIMIT: usize = 64;

/// Record of a single external transition.
///
/// # Example
///
/// ```rust
/// use headless_machine::core::{State, StateTransition};
/// use serde::{Deserialize, Serialize};
/// use chrono::Utc;
///
/// #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
/// enum Disclosure {
///     Closed,
///     Open,
/// }
///
/// impl State for Disclosure {
///     fn name(&self) -> &str {
///         match self {
///             Self::Closed => "closed",
///             Self::Open => "open",
///         }
///     }
/// }
///
/// let transition = StateTransition {
///     from: Disclosure::Closed,
///     to: Disclosure::Open,
///     event: "TOGGLE".to_string(),
///     timestamp: Utc::now(),
/// };
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StateTransition<S: State> {
    /// The state being left
    pub from: S,
    /// The state being entered
    pub to: S,
    /// Type of the event that caused the transition
    pub event: String,
    /// When the transition happened
    pub timestamp: DateTime<Utc>,
}

/// Ordered, bounded history of state transitions.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StateHistory<S: State> {
    transitions: VecDeque<StateTransition<S>>,
    limit: usize,
}

impl<S: State> Default for StateHistory<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: State> StateHistory<S> {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }

    /// A limit of zero disables recording.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            transitions: VecDeque::new(),
            limit,
        }
    }

    pub fn record(&mut self, transition: StateTransition<S>) {
        if self.limit == 0 {
            return;
        }
        while self.transitions.len() >= self.limit {
            self.transitions.pop_front();
        }
        self.transitions.push_back(transition);
    }

    /// The states traversed: the first remembered `from`, then each `to`.
    pub fn get_path(&self) -> Vec<&S> {
        let mut path = Vec::new();
        if let Some(first) = self.transitions.front() {
            path.push(&first.from);
        }
        for transition in &self.transitions {
            path.push(&transition.to);
        }
        path
    }

    /// Time between the first and last remembered transitions.
    pub fn duration(&self) -> Option<Duration> {
        let (first, last) = (self.transitions.front()?, self.transitions.back()?);
        last.timestamp
            .signed_duration_since(first.timestamp)
            .to_std()
            .ok()
    }

    pub fn transitions(&self) -> impl Iterator<Item = &StateTransition<S>> {
        self.transitions.iter()
    }

    pub fn last(&self) -> Option<&StateTransition<S>> {
        self.transitions.back()
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
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
    }

    impl State for TestState {
        fn name(&self) -> &str {
            match self {
                Self::Idle => "idle",
                Self::Focused => "focused",
                Self::Open => "open",
            }
        }
    }

    fn transition(from: TestState, to: TestState) -> StateTransition<TestState> {
        StateTransition {
            from,
            to,
            event: "TEST".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn new_history_is_empty() {
        let history: StateHistory<TestState> = StateHistory::new();
        assert!(history.is_empty());
        assert!(history.get_path().is_empty());
        assert!(history.duration().is_none());
        assert_eq!(history.limit(), DEFAULT_HISTORY_LIMIT);
    }

    #[test]
    fn get_path_returns_state_sequence() {
        let mut history = StateHistory::new();
        history.record(transition(TestState::Idle, TestState::Focused));
        history.record(transition(TestState::Focused, TestState::Open));

        let path = history.get_path();
        assert_eq!(
            path,
            vec![&TestState::Idle, &TestState::Focused, &TestState::Open]
        );
    }

    #[test]
    fn oldest_entries_are_dropped_at_the_limit() {
        let mut history = StateHistory::with_limit(2);
        history.record(transition(TestState::Idle, TestState::Focused));
        history.record(transition(TestState::Focused, TestState::Open));
        history.record(transition(TestState::Open, TestState::Focused));

        assert_eq!(history.len(), 2);
        assert_eq!(
            history.get_path(),
            vec![&TestState::Focused, &TestState::Open, &TestState::Focused]
        );
        assert_eq!(history.last().map(|t| &t.to), Some(&TestState::Focused));
    }

    #[test]
    fn zero_limit_disables_recording() {
        let mut history = StateHistory::with_limit(0);
        history.record(transition(TestState::Idle, TestState::Open));
        assert!(history.is_empty());
    }

    #[test]
    fn duration_calculates_elapsed_time() {
        let mut history = StateHistory::new();
        history.record(transition(TestState::Idle, TestState::Focused));
        std::thread::sleep(std::time::Duration::from_millis(10));
        history.record(transition(TestState::Focused, TestState::Open));

        let duration = history.duration().unwrap();
        assert!(duration >= std::time::Duration::from_millis(10));
    }

    #[test]
    fn history_serializes_correctly() {
        let mut history = StateHistory::with_limit(8);
        history.record(transition(TestState::Idle, TestState::Open));

        let json = serde_json::to_string(&history).unwrap();
        let deserialized: StateHistory<TestState> = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.len(), 1);
        assert_eq!(deserialized.limit(), 8);
    }
}
