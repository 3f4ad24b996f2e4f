//! Declarative machine definitions.
//!
//! A definition is a transition table that refers to guards, actions and
//! activities by name. It carries no behavior of its own; the names are bound
//! to functions by an [`Implementation`](crate::effects::Implementation) when
//! a [`Machine`](crate::effects::Machine) is constructed.

use crate::core::{ComputedTable, Context, GuardExpr, State};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// How the initial state is chosen.
#[derive(Clone)]
pub enum Initial<S> {
    State(S),
    /// Picked from the instance's context when the machine starts,
    /// e.g. `open` when constructed with `open: true`.
    Computed(Arc<dyn Fn(&Context) -> S + Send + Sync>),
}

impl<S: fmt::Debug> fmt::Debug for Initial<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Initial::State(state) => f.debug_tuple("State").field(state).finish(),
            Initial::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// One entry of a transition list. Order matters: the first candidate whose
/// guard passes wins.
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionCandidate<S> {
    pub guard: Option<GuardExpr>,
    /// `None` makes the transition internal: no exit, no entry, no activity churn.
    pub target: Option<S>,
    pub actions: Vec<String>,
    /// Treat a same-state target as external, re-running exit/entry and
    /// restarting activities.
    pub reenter: bool,
}

/// A long-running effect attached to a state (or to the whole machine).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivityDecl {
    pub name: String,
    /// Start on the next frame instead of synchronously on entry.
    pub deferred: bool,
    /// Context or computed fields whose change restarts the activity.
    pub restart_on: Vec<String>,
}

impl ActivityDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            deferred: false,
            restart_on: Vec::new(),
        }
    }

    pub fn deferred(mut self) -> Self {
        self.deferred = true;
        self
    }

    pub fn restart_on<T: Into<String>>(mut self, fields: impl IntoIterator<Item = T>) -> Self {
        self.restart_on.extend(fields.into_iter().map(Into::into));
        self
    }
}

impl From<&str> for ActivityDecl {
    fn from(name: &str) -> Self {
        ActivityDecl::new(name)
    }
}

impl From<String> for ActivityDecl {
    fn from(name: String) -> Self {
        ActivityDecl::new(name)
    }
}

/// A declared state.
#[derive(Clone, Debug, PartialEq)]
pub struct StateNode<S> {
    pub on: BTreeMap<String, Vec<TransitionCandidate<S>>>,
    pub entry: Vec<String>,
    pub exit: Vec<String>,
    pub activities: Vec<ActivityDecl>,
    pub tags: Vec<String>,
}

impl<S> Default for StateNode<S> {
    fn default() -> Self {
        Self {
            on: BTreeMap::new(),
            entry: Vec::new(),
            exit: Vec::new(),
            activities: Vec::new(),
            tags: Vec::new(),
        }
    }
}

/// Actions fired when a watched field changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchEntry {
    pub field: String,
    pub actions: Vec<String>,
}

/// Immutable description of a machine. Cheap to clone and share between
/// instances.
#[derive(Clone)]
pub struct MachineDefinition<S: State> {
    pub(crate) id: String,
    pub(crate) initial: Initial<S>,
    pub(crate) context: Map<String, Value>,
    pub(crate) computed: Arc<ComputedTable>,
    pub(crate) watch: Vec<WatchEntry>,
    pub(crate) on: BTreeMap<String, Vec<TransitionCandidate<S>>>,
    pub(crate) activities: Vec<ActivityDecl>,
    pub(crate) states: Vec<(S, StateNode<S>)>,
    pub(crate) history_limit: usize,
}

impl<S: State> MachineDefinition<S> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn initial(&self) -> &Initial<S> {
        &self.initial
    }

    /// Context defaults, before per-instance overrides.
    pub fn context(&self) -> &Map<String, Value> {
        &self.context
    }

    pub fn watch(&self) -> &[WatchEntry] {
        &self.watch
    }

    /// Top-level transitions, consulted when the current state has none for an event.
    pub fn global_transitions(&self) -> &BTreeMap<String, Vec<TransitionCandidate<S>>> {
        &self.on
    }

    /// Activities running for the whole life of a started machine.
    pub fn activities(&self) -> &[ActivityDecl] {
        &self.activities
    }

    /// Declared states in declaration order.
    pub fn states(&self) -> impl Iterator<Item = (&S, &StateNode<S>)> {
        self.states.iter().map(|(state, node)| (state, node))
    }

    pub fn state(&self, name: &str) -> Option<&StateNode<S>> {
        self.states
            .iter()
            .find(|(state, _)| state.name() == name)
            .map(|(_, node)| node)
    }

    pub fn declares(&self, state: &S) -> bool {
        self.state(state.name()).is_some()
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Fresh context for a new instance: defaults merged with `overrides`.
    pub(crate) fn instantiate_context(&self, overrides: Map<String, Value>) -> Context {
        let mut fields = self.context.clone();
        fields.extend(overrides);
        Context::with_computed(fields, Arc::clone(&self.computed))
    }
}

impl<S: State> fmt::Debug for MachineDefinition<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MachineDefinition")
            .field("id", &self.id)
            .field("initial", &self.initial)
            .field("context", &self.context)
            .field("computed", &self.computed.keys().collect::<Vec<_>>())
            .field("watch", &self.watch)
            .field("on", &self.on)
            .field("activities", &self.activities)
            .field("states", &self.states)
            .finish()
    }
}
