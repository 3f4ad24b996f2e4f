//! Builder for machine definitions.

use crate::builder::definition::{
    ActivityDecl, Initial, MachineDefinition, StateNode, TransitionCandidate, WatchEntry,
};
use crate::builder::error::{check, finish, BuildError, Check, ConfigError};
use crate::builder::state::StateBuilder;
use crate::builder::transition::TransitionBuilder;
use crate::core::{ComputedFn, ComputedTable, Context, State, DEFAULT_HISTORY_LIMIT};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// Builder for constructing machine definitions with a fluent API.
///
/// `build` checks the table itself (initial state, targets, duplicate states,
/// computed names). Guard, action and activity names are checked later,
/// against an implementation, by [`Machine::new`](crate::effects::Machine::new).
pub struct MachineBuilder<S: State> {
    id: Option<String>,
    initial: Option<Initial<S>>,
    context: Map<String, Value>,
    computed: ComputedTable,
    watch: Vec<WatchEntry>,
    on: BTreeMap<String, Vec<TransitionCandidate<S>>>,
    activities: Vec<ActivityDecl>,
    states: Vec<(S, StateNode<S>)>,
    history_limit: usize,
}

impl<S: State> MachineBuilder<S> {
    pub fn new() -> Self {
        Self {
            id: None,
            initial: None,
            context: Map::new(),
            computed: ComputedTable::new(),
            watch: Vec::new(),
            on: BTreeMap::new(),
            activities: Vec::new(),
            states: Vec::new(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Machine id used in logs and checkpoints. Defaults to `machine-<uuid>`.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the initial state (required).
    pub fn initial(mut self, state: S) -> Self {
        self.initial = Some(Initial::State(state));
        self
    }

    /// Pick the initial state from the instance context when the machine starts.
    pub fn initial_with<F>(mut self, pick: F) -> Self
    where
        F: Fn(&Context) -> S + Send + Sync + 'static,
    {
        self.initial = Some(Initial::Computed(Arc::new(pick)));
        self
    }

    /// Add a context default.
    pub fn context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Register a derived, read-only value.
    pub fn computed<F>(mut self, name: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&Context) -> Value + Send + Sync + 'static,
    {
        let compute: ComputedFn = Arc::new(compute);
        self.computed.insert(name.into(), compute);
        self
    }

    /// Run `actions` after any job that changed `field` (a context or computed name).
    pub fn watch<T: Into<String>>(
        mut self,
        field: impl Into<String>,
        actions: impl IntoIterator<Item = T>,
    ) -> Self {
        self.watch.push(WatchEntry {
            field: field.into(),
            actions: actions.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Add a top-level transition candidate.
    pub fn on(mut self, event: impl Into<String>, transition: TransitionBuilder<S>) -> Self {
        self.on
            .entry(event.into())
            .or_default()
            .push(transition.build());
        self
    }

    /// Add a machine-level activity, running from `start` to `stop`.
    pub fn activity(mut self, activity: impl Into<ActivityDecl>) -> Self {
        self.activities.push(activity.into());
        self
    }

    /// Declare a state.
    pub fn state(mut self, state: S, node: StateBuilder<S>) -> Self {
        self.states.push((state, node.build()));
        self
    }

    /// Number of transitions each instance remembers.
    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Build the definition.
    /// Returns an error if the initial state is missing, or every structural
    /// problem found in the table.
    pub fn build(self) -> Result<MachineDefinition<S>, BuildError> {
        let initial = self.initial.ok_or(BuildError::MissingInitialState)?;
        let id = self
            .id
            .unwrap_or_else(|| format!("machine-{}", Uuid::new_v4()));

        let declared: HashSet<&str> = self.states.iter().map(|(s, _)| s.name()).collect();
        let mut checks: Vec<Check> = Vec::new();

        let mut seen = HashSet::new();
        for (state, _) in &self.states {
            checks.push(check(seen.insert(state.name()), || {
                ConfigError::DuplicateState {
                    state: state.name().to_string(),
                }
            }));
        }

        if let Initial::State(state) = &initial {
            checks.push(check(declared.contains(state.name()), || {
                ConfigError::UnknownInitial {
                    state: state.name().to_string(),
                }
            }));
        }

        for (event, candidates) in &self.on {
            let location = format!("top-level on '{event}'");
            checks.extend(target_checks(&declared, &location, candidates));
        }
        for (state, node) in &self.states {
            for (event, candidates) in &node.on {
                let location = format!("state '{}' on '{event}'", state.name());
                checks.extend(target_checks(&declared, &location, candidates));
            }
        }

        for name in self.computed.keys() {
            checks.push(check(!self.context.contains_key(name), || {
                ConfigError::ComputedShadowsField { name: name.clone() }
            }));
        }

        finish(&id, checks)?;

        tracing::debug!(machine = %id, states = self.states.len(), "machine definition built");

        Ok(MachineDefinition {
            id,
            initial,
            context: self.context,
            computed: Arc::new(self.computed),
            watch: self.watch,
            on: self.on,
            activities: self.activities,
            states: self.states,
            history_limit: self.history_limit,
        })
    }
}

fn target_checks<S: State>(
    declared: &HashSet<&str>,
    location: &str,
    candidates: &[TransitionCandidate<S>],
) -> Vec<Check> {
    candidates
        .iter()
        .filter_map(|candidate| candidate.target.as_ref())
        .map(|target| {
            check(declared.contains(target.name()), || ConfigError::UnknownTarget {
                location: location.to_string(),
                target: target.name().to_string(),
            })
        })
        .collect()
}

impl<S: State> Default for MachineBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}
