//! Compiled transition table.
//!
//! A [`MachineDefinition`] refers to guards, actions and activities by name.
//! Compiling it against an [`Implementation`] checks every reference up
//! front, reporting all unknown names at once, and replaces the names with
//! the functions they denote so dispatch never does a string lookup that
//! could fail.

use crate::builder::error::{check, finish, BuildError, Check, ConfigError};
use crate::builder::{ActivityDecl, MachineDefinition, StateNode, TransitionCandidate};
use crate::core::{Context, Event, Guard, GuardExpr, State};
use crate::effects::action::Action;
use crate::effects::activity::{Activity, Owner};
use crate::effects::implementation::Implementation;
use crate::effects::scheduler::Scheduler;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

pub(crate) struct NamedAction<S: State> {
    pub(crate) name: String,
    pub(crate) run: Action<S>,
}

pub(crate) struct CompiledTransition<S: State> {
    pub(crate) guard: Option<Guard>,
    pub(crate) target: Option<S>,
    pub(crate) actions: Vec<NamedAction<S>>,
    pub(crate) reenter: bool,
}

impl<S: State> CompiledTransition<S> {
    fn applies(&self, context: &Context, event: &Event) -> bool {
        self.guard.as_ref().map_or(true, |g| g.check(context, event))
    }

    /// Whether taking this transition from `current` leaves the state.
    pub(crate) fn is_external(&self, current: &S) -> bool {
        match &self.target {
            Some(target) => target != current || self.reenter,
            None => false,
        }
    }
}

pub(crate) struct CompiledActivity<S: State> {
    pub(crate) decl: ActivityDecl,
    pub(crate) run: Activity<S>,
}

pub(crate) struct CompiledState<S: State> {
    pub(crate) entry: Vec<NamedAction<S>>,
    pub(crate) exit: Vec<NamedAction<S>>,
    pub(crate) activities: Vec<CompiledActivity<S>>,
    pub(crate) tags: Vec<String>,
    pub(crate) on: HashMap<String, Vec<CompiledTransition<S>>>,
}

pub(crate) struct CompiledWatch<S: State> {
    pub(crate) field: String,
    pub(crate) actions: Vec<NamedAction<S>>,
}

/// Everything the engine needs at runtime, resolved and validated.
pub(crate) struct Chart<S: State> {
    pub(crate) states: HashMap<String, CompiledState<S>>,
    pub(crate) on: HashMap<String, Vec<CompiledTransition<S>>>,
    pub(crate) activities: Vec<CompiledActivity<S>>,
    pub(crate) watch: Vec<CompiledWatch<S>>,
    /// Fields compared before and after each job: watched fields and
    /// activity restart dependencies.
    pub(crate) tracked: BTreeSet<String>,
    pub(crate) scheduler: Option<Arc<dyn Scheduler>>,
}

impl<S: State> Chart<S> {
    pub(crate) fn compile(
        definition: &MachineDefinition<S>,
        implementation: &Implementation<S>,
    ) -> Result<Self, BuildError> {
        finish(definition.id(), validate(definition, implementation))?;

        let resolver = Resolver {
            implementation,
            machine: definition.id(),
        };

        let mut states = HashMap::new();
        for (state, node) in definition.states() {
            states.insert(state.name().to_string(), resolver.state(state.name(), node)?);
        }

        let mut tracked = BTreeSet::new();
        let watch = definition
            .watch()
            .iter()
            .map(|entry| {
                tracked.insert(entry.field.clone());
                Ok(CompiledWatch {
                    field: entry.field.clone(),
                    actions: resolver.actions(&entry.actions)?,
                })
            })
            .collect::<Result<Vec<_>, BuildError>>()?;

        let activities = resolver.activities(definition.activities())?;
        for activity in activities
            .iter()
            .chain(states.values().flat_map(|s| s.activities.iter()))
        {
            tracked.extend(activity.decl.restart_on.iter().cloned());
        }

        Ok(Chart {
            on: resolver.transitions(definition.global_transitions())?,
            states,
            activities,
            watch,
            tracked,
            scheduler: implementation.shared_scheduler().cloned(),
        })
    }

    pub(crate) fn state(&self, state: &S) -> Option<&CompiledState<S>> {
        self.states.get(state.name())
    }

    /// First applicable candidate for `event` in `state`, falling back to the
    /// top-level table when the state declares nothing for the event type.
    pub(crate) fn select<'a>(
        &'a self,
        state: &'a CompiledState<S>,
        context: &Context,
        event: &Event,
    ) -> Option<&'a CompiledTransition<S>> {
        let candidates = state
            .on
            .get(event.kind())
            .or_else(|| self.on.get(event.kind()))?;
        candidates.iter().find(|c| c.applies(context, event))
    }

    pub(crate) fn activity(&self, owner: &Owner, index: usize) -> Option<&CompiledActivity<S>> {
        match owner {
            Owner::Machine => self.activities.get(index),
            Owner::State(name) => self.states.get(name)?.activities.get(index),
        }
    }
}

/// Check every name the definition refers to, accumulating ALL problems.
fn validate<S: State>(
    definition: &MachineDefinition<S>,
    implementation: &Implementation<S>,
) -> Vec<Check> {
    let mut checks = Vec::new();

    let action_checks = |names: &[String], location: &str| -> Vec<Check> {
        names
            .iter()
            .map(|name| {
                check(implementation.find_action(name).is_some(), || {
                    ConfigError::UnknownAction {
                        name: name.clone(),
                        location: location.to_string(),
                    }
                })
            })
            .collect()
    };

    let activity_checks = |decls: &[ActivityDecl], location: &str| -> Vec<Check> {
        decls
            .iter()
            .flat_map(|decl| {
                [
                    check(implementation.find_activity(&decl.name).is_some(), || {
                        ConfigError::UnknownActivity {
                            name: decl.name.clone(),
                            location: location.to_string(),
                        }
                    }),
                    check(
                        !decl.deferred || implementation.shared_scheduler().is_some(),
                        || ConfigError::MissingScheduler {
                            name: decl.name.clone(),
                            location: location.to_string(),
                        },
                    ),
                ]
            })
            .collect()
    };

    let transition_checks =
        |table: &BTreeMap<String, Vec<TransitionCandidate<S>>>, scope: &str| -> Vec<Check> {
            let mut checks = Vec::new();
            for (event, candidates) in table {
                let location = format!("{scope} on '{event}'");
                for candidate in candidates {
                    if let Some(guard) = &candidate.guard {
                        checks.extend(guard.names().into_iter().map(|name| {
                            check(implementation.find_guard(name).is_some(), || {
                                ConfigError::UnknownGuard {
                                    name: name.to_string(),
                                    location: location.clone(),
                                }
                            })
                        }));
                    }
                    checks.extend(action_checks(&candidate.actions, &location));
                }
            }
            checks
        };

    checks.extend(transition_checks(definition.global_transitions(), "top-level"));
    checks.extend(activity_checks(definition.activities(), "machine activities"));
    for entry in definition.watch() {
        checks.extend(action_checks(
            &entry.actions,
            &format!("watch '{}'", entry.field),
        ));
    }
    for (state, node) in definition.states() {
        let scope = format!("state '{}'", state.name());
        checks.extend(transition_checks(&node.on, &scope));
        checks.extend(action_checks(&node.entry, &format!("{scope} entry")));
        checks.extend(action_checks(&node.exit, &format!("{scope} exit")));
        checks.extend(activity_checks(&node.activities, &scope));
    }

    checks
}

/// Name lookups after validation passed. Failures here mean the definition
/// and implementation disagree with what `validate` saw.
struct Resolver<'a, S: State> {
    implementation: &'a Implementation<S>,
    machine: &'a str,
}

impl<S: State> Resolver<'_, S> {
    fn fail(&self, error: ConfigError) -> BuildError {
        BuildError::Invalid {
            machine: self.machine.to_string(),
            errors: vec![error],
        }
    }

    fn actions(&self, names: &[String]) -> Result<Vec<NamedAction<S>>, BuildError> {
        names
            .iter()
            .map(|name| {
                let run = self.implementation.find_action(name).ok_or_else(|| {
                    self.fail(ConfigError::UnknownAction {
                        name: name.clone(),
                        location: "resolution".to_string(),
                    })
                })?;
                Ok(NamedAction {
                    name: name.clone(),
                    run: Arc::clone(run),
                })
            })
            .collect()
    }

    fn activities(&self, decls: &[ActivityDecl]) -> Result<Vec<CompiledActivity<S>>, BuildError> {
        decls
            .iter()
            .map(|decl| {
                let run = self.implementation.find_activity(&decl.name).ok_or_else(|| {
                    self.fail(ConfigError::UnknownActivity {
                        name: decl.name.clone(),
                        location: "resolution".to_string(),
                    })
                })?;
                Ok(CompiledActivity {
                    decl: decl.clone(),
                    run: Arc::clone(run),
                })
            })
            .collect()
    }

    fn guard(&self, expr: &GuardExpr) -> Result<Guard, BuildError> {
        expr.resolve(&|name: &str| {
            self.implementation.find_guard(name).cloned().ok_or_else(|| {
                self.fail(ConfigError::UnknownGuard {
                    name: name.to_string(),
                    location: "resolution".to_string(),
                })
            })
        })
    }

    fn transitions(
        &self,
        table: &BTreeMap<String, Vec<TransitionCandidate<S>>>,
    ) -> Result<HashMap<String, Vec<CompiledTransition<S>>>, BuildError> {
        table
            .iter()
            .map(|(event, candidates)| {
                let compiled = candidates
                    .iter()
                    .map(|candidate| {
                        Ok(CompiledTransition {
                            guard: candidate
                                .guard
                                .as_ref()
                                .map(|expr| self.guard(expr))
                                .transpose()?,
                            target: candidate.target.clone(),
                            actions: self.actions(&candidate.actions)?,
                            reenter: candidate.reenter,
                        })
                    })
                    .collect::<Result<Vec<_>, BuildError>>()?;
                Ok((event.clone(), compiled))
            })
            .collect()
    }

    fn state(&self, name: &str, node: &StateNode<S>) -> Result<CompiledState<S>, BuildError> {
        tracing::trace!(machine = self.machine, state = name, "compiling state");
        Ok(CompiledState {
            entry: self.actions(&node.entry)?,
            exit: self.actions(&node.exit)?,
            activities: self.activities(&node.activities)?,
            tags: node.tags.clone(),
            on: self.transitions(&node.on)?,
        })
    }
}
