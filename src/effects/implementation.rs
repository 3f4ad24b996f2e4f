//! Implementation registry: binds the names used in a definition to code.

use crate::core::{Context, Event, Guard, State};
use crate::effects::action::{Action, EffectError, Helpers};
use crate::effects::activity::{Activity, Disposer};
use crate::effects::scheduler::Scheduler;
use std::collections::HashMap;
use std::sync::Arc;

/// Named guards, actions and activities for one kind of machine.
///
/// ```rust
/// use headless_machine::core::{Context, Event};
/// use headless_machine::effects::Implementation;
/// use headless_machine::state_enum;
///
/// state_enum! {
///     enum Counter {
///         Idle,
///     }
/// }
///
/// let implementation = Implementation::<Counter>::new()
///     .guard("belowMax", |ctx: &Context, _: &Event| {
///         ctx.get_as::<i64>("count").unwrap_or(0) < 5
///     })
///     .action("increment", |ctx, _, _| {
///         let count = ctx.get_as::<i64>("count").unwrap_or(0);
///         ctx.set("count", count + 1);
///         Ok(())
///     });
/// ```
#[derive(Clone)]
pub struct Implementation<S: State> {
    guards: HashMap<String, Guard>,
    actions: HashMap<String, Action<S>>,
    activities: HashMap<String, Activity<S>>,
    scheduler: Option<Arc<dyn Scheduler>>,
}

impl<S: State> Implementation<S> {
    pub fn new() -> Self {
        Self {
            guards: HashMap::new(),
            actions: HashMap::new(),
            activities: HashMap::new(),
            scheduler: None,
        }
    }

    pub fn guard<F>(mut self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Context, &Event) -> bool + Send + Sync + 'static,
    {
        self.guards.insert(name.into(), Guard::new(predicate));
        self
    }

    pub fn action<F>(mut self, name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&mut Context, &Event, &Helpers<'_, S>) -> Result<(), EffectError>
            + Send
            + Sync
            + 'static,
    {
        let action: Action<S> = Arc::new(action);
        self.actions.insert(name.into(), action);
        self
    }

    pub fn activity<F>(mut self, name: impl Into<String>, activity: F) -> Self
    where
        F: Fn(&mut Context, &Event, &Helpers<'_, S>) -> Result<Option<Disposer>, EffectError>
            + Send
            + Sync
            + 'static,
    {
        let activity: Activity<S> = Arc::new(activity);
        self.activities.insert(name.into(), activity);
        self
    }

    /// Scheduler for deferred activities and [`Helpers::defer`].
    pub fn scheduler(mut self, scheduler: impl Scheduler + 'static) -> Self {
        self.scheduler = Some(Arc::new(scheduler));
        self
    }

    pub(crate) fn find_guard(&self, name: &str) -> Option<&Guard> {
        self.guards.get(name)
    }

    pub(crate) fn find_action(&self, name: &str) -> Option<&Action<S>> {
        self.actions.get(name)
    }

    pub(crate) fn find_activity(&self, name: &str) -> Option<&Activity<S>> {
        self.activities.get(name)
    }

    pub(crate) fn shared_scheduler(&self) -> Option<&Arc<dyn Scheduler>> {
        self.scheduler.as_ref()
    }
}

impl<S: State> Default for Implementation<S> {
    fn default() -> Self {
        Self::new()
    }
}
