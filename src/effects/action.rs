//! Actions: named side effects run during a transition.

use crate::core::{Context, Event, State};
use crate::effects::activity::Disposer;
use crate::effects::machine::{MachineHandle, StateSnapshot};
use crate::effects::scheduler::Scheduler;
use std::sync::Arc;
use thiserror::Error;

/// Error returned by user-supplied actions and activities.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct EffectError {
    message: String,
}

impl EffectError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for EffectError {
    fn from(message: String) -> Self {
        EffectError::new(message)
    }
}

impl From<&str> for EffectError {
    fn from(message: &str) -> Self {
        EffectError::new(message)
    }
}

/// Action function. Receives the live context, the event being processed and
/// the [`Helpers`] of the running machine.
pub type Action<S> =
    Arc<dyn Fn(&mut Context, &Event, &Helpers<'_, S>) -> Result<(), EffectError> + Send + Sync>;

/// What an action or activity may do besides touching the context.
pub struct Helpers<'a, S: State> {
    pub(crate) handle: &'a MachineHandle<S>,
    pub(crate) state: &'a S,
    pub(crate) previous_event: Option<&'a Event>,
    pub(crate) initial_context: &'a Context,
    pub(crate) scheduler: Option<&'a Arc<dyn Scheduler>>,
}

impl<'a, S: State> Helpers<'a, S> {
    /// Queue a follow-up event. It runs after the current job has fully
    /// settled, never inline.
    pub fn send(&self, event: impl Into<Event>) {
        self.handle.enqueue_event(event.into());
    }

    /// State the machine is in while this effect runs.
    pub fn state(&self) -> &S {
        self.state
    }

    /// The event processed before the current one.
    pub fn previous_event(&self) -> Option<&Event> {
        self.previous_event
    }

    /// The context as the instance was constructed, for reset semantics.
    pub fn initial_context(&self) -> &Context {
        self.initial_context
    }

    /// Last settled snapshot. Does not include changes made by the job in flight.
    pub fn snapshot(&self) -> Option<Arc<StateSnapshot<S>>> {
        self.handle.snapshot()
    }

    /// A handle that outlives this call, for work that sends events later.
    pub fn handle(&self) -> MachineHandle<S> {
        self.handle.clone()
    }

    /// Run `task` on the next frame. Without a configured scheduler the task
    /// runs immediately and nothing is returned.
    pub fn defer<F>(&self, task: F) -> Option<Disposer>
    where
        F: FnOnce() + Send + 'static,
    {
        match self.scheduler {
            Some(scheduler) => Some(scheduler.next_frame(Box::new(task))),
            None => {
                tracing::trace!("no scheduler configured, running deferred task inline");
                task();
                None
            }
        }
    }
}
