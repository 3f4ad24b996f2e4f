//! Activities: long-running effects tied to occupancy of a state.
//!
//! An activity starts when its state is entered and returns an optional
//! [`Disposer`]. The engine calls the disposer exactly once: when the state
//! is exited, when the activity is restarted, or when the machine stops.

use crate::core::{Context, Event};
use crate::effects::action::{EffectError, Helpers};
use std::fmt;
use std::sync::Arc;

/// Cleanup returned by an activity (or by a scheduled frame task).
///
/// Dropping a disposer without calling [`dispose`](Disposer::dispose) does
/// not run it.
pub struct Disposer(Box<dyn FnOnce() + Send>);

impl Disposer {
    pub fn new<F>(dispose: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Disposer(Box::new(dispose))
    }

    pub fn noop() -> Self {
        Disposer::new(|| {})
    }

    pub fn dispose(self) {
        (self.0)()
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Disposer(..)")
    }
}

/// Activity setup function. Returning `Ok(None)` means there is nothing to
/// clean up (e.g. the activity decided not to attach anything).
pub type Activity<S> = Arc<
    dyn Fn(&mut Context, &Event, &Helpers<'_, S>) -> Result<Option<Disposer>, EffectError>
        + Send
        + Sync,
>;

/// Who an activity belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Owner {
    Machine,
    State(String),
}

enum Slot {
    /// Deferred start waiting for its frame; disposing cancels the frame.
    Scheduled(Disposer),
    Running(Option<Disposer>),
}

pub(crate) struct RunningActivity {
    pub(crate) id: u64,
    pub(crate) owner: Owner,
    /// Position of the declaration in its owner's activity list.
    pub(crate) index: usize,
    pub(crate) name: String,
    slot: Slot,
}

impl RunningActivity {
    pub(crate) fn scheduled(
        id: u64,
        owner: Owner,
        index: usize,
        name: String,
        cancel: Disposer,
    ) -> Self {
        Self {
            id,
            owner,
            index,
            name,
            slot: Slot::Scheduled(cancel),
        }
    }

    pub(crate) fn running(
        id: u64,
        owner: Owner,
        index: usize,
        name: String,
        disposer: Option<Disposer>,
    ) -> Self {
        Self {
            id,
            owner,
            index,
            name,
            slot: Slot::Running(disposer),
        }
    }

    pub(crate) fn is_scheduled(&self) -> bool {
        matches!(self.slot, Slot::Scheduled(_))
    }

    pub(crate) fn dispose(self) {
        tracing::trace!(activity = %self.name, id = self.id, "disposing activity");
        match self.slot {
            Slot::Scheduled(cancel) => cancel.dispose(),
            Slot::Running(Some(disposer)) => disposer.dispose(),
            Slot::Running(None) => {}
        }
    }
}

/// Activities currently started (or waiting for their frame), in start order.
#[derive(Default)]
pub(crate) struct ActivityRegistry {
    entries: Vec<RunningActivity>,
    next_id: u64,
}

impl ActivityRegistry {
    pub(crate) fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// The id the next started activity will get.
    pub(crate) fn watermark(&self) -> u64 {
        self.next_id
    }

    pub(crate) fn insert(&mut self, activity: RunningActivity) {
        self.entries.push(activity);
    }

    pub(crate) fn take(&mut self, id: u64) -> Option<RunningActivity> {
        let position = self.entries.iter().position(|entry| entry.id == id)?;
        Some(self.entries.remove(position))
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &RunningActivity> {
        self.entries.iter()
    }

    /// Dispose every activity matching `owned`, most recently started first.
    pub(crate) fn stop_where(&mut self, owned: impl Fn(&Owner) -> bool) -> usize {
        let (stopped, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|entry| owned(&entry.owner));
        self.entries = kept;
        let count = stopped.len();
        for entry in stopped.into_iter().rev() {
            entry.dispose();
        }
        count
    }

    pub(crate) fn stop_all(&mut self) -> usize {
        self.stop_where(|_| true)
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.name.clone()).collect()
    }
}
