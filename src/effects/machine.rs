//! Machine runtime.
//!
//! Every entry point (`start`, `send`, `set_context`, deferred activity
//! starts, `stop`) becomes a job on a FIFO mailbox. Whoever enqueues into an
//! idle mailbox drains it; anything enqueued while draining, including sends
//! made by actions and activities, runs after the current job has settled.
//! The engine core is only locked while a job runs, and nothing reachable
//! from [`Helpers`] touches it, so effects can never deadlock the machine.

use crate::builder::{BuildError, Initial, MachineDefinition};
use crate::core::event::{INIT, SET_CONTEXT, START};
use crate::core::{Context, Event, State, StateHistory, StateTransition};
use crate::effects::action::Helpers;
use crate::effects::activity::{ActivityRegistry, Owner, RunningActivity};
use crate::effects::error::MachineError;
use crate::effects::implementation::Implementation;
use crate::effects::transition::{Chart, CompiledActivity, CompiledState, NamedAction};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Lifecycle of a machine instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    NotStarted,
    Running,
    Stopped,
}

/// What `getState` returns: the settled state after the last job.
#[derive(Clone, Debug, Serialize)]
#[serde(bound = "")]
pub struct StateSnapshot<S: State> {
    pub value: S,
    pub context: Context,
    pub event: Event,
    #[serde(rename = "previousEvent")]
    pub previous_event: Option<Event>,
    pub tags: Vec<String>,
    pub status: Status,
}

impl<S: State> StateSnapshot<S> {
    /// Whether the current state carries `tag`.
    pub fn matches(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn is(&self, state: &S) -> bool {
        self.value.name() == state.name()
    }
}

type Listener<S> = Arc<dyn Fn(&StateSnapshot<S>) + Send + Sync>;
pub(crate) type PickInitial<S> = Arc<dyn Fn(&Context) -> S + Send + Sync>;

enum Job {
    Start,
    Event(Event),
    SetContext(Map<String, Value>),
    StartActivity(u64),
    Stop,
}

impl Job {
    fn label(&self) -> &str {
        match self {
            Job::Start => START,
            Job::Event(event) => event.kind(),
            Job::SetContext(_) => SET_CONTEXT,
            Job::StartActivity(_) => "machine.activity",
            Job::Stop => "machine.stop",
        }
    }
}

#[derive(Default)]
struct Mailbox {
    jobs: VecDeque<Job>,
    draining: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Shared<S: State> {
    id: String,
    core: Mutex<Core<S>>,
    mailbox: Mutex<Mailbox>,
    published: Mutex<Arc<StateSnapshot<S>>>,
    subscribers: Mutex<Vec<(u64, Listener<S>)>>,
    next_subscriber: AtomicU64,
}

impl<S: State> Shared<S> {
    /// Queue `job`. Returns true when the caller now owns the drain.
    fn enqueue(&self, job: Job) -> bool {
        let mut mailbox = lock(&self.mailbox);
        mailbox.jobs.push_back(job);
        if mailbox.draining {
            false
        } else {
            mailbox.draining = true;
            true
        }
    }

    fn submit(self: &Arc<Self>, job: Job) -> Result<(), MachineError> {
        if self.enqueue(job) {
            self.drain()
        } else {
            Ok(())
        }
    }

    fn drain(self: &Arc<Self>) -> Result<(), MachineError> {
        let mut guard = DrainGuard {
            mailbox: &self.mailbox,
            armed: true,
        };
        loop {
            let job = {
                let mut mailbox = lock(&self.mailbox);
                match mailbox.jobs.pop_front() {
                    Some(job) => job,
                    None => {
                        // Released under the same lock that saw the queue empty.
                        mailbox.draining = false;
                        guard.armed = false;
                        return Ok(());
                    }
                }
            };
            self.run(job)?;
        }
    }

    fn run(self: &Arc<Self>, job: Job) -> Result<(), MachineError> {
        let handle = MachineHandle {
            shared: Arc::downgrade(self),
        };
        let stopping = matches!(job, Job::Stop);

        let (result, snapshot, changed) = {
            let mut core = lock(&self.core);
            let span = tracing::debug_span!("machine", id = %self.id, event = %job.label());
            let _entered = span.enter();

            let before = core.marker();
            let fields = core.context.fields().clone();
            let result = core.process(job, &handle);
            let changed = core.marker() != before || core.context.fields() != &fields;

            let snapshot = Arc::new(core.snapshot());
            *lock(&self.published) = Arc::clone(&snapshot);
            (result, snapshot, changed)
        };

        if stopping {
            lock(&self.subscribers).clear();
        } else if changed {
            self.notify(&snapshot);
        }
        result
    }

    fn notify(&self, snapshot: &StateSnapshot<S>) {
        let listeners: Vec<Listener<S>> = lock(&self.subscribers)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(snapshot);
        }
    }
}

/// Hands the drain back when the draining caller returns early with an
/// error or unwinds out of a panicking callback.
struct DrainGuard<'a> {
    mailbox: &'a Mutex<Mailbox>,
    armed: bool,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            lock(self.mailbox).draining = false;
        }
    }
}

/// Values of tracked fields when a job began.
struct Baseline {
    values: BTreeMap<String, Option<Value>>,
    watermark: u64,
}

struct Core<S: State> {
    chart: Arc<Chart<S>>,
    pick_initial: Option<PickInitial<S>>,
    status: Status,
    current: S,
    context: Context,
    initial_context: Context,
    event: Event,
    previous_event: Option<Event>,
    activities: ActivityRegistry,
    history: StateHistory<S>,
}

impl<S: State> Core<S> {
    fn marker(&self) -> (String, Status) {
        (self.current.name().to_string(), self.status)
    }

    fn snapshot(&self) -> StateSnapshot<S> {
        let tags = self
            .chart
            .state(&self.current)
            .map(|state| state.tags.clone())
            .unwrap_or_default();
        StateSnapshot {
            value: self.current.clone(),
            context: self.context.clone(),
            event: self.event.clone(),
            previous_event: self.previous_event.clone(),
            tags,
            status: self.status,
        }
    }

    fn process(&mut self, job: Job, handle: &MachineHandle<S>) -> Result<(), MachineError> {
        match job {
            Job::Start => self.start(handle),
            Job::Event(event) => self.dispatch(event, handle),
            Job::SetContext(fields) => self.apply_context(fields, handle),
            Job::StartActivity(id) => self.start_scheduled(id, handle),
            Job::Stop => {
                self.stop();
                Ok(())
            }
        }
    }

    fn unknown_state(&self) -> MachineError {
        MachineError::UnknownState {
            state: self.current.name().to_string(),
        }
    }

    fn start(&mut self, handle: &MachineHandle<S>) -> Result<(), MachineError> {
        if self.status != Status::NotStarted {
            tracing::trace!(status = ?self.status, "start ignored");
            return Ok(());
        }
        if let Some(pick) = &self.pick_initial {
            self.current = pick(&self.context);
        }

        let chart = Arc::clone(&self.chart);
        let state = chart
            .state(&self.current)
            .ok_or_else(|| self.unknown_state())?;

        self.status = Status::Running;
        let event = Event::new(START);
        self.event = event.clone();
        self.previous_event = None;
        tracing::debug!(state = self.current.name(), "machine started");

        let baseline = self.baseline();
        self.start_activities(Owner::Machine, &chart.activities, &event, handle)?;
        self.enter(state, &event, handle)?;
        self.settle(baseline, &event, handle)
    }

    fn dispatch(&mut self, event: Event, handle: &MachineHandle<S>) -> Result<(), MachineError> {
        match self.status {
            Status::Running => {}
            Status::NotStarted => {
                tracing::trace!(event = %event, "machine not started, event ignored");
                return Ok(());
            }
            Status::Stopped => {
                tracing::warn!(event = %event, "machine stopped, event ignored");
                return Ok(());
            }
        }

        let chart = Arc::clone(&self.chart);
        let state = chart
            .state(&self.current)
            .ok_or_else(|| self.unknown_state())?;
        let Some(transition) = chart.select(state, &self.context, &event) else {
            tracing::trace!(event = %event, state = self.current.name(), "no transition matched");
            return Ok(());
        };

        let baseline = self.baseline();
        self.previous_event = Some(std::mem::replace(&mut self.event, event.clone()));

        match &transition.target {
            Some(target) if transition.is_external(&self.current) => {
                self.run_actions(&state.exit, &event, handle)?;
                self.run_actions(&transition.actions, &event, handle)?;
                let stopped = self
                    .activities
                    .stop_where(|owner| matches!(owner, Owner::State(_)));

                let from = std::mem::replace(&mut self.current, target.clone());
                tracing::debug!(
                    from = from.name(),
                    to = target.name(),
                    event = event.kind(),
                    stopped,
                    "transition"
                );
                self.history.record(StateTransition {
                    from,
                    to: target.clone(),
                    event: event.kind().to_string(),
                    timestamp: Utc::now(),
                });

                let next = chart
                    .state(&self.current)
                    .ok_or_else(|| self.unknown_state())?;
                self.enter(next, &event, handle)?;
            }
            _ => self.run_actions(&transition.actions, &event, handle)?,
        }

        self.settle(baseline, &event, handle)
    }

    fn apply_context(
        &mut self,
        fields: Map<String, Value>,
        handle: &MachineHandle<S>,
    ) -> Result<(), MachineError> {
        match self.status {
            Status::NotStarted => {
                self.context.merge(fields);
                Ok(())
            }
            Status::Stopped => {
                tracing::warn!("machine stopped, context update ignored");
                Ok(())
            }
            Status::Running => {
                let baseline = self.baseline();
                if self.context.merge(fields) {
                    self.settle(baseline, &Event::new(SET_CONTEXT), handle)
                } else {
                    Ok(())
                }
            }
        }
    }

    fn stop(&mut self) {
        if self.status == Status::Stopped {
            return;
        }
        let disposed = self.activities.stop_all();
        self.status = Status::Stopped;
        tracing::debug!(disposed, "machine stopped");
    }

    fn helpers<'a>(
        handle: &'a MachineHandle<S>,
        current: &'a S,
        previous_event: &'a Option<Event>,
        initial_context: &'a Context,
        chart: &'a Chart<S>,
    ) -> Helpers<'a, S> {
        Helpers {
            handle,
            state: current,
            previous_event: previous_event.as_ref(),
            initial_context,
            scheduler: chart.scheduler.as_ref(),
        }
    }

    fn run_actions(
        &mut self,
        actions: &[NamedAction<S>],
        event: &Event,
        handle: &MachineHandle<S>,
    ) -> Result<(), MachineError> {
        let helpers = Self::helpers(
            handle,
            &self.current,
            &self.previous_event,
            &self.initial_context,
            &self.chart,
        );
        for action in actions {
            tracing::trace!(action = %action.name, "running action");
            (action.run)(&mut self.context, event, &helpers).map_err(|source| {
                MachineError::ActionFailed {
                    action: action.name.clone(),
                    source,
                }
            })?;
        }
        Ok(())
    }

    /// Entry actions of `state`, then its activities. The activities start
    /// even when an entry action fails; that failure is returned afterwards.
    fn enter(
        &mut self,
        state: &CompiledState<S>,
        event: &Event,
        handle: &MachineHandle<S>,
    ) -> Result<(), MachineError> {
        let entered = self.run_actions(&state.entry, event, handle);
        let owner = Owner::State(self.current.name().to_string());
        self.start_activities(owner, &state.activities, event, handle)?;
        entered
    }

    fn start_activities(
        &mut self,
        owner: Owner,
        activities: &[CompiledActivity<S>],
        event: &Event,
        handle: &MachineHandle<S>,
    ) -> Result<(), MachineError> {
        for (index, activity) in activities.iter().enumerate() {
            self.start_activity(owner.clone(), index, activity, event, handle)?;
        }
        Ok(())
    }

    fn start_activity(
        &mut self,
        owner: Owner,
        index: usize,
        activity: &CompiledActivity<S>,
        event: &Event,
        handle: &MachineHandle<S>,
    ) -> Result<(), MachineError> {
        let id = self.activities.allocate_id();
        if activity.decl.deferred {
            if let Some(scheduler) = self.chart.scheduler.clone() {
                let frame_handle = handle.clone();
                let cancel =
                    scheduler.next_frame(Box::new(move || frame_handle.start_scheduled(id)));
                tracing::trace!(activity = %activity.decl.name, id, "activity scheduled");
                self.activities.insert(RunningActivity::scheduled(
                    id,
                    owner,
                    index,
                    activity.decl.name.clone(),
                    cancel,
                ));
                return Ok(());
            }
        }
        self.launch(id, owner, index, activity, event, handle)
    }

    fn launch(
        &mut self,
        id: u64,
        owner: Owner,
        index: usize,
        activity: &CompiledActivity<S>,
        event: &Event,
        handle: &MachineHandle<S>,
    ) -> Result<(), MachineError> {
        let helpers = Self::helpers(
            handle,
            &self.current,
            &self.previous_event,
            &self.initial_context,
            &self.chart,
        );
        let disposer = (activity.run)(&mut self.context, event, &helpers).map_err(|source| {
            MachineError::ActivityFailed {
                activity: activity.decl.name.clone(),
                source,
            }
        })?;
        tracing::trace!(activity = %activity.decl.name, id, "activity started");
        self.activities.insert(RunningActivity::running(
            id,
            owner,
            index,
            activity.decl.name.clone(),
            disposer,
        ));
        Ok(())
    }

    fn start_scheduled(&mut self, id: u64, handle: &MachineHandle<S>) -> Result<(), MachineError> {
        if self.status != Status::Running {
            return Ok(());
        }
        let pending = self
            .activities
            .iter()
            .any(|entry| entry.id == id && entry.is_scheduled());
        let Some(entry) = pending.then(|| self.activities.take(id)).flatten() else {
            tracing::trace!(id, "stale activity frame ignored");
            return Ok(());
        };

        let chart = Arc::clone(&self.chart);
        let Some(activity) = chart.activity(&entry.owner, entry.index) else {
            tracing::warn!(activity = %entry.name, "scheduled activity no longer declared");
            return Ok(());
        };

        let baseline = self.baseline();
        let event = self.event.clone();
        self.launch(entry.id, entry.owner, entry.index, activity, &event, handle)?;
        self.settle(baseline, &event, handle)
    }

    fn baseline(&self) -> Baseline {
        Baseline {
            values: self
                .chart
                .tracked
                .iter()
                .map(|field| (field.clone(), self.context.lookup(field)))
                .collect(),
            watermark: self.activities.watermark(),
        }
    }

    fn changed_since(&self, baseline: &Baseline) -> Vec<String> {
        baseline
            .values
            .iter()
            .filter(|(field, before)| self.context.lookup(field) != **before)
            .map(|(field, _)| field.clone())
            .collect()
    }

    /// Fire watchers for fields that changed during the job, then restart
    /// activities depending on them. Activities started by this job are
    /// already fresh and are left alone.
    fn settle(
        &mut self,
        baseline: Baseline,
        event: &Event,
        handle: &MachineHandle<S>,
    ) -> Result<(), MachineError> {
        if baseline.values.is_empty() {
            return Ok(());
        }
        let changed = self.changed_since(&baseline);
        if changed.is_empty() {
            return Ok(());
        }

        let chart = Arc::clone(&self.chart);
        for watch in chart.watch.iter().filter(|w| changed.contains(&w.field)) {
            tracing::debug!(field = %watch.field, "watcher fired");
            self.run_actions(&watch.actions, event, handle)?;
        }

        let changed = self.changed_since(&baseline);
        let stale: Vec<u64> = self
            .activities
            .iter()
            .filter(|entry| entry.id < baseline.watermark && !entry.is_scheduled())
            .filter(|entry| {
                chart
                    .activity(&entry.owner, entry.index)
                    .is_some_and(|a| a.decl.restart_on.iter().any(|f| changed.contains(f)))
            })
            .map(|entry| entry.id)
            .collect();

        for id in stale {
            let Some(entry) = self.activities.take(id) else {
                continue;
            };
            let (owner, index) = (entry.owner.clone(), entry.index);
            tracing::debug!(activity = %entry.name, "restarting activity");
            entry.dispose();
            if let Some(activity) = chart.activity(&owner, index) {
                self.start_activity(owner, index, activity, event, handle)?;
            }
        }
        Ok(())
    }
}

/// A running machine instance.
///
/// Dropping the machine stops it, disposing every running activity.
pub struct Machine<S: State> {
    shared: Arc<Shared<S>>,
}

impl<S: State> Machine<S> {
    pub fn new(
        definition: &MachineDefinition<S>,
        implementation: &Implementation<S>,
    ) -> Result<Self, BuildError> {
        Self::with_context(definition, implementation, Map::new())
    }

    /// Construct with per-instance context overrides merged over the
    /// definition's defaults.
    pub fn with_context(
        definition: &MachineDefinition<S>,
        implementation: &Implementation<S>,
        overrides: Map<String, Value>,
    ) -> Result<Self, BuildError> {
        let context = definition.instantiate_context(overrides);
        let (current, pick) = match definition.initial() {
            Initial::State(state) => (state.clone(), None),
            Initial::Computed(pick) => (pick(&context), Some(Arc::clone(pick))),
        };
        let history = StateHistory::with_limit(definition.history_limit());
        Self::assemble(definition, implementation, context, current, pick, history)
    }

    /// Build an unstarted machine positioned at `current`.
    pub(crate) fn assemble(
        definition: &MachineDefinition<S>,
        implementation: &Implementation<S>,
        context: Context,
        current: S,
        pick_initial: Option<PickInitial<S>>,
        history: StateHistory<S>,
    ) -> Result<Self, BuildError> {
        let chart = Arc::new(Chart::compile(definition, implementation)?);
        let core = Core {
            chart,
            pick_initial,
            status: Status::NotStarted,
            current,
            initial_context: context.clone(),
            context,
            event: Event::new(INIT),
            previous_event: None,
            activities: ActivityRegistry::default(),
            history,
        };
        let published = Arc::new(core.snapshot());
        tracing::debug!(machine = definition.id(), "machine created");

        Ok(Self {
            shared: Arc::new(Shared {
                id: definition.id().to_string(),
                core: Mutex::new(core),
                mailbox: Mutex::new(Mailbox::default()),
                published: Mutex::new(published),
                subscribers: Mutex::new(Vec::new()),
                next_subscriber: AtomicU64::new(0),
            }),
        })
    }

    pub fn id(&self) -> &str {
        &self.shared.id
    }

    /// Enter the initial state: machine-level activities, entry actions,
    /// then the state's activities.
    pub fn start(&self) -> Result<(), MachineError> {
        self.shared.submit(Job::Start)
    }

    /// Process `event` and everything it queues before returning. When
    /// called while the machine is already processing (from another thread,
    /// or from a subscriber), the event is queued and runs in order.
    pub fn send(&self, event: impl Into<Event>) -> Result<(), MachineError> {
        self.shared.submit(Job::Event(event.into()))
    }

    /// Merge `fields` into the context. Watchers and activity restarts fire
    /// as for any other job.
    pub fn set_context(&self, fields: Map<String, Value>) -> Result<(), MachineError> {
        self.shared.submit(Job::SetContext(fields))
    }

    pub fn state(&self) -> S {
        self.snapshot().value.clone()
    }

    pub fn snapshot(&self) -> Arc<StateSnapshot<S>> {
        Arc::clone(&lock(&self.shared.published))
    }

    pub fn context(&self) -> Context {
        self.snapshot().context.clone()
    }

    pub fn status(&self) -> Status {
        self.snapshot().status
    }

    /// Register `listener` for snapshots published after a job changed the
    /// state or the context.
    pub fn subscribe<F>(&self, listener: F) -> Subscription<S>
    where
        F: Fn(&StateSnapshot<S>) + Send + Sync + 'static,
    {
        let id = self.shared.next_subscriber.fetch_add(1, Ordering::SeqCst);
        lock(&self.shared.subscribers).push((id, Arc::new(listener)));
        Subscription {
            shared: Arc::downgrade(&self.shared),
            id,
        }
    }

    /// Dispose every activity, drop queued jobs and subscribers. Later jobs
    /// are ignored. Stopping twice is a no-op.
    pub fn stop(&self) {
        {
            let mut mailbox = lock(&self.shared.mailbox);
            mailbox.jobs.clear();
        }
        if let Err(err) = self.shared.submit(Job::Stop) {
            tracing::warn!(error = %err, "queued job failed while stopping");
        }
    }

    pub fn handle(&self) -> MachineHandle<S> {
        MachineHandle {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Must not be called from inside an action or activity.
    pub fn history(&self) -> StateHistory<S> {
        lock(&self.shared.core).history.clone()
    }

    /// Names of started activities, including deferred ones waiting for
    /// their frame. Must not be called from inside an action or activity.
    pub fn running_activities(&self) -> Vec<String> {
        lock(&self.shared.core).activities.names()
    }

    pub(crate) fn inspect<R>(&self, f: impl FnOnce(&S, &Context, &StateHistory<S>) -> R) -> R {
        let core = lock(&self.shared.core);
        f(&core.current, &core.context, &core.history)
    }
}

impl<S: State> Drop for Machine<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<S: State> fmt::Debug for Machine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("Machine")
            .field("id", &self.shared.id)
            .field("state", &snapshot.value)
            .field("status", &snapshot.status)
            .finish()
    }
}

/// Weak, cloneable reference to a machine for effects that send later.
pub struct MachineHandle<S: State> {
    shared: Weak<Shared<S>>,
}

impl<S: State> Clone for MachineHandle<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Weak::clone(&self.shared),
        }
    }
}

impl<S: State> MachineHandle<S> {
    /// Like [`Machine::send`]. Does nothing once the machine is dropped.
    pub fn send(&self, event: impl Into<Event>) -> Result<(), MachineError> {
        match self.shared.upgrade() {
            Some(shared) => shared.submit(Job::Event(event.into())),
            None => Ok(()),
        }
    }

    /// Queue without draining; the job in flight drains it.
    pub(crate) fn enqueue_event(&self, event: Event) {
        if let Some(shared) = self.shared.upgrade() {
            lock(&shared.mailbox).jobs.push_back(Job::Event(event));
        }
    }

    pub fn snapshot(&self) -> Option<Arc<StateSnapshot<S>>> {
        let shared = self.shared.upgrade()?;
        let snapshot = Arc::clone(&lock(&shared.published));
        Some(snapshot)
    }

    pub(crate) fn start_scheduled(&self, id: u64) {
        if let Some(shared) = self.shared.upgrade() {
            if let Err(err) = shared.submit(Job::StartActivity(id)) {
                tracing::warn!(error = %err, "deferred activity failed");
            }
        }
    }

    pub fn is_alive(&self) -> bool {
        self.shared.strong_count() > 0
    }
}

/// Returned by [`Machine::subscribe`]. Dropping it keeps the listener.
pub struct Subscription<S: State> {
    shared: Weak<Shared<S>>,
    id: u64,
}

impl<S: State> Subscription<S> {
    pub fn unsubscribe(self) {
        if let Some(shared) = self.shared.upgrade() {
            lock(&shared.subscribers).retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{MachineBuilder, StateBuilder, TransitionBuilder};
    use crate::effects::action::EffectError;
    use crate::effects::activity::Disposer;
    use std::sync::atomic::AtomicUsize;

    #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
    enum Toggle {
        Off,
        On,
    }

    impl State for Toggle {
        fn name(&self) -> &str {
            match self {
                Self::Off => "off",
                Self::On => "on",
            }
        }
    }

    fn definition() -> MachineDefinition<Toggle> {
        MachineBuilder::new()
            .id("toggle")
            .initial(Toggle::Off)
            .context("log", Value::Array(Vec::new()))
            .state(
                Toggle::Off,
                StateBuilder::new()
                    .on("TOGGLE", TransitionBuilder::to(Toggle::On).action("log"))
                    .entry(["log"])
                    .tag("inactive"),
            )
            .state(
                Toggle::On,
                StateBuilder::new()
                    .on("TOGGLE", TransitionBuilder::to(Toggle::Off).action("log"))
                    .on("FAIL", TransitionBuilder::internal().action("fail"))
                    .on("ECHO", TransitionBuilder::internal().action("echo"))
                    .exit(["log"])
                    .activity("listen"),
            )
            .build()
            .unwrap()
    }

    fn implementation(disposed: &Arc<AtomicUsize>) -> Implementation<Toggle> {
        let disposed = Arc::clone(disposed);
        Implementation::<Toggle>::new()
            .action("log", |ctx, evt, helpers| {
                let mut log = ctx.get_as::<Vec<String>>("log").unwrap_or_default();
                log.push(format!("{}:{}", helpers.state().name(), evt.kind()));
                ctx.set("log", log);
                Ok(())
            })
            .action("fail", |_, _, _| Err(EffectError::new("boom")))
            .action("echo", |_, _, helpers| {
                helpers.send("TOGGLE");
                Ok(())
            })
            .activity("listen", move |_, _, _| {
                let disposed = Arc::clone(&disposed);
                Ok(Some(Disposer::new(move || {
                    disposed.fetch_add(1, Ordering::SeqCst);
                })))
            })
    }

    fn log_of(machine: &Machine<Toggle>) -> Vec<String> {
        machine.context().get_as("log").unwrap_or_default()
    }

    #[test]
    fn snapshot_is_available_before_start() {
        let disposed = Arc::new(AtomicUsize::new(0));
        let machine = Machine::new(&definition(), &implementation(&disposed)).unwrap();

        let snapshot = machine.snapshot();
        assert_eq!(snapshot.value, Toggle::Off);
        assert_eq!(snapshot.status, Status::NotStarted);
        assert!(snapshot.matches("inactive"));

        machine.send("TOGGLE").unwrap();
        assert_eq!(machine.state(), Toggle::Off);
        assert!(log_of(&machine).is_empty());
    }

    #[test]
    fn external_transition_runs_exit_actions_then_entry() {
        let disposed = Arc::new(AtomicUsize::new(0));
        let machine = Machine::new(&definition(), &implementation(&disposed)).unwrap();
        machine.start().unwrap();
        machine.send("TOGGLE").unwrap();
        machine.send("TOGGLE").unwrap();

        assert_eq!(
            log_of(&machine),
            vec![
                "off:machine.start",
                "off:TOGGLE",
                "on:TOGGLE",
                "on:TOGGLE",
                "off:TOGGLE",
            ]
        );
        assert_eq!(disposed.load(Ordering::SeqCst), 1);
        assert_eq!(machine.history().len(), 2);
        let snapshot = machine.snapshot();
        assert_eq!(snapshot.event.kind(), "TOGGLE");
        assert_eq!(
            snapshot.previous_event.as_ref().map(Event::kind),
            Some("TOGGLE")
        );
    }

    #[test]
    fn sends_from_actions_run_after_the_current_job() {
        let disposed = Arc::new(AtomicUsize::new(0));
        let machine = Machine::new(&definition(), &implementation(&disposed)).unwrap();
        machine.start().unwrap();
        machine.send("TOGGLE").unwrap();

        machine.send("ECHO").unwrap();

        assert_eq!(machine.state(), Toggle::Off);
        assert_eq!(disposed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failing_action_is_reported_and_machine_keeps_working() {
        let disposed = Arc::new(AtomicUsize::new(0));
        let machine = Machine::new(&definition(), &implementation(&disposed)).unwrap();
        machine.start().unwrap();
        machine.send("TOGGLE").unwrap();

        let err = machine.send("FAIL").unwrap_err();
        assert!(matches!(err, MachineError::ActionFailed { ref action, .. } if action == "fail"));

        machine.send("TOGGLE").unwrap();
        assert_eq!(machine.state(), Toggle::Off);
    }

    #[test]
    fn unsubscribed_listeners_are_not_called() {
        let disposed = Arc::new(AtomicUsize::new(0));
        let machine = Machine::new(&definition(), &implementation(&disposed)).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let subscription = machine.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        machine.start().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        subscription.unsubscribe();
        machine.send("TOGGLE").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_disposes_once_and_is_idempotent() {
        let disposed = Arc::new(AtomicUsize::new(0));
        let machine = Machine::new(&definition(), &implementation(&disposed)).unwrap();
        machine.start().unwrap();
        machine.send("TOGGLE").unwrap();
        assert_eq!(machine.running_activities(), vec!["listen"]);

        machine.stop();
        machine.stop();

        assert_eq!(disposed.load(Ordering::SeqCst), 1);
        assert!(machine.running_activities().is_empty());
        assert_eq!(machine.status(), Status::Stopped);

        machine.send("TOGGLE").unwrap();
        assert_eq!(machine.state(), Toggle::On);
    }

    #[test]
    fn handle_outliving_the_machine_is_inert() {
        let disposed = Arc::new(AtomicUsize::new(0));
        let machine = Machine::new(&definition(), &implementation(&disposed)).unwrap();
        machine.start().unwrap();
        machine.send("TOGGLE").unwrap();
        let handle = machine.handle();
        assert!(handle.is_alive());

        drop(machine);

        assert_eq!(disposed.load(Ordering::SeqCst), 1);
        assert!(!handle.is_alive());
        assert!(handle.send("TOGGLE").is_ok());
        assert!(handle.snapshot().is_none());
    }
}
