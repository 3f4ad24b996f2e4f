//! Runtime error types.

use crate::effects::action::EffectError;
use thiserror::Error;

/// Errors surfaced by [`Machine::send`](crate::effects::Machine::send) and friends.
///
/// A failing action aborts the job in flight. The machine keeps whatever
/// state it had reached; events queued behind the failing one stay queued and
/// run on the next call that drives the machine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MachineError {
    #[error("Action '{action}' failed: {source}")]
    ActionFailed {
        action: String,
        #[source]
        source: EffectError,
    },

    #[error("Activity '{activity}' failed to start: {source}")]
    ActivityFailed {
        activity: String,
        #[source]
        source: EffectError,
    },

    /// The engine reached a state the chart does not declare.
    #[error("State '{state}' is not declared by this machine")]
    UnknownState { state: String },
}
