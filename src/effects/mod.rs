//! The runtime half of the crate.
//!
//! A [`MachineDefinition`](crate::builder::MachineDefinition) says *what*
//! happens; an [`Implementation`] supplies the guards, actions and
//! activities it names; a [`Machine`] runs the two together.
//!
//! # Key Concepts
//!
//! - **Actions**: synchronous effects run in declared order during a transition
//! - **Activities**: effects that live as long as their state and return a [`Disposer`]
//! - **Mailbox**: every send is queued and processed to completion, one at a time
//! - **Scheduler**: optional next-frame hook for deferred activities

mod action;
mod activity;
mod error;
mod implementation;
mod machine;
mod scheduler;
mod transition;

pub use action::{Action, EffectError, Helpers};
pub use activity::{Activity, Disposer};
pub use error::MachineError;
pub use implementation::Implementation;
pub use machine::{Machine, MachineHandle, StateSnapshot, Status, Subscription};
pub use scheduler::{FrameQueue, FrameTask, Scheduler};
