//! Core machine types.
//!
//! This module contains the pieces every machine is made of:
//! - State definitions via the `State` trait
//! - Events and the context store
//! - Guard predicates and their combinators
//! - Bounded transition history
//!
//! Nothing in here runs side effects; that is the job of
//! [`effects`](crate::effects).

mod context;
pub mod event;
mod guard;
mod history;
mod state;

pub use context::{ComputedFn, Context};
pub(crate) use context::ComputedTable;
pub use event::Event;
pub use guard::{and, not, or, Guard, GuardExpr};
pub use history::{StateHistory, StateTransition, DEFAULT_HISTORY_LIMIT};
pub use state::State;
