//! Headless machine: the state-machine engine behind headless UI controllers.
//!
//! A widget's interaction logic (a navigation menu, a select, a carousel) is
//! written as a declarative transition table. The engine runs it: it picks
//! guarded transitions, runs exit, transition and entry actions in order,
//! keeps long-lived activities attached exactly while their state is active,
//! fires watchers when context fields change, and notifies subscribers with
//! a settled snapshot. Rendering is somebody else's job.
//!
//! # Core Concepts
//!
//! - **State**: type-safe state representation via the `State` trait
//! - **Context**: JSON-valued fields plus computed fields, compared structurally
//! - **Guards**: named predicates composed with `not`, `and`, `or`
//! - **Actions and activities**: named effects bound by an `Implementation`
//! - **Machine**: a running instance with a run-to-completion mailbox
//!
//! # Example
//!
//! ```rust
//! use headless_machine::builder::{MachineBuilder, StateBuilder, TransitionBuilder};
//! use headless_machine::core::{Context, Event};
//! use headless_machine::effects::{Implementation, Machine};
//! use headless_machine::state_enum;
//!
//! state_enum! {
//!     enum Counter {
//!         Idle,
//!     }
//! }
//!
//! let definition = MachineBuilder::new()
//!     .id("counter")
//!     .initial(Counter::Idle)
//!     .context("count", 0)
//!     .state(
//!         Counter::Idle,
//!         StateBuilder::new().on(
//!             "INCREMENT",
//!             TransitionBuilder::to(Counter::Idle)
//!                 .guard("belowMax")
//!                 .action("increment"),
//!         ),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let implementation = Implementation::new()
//!     .guard("belowMax", |ctx: &Context, _: &Event| {
//!         ctx.get_as::<i64>("count").unwrap_or(0) < 5
//!     })
//!     .action("increment", |ctx, _, _| {
//!         let count = ctx.get_as::<i64>("count").unwrap_or(0);
//!         ctx.set("count", count + 1);
//!         Ok(())
//!     });
//!
//! let machine = Machine::new(&definition, &implementation).unwrap();
//! machine.start().unwrap();
//! for _ in 0..6 {
//!     machine.send("INCREMENT").unwrap();
//! }
//! assert_eq!(machine.context().get_as::<i64>("count"), Some(5));
//! ```

pub mod builder;
pub mod checkpoint;
pub mod core;
pub mod effects;

/// Guard combinators, for `use headless_machine::guards::*`.
pub mod guards {
    pub use crate::core::{and, not, or, GuardExpr};
}

// Re-export commonly used types
pub use builder::{BuildError, ConfigError, MachineBuilder, StateBuilder, TransitionBuilder};
pub use checkpoint::{Checkpoint, CheckpointError};
pub use crate::core::{Context, Event, Guard, State, StateHistory, StateTransition};
pub use effects::{
    Disposer, EffectError, Helpers, Implementation, Machine, MachineError, StateSnapshot, Status,
};
