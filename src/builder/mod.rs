//! Builder API for declaring machines.
//!
//! This module provides fluent builders and a macro for writing transition
//! tables with minimal boilerplate. Structural mistakes (undeclared targets,
//! duplicate states, a missing initial state) are reported by
//! [`MachineBuilder::build`], all of them at once.
//!
//! # Example
//!
//! ```
//! use headless_machine::builder::{MachineBuilder, StateBuilder, TransitionBuilder};
//! use headless_machine::core::not;
//! use headless_machine::state_enum;
//!
//! state_enum! {
//!     enum NavState {
//!         Idle,
//!         Focused,
//!         Open,
//!     }
//! }
//!
//! let definition = MachineBuilder::new()
//!     .id("nav-menu")
//!     .initial(NavState::Idle)
//!     .on(
//!         "CLOSE",
//!         TransitionBuilder::to(NavState::Focused).actions(["collapseMenu"]),
//!     )
//!     .state(
//!         NavState::Idle,
//!         StateBuilder::new().on(
//!             "TRIGGER_FOCUS",
//!             TransitionBuilder::to(NavState::Focused).action("setFocusedMenuId"),
//!         ),
//!     )
//!     .state(
//!         NavState::Focused,
//!         StateBuilder::new()
//!             .on(
//!                 "TRIGGER_CLICK",
//!                 TransitionBuilder::internal()
//!                     .guard("isExpanded")
//!                     .action("collapseMenu"),
//!             )
//!             .on(
//!                 "TRIGGER_CLICK",
//!                 TransitionBuilder::to(NavState::Open)
//!                     .guard(not("isExpanded"))
//!                     .actions(["expandMenu", "focusMenu"]),
//!             ),
//!     )
//!     .state(NavState::Open, StateBuilder::new().tag("open"))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(definition.id(), "nav-menu");
//! ```

pub mod definition;
pub mod error;
pub mod machine;
pub mod macros;
pub mod state;
pub mod transition;

pub use definition::{
    ActivityDecl, Initial, MachineDefinition, StateNode, TransitionCandidate, WatchEntry,
};
pub use error::{BuildError, ConfigError};
pub use machine::MachineBuilder;
pub use state::StateBuilder;
pub use transition::TransitionBuilder;
