//! Builder for transition candidates.

use crate::builder::definition::TransitionCandidate;
use crate::core::GuardExpr;

/// Builder for one transition candidate with a fluent API.
///
/// ```rust
/// use headless_machine::builder::TransitionBuilder;
/// use headless_machine::core::not;
///
/// let open = TransitionBuilder::to("open")
///     .guard(not("isExpanded"))
///     .actions(["expandMenu", "focusMenu"])
///     .build();
///
/// assert_eq!(open.target, Some("open"));
/// assert_eq!(open.actions, vec!["expandMenu", "focusMenu"]);
/// ```
#[derive(Clone, Debug)]
pub struct TransitionBuilder<S> {
    guard: Option<GuardExpr>,
    target: Option<S>,
    actions: Vec<String>,
    reenter: bool,
}

impl<S> TransitionBuilder<S> {
    /// An external transition to `target`.
    pub fn to(target: S) -> Self {
        Self {
            guard: None,
            target: Some(target),
            actions: Vec::new(),
            reenter: false,
        }
    }

    /// An internal transition: runs its actions without leaving the state.
    pub fn internal() -> Self {
        Self {
            guard: None,
            target: None,
            actions: Vec::new(),
            reenter: false,
        }
    }

    /// Only take this transition when the guard passes.
    pub fn guard(mut self, guard: impl Into<GuardExpr>) -> Self {
        self.guard = Some(guard.into());
        self
    }

    /// Append one action.
    pub fn action(mut self, name: impl Into<String>) -> Self {
        self.actions.push(name.into());
        self
    }

    /// Append several actions, run in the given order.
    pub fn actions<T: Into<String>>(mut self, names: impl IntoIterator<Item = T>) -> Self {
        self.actions.extend(names.into_iter().map(Into::into));
        self
    }

    /// Make a same-state target leave and re-enter the state.
    pub fn reenter(mut self) -> Self {
        self.reenter = true;
        self
    }

    pub fn build(self) -> TransitionCandidate<S> {
        TransitionCandidate {
            guard: self.guard,
            target: self.target,
            actions: self.actions,
            reenter: self.reenter,
        }
    }
}

impl<S> From<TransitionBuilder<S>> for TransitionCandidate<S> {
    fn from(builder: TransitionBuilder<S>) -> Self {
        builder.build()
    }
}
