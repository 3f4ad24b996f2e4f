//! Builder for state nodes.

use crate::builder::definition::{ActivityDecl, StateNode};
use crate::builder::transition::TransitionBuilder;

/// Builder for a [`StateNode`].
///
/// Calling [`on`](StateBuilder::on) several times with the same event type
/// appends candidates in call order.
#[derive(Clone, Debug)]
pub struct StateBuilder<S> {
    node: StateNode<S>,
}

impl<S> StateBuilder<S> {
    pub fn new() -> Self {
        Self {
            node: StateNode::default(),
        }
    }

    pub fn on(mut self, event: impl Into<String>, transition: TransitionBuilder<S>) -> Self {
        self.node
            .on
            .entry(event.into())
            .or_default()
            .push(transition.build());
        self
    }

    pub fn entry<T: Into<String>>(mut self, actions: impl IntoIterator<Item = T>) -> Self {
        self.node.entry.extend(actions.into_iter().map(Into::into));
        self
    }

    pub fn exit<T: Into<String>>(mut self, actions: impl IntoIterator<Item = T>) -> Self {
        self.node.exit.extend(actions.into_iter().map(Into::into));
        self
    }

    /// Attach an activity; accepts a name or a full [`ActivityDecl`].
    pub fn activity(mut self, activity: impl Into<ActivityDecl>) -> Self {
        self.node.activities.push(activity.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.node.tags.push(tag.into());
        self
    }

    pub fn build(self) -> StateNode<S> {
        self.node
    }
}

impl<S> Default for StateBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}
