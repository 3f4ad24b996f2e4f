//! Guard predicates for selecting among competing transitions.
//!
//! A transition table refers to guards by name, optionally wrapped in the
//! `not` / `and` / `or` combinators ([`GuardExpr`]). Names are resolved
//! against the machine's implementation when the machine is constructed,
//! producing a [`Guard`]: a pure predicate over the context and the
//! incoming event.

use super::context::Context;
use super::event::Event;
use std::fmt;
use std::sync::Arc;

/// Pure predicate that decides whether a transition candidate applies.
///
/// # Example
///
/// ```rust
/// use headless_machine::core::{Context, Event, Guard};
///
/// let is_expanded = Guard::new(|ctx: &Context, evt: &Event| {
///     ctx.get("activeId").is_some() && ctx.get("activeId") == evt.get("id")
/// });
///
/// let mut ctx = Context::default();
/// ctx.set("activeId", "products");
///
/// assert!(is_expanded.check(&ctx, &Event::new("TRIGGER_CLICK").with("id", "products")));
/// assert!(!is_expanded.check(&ctx, &Event::new("TRIGGER_CLICK").with("id", "about")));
/// ```
#[derive(Clone)]
pub struct Guard {
    predicate: Arc<dyn Fn(&Context, &Event) -> bool + Send + Sync>,
}

impl Guard {
    /// Create a guard from a pure predicate function.
    ///
    /// The predicate must be deterministic and free of side effects; the
    /// engine may evaluate it for candidates that end up not being taken.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Context, &Event) -> bool + Send + Sync + 'static,
    {
        Guard {
            predicate: Arc::new(predicate),
        }
    }

    pub fn check(&self, context: &Context, event: &Event) -> bool {
        (self.predicate)(context, event)
    }

    pub fn negate(self) -> Self {
        Guard::new(move |ctx, evt| !self.check(ctx, evt))
    }

    /// Passes when every guard passes. An empty list always passes.
    pub fn all(guards: Vec<Guard>) -> Self {
        Guard::new(move |ctx, evt| guards.iter().all(|g| g.check(ctx, evt)))
    }

    /// Passes when any guard passes. An empty list never passes.
    pub fn any(guards: Vec<Guard>) -> Self {
        Guard::new(move |ctx, evt| guards.iter().any(|g| g.check(ctx, evt)))
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Guard(..)")
    }
}

/// Guard reference as written in a transition table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardExpr {
    Named(String),
    Not(Box<GuardExpr>),
    And(Vec<GuardExpr>),
    Or(Vec<GuardExpr>),
}

impl GuardExpr {
    /// Every guard name referenced by this expression, in declaration order.
    pub fn names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            GuardExpr::Named(name) => names.push(name),
            GuardExpr::Not(inner) => inner.collect_names(names),
            GuardExpr::And(items) | GuardExpr::Or(items) => {
                for item in items {
                    item.collect_names(names);
                }
            }
        }
    }

    /// Turn the expression into a predicate, looking up names with `lookup`.
    pub fn resolve<E>(&self, lookup: &impl Fn(&str) -> Result<Guard, E>) -> Result<Guard, E> {
        match self {
            GuardExpr::Named(name) => lookup(name),
            GuardExpr::Not(inner) => Ok(inner.resolve(lookup)?.negate()),
            GuardExpr::And(items) => Ok(Guard::all(
                items
                    .iter()
                    .map(|item| item.resolve(lookup))
                    .collect::<Result<_, _>>()?,
            )),
            GuardExpr::Or(items) => Ok(Guard::any(
                items
                    .iter()
                    .map(|item| item.resolve(lookup))
                    .collect::<Result<_, _>>()?,
            )),
        }
    }
}

impl From<&str> for GuardExpr {
    fn from(name: &str) -> Self {
        GuardExpr::Named(name.to_string())
    }
}

impl From<String> for GuardExpr {
    fn from(name: String) -> Self {
        GuardExpr::Named(name)
    }
}

impl fmt::Display for GuardExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, op: &str, items: &[GuardExpr]) -> fmt::Result {
            write!(f, "{op}(")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{item}")?;
            }
            f.write_str(")")
        }

        match self {
            GuardExpr::Named(name) => f.write_str(name),
            GuardExpr::Not(inner) => write!(f, "not({inner})"),
            GuardExpr::And(items) => list(f, "and", items),
            GuardExpr::Or(items) => list(f, "or", items),
        }
    }
}

/// Negate a guard: `not("isExpanded")`.
pub fn not(expr: impl Into<GuardExpr>) -> GuardExpr {
    GuardExpr::Not(Box::new(expr.into()))
}

/// All guards must pass: `and([not("multiple"), "hasSelectedItems".into()])`.
pub fn and<T: Into<GuardExpr>>(exprs: impl IntoIterator<Item = T>) -> GuardExpr {
    GuardExpr::And(exprs.into_iter().map(Into::into).collect())
}

/// Any guard may pass: `or(["isTriggerArrowDownEvent", "isTriggerEnterEvent"])`.
pub fn or<T: Into<GuardExpr>>(exprs: impl IntoIterator<Item = T>) -> GuardExpr {
    GuardExpr::Or(exprs.into_iter().map(Into::into).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn table() -> HashMap<&'static str, Guard> {
        let mut guards = HashMap::new();
        guards.insert(
            "multiple",
            Guard::new(|ctx: &Context, _: &Event| ctx.get_as::<bool>("multiple") == Some(true)),
        );
        guards.insert(
            "hasSelectedItems",
            Guard::new(|ctx: &Context, _: &Event| {
                ctx.get_as::<Vec<String>>("value")
                    .is_some_and(|v| !v.is_empty())
            }),
        );
        guards
    }

    fn resolve(expr: &GuardExpr) -> Result<Guard, String> {
        let guards = table();
        expr.resolve(&|name: &str| {
            guards
                .get(name)
                .cloned()
                .ok_or_else(|| format!("unknown guard {name}"))
        })
    }

    fn ctx(multiple: bool, value: &[&str]) -> Context {
        let mut ctx = Context::default();
        ctx.set("multiple", multiple);
        ctx.set("value", serde_json::json!(value));
        ctx
    }

    #[test]
    fn guard_reads_context_and_event() {
        let guard = Guard::new(|_: &Context, evt: &Event| evt.kind() == "OPEN");
        let ctx = Context::default();

        assert!(guard.check(&ctx, &Event::new("OPEN")));
        assert!(!guard.check(&ctx, &Event::new("CLOSE")));
    }

    #[test]
    fn nested_combinators_compose() {
        let expr = and([not("multiple"), "hasSelectedItems".into()]);
        let guard = resolve(&expr).unwrap();
        let evt = Event::new("TRIGGER.ARROW_LEFT");

        assert!(guard.check(&ctx(false, &["a"]), &evt));
        assert!(!guard.check(&ctx(true, &["a"]), &evt));
        assert!(!guard.check(&ctx(false, &[]), &evt));
    }

    #[test]
    fn or_passes_when_any_passes() {
        let guard = resolve(&or(["multiple", "hasSelectedItems"])).unwrap();
        let evt = Event::new("X");

        assert!(guard.check(&ctx(true, &[]), &evt));
        assert!(guard.check(&ctx(false, &["a"]), &evt));
        assert!(!guard.check(&ctx(false, &[]), &evt));
    }

    #[test]
    fn unknown_names_fail_resolution() {
        let result = resolve(&and(["multiple", "isOpen"]));
        assert_eq!(result.unwrap_err(), "unknown guard isOpen");
    }

    #[test]
    fn names_lists_every_reference() {
        let expr = or([and([not("a"), "b".into()]), "c".into()]);
        assert_eq!(expr.names(), vec!["a", "b", "c"]);
        assert_eq!(expr.to_string(), "or(and(not(a), b), c)");
    }

    #[test]
    fn guard_is_deterministic() {
        let guard = resolve(&"hasSelectedItems".into()).unwrap();
        let ctx = ctx(false, &["a"]);
        let evt = Event::new("X");
        assert_eq!(guard.check(&ctx, &evt), guard.check(&ctx, &evt));
    }
}
