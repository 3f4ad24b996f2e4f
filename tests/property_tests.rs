//! Property-based tests for the machine runtime.
//!
//! These tests use proptest to drive machines with random event sequences
//! and check the invariants that must hold after every step.

use headless_machine::builder::{ActivityDecl, MachineDefinition};
use headless_machine::core::{Context, Event, State};
use headless_machine::effects::{Disposer, EffectError, Helpers, Implementation, Machine};
use headless_machine::{MachineBuilder, StateBuilder, TransitionBuilder};
use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
enum Menu {
    Idle,
    Focused,
    Open,
}

impl State for Menu {
    fn name(&self) -> &str {
        match self {
            Self::Idle => "idle",
            Self::Focused => "focused",
            Self::Open => "open",
        }
    }
}

const EVENTS: [&str; 8] = [
    "FOCUS", "BLUR", "OPEN", "CLOSE", "TOGGLE", "FLIP", "REENTER", "NOOP",
];

/// (started, disposed) per activity name.
type Ledger = Arc<Mutex<HashMap<String, (usize, usize)>>>;

fn menu_definition(history_limit: usize) -> MachineDefinition<Menu> {
    MachineBuilder::new()
        .id("menu")
        .initial(Menu::Idle)
        .context("placement", "bottom")
        .activity("trackFormControl")
        .on("TOGGLE", TransitionBuilder::to(Menu::Open))
        .on("BLUR", TransitionBuilder::to(Menu::Idle))
        .state(
            Menu::Idle,
            StateBuilder::new().on("FOCUS", TransitionBuilder::to(Menu::Focused)),
        )
        .state(
            Menu::Focused,
            StateBuilder::new()
                .on("OPEN", TransitionBuilder::to(Menu::Open))
                .on("FOCUS", TransitionBuilder::to(Menu::Focused))
                .activity("trackFocusVisible"),
        )
        .state(
            Menu::Open,
            StateBuilder::new()
                .on("CLOSE", TransitionBuilder::to(Menu::Focused))
                .on("TOGGLE", TransitionBuilder::to(Menu::Focused))
                .on("FLIP", TransitionBuilder::internal().action("flipPlacement"))
                .on("REENTER", TransitionBuilder::to(Menu::Open).reenter())
                .activity(ActivityDecl::new("trackPositioning").restart_on(["placement"]))
                .activity("trackInteractOutside"),
        )
        .history_limit(history_limit)
        .build()
        .unwrap()
}

fn tracked(
    ledger: &Ledger,
    name: &'static str,
) -> impl Fn(&mut Context, &Event, &Helpers<'_, Menu>) -> Result<Option<Disposer>, EffectError>
       + Send
       + Sync
       + 'static {
    let ledger = Arc::clone(ledger);
    move |_: &mut Context, _: &Event, _: &Helpers<'_, Menu>| {
        ledger.lock().unwrap().entry(name.to_string()).or_default().0 += 1;
        let ledger = Arc::clone(&ledger);
        Ok(Some(Disposer::new(move || {
            ledger.lock().unwrap().entry(name.to_string()).or_default().1 += 1;
        })))
    }
}

fn menu_implementation(ledger: &Ledger) -> Implementation<Menu> {
    Implementation::new()
        .action("flipPlacement", |ctx, _, _| {
            let next = match ctx.get_as::<String>("placement").as_deref() {
                Some("bottom") => "top",
                _ => "bottom",
            };
            ctx.set("placement", next);
            Ok(())
        })
        .activity("trackFormControl", tracked(ledger, "trackFormControl"))
        .activity("trackFocusVisible", tracked(ledger, "trackFocusVisible"))
        .activity("trackPositioning", tracked(ledger, "trackPositioning"))
        .activity("trackInteractOutside", tracked(ledger, "trackInteractOutside"))
}

fn expected_activities(definition: &MachineDefinition<Menu>, state: &Menu) -> Vec<String> {
    let mut names: Vec<String> = definition
        .activities()
        .iter()
        .chain(definition.state(state.name()).unwrap().activities.iter())
        .map(|decl| decl.name.clone())
        .collect();
    names.sort();
    names
}

fn fields(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

prop_compose! {
    fn arbitrary_event()(index in 0..EVENTS.len()) -> &'static str {
        EVENTS[index]
    }
}

proptest! {
    #[test]
    fn current_state_is_always_declared(events in prop::collection::vec(arbitrary_event(), 0..40)) {
        let ledger = Ledger::default();
        let definition = menu_definition(16);
        let machine = Machine::new(&definition, &menu_implementation(&ledger)).unwrap();
        machine.start().unwrap();

        for event in events {
            machine.send(event).unwrap();
            prop_assert!(definition.declares(&machine.state()));
        }
    }

    #[test]
    fn running_activities_match_declared_activities(
        events in prop::collection::vec(arbitrary_event(), 0..40)
    ) {
        let ledger = Ledger::default();
        let definition = menu_definition(16);
        let machine = Machine::new(&definition, &menu_implementation(&ledger)).unwrap();
        machine.start().unwrap();

        for event in events {
            machine.send(event).unwrap();
            let mut running = machine.running_activities();
            running.sort();
            prop_assert_eq!(running, expected_activities(&definition, &machine.state()));
        }

        machine.stop();
        prop_assert!(machine.running_activities().is_empty());
        for (name, (started, disposed)) in ledger.lock().unwrap().iter() {
            prop_assert_eq!(started, disposed, "activity {} leaked or double-disposed", name);
        }
    }

    #[test]
    fn history_never_exceeds_its_limit(
        limit in 0usize..8,
        events in prop::collection::vec(arbitrary_event(), 0..40)
    ) {
        let ledger = Ledger::default();
        let machine = Machine::new(&menu_definition(limit), &menu_implementation(&ledger)).unwrap();
        machine.start().unwrap();

        for event in events {
            machine.send(event).unwrap();
        }

        let history = machine.history();
        prop_assert!(history.len() <= limit);
        if let Some(last) = history.last() {
            prop_assert_eq!(&last.to, &machine.state());
        }
    }

    #[test]
    fn first_passing_guard_wins(n in -3i64..8) {
        #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
        struct Picker;

        impl State for Picker {
            fn name(&self) -> &str {
                "idle"
            }
        }

        let definition = MachineBuilder::new()
            .initial(Picker)
            .context("n", n)
            .state(
                Picker,
                StateBuilder::new()
                    .on("PICK", TransitionBuilder::internal().guard("atLeast3").action("pick3"))
                    .on("PICK", TransitionBuilder::internal().guard("atLeast1").action("pick1"))
                    .on("PICK", TransitionBuilder::internal().action("pick0")),
            )
            .build()
            .unwrap();

        let at_least = |min: i64| move |ctx: &Context, _: &Event| ctx.get_as::<i64>("n").unwrap_or(0) >= min;
        let pick = |value: i64| {
            move |ctx: &mut Context, _: &Event, _: &Helpers<'_, Picker>| {
                ctx.set("picked", value);
                Ok::<(), EffectError>(())
            }
        };
        let implementation = Implementation::new()
            .guard("atLeast3", at_least(3))
            .guard("atLeast1", at_least(1))
            .action("pick3", pick(3))
            .action("pick1", pick(1))
            .action("pick0", pick(0));

        let machine = Machine::new(&definition, &implementation).unwrap();
        machine.start().unwrap();
        machine.send("PICK").unwrap();

        let expected = if n >= 3 { 3 } else if n >= 1 { 1 } else { 0 };
        prop_assert_eq!(machine.context().get_as::<i64>("picked"), Some(expected));
    }

    #[test]
    fn equal_writes_are_silent(value in any::<i32>(), label in "[a-z]{0,8}") {
        #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
        struct Field;

        impl State for Field {
            fn name(&self) -> &str {
                "idle"
            }
        }

        let definition = MachineBuilder::new()
            .initial(Field)
            .context("value", json!({ "n": 0, "label": "" }))
            .context("watchCount", 0)
            .watch("value", ["countWatch"])
            .state(Field, StateBuilder::new())
            .build()
            .unwrap();
        let implementation = Implementation::new().action("countWatch", |ctx, _, _| {
            let count = ctx.get_as::<i64>("watchCount").unwrap_or(0);
            ctx.set("watchCount", count + 1);
            Ok(())
        });

        let machine = Machine::new(&definition, &implementation).unwrap();
        machine.start().unwrap();
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notified);
        let _subscription = machine.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let update = fields(json!({ "value": { "n": value, "label": label } }));
        machine.set_context(update.clone()).unwrap();
        let after_first = (
            machine.context().revision(),
            machine.context().get_as::<i64>("watchCount"),
            notified.load(Ordering::SeqCst),
        );

        machine.set_context(update).unwrap();
        prop_assert_eq!(
            (
                machine.context().revision(),
                machine.context().get_as::<i64>("watchCount"),
                notified.load(Ordering::SeqCst),
            ),
            after_first
        );
    }
}
