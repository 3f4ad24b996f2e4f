//! Navigation Menu Machine
//!
//! This example drives the trigger logic of a navigation menu: focusing a
//! trigger, clicking it open, dismissing from outside, clicking it closed.
//!
//! Key concepts:
//! - Guarded transitions where the first passing candidate wins
//! - Computed context (`isExpanded`) and a watcher on `value`
//! - An activity that dismisses the menu by sending `CLOSE` later
//! - Top-level `on` handlers as a fallback
//!
//! Run with: RUST_LOG=headless_machine=debug cargo run --example nav_menu

use headless_machine::builder::{MachineBuilder, StateBuilder, TransitionBuilder};
use headless_machine::core::{Context, Event};
use headless_machine::effects::{Disposer, Implementation, Machine, MachineHandle};
use headless_machine::guards::not;
use headless_machine::state_enum;
use serde_json::Value;
use std::sync::{Arc, Mutex};

state_enum! {
    enum NavMenu {
        Idle,
        Focused,
        Open,
    }
}

fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}

fn main() {
    setup_logging();
    println!("=== Navigation Menu Machine ===\n");

    let definition = MachineBuilder::new()
        .id("nav-menu")
        .initial(NavMenu::Idle)
        .context("value", Value::Null)
        .context("previousValue", Value::Null)
        .computed("isExpanded", |ctx: &Context| {
            Value::Bool(!ctx.get("value").map_or(true, Value::is_null))
        })
        .watch("value", ["syncPreviousValue"])
        .on(
            "CLOSE",
            TransitionBuilder::to(NavMenu::Focused).action("collapseMenu"),
        )
        .state(
            NavMenu::Idle,
            StateBuilder::new().on("TRIGGER_FOCUS", TransitionBuilder::to(NavMenu::Focused)),
        )
        .state(
            NavMenu::Focused,
            StateBuilder::new()
                .on(
                    "TRIGGER_CLICK",
                    TransitionBuilder::internal()
                        .guard("isTriggerExpanded")
                        .action("collapseMenu"),
                )
                .on(
                    "TRIGGER_CLICK",
                    TransitionBuilder::to(NavMenu::Open)
                        .guard(not("isTriggerExpanded"))
                        .actions(["expandMenu", "focusMenu"]),
                )
                .on("TRIGGER_BLUR", TransitionBuilder::to(NavMenu::Idle)),
        )
        .state(
            NavMenu::Open,
            StateBuilder::new()
                .on(
                    "TRIGGER_CLICK",
                    TransitionBuilder::to(NavMenu::Focused)
                        .guard("isTriggerExpanded")
                        .action("collapseMenu"),
                )
                .activity("trackInteractOutside")
                .tag("expanded"),
        )
        .build()
        .unwrap();

    // The "document": whoever holds this handle can dismiss the menu.
    let outside: Arc<Mutex<Option<MachineHandle<NavMenu>>>> = Arc::new(Mutex::new(None));
    let listener = Arc::clone(&outside);

    let implementation = Implementation::new()
        .guard("isTriggerExpanded", |ctx: &Context, evt: &Event| {
            ctx.compute("isExpanded") == Some(Value::Bool(true))
                && ctx.get("value") == evt.get("id")
        })
        .action("expandMenu", |ctx, evt, _| {
            ctx.set("value", evt.get("id").cloned().unwrap_or(Value::Null));
            Ok(())
        })
        .action("collapseMenu", |ctx, _, _| {
            ctx.set("value", Value::Null);
            Ok(())
        })
        .action("focusMenu", |ctx, _, _| {
            println!("  focus -> menu {}", ctx.get("value").unwrap_or(&Value::Null));
            Ok(())
        })
        .action("syncPreviousValue", |ctx, _, helpers| {
            let previous = helpers
                .snapshot()
                .and_then(|s| s.context.get("value").cloned())
                .unwrap_or(Value::Null);
            ctx.set("previousValue", previous);
            Ok(())
        })
        .activity("trackInteractOutside", move |_, _, helpers| {
            println!("  attach pointerdown-outside listener");
            *listener.lock().unwrap() = Some(helpers.handle());
            let listener = Arc::clone(&listener);
            Ok(Some(Disposer::new(move || {
                println!("  detach pointerdown-outside listener");
                listener.lock().unwrap().take();
            })))
        });

    let machine = Machine::new(&definition, &implementation).unwrap();
    let _subscription = machine.subscribe(|snapshot| {
        println!(
            "state: {:?}, value: {}, expanded: {}",
            snapshot.value,
            snapshot.context.get("value").unwrap_or(&Value::Null),
            snapshot.matches("expanded")
        );
    });

    machine.start().unwrap();
    machine.send("TRIGGER_FOCUS").unwrap();

    println!("\nClick 'products':");
    machine
        .send(Event::new("TRIGGER_CLICK").with("id", "products"))
        .unwrap();

    println!("\nPointer down outside the menu:");
    let handle = outside.lock().unwrap().clone();
    if let Some(handle) = handle {
        handle.send("CLOSE").unwrap();
    }

    println!("\nClick 'products' twice:");
    let click = Event::new("TRIGGER_CLICK").with("id", "products");
    machine.send(click.clone()).unwrap();
    machine.send(click).unwrap();

    println!(
        "\nPrevious value: {}",
        machine.context().get("previousValue").unwrap_or(&Value::Null)
    );
    println!("Path: {:?}", machine.history().get_path());

    machine.stop();
    println!("Stopped, running activities: {:?}", machine.running_activities());
}
