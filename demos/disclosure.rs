//! Disclosure Machine with Deferred Activities and Checkpoints
//!
//! A disclosure (collapsible panel) measures its content on the frame after
//! it opens. Frames are pumped by hand with a `FrameQueue`, the way a host
//! would from its render loop.
//!
//! Key concepts:
//! - Initial state picked from the instance context (`open: true`)
//! - Deferred activity started on the next frame, cancelled if closed first
//! - Checkpoint to JSON and resume
//!
//! Run with: RUST_LOG=headless_machine=trace cargo run --example disclosure

use headless_machine::builder::{ActivityDecl, MachineBuilder, StateBuilder, TransitionBuilder};
use headless_machine::checkpoint::Checkpoint;
use headless_machine::core::Context;
use headless_machine::effects::{Disposer, FrameQueue, Implementation, Machine};
use headless_machine::state_enum;
use serde_json::{json, Map};

state_enum! {
    enum Disclosure {
        Closed,
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
    println!("=== Disclosure Machine ===\n");

    let definition = MachineBuilder::new()
        .id("disclosure")
        .initial_with(|ctx: &Context| {
            if ctx.get_as::<bool>("open").unwrap_or(false) {
                Disclosure::Open
            } else {
                Disclosure::Closed
            }
        })
        .context("open", false)
        .context("height", 0)
        .state(
            Disclosure::Closed,
            StateBuilder::new().on("TOGGLE", TransitionBuilder::to(Disclosure::Open)),
        )
        .state(
            Disclosure::Open,
            StateBuilder::new()
                .on("TOGGLE", TransitionBuilder::to(Disclosure::Closed))
                .activity(ActivityDecl::new("measureContent").deferred())
                .tag("expanded"),
        )
        .build()
        .unwrap();

    let frames = FrameQueue::new();
    let implementation = Implementation::new()
        .activity("measureContent", |ctx, _, _| {
            println!("  measuring content");
            ctx.set("height", 240);
            Ok(Some(Disposer::new(|| println!("  stop observing resize"))))
        })
        .scheduler(frames.clone());

    let mut overrides = Map::new();
    overrides.insert("open".to_string(), json!(true));
    let machine = Machine::with_context(&definition, &implementation, overrides).unwrap();
    machine.start().unwrap();
    println!("Started in {:?}, pending frames: {}", machine.state(), frames.pending());

    frames.flush();
    println!(
        "After frame: height = {}",
        machine.context().get_as::<i64>("height").unwrap_or(0)
    );

    println!("\nToggle closed, then open and closed within one frame:");
    machine.send("TOGGLE").unwrap();
    machine.send("TOGGLE").unwrap();
    machine.send("TOGGLE").unwrap();
    println!("Frames run: {}", frames.flush());

    println!("\nCheckpoint while open:");
    machine.send("TOGGLE").unwrap();
    frames.flush();
    let json = machine.checkpoint().to_json().unwrap();
    println!("{json}");
    machine.stop();

    let checkpoint = Checkpoint::<Disclosure>::from_json(&json).unwrap();
    let resumed = Machine::resume(&definition, &implementation, checkpoint).unwrap();
    resumed.start().unwrap();
    frames.flush();
    let snapshot = resumed.snapshot();
    println!(
        "\nResumed in {:?} (expanded: {}), transitions remembered: {}",
        snapshot.value,
        snapshot.matches("expanded"),
        resumed.history().len()
    );
}
