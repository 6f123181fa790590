//! arec - input macro CLI
//!
//! Subcommands:
//! - `arec record [NAME]` - record until Ctrl-C
//! - `arec play <NAME>` - replay a stored macro
//! - `arec list` / `arec show <NAME>` / `arec delete <NAME>`
//! - `arec schedule add|list|delete` - manage daily triggers
//! - `arec run` - scheduler plus recording hotkey, until Ctrl-C

use anyhow::{anyhow, Context, Result};
use autorec_core::prelude::*;
use clap::{Parser, Subcommand};
use crossbeam_channel::Receiver;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "arec")]
#[command(about = "Record, replay and schedule desktop input macros")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a macro until Ctrl-C (or the F8 hotkey in `run` mode)
    Record {
        /// Macro name; defaults to a timestamp
        name: Option<String>,
    },
    /// Replay a stored macro with its recorded timing
    Play { name: String },
    /// List stored macros
    List,
    /// Print a stored macro as JSON
    Show { name: String },
    /// Delete a macro and any schedule entries referencing it
    Delete { name: String },
    /// Manage daily wall-clock triggers
    Schedule {
        #[command(subcommand)]
        command: ScheduleCommands,
    },
    /// Run the scheduler and the recording hotkey until Ctrl-C
    Run,
}

#[derive(Subcommand)]
enum ScheduleCommands {
    /// Fire a macro every day at HH:MM
    Add { name: String, time: String },
    List,
    Delete { id: String },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let (engine, notifications) = MacroEngine::new(EngineConfig::default())?;

    match cli.command {
        Commands::Record { name } => record(&engine, &notifications, name),
        Commands::Play { name } => play(&engine, &notifications, &name),
        Commands::List => list(&engine),
        Commands::Show { name } => show(&engine, &name),
        Commands::Delete { name } => delete(&engine, &name),
        Commands::Schedule { command } => schedule(&engine, command),
        Commands::Run => run(&engine, &notifications),
    }
}

/// Map a user-facing name to a store locator. Exact locators pass
/// through untouched.
fn resolve(engine: &MacroEngine, name: &str) -> Result<String> {
    let summaries = engine.list_macros()?;
    summaries
        .iter()
        .find(|s| s.locator == name || s.name == name)
        .map(|s| s.locator.clone())
        .ok_or_else(|| anyhow!("no macro named '{}'", name))
}

fn interrupt_flag() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("could not install Ctrl-C handler")?;
    Ok(running)
}

fn record(
    engine: &Arc<MacroEngine>,
    notifications: &Receiver<Notification>,
    name: Option<String>,
) -> Result<()> {
    let running = interrupt_flag()?;
    match name {
        Some(name) => engine.start_recording(name)?,
        None => engine.toggle_recording()?,
    }
    println!("recording... press Ctrl-C to stop");

    while running.load(Ordering::SeqCst) {
        drain(notifications);
        std::thread::sleep(Duration::from_millis(100));
    }
    match engine.stop_recording()? {
        Some(locator) => println!("saved {}", locator),
        None => println!("nothing captured, no macro saved"),
    }
    Ok(())
}

fn play(
    engine: &Arc<MacroEngine>,
    notifications: &Receiver<Notification>,
    name: &str,
) -> Result<()> {
    let locator = resolve(engine, name)?;
    let running = interrupt_flag()?;
    let handle = engine.play(&locator);

    loop {
        if !running.load(Ordering::SeqCst) {
            handle.cancel();
        }
        match notifications.recv_timeout(Duration::from_millis(100)) {
            Ok(Notification::PlaybackFinished { name }) => {
                println!("'{}' finished", name);
                return Ok(());
            }
            Ok(Notification::PlaybackFailed { name, reason }) => {
                return Err(anyhow!("'{}' failed: {}", name, reason));
            }
            Ok(Notification::Progress { name, percent }) => {
                println!("'{}' {}%", name, percent);
            }
            Ok(Notification::Status(text)) => println!("{}", text),
            Ok(Notification::ListChanged) => {}
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                if !running.load(Ordering::SeqCst) {
                    // Cancelled; the stop status arrives shortly, but do
                    // not hang if the playback thread already exited.
                    std::thread::sleep(Duration::from_millis(200));
                    drain(notifications);
                    println!("stopped");
                    return Ok(());
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => return Ok(()),
        }
    }
}

fn list(engine: &Arc<MacroEngine>) -> Result<()> {
    let mut summaries = engine.list_macros()?;
    if summaries.is_empty() {
        println!("no macros stored");
        return Ok(());
    }
    summaries.sort_by(|a, b| a.name.cmp(&b.name));
    for s in summaries {
        println!("{:<30} {:<20} {}", s.name, s.created, s.locator);
    }
    Ok(())
}

fn show(engine: &Arc<MacroEngine>, name: &str) -> Result<()> {
    let locator = resolve(engine, name)?;
    let artifact = engine.read_macro(&locator)?;
    println!("{}", serde_json::to_string_pretty(&artifact)?);
    Ok(())
}

fn delete(engine: &Arc<MacroEngine>, name: &str) -> Result<()> {
    let locator = resolve(engine, name)?;
    if engine.delete_macro(&locator)? {
        println!("deleted {}", locator);
    }
    Ok(())
}

fn schedule(engine: &Arc<MacroEngine>, command: ScheduleCommands) -> Result<()> {
    match command {
        ScheduleCommands::Add { name, time } => {
            // Catch the dangling reference up front; the scheduler would
            // only skip it with a warning later.
            resolve(engine, &name)?;
            let entry = engine.add_schedule(name, &time)?;
            println!("scheduled '{}' daily at {} (id {})", entry.macro_name, entry.time, entry.id);
        }
        ScheduleCommands::List => {
            let entries = engine.list_schedules();
            if entries.is_empty() {
                println!("no schedule entries");
            }
            for e in entries {
                println!("{}  {}  {}", e.id, e.time, e.macro_name);
            }
        }
        ScheduleCommands::Delete { id } => {
            if engine.delete_schedule(&id)? {
                println!("deleted {}", id);
            } else {
                return Err(anyhow!("no schedule entry with id '{}'", id));
            }
        }
    }
    Ok(())
}

fn run(engine: &Arc<MacroEngine>, notifications: &Receiver<Notification>) -> Result<()> {
    let running = interrupt_flag()?;
    engine.start_scheduler();
    let hotkey = engine.start_hotkey_listener();
    println!("scheduler running; press {} to toggle recording, Ctrl-C to exit", RESERVED_TOGGLE_KEY);

    while running.load(Ordering::SeqCst) {
        drain(notifications);
        std::thread::sleep(Duration::from_millis(100));
    }

    hotkey.stop();
    if engine.is_recording() {
        engine.stop_recording()?;
    }
    engine.stop_scheduler();
    drain(notifications);
    Ok(())
}

/// Print whatever the engine has queued without blocking.
fn drain(notifications: &Receiver<Notification>) {
    while let Ok(n) = notifications.try_recv() {
        match n {
            Notification::Status(text) => println!("{}", text),
            Notification::Progress { name, percent } => println!("'{}' {}%", name, percent),
            Notification::PlaybackFinished { name } => println!("'{}' finished", name),
            Notification::PlaybackFailed { name, reason } => {
                eprintln!("'{}' failed: {}", name, reason)
            }
            Notification::ListChanged => {}
        }
    }
}
