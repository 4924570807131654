//! Host binary for the Delve colony simulation.
//!
//! Loads configuration, builds the demo colony, and runs the world on its
//! own thread until the tick limit is reached or the process receives
//! Ctrl-C.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `delve-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Build the demo colony
//! 4. Create operator state from simulation bounds
//! 5. Spawn the world thread and follow its change stream
//! 6. Wait for the run to end and log the final snapshot

mod colony;
mod error;

use std::path::Path;
use std::sync::Arc;

use delve_core::{DelveConfig, OperatorState, spawn_world_thread};
use delve_types::WorldChange;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

const CONFIG_PATH: &str = "delve-config.yaml";

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if any initialization step or the simulation itself fails.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // 1. Load configuration.
    let config = load_config()?;

    // 2. Initialize structured logging. RUST_LOG wins over the config level.
    let level = config.logging.level.clone();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(true)
        .init();

    info!(
        world_name = config.world.name,
        seed = config.world.seed,
        turn_mode = ?config.world.turn_mode,
        min_tick_interval_ms = config.world.min_tick_interval_ms,
        max_move_time_ms = config.world.max_move_time_ms,
        max_ticks = config.simulation.max_ticks,
        "delve-engine starting"
    );

    // 3. Build the demo colony.
    let colony = colony::build(&config)?;
    info!(
        dwarves = colony.dwarves.len(),
        animal = %colony.animal,
        workbenches = colony.workbenches.len(),
        "Colony ready"
    );

    // 4. Create operator state. Start paused so the logger sees tick one.
    let operator = Arc::new(OperatorState::from_config(&config));
    operator.pause();

    // 5. Spawn the world thread.
    let handle = spawn_world_thread(colony.world, Arc::clone(&operator))?;
    let logger = tokio::spawn(log_changes(handle.subscribe()));
    handle.resume();
    info!("World thread running");

    tokio::select! {
        () = handle.closed() => {}
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "Failed to listen for Ctrl-C");
            }
            info!("Stop requested");
            handle.stop();
        }
    }

    // 6. Report.
    let summary = handle.wait().await?;
    if let Err(e) = logger.await {
        warn!(error = %e, "Change logger task failed");
    }
    info!(
        end_reason = ?summary.end_reason,
        total_ticks = summary.total_ticks,
        elapsed_seconds = operator.elapsed_seconds(),
        "Simulation ended"
    );
    let snapshot = serde_json::to_string_pretty(&summary.final_snapshot)?;
    info!(snapshot = %snapshot, "Final world state");

    Ok(())
}

/// Load simulation configuration from `delve-config.yaml`, falling back to
/// defaults when the file does not exist.
fn load_config() -> Result<DelveConfig, EngineError> {
    let config_path = Path::new(CONFIG_PATH);
    if config_path.exists() {
        Ok(DelveConfig::from_file(config_path)?)
    } else {
        Ok(DelveConfig::default())
    }
}

/// Follow the change stream until the world thread closes it.
async fn log_changes(mut changes: broadcast::Receiver<WorldChange>) {
    loop {
        match changes.recv().await {
            Ok(WorldChange::EventLog(entry)) => {
                info!(tick = entry.tick, "{}", entry.message);
            }
            Ok(WorldChange::TickEnded { tick }) => debug!(tick, "Tick ended"),
            Ok(WorldChange::LivingRemoved { living }) => info!(%living, "Living left the world"),
            Ok(WorldChange::JobStatusChanged { job, status }) => {
                debug!(%job, ?status, "Job finished");
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Change logger lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}
