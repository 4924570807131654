//! The dedicated world thread.
//!
//! [`spawn_world_thread`] moves a [`World`] onto its own OS thread running
//! a single-threaded tokio runtime. The loop there:
//!
//! - **Pause/resume**: parks while the operator has paused the simulation
//! - **Invokes**: closures sent through the [`WorldHandle`] run before the
//!   next scheduler step
//! - **Change stream**: every [`WorldChange`] is broadcast, and a fresh
//!   [`WorldSnapshot`] is published at the end of each tick
//! - **Bounded runs**: stops after `max_ticks` or on operator request
//!
//! Between steps the loop sleeps until the world's next deadline or until
//! something wakes it (an invoke, a resume, a stop).

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use delve_types::WorldChange;
use tokio::sync::{Notify, RwLock, broadcast, mpsc, oneshot, watch};
use tracing::{debug, error, info};

use crate::operator::{OperatorState, SimulationEndReason};
use crate::world::{Invoke, TickError, World, WorldSnapshot};

/// Capacity of the change broadcast channel. Slow subscribers lag and skip
/// older changes.
pub const CHANGE_CHANNEL_CAPACITY: usize = 1024;

/// Name of the world thread.
pub const WORLD_THREAD_NAME: &str = "delve-world";

/// Errors that can occur while running the world thread.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A scheduler step failed.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: TickError,
    },

    /// The thread or its runtime could not be started.
    #[error("failed to start world thread: {source}")]
    Spawn {
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The world thread panicked.
    #[error("world thread panicked")]
    ThreadPanicked,

    /// The world thread is no longer running.
    #[error("world thread has exited")]
    Closed,
}

/// Result of a world thread run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// The reason the simulation ended.
    pub end_reason: SimulationEndReason,
    /// Number of ticks completed by this run.
    pub total_ticks: u64,
    /// The world as it was when the loop stopped.
    pub final_snapshot: WorldSnapshot,
}

/// Handle to a world running on its own thread.
#[derive(Debug)]
pub struct WorldHandle {
    world: Arc<RwLock<World>>,
    invokes: mpsc::UnboundedSender<Invoke>,
    wake: Arc<Notify>,
    changes: broadcast::Sender<WorldChange>,
    snapshot: watch::Receiver<WorldSnapshot>,
    operator: Arc<OperatorState>,
    done: oneshot::Receiver<Result<RunSummary, RunnerError>>,
    thread: JoinHandle<()>,
}

impl WorldHandle {
    /// Run `f` against the world before its next scheduler step.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Closed`] if the world thread has exited.
    pub fn invoke(&self, f: impl FnOnce(&mut World) + Send + Sync + 'static) -> Result<(), RunnerError> {
        self.invokes
            .send(Box::new(f))
            .map_err(|_closed| RunnerError::Closed)?;
        self.wake.notify_one();
        Ok(())
    }

    /// Read the world under its lock.
    pub async fn read<R>(&self, f: impl FnOnce(&World) -> R) -> R {
        let world = self.world.read().await;
        f(&world)
    }

    /// Subscribe to the change stream.
    pub fn subscribe(&self) -> broadcast::Receiver<WorldChange> {
        self.changes.subscribe()
    }

    /// The snapshot published at the end of the latest tick.
    pub fn snapshot(&self) -> WorldSnapshot {
        self.snapshot.borrow().clone()
    }

    /// A receiver notified whenever a new snapshot is published.
    pub fn watch_snapshot(&self) -> watch::Receiver<WorldSnapshot> {
        self.snapshot.clone()
    }

    /// The shared operator controls.
    pub const fn operator(&self) -> &Arc<OperatorState> {
        &self.operator
    }

    /// Pause ticking. Invokes queue up until resumed.
    pub fn pause(&self) {
        self.operator.pause();
    }

    /// Resume ticking.
    pub fn resume(&self) {
        self.operator.resume();
        self.wake.notify_one();
    }

    /// Ask the loop to stop after its current step.
    pub fn stop(&self) {
        self.operator.request_stop();
        self.operator.resume();
        self.wake.notify_one();
    }

    /// Resolves once the world loop has exited.
    pub async fn closed(&self) {
        self.invokes.closed().await;
    }

    /// Wait for the world thread to finish.
    ///
    /// # Errors
    ///
    /// Returns the loop's error, or [`RunnerError::ThreadPanicked`] if the
    /// thread died.
    pub async fn wait(self) -> Result<RunSummary, RunnerError> {
        let result = self.done.await;
        if self.thread.join().is_err() {
            return Err(RunnerError::ThreadPanicked);
        }
        result.map_err(|_closed| RunnerError::Closed)?
    }
}

/// Start `world` on a dedicated thread.
///
/// # Errors
///
/// Returns [`RunnerError::Spawn`] if the OS refuses to create the thread.
pub fn spawn_world_thread(world: World, operator: Arc<OperatorState>) -> Result<WorldHandle, RunnerError> {
    let (snapshot_tx, snapshot_rx) = watch::channel(world.snapshot());
    let world = Arc::new(RwLock::new(world));
    let (invoke_tx, invoke_rx) = mpsc::unbounded_channel();
    let wake = Arc::new(Notify::new());
    let (changes_tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
    let (done_tx, done_rx) = oneshot::channel();

    let channels = LoopChannels {
        invokes: invoke_rx,
        wake: Arc::clone(&wake),
        changes: changes_tx.clone(),
        snapshot: snapshot_tx,
    };
    let thread_world = Arc::clone(&world);
    let thread_operator = Arc::clone(&operator);
    let thread = std::thread::Builder::new()
        .name(WORLD_THREAD_NAME.to_owned())
        .spawn(move || {
            let result = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|source| RunnerError::Spawn { source })
                .and_then(|runtime| runtime.block_on(run_loop(&thread_world, &thread_operator, channels)));
            if let Err(err) = &result {
                error!(error = %err, "World thread failed");
            }
            // The handle may already be gone.
            done_tx.send(result).ok();
        })
        .map_err(|source| RunnerError::Spawn { source })?;

    Ok(WorldHandle {
        world,
        invokes: invoke_tx,
        wake,
        changes: changes_tx,
        snapshot: snapshot_rx,
        operator,
        done: done_rx,
        thread,
    })
}

struct LoopChannels {
    invokes: mpsc::UnboundedReceiver<Invoke>,
    wake: Arc<Notify>,
    changes: broadcast::Sender<WorldChange>,
    snapshot: watch::Sender<WorldSnapshot>,
}

async fn run_loop(
    world: &RwLock<World>,
    operator: &OperatorState,
    mut channels: LoopChannels,
) -> Result<RunSummary, RunnerError> {
    let mut total_ticks: u64 = 0;

    info!(
        max_ticks = operator.max_ticks(),
        min_tick_interval_ms = operator.min_tick_interval_ms(),
        "World thread starting"
    );

    let end_reason = loop {
        // --- Check pause ---
        if operator.is_paused() {
            info!("Simulation paused, waiting for resume...");
            operator.wait_if_paused().await;
            info!("Simulation resumed");
        }

        // --- Check stop request ---
        if operator.is_stop_requested() {
            info!("Operator stop requested");
            break SimulationEndReason::OperatorStop;
        }

        // --- Step the world ---
        let (result, limit_reached) = {
            let mut world = world.write().await;
            while let Ok(invoke) = channels.invokes.try_recv() {
                world.queue_invoke(invoke);
            }
            world.set_min_tick_interval(operator.min_tick_interval());
            let result = world.work(Instant::now())?;

            let mut limit_reached = false;
            for change in world.take_changes() {
                if let WorldChange::TickEnded { tick } = change {
                    total_ticks = total_ticks.saturating_add(1);
                    channels.snapshot.send_replace(world.snapshot());
                    limit_reached |= operator.tick_limit_reached(tick);
                }
                // No subscribers is fine.
                channels.changes.send(change).ok();
            }
            (result, limit_reached)
        };

        if limit_reached {
            info!(total_ticks, "Tick limit reached");
            break SimulationEndReason::MaxTicksReached;
        }
        if result.progressed {
            tokio::task::yield_now().await;
            continue;
        }

        // --- Sleep until the next deadline or a wake-up ---
        match result.next_deadline {
            Some(deadline) => {
                debug!("World waiting for deadline");
                tokio::select! {
                    () = channels.wake.notified() => {}
                    () = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => {}
                }
            }
            None => channels.wake.notified().await,
        }
    };

    let final_snapshot = world.read().await.snapshot();
    channels.snapshot.send_replace(final_snapshot.clone());
    info!(?end_reason, total_ticks, "World thread finished");
    Ok(RunSummary {
        end_reason,
        total_ticks,
        final_snapshot,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use delve_jobs::JobTuning;
    use delve_types::{IntBox, IntSize3, IntVector3, LivingKind, MaterialId, TurnMode};
    use delve_world::{Environment, TileData};

    use super::*;
    use crate::ai::Ai;
    use crate::living::Living;
    use crate::world::WorldOptions;

    fn world() -> World {
        let mut env = Environment::new(IntSize3::new(8, 8, 1));
        env.fill(
            IntBox::from_corners(IntVector3::new(0, 0, 0), IntVector3::new(7, 7, 0)),
            TileData::floor(MaterialId::Granite),
        )
        .unwrap();
        env.drain_events();
        World::new(
            env,
            WorldOptions {
                turn_mode: TurnMode::Simultaneous,
                min_tick_interval: Duration::ZERO,
                max_move_time: Duration::from_millis(10),
                require_connected_user: false,
                tuning: JobTuning::default(),
            },
        )
    }

    #[tokio::test]
    async fn runs_until_tick_limit() {
        let mut world = world();
        world
            .add_living(
                Living::new("Urist", LivingKind::Dwarf, Ai::dwarf_work()),
                IntVector3::new(1, 1, 0),
            )
            .unwrap();
        let operator = Arc::new(OperatorState::new(0, 5));
        operator.pause();
        let handle = spawn_world_thread(world, Arc::clone(&operator)).unwrap();
        let mut changes = handle.subscribe();
        handle.resume();

        let summary = handle.wait().await.unwrap();
        assert_eq!(summary.end_reason, SimulationEndReason::MaxTicksReached);
        assert_eq!(summary.total_ticks, 5);
        assert_eq!(summary.final_snapshot.tick, 5);
        assert_eq!(summary.final_snapshot.livings.len(), 1);

        let mut ended = 0;
        while let Ok(change) = changes.try_recv() {
            if matches!(change, WorldChange::TickEnded { .. }) {
                ended += 1;
            }
        }
        assert_eq!(ended, 5);
    }

    #[tokio::test]
    async fn operator_stop_ends_the_run() {
        let operator = Arc::new(OperatorState::new(20, 0));
        let handle = spawn_world_thread(world(), Arc::clone(&operator)).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.stop();

        let summary = tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.end_reason, SimulationEndReason::OperatorStop);
    }

    #[tokio::test]
    async fn invokes_queued_while_paused_run_first() {
        let operator = Arc::new(OperatorState::new(0, 2));
        operator.pause();
        let handle = spawn_world_thread(world(), Arc::clone(&operator)).unwrap();
        handle
            .invoke(|world| {
                world
                    .add_living(
                        Living::new("Cat", LivingKind::Animal, Ai::wander(3)),
                        IntVector3::new(4, 4, 0),
                    )
                    .ok();
            })
            .unwrap();
        handle.resume();

        let summary = handle.wait().await.unwrap();
        assert_eq!(summary.total_ticks, 2);
        assert_eq!(summary.final_snapshot.livings.len(), 1);
    }

    #[tokio::test]
    async fn read_sees_the_live_world() {
        let operator = Arc::new(OperatorState::new(0, 0));
        operator.pause();
        let handle = spawn_world_thread(world(), Arc::clone(&operator)).unwrap();
        let tick = handle.read(World::tick).await;
        assert_eq!(tick, 0);
        assert_eq!(handle.snapshot().tick, 0);
        handle.stop();
        let summary = handle.wait().await.unwrap();
        assert_eq!(summary.end_reason, SimulationEndReason::OperatorStop);
    }
}
