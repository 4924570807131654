//! Run controls for the world thread.
//!
//! The host flips these flags from any thread; the world loop polls them
//! between steps. Nothing here touches the world lock.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::config::DelveConfig;

/// Why the world loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationEndReason {
    /// The tick bound from `simulation.max_ticks` was hit.
    MaxTicksReached,
    /// [`OperatorState::request_stop`] was called.
    OperatorStop,
}

/// Pause, stop and pacing controls shared with the world loop.
#[derive(Debug)]
pub struct OperatorState {
    paused: AtomicBool,
    stopping: AtomicBool,
    /// Woken on resume so a paused loop re-checks its flags.
    unpaused: Notify,
    min_tick_interval_ms: AtomicU64,
    /// 0 means run forever.
    max_ticks: u64,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl OperatorState {
    /// Controls for a running (not paused) world.
    pub fn new(min_tick_interval_ms: u64, max_ticks: u64) -> Self {
        Self {
            paused: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
            unpaused: Notify::new(),
            min_tick_interval_ms: AtomicU64::new(min_tick_interval_ms),
            max_ticks,
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    /// Controls seeded from `world.min_tick_interval_ms` and
    /// `simulation.max_ticks`.
    pub fn from_config(config: &DelveConfig) -> Self {
        Self::new(config.world.min_tick_interval_ms, config.simulation.max_ticks)
    }

    // --- pause ---

    /// Whether the loop is held.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Hold the loop before its next step.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Release a held loop.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.unpaused.notify_waiters();
    }

    /// Park until [`resume`](Self::resume) is called. Returns at once when
    /// not paused.
    pub async fn wait_if_paused(&self) {
        loop {
            let woken = self.unpaused.notified();
            tokio::pin!(woken);
            // Register before re-reading the flag so a resume in between
            // is not lost.
            woken.as_mut().enable();
            if !self.is_paused() {
                return;
            }
            woken.await;
        }
    }

    // --- stop ---

    /// Ask the loop to return after its current step.
    pub fn request_stop(&self) {
        self.stopping.store(true, Ordering::Release);
    }

    /// Whether a stop is pending.
    pub fn is_stop_requested(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    // --- pacing ---

    /// Current minimum gap between ticks, in milliseconds.
    pub fn min_tick_interval_ms(&self) -> u64 {
        self.min_tick_interval_ms.load(Ordering::Acquire)
    }

    /// Current minimum gap between ticks.
    pub fn min_tick_interval(&self) -> Duration {
        Duration::from_millis(self.min_tick_interval_ms())
    }

    /// Change the tick gap; the loop picks it up on its next step. Returns
    /// the old value.
    pub fn set_min_tick_interval_ms(&self, ms: u64) -> u64 {
        self.min_tick_interval_ms.swap(ms, Ordering::AcqRel)
    }

    // --- bounds ---

    /// Whether `ticks_done` has hit the configured bound.
    pub const fn tick_limit_reached(&self, ticks_done: u64) -> bool {
        self.max_ticks != 0 && ticks_done >= self.max_ticks
    }

    /// The configured tick bound (0 = none).
    pub const fn max_ticks(&self) -> u64 {
        self.max_ticks
    }

    /// When these controls were created.
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Whole seconds since creation.
    pub fn elapsed_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn pause_toggles() {
        let controls = OperatorState::new(100, 0);
        assert!(!controls.is_paused());
        controls.pause();
        assert!(controls.is_paused());
        controls.resume();
        assert!(!controls.is_paused());
    }

    #[test]
    fn stop_is_sticky() {
        let controls = OperatorState::new(100, 0);
        assert!(!controls.is_stop_requested());
        controls.request_stop();
        controls.resume();
        assert!(controls.is_stop_requested());
    }

    #[test]
    fn interval_swap_returns_old_value() {
        let controls = OperatorState::new(100, 0);
        assert_eq!(controls.set_min_tick_interval_ms(0), 100);
        assert_eq!(controls.min_tick_interval(), Duration::ZERO);
    }

    #[test]
    fn zero_bound_never_stops() {
        assert!(!OperatorState::new(100, 0).tick_limit_reached(u64::MAX));

        let bounded = OperatorState::new(100, 10);
        assert!(!bounded.tick_limit_reached(9));
        assert!(bounded.tick_limit_reached(10));
    }

    #[test]
    fn seeded_from_config() {
        let mut config = DelveConfig::default();
        config.simulation.max_ticks = 3;
        let controls = OperatorState::from_config(&config);
        assert_eq!(controls.max_ticks(), 3);
        assert_eq!(controls.min_tick_interval_ms(), config.world.min_tick_interval_ms);
    }

    #[tokio::test]
    async fn paused_waiter_wakes_on_resume() {
        let controls = Arc::new(OperatorState::new(100, 0));
        controls.pause();

        let waiter = Arc::clone(&controls);
        let parked = tokio::spawn(async move { waiter.wait_if_paused().await });

        tokio::task::yield_now().await;
        controls.resume();
        let joined = tokio::time::timeout(Duration::from_secs(1), parked).await;
        assert!(matches!(joined, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn running_world_does_not_wait() {
        OperatorState::new(100, 0).wait_if_paused().await;
    }
}
