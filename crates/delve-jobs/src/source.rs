//! The job source protocol.
//!
//! A job source proposes work for idle workers and reacts to the end of
//! the jobs it created. Sources are owned by the
//! [`JobManager`](crate::JobManager), which polls them in registration order
//! and routes job notifications and environment events to them. Everything
//! a source may touch is handed in through a [`JobContext`].

use std::any::Any;

use delve_types::{EventLogEntry, JobId, JobSourceId, JobStatus};
use delve_world::{Environment, EnvironmentEvent, Pathfinder};
use tracing::info;

use crate::board::JobBoard;
use crate::task::WorkerView;

/// Mutable access to the world state job sources operate on.
pub struct JobContext<'a> {
    /// Current tick.
    pub tick: u64,
    /// The environment.
    pub env: &'a mut Environment,
    /// The job arena.
    pub jobs: &'a mut JobBoard,
    /// The reachability oracle.
    pub pathing: &'a dyn Pathfinder,
    /// User-visible log entries produced during this step.
    pub log: &'a mut Vec<EventLogEntry>,
}

impl JobContext<'_> {
    /// Append a user-visible log entry.
    pub fn log_event(&mut self, message: impl Into<String>) {
        let entry = EventLogEntry::new(self.tick, message);
        info!(tick = self.tick, message = %entry.message, "Event logged");
        self.log.push(entry);
    }
}

/// A producer of candidate work.
pub trait JobSource: std::fmt::Debug + Send + Sync {
    /// Identifier used as observer id and reservation owner.
    fn id(&self) -> JobSourceId;

    /// Human-readable kind, for logs.
    fn name(&self) -> &'static str;

    /// Yield a free assignment for `worker`, creating a job if needed.
    ///
    /// Returning `None` must leave no observable change behind; internal
    /// retry timers and caches may still be updated.
    fn find_assignment(&mut self, ctx: &mut JobContext<'_>, worker: &WorkerView) -> Option<JobId>;

    /// A job created by this source reached a terminal status.
    fn on_job_status_changed(&mut self, ctx: &mut JobContext<'_>, job: JobId, status: JobStatus);

    /// Called at every Idle to `TickOngoing` transition.
    fn on_tick_start(&mut self, _ctx: &mut JobContext<'_>) {}

    /// Called for every change drained from the environment.
    fn on_environment_event(&mut self, _ctx: &mut JobContext<'_>, _event: &EnvironmentEvent) {}

    /// Abort every outstanding job before the source is dropped.
    fn drain(&mut self, ctx: &mut JobContext<'_>);

    /// Downcast support.
    fn as_any(&self) -> &dyn Any;

    /// Downcast support.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
