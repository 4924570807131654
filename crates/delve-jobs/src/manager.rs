//! Registry of job sources and the assignment dispatch loop.
//!
//! The [`JobManager`] owns every registered [`JobSource`]. Dropping a source
//! out of the manager is the only way to unsubscribe it, so a source can
//! never receive a callback after it has been unregistered.

use delve_types::{JobId, JobSourceId};
use delve_world::EnvironmentEvent;
use tracing::{debug, warn};

use crate::source::{JobContext, JobSource};
use crate::task::WorkerView;

/// Job sources in registration order.
#[derive(Debug, Default)]
pub struct JobManager {
    sources: Vec<Box<dyn JobSource>>,
}

impl JobManager {
    /// An empty registry.
    pub const fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Register a source at the end of the polling order.
    ///
    /// # Panics
    ///
    /// Panics if a source with the same id is already registered.
    pub fn register(&mut self, source: Box<dyn JobSource>) -> JobSourceId {
        let id = source.id();
        assert!(!self.contains(id), "job source {id} registered twice");
        debug!(source = %id, kind = source.name(), "Job source registered");
        self.sources.push(source);
        id
    }

    /// Unregister a source, aborting its outstanding jobs first. The
    /// resulting notifications are delivered to the source before it is
    /// handed back, so it leaves no reservation behind.
    ///
    /// # Panics
    ///
    /// Panics if no source with this id is registered.
    pub fn unregister(
        &mut self,
        ctx: &mut JobContext<'_>,
        id: JobSourceId,
    ) -> Option<Box<dyn JobSource>> {
        assert!(self.contains(id), "job source {id} is not registered");
        self.dispatch_notifications(ctx);
        if let Some(source) = self.source_dyn_mut(id) {
            source.drain(ctx);
        }
        self.dispatch_notifications(ctx);
        let index = self.sources.iter().position(|s| s.id() == id)?;
        let source = self.sources.remove(index);
        debug!(source = %id, kind = source.name(), "Job source unregistered");
        Some(source)
    }

    /// Whether a source with this id is registered.
    pub fn contains(&self, id: JobSourceId) -> bool {
        self.sources.iter().any(|s| s.id() == id)
    }

    /// Number of registered sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether no source is registered.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Registered sources in polling order.
    pub fn sources(&self) -> impl Iterator<Item = &dyn JobSource> {
        self.sources.iter().map(AsRef::as_ref)
    }

    /// Find work for `worker`: poll every source in registration order and
    /// bind the first assignment offered to the worker.
    pub fn find_assignment(&mut self, ctx: &mut JobContext<'_>, worker: &WorkerView) -> Option<JobId> {
        for source in &mut self.sources {
            if let Some(job) = source.find_assignment(ctx, worker) {
                ctx.jobs.assign(job, worker.id);
                debug!(
                    tick = ctx.tick,
                    worker = %worker.id,
                    job = %job,
                    source = source.name(),
                    "Assignment found"
                );
                return Some(job);
            }
        }
        None
    }

    /// Deliver every queued job notification to its observer. Handlers may
    /// end further jobs, so this loops until the queue stays empty.
    pub fn dispatch_notifications(&mut self, ctx: &mut JobContext<'_>) {
        loop {
            let batch = ctx.jobs.take_notifications();
            if batch.is_empty() {
                return;
            }
            for note in batch {
                match self.source_dyn_mut(note.observer) {
                    Some(source) => source.on_job_status_changed(ctx, note.job, note.status),
                    None => warn!(
                        job = %note.job,
                        source = %note.observer,
                        "Job notification for an unregistered source dropped"
                    ),
                }
            }
        }
    }

    /// Forward the tick-start signal to every source.
    pub fn broadcast_tick_start(&mut self, ctx: &mut JobContext<'_>) {
        for source in &mut self.sources {
            source.on_tick_start(ctx);
        }
    }

    /// Forward an environment event to every source.
    pub fn broadcast_environment_event(&mut self, ctx: &mut JobContext<'_>, event: &EnvironmentEvent) {
        for source in &mut self.sources {
            source.on_environment_event(ctx, event);
        }
    }

    fn source_dyn_mut(&mut self, id: JobSourceId) -> Option<&mut Box<dyn JobSource>> {
        self.sources.iter_mut().find(|s| s.id() == id)
    }

    /// A registered source as its concrete type.
    pub fn source<T: JobSource + 'static>(&self, id: JobSourceId) -> Option<&T> {
        self.sources
            .iter()
            .find(|s| s.id() == id)
            .and_then(|s| s.as_any().downcast_ref())
    }

    /// A registered source as its concrete type, mutably.
    pub fn source_mut<T: JobSource + 'static>(&mut self, id: JobSourceId) -> Option<&mut T> {
        self.source_dyn_mut(id)
            .and_then(|s| s.as_any_mut().downcast_mut())
    }
}
