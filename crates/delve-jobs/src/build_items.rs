//! Workbench build-order queue.
//!
//! A [`BuildItemManager`] holds the ordered [`BuildOrder`]s of one workbench
//! with at most one current order. The job for the current order is
//! materialized lazily: every material slot of the recipe is resolved to a
//! reachable item, all items are reserved, and a two-stage job group is
//! created (fetch every item to the workbench, then build).

use std::any::Any;
use std::collections::BTreeSet;

use delve_types::{
    BuildOrderId, DirectionSet, IntVector3, ItemKind, JobId, JobSourceId, JobStatus,
    ObjectId, WorkbenchKind,
};
use delve_world::{Environment, EnvironmentEvent, ItemFilter};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::board::JobBoard;
use crate::config::JobTuning;
use crate::error::JobError;
use crate::item_tracker::{TargetItemTracker, TrackerRules};
use crate::source::{JobContext, JobSource};
use crate::task::{Task, WorkerView};
use crate::unreachables::Unreachables;

/// Material slots needed to build `product`, one filter per item.
pub fn recipe(product: ItemKind) -> Vec<ItemFilter> {
    let rock = || ItemFilter::kinds(&[ItemKind::Rock]);
    let log = || ItemFilter::kinds(&[ItemKind::Log]);
    match product {
        ItemKind::Block => vec![rock()],
        ItemKind::Door | ItemKind::Chair => vec![log()],
        ItemKind::Table => vec![log(), log()],
        ItemKind::Bed => vec![log(), ItemFilter::kinds(&[ItemKind::Block])],
        ItemKind::Rock | ItemKind::Ore | ItemKind::Gem | ItemKind::Log => Vec::new(),
    }
}

/// A queued product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOrder {
    /// Unique id.
    pub id: BuildOrderId,
    /// What to build.
    pub product: ItemKind,
    /// Stay queued after completion.
    pub is_repeat: bool,
    /// Skipped by the round-robin scan.
    pub is_suspended: bool,
}

/// The job currently materialized for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentBuild {
    /// The job group.
    pub job: JobId,
    /// The order it serves.
    pub order: BuildOrderId,
    /// Reserved source items.
    pub items: Vec<ObjectId>,
}

/// Build orders of one workbench.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildItemManager {
    id: JobSourceId,
    workbench: ObjectId,
    workbench_kind: WorkbenchKind,
    location: IntVector3,
    orders: Vec<BuildOrder>,
    current: Option<BuildOrderId>,
    current_job: Option<CurrentBuild>,
    unreachable_ttl: u64,
    #[serde(skip)]
    trackers: Vec<TargetItemTracker>,
    #[serde(skip)]
    tracked_order: Option<BuildOrderId>,
    #[serde(skip)]
    unreachables: Unreachables,
}

impl BuildItemManager {
    /// A manager for `workbench` with an empty queue.
    pub fn new(env: &Environment, workbench: ObjectId, tuning: &JobTuning) -> Result<Self, JobError> {
        let bench = env
            .workbench(workbench)
            .ok_or(JobError::WorkbenchNotFound(workbench))?;
        Ok(Self {
            id: JobSourceId::new(),
            workbench,
            workbench_kind: bench.kind,
            location: bench.location,
            orders: Vec::new(),
            current: None,
            current_job: None,
            unreachable_ttl: tuning.unreachable_ttl,
            trackers: Vec::new(),
            tracked_order: None,
            unreachables: Unreachables::new(tuning.unreachable_ttl),
        })
    }

    /// The workbench this manager serves.
    pub const fn workbench(&self) -> ObjectId {
        self.workbench
    }

    /// Queued orders in queue order.
    pub fn orders(&self) -> &[BuildOrder] {
        &self.orders
    }

    /// The order the next job will be built for.
    pub fn current_order(&self) -> Option<&BuildOrder> {
        let current = self.current?;
        self.orders.iter().find(|o| o.id == current)
    }

    /// The job materialized for the current order.
    pub const fn current_job(&self) -> Option<&CurrentBuild> {
        self.current_job.as_ref()
    }

    /// Queue a new order.
    pub fn add_order(&mut self, product: ItemKind, is_repeat: bool) -> Result<BuildOrderId, JobError> {
        if !self.workbench_kind.can_build(product) || recipe(product).is_empty() {
            return Err(JobError::ProductNotBuildable {
                workbench: self.workbench_kind,
                product,
            });
        }
        let id = BuildOrderId::new();
        self.orders.push(BuildOrder {
            id,
            product,
            is_repeat,
            is_suspended: false,
        });
        if self.current.is_none() {
            self.current = Some(id);
        }
        debug!(source = %self.id, order = %id, ?product, is_repeat, "Build order added");
        Ok(id)
    }

    /// Remove an order, aborting its job if it is being built.
    pub fn remove_order(&mut self, jobs: &mut JobBoard, id: BuildOrderId) -> Result<(), JobError> {
        let index = self.index_of(id)?;
        self.abort_job_for(jobs, id);
        self.orders.remove(index);
        if self.current == Some(id) {
            self.select_from(index);
        }
        debug!(source = %self.id, order = %id, "Build order removed");
        Ok(())
    }

    /// Suspend or resume an order. Suspending the current order aborts its
    /// job and moves on to the next order.
    pub fn set_suspended(
        &mut self,
        jobs: &mut JobBoard,
        id: BuildOrderId,
        suspended: bool,
    ) -> Result<(), JobError> {
        let index = self.index_of(id)?;
        if let Some(order) = self.orders.get_mut(index) {
            order.is_suspended = suspended;
        }
        if suspended && self.current == Some(id) {
            self.abort_job_for(jobs, id);
            self.select_from(index.saturating_add(1));
        } else if !suspended && self.current.is_none() {
            self.current = Some(id);
        }
        Ok(())
    }

    /// Toggle whether an order stays queued after completion.
    pub fn set_repeat(&mut self, id: BuildOrderId, is_repeat: bool) -> Result<(), JobError> {
        let index = self.index_of(id)?;
        if let Some(order) = self.orders.get_mut(index) {
            order.is_repeat = is_repeat;
        }
        Ok(())
    }

    /// Rebuild the caches skipped by serialization.
    pub fn rebuild(&mut self, env: &Environment) {
        self.unreachables = Unreachables::new(self.unreachable_ttl);
        self.tracked_order = None;
        self.trackers.clear();
        self.ensure_trackers(env);
    }

    fn index_of(&self, id: BuildOrderId) -> Result<usize, JobError> {
        self.orders
            .iter()
            .position(|o| o.id == id)
            .ok_or(JobError::OrderNotFound(id))
    }

    fn abort_job_for(&self, jobs: &mut JobBoard, order: BuildOrderId) {
        if let Some(current) = self.current_job.as_ref().filter(|c| c.order == order) {
            jobs.abort(current.job);
        }
    }

    /// Make the first non-suspended order at or after `start` (wrapping)
    /// current, or clear the current order if none is eligible.
    fn select_from(&mut self, start: usize) {
        let len = self.orders.len();
        self.current = (0..len)
            .filter_map(|offset| start.checked_add(offset).and_then(|i| i.checked_rem(len)))
            .filter_map(|i| self.orders.get(i))
            .find(|o| !o.is_suspended)
            .map(|o| o.id);
    }

    /// Round-robin to the order after the current one.
    fn advance(&mut self) {
        let next = self
            .current
            .and_then(|id| self.orders.iter().position(|o| o.id == id))
            .map_or(0, |i| i.saturating_add(1));
        self.select_from(next);
    }

    fn remove_current(&mut self) {
        let Some(id) = self.current else {
            return;
        };
        if let Some(index) = self.orders.iter().position(|o| o.id == id) {
            self.orders.remove(index);
            self.select_from(index);
        }
    }

    fn ensure_trackers(&mut self, env: &Environment) {
        if self.tracked_order == self.current && !self.trackers.is_empty() {
            return;
        }
        self.tracked_order = self.current;
        self.trackers = self
            .current_order()
            .map(|order| recipe(order.product))
            .unwrap_or_default()
            .into_iter()
            .map(|filter| {
                let mut tracker = TargetItemTracker::new(
                    self.location,
                    TrackerRules {
                        filter,
                        exclude_area: None,
                        include_stockpiled: true,
                    },
                );
                tracker.enable(env);
                tracker
            })
            .collect();
    }

    /// Resolve one reachable item per recipe slot.
    fn resolve_materials(&mut self, ctx: &JobContext<'_>, worker: &WorkerView) -> Option<Vec<ObjectId>> {
        let mut chosen: BTreeSet<ObjectId> = BTreeSet::new();
        let mut items = Vec::with_capacity(self.trackers.len());
        for tracker in &self.trackers {
            let mut found = None;
            for item in tracker.candidates(ctx.env) {
                let Some(at) = item.ground_location() else {
                    continue;
                };
                if chosen.contains(&item.id()) || self.unreachables.is_unreachable(at, ctx.tick) {
                    continue;
                }
                if ctx
                    .pathing
                    .can_reach(ctx.env, worker.location, at, DirectionSet::EXACT)
                {
                    found = Some(item.id());
                    break;
                }
                self.unreachables.add(at, ctx.tick);
            }
            let item = found?;
            chosen.insert(item);
            items.push(item);
        }
        Some(items)
    }
}

impl JobSource for BuildItemManager {
    fn id(&self) -> JobSourceId {
        self.id
    }

    fn name(&self) -> &'static str {
        "build_items"
    }

    fn find_assignment(&mut self, ctx: &mut JobContext<'_>, worker: &WorkerView) -> Option<JobId> {
        if let Some(current) = &self.current_job {
            return ctx.jobs.free_assignment(current.job);
        }
        if self.current.is_none() {
            self.advance();
        }
        let order = *self.current_order()?;
        self.ensure_trackers(ctx.env);

        let Some(items) = self.resolve_materials(ctx, worker) else {
            info!(source = %self.id, order = %order.id, product = ?order.product, "Build order dropped, no materials");
            ctx.log_event(format!("Failed to find materials for {:?}", order.product));
            self.remove_current();
            return None;
        };

        for &item in &items {
            // Candidates were just checked to be unreserved.
            if ctx.env.reserve_item(item, self.id).is_err() {
                for &reserved in items.iter().take_while(|&&r| r != item) {
                    ctx.env.release_item(reserved, self.id);
                }
                return None;
            }
        }
        let fetches = items
            .iter()
            .map(|&item| Task::Fetch {
                item,
                destination: self.location,
                positioning: DirectionSet::EXACT,
            })
            .collect();
        let build = Task::BuildItem {
            workbench: self.workbench,
            location: self.location,
            sources: items.clone(),
            product: order.product,
        };
        let job = ctx.jobs.create_group(Some(self.id), vec![fetches, vec![build]]);
        for tracker in &mut self.trackers {
            for &item in &items {
                tracker.refresh(ctx.env, item);
            }
        }
        debug!(source = %self.id, job = %job, order = %order.id, product = ?order.product, "Build job created");
        self.current_job = Some(CurrentBuild {
            job,
            order: order.id,
            items,
        });
        ctx.jobs.free_assignment(job)
    }

    fn on_job_status_changed(&mut self, ctx: &mut JobContext<'_>, job: JobId, status: JobStatus) {
        let current = self.current_job.take();
        assert!(
            current.as_ref().is_some_and(|c| c.job == job),
            "build manager has no order for job {job}"
        );
        let Some(current) = current else {
            return;
        };
        for &item in &current.items {
            ctx.env.release_item(item, self.id);
            for tracker in &mut self.trackers {
                tracker.refresh(ctx.env, item);
            }
        }
        debug!(source = %self.id, job = %job, ?status, "Build job ended");

        // Removal and suspension already moved the queue on.
        if self.current != Some(current.order) {
            return;
        }
        let repeat = self.current_order().is_some_and(|o| o.is_repeat);
        match status {
            JobStatus::Done if repeat => self.advance(),
            JobStatus::Done | JobStatus::Fail => self.remove_current(),
            JobStatus::Abort | JobStatus::Ok => self.advance(),
        }
    }

    fn on_environment_event(&mut self, ctx: &mut JobContext<'_>, event: &EnvironmentEvent) {
        for tracker in &mut self.trackers {
            tracker.handle_event(ctx.env, event);
        }
    }

    fn drain(&mut self, ctx: &mut JobContext<'_>) {
        if let Some(current) = &self.current_job {
            ctx.jobs.abort(current.job);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use delve_types::{EventLogEntry, IntBox, IntSize3, MaterialId};
    use delve_world::{GridPathfinder, ItemObject, TileData};

    use super::*;

    struct Fixture {
        env: Environment,
        jobs: JobBoard,
        pathing: GridPathfinder,
        log: Vec<EventLogEntry>,
        bench: ObjectId,
    }

    impl Fixture {
        fn new() -> Self {
            let mut env = Environment::new(IntSize3::new(10, 10, 1));
            env.fill(
                IntBox::from_corners(IntVector3::new(0, 0, 0), IntVector3::new(9, 9, 0)),
                TileData::floor(MaterialId::Granite),
            )
            .unwrap();
            let bench = env
                .add_workbench(WorkbenchKind::Carpenter, IntVector3::new(5, 5, 0))
                .unwrap();
            env.drain_events();
            Self {
                env,
                jobs: JobBoard::default(),
                pathing: GridPathfinder::default(),
                log: Vec::new(),
                bench,
            }
        }

        fn ctx(&mut self, tick: u64) -> JobContext<'_> {
            JobContext {
                tick,
                env: &mut self.env,
                jobs: &mut self.jobs,
                pathing: &self.pathing,
                log: &mut self.log,
            }
        }

        fn add_log(&mut self, x: i32) -> ObjectId {
            self.env
                .add_item(ItemObject::new(ItemKind::Log, MaterialId::Oak, IntVector3::new(x, 0, 0)))
                .unwrap()
        }

        fn manager(&self) -> BuildItemManager {
            BuildItemManager::new(&self.env, self.bench, &JobTuning::default()).unwrap()
        }
    }

    fn worker() -> WorkerView {
        WorkerView {
            id: ObjectId::new(),
            location: IntVector3::new(0, 0, 0),
            carrying: None,
        }
    }

    #[test]
    fn carpenter_rejects_blocks() {
        let fx = Fixture::new();
        let mut manager = fx.manager();
        assert!(matches!(
            manager.add_order(ItemKind::Block, false),
            Err(JobError::ProductNotBuildable { .. })
        ));
        assert!(manager.orders().is_empty());
    }

    #[test]
    fn materializes_a_group_and_reserves_every_slot() {
        let mut fx = Fixture::new();
        let a = fx.add_log(1);
        let b = fx.add_log(2);
        let mut manager = fx.manager();
        manager.add_order(ItemKind::Table, false).unwrap();

        let first = manager.find_assignment(&mut fx.ctx(1), &worker()).unwrap();
        let group = manager.current_job().unwrap().job;
        assert_ne!(first, group);
        assert_eq!(fx.env.item(a).unwrap().reserved_by(), Some(manager.id()));
        assert_eq!(fx.env.item(b).unwrap().reserved_by(), Some(manager.id()));

        // The second fetch of the same stage is available in parallel.
        fx.jobs.assign(first, ObjectId::new());
        let second = manager.find_assignment(&mut fx.ctx(1), &worker()).unwrap();
        assert_ne!(second, first);
    }

    #[test]
    fn missing_material_removes_order_and_logs() {
        let mut fx = Fixture::new();
        fx.add_log(1);
        let mut manager = fx.manager();
        manager.add_order(ItemKind::Table, false).unwrap();

        assert!(manager.find_assignment(&mut fx.ctx(1), &worker()).is_none());
        assert!(manager.orders().is_empty());
        assert!(manager.current_order().is_none());
        assert_eq!(
            fx.log.first().map(|e| e.message.as_str()),
            Some("Failed to find materials for Table")
        );
        assert!(fx.env.items().all(|item| item.reserved_by().is_none()));
    }

    #[test]
    fn repeat_order_survives_completion() {
        let mut fx = Fixture::new();
        fx.add_log(1);
        fx.add_log(2);
        let mut manager = fx.manager();
        let order = manager.add_order(ItemKind::Chair, true).unwrap();

        manager.find_assignment(&mut fx.ctx(1), &worker()).unwrap();
        let job = manager.current_job().unwrap().job;
        fx.jobs.finish(job, JobStatus::Done);
        manager.on_job_status_changed(&mut fx.ctx(1), job, JobStatus::Done);

        assert_eq!(manager.orders().len(), 1);
        assert_eq!(manager.current_order().map(|o| o.id), Some(order));
        assert!(manager.find_assignment(&mut fx.ctx(2), &worker()).is_some());
        assert_eq!(manager.current_job().map(|c| c.order), Some(order));
    }

    #[test]
    fn one_shot_order_is_removed_on_completion() {
        let mut fx = Fixture::new();
        fx.add_log(1);
        fx.add_log(2);
        let mut manager = fx.manager();
        let once = manager.add_order(ItemKind::Chair, false).unwrap();
        let door = manager.add_order(ItemKind::Door, false).unwrap();

        manager.find_assignment(&mut fx.ctx(1), &worker()).unwrap();
        let job = manager.current_job().unwrap().job;
        fx.jobs.finish(job, JobStatus::Done);
        manager.on_job_status_changed(&mut fx.ctx(1), job, JobStatus::Done);

        assert!(manager.orders().iter().all(|o| o.id != once));
        assert_eq!(manager.current_order().map(|o| o.id), Some(door));
        manager.find_assignment(&mut fx.ctx(2), &worker()).unwrap();
        assert_eq!(manager.current_job().map(|c| c.order), Some(door));
    }

    #[test]
    fn abort_moves_on_without_removing() {
        let mut fx = Fixture::new();
        fx.add_log(1);
        let mut manager = fx.manager();
        let chair = manager.add_order(ItemKind::Chair, false).unwrap();
        let door = manager.add_order(ItemKind::Door, false).unwrap();

        manager.find_assignment(&mut fx.ctx(1), &worker()).unwrap();
        let job = manager.current_job().unwrap().job;
        fx.jobs.abort(job);
        manager.on_job_status_changed(&mut fx.ctx(1), job, JobStatus::Abort);

        assert_eq!(manager.orders().len(), 2);
        assert_eq!(manager.current_order().map(|o| o.id), Some(door));
        assert!(fx.env.items().all(|item| item.reserved_by().is_none()));

        // Wraps back around to the chair.
        manager.find_assignment(&mut fx.ctx(2), &worker()).unwrap();
        let job = manager.current_job().unwrap().job;
        fx.jobs.abort(job);
        manager.on_job_status_changed(&mut fx.ctx(2), job, JobStatus::Abort);
        assert_eq!(manager.current_order().map(|o| o.id), Some(chair));
    }

    #[test]
    fn suspended_orders_are_skipped() {
        let mut fx = Fixture::new();
        let mut manager = fx.manager();
        let chair = manager.add_order(ItemKind::Chair, false).unwrap();
        let door = manager.add_order(ItemKind::Door, false).unwrap();

        manager.set_suspended(&mut fx.jobs, chair, true).unwrap();
        assert_eq!(manager.current_order().map(|o| o.id), Some(door));
        manager.set_suspended(&mut fx.jobs, door, true).unwrap();
        assert!(manager.current_order().is_none());
        manager.set_suspended(&mut fx.jobs, chair, false).unwrap();
        assert_eq!(manager.current_order().map(|o| o.id), Some(chair));
    }

    #[test]
    fn removing_the_building_order_aborts_its_job() {
        let mut fx = Fixture::new();
        let log = fx.add_log(1);
        let mut manager = fx.manager();
        let chair = manager.add_order(ItemKind::Chair, false).unwrap();
        manager.find_assignment(&mut fx.ctx(1), &worker()).unwrap();
        let job = manager.current_job().unwrap().job;

        manager.remove_order(&mut fx.jobs, chair).unwrap();
        assert_eq!(fx.jobs.status(job), Some(JobStatus::Abort));
        manager.on_job_status_changed(&mut fx.ctx(1), job, JobStatus::Abort);
        assert!(manager.orders().is_empty());
        assert!(fx.env.item(log).unwrap().reserved_by().is_none());
    }
}
