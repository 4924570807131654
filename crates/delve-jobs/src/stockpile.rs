//! Criteria-matched storage areas.
//!
//! A [`Stockpile`] hauls items matching its criteria into its area. Items
//! it stored are marked `stockpiled_by`; the mark is cleared as soon as
//! the item leaves the area by any other means.

use std::any::Any;
use std::collections::BTreeMap;

use delve_types::{DirectionSet, IntBox, IntVector3, JobId, JobSourceId, JobStatus, ObjectId};
use delve_world::{Environment, EnvironmentEvent, ItemFilter, ItemObject, Pathfinder};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::config::JobTuning;
use crate::item_tracker::{TargetItemTracker, TrackerRules};
use crate::source::{JobContext, JobSource};
use crate::task::{Task, WorkerView};
use crate::unreachables::Unreachables;

/// An outstanding haul.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreJob {
    /// The reserved item.
    pub item: ObjectId,
    /// Where it is being carried.
    pub destination: IntVector3,
}

/// A storage area.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stockpile {
    id: JobSourceId,
    area: IntBox,
    criteria: Option<ItemFilter>,
    jobs: BTreeMap<JobId, StoreJob>,
    unreachable_ttl: u64,
    #[serde(skip)]
    tracker: TargetItemTracker,
    #[serde(skip)]
    unreachables: Unreachables,
}

impl Stockpile {
    /// A stockpile over `area` accepting nothing until criteria are set.
    pub fn new(area: IntBox, tuning: &JobTuning) -> Self {
        let mut stockpile = Self {
            id: JobSourceId::new(),
            area,
            criteria: None,
            jobs: BTreeMap::new(),
            unreachable_ttl: tuning.stockpile_retry,
            tracker: TargetItemTracker::default(),
            unreachables: Unreachables::new(tuning.stockpile_retry),
        };
        stockpile.tracker = TargetItemTracker::new(area.center(), stockpile.tracker_rules());
        stockpile
    }

    fn tracker_rules(&self) -> TrackerRules {
        TrackerRules {
            filter: self.criteria.clone().unwrap_or_default(),
            exclude_area: Some(self.area),
            include_stockpiled: false,
        }
    }

    /// The storage area.
    pub const fn area(&self) -> IntBox {
        self.area
    }

    /// Accepted items, `None` while the stockpile is disabled.
    pub const fn criteria(&self) -> Option<&ItemFilter> {
        self.criteria.as_ref()
    }

    /// Outstanding hauls.
    pub fn jobs(&self) -> impl Iterator<Item = (&JobId, &StoreJob)> {
        self.jobs.iter()
    }

    /// Set or clear the accepted items. Running hauls are not affected.
    pub fn set_criteria(&mut self, env: &Environment, criteria: Option<ItemFilter>) {
        self.criteria = criteria;
        let rules = self.tracker_rules();
        self.tracker.set_rules(rules, env);
        if self.criteria.is_some() {
            self.tracker.enable(env);
        } else {
            self.tracker.disable();
        }
        debug!(source = %self.id, enabled = self.criteria.is_some(), "Stockpile criteria set");
    }

    /// Rebuild the caches skipped by serialization.
    pub fn rebuild(&mut self, env: &Environment) {
        self.unreachables = Unreachables::new(self.unreachable_ttl);
        self.tracker = TargetItemTracker::new(self.area.center(), self.tracker_rules());
        if self.criteria.is_some() {
            self.tracker.enable(env);
        }
    }

    /// Number of items the stockpile is tracking as haul candidates.
    pub fn tracked_items(&self) -> usize {
        self.tracker.len()
    }

    /// A walkable tile in the area reachable from `from`, preferring tiles
    /// with no items and no haul heading there. Tiles that cannot be reached
    /// are remembered until their retry delay passes.
    fn pick_destination(
        &mut self,
        env: &Environment,
        pathing: &dyn Pathfinder,
        from: IntVector3,
        now: u64,
    ) -> Option<IntVector3> {
        let (free, taken): (Vec<IntVector3>, Vec<IntVector3>) = self
            .area
            .iter()
            .filter(|&p| env.is_walkable(p))
            .partition(|&p| {
                env.items_at(p).next().is_none() && !self.jobs.values().any(|j| j.destination == p)
            });
        for p in free.into_iter().chain(taken) {
            if self.unreachables.is_unreachable(p, now) {
                continue;
            }
            if pathing.can_reach(env, from, p, DirectionSet::EXACT) {
                return Some(p);
            }
            self.unreachables.add(p, now);
        }
        None
    }
}

impl JobSource for Stockpile {
    fn id(&self) -> JobSourceId {
        self.id
    }

    fn name(&self) -> &'static str {
        "stockpile"
    }

    fn find_assignment(&mut self, ctx: &mut JobContext<'_>, worker: &WorkerView) -> Option<JobId> {
        self.criteria.as_ref()?;
        let candidates: Vec<(ObjectId, IntVector3)> = self
            .tracker
            .candidates(ctx.env)
            .filter_map(|item| Some((item.id(), item.ground_location()?)))
            .collect();

        for (item, location) in candidates {
            if self.unreachables.is_unreachable(location, ctx.tick) {
                continue;
            }
            if !ctx
                .pathing
                .can_reach(ctx.env, worker.location, location, DirectionSet::EXACT)
            {
                self.unreachables.add(location, ctx.tick);
                trace!(source = %self.id, item = %item, "Stockpile item unreachable");
                continue;
            }
            let Some(destination) = self.pick_destination(ctx.env, ctx.pathing, location, ctx.tick)
            else {
                trace!(source = %self.id, item = %item, "No reachable stockpile tile");
                continue;
            };
            if ctx.env.reserve_item(item, self.id).is_err() {
                continue;
            }
            let job = ctx.jobs.create_assignment(
                Some(self.id),
                Task::Fetch {
                    item,
                    destination,
                    positioning: DirectionSet::EXACT,
                },
            );
            self.jobs.insert(job, StoreJob { item, destination });
            self.tracker.refresh(ctx.env, item);
            debug!(source = %self.id, job = %job, item = %item, destination = %destination, "Haul job created");
            return Some(job);
        }
        None
    }

    fn on_job_status_changed(&mut self, ctx: &mut JobContext<'_>, job: JobId, status: JobStatus) {
        let store = self.jobs.remove(&job);
        assert!(store.is_some(), "stockpile has no item for job {job}");
        let Some(store) = store else {
            return;
        };
        ctx.env.release_item(store.item, self.id);

        if status == JobStatus::Done {
            let stored = ctx
                .env
                .item(store.item)
                .and_then(ItemObject::ground_location)
                .is_some_and(|p| self.area.contains(p));
            if stored && let Err(e) = ctx.env.set_stockpiled_by(store.item, self.id) {
                warn!(source = %self.id, item = %store.item, error = %e, "Stored item not marked");
            }
        } else {
            if status == JobStatus::Abort {
                self.unreachables.add(store.destination, ctx.tick);
            }
            let kind = ctx.env.item(store.item).map(ItemObject::kind);
            match kind {
                Some(kind) => ctx.log_event(format!("Failed to store {kind:?} in stockpile")),
                None => ctx.log_event("Failed to store an item in stockpile"),
            }
        }
        self.tracker.refresh(ctx.env, store.item);
        debug!(source = %self.id, job = %job, ?status, "Haul job ended");
    }

    fn on_environment_event(&mut self, ctx: &mut JobContext<'_>, event: &EnvironmentEvent) {
        self.tracker.handle_event(ctx.env, event);
        let EnvironmentEvent::ObjectMoved { object, .. } = *event else {
            return;
        };
        let left_area = ctx.env.item(object).is_some_and(|item| {
            item.stockpiled_by() == Some(self.id)
                && !item.ground_location().is_some_and(|p| self.area.contains(p))
        });
        if left_area {
            ctx.env.clear_stockpiled_by(object, self.id);
            trace!(source = %self.id, item = %object, "Item left the stockpile");
        }
    }

    fn drain(&mut self, ctx: &mut JobContext<'_>) {
        for job in self.jobs.keys() {
            ctx.jobs.abort(*job);
        }
        let stored: Vec<ObjectId> = ctx
            .env
            .items()
            .filter(|item| item.stockpiled_by() == Some(self.id))
            .map(ItemObject::id)
            .collect();
        for item in stored {
            ctx.env.clear_stockpiled_by(item, self.id);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
