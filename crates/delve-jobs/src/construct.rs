//! Construction sites: floors, walls, and pavement built from hauled material.

use std::any::Any;
use std::collections::BTreeMap;

use delve_types::{
    ConstructMode, DirectionSet, IntBox, IntVector3, ItemKind, JobId, JobSourceId, JobStatus,
    ObjectId, position_map,
};
use delve_world::{Environment, EnvironmentEvent, ItemFilter, ItemObject};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::board::JobBoard;
use crate::config::JobTuning;
use crate::source::{JobContext, JobSource};
use crate::task::{Task, WorkerView};

/// Item kinds accepted as material for `mode`.
pub fn required_items(mode: ConstructMode) -> ItemFilter {
    match mode {
        ConstructMode::Floor => ItemFilter::kinds(&[ItemKind::Block, ItemKind::Log]),
        ConstructMode::Wall => ItemFilter::kinds(&[ItemKind::Block, ItemKind::Rock]),
        ConstructMode::Pavement => ItemFilter::kinds(&[ItemKind::Block]),
    }
}

/// One planned construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructSite {
    /// What to build.
    pub mode: ConstructMode,
    /// Accepted material.
    pub filter: ItemFilter,
    /// The job currently building here.
    pub job: Option<JobId>,
    /// The site is not considered before this tick.
    pub next_check: u64,
}

/// A running construction job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructJob {
    /// The site.
    pub location: IntVector3,
    /// The reserved material.
    pub item: ObjectId,
}

/// Planned constructions of one player order set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstructManager {
    id: JobSourceId,
    #[serde(with = "position_map")]
    sites: BTreeMap<IntVector3, ConstructSite>,
    jobs: BTreeMap<JobId, ConstructJob>,
    dirty: bool,
    unreachable_retry: u64,
    material_retry: u64,
}

impl ConstructManager {
    /// No planned constructions.
    pub fn new(tuning: &JobTuning) -> Self {
        Self {
            id: JobSourceId::new(),
            sites: BTreeMap::new(),
            jobs: BTreeMap::new(),
            dirty: false,
            unreachable_retry: tuning.designation_retry,
            material_retry: tuning.construct_material_retry,
        }
    }

    /// Plan `mode` on every valid tile of `area`. `material` narrows the
    /// accepted items further. Returns the number of sites added.
    pub fn add_area(
        &mut self,
        env: &Environment,
        area: IntBox,
        mode: ConstructMode,
        material: Option<&ItemFilter>,
    ) -> usize {
        let filter = match material {
            Some(extra) => required_items(mode).intersect(extra),
            None => required_items(mode),
        };
        let mut added = 0usize;
        for p in area.iter() {
            if self.sites.contains_key(&p) || !env.can_construct(p, mode) {
                continue;
            }
            self.sites.insert(
                p,
                ConstructSite {
                    mode,
                    filter: filter.clone(),
                    job: None,
                    next_check: 0,
                },
            );
            added = added.saturating_add(1);
        }
        debug!(source = %self.id, ?mode, added, "Construction area added");
        added
    }

    /// Drop every site in `area`, aborting jobs building there.
    pub fn remove_area(&mut self, jobs: &mut JobBoard, area: IntBox) -> usize {
        let mut removed = 0usize;
        for p in area.iter() {
            if let Some(site) = self.sites.remove(&p) {
                if let Some(job) = site.job {
                    jobs.abort(job);
                }
                removed = removed.saturating_add(1);
            }
        }
        removed
    }

    /// The site at `p`.
    pub fn site(&self, p: IntVector3) -> Option<&ConstructSite> {
        self.sites.get(&p)
    }

    /// Sites in position order.
    pub fn sites(&self) -> impl Iterator<Item = (&IntVector3, &ConstructSite)> {
        self.sites.iter()
    }

    /// Number of sites.
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// Whether nothing is planned.
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Drop idle sites the terrain no longer allows. Sites with a running
    /// job are left to the job, which fails on its own.
    fn revalidate(&mut self, env: &Environment) -> usize {
        self.dirty = false;
        let before = self.sites.len();
        self.sites
            .retain(|&p, site| site.job.is_some() || env.can_construct(p, site.mode));
        let removed = before.saturating_sub(self.sites.len());
        if removed > 0 {
            debug!(source = %self.id, removed, "Construction sites revalidated");
        }
        removed
    }
}

fn nearest_material<'a>(
    env: &'a Environment,
    filter: &ItemFilter,
    site: IntVector3,
) -> Vec<&'a ItemObject> {
    let mut items: Vec<&ItemObject> = env
        .items()
        .filter(|item| item.reserved_by().is_none() && filter.matches(item))
        .filter(|item| item.ground_location().is_some())
        .collect();
    items.sort_by_key(|item| {
        (
            item.ground_location().map_or(u64::MAX, |at| at.distance_sq(site)),
            item.id(),
        )
    });
    items
}

impl JobSource for ConstructManager {
    fn id(&self) -> JobSourceId {
        self.id
    }

    fn name(&self) -> &'static str {
        "construct"
    }

    fn find_assignment(&mut self, ctx: &mut JobContext<'_>, worker: &WorkerView) -> Option<JobId> {
        let mut candidates: Vec<(u64, IntVector3)> = self
            .sites
            .iter()
            .filter(|(_, site)| site.job.is_none() && site.next_check <= ctx.tick)
            .map(|(&p, _)| (worker.location.distance_sq(p), p))
            .collect();
        candidates.sort_unstable();

        for (_, p) in candidates {
            let Some(site) = self.sites.get_mut(&p) else {
                continue;
            };
            if !ctx
                .pathing
                .can_reach(ctx.env, worker.location, p, DirectionSet::PLANAR)
            {
                site.next_check = ctx.tick.saturating_add(self.unreachable_retry);
                trace!(source = %self.id, location = %p, "Construction site unreachable");
                continue;
            }
            let item = nearest_material(ctx.env, &site.filter, p)
                .into_iter()
                .find(|item| {
                    item.ground_location().is_some_and(|at| {
                        ctx.pathing
                            .can_reach(ctx.env, worker.location, at, DirectionSet::EXACT)
                    })
                })
                .map(ItemObject::id);
            let Some(item) = item else {
                site.next_check = ctx.tick.saturating_add(self.material_retry);
                trace!(source = %self.id, location = %p, "No material for construction site");
                continue;
            };
            if ctx.env.reserve_item(item, self.id).is_err() {
                continue;
            }
            let job = ctx.jobs.create_assignment(
                Some(self.id),
                Task::Construct {
                    location: p,
                    mode: site.mode,
                    item,
                },
            );
            site.job = Some(job);
            self.jobs.insert(job, ConstructJob { location: p, item });
            debug!(source = %self.id, job = %job, location = %p, mode = ?site.mode, "Construction job created");
            return Some(job);
        }
        None
    }

    fn on_job_status_changed(&mut self, ctx: &mut JobContext<'_>, job: JobId, status: JobStatus) {
        let running = self.jobs.remove(&job);
        assert!(running.is_some(), "construction has no site for job {job}");
        let Some(running) = running else {
            return;
        };
        ctx.env.release_item(running.item, self.id);
        let Some(site) = self
            .sites
            .get_mut(&running.location)
            .filter(|site| site.job == Some(job))
        else {
            return;
        };
        match status {
            JobStatus::Done | JobStatus::Fail => {
                self.sites.remove(&running.location);
            }
            JobStatus::Abort | JobStatus::Ok => {
                site.job = None;
                site.next_check = ctx.tick;
            }
        }
        debug!(source = %self.id, job = %job, location = %running.location, ?status, "Construction job ended");
    }

    fn on_tick_start(&mut self, ctx: &mut JobContext<'_>) {
        if self.dirty {
            self.revalidate(ctx.env);
        }
    }

    fn on_environment_event(&mut self, _ctx: &mut JobContext<'_>, event: &EnvironmentEvent) {
        if matches!(event, EnvironmentEvent::TerrainChanged { .. }) {
            self.dirty = true;
        }
    }

    fn drain(&mut self, ctx: &mut JobContext<'_>) {
        for job in self.jobs.keys() {
            ctx.jobs.abort(*job);
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
    use delve_types::{EventLogEntry, IntSize3, MaterialId};
    use delve_world::{GridPathfinder, TileData};

    use super::*;

    struct Fixture {
        env: Environment,
        jobs: JobBoard,
        pathing: GridPathfinder,
        log: Vec<EventLogEntry>,
    }

    impl Fixture {
        fn new() -> Self {
            let mut env = Environment::new(IntSize3::new(10, 10, 1));
            env.fill(
                IntBox::from_corners(IntVector3::new(0, 0, 0), IntVector3::new(9, 9, 0)),
                TileData::floor(MaterialId::Granite),
            )
            .unwrap();
            env.drain_events();
            Self {
                env,
                jobs: JobBoard::default(),
                pathing: GridPathfinder::default(),
                log: Vec::new(),
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
    }

    fn worker() -> WorkerView {
        WorkerView {
            id: ObjectId::new(),
            location: IntVector3::new(0, 0, 0),
            carrying: None,
        }
    }

    fn wall_site() -> IntBox {
        IntBox::single(IntVector3::new(5, 5, 0))
    }

    #[test]
    fn add_area_skips_invalid_tiles() {
        let fx = Fixture::new();
        let mut manager = ConstructManager::new(&JobTuning::default());
        // Floors need empty space; the whole map is already floor.
        assert_eq!(
            manager.add_area(&fx.env, wall_site(), ConstructMode::Floor, None),
            0
        );
        assert_eq!(
            manager.add_area(&fx.env, wall_site(), ConstructMode::Wall, None),
            1
        );
        assert_eq!(
            manager.add_area(&fx.env, wall_site(), ConstructMode::Wall, None),
            0
        );
    }

    #[test]
    fn missing_material_delays_the_site() {
        let mut fx = Fixture::new();
        let mut manager = ConstructManager::new(&JobTuning::default());
        manager.add_area(&fx.env, wall_site(), ConstructMode::Wall, None);
        // Logs cannot build walls.
        fx.env
            .add_item(ItemObject::new(ItemKind::Log, MaterialId::Oak, IntVector3::new(1, 1, 0)))
            .unwrap();

        assert!(manager.find_assignment(&mut fx.ctx(4), &worker()).is_none());
        let site = manager.site(IntVector3::new(5, 5, 0)).unwrap();
        assert_eq!(
            site.next_check,
            4_u64.saturating_add(JobTuning::default().construct_material_retry)
        );
    }

    #[test]
    fn reserves_material_and_releases_on_abort() {
        let mut fx = Fixture::new();
        let mut manager = ConstructManager::new(&JobTuning::default());
        manager.add_area(&fx.env, wall_site(), ConstructMode::Wall, None);
        let rock = fx
            .env
            .add_item(ItemObject::new(ItemKind::Rock, MaterialId::Granite, IntVector3::new(2, 2, 0)))
            .unwrap();

        let job = manager.find_assignment(&mut fx.ctx(1), &worker()).unwrap();
        assert_eq!(fx.env.item(rock).unwrap().reserved_by(), Some(manager.id()));
        assert!(manager.find_assignment(&mut fx.ctx(1), &worker()).is_none());

        fx.jobs.abort(job);
        manager.on_job_status_changed(&mut fx.ctx(3), job, JobStatus::Abort);
        assert!(fx.env.item(rock).unwrap().reserved_by().is_none());
        let site = manager.site(IntVector3::new(5, 5, 0)).unwrap();
        assert_eq!((site.job, site.next_check), (None, 3));
        assert!(manager.find_assignment(&mut fx.ctx(3), &worker()).is_some());
    }

    #[test]
    fn material_filter_narrows_accepted_items() {
        let mut fx = Fixture::new();
        let mut manager = ConstructManager::new(&JobTuning::default());
        let only_blocks = ItemFilter::kinds(&[ItemKind::Block]);
        manager.add_area(&fx.env, wall_site(), ConstructMode::Wall, Some(&only_blocks));
        fx.env
            .add_item(ItemObject::new(ItemKind::Rock, MaterialId::Granite, IntVector3::new(2, 2, 0)))
            .unwrap();
        assert!(manager.find_assignment(&mut fx.ctx(1), &worker()).is_none());
    }

    #[test]
    fn done_removes_the_site() {
        let mut fx = Fixture::new();
        let mut manager = ConstructManager::new(&JobTuning::default());
        manager.add_area(&fx.env, wall_site(), ConstructMode::Wall, None);
        fx.env
            .add_item(ItemObject::new(ItemKind::Block, MaterialId::Granite, IntVector3::new(2, 2, 0)))
            .unwrap();
        let job = manager.find_assignment(&mut fx.ctx(1), &worker()).unwrap();
        fx.jobs.finish(job, JobStatus::Done);
        manager.on_job_status_changed(&mut fx.ctx(1), job, JobStatus::Done);
        assert!(manager.is_empty());
    }

    #[test]
    fn terrain_change_drops_idle_sites() {
        let mut fx = Fixture::new();
        let mut manager = ConstructManager::new(&JobTuning::default());
        manager.add_area(&fx.env, wall_site(), ConstructMode::Wall, None);
        fx.env
            .set_tile(IntVector3::new(5, 5, 0), TileData::wall(MaterialId::Granite))
            .unwrap();
        for event in fx.env.drain_events() {
            manager.on_environment_event(&mut fx.ctx(1), &event);
        }
        manager.on_tick_start(&mut fx.ctx(2));
        assert!(manager.is_empty());
    }
}
