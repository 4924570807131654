//! Player-marked tiles queued for digging or tree felling.
//!
//! A [`Designation`] keeps a sparse map from tile to [`DesignationEntry`].
//! Terrain changes mark the map dirty; the next tick start re-validates
//! every tile, dropping the ones that became invalid and resetting the
//! retry timer of the ones that just became reachable.

use std::any::Any;
use std::collections::BTreeMap;

use delve_types::{
    DesignationType, Direction, DirectionSet, IntBox, IntVector3, JobId, JobSourceId, JobStatus,
    position_map,
};
use delve_world::{Environment, EnvironmentEvent};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::board::JobBoard;
use crate::config::JobTuning;
use crate::source::{JobContext, JobSource};
use crate::task::{Task, WorkerView};

/// Per-tile designation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignationEntry {
    /// What to do with the tile.
    pub kind: DesignationType,
    /// The job currently working on the tile.
    pub job: Option<JobId>,
    /// At least one tile a worker could stand on is walkable.
    pub reachable_simple: bool,
    /// The tile is not considered before this tick.
    pub next_reachable_check: u64,
}

/// Designated tiles of one player order set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Designation {
    id: JobSourceId,
    #[serde(with = "position_map")]
    entries: BTreeMap<IntVector3, DesignationEntry>,
    job_index: BTreeMap<JobId, IntVector3>,
    dirty: bool,
    retry_ticks: u64,
}

impl Designation {
    /// An empty designation.
    pub fn new(tuning: &JobTuning) -> Self {
        Self {
            id: JobSourceId::new(),
            entries: BTreeMap::new(),
            job_index: BTreeMap::new(),
            dirty: false,
            retry_ticks: tuning.designation_retry,
        }
    }

    /// Designate every valid tile of `area` for `kind`. Invalid or already
    /// designated tiles are skipped. Returns the number of tiles added.
    pub fn add_area(&mut self, env: &Environment, area: IntBox, kind: DesignationType) -> usize {
        let mut added = 0usize;
        for p in area.iter() {
            if self.entries.contains_key(&p) || !env.is_designatable(p, kind) {
                continue;
            }
            self.entries.insert(
                p,
                DesignationEntry {
                    kind,
                    job: None,
                    reachable_simple: reachable_simple(env, p, kind),
                    next_reachable_check: 0,
                },
            );
            added = added.saturating_add(1);
        }
        debug!(source = %self.id, ?kind, added, "Designation area added");
        added
    }

    /// Remove every designated tile of `area`, aborting jobs working on
    /// them. Returns the number of tiles removed.
    pub fn remove_area(&mut self, jobs: &mut JobBoard, area: IntBox) -> usize {
        let mut removed = 0usize;
        for p in area.iter() {
            if let Some(entry) = self.entries.remove(&p) {
                if let Some(job) = entry.job {
                    jobs.abort(job);
                }
                removed = removed.saturating_add(1);
            }
        }
        debug!(source = %self.id, removed, "Designation area removed");
        removed
    }

    /// Whether `p` is designated.
    pub fn contains(&self, p: IntVector3) -> bool {
        self.entries.contains_key(&p)
    }

    /// The entry for `p`.
    pub fn get(&self, p: IntVector3) -> Option<&DesignationEntry> {
        self.entries.get(&p)
    }

    /// Number of designated tiles.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is designated.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Designated tiles in position order.
    pub fn iter(&self) -> impl Iterator<Item = (&IntVector3, &DesignationEntry)> {
        self.entries.iter()
    }

    /// Whether a terrain change is waiting to be re-validated.
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Re-validate every tile against the terrain. Invalid tiles are dropped
    /// (aborting their job); tiles whose simple reachability flipped from
    /// false to true are retried at once. Returns `(removed, reset)`.
    pub fn revalidate(&mut self, env: &Environment, jobs: &mut JobBoard, now: u64) -> (usize, usize) {
        self.dirty = false;
        let mut removed = 0usize;
        let mut reset = 0usize;
        let mut invalid = Vec::new();
        for (&p, entry) in &mut self.entries {
            if !env.is_designatable(p, entry.kind) {
                invalid.push(p);
                continue;
            }
            let reachable = reachable_simple(env, p, entry.kind);
            if reachable && !entry.reachable_simple {
                entry.next_reachable_check = now;
                reset = reset.saturating_add(1);
            }
            entry.reachable_simple = reachable;
        }
        for p in invalid {
            if let Some(entry) = self.entries.remove(&p)
                && let Some(job) = entry.job
            {
                jobs.abort(job);
            }
            removed = removed.saturating_add(1);
        }
        debug!(source = %self.id, removed, reset, "Designation revalidated");
        (removed, reset)
    }
}

/// Where a worker may stand to work on `p`.
fn positioning(env: &Environment, p: IntVector3, kind: DesignationType) -> DirectionSet {
    match kind {
        DesignationType::FellTree => DirectionSet::PLANAR,
        DesignationType::Mine | DesignationType::CreateStairs | DesignationType::Channel => {
            Direction::PLANAR
                .into_iter()
                .filter(|&d| env.is_walkable(p.offset(d)))
                .fold(DirectionSet::NONE, |set, d| set.union(DirectionSet::single(d)))
        }
    }
}

fn reachable_simple(env: &Environment, p: IntVector3, kind: DesignationType) -> bool {
    positioning(env, p, kind)
        .positions(p)
        .any(|standing| env.is_walkable(standing))
}

impl JobSource for Designation {
    fn id(&self) -> JobSourceId {
        self.id
    }

    fn name(&self) -> &'static str {
        "designation"
    }

    fn find_assignment(&mut self, ctx: &mut JobContext<'_>, worker: &WorkerView) -> Option<JobId> {
        let mut candidates: Vec<(u64, IntVector3)> = self
            .entries
            .iter()
            .filter(|(_, e)| {
                e.job.is_none() && e.reachable_simple && e.next_reachable_check <= ctx.tick
            })
            .map(|(&p, _)| (worker.location.distance_sq(p), p))
            .collect();
        candidates.sort_unstable();

        for (_, p) in candidates {
            let Some(entry) = self.entries.get_mut(&p) else {
                continue;
            };
            let positioning = positioning(ctx.env, p, entry.kind);
            if !ctx.pathing.can_reach(ctx.env, worker.location, p, positioning) {
                entry.next_reachable_check = ctx.tick.saturating_add(self.retry_ticks);
                trace!(source = %self.id, location = %p, "Designated tile unreachable");
                continue;
            }
            let task = match entry.kind {
                DesignationType::FellTree => Task::FellTree { location: p },
                kind => Task::Mine {
                    location: p,
                    kind,
                    positioning,
                },
            };
            let job = ctx.jobs.create_assignment(Some(self.id), task);
            entry.job = Some(job);
            self.job_index.insert(job, p);
            debug!(source = %self.id, job = %job, location = %p, kind = ?entry.kind, "Designation job created");
            return Some(job);
        }
        None
    }

    fn on_job_status_changed(&mut self, _ctx: &mut JobContext<'_>, job: JobId, status: JobStatus) {
        let location = self.job_index.remove(&job);
        assert!(location.is_some(), "designation has no tile for job {job}");
        let Some(location) = location else {
            return;
        };
        // The tile may have been removed while the job was running.
        let Some(entry) = self
            .entries
            .get_mut(&location)
            .filter(|entry| entry.job == Some(job))
        else {
            return;
        };
        match status {
            JobStatus::Done | JobStatus::Fail => {
                self.entries.remove(&location);
            }
            JobStatus::Abort | JobStatus::Ok => entry.job = None,
        }
        debug!(source = %self.id, job = %job, location = %location, ?status, "Designation job ended");
    }

    fn on_tick_start(&mut self, ctx: &mut JobContext<'_>) {
        if self.dirty {
            self.revalidate(ctx.env, ctx.jobs, ctx.tick);
        }
    }

    fn on_environment_event(&mut self, _ctx: &mut JobContext<'_>, event: &EnvironmentEvent) {
        if matches!(event, EnvironmentEvent::TerrainChanged { .. }) {
            self.dirty = true;
        }
    }

    fn drain(&mut self, ctx: &mut JobContext<'_>) {
        for job in self.job_index.keys() {
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
