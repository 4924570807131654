//! The world: livings, job sources, and the tick state machine.
//!
//! [`World::work`] advances the scheduler by one step. A tick moves
//! through four states:
//!
//! 1. **Idle** -- waits for the minimum inter-tick interval (and, when
//!    configured, for a connected user). Queued additions and removals of
//!    livings are applied here, then the clock advances.
//! 2. **`TickOngoing`** -- livings take their turns. In simultaneous mode
//!    everyone decides first and all actions run in one pass once every
//!    living is ready or the turn budget runs out. In sequential mode each
//!    living decides and acts in order, with its own budget.
//! 3. **`TickDone`** -- finished jobs are purged.
//! 4. **`TickEnded`** -- observers see the tick end; the next step returns
//!    to Idle.
//!
//! Livings that miss the turn budget get a forced turn: nothing happens
//! for them this tick and a `TurnEnded { forced: true }` change records it.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use delve_jobs::{
    BuildItemManager, JobBoard, JobContext, JobError, JobManager, JobSource, JobTuning, WorkerView,
};
use delve_types::{
    Action, ActionOutcome, EventLogEntry, IntVector3, JobId, JobSourceId, JobStatus, ObjectId,
    TurnMode, WorkbenchKind, WorldChange, WorldState,
};
use delve_world::{Environment, GridPathfinder, ItemObject, WorldError};
use serde::Serialize;
use tracing::{debug, info, trace};

use crate::ai::{AiContext, is_adjacent};
use crate::clock::{ClockError, WorldClock};
use crate::config::DelveConfig;
use crate::execute;
use crate::living::{Living, LivingSnapshot};

/// Hit points one successful attack removes.
pub const ATTACK_DAMAGE: u32 = 3;

/// Errors that can stop the world from advancing.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// The tick counter cannot advance.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// An environment operation failed.
    #[error("world error: {source}")]
    World {
        /// The underlying environment error.
        #[from]
        source: WorldError,
    },

    /// A job source could not be set up.
    #[error("job error: {source}")]
    Job {
        /// The underlying job error.
        #[from]
        source: JobError,
    },
}

/// A closure run against the world before the next scheduler step.
pub type Invoke = Box<dyn FnOnce(&mut World) + Send + Sync>;

/// Scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldOptions {
    /// How turns are sequenced within a tick.
    pub turn_mode: TurnMode,
    /// Minimum time between the end of a tick and the start of the next.
    pub min_tick_interval: Duration,
    /// Time a turn waits for undecided livings.
    pub max_move_time: Duration,
    /// Only start ticks while a user is connected.
    pub require_connected_user: bool,
    /// Job source tuning.
    pub tuning: JobTuning,
}

impl WorldOptions {
    /// Options taken from a loaded configuration.
    pub fn from_config(config: &DelveConfig) -> Self {
        Self {
            turn_mode: config.world.turn_mode,
            min_tick_interval: config.world.min_tick_interval(),
            max_move_time: config.world.max_move_time(),
            require_connected_user: config.world.require_connected_user,
            tuning: config.jobs.clone(),
        }
    }
}

impl Default for WorldOptions {
    fn default() -> Self {
        Self::from_config(&DelveConfig::default())
    }
}

/// What a call to [`World::work`] achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkResult {
    /// Whether the state machine moved. When `false` the caller should
    /// wait until `next_deadline` or an external wake-up.
    pub progressed: bool,
    /// The instant at which waiting ends on its own.
    pub next_deadline: Option<Instant>,
}

impl WorkResult {
    const PROGRESSED: Self = Self {
        progressed: true,
        next_deadline: None,
    };

    const fn waiting(deadline: Option<Instant>) -> Self {
        Self {
            progressed: false,
            next_deadline: deadline,
        }
    }
}

/// Point-in-time summary of the world for observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorldSnapshot {
    /// Last started tick.
    pub tick: u64,
    /// Scheduler state.
    pub state: WorldState,
    /// Livings in turn order.
    pub livings: Vec<LivingSnapshot>,
    /// Jobs still on the board.
    pub jobs: usize,
    /// Items in the world.
    pub items: usize,
    /// Registered job sources.
    pub sources: usize,
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
}

/// The simulated world.
pub struct World {
    clock: WorldClock,
    state: WorldState,
    options: WorldOptions,
    env: Environment,
    jobs: JobBoard,
    manager: JobManager,
    pathing: GridPathfinder,
    build_managers: BTreeMap<ObjectId, JobSourceId>,
    livings: BTreeMap<ObjectId, Living>,
    /// Turn order. Livings act in the order they were added.
    order: Vec<ObjectId>,
    pending_add: Vec<(Living, IntVector3)>,
    pending_remove: BTreeSet<ObjectId>,
    invokes: VecDeque<Invoke>,
    connected_users: u32,
    changes: Vec<WorldChange>,
    log: Vec<EventLogEntry>,
    tick_ended_at: Option<Instant>,
    turn_started_at: Option<Instant>,
    turn_index: usize,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("tick", &self.clock.tick())
            .field("state", &self.state)
            .field("livings", &self.order.len())
            .field("sources", &self.manager.len())
            .field("pending_invokes", &self.invokes.len())
            .finish_non_exhaustive()
    }
}

impl World {
    /// A world over `env` with no livings and no job sources.
    pub fn new(env: Environment, options: WorldOptions) -> Self {
        Self {
            clock: WorldClock::new(),
            state: WorldState::Idle,
            jobs: JobBoard::new(options.tuning.max_move_failures),
            pathing: GridPathfinder::new(options.tuning.max_path_nodes),
            options,
            env,
            manager: JobManager::new(),
            build_managers: BTreeMap::new(),
            livings: BTreeMap::new(),
            order: Vec::new(),
            pending_add: Vec::new(),
            pending_remove: BTreeSet::new(),
            invokes: VecDeque::new(),
            connected_users: 0,
            changes: Vec::new(),
            log: Vec::new(),
            tick_ended_at: None,
            turn_started_at: None,
            turn_index: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Number of the current (or last finished) tick.
    pub const fn tick(&self) -> u64 {
        self.clock.tick()
    }

    /// Scheduler state.
    pub const fn state(&self) -> WorldState {
        self.state
    }

    /// Scheduler settings.
    pub const fn options(&self) -> &WorldOptions {
        &self.options
    }

    /// The environment.
    pub const fn env(&self) -> &Environment {
        &self.env
    }

    /// Mutable access to the environment. Events recorded through it reach
    /// the job sources at the next scheduler step.
    pub const fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    /// The job arena.
    pub const fn jobs(&self) -> &JobBoard {
        &self.jobs
    }

    /// The registered job sources.
    pub const fn manager(&self) -> &JobManager {
        &self.manager
    }

    /// Look up a placed living.
    pub fn living(&self, id: ObjectId) -> Option<&Living> {
        self.livings.get(&id)
    }

    /// Placed livings in turn order.
    pub fn livings(&self) -> impl Iterator<Item = &Living> {
        self.order.iter().filter_map(|id| self.livings.get(id))
    }

    /// Number of connected users.
    pub const fn connected_users(&self) -> u32 {
        self.connected_users
    }

    // -----------------------------------------------------------------------
    // Livings
    // -----------------------------------------------------------------------

    /// Queue `living` to enter the world at `location` when the next tick
    /// starts.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::World`] if `location` is off the map.
    pub fn add_living(&mut self, living: Living, location: IntVector3) -> Result<ObjectId, TickError> {
        if !self.env.contains(location) {
            return Err(WorldError::OutOfBounds(location).into());
        }
        let id = living.id();
        debug!(living = %id, name = living.name(), %location, "Living queued");
        self.pending_add.push((living, location));
        Ok(id)
    }

    /// Queue a living for removal at the next tick boundary. It takes no
    /// further turns. Returns `false` for unknown livings.
    pub fn remove_living(&mut self, id: ObjectId) -> bool {
        if let Some(index) = self.pending_add.iter().position(|(living, _)| living.id() == id) {
            self.pending_add.remove(index);
            return true;
        }
        if !self.livings.contains_key(&id) {
            return false;
        }
        self.pending_remove.insert(id);
        true
    }

    /// Queue an action for a user-controlled living. Returns `false` if the
    /// living is unknown or not user-controlled.
    pub fn push_intent(&mut self, id: ObjectId, action: Action) -> bool {
        let living = match self.livings.get_mut(&id) {
            Some(living) => Some(living),
            None => self
                .pending_add
                .iter_mut()
                .map(|(living, _)| living)
                .find(|living| living.id() == id),
        };
        living.is_some_and(|living| living.ai_mut().push_intent(action))
    }

    // -----------------------------------------------------------------------
    // Users and invokes
    // -----------------------------------------------------------------------

    /// Record a user connection.
    pub const fn user_connected(&mut self) {
        self.connected_users = self.connected_users.saturating_add(1);
    }

    /// Record a user disconnection.
    pub const fn user_disconnected(&mut self) {
        self.connected_users = self.connected_users.saturating_sub(1);
    }

    /// Queue a closure to run before the next scheduler step.
    pub fn queue_invoke(&mut self, invoke: Invoke) {
        self.invokes.push_back(invoke);
    }

    /// Change the minimum inter-tick interval.
    pub const fn set_min_tick_interval(&mut self, interval: Duration) {
        self.options.min_tick_interval = interval;
    }

    // -----------------------------------------------------------------------
    // Job sources
    // -----------------------------------------------------------------------

    /// Register a job source.
    pub fn register_source(&mut self, source: Box<dyn JobSource>) -> JobSourceId {
        self.manager.register(source)
    }

    /// Unregister a job source, aborting its jobs and releasing its claims.
    pub fn unregister_source(&mut self, id: JobSourceId) -> Option<Box<dyn JobSource>> {
        let removed = self.manager.unregister(
            &mut JobContext {
                tick: self.clock.tick(),
                env: &mut self.env,
                jobs: &mut self.jobs,
                pathing: &self.pathing,
                log: &mut self.log,
            },
            id,
        );
        self.sync();
        removed
    }

    /// Run `f` against a registered source of type `T`. Jobs the closure
    /// aborts are reported to their sources before this returns.
    pub fn with_source<T, R>(
        &mut self,
        id: JobSourceId,
        f: impl FnOnce(&mut T, &Environment, &mut JobBoard) -> R,
    ) -> Option<R>
    where
        T: JobSource + 'static,
    {
        let source = self.manager.source_mut::<T>(id)?;
        let result = f(source, &self.env, &mut self.jobs);
        self.sync();
        Some(result)
    }

    /// Place a workbench and register its build-order queue.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::World`] if the tile cannot hold a workbench.
    pub fn add_workbench(&mut self, kind: WorkbenchKind, location: IntVector3) -> Result<ObjectId, TickError> {
        let workbench = self.env.add_workbench(kind, location)?;
        let manager = BuildItemManager::new(&self.env, workbench, &self.options.tuning)?;
        let source = self.manager.register(Box::new(manager));
        self.build_managers.insert(workbench, source);
        info!(workbench = %workbench, ?kind, %location, "Workbench placed");
        Ok(workbench)
    }

    /// Remove a workbench and its build-order queue.
    pub fn remove_workbench(&mut self, workbench: ObjectId) -> bool {
        if let Some(source) = self.build_managers.remove(&workbench) {
            self.unregister_source(source);
        }
        self.env.remove_workbench(workbench).is_some()
    }

    /// The job source id of a workbench's build-order queue.
    pub fn build_manager_id(&self, workbench: ObjectId) -> Option<JobSourceId> {
        self.build_managers.get(&workbench).copied()
    }

    /// Run `f` against the build-order queue of `workbench`.
    pub fn with_build_manager<R>(
        &mut self,
        workbench: ObjectId,
        f: impl FnOnce(&mut BuildItemManager, &mut JobBoard) -> R,
    ) -> Option<R> {
        let id = self.build_manager_id(workbench)?;
        self.with_source::<BuildItemManager, R>(id, |manager, _env, jobs| f(manager, jobs))
    }

    // -----------------------------------------------------------------------
    // Output
    // -----------------------------------------------------------------------

    /// Take the changes recorded since the last call.
    pub fn take_changes(&mut self) -> Vec<WorldChange> {
        std::mem::take(&mut self.changes)
    }

    /// A serializable summary of the world.
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            tick: self.clock.tick(),
            state: self.state,
            livings: self
                .livings()
                .map(|living| living.snapshot(self.env.living_location(living.id())))
                .collect(),
            jobs: self.jobs.len(),
            items: self.env.items().count(),
            sources: self.manager.len(),
            taken_at: Utc::now(),
        }
    }

    // -----------------------------------------------------------------------
    // State machine
    // -----------------------------------------------------------------------

    /// Advance the scheduler by one step at wall-clock time `now`.
    ///
    /// Queued invokes run first. When nothing could move, the result says
    /// so and names the instant at which waiting ends on its own.
    ///
    /// # Errors
    ///
    /// Returns [`TickError`] if the clock overflows or a queued living
    /// cannot be placed.
    pub fn work(&mut self, now: Instant) -> Result<WorkResult, TickError> {
        let invoked = self.run_invokes();
        let result = match self.state {
            WorldState::Idle => self.idle_step(now)?,
            WorldState::TickOngoing => match self.options.turn_mode {
                TurnMode::Simultaneous => self.simultaneous_step(now),
                TurnMode::Sequential => self.sequential_step(now),
            },
            WorldState::TickDone => self.end_tick(),
            WorldState::TickEnded => {
                self.tick_ended_at = Some(now);
                self.state = WorldState::Idle;
                WorkResult::PROGRESSED
            }
        };
        Ok(WorkResult {
            progressed: invoked || result.progressed,
            ..result
        })
    }

    fn run_invokes(&mut self) -> bool {
        let mut ran = false;
        while let Some(invoke) = self.invokes.pop_front() {
            invoke(self);
            ran = true;
        }
        if ran {
            self.sync();
        }
        ran
    }

    fn idle_step(&mut self, now: Instant) -> Result<WorkResult, TickError> {
        if self.options.require_connected_user && self.connected_users == 0 {
            return Ok(WorkResult::waiting(None));
        }
        if let Some(ended) = self.tick_ended_at {
            let due = ended
                .checked_add(self.options.min_tick_interval)
                .unwrap_or(ended);
            if now < due {
                return Ok(WorkResult::waiting(Some(due)));
            }
        }
        self.start_tick(now)?;
        Ok(WorkResult::PROGRESSED)
    }

    fn start_tick(&mut self, now: Instant) -> Result<(), TickError> {
        let tick = self.clock.advance()?;
        self.apply_pending_livings()?;
        self.state = WorldState::TickOngoing;
        self.turn_index = 0;
        self.turn_started_at = Some(now);
        self.changes.push(WorldChange::TickStarted { tick });
        debug!(tick, livings = self.order.len(), "Tick started");

        self.manager.broadcast_tick_start(&mut JobContext {
            tick,
            env: &mut self.env,
            jobs: &mut self.jobs,
            pathing: &self.pathing,
            log: &mut self.log,
        });
        self.sync();
        Ok(())
    }

    fn apply_pending_livings(&mut self) -> Result<(), TickError> {
        for id in std::mem::take(&mut self.pending_remove) {
            let Some(mut living) = self.livings.remove(&id) else {
                continue;
            };
            if let Some(job) = living.job() {
                self.jobs.abort(job);
            }
            living.ai_mut().forget_job();
            self.env.remove_living(id);
            self.order.retain(|other| *other != id);
            self.changes.push(WorldChange::LivingRemoved { living: id });
            info!(living = %id, name = living.name(), "Living removed");
        }
        for (living, location) in std::mem::take(&mut self.pending_add) {
            let id = living.id();
            self.env.place_living(id, location)?;
            info!(living = %id, name = living.name(), %location, "Living added");
            self.order.push(id);
            self.livings.insert(id, living);
            self.changes.push(WorldChange::LivingAdded { living: id });
        }
        self.sync();
        Ok(())
    }

    /// One pass over all livings once everyone is ready or the turn budget
    /// is spent.
    fn simultaneous_step(&mut self, now: Instant) -> WorkResult {
        let mut all_ready = true;
        for id in self.order.clone() {
            if self.pending_remove.contains(&id) {
                continue;
            }
            self.decide(id);
            all_ready &= self.livings.get(&id).is_some_and(Living::is_ready);
        }

        if !all_ready {
            let deadline = self.turn_deadline();
            if deadline.is_some_and(|deadline| now < deadline) {
                return WorkResult::waiting(deadline);
            }
        }

        let tick = self.clock.tick();
        for id in self.order.clone() {
            // A living removed by an earlier action in this pass keeps its
            // slot empty.
            if self.pending_remove.contains(&id) {
                continue;
            }
            let forced = !self.livings.get(&id).is_some_and(Living::is_ready);
            self.take_turn(id);
            if forced {
                trace!(tick, living = %id, "Turn forced");
            }
            self.changes.push(WorldChange::TurnEnded {
                tick,
                living: id,
                forced,
            });
        }
        self.state = WorldState::TickDone;
        WorkResult::PROGRESSED
    }

    /// Let the next living in order decide and act, or wait for it.
    fn sequential_step(&mut self, now: Instant) -> WorkResult {
        // Livings awaiting removal give up their turn before any timeout.
        while let Some(id) = self.order.get(self.turn_index)
            && self.pending_remove.contains(id)
        {
            self.turn_index = self.turn_index.saturating_add(1);
        }
        let Some(&id) = self.order.get(self.turn_index) else {
            self.state = WorldState::TickDone;
            return WorkResult::PROGRESSED;
        };

        self.decide(id);
        let forced = !self.livings.get(&id).is_some_and(Living::is_ready);
        if forced {
            let deadline = self.turn_deadline();
            if deadline.is_some_and(|deadline| now < deadline) {
                return WorkResult::waiting(deadline);
            }
            trace!(tick = self.clock.tick(), living = %id, "Turn forced");
        }

        self.take_turn(id);
        self.changes.push(WorldChange::TurnEnded {
            tick: self.clock.tick(),
            living: id,
            forced,
        });
        self.turn_index = self.turn_index.saturating_add(1);
        self.turn_started_at = Some(now);
        WorkResult::PROGRESSED
    }

    fn turn_deadline(&self) -> Option<Instant> {
        self.turn_started_at.map(|started| {
            started
                .checked_add(self.options.max_move_time)
                .unwrap_or(started)
        })
    }

    fn end_tick(&mut self) -> WorkResult {
        let tick = self.clock.tick();
        let purged = self.jobs.purge_finished();
        self.sync();
        self.changes.push(WorldChange::TickEnded { tick });
        debug!(tick, purged, "Tick ended");
        self.state = WorldState::TickEnded;
        WorkResult::PROGRESSED
    }

    // -----------------------------------------------------------------------
    // Turns
    // -----------------------------------------------------------------------

    /// Ask an idle living's AI for its next action.
    fn decide(&mut self, id: ObjectId) {
        let Some(location) = self.env.living_location(id) else {
            return;
        };
        let me = WorkerView {
            id,
            location,
            carrying: self.env.carried_by(id).map(ItemObject::id),
        };
        let Some(living) = self.livings.get_mut(&id) else {
            return;
        };
        if living.is_ready() {
            return;
        }
        let mut ctx = AiContext {
            tick: self.clock.tick(),
            env: &mut self.env,
            jobs: &mut self.jobs,
            pathing: &self.pathing,
            log: &mut self.log,
            manager: &mut self.manager,
        };
        if let Some(decision) = living.ai_mut().decide(&mut ctx, &me) {
            trace!(living = %id, action = ?decision.action, priority = ?decision.priority, "Action chosen");
            living.start_action(decision);
        }
        self.sync();
    }

    /// Spend the living's turn. Actions take effect on their last turn.
    fn take_turn(&mut self, id: ObjectId) {
        let tick = self.clock.tick();
        let Some(done) = self.livings.get_mut(&id).and_then(|living| living.take_turn(tick)) else {
            return;
        };
        if let Some(job) = done.job
            && self.jobs.status(job) != Some(JobStatus::Ok)
        {
            debug!(living = %id, job = %job, "Dropped action for an ended job");
            return;
        }
        let outcome = match &done.action {
            Action::Attack { target } => self.attack(id, *target),
            action => execute::outcome_of(&mut self.env, id, action),
        };
        self.changes.push(WorldChange::ActionDone {
            living: id,
            action: done.action.clone(),
            outcome,
        });
        if let Some(job) = done.job {
            let status = self.jobs.action_done(job, &done.action, outcome);
            trace!(living = %id, job = %job, ?status, "Assignment advanced");
        }
        self.sync();
    }

    fn attack(&mut self, attacker: ObjectId, target: ObjectId) -> ActionOutcome {
        let (Some(from), Some(to)) = (
            self.env.living_location(attacker),
            self.env.living_location(target),
        ) else {
            return ActionOutcome::Fail;
        };
        if !is_adjacent(from, to) || self.pending_remove.contains(&target) {
            return ActionOutcome::Fail;
        }
        let Some(victim) = self.livings.get_mut(&target) else {
            return ActionOutcome::Fail;
        };
        let left = victim.take_damage(ATTACK_DAMAGE);
        debug!(attacker = %attacker, target = %target, hit_points = left, "Attack landed");
        if left == 0 {
            let message = format!("{} was killed", victim.name());
            info!(living = %target, "Living killed");
            self.log.push(EventLogEntry::new(self.clock.tick(), message));
            self.pending_remove.insert(target);
        }
        ActionOutcome::Success
    }

    /// Stop livings working on a job that just ended. Their half-done
    /// action is dropped unperformed and the AI decides again.
    fn cancel_ended_work(&mut self, ended: &BTreeSet<JobId>) {
        if ended.is_empty() {
            return;
        }
        for (id, living) in &mut self.livings {
            let in_flight = living
                .current_action()
                .and_then(|current| current.job)
                .is_some_and(|job| ended.contains(&job));
            if in_flight && let Some(dropped) = living.cancel_action() {
                debug!(living = %id, action = ?dropped.action, "Action cancelled, its job ended");
            }
            if living.ai().current_job().is_some_and(|job| ended.contains(&job)) {
                living.ai_mut().forget_job();
            }
        }
    }

    /// Route environment events and job notifications to the sources until
    /// both are quiet, then publish job transitions and log entries.
    fn sync(&mut self) {
        loop {
            let events = self.env.drain_events();
            let mut ctx = JobContext {
                tick: self.clock.tick(),
                env: &mut self.env,
                jobs: &mut self.jobs,
                pathing: &self.pathing,
                log: &mut self.log,
            };
            for event in &events {
                self.manager.broadcast_environment_event(&mut ctx, event);
            }
            self.manager.dispatch_notifications(&mut ctx);
            if events.is_empty() {
                break;
            }
        }
        let transitions = self.jobs.take_transitions();
        let ended: BTreeSet<JobId> = transitions.iter().map(|(job, _)| *job).collect();
        self.cancel_ended_work(&ended);
        for (job, status) in transitions {
            self.changes.push(WorldChange::JobStatusChanged { job, status });
        }
        for entry in self.log.drain(..) {
            self.changes.push(WorldChange::EventLog(entry));
        }
    }
}
