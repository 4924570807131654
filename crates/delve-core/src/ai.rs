//! Decision makers for livings.
//!
//! Each living carries one [`Ai`] variant. When asked, it picks the next
//! action or reports that it is not ready yet; a user-controlled living
//! without queued intents is the only case that waits for input, and the
//! turn timeout covers it.

use std::collections::VecDeque;

use delve_jobs::{AssignmentStep, JobBoard, JobContext, JobManager, WorkerView};
use delve_types::{
    Action, ActionPriority, Direction, DirectionSet, EventLogEntry, IntVector3, JobId, ObjectId,
};
use delve_world::{Environment, Pathfinder};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

/// Chance that a wandering animal stays put for a turn.
const WANDER_REST_CHANCE: f64 = 0.3;

/// An action chosen by an AI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// The action to perform.
    pub action: Action,
    /// Urgency of the action.
    pub priority: ActionPriority,
    /// Assignment the action is performed for.
    pub job: Option<JobId>,
}

impl Decision {
    const fn idle() -> Self {
        Self {
            action: Action::Wait { ticks: 1 },
            priority: ActionPriority::Idle,
            job: None,
        }
    }
}

/// Everything an AI may consult or change while deciding.
pub struct AiContext<'a> {
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
    /// Registered job sources.
    pub manager: &'a mut JobManager,
}

impl AiContext<'_> {
    /// Ask the job sources for work for `worker`.
    pub fn find_assignment(&mut self, worker: &WorkerView) -> Option<JobId> {
        let mut ctx = JobContext {
            tick: self.tick,
            env: &mut *self.env,
            jobs: &mut *self.jobs,
            pathing: self.pathing,
            log: &mut *self.log,
        };
        self.manager.find_assignment(&mut ctx, worker)
    }
}

/// A decision maker.
#[derive(Debug)]
pub enum Ai {
    /// Performs actions queued by a user.
    Manual(ManualAi),
    /// Works on assignments from the job sources.
    DwarfWork(DwarfWorkAi),
    /// Walks around at random.
    AnimalWander(Box<WanderAi>),
    /// Hunts down a single target.
    Attack(AttackAi),
}

impl Ai {
    /// A user-controlled AI with no queued intents.
    pub const fn manual() -> Self {
        Self::Manual(ManualAi {
            intents: VecDeque::new(),
        })
    }

    /// A worker AI without an assignment.
    pub const fn dwarf_work() -> Self {
        Self::DwarfWork(DwarfWorkAi { job: None })
    }

    /// A wandering AI with a seeded random source.
    pub fn wander(seed: u64) -> Self {
        Self::AnimalWander(Box::new(WanderAi {
            rng: StdRng::seed_from_u64(seed),
        }))
    }

    /// An AI chasing `target`.
    pub const fn attack(target: ObjectId) -> Self {
        Self::Attack(AttackAi { target })
    }

    /// Whether a user decides this living's actions.
    pub const fn is_user_controlled(&self) -> bool {
        matches!(self, Self::Manual(_))
    }

    /// The assignment held by the AI.
    pub const fn current_job(&self) -> Option<JobId> {
        match self {
            Self::DwarfWork(ai) => ai.job,
            Self::Manual(_) | Self::AnimalWander(_) | Self::Attack(_) => None,
        }
    }

    /// Drop the held assignment without touching the job board.
    pub fn forget_job(&mut self) -> Option<JobId> {
        match self {
            Self::DwarfWork(ai) => ai.job.take(),
            Self::Manual(_) | Self::AnimalWander(_) | Self::Attack(_) => None,
        }
    }

    /// Queue a user intent. Returns `false` for AIs that do not take
    /// intents.
    pub fn push_intent(&mut self, action: Action) -> bool {
        match self {
            Self::Manual(ai) => {
                ai.intents.push_back(action);
                true
            }
            Self::DwarfWork(_) | Self::AnimalWander(_) | Self::Attack(_) => false,
        }
    }

    /// Choose the next action for the living described by `me`. `None`
    /// means the AI is not ready yet.
    pub fn decide(&mut self, ctx: &mut AiContext<'_>, me: &WorkerView) -> Option<Decision> {
        match self {
            Self::Manual(ai) => ai.decide(),
            Self::DwarfWork(ai) => Some(ai.decide(ctx, me)),
            Self::AnimalWander(ai) => Some(ai.decide(ctx.env, me)),
            Self::Attack(ai) => Some(ai.decide(ctx, me)),
        }
    }
}

/// Queue of user intents.
#[derive(Debug, Clone, Default)]
pub struct ManualAi {
    intents: VecDeque<Action>,
}

impl ManualAi {
    /// Intents not yet performed.
    pub fn pending(&self) -> usize {
        self.intents.len()
    }

    fn decide(&mut self) -> Option<Decision> {
        self.intents.pop_front().map(|action| Decision {
            action,
            priority: ActionPriority::User,
            job: None,
        })
    }
}

/// Worker AI driven by the job sources.
#[derive(Debug, Clone, Default)]
pub struct DwarfWorkAi {
    job: Option<JobId>,
}

impl DwarfWorkAi {
    fn decide(&mut self, ctx: &mut AiContext<'_>, me: &WorkerView) -> Decision {
        if let Some(job) = self.job {
            if let Some(decision) = Self::continue_job(ctx, me, job) {
                return decision;
            }
            self.job = None;
        }

        // Leftovers from an ended assignment go down before new work.
        if let Some(item) = me.carrying {
            return Decision {
                action: Action::DropItem { item },
                priority: ActionPriority::Low,
                job: None,
            };
        }

        if let Some(job) = ctx.find_assignment(me) {
            debug!(worker = %me.id, job = %job, "Assignment taken");
            if let Some(decision) = Self::continue_job(ctx, me, job) {
                self.job = Some(job);
                return decision;
            }
        }
        Decision::idle()
    }

    fn continue_job(ctx: &mut AiContext<'_>, me: &WorkerView, job: JobId) -> Option<Decision> {
        match ctx.jobs.prepare_next_action(job, me, ctx.env, ctx.pathing) {
            AssignmentStep::Act(action) => Some(Decision {
                action,
                priority: ActionPriority::Normal,
                job: Some(job),
            }),
            AssignmentStep::Finished(status) => {
                trace!(worker = %me.id, job = %job, ?status, "Assignment ended");
                None
            }
        }
    }
}

/// Random walker.
#[derive(Debug, Clone)]
pub struct WanderAi {
    rng: StdRng,
}

impl WanderAi {
    fn decide(&mut self, env: &Environment, me: &WorkerView) -> Decision {
        let open: Vec<Direction> = Direction::PLANAR
            .into_iter()
            .filter(|&direction| env.can_move(me.location, direction))
            .collect();
        if open.is_empty() || self.rng.random_bool(WANDER_REST_CHANCE) {
            return Decision {
                priority: ActionPriority::Low,
                ..Decision::idle()
            };
        }
        let pick = self.rng.random_range(0..open.len());
        open.get(pick).map_or_else(Decision::idle, |&direction| Decision {
            action: Action::Move { direction },
            priority: ActionPriority::Low,
            job: None,
        })
    }
}

/// Hunter of a single living.
#[derive(Debug, Clone)]
pub struct AttackAi {
    target: ObjectId,
}

impl AttackAi {
    /// The living being hunted.
    pub const fn target(&self) -> ObjectId {
        self.target
    }

    fn decide(&self, ctx: &AiContext<'_>, me: &WorkerView) -> Decision {
        let Some(prey) = ctx.env.living_location(self.target) else {
            return Decision::idle();
        };
        if is_adjacent(me.location, prey) {
            return Decision {
                action: Action::Attack {
                    target: self.target,
                },
                priority: ActionPriority::High,
                job: None,
            };
        }
        ctx.pathing
            .find_path(ctx.env, me.location, prey, DirectionSet::PLANAR)
            .and_then(|path| path.first().copied())
            .map_or_else(Decision::idle, |direction| Decision {
                action: Action::Move { direction },
                priority: ActionPriority::High,
                job: None,
            })
    }
}

/// Whether `a` and `b` are planar neighbours (or the same tile).
pub fn is_adjacent(a: IntVector3, b: IntVector3) -> bool {
    a.z == b.z && a.x.abs_diff(b.x) <= 1 && a.y.abs_diff(b.y) <= 1
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use delve_jobs::{Designation, JobTuning};
    use delve_types::{DesignationType, IntBox, IntSize3, MaterialId};
    use delve_world::{GridPathfinder, TileData};

    use super::*;

    struct Fixture {
        env: Environment,
        jobs: JobBoard,
        pathing: GridPathfinder,
        log: Vec<EventLogEntry>,
        manager: JobManager,
    }

    impl Fixture {
        /// An 8x8 floor with a rock wall at (6, 1).
        fn new() -> Self {
            let mut env = Environment::new(IntSize3::new(8, 8, 1));
            env.fill(
                IntBox::from_corners(IntVector3::new(0, 0, 0), IntVector3::new(7, 7, 0)),
                TileData::floor(MaterialId::Granite),
            )
            .unwrap();
            env.set_tile(IntVector3::new(6, 1, 0), TileData::wall(MaterialId::Granite))
                .unwrap();
            env.drain_events();
            Self {
                env,
                jobs: JobBoard::default(),
                pathing: GridPathfinder::default(),
                log: Vec::new(),
                manager: JobManager::new(),
            }
        }

        fn ctx(&mut self) -> AiContext<'_> {
            AiContext {
                tick: 1,
                env: &mut self.env,
                jobs: &mut self.jobs,
                pathing: &self.pathing,
                log: &mut self.log,
                manager: &mut self.manager,
            }
        }
    }

    fn at(x: i32, y: i32) -> WorkerView {
        WorkerView {
            id: ObjectId::new(),
            location: IntVector3::new(x, y, 0),
            carrying: None,
        }
    }

    #[test]
    fn manual_ai_waits_for_intents() {
        let mut fixture = Fixture::new();
        let mut ai = Ai::manual();
        assert!(ai.decide(&mut fixture.ctx(), &at(0, 0)).is_none());

        let step = Action::Move {
            direction: Direction::East,
        };
        assert!(ai.push_intent(step.clone()));
        let decision = ai.decide(&mut fixture.ctx(), &at(0, 0)).unwrap();
        assert_eq!(decision.action, step);
        assert_eq!(decision.priority, ActionPriority::User);
        assert!(ai.is_user_controlled());
    }

    #[test]
    fn idle_dwarf_waits() {
        let mut fixture = Fixture::new();
        let mut ai = Ai::dwarf_work();
        let decision = ai.decide(&mut fixture.ctx(), &at(0, 0)).unwrap();
        assert_eq!(decision, Decision::idle());
        assert!(!ai.push_intent(Action::Wait { ticks: 1 }));
    }

    #[test]
    fn dwarf_takes_a_mining_assignment() {
        let mut fixture = Fixture::new();
        let mut designation = Designation::new(&JobTuning::default());
        designation.add_area(
            &fixture.env,
            IntBox::single(IntVector3::new(6, 1, 0)),
            DesignationType::Mine,
        );
        fixture.manager.register(Box::new(designation));

        let mut ai = Ai::dwarf_work();
        let me = at(5, 1);
        let decision = ai.decide(&mut fixture.ctx(), &me).unwrap();
        assert!(matches!(decision.action, Action::Mine { .. }));
        assert_eq!(decision.job, ai.current_job());
        assert!(decision.job.is_some());
    }

    #[test]
    fn dwarf_drops_leftovers_before_new_work() {
        let mut fixture = Fixture::new();
        let mut ai = Ai::dwarf_work();
        let item = ObjectId::new();
        let me = WorkerView {
            carrying: Some(item),
            ..at(2, 2)
        };
        let decision = ai.decide(&mut fixture.ctx(), &me).unwrap();
        assert_eq!(decision.action, Action::DropItem { item });
    }

    #[test]
    fn wandering_is_reproducible_for_a_seed() {
        let mut fixture = Fixture::new();
        let mut first = Ai::wander(7);
        let mut second = Ai::wander(7);
        for _ in 0..10 {
            let a = first.decide(&mut fixture.ctx(), &at(3, 3)).unwrap();
            let b = second.decide(&mut fixture.ctx(), &at(3, 3)).unwrap();
            assert_eq!(a, b);
            assert_eq!(a.priority, ActionPriority::Low);
        }
    }

    #[test]
    fn attacker_closes_in_then_strikes() {
        let mut fixture = Fixture::new();
        let prey = ObjectId::new();
        fixture.env.place_living(prey, IntVector3::new(4, 4, 0)).unwrap();
        let mut ai = Ai::attack(prey);

        let far = ai.decide(&mut fixture.ctx(), &at(0, 0)).unwrap();
        assert!(far.action.is_move());
        assert_eq!(far.priority, ActionPriority::High);

        let near = ai.decide(&mut fixture.ctx(), &at(3, 3)).unwrap();
        assert_eq!(near.action, Action::Attack { target: prey });
    }

    #[test]
    fn attacker_idles_when_prey_is_gone() {
        let mut fixture = Fixture::new();
        let mut ai = Ai::attack(ObjectId::new());
        let decision = ai.decide(&mut fixture.ctx(), &at(0, 0)).unwrap();
        assert_eq!(decision, Decision::idle());
    }
}
