//! Livings: dwarves and animals that take turns in the world.
//!
//! A living owns its [`Ai`] and at most one action in progress. Its
//! position is kept by the environment, so path queries and item handling
//! see the same coordinates the scheduler moves.

use delve_types::{Action, ActionPriority, IntVector3, JobId, LivingKind, ObjectId};
use serde::Serialize;

use crate::ai::{Ai, Decision};

/// Hit points a new living starts with.
pub const DEFAULT_HIT_POINTS: u32 = 10;

/// An action being performed over one or more ticks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentAction {
    /// What is being done.
    pub action: Action,
    /// How urgent the AI considered it.
    pub priority: ActionPriority,
    /// Turns left before the action takes effect.
    pub ticks_left: u32,
    /// Total turns the action takes.
    pub total_ticks: u32,
    /// Assignment the action belongs to.
    pub job: Option<JobId>,
}

impl From<Decision> for CurrentAction {
    fn from(decision: Decision) -> Self {
        let total_ticks = decision.action.ticks();
        Self {
            action: decision.action,
            priority: decision.priority,
            ticks_left: total_ticks,
            total_ticks,
            job: decision.job,
        }
    }
}

/// A creature in the world.
#[derive(Debug)]
pub struct Living {
    id: ObjectId,
    name: String,
    kind: LivingKind,
    hit_points: u32,
    ai: Ai,
    current: Option<CurrentAction>,
    last_turn: Option<u64>,
}

impl Living {
    /// A new living with full hit points.
    pub fn new(name: impl Into<String>, kind: LivingKind, ai: Ai) -> Self {
        Self {
            id: ObjectId::new(),
            name: name.into(),
            kind,
            hit_points: DEFAULT_HIT_POINTS,
            ai,
            current: None,
            last_turn: None,
        }
    }

    /// Unique identifier.
    pub const fn id(&self) -> ObjectId {
        self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dwarf or animal.
    pub const fn kind(&self) -> LivingKind {
        self.kind
    }

    /// Remaining hit points.
    pub const fn hit_points(&self) -> u32 {
        self.hit_points
    }

    /// The decision maker.
    pub const fn ai(&self) -> &Ai {
        &self.ai
    }

    /// Mutable access to the decision maker.
    pub const fn ai_mut(&mut self) -> &mut Ai {
        &mut self.ai
    }

    /// The action in progress, if any.
    pub const fn current_action(&self) -> Option<&CurrentAction> {
        self.current.as_ref()
    }

    /// Whether the living has decided what to do this turn.
    pub const fn is_ready(&self) -> bool {
        self.current.is_some()
    }

    /// Begin a new action.
    ///
    /// # Panics
    ///
    /// Panics if an action is already in progress.
    pub fn start_action(&mut self, decision: Decision) {
        assert!(
            self.current.is_none(),
            "living {} started an action while another is in progress",
            self.id
        );
        self.current = Some(decision.into());
    }

    /// Spend this tick's turn on the current action. Returns the action
    /// when it takes effect now.
    ///
    /// # Panics
    ///
    /// Panics if the living already had a turn in `tick`.
    pub fn take_turn(&mut self, tick: u64) -> Option<CurrentAction> {
        assert!(
            self.last_turn != Some(tick),
            "living {} took two turns in tick {tick}",
            self.id
        );
        self.last_turn = Some(tick);
        let current = self.current.as_mut()?;
        current.ticks_left = current.ticks_left.saturating_sub(1);
        if current.ticks_left > 0 {
            return None;
        }
        self.current.take()
    }

    /// Drop the in-progress action without performing it.
    pub fn cancel_action(&mut self) -> Option<CurrentAction> {
        self.current.take()
    }

    /// Subtract `amount` hit points. Returns the hit points left.
    pub const fn take_damage(&mut self, amount: u32) -> u32 {
        self.hit_points = self.hit_points.saturating_sub(amount);
        self.hit_points
    }

    /// The assignment this living works on, if any.
    pub fn job(&self) -> Option<JobId> {
        self.current
            .as_ref()
            .and_then(|current| current.job)
            .or_else(|| self.ai.current_job())
    }

    /// A serializable view of the living at `location`.
    pub fn snapshot(&self, location: Option<IntVector3>) -> LivingSnapshot {
        LivingSnapshot {
            id: self.id,
            name: self.name.clone(),
            kind: self.kind,
            location,
            hit_points: self.hit_points,
            action: self.current.as_ref().map(|current| current.action.clone()),
            job: self.job(),
        }
    }
}

/// Point-in-time view of a living for observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[allow(missing_docs)]
pub struct LivingSnapshot {
    pub id: ObjectId,
    pub name: String,
    pub kind: LivingKind,
    pub location: Option<IntVector3>,
    pub hit_points: u32,
    pub action: Option<Action>,
    pub job: Option<JobId>,
}

#[cfg(test)]
mod tests {
    use delve_types::DesignationType;

    use super::*;

    fn dig() -> Decision {
        Decision {
            action: Action::Mine {
                location: IntVector3::new(1, 0, 0),
                kind: DesignationType::Mine,
            },
            priority: ActionPriority::Normal,
            job: None,
        }
    }

    #[test]
    fn multi_tick_action_takes_effect_on_last_turn() {
        let mut living = Living::new("Urist", LivingKind::Dwarf, Ai::manual());
        living.start_action(dig());
        assert!(living.take_turn(1).is_none());
        assert!(living.take_turn(2).is_none());
        let done = living.take_turn(3);
        assert!(matches!(done.map(|c| c.action), Some(Action::Mine { .. })));
        assert!(!living.is_ready());
    }

    #[test]
    #[should_panic(expected = "two turns")]
    fn two_turns_in_one_tick_panic() {
        let mut living = Living::new("Urist", LivingKind::Dwarf, Ai::manual());
        living.start_action(dig());
        living.take_turn(1);
        living.take_turn(1);
    }

    #[test]
    fn damage_saturates_at_zero() {
        let mut living = Living::new("Rat", LivingKind::Animal, Ai::wander(1));
        assert_eq!(living.take_damage(4), DEFAULT_HIT_POINTS.saturating_sub(4));
        assert_eq!(living.take_damage(100), 0);
    }
}
