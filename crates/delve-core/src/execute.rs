//! Applying a living's action to the environment.
//!
//! Attacks touch other livings and are resolved by the world itself; every
//! other action is a single environment operation.

use delve_types::{Action, ActionOutcome, ObjectId};
use delve_world::{Environment, WorldError};
use tracing::debug;

/// Perform `action` for `actor`.
///
/// # Errors
///
/// Returns the environment's error when the action is no longer possible,
/// for example a blocked step or a tile that was already dug.
pub fn perform(env: &mut Environment, actor: ObjectId, action: &Action) -> Result<(), WorldError> {
    match action {
        Action::Wait { .. } | Action::Attack { .. } => Ok(()),
        Action::Move { direction } => env.move_living(actor, *direction).map(drop),
        Action::Mine { location, kind } => env.dig(*location, *kind).map(drop),
        Action::FellTree { location } => env.fell_tree(*location).map(drop),
        Action::GetItem { item } => env.pick_up(*item, actor),
        Action::DropItem { item } => env.drop_item(*item, actor),
        Action::BuildItem {
            workbench,
            sources,
            product,
        } => env.build_item(*workbench, sources, *product).map(drop),
        Action::Construct {
            location,
            mode,
            item,
        } => env.construct(*location, *mode, *item),
    }
}

/// Perform `action` and fold the result into an outcome.
pub fn outcome_of(env: &mut Environment, actor: ObjectId, action: &Action) -> ActionOutcome {
    match perform(env, actor, action) {
        Ok(()) => ActionOutcome::Success,
        Err(err) => {
            debug!(living = %actor, ?action, %err, "Action failed");
            ActionOutcome::Fail
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use delve_types::{Direction, DesignationType, IntBox, IntSize3, IntVector3, ItemKind, MaterialId};
    use delve_world::{ItemObject, TileData};

    use super::*;

    fn floor() -> Environment {
        let mut env = Environment::new(IntSize3::new(4, 4, 1));
        env.fill(
            IntBox::from_corners(IntVector3::new(0, 0, 0), IntVector3::new(3, 3, 0)),
            TileData::floor(MaterialId::Granite),
        )
        .unwrap();
        env.set_tile(IntVector3::new(2, 0, 0), TileData::wall(MaterialId::Granite))
            .unwrap();
        env
    }

    #[test]
    fn step_moves_the_living() {
        let mut env = floor();
        let actor = ObjectId::new();
        env.place_living(actor, IntVector3::new(0, 0, 0)).unwrap();
        let step = Action::Move {
            direction: Direction::South,
        };
        assert_eq!(outcome_of(&mut env, actor, &step), ActionOutcome::Success);
        assert_eq!(env.living_location(actor), Some(IntVector3::new(0, 1, 0)));
    }

    #[test]
    fn blocked_step_fails() {
        let mut env = floor();
        let actor = ObjectId::new();
        env.place_living(actor, IntVector3::new(1, 0, 0)).unwrap();
        let step = Action::Move {
            direction: Direction::East,
        };
        assert_eq!(outcome_of(&mut env, actor, &step), ActionOutcome::Fail);
        assert_eq!(env.living_location(actor), Some(IntVector3::new(1, 0, 0)));
    }

    #[test]
    fn mining_twice_fails_the_second_time() {
        let mut env = floor();
        let actor = ObjectId::new();
        let dig = Action::Mine {
            location: IntVector3::new(2, 0, 0),
            kind: DesignationType::Mine,
        };
        assert!(perform(&mut env, actor, &dig).is_ok());
        assert!(env.is_walkable(IntVector3::new(2, 0, 0)));
        assert!(perform(&mut env, actor, &dig).is_err());
    }

    #[test]
    fn pick_up_then_drop() {
        let mut env = floor();
        let actor = ObjectId::new();
        env.place_living(actor, IntVector3::new(1, 1, 0)).unwrap();
        let log = env
            .add_item(ItemObject::new(ItemKind::Log, MaterialId::Oak, IntVector3::new(1, 1, 0)))
            .unwrap();

        perform(&mut env, actor, &Action::GetItem { item: log }).unwrap();
        assert_eq!(env.carried_by(actor).map(ItemObject::id), Some(log));
        perform(&mut env, actor, &Action::DropItem { item: log }).unwrap();
        assert!(env.carried_by(actor).is_none());
        assert_eq!(
            env.item(log).and_then(ItemObject::ground_location),
            Some(IntVector3::new(1, 1, 0))
        );
    }
}
