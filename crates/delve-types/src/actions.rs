//! Actions performed by livings and their outcomes.
//!
//! An action takes [`Action::ticks`] ticks to perform. Its effect on the
//! environment is applied on the last tick, and the outcome is reported
//! back to whoever chose the action (the living's AI or its assignment).

use serde::{Deserialize, Serialize};

use crate::enums::{ConstructMode, DesignationType, ItemKind};
use crate::geometry::{Direction, IntVector3};
use crate::ids::ObjectId;

/// Ticks needed to dig a tile.
pub const MINE_TICKS: u32 = 3;
/// Ticks needed to fell a tree.
pub const FELL_TREE_TICKS: u32 = 3;
/// Ticks needed to build an item at a workbench.
pub const BUILD_ITEM_TICKS: u32 = 5;
/// Ticks needed to construct a floor, wall, or pavement.
pub const CONSTRUCT_TICKS: u32 = 4;

/// Something a living does over one or more ticks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Do nothing.
    Wait {
        /// Number of ticks to wait (at least one).
        ticks: u32,
    },
    /// Step to a neighbouring tile.
    Move {
        /// Direction of the step.
        direction: Direction,
    },
    /// Dig a tile (mine, dig stairs, or channel).
    Mine {
        /// The tile being dug.
        location: IntVector3,
        /// Which kind of digging.
        kind: DesignationType,
    },
    /// Cut down a tree.
    FellTree {
        /// The tree's tile.
        location: IntVector3,
    },
    /// Pick up an item lying on the living's tile.
    GetItem {
        /// The item.
        item: ObjectId,
    },
    /// Drop the carried item on the living's tile.
    DropItem {
        /// The item.
        item: ObjectId,
    },
    /// Turn source items at a workbench into a product.
    BuildItem {
        /// The workbench.
        workbench: ObjectId,
        /// Items consumed by the build.
        sources: Vec<ObjectId>,
        /// What is built.
        product: ItemKind,
    },
    /// Build a floor, wall, or pavement using the carried item.
    Construct {
        /// The construction site.
        location: IntVector3,
        /// What is built there.
        mode: ConstructMode,
        /// The material item consumed.
        item: ObjectId,
    },
    /// Hit another living.
    Attack {
        /// The living being attacked.
        target: ObjectId,
    },
}

impl Action {
    /// Number of ticks the action takes.
    pub fn ticks(&self) -> u32 {
        match self {
            Self::Wait { ticks } => (*ticks).max(1),
            Self::Move { .. }
            | Self::GetItem { .. }
            | Self::DropItem { .. }
            | Self::Attack { .. } => 1,
            Self::Mine { .. } => MINE_TICKS,
            Self::FellTree { .. } => FELL_TREE_TICKS,
            Self::BuildItem { .. } => BUILD_ITEM_TICKS,
            Self::Construct { .. } => CONSTRUCT_TICKS,
        }
    }

    /// Whether the action is a plain step.
    pub const fn is_move(&self) -> bool {
        matches!(self, Self::Move { .. })
    }
}

/// Result of performing an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionOutcome {
    /// The effect was applied.
    Success,
    /// The action could not be performed (blocked, target gone, ...).
    Fail,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_takes_at_least_one_tick() {
        assert_eq!(Action::Wait { ticks: 0 }.ticks(), 1);
        assert_eq!(Action::Wait { ticks: 4 }.ticks(), 4);
    }

    #[test]
    fn work_actions_take_longer_than_moves() {
        let step = Action::Move {
            direction: Direction::North,
        };
        let dig = Action::Mine {
            location: IntVector3::new(0, 0, 0),
            kind: DesignationType::Mine,
        };
        assert!(step.is_move());
        assert!(dig.ticks() > step.ticks());
    }
}
