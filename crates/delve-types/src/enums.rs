//! Enumeration types shared across the Delve workspace.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// Lifecycle status of a job.
///
/// A job starts in [`JobStatus::Ok`] and transitions exactly once to one of
/// the terminal states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// In progress (or waiting for a worker).
    #[default]
    Ok,
    /// Completed successfully.
    Done,
    /// Interrupted; the work item may be retried.
    Abort,
    /// Cannot succeed under current conditions.
    Fail,
}

impl JobStatus {
    /// Whether the status is one of the terminal states.
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Ok)
    }
}

/// Kind of terrain-affecting work a designated tile is queued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DesignationType {
    /// Dig out a natural wall, leaving a floor.
    Mine,
    /// Dig out a natural wall, leaving a floor with stairs.
    CreateStairs,
    /// Remove a natural floor, opening the level below.
    Channel,
    /// Cut down a tree.
    FellTree,
}

/// What a construction site builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConstructMode {
    /// A floor over empty space.
    Floor,
    /// A wall on an open floor.
    Wall,
    /// Paving over a natural floor.
    Pavement,
}

// ---------------------------------------------------------------------------
// World engine
// ---------------------------------------------------------------------------

/// State of the world tick state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorldState {
    /// Between ticks; waiting for the minimum tick interval and start gate.
    #[default]
    Idle,
    /// Livings are deciding and executing actions.
    TickOngoing,
    /// All turns are done; post-processing runs next.
    TickDone,
    /// Post-processing is done; the world returns to idle next.
    TickEnded,
}

/// How livings' turns are sequenced within a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnMode {
    /// Every living acts in a single pass once all have decided.
    #[default]
    Simultaneous,
    /// Livings act one at a time in a fixed list order.
    Sequential,
}

/// Priority of a living's current action.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ActionPriority {
    /// Idle filler (waiting around).
    #[default]
    Idle,
    /// Self-generated behaviour (wandering).
    Low,
    /// Job work.
    Normal,
    /// Fighting.
    High,
    /// Direct player orders.
    User,
}

/// Broad category of a living.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LivingKind {
    /// A colonist able to take jobs.
    Dwarf,
    /// A wild animal.
    Animal,
}

// ---------------------------------------------------------------------------
// Terrain
// ---------------------------------------------------------------------------

/// Base terrain of a tile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerrainId {
    /// Open air.
    #[default]
    Empty,
    /// Natural ground.
    NaturalFloor,
    /// Natural rock.
    NaturalWall,
    /// Constructed floor.
    BuiltFloor,
    /// Constructed wall.
    BuiltWall,
    /// Paved natural floor.
    Pavement,
}

impl TerrainId {
    /// Whether a living can stand on this terrain.
    pub const fn is_floor(self) -> bool {
        matches!(self, Self::NaturalFloor | Self::BuiltFloor | Self::Pavement)
    }

    /// Whether this terrain is solid rock or a built wall.
    pub const fn is_wall(self) -> bool {
        matches!(self, Self::NaturalWall | Self::BuiltWall)
    }
}

/// What occupies a tile on top of its terrain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteriorId {
    /// Nothing.
    #[default]
    Empty,
    /// A fully grown tree (blocks movement).
    Tree,
    /// A young tree.
    Sapling,
    /// Grass.
    Grass,
    /// Stairs leading up and down.
    Stairs,
}

impl InteriorId {
    /// Whether the interior blocks movement.
    pub const fn is_blocking(self) -> bool {
        matches!(self, Self::Tree)
    }

    /// Whether the interior can be cleared away by construction.
    pub const fn is_clear(self) -> bool {
        matches!(self, Self::Empty | Self::Grass)
    }
}

// ---------------------------------------------------------------------------
// Materials and items
// ---------------------------------------------------------------------------

/// Concrete material of terrain or an item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MaterialId {
    /// No material.
    #[default]
    Undefined,
    /// Common rock.
    Granite,
    /// Soft rock.
    Limestone,
    /// Iron ore.
    Iron,
    /// Copper ore.
    Copper,
    /// Hard wood.
    Oak,
    /// Light wood.
    Birch,
    /// Precious gem.
    Diamond,
}

impl MaterialId {
    /// The category the material belongs to.
    pub const fn category(self) -> MaterialCategory {
        match self {
            Self::Undefined => MaterialCategory::Undefined,
            Self::Granite | Self::Limestone => MaterialCategory::Rock,
            Self::Iron | Self::Copper => MaterialCategory::Metal,
            Self::Oak | Self::Birch => MaterialCategory::Wood,
            Self::Diamond => MaterialCategory::Gem,
        }
    }
}

/// Material family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MaterialCategory {
    /// No category.
    Undefined,
    /// Stone.
    Rock,
    /// Metal ore.
    Metal,
    /// Timber.
    Wood,
    /// Gemstone.
    Gem,
}

/// Kind of a movable item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    /// Loose rock from mining.
    Rock,
    /// Metal-bearing ore from mining.
    Ore,
    /// Uncut gem from mining.
    Gem,
    /// Timber from felling.
    Log,
    /// Dressed stone block.
    Block,
    /// Furniture: door.
    Door,
    /// Furniture: chair.
    Chair,
    /// Furniture: table.
    Table,
    /// Furniture: bed.
    Bed,
}

/// Kind of a workbench; restricts which products it can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkbenchKind {
    /// Cuts rock into blocks.
    Mason,
    /// Builds wooden furniture.
    Carpenter,
}

impl WorkbenchKind {
    /// Whether this workbench can build `product`.
    pub const fn can_build(self, product: ItemKind) -> bool {
        match self {
            Self::Mason => matches!(product, ItemKind::Block),
            Self::Carpenter => matches!(
                product,
                ItemKind::Door | ItemKind::Chair | ItemKind::Table | ItemKind::Bed
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_ok_is_non_terminal() {
        assert!(!JobStatus::Ok.is_terminal());
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Abort.is_terminal());
        assert!(JobStatus::Fail.is_terminal());
    }

    #[test]
    fn priorities_are_ordered() {
        assert!(ActionPriority::User > ActionPriority::Normal);
        assert!(ActionPriority::Normal > ActionPriority::Idle);
    }

    #[test]
    fn workbench_products() {
        assert!(WorkbenchKind::Mason.can_build(ItemKind::Block));
        assert!(!WorkbenchKind::Mason.can_build(ItemKind::Door));
        assert!(WorkbenchKind::Carpenter.can_build(ItemKind::Bed));
    }

    #[test]
    fn turn_mode_parses_snake_case() {
        let mode: TurnMode = serde_json::from_str("\"sequential\"").unwrap_or_default();
        assert_eq!(mode, TurnMode::Sequential);
    }
}
