//! Per-tile terrain data.

use delve_types::{InteriorId, MaterialId, TerrainId};
use serde::{Deserialize, Serialize};

/// Terrain and interior of a single tile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileData {
    /// Base terrain.
    pub terrain: TerrainId,
    /// Material of the terrain.
    pub terrain_material: MaterialId,
    /// What stands on the terrain.
    pub interior: InteriorId,
    /// Material of the interior.
    pub interior_material: MaterialId,
}

impl TileData {
    /// Open air.
    pub const EMPTY: Self = Self {
        terrain: TerrainId::Empty,
        terrain_material: MaterialId::Undefined,
        interior: InteriorId::Empty,
        interior_material: MaterialId::Undefined,
    };

    /// A natural floor of the given material.
    pub const fn floor(material: MaterialId) -> Self {
        Self {
            terrain: TerrainId::NaturalFloor,
            terrain_material: material,
            interior: InteriorId::Empty,
            interior_material: MaterialId::Undefined,
        }
    }

    /// Solid natural rock of the given material.
    pub const fn wall(material: MaterialId) -> Self {
        Self {
            terrain: TerrainId::NaturalWall,
            terrain_material: material,
            interior: InteriorId::Empty,
            interior_material: MaterialId::Undefined,
        }
    }

    /// A natural floor with a grown tree of the given wood.
    pub const fn tree(ground: MaterialId, wood: MaterialId) -> Self {
        Self {
            terrain: TerrainId::NaturalFloor,
            terrain_material: ground,
            interior: InteriorId::Tree,
            interior_material: wood,
        }
    }

    /// Replace the interior.
    pub const fn with_interior(self, interior: InteriorId, material: MaterialId) -> Self {
        Self {
            interior,
            interior_material: material,
            ..self
        }
    }

    /// A living can stand here.
    pub const fn is_walkable(&self) -> bool {
        self.terrain.is_floor() && !self.interior.is_blocking()
    }

    /// Can be mined into a floor.
    pub const fn is_minable(&self) -> bool {
        matches!(self.terrain, TerrainId::NaturalWall)
    }

    /// Holds a tree that can be cut down.
    pub const fn is_fellable(&self) -> bool {
        matches!(self.interior, InteriorId::Tree)
    }

    /// Can be channelled (natural floor with nothing on it).
    pub const fn is_channelable(&self) -> bool {
        matches!(self.terrain, TerrainId::NaturalFloor) && self.interior.is_clear()
    }

    /// Has stairs.
    pub const fn has_stairs(&self) -> bool {
        matches!(self.interior, InteriorId::Stairs)
    }
}
