//! The environment: a dense 3D tile grid plus the items, workbenches and
//! living positions placed on it.
//!
//! Every mutation that job sources care about is recorded in an outbox of
//! [`EnvironmentEvent`]s. The world drains the outbox after each step and
//! forwards the events to the registered job sources, so sources never
//! hold callbacks into the environment.
//!
//! Reservation fields on items are only ever written through
//! [`Environment::reserve_item`], [`Environment::release_item`],
//! [`Environment::set_stockpiled_by`] and
//! [`Environment::clear_stockpiled_by`]. Those helpers assert the
//! claim-only-if-empty / release-only-if-self discipline.

use std::collections::BTreeMap;

use delve_types::{
    ConstructMode, DesignationType, Direction, IntBox, IntSize3, IntVector3, InteriorId, ItemKind,
    JobSourceId, MaterialCategory, MaterialId, ObjectId, TerrainId, WorkbenchKind,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::WorldError;
use crate::item::{ItemLocation, ItemObject};
use crate::tile::TileData;

/// A fixed workstation where items are built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workbench {
    /// Unique id.
    pub id: ObjectId,
    /// What the workbench can build.
    pub kind: WorkbenchKind,
    /// Tile the workbench stands on. Workers build while standing here.
    pub location: IntVector3,
}

/// A change to the environment observed by job sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentEvent {
    /// A tile's terrain or interior changed.
    TerrainChanged {
        /// The tile.
        location: IntVector3,
    },
    /// An item appeared on the ground.
    ObjectAdded {
        /// The item.
        object: ObjectId,
        /// Where it appeared.
        location: IntVector3,
    },
    /// An item was destroyed or consumed.
    ObjectRemoved {
        /// The item.
        object: ObjectId,
        /// Where it lay, if it was on the ground.
        location: Option<IntVector3>,
    },
    /// An item changed place. `None` means carried.
    ObjectMoved {
        /// The item.
        object: ObjectId,
        /// Previous ground position.
        from: Option<IntVector3>,
        /// New ground position.
        to: Option<IntVector3>,
    },
    /// An item's reservation or stockpile membership changed.
    ItemStateChanged {
        /// The item.
        item: ObjectId,
    },
}

/// The tile map and everything on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    size: IntSize3,
    tiles: Vec<TileData>,
    items: BTreeMap<ObjectId, ItemObject>,
    workbenches: BTreeMap<ObjectId, Workbench>,
    livings: BTreeMap<ObjectId, IntVector3>,
    #[serde(skip)]
    events: Vec<EnvironmentEvent>,
}

impl Environment {
    /// Create a map of the given size filled with open air.
    pub fn new(size: IntSize3) -> Self {
        Self {
            size,
            tiles: vec![TileData::EMPTY; size.volume()],
            items: BTreeMap::new(),
            workbenches: BTreeMap::new(),
            livings: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    /// Map dimensions.
    pub const fn size(&self) -> IntSize3 {
        self.size
    }

    /// The whole map as a box.
    pub fn bounds(&self) -> IntBox {
        let max = |extent: u32| i32::try_from(extent).unwrap_or(i32::MAX).saturating_sub(1);
        IntBox::from_corners(
            IntVector3::new(0, 0, 0),
            IntVector3::new(max(self.size.width), max(self.size.height), max(self.size.depth)),
        )
    }

    /// Whether `p` lies on the map.
    pub fn contains(&self, p: IntVector3) -> bool {
        self.index(p).is_some()
    }

    fn index(&self, p: IntVector3) -> Option<usize> {
        let x = u32::try_from(p.x).ok().filter(|&x| x < self.size.width)?;
        let y = u32::try_from(p.y).ok().filter(|&y| y < self.size.height)?;
        let z = u32::try_from(p.z).ok().filter(|&z| z < self.size.depth)?;
        let width = u64::from(self.size.width);
        let height = u64::from(self.size.height);
        let idx = u64::from(z)
            .checked_mul(height)?
            .checked_add(u64::from(y))?
            .checked_mul(width)?
            .checked_add(u64::from(x))?;
        usize::try_from(idx).ok()
    }

    // -------------------------------------------------------------------
    // Tiles
    // -------------------------------------------------------------------

    /// Tile data at `p`, or `None` off the map.
    pub fn tile(&self, p: IntVector3) -> Option<TileData> {
        self.index(p).and_then(|i| self.tiles.get(i)).copied()
    }

    /// Replace the tile at `p`. Emits [`EnvironmentEvent::TerrainChanged`]
    /// when the tile actually changes.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::OutOfBounds`] if `p` is off the map.
    pub fn set_tile(&mut self, p: IntVector3, tile: TileData) -> Result<(), WorldError> {
        let slot = self
            .index(p)
            .and_then(|i| self.tiles.get_mut(i))
            .ok_or(WorldError::OutOfBounds(p))?;
        if *slot != tile {
            *slot = tile;
            self.events.push(EnvironmentEvent::TerrainChanged { location: p });
        }
        Ok(())
    }

    /// Set every tile of `area` to `tile`.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::OutOfBounds`] if the area leaves the map.
    pub fn fill(&mut self, area: IntBox, tile: TileData) -> Result<(), WorldError> {
        for p in area.iter() {
            self.set_tile(p, tile)?;
        }
        Ok(())
    }

    /// A living can stand on `p`.
    pub fn is_walkable(&self, p: IntVector3) -> bool {
        self.tile(p).is_some_and(|t| t.is_walkable())
    }

    /// `p` is natural rock that can be mined.
    pub fn is_minable(&self, p: IntVector3) -> bool {
        self.tile(p).is_some_and(|t| t.is_minable())
    }

    /// Stairs can be dug into `p`.
    pub fn can_create_stairs(&self, p: IntVector3) -> bool {
        self.is_minable(p)
    }

    /// `p` holds a tree.
    pub fn is_fellable(&self, p: IntVector3) -> bool {
        self.tile(p).is_some_and(|t| t.is_fellable())
    }

    /// `p` can be channelled into the level below.
    pub fn is_channelable(&self, p: IntVector3) -> bool {
        self.tile(p).is_some_and(|t| t.is_channelable())
    }

    /// Whether `p` is a valid target for a designation of `kind`.
    pub fn is_designatable(&self, p: IntVector3, kind: DesignationType) -> bool {
        match kind {
            DesignationType::Mine => self.is_minable(p),
            DesignationType::CreateStairs => self.can_create_stairs(p),
            DesignationType::Channel => self.is_channelable(p),
            DesignationType::FellTree => self.is_fellable(p),
        }
    }

    /// Whether `p` can take a construction of `mode`.
    pub fn can_construct(&self, p: IntVector3, mode: ConstructMode) -> bool {
        let Some(tile) = self.tile(p) else {
            return false;
        };
        match mode {
            ConstructMode::Floor => matches!(tile.terrain, TerrainId::Empty),
            ConstructMode::Wall => {
                tile.terrain.is_floor()
                    && tile.interior.is_clear()
                    && self.items_at(p).next().is_none()
            }
            ConstructMode::Pavement => tile.is_channelable(),
        }
    }

    /// Whether a living at `from` can step in `direction`.
    ///
    /// Planar steps need a walkable destination. Vertical steps additionally
    /// need stairs on both tiles.
    pub fn can_move(&self, from: IntVector3, direction: Direction) -> bool {
        let to = from.offset(direction);
        if !self.is_walkable(to) {
            return false;
        }
        if direction.is_planar() {
            return true;
        }
        let stairs = |p| self.tile(p).is_some_and(|t: TileData| t.has_stairs());
        stairs(from) && stairs(to)
    }

    // -------------------------------------------------------------------
    // Terrain mutations
    // -------------------------------------------------------------------

    /// Dig `p` according to `kind`. Returns the id of the item produced by
    /// the dig, if any.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidTerrain`] if `p` is not a valid target
    /// for `kind`.
    pub fn dig(
        &mut self,
        p: IntVector3,
        kind: DesignationType,
    ) -> Result<Option<ObjectId>, WorldError> {
        if !self.is_designatable(p, kind) {
            return Err(invalid(p, format!("cannot {kind:?} here")));
        }
        let tile = self.tile(p).ok_or(WorldError::OutOfBounds(p))?;
        match kind {
            DesignationType::Mine | DesignationType::CreateStairs => {
                let mut floor = TileData::floor(tile.terrain_material);
                if kind == DesignationType::CreateStairs {
                    floor = floor.with_interior(InteriorId::Stairs, tile.terrain_material);
                }
                self.set_tile(p, floor)?;
                let yielded = mined_item_kind(tile.terrain_material)
                    .map(|item| self.add_item(ItemObject::new(item, tile.terrain_material, p)))
                    .transpose()?;
                debug!(location = %p, ?kind, "Tile dug");
                Ok(yielded)
            }
            DesignationType::Channel => {
                self.set_tile(p, TileData::EMPTY)?;
                let below = p.offset(Direction::Down);
                if let Some(under) = self.tile(below) {
                    if under.is_minable() {
                        self.set_tile(below, TileData::floor(under.terrain_material))?;
                    }
                    let fallen: Vec<ObjectId> = self.items_at(p).map(ItemObject::id).collect();
                    for item in fallen {
                        self.move_item(item, below)?;
                    }
                }
                debug!(location = %p, "Tile channelled");
                Ok(None)
            }
            DesignationType::FellTree => self.fell_tree(p).map(Some),
        }
    }

    /// Cut down the tree at `p`, leaving a log behind.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidTerrain`] if there is no tree at `p`.
    pub fn fell_tree(&mut self, p: IntVector3) -> Result<ObjectId, WorldError> {
        let tile = self
            .tile(p)
            .filter(TileData::is_fellable)
            .ok_or_else(|| invalid(p, "no tree to fell"))?;
        self.set_tile(p, tile.with_interior(InteriorId::Empty, MaterialId::Undefined))?;
        debug!(location = %p, "Tree felled");
        self.add_item(ItemObject::new(ItemKind::Log, tile.interior_material, p))
    }

    /// Construct at `p` consuming `item`.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidTerrain`] if the tile does not accept the
    /// construction and [`WorldError::ItemNotFound`] if the item is gone.
    pub fn construct(
        &mut self,
        p: IntVector3,
        mode: ConstructMode,
        item: ObjectId,
    ) -> Result<(), WorldError> {
        let material = self.item(item).ok_or(WorldError::ItemNotFound(item))?.material;
        // A wall may not be built over items; the consumed material item is
        // carried, so it does not count.
        if !self.can_construct(p, mode) {
            return Err(invalid(p, format!("cannot construct {mode:?} here")));
        }
        let tile = self.tile(p).ok_or(WorldError::OutOfBounds(p))?;
        let terrain = match mode {
            ConstructMode::Floor => TerrainId::BuiltFloor,
            ConstructMode::Wall => TerrainId::BuiltWall,
            ConstructMode::Pavement => TerrainId::Pavement,
        };
        self.remove_item(item);
        self.set_tile(
            p,
            TileData {
                terrain,
                terrain_material: material,
                interior: if mode == ConstructMode::Pavement {
                    tile.interior
                } else {
                    InteriorId::Empty
                },
                interior_material: if mode == ConstructMode::Pavement {
                    tile.interior_material
                } else {
                    MaterialId::Undefined
                },
            },
        )?;
        debug!(location = %p, ?mode, "Construction finished");
        Ok(())
    }

    /// Consume `sources` lying at the workbench and place `product` there.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::WorkbenchNotFound`] for an unknown workbench and
    /// [`WorldError::ItemNotAt`] if a source item is not on the workbench tile.
    pub fn build_item(
        &mut self,
        workbench: ObjectId,
        sources: &[ObjectId],
        product: ItemKind,
    ) -> Result<ObjectId, WorldError> {
        let bench = *self
            .workbenches
            .get(&workbench)
            .ok_or(WorldError::WorkbenchNotFound(workbench))?;
        let mut material = MaterialId::Undefined;
        for &source in sources {
            let item = self.item(source).ok_or(WorldError::ItemNotFound(source))?;
            if item.ground_location() != Some(bench.location) {
                return Err(WorldError::ItemNotAt {
                    item: source,
                    location: bench.location,
                });
            }
            if material == MaterialId::Undefined {
                material = item.material;
            }
        }
        for &source in sources {
            self.remove_item(source);
        }
        debug!(workbench = %workbench, ?product, "Item built");
        self.add_item(ItemObject::new(product, material, bench.location))
    }

    // -------------------------------------------------------------------
    // Items
    // -------------------------------------------------------------------

    /// Place a new item on the map.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::OutOfBounds`] if the item lies off the map.
    pub fn add_item(&mut self, item: ItemObject) -> Result<ObjectId, WorldError> {
        let id = item.id;
        let location = match item.location {
            ItemLocation::Ground(p) => p,
            ItemLocation::Carried(living) => self
                .living_location(living)
                .ok_or(WorldError::LivingNotFound(living))?,
        };
        if !self.contains(location) {
            return Err(WorldError::OutOfBounds(location));
        }
        self.items.insert(id, item);
        self.events.push(EnvironmentEvent::ObjectAdded {
            object: id,
            location,
        });
        Ok(id)
    }

    /// Destroy an item. Returns it if it existed.
    pub fn remove_item(&mut self, id: ObjectId) -> Option<ItemObject> {
        let item = self.items.remove(&id)?;
        self.events.push(EnvironmentEvent::ObjectRemoved {
            object: id,
            location: item.ground_location(),
        });
        Some(item)
    }

    /// Look up an item.
    pub fn item(&self, id: ObjectId) -> Option<&ItemObject> {
        self.items.get(&id)
    }

    /// All items, in id order.
    pub fn items(&self) -> impl Iterator<Item = &ItemObject> {
        self.items.values()
    }

    /// Items lying on `p`.
    pub fn items_at(&self, p: IntVector3) -> impl Iterator<Item = &ItemObject> {
        self.items
            .values()
            .filter(move |item| item.ground_location() == Some(p))
    }

    /// The item carried by `living`, if any.
    pub fn carried_by(&self, living: ObjectId) -> Option<&ItemObject> {
        self.items
            .values()
            .find(|item| item.location == ItemLocation::Carried(living))
    }

    /// Move an item lying on the ground to another tile.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::ItemNotFound`] or [`WorldError::OutOfBounds`].
    pub fn move_item(&mut self, id: ObjectId, to: IntVector3) -> Result<(), WorldError> {
        if !self.contains(to) {
            return Err(WorldError::OutOfBounds(to));
        }
        let item = self.items.get_mut(&id).ok_or(WorldError::ItemNotFound(id))?;
        let from = item.ground_location();
        item.location = ItemLocation::Ground(to);
        self.events.push(EnvironmentEvent::ObjectMoved {
            object: id,
            from,
            to: Some(to),
        });
        Ok(())
    }

    /// `living` picks up an item lying on its tile.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::ItemNotAt`] if the item is not on the living's tile.
    pub fn pick_up(&mut self, id: ObjectId, living: ObjectId) -> Result<(), WorldError> {
        let at = self
            .living_location(living)
            .ok_or(WorldError::LivingNotFound(living))?;
        let item = self.items.get_mut(&id).ok_or(WorldError::ItemNotFound(id))?;
        if item.ground_location() != Some(at) {
            return Err(WorldError::ItemNotAt {
                item: id,
                location: at,
            });
        }
        item.location = ItemLocation::Carried(living);
        trace!(item = %id, living = %living, "Item picked up");
        self.events.push(EnvironmentEvent::ObjectMoved {
            object: id,
            from: Some(at),
            to: None,
        });
        Ok(())
    }

    /// `living` drops the item it carries on its tile.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::ItemNotAt`] if the living does not carry the item.
    pub fn drop_item(&mut self, id: ObjectId, living: ObjectId) -> Result<(), WorldError> {
        let at = self
            .living_location(living)
            .ok_or(WorldError::LivingNotFound(living))?;
        let item = self.items.get_mut(&id).ok_or(WorldError::ItemNotFound(id))?;
        if item.location != ItemLocation::Carried(living) {
            return Err(WorldError::ItemNotAt {
                item: id,
                location: at,
            });
        }
        item.location = ItemLocation::Ground(at);
        trace!(item = %id, living = %living, "Item dropped");
        self.events.push(EnvironmentEvent::ObjectMoved {
            object: id,
            from: None,
            to: Some(at),
        });
        Ok(())
    }

    // -------------------------------------------------------------------
    // Reservations
    // -------------------------------------------------------------------

    /// Claim `id` for `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::ItemNotFound`] if the item does not exist.
    ///
    /// # Panics
    ///
    /// Panics if the item is already reserved.
    pub fn reserve_item(&mut self, id: ObjectId, owner: JobSourceId) -> Result<(), WorldError> {
        let item = self.items.get_mut(&id).ok_or(WorldError::ItemNotFound(id))?;
        assert!(
            item.reserved_by.is_none(),
            "item {id} reserved by {owner} while already reserved by {:?}",
            item.reserved_by
        );
        item.reserved_by = Some(owner);
        self.events.push(EnvironmentEvent::ItemStateChanged { item: id });
        Ok(())
    }

    /// Release `owner`'s claim on `id`. A no-op if the item no longer exists.
    ///
    /// # Panics
    ///
    /// Panics if the item is reserved by someone else or not at all.
    pub fn release_item(&mut self, id: ObjectId, owner: JobSourceId) {
        let Some(item) = self.items.get_mut(&id) else {
            return;
        };
        assert_eq!(
            item.reserved_by,
            Some(owner),
            "item {id} released by a source that does not hold it"
        );
        item.reserved_by = None;
        self.events.push(EnvironmentEvent::ItemStateChanged { item: id });
    }

    /// Mark `id` as stored in stockpile `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::ItemNotFound`] if the item does not exist.
    ///
    /// # Panics
    ///
    /// Panics if the item belongs to another stockpile.
    pub fn set_stockpiled_by(&mut self, id: ObjectId, owner: JobSourceId) -> Result<(), WorldError> {
        let item = self.items.get_mut(&id).ok_or(WorldError::ItemNotFound(id))?;
        assert!(
            item.stockpiled_by.is_none_or(|current| current == owner),
            "item {id} stockpiled twice"
        );
        item.stockpiled_by = Some(owner);
        self.events.push(EnvironmentEvent::ItemStateChanged { item: id });
        Ok(())
    }

    /// Remove `id` from stockpile `owner`. A no-op if the item no longer exists.
    ///
    /// # Panics
    ///
    /// Panics if the item is not stored in `owner`.
    pub fn clear_stockpiled_by(&mut self, id: ObjectId, owner: JobSourceId) {
        let Some(item) = self.items.get_mut(&id) else {
            return;
        };
        assert_eq!(
            item.stockpiled_by,
            Some(owner),
            "item {id} removed from a stockpile it is not in"
        );
        item.stockpiled_by = None;
        self.events.push(EnvironmentEvent::ItemStateChanged { item: id });
    }

    // -------------------------------------------------------------------
    // Workbenches and livings
    // -------------------------------------------------------------------

    /// Place a workbench.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidTerrain`] if the tile is not walkable.
    pub fn add_workbench(
        &mut self,
        kind: WorkbenchKind,
        location: IntVector3,
    ) -> Result<ObjectId, WorldError> {
        if !self.is_walkable(location) {
            return Err(invalid(location, "workbench needs a walkable tile"));
        }
        let id = ObjectId::new();
        self.workbenches.insert(id, Workbench { id, kind, location });
        Ok(id)
    }

    /// Remove a workbench.
    pub fn remove_workbench(&mut self, id: ObjectId) -> Option<Workbench> {
        self.workbenches.remove(&id)
    }

    /// Look up a workbench.
    pub fn workbench(&self, id: ObjectId) -> Option<&Workbench> {
        self.workbenches.get(&id)
    }

    /// Put a living on the map.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::OutOfBounds`] if `p` is off the map.
    pub fn place_living(&mut self, id: ObjectId, p: IntVector3) -> Result<(), WorldError> {
        if !self.contains(p) {
            return Err(WorldError::OutOfBounds(p));
        }
        self.livings.insert(id, p);
        Ok(())
    }

    /// Step a living in `direction`.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidTerrain`] if the step is blocked.
    pub fn move_living(&mut self, id: ObjectId, direction: Direction) -> Result<IntVector3, WorldError> {
        let from = self.living_location(id).ok_or(WorldError::LivingNotFound(id))?;
        if !self.can_move(from, direction) {
            return Err(invalid(from.offset(direction), "blocked"));
        }
        let to = from.offset(direction);
        self.livings.insert(id, to);
        Ok(to)
    }

    /// Take a living off the map, dropping whatever it carries.
    pub fn remove_living(&mut self, id: ObjectId) {
        let Some(at) = self.livings.get(&id).copied() else {
            return;
        };
        if let Some(carried) = self.carried_by(id).map(ItemObject::id)
            && let Some(item) = self.items.get_mut(&carried)
        {
            item.location = ItemLocation::Ground(at);
            self.events.push(EnvironmentEvent::ObjectMoved {
                object: carried,
                from: None,
                to: Some(at),
            });
        }
        self.livings.remove(&id);
    }

    /// Where a living stands.
    pub fn living_location(&self, id: ObjectId) -> Option<IntVector3> {
        self.livings.get(&id).copied()
    }

    // -------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------

    /// Take all events recorded since the last drain.
    pub fn drain_events(&mut self) -> Vec<EnvironmentEvent> {
        std::mem::take(&mut self.events)
    }
}

/// Item produced by digging out rock of `material`.
pub const fn mined_item_kind(material: MaterialId) -> Option<ItemKind> {
    match material.category() {
        MaterialCategory::Rock => Some(ItemKind::Rock),
        MaterialCategory::Metal => Some(ItemKind::Ore),
        MaterialCategory::Gem => Some(ItemKind::Gem),
        MaterialCategory::Wood | MaterialCategory::Undefined => None,
    }
}

fn invalid(location: IntVector3, reason: impl Into<String>) -> WorldError {
    WorldError::InvalidTerrain {
        location,
        reason: reason.into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn small_map() -> Environment {
        let mut env = Environment::new(IntSize3::new(5, 5, 2));
        env.fill(
            IntBox::from_corners(IntVector3::new(0, 0, 0), IntVector3::new(4, 4, 0)),
            TileData::wall(MaterialId::Granite),
        )
        .unwrap();
        env.fill(
            IntBox::from_corners(IntVector3::new(0, 0, 1), IntVector3::new(4, 4, 1)),
            TileData::floor(MaterialId::Granite),
        )
        .unwrap();
        env.drain_events();
        env
    }

    #[test]
    fn out_of_bounds_tile_is_none() {
        let env = small_map();
        assert!(env.tile(IntVector3::new(-1, 0, 0)).is_none());
        assert!(env.tile(IntVector3::new(5, 0, 0)).is_none());
        assert!(env.tile(IntVector3::new(4, 4, 1)).is_some());
    }

    #[test]
    fn mining_yields_rock_and_emits_events() {
        let mut env = small_map();
        let p = IntVector3::new(2, 2, 0);
        let rock = env.dig(p, DesignationType::Mine).unwrap().unwrap();
        assert!(env.is_walkable(p));
        assert_eq!(env.item(rock).unwrap().kind(), ItemKind::Rock);

        let events = env.drain_events();
        assert!(events.contains(&EnvironmentEvent::TerrainChanged { location: p }));
        assert!(events.contains(&EnvironmentEvent::ObjectAdded {
            object: rock,
            location: p
        }));
        assert!(env.dig(p, DesignationType::Mine).is_err());
    }

    #[test]
    fn channel_opens_level_below() {
        let mut env = small_map();
        let p = IntVector3::new(1, 1, 1);
        env.dig(p, DesignationType::Channel).unwrap();
        assert_eq!(env.tile(p).unwrap().terrain, TerrainId::Empty);
        assert!(env.is_walkable(p.offset(Direction::Down)));
    }

    #[test]
    fn reservation_is_exclusive_and_released_by_owner() {
        let mut env = small_map();
        let p = IntVector3::new(0, 0, 1);
        let item = env
            .add_item(ItemObject::new(ItemKind::Log, MaterialId::Oak, p))
            .unwrap();
        let owner = JobSourceId::new();
        env.reserve_item(item, owner).unwrap();
        assert_eq!(env.item(item).unwrap().reserved_by(), Some(owner));
        env.release_item(item, owner);
        assert!(env.item(item).unwrap().is_free());
    }

    #[test]
    #[should_panic(expected = "already reserved")]
    fn double_reservation_panics() {
        let mut env = small_map();
        let item = env
            .add_item(ItemObject::new(ItemKind::Log, MaterialId::Oak, IntVector3::new(0, 0, 1)))
            .unwrap();
        env.reserve_item(item, JobSourceId::new()).unwrap();
        let _ = env.reserve_item(item, JobSourceId::new());
    }

    #[test]
    #[should_panic(expected = "does not hold it")]
    fn release_by_stranger_panics() {
        let mut env = small_map();
        let item = env
            .add_item(ItemObject::new(ItemKind::Log, MaterialId::Oak, IntVector3::new(0, 0, 1)))
            .unwrap();
        env.reserve_item(item, JobSourceId::new()).unwrap();
        env.release_item(item, JobSourceId::new());
    }

    #[test]
    fn releasing_a_destroyed_item_is_silent() {
        let mut env = small_map();
        let item = env
            .add_item(ItemObject::new(ItemKind::Log, MaterialId::Oak, IntVector3::new(0, 0, 1)))
            .unwrap();
        let owner = JobSourceId::new();
        env.reserve_item(item, owner).unwrap();
        env.remove_item(item);
        env.release_item(item, owner);
        assert!(env.item(item).is_none());
    }

    #[test]
    fn pick_up_and_drop_follow_the_living() {
        let mut env = small_map();
        let dwarf = ObjectId::new();
        let start = IntVector3::new(0, 0, 1);
        env.place_living(dwarf, start).unwrap();
        let item = env
            .add_item(ItemObject::new(ItemKind::Log, MaterialId::Oak, start))
            .unwrap();
        env.pick_up(item, dwarf).unwrap();
        assert_eq!(env.carried_by(dwarf).map(ItemObject::id), Some(item));

        let end = env.move_living(dwarf, Direction::East).unwrap();
        env.drop_item(item, dwarf).unwrap();
        assert_eq!(env.item(item).unwrap().ground_location(), Some(end));
    }

    #[test]
    fn vertical_moves_need_stairs() {
        let mut env = small_map();
        let below = IntVector3::new(2, 2, 0);
        env.dig(below, DesignationType::CreateStairs).unwrap();
        let above = below.offset(Direction::Up);
        assert!(!env.can_move(above, Direction::Down));
        let stairs = env.tile(above).unwrap().with_interior(InteriorId::Stairs, MaterialId::Granite);
        env.set_tile(above, stairs).unwrap();
        assert!(env.can_move(above, Direction::Down));
        assert!(env.can_move(below, Direction::Up));
    }

    #[test]
    fn construct_wall_consumes_item() {
        let mut env = small_map();
        let dwarf = ObjectId::new();
        let site = IntVector3::new(3, 3, 1);
        env.place_living(dwarf, site).unwrap();
        let block = env
            .add_item(ItemObject::new(ItemKind::Block, MaterialId::Granite, site))
            .unwrap();
        assert!(!env.can_construct(site, ConstructMode::Wall));
        env.pick_up(block, dwarf).unwrap();
        env.construct(site, ConstructMode::Wall, block).unwrap();
        assert_eq!(env.tile(site).unwrap().terrain, TerrainId::BuiltWall);
        assert!(env.item(block).is_none());
    }
}
