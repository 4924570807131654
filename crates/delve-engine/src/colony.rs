//! Demo colony for the engine binary.
//!
//! Lays out a small map: open ground on the left with a grove of trees, a
//! rock face on the right with an iron vein, loose logs and rocks, a
//! carpenter and a mason. Three dwarves and a cat live there. Orders are
//! placed so every job source has work: mining the rock face, felling the
//! grove, hauling stone to a stockpile, building furniture and blocks, and
//! raising a wall.

use delve_core::{Ai, DelveConfig, Living, World, WorldOptions};
use delve_jobs::{ConstructManager, Designation, Stockpile};
use delve_types::{
    ConstructMode, DesignationType, IntBox, IntVector3, ItemKind, LivingKind, MaterialId, ObjectId,
    WorkbenchKind,
};
use delve_world::{Environment, ItemFilter, ItemObject, TileData};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::error::{EngineError, MIN_HEIGHT, MIN_WIDTH};

/// Trees planted in the grove.
const TREE_COUNT: usize = 8;

const DWARF_NAMES: [&str; 3] = ["Urist", "Bomrek", "Kadol"];

/// The demo world and the handles the host may want to inspect.
#[derive(Debug)]
pub struct DemoColony {
    /// The world, ready to be spawned on its thread.
    pub world: World,
    /// The dwarves, in turn order.
    pub dwarves: Vec<ObjectId>,
    /// The wandering cat.
    pub animal: ObjectId,
    /// Carpenter and mason.
    pub workbenches: Vec<ObjectId>,
}

/// Build the demo colony described by `config`.
///
/// # Errors
///
/// Returns [`EngineError::MapTooSmall`] for maps below 16x12 and
/// propagates any placement error.
pub fn build(config: &DelveConfig) -> Result<DemoColony, EngineError> {
    let size = config.map.size();
    if size.width < MIN_WIDTH || size.height < MIN_HEIGHT || size.depth == 0 {
        return Err(EngineError::MapTooSmall {
            width: size.width,
            height: size.height,
        });
    }
    let width = coord(size.width);
    let height = coord(size.height);
    let mut rng = StdRng::seed_from_u64(config.world.seed);

    // --- Terrain ---
    let mut env = Environment::new(size);
    let last = IntVector3::new(width.saturating_sub(1), height.saturating_sub(1), 0);
    env.fill(
        IntBox::from_corners(IntVector3::new(0, 0, 0), last),
        TileData::floor(MaterialId::Granite),
    )?;
    let rock_x = width.saturating_sub(width / 4);
    env.fill(
        IntBox::from_corners(IntVector3::new(rock_x, 0, 0), last),
        TileData::wall(MaterialId::Granite),
    )?;
    let vein_y = height / 2;
    env.fill(
        IntBox::from_corners(
            IntVector3::new(rock_x, vein_y, 0),
            IntVector3::new(last.x, vein_y, 0),
        ),
        TileData::wall(MaterialId::Iron),
    )?;

    let grove = IntBox::from_corners(
        IntVector3::new(1, height / 2, 0),
        IntVector3::new(width / 3, height.saturating_sub(2), 0),
    );
    let (low, high) = (grove.min(), grove.max());
    for _ in 0..TREE_COUNT {
        let at = IntVector3::new(
            rng.random_range(low.x..=high.x),
            rng.random_range(low.y..=high.y),
            0,
        );
        let wood = if rng.random_bool(0.5) {
            MaterialId::Oak
        } else {
            MaterialId::Birch
        };
        env.set_tile(at, TileData::tree(MaterialId::Granite, wood))?;
    }

    // --- Loose items ---
    for y in 1..=3 {
        env.add_item(ItemObject::new(ItemKind::Log, MaterialId::Oak, IntVector3::new(1, y, 0)))?;
    }
    for x in 4..=5 {
        env.add_item(ItemObject::new(
            ItemKind::Rock,
            MaterialId::Granite,
            IntVector3::new(x, height.saturating_sub(1), 0),
        ))?;
    }
    env.drain_events();

    let mut world = World::new(env, WorldOptions::from_config(config));

    // --- Workbenches and build orders ---
    let bench_x = width / 3;
    let carpenter = world.add_workbench(WorkbenchKind::Carpenter, IntVector3::new(bench_x, 2, 0))?;
    let mason = world.add_workbench(
        WorkbenchKind::Mason,
        IntVector3::new(bench_x.saturating_add(2), 2, 0),
    )?;
    for product in [ItemKind::Door, ItemKind::Chair] {
        world
            .with_build_manager(carpenter, |manager, _jobs| manager.add_order(product, false))
            .transpose()?;
    }
    world
        .with_build_manager(mason, |manager, _jobs| manager.add_order(ItemKind::Block, true))
        .transpose()?;

    // --- Job sources ---
    let tuning = &config.jobs;
    let mut designation = Designation::new(tuning);
    let mined = designation.add_area(
        world.env(),
        IntBox::from_corners(
            IntVector3::new(rock_x, 2, 0),
            IntVector3::new(rock_x.saturating_add(1), vein_y, 0),
        ),
        DesignationType::Mine,
    );
    let felled = designation.add_area(world.env(), grove, DesignationType::FellTree);
    world.register_source(Box::new(designation));

    let mut stockpile = Stockpile::new(
        IntBox::from_corners(
            IntVector3::new(bench_x.saturating_add(4), 1, 0),
            IntVector3::new(bench_x.saturating_add(6), 3, 0),
        ),
        tuning,
    );
    stockpile.set_criteria(
        world.env(),
        Some(ItemFilter::kinds(&[ItemKind::Rock, ItemKind::Ore, ItemKind::Gem])),
    );
    world.register_source(Box::new(stockpile));

    let mut construct = ConstructManager::new(tuning);
    let wall_x = width / 2;
    let walls = construct.add_area(
        world.env(),
        IntBox::from_corners(
            IntVector3::new(wall_x, height.saturating_sub(4), 0),
            IntVector3::new(wall_x, height.saturating_sub(2), 0),
        ),
        ConstructMode::Wall,
        None,
    );
    world.register_source(Box::new(construct));

    // --- Livings ---
    let mut dwarves = Vec::with_capacity(DWARF_NAMES.len());
    for (x, name) in (2..).zip(DWARF_NAMES) {
        let living = Living::new(name, LivingKind::Dwarf, Ai::dwarf_work());
        dwarves.push(world.add_living(living, IntVector3::new(x, 4, 0))?);
    }
    let cat = Living::new("Cat", LivingKind::Animal, Ai::wander(rng.random()));
    let animal = world.add_living(cat, IntVector3::new(bench_x, 5, 0))?;

    info!(
        width = size.width,
        height = size.height,
        mined,
        felled,
        walls,
        dwarves = dwarves.len(),
        "Demo colony built"
    );

    Ok(DemoColony {
        world,
        dwarves,
        animal,
        workbenches: vec![carpenter, mason],
    })
}

fn coord(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use delve_core::config::MapConfig;

    use super::*;

    #[test]
    fn default_colony_has_work_for_everyone() {
        let colony = build(&DelveConfig::default()).unwrap();
        assert_eq!(colony.dwarves.len(), 3);
        assert_eq!(colony.workbenches.len(), 2);
        // Job sources: two build queues, designations, stockpile, construction.
        assert_eq!(colony.world.manager().len(), 5);
        assert!(colony.world.env().items().count() >= 5);
    }

    #[test]
    fn same_seed_plants_the_same_grove() {
        let trees = |colony: &DemoColony| -> Vec<IntVector3> {
            colony
                .world
                .env()
                .bounds()
                .iter()
                .filter(|&p| colony.world.env().is_fellable(p))
                .collect()
        };
        let first = build(&DelveConfig::default()).unwrap();
        let second = build(&DelveConfig::default()).unwrap();
        assert!(!trees(&first).is_empty());
        assert_eq!(trees(&first), trees(&second));
    }

    #[test]
    fn tiny_maps_are_rejected() {
        let mut config = DelveConfig::default();
        config.map = MapConfig {
            width: 8,
            height: 8,
            depth: 1,
        };
        assert!(matches!(
            build(&config),
            Err(EngineError::MapTooSmall { width: 8, height: 8 })
        ));
    }
}
