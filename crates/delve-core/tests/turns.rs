//! Turn sequencing across livings within a tick.

#![allow(clippy::unwrap_used)]

use std::time::{Duration, Instant};

use delve_core::{Ai, Living, World, WorldOptions};
use delve_jobs::JobTuning;
use delve_types::{
    Action, Direction, IntBox, IntSize3, IntVector3, LivingKind, MaterialId, ObjectId, TurnMode,
    WorldChange, WorldState,
};
use delve_world::{Environment, TileData};

const MAX_MOVE_TIME: Duration = Duration::from_millis(10);

fn world(turn_mode: TurnMode) -> World {
    let mut env = Environment::new(IntSize3::new(8, 8, 1));
    env.fill(
        IntBox::from_corners(IntVector3::new(0, 0, 0), IntVector3::new(7, 7, 0)),
        TileData::floor(MaterialId::Granite),
    )
    .unwrap();
    env.drain_events();
    World::new(
        env,
        WorldOptions {
            turn_mode,
            min_tick_interval: Duration::from_millis(5),
            max_move_time: MAX_MOVE_TIME,
            require_connected_user: false,
            tuning: JobTuning::default(),
        },
    )
}

fn manual(world: &mut World, name: &str, x: i32) -> ObjectId {
    world
        .add_living(Living::new(name, LivingKind::Dwarf, Ai::manual()), IntVector3::new(x, 1, 0))
        .unwrap()
}

/// Step the world with a simulated clock until `tick` has ended.
fn run_until(world: &mut World, tick: u64) -> Vec<WorldChange> {
    let mut now = Instant::now();
    let mut changes = Vec::new();
    for _ in 0..10_000 {
        if world.tick() >= tick && world.state() == WorldState::Idle {
            break;
        }
        let result = world.work(now).unwrap();
        changes.extend(world.take_changes());
        if !result.progressed {
            now = result.next_deadline.unwrap();
        }
    }
    changes
}

fn turns(changes: &[WorldChange]) -> Vec<(ObjectId, bool)> {
    changes
        .iter()
        .filter_map(|change| match change {
            WorldChange::TurnEnded { living, forced, .. } => Some((*living, *forced)),
            _ => None,
        })
        .collect()
}

#[test]
fn sequential_timeouts_are_forced_in_order() {
    let mut world = world(TurnMode::Sequential);
    let a = manual(&mut world, "Urist", 1);
    let b = manual(&mut world, "Bomrek", 2);
    let c = manual(&mut world, "Kadol", 3);

    let changes = run_until(&mut world, 1);
    assert_eq!(turns(&changes), vec![(a, true), (b, true), (c, true)]);
}

#[test]
fn sequential_turn_waits_only_for_the_current_living() {
    let mut world = world(TurnMode::Sequential);
    let a = manual(&mut world, "Urist", 1);
    let b = manual(&mut world, "Bomrek", 2);
    let step = Action::Move {
        direction: Direction::South,
    };
    assert!(world.push_intent(b, step.clone()));

    let start = Instant::now();
    world.work(start).unwrap();
    // `a` has no intent and holds the turn until its budget runs out.
    let waiting = world.work(start).unwrap();
    assert!(!waiting.progressed);
    assert_eq!(waiting.next_deadline, start.checked_add(MAX_MOVE_TIME));

    let changes = run_until(&mut world, 1);
    assert_eq!(turns(&changes), vec![(a, true), (b, false)]);
    let moved = changes.iter().position(|change| {
        matches!(change, WorldChange::ActionDone { living, .. } if *living == b)
    });
    let forced = changes
        .iter()
        .position(|change| matches!(change, WorldChange::TurnEnded { living, .. } if *living == a));
    assert!(forced < moved);
    assert_eq!(world.env().living_location(b), Some(IntVector3::new(2, 2, 0)));
}

#[test]
fn simultaneous_pass_waits_for_every_living() {
    let mut world = world(TurnMode::Simultaneous);
    let worker = world
        .add_living(
            Living::new("Urist", LivingKind::Dwarf, Ai::dwarf_work()),
            IntVector3::new(1, 1, 0),
        )
        .unwrap();
    let player = manual(&mut world, "Bomrek", 3);

    let start = Instant::now();
    world.work(start).unwrap();
    let waiting = world.work(start).unwrap();
    assert!(!waiting.progressed);
    assert_eq!(world.state(), WorldState::TickOngoing);
    // The worker has decided already; nobody has acted yet.
    assert!(world.living(worker).unwrap().is_ready());
    assert!(
        !world
            .take_changes()
            .iter()
            .any(|change| matches!(change, WorldChange::ActionDone { .. }))
    );

    let changes = run_until(&mut world, 1);
    assert_eq!(turns(&changes), vec![(worker, false), (player, true)]);
}

#[test]
fn simultaneous_pass_runs_at_once_when_everyone_is_ready() {
    let mut world = world(TurnMode::Simultaneous);
    let a = manual(&mut world, "Urist", 1);
    let b = manual(&mut world, "Bomrek", 3);
    for id in [a, b] {
        world.push_intent(id, Action::Wait { ticks: 1 });
    }

    let now = Instant::now();
    world.work(now).unwrap();
    assert!(world.work(now).unwrap().progressed);
    assert_eq!(world.state(), WorldState::TickDone);
    assert_eq!(turns(&world.take_changes()), vec![(a, false), (b, false)]);
}

#[test]
fn removal_wins_over_the_turn_timeout() {
    let mut world = world(TurnMode::Sequential);
    let a = manual(&mut world, "Urist", 1);
    let b = manual(&mut world, "Bomrek", 2);
    let c = manual(&mut world, "Kadol", 3);

    world.work(Instant::now()).unwrap();
    assert!(world.remove_living(b));
    let first = run_until(&mut world, 1);
    assert_eq!(turns(&first), vec![(a, true), (c, true)]);
    assert!(world.living(b).is_some());

    let second = run_until(&mut world, 2);
    assert!(second.contains(&WorldChange::LivingRemoved { living: b }));
    assert_eq!(turns(&second), vec![(a, true), (c, true)]);
    assert!(world.living(b).is_none());
    assert!(world.env().living_location(b).is_none());
}

#[test]
fn multi_tick_actions_span_ticks() {
    let mut world = world(TurnMode::Simultaneous);
    let a = manual(&mut world, "Urist", 1);
    world.push_intent(a, Action::Wait { ticks: 3 });

    let changes = run_until(&mut world, 3);
    let done: Vec<u64> = changes
        .iter()
        .scan(0, |tick, change| {
            if let WorldChange::TickStarted { tick: started } = change {
                *tick = *started;
            }
            Some((*tick, change))
        })
        .filter(|(_, change)| matches!(change, WorldChange::ActionDone { .. }))
        .map(|(tick, _)| tick)
        .collect();
    assert_eq!(done, vec![3]);
    // Busy livings are never forced.
    assert!(turns(&changes).iter().all(|(_, forced)| !forced));
}

#[test]
fn snapshot_serializes_to_json() {
    let mut world = world(TurnMode::Simultaneous);
    manual(&mut world, "Urist", 1);
    run_until(&mut world, 1);

    let json = serde_json::to_value(world.snapshot()).unwrap();
    assert_eq!(json["tick"], 1);
    assert_eq!(json["livings"][0]["name"], "Urist");
}
