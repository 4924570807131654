//! Reachability oracle consumed by the job sources.
//!
//! The scheduler treats pathfinding as a black box: [`Pathfinder::can_reach`]
//! and [`Pathfinder::find_path`] must answer identically. [`GridPathfinder`]
//! is a plain breadth-first search bounded by a node budget.

use std::collections::{BTreeMap, VecDeque};

use delve_types::{Direction, DirectionSet, IntVector3};

use crate::environment::Environment;

/// A synchronous, possibly expensive, path query.
pub trait Pathfinder: Send + Sync + std::fmt::Debug {
    /// Steps leading from `from` to any tile satisfying `positioning`
    /// relative to `to`. An empty path means `from` is already positioned.
    fn find_path(
        &self,
        env: &Environment,
        from: IntVector3,
        to: IntVector3,
        positioning: DirectionSet,
    ) -> Option<Vec<Direction>>;

    /// Whether a path exists.
    fn can_reach(
        &self,
        env: &Environment,
        from: IntVector3,
        to: IntVector3,
        positioning: DirectionSet,
    ) -> bool {
        self.find_path(env, from, to, positioning).is_some()
    }
}

/// Breadth-first search over walkable tiles.
#[derive(Debug, Clone, Copy)]
pub struct GridPathfinder {
    max_nodes: usize,
}

impl GridPathfinder {
    /// Default node budget per query.
    pub const DEFAULT_MAX_NODES: usize = 10_000;

    /// Create a pathfinder that gives up after visiting `max_nodes` tiles.
    pub const fn new(max_nodes: usize) -> Self {
        Self { max_nodes }
    }
}

impl Default for GridPathfinder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_NODES)
    }
}

impl Pathfinder for GridPathfinder {
    fn find_path(
        &self,
        env: &Environment,
        from: IntVector3,
        to: IntVector3,
        positioning: DirectionSet,
    ) -> Option<Vec<Direction>> {
        if positioning.is_empty() {
            return None;
        }
        if positioning.is_satisfied(from, to) {
            return Some(Vec::new());
        }
        // Goal tiles must be standable, otherwise no search can succeed.
        if !positioning.positions(to).any(|p| env.is_walkable(p)) {
            return None;
        }

        let mut prev: BTreeMap<IntVector3, (IntVector3, Direction)> = BTreeMap::new();
        let mut queue = VecDeque::from([from]);
        let mut visited = 1usize;
        let mut goal = None;

        while let Some(current) = queue.pop_front() {
            if positioning.is_satisfied(current, to) {
                goal = Some(current);
                break;
            }
            for direction in Direction::ALL {
                let next = current.offset(direction);
                if next == from || prev.contains_key(&next) || !env.can_move(current, direction) {
                    continue;
                }
                prev.insert(next, (current, direction));
                queue.push_back(next);
                visited = visited.saturating_add(1);
            }
            if visited > self.max_nodes {
                return None;
            }
        }

        let mut current = goal?;
        let mut steps = Vec::new();
        while let Some(&(before, direction)) = prev.get(&current) {
            steps.push(direction);
            current = before;
        }
        steps.reverse();
        Some(steps)
    }
}
