//! Tile-space geometry: integer positions, areas, directions, and
//! direction sets used for worker positioning.
//!
//! The map is a 3D grid of tiles. `x` grows east, `y` grows south, and `z`
//! grows upwards. A [`DirectionSet`] describes where a worker may stand
//! relative to a target tile in order to work on it: planar neighbours for
//! felling a tree, the tile itself ([`DirectionSet::EXACT`]) for picking up
//! an item, and so on.

use serde::{Deserialize, Serialize};

/// A position in tile space.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct IntVector3 {
    /// East-west coordinate.
    pub x: i32,
    /// North-south coordinate.
    pub y: i32,
    /// Vertical coordinate (z level).
    pub z: i32,
}

impl IntVector3 {
    /// Create a position from its coordinates.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The neighbouring position one step in `direction`.
    pub const fn offset(self, direction: Direction) -> Self {
        let (dx, dy, dz) = direction.delta();
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
            z: self.z.saturating_add(dz),
        }
    }

    /// Squared euclidean distance to `other`.
    pub fn distance_sq(self, other: Self) -> u64 {
        let dx = i64::from(self.x).abs_diff(i64::from(other.x));
        let dy = i64::from(self.y).abs_diff(i64::from(other.y));
        let dz = i64::from(self.z).abs_diff(i64::from(other.z));
        dx.saturating_mul(dx)
            .saturating_add(dy.saturating_mul(dy))
            .saturating_add(dz.saturating_mul(dz))
    }

    /// Manhattan distance to `other`.
    pub fn manhattan(self, other: Self) -> u64 {
        let dx = i64::from(self.x).abs_diff(i64::from(other.x));
        let dy = i64::from(self.y).abs_diff(i64::from(other.y));
        let dz = i64::from(self.z).abs_diff(i64::from(other.z));
        dx.saturating_add(dy).saturating_add(dz)
    }

    /// The direction leading from `self` to `other`, if they are neighbours.
    pub fn direction_to(self, other: Self) -> Option<Direction> {
        Direction::ALL
            .into_iter()
            .find(|&direction| self.offset(direction) == other)
    }
}

impl core::fmt::Display for IntVector3 {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Dimensions of a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntSize3 {
    /// Extent along `x`.
    pub width: u32,
    /// Extent along `y`.
    pub height: u32,
    /// Number of z levels.
    pub depth: u32,
}

impl IntSize3 {
    /// Create a size.
    pub const fn new(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// Number of tiles in a map of this size.
    pub fn volume(self) -> usize {
        let volume = u64::from(self.width)
            .saturating_mul(u64::from(self.height))
            .saturating_mul(u64::from(self.depth));
        usize::try_from(volume).unwrap_or(usize::MAX)
    }
}

/// An axis-aligned box of tiles with inclusive corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntBox {
    min: IntVector3,
    max: IntVector3,
}

impl IntBox {
    /// Create a box spanning two opposite corners (both inclusive, in any order).
    pub fn from_corners(a: IntVector3, b: IntVector3) -> Self {
        Self {
            min: IntVector3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: IntVector3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// A box covering a single tile.
    pub const fn single(p: IntVector3) -> Self {
        Self { min: p, max: p }
    }

    /// The inclusive minimum corner.
    pub const fn min(&self) -> IntVector3 {
        self.min
    }

    /// The inclusive maximum corner.
    pub const fn max(&self) -> IntVector3 {
        self.max
    }

    /// Whether `p` lies inside the box.
    pub const fn contains(&self, p: IntVector3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// The tile nearest the middle of the box.
    pub const fn center(&self) -> IntVector3 {
        IntVector3::new(
            midpoint(self.min.x, self.max.x),
            midpoint(self.min.y, self.max.y),
            midpoint(self.min.z, self.max.z),
        )
    }

    /// Number of tiles in the box.
    pub fn volume(&self) -> u64 {
        let w = i64::from(self.max.x).abs_diff(i64::from(self.min.x)).saturating_add(1);
        let h = i64::from(self.max.y).abs_diff(i64::from(self.min.y)).saturating_add(1);
        let d = i64::from(self.max.z).abs_diff(i64::from(self.min.z)).saturating_add(1);
        w.saturating_mul(h).saturating_mul(d)
    }

    /// Iterate over every tile in the box, z-major, then y, then x.
    pub fn iter(&self) -> impl Iterator<Item = IntVector3> + use<> {
        let (min, max) = (self.min, self.max);
        (min.z..=max.z).flat_map(move |z| {
            (min.y..=max.y).flat_map(move |y| (min.x..=max.x).map(move |x| IntVector3::new(x, y, z)))
        })
    }
}

const fn midpoint(a: i32, b: i32) -> i32 {
    let sum = (a as i64).saturating_add(b as i64);
    #[allow(clippy::cast_possible_truncation)]
    let mid = sum.div_euclid(2) as i32;
    mid
}

/// A step direction between neighbouring tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// `y - 1`.
    North,
    /// `x + 1, y - 1`.
    NorthEast,
    /// `x + 1`.
    East,
    /// `x + 1, y + 1`.
    SouthEast,
    /// `y + 1`.
    South,
    /// `x - 1, y + 1`.
    SouthWest,
    /// `x - 1`.
    West,
    /// `x - 1, y - 1`.
    NorthWest,
    /// `z + 1`.
    Up,
    /// `z - 1`.
    Down,
}

impl Direction {
    /// All ten directions.
    pub const ALL: [Self; 10] = [
        Self::North,
        Self::NorthEast,
        Self::East,
        Self::SouthEast,
        Self::South,
        Self::SouthWest,
        Self::West,
        Self::NorthWest,
        Self::Up,
        Self::Down,
    ];

    /// The eight planar directions.
    pub const PLANAR: [Self; 8] = [
        Self::North,
        Self::NorthEast,
        Self::East,
        Self::SouthEast,
        Self::South,
        Self::SouthWest,
        Self::West,
        Self::NorthWest,
    ];

    /// Coordinate delta of one step.
    pub const fn delta(self) -> (i32, i32, i32) {
        match self {
            Self::North => (0, -1, 0),
            Self::NorthEast => (1, -1, 0),
            Self::East => (1, 0, 0),
            Self::SouthEast => (1, 1, 0),
            Self::South => (0, 1, 0),
            Self::SouthWest => (-1, 1, 0),
            Self::West => (-1, 0, 0),
            Self::NorthWest => (-1, -1, 0),
            Self::Up => (0, 0, 1),
            Self::Down => (0, 0, -1),
        }
    }

    /// The opposite direction.
    pub const fn reverse(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::NorthEast => Self::SouthWest,
            Self::East => Self::West,
            Self::SouthEast => Self::NorthWest,
            Self::South => Self::North,
            Self::SouthWest => Self::NorthEast,
            Self::West => Self::East,
            Self::NorthWest => Self::SouthEast,
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }

    /// Whether the direction stays on the same z level.
    pub const fn is_planar(self) -> bool {
        !matches!(self, Self::Up | Self::Down)
    }

    const fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

/// A set of directions plus an optional "exact" bit.
///
/// Used as a positioning requirement: a worker at `w` is positioned for a
/// target `t` if `w == t` and the set contains [`DirectionSet::EXACT`], or
/// `w == t.offset(d)` for some direction `d` in the set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectionSet(u16);

impl DirectionSet {
    const EXACT_BIT: u16 = 1 << 10;

    /// No valid position.
    pub const NONE: Self = Self(0);
    /// Standing on the target itself.
    pub const EXACT: Self = Self(Self::EXACT_BIT);
    /// North, east, south, west.
    pub const CARDINAL: Self = Self(
        Direction::North.bit() | Direction::East.bit() | Direction::South.bit() | Direction::West.bit(),
    );
    /// All eight planar neighbours.
    pub const PLANAR: Self = Self(0x00ff);
    /// Planar neighbours plus the tiles directly above and below.
    pub const PLANAR_UP_DOWN: Self = Self(0x03ff);

    /// A set holding a single direction.
    pub const fn single(direction: Direction) -> Self {
        Self(direction.bit())
    }

    /// Union of two sets.
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Intersection of two sets.
    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Whether the set contains `direction`.
    pub const fn contains(self, direction: Direction) -> bool {
        self.0 & direction.bit() != 0
    }

    /// Whether the set allows standing on the target.
    pub const fn contains_exact(self) -> bool {
        self.0 & Self::EXACT_BIT != 0
    }

    /// Whether the set allows no position at all.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterate over the directions in the set (the exact bit is not a direction).
    pub fn directions(self) -> impl Iterator<Item = Direction> {
        Direction::ALL.into_iter().filter(move |&d| self.contains(d))
    }

    /// Whether a worker at `worker` is positioned to work on `target`.
    pub fn is_satisfied(self, worker: IntVector3, target: IntVector3) -> bool {
        if worker == target {
            return self.contains_exact();
        }
        self.directions().any(|d| target.offset(d) == worker)
    }

    /// Every tile a worker may stand on to work on `target`.
    pub fn positions(self, target: IntVector3) -> impl Iterator<Item = IntVector3> {
        let exact = self.contains_exact().then_some(target);
        exact
            .into_iter()
            .chain(self.directions().map(move |d| target.offset(d)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_and_direction_roundtrip() {
        let p = IntVector3::new(3, 3, 1);
        for d in Direction::ALL {
            let q = p.offset(d);
            assert_eq!(p.direction_to(q), Some(d));
            assert_eq!(q.offset(d.reverse()), p);
        }
        assert_eq!(p.direction_to(IntVector3::new(5, 3, 1)), None);
    }

    #[test]
    fn box_iterates_every_tile_once() {
        let area = IntBox::from_corners(IntVector3::new(2, 2, 0), IntVector3::new(0, 0, 0));
        let tiles: Vec<_> = area.iter().collect();
        assert_eq!(tiles.len(), 9);
        assert_eq!(area.volume(), 9);
        assert_eq!(tiles.first(), Some(&IntVector3::new(0, 0, 0)));
        assert_eq!(area.center(), IntVector3::new(1, 1, 0));
        assert!(area.contains(IntVector3::new(2, 0, 0)));
        assert!(!area.contains(IntVector3::new(3, 0, 0)));
    }

    #[test]
    fn planar_positioning() {
        let target = IntVector3::new(5, 5, 0);
        assert!(DirectionSet::PLANAR.is_satisfied(IntVector3::new(6, 6, 0), target));
        assert!(!DirectionSet::PLANAR.is_satisfied(target, target));
        assert!(!DirectionSet::PLANAR.is_satisfied(IntVector3::new(5, 5, 1), target));
        assert!(DirectionSet::EXACT.is_satisfied(target, target));
        assert_eq!(DirectionSet::PLANAR.positions(target).count(), 8);
    }

    #[test]
    fn cardinal_is_subset_of_planar() {
        let both = DirectionSet::CARDINAL.intersection(DirectionSet::PLANAR);
        assert_eq!(both, DirectionSet::CARDINAL);
        assert!(!DirectionSet::CARDINAL.contains(Direction::NorthEast));
        assert!(DirectionSet::PLANAR_UP_DOWN.contains(Direction::Down));
    }
}
