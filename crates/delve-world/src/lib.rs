//! Tile map, items, and reachability for the Delve colony simulation.
//!
//! This crate models the physical world the scheduler works on: a dense 3D
//! grid of tiles, the items lying on it or carried by livings, workbenches,
//! and the pathfinding oracle job sources consult before handing out work.
//!
//! # Modules
//!
//! - [`environment`] -- The [`Environment`]: tiles, items, workbenches,
//!   living positions, terrain mutations, reservation helpers, and the
//!   [`EnvironmentEvent`] outbox.
//! - [`error`] -- Error types for environment operations.
//! - [`item`] -- [`ItemObject`] with its claim fields, and [`ItemFilter`].
//! - [`pathing`] -- The [`Pathfinder`] trait and the breadth-first
//!   [`GridPathfinder`].
//! - [`tile`] -- [`TileData`] and per-tile predicates.

pub mod environment;
pub mod error;
pub mod item;
pub mod pathing;
pub mod tile;

// Re-export primary types at crate root.
pub use environment::{Environment, EnvironmentEvent, Workbench, mined_item_kind};
pub use error::WorldError;
pub use item::{ItemFilter, ItemLocation, ItemObject};
pub use pathing::{GridPathfinder, Pathfinder};
pub use tile::TileData;
