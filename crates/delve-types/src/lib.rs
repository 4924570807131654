//! Shared type definitions for the Delve colony simulation.
//!
//! This crate is the single source of truth for the small value types
//! exchanged between the environment, the job scheduler, and the world
//! tick engine.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for objects, jobs, and job sources
//! - [`geometry`] -- Tile positions, areas, directions, positioning sets
//! - [`enums`] -- Job status, world state, terrain, materials, items
//! - [`actions`] -- Actions performed by livings and their outcomes
//! - [`events`] -- Change events emitted by the world
//! - [`position_map`] -- Serde adapter for position-keyed maps

pub mod actions;
pub mod enums;
pub mod events;
pub mod geometry;
pub mod ids;
pub mod position_map;

// Re-export all public types at crate root for convenience.
pub use actions::{Action, ActionOutcome};
pub use enums::{
    ActionPriority, ConstructMode, DesignationType, InteriorId, ItemKind, JobStatus, LivingKind,
    MaterialCategory, MaterialId, TerrainId, TurnMode, WorkbenchKind, WorldState,
};
pub use events::{EventLogEntry, WorldChange};
pub use geometry::{Direction, DirectionSet, IntBox, IntSize3, IntVector3};
pub use ids::{BuildOrderId, JobId, JobSourceId, ObjectId};
