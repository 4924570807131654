//! Error types for the `delve-world` crate.
//!
//! All fallible operations in this crate return [`WorldError`]. Invariant
//! violations (double reservation, releasing somebody else's claim) are not
//! errors: they are assertions, because they indicate a scheduler bug.

use delve_types::{IntVector3, ObjectId};

/// Errors that can occur during environment operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// The position lies outside the map.
    #[error("location {0} is outside the map")]
    OutOfBounds(IntVector3),

    /// No item with this id exists.
    #[error("item not found: {0}")]
    ItemNotFound(ObjectId),

    /// No workbench with this id exists.
    #[error("workbench not found: {0}")]
    WorkbenchNotFound(ObjectId),

    /// No living with this id is placed on the map.
    #[error("living not found: {0}")]
    LivingNotFound(ObjectId),

    /// The item is not where the operation needs it to be.
    #[error("item {item} is not available at {location}")]
    ItemNotAt {
        /// The item.
        item: ObjectId,
        /// Where it was expected.
        location: IntVector3,
    },

    /// The tile does not allow the requested change.
    #[error("invalid terrain at {location}: {reason}")]
    InvalidTerrain {
        /// The tile.
        location: IntVector3,
        /// Why the change is not possible.
        reason: String,
    },
}
