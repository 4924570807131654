//! Error types for the `delve-jobs` crate.
//!
//! Expected scheduling conditions (unreachable targets, missing material)
//! are not errors: job sources return `None` and retry later. Only caller
//! mistakes on the management API surface here.

use delve_types::{BuildOrderId, ItemKind, ObjectId, WorkbenchKind};
use delve_world::WorldError;

/// Errors returned by job source management operations.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The workbench cannot build the requested product.
    #[error("a {workbench:?} workbench cannot build {product:?}")]
    ProductNotBuildable {
        /// The workbench kind.
        workbench: WorkbenchKind,
        /// The requested product.
        product: ItemKind,
    },

    /// The workbench does not exist.
    #[error("workbench not found: {0}")]
    WorkbenchNotFound(ObjectId),

    /// No build order with this id is queued.
    #[error("build order not found: {0}")]
    OrderNotFound(BuildOrderId),

    /// An environment operation failed.
    #[error("world error: {0}")]
    World(#[from] WorldError),
}
