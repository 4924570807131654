//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Every game object, job, and job source has a strongly-typed ID so the
//! scheduler cannot confuse a job with the item it reserves. All IDs use
//! UUID v7 (time-ordered); nothing in the scheduler relies on ID order for
//! determinism, processing order is always an explicit list.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a game object (living, item, workbench).
    ObjectId
}

define_id! {
    /// Unique identifier for a job (assignment or job group) on the job board.
    JobId
}

define_id! {
    /// Unique identifier for a job source registered with the job manager.
    JobSourceId
}

define_id! {
    /// Unique identifier for a queued build order at a workbench.
    BuildOrderId
}
