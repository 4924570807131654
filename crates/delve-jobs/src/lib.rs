//! Job sources and the assignment protocol for the Delve colony simulation.
//!
//! Job sources turn player orders into units of work. Idle workers ask the
//! [`JobManager`], which polls every registered [`JobSource`] in order and
//! binds the first free assignment offered. Jobs live in the [`JobBoard`]
//! arena; when one ends, its creating source is notified so it can release
//! claims and retry or drop the underlying work.
//!
//! # Modules
//!
//! - [`board`] -- The [`JobBoard`] arena: assignments, staged job groups,
//!   path following, and status notifications.
//! - [`build_items`] -- [`BuildItemManager`]: the build-order queue of a
//!   workbench.
//! - [`config`] -- [`JobTuning`] retry delays and limits.
//! - [`construct`] -- [`ConstructManager`]: floor, wall, and pavement sites.
//! - [`designation`] -- [`Designation`]: mining, stairs, channel, and tree
//!   felling orders.
//! - [`error`] -- Error types for job source operations.
//! - [`item_tracker`] -- [`TargetItemTracker`], a distance-ordered index of
//!   eligible items.
//! - [`manager`] -- The [`JobManager`] registry and dispatch loop.
//! - [`source`] -- The [`JobSource`] trait and its [`JobContext`].
//! - [`stockpile`] -- [`Stockpile`]: hauling loose items into an area.
//! - [`task`] -- The [`Task`] kinds an assignment can carry.
//! - [`unreachables`] -- [`Unreachables`], a TTL cache of unreachable tiles.

pub mod board;
pub mod build_items;
pub mod config;
pub mod construct;
pub mod designation;
pub mod error;
pub mod item_tracker;
pub mod manager;
pub mod source;
pub mod stockpile;
pub mod task;
pub mod unreachables;

// Re-export primary types at crate root.
pub use board::{Assignment, AssignmentStep, Job, JobBoard, JobGroup, JobKind, JobNotification};
pub use build_items::{BuildItemManager, BuildOrder, CurrentBuild, recipe};
pub use config::JobTuning;
pub use construct::{ConstructJob, ConstructManager, ConstructSite, required_items};
pub use designation::{Designation, DesignationEntry};
pub use error::JobError;
pub use item_tracker::{TargetItemTracker, TrackerRules};
pub use manager::JobManager;
pub use source::{JobContext, JobSource};
pub use stockpile::{Stockpile, StoreJob};
pub use task::{Task, WorkerView};
pub use unreachables::Unreachables;
