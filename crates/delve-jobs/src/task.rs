//! What an assignment asks its worker to do.
//!
//! A [`Task`] is a closed set of work kinds sharing one control protocol:
//! given the worker's current view, it yields the next place to stand and
//! the action to perform there. Walking is handled by the job board; the
//! task only decides the goal.

use delve_types::{
    Action, ConstructMode, DesignationType, DirectionSet, IntVector3, ItemKind, JobStatus,
    ObjectId,
};
use delve_world::{Environment, ItemLocation};
use serde::{Deserialize, Serialize};

/// The worker as seen by the job system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerView {
    /// The living's id.
    pub id: ObjectId,
    /// Where it stands.
    pub location: IntVector3,
    /// The item it carries.
    pub carrying: Option<ObjectId>,
}

/// A leaf unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Task {
    /// Dig a designated tile.
    Mine {
        /// The tile.
        location: IntVector3,
        /// Mine, stairs, or channel.
        kind: DesignationType,
        /// Where the worker may stand.
        positioning: DirectionSet,
    },
    /// Cut down a tree from a planar neighbour.
    FellTree {
        /// The tree.
        location: IntVector3,
    },
    /// Carry an item somewhere and drop it.
    Fetch {
        /// The item.
        item: ObjectId,
        /// Where it goes.
        destination: IntVector3,
        /// Where the worker drops it relative to `destination`.
        positioning: DirectionSet,
    },
    /// Fetch a material item and build with it.
    Construct {
        /// The construction site.
        location: IntVector3,
        /// What is built.
        mode: ConstructMode,
        /// The reserved material.
        item: ObjectId,
    },
    /// Build an item at a workbench from items lying there.
    BuildItem {
        /// The workbench.
        workbench: ObjectId,
        /// The workbench tile.
        location: IntVector3,
        /// Consumed items.
        sources: Vec<ObjectId>,
        /// What is built.
        product: ItemKind,
    },
}

/// Where to stand and what to do there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Goal {
    pub target: IntVector3,
    pub positioning: DirectionSet,
    pub action: Action,
}

impl Task {
    /// The tile the task is about.
    pub const fn location(&self) -> IntVector3 {
        match self {
            Self::Mine { location, .. }
            | Self::FellTree { location }
            | Self::Construct { location, .. }
            | Self::BuildItem { location, .. } => *location,
            Self::Fetch { destination, .. } => *destination,
        }
    }

    /// Whether a successful `action` completes the task.
    pub(crate) const fn completes_with(&self, action: &Action) -> bool {
        matches!(
            (self, action),
            (Self::Mine { .. }, Action::Mine { .. })
                | (Self::FellTree { .. }, Action::FellTree { .. })
                | (Self::Fetch { .. }, Action::DropItem { .. })
                | (Self::Construct { .. }, Action::Construct { .. })
                | (Self::BuildItem { .. }, Action::BuildItem { .. })
        )
    }

    /// The next goal, or the terminal status the task has run into.
    ///
    /// Targets that vanished abort (the work item may be retried); targets
    /// that became invalid fail.
    pub(crate) fn goal(&self, env: &Environment, worker: &WorkerView) -> Result<Goal, JobStatus> {
        match self {
            Self::Mine {
                location,
                kind,
                positioning,
            } => {
                if !env.is_designatable(*location, *kind) {
                    return Err(JobStatus::Fail);
                }
                Ok(Goal {
                    target: *location,
                    positioning: *positioning,
                    action: Action::Mine {
                        location: *location,
                        kind: *kind,
                    },
                })
            }
            Self::FellTree { location } => {
                if !env.is_fellable(*location) {
                    return Err(JobStatus::Fail);
                }
                Ok(Goal {
                    target: *location,
                    positioning: DirectionSet::PLANAR,
                    action: Action::FellTree {
                        location: *location,
                    },
                })
            }
            Self::Fetch {
                item,
                destination,
                positioning,
            } => {
                let found = env.item(*item).ok_or(JobStatus::Abort)?;
                match found.location() {
                    ItemLocation::Carried(holder) if holder == worker.id => Ok(Goal {
                        target: *destination,
                        positioning: *positioning,
                        action: Action::DropItem { item: *item },
                    }),
                    ItemLocation::Carried(_) => Err(JobStatus::Abort),
                    ItemLocation::Ground(at) => Ok(pick_up(*item, at)),
                }
            }
            Self::Construct {
                location,
                mode,
                item,
            } => {
                if !env.can_construct(*location, *mode) {
                    return Err(JobStatus::Fail);
                }
                let found = env.item(*item).ok_or(JobStatus::Abort)?;
                match found.location() {
                    ItemLocation::Carried(holder) if holder == worker.id => Ok(Goal {
                        target: *location,
                        positioning: DirectionSet::PLANAR,
                        action: Action::Construct {
                            location: *location,
                            mode: *mode,
                            item: *item,
                        },
                    }),
                    ItemLocation::Carried(_) => Err(JobStatus::Abort),
                    ItemLocation::Ground(at) => Ok(pick_up(*item, at)),
                }
            }
            Self::BuildItem {
                workbench,
                location,
                sources,
                product,
            } => {
                if env.workbench(*workbench).is_none() {
                    return Err(JobStatus::Fail);
                }
                let all_present = sources.iter().all(|&source| {
                    env.item(source)
                        .is_some_and(|item| item.ground_location() == Some(*location))
                });
                if !all_present {
                    return Err(JobStatus::Abort);
                }
                Ok(Goal {
                    target: *location,
                    positioning: DirectionSet::EXACT,
                    action: Action::BuildItem {
                        workbench: *workbench,
                        sources: sources.clone(),
                        product: *product,
                    },
                })
            }
        }
    }
}

const fn pick_up(item: ObjectId, at: IntVector3) -> Goal {
    Goal {
        target: at,
        positioning: DirectionSet::EXACT,
        action: Action::GetItem { item },
    }
}
