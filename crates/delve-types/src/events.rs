//! Change events emitted by the world for replication and logging layers.
//!
//! The simulation only emits these; formatting and transport belong to
//! whoever subscribes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actions::{Action, ActionOutcome};
use crate::enums::JobStatus;
use crate::ids::{JobId, ObjectId};

/// A user-visible log line ("Failed to find materials for Door").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLogEntry {
    /// Tick during which the entry was written.
    pub tick: u64,
    /// Human readable message.
    pub message: String,
    /// Wall-clock time the entry was written.
    pub logged_at: DateTime<Utc>,
}

impl EventLogEntry {
    /// Create an entry stamped with the current wall-clock time.
    pub fn new(tick: u64, message: impl Into<String>) -> Self {
        Self {
            tick,
            message: message.into(),
            logged_at: Utc::now(),
        }
    }
}

/// A discrete change broadcast by the world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorldChange {
    /// A tick began.
    TickStarted {
        /// The new tick number.
        tick: u64,
    },
    /// A tick ended.
    TickEnded {
        /// The tick that ended.
        tick: u64,
    },
    /// A living's turn ended.
    TurnEnded {
        /// Current tick.
        tick: u64,
        /// The living.
        living: ObjectId,
        /// The turn was skipped because the living did not decide in time.
        forced: bool,
    },
    /// A living joined the world.
    LivingAdded {
        /// The living.
        living: ObjectId,
    },
    /// A living left the world.
    LivingRemoved {
        /// The living.
        living: ObjectId,
    },
    /// A living finished an action.
    ActionDone {
        /// The living.
        living: ObjectId,
        /// The action performed.
        action: Action,
        /// Its outcome.
        outcome: ActionOutcome,
    },
    /// A job reached a terminal status.
    JobStatusChanged {
        /// The job.
        job: JobId,
        /// Its terminal status.
        status: JobStatus,
    },
    /// A user-visible log entry.
    EventLog(EventLogEntry),
}
