//! World clock, tick state machine, livings, and simulation thread for the
//! Delve colony simulation.
//!
//! A [`World`] owns the environment, the job board, the registered job
//! sources, and the livings. [`World::work`] advances its tick state
//! machine one step at a time; [`spawn_world_thread`] drives it on a
//! dedicated thread and exposes a [`WorldHandle`] for invokes, reads, and
//! the change stream.
//!
//! # Modules
//!
//! - [`ai`] -- [`Ai`] decision makers: manual, worker, wanderer, attacker.
//! - [`clock`] -- [`WorldClock`], the monotonic tick counter.
//! - [`config`] -- [`DelveConfig`] loaded from `delve-config.yaml`.
//! - [`execute`] -- Applying actions to the environment.
//! - [`living`] -- [`Living`] and its in-progress action.
//! - [`operator`] -- [`OperatorState`]: pause, resume, stop, tick speed.
//! - [`runner`] -- The world thread and its [`WorldHandle`].
//! - [`world`] -- [`World`] and the tick state machine.

pub mod ai;
pub mod clock;
pub mod config;
pub mod execute;
pub mod living;
pub mod operator;
pub mod runner;
pub mod world;

pub use ai::{Ai, AiContext, AttackAi, Decision, DwarfWorkAi, ManualAi, WanderAi};
pub use clock::{ClockError, WorldClock};
pub use config::{ConfigError, DelveConfig};
pub use living::{CurrentAction, Living, LivingSnapshot};
pub use operator::{OperatorState, SimulationEndReason};
pub use runner::{RunSummary, RunnerError, WorldHandle, spawn_world_thread};
pub use world::{Invoke, TickError, WorkResult, World, WorldOptions, WorldSnapshot};
