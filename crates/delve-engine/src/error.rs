//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure mode of startup and the simulation
//! run so `main` can propagate with `?`.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: delve_core::ConfigError,
    },

    /// Building the demo map failed.
    #[error("world error: {source}")]
    World {
        /// The underlying environment error.
        #[from]
        source: delve_world::WorldError,
    },

    /// Placing livings or workbenches failed.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: delve_core::TickError,
    },

    /// A build order was rejected.
    #[error("job error: {source}")]
    Job {
        /// The underlying job error.
        #[from]
        source: delve_jobs::JobError,
    },

    /// The world thread failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: delve_core::RunnerError,
    },

    /// The final snapshot could not be serialized.
    #[error("snapshot serialization failed: {source}")]
    Snapshot {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// The configured map cannot hold the demo colony.
    #[error("map {width}x{height} is too small for the demo colony (minimum 16x12)")]
    MapTooSmall {
        /// Configured width.
        width: u32,
        /// Configured height.
        height: u32,
    },
}

/// Smallest map width the demo colony fits on.
pub const MIN_WIDTH: u32 = 16;

/// Smallest map height the demo colony fits on.
pub const MIN_HEIGHT: u32 = 12;
