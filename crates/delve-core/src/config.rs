//! Configuration loading and typed config structures for the Delve simulation.
//!
//! The canonical configuration lives in `delve-config.yaml` next to the host
//! binary. This module defines strongly-typed structs that mirror the YAML
//! structure, and provides a loader that reads the file. Every section and
//! every field is optional; missing values take the documented defaults.

use std::path::Path;
use std::time::Duration;

use delve_jobs::JobTuning;
use delve_types::{IntSize3, TurnMode};
use serde::Deserialize;
use tracing::warn;

/// Environment variable overriding `world.turn_mode`.
pub const TURN_MODE_ENV: &str = "DELVE_TURN_MODE";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DelveConfig {
    /// World-level settings (name, seed, turn sequencing, timing).
    #[serde(default)]
    pub world: WorldConfig,

    /// Job source retry delays and limits.
    #[serde(default)]
    pub jobs: JobTuning,

    /// Simulation boundary parameters.
    #[serde(default)]
    pub simulation: SimulationBoundsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Demo map dimensions.
    #[serde(default)]
    pub map: MapConfig,
}

impl DelveConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// The `DELVE_TURN_MODE` environment variable (`simultaneous` or
    /// `sequential`) overrides `world.turn_mode` when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, applying environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document parses as null; treat it as all defaults.
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config
            .world
            .apply_turn_mode_override(std::env::var(TURN_MODE_ENV).ok().as_deref());
        Ok(config)
    }
}

/// World-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// Human-readable world name.
    #[serde(default = "default_world_name")]
    pub name: String,

    /// Random seed for animal wandering and the demo colony.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// How livings' turns are sequenced within a tick.
    #[serde(default)]
    pub turn_mode: TurnMode,

    /// Minimum real-time milliseconds between the end of one tick and the
    /// start of the next.
    #[serde(default = "default_min_tick_interval_ms")]
    pub min_tick_interval_ms: u64,

    /// Milliseconds a turn waits for undecided livings before forcing it.
    #[serde(default = "default_max_move_time_ms")]
    pub max_move_time_ms: u64,

    /// Only start ticks while at least one user is connected.
    #[serde(default)]
    pub require_connected_user: bool,
}

impl WorldConfig {
    /// The minimum inter-tick interval.
    pub const fn min_tick_interval(&self) -> Duration {
        Duration::from_millis(self.min_tick_interval_ms)
    }

    /// The per-turn decision budget.
    pub const fn max_move_time(&self) -> Duration {
        Duration::from_millis(self.max_move_time_ms)
    }

    /// Replace the turn mode with `value` when it names one. Unknown
    /// values are ignored with a warning.
    pub fn apply_turn_mode_override(&mut self, value: Option<&str>) {
        let Some(value) = value else {
            return;
        };
        match parse_turn_mode(value) {
            Some(mode) => self.turn_mode = mode,
            None => warn!(value, "Ignoring unknown {TURN_MODE_ENV}"),
        }
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: default_world_name(),
            seed: default_seed(),
            turn_mode: TurnMode::default(),
            min_tick_interval_ms: default_min_tick_interval_ms(),
            max_move_time_ms: default_max_move_time_ms(),
            require_connected_user: false,
        }
    }
}

/// Simulation boundary configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationBoundsConfig {
    /// Stop after this many ticks (0 = unlimited).
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,
}

impl Default for SimulationBoundsConfig {
    fn default() -> Self {
        Self {
            max_ticks: default_max_ticks(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default log level when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Demo map configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MapConfig {
    /// Width in tiles.
    #[serde(default = "default_map_width")]
    pub width: u32,

    /// Height in tiles.
    #[serde(default = "default_map_height")]
    pub height: u32,

    /// Number of z levels.
    #[serde(default = "default_map_depth")]
    pub depth: u32,
}

impl MapConfig {
    /// The map dimensions.
    pub const fn size(&self) -> IntSize3 {
        IntSize3::new(self.width, self.height, self.depth)
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: default_map_width(),
            height: default_map_height(),
            depth: default_map_depth(),
        }
    }
}

/// Parse a turn mode name as written in YAML.
pub fn parse_turn_mode(value: &str) -> Option<TurnMode> {
    match value.trim().to_ascii_lowercase().as_str() {
        "simultaneous" => Some(TurnMode::Simultaneous),
        "sequential" => Some(TurnMode::Sequential),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_world_name() -> String {
    "Delve".to_owned()
}

const fn default_seed() -> u64 {
    42
}

const fn default_min_tick_interval_ms() -> u64 {
    100
}

const fn default_max_move_time_ms() -> u64 {
    500
}

const fn default_max_ticks() -> u64 {
    0
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_map_width() -> u32 {
    32
}

const fn default_map_height() -> u32 {
    32
}

const fn default_map_depth() -> u32 {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = DelveConfig::default();
        assert_eq!(config.world.seed, 42);
        assert_eq!(config.world.turn_mode, TurnMode::Simultaneous);
        assert_eq!(config.world.min_tick_interval(), Duration::from_millis(100));
        assert_eq!(config.jobs.unreachable_ttl, 25);
        assert_eq!(config.simulation.max_ticks, 0);
        assert_eq!(config.map.size(), IntSize3::new(32, 32, 2));
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
world:
  name: "Test Colony"
  seed: 7
  turn_mode: sequential
  min_tick_interval_ms: 0
  max_move_time_ms: 250
  require_connected_user: true

jobs:
  unreachable_ttl: 30
  designation_retry: 5
  construct_material_retry: 15
  stockpile_retry: 20
  max_move_failures: 2
  max_path_nodes: 500

simulation:
  max_ticks: 100

logging:
  level: "debug"

map:
  width: 16
  height: 12
  depth: 1
"#;
        let config = DelveConfig::parse(yaml);
        assert!(config.is_ok(), "{config:?}");
        let config = config.ok().unwrap_or_default();

        assert_eq!(config.world.name, "Test Colony");
        assert!(config.world.require_connected_user);
        assert_eq!(config.world.max_move_time(), Duration::from_millis(250));
        assert_eq!(config.jobs.designation_retry, 5);
        assert_eq!(config.jobs.max_path_nodes, 500);
        assert_eq!(config.simulation.max_ticks, 100);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.map.size(), IntSize3::new(16, 12, 1));
    }

    #[test]
    fn parse_minimal_yaml() {
        let config = DelveConfig::parse("world:\n  seed: 9\n");
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_default();

        // Seed is overridden
        assert_eq!(config.world.seed, 9);
        // Everything else uses defaults
        assert_eq!(config.world.max_move_time_ms, 500);
        assert_eq!(config.jobs.construct_material_retry, 20);
    }

    #[test]
    fn parse_empty_yaml() {
        assert!(DelveConfig::parse("").is_ok());
    }

    #[test]
    fn turn_mode_override() {
        let mut world = WorldConfig::default();
        world.apply_turn_mode_override(Some("Sequential"));
        assert_eq!(world.turn_mode, TurnMode::Sequential);
        world.apply_turn_mode_override(Some("sideways"));
        assert_eq!(world.turn_mode, TurnMode::Sequential);
        world.apply_turn_mode_override(None);
        assert_eq!(world.turn_mode, TurnMode::Sequential);
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        assert!(matches!(
            DelveConfig::parse("world: [unclosed"),
            Err(ConfigError::Yaml { .. })
        ));
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("delve-config.yaml");
        if path.exists() {
            let config = DelveConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
