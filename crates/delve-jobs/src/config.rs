//! Tuning knobs for the job sources.
//!
//! These values correspond to the `jobs` section of `delve-config.yaml`.
//! The [`JobTuning`] struct bundles every tunable so that callers (the
//! world, tests) can override defaults.

use serde::{Deserialize, Serialize};

/// Retry and cache lifetimes used by the job sources, in ticks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobTuning {
    /// How long a location stays in an [`Unreachables`](crate::Unreachables)
    /// cache (default: 25).
    pub unreachable_ttl: u64,

    /// Delay before a designation whose reachability check failed is tried
    /// again (default: 10).
    pub designation_retry: u64,

    /// Delay before a construction site without material is tried again
    /// (default: 20).
    pub construct_material_retry: u64,

    /// Lifetime of a stockpile's unreachable-item entries (default: 25).
    pub stockpile_retry: u64,

    /// Consecutive blocked moves after which an assignment aborts
    /// (default: 3).
    pub max_move_failures: u32,

    /// Tiles a single path search may visit before giving up
    /// (default: 10000).
    pub max_path_nodes: usize,
}

impl Default for JobTuning {
    fn default() -> Self {
        Self {
            unreachable_ttl: 25,
            designation_retry: 10,
            construct_material_retry: 20,
            stockpile_retry: 25,
            max_move_failures: 3,
            max_path_nodes: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let tuning = JobTuning::default();
        assert_eq!(tuning.unreachable_ttl, 25);
        assert_eq!(tuning.designation_retry, 10);
        assert_eq!(tuning.max_move_failures, 3);
        assert_eq!(tuning.max_path_nodes, 10_000);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let tuning: JobTuning = serde_json::from_str(r#"{"designation_retry": 4}"#).unwrap_or_default();
        assert_eq!(tuning.designation_retry, 4);
        assert_eq!(tuning.stockpile_retry, 25);
    }
}
