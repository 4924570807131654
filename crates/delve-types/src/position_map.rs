//! Serde adapter for maps keyed by [`IntVector3`].
//!
//! JSON objects only accept string keys, so position-keyed maps are written
//! as a sequence of `[position, value]` pairs. Use with
//! `#[serde(with = "delve_types::position_map")]`.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::geometry::IntVector3;

/// Serialize the map as a sequence of pairs.
pub fn serialize<V, S>(map: &BTreeMap<IntVector3, V>, serializer: S) -> Result<S::Ok, S::Error>
where
    V: Serialize,
    S: Serializer,
{
    serializer.collect_seq(map.iter())
}

/// Deserialize a sequence of pairs back into a map.
pub fn deserialize<'de, V, D>(deserializer: D) -> Result<BTreeMap<IntVector3, V>, D::Error>
where
    V: Deserialize<'de>,
    D: Deserializer<'de>,
{
    let pairs = Vec::<(IntVector3, V)>::deserialize(deserializer)?;
    Ok(pairs.into_iter().collect())
}
