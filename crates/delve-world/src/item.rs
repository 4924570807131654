//! Movable items, their claim fields, and item filters.
//!
//! `reserved_by` and `stockpiled_by` are the only exclusion mechanism for
//! contested items. They are mutated exclusively through the assertion
//! checked helpers on [`Environment`](crate::Environment).

use std::collections::BTreeSet;

use delve_types::{IntVector3, ItemKind, JobSourceId, MaterialCategory, MaterialId, ObjectId};
use serde::{Deserialize, Serialize};

/// Where an item currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemLocation {
    /// Lying on a tile.
    Ground(IntVector3),
    /// Carried by a living.
    Carried(ObjectId),
}

/// A movable item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemObject {
    pub(crate) id: ObjectId,
    pub(crate) kind: ItemKind,
    pub(crate) material: MaterialId,
    pub(crate) location: ItemLocation,
    pub(crate) reserved_by: Option<JobSourceId>,
    pub(crate) stockpiled_by: Option<JobSourceId>,
}

impl ItemObject {
    /// Create an unclaimed item lying at `location`.
    pub fn new(kind: ItemKind, material: MaterialId, location: IntVector3) -> Self {
        Self {
            id: ObjectId::new(),
            kind,
            material,
            location: ItemLocation::Ground(location),
            reserved_by: None,
            stockpiled_by: None,
        }
    }

    /// The item's id.
    pub const fn id(&self) -> ObjectId {
        self.id
    }

    /// The item's kind.
    pub const fn kind(&self) -> ItemKind {
        self.kind
    }

    /// The item's material.
    pub const fn material(&self) -> MaterialId {
        self.material
    }

    /// Where the item is.
    pub const fn location(&self) -> ItemLocation {
        self.location
    }

    /// The tile the item lies on, if it is not being carried.
    pub const fn ground_location(&self) -> Option<IntVector3> {
        match self.location {
            ItemLocation::Ground(p) => Some(p),
            ItemLocation::Carried(_) => None,
        }
    }

    /// The job source holding a reservation on the item.
    pub const fn reserved_by(&self) -> Option<JobSourceId> {
        self.reserved_by
    }

    /// The stockpile the item is stored in.
    pub const fn stockpiled_by(&self) -> Option<JobSourceId> {
        self.stockpiled_by
    }

    /// Unreserved and lying on the ground.
    pub const fn is_free(&self) -> bool {
        self.reserved_by.is_none() && self.ground_location().is_some()
    }
}

/// A predicate over items: each populated set must contain the item's
/// corresponding attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFilter {
    kinds: Option<BTreeSet<ItemKind>>,
    categories: Option<BTreeSet<MaterialCategory>>,
    materials: Option<BTreeSet<MaterialId>>,
}

impl ItemFilter {
    /// Match every item.
    pub fn any() -> Self {
        Self::default()
    }

    /// Match items of one of the given kinds.
    pub fn kinds(kinds: &[ItemKind]) -> Self {
        Self {
            kinds: Some(kinds.iter().copied().collect()),
            ..Self::default()
        }
    }

    /// Match items made of a material in one of the given categories.
    pub fn categories(categories: &[MaterialCategory]) -> Self {
        Self {
            categories: Some(categories.iter().copied().collect()),
            ..Self::default()
        }
    }

    /// Additionally restrict to the given materials.
    #[must_use]
    pub fn with_materials(mut self, materials: &[MaterialId]) -> Self {
        self.materials = Some(materials.iter().copied().collect());
        self
    }

    /// Whether `item` passes the filter.
    pub fn matches(&self, item: &ItemObject) -> bool {
        self.kinds.as_ref().is_none_or(|k| k.contains(&item.kind))
            && self
                .categories
                .as_ref()
                .is_none_or(|c| c.contains(&item.material.category()))
            && self
                .materials
                .as_ref()
                .is_none_or(|m| m.contains(&item.material))
    }

    /// A filter matching only items that pass both filters.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        Self {
            kinds: intersect_sets(self.kinds.as_ref(), other.kinds.as_ref()),
            categories: intersect_sets(self.categories.as_ref(), other.categories.as_ref()),
            materials: intersect_sets(self.materials.as_ref(), other.materials.as_ref()),
        }
    }
}

fn intersect_sets<T: Ord + Copy>(
    a: Option<&BTreeSet<T>>,
    b: Option<&BTreeSet<T>>,
) -> Option<BTreeSet<T>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.intersection(b).copied().collect()),
        (Some(only), None) | (None, Some(only)) => Some(only.clone()),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log() -> ItemObject {
        ItemObject::new(ItemKind::Log, MaterialId::Oak, IntVector3::new(0, 0, 0))
    }

    #[test]
    fn any_matches_everything() {
        assert!(ItemFilter::any().matches(&log()));
    }

    #[test]
    fn kind_and_category_must_both_match() {
        let wood_logs = ItemFilter::kinds(&[ItemKind::Log])
            .intersect(&ItemFilter::categories(&[MaterialCategory::Wood]));
        assert!(wood_logs.matches(&log()));

        let rock_logs = ItemFilter::kinds(&[ItemKind::Log])
            .intersect(&ItemFilter::categories(&[MaterialCategory::Rock]));
        assert!(!rock_logs.matches(&log()));
    }

    #[test]
    fn intersection_of_disjoint_kinds_matches_nothing() {
        let filter = ItemFilter::kinds(&[ItemKind::Block]).intersect(&ItemFilter::kinds(&[ItemKind::Log]));
        assert!(!filter.matches(&log()));
    }

    #[test]
    fn material_restriction() {
        let birch_only = ItemFilter::any().with_materials(&[MaterialId::Birch]);
        assert!(!birch_only.matches(&log()));
    }
}
