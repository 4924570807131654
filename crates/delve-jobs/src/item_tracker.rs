//! Distance-ordered index of items a job source may want.
//!
//! A [`TargetItemTracker`] keeps every eligible item bucketed by location,
//! ordered by distance from a fixed origin. It is kept in sync by feeding
//! it the environment's events; eligibility is re-checked when iterating,
//! so a reservation taken earlier in the same step is never handed out
//! twice even before its event has been delivered.

use std::collections::{BTreeMap, BTreeSet};

use delve_types::{IntBox, IntVector3, ObjectId};
use delve_world::{Environment, EnvironmentEvent, ItemFilter, ItemObject};

/// Which items a tracker follows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerRules {
    /// Items must match this filter.
    pub filter: ItemFilter,
    /// Items inside this area are ignored.
    pub exclude_area: Option<IntBox>,
    /// Whether items already stored in a stockpile count.
    pub include_stockpiled: bool,
}

impl TrackerRules {
    /// Whether `item` is currently eligible.
    pub fn accepts(&self, item: &ItemObject) -> bool {
        let Some(location) = item.ground_location() else {
            return false;
        };
        item.reserved_by().is_none()
            && (self.include_stockpiled || item.stockpiled_by().is_none())
            && !self.exclude_area.is_some_and(|area| area.contains(location))
            && self.filter.matches(item)
    }
}

/// Distance measure used to order buckets.
pub type DistanceFn = fn(IntVector3, IntVector3) -> u64;

/// Items matching a set of rules, nearest first.
#[derive(Debug, Clone)]
pub struct TargetItemTracker {
    origin: IntVector3,
    rules: TrackerRules,
    distance: DistanceFn,
    enabled: bool,
    buckets: BTreeMap<(u64, IntVector3), BTreeSet<ObjectId>>,
    locations: BTreeMap<ObjectId, IntVector3>,
}

impl TargetItemTracker {
    /// A disabled tracker ordering by squared distance from `origin`.
    pub fn new(origin: IntVector3, rules: TrackerRules) -> Self {
        Self {
            origin,
            rules,
            distance: IntVector3::distance_sq,
            enabled: false,
            buckets: BTreeMap::new(),
            locations: BTreeMap::new(),
        }
    }

    /// Order buckets by `distance` instead.
    #[must_use]
    pub fn with_distance(mut self, distance: DistanceFn) -> Self {
        self.distance = distance;
        self
    }

    /// Start tracking, indexing every eligible item in `env`.
    pub fn enable(&mut self, env: &Environment) {
        self.enabled = true;
        self.rebuild(env);
    }

    /// Stop tracking and forget every item.
    pub fn disable(&mut self) {
        self.enabled = false;
        self.buckets.clear();
        self.locations.clear();
    }

    /// Whether the tracker is following the environment.
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The current rules.
    pub const fn rules(&self) -> &TrackerRules {
        &self.rules
    }

    /// Replace the rules, re-indexing if enabled.
    pub fn set_rules(&mut self, rules: TrackerRules, env: &Environment) {
        self.rules = rules;
        if self.enabled {
            self.rebuild(env);
        }
    }

    fn rebuild(&mut self, env: &Environment) {
        self.buckets.clear();
        self.locations.clear();
        let eligible: Vec<(ObjectId, IntVector3)> = env
            .items()
            .filter(|item| self.rules.accepts(item))
            .filter_map(|item| Some((item.id(), item.ground_location()?)))
            .collect();
        for (id, location) in eligible {
            self.track(id, location);
        }
    }

    /// Apply an environment event.
    pub fn handle_event(&mut self, env: &Environment, event: &EnvironmentEvent) {
        if !self.enabled {
            return;
        }
        match *event {
            EnvironmentEvent::ObjectAdded { object, .. }
            | EnvironmentEvent::ObjectMoved { object, .. }
            | EnvironmentEvent::ItemStateChanged { item: object } => self.refresh(env, object),
            EnvironmentEvent::ObjectRemoved { object, .. } => self.untrack(object),
            EnvironmentEvent::TerrainChanged { .. } => {}
        }
    }

    /// Re-evaluate a single item after its eligibility may have changed.
    pub fn refresh(&mut self, env: &Environment, id: ObjectId) {
        if !self.enabled {
            return;
        }
        self.untrack(id);
        if let Some(item) = env.item(id)
            && self.rules.accepts(item)
            && let Some(location) = item.ground_location()
        {
            self.track(id, location);
        }
    }

    fn track(&mut self, id: ObjectId, location: IntVector3) {
        let key = ((self.distance)(self.origin, location), location);
        self.buckets.entry(key).or_default().insert(id);
        self.locations.insert(id, location);
    }

    fn untrack(&mut self, id: ObjectId) {
        let Some(location) = self.locations.remove(&id) else {
            return;
        };
        let key = ((self.distance)(self.origin, location), location);
        if let Some(bucket) = self.buckets.get_mut(&key) {
            bucket.remove(&id);
            if bucket.is_empty() {
                self.buckets.remove(&key);
            }
        }
    }

    /// Tracked items that are still eligible, nearest first.
    pub fn candidates<'a>(
        &'a self,
        env: &'a Environment,
    ) -> impl Iterator<Item = &'a ItemObject> + 'a {
        self.buckets
            .values()
            .flatten()
            .filter_map(|&id| env.item(id))
            .filter(|item| self.rules.accepts(item))
    }

    /// The nearest eligible item.
    pub fn nearest<'a>(&'a self, env: &'a Environment) -> Option<&'a ItemObject> {
        self.candidates(env).next()
    }

    /// Number of tracked items.
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// Whether no items are tracked.
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

impl Default for TargetItemTracker {
    fn default() -> Self {
        Self::new(IntVector3::default(), TrackerRules::default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use delve_types::{IntSize3, ItemKind, JobSourceId, MaterialId};
    use delve_world::TileData;

    use super::*;

    fn floor_map() -> Environment {
        let mut env = Environment::new(IntSize3::new(10, 10, 1));
        env.fill(
            IntBox::from_corners(IntVector3::new(0, 0, 0), IntVector3::new(9, 9, 0)),
            TileData::floor(MaterialId::Granite),
        )
        .unwrap();
        env
    }

    fn logs_only() -> TrackerRules {
        TrackerRules {
            filter: ItemFilter::kinds(&[ItemKind::Log]),
            ..TrackerRules::default()
        }
    }

    fn sync(tracker: &mut TargetItemTracker, env: &mut Environment) {
        for event in env.drain_events() {
            tracker.handle_event(env, &event);
        }
    }

    #[test]
    fn nearest_item_first() {
        let mut env = floor_map();
        let far = env
            .add_item(ItemObject::new(ItemKind::Log, MaterialId::Oak, IntVector3::new(9, 9, 0)))
            .unwrap();
        let near = env
            .add_item(ItemObject::new(ItemKind::Log, MaterialId::Oak, IntVector3::new(1, 0, 0)))
            .unwrap();
        env.add_item(ItemObject::new(ItemKind::Rock, MaterialId::Granite, IntVector3::new(0, 1, 0)))
            .unwrap();

        let mut tracker = TargetItemTracker::new(IntVector3::new(0, 0, 0), logs_only());
        tracker.enable(&env);
        let order: Vec<ObjectId> = tracker.candidates(&env).map(ItemObject::id).collect();
        assert_eq!(order, vec![near, far]);
    }

    #[test]
    fn follows_moves_and_removals() {
        let mut env = floor_map();
        let mut tracker = TargetItemTracker::new(IntVector3::new(0, 0, 0), logs_only());
        tracker.enable(&env);

        let log = env
            .add_item(ItemObject::new(ItemKind::Log, MaterialId::Oak, IntVector3::new(5, 5, 0)))
            .unwrap();
        sync(&mut tracker, &mut env);
        assert_eq!(tracker.len(), 1);

        let other = env
            .add_item(ItemObject::new(ItemKind::Log, MaterialId::Birch, IntVector3::new(3, 3, 0)))
            .unwrap();
        env.move_item(log, IntVector3::new(1, 1, 0)).unwrap();
        sync(&mut tracker, &mut env);
        assert_eq!(tracker.nearest(&env).map(ItemObject::id), Some(log));

        env.remove_item(log);
        sync(&mut tracker, &mut env);
        assert_eq!(tracker.nearest(&env).map(ItemObject::id), Some(other));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn reserved_items_are_skipped_before_events_arrive() {
        let mut env = floor_map();
        let log = env
            .add_item(ItemObject::new(ItemKind::Log, MaterialId::Oak, IntVector3::new(2, 2, 0)))
            .unwrap();
        let mut tracker = TargetItemTracker::new(IntVector3::new(0, 0, 0), logs_only());
        tracker.enable(&env);

        let owner = JobSourceId::new();
        env.reserve_item(log, owner).unwrap();
        assert!(tracker.nearest(&env).is_none());

        env.release_item(log, owner);
        sync(&mut tracker, &mut env);
        assert_eq!(tracker.nearest(&env).map(ItemObject::id), Some(log));
    }

    #[test]
    fn excluded_area_is_ignored() {
        let mut env = floor_map();
        env.add_item(ItemObject::new(ItemKind::Log, MaterialId::Oak, IntVector3::new(1, 1, 0)))
            .unwrap();
        let rules = TrackerRules {
            exclude_area: Some(IntBox::from_corners(
                IntVector3::new(0, 0, 0),
                IntVector3::new(2, 2, 0),
            )),
            ..logs_only()
        };
        let mut tracker = TargetItemTracker::new(IntVector3::new(0, 0, 0), rules);
        tracker.enable(&env);
        assert!(tracker.is_empty());
    }

    #[test]
    fn disabled_tracker_ignores_events() {
        let mut env = floor_map();
        let mut tracker = TargetItemTracker::new(IntVector3::new(0, 0, 0), logs_only());
        env.add_item(ItemObject::new(ItemKind::Log, MaterialId::Oak, IntVector3::new(1, 1, 0)))
            .unwrap();
        sync(&mut tracker, &mut env);
        assert!(tracker.is_empty());
        assert!(!tracker.is_enabled());
    }
}
