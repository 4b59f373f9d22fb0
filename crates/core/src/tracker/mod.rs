use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::expr::{self, Env};
use crate::{Result, StageError};

/// Stable identifier of a tracker.
pub type TrackerId = String;

/// Identifies an updater registered on a tracker.
///
/// The id is derived from whatever the updater serves, so a tracker holds at
/// most one updater per dependent target and one per object property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UpdaterId {
    /// Recomputes the expression bound to `target`.
    Expression { target: TrackerId },
    /// Pushes the tracker value into a connector function of a scene object.
    Object { object: String, connector: String },
}

impl fmt::Display for UpdaterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expression { target } => write!(f, "expr:{target}"),
            Self::Object { object, connector } => write!(f, "object:{object}.{connector}"),
        }
    }
}

/// Registered updater together with the text that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Updater {
    pub id: UpdaterId,
    pub source: String,
}

/// Named mutable numeric cell.
///
/// Assigning the value does not fire anything by itself; the owning
/// [`TrackerNetwork`](crate::TrackerNetwork) walks [`Tracker::updaters`] after
/// every assignment.
#[derive(Debug, Clone)]
pub struct Tracker {
    id: TrackerId,
    value: f64,
    updaters: Vec<Updater>,
}

impl Tracker {
    pub fn new(id: impl Into<TrackerId>, value: f64) -> Self {
        Self {
            id: id.into(),
            value,
            updaters: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    /// Registers an updater, replacing one with the same id in place so its
    /// position in the firing order is kept.
    pub fn add_updater(&mut self, id: UpdaterId, source: impl Into<String>) {
        let source = source.into();
        match self.updaters.iter_mut().find(|u| u.id == id) {
            Some(existing) => existing.source = source,
            None => self.updaters.push(Updater { id, source }),
        }
    }

    /// Removes an updater. Returns `false` when no such updater was present.
    pub fn remove_updater(&mut self, id: &UpdaterId) -> bool {
        let before = self.updaters.len();
        self.updaters.retain(|u| &u.id != id);
        self.updaters.len() != before
    }

    /// Updater ids in registration order.
    pub fn updater_ids(&self) -> Vec<UpdaterId> {
        self.updaters.iter().map(|u| u.id.clone()).collect()
    }

    pub fn updaters(&self) -> &[Updater] {
        &self.updaters
    }
}

/// Registry of every tracker in a scene, keyed by id.
#[derive(Debug, Default, Clone)]
pub struct TrackerStore {
    trackers: BTreeMap<TrackerId, Tracker>,
}

impl TrackerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a tracker. Ids must be non-empty runs of ASCII letters,
    /// digits, `_` or `-`, and unique within the store.
    pub fn create(&mut self, id: &str, value: f64) -> Result<()> {
        if !expr::is_valid_id(id) {
            return Err(StageError::msg(format!("invalid tracker id `{id}`")));
        }
        if self.trackers.contains_key(id) {
            return Err(StageError::msg(format!("tracker `{id}` already exists")));
        }
        self.trackers.insert(id.to_string(), Tracker::new(id, value));
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Option<Tracker> {
        self.trackers.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.trackers.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Tracker> {
        self.trackers.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Tracker> {
        self.trackers.get_mut(id)
    }

    pub fn value(&self, id: &str) -> Option<f64> {
        self.trackers.get(id).map(Tracker::value)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.trackers.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tracker> {
        self.trackers.values()
    }

    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }
}

impl Env for TrackerStore {
    fn tracker(&self, id: &str) -> Option<f64> {
        self.value(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr_updater(target: &str) -> UpdaterId {
        UpdaterId::Expression {
            target: target.to_string(),
        }
    }

    #[test]
    fn replaces_updaters_with_the_same_id_in_place() {
        let mut tracker = Tracker::new("a", 0.0);
        tracker.add_updater(expr_updater("b"), "[b] = [a];");
        tracker.add_updater(expr_updater("c"), "[c] = [a];");
        tracker.add_updater(expr_updater("b"), "[b] = [a] * 2;");

        assert_eq!(tracker.updater_ids(), vec![expr_updater("b"), expr_updater("c")]);
        assert_eq!(tracker.updaters()[0].source, "[b] = [a] * 2;");
    }

    #[test]
    fn removing_a_missing_updater_is_a_no_op() {
        let mut tracker = Tracker::new("a", 1.0);
        assert!(!tracker.remove_updater(&expr_updater("zzz")));
        tracker.add_updater(expr_updater("b"), "");
        assert!(tracker.remove_updater(&expr_updater("b")));
        assert!(tracker.updater_ids().is_empty());
    }

    #[test]
    fn store_rejects_duplicate_and_malformed_ids() {
        let mut store = TrackerStore::new();
        store.create("speed", 2.0).unwrap();
        assert!(store.create("speed", 3.0).is_err());
        assert!(store.create("", 0.0).is_err());
        assert!(store.create("with space", 0.0).is_err());
        assert_eq!(store.value("speed"), Some(2.0));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn formats_updater_ids_for_listing() {
        assert_eq!(expr_updater("b").to_string(), "expr:b");
        let object = UpdaterId::Object {
            object: "circle".into(),
            connector: "radius".into(),
        };
        assert_eq!(object.to_string(), "object:circle.radius");
    }
}
