//! Tracker network: trackers, the dependency graph, object bindings and the
//! object registry they write into.
//!
//! Every value change goes through [`TrackerNetwork::set_value`], which
//! assigns the value and then fires the tracker's updaters in registration
//! order. Propagation is synchronous and depth-first; the graph is acyclic so
//! it always terminates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::connector::{self, ConnectError, Connection};
use crate::expr::EvalError;
use crate::graph::DependencyGraph;
use crate::mapping::{BindError, BindingTable, ObjectBinding};
use crate::scene::ObjectRegistry;
use crate::tracker::{Tracker, TrackerId, TrackerStore, UpdaterId};
use crate::{expr, Result, StageError};

/// Component of a point tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    X,
    Y,
}

/// Pair of scalar trackers that together hold a 2D point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointTracker {
    pub id: TrackerId,
    pub x: TrackerId,
    pub y: TrackerId,
}

impl PointTracker {
    pub fn component(&self, axis: Axis) -> &str {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
        }
    }
}

/// What a fired updater wants to write.
enum Effect {
    Tracker { target: TrackerId, value: f64 },
    Object { object: String, connector: String, value: f64 },
}

#[derive(Debug)]
pub struct TrackerNetwork<O> {
    trackers: TrackerStore,
    graph: DependencyGraph,
    bindings: BindingTable,
    points: BTreeMap<TrackerId, PointTracker>,
    objects: O,
}

impl<O: ObjectRegistry + Default> Default for TrackerNetwork<O> {
    fn default() -> Self {
        Self::new(O::default())
    }
}

impl<O: ObjectRegistry> TrackerNetwork<O> {
    pub fn new(objects: O) -> Self {
        Self {
            trackers: TrackerStore::new(),
            graph: DependencyGraph::new(),
            bindings: BindingTable::new(),
            points: BTreeMap::new(),
            objects,
        }
    }

    pub fn objects(&self) -> &O {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut O {
        &mut self.objects
    }

    pub fn trackers(&self) -> &TrackerStore {
        &self.trackers
    }

    pub fn tracker(&self, id: &str) -> Option<&Tracker> {
        self.trackers.get(id)
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    pub fn value(&self, id: &str) -> Option<f64> {
        self.trackers.value(id)
    }

    pub fn create_tracker(&mut self, id: &str, value: f64) -> Result<()> {
        if self.points.contains_key(id) {
            return Err(StageError::msg(format!("`{id}` is already a point tracker")));
        }
        self.trackers.create(id, value)?;
        debug!(tracker = id, value, "tracker created");
        Ok(())
    }

    /// Creates a point tracker backed by the scalar trackers `<id>_x` and
    /// `<id>_y`.
    pub fn create_point_tracker(&mut self, id: &str, x: f64, y: f64) -> Result<PointTracker> {
        if !expr::is_valid_id(id) {
            return Err(StageError::msg(format!("invalid tracker id `{id}`")));
        }
        let point = PointTracker {
            id: id.to_string(),
            x: format!("{id}_x"),
            y: format!("{id}_y"),
        };
        if self.points.contains_key(id) || self.trackers.contains(id) {
            return Err(StageError::msg(format!("tracker `{id}` already exists")));
        }
        for component in [&point.x, &point.y] {
            if self.trackers.contains(component) {
                return Err(StageError::msg(format!("tracker `{component}` already exists")));
            }
        }
        self.trackers.create(&point.x, x)?;
        self.trackers.create(&point.y, y)?;
        self.points.insert(id.to_string(), point.clone());
        debug!(tracker = id, x, y, "point tracker created");
        Ok(point)
    }

    pub fn point(&self, id: &str) -> Option<&PointTracker> {
        self.points.get(id)
    }

    pub fn point_value(&self, id: &str) -> Option<(f64, f64)> {
        let point = self.points.get(id)?;
        Some((self.trackers.value(&point.x)?, self.trackers.value(&point.y)?))
    }

    /// Assigns `value` and fires every updater of the tracker, returning once
    /// all transitive updates are done. Returns `false` for unknown ids.
    pub fn set_value(&mut self, id: &str, value: f64) -> bool {
        let Some(tracker) = self.trackers.get_mut(id) else {
            warn!(tracker = id, "set_value on unknown tracker");
            return false;
        };
        tracker.set_value(value);
        let updaters = tracker.updater_ids();
        for updater in &updaters {
            self.fire(id, updater);
        }
        true
    }

    pub fn set_point_value(&mut self, id: &str, x: f64, y: f64) -> bool {
        let Some(point) = self.points.get(id).cloned() else {
            warn!(tracker = id, "set_point_value on unknown point tracker");
            return false;
        };
        self.set_value(&point.x, x) && self.set_value(&point.y, y)
    }

    /// Runs one updater of `source`. Evaluation failures skip this tick and
    /// leave the target untouched; this is the only place they are dropped.
    fn fire(&mut self, source: &str, updater: &UpdaterId) {
        let effect = match updater {
            UpdaterId::Expression { target } => {
                self.evaluate_target(target).map(|value| Effect::Tracker {
                    target: target.clone(),
                    value,
                })
            }
            UpdaterId::Object { object, connector } => self
                .evaluate_binding(source, object, connector)
                .map(|value| Effect::Object {
                    object: object.clone(),
                    connector: connector.clone(),
                    value,
                }),
        };

        match effect {
            Ok(Effect::Tracker { target, value }) => {
                self.set_value(&target, value);
            }
            Ok(Effect::Object {
                object,
                connector,
                value,
            }) => {
                if let Err(err) = self.objects.apply(&object, &connector, value) {
                    warn!(%object, %connector, %err, "connector rejected value");
                }
            }
            Err(err) => {
                trace!(source, %updater, %err, "evaluation failed, skipping update");
            }
        }
    }

    fn evaluate_target(&self, target: &str) -> std::result::Result<f64, EvalError> {
        let bound = self
            .graph
            .get(target)
            .ok_or_else(|| EvalError::UnknownTracker(target.to_string()))?;
        bound.expr.eval(&self.trackers)
    }

    fn evaluate_binding(
        &self,
        tracker: &str,
        object: &str,
        connector: &str,
    ) -> std::result::Result<f64, EvalError> {
        let value = self
            .trackers
            .value(tracker)
            .ok_or_else(|| EvalError::UnknownTracker(tracker.to_string()))?;
        let binding = self
            .bindings
            .get(tracker, object, connector)
            .ok_or_else(|| EvalError::UnknownTracker(tracker.to_string()))?;
        binding.evaluate(value)
    }

    /// Validates and links a `[target] = <expr>;` statement, then evaluates
    /// the target once so it is correct before the next dependency change.
    pub fn connect(&mut self, text: &str) -> std::result::Result<Connection, ConnectError> {
        let connection = connector::connect(&mut self.trackers, &mut self.graph, text)?;
        let updater = UpdaterId::Expression {
            target: connection.target.clone(),
        };
        self.fire(&connection.target, &updater);
        Ok(connection)
    }

    /// Removes the expression bound to `target`. No-op when unbound.
    pub fn remove_expression(&mut self, target: &str) -> bool {
        connector::remove_expression(&mut self.trackers, &mut self.graph, target)
    }

    /// Source text of the expression bound to `target`.
    pub fn expression(&self, target: &str) -> Option<&str> {
        self.graph.get(target).map(|bound| bound.source.as_str())
    }

    /// Binds `tracker` to a connector function of `object`, replacing any
    /// binding of the same tracker to the same property, and applies it once.
    pub fn bind_object(
        &mut self,
        tracker: &str,
        object: &str,
        connector: &str,
        expression: &str,
    ) -> std::result::Result<(), BindError> {
        if !self.trackers.contains(tracker) {
            return Err(BindError::UnknownTracker(tracker.to_string()));
        }
        let names = self
            .objects
            .connector_names(object)
            .ok_or_else(|| BindError::UnknownObject(object.to_string()))?;
        if !names.iter().any(|name| name == connector) {
            return Err(BindError::UnknownConnector {
                object: object.to_string(),
                connector: connector.to_string(),
            });
        }

        let binding = ObjectBinding::new(tracker, object, connector, expression)?;
        let updater = binding.updater_id();
        if let Some(target) = self.trackers.get_mut(tracker) {
            target.add_updater(updater.clone(), binding.source.clone());
        }
        self.bindings.insert(binding);
        debug!(tracker, object, connector, "object binding created");

        self.fire(tracker, &updater);
        Ok(())
    }

    pub fn unbind_object(&mut self, tracker: &str, object: &str, connector: &str) -> bool {
        let Some(binding) = self.bindings.remove(tracker, object, connector) else {
            warn!(tracker, object, connector, "no object binding to remove");
            return false;
        };
        if let Some(target) = self.trackers.get_mut(tracker) {
            target.remove_updater(&binding.updater_id());
        }
        true
    }

    /// Drops every binding that drives `object`, e.g. when it leaves the
    /// scene. Returns how many bindings were removed.
    pub fn forget_object(&mut self, object: &str) -> usize {
        let removed = self.bindings.remove_object(object);
        for binding in &removed {
            if let Some(tracker) = self.trackers.get_mut(&binding.tracker) {
                tracker.remove_updater(&binding.updater_id());
            }
        }
        removed.len()
    }

    /// Destroys a tracker (or a whole point tracker) and everything that
    /// referenced it: its own expression, every expression reading it and
    /// its object bindings. Returns the ids of the scalar trackers removed.
    pub fn destroy_tracker(&mut self, id: &str) -> Vec<TrackerId> {
        let point = self
            .points
            .values()
            .find(|point| point.id == id || point.x == id || point.y == id)
            .cloned();
        if let Some(point) = point {
            self.points.remove(&point.id);
            let mut removed = Vec::new();
            for component in [point.x, point.y] {
                if self.destroy_scalar(&component) {
                    removed.push(component);
                }
            }
            return removed;
        }

        if self.destroy_scalar(id) {
            vec![id.to_string()]
        } else {
            Vec::new()
        }
    }

    fn destroy_scalar(&mut self, id: &str) -> bool {
        if !self.trackers.contains(id) {
            warn!(tracker = id, "destroy on unknown tracker");
            return false;
        }
        if self.graph.is_bound(id) {
            self.remove_expression(id);
        }
        for dependent in self.graph.dependents_of(id) {
            debug!(tracker = id, %dependent, "unbinding dependent expression");
            self.remove_expression(&dependent);
        }
        self.bindings.remove_tracker(id);
        self.trackers.remove(id);
        debug!(tracker = id, "tracker destroyed");
        true
    }
}
