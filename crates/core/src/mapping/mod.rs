use std::collections::BTreeMap;

use serde::Serialize;

use crate::expr::{EvalError, Expr, ParseError, ValueEnv};
use crate::tracker::{TrackerId, UpdaterId};

/// Reasons an object binding is rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BindError {
    #[error("tracker '{0}' does not exist")]
    UnknownTracker(String),
    #[error("'{0}' is not a point tracker")]
    NotAPoint(String),
    #[error("object '{0}' does not exist")]
    UnknownObject(String),
    #[error("object '{object}' has no connector function '{connector}'")]
    UnknownConnector { object: String, connector: String },
    #[error("syntax error in binding expression")]
    Syntax(#[source] ParseError),
    #[error("binding expressions may only use `value`, found tracker reference '[{0}]'")]
    TrackerReference(String),
    #[error("binding expressions may only use `value`, found '{0}'")]
    UnknownVariable(String),
}

/// Routes a tracker value into a connector function of a scene object.
///
/// The per-frame expression sees the tracker value as `value` (alias `x`)
/// and never reads other trackers, so bindings add no graph edges.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectBinding {
    pub tracker: TrackerId,
    pub object: String,
    pub connector: String,
    pub source: String,
    #[serde(skip)]
    expr: Expr,
}

impl ObjectBinding {
    pub fn new(
        tracker: impl Into<TrackerId>,
        object: impl Into<String>,
        connector: impl Into<String>,
        source: &str,
    ) -> Result<Self, BindError> {
        let source = source.trim();
        let expr = Expr::parse(source).map_err(BindError::Syntax)?;
        if let Some(id) = expr.tracker_refs().into_iter().next() {
            return Err(BindError::TrackerReference(id));
        }
        if let Some(name) = expr
            .variables()
            .into_iter()
            .find(|name| name != "value" && name != "x")
        {
            return Err(BindError::UnknownVariable(name));
        }
        Ok(Self {
            tracker: tracker.into(),
            object: object.into(),
            connector: connector.into(),
            source: source.to_string(),
            expr,
        })
    }

    pub fn updater_id(&self) -> UpdaterId {
        UpdaterId::Object {
            object: self.object.clone(),
            connector: self.connector.clone(),
        }
    }

    /// Value to hand to the connector for the given tracker value.
    pub fn evaluate(&self, value: f64) -> Result<f64, EvalError> {
        self.expr.eval(&ValueEnv(value))
    }
}

type BindingKey = (TrackerId, String, String);

/// All object bindings in a scene, at most one per
/// (tracker, object, connector).
#[derive(Debug, Default, Clone)]
pub struct BindingTable {
    bindings: BTreeMap<BindingKey, ObjectBinding>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(tracker: &str, object: &str, connector: &str) -> BindingKey {
        (tracker.to_string(), object.to_string(), connector.to_string())
    }

    pub fn insert(&mut self, binding: ObjectBinding) -> Option<ObjectBinding> {
        let key = Self::key(&binding.tracker, &binding.object, &binding.connector);
        self.bindings.insert(key, binding)
    }

    pub fn get(&self, tracker: &str, object: &str, connector: &str) -> Option<&ObjectBinding> {
        self.bindings.get(&Self::key(tracker, object, connector))
    }

    pub fn remove(&mut self, tracker: &str, object: &str, connector: &str) -> Option<ObjectBinding> {
        self.bindings.remove(&Self::key(tracker, object, connector))
    }

    /// Removes every binding driven by `tracker`.
    pub fn remove_tracker(&mut self, tracker: &str) -> Vec<ObjectBinding> {
        self.drain_where(|binding| binding.tracker == tracker)
    }

    /// Removes every binding that drives `object`.
    pub fn remove_object(&mut self, object: &str) -> Vec<ObjectBinding> {
        self.drain_where(|binding| binding.object == object)
    }

    fn drain_where(&mut self, pred: impl Fn(&ObjectBinding) -> bool) -> Vec<ObjectBinding> {
        let keys: Vec<BindingKey> = self
            .bindings
            .iter()
            .filter(|(_, binding)| pred(binding))
            .map(|(key, _)| key.clone())
            .collect();
        keys.iter()
            .filter_map(|key| self.bindings.remove(key))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObjectBinding> {
        self.bindings.values()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
