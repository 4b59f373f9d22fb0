use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Result, StageError};

/// Capability lookup for visual objects whose properties trackers drive.
pub trait ObjectRegistry {
    /// Connector function names the object exposes, or `None` when no object
    /// with that id exists.
    fn connector_names(&self, object: &str) -> Option<Vec<String>>;

    /// Applies `value` through the object's named connector function.
    fn apply(&mut self, object: &str, connector: &str, value: f64) -> Result<()>;

    fn has_connector(&self, object: &str, connector: &str) -> bool {
        self.connector_names(object)
            .is_some_and(|names| names.iter().any(|name| name == connector))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Circle,
    Rectangle,
    Line,
    Text,
    /// On-canvas control representing a tracker.
    Slider,
}

impl ObjectKind {
    /// Connector functions objects of this kind expose.
    pub fn connectors(self) -> &'static [&'static str] {
        match self {
            Self::Circle => &["x", "y", "radius", "stroke_width", "opacity"],
            Self::Rectangle => &["x", "y", "width", "height", "rotation", "opacity"],
            Self::Line => &["x1", "y1", "x2", "y2", "stroke_width", "opacity"],
            Self::Text => &["x", "y", "font_size", "rotation", "opacity"],
            Self::Slider => &["x", "y", "value", "opacity"],
        }
    }
}

fn default_property(name: &str) -> f64 {
    match name {
        "opacity" | "radius" | "width" | "height" | "stroke_width" => 1.0,
        "font_size" => 16.0,
        _ => 0.0,
    }
}

/// Simple visual object holding one numeric value per connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub id: String,
    pub kind: ObjectKind,
    pub properties: BTreeMap<String, f64>,
}

impl SceneObject {
    pub fn new(id: impl Into<String>, kind: ObjectKind) -> Self {
        let properties = kind
            .connectors()
            .iter()
            .map(|name| (name.to_string(), default_property(name)))
            .collect();
        Self {
            id: id.into(),
            kind,
            properties,
        }
    }

    pub fn property(&self, name: &str) -> Option<f64> {
        self.properties.get(name).copied()
    }
}

/// In-memory [`ObjectRegistry`] over [`SceneObject`]s.
#[derive(Debug, Default, Clone)]
pub struct SceneObjects {
    objects: BTreeMap<String, SceneObject>,
}

impl SceneObjects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, object: SceneObject) -> Result<()> {
        if self.objects.contains_key(&object.id) {
            return Err(StageError::msg(format!("object `{}` already exists", object.id)));
        }
        self.objects.insert(object.id.clone(), object);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Option<SceneObject> {
        self.objects.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&SceneObject> {
        self.objects.get(id)
    }

    pub fn property(&self, id: &str, name: &str) -> Option<f64> {
        self.objects.get(id).and_then(|object| object.property(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.values()
    }
}

impl ObjectRegistry for SceneObjects {
    fn connector_names(&self, object: &str) -> Option<Vec<String>> {
        self.objects.get(object).map(|object| {
            object
                .kind
                .connectors()
                .iter()
                .map(|name| name.to_string())
                .collect()
        })
    }

    fn apply(&mut self, object: &str, connector: &str, value: f64) -> Result<()> {
        let target = self
            .objects
            .get_mut(object)
            .ok_or_else(|| StageError::UnknownObject(object.to_string()))?;
        match target.properties.get_mut(connector) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(StageError::UnknownConnector {
                object: object.to_string(),
                connector: connector.to_string(),
            }),
        }
    }
}
