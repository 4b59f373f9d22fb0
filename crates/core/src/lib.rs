//! Core library for the Motion Stage editor.
//!
//! Trackers are named numeric values. Expressions written as
//! `[target] = <expr>;` link trackers into an acyclic dependency graph that is
//! re-evaluated synchronously whenever a value changes, and object bindings
//! push tracker values into the properties of visual objects. The animation
//! timeline groups tweens into steps that are played forward and backward one
//! at a time; the [`animator`] module ties the timeline to the network.

pub mod animator;
pub mod config;
pub mod connector;
pub mod error;
pub mod expr;
pub mod graph;
pub mod mapping;
pub mod network;
pub mod scene;
pub mod timeline;
pub mod tracker;
pub mod tween;

pub use animator::{PointStaging, TrackerAnimator, TweenOptions};
pub use config::{AppConfig, PlaybackConfig};
pub use connector::{ConnectError, ConnectOutcome, Connection};
pub use error::{Result, StageError};
pub use expr::{EvalError, Expr, ParseError};
pub use graph::DependencyGraph;
pub use mapping::{BindError, ObjectBinding};
pub use network::{Axis, PointTracker, TrackerNetwork};
pub use scene::{ObjectKind, ObjectRegistry, SceneObject, SceneObjects};
pub use timeline::{
    AnimationId, AnimationKind, AnimationManager, AnimationSnapshot, MoveDirection, PlaybackClock,
};
pub use tracker::{Tracker, TrackerId, TrackerStore};
pub use tween::{Easing, Tween, TweenMeta, ValueTween};
