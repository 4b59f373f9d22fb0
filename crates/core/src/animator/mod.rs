//! Tracker animator: stages tracker tweens on the timeline, binds trackers to
//! object properties, and routes tween output back into the network every
//! frame.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::PlaybackConfig;
use crate::mapping::BindError;
use crate::network::{Axis, TrackerNetwork};
use crate::scene::ObjectRegistry;
use crate::timeline::{
    AnimationId, AnimationKind, AnimationManager, AnimationRecord, PlaybackClock, TweenSample,
};
use crate::tracker::TrackerId;
use crate::tween::{Easing, TweenMeta};
use crate::{Result, StageError};

/// Connector every revealable object must expose.
pub const OPACITY: &str = "opacity";

/// How the x and y tweens of a point animation are placed on the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointStaging {
    /// One step holding both tweens.
    #[default]
    Together,
    /// Two consecutive steps, x first, that can be reordered independently.
    Separate,
}

/// Optional overrides for a staged tween.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TweenOptions {
    pub duration: Option<f64>,
    pub easing: Option<Easing>,
}

#[derive(Debug)]
pub struct TrackerAnimator<O> {
    network: TrackerNetwork<O>,
    timeline: AnimationManager,
    clock: PlaybackClock,
    playback: PlaybackConfig,
}

impl<O: ObjectRegistry> TrackerAnimator<O> {
    pub fn new(network: TrackerNetwork<O>, playback: PlaybackConfig) -> Self {
        Self {
            network,
            timeline: AnimationManager::new(),
            clock: PlaybackClock::default(),
            playback,
        }
    }

    pub fn network(&self) -> &TrackerNetwork<O> {
        &self.network
    }

    /// Direct access to the network. Destroy trackers through
    /// [`TrackerAnimator::destroy_tracker`] and drop objects through
    /// [`TrackerAnimator::forget_object`] so their animations go too;
    /// animations left aiming at a destroyed tracker are dropped the next
    /// time they produce a value.
    pub fn network_mut(&mut self) -> &mut TrackerNetwork<O> {
        &mut self.network
    }

    pub fn timeline(&self) -> &AnimationManager {
        &self.timeline
    }

    pub fn timeline_mut(&mut self) -> &mut AnimationManager {
        &mut self.timeline
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn playback(&self) -> &PlaybackConfig {
        &self.playback
    }

    fn meta(&self, from: f64, to: f64, options: TweenOptions) -> TweenMeta {
        TweenMeta {
            from,
            to,
            duration: options
                .duration
                .unwrap_or(self.playback.default_duration)
                .max(0.0),
            easing: options.easing.unwrap_or(self.playback.default_easing),
        }
    }

    /// Where a new tween on `tracker` starts: the end of the last tween
    /// already staged for it, or its current value.
    fn staged_start(&self, tracker: &str) -> Result<f64> {
        let current = self
            .network
            .value(tracker)
            .ok_or_else(|| StageError::UnknownTracker(tracker.to_string()))?;
        Ok(self
            .timeline
            .last_staged(tracker)
            .map_or(current, |record| record.meta.to))
    }

    /// Stages a tween of `tracker` toward `target` as a new step.
    pub fn animate_tracker_to(
        &mut self,
        tracker: &str,
        target: f64,
        options: TweenOptions,
    ) -> Result<AnimationId> {
        let from = self.staged_start(tracker)?;
        let meta = self.meta(from, target, options);
        let id = self.timeline.next_id();
        let record = AnimationRecord::value_tween(
            id.clone(),
            tracker,
            AnimationKind::ValueTo,
            format!("{tracker} to {target}"),
            meta,
        );
        self.timeline.add_animations(vec![record]);
        debug!(tracker, target, animation = %id, "value tween staged");
        Ok(id)
    }

    /// Stages tweens moving a point tracker to `(x, y)`.
    pub fn animate_point_to(
        &mut self,
        point: &str,
        x: f64,
        y: f64,
        options: TweenOptions,
        staging: PointStaging,
    ) -> Result<Vec<AnimationId>> {
        let components = self
            .network
            .point(point)
            .cloned()
            .ok_or_else(|| StageError::UnknownTracker(point.to_string()))?;

        let mut records = Vec::with_capacity(2);
        for (axis, target) in [(Axis::X, x), (Axis::Y, y)] {
            let component = components.component(axis);
            let from = self.staged_start(component)?;
            let (kind, name) = match axis {
                Axis::X => (AnimationKind::PointX, "x"),
                Axis::Y => (AnimationKind::PointY, "y"),
            };
            records.push(AnimationRecord::value_tween(
                self.timeline.next_id(),
                component,
                kind,
                format!("{point}.{name} to {target}"),
                self.meta(from, target, options),
            ));
        }

        let ids = match staging {
            PointStaging::Together => self.timeline.add_animations(records),
            PointStaging::Separate => records
                .into_iter()
                .flat_map(|record| self.timeline.add_animations(vec![record]))
                .collect(),
        };
        debug!(point, x, y, ?staging, "point tween staged");
        Ok(ids)
    }

    fn check_opacity(&self, object: &str) -> Result<()> {
        let names = self
            .network
            .objects()
            .connector_names(object)
            .ok_or_else(|| StageError::UnknownObject(object.to_string()))?;
        if names.iter().any(|name| name == OPACITY) {
            Ok(())
        } else {
            Err(StageError::UnknownConnector {
                object: object.to_string(),
                connector: OPACITY.to_string(),
            })
        }
    }

    /// Stages a fade-in of `object`. The object is hidden immediately so it
    /// only shows up once the step plays.
    pub fn reveal(&mut self, object: &str, options: TweenOptions) -> Result<AnimationId> {
        self.check_opacity(object)?;
        self.network.objects_mut().apply(object, OPACITY, 0.0)?;
        let meta = self.meta(0.0, 1.0, options);
        let id = self.timeline.next_id();
        let record = AnimationRecord::value_tween(
            id.clone(),
            object,
            AnimationKind::Appear,
            format!("reveal {object}"),
            meta,
        );
        self.timeline.add_animations(vec![record]);
        Ok(id)
    }

    /// Stages a fade-out of `object`.
    pub fn hide(&mut self, object: &str, options: TweenOptions) -> Result<AnimationId> {
        self.check_opacity(object)?;
        let meta = self.meta(1.0, 0.0, options);
        let id = self.timeline.next_id();
        let record = AnimationRecord::value_tween(
            id.clone(),
            object,
            AnimationKind::Disappear,
            format!("hide {object}"),
            meta,
        );
        self.timeline.add_animations(vec![record]);
        Ok(id)
    }

    /// Drives `connector` of `object` from `tracker` through `expression`,
    /// which sees the tracker value as `value`.
    pub fn connect_value_tracker_to_object(
        &mut self,
        tracker: &str,
        object: &str,
        connector: &str,
        expression: &str,
    ) -> Result<()> {
        self.network
            .bind_object(tracker, object, connector, expression)
            .map_err(StageError::from)
    }

    pub fn connect_x_point_tracker_to_object(
        &mut self,
        point: &str,
        object: &str,
        connector: &str,
        expression: &str,
    ) -> Result<()> {
        self.connect_point_component(point, Axis::X, object, connector, expression)
    }

    pub fn connect_y_point_tracker_to_object(
        &mut self,
        point: &str,
        object: &str,
        connector: &str,
        expression: &str,
    ) -> Result<()> {
        self.connect_point_component(point, Axis::Y, object, connector, expression)
    }

    fn connect_point_component(
        &mut self,
        point: &str,
        axis: Axis,
        object: &str,
        connector: &str,
        expression: &str,
    ) -> Result<()> {
        let component = self
            .network
            .point(point)
            .map(|p| p.component(axis).to_string())
            .ok_or_else(|| BindError::NotAPoint(point.to_string()))?;
        self.connect_value_tracker_to_object(&component, object, connector, expression)
    }

    /// Plays the next step. Tracker tweens that have not started yet begin
    /// from the tracker's current value, so chained steps on one tracker
    /// continue from where the previous one ended. Returns `false` when the
    /// timeline is empty.
    pub fn play_next(&mut self) -> bool {
        let network = &self.network;
        self.timeline.animate_with(|target, kind| {
            if kind.targets_tracker() {
                network.value(target)
            } else {
                None
            }
        })
    }

    /// Reverses the previous step, applying any jump to end state first.
    pub fn play_previous(&mut self) -> bool {
        let acted = self.timeline.reverse_animate();
        self.flush();
        acted
    }

    pub fn reset_all(&mut self) {
        self.timeline.reset_all();
        self.clock.reset();
        self.flush();
    }

    pub fn finish_all(&mut self) {
        self.timeline.finish_all();
        self.flush();
    }

    /// Advances time by `dt` seconds and applies every changed tween value.
    /// Returns how many samples were applied.
    pub fn advance(&mut self, dt: f64) -> usize {
        self.clock.advance(dt);
        let samples = self.timeline.tick(dt);
        self.apply(samples)
    }

    /// Advances time in frame-sized steps until `seconds` have elapsed.
    pub fn run_for(&mut self, seconds: f64) -> usize {
        let frame = self.playback.frame_interval();
        let mut remaining = seconds.max(0.0);
        let mut applied = 0;
        while remaining > 0.0 {
            let dt = remaining.min(frame);
            applied += self.advance(dt);
            remaining -= dt;
        }
        applied
    }

    fn flush(&mut self) {
        let samples = self.timeline.tick(0.0);
        self.apply(samples);
    }

    fn apply(&mut self, samples: Vec<TweenSample>) -> usize {
        let mut applied = 0;
        let mut orphaned: Vec<String> = Vec::new();
        for sample in samples {
            let ok = if sample.kind.targets_tracker() {
                let known = self.network.set_value(&sample.target_id, sample.value);
                if !known && !orphaned.contains(&sample.target_id) {
                    orphaned.push(sample.target_id.clone());
                }
                known
            } else {
                match self
                    .network
                    .objects_mut()
                    .apply(&sample.target_id, OPACITY, sample.value)
                {
                    Ok(()) => true,
                    Err(err) => {
                        warn!(object = %sample.target_id, %err, "dropping tween sample");
                        false
                    }
                }
            };
            if ok {
                applied += 1;
            }
        }
        for tracker in orphaned {
            let dropped = self.timeline.remove_tracker_animations(&tracker);
            warn!(%tracker, animations = dropped.len(), "dropped animations of a missing tracker");
        }
        applied
    }

    pub fn remove_animation(&mut self, id: &AnimationId) -> bool {
        self.timeline.remove_animation(id)
    }

    /// Destroys a tracker (or point tracker) together with every animation
    /// that targets it. Returns the scalar trackers removed.
    pub fn destroy_tracker(&mut self, id: &str) -> Vec<TrackerId> {
        let removed = self.network.destroy_tracker(id);
        for tracker in &removed {
            self.timeline.remove_tracker_animations(tracker);
        }
        removed
    }

    /// Drops every binding and animation that targets `object`.
    pub fn forget_object(&mut self, object: &str) {
        let bindings = self.network.forget_object(object);
        let animations = self.timeline.remove_object_animations(object);
        debug!(object, bindings, animations = animations.len(), "object forgotten");
    }
}
