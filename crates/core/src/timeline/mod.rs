//! Animation timeline: registered tweens grouped into sequential steps.
//!
//! A step is a set of animations started together. A single cursor
//! (`active`) names the next step to play forward; it always indexes into
//! the order, or is 0 when the order is empty.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::tween::{Tween, TweenMeta, ValueTween};
use crate::Result;

#[derive(Debug, Default, Clone)]
pub struct PlaybackClock {
    pub time_seconds: f64,
}

impl PlaybackClock {
    pub fn reset(&mut self) {
        self.time_seconds = 0.0;
    }

    pub fn advance(&mut self, delta: f64) {
        self.time_seconds = (self.time_seconds + delta).max(0.0);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnimationId(pub String);

impl AnimationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnimationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AnimationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// What an animation drives; decides how its samples are routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationKind {
    /// Tracker value toward a target value.
    ValueTo,
    /// X component of a point tracker.
    PointX,
    /// Y component of a point tracker.
    PointY,
    /// Object opacity toward fully visible.
    Appear,
    /// Object opacity toward hidden.
    Disappear,
}

impl AnimationKind {
    /// Whether `target_id` names a tracker (as opposed to a scene object).
    pub fn targets_tracker(self) -> bool {
        matches!(self, Self::ValueTo | Self::PointX | Self::PointY)
    }
}

/// Registered animation: metadata plus the live tween.
#[derive(Debug)]
pub struct AnimationRecord {
    pub id: AnimationId,
    pub target_id: String,
    pub kind: AnimationKind,
    pub label: String,
    pub meta: TweenMeta,
    tween: Box<dyn Tween>,
}

impl AnimationRecord {
    pub fn new(
        id: AnimationId,
        target_id: impl Into<String>,
        kind: AnimationKind,
        label: impl Into<String>,
        meta: TweenMeta,
        tween: Box<dyn Tween>,
    ) -> Self {
        Self {
            id,
            target_id: target_id.into(),
            kind,
            label: label.into(),
            meta,
            tween,
        }
    }

    /// Record backed by a [`ValueTween`] built from `meta`.
    pub fn value_tween(
        id: AnimationId,
        target_id: impl Into<String>,
        kind: AnimationKind,
        label: impl Into<String>,
        meta: TweenMeta,
    ) -> Self {
        let tween = ValueTween::from_meta(&meta);
        Self::new(id, target_id, kind, label, meta, tween)
    }

    pub fn tween(&self) -> &dyn Tween {
        self.tween.as_ref()
    }

    pub fn data(&self) -> AnimationData {
        AnimationData {
            id: self.id.clone(),
            target_id: self.target_id.clone(),
            kind: self.kind,
            label: self.label.clone(),
            tween_meta: self.meta,
        }
    }
}

/// Persisted form of an [`AnimationRecord`], without live tween state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationData {
    pub id: AnimationId,
    pub target_id: String,
    #[serde(rename = "type")]
    pub kind: AnimationKind,
    pub label: String,
    pub tween_meta: TweenMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimationSnapshot {
    pub animations: Vec<AnimationData>,
    pub order: Vec<Vec<AnimationId>>,
}

impl AnimationSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Read-only view of one step for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepSummary {
    pub index: usize,
    /// Whether the cursor points at this step.
    pub active: bool,
    pub animations: Vec<AnimationData>,
}

/// Value produced by a tween during [`AnimationManager::tick`].
#[derive(Debug, Clone, PartialEq)]
pub struct TweenSample {
    pub animation: AnimationId,
    pub target_id: String,
    pub kind: AnimationKind,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveDirection {
    /// Toward index 0.
    Up,
    Down,
}

#[derive(Debug, Default)]
pub struct AnimationManager {
    animations: HashMap<AnimationId, AnimationRecord>,
    order: Vec<Vec<AnimationId>>,
    active: usize,
    next_id: u64,
    /// Values set by `reset_all`/`finish_all`, in the order they must be
    /// applied. Drained by the next `tick`.
    jumps: Vec<TweenSample>,
}

impl AnimationManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates an id that no registered animation uses.
    pub fn next_id(&mut self) -> AnimationId {
        loop {
            let id = AnimationId(format!("anim-{}", self.next_id));
            self.next_id = self.next_id.wrapping_add(1);
            if !self.animations.contains_key(&id) {
                return id;
            }
        }
    }

    /// Registers `records` as one new step appended to the order and returns
    /// their ids. A record reusing a registered id replaces that animation.
    pub fn add_animations(&mut self, records: Vec<AnimationRecord>) -> Vec<AnimationId> {
        let mut ids: Vec<AnimationId> = Vec::with_capacity(records.len());
        for record in records {
            if self.animations.contains_key(&record.id) && !ids.contains(&record.id) {
                warn!(animation = %record.id, "replacing animation with the same id");
                self.remove_animation(&record.id);
            }
            if !ids.contains(&record.id) {
                ids.push(record.id.clone());
            }
            if let Some(mut replaced) = self.animations.insert(record.id.clone(), record) {
                replaced.tween.destroy();
            }
        }
        if !ids.is_empty() {
            debug!(step = self.order.len(), animations = ids.len(), "step added");
            self.order.push(ids.clone());
        }
        ids
    }

    /// Plays the step under the cursor and advances the cursor, wrapping to
    /// the first step. Returns `false` when there is nothing to play.
    pub fn animate(&mut self) -> bool {
        self.animate_with(|_, _| None)
    }

    /// Like [`animate`](Self::animate), but first asks `start` for the
    /// current value of each target whose tween sits at its start, and
    /// rebases that tween onto it.
    pub fn animate_with<F>(&mut self, mut start: F) -> bool
    where
        F: FnMut(&str, AnimationKind) -> Option<f64>,
    {
        if self.order.is_empty() {
            debug!("no animation steps to play");
            return false;
        }
        let index = self.active;
        self.active = (self.active + 1) % self.order.len();
        for id in &self.order[index] {
            if let Some(record) = self.animations.get_mut(id) {
                if record.tween.progress() <= 0.0 {
                    if let Some(from) = start(record.target_id.as_str(), record.kind) {
                        record.tween.rebase(from);
                        record.meta.from = from;
                    }
                }
                record.tween.play();
            }
        }
        debug!(step = index, cursor = self.active, "step played");
        true
    }

    /// Steps the cursor back one step, wrapping to the last step, and reverses
    /// the step it lands on. From the first position every animation is
    /// finished first so the reverse traversal starts from the end state.
    /// Returns `false` when there is nothing to reverse.
    pub fn reverse_animate(&mut self) -> bool {
        if self.order.is_empty() {
            debug!("no animation steps to reverse");
            return false;
        }
        if self.active == 0 {
            self.finish_all();
        }
        let len = self.order.len();
        self.active = (self.active + len - 1) % len;
        for id in &self.order[self.active] {
            if let Some(record) = self.animations.get_mut(id) {
                record.tween.reverse();
            }
        }
        debug!(step = self.active, "step reversed");
        true
    }

    /// Rewinds every animation to its start state, last step first, and moves
    /// the cursor back to the first step. The start values are queued for the
    /// next `tick` in the same order, so on a shared target the earliest
    /// step's start wins.
    pub fn reset_all(&mut self) {
        let jumps = self.jump_all(|tween| tween.reset());
        self.jumps.extend(jumps);
        self.active = 0;
    }

    /// Jumps every animation to its end state, last step first. The cursor
    /// returns to the first step, as after a full forward pass. End values
    /// are queued in playback order, so on a shared target the latest step's
    /// end wins.
    pub fn finish_all(&mut self) {
        let jumps = self.jump_all(|tween| tween.finish());
        self.jumps.extend(jumps.into_iter().rev());
        self.active = 0;
    }

    /// Pauses and jumps every tween, last step and last member first, and
    /// returns the resulting values in that order.
    fn jump_all(&mut self, jump: impl Fn(&mut dyn Tween)) -> Vec<TweenSample> {
        let mut samples = Vec::new();
        for step in self.order.iter().rev() {
            for id in step.iter().rev() {
                let Some(record) = self.animations.get_mut(id) else {
                    continue;
                };
                record.tween.pause();
                jump(record.tween.as_mut());
                if let Some(value) = record.tween.advance(0.0) {
                    samples.push(TweenSample {
                        animation: id.clone(),
                        target_id: record.target_id.clone(),
                        kind: record.kind,
                        value,
                    });
                }
            }
        }
        samples
    }

    /// Swaps step `index` with its neighbour. Out-of-range moves are no-ops.
    /// A cursor on either swapped step follows it.
    pub fn move_group(&mut self, index: usize, direction: MoveDirection) -> bool {
        let target = match direction {
            MoveDirection::Up => index.checked_sub(1),
            MoveDirection::Down => index.checked_add(1),
        };
        let Some(target) = target.filter(|t| *t < self.order.len() && index < self.order.len())
        else {
            debug!(index, ?direction, "step move out of range");
            return false;
        };
        self.order.swap(index, target);
        if self.active == index {
            self.active = target;
        } else if self.active == target {
            self.active = index;
        }
        true
    }

    /// Destroys the animation's tween and removes it from its step. A step
    /// left empty is dropped and the cursor keeps naming the same step, or is
    /// clamped back into range.
    pub fn remove_animation(&mut self, id: &AnimationId) -> bool {
        let Some(mut record) = self.animations.remove(id) else {
            warn!(animation = %id, "remove on unknown animation");
            return false;
        };
        record.tween.destroy();
        self.jumps.retain(|jump| &jump.animation != id);

        if let Some(step_index) = self.order.iter().position(|step| step.contains(id)) {
            let step = &mut self.order[step_index];
            step.retain(|member| member != id);
            if step.is_empty() {
                self.order.remove(step_index);
                if step_index < self.active {
                    self.active -= 1;
                }
            }
        }
        self.clamp_active();
        debug!(animation = %id, steps = self.order.len(), "animation removed");
        true
    }

    /// Removes every animation driving the tracker `tracker`.
    pub fn remove_tracker_animations(&mut self, tracker: &str) -> Vec<AnimationId> {
        self.remove_where(|record| record.kind.targets_tracker() && record.target_id == tracker)
    }

    /// Removes every fade aimed at the scene object `object`.
    pub fn remove_object_animations(&mut self, object: &str) -> Vec<AnimationId> {
        self.remove_where(|record| !record.kind.targets_tracker() && record.target_id == object)
    }

    fn remove_where(&mut self, pred: impl Fn(&AnimationRecord) -> bool) -> Vec<AnimationId> {
        let ids: Vec<AnimationId> = self
            .order
            .iter()
            .flatten()
            .filter(|id| self.animations.get(*id).is_some_and(&pred))
            .cloned()
            .collect();
        for id in &ids {
            self.remove_animation(id);
        }
        ids
    }

    /// Destroys every animation and empties the order.
    pub fn clear(&mut self) {
        for record in self.animations.values_mut() {
            record.tween.destroy();
        }
        self.animations.clear();
        self.order.clear();
        self.jumps.clear();
        self.active = 0;
    }

    fn clamp_active(&mut self) {
        if self.order.is_empty() {
            self.active = 0;
        } else if self.active >= self.order.len() {
            self.active = self.order.len() - 1;
        }
    }

    /// Returns the values queued by `reset_all`/`finish_all`, then advances
    /// every tween by `dt` seconds, in playback order, and appends the values
    /// that changed.
    pub fn tick(&mut self, dt: f64) -> Vec<TweenSample> {
        let mut samples = std::mem::take(&mut self.jumps);
        for id in self.order.iter().flatten() {
            let Some(record) = self.animations.get_mut(id) else {
                continue;
            };
            if let Some(value) = record.tween.advance(dt) {
                samples.push(TweenSample {
                    animation: id.clone(),
                    target_id: record.target_id.clone(),
                    kind: record.kind,
                    value,
                });
            }
        }
        samples
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn step_count(&self) -> usize {
        self.order.len()
    }

    pub fn len(&self) -> usize {
        self.animations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.animations.is_empty()
    }

    pub fn get(&self, id: &AnimationId) -> Option<&AnimationRecord> {
        self.animations.get(id)
    }

    /// Latest animation in playback order that drives the tracker `tracker`.
    pub fn last_staged(&self, tracker: &str) -> Option<&AnimationRecord> {
        self.order
            .iter()
            .flatten()
            .rev()
            .filter_map(|id| self.animations.get(id))
            .find(|record| record.kind.targets_tracker() && record.target_id == tracker)
    }

    pub fn get_order(&self) -> Vec<Vec<AnimationId>> {
        self.order.clone()
    }

    pub fn get_groups_with_meta(&self) -> Vec<StepSummary> {
        self.order
            .iter()
            .enumerate()
            .map(|(index, step)| StepSummary {
                index,
                active: index == self.active,
                animations: step
                    .iter()
                    .filter_map(|id| self.animations.get(id))
                    .map(AnimationRecord::data)
                    .collect(),
            })
            .collect()
    }

    pub fn store_as_obj(&self) -> AnimationSnapshot {
        AnimationSnapshot {
            animations: self
                .order
                .iter()
                .flatten()
                .filter_map(|id| self.animations.get(id))
                .map(AnimationRecord::data)
                .collect(),
            order: self.order.clone(),
        }
    }

    /// Replaces the whole timeline with `snapshot`, rebuilding tweens as
    /// [`ValueTween`]s.
    pub fn load_from_obj(&mut self, snapshot: AnimationSnapshot) {
        self.load_from_obj_with(snapshot, |data| ValueTween::from_meta(&data.tween_meta));
    }

    /// Replaces the whole timeline with `snapshot`, building each tween with
    /// `factory`. Existing animations are destroyed and the cursor is reset.
    /// Order entries naming unknown or already placed ids are skipped;
    /// animations no step mentions form one trailing step.
    pub fn load_from_obj_with<F>(&mut self, snapshot: AnimationSnapshot, mut factory: F)
    where
        F: FnMut(&AnimationData) -> Box<dyn Tween>,
    {
        self.clear();

        let listed: Vec<AnimationId> = snapshot.animations.iter().map(|d| d.id.clone()).collect();
        let mut pending: HashMap<AnimationId, AnimationData> = snapshot
            .animations
            .into_iter()
            .map(|data| (data.id.clone(), data))
            .collect();
        let mut placed: HashSet<AnimationId> = HashSet::new();

        let mut insert = |data: AnimationData, this: &mut Self| {
            let tween = factory(&data);
            let record = AnimationRecord::new(
                data.id.clone(),
                data.target_id,
                data.kind,
                data.label,
                data.tween_meta,
                tween,
            );
            this.animations.insert(data.id, record);
        };

        for step in snapshot.order {
            let mut ids = Vec::new();
            for id in step {
                match pending.remove(&id) {
                    Some(data) => {
                        insert(data, self);
                        placed.insert(id.clone());
                        ids.push(id);
                    }
                    None => warn!(animation = %id, "skipping unknown or repeated animation in order"),
                }
            }
            if !ids.is_empty() {
                self.order.push(ids);
            }
        }

        let mut trailing = Vec::new();
        for id in listed {
            if placed.contains(&id) {
                continue;
            }
            if let Some(data) = pending.remove(&id) {
                insert(data, self);
                trailing.push(id);
            }
        }
        if !trailing.is_empty() {
            warn!(animations = trailing.len(), "animations outside any step appended as a step");
            self.order.push(trailing);
        }
        debug!(animations = self.animations.len(), steps = self.order.len(), "timeline loaded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tween::{Easing, TweenState};

    fn meta() -> TweenMeta {
        TweenMeta {
            from: 0.0,
            to: 1.0,
            duration: 1.0,
            easing: Easing::Linear,
        }
    }

    fn record(id: &str) -> AnimationRecord {
        AnimationRecord::value_tween(id.into(), format!("t-{id}"), AnimationKind::ValueTo, id, meta())
    }

    fn manager(steps: &[&[&str]]) -> AnimationManager {
        let mut manager = AnimationManager::new();
        for step in steps {
            manager.add_animations(step.iter().map(|id| record(id)).collect());
        }
        manager
    }

    fn ids(step: &[&str]) -> Vec<AnimationId> {
        step.iter().map(|id| AnimationId::from(*id)).collect()
    }

    fn state(manager: &AnimationManager, id: &str) -> TweenState {
        manager.get(&id.into()).unwrap().tween().state()
    }

    #[test]
    fn adds_one_step_per_batch() {
        let mut m = manager(&[&["a1", "a2"], &["a3"]]);
        assert_eq!(m.get_order(), vec![ids(&["a1", "a2"]), ids(&["a3"])]);
        assert!(m.add_animations(Vec::new()).is_empty());
        assert_eq!(m.step_count(), 2);
    }

    #[test]
    fn empty_order_has_nothing_to_play() {
        let mut m = AnimationManager::new();
        assert!(!m.animate());
        assert!(!m.reverse_animate());
        assert_eq!(m.active_index(), 0);
    }

    #[test]
    fn forward_then_reverse_cursor_sequence() {
        let mut m = manager(&[&["a1", "a2"], &["a3"]]);

        assert!(m.animate());
        assert_eq!(m.active_index(), 1);
        assert_eq!(state(&m, "a1"), TweenState::Forward);
        assert_eq!(state(&m, "a2"), TweenState::Forward);

        assert!(m.animate());
        assert_eq!(m.active_index(), 0);
        assert_eq!(state(&m, "a3"), TweenState::Forward);

        assert!(m.reverse_animate());
        assert_eq!(m.active_index(), 1);
        assert_eq!(state(&m, "a3"), TweenState::Backward);
        // cursor was at 0, so everything was finished before reversing
        assert_eq!(state(&m, "a1"), TweenState::Stopped);
    }

    #[test]
    fn three_step_cursor_table() {
        let mut m = manager(&[&["a"], &["b"], &["c"]]);
        // cursor after: animate, animate, reverse, reverse, reverse, animate
        let mut log = Vec::new();
        m.animate();
        log.push(m.active_index());
        m.animate();
        log.push(m.active_index());
        m.reverse_animate();
        log.push(m.active_index());
        m.reverse_animate();
        log.push(m.active_index());
        m.reverse_animate();
        log.push(m.active_index());
        m.animate();
        log.push(m.active_index());
        assert_eq!(log, vec![1, 2, 1, 0, 2, 0]);

        assert_eq!(state(&m, "c"), TweenState::Forward);
        // the wrap back to the last step finished everything first
        assert_eq!(state(&m, "a"), TweenState::Stopped);
    }

    #[test]
    fn reset_and_finish_return_cursor_home() {
        let mut m = manager(&[&["a"], &["b"]]);
        m.animate();
        m.reset_all();
        assert_eq!(m.active_index(), 0);
        assert_eq!(state(&m, "a"), TweenState::Stopped);
        let values: Vec<f64> = m.tick(0.0).into_iter().map(|s| s.value).collect();
        assert_eq!(values, vec![0.0, 0.0]);

        m.animate();
        m.finish_all();
        assert_eq!(m.active_index(), 0);
        let values: Vec<f64> = m.tick(0.0).into_iter().map(|s| s.value).collect();
        assert_eq!(values, vec![1.0, 1.0]);
    }

    fn tween_on(id: &str, target: &str, kind: AnimationKind, from: f64, to: f64) -> AnimationRecord {
        AnimationRecord::value_tween(
            id.into(),
            target,
            kind,
            id,
            TweenMeta {
                from,
                to,
                duration: 1.0,
                easing: Easing::Linear,
            },
        )
    }

    #[test]
    fn jumps_on_a_shared_target_settle_on_the_right_step() {
        let mut m = AnimationManager::new();
        m.add_animations(vec![tween_on("up", "t", AnimationKind::ValueTo, 0.0, 2.0)]);
        m.add_animations(vec![tween_on("more", "t", AnimationKind::ValueTo, 2.0, 5.0)]);
        m.animate();
        m.animate();
        m.tick(1.0);

        m.reset_all();
        let reset: Vec<(String, f64)> = m
            .tick(0.0)
            .into_iter()
            .map(|s| (s.animation.0, s.value))
            .collect();
        assert_eq!(reset, vec![("more".to_string(), 2.0), ("up".to_string(), 0.0)]);
        assert!(m.tick(0.0).is_empty());

        m.finish_all();
        let finish: Vec<f64> = m.tick(0.0).into_iter().map(|s| s.value).collect();
        assert_eq!(finish, vec![2.0, 5.0]);
    }

    #[test]
    fn removed_animations_drop_their_queued_jumps() {
        let mut m = manager(&[&["a"], &["b"]]);
        m.finish_all();
        m.remove_animation(&"b".into());
        let played: Vec<AnimationId> = m.tick(0.0).into_iter().map(|s| s.animation).collect();
        assert_eq!(played, vec![AnimationId::from("a")]);
    }

    #[test]
    fn animate_with_rebases_fresh_tweens() {
        let mut m = AnimationManager::new();
        m.add_animations(vec![tween_on("a", "t", AnimationKind::ValueTo, 0.0, 4.0)]);
        assert!(m.animate_with(|target, kind| {
            assert_eq!(target, "t");
            assert_eq!(kind, AnimationKind::ValueTo);
            Some(2.0)
        }));
        assert_eq!(m.get(&"a".into()).unwrap().meta.from, 2.0);
        assert_eq!(m.tick(0.5)[0].value, 3.0);

        // a tween that already moved keeps its start
        m.animate_with(|_, _| Some(100.0));
        assert_eq!(m.get(&"a".into()).unwrap().meta.from, 2.0);
    }

    #[test]
    fn tracker_and_object_animations_are_removed_separately() {
        let mut m = AnimationManager::new();
        m.add_animations(vec![tween_on("value", "sun", AnimationKind::ValueTo, 0.0, 1.0)]);
        m.add_animations(vec![tween_on("fade", "sun", AnimationKind::Appear, 0.0, 1.0)]);

        assert_eq!(m.last_staged("sun").map(|r| r.label.as_str()), Some("value"));
        assert_eq!(m.remove_tracker_animations("sun"), ids(&["value"]));
        assert!(m.last_staged("sun").is_none());
        assert!(m.get(&"fade".into()).is_some());
        assert_eq!(m.remove_object_animations("sun"), ids(&["fade"]));
        assert!(m.is_empty());
    }

    #[test]
    fn move_group_swaps_and_tracks_cursor() {
        let mut m = manager(&[&["a"], &["b"], &["c"]]);
        assert!(!m.move_group(0, MoveDirection::Up));
        assert!(!m.move_group(2, MoveDirection::Down));
        assert!(!m.move_group(7, MoveDirection::Up));

        m.animate();
        assert_eq!(m.active_index(), 1);
        assert!(m.move_group(1, MoveDirection::Up));
        assert_eq!(m.get_order(), vec![ids(&["b"]), ids(&["a"]), ids(&["c"])]);
        assert_eq!(m.active_index(), 0);

        assert!(m.move_group(1, MoveDirection::Up));
        assert_eq!(m.get_order(), vec![ids(&["a"]), ids(&["b"]), ids(&["c"])]);
        assert_eq!(m.active_index(), 1);
    }

    #[test]
    fn removing_the_last_member_drops_the_step() {
        let mut m = manager(&[&["a1", "a2"], &["b"], &["c"]]);
        m.animate();
        m.animate();
        assert_eq!(m.active_index(), 2);

        assert!(m.remove_animation(&"c".into()));
        assert_eq!(m.step_count(), 2);
        assert_eq!(m.active_index(), 1);

        assert!(m.remove_animation(&"a1".into()));
        assert_eq!(m.get_order(), vec![ids(&["a2"]), ids(&["b"])]);
        assert!(!m.remove_animation(&"a1".into()));

        m.remove_animation(&"a2".into());
        m.remove_animation(&"b".into());
        assert_eq!(m.step_count(), 0);
        assert_eq!(m.active_index(), 0);
    }

    #[test]
    fn removing_an_earlier_step_keeps_the_cursor_on_its_step() {
        let mut m = manager(&[&["a"], &["b"], &["c"]]);
        m.animate();
        assert_eq!(m.active_index(), 1);
        m.remove_animation(&"a".into());
        assert_eq!(m.active_index(), 0);
        assert_eq!(m.get_order()[0], ids(&["b"]));
    }

    #[test]
    fn snapshots_round_trip() {
        let mut m = manager(&[&["a1", "a2"], &["b"], &["c1", "c2"]]);
        let snapshot = m.store_as_obj();
        let json = snapshot.to_json().unwrap();
        assert!(json.contains("\"targetId\""));
        assert!(json.contains("\"tweenMeta\""));

        let mut restored = AnimationManager::new();
        restored.add_animations(vec![record("stale")]);
        restored.animate();
        restored.load_from_obj(AnimationSnapshot::from_json(&json).unwrap());

        assert_eq!(restored.get_order(), m.get_order());
        assert_eq!(restored.active_index(), 0);
        assert_eq!(restored.len(), 5);
        assert!(restored.get(&"stale".into()).is_none());

        m.clear();
        assert!(m.is_empty());
    }

    #[test]
    fn loading_repairs_inconsistent_snapshots() {
        let snapshot = AnimationSnapshot {
            animations: vec![record("a").data(), record("b").data(), record("orphan").data()],
            order: vec![ids(&["a", "ghost"]), ids(&["a"]), ids(&["b"])],
        };
        let mut m = AnimationManager::new();
        m.load_from_obj(snapshot);
        assert_eq!(
            m.get_order(),
            vec![ids(&["a"]), ids(&["b"]), ids(&["orphan"])]
        );
    }

    #[test]
    fn allocated_ids_skip_registered_ones() {
        let mut m = manager(&[&["anim-0"]]);
        assert_eq!(m.next_id(), AnimationId::from("anim-1"));
        assert_eq!(m.next_id(), AnimationId::from("anim-2"));
    }

    #[test]
    fn tick_reports_changed_values_in_order() {
        let mut m = manager(&[&["a"], &["b"]]);
        m.animate();
        let samples = m.tick(0.5);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].animation, AnimationId::from("a"));
        assert_eq!(samples[0].target_id, "t-a");
        assert_eq!(samples[0].value, 0.5);
    }

    #[test]
    fn groups_with_meta_mark_the_active_step() {
        let mut m = manager(&[&["a"], &["b"]]);
        m.animate();
        let groups = m.get_groups_with_meta();
        assert!(!groups[0].active);
        assert!(groups[1].active);
        assert_eq!(groups[1].animations[0].label, "b");
    }

    #[test]
    fn clock_never_goes_negative() {
        let mut clock = PlaybackClock::default();
        clock.advance(0.5);
        clock.advance(-2.0);
        assert_eq!(clock.time_seconds, 0.0);
        clock.advance(1.0);
        clock.reset();
        assert_eq!(clock.time_seconds, 0.0);
    }
}
