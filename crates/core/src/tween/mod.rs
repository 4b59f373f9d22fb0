//! Tweens: time-driven scalar interpolations stepped by the frame loop.

use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Standard easing curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    #[default]
    Linear,
    QuadIn,
    QuadOut,
    QuadInOut,
    CubicIn,
    CubicOut,
    CubicInOut,
    SineIn,
    SineOut,
    SineInOut,
    ExpoIn,
    ExpoOut,
    ExpoInOut,
    /// Overshoots the start before moving toward the end.
    BackIn,
    /// Overshoots the end before settling.
    BackOut,
    BackInOut,
    BounceIn,
    BounceOut,
    BounceInOut,
}

impl Easing {
    /// Evaluates the curve at `t` in `[0, 1]`.
    pub fn ease(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::QuadIn => t * t,
            Easing::QuadOut => 1.0 - (1.0 - t) * (1.0 - t),
            Easing::QuadInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
            Easing::CubicIn => t * t * t,
            Easing::CubicOut => 1.0 - (1.0 - t).powi(3),
            Easing::CubicInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
            Easing::SineIn => 1.0 - (t * PI / 2.0).cos(),
            Easing::SineOut => (t * PI / 2.0).sin(),
            Easing::SineInOut => -((PI * t).cos() - 1.0) / 2.0,
            Easing::ExpoIn => {
                if t == 0.0 {
                    0.0
                } else {
                    2f64.powf(10.0 * t - 10.0)
                }
            }
            Easing::ExpoOut => {
                if t == 1.0 {
                    1.0
                } else {
                    1.0 - 2f64.powf(-10.0 * t)
                }
            }
            Easing::ExpoInOut => {
                if t == 0.0 || t == 1.0 {
                    t
                } else if t < 0.5 {
                    2f64.powf(20.0 * t - 10.0) / 2.0
                } else {
                    (2.0 - 2f64.powf(-20.0 * t + 10.0)) / 2.0
                }
            }
            Easing::BackIn => {
                const C1: f64 = 1.70158;
                const C3: f64 = C1 + 1.0;
                C3 * t * t * t - C1 * t * t
            }
            Easing::BackOut => {
                const C1: f64 = 1.70158;
                const C3: f64 = C1 + 1.0;
                1.0 + C3 * (t - 1.0).powi(3) + C1 * (t - 1.0).powi(2)
            }
            Easing::BackInOut => {
                const C2: f64 = 1.70158 * 1.525;
                if t < 0.5 {
                    ((2.0 * t).powi(2) * ((C2 + 1.0) * 2.0 * t - C2)) / 2.0
                } else {
                    ((2.0 * t - 2.0).powi(2) * ((C2 + 1.0) * (t * 2.0 - 2.0) + C2) + 2.0) / 2.0
                }
            }
            Easing::BounceIn => 1.0 - bounce_out(1.0 - t),
            Easing::BounceOut => bounce_out(t),
            Easing::BounceInOut => {
                if t < 0.5 {
                    (1.0 - bounce_out(1.0 - 2.0 * t)) / 2.0
                } else {
                    (1.0 + bounce_out(2.0 * t - 1.0)) / 2.0
                }
            }
        }
    }
}

fn bounce_out(t: f64) -> f64 {
    const N1: f64 = 7.5625;
    const D1: f64 = 2.75;
    if t < 1.0 / D1 {
        N1 * t * t
    } else if t < 2.0 / D1 {
        let t = t - 1.5 / D1;
        N1 * t * t + 0.75
    } else if t < 2.5 / D1 {
        let t = t - 2.25 / D1;
        N1 * t * t + 0.9375
    } else {
        let t = t - 2.625 / D1;
        N1 * t * t + 0.984375
    }
}

/// Timing and endpoints of a scalar tween; enough to rebuild it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TweenMeta {
    pub from: f64,
    pub to: f64,
    /// Seconds.
    pub duration: f64,
    #[serde(default)]
    pub easing: Easing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TweenState {
    Stopped,
    Forward,
    Backward,
    Destroyed,
}

/// Interpolation primitive scheduled by the timeline.
pub trait Tween: fmt::Debug {
    /// Runs forward from the current position toward the end state.
    fn play(&mut self);
    /// Runs backward from the current position toward the start state.
    fn reverse(&mut self);
    fn pause(&mut self);
    /// Jumps to the start state and stops.
    fn reset(&mut self);
    /// Jumps to `time` seconds, clamped into the tween's duration.
    fn seek(&mut self, time: f64);
    /// Jumps to the end state and stops.
    fn finish(&mut self);
    /// Releases the tween; afterwards it never produces values again.
    fn destroy(&mut self);
    fn duration(&self) -> f64;
    fn value(&self) -> f64;
    fn state(&self) -> TweenState;
    /// Normalized position in `[0, 1]`.
    fn progress(&self) -> f64;
    /// Moves the start state to `from`. The current position is kept, so a
    /// tween at progress 0 now sits on the new start.
    fn rebase(&mut self, from: f64);
    /// Steps a running tween by `dt` seconds. Returns the current value when
    /// it changed since the previous call, including jumps made by `reset`,
    /// `seek` or `finish`.
    fn advance(&mut self, dt: f64) -> Option<f64>;
}

/// Scalar [`Tween`] from `meta.from` to `meta.to`.
#[derive(Debug, Clone)]
pub struct ValueTween {
    meta: TweenMeta,
    progress: f64,
    state: TweenState,
    dirty: bool,
}

impl ValueTween {
    pub fn new(meta: TweenMeta) -> Self {
        Self {
            meta,
            progress: 0.0,
            state: TweenState::Stopped,
            dirty: false,
        }
    }

    pub fn from_meta(meta: &TweenMeta) -> Box<dyn Tween> {
        Box::new(Self::new(*meta))
    }

    pub fn meta(&self) -> &TweenMeta {
        &self.meta
    }

    fn jump(&mut self, progress: f64) {
        if self.state == TweenState::Destroyed {
            return;
        }
        self.progress = progress;
        self.state = TweenState::Stopped;
        self.dirty = true;
    }

    fn run(&mut self, state: TweenState) {
        if self.state == TweenState::Destroyed {
            return;
        }
        self.state = state;
    }
}

impl Tween for ValueTween {
    fn play(&mut self) {
        self.run(TweenState::Forward);
    }

    fn reverse(&mut self) {
        self.run(TweenState::Backward);
    }

    fn pause(&mut self) {
        if matches!(self.state, TweenState::Forward | TweenState::Backward) {
            self.state = TweenState::Stopped;
        }
    }

    fn reset(&mut self) {
        self.jump(0.0);
    }

    fn seek(&mut self, time: f64) {
        if self.state == TweenState::Destroyed {
            return;
        }
        self.progress = if self.meta.duration > 0.0 {
            (time / self.meta.duration).clamp(0.0, 1.0)
        } else if time > 0.0 {
            1.0
        } else {
            0.0
        };
        self.dirty = true;
    }

    fn finish(&mut self) {
        self.jump(1.0);
    }

    fn destroy(&mut self) {
        self.state = TweenState::Destroyed;
        self.dirty = false;
    }

    fn duration(&self) -> f64 {
        self.meta.duration
    }

    fn value(&self) -> f64 {
        let eased = self.meta.easing.ease(self.progress);
        self.meta.from + (self.meta.to - self.meta.from) * eased
    }

    fn state(&self) -> TweenState {
        self.state
    }

    fn progress(&self) -> f64 {
        self.progress
    }

    fn rebase(&mut self, from: f64) {
        if self.state != TweenState::Destroyed {
            self.meta.from = from;
        }
    }

    fn advance(&mut self, dt: f64) -> Option<f64> {
        let step = if self.meta.duration > 0.0 {
            dt.max(0.0) / self.meta.duration
        } else {
            1.0
        };
        match self.state {
            TweenState::Destroyed => return None,
            TweenState::Stopped => {}
            TweenState::Forward => {
                self.progress = (self.progress + step).min(1.0);
                if self.progress >= 1.0 {
                    self.state = TweenState::Stopped;
                }
                self.dirty = true;
            }
            TweenState::Backward => {
                self.progress = (self.progress - step).max(0.0);
                if self.progress <= 0.0 {
                    self.state = TweenState::Stopped;
                }
                self.dirty = true;
            }
        }
        if std::mem::take(&mut self.dirty) {
            Some(self.value())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tween(from: f64, to: f64, duration: f64) -> ValueTween {
        ValueTween::new(TweenMeta {
            from,
            to,
            duration,
            easing: Easing::Linear,
        })
    }

    #[test]
    fn easing_curves_hit_their_endpoints() {
        let all = [
            Easing::Linear,
            Easing::QuadIn,
            Easing::QuadOut,
            Easing::QuadInOut,
            Easing::CubicIn,
            Easing::CubicOut,
            Easing::CubicInOut,
            Easing::SineIn,
            Easing::SineOut,
            Easing::SineInOut,
            Easing::ExpoIn,
            Easing::ExpoOut,
            Easing::ExpoInOut,
            Easing::BackIn,
            Easing::BackOut,
            Easing::BackInOut,
            Easing::BounceIn,
            Easing::BounceOut,
            Easing::BounceInOut,
        ];
        for easing in all {
            assert!(easing.ease(0.0).abs() < 1e-9, "{easing:?} at 0");
            assert!((easing.ease(1.0) - 1.0).abs() < 1e-9, "{easing:?} at 1");
        }
        assert!(Easing::BackOut.ease(0.8) > 1.0);
    }

    #[test]
    fn plays_forward_and_stops_at_the_end() {
        let mut t = tween(0.0, 10.0, 2.0);
        assert_eq!(t.advance(0.5), None);

        t.play();
        assert_eq!(t.advance(0.5), Some(2.5));
        assert_eq!(t.advance(2.0), Some(10.0));
        assert_eq!(t.state(), TweenState::Stopped);
        assert_eq!(t.advance(0.5), None);
    }

    #[test]
    fn reverse_runs_back_to_the_start() {
        let mut t = tween(0.0, 10.0, 1.0);
        t.finish();
        assert_eq!(t.advance(0.0), Some(10.0));

        t.reverse();
        assert_eq!(t.advance(0.25), Some(7.5));
        t.pause();
        assert_eq!(t.advance(0.25), None);
        t.reverse();
        assert_eq!(t.advance(5.0), Some(0.0));
        assert_eq!(t.state(), TweenState::Stopped);
    }

    #[test]
    fn jumps_report_once() {
        let mut t = tween(1.0, 3.0, 1.0);
        t.seek(0.5);
        assert_eq!(t.advance(0.0), Some(2.0));
        assert_eq!(t.advance(0.0), None);

        t.reset();
        assert_eq!(t.advance(0.0), Some(1.0));
    }

    #[test]
    fn zero_duration_completes_immediately() {
        let mut t = tween(0.0, 4.0, 0.0);
        t.play();
        assert_eq!(t.advance(0.0), Some(4.0));
    }

    #[test]
    fn rebase_moves_the_start_only() {
        let mut t = tween(0.0, 10.0, 1.0);
        t.rebase(4.0);
        t.play();
        assert_eq!(t.advance(0.5), Some(7.0));
        assert_eq!(t.progress(), 0.5);
        t.reset();
        assert_eq!(t.advance(0.0), Some(4.0));
        assert_eq!(t.meta().from, 4.0);
    }

    #[test]
    fn destroyed_tweens_stay_silent() {
        let mut t = tween(0.0, 1.0, 1.0);
        t.play();
        t.destroy();
        t.play();
        t.finish();
        assert_eq!(t.advance(1.0), None);
        assert_eq!(t.state(), TweenState::Destroyed);
    }
}
