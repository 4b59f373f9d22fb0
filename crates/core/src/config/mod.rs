use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::tween::Easing;
use crate::Result;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub playback: PlaybackConfig,
    /// `tracing` filter used when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            playback: PlaybackConfig::default(),
            log_filter: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Parses a JSON configuration; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

/// Defaults applied to tweens staged without explicit timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Frames per second used when time is advanced in fixed steps.
    pub frame_rate: u32,
    /// Seconds.
    pub default_duration: f64,
    pub default_easing: Easing,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            frame_rate: 60,
            default_duration: 1.0,
            default_easing: Easing::CubicInOut,
        }
    }
}

impl PlaybackConfig {
    /// Length of one frame in seconds.
    pub fn frame_interval(&self) -> f64 {
        1.0 / f64::from(self.frame_rate.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config = AppConfig::from_json(r#"{ "playback": { "frame_rate": 30 } }"#).unwrap();
        assert_eq!(config.playback.frame_rate, 30);
        assert_eq!(config.playback.default_duration, 1.0);
        assert_eq!(config.playback.default_easing, Easing::CubicInOut);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn parses_easing_names() {
        let config =
            AppConfig::from_json(r#"{ "playback": { "default_easing": "bounce_out" } }"#).unwrap();
        assert_eq!(config.playback.default_easing, Easing::BounceOut);
        assert!(AppConfig::from_json(r#"{ "playback": { "default_easing": "wobbly" } }"#).is_err());
    }

    #[test]
    fn zero_frame_rate_does_not_divide_by_zero() {
        let playback = PlaybackConfig {
            frame_rate: 0,
            ..Default::default()
        };
        assert_eq!(playback.frame_interval(), 1.0);
    }
}
