//! Viewer configuration, loadable from a JSON document.
//!
//! Every field has a default so a partial file (or `{}`) is valid.

use std::path::Path;

use mosaic_protocol::CameraState;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::layout::SpiralConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MosaicConfig {
    pub spiral: SpiralConfig,
    pub playback: PlaybackConfig,
    pub focus: FocusConfig,
}

impl MosaicConfig {
    pub fn from_json_slice(data: &[u8]) -> Result<Self, ConfigError> {
        let config: MosaicConfig = serde_json::from_slice(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data = std::fs::read(path)?;
        Self::from_json_slice(&data)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.spiral;
        if !(s.radius_start > 0.0) {
            return Err(ConfigError::Invalid("spiral.radius_start must be > 0".into()));
        }
        if s.radius_growth < 0.0 {
            return Err(ConfigError::Invalid("spiral.radius_growth must be >= 0".into()));
        }
        if !(s.height_decay > 0.0) {
            return Err(ConfigError::Invalid("spiral.height_decay must be > 0".into()));
        }
        let f = &self.focus;
        if f.animation_frames == 0 || !(f.frames_per_second > 0.0) {
            return Err(ConfigError::Invalid(
                "focus animation needs at least one frame and a positive frame rate".into(),
            ));
        }
        if !(0.0..=1.0).contains(&f.dim_opacity) {
            return Err(ConfigError::Invalid("focus.dim_opacity must be in [0, 1]".into()));
        }
        if f.tube_segments < 2 {
            return Err(ConfigError::Invalid("focus.tube_segments must be >= 2".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Milliseconds between automatic steps.
    pub speed_ms: u64,
}

impl PlaybackConfig {
    pub const MIN_SPEED_MS: u64 = 16;
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self { speed_ms: 500 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusConfig {
    pub animation_frames: u32,
    pub frames_per_second: f64,
    /// Opacity multiplier applied to effects of frames buried under a newer one.
    pub dim_opacity: f64,
    pub particle_count: usize,
    /// Full trips along the warp arc per second.
    pub particle_speed: f64,
    pub tube_segments: usize,
    pub tube_base_radius: f64,
    pub tube_amplitude: f64,
    /// Bezier control point lift as a fraction of the chord length.
    pub arc_lift: f64,
    pub home_camera: CameraState,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            animation_frames: 60,
            frames_per_second: 60.0,
            dim_opacity: 0.25,
            particle_count: 6,
            particle_speed: 0.35,
            tube_segments: 32,
            tube_base_radius: 0.08,
            tube_amplitude: 0.25,
            arc_lift: 0.35,
            home_camera: CameraState::default(),
        }
    }
}
