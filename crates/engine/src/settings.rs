use std::path::Path;

use glam::Vec3;
use serde::Deserialize;
use vista_common::Color;
use vista_gfx::GraphicsSettings;

/// Errors from reading a settings file.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid settings: {0}")]
    Json(#[from] serde_json::Error),
}

/// Everything configurable about a viewer session. Missing fields take defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub graphics: GraphicsSettings,
    pub camera: CameraSettings,
    /// Colour the back buffer is cleared to each frame.
    pub clear_color: Color,
    /// Frames kept for the rolling frame-time statistics.
    pub stats_window: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            graphics: GraphicsSettings::default(),
            camera: CameraSettings::default(),
            clear_color: Color::CORNFLOWER_BLUE,
            stats_window: 120,
        }
    }
}

impl EngineSettings {
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let data = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&data)
    }
}

/// Initial pose and handling of the viewer camera. Angles in degrees.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    /// Units per second.
    pub speed: f32,
    /// Speed multiplier while Shift is held.
    pub boost: f32,
    /// Radians per pixel of mouse travel.
    pub sensitivity: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 1.5, 4.0),
            yaw: -90.0,
            pitch: -20.0,
            fov: 60.0,
            near: 0.1,
            far: 1000.0,
            speed: 3.0,
            boost: 3.0,
            sensitivity: 0.003,
        }
    }
}
