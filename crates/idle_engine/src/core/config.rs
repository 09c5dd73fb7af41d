//! # Unified Configuration System
//!
//! All tunables for the renderer live here, grouped by subsystem and loadable
//! from TOML or RON through [`Config`].
//!
//! ## Configuration Categories
//!
//! - **Camera**: projection parameters and the start position
//! - **Controls**: mouse and movement gains applied to motion intent
//! - **Shaders**: where GLSL sources and `//include` headers are found
//! - **Engine**: log filter and frame limits

use serde::{Serialize, Deserialize};
use std::path::{Path, PathBuf};

pub use crate::config::{Config, ConfigError};

/// # Shader Configuration
///
/// Locates the per-class GLSL sources and the header directory that
/// `//include <name>` directives resolve against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Directory holding `<class>.vert` / `<class>.frag`
    pub shader_dir: PathBuf,
    /// Directory holding include headers
    pub include_dir: PathBuf,
}

impl ShaderConfig {
    /// Create a new shader configuration
    pub fn new(shader_dir: impl Into<PathBuf>) -> Self {
        let shader_dir = shader_dir.into();
        Self {
            include_dir: shader_dir.join("include"),
            shader_dir,
        }
    }

    /// Override the header directory
    pub fn with_include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dir = dir.into();
        self
    }

    /// Create shader config with automatic path resolution
    ///
    /// Tries a few common locations relative to the working directory and falls
    /// back to `shaders/` when none exists.
    pub fn with_path_resolution() -> Self {
        let candidates = ["shaders", "resources/shaders", "../shaders", "crates/idle_engine/shaders"];

        candidates
            .iter()
            .map(Path::new)
            .find(|dir| dir.is_dir())
            .map_or_else(|| Self::new("shaders"), Self::new)
    }

    /// Validate that the shader directories exist
    pub fn validate(&self) -> Result<(), String> {
        if !self.shader_dir.is_dir() {
            return Err(format!("Shader directory not found: {}", self.shader_dir.display()));
        }
        if !self.include_dir.is_dir() {
            return Err(format!("Shader include directory not found: {}", self.include_dir.display()));
        }
        Ok(())
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::with_path_resolution()
    }
}

/// # Camera Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    /// Viewport width / height
    pub aspect: f32,
    /// Near clip distance
    pub near: f32,
    /// Far clip distance
    pub far: f32,
    /// Start position in world space
    pub position: [f32; 3],
}

impl CameraConfig {
    /// Set the aspect ratio from a viewport size
    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        if height > 0 {
            self.aspect = width as f32 / height as f32;
        }
        self
    }

    /// Set the start position
    pub fn with_position(mut self, x: f32, y: f32, z: f32) -> Self {
        self.position = [x, y, z];
        self
    }

    /// Validate projection parameters
    pub fn validate(&self) -> Result<(), String> {
        if !(self.fov_degrees > 0.0 && self.fov_degrees < 180.0) {
            return Err(format!("Field of view must be in (0, 180) degrees, got {}", self.fov_degrees));
        }
        if !(self.aspect.is_finite() && self.aspect > 0.0) {
            return Err(format!("Aspect ratio must be positive, got {}", self.aspect));
        }
        if !(self.near > 0.0 && self.far > self.near) {
            return Err(format!("Clip planes must satisfy 0 < near < far, got {} / {}", self.near, self.far));
        }
        Ok(())
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 45.0,
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
            position: [0.0, 0.0, 0.0],
        }
    }
}

/// # Controls Configuration
///
/// Gains are per millisecond of frame time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    /// Radians of yaw/pitch per unit of mouse delta per millisecond
    pub mouse_speed: f32,
    /// World units per millisecond while walking
    pub move_speed: f32,
    /// World units per millisecond while sprinting
    pub sprint_speed: f32,
}

impl ControlsConfig {
    /// Validate gains
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("mouse_speed", self.mouse_speed),
            ("move_speed", self.move_speed),
            ("sprint_speed", self.sprint_speed),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(format!("{name} must be a non-negative number, got {value}"));
            }
        }
        Ok(())
    }
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            mouse_speed: 0.002,
            move_speed: 0.005,
            sprint_speed: 0.02,
        }
    }
}

/// # Engine Configuration
///
/// Top-level configuration that encompasses all subsystems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Log filter passed to `env_logger`
    pub log_level: String,
    /// Stop the main loop after this many frames
    pub max_frames: Option<u64>,
    /// Camera setup
    pub camera: CameraConfig,
    /// Motion intent gains
    pub controls: ControlsConfig,
    /// Shader source locations
    pub shaders: ShaderConfig,
}

impl EngineConfig {
    /// Create a new engine configuration
    pub fn new() -> Self {
        Self {
            log_level: "info".to_string(),
            max_frames: None,
            camera: CameraConfig::default(),
            controls: ControlsConfig::default(),
            shaders: ShaderConfig::default(),
        }
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Stop after a fixed number of frames
    pub fn with_max_frames(mut self, frames: u64) -> Self {
        self.max_frames = Some(frames);
        self
    }

    /// Set custom camera configuration
    pub fn with_camera(mut self, camera: CameraConfig) -> Self {
        self.camera = camera;
        self
    }

    /// Set custom controls configuration
    pub fn with_controls(mut self, controls: ControlsConfig) -> Self {
        self.controls = controls;
        self
    }

    /// Set custom shader configuration
    pub fn with_shaders(mut self, shaders: ShaderConfig) -> Self {
        self.shaders = shaders;
        self
    }

    /// Validate the entire configuration.
    ///
    /// Shader directories are not checked here; sources may be registered in
    /// memory instead of read from disk.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.camera.validate().map_err(ConfigError::Invalid)?;
        self.controls.validate().map_err(ConfigError::Invalid)?;
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for EngineConfig {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFormat;

    #[test]
    fn test_defaults_match_control_gains() {
        let config = EngineConfig::default();
        assert_eq!(config.controls.mouse_speed, 0.002);
        assert_eq!(config.controls.move_speed, 0.005);
        assert_eq!(config.controls.sprint_speed, 0.02);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = EngineConfig::from_str_as(
            "log_level = \"debug\"\n[camera]\nfov_degrees = 60.0\n",
            ConfigFormat::Toml,
        ).unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.camera.fov_degrees, 60.0);
        assert_eq!(config.camera.near, CameraConfig::default().near);
        assert_eq!(config.controls, ControlsConfig::default());
    }

    #[test]
    fn test_ron_round_trip() {
        let config = EngineConfig::new()
            .with_max_frames(12)
            .with_shaders(ShaderConfig::new("assets/glsl"))
            .with_camera(CameraConfig::default().with_viewport(800, 600));

        let text = config.to_string_as(ConfigFormat::Ron).unwrap();
        let parsed = EngineConfig::from_str_as(&text, ConfigFormat::Ron).unwrap();
        assert_eq!(parsed, config);
        assert_eq!(parsed.shaders.include_dir, PathBuf::from("assets/glsl/include"));
    }

    #[test]
    fn test_invalid_camera_rejected() {
        let mut config = EngineConfig::new();
        config.camera.near = 10.0;
        config.camera.far = 1.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let result = EngineConfig::load_from_file("engine.json");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}
