//! Per-frame render inputs
//!
//! Passed down the render traversal so meshes can forward the camera and
//! lights to whatever program they were just bound with.

use super::camera::Camera;
use super::device::{GraphicsDevice, ProgramInfo};
use super::lighting::Light;
use super::texture::Texture;

/// Shared, read-only state for one render pass
#[derive(Debug, Clone, Copy)]
pub struct FrameContext<'a> {
    /// Active camera
    pub camera: &'a Camera,
    /// Lights in `uLights` order
    pub lights: &'a [Light],
    /// Cube map reflected by environment-sampling materials
    pub environment: Option<&'a Texture>,
}

impl<'a> FrameContext<'a> {
    /// Bundle a camera and its lights
    pub fn new(camera: &'a Camera, lights: &'a [Light]) -> Self {
        Self {
            camera,
            lights,
            environment: None,
        }
    }

    /// Attach the environment cube map
    pub fn with_environment(mut self, environment: Option<&'a Texture>) -> Self {
        self.environment = environment;
        self
    }

    /// Bind the environment cube map to unit 0; returns whether one was bound
    pub fn bind_environment(&self, device: &mut dyn GraphicsDevice) -> bool {
        self.environment.map_or(false, |texture| texture.bind(device, 0))
    }

    /// Upload every light, then the camera, into the current program
    pub fn apply(&self, device: &mut dyn GraphicsDevice, program: &ProgramInfo) {
        for light in self.lights {
            light.render(device, program);
        }
        self.camera.render(device, program);
    }
}
