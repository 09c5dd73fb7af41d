//! # First-Person Camera
//!
//! A yaw/pitch camera that never rolls. Orientation is two angles; every
//! derived vector and the view matrix are recomputed from them.
//!
//! ## Conventions
//! - Right-handed, Y-up world. The up axis is the constant [`WORLD_UP`].
//! - With yaw and pitch both zero the camera looks down -Z.
//! - Yaw wraps into `[0, 2π)`. Pitch stays within `±π/2`: a rotation that
//!   would push it past the bound is dropped for that call, not clamped.
//! - Projection is OpenGL-style (clip depth in `[-1, 1]`).

use crate::core::config::CameraConfig;
use crate::foundation::math::{constants, utils, Mat4, Mat4Ext, Point3, Quat, Vec3};

use super::device::{GraphicsDevice, ProgramInfo, UniformValue};

/// Largest pitch magnitude in radians
pub const MAX_PITCH: f32 = constants::HALF_PI;

/// Fixed world up axis
pub const WORLD_UP: Vec3 = Vec3::new(0.0, 1.0, 0.0);

/// Look direction at zero yaw and pitch
const CENTER: Vec3 = Vec3::new(0.0, 0.0, -1.0);

/// Yaw/pitch perspective camera
#[derive(Debug, Clone)]
pub struct Camera {
    position: Vec3,
    yaw: f32,
    pitch: f32,
    /// Unit look direction
    target: Vec3,
    /// Horizontal forward, perpendicular to right and up
    forward: Vec3,
    right: Vec3,
    view: Mat4,
    projection: Mat4,
    fov: f32,
    aspect: f32,
    near: f32,
    far: f32,
}

impl Camera {
    /// Create a perspective camera at `position` looking down -Z
    ///
    /// # Arguments
    /// * `position` - Camera position in world space
    /// * `fov_degrees` - Vertical field of view in degrees
    /// * `aspect` - Viewport width / height
    /// * `near` - Near clip distance (> 0)
    /// * `far` - Far clip distance (> near)
    pub fn new(position: Vec3, fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        let fov = utils::deg_to_rad(fov_degrees);
        let mut camera = Self {
            position,
            yaw: 0.0,
            pitch: 0.0,
            target: CENTER,
            forward: CENTER,
            right: Vec3::x(),
            view: Mat4::identity(),
            projection: Mat4::new_perspective(aspect, fov, near, far),
            fov,
            aspect,
            near,
            far,
        };
        camera.update();
        camera
    }

    /// Build from configuration
    pub fn from_config(config: &CameraConfig) -> Self {
        let [x, y, z] = config.position;
        Self::new(Vec3::new(x, y, z), config.fov_degrees, config.aspect, config.near, config.far)
    }

    /// Turn by the given deltas in radians.
    ///
    /// Yaw always applies and wraps. The pitch delta is discarded if the result
    /// would exceed [`MAX_PITCH`] in magnitude. Non-finite deltas are ignored.
    pub fn rotate(&mut self, yaw_delta: f32, pitch_delta: f32) {
        if yaw_delta.is_finite() {
            let yaw = (self.yaw + yaw_delta).rem_euclid(constants::TAU);
            // rem_euclid can round up to exactly TAU for tiny negative inputs
            self.yaw = if yaw >= constants::TAU { 0.0 } else { yaw };
        }

        let pitch = self.pitch + pitch_delta;
        if pitch.abs() <= MAX_PITCH {
            self.pitch = pitch;
        } else {
            log::trace!("Dropping pitch change to {:.3}, beyond ±{:.3}", pitch, MAX_PITCH);
        }

        self.recompute_basis();
    }

    /// Refresh the view matrix from position and orientation
    pub fn update(&mut self) {
        // Equivalent to looking from `position` toward `position + target` with
        // WORLD_UP, but stays well defined when looking straight up or down.
        let orientation = self.orientation();
        self.view = orientation.inverse().to_homogeneous() * Mat4::new_translation(&-self.position);
    }

    /// Move by a world-space offset; no bounds checks
    pub fn translate(&mut self, velocity: &Vec3) {
        self.position += velocity;
        log::trace!("Camera position updated to: {:?}", self.position);
    }

    /// Upload projection, view and eye position to the current program
    pub fn render(&self, device: &mut dyn GraphicsDevice, program: &ProgramInfo) {
        program.set_uniform(device, "uProjectionMatrix", UniformValue::Mat4(self.projection.to_cols_array()));
        program.set_uniform(device, "uViewMatrix", UniformValue::Mat4(self.view.to_cols_array()));
        program.set_uniform(device, "uViewPos", UniformValue::Vec3(self.position.into()));
    }

    /// Change the viewport aspect ratio
    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
            self.projection = Mat4::new_perspective(self.aspect, self.fov, self.near, self.far);
        }
    }

    fn orientation(&self) -> Quat {
        Quat::from_axis_angle(&Vec3::y_axis(), self.yaw) * Quat::from_axis_angle(&Vec3::x_axis(), self.pitch)
    }

    fn recompute_basis(&mut self) {
        self.target = self.orientation() * CENTER;

        // Straight up or down leaves the previous right vector in place
        if let Some(right) = self.target.cross(&WORLD_UP).try_normalize(1.0e-6) {
            self.right = right;
        }
        self.forward = WORLD_UP.cross(&self.right);
    }

    /// Position in world space
    pub fn position(&self) -> &Vec3 {
        &self.position
    }

    /// Yaw in radians, within `[0, 2π)`
    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Pitch in radians, within `±π/2`
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Unit look direction
    pub fn target(&self) -> &Vec3 {
        &self.target
    }

    /// Horizontal forward vector used for walking
    pub fn forward(&self) -> &Vec3 {
        &self.forward
    }

    /// Right vector, always horizontal
    pub fn right(&self) -> &Vec3 {
        &self.right
    }

    /// View matrix as of the last [`update`](Self::update)
    pub fn view_matrix(&self) -> &Mat4 {
        &self.view
    }

    /// Projection matrix
    pub fn projection_matrix(&self) -> &Mat4 {
        &self.projection
    }

    /// Point the camera is looking at, one unit ahead
    pub fn look_point(&self) -> Point3 {
        Point3::from(self.position + self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    fn camera() -> Camera {
        Camera::new(Vec3::new(0.0, 1.0, 5.0), 45.0, 16.0 / 9.0, 0.1, 100.0)
    }

    #[test]
    fn test_initial_orientation_looks_down_negative_z() {
        let camera = camera();
        assert_relative_eq!(*camera.target(), Vec3::new(0.0, 0.0, -1.0), epsilon = EPSILON);
        assert_relative_eq!(*camera.right(), Vec3::new(1.0, 0.0, 0.0), epsilon = EPSILON);
        assert_relative_eq!(*camera.forward(), Vec3::new(0.0, 0.0, -1.0), epsilon = EPSILON);
    }

    #[test]
    fn test_pitch_never_exceeds_bound() {
        let mut camera = camera();
        let deltas = [0.7, 0.7, 0.7, -0.1, 1.5, -3.0, -0.9, -0.9, 0.3, 2.0];
        for delta in deltas {
            camera.rotate(0.1, delta);
            assert!(camera.pitch().abs() <= MAX_PITCH);
        }
    }

    #[test]
    fn test_excess_pitch_dropped_not_clamped() {
        let mut camera = camera();
        camera.rotate(0.0, 1.2);
        camera.rotate(0.0, 0.5);
        assert_relative_eq!(camera.pitch(), 1.2, epsilon = EPSILON);
    }

    #[test]
    fn test_yaw_wraps_into_range() {
        let mut camera = camera();
        camera.rotate(-0.5, 0.0);
        assert_relative_eq!(camera.yaw(), constants::TAU - 0.5, epsilon = EPSILON);

        for _ in 0..50 {
            camera.rotate(1.3, 0.0);
            assert!((0.0..constants::TAU).contains(&camera.yaw()));
        }
        camera.rotate(-1.0e-9, 0.0);
        assert!(camera.yaw() < constants::TAU);
    }

    #[test]
    fn test_right_is_perpendicular_to_up_and_target() {
        let mut camera = camera();
        camera.rotate(0.8, -0.6);
        assert_relative_eq!(camera.right().dot(&WORLD_UP), 0.0, epsilon = EPSILON);
        assert_relative_eq!(camera.right().dot(camera.target()), 0.0, epsilon = EPSILON);
        assert_relative_eq!(camera.forward().dot(&WORLD_UP), 0.0, epsilon = EPSILON);
        assert_relative_eq!(camera.right().norm(), 1.0, epsilon = EPSILON);
    }

    #[test]
    fn test_quarter_yaw_turns_left() {
        let mut camera = camera();
        camera.rotate(constants::HALF_PI, 0.0);
        assert_relative_eq!(*camera.target(), Vec3::new(-1.0, 0.0, 0.0), epsilon = EPSILON);
    }

    #[test]
    fn test_view_matches_look_at() {
        let mut camera = camera();
        camera.rotate(0.4, 0.3);
        camera.translate(&Vec3::new(2.0, 0.0, -1.0));
        camera.update();

        let eye = Point3::from(*camera.position());
        let expected = Mat4::look_at_rh(&eye, &camera.look_point(), &WORLD_UP);
        assert_relative_eq!(*camera.view_matrix(), expected, epsilon = 1e-4);
    }

    #[test]
    fn test_view_defined_when_looking_straight_up() {
        let mut camera = camera();
        camera.rotate(0.0, MAX_PITCH);
        camera.update();
        assert!(camera.view_matrix().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_translate_moves_without_rotation() {
        let mut camera = camera();
        camera.translate(&Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(*camera.position(), Vec3::new(1.0, 1.0, 5.0), epsilon = EPSILON);
        assert_eq!(camera.yaw(), 0.0);
    }
}
