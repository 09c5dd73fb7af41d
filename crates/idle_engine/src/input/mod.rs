//! Input management system
//!
//! Window or browser event capture lives outside the engine. Whatever captures
//! events feeds them into a [`MotionIntent`]; [`Controls`] turns the intent into
//! camera motion once per frame.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::core::config::ControlsConfig;
use crate::foundation::math::Vec3;
use crate::render::camera::Camera;

bitflags! {
    /// Held movement keys
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct MoveFlags: u32 {
        /// Walk along the camera's forward vector
        const FORWARD = 1 << 0;
        /// Walk backwards
        const BACK = 1 << 3;
        /// Strafe left
        const LEFT = 1 << 6;
        /// Strafe right
        const RIGHT = 1 << 9;
    }
}

/// Key codes the controls understand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// W key
    W,
    /// A key
    A,
    /// S key
    S,
    /// D key
    D,
    /// Left shift
    Shift,
}

impl KeyCode {
    fn move_flag(self) -> Option<MoveFlags> {
        match self {
            Self::W => Some(MoveFlags::FORWARD),
            Self::S => Some(MoveFlags::BACK),
            Self::A => Some(MoveFlags::LEFT),
            Self::D => Some(MoveFlags::RIGHT),
            Self::Shift => None,
        }
    }
}

/// Accumulated user intent between two frames
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionIntent {
    /// Pending yaw in input units (pixels), consumed by the next update
    pub yaw_delta: f32,
    /// Pending pitch in input units (pixels), consumed by the next update
    pub pitch_delta: f32,
    /// Movement keys currently held
    pub move_flags: MoveFlags,
    /// Mouse-look is engaged (button held)
    pub rotate_active: bool,
    /// Sprint modifier held
    pub sprint: bool,
}

impl MotionIntent {
    /// Handle a key press or release
    pub fn handle_key(&mut self, key: KeyCode, pressed: bool) {
        match key.move_flag() {
            Some(flag) => self.move_flags.set(flag, pressed),
            None => self.sprint = pressed,
        }
    }

    /// Engage or release mouse-look
    pub fn handle_mouse_button(&mut self, pressed: bool) {
        self.rotate_active = pressed;
    }

    /// Record relative mouse movement; ignored unless mouse-look is engaged.
    ///
    /// Moving right turns the camera right, moving down tilts it down.
    pub fn handle_mouse_move(&mut self, dx: f32, dy: f32) {
        if self.rotate_active {
            self.yaw_delta = -dx;
            self.pitch_delta = -dy;
        }
    }

    /// Whether any movement key is held
    pub fn is_moving(&self) -> bool {
        !self.move_flags.is_empty()
    }
}

/// Converts motion intent into camera rotation and translation
#[derive(Debug, Clone)]
pub struct Controls {
    mouse_speed: f32,
    move_speed: f32,
    sprint_speed: f32,
}

impl Default for Controls {
    fn default() -> Self {
        Self::new(&ControlsConfig::default())
    }
}

impl Controls {
    /// Create controls with the configured speeds
    pub fn new(config: &ControlsConfig) -> Self {
        Self {
            mouse_speed: config.mouse_speed,
            move_speed: config.move_speed,
            sprint_speed: config.sprint_speed,
        }
    }

    /// Apply one frame of intent to the camera.
    ///
    /// `delta_ms` scales both turning and walking. Rotation deltas are consumed.
    /// FORWARD takes precedence over BACK and LEFT over RIGHT when both are held.
    /// Returns true when the camera may have changed, in which case the caller
    /// refreshes its view matrix.
    pub fn update(&self, delta_ms: f32, intent: &mut MotionIntent, camera: &mut Camera) -> bool {
        let delta_ms = if delta_ms.is_finite() { delta_ms.max(0.0) } else { 0.0 };

        if intent.rotate_active {
            let gain = self.mouse_speed * delta_ms;
            camera.rotate(intent.yaw_delta * gain, intent.pitch_delta * gain);
            intent.yaw_delta = 0.0;
            intent.pitch_delta = 0.0;
        }

        if intent.is_moving() {
            let speed = if intent.sprint { self.sprint_speed } else { self.move_speed };
            let gain = speed * delta_ms;
            let mut velocity = Vec3::zeros();

            if intent.move_flags.contains(MoveFlags::FORWARD) {
                velocity += camera.forward() * gain;
            } else if intent.move_flags.contains(MoveFlags::BACK) {
                velocity -= camera.forward() * gain;
            }
            if intent.move_flags.contains(MoveFlags::LEFT) {
                velocity -= camera.right() * gain;
            } else if intent.move_flags.contains(MoveFlags::RIGHT) {
                velocity += camera.right() * gain;
            }

            camera.translate(&velocity);
        }

        intent.rotate_active || intent.is_moving()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn camera() -> Camera {
        Camera::new(Vec3::zeros(), 45.0, 1.0, 0.1, 100.0)
    }

    #[test]
    fn test_idle_intent_changes_nothing() {
        let controls = Controls::default();
        let mut camera = camera();
        let mut intent = MotionIntent::default();

        assert!(!controls.update(16.0, &mut intent, &mut camera));
        assert_eq!(*camera.position(), Vec3::zeros());
    }

    #[test]
    fn test_forward_beats_back() {
        let controls = Controls::default();
        let mut camera = camera();
        let mut intent = MotionIntent::default();
        intent.handle_key(KeyCode::W, true);
        intent.handle_key(KeyCode::S, true);

        assert!(controls.update(100.0, &mut intent, &mut camera));
        // 0.005 units/ms * 100 ms along -Z
        assert_relative_eq!(*camera.position(), Vec3::new(0.0, 0.0, -0.5), epsilon = 1e-5);
    }

    #[test]
    fn test_left_beats_right_and_sprint_speeds_up() {
        let controls = Controls::default();
        let mut camera = camera();
        let mut intent = MotionIntent::default();
        intent.handle_key(KeyCode::A, true);
        intent.handle_key(KeyCode::D, true);
        intent.handle_key(KeyCode::Shift, true);

        controls.update(10.0, &mut intent, &mut camera);
        assert_relative_eq!(*camera.position(), Vec3::new(-0.2, 0.0, 0.0), epsilon = 1e-5);

        intent.handle_key(KeyCode::A, false);
        intent.handle_key(KeyCode::Shift, false);
        controls.update(10.0, &mut intent, &mut camera);
        assert_relative_eq!(*camera.position(), Vec3::new(-0.15, 0.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn test_rotation_consumes_deltas() {
        let controls = Controls::default();
        let mut camera = camera();
        let mut intent = MotionIntent::default();

        intent.handle_mouse_move(10.0, 0.0);
        assert_eq!(intent.yaw_delta, 0.0);

        intent.handle_mouse_button(true);
        intent.handle_mouse_move(-10.0, 0.0);
        assert!(controls.update(5.0, &mut intent, &mut camera));
        // yaw 10 px * 0.002 * 5 ms
        assert_relative_eq!(camera.yaw(), 0.1, epsilon = 1e-5);
        assert_eq!(intent.yaw_delta, 0.0);

        // Still rotating, nothing left to apply
        assert!(controls.update(5.0, &mut intent, &mut camera));
        assert_relative_eq!(camera.yaw(), 0.1, epsilon = 1e-5);
    }
}
