//! Authored poses tagged with a time offset

use serde::{Deserialize, Serialize};

use crate::foundation::math::Transform;

/// A pose at a point in the animation cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyFrame {
    /// Offset from the start of the cycle, in milliseconds
    pub time: f32,
    /// Pose at `time`
    pub transform: Transform,
}

impl KeyFrame {
    /// Create a keyframe
    pub fn new(time: f32, transform: Transform) -> Self {
        Self { time, transform }
    }

    /// Blend toward `next` by `amount` in `[0, 1]`
    pub fn lerp(&self, next: &Self, amount: f32) -> Transform {
        self.transform.lerp(&next.transform, amount)
    }
}
