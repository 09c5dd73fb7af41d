//! Keyframe animation playback
//!
//! A [`KeyFrameAnimation`] loops forever over its keyframes. Each call to
//! [`KeyFrameAnimation::update`] advances the playhead, interpolates the pose
//! between the surrounding keyframes and bakes it into a local matrix.

mod keyframe;

pub use keyframe::KeyFrame;

use thiserror::Error;

use crate::foundation::math::{Mat4, Transform};

/// Rejected keyframe data
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnimationError {
    /// Fewer than two keyframes
    #[error("Animation needs at least 2 keyframes, got {0}")]
    TooFewKeyFrames(usize),

    /// The cycle must start at zero
    #[error("First keyframe must be at time 0, got {0}")]
    FirstKeyFrameNotAtZero(f32),

    /// Times must strictly increase
    #[error("Keyframe {index} at {time} does not follow previous time {previous}")]
    NonIncreasingTime {
        /// Offending keyframe index
        index: usize,
        /// Time of the keyframe before it
        previous: f32,
        /// Its own time
        time: f32,
    },

    /// NaN or infinite time
    #[error("Keyframe {0} has a non-finite time")]
    NonFiniteTime(usize),
}

/// Cyclic keyframe playback with slerped rotations
#[derive(Debug, Clone)]
pub struct KeyFrameAnimation {
    keyframes: Vec<KeyFrame>,
    enabled: bool,
    /// Elapsed time within the current cycle
    current_frame_time: f32,
    /// Time of the keyframe that opens the current segment
    start_keyframe_time: f32,
    /// Keyframe that closes the current segment
    next_keyframe_index: usize,
    /// Length of the current segment
    time_scale: f32,
    /// Pose snapshot at the segment start
    current_frame: Transform,
    lerp_amount: f32,
    pose: Transform,
}

impl KeyFrameAnimation {
    /// Validate keyframes and build a playhead parked at time 0
    pub fn new(keyframes: Vec<KeyFrame>) -> Result<Self, AnimationError> {
        if keyframes.len() < 2 {
            return Err(AnimationError::TooFewKeyFrames(keyframes.len()));
        }
        for (index, frame) in keyframes.iter().enumerate() {
            if !frame.time.is_finite() {
                return Err(AnimationError::NonFiniteTime(index));
            }
        }
        if keyframes[0].time != 0.0 {
            return Err(AnimationError::FirstKeyFrameNotAtZero(keyframes[0].time));
        }
        for (index, pair) in keyframes.windows(2).enumerate() {
            if pair[1].time <= pair[0].time {
                return Err(AnimationError::NonIncreasingTime {
                    index: index + 1,
                    previous: pair[0].time,
                    time: pair[1].time,
                });
            }
        }

        let first = keyframes[0].transform;
        let time_scale = keyframes[1].time;
        Ok(Self {
            keyframes,
            enabled: true,
            current_frame_time: 0.0,
            start_keyframe_time: 0.0,
            next_keyframe_index: 1,
            time_scale,
            current_frame: first,
            lerp_amount: 0.0,
            pose: first,
        })
    }

    /// Advance by `delta_ms` and bake the interpolated pose into `target`.
    ///
    /// Returns false (leaving `target` untouched) while paused. Negative or
    /// non-finite deltas are treated as zero.
    pub fn update(&mut self, delta_ms: f32, target: &mut Mat4) -> bool {
        if !self.enabled {
            return false;
        }

        let delta = if delta_ms.is_finite() && delta_ms > 0.0 { delta_ms } else { 0.0 };
        self.current_frame_time += delta;

        let duration = self.duration();
        if self.current_frame_time >= duration {
            // Collapse whole cycles at once; the segment walk below restarts from keyframe 0.
            let cycles = (self.current_frame_time / duration).floor();
            self.current_frame_time = (self.current_frame_time - cycles * duration).max(0.0);
            // Rounding in the reduction can leave a remainder of one full cycle
            if self.current_frame_time >= duration {
                self.current_frame_time = 0.0;
            }
            self.next_keyframe_index = 1;
        }
        let last = self.keyframes.len() - 1;
        while self.next_keyframe_index < last
            && self.current_frame_time >= self.keyframes[self.next_keyframe_index].time
        {
            self.next_keyframe_index += 1;
        }

        let start = &self.keyframes[self.next_keyframe_index - 1];
        let next = &self.keyframes[self.next_keyframe_index];
        self.start_keyframe_time = start.time;
        self.time_scale = next.time - start.time;
        self.current_frame = start.transform;
        self.lerp_amount = (self.current_frame_time - self.start_keyframe_time) / self.time_scale;
        self.pose = start.lerp(next, self.lerp_amount);

        *target = self.pose.to_matrix();
        log::trace!(
            "Animation at {:.2}ms, segment {} lerp {:.3}",
            self.current_frame_time,
            self.next_keyframe_index,
            self.lerp_amount
        );
        true
    }

    /// Stop advancing; playhead state is kept
    pub fn pause(&mut self) {
        self.enabled = false;
    }

    /// Resume from where [`pause`](Self::pause) left off
    pub fn unpause(&mut self) {
        self.enabled = true;
    }

    /// Whether playback is paused
    pub fn is_paused(&self) -> bool {
        !self.enabled
    }

    /// Cycle length (time of the last keyframe)
    pub fn duration(&self) -> f32 {
        self.keyframes.last().map_or(0.0, |frame| frame.time)
    }

    /// Elapsed time within the current cycle
    pub fn current_time(&self) -> f32 {
        self.current_frame_time
    }

    /// Progress through the current segment, in `[0, 1)`
    pub fn lerp_amount(&self) -> f32 {
        self.lerp_amount
    }

    /// Index of the keyframe closing the current segment
    pub fn next_keyframe_index(&self) -> usize {
        self.next_keyframe_index
    }

    /// Pose at the start of the current segment
    pub fn segment_start(&self) -> &Transform {
        &self.current_frame
    }

    /// Most recently interpolated pose
    pub fn pose(&self) -> &Transform {
        &self.pose
    }

    /// Authored keyframes
    pub fn keyframes(&self) -> &[KeyFrame] {
        &self.keyframes
    }
}
