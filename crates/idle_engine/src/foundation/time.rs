//! Time management utilities
//!
//! Everything downstream of the frame loop measures time in milliseconds, so the
//! timer reports its deltas in milliseconds as well.

use std::time::Instant;

/// High-precision timer for frame timing
pub struct Timer {
    last_frame: Instant,
    delta_ms: f32,
    total_ms: f64,
    frame_count: u64,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    /// Create a new timer
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            delta_ms: 0.0,
            total_ms: 0.0,
            frame_count: 0,
        }
    }

    /// Update the timer (should be called once per frame)
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        self.delta_ms = now.duration_since(self.last_frame).as_secs_f32() * 1000.0;
        self.total_ms += f64::from(self.delta_ms);
        self.last_frame = now;
        self.frame_count += 1;
        self.delta_ms
    }

    /// Milliseconds between the two most recent ticks
    pub fn delta_ms(&self) -> f32 {
        self.delta_ms
    }

    /// Total milliseconds accumulated across ticks
    pub fn total_ms(&self) -> f64 {
        self.total_ms
    }

    /// Number of ticks so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Average frames per second since creation
    pub fn average_fps(&self) -> f64 {
        if self.total_ms > 0.0 {
            self.frame_count as f64 * 1000.0 / self.total_ms
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_counts_frames() {
        let mut timer = Timer::new();
        assert_eq!(timer.frame_count(), 0);
        assert_eq!(timer.average_fps(), 0.0);

        let first = timer.tick();
        timer.tick();

        assert!(first >= 0.0);
        assert_eq!(timer.frame_count(), 2);
        assert!(timer.total_ms() >= f64::from(first));
    }
}
