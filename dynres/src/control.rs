//! Feedback control of the dynamic resolution factor.
//!
//! A proportional controller: every [`ACTION_INTERVAL`] seconds the measured
//! frame rate is compared against the setpoint and the factor is corrected by
//! an amount proportional to both the current factor and the FPS error. This
//! converges like an exponential decay but carries no overshoot-elimination
//! guarantee; the conservative gain and the hard floor keep it from
//! oscillating or shrinking without bound. This is a known limitation, not a
//! bug.

use glam::UVec2;

/// Hard floor of the dynamic resolution factor.
pub const MIN_DYNAMIC_FACTOR: f32 = 0.15;
/// Proportional gain applied to the FPS error.
const GAIN: f32 = 0.0175;
/// Minimum number of seconds between two factor adjustments.
const ACTION_INTERVAL: f32 = 2.0;

/// Feedback loop adjusting a single resolution factor from measured FPS.
#[derive(Debug, Clone)]
pub struct ResolutionController {
    target_fps: f32,
    enabled: bool,
    factor: f32,
    measured_fps: f32,
    accumulated_time: f32,
    accumulated_frames: u32,
}

impl ResolutionController {
    pub fn new(target_fps: f32, enabled: bool) -> Self {
        Self {
            target_fps,
            enabled,
            factor: 1.0,
            measured_fps: 0.0,
            accumulated_time: 0.0,
            accumulated_frames: 0,
        }
    }

    /// Advances the loop by one displayed frame. Returns true when a control
    /// adjustment was applied during this call.
    ///
    /// When disabled the factor is pinned back to 1.0 immediately, without
    /// waiting for the next measurement window.
    pub fn step(&mut self, delta_seconds: f32) -> bool {
        if !self.enabled {
            self.factor = 1.0;
        }

        self.accumulated_frames += 1;
        self.accumulated_time += delta_seconds;
        if self.accumulated_time <= ACTION_INTERVAL {
            return false;
        }

        let measured = self.accumulated_frames as f32 / self.accumulated_time;
        // Keep the remainder so the next window starts from a fair phase.
        self.accumulated_time -= ACTION_INTERVAL;
        self.accumulated_frames = 0;

        if !self.enabled {
            self.measured_fps = measured;
            return false;
        }

        self.apply_measurement(measured);
        true
    }

    /// One control step against a finished FPS measurement.
    fn apply_measurement(&mut self, measured_fps: f32) {
        self.measured_fps = measured_fps;
        if measured_fps < self.target_fps {
            self.factor = (self.factor - self.factor * (self.target_fps - measured_fps) * GAIN).max(MIN_DYNAMIC_FACTOR);
        } else {
            self.factor = (self.factor + self.factor * (measured_fps - self.target_fps) * GAIN).min(1.0);
        }
    }

    pub fn factor(&self) -> f32 {
        self.factor
    }

    pub fn measured_fps(&self) -> f32 {
        self.measured_fps
    }

    pub fn target_fps(&self) -> f32 {
        self.target_fps
    }

    pub fn set_target_fps(&mut self, target_fps: f32) {
        self.target_fps = target_fps;
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Human readable summary of the loop state and the currently rendered
    /// internal resolution.
    pub fn status_line(&self, scaled_extent: UVec2) -> String {
        format!(
            "FPS: {:.1} DYN-RES:{} DRF={:.3} ({}x{})",
            self.measured_fps,
            if self.enabled { "ON" } else { "OFF" },
            self.factor,
            scaled_extent.x,
            scaled_extent.y,
        )
    }
}
