//! Zoom control for the page viewer.

use crate::config::ViewerConfig;

pub const DEFAULT_SCALE: f32 = 1.2;
pub const DEFAULT_ZOOM_STEP: f32 = 0.2;
pub const DEFAULT_MIN_SCALE: f32 = 0.5;
pub const DEFAULT_MAX_SCALE: f32 = 3.0;

/// Clamped, stepwise scale factor.
///
/// Scales are kept at two decimals so that repeated steps land on the same
/// values a user sees in the zoom readout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomController {
    scale: f32,
    step: f32,
    min: f32,
    max: f32,
}

impl Default for ZoomController {
    fn default() -> Self {
        Self::new(DEFAULT_SCALE, DEFAULT_ZOOM_STEP, DEFAULT_MIN_SCALE, DEFAULT_MAX_SCALE)
    }
}

impl ZoomController {
    /// An inverted range is reordered. A non-finite or non-positive bound, or
    /// step, falls back to the default.
    pub fn new(initial: f32, step: f32, min: f32, max: f32) -> Self {
        let (min, max) = scale_range(min, max);
        let step = if step.is_finite() && step > 0.0 { step } else { DEFAULT_ZOOM_STEP };

        let mut zoom = Self { scale: min, step, min, max };
        zoom.set(initial);
        zoom
    }

    pub fn from_config(config: &ViewerConfig) -> Self {
        Self::new(config.initial_scale, config.zoom_step, config.min_scale, config.max_scale)
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Sets the scale, clamped to the allowed range. Returns the applied value.
    pub fn set(&mut self, scale: f32) -> f32 {
        if scale.is_finite() {
            self.scale = round_scale(scale.clamp(self.min, self.max));
        }
        self.scale
    }

    pub fn zoom_in(&mut self) -> f32 {
        self.set(self.scale + self.step)
    }

    pub fn zoom_out(&mut self) -> f32 {
        self.set(self.scale - self.step)
    }

    /// Zoom level as a whole percentage, for display.
    pub fn percent(&self) -> u32 {
        (self.scale * 100.0).round() as u32
    }
}

fn scale_range(min: f32, max: f32) -> (f32, f32) {
    let usable = |bound: f32| bound.is_finite() && bound > 0.0;
    if !(usable(min) && usable(max)) {
        return (DEFAULT_MIN_SCALE, DEFAULT_MAX_SCALE);
    }

    if min <= max {
        (min, max)
    } else {
        (max, min)
    }
}

fn round_scale(scale: f32) -> f32 {
    (scale * 100.0).round() / 100.0
}
