//! Accelerometer signal pipeline.
//!
//! Raw 3-axis samples go through a per-axis low-pass gravity estimate; the
//! residual (linear acceleration) is expressed in g. The |z| component feeds a
//! fixed-size sliding window whose RMS is maintained incrementally, giving an
//! O(1) roughness value per sample.

use std::collections::VecDeque;

use crate::settings::VibrationConfig;

/// Standard gravity in m/s².
pub const STANDARD_GRAVITY: f64 = 9.80665;

/// Raw accelerometer reading in device units (m/s²).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawAcceleration {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl RawAcceleration {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    fn as_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// Result of processing one raw sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VibrationReading {
    /// Gravity-removed acceleration [x, y, z] in g.
    pub linear_g: [f64; 3],
    /// Instantaneous 3-axis magnitude in g.
    pub magnitude_g: f64,
    /// Smoothed RMS of |z| over the window, in g.
    pub roughness_g: f64,
}

pub struct VibrationSignalProcessor {
    config: VibrationConfig,
    available: bool,
    gravity: Option<[f64; 3]>,
    last_linear: [f64; 3],
    window: VecDeque<f64>,
    sum_of_squares: f64,
    current_roughness: f64,
    history: VecDeque<f64>,
}

impl VibrationSignalProcessor {
    pub fn new(config: VibrationConfig) -> Self {
        let window = VecDeque::with_capacity(config.window_size);
        let history = VecDeque::with_capacity(config.history_capacity);
        Self {
            config,
            available: true,
            gravity: None,
            last_linear: [0.0; 3],
            window,
            sum_of_squares: 0.0,
            current_roughness: 0.0,
            history,
        }
    }

    /// Processor for a device without an accelerometer. It accepts samples
    /// but every derived metric stays at zero.
    pub fn unavailable(config: VibrationConfig) -> Self {
        let mut processor = Self::new(config);
        processor.available = false;
        processor
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Flags the motion source as gone and zeroes all derived state.
    pub fn mark_unavailable(&mut self) {
        self.reset();
        self.available = false;
    }

    pub fn mark_available(&mut self) {
        self.available = true;
    }

    pub fn process(&mut self, raw: RawAcceleration) -> VibrationReading {
        if !self.available {
            return VibrationReading {
                linear_g: [0.0; 3],
                magnitude_g: 0.0,
                roughness_g: 0.0,
            };
        }

        let sample = raw.as_array();
        let alpha = self.config.smoothing_factor;
        let gravity = match self.gravity {
            Some(previous) => [
                alpha * sample[0] + (1.0 - alpha) * previous[0],
                alpha * sample[1] + (1.0 - alpha) * previous[1],
                alpha * sample[2] + (1.0 - alpha) * previous[2],
            ],
            None => sample,
        };
        self.gravity = Some(gravity);

        let linear_g = [
            (sample[0] - gravity[0]) / STANDARD_GRAVITY,
            (sample[1] - gravity[1]) / STANDARD_GRAVITY,
            (sample[2] - gravity[2]) / STANDARD_GRAVITY,
        ];
        self.last_linear = linear_g;

        let roughness_g = self.push_window(linear_g[2].abs());
        self.current_roughness = roughness_g;
        self.push_history(roughness_g);

        VibrationReading {
            linear_g,
            magnitude_g: magnitude(linear_g),
            roughness_g,
        }
    }

    fn push_window(&mut self, value: f64) -> f64 {
        let capacity = self.config.window_size.max(1);
        if self.window.len() == capacity {
            if let Some(leaving) = self.window.pop_front() {
                self.sum_of_squares -= leaving * leaving;
            }
        }
        self.window.push_back(value);
        self.sum_of_squares += value * value;
        // float drift
        if self.sum_of_squares < 0.0 {
            self.sum_of_squares = 0.0;
        }
        (self.sum_of_squares / self.window.len() as f64).sqrt()
    }

    fn push_history(&mut self, value: f64) {
        let capacity = self.config.history_capacity.max(1);
        while self.history.len() >= capacity {
            self.history.pop_front();
        }
        self.history.push_back(value);
    }

    pub fn current_roughness(&self) -> f64 {
        if self.available {
            self.current_roughness
        } else {
            0.0
        }
    }

    /// Most recent gravity-removed acceleration in g.
    pub fn last_linear(&self) -> [f64; 3] {
        self.last_linear
    }

    /// Rolling roughness history, oldest first.
    pub fn history(&self) -> Vec<f64> {
        self.history.iter().copied().collect()
    }

    pub fn reset(&mut self) {
        self.gravity = None;
        self.last_linear = [0.0; 3];
        self.window.clear();
        self.sum_of_squares = 0.0;
        self.current_roughness = 0.0;
        self.history.clear();
    }
}

impl Default for VibrationSignalProcessor {
    fn default() -> Self {
        Self::new(VibrationConfig::default())
    }
}

pub fn magnitude(v: [f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}
