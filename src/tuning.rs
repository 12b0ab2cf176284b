//! Closed-loop auto-exposure and auto-white-balance (3A) control.
//!
//! One `ThreeAController` per camera, stepped once per captured frame.
//! Both loops smooth noisy per-frame measurements into stable actuator
//! values:
//!
//! - Auto-exposure integrates a per-frame EV adjustment (clamped to
//!   ±0.3 EV to prevent hunting) and applies the moving average of the
//!   last five exposure decisions.
//! - Auto-white-balance estimates gray-world gains and a color
//!   temperature from the channel means, then exponentially smooths the
//!   applied gains toward the estimate.
//!
//! `set_color_temperature` uses a separate forward model for deriving
//! gains from a requested temperature. It is intentionally not the
//! inverse of the estimation path; the two can disagree.

use std::collections::VecDeque;

use crate::frame::{Frame, Rect};
use crate::imgproc;

const EXPOSURE_MIN: f64 = -13.0;
const EXPOSURE_MAX: f64 = -1.0;
const MAX_EV_STEP: f64 = 0.3;
const EV_COMP_MIN: f64 = -2.0;
const EV_COMP_MAX: f64 = 2.0;

const GAIN_MIN: f64 = 0.5;
const GAIN_MAX: f64 = 4.0;
const TEMP_MIN: f64 = 2000.0;
const TEMP_MAX: f64 = 10000.0;
const TEMP_NEUTRAL: f64 = 5500.0;
const GAIN_SMOOTHING: f64 = 0.2;
const CHANNEL_MEAN_EPSILON: f64 = 0.01;

const SMOOTHING_WINDOW: usize = 5;
const MAX_HISTORY: usize = 10;

/// Auto-exposure actuator state.
#[derive(Clone, Copy, Debug)]
pub struct AeSettings {
    pub enabled: bool,
    /// Raw integrated exposure, log-scale units in [-13, -1].
    pub exposure: f64,
    /// Target frame brightness in [0, 255].
    pub target_brightness: f64,
    /// EV compensation in [-2, +2].
    pub exposure_compensation: f64,
}

impl Default for AeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            exposure: -6.0,
            target_brightness: 128.0,
            exposure_compensation: 0.0,
        }
    }
}

/// Auto-white-balance actuator state.
#[derive(Clone, Copy, Debug)]
pub struct AwbSettings {
    pub enabled: bool,
    /// Estimated scene color temperature in Kelvin, [2000, 10000].
    pub color_temperature: f64,
    /// Red channel gain in [0.5, 4.0].
    pub red_gain: f64,
    /// Blue channel gain in [0.5, 4.0].
    pub blue_gain: f64,
}

impl Default for AwbSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            color_temperature: TEMP_NEUTRAL,
            red_gain: 1.0,
            blue_gain: 1.0,
        }
    }
}

/// Per-camera 3A control loops.
pub struct ThreeAController {
    ae: AeSettings,
    awb: AwbSettings,
    brightness_history: VecDeque<f64>,
    exposure_history: VecDeque<f64>,
}

impl ThreeAController {
    pub fn new() -> Self {
        Self {
            ae: AeSettings::default(),
            awb: AwbSettings::default(),
            brightness_history: VecDeque::with_capacity(MAX_HISTORY),
            exposure_history: VecDeque::with_capacity(MAX_HISTORY),
        }
    }

    /// One combined 3A step. Returns true when at least one loop ran.
    pub fn tune(&mut self, frame: &Frame) -> bool {
        if frame.is_empty() {
            return false;
        }
        let mut tuned = false;
        if self.ae.enabled {
            self.tune_auto_exposure(frame);
            tuned = true;
        }
        if self.awb.enabled {
            self.tune_auto_white_balance(frame);
            tuned = true;
        }
        tuned
    }

    // ------------------------------------------------------------------
    // Auto-exposure
    // ------------------------------------------------------------------

    /// Weighted frame brightness: 70% center-region mean, 30% global mean.
    ///
    /// The center region is a quarter of the frame's width and height,
    /// centered — subjects of interest usually sit there.
    pub fn frame_brightness(frame: &Frame) -> f64 {
        if frame.is_empty() {
            return 0.0;
        }
        let gray = imgproc::to_grayscale(frame);
        let (w, h) = gray.size();
        let center = Rect::new(w / 2 - w / 8, h / 2 - h / 8, w / 4, h / 4);
        0.7 * imgproc::mean_intensity_region(&gray, center) + 0.3 * imgproc::mean_intensity(&gray)
    }

    /// The EV adjustment needed to move `current` toward the effective
    /// target, clamped to one ±0.3 EV step.
    pub fn optimal_exposure_step(&self, current_brightness: f64) -> f64 {
        let effective_target =
            self.ae.target_brightness * self.ae.exposure_compensation.exp2();
        let step = (effective_target / current_brightness.max(1.0)).log2();
        step.clamp(-MAX_EV_STEP, MAX_EV_STEP)
    }

    /// Run one auto-exposure iteration and return the smoothed actuator
    /// value applied for this frame.
    pub fn tune_auto_exposure(&mut self, frame: &Frame) -> f64 {
        let brightness = Self::frame_brightness(frame);
        push_bounded(&mut self.brightness_history, brightness);

        let step = self.optimal_exposure_step(brightness);
        self.ae.exposure = (self.ae.exposure + step).clamp(EXPOSURE_MIN, EXPOSURE_MAX);
        push_bounded(&mut self.exposure_history, self.ae.exposure);

        self.smoothed_exposure()
    }

    /// Moving average of the last five exposure decisions; this is the
    /// value actually pushed to the actuator.
    pub fn smoothed_exposure(&self) -> f64 {
        moving_average(&self.exposure_history, SMOOTHING_WINDOW).unwrap_or(self.ae.exposure)
    }

    pub fn enable_auto_exposure(&mut self, enable: bool) {
        self.ae.enabled = enable;
    }

    pub fn set_exposure(&mut self, exposure: f64) {
        self.ae.exposure = exposure.clamp(EXPOSURE_MIN, EXPOSURE_MAX);
    }

    pub fn set_target_brightness(&mut self, brightness: f64) {
        self.ae.target_brightness = brightness.clamp(0.0, 255.0);
    }

    pub fn set_exposure_compensation(&mut self, compensation: f64) {
        self.ae.exposure_compensation = compensation.clamp(EV_COMP_MIN, EV_COMP_MAX);
    }

    pub fn ae_settings(&self) -> AeSettings {
        self.ae
    }

    // ------------------------------------------------------------------
    // Auto-white-balance
    // ------------------------------------------------------------------

    /// Gray-world estimate from a frame: (temperature, red gain, blue gain).
    pub fn estimate_color_temperature(frame: &Frame) -> (f64, f64, f64) {
        let [red, green, blue] = imgproc::channel_means(frame);
        let gray = (red + green + blue) / 3.0;

        let red_gain = if red < CHANNEL_MEAN_EPSILON {
            1.0
        } else {
            (gray / red).clamp(GAIN_MIN, GAIN_MAX)
        };
        let blue_gain = if blue < CHANNEL_MEAN_EPSILON {
            1.0
        } else {
            (gray / blue).clamp(GAIN_MIN, GAIN_MAX)
        };

        let ratio = if blue < CHANNEL_MEAN_EPSILON {
            1.0
        } else {
            red / blue
        };
        let temperature = if ratio < 1.0 {
            TEMP_MIN + ratio * (TEMP_NEUTRAL - TEMP_MIN)
        } else {
            TEMP_NEUTRAL + (ratio - 1.0) * (TEMP_MAX - TEMP_NEUTRAL)
        };

        (temperature.clamp(TEMP_MIN, TEMP_MAX), red_gain, blue_gain)
    }

    /// Run one auto-white-balance iteration: smooth the applied gains
    /// toward the fresh estimate, store the temperature estimate as-is.
    pub fn tune_auto_white_balance(&mut self, frame: &Frame) {
        let (temperature, est_red, est_blue) = Self::estimate_color_temperature(frame);
        self.awb.red_gain =
            GAIN_SMOOTHING * est_red + (1.0 - GAIN_SMOOTHING) * self.awb.red_gain;
        self.awb.blue_gain =
            GAIN_SMOOTHING * est_blue + (1.0 - GAIN_SMOOTHING) * self.awb.blue_gain;
        self.awb.color_temperature = temperature;
    }

    /// Apply the current gains to a frame's red and blue channels.
    /// Saturates at the channel maximum; luminance is not renormalized.
    pub fn apply_white_balance(&self, frame: &mut Frame) {
        imgproc::scale_red_blue(frame, self.awb.red_gain, self.awb.blue_gain);
    }

    pub fn enable_auto_white_balance(&mut self, enable: bool) {
        self.awb.enabled = enable;
    }

    pub fn set_white_balance_gains(&mut self, red_gain: f64, blue_gain: f64) {
        self.awb.red_gain = red_gain.clamp(GAIN_MIN, GAIN_MAX);
        self.awb.blue_gain = blue_gain.clamp(GAIN_MIN, GAIN_MAX);
    }

    /// Set the color temperature directly, deriving gains from a
    /// simplified forward model (not the inverse of estimation).
    pub fn set_color_temperature(&mut self, temperature: f64) {
        let temperature = temperature.clamp(TEMP_MIN, TEMP_MAX);
        let (red_gain, blue_gain) = if temperature <= TEMP_NEUTRAL {
            // Warm light: lift red, pull blue.
            let t = (TEMP_NEUTRAL - temperature) / (TEMP_NEUTRAL - TEMP_MIN);
            (1.0 + 0.8 * t, 1.0 - 0.4 * t)
        } else {
            // Cool light: pull red, lift blue.
            let t = (temperature - TEMP_NEUTRAL) / (TEMP_MAX - TEMP_NEUTRAL);
            (1.0 - 0.3 * t, 1.0 + 0.9 * t)
        };
        self.awb.color_temperature = temperature;
        self.awb.red_gain = red_gain.clamp(GAIN_MIN, GAIN_MAX);
        self.awb.blue_gain = blue_gain.clamp(GAIN_MIN, GAIN_MAX);
    }

    pub fn awb_settings(&self) -> AwbSettings {
        self.awb
    }

    /// Restore defaults and clear both histories.
    pub fn reset(&mut self) {
        self.ae = AeSettings::default();
        self.awb = AwbSettings::default();
        self.brightness_history.clear();
        self.exposure_history.clear();
    }

    pub fn brightness_history(&self) -> impl Iterator<Item = f64> + '_ {
        self.brightness_history.iter().copied()
    }
}

impl Default for ThreeAController {
    fn default() -> Self {
        Self::new()
    }
}

fn push_bounded(history: &mut VecDeque<f64>, value: f64) {
    if history.len() == MAX_HISTORY {
        history.pop_front();
    }
    history.push_back(value);
}

fn moving_average(history: &VecDeque<f64>, window: usize) -> Option<f64> {
    if history.is_empty() {
        return None;
    }
    let take = window.min(history.len());
    let sum: f64 = history.iter().rev().take(take).sum();
    Some(sum / take as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb_frame(r: u8, g: u8, b: u8) -> Frame {
        let mut frame = Frame::filled(64, 48, 3, 0);
        for px in frame.data_mut().chunks_exact_mut(3) {
            px[0] = r;
            px[1] = g;
            px[2] = b;
        }
        frame
    }

    #[test]
    fn uniform_frame_brightness_matches_its_level() {
        let frame = Frame::filled(64, 48, 1, 32);
        assert!((ThreeAController::frame_brightness(&frame) - 32.0).abs() < 1e-9);
    }

    #[test]
    fn first_exposure_step_is_clamped() {
        // Dark scene far below target: the raw correction would be
        // log2(128/32) = 2 EV, but one step may move at most +0.3.
        let mut controller = ThreeAController::new();
        let start = controller.ae_settings().exposure;
        let applied = controller.tune_auto_exposure(&Frame::filled(64, 48, 1, 32));
        assert!((controller.ae_settings().exposure - (start + 0.3)).abs() < 1e-9);
        assert!((applied - (start + 0.3)).abs() < 1e-9);
    }

    #[test]
    fn exposure_stays_in_range_under_extremes() {
        let mut controller = ThreeAController::new();
        let black = Frame::filled(32, 32, 1, 0);
        for _ in 0..100 {
            controller.tune_auto_exposure(&black);
            let exposure = controller.ae_settings().exposure;
            assert!((-13.0..=-1.0).contains(&exposure));
        }
        assert!((controller.ae_settings().exposure - -1.0).abs() < 1e-9);

        let white = Frame::filled(32, 32, 1, 255);
        for _ in 0..100 {
            controller.tune_auto_exposure(&white);
        }
        assert!((controller.ae_settings().exposure - -13.0).abs() < 1e-9);
    }

    #[test]
    fn smoothed_exposure_moves_at_most_one_step_per_frame() {
        let mut controller = ThreeAController::new();
        let mut previous = controller.smoothed_exposure();
        let dark = Frame::filled(32, 32, 1, 8);
        for _ in 0..20 {
            let applied = controller.tune_auto_exposure(&dark);
            assert!((applied - previous).abs() <= MAX_EV_STEP + 1e-9);
            previous = applied;
        }
    }

    #[test]
    fn exposure_compensation_shifts_the_target() {
        let mut controller = ThreeAController::new();
        controller.set_exposure_compensation(-2.0);
        // Effective target 128 * 2^-2 = 32 equals the scene brightness:
        // no correction needed.
        let step = controller.optimal_exposure_step(32.0);
        assert!(step.abs() < 1e-9);
    }

    #[test]
    fn awb_gains_and_temperature_stay_in_range() {
        let mut controller = ThreeAController::new();
        for (r, g, b) in [(255, 0, 0), (0, 255, 0), (0, 0, 255), (3, 200, 250)] {
            controller.tune_auto_white_balance(&rgb_frame(r, g, b));
            let awb = controller.awb_settings();
            assert!((0.5..=4.0).contains(&awb.red_gain));
            assert!((0.5..=4.0).contains(&awb.blue_gain));
            assert!((2000.0..=10000.0).contains(&awb.color_temperature));
        }
    }

    #[test]
    fn gray_scene_converges_to_unit_gains() {
        let mut controller = ThreeAController::new();
        let gray = rgb_frame(120, 120, 120);
        for _ in 0..50 {
            controller.tune_auto_white_balance(&gray);
        }
        let awb = controller.awb_settings();
        assert!((awb.red_gain - 1.0).abs() < 1e-6);
        assert!((awb.blue_gain - 1.0).abs() < 1e-6);
    }

    #[test]
    fn reddish_scene_reads_warm() {
        let (temperature, red_gain, blue_gain) =
            ThreeAController::estimate_color_temperature(&rgb_frame(200, 100, 50));
        assert!(temperature > TEMP_NEUTRAL);
        assert!(red_gain < 1.0);
        assert!(blue_gain > 1.0);
    }

    #[test]
    fn near_zero_channel_forces_unit_gain() {
        let (_, red_gain, _) = ThreeAController::estimate_color_temperature(&rgb_frame(0, 50, 50));
        assert_eq!(red_gain, 1.0);
    }

    #[test]
    fn gains_smooth_toward_estimate() {
        let mut controller = ThreeAController::new();
        let (_, est_red, _) = ThreeAController::estimate_color_temperature(&rgb_frame(200, 100, 50));
        controller.tune_auto_white_balance(&rgb_frame(200, 100, 50));
        let expected = 0.2 * est_red + 0.8 * 1.0;
        assert!((controller.awb_settings().red_gain - expected).abs() < 1e-9);
    }

    #[test]
    fn direct_temperature_set_produces_plausible_gains() {
        let mut controller = ThreeAController::new();

        controller.set_color_temperature(2000.0);
        let warm = controller.awb_settings();
        assert!(warm.red_gain > 1.0);
        assert!(warm.blue_gain < 1.0);

        controller.set_color_temperature(10000.0);
        let cool = controller.awb_settings();
        assert!(cool.red_gain < 1.0);
        assert!(cool.blue_gain > 1.0);

        controller.set_color_temperature(99999.0);
        assert_eq!(controller.awb_settings().color_temperature, 10000.0);
    }

    #[test]
    fn apply_white_balance_scales_channels() {
        let mut controller = ThreeAController::new();
        controller.set_white_balance_gains(2.0, 0.5);
        let mut frame = rgb_frame(100, 100, 100);
        controller.apply_white_balance(&mut frame);
        assert_eq!(frame.sample(0, 0, 0), 200);
        assert_eq!(frame.sample(0, 0, 1), 100);
        assert_eq!(frame.sample(0, 0, 2), 50);
    }

    #[test]
    fn histories_are_bounded() {
        let mut controller = ThreeAController::new();
        let frame = Frame::filled(16, 16, 1, 100);
        for _ in 0..50 {
            controller.tune_auto_exposure(&frame);
        }
        assert_eq!(controller.brightness_history().count(), MAX_HISTORY);
    }
}
