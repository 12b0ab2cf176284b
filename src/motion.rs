//! Temporal-difference motion detection.
//!
//! The detector compares each incoming frame against the previous one
//! (rolling baseline, not a long-term background model):
//!
//! 1. Convert to grayscale and blur to suppress sensor noise.
//! 2. Absolute per-pixel difference against the baseline.
//! 3. Binarize at the configured threshold.
//! 4. Dilate to merge fragments into coherent blobs.
//! 5. Extract connected regions; a region counts when its area reaches
//!    the configured minimum.
//!
//! Baseline advancement is a single-call operation: `process` consumes
//! one logical frame, advances the baseline exactly once, and returns the
//! verdict, mask, and regions together. The first frame after
//! construction or `reset` only establishes the baseline and never
//! reports motion.

use crate::frame::{Frame, Rect};
use crate::imgproc;

const BLUR_KERNEL: usize = 21;
const BLUR_SIGMA: f32 = 3.5;
const DILATE_KERNEL: u32 = 5;
const DILATE_ITERATIONS: u32 = 2;

pub const DEFAULT_THRESHOLD: i32 = 25;
pub const DEFAULT_MIN_AREA: f64 = 500.0;

/// Everything derived from one baseline advancement.
#[derive(Clone, Debug, Default)]
pub struct MotionAnalysis {
    /// True iff at least one region reached the minimum area.
    pub motion_detected: bool,
    /// Binarized and dilated difference mask (single channel).
    pub mask: Frame,
    /// Bounding boxes of the qualifying regions.
    pub regions: Vec<Rect>,
}

/// Per-camera motion detector state.
pub struct MotionDetector {
    threshold: u8,
    min_area: f64,
    baseline: Option<Frame>,
}

impl MotionDetector {
    pub fn new(threshold: i32, min_area: f64) -> Self {
        Self {
            threshold: threshold.clamp(0, 255) as u8,
            min_area: min_area.max(0.0),
            baseline: None,
        }
    }

    /// Observe one frame: advance the baseline and report what changed
    /// since the previous frame.
    pub fn process(&mut self, frame: &Frame) -> MotionAnalysis {
        if frame.is_empty() {
            return MotionAnalysis::default();
        }

        let gray = imgproc::gaussian_blur(&imgproc::to_grayscale(frame), BLUR_KERNEL, BLUR_SIGMA);

        let prev = match self.baseline.replace(gray.clone()) {
            Some(prev) => prev,
            None => {
                // No reference yet: establish the baseline, report nothing.
                return MotionAnalysis {
                    motion_detected: false,
                    mask: Frame::filled(frame.width(), frame.height(), 1, 0),
                    regions: Vec::new(),
                };
            }
        };

        let delta = match imgproc::absdiff(&prev, &gray) {
            Ok(delta) => delta,
            Err(_) => {
                // Resolution changed mid-stream; the old reference is
                // meaningless, so start over from this frame.
                return MotionAnalysis {
                    motion_detected: false,
                    mask: Frame::filled(frame.width(), frame.height(), 1, 0),
                    regions: Vec::new(),
                };
            }
        };

        let thresh = imgproc::threshold_binary(&delta, self.threshold);
        let mask = imgproc::dilate(&thresh, DILATE_KERNEL, DILATE_ITERATIONS);

        let regions: Vec<Rect> = imgproc::connected_regions(&mask)
            .into_iter()
            .filter(|r| r.area as f64 >= self.min_area)
            .map(|r| r.bbox)
            .collect();

        MotionAnalysis {
            motion_detected: !regions.is_empty(),
            mask,
            regions,
        }
    }

    /// Verdict-only convenience over `process`.
    pub fn detect_motion(&mut self, frame: &Frame) -> bool {
        self.process(frame).motion_detected
    }

    /// Drop the baseline and return to the uninitialized state.
    /// Threshold and minimum-area configuration are preserved.
    pub fn reset(&mut self) {
        self.baseline = None;
    }

    pub fn is_initialized(&self) -> bool {
        self.baseline.is_some()
    }

    pub fn threshold(&self) -> i32 {
        self.threshold as i32
    }

    pub fn set_threshold(&mut self, threshold: i32) {
        self.threshold = threshold.clamp(0, 255) as u8;
    }

    pub fn min_area(&self) -> f64 {
        self.min_area
    }

    pub fn set_min_area(&mut self, area: f64) {
        self.min_area = area.max(0.0);
    }
}

impl Default for MotionDetector {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD, DEFAULT_MIN_AREA)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_block(block: Rect, value: u8) -> Frame {
        let mut frame = Frame::filled(160, 120, 1, 20);
        for y in block.y..(block.y + block.height) {
            for x in block.x..(block.x + block.width) {
                frame.set_sample(x, y, 0, value);
            }
        }
        frame
    }

    #[test]
    fn first_frame_never_reports_motion() {
        let mut detector = MotionDetector::default();
        let busy = frame_with_block(Rect::new(10, 10, 60, 60), 255);
        assert!(!detector.detect_motion(&busy));
        assert!(detector.is_initialized());
    }

    #[test]
    fn identical_frames_report_no_motion() {
        let mut detector = MotionDetector::default();
        let frame = frame_with_block(Rect::new(30, 30, 40, 40), 200);
        detector.process(&frame);
        let analysis = detector.process(&frame);
        assert!(!analysis.motion_detected);
        assert!(analysis.regions.is_empty());
        assert!(analysis.mask.data().iter().all(|&p| p == 0));
    }

    #[test]
    fn moving_block_is_detected_once() {
        let mut detector = MotionDetector::new(25, 500.0);
        detector.process(&Frame::filled(160, 120, 1, 20));

        let analysis = detector.process(&frame_with_block(Rect::new(40, 30, 40, 40), 160));
        assert!(analysis.motion_detected);
        assert_eq!(analysis.regions.len(), 1);

        // Same scene again: the rolling baseline has caught up.
        let repeat = detector.process(&frame_with_block(Rect::new(40, 30, 40, 40), 160));
        assert!(!repeat.motion_detected);
    }

    #[test]
    fn reset_returns_to_uninitialized() {
        let mut detector = MotionDetector::new(30, 250.0);
        detector.process(&Frame::filled(64, 64, 1, 0));
        detector.reset();
        assert!(!detector.is_initialized());
        assert!(!detector.detect_motion(&Frame::filled(64, 64, 1, 255)));
        assert_eq!(detector.threshold(), 30);
        assert_eq!(detector.min_area(), 250.0);
    }

    #[test]
    fn setters_clamp() {
        let mut detector = MotionDetector::default();
        detector.set_threshold(300);
        assert_eq!(detector.threshold(), 255);
        detector.set_threshold(-5);
        assert_eq!(detector.threshold(), 0);
        detector.set_min_area(-10.0);
        assert_eq!(detector.min_area(), 0.0);
    }

    #[test]
    fn empty_frame_is_ignored() {
        let mut detector = MotionDetector::default();
        assert!(!detector.detect_motion(&Frame::empty()));
        assert!(!detector.is_initialized());
    }

    #[test]
    fn resolution_change_rebaselines() {
        let mut detector = MotionDetector::default();
        detector.process(&Frame::filled(64, 64, 1, 0));
        let analysis = detector.process(&Frame::filled(128, 128, 1, 255));
        assert!(!analysis.motion_detected);
        // The new resolution is now the reference.
        assert!(!detector.detect_motion(&Frame::filled(128, 128, 1, 255)));
    }
}
