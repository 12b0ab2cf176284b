use argus::{Frame, MotionDetector, Rect};

fn uniform(width: u32, height: u32, value: u8) -> Frame {
    Frame::filled(width, height, 1, value)
}

fn with_block(base: &Frame, block: Rect, value: u8) -> Frame {
    let mut frame = base.clone();
    for y in block.y..block.y + block.height {
        for x in block.x..block.x + block.width {
            frame.set_sample(x, y, 0, value);
        }
    }
    frame
}

#[test]
fn first_verdict_after_construction_is_false() {
    let mut detector = MotionDetector::new(25, 500.0);
    // Even a maximally busy frame only establishes the baseline.
    let busy = with_block(&uniform(160, 120, 0), Rect::new(20, 20, 100, 80), 255);
    assert!(!detector.detect_motion(&busy));
}

#[test]
fn first_verdict_after_reset_is_false() {
    let mut detector = MotionDetector::new(25, 500.0);
    detector.process(&uniform(160, 120, 10));
    detector.process(&uniform(160, 120, 200));
    detector.reset();
    assert!(!detector.detect_motion(&uniform(160, 120, 10)));
}

#[test]
fn identical_consecutive_frames_never_report_motion() {
    let mut detector = MotionDetector::new(25, 500.0);
    let frame = with_block(&uniform(160, 120, 60), Rect::new(40, 30, 50, 50), 180);
    detector.process(&frame); // baseline
    for _ in 0..5 {
        assert!(!detector.detect_motion(&frame.clone()));
    }
}

/// A 30x30 solid block of intensity delta 100 must produce a true
/// verdict and exactly one region whose bounding box covers the block.
#[test]
fn solid_block_produces_one_covering_region() {
    let mut detector = MotionDetector::new(25, 500.0);
    let block = Rect::new(60, 45, 30, 30);

    let baseline = uniform(160, 120, 50);
    let changed = with_block(&baseline, block, 150);

    detector.process(&baseline);
    let analysis = detector.process(&changed);

    assert!(analysis.motion_detected);
    assert_eq!(analysis.regions.len(), 1);
    assert!(
        analysis.regions[0].contains(&block),
        "region {:?} does not cover the changed block {:?}",
        analysis.regions[0],
        block
    );
}

#[test]
fn regions_below_min_area_do_not_count() {
    // A 30x30 change is far below a 10000-pixel minimum.
    let mut detector = MotionDetector::new(25, 10_000.0);
    let baseline = uniform(160, 120, 50);
    let changed = with_block(&baseline, Rect::new(60, 45, 30, 30), 150);

    detector.process(&baseline);
    let analysis = detector.process(&changed);
    assert!(!analysis.motion_detected);
    assert!(analysis.regions.is_empty());
}

#[test]
fn sub_threshold_change_is_invisible() {
    // Delta of 10 never crosses a threshold of 25.
    let mut detector = MotionDetector::new(25, 500.0);
    let baseline = uniform(160, 120, 50);
    let changed = with_block(&baseline, Rect::new(60, 45, 30, 30), 60);

    detector.process(&baseline);
    assert!(!detector.detect_motion(&changed));
}

#[test]
fn two_separate_blocks_produce_two_regions() {
    let mut detector = MotionDetector::new(25, 500.0);
    let baseline = uniform(320, 240, 40);
    let changed = with_block(
        &with_block(&baseline, Rect::new(30, 30, 40, 40), 200),
        Rect::new(220, 160, 40, 40),
        200,
    );

    detector.process(&baseline);
    let analysis = detector.process(&changed);
    assert!(analysis.motion_detected);
    assert_eq!(analysis.regions.len(), 2);
}

#[test]
fn rolling_baseline_tracks_the_latest_frame() {
    let mut detector = MotionDetector::new(25, 500.0);
    let baseline = uniform(160, 120, 50);
    let changed = with_block(&baseline, Rect::new(60, 45, 30, 30), 150);

    detector.process(&baseline);
    assert!(detector.detect_motion(&changed));
    // The changed frame is now the reference, so repeating it is quiet.
    assert!(!detector.detect_motion(&changed));
    // Reverting to the original scene is change again.
    assert!(detector.detect_motion(&baseline));
}

#[test]
fn mask_matches_verdict() {
    let mut detector = MotionDetector::new(25, 500.0);
    let baseline = uniform(160, 120, 50);
    let changed = with_block(&baseline, Rect::new(60, 45, 30, 30), 150);

    detector.process(&baseline);
    let analysis = detector.process(&changed);
    assert!(analysis.motion_detected);
    assert!(analysis.mask.data().iter().any(|&p| p != 0));
    assert_eq!(analysis.mask.size(), (160, 120));
}
