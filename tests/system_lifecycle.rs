use std::time::{Duration, Instant};

use argus::{shared, MonitorPacing, SurveillanceSystem, UsbCamera};

fn fast_system() -> SurveillanceSystem {
    SurveillanceSystem::with_pacing(MonitorPacing {
        frame_interval: Duration::from_millis(2),
        capture_retry: Duration::from_millis(2),
    })
}

/// Register one camera, start, immediately stop: `stop` must return only
/// after the monitoring worker has disconnected the camera, and
/// `is_running` must be false afterwards.
#[test]
fn start_then_immediate_stop_disconnects_the_camera() {
    let system = fast_system();
    let camera = shared(UsbCamera::synthetic("cam1", "Front door", 0));
    system.add_camera(camera.clone()).unwrap();

    system.start().unwrap();
    assert!(system.is_running());
    system.stop().unwrap();

    assert!(!system.is_running());
    assert!(!camera.lock().unwrap().is_connected());
}

#[test]
fn start_stop_cycles_are_repeatable() {
    let system = fast_system();
    let camera = shared(UsbCamera::synthetic("cam1", "Front door", 0));
    system.add_camera(camera.clone()).unwrap();

    for _ in 0..3 {
        system.start().unwrap();
        std::thread::sleep(Duration::from_millis(20));
        system.stop().unwrap();
        assert!(!camera.lock().unwrap().is_connected());
    }
}

#[test]
fn each_camera_gets_its_own_worker() {
    let system = fast_system();
    let first = shared(UsbCamera::synthetic("cam1", "One", 0));
    let second = shared(UsbCamera::synthetic("cam2", "Two", 1));
    system.add_camera(first.clone()).unwrap();
    system.add_camera(second.clone()).unwrap();

    system.start().unwrap();

    // Both workers publish frames independently.
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let both = system.latest_frame("cam1").is_some() && system.latest_frame("cam2").is_some();
        if both {
            break;
        }
        assert!(Instant::now() < deadline, "workers never published frames");
        std::thread::sleep(Duration::from_millis(5));
    }

    system.stop().unwrap();
    assert!(!first.lock().unwrap().is_connected());
    assert!(!second.lock().unwrap().is_connected());
}

#[test]
fn stop_force_stops_active_recordings() {
    let dir = tempfile::tempdir().unwrap();
    let system = fast_system();
    system
        .add_camera(shared(UsbCamera::synthetic("cam1", "One", 0)))
        .unwrap();
    system
        .start_recording("cam1", &dir.path().join("cam1.avi"))
        .unwrap();

    system.start().unwrap();
    std::thread::sleep(Duration::from_millis(50));
    system.stop().unwrap();

    assert!(!system.is_recording("cam1"));
    // The file is a finished container, not a truncated stream.
    let bytes = std::fs::read(dir.path().join("cam1.avi")).unwrap();
    let riff_size = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
    assert_eq!(riff_size as usize, bytes.len() - 8);
}

#[test]
fn display_paths_read_snapshots_while_running() {
    let system = fast_system();
    system
        .add_camera(shared(UsbCamera::synthetic("cam1", "One", 0)))
        .unwrap();
    system.enable_motion_detection("cam1", 25).unwrap();
    system.start().unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while system.latest_frame("cam1").is_none() {
        assert!(Instant::now() < deadline, "worker never published a frame");
        std::thread::sleep(Duration::from_millis(5));
    }

    // Poll display-facing queries concurrently with the worker; they
    // must never disturb the pipeline.
    for _ in 0..20 {
        let _ = system.latest_frame("cam1");
        let _ = system.annotated_frame("cam1");
        let _ = system.motion_regions("cam1");
    }

    system.stop().unwrap();
    assert!(!system.is_running());
}

#[test]
fn unknown_cameras_have_no_snapshots() {
    let system = fast_system();
    assert!(system.latest_frame("ghost").is_none());
    assert!(system.annotated_frame("ghost").is_none());
    assert!(system.motion_regions("ghost").is_empty());
}
