use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use argus::config::{CameraKind, DaemonConfig};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "ARGUS_CONFIG",
        "ARGUS_FRAME_INTERVAL_MS",
        "ARGUS_CAPTURE_RETRY_MS",
        "ARGUS_RECORD_DIR",
        "ARGUS_SNAPSHOT_DIR",
        "ARGUS_SNAPSHOT_SECS",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "cameras": [
            {
                "id": "front",
                "name": "Front door",
                "kind": "usb",
                "device_index": 2,
                "width": 800,
                "height": 600,
                "fps": 15,
                "motion": true
            },
            {
                "id": "gate",
                "kind": "ip",
                "host": "192.168.1.50",
                "port": 8554,
                "username": "admin",
                "password": "secret",
                "record": true
            }
        ],
        "motion": {"threshold": 30, "min_area": 750.5},
        "recording": {"dir": "/tmp/argus-recordings", "fps": 20, "codec": "mjpg"},
        "pacing": {"frame_interval_ms": 50, "capture_retry_ms": 250},
        "snapshot": {"interval_secs": 60, "quality": 80}
    }"#;
    file.write_all(json.as_bytes()).expect("write config");

    std::env::set_var("ARGUS_CONFIG", file.path());
    std::env::set_var("ARGUS_FRAME_INTERVAL_MS", "10");
    std::env::set_var("ARGUS_SNAPSHOT_DIR", "/tmp/argus-snaps");

    let cfg = DaemonConfig::load(None).expect("load config");

    assert_eq!(cfg.cameras.len(), 2);
    let front = &cfg.cameras[0];
    assert_eq!(front.id, "front");
    assert_eq!(front.name, "Front door");
    assert_eq!(front.kind, CameraKind::Usb { device_index: 2 });
    assert_eq!((front.width, front.height, front.fps), (800, 600, 15));
    assert!(front.motion);
    assert!(!front.record);

    let gate = &cfg.cameras[1];
    assert_eq!(gate.name, "gate"); // falls back to the id
    assert!(gate.record);
    match &gate.kind {
        CameraKind::Ip {
            host,
            port,
            username,
            ..
        } => {
            assert_eq!(host, "192.168.1.50");
            assert_eq!(*port, Some(8554));
            assert_eq!(username.as_deref(), Some("admin"));
        }
        other => panic!("expected ip camera, got {:?}", other),
    }

    assert_eq!(cfg.motion.threshold, 30);
    assert_eq!(cfg.motion.min_area, 750.5);
    assert_eq!(cfg.recording.fps, 20);
    // Env override beats the file value.
    assert_eq!(cfg.pacing.frame_interval, Duration::from_millis(10));
    assert_eq!(cfg.pacing.capture_retry, Duration::from_millis(250));
    assert_eq!(cfg.snapshot.interval, Some(Duration::from_secs(60)));
    assert_eq!(cfg.snapshot.quality, 80);
    assert_eq!(cfg.snapshot.dir, std::path::Path::new("/tmp/argus-snaps"));

    clear_env();
}

#[test]
fn missing_file_yields_defaults() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = DaemonConfig::load(None).expect("default config");
    assert_eq!(cfg.cameras.len(), 1);
    assert_eq!(cfg.cameras[0].id, "cam0");
    assert_eq!(cfg.pacing.frame_interval, Duration::from_millis(33));
    assert!(cfg.snapshot.interval.is_none());
    assert!(!cfg.enhance.is_active());

    clear_env();
}

#[test]
fn invalid_env_values_are_errors() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("ARGUS_FRAME_INTERVAL_MS", "not-a-number");
    assert!(DaemonConfig::load(None).is_err());

    clear_env();
}

#[test]
fn unreadable_config_path_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let missing = std::path::Path::new("/nonexistent/argus.json");
    assert!(DaemonConfig::load(Some(missing)).is_err());

    clear_env();
}
