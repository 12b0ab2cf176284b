//! Daemon configuration.
//!
//! Layered the usual way: JSON config file (optional), then `ARGUS_*`
//! environment overrides, then validation. The embedding application may
//! also assemble `DaemonConfig` programmatically and skip files
//! entirely.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::camera::{shared, CameraDevice, IpCamera, SharedCamera, UsbCamera};
use crate::record::Codec;
use crate::system::MonitorPacing;

const DEFAULT_FRAME_INTERVAL_MS: u64 = 33;
const DEFAULT_CAPTURE_RETRY_MS: u64 = 100;
const DEFAULT_MOTION_THRESHOLD: i32 = 25;
const DEFAULT_MOTION_MIN_AREA: f64 = 500.0;
const DEFAULT_RECORD_DIR: &str = "recordings";
const DEFAULT_SNAPSHOT_DIR: &str = "snapshots";
const DEFAULT_SNAPSHOT_QUALITY: u8 = 90;
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_FPS: u32 = 30;

#[derive(Debug, Deserialize, Default)]
struct DaemonConfigFile {
    cameras: Option<Vec<CameraEntryFile>>,
    motion: Option<MotionConfigFile>,
    recording: Option<RecordingConfigFile>,
    pacing: Option<PacingConfigFile>,
    snapshot: Option<SnapshotConfigFile>,
    enhance: Option<EnhanceConfigFile>,
}

#[derive(Debug, Deserialize)]
struct CameraEntryFile {
    id: String,
    name: Option<String>,
    kind: String,
    device_index: Option<u32>,
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    stream_url: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<u32>,
    motion: Option<bool>,
    record: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct MotionConfigFile {
    threshold: Option<i32>,
    min_area: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct RecordingConfigFile {
    dir: Option<PathBuf>,
    fps: Option<u32>,
    codec: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct PacingConfigFile {
    frame_interval_ms: Option<u64>,
    capture_retry_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct SnapshotConfigFile {
    dir: Option<PathBuf>,
    interval_secs: Option<u64>,
    quality: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
struct EnhanceConfigFile {
    contrast_alpha: Option<f64>,
    contrast_beta: Option<f64>,
    saturation: Option<f64>,
    sharpen_amount: Option<f64>,
}

/// Connection addressing for one configured camera.
#[derive(Clone, Debug, PartialEq)]
pub enum CameraKind {
    Usb {
        device_index: u32,
    },
    Ip {
        host: String,
        port: Option<u16>,
        username: Option<String>,
        password: Option<String>,
        stream_url: Option<String>,
    },
}

/// One camera definition from configuration.
#[derive(Clone, Debug)]
pub struct CameraSettings {
    pub id: String,
    pub name: String,
    pub kind: CameraKind,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Enable motion detection for this camera at startup.
    pub motion: bool,
    /// Start recording this camera at startup.
    pub record: bool,
}

impl CameraSettings {
    /// Construct the camera device this definition describes.
    pub fn build_camera(&self) -> SharedCamera {
        match &self.kind {
            CameraKind::Usb { device_index } => {
                let mut camera = UsbCamera::new(&self.id, &self.name, *device_index);
                camera.set_resolution(self.width, self.height);
                camera.set_fps(self.fps);
                shared(camera)
            }
            CameraKind::Ip {
                host,
                port,
                username,
                password,
                stream_url,
            } => {
                let mut camera = IpCamera::new(&self.id, &self.name, host.clone());
                if let Some(port) = port {
                    camera = camera.with_port(*port);
                }
                if let (Some(user), Some(pass)) = (username, password) {
                    camera.set_credentials(user.clone(), pass.clone());
                }
                if let Some(url) = stream_url {
                    camera.set_stream_url(url.clone());
                }
                camera.set_resolution(self.width, self.height);
                camera.set_fps(self.fps);
                shared(camera)
            }
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct MotionSettings {
    pub threshold: i32,
    pub min_area: f64,
}

#[derive(Clone, Debug)]
pub struct RecordingDefaults {
    pub dir: PathBuf,
    pub fps: u32,
    pub codec: Codec,
}

#[derive(Clone, Debug)]
pub struct SnapshotSettings {
    pub dir: PathBuf,
    /// None disables periodic snapshots.
    pub interval: Option<Duration>,
    pub quality: u8,
}

/// Optional presentation-side enhancement applied to snapshots.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnhanceSettings {
    pub contrast_alpha: Option<f64>,
    pub contrast_beta: Option<f64>,
    pub saturation: Option<f64>,
    pub sharpen_amount: Option<f64>,
}

impl EnhanceSettings {
    pub fn is_active(&self) -> bool {
        self.contrast_alpha.is_some()
            || self.contrast_beta.is_some()
            || self.saturation.is_some()
            || self.sharpen_amount.is_some()
    }
}

#[derive(Clone, Debug)]
pub struct DaemonConfig {
    pub cameras: Vec<CameraSettings>,
    pub motion: MotionSettings,
    pub recording: RecordingDefaults,
    pub pacing: MonitorPacing,
    pub snapshot: SnapshotSettings,
    pub enhance: EnhanceSettings,
}

impl DaemonConfig {
    /// Load configuration: file named by `path` (or `ARGUS_CONFIG` when
    /// absent), then environment overrides, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var("ARGUS_CONFIG").ok().map(PathBuf::from);
        let file_cfg = match path.or(env_path.as_deref()) {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: DaemonConfigFile) -> Result<Self> {
        let cameras = match file.cameras {
            Some(entries) => entries
                .into_iter()
                .map(camera_from_entry)
                .collect::<Result<Vec<_>>>()?,
            // Out-of-the-box default: one synthetic local camera.
            None => vec![CameraSettings {
                id: "cam0".to_string(),
                name: "Default camera".to_string(),
                kind: CameraKind::Usb { device_index: 0 },
                width: DEFAULT_WIDTH,
                height: DEFAULT_HEIGHT,
                fps: DEFAULT_FPS,
                motion: true,
                record: false,
            }],
        };

        let motion = MotionSettings {
            threshold: file
                .motion
                .as_ref()
                .and_then(|m| m.threshold)
                .unwrap_or(DEFAULT_MOTION_THRESHOLD),
            min_area: file
                .motion
                .as_ref()
                .and_then(|m| m.min_area)
                .unwrap_or(DEFAULT_MOTION_MIN_AREA),
        };

        let recording = RecordingDefaults {
            dir: file
                .recording
                .as_ref()
                .and_then(|r| r.dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RECORD_DIR)),
            fps: file
                .recording
                .as_ref()
                .and_then(|r| r.fps)
                .unwrap_or(DEFAULT_FPS),
            codec: match file.recording.as_ref().and_then(|r| r.codec.as_deref()) {
                Some(codec) => codec.parse()?,
                None => Codec::Mjpeg,
            },
        };

        let pacing = MonitorPacing {
            frame_interval: Duration::from_millis(
                file.pacing
                    .as_ref()
                    .and_then(|p| p.frame_interval_ms)
                    .unwrap_or(DEFAULT_FRAME_INTERVAL_MS),
            ),
            capture_retry: Duration::from_millis(
                file.pacing
                    .as_ref()
                    .and_then(|p| p.capture_retry_ms)
                    .unwrap_or(DEFAULT_CAPTURE_RETRY_MS),
            ),
        };

        let snapshot = SnapshotSettings {
            dir: file
                .snapshot
                .as_ref()
                .and_then(|s| s.dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_DIR)),
            interval: file
                .snapshot
                .as_ref()
                .and_then(|s| s.interval_secs)
                .filter(|&secs| secs > 0)
                .map(Duration::from_secs),
            quality: file
                .snapshot
                .as_ref()
                .and_then(|s| s.quality)
                .unwrap_or(DEFAULT_SNAPSHOT_QUALITY),
        };

        let enhance = match file.enhance {
            Some(e) => EnhanceSettings {
                contrast_alpha: e.contrast_alpha,
                contrast_beta: e.contrast_beta,
                saturation: e.saturation,
                sharpen_amount: e.sharpen_amount,
            },
            None => EnhanceSettings::default(),
        };

        Ok(Self {
            cameras,
            motion,
            recording,
            pacing,
            snapshot,
            enhance,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var("ARGUS_FRAME_INTERVAL_MS") {
            let ms: u64 = value
                .parse()
                .map_err(|_| anyhow!("ARGUS_FRAME_INTERVAL_MS must be an integer"))?;
            self.pacing.frame_interval = Duration::from_millis(ms);
        }
        if let Ok(value) = std::env::var("ARGUS_CAPTURE_RETRY_MS") {
            let ms: u64 = value
                .parse()
                .map_err(|_| anyhow!("ARGUS_CAPTURE_RETRY_MS must be an integer"))?;
            self.pacing.capture_retry = Duration::from_millis(ms);
        }
        if let Ok(dir) = std::env::var("ARGUS_RECORD_DIR") {
            if !dir.trim().is_empty() {
                self.recording.dir = PathBuf::from(dir);
            }
        }
        if let Ok(dir) = std::env::var("ARGUS_SNAPSHOT_DIR") {
            if !dir.trim().is_empty() {
                self.snapshot.dir = PathBuf::from(dir);
            }
        }
        if let Ok(value) = std::env::var("ARGUS_SNAPSHOT_SECS") {
            let secs: u64 = value
                .parse()
                .map_err(|_| anyhow!("ARGUS_SNAPSHOT_SECS must be an integer"))?;
            self.snapshot.interval = (secs > 0).then(|| Duration::from_secs(secs));
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.cameras.is_empty() {
            return Err(anyhow!("configuration defines no cameras"));
        }
        let mut seen = std::collections::HashSet::new();
        for camera in &self.cameras {
            if camera.id.trim().is_empty() {
                return Err(anyhow!("camera id must not be empty"));
            }
            if !seen.insert(camera.id.clone()) {
                return Err(anyhow!("duplicate camera id '{}'", camera.id));
            }
            if camera.fps == 0 {
                return Err(anyhow!("camera '{}' fps must be greater than zero", camera.id));
            }
            if camera.width == 0 || camera.height == 0 {
                return Err(anyhow!(
                    "camera '{}' resolution must be non-zero",
                    camera.id
                ));
            }
        }
        if self.recording.fps == 0 {
            return Err(anyhow!("recording fps must be greater than zero"));
        }
        if self.pacing.frame_interval.is_zero() {
            return Err(anyhow!("frame interval must be greater than zero"));
        }
        Ok(())
    }
}

fn camera_from_entry(entry: CameraEntryFile) -> Result<CameraSettings> {
    let kind = match entry.kind.to_ascii_lowercase().as_str() {
        "usb" | "local" => CameraKind::Usb {
            device_index: entry.device_index.unwrap_or(0),
        },
        "ip" | "rtsp" => CameraKind::Ip {
            host: entry
                .host
                .clone()
                .or_else(|| entry.stream_url.clone())
                .ok_or_else(|| anyhow!("ip camera '{}' requires a host or stream_url", entry.id))?,
            port: entry.port,
            username: entry.username,
            password: entry.password,
            stream_url: entry.stream_url,
        },
        other => {
            return Err(anyhow!(
                "camera '{}' has unknown kind '{}' (expected usb or ip)",
                entry.id,
                other
            ))
        }
    };

    Ok(CameraSettings {
        name: entry.name.unwrap_or_else(|| entry.id.clone()),
        id: entry.id,
        kind,
        width: entry.width.unwrap_or(DEFAULT_WIDTH),
        height: entry.height.unwrap_or(DEFAULT_HEIGHT),
        fps: entry.fps.unwrap_or(DEFAULT_FPS),
        motion: entry.motion.unwrap_or(false),
        record: entry.record.unwrap_or(false),
    })
}

fn read_config_file(path: &Path) -> Result<DaemonConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
