//! Argus — multi-camera surveillance core.
//!
//! One process supervises N independent camera pipelines. Each pipeline
//! pulls frames from its camera, re-tunes exposure and white balance,
//! detects motion, and optionally records video.
//!
//! # Architecture
//!
//! Data flows one way per camera:
//!
//! ```text
//! camera -> 3A controller -> motion detector -> recorder -> display
//! ```
//!
//! - `camera`: capability contract plus USB/IP variants (synthetic
//!   backends keep everything runnable without hardware)
//! - `registry`: thread-safe camera collection, keyed by id
//! - `tuning`: closed-loop auto-exposure / auto-white-balance
//! - `motion`: temporal-difference detection with region extraction
//! - `record`: recording state machine over an MJPEG/AVI sink
//! - `system`: the orchestrator — one monitoring worker per camera,
//!   started and joined as a group
//! - `frame` / `imgproc` / `enhance`: frame model, pixel primitives,
//!   and presentation-side enhancement
//! - `config`: JSON + environment configuration for the `argusd` daemon
//!
//! # Concurrency model
//!
//! One dedicated worker thread per camera, launched by
//! [`SurveillanceSystem::start`] and joined by
//! [`SurveillanceSystem::stop`]. A single atomic running flag is the
//! only cancellation signal. Per-camera state is owned by its worker;
//! display paths read published snapshots, never live pipeline state.

pub mod camera;
pub mod config;
pub mod enhance;
pub mod frame;
pub mod imgproc;
pub mod motion;
pub mod record;
pub mod registry;
pub mod system;
pub mod tuning;

pub use camera::{shared, CameraDevice, IpCamera, SharedCamera, SyntheticCapture, UsbCamera};
pub use config::{CameraKind, CameraSettings, DaemonConfig};
pub use frame::{Frame, Rect};
pub use motion::{MotionAnalysis, MotionDetector};
pub use record::{Codec, MjpegAviSink, RecordingSettings, VideoRecorder, VideoSink};
pub use registry::CameraRegistry;
pub use system::{MonitorPacing, SurveillanceSystem};
pub use tuning::{AeSettings, AwbSettings, ThreeAController};
