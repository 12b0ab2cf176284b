//! Camera capability contract and device variants.
//!
//! Every camera exposes the same capability set:
//! - `connect` / `disconnect`: synchronous session management
//! - `capture_frame`: pull one frame into the device's current slot
//!   (returns true iff a new frame is now available via `frame()`)
//! - `is_available`: liveness of the underlying transport
//! - `frame`: clone of the most recently captured frame, empty if none
//!
//! Variants own their connection parameters privately:
//! - [`UsbCamera`]: locally-attached, index-addressed
//! - [`IpCamera`]: network-streamed, URL-addressed, optional credentials
//!
//! Both fall back to a deterministic synthetic capture backend when no
//! hardware integration is compiled in (or when addressed as `stub://`),
//! so the full pipeline is exercisable without devices. Real capture is
//! feature-gated: `capture-nokhwa` for local devices, `rtsp-gstreamer`
//! for network streams.

pub mod ip;
pub mod synthetic;
pub mod usb;

pub use ip::IpCamera;
pub use synthetic::SyntheticCapture;
pub use usb::UsbCamera;

use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::frame::Frame;

pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 480;
pub const DEFAULT_FPS: u32 = 30;

/// Capability contract consumed by the registry and the orchestrator.
pub trait CameraDevice: Send {
    /// Stable identifier; the registry key.
    fn id(&self) -> &str;

    /// Human-readable display name.
    fn name(&self) -> &str;

    fn is_connected(&self) -> bool;

    /// Nominal capture resolution.
    fn resolution(&self) -> (u32, u32);

    /// Nominal frame rate.
    fn fps(&self) -> u32;

    fn set_resolution(&mut self, width: u32, height: u32);

    fn set_fps(&mut self, fps: u32);

    /// Open the underlying transport. Idempotent when already connected.
    fn connect(&mut self) -> Result<()>;

    /// Close the underlying transport. Idempotent when already closed.
    fn disconnect(&mut self) -> Result<()>;

    /// Pull the next frame. Returns true iff a new frame is now
    /// available via `frame()`. A false return is a transient failure,
    /// not a terminal condition.
    fn capture_frame(&mut self) -> bool;

    /// Whether the underlying transport is currently usable.
    fn is_available(&self) -> bool;

    /// Clone of the most recently captured frame; empty if none yet.
    fn frame(&self) -> Frame;
}

/// How cameras are shared between the registry and monitoring workers.
pub type SharedCamera = Arc<Mutex<dyn CameraDevice>>;

/// Wrap a concrete device for registration.
pub fn shared(camera: impl CameraDevice + 'static) -> SharedCamera {
    Arc::new(Mutex::new(camera))
}
