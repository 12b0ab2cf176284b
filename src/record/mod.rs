//! Video recording.
//!
//! `VideoRecorder` is a two-state machine (idle ⇄ recording) owning at
//! most one open `VideoSink`. Starting while a recording is active fails
//! without touching the active session; stopping while idle is a
//! success-no-op; dropping a recorder stops it.
//!
//! Encoding is behind the `VideoSink` trait. The built-in sink writes
//! MJPEG-in-AVI (`avi` module) so recordings need no external encoder
//! process.

mod avi;

pub use avi::MjpegAviSink;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, Result};

use crate::frame::Frame;
use crate::imgproc;

/// Codec identifier for a recording session.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Codec {
    /// Motion JPEG: one JPEG image per frame in an AVI container.
    #[default]
    Mjpeg,
}

impl Codec {
    pub fn fourcc(&self) -> [u8; 4] {
        match self {
            Codec::Mjpeg => *b"MJPG",
        }
    }
}

impl FromStr for Codec {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "mjpg" | "mjpeg" => Ok(Codec::Mjpeg),
            other => Err(anyhow!("unknown codec '{}'", other)),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Codec::Mjpeg => write!(f, "MJPG"),
        }
    }
}

/// Parameters of an active recording session.
#[derive(Clone, Debug)]
pub struct RecordingSettings {
    pub path: PathBuf,
    pub fps: u32,
    pub frame_size: (u32, u32),
    pub codec: Codec,
}

/// Encoding seam: anything that accepts normalized RGB frames.
pub trait VideoSink: Send {
    fn append(&mut self, frame: &Frame) -> Result<()>;
    fn finish(&mut self) -> Result<()>;
}

/// Per-camera recording state machine.
#[derive(Default)]
pub struct VideoRecorder {
    sink: Option<Box<dyn VideoSink>>,
    settings: Option<RecordingSettings>,
}

impl VideoRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_recording(&self) -> bool {
        self.sink.is_some()
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.settings.as_ref().map(|s| s.path.as_path())
    }

    pub fn settings(&self) -> Option<&RecordingSettings> {
        self.settings.as_ref()
    }

    /// Open a sink and transition to recording.
    ///
    /// Fails (leaving any active session untouched) when already
    /// recording; fails and remains idle when the sink cannot be opened.
    pub fn start_recording(
        &mut self,
        path: &Path,
        fps: u32,
        frame_size: (u32, u32),
        codec: Codec,
    ) -> Result<()> {
        let (width, height) = frame_size;
        let sink: Box<dyn VideoSink> = match codec {
            Codec::Mjpeg => Box::new(MjpegAviSink::create(path, fps, width, height)?),
        };
        self.start_with_sink(
            sink,
            RecordingSettings {
                path: path.to_path_buf(),
                fps,
                frame_size,
                codec,
            },
        )
    }

    /// Start recording into a caller-supplied sink.
    pub fn start_with_sink(
        &mut self,
        sink: Box<dyn VideoSink>,
        settings: RecordingSettings,
    ) -> Result<()> {
        if self.is_recording() {
            return Err(anyhow!(
                "already recording to {}; stop the current recording first",
                self.settings
                    .as_ref()
                    .map(|s| s.path.display().to_string())
                    .unwrap_or_default()
            ));
        }
        if settings.fps == 0 {
            return Err(anyhow!("recording fps must be greater than zero"));
        }
        let (width, height) = settings.frame_size;
        if width == 0 || height == 0 {
            return Err(anyhow!("recording frame size must be non-zero"));
        }

        log::info!("started recording to {}", settings.path.display());
        self.sink = Some(sink);
        self.settings = Some(settings);
        Ok(())
    }

    /// Append one frame to the active recording.
    ///
    /// The frame is normalized to three channels and resized to the
    /// recording frame size before encoding.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let (Some(sink), Some(settings)) = (self.sink.as_mut(), self.settings.as_ref()) else {
            return Err(anyhow!("not recording"));
        };
        if frame.is_empty() {
            return Err(anyhow!("refusing to record an empty frame"));
        }

        let mut rgb = imgproc::to_rgb(frame);
        let (width, height) = settings.frame_size;
        if rgb.size() != (width, height) {
            rgb = imgproc::resize(&rgb, width, height);
        }

        sink.append(&rgb)
    }

    /// Close the sink and return to idle. Idempotent.
    pub fn stop_recording(&mut self) -> Result<()> {
        let Some(mut sink) = self.sink.take() else {
            return Ok(());
        };
        let result = sink.finish();
        if let Some(settings) = &self.settings {
            log::info!("stopped recording {}", settings.path.display());
        }
        result
    }
}

impl Drop for VideoRecorder {
    fn drop(&mut self) {
        if let Err(e) = self.stop_recording() {
            log::warn!("recorder drop: failed to close sink: {}", e);
        }
    }
}
