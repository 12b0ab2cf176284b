//! Locally-attached (index-addressed) camera.
//!
//! Without the `capture-nokhwa` feature every capture is served by the
//! synthetic backend, so the rest of the system behaves identically on
//! machines with no video hardware.

use anyhow::{anyhow, Result};

use crate::camera::synthetic::SyntheticCapture;
use crate::camera::{CameraDevice, DEFAULT_FPS, DEFAULT_HEIGHT, DEFAULT_WIDTH};
use crate::frame::Frame;

enum UsbBackend {
    Synthetic(Option<SyntheticCapture>),
    #[cfg(feature = "capture-nokhwa")]
    Nokhwa(Option<nokhwa::Camera>),
}

/// USB/V4L2 camera addressed by device index.
pub struct UsbCamera {
    id: String,
    name: String,
    device_index: u32,
    connected: bool,
    width: u32,
    height: u32,
    fps: u32,
    current: Frame,
    backend: UsbBackend,
}

impl UsbCamera {
    /// Create a camera for the given device index.
    ///
    /// With `capture-nokhwa` enabled this drives real hardware;
    /// otherwise frames come from the synthetic backend.
    pub fn new(id: impl Into<String>, name: impl Into<String>, device_index: u32) -> Self {
        #[cfg(feature = "capture-nokhwa")]
        let backend = UsbBackend::Nokhwa(None);
        #[cfg(not(feature = "capture-nokhwa"))]
        let backend = UsbBackend::Synthetic(None);

        Self {
            id: id.into(),
            name: name.into(),
            device_index,
            connected: false,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            fps: DEFAULT_FPS,
            current: Frame::empty(),
            backend,
        }
    }

    /// Force the synthetic backend regardless of compiled features.
    pub fn synthetic(id: impl Into<String>, name: impl Into<String>, device_index: u32) -> Self {
        let mut camera = Self::new(id, name, device_index);
        camera.backend = UsbBackend::Synthetic(None);
        camera
    }

    pub fn device_index(&self) -> u32 {
        self.device_index
    }

    pub fn set_device_index(&mut self, index: u32) {
        self.device_index = index;
    }

    #[cfg(feature = "capture-nokhwa")]
    fn open_nokhwa(&self) -> Result<nokhwa::Camera> {
        use nokhwa::pixel_format::RgbFormat;
        use nokhwa::utils::{
            CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
            Resolution,
        };

        let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new(
                Resolution::new(self.width, self.height),
                FrameFormat::RAWRGB,
                self.fps,
            ),
        ));
        let mut camera = nokhwa::Camera::new(CameraIndex::Index(self.device_index), format)
            .map_err(|e| anyhow!("open usb camera {}: {}", self.device_index, e))?;
        camera
            .open_stream()
            .map_err(|e| anyhow!("start usb stream {}: {}", self.device_index, e))?;
        Ok(camera)
    }
}

impl CameraDevice for UsbCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn fps(&self) -> u32 {
        self.fps
    }

    fn set_resolution(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    fn set_fps(&mut self, fps: u32) {
        self.fps = fps;
    }

    fn connect(&mut self) -> Result<()> {
        if self.connected {
            return Ok(());
        }
        match &self.backend {
            UsbBackend::Synthetic(_) => {
                self.backend = UsbBackend::Synthetic(Some(
                    SyntheticCapture::new(self.width, self.height).with_noise(2),
                ));
                log::info!("usb camera '{}' connected (synthetic)", self.name);
            }
            #[cfg(feature = "capture-nokhwa")]
            UsbBackend::Nokhwa(_) => {
                self.backend = UsbBackend::Nokhwa(Some(self.open_nokhwa()?));
                log::info!(
                    "usb camera '{}' connected (device {})",
                    self.name,
                    self.device_index
                );
            }
        }
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        if !self.connected {
            return Ok(());
        }
        match &mut self.backend {
            UsbBackend::Synthetic(capture) => {
                *capture = None;
            }
            #[cfg(feature = "capture-nokhwa")]
            UsbBackend::Nokhwa(camera) => {
                if let Some(mut cam) = camera.take() {
                    let _ = cam.stop_stream();
                }
            }
        }
        self.connected = false;
        log::info!("usb camera '{}' disconnected", self.name);
        Ok(())
    }

    fn capture_frame(&mut self) -> bool {
        if !self.connected {
            return false;
        }
        match &mut self.backend {
            UsbBackend::Synthetic(Some(capture)) => {
                self.current = capture.next_frame();
                true
            }
            UsbBackend::Synthetic(None) => false,
            #[cfg(feature = "capture-nokhwa")]
            UsbBackend::Nokhwa(Some(camera)) => {
                use nokhwa::pixel_format::RgbFormat;
                let buffer = match camera.frame() {
                    Ok(buffer) => buffer,
                    Err(e) => {
                        log::warn!("usb camera '{}' capture failed: {}", self.name, e);
                        return false;
                    }
                };
                let decoded = match buffer.decode_image::<RgbFormat>() {
                    Ok(decoded) => decoded,
                    Err(e) => {
                        log::warn!("usb camera '{}' decode failed: {}", self.name, e);
                        return false;
                    }
                };
                let (width, height) = (decoded.width(), decoded.height());
                match Frame::from_raw(decoded.into_raw(), width, height, 3) {
                    Ok(frame) => {
                        self.current = frame;
                        true
                    }
                    Err(e) => {
                        log::warn!("usb camera '{}' produced a bad frame: {}", self.name, e);
                        false
                    }
                }
            }
            #[cfg(feature = "capture-nokhwa")]
            UsbBackend::Nokhwa(None) => false,
        }
    }

    fn is_available(&self) -> bool {
        match &self.backend {
            UsbBackend::Synthetic(capture) => capture.is_some(),
            #[cfg(feature = "capture-nokhwa")]
            UsbBackend::Nokhwa(camera) => camera.is_some(),
        }
    }

    fn frame(&self) -> Frame {
        self.current.clone()
    }
}

impl Drop for UsbCamera {
    fn drop(&mut self) {
        let _ = self.disconnect();
    }
}
