//! Frame model.
//!
//! `Frame` is the unit of data flowing through every pipeline stage:
//! capture produces one, the 3A controller measures it, the motion
//! detector diffs it, the recorder serializes it.
//!
//! Frames are owned, interleaved, 8-bit buffers. Channel counts in use:
//! - 1: grayscale intensity
//! - 3: RGB
//! - 4: RGBA (normalized to RGB before recording)
//!
//! An empty frame (`Frame::empty()`) models "no frame captured yet"; every
//! consumer checks `is_empty()` before doing pixel work.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

/// Axis-aligned rectangle in pixel coordinates.
///
/// Used for motion regions and display overlays. `x`/`y` is the top-left
/// corner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Returns true when `other` lies entirely inside this rectangle.
    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.x + other.width <= self.x + self.width
            && other.y + other.height <= self.y + self.height
    }
}

/// Owned interleaved 8-bit image buffer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
}

impl Frame {
    /// Create a frame from raw interleaved pixel data.
    ///
    /// Fails when the buffer length does not match the declared geometry
    /// or the channel count is unsupported.
    pub fn from_raw(data: Vec<u8>, width: u32, height: u32, channels: u8) -> Result<Self> {
        if !matches!(channels, 1 | 3 | 4) {
            return Err(anyhow!("unsupported channel count: {}", channels));
        }
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(anyhow!(
                "frame buffer length {} does not match {}x{}x{}",
                data.len(),
                width,
                height,
                channels
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            channels,
        })
    }

    /// A frame with every sample set to `value`.
    pub fn filled(width: u32, height: u32, channels: u8, value: u8) -> Self {
        let len = width as usize * height as usize * channels as usize;
        Self {
            data: vec![value; len],
            width,
            height,
            channels,
        }
    }

    /// The "no frame" sentinel.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    #[inline]
    pub fn sample(&self, x: u32, y: u32, channel: u8) -> u8 {
        let idx = (y as usize * self.width as usize + x as usize) * self.channels as usize
            + channel as usize;
        self.data[idx]
    }

    #[inline]
    pub fn set_sample(&mut self, x: u32, y: u32, channel: u8, value: u8) {
        let idx = (y as usize * self.width as usize + x as usize) * self.channels as usize
            + channel as usize;
        self.data[idx] = value;
    }

    /// Encode this frame as a JPEG snapshot.
    ///
    /// Grayscale and RGB frames are written directly; RGBA drops alpha.
    pub fn save_jpeg(&self, path: &Path, quality: u8) -> Result<()> {
        if self.is_empty() {
            return Err(anyhow!("cannot save an empty frame"));
        }
        let file = File::create(path)
            .with_context(|| format!("create snapshot file {}", path.display()))?;
        let writer = BufWriter::new(file);
        let mut encoder = JpegEncoder::new_with_quality(writer, quality);

        match self.channels {
            1 => encoder
                .encode(&self.data, self.width, self.height, ExtendedColorType::L8)
                .context("encode grayscale jpeg")?,
            3 => encoder
                .encode(&self.data, self.width, self.height, ExtendedColorType::Rgb8)
                .context("encode rgb jpeg")?,
            4 => {
                let rgb: Vec<u8> = self
                    .data
                    .chunks_exact(4)
                    .flat_map(|px| [px[0], px[1], px[2]])
                    .collect();
                encoder
                    .encode(&rgb, self.width, self.height, ExtendedColorType::Rgb8)
                    .context("encode rgba jpeg")?;
            }
            other => return Err(anyhow!("unsupported channel count: {}", other)),
        }
        Ok(())
    }
}
