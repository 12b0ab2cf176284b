//! MJPEG-in-AVI sink.
//!
//! Minimal RIFF/AVI writer: one `vids`/`MJPG` stream, each frame stored
//! as a JPEG in a `00dc` chunk, with an `idx1` index appended on close.
//! Header fields that depend on the final frame count are written as
//! placeholders and patched when the sink is finished.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use crate::frame::Frame;
use crate::record::VideoSink;

const JPEG_QUALITY: u8 = 85;
const AVIF_HASINDEX: u32 = 0x0000_0010;
const AVIIF_KEYFRAME: u32 = 0x0000_0010;

// Fixed header layout offsets (bytes from start of file).
const POS_RIFF_SIZE: u64 = 4;
const POS_TOTAL_FRAMES: u64 = 48;
const POS_STREAM_LENGTH: u64 = 140;
const POS_SUGGESTED_BUFFER: u64 = 144;
const POS_MOVI_SIZE: u64 = 216;
const POS_MOVI_FOURCC: u64 = 220;

struct IndexEntry {
    offset: u32,
    size: u32,
}

/// AVI file sink encoding frames as Motion JPEG.
pub struct MjpegAviSink {
    file: BufWriter<File>,
    width: u32,
    height: u32,
    index: Vec<IndexEntry>,
    /// Offset of the next chunk relative to the `movi` fourcc.
    next_offset: u32,
    max_chunk: u32,
    finished: bool,
}

impl MjpegAviSink {
    /// Create the output file and write the container headers.
    pub fn create(path: &Path, fps: u32, width: u32, height: u32) -> Result<Self> {
        if fps == 0 {
            return Err(anyhow!("avi sink requires fps > 0"));
        }
        if width == 0 || height == 0 {
            return Err(anyhow!("avi sink requires a non-zero frame size"));
        }
        let file = File::create(path)
            .with_context(|| format!("open video sink {}", path.display()))?;
        let mut sink = Self {
            file: BufWriter::new(file),
            width,
            height,
            index: Vec::new(),
            next_offset: 4,
            max_chunk: 0,
            finished: false,
        };
        sink.write_headers(fps)?;
        Ok(sink)
    }

    fn write_headers(&mut self, fps: u32) -> Result<()> {
        let (w, h) = (self.width, self.height);

        self.file.write_all(b"RIFF")?;
        self.write_u32(0)?; // riff size, patched on finish
        self.file.write_all(b"AVI ")?;

        // hdrl list: avih + one strl.
        self.file.write_all(b"LIST")?;
        self.write_u32(192)?;
        self.file.write_all(b"hdrl")?;

        self.file.write_all(b"avih")?;
        self.write_u32(56)?;
        self.write_u32(1_000_000 / fps)?; // microseconds per frame
        self.write_u32(0)?; // max bytes per second
        self.write_u32(0)?; // padding granularity
        self.write_u32(AVIF_HASINDEX)?;
        self.write_u32(0)?; // total frames, patched on finish
        self.write_u32(0)?; // initial frames
        self.write_u32(1)?; // stream count
        self.write_u32(0)?; // suggested buffer size
        self.write_u32(w)?;
        self.write_u32(h)?;
        for _ in 0..4 {
            self.write_u32(0)?; // reserved
        }

        self.file.write_all(b"LIST")?;
        self.write_u32(116)?;
        self.file.write_all(b"strl")?;

        self.file.write_all(b"strh")?;
        self.write_u32(56)?;
        self.file.write_all(b"vids")?;
        self.file.write_all(b"MJPG")?;
        self.write_u32(0)?; // flags
        self.write_u16(0)?; // priority
        self.write_u16(0)?; // language
        self.write_u32(0)?; // initial frames
        self.write_u32(1)?; // scale
        self.write_u32(fps)?; // rate: fps = rate / scale
        self.write_u32(0)?; // start
        self.write_u32(0)?; // length, patched on finish
        self.write_u32(0)?; // suggested buffer size, patched on finish
        self.write_u32(u32::MAX)?; // quality: default
        self.write_u32(0)?; // sample size: varies per chunk
        for _ in 0..4 {
            self.write_u16(0)?; // rcFrame
        }

        // strf: BITMAPINFOHEADER for the MJPG stream.
        self.file.write_all(b"strf")?;
        self.write_u32(40)?;
        self.write_u32(40)?; // biSize
        self.write_u32(w)?;
        self.write_u32(h)?;
        self.write_u16(1)?; // planes
        self.write_u16(24)?; // bits per pixel
        self.file.write_all(b"MJPG")?; // compression
        self.write_u32(w * h * 3)?; // image size
        self.write_u32(0)?; // x pels per meter
        self.write_u32(0)?; // y pels per meter
        self.write_u32(0)?; // colors used
        self.write_u32(0)?; // colors important

        self.file.write_all(b"LIST")?;
        self.write_u32(0)?; // movi size, patched on finish
        self.file.write_all(b"movi")?;

        Ok(())
    }

    fn write_u32(&mut self, value: u32) -> Result<()> {
        self.file.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    fn write_u16(&mut self, value: u16) -> Result<()> {
        self.file.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    fn patch_u32(&mut self, position: u64, value: u32) -> Result<()> {
        self.file.seek(SeekFrom::Start(position))?;
        self.file.write_all(&value.to_le_bytes())?;
        Ok(())
    }
}

impl VideoSink for MjpegAviSink {
    fn append(&mut self, frame: &Frame) -> Result<()> {
        if self.finished {
            return Err(anyhow!("avi sink already finished"));
        }
        if frame.size() != (self.width, self.height) || frame.channels() != 3 {
            return Err(anyhow!(
                "avi sink expects {}x{} rgb frames, got {}x{}x{}",
                self.width,
                self.height,
                frame.width(),
                frame.height(),
                frame.channels()
            ));
        }

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
            .encode(
                frame.data(),
                frame.width(),
                frame.height(),
                ExtendedColorType::Rgb8,
            )
            .context("encode mjpeg frame")?;

        let size = jpeg.len() as u32;
        self.file.write_all(b"00dc")?;
        self.write_u32(size)?;
        self.file.write_all(&jpeg)?;
        let padded = if size % 2 == 1 {
            self.file.write_all(&[0])?;
            size + 1
        } else {
            size
        };

        self.index.push(IndexEntry {
            offset: self.next_offset,
            size,
        });
        self.next_offset += 8 + padded;
        self.max_chunk = self.max_chunk.max(size);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        self.file.write_all(b"idx1")?;
        self.write_u32(self.index.len() as u32 * 16)?;
        let entries = std::mem::take(&mut self.index);
        for entry in &entries {
            self.file.write_all(b"00dc")?;
            self.write_u32(AVIIF_KEYFRAME)?;
            self.write_u32(entry.offset)?;
            self.write_u32(entry.size)?;
        }

        let frames = entries.len() as u32;
        let movi_size = self.next_offset;
        let total = POS_MOVI_FOURCC + movi_size as u64 + 8 + frames as u64 * 16;

        self.patch_u32(POS_RIFF_SIZE, (total - 8) as u32)?;
        self.patch_u32(POS_TOTAL_FRAMES, frames)?;
        self.patch_u32(POS_STREAM_LENGTH, frames)?;
        self.patch_u32(POS_SUGGESTED_BUFFER, self.max_chunk)?;
        self.patch_u32(POS_MOVI_SIZE, movi_size)?;

        self.file.flush()?;
        Ok(())
    }
}

impl Drop for MjpegAviSink {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_a_well_formed_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.avi");

        let mut sink = MjpegAviSink::create(&path, 10, 32, 24).unwrap();
        for shade in [0u8, 128, 255] {
            sink.append(&Frame::filled(32, 24, 3, shade)).unwrap();
        }
        sink.finish().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"AVI ");
        let riff_size = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        assert_eq!(riff_size as usize, bytes.len() - 8);
        let total_frames = u32::from_le_bytes(bytes[48..52].try_into().unwrap());
        assert_eq!(total_frames, 3);
        assert_eq!(&bytes[POS_MOVI_FOURCC as usize..POS_MOVI_FOURCC as usize + 4], b"movi");
    }

    #[test]
    fn rejects_wrong_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.avi");
        let mut sink = MjpegAviSink::create(&path, 10, 32, 24).unwrap();
        assert!(sink.append(&Frame::filled(16, 16, 3, 0)).is_err());
        assert!(sink.append(&Frame::filled(32, 24, 1, 0)).is_err());
    }

    #[test]
    fn create_fails_on_unwritable_path() {
        let result = MjpegAviSink::create(Path::new("/nonexistent-dir/clip.avi"), 10, 32, 24);
        assert!(result.is_err());
    }

    #[test]
    fn finish_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.avi");
        let mut sink = MjpegAviSink::create(&path, 10, 8, 8).unwrap();
        sink.append(&Frame::filled(8, 8, 3, 1)).unwrap();
        sink.finish().unwrap();
        sink.finish().unwrap();
        assert!(sink.append(&Frame::filled(8, 8, 3, 1)).is_err());
    }
}
