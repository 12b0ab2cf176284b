//! Synthetic capture backend.
//!
//! Generates a deterministic scene so every pipeline stage can run
//! without camera hardware: a shaded background with a bright block that
//! relocates every couple of seconds (enough change for the motion
//! detector to fire periodically). Optional per-pixel sensor noise
//! exercises the smoothing stages of the 3A controller.

use rand::Rng;

use crate::frame::Frame;

/// How many frames a scene holds still before the block moves.
const SCENE_HOLD_FRAMES: u64 = 50;

const BLOCK_SIZE: u32 = 48;

/// Deterministic frame generator used by both camera variants when no
/// hardware backend is compiled in.
pub struct SyntheticCapture {
    width: u32,
    height: u32,
    frame_count: u64,
    noise_amplitude: u8,
}

impl SyntheticCapture {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame_count: 0,
            noise_amplitude: 0,
        }
    }

    /// Add uniform sensor noise of the given amplitude to every sample.
    pub fn with_noise(mut self, amplitude: u8) -> Self {
        self.noise_amplitude = amplitude;
        self
    }

    pub fn frames_generated(&self) -> u64 {
        self.frame_count
    }

    /// Produce the next RGB frame of the scene.
    pub fn next_frame(&mut self) -> Frame {
        let (w, h) = (self.width, self.height);
        let scene = self.frame_count / SCENE_HOLD_FRAMES;

        // Block walks a coarse grid so consecutive scenes differ by a
        // solid region, not single pixels.
        let block_x = ((scene * 97) % (w.saturating_sub(BLOCK_SIZE).max(1)) as u64) as u32;
        let block_y = ((scene * 61) % (h.saturating_sub(BLOCK_SIZE).max(1)) as u64) as u32;

        let mut data = Vec::with_capacity(w as usize * h as usize * 3);
        let mut rng = rand::thread_rng();
        for y in 0..h {
            for x in 0..w {
                let in_block = x >= block_x
                    && x < block_x + BLOCK_SIZE
                    && y >= block_y
                    && y < block_y + BLOCK_SIZE;
                let base = if in_block {
                    230
                } else {
                    // Horizontal shading gradient.
                    (40 + (x * 60 / w.max(1))) as u8
                };
                for channel_bias in [0u8, 8, 16] {
                    let mut value = base.saturating_add(channel_bias);
                    if self.noise_amplitude > 0 {
                        let noise = rng.gen_range(0..=self.noise_amplitude as i16 * 2)
                            - self.noise_amplitude as i16;
                        value = (value as i16 + noise).clamp(0, 255) as u8;
                    }
                    data.push(value);
                }
            }
        }

        self.frame_count += 1;
        Frame::from_raw(data, w, h, 3).expect("synthetic geometry is consistent")
    }
}
