//! Pixel primitives.
//!
//! Leaf image operations consumed by the motion, tuning, recording, and
//! display layers. All semantics assume 8-bit-per-channel samples in
//! [0,255]. Borders are handled by clamping coordinates into the image,
//! so kernels never shrink near edges.
//!
//! Nothing in this module keeps state; every function is a pure
//! buffer-in/buffer-out transform (or an in-place mutation taking
//! `&mut Frame`).

use anyhow::{anyhow, Result};

use crate::frame::{Frame, Rect};

/// A connected component of a binary mask.
#[derive(Clone, Copy, Debug)]
pub struct Region {
    pub bbox: Rect,
    pub area: u64,
}

/// Convert any supported frame to single-channel intensity.
///
/// RGB/RGBA use the standard luminance weights; alpha is ignored.
/// Grayscale input is returned as a copy.
pub fn to_grayscale(frame: &Frame) -> Frame {
    if frame.is_empty() || frame.channels() == 1 {
        return frame.clone();
    }
    let (width, height) = frame.size();
    let step = frame.channels() as usize;
    let data = frame
        .data()
        .chunks_exact(step)
        .map(|px| {
            let lum = 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32;
            lum.round().clamp(0.0, 255.0) as u8
        })
        .collect();
    Frame::from_raw(data, width, height, 1).expect("grayscale geometry is consistent")
}

fn gaussian_kernel(size: usize, sigma: f32) -> Vec<f32> {
    let center = (size / 2) as i32;
    let mut kernel: Vec<f32> = (0..size as i32)
        .map(|i| {
            let d = (i - center) as f32;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    for w in &mut kernel {
        *w /= sum;
    }
    kernel
}

/// Separable Gaussian blur on a grayscale frame.
///
/// `size` must be odd. Edges clamp to the nearest valid pixel.
pub fn gaussian_blur(gray: &Frame, size: usize, sigma: f32) -> Frame {
    if gray.is_empty() {
        return Frame::empty();
    }
    debug_assert_eq!(gray.channels(), 1);
    debug_assert_eq!(size % 2, 1, "blur kernel size must be odd");

    let kernel = gaussian_kernel(size, sigma);
    let center = (size / 2) as i64;
    let (width, height) = gray.size();
    let (w, h) = (width as i64, height as i64);
    let src = gray.data();

    // Horizontal pass.
    let mut tmp = vec![0f32; src.len()];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0f32;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = (x + k as i64 - center).clamp(0, w - 1);
                acc += src[(y * w + sx) as usize] as f32 * weight;
            }
            tmp[(y * w + x) as usize] = acc;
        }
    }

    // Vertical pass.
    let mut out = vec![0u8; src.len()];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0f32;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = (y + k as i64 - center).clamp(0, h - 1);
                acc += tmp[(sy * w + x) as usize] * weight;
            }
            out[(y * w + x) as usize] = acc.round().clamp(0.0, 255.0) as u8;
        }
    }

    Frame::from_raw(out, width, height, 1).expect("blur geometry is consistent")
}

/// Per-pixel absolute difference of two same-sized grayscale frames.
pub fn absdiff(a: &Frame, b: &Frame) -> Result<Frame> {
    if a.size() != b.size() || a.channels() != b.channels() {
        return Err(anyhow!(
            "absdiff geometry mismatch: {:?}x{} vs {:?}x{}",
            a.size(),
            a.channels(),
            b.size(),
            b.channels()
        ));
    }
    let data = a
        .data()
        .iter()
        .zip(b.data())
        .map(|(&pa, &pb)| pa.abs_diff(pb))
        .collect();
    Frame::from_raw(data, a.width(), a.height(), a.channels())
}

/// Binarize: samples strictly above `threshold` become 255, the rest 0.
pub fn threshold_binary(gray: &Frame, threshold: u8) -> Frame {
    let data = gray
        .data()
        .iter()
        .map(|&p| if p > threshold { 255 } else { 0 })
        .collect();
    Frame::from_raw(data, gray.width(), gray.height(), gray.channels())
        .expect("threshold geometry is consistent")
}

/// Morphological dilation of a binary mask with a square kernel.
///
/// `kernel` is the full side length (5 reproduces a 5x5 rectangular
/// structuring element); `iterations` repeats the dilation.
pub fn dilate(mask: &Frame, kernel: u32, iterations: u32) -> Frame {
    if mask.is_empty() {
        return Frame::empty();
    }
    debug_assert_eq!(mask.channels(), 1);
    let reach = (kernel / 2) as i64;
    let (width, height) = mask.size();
    let (w, h) = (width as i64, height as i64);

    let mut current = mask.data().to_vec();
    for _ in 0..iterations {
        let mut next = vec![0u8; current.len()];
        for y in 0..h {
            for x in 0..w {
                'probe: for dy in -reach..=reach {
                    for dx in -reach..=reach {
                        let sx = (x + dx).clamp(0, w - 1);
                        let sy = (y + dy).clamp(0, h - 1);
                        if current[(sy * w + sx) as usize] != 0 {
                            next[(y * w + x) as usize] = 255;
                            break 'probe;
                        }
                    }
                }
            }
        }
        current = next;
    }

    Frame::from_raw(current, width, height, 1).expect("dilate geometry is consistent")
}

/// Extract 8-connected components of a binary mask.
///
/// Returns one `Region` per component with its bounding box and pixel
/// area, in scan order of each component's first pixel.
pub fn connected_regions(mask: &Frame) -> Vec<Region> {
    if mask.is_empty() {
        return Vec::new();
    }
    debug_assert_eq!(mask.channels(), 1);
    let (width, height) = mask.size();
    let (w, h) = (width as i64, height as i64);
    let src = mask.data();
    let mut visited = vec![false; src.len()];
    let mut regions = Vec::new();
    let mut stack = Vec::new();

    for start in 0..src.len() {
        if src[start] == 0 || visited[start] {
            continue;
        }

        let (mut min_x, mut min_y) = ((start as i64) % w, (start as i64) / w);
        let (mut max_x, mut max_y) = (min_x, min_y);
        let mut area = 0u64;

        visited[start] = true;
        stack.push(start as i64);
        while let Some(idx) = stack.pop() {
            let (x, y) = (idx % w, idx / w);
            area += 1;
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);

            for dy in -1..=1i64 {
                for dx in -1..=1i64 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let (nx, ny) = (x + dx, y + dy);
                    if nx < 0 || ny < 0 || nx >= w || ny >= h {
                        continue;
                    }
                    let nidx = (ny * w + nx) as usize;
                    if src[nidx] != 0 && !visited[nidx] {
                        visited[nidx] = true;
                        stack.push(nidx as i64);
                    }
                }
            }
        }

        regions.push(Region {
            bbox: Rect::new(
                min_x as u32,
                min_y as u32,
                (max_x - min_x + 1) as u32,
                (max_y - min_y + 1) as u32,
            ),
            area,
        });
    }

    regions
}

/// Mean sample value of a whole grayscale frame.
pub fn mean_intensity(gray: &Frame) -> f64 {
    if gray.is_empty() {
        return 0.0;
    }
    let sum: u64 = gray.data().iter().map(|&p| p as u64).sum();
    sum as f64 / gray.data().len() as f64
}

/// Mean intensity over a sub-rectangle, clipped to the frame bounds.
pub fn mean_intensity_region(gray: &Frame, region: Rect) -> f64 {
    if gray.is_empty() {
        return 0.0;
    }
    debug_assert_eq!(gray.channels(), 1);
    let x0 = region.x.min(gray.width());
    let y0 = region.y.min(gray.height());
    let x1 = (region.x + region.width).min(gray.width());
    let y1 = (region.y + region.height).min(gray.height());
    if x0 >= x1 || y0 >= y1 {
        return 0.0;
    }

    let mut sum = 0u64;
    for y in y0..y1 {
        for x in x0..x1 {
            sum += gray.sample(x, y, 0) as u64;
        }
    }
    sum as f64 / ((x1 - x0) as u64 * (y1 - y0) as u64) as f64
}

/// Per-channel means of an RGB/RGBA frame as `[red, green, blue]`.
pub fn channel_means(frame: &Frame) -> [f64; 3] {
    if frame.is_empty() || frame.channels() < 3 {
        let mean = mean_intensity(frame);
        return [mean, mean, mean];
    }
    let step = frame.channels() as usize;
    let mut sums = [0u64; 3];
    for px in frame.data().chunks_exact(step) {
        sums[0] += px[0] as u64;
        sums[1] += px[1] as u64;
        sums[2] += px[2] as u64;
    }
    let count = (frame.data().len() / step) as f64;
    [
        sums[0] as f64 / count,
        sums[1] as f64 / count,
        sums[2] as f64 / count,
    ]
}

/// Scale the red and blue channels in place, saturating at 255.
///
/// Green (and alpha, when present) is untouched; luminance is not
/// renormalized.
pub fn scale_red_blue(frame: &mut Frame, red_gain: f64, blue_gain: f64) {
    if frame.channels() < 3 {
        return;
    }
    let step = frame.channels() as usize;
    for px in frame.data_mut().chunks_exact_mut(step) {
        px[0] = (px[0] as f64 * red_gain).round().clamp(0.0, 255.0) as u8;
        px[2] = (px[2] as f64 * blue_gain).round().clamp(0.0, 255.0) as u8;
    }
}

/// Nearest-neighbor resize.
pub fn resize(frame: &Frame, width: u32, height: u32) -> Frame {
    if frame.is_empty() || (width, height) == frame.size() {
        return frame.clone();
    }
    let step = frame.channels() as usize;
    let (src_w, src_h) = frame.size();
    let mut data = Vec::with_capacity(width as usize * height as usize * step);
    for y in 0..height {
        let sy = (y as u64 * src_h as u64 / height as u64).min(src_h as u64 - 1) as u32;
        for x in 0..width {
            let sx = (x as u64 * src_w as u64 / width as u64).min(src_w as u64 - 1) as u32;
            for c in 0..frame.channels() {
                data.push(frame.sample(sx, sy, c));
            }
        }
    }
    Frame::from_raw(data, width, height, frame.channels()).expect("resize geometry is consistent")
}

/// Normalize a frame to three channels: grayscale is replicated, RGBA
/// drops alpha, RGB passes through.
pub fn to_rgb(frame: &Frame) -> Frame {
    match frame.channels() {
        3 => frame.clone(),
        1 => {
            let data = frame.data().iter().flat_map(|&p| [p, p, p]).collect();
            Frame::from_raw(data, frame.width(), frame.height(), 3)
                .expect("gray expansion geometry is consistent")
        }
        4 => {
            let data = frame
                .data()
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect();
            Frame::from_raw(data, frame.width(), frame.height(), 3)
                .expect("alpha drop geometry is consistent")
        }
        _ => frame.clone(),
    }
}

/// Draw a rectangle outline onto an RGB frame.
pub fn draw_rect(frame: &mut Frame, rect: Rect, color: [u8; 3], thickness: u32) {
    if frame.is_empty() || frame.channels() < 3 {
        return;
    }
    let (w, h) = frame.size();
    let x1 = (rect.x + rect.width).min(w);
    let y1 = (rect.y + rect.height).min(h);

    for t in 0..thickness {
        // Horizontal edges.
        for x in rect.x..x1 {
            if rect.y + t < h {
                for (c, &v) in color.iter().enumerate() {
                    frame.set_sample(x, rect.y + t, c as u8, v);
                }
            }
            if y1 > t + 1 && y1 - t - 1 < h {
                for (c, &v) in color.iter().enumerate() {
                    frame.set_sample(x, y1 - t - 1, c as u8, v);
                }
            }
        }
        // Vertical edges.
        for y in rect.y..y1 {
            if rect.x + t < w {
                for (c, &v) in color.iter().enumerate() {
                    frame.set_sample(rect.x + t, y, c as u8, v);
                }
            }
            if x1 > t + 1 && x1 - t - 1 < w {
                for (c, &v) in color.iter().enumerate() {
                    frame.set_sample(x1 - t - 1, y, c as u8, v);
                }
            }
        }
    }
}
