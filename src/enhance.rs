//! Display enhancement.
//!
//! Optional presentation-side polish for snapshots and annotated frames.
//! The usual order is contrast first (sets the base dynamic range), then
//! saturation (pops the colors), then sharpening (final detail pass).

use crate::frame::Frame;
use crate::imgproc;

const SHARPEN_KERNEL: usize = 19;
const SHARPEN_SIGMA: f32 = 3.0;

/// Linear contrast/brightness: out = alpha * in + beta.
///
/// `alpha` above 1.0 increases contrast; `beta` shifts brightness.
pub fn adjust_contrast(frame: &Frame, alpha: f64, beta: f64) -> Frame {
    if frame.is_empty() {
        return Frame::empty();
    }
    let data = frame
        .data()
        .iter()
        .map(|&p| (alpha * p as f64 + beta).round().clamp(0.0, 255.0) as u8)
        .collect();
    Frame::from_raw(data, frame.width(), frame.height(), frame.channels())
        .expect("contrast geometry is consistent")
}

/// Unsharp-mask sharpening: out = in + (in - blurred) * amount.
///
/// Amounts between 0.5 and 1.5 are usually enough; larger values ring on
/// hard edges.
pub fn sharpen(frame: &Frame, amount: f64) -> Frame {
    if frame.is_empty() {
        return Frame::empty();
    }
    let channels = frame.channels();
    let (width, height) = frame.size();
    let step = channels as usize;

    let mut out = vec![0u8; frame.data().len()];
    for c in 0..channels {
        // Blur one channel at a time; the blur primitive is grayscale.
        let plane: Vec<u8> = frame.data().iter().skip(c as usize).step_by(step).copied().collect();
        let plane = Frame::from_raw(plane, width, height, 1).expect("plane geometry is consistent");
        let blurred = imgproc::gaussian_blur(&plane, SHARPEN_KERNEL, SHARPEN_SIGMA);

        for (i, (&orig, &blur)) in plane.data().iter().zip(blurred.data()).enumerate() {
            let value = orig as f64 + (orig as f64 - blur as f64) * amount;
            out[i * step + c as usize] = value.round().clamp(0.0, 255.0) as u8;
        }
    }

    Frame::from_raw(out, width, height, channels).expect("sharpen geometry is consistent")
}

/// Saturation boost in HSV space: scale S by `factor`, truncating at the
/// channel maximum. A factor of 1.0 is a no-op; 1.5 adds 50%.
pub fn boost_saturation(frame: &Frame, factor: f64) -> Frame {
    if frame.is_empty() || frame.channels() < 3 {
        return frame.clone();
    }
    let step = frame.channels() as usize;
    let mut data = frame.data().to_vec();
    for px in data.chunks_exact_mut(step) {
        let (h, s, v) = rgb_to_hsv(px[0], px[1], px[2]);
        let (r, g, b) = hsv_to_rgb(h, (s * factor).min(1.0), v);
        px[0] = r;
        px[1] = g;
        px[2] = b;
    }
    Frame::from_raw(data, frame.width(), frame.height(), frame.channels())
        .expect("saturation geometry is consistent")
}

fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let r = r as f64 / 255.0;
    let g = g as f64 / 255.0;
    let b = b as f64 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let s = if max == 0.0 { 0.0 } else { delta / max };
    (h, s, max)
}

fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (u8, u8, u8) {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0).rem_euclid(2.0) - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match h {
        h if h < 60.0 => (c, x, 0.0),
        h if h < 120.0 => (x, c, 0.0),
        h if h < 180.0 => (0.0, c, x),
        h if h < 240.0 => (0.0, x, c),
        h if h < 300.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    (
        ((r + m) * 255.0).round().clamp(0.0, 255.0) as u8,
        ((g + m) * 255.0).round().clamp(0.0, 255.0) as u8,
        ((b + m) * 255.0).round().clamp(0.0, 255.0) as u8,
    )
}
