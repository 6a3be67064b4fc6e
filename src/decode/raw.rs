//! RAW camera file decoding.
//!
//! `rawloader` yields the raw sensor mosaic plus the camera metadata needed
//! to render it: CFA pattern, per-channel black/white levels, and the
//! as-shot white balance coefficients. Rendering here is a 2x2 superpixel
//! demosaic — each Bayer quad collapses to one RGB pixel at half
//! resolution, which is more than enough source resolution for a 480px
//! thumbnail or screen preview and avoids interpolation artifacts.
//!
//! Rendering parameters: camera white balance, no automatic brightness,
//! 8 bits per channel. The preview variant additionally applies a
//! BT.709-style display gamma (power 1/2.222, linear toe slope 4.5);
//! thumbnails stay linear.

use super::{DecodeError, RenderIntent};
use image::RgbImage;
use rawloader::{RawImage, RawImageData};
use std::path::Path;

pub fn decode(path: &Path, intent: RenderIntent) -> Result<RgbImage, DecodeError> {
    let raw = rawloader::decode_file(path)
        .map_err(|e| DecodeError::RawDecodeFailed(format!("{}: {}", path.display(), e)))?;
    render(&raw, intent)
        .ok_or_else(|| DecodeError::RawDecodeFailed(format!("{}: empty sensor data", path.display())))
}

fn render(raw: &RawImage, intent: RenderIntent) -> Option<RgbImage> {
    let width = raw.width;
    let height = raw.height;
    if width < 2 || height < 2 {
        return None;
    }

    let sample = |idx: usize| -> f32 {
        match &raw.data {
            RawImageData::Integer(data) => data.get(idx).copied().unwrap_or(0) as f32,
            RawImageData::Float(data) => data.get(idx).copied().unwrap_or(0.0),
        }
    };

    // Normalize white balance against green; missing coefficients (NaN or
    // zero) fall back to neutral.
    let green = raw.wb_coeffs[1];
    let wb = |channel: usize| -> f32 {
        let c = raw.wb_coeffs[channel.min(3)];
        if c.is_finite() && c > 0.0 && green.is_finite() && green > 0.0 {
            c / green
        } else {
            1.0
        }
    };

    if raw.cpp == 3 {
        // Already-demosaiced RAW (e.g. sRAW): scale channels directly.
        return render_rgb(raw, sample, intent);
    }

    let out_w = (width / 2) as u32;
    let out_h = (height / 2) as u32;
    let mut out = RgbImage::new(out_w, out_h);

    for by in 0..out_h as usize {
        for bx in 0..out_w as usize {
            let mut rgb = [0.0f32; 3];
            let mut counts = [0u32; 3];
            for dy in 0..2 {
                for dx in 0..2 {
                    let row = by * 2 + dy;
                    let col = bx * 2 + dx;
                    let color = raw.cfa.color_at(row, col);
                    let black = raw.blacklevels[color.min(3)] as f32;
                    let white = raw.whitelevels[color.min(3)] as f32;
                    let range = (white - black).max(1.0);
                    let v = ((sample(row * width + col) - black) / range).max(0.0) * wb(color);
                    // Color 3 is the second green site.
                    let channel = if color == 3 { 1 } else { color.min(2) };
                    rgb[channel] += v;
                    counts[channel] += 1;
                }
            }
            let px = out.get_pixel_mut(bx as u32, by as u32);
            for ch in 0..3 {
                let mean = if counts[ch] > 0 {
                    rgb[ch] / counts[ch] as f32
                } else {
                    0.0
                };
                px.0[ch] = quantize(mean, intent);
            }
        }
    }

    Some(out)
}

fn render_rgb(
    raw: &RawImage,
    sample: impl Fn(usize) -> f32,
    intent: RenderIntent,
) -> Option<RgbImage> {
    let mut out = RgbImage::new(raw.width as u32, raw.height as u32);
    for y in 0..raw.height {
        for x in 0..raw.width {
            let base = (y * raw.width + x) * 3;
            let px = out.get_pixel_mut(x as u32, y as u32);
            for ch in 0..3 {
                let black = raw.blacklevels[ch] as f32;
                let white = raw.whitelevels[ch] as f32;
                let range = (white - black).max(1.0);
                let v = ((sample(base + ch) - black) / range).max(0.0);
                px.0[ch] = quantize(v, intent);
            }
        }
    }
    Some(out)
}

fn quantize(linear: f32, intent: RenderIntent) -> u8 {
    let v = match intent {
        RenderIntent::Thumbnail => linear,
        RenderIntent::Preview => display_gamma(linear),
    };
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// BT.709-style transfer: linear toe with slope 4.5 below 0.018, power
/// 1/2.222 above.
fn display_gamma(v: f32) -> f32 {
    if v < 0.018 {
        4.5 * v
    } else {
        1.099 * v.powf(1.0 / 2.222) - 0.099
    }
}
