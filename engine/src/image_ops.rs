//! Pixel kernels behind the filter pipeline. All kernels work on straight
//! (non-premultiplied) RGBA and leave alpha untouched unless noted.

use image::{imageops, Rgba, RgbaImage};
use crate::filters::ActiveFilter;

const POSTERIZE_LEVELS: f32 = 4.0;

pub fn apply_filters(src: &RgbaImage, filters: &[ActiveFilter]) -> RgbaImage {
    let mut img = src.clone();
    for filter in filters {
        img = match *filter {
            ActiveFilter::Brightness(b) => map_rgb(img, |v| v * b as f32),
            ActiveFilter::Contrast(c) => {
                let adjust = ((c as f32 + 100.0) / 100.0).powi(2);
                map_rgb(img, move |v| ((v / 255.0 - 0.5) * adjust + 0.5) * 255.0)
            }
            ActiveFilter::Hsl { saturation, hue, luminance } => hsl(img, saturation as f32, hue as f32, luminance as f32),
            ActiveFilter::Blur(radius) => imageops::blur(&img, radius as f32),
            ActiveFilter::Pixelate(size) => pixelate(&img, size.round().max(1.0) as u32),
            ActiveFilter::Noise(amount) => noise(img, amount as f32),
            ActiveFilter::Grayscale => map_pixel(img, |r, g, b| {
                let l = 0.299 * r + 0.587 * g + 0.114 * b;
                (l, l, l)
            }),
            ActiveFilter::Sepia => map_pixel(img, |r, g, b| (
                r * 0.393 + g * 0.769 + b * 0.189,
                r * 0.349 + g * 0.686 + b * 0.168,
                r * 0.272 + g * 0.534 + b * 0.131,
            )),
            ActiveFilter::Invert => map_rgb(img, |v| 255.0 - v),
            ActiveFilter::Emboss => emboss(&img),
            ActiveFilter::Posterize => map_rgb(img, |v| {
                (v / 255.0 * (POSTERIZE_LEVELS - 1.0)).round() / (POSTERIZE_LEVELS - 1.0) * 255.0
            }),
            ActiveFilter::Solarize => map_rgb(img, |v| if v > 127.0 { 255.0 - v } else { v }),
            ActiveFilter::Enhance => enhance(img),
        };
    }
    img
}

fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

fn map_rgb<F: Fn(f32) -> f32>(img: RgbaImage, f: F) -> RgbaImage {
    map_pixel(img, |r, g, b| (f(r), f(g), f(b)))
}

fn map_pixel<F: Fn(f32, f32, f32) -> (f32, f32, f32)>(mut img: RgbaImage, f: F) -> RgbaImage {
    for px in img.pixels_mut() {
        let (r, g, b) = f(px[0] as f32, px[1] as f32, px[2] as f32);
        px[0] = clamp_u8(r);
        px[1] = clamp_u8(g);
        px[2] = clamp_u8(b);
    }
    img
}

/// `saturation` is an exponent (each unit doubles saturation), `hue` is in
/// degrees and `luminance` is an offset in [-1, 1].
fn hsl(img: RgbaImage, saturation: f32, hue: f32, luminance: f32) -> RgbaImage {
    let sat_factor = 2f32.powf(saturation);
    let hue_shift = hue / 360.0;
    let light_offset = luminance * 255.0;
    map_pixel(img, move |r, g, b| {
        let (h, s, l) = rgb_to_hsl(r / 255.0, g / 255.0, b / 255.0);
        let nh = (h + hue_shift).rem_euclid(1.0);
        let ns = (s * sat_factor).clamp(0.0, 1.0);
        let (nr, ng, nb) = hsl_to_rgb(nh, ns, l);
        (nr * 255.0 + light_offset, ng * 255.0 + light_offset, nb * 255.0 + light_offset)
    })
}

fn pixelate(img: &RgbaImage, size: u32) -> RgbaImage {
    if size <= 1 { return img.clone(); }
    let (width, height) = img.dimensions();
    let mut out = RgbaImage::new(width, height);
    for by in (0..height).step_by(size as usize) {
        for bx in (0..width).step_by(size as usize) {
            let x_end = (bx + size).min(width);
            let y_end = (by + size).min(height);
            let mut sum = [0u64; 4];
            let mut count = 0u64;
            for y in by..y_end {
                for x in bx..x_end {
                    let p = img.get_pixel(x, y);
                    for c in 0..4 { sum[c] += p[c] as u64; }
                    count += 1;
                }
            }
            let avg = Rgba([
                (sum[0] / count) as u8, (sum[1] / count) as u8,
                (sum[2] / count) as u8, (sum[3] / count) as u8,
            ]);
            for y in by..y_end {
                for x in bx..x_end {
                    out.put_pixel(x, y, avg);
                }
            }
        }
    }
    out
}

/// Adds deterministic per-pixel noise so repeated renders stay stable.
fn noise(mut img: RgbaImage, amount: f32) -> RgbaImage {
    let half_range = amount * 255.0;
    for (x, y, px) in img.enumerate_pixels_mut() {
        let n = (hash_unit(x, y) - 0.5) * 2.0 * half_range;
        for c in 0..3 {
            px[c] = clamp_u8(px[c] as f32 + n);
        }
    }
    img
}

fn hash_unit(x: u32, y: u32) -> f32 {
    let mut h = x.wrapping_mul(374_761_393).wrapping_add(y.wrapping_mul(668_265_263));
    h = h.wrapping_mul(0x9E37_79B9);
    h ^= h >> 16;
    h = h.wrapping_mul(0x85EB_CA6B);
    h ^= h >> 13;
    h = h.wrapping_mul(0xC2B2_AE35);
    h ^= h >> 16;
    (h & 0x00FF_FFFF) as f32 / 16_777_216.0
}

fn emboss(img: &RgbaImage) -> RgbaImage {
    let (width, height) = img.dimensions();
    let mut out = img.clone();
    if width < 2 || height < 2 { return out; }
    let luma = |x: u32, y: u32| {
        let p = img.get_pixel(x.min(width - 1), y.min(height - 1));
        0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32
    };
    for y in 0..height {
        for x in 0..width {
            let prev = luma(x.saturating_sub(1), y.saturating_sub(1));
            let next = luma(x + 1, y + 1);
            let v = clamp_u8(128.0 + next - prev);
            let px = out.get_pixel_mut(x, y);
            px[0] = v;
            px[1] = v;
            px[2] = v;
        }
    }
    out
}

fn enhance(mut img: RgbaImage) -> RgbaImage {
    let mut min = [255u8; 3];
    let mut max = [0u8; 3];
    for px in img.pixels() {
        for c in 0..3 {
            min[c] = min[c].min(px[c]);
            max[c] = max[c].max(px[c]);
        }
    }
    for px in img.pixels_mut() {
        for c in 0..3 {
            let range = max[c].saturating_sub(min[c]);
            if range == 0 { continue; }
            px[c] = clamp_u8((px[c] - min[c]) as f32 * 255.0 / range as f32);
        }
    }
    img
}

pub fn rgb_to_hsl(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    if (max - min).abs() < 1e-6 { return (0.0, 0.0, l); }
    let d = max - min;
    let s = if l > 0.5 { d / (2.0 - max - min) } else { d / (max + min) };
    let h = if (max - r).abs() < 1e-6 {
        let mut h = (g - b) / d;
        if h < 0.0 { h += 6.0; }
        h / 6.0
    } else if (max - g).abs() < 1e-6 {
        ((b - r) / d + 2.0) / 6.0
    } else {
        ((r - g) / d + 4.0) / 6.0
    };
    (h, s, l)
}

pub fn hsl_to_rgb(h: f32, s: f32, l: f32) -> (f32, f32, f32) {
    if s.abs() < 1e-6 { return (l, l, l); }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    (hue_to_rgb(p, q, h + 1.0 / 3.0), hue_to_rgb(p, q, h), hue_to_rgb(p, q, h - 1.0 / 3.0))
}

fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 { t += 1.0; }
    if t > 1.0 { t -= 1.0; }
    if t < 1.0 / 6.0 { return p + (q - p) * 6.0 * t; }
    if t < 1.0 / 2.0 { return q; }
    if t < 2.0 / 3.0 { return p + (q - p) * (2.0 / 3.0 - t) * 6.0; }
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(r: u8, g: u8, b: u8) -> RgbaImage {
        RgbaImage::from_pixel(4, 4, Rgba([r, g, b, 200]))
    }

    #[test]
    fn empty_pipeline_is_identity() {
        let img = solid(10, 20, 30);
        assert_eq!(apply_filters(&img, &[]), img);
    }

    #[test]
    fn invert_and_alpha() {
        let out = apply_filters(&solid(10, 20, 30), &[ActiveFilter::Invert]);
        assert_eq!(out.get_pixel(0, 0), &Rgba([245, 235, 225, 200]));
    }

    #[test]
    fn brightness_scales_channels() {
        let out = apply_filters(&solid(100, 50, 200), &[ActiveFilter::Brightness(2.0)]);
        assert_eq!(out.get_pixel(1, 1), &Rgba([200, 100, 255, 200]));
    }

    #[test]
    fn grayscale_equalizes_channels() {
        let out = apply_filters(&solid(200, 30, 90), &[ActiveFilter::Grayscale]);
        let p = out.get_pixel(2, 2);
        assert_eq!(p[0], p[1]);
        assert_eq!(p[1], p[2]);
    }

    #[test]
    fn pixelate_averages_blocks() {
        let mut img = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]));
        img.put_pixel(1, 1, Rgba([200, 200, 200, 255]));
        let out = apply_filters(&img, &[ActiveFilter::Pixelate(2.0)]);
        assert!(out.pixels().all(|p| p == &Rgba([50, 50, 50, 255])));
    }

    #[test]
    fn solarize_folds_highlights() {
        let out = apply_filters(&solid(200, 100, 128), &[ActiveFilter::Solarize]);
        assert_eq!(out.get_pixel(0, 0), &Rgba([55, 100, 127, 200]));
    }

    #[test]
    fn noise_is_deterministic() {
        let img = solid(120, 120, 120);
        let a = apply_filters(&img, &[ActiveFilter::Noise(0.5)]);
        let b = apply_filters(&img, &[ActiveFilter::Noise(0.5)]);
        assert_eq!(a, b);
        assert_ne!(a, img);
    }

    #[test]
    fn hsl_round_trip() {
        let (h, s, l) = rgb_to_hsl(0.2, 0.6, 0.4);
        let (r, g, b) = hsl_to_rgb(h, s, l);
        assert!((r - 0.2).abs() < 1e-4 && (g - 0.6).abs() < 1e-4 && (b - 0.4).abs() < 1e-4);
    }
}
