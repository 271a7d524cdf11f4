//! Luminance conversion for decoder input
//!
//! Y = 0.299*R + 0.587*G + 0.114*B, computed as (76*R + 150*G + 29*B) >> 8
use rayon::prelude::*;

/// Coefficients for grayscale conversion: Y = (76*R + 150*G + 29*B) >> 8
const COEF_R: u32 = 76;
const COEF_G: u32 = 150;
const COEF_B: u32 = 29;

/// Frames at or above this pixel count are converted row-parallel
const PARALLEL_THRESHOLD: usize = 640 * 480;

#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    let lum = (COEF_R * r as u32 + COEF_G * g as u32 + COEF_B * b as u32) >> 8;
    lum.min(255) as u8
}

/// Convert RGB image to grayscale, picking the parallel path for large frames
pub fn rgb_to_grayscale(rgb: &[u8], width: usize, height: usize) -> Vec<u8> {
    if width * height >= PARALLEL_THRESHOLD {
        rgb_to_grayscale_parallel(rgb, width, height)
    } else {
        rgb_to_grayscale_scalar(rgb, width, height)
    }
}

/// Single-threaded conversion
pub fn rgb_to_grayscale_scalar(rgb: &[u8], width: usize, height: usize) -> Vec<u8> {
    let pixel_count = width * height;
    rgb.chunks_exact(3)
        .take(pixel_count)
        .map(|px| luma(px[0], px[1], px[2]))
        .collect()
}

/// Convert RGB to grayscale using parallel processing
/// Processes rows in parallel for multi-core speedup
pub fn rgb_to_grayscale_parallel(rgb: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut gray = vec![0u8; width * height];
    if width == 0 {
        return gray;
    }

    gray.par_chunks_mut(width)
        .zip(rgb.par_chunks(width * 3))
        .for_each(|(row, src)| {
            for (out, px) in row.iter_mut().zip(src.chunks_exact(3)) {
                *out = luma(px[0], px[1], px[2]);
            }
        });

    gray
}

/// Convert packed YUYV (4:2:2) camera output to RGB
///
/// Each 4-byte group `Y0 U Y1 V` yields two pixels.
pub fn yuyv_to_rgb(yuyv: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut rgb = vec![0u8; width * height * 3];
    rgb.par_chunks_mut(6)
        .zip(yuyv.par_chunks(4))
        .for_each(|(out, group)| {
            if group.len() < 4 {
                return;
            }
            let (y0, u, y1, v) = (group[0], group[1], group[2], group[3]);
            let first = yuv_pixel(y0, u, v);
            out[..3].copy_from_slice(&first);
            if out.len() == 6 {
                out[3..].copy_from_slice(&yuv_pixel(y1, u, v));
            }
        });
    rgb
}

fn yuv_pixel(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let r = (298 * c + 409 * e + 128) >> 8;
    let g = (298 * c - 100 * d - 208 * e + 128) >> 8;
    let b = (298 * c + 516 * d + 128) >> 8;
    [
        r.clamp(0, 255) as u8,
        g.clamp(0, 255) as u8,
        b.clamp(0, 255) as u8,
    ]
}
