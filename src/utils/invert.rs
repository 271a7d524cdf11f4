//! Colour inversion for light-on-dark symbols
//!
//! Engraved or laser-etched metal tags often show a light code on a dark
//! background; most decoders expect the opposite polarity.

use crate::models::Frame;
use rayon::prelude::*;

/// Invert every channel of a pixel buffer
pub fn invert_pixels(pixels: &[u8]) -> Vec<u8> {
    pixels.par_iter().map(|&v| 255 - v).collect()
}

/// Invert a grayscale buffer in place
pub fn invert_in_place(gray: &mut [u8]) {
    gray.par_iter_mut().for_each(|v| *v = 255 - *v);
}

/// Pixel-inverted copy of a frame (same seq and timestamp)
pub fn invert_frame(frame: &Frame) -> Frame {
    frame.with_pixels(invert_pixels(frame.pixels()))
}
