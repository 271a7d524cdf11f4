//! Utility functions for frame processing
//!
//! This module provides helpers shared by the decode strategies:
//! - Grayscale conversion (RGB/YUYV to luminance)
//! - Colour inversion for light-on-dark symbols
//! - Snapshot encoding (PNG/JPEG, base64) for remote services

/// Snapshot encoding for upload
pub mod encode;
/// Luminance conversion (RGB, YUYV)
pub mod grayscale;
/// Pixel inversion
pub mod invert;
