//! Snapshot encoding for remote services

use crate::models::Frame;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{ColorType, ImageEncoder, ImageResult};

/// Encoded snapshot ready for upload
#[derive(Debug, Clone)]
pub struct EncodedImage {
    /// Encoded bytes
    pub bytes: Vec<u8>,
    /// MIME type of `bytes`
    pub mime: &'static str,
}

impl EncodedImage {
    /// Base64 (standard alphabet, padded) payload
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// `data:<mime>;base64,<payload>` form accepted by the proxy endpoints
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.to_base64())
    }
}

/// Lossless PNG of the full frame
pub fn encode_png(frame: &Frame) -> ImageResult<EncodedImage> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes).write_image(
        frame.pixels(),
        frame.width(),
        frame.height(),
        ColorType::Rgb8,
    )?;
    Ok(EncodedImage {
        bytes,
        mime: "image/png",
    })
}

/// JPEG of the frame, downscaled so the longer side is at most `max_dim`
///
/// `max_dim == 0` keeps the original size.
pub fn encode_jpeg(frame: &Frame, quality: u8, max_dim: u32) -> ImageResult<EncodedImage> {
    let quality = quality.clamp(1, 100);
    let mut bytes = Vec::new();
    let longest = frame.width().max(frame.height());

    if max_dim > 0 && longest > max_dim {
        let scale = max_dim as f32 / longest as f32;
        let new_w = ((frame.width() as f32 * scale).round() as u32).max(1);
        let new_h = ((frame.height() as f32 * scale).round() as u32).max(1);
        let Some(rgb) = frame.to_rgb_image() else {
            return Err(image::ImageError::Parameter(
                image::error::ParameterError::from_kind(
                    image::error::ParameterErrorKind::DimensionMismatch,
                ),
            ));
        };
        let resized = image::imageops::resize(&rgb, new_w, new_h, FilterType::Triangle);
        JpegEncoder::new_with_quality(&mut bytes, quality).write_image(
            resized.as_raw(),
            new_w,
            new_h,
            ColorType::Rgb8,
        )?;
    } else {
        JpegEncoder::new_with_quality(&mut bytes, quality).write_image(
            frame.pixels(),
            frame.width(),
            frame.height(),
            ColorType::Rgb8,
        )?;
    }

    Ok(EncodedImage {
        bytes,
        mime: "image/jpeg",
    })
}
