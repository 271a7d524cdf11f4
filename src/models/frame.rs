use std::sync::Arc;
use tokio::time::Instant;

/// RGB8 raster snapshot taken from a frame source
///
/// Pixels are shared behind an `Arc` so one frame can be handed to several
/// strategies (and across tasks) without copying the buffer.
#[derive(Debug, Clone)]
pub struct Frame {
    pixels: Arc<[u8]>,
    width: u32,
    height: u32,
    /// Sequence number assigned by the source (monotonic per session)
    pub seq: u64,
    /// Capture time
    pub captured_at: Instant,
}

impl Frame {
    /// Create a frame from packed RGB bytes (3 bytes per pixel)
    ///
    /// Returns `None` when the buffer length does not match the dimensions.
    pub fn from_rgb(pixels: Vec<u8>, width: u32, height: u32, seq: u64) -> Option<Self> {
        let expected = (width as usize).checked_mul(height as usize)?.checked_mul(3)?;
        if pixels.len() != expected {
            return None;
        }
        Some(Self {
            pixels: pixels.into(),
            width,
            height,
            seq,
            captured_at: Instant::now(),
        })
    }

    /// Create a frame from a decoded image
    pub fn from_image(image: &image::DynamicImage, seq: u64) -> Self {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        Self {
            pixels: rgb.into_raw().into(),
            width,
            height,
            seq,
            captured_at: Instant::now(),
        }
    }

    /// Packed RGB bytes
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// True when the frame carries no pixels (zero-sized stream)
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Same frame metadata with a different pixel buffer of identical size
    pub(crate) fn with_pixels(&self, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), self.pixels.len());
        Self {
            pixels: pixels.into(),
            width: self.width,
            height: self.height,
            seq: self.seq,
            captured_at: self.captured_at,
        }
    }

    /// Copy into an `image` buffer for encoding or resizing
    pub fn to_rgb_image(&self) -> Option<image::RgbImage> {
        image::RgbImage::from_raw(self.width, self.height, self.pixels.to_vec())
    }
}
