use super::DecodeStrategy;
use crate::models::{Frame, StrategyId};
use crate::utils::grayscale::rgb_to_grayscale;
use crate::utils::invert::invert_in_place;
use async_trait::async_trait;
use rqrr::PreparedImage;

/// Decode a grayscale buffer; first grid that decodes wins
pub fn decode_grayscale(gray: &[u8], width: usize, height: usize) -> Option<String> {
    if width == 0 || height == 0 || gray.len() < width * height {
        return None;
    }
    let mut prepared = PreparedImage::prepare_from_greyscale(width, height, |x, y| gray[y * width + x]);
    prepared
        .detect_grids()
        .iter()
        .find_map(|grid| match grid.decode() {
            Ok((_, content)) if !content.trim().is_empty() => Some(content),
            Ok(_) => None,
            Err(err) => {
                tracing::trace!(error = ?err, "grid failed to decode");
                None
            }
        })
}

/// Decode a frame as-is
pub fn decode_frame(frame: &Frame) -> Option<String> {
    let (w, h) = (frame.width() as usize, frame.height() as usize);
    decode_grayscale(&rgb_to_grayscale(frame.pixels(), w, h), w, h)
}

/// Decode a frame in both polarities concurrently, preferring the identity result
pub fn decode_frame_both(frame: &Frame) -> Option<String> {
    let (w, h) = (frame.width() as usize, frame.height() as usize);
    let gray = rgb_to_grayscale(frame.pixels(), w, h);
    let (identity, inverted) = rayon::join(
        || decode_grayscale(&gray, w, h),
        || {
            let mut inverted = gray.clone();
            invert_in_place(&mut inverted);
            decode_grayscale(&inverted, w, h)
        },
    );
    identity.or(inverted)
}

/// On-device decoder backed by rqrr
///
/// As [`StrategyId::Native`] it decodes the frame as-is, once per frame.
/// As [`StrategyId::Snapshot`] it also tries the colour-inverted frame, for
/// light-on-dark symbols. Decoding runs on the blocking pool.
#[derive(Debug, Clone, Copy)]
pub struct LocalDecoder {
    id: StrategyId,
}

impl LocalDecoder {
    /// Continuous frame-driven decoder
    pub fn native() -> Self {
        Self {
            id: StrategyId::Native,
        }
    }

    /// Identity + inverted snapshot decoder
    pub fn snapshot() -> Self {
        Self {
            id: StrategyId::Snapshot,
        }
    }

    /// Decode synchronously on the calling thread
    pub fn decode_blocking(&self, frame: &Frame) -> Option<String> {
        if frame.is_empty() {
            return None;
        }
        match self.id {
            StrategyId::Snapshot => decode_frame_both(frame),
            _ => decode_frame(frame),
        }
    }
}

#[async_trait]
impl DecodeStrategy for LocalDecoder {
    fn id(&self) -> StrategyId {
        self.id
    }

    async fn decode(&self, frame: &Frame) -> Option<String> {
        let decoder = *self;
        let frame = frame.clone();
        match tokio::task::spawn_blocking(move || decoder.decode_blocking(&frame)).await {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(strategy = %self.id, error = %err, "local decode task failed");
                None
            }
        }
    }
}
