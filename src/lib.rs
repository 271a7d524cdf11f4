//! codescan - optical code acquisition and reconciliation
//!
//! Samples a live frame source, decodes serial codes with a local decoder and
//! an ordered chain of fallbacks, throttles duplicate detections, and
//! reconciles stored codes against a product's declared numeric range.

#![warn(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

/// Scanner configuration (YAML + environment)
pub mod config;
/// Session state machine and decode loops
pub mod controller;
/// Decode strategies and the fallback chain
pub mod decoder;
/// Error taxonomy
pub mod error;
/// Code cleaning and digit extraction
pub mod extract;
/// Temporal duplicate suppression
pub mod gate;
/// Core data structures (Frame, CandidateCode, ProductRange, etc.)
pub mod models;
/// Missing/excess computation and quality summaries
pub mod reconcile;
/// Frame sources (replay, camera)
pub mod source;
/// Persistence collaborator seam
pub mod store;
/// Image loading and dataset helpers
pub mod tools;
/// Utility functions (grayscale, inversion, encoding)
pub mod utils;
/// Duplicate-in-product check
pub mod validate;

pub use config::{ScanConfig, ScanMode, StrategyKind};
pub use controller::{AcquisitionController, EventStream, NoticeKind, ScanEvent, SessionState};
pub use decoder::{ChainOutcome, DecodeStrategy, LocalDecoder, StrategyChain};
pub use error::{Result, ScanError};
pub use extract::extract;
pub use models::{CandidateCode, DecodeAttempt, Frame, ProductRange, ReconciliationResult, StrategyId};
pub use reconcile::{completion_rate, reconcile};
pub use store::{CodeStore, MemoryCodeStore};
pub use validate::{Validation, validate};

/// Decode the first code in an RGB image
///
/// # Arguments
/// * `image` - Raw RGB bytes (3 bytes per pixel)
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
///
/// Tries the image as-is, then colour-inverted. Returns `None` when the
/// buffer does not match the dimensions or nothing decodes.
pub fn decode(image: &[u8], width: u32, height: u32) -> Option<String> {
    let frame = Frame::from_rgb(image.to_vec(), width, height, 0)?;
    LocalDecoder::snapshot().decode_blocking(&frame)
}
