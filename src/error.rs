//! Input errors raised by the detector.
//!
//! Everything else in the pipeline degrades instead of failing, so this is the only error
//! type a caller needs to match on. It travels inside `anyhow::Error` and can be recovered
//! with `downcast_ref::<DetectError>()`.

use thiserror::Error;

/// Errors caused by unusable input images.
#[derive(Debug, Error)]
pub enum DetectError {
    /// The decoded image has no pixels.
    #[error("Input image has zero area ({width}x{height})")]
    EmptyImage {
        /// Width of the rejected image.
        width: u32,
        /// Height of the rejected image.
        height: u32,
    },
    /// The input bytes could not be decoded as an image.
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
}
