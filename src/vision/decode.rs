//! Frame payload decoding.
//!
//! Clients send webcam frames as data URLs (`data:image/jpeg;base64,...`).
//! The header is stripped, the base64 body decoded and the image container
//! turned into an RGB grid plus the luminance grid the detectors work on.

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use image::{GrayImage, RgbImage};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame payload is empty")]
    EmptyPayload,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("unsupported or corrupt image: {0}")]
    Image(#[from] image::ImageError),
}

/// A decoded frame. Both grids share the same dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    pub color: RgbImage,
    pub luma: GrayImage,
}

impl DecodedFrame {
    pub fn from_rgb(color: RgbImage) -> Self {
        let luma = image::imageops::grayscale(&color);
        Self { color, luma }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.color.dimensions()
    }
}

/// Returns the payload body after the first `,`, or the whole payload when
/// there is no header.
pub fn strip_header(payload: &str) -> &str {
    match payload.split_once(',') {
        Some((_, body)) => body.trim(),
        None => payload.trim(),
    }
}

pub fn decode_frame(payload: &str) -> Result<DecodedFrame, DecodeError> {
    let body = strip_header(payload);
    if body.is_empty() {
        return Err(DecodeError::EmptyPayload);
    }

    let bytes = BASE64_STANDARD.decode(body)?;
    let image = image::load_from_memory(&bytes)?;

    Ok(DecodedFrame::from_rgb(image.to_rgb8()))
}
