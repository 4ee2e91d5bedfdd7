//! Image backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the boundary to the external codec: every
//! backend must support identify, decode, resample, encode, and
//! encode_lossless. The encode pipeline only ever talks to this trait, so
//! a mock can replace the real codec in tests.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend) — pure Rust, built on
//! the `image` crate.

use super::params::EncodeOptions;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No drawing surface for {width}x{height} pixels")]
    DrawSurfaceUnavailable { width: u32, height: u32 },
    #[error("Decode failed: {0}")]
    DecodeFailed(String),
    #[error("Encode failed: {0}")]
    EncodeFailed(String),
}

/// Width and height of an image in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// Trait for image backends.
///
/// Implementations are called from blocking worker threads, hence
/// `Send + Sync`.
pub trait ImageBackend: Send + Sync {
    /// Read dimensions from the encoded header without a full decode.
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError>;

    /// Decode compressed bytes into an RGBA pixel buffer.
    fn decode(&self, bytes: &[u8]) -> Result<RgbaImage, BackendError>;

    /// Resample pixels to exactly `width` x `height`.
    fn resample(
        &self,
        pixels: &RgbaImage,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, BackendError>;

    /// Lossy-encode pixels with the given quality, effort, and format.
    fn encode(&self, pixels: &RgbaImage, options: &EncodeOptions) -> Result<Vec<u8>, BackendError>;

    /// Losslessly encode pixels (PNG). Used for materialized crops.
    fn encode_lossless(&self, pixels: &RgbaImage) -> Result<Vec<u8>, BackendError>;
}
