//! Pure Rust image backend built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `ImageReader::with_guessed_format` + `into_dimensions` (header only) |
//! | Decode (JPEG, PNG, TIFF, WebP) | `image::load_from_memory` |
//! | Resample | `image::imageops::resize` with `Lanczos3` filter |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed from effort) |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//! | Lossless crop output | `image::codecs::png::PngEncoder` |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::{Effort, EncodeOptions, OutputFormat};
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat, ImageReader, RgbaImage};
use std::io::Cursor;
use std::sync::LazyLock;

/// Default pixel budget for a single drawing surface (100 megapixels).
pub const DEFAULT_MAX_PIXELS: u64 = 100_000_000;

/// Extensions whose decoders are compiled in.
///
/// AVIF is absent on purpose: the `image` crate's `"avif"` feature only
/// enables the **encoder** (rav1e), and `ImageFormat::reading_enabled()`
/// reports `true` for it anyway.
const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Debug, Clone)]
pub struct RustBackend {
    preview_speed: u8,
    final_speed: u8,
    max_pixels: u64,
}

impl RustBackend {
    pub fn new() -> Self {
        Self {
            preview_speed: 10,
            final_speed: 4,
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }

    /// Override the rav1e speeds used for low and high effort (1 = slowest, 10 = fastest).
    pub fn with_speeds(mut self, preview_speed: u8, final_speed: u8) -> Self {
        self.preview_speed = preview_speed.clamp(1, 10);
        self.final_speed = final_speed.clamp(1, 10);
        self
    }

    pub fn with_max_pixels(mut self, max_pixels: u64) -> Self {
        self.max_pixels = max_pixels;
        self
    }

    fn speed_for(&self, effort: Effort) -> u8 {
        match effort {
            Effort::Low => self.preview_speed,
            Effort::High => self.final_speed,
        }
    }

    /// Refuse pixel buffers that are empty or larger than the budget.
    fn check_surface(&self, width: u32, height: u32) -> Result<(), BackendError> {
        let pixels = width as u64 * height as u64;
        if pixels == 0 || pixels > self.max_pixels {
            return Err(BackendError::DrawSurfaceUnavailable { width, height });
        }
        Ok(())
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn encode_avif(pixels: &RgbaImage, speed: u8, quality: u8) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    AvifEncoder::new_with_speed_quality(&mut buf, speed, quality)
        .write_image(
            pixels.as_raw(),
            pixels.width(),
            pixels.height(),
            ExtendedColorType::Rgba8,
        )
        .map_err(|e| BackendError::EncodeFailed(format!("AVIF encode failed: {}", e)))?;
    Ok(buf)
}

fn encode_jpeg(pixels: &RgbaImage, quality: u8) -> Result<Vec<u8>, BackendError> {
    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgba8(pixels.clone()).to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| BackendError::EncodeFailed(format!("JPEG encode failed: {}", e)))?;
    Ok(buf)
}

impl ImageBackend for RustBackend {
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError> {
        let (width, height) = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()?
            .into_dimensions()
            .map_err(|e| {
                BackendError::DecodeFailed(format!("Failed to read dimensions: {}", e))
            })?;
        Ok(Dimensions { width, height })
    }

    fn decode(&self, bytes: &[u8]) -> Result<RgbaImage, BackendError> {
        let dims = self.identify(bytes)?;
        self.check_surface(dims.width, dims.height)?;
        let img = image::load_from_memory(bytes)
            .map_err(|e| BackendError::DecodeFailed(format!("Failed to decode: {}", e)))?;
        Ok(img.to_rgba8())
    }

    fn resample(
        &self,
        pixels: &RgbaImage,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, BackendError> {
        self.check_surface(width, height)?;
        Ok(image::imageops::resize(
            pixels,
            width,
            height,
            FilterType::Lanczos3,
        ))
    }

    fn encode(&self, pixels: &RgbaImage, options: &EncodeOptions) -> Result<Vec<u8>, BackendError> {
        self.check_surface(pixels.width(), pixels.height())?;
        let quality = options.quality.value() as u8;
        match options.format {
            OutputFormat::Avif => encode_avif(pixels, self.speed_for(options.effort), quality),
            OutputFormat::Jpeg => encode_jpeg(pixels, quality),
        }
    }

    fn encode_lossless(&self, pixels: &RgbaImage) -> Result<Vec<u8>, BackendError> {
        self.check_surface(pixels.width(), pixels.height())?;
        let mut buf = Vec::new();
        PngEncoder::new(&mut buf)
            .write_image(
                pixels.as_raw(),
                pixels.width(),
                pixels.height(),
                ExtendedColorType::Rgba8,
            )
            .map_err(|e| BackendError::EncodeFailed(format!("PNG encode failed: {}", e)))?;
        Ok(buf)
    }
}
