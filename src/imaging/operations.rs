//! High-level image operations.
//!
//! These functions combine calculations with backend execution: the encode
//! pipeline shared by previews and final artifacts, and crop
//! materialization. They are synchronous and CPU-bound; the registry runs
//! them on blocking worker threads.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{fit_crop_rect, resolve_dimensions};
use super::params::{AspectRatio, CropRect, EncodeRequest};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Media type of materialized crops.
pub const LOSSLESS_MEDIA_TYPE: &str = "image/png";

/// Encoded bytes tagged with what they contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub dimensions: Dimensions,
    pub media_type: &'static str,
}

/// What an encode will do, computed before touching pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodePlan {
    pub output: Dimensions,
    pub resample: bool,
}

/// Get image dimensions using the backend.
pub fn get_dimensions(backend: &dyn ImageBackend, bytes: &[u8]) -> Result<Dimensions> {
    backend.identify(bytes)
}

/// Plan an encode without executing it.
///
/// Resampling only happens when a target is set and the resolved size
/// differs from the source.
pub fn plan_encode(source: Dimensions, request: &EncodeRequest) -> EncodePlan {
    let output: Dimensions = resolve_dimensions(
        source.as_tuple(),
        request.target_width,
        request.target_height,
    )
    .into();
    let targeted = request.target_width.is_some() || request.target_height.is_some();

    EncodePlan {
        output,
        resample: targeted && output != source,
    }
}

/// Run the encode pipeline: decode → optional resample → encode.
///
/// Preview and final encodes go through this one routine; the request's
/// mode only changes the effort handed to the encoder.
pub fn run_encode(
    backend: &dyn ImageBackend,
    source: &[u8],
    request: &EncodeRequest,
) -> Result<Artifact> {
    let pixels = backend.decode(source)?;
    let plan = plan_encode(pixels.dimensions().into(), request);

    let pixels = if plan.resample {
        backend.resample(&pixels, plan.output.width, plan.output.height)?
    } else {
        pixels
    };

    let bytes = backend.encode(&pixels, &request.options())?;

    Ok(Artifact {
        bytes,
        dimensions: plan.output,
        media_type: request.format.media_type(),
    })
}

/// Copy a rectangle of the source into a new lossless image at 1:1 scale.
///
/// The rectangle is clamped to the decoded bounds and, when `aspect` defines
/// a ratio, shrunk around its center to it. A rectangle that misses the
/// image entirely has no surface to draw on.
pub fn materialize_crop(
    backend: &dyn ImageBackend,
    source: &[u8],
    rect: CropRect,
    aspect: AspectRatio,
) -> Result<Artifact> {
    let pixels = backend.decode(source)?;
    let rect = fit_crop_rect(rect, aspect.ratio(), pixels.dimensions()).ok_or(
        BackendError::DrawSurfaceUnavailable {
            width: rect.width,
            height: rect.height,
        },
    )?;

    let cropped = image::imageops::crop_imm(&pixels, rect.x, rect.y, rect.width, rect.height)
        .to_image();
    let bytes = backend.encode_lossless(&cropped)?;

    Ok(Artifact {
        bytes,
        dimensions: Dimensions::new(rect.width, rect.height),
        media_type: LOSSLESS_MEDIA_TYPE,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp, encoded_quality};
    use crate::imaging::params::{Effort, EncodeMode, OutputFormat, Quality};

    fn request(
        quality: u32,
        width: Option<u32>,
        height: Option<u32>,
        mode: EncodeMode,
    ) -> EncodeRequest {
        EncodeRequest {
            quality: Quality::new(quality),
            target_width: width,
            target_height: height,
            mode,
            format: OutputFormat::Avif,
        }
    }

    #[test]
    fn get_dimensions_calls_backend() {
        let backend = MockBackend::new();
        let dims = get_dimensions(&backend, &MockBackend::source(1920, 1080)).unwrap();
        assert_eq!(dims, Dimensions::new(1920, 1080));
    }

    #[test]
    fn plan_without_targets_skips_resample() {
        let plan = plan_encode(
            Dimensions::new(1000, 500),
            &request(75, None, None, EncodeMode::Preview),
        );
        assert_eq!(plan.output, Dimensions::new(1000, 500));
        assert!(!plan.resample);
    }

    #[test]
    fn plan_with_width_resolves_height() {
        let plan = plan_encode(
            Dimensions::new(1000, 500),
            &request(75, Some(400), None, EncodeMode::Preview),
        );
        assert_eq!(plan.output, Dimensions::new(400, 200));
        assert!(plan.resample);
    }

    #[test]
    fn plan_with_targets_equal_to_source_skips_resample() {
        let plan = plan_encode(
            Dimensions::new(640, 480),
            &request(75, Some(640), None, EncodeMode::Final),
        );
        assert!(!plan.resample);
    }

    #[test]
    fn run_encode_preview_uses_low_effort() {
        let backend = MockBackend::new();
        let artifact = run_encode(
            &backend,
            &MockBackend::source(200, 100),
            &request(40, None, None, EncodeMode::Preview),
        )
        .unwrap();

        assert_eq!(artifact.dimensions, Dimensions::new(200, 100));
        assert_eq!(artifact.media_type, "image/avif");
        assert_eq!(encoded_quality(&artifact.bytes), Some(40));
        assert_eq!(
            backend.get_operations(),
            vec![
                RecordedOp::Decode,
                RecordedOp::Encode {
                    width: 200,
                    height: 100,
                    quality: 40,
                    effort: Effort::Low,
                    format: OutputFormat::Avif,
                },
            ]
        );
    }

    #[test]
    fn run_encode_final_resamples_then_encodes_high_effort() {
        let backend = MockBackend::new();
        let artifact = run_encode(
            &backend,
            &MockBackend::source(1000, 500),
            &request(90, Some(400), None, EncodeMode::Final),
        )
        .unwrap();

        assert_eq!(artifact.dimensions, Dimensions::new(400, 200));
        let ops = backend.get_operations();
        assert_eq!(ops.len(), 3);
        assert_eq!(
            ops[1],
            RecordedOp::Resample {
                width: 400,
                height: 200
            }
        );
        assert!(matches!(
            ops[2],
            RecordedOp::Encode {
                width: 400,
                height: 200,
                effort: Effort::High,
                ..
            }
        ));
    }

    #[test]
    fn run_encode_surfaces_decode_failure() {
        let backend = MockBackend::new();
        let result = run_encode(
            &backend,
            b"not an image",
            &request(75, None, None, EncodeMode::Preview),
        );
        assert!(matches!(result, Err(BackendError::DecodeFailed(_))));
        assert!(backend.encodes().is_empty());
    }

    #[test]
    fn run_encode_surfaces_codec_failure() {
        let backend = MockBackend::new().failing_at(33);
        let result = run_encode(
            &backend,
            &MockBackend::source(10, 10),
            &request(33, None, None, EncodeMode::Final),
        );
        assert!(matches!(result, Err(BackendError::EncodeFailed(_))));
    }

    #[test]
    fn materialize_crop_copies_rect_losslessly() {
        let backend = MockBackend::new();
        let artifact = materialize_crop(
            &backend,
            &MockBackend::source(800, 600),
            CropRect {
                x: 100,
                y: 50,
                width: 300,
                height: 200,
            },
            AspectRatio::Free,
        )
        .unwrap();

        assert_eq!(artifact.dimensions, Dimensions::new(300, 200));
        assert_eq!(artifact.media_type, LOSSLESS_MEDIA_TYPE);
        assert!(
            backend
                .get_operations()
                .contains(&RecordedOp::EncodeLossless {
                    width: 300,
                    height: 200
                })
        );
        // The new source decodes to the cropped size
        assert_eq!(
            backend.decode(&artifact.bytes).unwrap().dimensions(),
            (300, 200)
        );
    }

    #[test]
    fn materialize_crop_clamps_overflowing_rect() {
        let backend = MockBackend::new();
        let artifact = materialize_crop(
            &backend,
            &MockBackend::source(100, 100),
            CropRect {
                x: 60,
                y: 60,
                width: 100,
                height: 100,
            },
            AspectRatio::Free,
        )
        .unwrap();
        assert_eq!(artifact.dimensions, Dimensions::new(40, 40));
    }

    #[test]
    fn materialize_crop_constrains_to_aspect() {
        let backend = MockBackend::new();
        let artifact = materialize_crop(
            &backend,
            &MockBackend::source(800, 600),
            CropRect {
                x: 0,
                y: 0,
                width: 300,
                height: 100,
            },
            AspectRatio::Preset(crate::imaging::AspectPreset::Square),
        )
        .unwrap();
        assert_eq!(artifact.dimensions, Dimensions::new(100, 100));

        // Undefined custom ratio behaves as free
        let artifact = materialize_crop(
            &backend,
            &MockBackend::source(800, 600),
            CropRect {
                x: 0,
                y: 0,
                width: 300,
                height: 100,
            },
            AspectRatio::Custom {
                width: 0.0,
                height: 9.0,
            },
        )
        .unwrap();
        assert_eq!(artifact.dimensions, Dimensions::new(300, 100));
    }

    #[test]
    fn materialize_crop_outside_image_fails() {
        let backend = MockBackend::new();
        let result = materialize_crop(
            &backend,
            &MockBackend::source(100, 100),
            CropRect {
                x: 200,
                y: 0,
                width: 10,
                height: 10,
            },
            AspectRatio::Free,
        );
        assert!(matches!(
            result,
            Err(BackendError::DrawSurfaceUnavailable { .. })
        ));
    }
}
