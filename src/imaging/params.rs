//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the encode pipeline in [`operations`](super::operations)
//! and the [`backend`](super::backend) that does the actual pixel work, so a
//! mock backend can stand in during tests without changing pipeline logic.
//!
//! ## Types
//!
//! - [`Quality`] — Lossy encoding quality (1–100, default 75). Clamped on construction.
//! - [`Effort`] — Encoder effort: low for previews, high for final artifacts.
//! - [`EncodeMode`] — Preview or final; selects the effort.
//! - [`OutputFormat`] — Container/codec of lossy artifacts.
//! - [`EncodeOptions`] — What the backend encoder receives alongside the pixels.
//! - [`EncodeRequest`] — Full description of one pipeline run.
//! - [`CropRect`] / [`AspectRatio`] — Crop geometry and the ratio constraint.

use serde::{Deserialize, Serialize};

/// Quality setting for lossy image encoding (1-100).
///
/// Deserialized values are clamped the same way as [`Quality::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u32")]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl From<u32> for Quality {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(75)
    }
}

/// How hard the encoder should work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    Low,
    High,
}

/// Which artifact an encode produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodeMode {
    /// Fast, low-effort encode for interactive feedback.
    Preview,
    /// High-effort encode produced by an explicit compress.
    Final,
}

impl EncodeMode {
    pub fn effort(self) -> Effort {
        match self {
            EncodeMode::Preview => Effort::Low,
            EncodeMode::Final => Effort::High,
        }
    }
}

/// Output codec for lossy artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Avif,
    Jpeg,
}

impl OutputFormat {
    pub fn media_type(self) -> &'static str {
        match self {
            OutputFormat::Avif => "image/avif",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Avif => "avif",
            OutputFormat::Jpeg => "jpg",
        }
    }
}

/// Options handed to the backend encoder together with the pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    pub quality: Quality,
    pub effort: Effort,
    pub format: OutputFormat,
}

/// One run of the encode pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeRequest {
    pub quality: Quality,
    pub target_width: Option<u32>,
    pub target_height: Option<u32>,
    pub mode: EncodeMode,
    pub format: OutputFormat,
}

impl EncodeRequest {
    pub fn options(&self) -> EncodeOptions {
        EncodeOptions {
            quality: self.quality,
            effort: self.mode.effort(),
            format: self.format,
        }
    }
}

/// A pixel rectangle on the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Fixed ratios offered by the crop overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectPreset {
    Square,
    Landscape4x3,
    Portrait3x4,
    Landscape3x2,
    Portrait2x3,
    Widescreen16x9,
    Vertical9x16,
}

impl AspectPreset {
    pub const ALL: [AspectPreset; 7] = [
        AspectPreset::Square,
        AspectPreset::Landscape4x3,
        AspectPreset::Portrait3x4,
        AspectPreset::Landscape3x2,
        AspectPreset::Portrait2x3,
        AspectPreset::Widescreen16x9,
        AspectPreset::Vertical9x16,
    ];

    /// Ratio as `(width, height)`.
    pub fn parts(self) -> (u32, u32) {
        match self {
            AspectPreset::Square => (1, 1),
            AspectPreset::Landscape4x3 => (4, 3),
            AspectPreset::Portrait3x4 => (3, 4),
            AspectPreset::Landscape3x2 => (3, 2),
            AspectPreset::Portrait2x3 => (2, 3),
            AspectPreset::Widescreen16x9 => (16, 9),
            AspectPreset::Vertical9x16 => (9, 16),
        }
    }

    pub fn ratio(self) -> f64 {
        let (w, h) = self.parts();
        w as f64 / h as f64
    }

    pub fn label(self) -> String {
        let (w, h) = self.parts();
        format!("{w}:{h}")
    }
}

/// Aspect-ratio constraint of the crop overlay.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    /// Unconstrained.
    #[default]
    Free,
    Preset(AspectPreset),
    /// User-entered `width:height`. Undefined (behaves as [`Free`](Self::Free))
    /// when either side is not positive.
    Custom { width: f64, height: f64 },
}

impl AspectRatio {
    /// Width / height, or `None` when the overlay is unconstrained.
    pub fn ratio(&self) -> Option<f64> {
        match *self {
            AspectRatio::Free => None,
            AspectRatio::Preset(p) => Some(p.ratio()),
            AspectRatio::Custom { width, height } => {
                (width > 0.0 && height > 0.0 && width.is_finite() && height.is_finite())
                    .then(|| width / height)
            }
        }
    }

    /// Parse `free`, a preset label like `16:9`, or any `W:H` custom ratio.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.eq_ignore_ascii_case("free") {
            return Some(AspectRatio::Free);
        }
        let (w, h) = input.split_once(':')?;
        let (w, h): (f64, f64) = (w.trim().parse().ok()?, h.trim().parse().ok()?);
        let preset = AspectPreset::ALL
            .into_iter()
            .find(|p| p.parts() == (w as u32, h as u32) && w.fract() == 0.0 && h.fract() == 0.0);
        Some(match preset {
            Some(p) => AspectRatio::Preset(p),
            None => AspectRatio::Custom {
                width: w,
                height: h,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn deserialized_quality_is_clamped() {
        let quality: Quality = serde_json::from_str("250").unwrap();
        assert_eq!(quality.value(), 100);
        let quality: Quality = serde_json::from_str("0").unwrap();
        assert_eq!(quality.value(), 1);
        assert_eq!(serde_json::to_string(&Quality::new(40)).unwrap(), "40");
    }

    #[test]
    fn quality_default_is_75() {
        assert_eq!(Quality::default().value(), 75);
    }

    #[test]
    fn preview_is_low_effort_final_is_high() {
        assert_eq!(EncodeMode::Preview.effort(), Effort::Low);
        assert_eq!(EncodeMode::Final.effort(), Effort::High);
    }

    #[test]
    fn presets_have_expected_ratios() {
        assert_eq!(AspectPreset::Square.ratio(), 1.0);
        assert_eq!(AspectPreset::Widescreen16x9.label(), "16:9");
        assert!(AspectPreset::Portrait3x4.ratio() < 1.0);
    }

    #[test]
    fn custom_ratio_undefined_when_not_positive() {
        let zero = AspectRatio::Custom {
            width: 0.0,
            height: 5.0,
        };
        let negative = AspectRatio::Custom {
            width: 3.0,
            height: -2.0,
        };
        assert_eq!(zero.ratio(), None);
        assert_eq!(negative.ratio(), None);
        assert_eq!(
            AspectRatio::Custom {
                width: 5.0,
                height: 2.0
            }
            .ratio(),
            Some(2.5)
        );
    }

    #[test]
    fn parse_aspect_ratio_inputs() {
        assert_eq!(AspectRatio::parse("free"), Some(AspectRatio::Free));
        assert_eq!(
            AspectRatio::parse("16:9"),
            Some(AspectRatio::Preset(AspectPreset::Widescreen16x9))
        );
        assert_eq!(
            AspectRatio::parse("5:2"),
            Some(AspectRatio::Custom {
                width: 5.0,
                height: 2.0
            })
        );
        assert_eq!(AspectRatio::parse("wide"), None);
    }
}
