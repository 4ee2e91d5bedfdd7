//! Pure calculation functions for image dimensions and crop geometry.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::CropRect;

/// Resolve the output dimensions of an encode from optional targets.
///
/// - Neither target given → the original dimensions, unchanged.
/// - Both given → exactly `(target_w, target_h)`; aspect ratio is not preserved.
/// - Only one given → the other side follows the original aspect ratio,
///   rounded to the nearest pixel and never below 1.
///
/// # Examples
/// ```
/// # use pressroom::imaging::resolve_dimensions;
/// assert_eq!(resolve_dimensions((1000, 500), Some(400), None), (400, 200));
/// assert_eq!(resolve_dimensions((1000, 500), None, None), (1000, 500));
/// assert_eq!(resolve_dimensions((1000, 500), Some(300), Some(300)), (300, 300));
/// ```
pub fn resolve_dimensions(
    original: (u32, u32),
    target_w: Option<u32>,
    target_h: Option<u32>,
) -> (u32, u32) {
    let (orig_w, orig_h) = original;

    match (target_w, target_h) {
        (None, None) => original,
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => {
            if orig_w == 0 {
                return (w, orig_h);
            }
            let h = (w as f64 * orig_h as f64 / orig_w as f64).round() as u32;
            (w, h.max(1))
        }
        (None, Some(h)) => {
            if orig_h == 0 {
                return (orig_w, h);
            }
            let w = (h as f64 * orig_w as f64 / orig_h as f64).round() as u32;
            (w.max(1), h)
        }
    }
}

/// Intersect a rectangle with the image bounds.
///
/// Returns `None` when nothing of the rectangle lies inside the image.
pub fn clamp_rect(rect: CropRect, bounds: (u32, u32)) -> Option<CropRect> {
    let (bw, bh) = bounds;
    if rect.x >= bw || rect.y >= bh {
        return None;
    }
    let width = rect.width.min(bw - rect.x);
    let height = rect.height.min(bh - rect.y);
    if width == 0 || height == 0 {
        return None;
    }
    Some(CropRect {
        x: rect.x,
        y: rect.y,
        width,
        height,
    })
}

/// Shrink a rectangle around its center until it matches `ratio` (width / height).
///
/// The rectangle is clamped to the image bounds first, so the result always
/// lies inside the image. Neither side drops below 1 pixel.
pub fn constrain_to_ratio(rect: CropRect, ratio: f64, bounds: (u32, u32)) -> Option<CropRect> {
    let clamped = clamp_rect(rect, bounds)?;
    let current = clamped.width as f64 / clamped.height as f64;

    let (width, height) = if current > ratio {
        // Too wide: keep the height, narrow the width
        let w = (clamped.height as f64 * ratio).round() as u32;
        (w.clamp(1, clamped.width), clamped.height)
    } else {
        // Too tall (or exact): keep the width, shorten the height
        let h = (clamped.width as f64 / ratio).round() as u32;
        (clamped.width, h.clamp(1, clamped.height))
    };

    Some(CropRect {
        x: clamped.x + (clamped.width - width) / 2,
        y: clamped.y + (clamped.height - height) / 2,
        width,
        height,
    })
}

/// Fit an overlay rectangle to the image under an optional ratio.
///
/// Without a ratio the rectangle is only clamped.
pub fn fit_crop_rect(rect: CropRect, ratio: Option<f64>, bounds: (u32, u32)) -> Option<CropRect> {
    match ratio {
        Some(ratio) => constrain_to_ratio(rect, ratio, bounds),
        None => clamp_rect(rect, bounds),
    }
}

/// The largest rectangle of the given ratio that fits the image, centered.
///
/// With no ratio, the whole image is selected.
pub fn largest_centered_rect(bounds: (u32, u32), ratio: Option<f64>) -> CropRect {
    let full = CropRect {
        x: 0,
        y: 0,
        width: bounds.0,
        height: bounds.1,
    };
    match ratio {
        Some(r) => constrain_to_ratio(full, r, bounds).unwrap_or(full),
        None => full,
    }
}

/// Percentage saved going from `original` bytes to `encoded` bytes.
///
/// Negative when the encoded artifact is larger than the original.
pub fn savings_percent(original: u64, encoded: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    (1.0 - encoded as f64 / original as f64) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: u32, y: u32, width: u32, height: u32) -> CropRect {
        CropRect {
            x,
            y,
            width,
            height,
        }
    }

    // =========================================================================
    // resolve_dimensions tests
    // =========================================================================

    #[test]
    fn resolve_without_targets_keeps_original() {
        assert_eq!(resolve_dimensions((1920, 1080), None, None), (1920, 1080));
    }

    #[test]
    fn resolve_with_both_targets_ignores_aspect() {
        assert_eq!(
            resolve_dimensions((1920, 1080), Some(500), Some(500)),
            (500, 500)
        );
    }

    #[test]
    fn resolve_width_only_preserves_aspect() {
        // 1000x500 → width 400 → height 200
        assert_eq!(resolve_dimensions((1000, 500), Some(400), None), (400, 200));
    }

    #[test]
    fn resolve_height_only_preserves_aspect() {
        // 1000x500 → height 100 → width 200
        assert_eq!(resolve_dimensions((1000, 500), None, Some(100)), (200, 100));
    }

    #[test]
    fn resolve_rounds_to_nearest() {
        // 1920x1080 → width 1000 → 562.5 rounds to 563
        assert_eq!(
            resolve_dimensions((1920, 1080), Some(1000), None),
            (1000, 563)
        );
        // 3x2 → height 1 → width 1.5 rounds to 2
        assert_eq!(resolve_dimensions((3, 2), None, Some(1)), (2, 1));
    }

    #[test]
    fn resolve_never_collapses_to_zero() {
        // Extreme panorama: 10000x10 → width 50 → height 0.05 → clamped to 1
        assert_eq!(resolve_dimensions((10000, 10), Some(50), None), (50, 1));
    }

    #[test]
    fn resolve_is_total_on_zero_original() {
        assert_eq!(resolve_dimensions((0, 0), Some(10), None), (10, 0));
        assert_eq!(resolve_dimensions((0, 0), None, Some(10)), (0, 10));
    }

    #[test]
    fn resolve_is_idempotent() {
        let originals = [(1000, 500), (640, 480), (3000, 2000), (7, 13)];
        let targets = [None, Some(1), Some(99), Some(400)];
        for &orig in &originals {
            for &tw in &targets {
                for &th in &targets {
                    let once = resolve_dimensions(orig, tw, th);
                    let twice = resolve_dimensions(once, tw, th);
                    assert_eq!(once, twice, "orig={orig:?} tw={tw:?} th={th:?}");
                }
            }
        }
    }

    #[test]
    fn resolve_single_target_within_one_pixel_of_ratio() {
        let originals = [(1000, 500), (640, 480), (1920, 1080), (333, 777)];
        for &(ow, oh) in &originals {
            for tw in [1u32, 17, 250, 1024] {
                let (w, h) = resolve_dimensions((ow, oh), Some(tw), None);
                assert_eq!(w, tw);
                let exact = tw as f64 * oh as f64 / ow as f64;
                assert!((h as f64 - exact).abs() <= 1.0, "{ow}x{oh} → {w}x{h}");
            }
        }
    }

    // =========================================================================
    // Crop geometry tests
    // =========================================================================

    #[test]
    fn clamp_rect_inside_bounds_is_unchanged() {
        assert_eq!(
            clamp_rect(rect(10, 10, 50, 50), (100, 100)),
            Some(rect(10, 10, 50, 50))
        );
    }

    #[test]
    fn clamp_rect_trims_overflow() {
        assert_eq!(
            clamp_rect(rect(80, 90, 50, 50), (100, 100)),
            Some(rect(80, 90, 20, 10))
        );
    }

    #[test]
    fn clamp_rect_outside_is_none() {
        assert_eq!(clamp_rect(rect(100, 0, 10, 10), (100, 100)), None);
        assert_eq!(clamp_rect(rect(0, 0, 0, 10), (100, 100)), None);
    }

    #[test]
    fn constrain_wide_rect_to_square() {
        // 200x100 → 1:1 keeps height, narrows width around the center
        assert_eq!(
            constrain_to_ratio(rect(0, 0, 200, 100), 1.0, (400, 400)),
            Some(rect(50, 0, 100, 100))
        );
    }

    #[test]
    fn constrain_tall_rect_to_16_9() {
        // 160x200 → 16:9 keeps width 160, height 90, centered vertically
        assert_eq!(
            constrain_to_ratio(rect(0, 0, 160, 200), 16.0 / 9.0, (400, 400)),
            Some(rect(0, 55, 160, 90))
        );
    }

    #[test]
    fn fit_crop_rect_clamps_without_ratio() {
        assert_eq!(
            fit_crop_rect(rect(700, 0, 300, 100), None, (800, 600)),
            Some(rect(700, 0, 100, 100))
        );
    }

    #[test]
    fn fit_crop_rect_applies_ratio() {
        assert_eq!(
            fit_crop_rect(rect(0, 0, 300, 100), Some(1.0), (800, 600)),
            Some(rect(100, 0, 100, 100))
        );
        assert_eq!(fit_crop_rect(rect(900, 0, 10, 10), Some(1.0), (800, 600)), None);
    }

    #[test]
    fn largest_centered_rect_for_landscape_image() {
        // 1920x1080 with 1:1 → 1080x1080 centered
        assert_eq!(
            largest_centered_rect((1920, 1080), Some(1.0)),
            rect(420, 0, 1080, 1080)
        );
    }

    #[test]
    fn largest_centered_rect_free_is_full_image() {
        assert_eq!(
            largest_centered_rect((640, 480), None),
            rect(0, 0, 640, 480)
        );
    }

    #[test]
    fn savings_percent_values() {
        assert_eq!(savings_percent(1000, 250), 75.0);
        assert_eq!(savings_percent(1000, 2000), -100.0);
        assert_eq!(savings_percent(0, 10), 0.0);
    }
}
