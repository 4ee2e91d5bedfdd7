//! Crop overlay state.
//!
//! A [`CropState`] lives only while the crop view of one item is open. It
//! holds the overlay rectangle and the aspect constraint, and keeps the two
//! consistent: every rectangle it hands out lies inside the image and, when
//! a ratio is active, matches it. Applying the crop is a registry command
//! ([`Registry::apply_crop`](crate::registry::Registry::apply_crop)) that
//! takes [`CropState::rect`] and [`CropState::aspect`].

use crate::imaging::calculations::{fit_crop_rect, largest_centered_rect};
use crate::imaging::{AspectRatio, CropRect, Dimensions};
use crate::item::ItemId;

#[derive(Debug, Clone, PartialEq)]
pub struct CropState {
    item: ItemId,
    bounds: Dimensions,
    aspect: AspectRatio,
    rect: CropRect,
}

impl CropState {
    /// Open the overlay with the largest centered rectangle of `aspect`.
    pub fn new(item: ItemId, bounds: Dimensions, aspect: AspectRatio) -> Self {
        Self {
            item,
            bounds,
            aspect,
            rect: largest_centered_rect(bounds.as_tuple(), aspect.ratio()),
        }
    }

    pub fn item(&self) -> ItemId {
        self.item
    }

    pub fn bounds(&self) -> Dimensions {
        self.bounds
    }

    pub fn aspect(&self) -> AspectRatio {
        self.aspect
    }

    pub fn rect(&self) -> CropRect {
        self.rect
    }

    /// Move or resize the overlay.
    ///
    /// Returns `false` and keeps the previous rectangle when `rect` misses
    /// the image entirely.
    pub fn set_rect(&mut self, rect: CropRect) -> bool {
        match self.fit(rect) {
            Some(fitted) => {
                self.rect = fitted;
                true
            }
            None => false,
        }
    }

    /// Switch the aspect constraint, shrinking the current rectangle to it.
    pub fn set_aspect(&mut self, aspect: AspectRatio) {
        self.aspect = aspect;
        self.rect = self
            .fit(self.rect)
            .unwrap_or_else(|| largest_centered_rect(self.bounds.as_tuple(), aspect.ratio()));
    }

    /// Back to the largest centered rectangle of the current ratio.
    pub fn reset(&mut self) {
        self.rect = largest_centered_rect(self.bounds.as_tuple(), self.aspect.ratio());
    }

    fn fit(&self, rect: CropRect) -> Option<CropRect> {
        fit_crop_rect(rect, self.aspect.ratio(), self.bounds.as_tuple())
    }
}
