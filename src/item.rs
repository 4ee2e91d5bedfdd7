//! Per-image editing state.
//!
//! An [`ImageItem`] is one loaded image: its source handle, the settings the
//! user is editing, the derived preview/final handles, and the status
//! machine tying them together.
//!
//! ```text
//!             edit                 fire ok
//!   Idle ───────────▶ PreviewPending ───────▶ PreviewReady ──┐
//!    ▲                 ▲        │                  │ edit    │ compress
//!    │ crop            └────────┼──────────────────┘         ▼
//!    │                          │ error                 Finalizing ──▶ Final
//!    │                          ▼                          │ error
//!    └──────────────────────  Failed ◀─────────────────────┘
//!                  (edit or compress recovers)
//! ```
//!
//! Transitions here are synchronous and pure with respect to I/O; the
//! [`registry`](crate::registry) wraps them with locking and task dispatch.
//! Every transition that makes in-flight work obsolete bumps `generation`.

use crate::debounce::DebounceSlot;
use crate::handles::{Handle, HandleInfo, ItemHandles, Slot};
use crate::imaging::{
    Dimensions, EncodeMode, EncodeRequest, OutputFormat, Quality, resolve_dimensions,
};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Stable identifier of an item, assigned at ingestion and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ItemId(pub(crate) u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    Idle,
    PreviewPending,
    PreviewReady,
    Finalizing,
    Final,
    Failed,
}

impl Status {
    pub fn label(self) -> &'static str {
        match self {
            Status::Idle => "idle",
            Status::PreviewPending => "preview pending",
            Status::PreviewReady => "preview ready",
            Status::Finalizing => "finalizing",
            Status::Final => "final",
            Status::Failed => "failed",
        }
    }
}

/// The user-editable compression settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Settings {
    pub quality: Quality,
    /// Requested output width; `None` means auto.
    pub width: Option<u32>,
    /// Requested output height; `None` means auto.
    pub height: Option<u32>,
}

impl Settings {
    pub fn with_quality(quality: Quality) -> Self {
        Self {
            quality,
            ..Self::default()
        }
    }

    pub fn request(&self, mode: EncodeMode, format: OutputFormat) -> EncodeRequest {
        EncodeRequest {
            quality: self.quality,
            target_width: self.width,
            target_height: self.height,
            mode,
            format,
        }
    }
}

/// One edit from the rendering layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    Quality(u32),
    Width(Option<u32>),
    Height(Option<u32>),
}

/// Which dimension field an edit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Width,
    Height,
}

impl Setting {
    pub fn dimension(axis: Axis, value: Option<u32>) -> Self {
        match axis {
            Axis::Width => Setting::Width(value),
            Axis::Height => Setting::Height(value),
        }
    }
}

/// Free-text dimension input that is neither blank nor a positive integer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid dimension {0:?}: expected a positive whole number or blank")]
pub struct InvalidDimension(pub String);

/// Parse the width/height text field.
///
/// Blank means auto (`None`). Zero, negatives and non-numbers are rejected.
pub fn parse_dimension_input(input: &str) -> Result<Option<u32>, InvalidDimension> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match trimmed.parse::<u32>() {
        Ok(value) if value > 0 => Ok(Some(value)),
        _ => Err(InvalidDimension(input.to_string())),
    }
}

/// One loaded image and its editing state.
#[derive(Debug)]
pub struct ImageItem {
    pub(crate) id: ItemId,
    pub(crate) name: String,
    pub(crate) source: Handle,
    pub(crate) source_digest: String,
    pub(crate) dimensions: Option<Dimensions>,
    pub(crate) settings: Settings,
    pub(crate) status: Status,
    pub(crate) error: Option<String>,
    pub(crate) handles: ItemHandles,
    /// Fingerprint of the request that produced the current preview.
    pub(crate) preview_key: Option<String>,
    pub(crate) generation: u64,
    pub(crate) debounce: DebounceSlot,
}

impl ImageItem {
    pub fn new(
        id: ItemId,
        name: String,
        source: Handle,
        source_digest: String,
        settings: Settings,
    ) -> Self {
        Self {
            id,
            name,
            source,
            source_digest,
            dimensions: None,
            settings,
            status: Status::Idle,
            error: None,
            handles: ItemHandles::default(),
            preview_key: None,
            generation: 0,
            debounce: DebounceSlot::default(),
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    fn bump(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Output dimensions for the current settings, once the source is probed.
    pub fn resolved_dimensions(&self) -> Option<Dimensions> {
        self.dimensions.map(|d| {
            resolve_dimensions(d.as_tuple(), self.settings.width, self.settings.height).into()
        })
    }

    /// Apply an edit. Returns `false` when nothing changed.
    ///
    /// A real change invalidates in-flight work, makes the final artifact
    /// stale, and leaves the item waiting for a preview.
    pub fn apply_setting(&mut self, setting: Setting) -> bool {
        let mut next = self.settings;
        match setting {
            Setting::Quality(q) => next.quality = Quality::new(q),
            Setting::Width(w) => next.width = w.filter(|&v| v > 0),
            Setting::Height(h) => next.height = h.filter(|&v| v > 0),
        }
        if next == self.settings && self.status != Status::Failed {
            return false;
        }

        self.settings = next;
        self.bump();
        self.handles.clear(Slot::Final);
        self.error = None;
        self.status = Status::PreviewPending;
        true
    }

    /// Start a preview regeneration; returns the generation the task must present.
    pub fn begin_preview(&mut self) -> u64 {
        self.status = Status::PreviewPending;
        self.bump()
    }

    /// Start a final encode; returns the generation the task must present.
    pub fn begin_final(&mut self) -> u64 {
        self.debounce.cancel();
        self.error = None;
        self.status = Status::Finalizing;
        self.bump()
    }

    /// Publish a preview produced for `generation`.
    ///
    /// A stale result is handed back so the caller can release it.
    pub fn accept_preview(
        &mut self,
        generation: u64,
        handle: Handle,
        key: String,
    ) -> Result<(), Handle> {
        if !self.is_current(generation) {
            return Err(handle);
        }
        self.handles.assign(Slot::Preview, handle);
        self.preview_key = Some(key);
        self.status = self.settled_status();
        Ok(())
    }

    /// The fingerprint of the live preview matches `key`: nothing to encode.
    pub fn preview_is_fresh(&self, key: &str) -> bool {
        self.handles.get(Slot::Preview).is_some() && self.preview_key.as_deref() == Some(key)
    }

    /// Mark the preview for `generation` as reused without re-encoding.
    pub fn reuse_preview(&mut self, generation: u64) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.status = self.settled_status();
        true
    }

    // A live final artifact always matches the current settings, since
    // every edit clears it.
    fn settled_status(&self) -> Status {
        if self.handles.get(Slot::Final).is_some() {
            Status::Final
        } else {
            Status::PreviewReady
        }
    }

    /// Publish a final artifact produced for `generation`.
    pub fn accept_final(&mut self, generation: u64, handle: Handle) -> Result<(), Handle> {
        if !self.is_current(generation) {
            return Err(handle);
        }
        self.handles.assign(Slot::Final, handle);
        self.status = Status::Final;
        Ok(())
    }

    /// Record a pipeline failure for `generation`. Settings are untouched.
    pub fn fail(&mut self, generation: u64, message: String) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.status = Status::Failed;
        self.error = Some(message);
        true
    }

    /// Replace the source with a materialized crop.
    ///
    /// All compression-derived state goes: derived handles are revoked,
    /// requested dimensions are cleared (they referred to the old geometry),
    /// any armed timer is cancelled and in-flight work becomes stale.
    /// Quality is kept.
    pub fn replace_source(&mut self, source: Handle, digest: String, dimensions: Dimensions) {
        self.debounce.cancel();
        self.bump();
        let previous = std::mem::replace(&mut self.source, source);
        previous.revoke();
        self.source_digest = digest;
        self.dimensions = Some(dimensions);
        self.handles.clear_all();
        self.preview_key = None;
        self.settings.width = None;
        self.settings.height = None;
        self.error = None;
        self.status = Status::Idle;
    }

    /// Release every handle the item owns, the source included.
    pub fn dispose(self) {
        let ImageItem {
            source,
            mut handles,
            mut debounce,
            ..
        } = self;
        debounce.cancel();
        handles.clear_all();
        source.revoke();
    }

    pub fn snapshot(&self) -> ItemSnapshot {
        ItemSnapshot {
            id: self.id,
            name: self.name.clone(),
            status: self.status,
            error: self.error.clone(),
            dimensions: self.dimensions,
            resolved: self.resolved_dimensions(),
            settings: self.settings,
            source: self.source.info(),
            preview: self.handles.get(Slot::Preview).map(Handle::info),
            final_artifact: self.handles.get(Slot::Final).map(Handle::info),
            generation: self.generation,
        }
    }
}

/// What the rendering layer reads about an item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemSnapshot {
    pub id: ItemId,
    pub name: String,
    pub status: Status,
    pub error: Option<String>,
    /// Original dimensions; `None` while probing.
    pub dimensions: Option<Dimensions>,
    /// Output dimensions for the current settings.
    pub resolved: Option<Dimensions>,
    pub settings: Settings,
    pub source: HandleInfo,
    pub preview: Option<HandleInfo>,
    pub final_artifact: Option<HandleInfo>,
    pub generation: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handles::HandleTracker;
    use std::sync::Arc;

    fn item(tracker: &Arc<HandleTracker>) -> ImageItem {
        let source = tracker.issue(vec![0u8; 100], None, "image/png");
        let mut item = ImageItem::new(
            ItemId(1),
            "photo.png".into(),
            source,
            "digest".into(),
            Settings::default(),
        );
        item.dimensions = Some(Dimensions::new(1000, 500));
        item
    }

    fn artifact(tracker: &Arc<HandleTracker>) -> Handle {
        tracker.issue(vec![1u8; 10], Some(Dimensions::new(1000, 500)), "image/avif")
    }

    #[test]
    fn dimension_input_parsing() {
        assert_eq!(parse_dimension_input(""), Ok(None));
        assert_eq!(parse_dimension_input("   "), Ok(None));
        assert_eq!(parse_dimension_input("400"), Ok(Some(400)));
        assert_eq!(parse_dimension_input(" 64 "), Ok(Some(64)));
        assert!(parse_dimension_input("0").is_err());
        assert!(parse_dimension_input("-5").is_err());
        assert!(parse_dimension_input("12px").is_err());
        assert!(parse_dimension_input("1.5").is_err());
    }

    #[test]
    fn new_item_is_idle() {
        let tracker = HandleTracker::new();
        let item = item(&tracker);
        assert_eq!(item.status(), Status::Idle);
        assert_eq!(item.settings().quality, Quality::default());
        assert_eq!(item.resolved_dimensions(), Some(Dimensions::new(1000, 500)));
    }

    #[test]
    fn edit_moves_to_preview_pending_and_bumps_generation() {
        let tracker = HandleTracker::new();
        let mut item = item(&tracker);

        assert!(item.apply_setting(Setting::Width(Some(400))));

        assert_eq!(item.status(), Status::PreviewPending);
        assert_eq!(item.generation(), 1);
        assert_eq!(item.resolved_dimensions(), Some(Dimensions::new(400, 200)));
    }

    #[test]
    fn identical_edit_is_a_no_op() {
        let tracker = HandleTracker::new();
        let mut item = item(&tracker);
        let quality = item.settings().quality.value();

        assert!(!item.apply_setting(Setting::Quality(quality)));
        assert_eq!(item.generation(), 0);
        assert_eq!(item.status(), Status::Idle);
    }

    #[test]
    fn quality_edits_are_clamped() {
        let tracker = HandleTracker::new();
        let mut item = item(&tracker);
        item.apply_setting(Setting::Quality(0));
        assert_eq!(item.settings().quality.value(), 1);
        item.apply_setting(Setting::Quality(500));
        assert_eq!(item.settings().quality.value(), 100);
    }

    #[test]
    fn zero_dimension_means_auto() {
        let tracker = HandleTracker::new();
        let mut item = item(&tracker);
        item.apply_setting(Setting::Height(Some(0)));
        assert_eq!(item.settings().height, None);
    }

    #[test]
    fn stale_preview_is_handed_back() {
        let tracker = HandleTracker::new();
        let mut item = item(&tracker);

        let old = item.begin_preview();
        let new = item.begin_preview();

        assert!(item.accept_preview(new, artifact(&tracker), "k2".into()).is_ok());
        let rejected = item.accept_preview(old, artifact(&tracker), "k1".into());

        assert!(rejected.is_err());
        drop(rejected);
        assert_eq!(item.status(), Status::PreviewReady);
        assert_eq!(item.preview_key.as_deref(), Some("k2"));
        // source + one preview
        assert_eq!(tracker.stats().live, 2);
    }

    #[test]
    fn final_flow() {
        let tracker = HandleTracker::new();
        let mut item = item(&tracker);

        let generation = item.begin_final();
        assert_eq!(item.status(), Status::Finalizing);
        assert!(item.accept_final(generation, artifact(&tracker)).is_ok());
        assert_eq!(item.status(), Status::Final);
        assert!(item.snapshot().final_artifact.is_some());
    }

    #[test]
    fn preview_after_final_keeps_final_status() {
        let tracker = HandleTracker::new();
        let mut item = item(&tracker);
        let generation = item.begin_preview();
        item.accept_preview(generation, artifact(&tracker), "key".into())
            .unwrap();
        let generation = item.begin_final();
        item.accept_final(generation, artifact(&tracker)).unwrap();

        let generation = item.begin_preview();
        assert!(item.preview_is_fresh("key"));
        assert!(item.reuse_preview(generation));
        assert_eq!(item.status(), Status::Final);

        let generation = item.begin_preview();
        item.accept_preview(generation, artifact(&tracker), "other".into())
            .unwrap();
        assert_eq!(item.status(), Status::Final);
        assert!(item.snapshot().final_artifact.is_some());
    }

    #[test]
    fn edit_during_finalize_makes_result_stale() {
        let tracker = HandleTracker::new();
        let mut item = item(&tracker);

        let generation = item.begin_final();
        item.apply_setting(Setting::Quality(20));

        assert!(item.accept_final(generation, artifact(&tracker)).is_err());
        assert_eq!(item.status(), Status::PreviewPending);
        assert!(item.snapshot().final_artifact.is_none());
    }

    #[test]
    fn edit_revokes_stale_final() {
        let tracker = HandleTracker::new();
        let mut item = item(&tracker);
        let generation = item.begin_final();
        item.accept_final(generation, artifact(&tracker)).unwrap();

        item.apply_setting(Setting::Quality(10));

        assert!(item.snapshot().final_artifact.is_none());
        assert_eq!(tracker.stats().live, 1);
    }

    #[test]
    fn failure_preserves_settings_and_recovers_on_edit() {
        let tracker = HandleTracker::new();
        let mut item = item(&tracker);
        item.apply_setting(Setting::Quality(42));
        item.apply_setting(Setting::Width(Some(300)));

        let generation = item.begin_preview();
        assert!(item.fail(generation, "boom".into()));
        assert_eq!(item.status(), Status::Failed);
        assert_eq!(item.settings().quality.value(), 42);
        assert_eq!(item.settings().width, Some(300));

        // Re-submitting the same value still recovers a failed item
        assert!(item.apply_setting(Setting::Quality(42)));
        assert_eq!(item.status(), Status::PreviewPending);
        assert!(item.snapshot().error.is_none());
    }

    #[test]
    fn stale_failure_is_ignored() {
        let tracker = HandleTracker::new();
        let mut item = item(&tracker);
        let old = item.begin_preview();
        item.begin_preview();
        assert!(!item.fail(old, "late".into()));
        assert_eq!(item.status(), Status::PreviewPending);
    }

    #[test]
    fn replace_source_resets_compression_state() {
        let tracker = HandleTracker::new();
        let mut item = item(&tracker);
        item.apply_setting(Setting::Quality(30));
        item.apply_setting(Setting::Width(Some(200)));
        let generation = item.begin_preview();
        item.accept_preview(generation, artifact(&tracker), "k".into())
            .unwrap();
        let generation = item.begin_final();
        item.accept_final(generation, artifact(&tracker)).unwrap();
        let before = item.generation();

        let cropped = tracker.issue(vec![2u8; 40], None, "image/png");
        item.replace_source(cropped, "new-digest".into(), Dimensions::new(300, 200));

        let snap = item.snapshot();
        assert_eq!(snap.status, Status::Idle);
        assert!(snap.preview.is_none());
        assert!(snap.final_artifact.is_none());
        assert_eq!(snap.dimensions, Some(Dimensions::new(300, 200)));
        assert_eq!(snap.settings.width, None);
        assert_eq!(snap.settings.quality.value(), 30);
        assert_eq!(snap.source.size, 40);
        assert!(item.generation() > before);
        // only the new source remains
        assert_eq!(tracker.stats().live, 1);
    }

    #[test]
    fn dispose_revokes_all_handles() {
        let tracker = HandleTracker::new();
        let mut item = item(&tracker);
        let generation = item.begin_preview();
        item.accept_preview(generation, artifact(&tracker), "k".into())
            .unwrap();

        item.dispose();

        assert_eq!(tracker.stats().live, 0);
    }
}
