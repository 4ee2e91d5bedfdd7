//! The image registry: every loaded item and the commands that edit them.
//!
//! The rendering layer talks to a [`Registry`] through explicit commands
//! ([`ingest`](Registry::ingest), [`update_setting`](Registry::update_setting),
//! [`apply_crop`](Registry::apply_crop), [`compress`](Registry::compress),
//! [`remove`](Registry::remove)) and reads back [`ItemSnapshot`]s. Changes
//! are announced as [`EditorEvent`]s on an unbounded channel.
//!
//! ## Flow
//!
//! ```text
//! update_setting ─▶ item's debounce slot (re)armed
//!                        │ quiet window elapses
//!                        ▼
//!                  claim(token) ─▶ preview encode (blocking pool)
//!                                        │
//!                                        ▼
//!                          generation unchanged? ─▶ swap preview handle
//!                                        │ no
//!                                        ▼
//!                                  result dropped
//! ```
//!
//! `compress` skips the debounce and disarms any pending timer. `apply_crop`
//! replaces the source and resets the item's compression state.
//!
//! ## Concurrency
//!
//! All state sits behind one `std::sync::Mutex` that is never held across an
//! `.await`. Decoding and encoding run on tokio's blocking pool. Each task
//! records the item's generation at dispatch and commits only if the item
//! still exists with that generation, so an older task finishing late can
//! never overwrite newer work. Commands that arm timers must be called from
//! within a tokio runtime.

use crate::config::EditorConfig;
use crate::crop::CropState;
use crate::fingerprint::{encode_key, hash_bytes};
use crate::handles::{HandleId, HandleInfo, HandleStats, HandleTracker, Slot};
use crate::imaging::{
    Artifact, AspectRatio, BackendError, CropRect, Dimensions, EncodeMode, EncodeRequest,
    ImageBackend, get_dimensions, materialize_crop, run_encode,
};
use crate::ingest::IngestedFile;
use crate::item::{
    Axis, ImageItem, InvalidDimension, ItemId, ItemSnapshot, Setting, Settings,
    parse_dimension_input,
};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use thiserror::Error;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinError;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("cannot load {name}: {reason}")]
    Ingestion { name: String, reason: String },
    #[error("no item {0}")]
    UnknownItem(ItemId),
    #[error("item {0} has no known dimensions yet")]
    NotProbed(ItemId),
    #[error(transparent)]
    InvalidSetting(#[from] InvalidDimension),
    #[error(transparent)]
    Encode(#[from] BackendError),
    #[error("crop failed: {0}")]
    CropMaterialization(#[source] BackendError),
    #[error("worker task failed: {0}")]
    Join(#[from] JoinError),
}

/// Notifications for the rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EditorEvent {
    Probed {
        id: ItemId,
        dimensions: Dimensions,
    },
    /// A preview was published. `reused` means the settings matched the
    /// existing preview and nothing was encoded.
    PreviewReady {
        id: ItemId,
        preview: HandleInfo,
        reused: bool,
    },
    Finalized {
        id: ItemId,
        artifact: HandleInfo,
    },
    Failed {
        id: ItemId,
        message: String,
    },
    CropApplied {
        id: ItemId,
        dimensions: Dimensions,
    },
    CropFailed {
        id: ItemId,
        message: String,
    },
    Removed {
        id: ItemId,
    },
}

impl EditorEvent {
    pub fn item(&self) -> ItemId {
        match self {
            EditorEvent::Probed { id, .. }
            | EditorEvent::PreviewReady { id, .. }
            | EditorEvent::Finalized { id, .. }
            | EditorEvent::Failed { id, .. }
            | EditorEvent::CropApplied { id, .. }
            | EditorEvent::CropFailed { id, .. }
            | EditorEvent::Removed { id } => *id,
        }
    }
}

#[derive(Default)]
struct RegistryState {
    items: Vec<ImageItem>,
    next_id: u64,
}

impl RegistryState {
    fn get(&self, id: ItemId) -> Result<&ImageItem, EditorError> {
        self.items
            .iter()
            .find(|item| item.id == id)
            .ok_or(EditorError::UnknownItem(id))
    }

    fn get_mut(&mut self, id: ItemId) -> Result<&mut ImageItem, EditorError> {
        self.items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or(EditorError::UnknownItem(id))
    }
}

struct Inner {
    backend: Arc<dyn ImageBackend>,
    config: EditorConfig,
    tracker: Arc<HandleTracker>,
    state: Mutex<RegistryState>,
    events: Option<UnboundedSender<EditorEvent>>,
}

/// Work captured under the lock for a preview or final encode.
struct EncodeJob {
    generation: u64,
    source: Arc<[u8]>,
    request: EncodeRequest,
    key: String,
}

/// Shared handle to the registry. Cloning is cheap; clones see the same items.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<Inner>,
}

impl Registry {
    pub fn new(backend: Arc<dyn ImageBackend>, config: EditorConfig) -> Self {
        Self::build(backend, config, None)
    }

    /// A registry plus the receiving end of its event channel.
    pub fn with_events(
        backend: Arc<dyn ImageBackend>,
        config: EditorConfig,
    ) -> (Self, UnboundedReceiver<EditorEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self::build(backend, config, Some(tx)), rx)
    }

    fn build(
        backend: Arc<dyn ImageBackend>,
        config: EditorConfig,
        events: Option<UnboundedSender<EditorEvent>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                config,
                tracker: HandleTracker::new(),
                state: Mutex::new(RegistryState::default()),
                events,
            }),
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.inner.config
    }

    // A panic under this lock leaves each item internally consistent, since
    // every transition is applied by a single method call.
    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: EditorEvent) {
        if let Some(tx) = &self.inner.events {
            if tx.send(event).is_err() {
                log::trace!("event receiver dropped");
            }
        }
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Load a file as a new item and probe its dimensions.
    ///
    /// Empty buffers and non-image media types are rejected without creating
    /// an item. A file that cannot be probed is still added, in `Failed`
    /// state, so the user sees what went wrong.
    pub async fn ingest(&self, file: IngestedFile) -> Result<ItemId, EditorError> {
        let IngestedFile {
            name,
            media_type,
            bytes,
        } = file;
        if bytes.is_empty() {
            return Err(EditorError::Ingestion {
                name,
                reason: "file is empty".into(),
            });
        }
        if !media_type.starts_with("image/") {
            return Err(EditorError::Ingestion {
                name,
                reason: format!("{media_type} is not an image type"),
            });
        }

        let bytes: Arc<[u8]> = bytes.into();
        let digest = {
            let bytes = Arc::clone(&bytes);
            tokio::task::spawn_blocking(move || hash_bytes(&bytes)).await?
        };

        let (id, source_id) = {
            let mut state = self.lock();
            state.next_id += 1;
            let id = ItemId(state.next_id);
            let source = self.inner.tracker.issue(Arc::clone(&bytes), None, media_type);
            let source_id = source.id();
            let settings = Settings::with_quality(self.inner.config.default_quality());
            state
                .items
                .push(ImageItem::new(id, name.clone(), source, digest, settings));
            (id, source_id)
        };
        log::info!("loaded {name} as {id} ({} bytes)", bytes.len());

        let backend = Arc::clone(&self.inner.backend);
        let probed =
            tokio::task::spawn_blocking(move || get_dimensions(backend.as_ref(), &bytes)).await;

        let mut state = self.lock();
        let Ok(item) = state.get_mut(id) else {
            log::debug!("{id} removed while probing");
            return Ok(id);
        };
        if item.source.id() != source_id {
            log::debug!("{id} source replaced while probing");
            return Ok(id);
        }
        match probed {
            Ok(Ok(dimensions)) => {
                item.dimensions = Some(dimensions);
                log::debug!("{id} is {}x{}", dimensions.width, dimensions.height);
                self.emit(EditorEvent::Probed { id, dimensions });
            }
            Ok(Err(e)) => {
                let generation = item.generation;
                self.record_failure(item, generation, e.to_string());
            }
            Err(e) => {
                let generation = item.generation;
                self.record_failure(item, generation, e.to_string());
            }
        }
        Ok(id)
    }

    /// Change one setting and (re)arm the item's debounce timer.
    ///
    /// An unchanged value is a no-op and leaves any pending timer alone.
    pub fn update_setting(&self, id: ItemId, setting: Setting) -> Result<(), EditorError> {
        let mut state = self.lock();
        let item = state.get_mut(id)?;
        if !item.apply_setting(setting) {
            return Ok(());
        }
        log::debug!("{id} {setting:?}, waiting for quiet");

        let registry = Arc::downgrade(&self.inner);
        let window = self.inner.config.debounce_window();
        item.debounce.arm(window, move |token| async move {
            if let Some(inner) = Weak::upgrade(&registry) {
                Registry { inner }.on_debounce_fire(id, token).await;
            }
        });
        Ok(())
    }

    /// Apply free-text width/height input. Blank means auto.
    ///
    /// Invalid text is rejected and the previous value stays.
    pub fn update_dimension_text(
        &self,
        id: ItemId,
        axis: Axis,
        input: &str,
    ) -> Result<(), EditorError> {
        let value = parse_dimension_input(input)?;
        self.update_setting(id, Setting::dimension(axis, value))
    }

    /// Rebuild the preview now, without waiting for the debounce window.
    ///
    /// A result that went stale while encoding is dropped and reported as
    /// success; only a failure that reached the item is an error.
    pub async fn regenerate_preview(&self, id: ItemId) -> Result<(), EditorError> {
        let job = {
            let mut state = self.lock();
            let item = state.get_mut(id)?;
            item.debounce.cancel();
            self.prepare_preview(item)
        };
        match job {
            Some(job) => self.run_preview(id, job).await,
            None => Ok(()),
        }
    }

    /// Final high-effort encode with the current settings.
    ///
    /// Returns the published artifact, or `None` when the item changed or
    /// disappeared while encoding and the result was discarded.
    pub async fn compress(&self, id: ItemId) -> Result<Option<HandleInfo>, EditorError> {
        let job = {
            let mut state = self.lock();
            let item = state.get_mut(id)?;
            let request = item
                .settings
                .request(EncodeMode::Final, self.inner.config.encoder.format);
            let key = encode_key(&item.source_digest, &request);
            let generation = item.begin_final();
            EncodeJob {
                generation,
                source: item.source.bytes(),
                request,
                key,
            }
        };
        log::debug!("{id} final encode at quality {}", job.request.quality.value());

        let encoded = self.encode(&job).await;

        let mut state = self.lock();
        let Ok(item) = state.get_mut(id) else {
            log::debug!("{id} removed during final encode, discarding");
            return Ok(None);
        };
        if !item.is_current(job.generation) {
            log::debug!("{id} changed during final encode, discarding");
            return Ok(None);
        }
        match encoded {
            Ok(artifact) => {
                let handle = self.inner.tracker.issue_artifact(artifact);
                let info = handle.info();
                if let Err(stale) = item.accept_final(job.generation, handle) {
                    stale.revoke();
                    return Ok(None);
                }
                log::info!("{id} compressed to {} bytes", info.size);
                self.emit(EditorEvent::Finalized {
                    id,
                    artifact: info.clone(),
                });
                Ok(Some(info))
            }
            Err(e) => {
                self.record_failure(item, job.generation, e.to_string());
                Err(e)
            }
        }
    }

    /// Crop the source to `rect` and make the result the new original.
    ///
    /// `rect` is clamped to the image and, when `aspect` defines a ratio,
    /// shrunk around its center to match it. On success the item's preview and final artifacts are revoked, its
    /// requested dimensions cleared and its status reset to `Idle`. Returns
    /// the new dimensions, or `None` when the item changed underneath the
    /// crop and the result was discarded. A failed crop leaves the item as
    /// it was.
    pub async fn apply_crop(
        &self,
        id: ItemId,
        rect: CropRect,
        aspect: AspectRatio,
    ) -> Result<Option<Dimensions>, EditorError> {
        let (source, source_id) = {
            let state = self.lock();
            let item = state.get(id)?;
            (item.source.bytes(), item.source.id())
        };
        log::debug!(
            "{id} cropping to {}x{}+{}+{} ({aspect:?})",
            rect.width,
            rect.height,
            rect.x,
            rect.y
        );

        let backend = Arc::clone(&self.inner.backend);
        let cropped = tokio::task::spawn_blocking(move || {
            materialize_crop(backend.as_ref(), &source, rect, aspect).map(|artifact| {
                let digest = hash_bytes(&artifact.bytes);
                (artifact, digest)
            })
        })
        .await?;

        let (artifact, digest) = match cropped {
            Ok(done) => done,
            Err(e) => {
                log::warn!("{id} crop failed: {e}");
                self.emit(EditorEvent::CropFailed {
                    id,
                    message: e.to_string(),
                });
                return Err(EditorError::CropMaterialization(e));
            }
        };

        let mut state = self.lock();
        let Ok(item) = state.get_mut(id) else {
            log::debug!("{id} removed while cropping, discarding");
            return Ok(None);
        };
        if !self.source_unchanged(item, source_id) {
            log::debug!("{id} source replaced while cropping, discarding");
            return Ok(None);
        }
        let dimensions = artifact.dimensions;
        let source = self.inner.tracker.issue_artifact(artifact);
        item.replace_source(source, digest, dimensions);
        log::info!("{id} cropped to {}x{}", dimensions.width, dimensions.height);
        self.emit(EditorEvent::CropApplied { id, dimensions });
        Ok(Some(dimensions))
    }

    /// Drop an item, revoking all of its handles and cancelling its timer.
    pub fn remove(&self, id: ItemId) -> Result<(), EditorError> {
        let item = {
            let mut state = self.lock();
            let position = state
                .items
                .iter()
                .position(|item| item.id == id)
                .ok_or(EditorError::UnknownItem(id))?;
            state.items.remove(position)
        };
        item.dispose();
        log::debug!("{id} removed");
        self.emit(EditorEvent::Removed { id });
        Ok(())
    }

    /// Open the crop overlay for an item whose dimensions are known.
    pub fn open_crop(&self, id: ItemId, aspect: AspectRatio) -> Result<CropState, EditorError> {
        let state = self.lock();
        let item = state.get(id)?;
        let bounds = item.dimensions.ok_or(EditorError::NotProbed(id))?;
        Ok(CropState::new(id, bounds, aspect))
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn snapshot(&self) -> Vec<ItemSnapshot> {
        self.lock().items.iter().map(ImageItem::snapshot).collect()
    }

    pub fn item(&self, id: ItemId) -> Option<ItemSnapshot> {
        self.lock().get(id).ok().map(ImageItem::snapshot)
    }

    pub fn source_bytes(&self, id: ItemId) -> Option<Arc<[u8]>> {
        self.lock().get(id).ok().map(|item| item.source.bytes())
    }

    pub fn preview_bytes(&self, id: ItemId) -> Option<Arc<[u8]>> {
        self.slot_bytes(id, Slot::Preview)
    }

    pub fn final_bytes(&self, id: ItemId) -> Option<Arc<[u8]>> {
        self.slot_bytes(id, Slot::Final)
    }

    fn slot_bytes(&self, id: ItemId, slot: Slot) -> Option<Arc<[u8]>> {
        let state = self.lock();
        let item = state.get(id).ok()?;
        item.handles.get(slot).map(|handle| handle.bytes())
    }

    /// Whether a debounced preview is waiting to fire for this item.
    pub fn has_pending_preview(&self, id: ItemId) -> bool {
        self.lock()
            .get(id)
            .is_ok_and(|item| item.debounce.is_armed())
    }

    pub fn handle_stats(&self) -> HandleStats {
        self.inner.tracker.stats()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn on_debounce_fire(&self, id: ItemId, token: u64) {
        let job = {
            let mut state = self.lock();
            let Ok(item) = state.get_mut(id) else {
                return;
            };
            if !item.debounce.claim(token) {
                log::trace!("{id} superseded timer woke up");
                return;
            }
            self.prepare_preview(item)
        };
        if let Some(job) = job {
            if let Err(e) = self.run_preview(id, job).await {
                log::debug!("{id} debounced preview: {e}");
            }
        }
    }

    /// Start a preview under the lock. `None` when the existing preview
    /// already matches the current settings.
    fn prepare_preview(&self, item: &mut ImageItem) -> Option<EncodeJob> {
        let request = item
            .settings
            .request(EncodeMode::Preview, self.inner.config.encoder.format);
        let key = encode_key(&item.source_digest, &request);
        let generation = item.begin_preview();

        if item.preview_is_fresh(&key) && item.reuse_preview(generation) {
            log::debug!("{} preview already matches, skipping encode", item.id);
            if let Some(preview) = item.handles.get(Slot::Preview) {
                self.emit(EditorEvent::PreviewReady {
                    id: item.id,
                    preview: preview.info(),
                    reused: true,
                });
            }
            return None;
        }

        log::debug!(
            "{} preview encode at quality {} (generation {generation})",
            item.id,
            request.quality.value()
        );
        Some(EncodeJob {
            generation,
            source: item.source.bytes(),
            request,
            key,
        })
    }

    async fn run_preview(&self, id: ItemId, job: EncodeJob) -> Result<(), EditorError> {
        let encoded = self.encode(&job).await;

        let mut state = self.lock();
        let Ok(item) = state.get_mut(id) else {
            log::debug!("{id} removed during preview encode, discarding");
            return Ok(());
        };
        if !item.is_current(job.generation) {
            log::debug!("{id} stale preview (generation {}), discarding", job.generation);
            return Ok(());
        }
        match encoded {
            Ok(artifact) => {
                let handle = self.inner.tracker.issue_artifact(artifact);
                let info = handle.info();
                if let Err(stale) = item.accept_preview(job.generation, handle, job.key) {
                    stale.revoke();
                    return Ok(());
                }
                self.emit(EditorEvent::PreviewReady {
                    id,
                    preview: info,
                    reused: false,
                });
                Ok(())
            }
            Err(e) => {
                self.record_failure(item, job.generation, e.to_string());
                Err(e)
            }
        }
    }

    async fn encode(&self, job: &EncodeJob) -> Result<Artifact, EditorError> {
        let backend = Arc::clone(&self.inner.backend);
        let source = Arc::clone(&job.source);
        let request = job.request;
        let artifact =
            tokio::task::spawn_blocking(move || run_encode(backend.as_ref(), &source, &request))
                .await??;
        Ok(artifact)
    }

    fn record_failure(&self, item: &mut ImageItem, generation: u64, message: String) {
        if item.fail(generation, message.clone()) {
            log::warn!("{} ({}) failed: {message}", item.id, item.name);
            self.emit(EditorEvent::Failed {
                id: item.id,
                message,
            });
        }
    }

    fn source_unchanged(&self, item: &ImageItem, source_id: HandleId) -> bool {
        item.source.id() == source_id
    }
}
