//! Artifact handles and their lifecycle.
//!
//! Every byte buffer the rendering layer can display or download (an
//! item's source, its preview and its final artifact) is exposed through a
//! [`Handle`]. Handles are issued by a shared [`HandleTracker`] that keeps
//! the set of live handles, so hygiene is observable: after any sequence of
//! regenerations, the tracker can say exactly how many buffers are still
//! held.
//!
//! # Ownership rules
//!
//! - A `Handle` is not `Clone`. Whoever owns it owns the buffer's slot.
//! - Dropping a handle revokes it; [`Handle::revoke`] does the same
//!   explicitly. Either way it is released exactly once.
//! - [`ItemHandles`] holds one preview and one final slot per item.
//!   [`ItemHandles::assign`] revokes the previous occupant of the slot before
//!   the new handle moves in, so a slot can never leak.
//!
//! Readers get cheap copies of the bytes (`Arc<[u8]>`) or a serializable
//! [`HandleInfo`]; neither keeps the handle alive.

use crate::imaging::{Artifact, Dimensions};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Identifier of an issued handle. Never reused within a tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct HandleId(u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle-{}", self.0)
    }
}

/// Counters describing handle hygiene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct HandleStats {
    pub issued: u64,
    pub revoked: u64,
    pub live: usize,
}

/// Issues handles and records their release.
#[derive(Debug, Default)]
pub struct HandleTracker {
    next_id: AtomicU64,
    issued: AtomicU64,
    revoked: AtomicU64,
    live: Mutex<HashSet<HandleId>>,
}

impl HandleTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Wrap bytes in a new live handle.
    pub fn issue(
        self: &Arc<Self>,
        bytes: impl Into<Arc<[u8]>>,
        dimensions: Option<Dimensions>,
        media_type: impl Into<String>,
    ) -> Handle {
        let id = HandleId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.issued.fetch_add(1, Ordering::Relaxed);
        self.lock_live().insert(id);
        log::trace!("issued {id}");

        Handle {
            id,
            bytes: bytes.into(),
            dimensions,
            media_type: media_type.into(),
            tracker: Arc::clone(self),
        }
    }

    /// Wrap an encoded artifact in a new live handle.
    pub fn issue_artifact(self: &Arc<Self>, artifact: Artifact) -> Handle {
        self.issue(
            artifact.bytes,
            Some(artifact.dimensions),
            artifact.media_type,
        )
    }

    pub fn is_live(&self, id: HandleId) -> bool {
        self.lock_live().contains(&id)
    }

    pub fn stats(&self) -> HandleStats {
        HandleStats {
            issued: self.issued.load(Ordering::Relaxed),
            revoked: self.revoked.load(Ordering::Relaxed),
            live: self.lock_live().len(),
        }
    }

    fn release(&self, id: HandleId) {
        if self.lock_live().remove(&id) {
            self.revoked.fetch_add(1, Ordering::Relaxed);
            log::trace!("revoked {id}");
        }
    }

    // A panic while holding this lock cannot leave the set half-updated,
    // so a poisoned lock is still usable.
    fn lock_live(&self) -> std::sync::MutexGuard<'_, HashSet<HandleId>> {
        self.live.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// An owned reference to an immutable byte buffer.
///
/// Released exactly once: on [`revoke`](Self::revoke) or on drop.
pub struct Handle {
    id: HandleId,
    bytes: Arc<[u8]>,
    dimensions: Option<Dimensions>,
    media_type: String,
    tracker: Arc<HandleTracker>,
}

impl Handle {
    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn dimensions(&self) -> Option<Dimensions> {
        self.dimensions
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn info(&self) -> HandleInfo {
        HandleInfo {
            id: self.id,
            size: self.bytes.len() as u64,
            dimensions: self.dimensions,
            media_type: self.media_type.clone(),
        }
    }

    /// Release the handle now.
    pub fn revoke(self) {
        drop(self);
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.tracker.release(self.id);
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.id)
            .field("size", &self.bytes.len())
            .field("dimensions", &self.dimensions)
            .field("media_type", &self.media_type)
            .finish()
    }
}

/// Read-only description of a handle for the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandleInfo {
    pub id: HandleId,
    pub size: u64,
    pub dimensions: Option<Dimensions>,
    pub media_type: String,
}

/// Which derived artifact a handle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Preview,
    Final,
}

/// The preview and final slots of one item.
#[derive(Debug, Default)]
pub struct ItemHandles {
    preview: Option<Handle>,
    final_artifact: Option<Handle>,
}

impl ItemHandles {
    fn slot_mut(&mut self, slot: Slot) -> &mut Option<Handle> {
        match slot {
            Slot::Preview => &mut self.preview,
            Slot::Final => &mut self.final_artifact,
        }
    }

    pub fn get(&self, slot: Slot) -> Option<&Handle> {
        match slot {
            Slot::Preview => self.preview.as_ref(),
            Slot::Final => self.final_artifact.as_ref(),
        }
    }

    /// Put `handle` into `slot`, revoking whatever was there.
    pub fn assign(&mut self, slot: Slot, handle: Handle) {
        if let Some(previous) = self.slot_mut(slot).replace(handle) {
            previous.revoke();
        }
    }

    /// Empty `slot`, revoking its handle if any.
    pub fn clear(&mut self, slot: Slot) {
        if let Some(previous) = self.slot_mut(slot).take() {
            previous.revoke();
        }
    }

    pub fn clear_all(&mut self) {
        self.clear(Slot::Preview);
        self.clear(Slot::Final);
    }
}
