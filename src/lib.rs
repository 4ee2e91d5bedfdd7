//! # Pressroom
//!
//! An interactive image recompression engine. Load images, drag a quality
//! slider, type a new width, draw a crop, and get a re-encoded artifact to
//! download, with a fast preview that follows the edits.
//!
//! # Architecture: Commands Over a Registry
//!
//! Every loaded image is an item in the [`registry`]. The rendering layer
//! (here, the `pressroom` CLI) issues commands and reads snapshots:
//!
//! ```text
//! edit ──▶ debounce slot (re)armed ──▶ fire ──▶ preview encode ──▶ handle swap
//! compress ──────────────────────────────────▶ final encode ───▶ final handle
//! apply_crop ──▶ crop materialized ──▶ source replaced, compression state reset
//! ```
//!
//! Three guarantees hold for every item:
//!
//! - **One regeneration per burst**: edits inside the quiet window collapse
//!   into a single preview encode with the settings current at fire time.
//! - **No out-of-order results**: a per-item generation counter is captured
//!   at dispatch; a result whose generation is no longer current is dropped
//!   before it ever becomes a handle.
//! - **No leaked buffers**: each artifact is an owned [`handles::Handle`]
//!   released exactly once, and a slot never holds more than one.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`registry`] | Items, commands, events; dispatch and commit of async work |
//! | [`item`] | Per-item settings, status machine and transitions |
//! | [`debounce`] | Per-item quiet-window timer with claim tokens |
//! | [`handles`] | Artifact handles, the live-handle tracker, preview/final slots |
//! | [`crop`] | Crop overlay state with aspect-ratio constraints |
//! | [`imaging`] | Dimension resolver, crop geometry, encode pipeline, codec backends |
//! | [`fingerprint`] | SHA-256 keys for skipping redundant encodes |
//! | [`ingest`] | Reading files and expanding directories into inputs |
//! | [`config`] | `pressroom.toml` loading, validation and merging |
//! | [`logging`] | `fern` logger setup for the binary |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Pure-Rust Imaging
//!
//! The [`imaging`] module uses the `image` crate (Lanczos3 resampling, PNG
//! and JPEG codecs) and `rav1e` through it for AVIF. No system libraries,
//! no external processes. The codec sits behind the
//! [`imaging::ImageBackend`] trait so tests run against a recording mock.
//!
//! ## One Timer Slot Per Item
//!
//! The debounce timer belongs to the item, not to a global scheduler keyed by
//! position. Removing an item drops its slot, which aborts the timer; there
//! is nothing to unregister.
//!
//! ## Blocking Pool for Pixels
//!
//! Decode, resample and encode are CPU-bound and run on tokio's blocking
//! pool. The registry's lock guards only bookkeeping and is never held
//! across an `.await`.

pub mod config;
pub mod crop;
pub mod debounce;
pub mod fingerprint;
pub mod handles;
pub mod imaging;
pub mod ingest;
pub mod item;
pub mod logging;
pub mod output;
pub mod registry;
