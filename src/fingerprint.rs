//! Content fingerprints for skipping redundant encodes.
//!
//! Encoding is the expensive step of every regeneration. When a debounced
//! edit settles back on settings that already produced the current preview
//! (quality dragged 75 → 60 → 75, say), the encode would reproduce the same
//! artifact. The registry compares fingerprints and skips that work.
//!
//! A fingerprint is the SHA-256 of the source bytes' digest plus every
//! parameter that influences the encoded output: quality, resolved target
//! dimensions, effort, and format. Any change to any of them changes the
//! key.

use crate::imaging::{EncodeRequest, Quality};
use sha2::{Digest, Sha256};

/// SHA-256 of a byte buffer, returned as a hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Key identifying the output of one encode request over one source.
pub fn encode_key(source_digest: &str, request: &EncodeRequest) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"encode\0");
    hasher.update(source_digest.as_bytes());
    hasher.update(quality_bytes(request.quality));
    hasher.update(optional_dimension(request.target_width));
    hasher.update(optional_dimension(request.target_height));
    hasher.update([request.mode.effort() as u8, request.format as u8]);
    format!("{:x}", hasher.finalize())
}

fn quality_bytes(quality: Quality) -> [u8; 4] {
    quality.value().to_le_bytes()
}

/// Absent and present targets must never collide, so absence gets its own tag.
fn optional_dimension(value: Option<u32>) -> [u8; 5] {
    let mut out = [0u8; 5];
    if let Some(v) = value {
        out[0] = 1;
        out[1..].copy_from_slice(&v.to_le_bytes());
    }
    out
}
