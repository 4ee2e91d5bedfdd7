//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Each item leads with its positional index and name. Sizes, dimensions
//! and status follow as indented context lines, so the output reads as an
//! inventory of what was loaded and what it compressed to.
//!
//! # Output Format
//!
//! ## Items
//!
//! ```text
//! 001 harbor.jpg (1920x1080 → 960x540)
//!     Status: final
//!     Quality: 50
//!     Source: 2.4 MB image/jpeg
//!     Final: 181.2 KB image/avif (92.6% smaller)
//! ```
//!
//! ## Events
//!
//! ```text
//! #1 preview ready: 96.0 KB 960x540
//! #2 failed: Decode failed: unexpected end of file
//! ```
//!
//! ## Summary
//!
//! ```text
//! Compressed 3 images: 7.2 MB → 1.1 MB (84.7% smaller)
//! ```
//!
//! # Architecture
//!
//! Every `format_*` function returns lines (or a line) and is pure: no
//! I/O, no side effects. `print_*` wrappers write to stdout.

use crate::handles::HandleInfo;
use crate::imaging::{Dimensions, savings_percent};
use crate::item::ItemSnapshot;
use crate::registry::EditorEvent;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte count with one decimal in binary units.
///
/// ```
/// # use pressroom::output::format_bytes;
/// assert_eq!(format_bytes(512), "512 B");
/// assert_eq!(format_bytes(1536), "1.5 KB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

fn format_dimensions(dimensions: Dimensions) -> String {
    format!("{}x{}", dimensions.width, dimensions.height)
}

/// `"181.2 KB image/avif (92.6% smaller)"` relative to `source_size`.
fn artifact_line(info: &HandleInfo, source_size: u64) -> String {
    let savings = savings_percent(source_size, info.size);
    let comparison = if savings >= 0.0 {
        format!("{savings:.1}% smaller")
    } else {
        format!("{:.1}% larger", -savings)
    };
    format!(
        "{} {} ({comparison})",
        format_bytes(info.size),
        info.media_type
    )
}

// ============================================================================
// Items
// ============================================================================

/// Format one item as a header plus indented context lines.
pub fn format_item(index: usize, item: &ItemSnapshot) -> Vec<String> {
    let mut lines = Vec::new();

    let geometry = match (item.dimensions, item.resolved) {
        (Some(original), Some(resolved)) if original != resolved => format!(
            " ({} → {})",
            format_dimensions(original),
            format_dimensions(resolved)
        ),
        (Some(original), _) => format!(" ({})", format_dimensions(original)),
        (None, _) => String::new(),
    };
    lines.push(format!("{} {}{geometry}", format_index(index), item.name));

    let ctx = indent(1);
    lines.push(format!("{ctx}Status: {}", item.status.label()));
    lines.push(format!("{ctx}Quality: {}", item.settings.quality.value()));
    lines.push(format!(
        "{ctx}Source: {} {}",
        format_bytes(item.source.size),
        item.source.media_type
    ));
    if let Some(preview) = &item.preview {
        lines.push(format!(
            "{ctx}Preview: {}",
            artifact_line(preview, item.source.size)
        ));
    }
    if let Some(artifact) = &item.final_artifact {
        lines.push(format!(
            "{ctx}Final: {}",
            artifact_line(artifact, item.source.size)
        ));
    }
    if let Some(error) = &item.error {
        lines.push(format!("{ctx}Error: {error}"));
    }
    lines
}

/// Format every item, in registry order.
pub fn format_items(items: &[ItemSnapshot]) -> Vec<String> {
    items
        .iter()
        .enumerate()
        .flat_map(|(i, item)| format_item(i + 1, item))
        .collect()
}

pub fn print_items(items: &[ItemSnapshot]) {
    for line in format_items(items) {
        println!("{}", line);
    }
}

// ============================================================================
// Events
// ============================================================================

/// Format a registry event as a single progress line.
pub fn format_event(event: &EditorEvent) -> String {
    let id = event.item();
    match event {
        EditorEvent::Probed { dimensions, .. } => {
            format!("{id} loaded: {}", format_dimensions(*dimensions))
        }
        EditorEvent::PreviewReady {
            preview, reused, ..
        } => {
            let size = format_bytes(preview.size);
            let geometry = preview
                .dimensions
                .map(|d| format!(" {}", format_dimensions(d)))
                .unwrap_or_default();
            if *reused {
                format!("{id} preview unchanged: {size}{geometry}")
            } else {
                format!("{id} preview ready: {size}{geometry}")
            }
        }
        EditorEvent::Finalized { artifact, .. } => {
            format!("{id} compressed: {}", format_bytes(artifact.size))
        }
        EditorEvent::Failed { message, .. } => format!("{id} failed: {message}"),
        EditorEvent::CropApplied { dimensions, .. } => {
            format!("{id} cropped to {}", format_dimensions(*dimensions))
        }
        EditorEvent::CropFailed { message, .. } => format!("{id} crop failed: {message}"),
        EditorEvent::Removed { .. } => format!("{id} removed"),
    }
}

pub fn print_event(event: &EditorEvent) {
    println!("{}", format_event(event));
}

// ============================================================================
// Summary
// ============================================================================

/// Totals over the items that have a final artifact.
pub fn format_summary(items: &[ItemSnapshot]) -> Vec<String> {
    let finished: Vec<(u64, u64)> = items
        .iter()
        .filter_map(|item| {
            item.final_artifact
                .as_ref()
                .map(|artifact| (item.source.size, artifact.size))
        })
        .collect();
    let failed = items.iter().filter(|item| item.error.is_some()).count();

    let mut lines = Vec::new();
    if !finished.is_empty() {
        let before: u64 = finished.iter().map(|(source, _)| source).sum();
        let after: u64 = finished.iter().map(|(_, out)| out).sum();
        let noun = if finished.len() == 1 { "image" } else { "images" };
        lines.push(format!(
            "Compressed {} {noun}: {} → {} ({:.1}% smaller)",
            finished.len(),
            format_bytes(before),
            format_bytes(after),
            savings_percent(before, after)
        ));
    }
    if failed > 0 {
        lines.push(format!("{failed} failed"));
    }
    lines
}

pub fn print_summary(items: &[ItemSnapshot]) {
    for line in format_summary(items) {
        println!("{}", line);
    }
}
