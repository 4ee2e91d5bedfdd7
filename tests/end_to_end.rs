//! Drives the registry with the real codec through the public API.
//!
//! Sources are synthetic "photographs": smooth gradients with deterministic
//! noise, encoded losslessly as PNG so recompression has something to win.

use image::{ImageEncoder, RgbImage};
use pressroom::config::EditorConfig;
use pressroom::imaging::{AspectPreset, AspectRatio, Dimensions, OutputFormat};
use pressroom::ingest::IngestedFile;
use pressroom::item::{Setting, Status};
use pressroom::registry::{EditorEvent, Registry};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

const WAIT: Duration = Duration::from_secs(300);

fn photographic_png(width: u32, height: u32) -> Vec<u8> {
    let mut state: u32 = 0x2545_f491;
    let img = RgbImage::from_fn(width, height, |x, y| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let noise = (state % 24) as i32 - 12;
        let shade = |base: u32| (base as i32 + noise).clamp(0, 255) as u8;
        image::Rgb([
            shade(x * 255 / width.max(1)),
            shade(y * 255 / height.max(1)),
            shade(128 + (x + y) % 64),
        ])
    });
    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

fn registry(config: EditorConfig) -> (Registry, UnboundedReceiver<EditorEvent>) {
    let backend = Arc::new(config.build_backend());
    Registry::with_events(backend, config)
}

async fn wait_for(
    rx: &mut UnboundedReceiver<EditorEvent>,
    pred: impl Fn(&EditorEvent) -> bool,
) -> EditorEvent {
    tokio::time::timeout(WAIT, async {
        loop {
            let event = rx.recv().await.expect("event channel closed");
            if let EditorEvent::Failed { message, .. } = &event {
                panic!("pipeline failed: {message}");
            }
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn debounced_preview_is_smaller_than_source() {
    let mut config = EditorConfig::default();
    config.editor.debounce_ms = 100;
    let (registry, mut rx) = registry(config);
    let source = photographic_png(1920, 1080);
    let source_len = source.len();

    let id = registry
        .ingest(IngestedFile::new("photo.png", "image/png", source))
        .await
        .unwrap();
    registry.update_setting(id, Setting::Quality(50)).unwrap();

    let event = wait_for(&mut rx, |e| matches!(e, EditorEvent::PreviewReady { .. })).await;

    let EditorEvent::PreviewReady { preview, .. } = event else {
        unreachable!()
    };
    assert!(preview.size > 0);
    assert!(
        (preview.size as usize) < source_len,
        "preview {} bytes, source {source_len} bytes",
        preview.size
    );
    assert_eq!(preview.media_type, "image/avif");
    assert_eq!(preview.dimensions, Some(Dimensions::new(1920, 1080)));

    let snap = registry.item(id).unwrap();
    assert_eq!(snap.status, Status::PreviewReady);
    assert_eq!(registry.preview_bytes(id).unwrap().len() as u64, preview.size);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn crop_resize_and_compress_to_jpeg() {
    let mut config = EditorConfig::default();
    config.encoder.format = OutputFormat::Jpeg;
    let (registry, mut rx) = registry(config);

    let id = registry
        .ingest(IngestedFile::new(
            "wide.png",
            "image/png",
            photographic_png(640, 360),
        ))
        .await
        .unwrap();
    wait_for(&mut rx, |e| matches!(e, EditorEvent::Probed { .. })).await;

    let crop = registry
        .open_crop(id, AspectRatio::Preset(AspectPreset::Square))
        .unwrap();
    let dims = registry
        .apply_crop(id, crop.rect(), crop.aspect())
        .await
        .unwrap();
    assert_eq!(dims, Some(Dimensions::new(360, 360)));

    registry.update_setting(id, Setting::Width(Some(100))).unwrap();
    let info = registry.compress(id).await.unwrap().unwrap();

    assert_eq!(info.dimensions, Some(Dimensions::new(100, 100)));
    assert_eq!(info.media_type, "image/jpeg");
    let bytes = registry.final_bytes(id).unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (100, 100));
    assert_eq!(registry.item(id).unwrap().status, Status::Final);
}

#[tokio::test]
async fn undecodable_file_fails_without_affecting_others() {
    let (registry, _rx) = registry(EditorConfig::default());

    let broken = registry
        .ingest(IngestedFile::new(
            "broken.jpg",
            "image/jpeg",
            b"not really a jpeg".to_vec(),
        ))
        .await
        .unwrap();
    let good = registry
        .ingest(IngestedFile::new(
            "good.png",
            "image/png",
            photographic_png(32, 32),
        ))
        .await
        .unwrap();

    assert_eq!(registry.item(broken).unwrap().status, Status::Failed);
    assert_eq!(registry.item(good).unwrap().status, Status::Idle);
    assert_eq!(
        registry.item(good).unwrap().dimensions,
        Some(Dimensions::new(32, 32))
    );

    registry.remove(broken).unwrap();
    registry.remove(good).unwrap();
    assert_eq!(registry.handle_stats().live, 0);
}
