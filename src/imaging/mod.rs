//! Image processing — pure Rust, built on the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageReader::into_dimensions` |
//! | **Decode** | `image::load_from_memory` → RGBA |
//! | **Resample** | Lanczos3 |
//! | **Encode** | rav1e AVIF (speed from effort) or JPEG |
//! | **Crop** | `imageops::crop_imm` → PNG |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension and crop math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: The encode pipeline and crop materialization

pub mod backend;
pub mod calculations;
pub mod operations;
pub mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{resolve_dimensions, savings_percent};
pub use operations::{Artifact, get_dimensions, materialize_crop, plan_encode, run_encode};
pub use params::{
    AspectPreset, AspectRatio, CropRect, Effort, EncodeMode, EncodeOptions, EncodeRequest,
    OutputFormat, Quality,
};
pub use rust_backend::{RustBackend, supported_input_extensions};
