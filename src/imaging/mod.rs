//! Image normalization in pure Rust, no system libraries.
//!
//! | Step | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` (JPEG, PNG, WebP, GIF first frame) |
//! | **Geometry** | [`calculate_target_geometry`] |
//! | **Resample** | Lanczos3 via `resize_exact` |
//! | **Transparency** | sampled alpha grid, [`has_transparency`] |
//! | **Encode** | JPEG (quality loop) or PNG |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension and quality math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: [`normalize`], combining calculations + backend
//! - **Result**: [`NormalizedImage`] and its [`Note`]s

pub mod backend;
mod calculations;
pub mod media;
pub mod operations;
mod params;
pub mod result;
pub mod rust_backend;
mod transparency;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{TargetGeometry, calculate_target_geometry, sample_stride};
pub use media::{MediaType, supported_input_extensions};
pub use operations::{NormalizePlan, normalize, normalize_bytes, plan_normalization};
pub use params::{NormalizeOptions, OutputFormat, Quality};
pub use result::{DataPayload, Note, NormalizedImage, format_bytes};
pub use rust_backend::RustBackend;
pub use transparency::has_transparency;
