//! Image normalization in pure Rust, no system dependencies.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions` |
//! | **Downscale** | `DynamicImage::resize_exact` with Lanczos3 |
//! | **Re-encode** | JPEG at configured quality, PNG best compression, others lossless |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: Directory walk combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::calculate_downscale;
pub use operations::{
    NormalizeConfig, NormalizeOutcome, RASTER_EXTENSIONS, is_hidden, is_raster_image,
    normalize_images,
};
pub use params::{Quality, ResizeParams};
pub use rust_backend::RustBackend;
