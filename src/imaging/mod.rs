//! Image processing, statically linked, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | decoder dimensions, orientation-aware |
//! | **Normalize** | decode + EXIF orientation + colour mode for the target |
//! | **Resize** | Lanczos3, fit inside a bounding box, never upscale |
//! | **Encode** | JPEG / PNG / WebP |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing an optimize pass
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend, Optimized};
pub use calculations::{fit_within, needs_resize};
pub use params::{OptimizeParams, Quality, TargetFormat};
pub use rust_backend::{OPTIMIZABLE_EXTENSIONS, RustBackend};
