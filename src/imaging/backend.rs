//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations the ingest pipeline
//! needs: identify (read dimensions) and optimize (normalize, resize and
//! re-encode in one pass).
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), with no system
//! libraries. Tests drive the pipeline with a recording mock instead.

use super::params::{OptimizeParams, TargetFormat};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Not a decodable image: {0}")]
    NotAnImage(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Output of a successful optimize pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Optimized {
    pub bytes: Vec<u8>,
    pub format: TargetFormat,
    /// Dimensions after orientation was applied, before resizing.
    pub original: Dimensions,
    /// Dimensions of the encoded bytes.
    pub output: Dimensions,
}

/// Trait for image processing backends.
///
/// Both operations work on in-memory bytes; persistence is the store's job.
pub trait ImageBackend: Sync {
    /// Get image dimensions without a full decode where the codec allows it.
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError>;

    /// Decode, orient, convert colour mode, fit inside the bounding box and
    /// re-encode as `params.format`.
    fn optimize(&self, bytes: &[u8], params: &OptimizeParams) -> Result<Optimized, BackendError>;
}
