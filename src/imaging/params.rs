//! Parameter types for image operations.
//!
//! These types describe *what* to produce, not *how*. They are the interface
//! between the ingest pipeline (which decides the output format and bounds)
//! and the [`backend`](super::backend) (which does the pixel work).
//!
//! ## Types
//!
//! - [`Quality`]: Encoding quality (1–100, default 85). Clamped on construction.
//! - [`TargetFormat`]: Output codec, picked from the uploaded file's extension.
//! - [`OptimizeParams`]: Bounding box + format + quality for one optimization pass.

use std::path::Path;

/// Quality setting for image encoding (1-100).
///
/// Lossy codecs use it as the quality level; PNG maps it to compression
/// effort (see [`TargetFormat::Png`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(85)
    }
}

/// Output codec for an optimized upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    Jpeg,
    /// Always lossless; quality selects compression effort.
    Png,
    /// Lossy at the requested quality.
    WebP,
}

impl TargetFormat {
    /// Pick the target format from the original filename's extension.
    ///
    /// Unrecognized or missing extensions fall back to JPEG.
    pub fn from_filename(filename: &str) -> Self {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("png") => Self::Png,
            Some("webp") => Self::WebP,
            _ => Self::Jpeg,
        }
    }

    /// File extension (without dot) matching the encoded bytes.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::WebP => "webp",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
        }
    }

    /// Whether the encoded output keeps an alpha channel.
    pub fn has_alpha(self) -> bool {
        matches!(self, Self::Png)
    }
}

/// Full specification for one optimize pass: fit inside `max_width` x
/// `max_height`, then encode as `format` at `quality`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizeParams {
    pub max_width: u32,
    pub max_height: u32,
    pub format: TargetFormat,
    pub quality: Quality,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_85() {
        assert_eq!(Quality::default().value(), 85);
    }

    #[test]
    fn target_format_from_known_extensions() {
        assert_eq!(TargetFormat::from_filename("a.jpg"), TargetFormat::Jpeg);
        assert_eq!(TargetFormat::from_filename("a.JPEG"), TargetFormat::Jpeg);
        assert_eq!(TargetFormat::from_filename("a.png"), TargetFormat::Png);
        assert_eq!(TargetFormat::from_filename("b.WebP"), TargetFormat::WebP);
    }

    #[test]
    fn target_format_defaults_to_jpeg() {
        assert_eq!(TargetFormat::from_filename("scan.tiff"), TargetFormat::Jpeg);
        assert_eq!(TargetFormat::from_filename("noext"), TargetFormat::Jpeg);
    }

    #[test]
    fn extension_and_mime_agree() {
        for fmt in [TargetFormat::Jpeg, TargetFormat::Png, TargetFormat::WebP] {
            let guessed = mime_guess::from_ext(fmt.extension()).first_or_octet_stream();
            assert_eq!(guessed.essence_str(), fmt.mime_type());
        }
    }

    #[test]
    fn only_png_keeps_alpha() {
        assert!(TargetFormat::Png.has_alpha());
        assert!(!TargetFormat::Jpeg.has_alpha());
        assert!(!TargetFormat::WebP.has_alpha());
    }
}
