//! Image processing backend built on the `image` crate.
//!
//! Everything is statically linked into the binary. Decoding and the JPEG/PNG
//! encoders are pure Rust; lossy WebP goes through libwebp, which the `webp`
//! crate vendors and builds with cargo.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, WebP, GIF) | `image` crate, format sniffed from content |
//! | Orientation | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | Alpha flattening | composite over opaque white (RGB targets only) |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Encode → JPEG | `jpeg_encoder::Encoder`, progressive, optimized Huffman tables |
//! | Encode → PNG | `image::codecs::png::PngEncoder`, adaptive filtering, effort from quality |
//! | Encode → WebP | `webp::Encoder`, lossy at the requested quality |
//!
//! Truncated JPEGs are refused up front: the decoder would otherwise fill the
//! missing scan data with grey and report success.

use super::backend::{BackendError, Dimensions, ImageBackend, Optimized};
use super::calculations::{fit_within, needs_resize};
use super::params::{OptimizeParams, Quality, TargetFormat};
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader, Rgb, RgbImage};
use std::io::Cursor;

/// Extensions the pipeline re-encodes. Everything else passes through.
pub const OPTIMIZABLE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }

    /// Decode `bytes`, apply the embedded orientation and convert to the
    /// colour mode `target` can store.
    ///
    /// RGB targets get alpha composited over white rather than dropped, so
    /// transparent regions do not turn black.
    pub fn normalize(
        &self,
        bytes: &[u8],
        target: TargetFormat,
    ) -> Result<DynamicImage, BackendError> {
        let mut img = decode_oriented(bytes)?;
        img = convert_color(img, target);
        Ok(img)
    }

    /// Shrink `img` to fit inside `max_width` x `max_height`. Never upscales.
    pub fn resize(&self, img: DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
        let source = (img.width(), img.height());
        if !needs_resize(source, (max_width, max_height)) {
            return img;
        }
        let (w, h) = fit_within(source, (max_width, max_height));
        img.resize_exact(w, h, FilterType::Lanczos3)
    }

    /// Serialize `img` as `format`.
    pub fn encode(
        &self,
        img: &DynamicImage,
        format: TargetFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError> {
        match format {
            TargetFormat::Jpeg => encode_jpeg(img, quality),
            TargetFormat::Png => {
                let mut buf = Vec::new();
                let encoder = PngEncoder::new_with_quality(
                    &mut buf,
                    png_compression(quality),
                    PngFilter::Adaptive,
                );
                img.write_with_encoder(encoder)
                    .map_err(|e| BackendError::ProcessingFailed(format!("png encode failed: {e}")))?;
                Ok(buf)
            }
            TargetFormat::WebP => encode_webp(img, quality),
        }
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Map the 1-100 quality scale onto PNG compression effort.
fn png_compression(quality: Quality) -> CompressionType {
    match quality.value() {
        0..=33 => CompressionType::Fast,
        34..=66 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

/// Progressive JPEG with optimized Huffman tables.
fn encode_jpeg(img: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut buf, quality.value() as u8);
    encoder.set_progressive(true);
    encoder.set_optimized_huffman_tables(true);
    encoder
        .encode(
            rgb.as_raw(),
            jpeg_side(rgb.width())?,
            jpeg_side(rgb.height())?,
            jpeg_encoder::ColorType::Rgb,
        )
        .map_err(|e| BackendError::ProcessingFailed(format!("jpg encode failed: {e}")))?;
    Ok(buf)
}

fn jpeg_side(pixels: u32) -> Result<u16, BackendError> {
    u16::try_from(pixels).map_err(|_| {
        BackendError::ProcessingFailed(format!("{pixels}px exceeds the JPEG size limit"))
    })
}

fn encode_webp(img: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let rgb = img.to_rgb8();
    let memory = webp::Encoder::from_rgb(rgb.as_raw(), rgb.width(), rgb.height())
        .encode_simple(false, quality.value() as f32)
        .map_err(|e| BackendError::ProcessingFailed(format!("webp encode failed: {e:?}")))?;
    Ok(memory.to_vec())
}

fn reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, BackendError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(BackendError::Io)?;
    if reader.format() == Some(ImageFormat::Jpeg) && !jpeg_is_complete(bytes) {
        return Err(BackendError::NotAnImage(
            "truncated JPEG: no end-of-image marker after the last scan".to_string(),
        ));
    }
    Ok(reader)
}

/// An EOI marker must follow the last start-of-scan. Entropy-coded data
/// stuffs every 0xFF, so neither marker can occur inside scan data.
fn jpeg_is_complete(bytes: &[u8]) -> bool {
    let Some(last_scan) = bytes.windows(2).rposition(|w| w == [0xFF, 0xDA]) else {
        return false;
    };
    bytes[last_scan..].windows(2).any(|w| w == [0xFF, 0xD9])
}

/// Decode and apply the EXIF orientation reported by the decoder.
fn decode_oriented(bytes: &[u8]) -> Result<DynamicImage, BackendError> {
    let mut decoder = reader(bytes)?
        .into_decoder()
        .map_err(|e| BackendError::NotAnImage(e.to_string()))?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut img =
        DynamicImage::from_decoder(decoder).map_err(|e| BackendError::NotAnImage(e.to_string()))?;
    img.apply_orientation(orientation);
    Ok(img)
}

fn convert_color(img: DynamicImage, target: TargetFormat) -> DynamicImage {
    if target.has_alpha() {
        return match img {
            DynamicImage::ImageRgba8(_) => img,
            other => DynamicImage::ImageRgba8(other.to_rgba8()),
        };
    }
    if img.color().has_alpha() {
        DynamicImage::ImageRgb8(flatten_onto_white(&img))
    } else {
        match img {
            DynamicImage::ImageRgb8(_) => img,
            other => DynamicImage::ImageRgb8(other.to_rgb8()),
        }
    }
}

/// Alpha-composite every pixel over an opaque white background.
fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let a = a as u16;
        let blend = |c: u8| ((c as u16 * a + 255 * (255 - a) + 127) / 255) as u8;
        out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    out
}

/// Orientations that swap width and height.
fn swaps_axes(orientation: Orientation) -> bool {
    matches!(
        orientation,
        Orientation::Rotate90
            | Orientation::Rotate270
            | Orientation::Rotate90FlipH
            | Orientation::Rotate270FlipH
    )
}

impl ImageBackend for RustBackend {
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError> {
        let mut decoder = reader(bytes)?
            .into_decoder()
            .map_err(|e| BackendError::NotAnImage(e.to_string()))?;
        let (width, height) = decoder.dimensions();
        let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
        Ok(if swaps_axes(orientation) {
            Dimensions {
                width: height,
                height: width,
            }
        } else {
            Dimensions { width, height }
        })
    }

    fn optimize(&self, bytes: &[u8], params: &OptimizeParams) -> Result<Optimized, BackendError> {
        let img = self.normalize(bytes, params.format)?;
        let original = Dimensions {
            width: img.width(),
            height: img.height(),
        };
        let resized = self.resize(img, params.max_width, params.max_height);
        let output = Dimensions {
            width: resized.width(),
            height: resized.height(),
        };
        let bytes = self.encode(&resized, params.format, params.quality)?;
        Ok(Optimized {
            bytes,
            format: params.format,
            original,
            output,
        })
    }
}
