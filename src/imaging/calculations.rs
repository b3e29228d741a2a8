//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Calculate the dimensions that fit `source` inside a `max` bounding box.
///
/// Images already inside the box are returned unchanged (never upscaled).
/// Otherwise a single scale factor `min(max_w / w, max_h / h)` is applied to
/// both axes and the results are floored, so the aspect ratio is kept and
/// neither output dimension exceeds its bound. Each output side is at least 1.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `max` - Bounding box (max_width, max_height)
///
/// # Examples
/// ```
/// # use media_ingest::imaging::fit_within;
/// // 4000x3000 into 1920x1080: scale = min(0.48, 0.36) = 0.36
/// assert_eq!(fit_within((4000, 3000), (1920, 1080)), (1440, 1080));
///
/// // Already small enough: unchanged
/// assert_eq!(fit_within((800, 600), (1920, 1080)), (800, 600));
/// ```
pub fn fit_within(source: (u32, u32), max: (u32, u32)) -> (u32, u32) {
    let (w, h) = source;
    let (max_w, max_h) = max;

    if w <= max_w && h <= max_h {
        return (w, h);
    }

    // Integer cross-multiplication picks the limiting axis exactly; the other
    // side is floor(side * scale) computed without float rounding.
    let (w64, h64, mw64, mh64) = (w as u64, h as u64, max_w as u64, max_h as u64);
    let (new_w, new_h) = if mw64 * h64 <= mh64 * w64 {
        (max_w, (h64 * mw64 / w64) as u32)
    } else {
        ((w64 * mh64 / h64) as u32, max_h)
    };
    (new_w.max(1), new_h.max(1))
}

/// Whether `fit_within` would change the dimensions.
pub fn needs_resize(source: (u32, u32), max: (u32, u32)) -> bool {
    source.0 > max.0 || source.1 > max.1
}
