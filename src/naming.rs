//! Filename handling for uploads.
//!
//! Uploaded files carry two names: the caller's original filename (used only
//! to derive a display title and guess the format) and the opaque stored
//! filename generated here.
//!
//! ## Display Titles
//!
//! Dashes and underscores in the stem become spaces, then every word is
//! title-cased:
//! - `summer-holiday_2024.jpg` → "Summer Holiday 2024"
//! - `IMG_0042.JPG` → "Img 0042"
//! - `my.final.draft.pdf` → "My.Final.Draft"
//!
//! ## Stored Filenames
//!
//! `<uuid-v4 simple>.<ext>`: 122 random bits, so names are neither guessable
//! nor reused. The extension always matches the stored bytes.

use std::path::Path;
use uuid::Uuid;

/// Lowercased extension of `filename` without the dot, if any.
///
/// - `"Photo.JPG"` → `Some("jpg")`
/// - `"archive.tar.gz"` → `Some("gz")`
/// - `"README"` → `None`
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_ascii_lowercase())
}

/// Derive a human title from an original filename.
///
/// Falls back to the whole name when there is no stem.
pub fn title_from_filename(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);
    title_case(&stem.replace(['-', '_'], " "))
}

/// Uppercase letters that follow a non-letter, lowercase the rest.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_is_letter = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(c);
            prev_is_letter = false;
        }
    }
    out
}

/// Generate an opaque, collision-resistant stored filename.
pub fn opaque_filename(extension: Option<&str>) -> String {
    let id = Uuid::new_v4().simple();
    match extension {
        Some(ext) if !ext.is_empty() => format!("{id}.{ext}"),
        _ => id.to_string(),
    }
}

/// Final path component of a URL path, ignoring query and fragment.
///
/// - `"/images/cat.png"` → `Some("cat.png")`
/// - `"/images/"` → `None`
pub fn last_path_segment(path: &str) -> Option<&str> {
    path.rsplit('/').next().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(extension_of("Photo.JPG").as_deref(), Some("jpg"));
        assert_eq!(extension_of("x.WebP").as_deref(), Some("webp"));
    }

    #[test]
    fn extension_uses_last_dot() {
        assert_eq!(extension_of("archive.tar.gz").as_deref(), Some("gz"));
    }

    #[test]
    fn extension_missing() {
        assert_eq!(extension_of("README"), None);
        assert_eq!(extension_of(".bashrc"), None);
    }

    #[test]
    fn title_replaces_separators() {
        assert_eq!(
            title_from_filename("summer-holiday_2024.jpg"),
            "Summer Holiday 2024"
        );
    }

    #[test]
    fn title_lowercases_shouting() {
        assert_eq!(title_from_filename("IMG_0042.JPG"), "Img 0042");
    }

    #[test]
    fn title_capitalizes_after_digits_and_dots() {
        assert_eq!(title_from_filename("hero-2x.png"), "Hero 2X");
        assert_eq!(title_from_filename("my.final.draft.pdf"), "My.Final.Draft");
    }

    #[test]
    fn title_without_extension() {
        assert_eq!(title_from_filename("cover_art"), "Cover Art");
    }

    #[test]
    fn title_keeps_non_ascii_letters() {
        assert_eq!(title_from_filename("çiçek-bahçesi.jpg"), "Çiçek Bahçesi");
    }

    #[test]
    fn opaque_filename_has_extension() {
        let name = opaque_filename(Some("webp"));
        assert!(name.ends_with(".webp"));
        assert_eq!(name.len(), 32 + ".webp".len());
    }

    #[test]
    fn opaque_filename_without_extension() {
        let name = opaque_filename(None);
        assert_eq!(name.len(), 32);
        assert!(!name.contains('.'));
    }

    #[test]
    fn opaque_filenames_are_unique() {
        let a = opaque_filename(Some("jpg"));
        let b = opaque_filename(Some("jpg"));
        assert_ne!(a, b);
    }

    #[test]
    fn last_segment_of_url_path() {
        assert_eq!(last_path_segment("/images/cat.png"), Some("cat.png"));
        assert_eq!(last_path_segment("/images/"), None);
        assert_eq!(last_path_segment(""), None);
    }
}
