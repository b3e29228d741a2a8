//! Shared types used across the pipeline, the store and the CLI.
//!
//! [`StoredAsset`] is serialized into the store's JSON index, so field names
//! here are part of the on-disk format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned identifier. Never reused, even after deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub u64);

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The persisted record for one uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAsset {
    pub id: AssetId,
    /// Opaque generated name of the stored bytes (random + final extension).
    pub stored_filename: String,
    /// Name supplied by the uploader; used for the default title only.
    pub original_filename: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    /// Size of the stored (post-processing) bytes.
    pub byte_size: u64,
    /// MIME type of the stored bytes, which may differ from the upload's.
    pub mime_type: String,
    /// Pixel dimensions of the stored bytes; `None` for non-images.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Lowercase hex SHA-256 of the stored bytes.
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

impl StoredAsset {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// `WIDTHxHEIGHT` when both dimensions are known.
    pub fn dimensions_label(&self) -> Option<String> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some(format!("{w}x{h}")),
            _ => None,
        }
    }
}

/// Everything needed to create a [`StoredAsset`] except the store-assigned
/// `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAsset {
    pub stored_filename: String,
    pub original_filename: String,
    pub title: String,
    pub alt_text: Option<String>,
    pub description: Option<String>,
    pub folder: Option<String>,
    pub byte_size: u64,
    pub mime_type: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub content_hash: String,
}

/// Editable metadata. `None` leaves a field untouched; an empty string clears
/// the optional fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataUpdate {
    pub title: Option<String>,
    pub alt_text: Option<String>,
    pub description: Option<String>,
}

impl MetadataUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.alt_text.is_none() && self.description.is_none()
    }

    /// Apply this update to `asset` in place.
    pub fn apply(&self, asset: &mut StoredAsset) {
        if let Some(title) = &self.title {
            asset.title = title.clone();
        }
        if let Some(alt) = &self.alt_text {
            asset.alt_text = non_empty(alt);
        }
        if let Some(desc) = &self.description {
            asset.description = non_empty(desc);
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StoredAsset {
        StoredAsset {
            id: AssetId(7),
            stored_filename: "0123abcd.jpg".to_string(),
            original_filename: "beach-day.jpg".to_string(),
            title: "Beach Day".to_string(),
            alt_text: None,
            description: None,
            folder: None,
            byte_size: 1024,
            mime_type: "image/jpeg".to_string(),
            width: Some(1440),
            height: Some(1080),
            content_hash: "ab".repeat(32),
            created_at: DateTime::parse_from_rfc3339("2025-03-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    #[test]
    fn asset_id_serializes_as_plain_number() {
        assert_eq!(serde_json::to_string(&AssetId(42)).unwrap(), "42");
    }

    #[test]
    fn optional_fields_are_omitted() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("alt_text").is_none());
        assert!(json.get("folder").is_none());
        assert_eq!(json["width"], 1440);
    }

    #[test]
    fn dimensions_label_requires_both() {
        let mut asset = sample();
        assert_eq!(asset.dimensions_label().as_deref(), Some("1440x1080"));
        asset.height = None;
        assert_eq!(asset.dimensions_label(), None);
    }

    #[test]
    fn update_sets_and_clears_fields() {
        let mut asset = sample();
        MetadataUpdate {
            title: Some("Sunset".to_string()),
            alt_text: Some("  waves at dusk ".to_string()),
            description: None,
        }
        .apply(&mut asset);
        assert_eq!(asset.title, "Sunset");
        assert_eq!(asset.alt_text.as_deref(), Some("waves at dusk"));

        MetadataUpdate {
            alt_text: Some(String::new()),
            ..Default::default()
        }
        .apply(&mut asset);
        assert_eq!(asset.alt_text, None);
        assert_eq!(asset.title, "Sunset");
    }

    #[test]
    fn empty_update_is_detected() {
        assert!(MetadataUpdate::default().is_empty());
    }
}
