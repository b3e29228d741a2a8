//! Media library management on top of an [`AssetStore`].
//!
//! Listing, editing and deleting stored assets, plus an integrity check that
//! recomputes every stored file's hash and compares it with its record.

use crate::dedup::content_hash;
use crate::store::{AssetStore, StoreError};
use crate::types::{AssetId, MetadataUpdate, StoredAsset};
use std::io;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("store error: {0}")]
    Store(StoreError),
    #[error("asset {0} not found")]
    NotFound(AssetId),
}

impl From<StoreError> for LibraryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => LibraryError::NotFound(id),
            other => LibraryError::Store(other),
        }
    }
}

/// One page of assets, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPage {
    pub assets: Vec<StoredAsset>,
    /// 1-based page number actually returned.
    pub page: usize,
    pub per_page: usize,
    /// Assets matching the filter across all pages.
    pub total: usize,
}

impl AssetPage {
    pub fn total_pages(&self) -> usize {
        self.total.div_ceil(self.per_page.max(1)).max(1)
    }
}

/// A record whose stored bytes no longer back it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyIssue {
    /// The stored file is gone.
    Missing { id: AssetId, stored_filename: String },
    /// The stored file's hash differs from the recorded one.
    HashMismatch {
        id: AssetId,
        stored_filename: String,
        expected: String,
        actual: String,
    },
}

pub fn get_asset<S: AssetStore + ?Sized>(
    store: &S,
    id: AssetId,
) -> Result<StoredAsset, LibraryError> {
    Ok(store.get(id)?)
}

/// Delete the stored bytes, then the record.
///
/// A missing file is logged and the record is still removed.
pub fn delete_asset<S: AssetStore + ?Sized>(
    store: &S,
    id: AssetId,
) -> Result<StoredAsset, LibraryError> {
    let asset = store.get(id)?;
    if !store.delete(&asset.stored_filename)? {
        warn!(id = %id, stored = %asset.stored_filename, "stored file already missing");
    }
    let removed = store.remove(id)?;
    info!(id = %id, title = %removed.title, "deleted asset");
    Ok(removed)
}

/// Edit title, alt text or description.
pub fn update_metadata<S: AssetStore + ?Sized>(
    store: &S,
    id: AssetId,
    update: &MetadataUpdate,
) -> Result<StoredAsset, LibraryError> {
    if update.is_empty() {
        return Ok(store.get(id)?);
    }
    Ok(store.update(id, update)?)
}

/// Page through assets newest first, optionally limited to one folder.
///
/// `page` is 1-based; 0 is treated as 1.
pub fn list_assets<S: AssetStore + ?Sized>(
    store: &S,
    folder: Option<&str>,
    page: usize,
    per_page: usize,
) -> Result<AssetPage, LibraryError> {
    let per_page = per_page.max(1);
    let page = page.max(1);

    let mut matching: Vec<StoredAsset> = store
        .list()?
        .into_iter()
        .filter(|a| folder.is_none_or(|f| a.folder.as_deref() == Some(f)))
        .collect();
    // Ids are handed out in creation order.
    matching.sort_by(|a, b| b.id.cmp(&a.id));

    let total = matching.len();
    let assets = matching
        .into_iter()
        .skip((page - 1).saturating_mul(per_page))
        .take(per_page)
        .collect();

    Ok(AssetPage {
        assets,
        page,
        per_page,
        total,
    })
}

/// Recompute every asset's hash from its stored bytes.
pub fn verify<S: AssetStore + ?Sized>(store: &S) -> Result<Vec<VerifyIssue>, LibraryError> {
    let mut issues = Vec::new();
    for asset in store.list()? {
        let bytes = match store.read(&asset.stored_filename) {
            Ok(bytes) => bytes,
            Err(StoreError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                issues.push(VerifyIssue::Missing {
                    id: asset.id,
                    stored_filename: asset.stored_filename,
                });
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let actual = content_hash(&bytes);
        if actual != asset.content_hash {
            issues.push(VerifyIssue::HashMismatch {
                id: asset.id,
                stored_filename: asset.stored_filename,
                expected: asset.content_hash,
                actual,
            });
        }
    }
    Ok(issues)
}
