//! Content fingerprinting and duplicate detection.
//!
//! Identity is the lowercase hex SHA-256 of a file's bytes. Two uploads are
//! duplicates exactly when their hashes match; size, name and MIME type play
//! no part in the decision.

use crate::store::{AssetStore, StoreError};
use crate::types::StoredAsset;
use sha2::{Digest, Sha256};
use std::io;
use std::path::Path;
use tracing::debug;

/// SHA-256 of `bytes` as 64 lowercase hex characters.
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// SHA-256 hash of a file's contents, returned as a hex string.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(content_hash(&bytes))
}

/// Look up an existing asset with the same content hash.
///
/// When several assets share the hash (forced uploads) the earliest one is
/// returned. `byte_size` is only logged.
pub fn find_duplicate<S: AssetStore + ?Sized>(
    store: &S,
    content_hash: &str,
    byte_size: u64,
) -> Result<Option<StoredAsset>, StoreError> {
    let existing = store.find_by_hash(content_hash)?;
    match &existing {
        Some(asset) => debug!(
            hash = content_hash,
            byte_size,
            existing_id = %asset.id,
            "duplicate content found"
        ),
        None => debug!(hash = content_hash, byte_size, "no duplicate"),
    }
    Ok(existing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FsStore;
    use crate::types::NewAsset;
    use tempfile::TempDir;

    fn new_asset(hash: &str, name: &str) -> NewAsset {
        NewAsset {
            stored_filename: name.to_string(),
            original_filename: name.to_string(),
            title: name.to_string(),
            alt_text: None,
            description: None,
            folder: None,
            byte_size: 3,
            mime_type: "application/pdf".to_string(),
            width: None,
            height: None,
            content_hash: hash.to_string(),
        }
    }

    #[test]
    fn content_hash_is_lowercase_hex_sha256() {
        assert_eq!(
            content_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(content_hash(b"").len(), 64);
    }

    #[test]
    fn hash_file_matches_content_hash() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("doc.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();
        assert_eq!(hash_file(&path).unwrap(), content_hash(b"%PDF-1.4"));
    }

    #[test]
    fn hash_file_missing_is_error() {
        let tmp = TempDir::new().unwrap();
        assert!(hash_file(&tmp.path().join("nope")).is_err());
    }

    #[test]
    fn find_duplicate_in_empty_store() {
        let tmp = TempDir::new().unwrap();
        let store = FsStore::open(tmp.path()).unwrap();
        assert!(find_duplicate(&store, &content_hash(b"x"), 1).unwrap().is_none());
    }

    #[test]
    fn find_duplicate_returns_earliest_match() {
        let tmp = TempDir::new().unwrap();
        let store = FsStore::open(tmp.path()).unwrap();
        let hash = content_hash(b"same");
        let first = store.insert(new_asset(&hash, "a.pdf")).unwrap();
        store.insert(new_asset(&hash, "b.pdf")).unwrap();

        let found = find_duplicate(&store, &hash, 4).unwrap().unwrap();
        assert_eq!(found.id, first.id);
    }

    #[test]
    fn find_duplicate_ignores_byte_size() {
        let tmp = TempDir::new().unwrap();
        let store = FsStore::open(tmp.path()).unwrap();
        let hash = content_hash(b"same");
        store.insert(new_asset(&hash, "a.pdf")).unwrap();

        assert!(find_duplicate(&store, &hash, 999_999).unwrap().is_some());
        assert!(find_duplicate(&store, &content_hash(b"other"), 3).unwrap().is_none());
    }
}
