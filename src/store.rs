//! Asset persistence: stored bytes plus a JSON metadata index.
//!
//! The pipeline talks to storage only through the [`AssetStore`] trait, so the
//! filesystem implementation below can be swapped for a database without
//! touching ingest.
//!
//! # Filesystem layout
//!
//! ```text
//! <root>/
//! ├── media/                 # stored bytes, one opaque file per asset
//! │   ├── 3f2a…9c.jpg
//! │   └── 81d0…4e.pdf
//! ├── media-index.json       # {version, next_id, assets}
//! └── media-index.lock       # writer lock, always empty
//! ```
//!
//! ## Index
//!
//! `media-index.json` holds every [`StoredAsset`] in id order plus the next id
//! to hand out. Ids are never reused, even after deletion. Lookups by content
//! hash go through a runtime `hash_index` rebuilt at load time and maintained
//! on every mutation; it is never serialized.
//!
//! Every mutation rewrites the index through a temp file and a rename, so a
//! crash leaves either the old or the new index on disk. Mutations hold an
//! exclusive lock on `media-index.lock` and re-read the index before applying
//! the change, so several processes can share one store root without
//! handing out the same id or dropping each other's records. Reads reload the
//! index whenever the file on disk changed since the last load.
//!
//! A missing index is an empty store. An index that fails to parse is an
//! error: unlike a build cache, silently starting over would lose asset
//! records.
//!
//! ## Hash uniqueness
//!
//! [`FsStore::with_unique_hashes`] turns on a uniqueness constraint: inserting
//! a second asset whose hash is already present fails with
//! [`StoreError::HashConflict`] carrying the existing record.

use crate::types::{AssetId, MetadataUpdate, NewAsset, StoredAsset};
use chrono::Utc;
use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;
use thiserror::Error;
use uuid::Uuid;

/// Name of the index file within the store root.
pub const INDEX_FILENAME: &str = "media-index.json";

/// Lock file serializing index writers across processes.
pub const LOCK_FILENAME: &str = "media-index.lock";

/// Directory holding stored bytes within the store root.
pub const MEDIA_DIR: &str = "media";

/// Version of the index format.
const INDEX_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("asset {0} not found")]
    NotFound(AssetId),
    #[error("content already stored as asset {}", .0.id)]
    HashConflict(Box<StoredAsset>),
    #[error("corrupt index: {0}")]
    CorruptIndex(String),
    #[error("invalid stored filename: {0:?}")]
    InvalidFilename(String),
}

/// Storage operations the ingest pipeline and library management rely on.
///
/// Implementations must be `Sync`; batch ingest shares one store across
/// worker threads.
pub trait AssetStore: Sync {
    /// Write `bytes` under `filename` and return where they landed.
    fn save(&self, bytes: &[u8], filename: &str) -> Result<PathBuf, StoreError>;

    /// Remove stored bytes. Returns `false` if there was nothing to remove.
    fn delete(&self, filename: &str) -> Result<bool, StoreError>;

    fn read(&self, filename: &str) -> Result<Vec<u8>, StoreError>;

    /// Create a record, assigning its id and creation time.
    fn insert(&self, asset: NewAsset) -> Result<StoredAsset, StoreError>;

    fn get(&self, id: AssetId) -> Result<StoredAsset, StoreError>;

    /// Earliest asset with this content hash, if any.
    fn find_by_hash(&self, content_hash: &str) -> Result<Option<StoredAsset>, StoreError>;

    /// All assets in id (creation) order.
    fn list(&self) -> Result<Vec<StoredAsset>, StoreError>;

    fn update(&self, id: AssetId, update: &MetadataUpdate) -> Result<StoredAsset, StoreError>;

    /// Remove the record and return it. Stored bytes are left alone.
    fn remove(&self, id: AssetId) -> Result<StoredAsset, StoreError>;
}

/// On-disk index.
#[derive(Debug, Serialize, Deserialize)]
struct Index {
    version: u32,
    next_id: u64,
    assets: Vec<StoredAsset>,
    /// Runtime reverse index: content hash → ids in ascending order.
    #[serde(skip)]
    hash_index: HashMap<String, Vec<AssetId>>,
}

impl Index {
    fn empty() -> Self {
        Self {
            version: INDEX_VERSION,
            next_id: 1,
            assets: Vec::new(),
            hash_index: HashMap::new(),
        }
    }

    fn position(&self, id: AssetId) -> Option<usize> {
        self.assets.binary_search_by_key(&id, |a| a.id).ok()
    }

    fn rebuild_hash_index(&mut self) {
        self.hash_index = build_hash_index(&self.assets);
    }
}

fn build_hash_index(assets: &[StoredAsset]) -> HashMap<String, Vec<AssetId>> {
    let mut index: HashMap<String, Vec<AssetId>> = HashMap::new();
    for asset in assets {
        index
            .entry(asset.content_hash.clone())
            .or_default()
            .push(asset.id);
    }
    index
}

/// Identity of the index file as last loaded; a change means another
/// handle wrote it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: SystemTime,
    len: u64,
}

fn file_stamp(path: &Path) -> io::Result<Option<FileStamp>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(FileStamp {
            modified: meta.modified()?,
            len: meta.len(),
        })),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// In-memory copy of the index plus the stamp of the file it came from.
#[derive(Debug)]
struct Loaded {
    index: Index,
    stamp: Option<FileStamp>,
}

/// Filesystem-backed [`AssetStore`].
#[derive(Debug)]
pub struct FsStore {
    root: PathBuf,
    unique_hashes: bool,
    loaded: Mutex<Loaded>,
}

impl FsStore {
    /// Open (or create) a store rooted at `root`.
    pub fn open(root: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(root.join(MEDIA_DIR))?;
        let index_path = root.join(INDEX_FILENAME);
        let stamp = file_stamp(&index_path)?;
        let index = load_index(&index_path)?;
        Ok(Self {
            root: root.to_path_buf(),
            unique_hashes: false,
            loaded: Mutex::new(Loaded { index, stamp }),
        })
    }

    /// Enable or disable the content-hash uniqueness constraint.
    pub fn with_unique_hashes(mut self, unique: bool) -> Self {
        self.unique_hashes = unique;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn media_dir(&self) -> PathBuf {
        self.root.join(MEDIA_DIR)
    }

    /// Full path of a stored file. The name must be a plain file name.
    pub fn path_of(&self, filename: &str) -> Result<PathBuf, StoreError> {
        if filename.is_empty()
            || filename.starts_with('.')
            || filename.contains(['/', '\\'])
        {
            return Err(StoreError::InvalidFilename(filename.to_string()));
        }
        Ok(self.media_dir().join(filename))
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILENAME)
    }

    fn lock(&self) -> MutexGuard<'_, Loaded> {
        self.loaded.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Lock the in-memory index, reloading it first if the file changed.
    fn current(&self) -> Result<MutexGuard<'_, Loaded>, StoreError> {
        let mut guard = self.lock();
        let path = self.index_path();
        let stamp = file_stamp(&path)?;
        if stamp != guard.stamp {
            guard.index = load_index(&path)?;
            guard.stamp = stamp;
        }
        Ok(guard)
    }

    /// Apply `mutate` to the index as it is on disk right now and persist the
    /// result, all under the exclusive writer lock. The in-memory index only
    /// changes if the write succeeded.
    fn commit<T>(
        &self,
        mutate: impl FnOnce(&mut Index) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.lock();
        let lock_file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.root.join(LOCK_FILENAME))?;
        let mut file_lock = RwLock::new(lock_file);
        let _writer = file_lock.write()?;

        let path = self.index_path();
        let mut next = load_index(&path)?;
        let value = mutate(&mut next)?;
        write_atomic(
            &self.root,
            &path,
            serde_json::to_string_pretty(&next)?.as_bytes(),
        )?;
        guard.stamp = file_stamp(&path)?;
        guard.index = next;
        Ok(value)
    }
}

impl AssetStore for FsStore {
    fn save(&self, bytes: &[u8], filename: &str) -> Result<PathBuf, StoreError> {
        let path = self.path_of(filename)?;
        if path.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{filename} already stored"),
            )
            .into());
        }
        write_atomic(&self.media_dir(), &path, bytes)?;
        Ok(path)
    }

    fn delete(&self, filename: &str) -> Result<bool, StoreError> {
        let path = self.path_of(filename)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn read(&self, filename: &str) -> Result<Vec<u8>, StoreError> {
        Ok(fs::read(self.path_of(filename)?)?)
    }

    fn insert(&self, asset: NewAsset) -> Result<StoredAsset, StoreError> {
        let unique = self.unique_hashes;
        self.commit(|index| {
            if unique
                && let Some(existing_id) = index
                    .hash_index
                    .get(&asset.content_hash)
                    .and_then(|ids| ids.first())
                && let Some(pos) = index.position(*existing_id)
            {
                return Err(StoreError::HashConflict(Box::new(index.assets[pos].clone())));
            }

            let id = AssetId(index.next_id);
            index.next_id += 1;
            let stored = StoredAsset {
                id,
                stored_filename: asset.stored_filename,
                original_filename: asset.original_filename,
                title: asset.title,
                alt_text: asset.alt_text,
                description: asset.description,
                folder: asset.folder,
                byte_size: asset.byte_size,
                mime_type: asset.mime_type,
                width: asset.width,
                height: asset.height,
                content_hash: asset.content_hash,
                created_at: Utc::now(),
            };
            index
                .hash_index
                .entry(stored.content_hash.clone())
                .or_default()
                .push(id);
            index.assets.push(stored.clone());
            Ok(stored)
        })
    }

    fn get(&self, id: AssetId) -> Result<StoredAsset, StoreError> {
        let loaded = self.current()?;
        let index = &loaded.index;
        index
            .position(id)
            .map(|pos| index.assets[pos].clone())
            .ok_or(StoreError::NotFound(id))
    }

    fn find_by_hash(&self, content_hash: &str) -> Result<Option<StoredAsset>, StoreError> {
        let loaded = self.current()?;
        let index = &loaded.index;
        Ok(index
            .hash_index
            .get(content_hash)
            .and_then(|ids| ids.first())
            .and_then(|id| index.position(*id))
            .map(|pos| index.assets[pos].clone()))
    }

    fn list(&self) -> Result<Vec<StoredAsset>, StoreError> {
        Ok(self.current()?.index.assets.clone())
    }

    fn update(&self, id: AssetId, update: &MetadataUpdate) -> Result<StoredAsset, StoreError> {
        self.commit(|index| {
            let pos = index.position(id).ok_or(StoreError::NotFound(id))?;
            update.apply(&mut index.assets[pos]);
            Ok(index.assets[pos].clone())
        })
    }

    fn remove(&self, id: AssetId) -> Result<StoredAsset, StoreError> {
        self.commit(|index| {
            let pos = index.position(id).ok_or(StoreError::NotFound(id))?;
            let removed = index.assets.remove(pos);
            if let Some(ids) = index.hash_index.get_mut(&removed.content_hash) {
                ids.retain(|other| *other != id);
                if ids.is_empty() {
                    index.hash_index.remove(&removed.content_hash);
                }
            }
            Ok(removed)
        })
    }
}

/// Load the index. Missing file → empty index.
fn load_index(path: &Path) -> Result<Index, StoreError> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Index::empty()),
        Err(e) => return Err(e.into()),
    };
    let mut index: Index = serde_json::from_str(&content)
        .map_err(|e| StoreError::CorruptIndex(format!("{}: {e}", path.display())))?;
    if index.version != INDEX_VERSION {
        return Err(StoreError::CorruptIndex(format!(
            "unsupported index version {} (expected {INDEX_VERSION})",
            index.version
        )));
    }
    index.assets.sort_by_key(|a| a.id);
    if let Some(last) = index.assets.last()
        && last.id.0 >= index.next_id
    {
        return Err(StoreError::CorruptIndex(format!(
            "next_id {} is not above highest id {}",
            index.next_id, last.id
        )));
    }
    index.rebuild_hash_index();
    Ok(index)
}

/// Write `bytes` to a temp file in `dir`, then rename it onto `dest`.
fn write_atomic(dir: &Path, dest: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = dir.join(format!(".tmp-{}", Uuid::new_v4().simple()));
    let result = (|| {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, dest)
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}
