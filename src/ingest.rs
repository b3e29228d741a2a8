//! The upload pipeline.
//!
//! Takes raw bytes plus a filename, and either returns an existing asset with
//! identical content or optimizes, persists and returns a new one.
//!
//! ```text
//! validate → hash → duplicate? ──yes──→ Duplicate (nothing written)
//!                       │ no
//!                       ▼
//!           optimizable image? ──no──→ pass through (probe dimensions)
//!                       │ yes
//!                       ▼
//!        normalize → resize → encode   (failure → warn, pass through)
//!                       │
//!                       ▼
//!     re-hash → duplicate of a stored optimized file? ──yes──→ Duplicate
//!                       │ no
//!                       ▼
//!           save bytes → insert record → Created
//! ```
//!
//! ## Validation
//!
//! Checked before anything else, in order: size over
//! `limits.max_upload_bytes`, extension outside `limits.allowed_extensions`.
//! An empty file with an allowed extension is a valid upload.
//!
//! ## Optimization
//!
//! Only files whose guessed MIME type is `image/*` **and** whose extension is
//! one of `jpg`, `jpeg`, `png`, `webp` are re-encoded. GIF and SVG are allowed
//! uploads but stored as-is, so animations and vector data survive. The output
//! format follows the extension: PNG stays PNG, WebP stays WebP, everything
//! else becomes JPEG.
//!
//! A decode or encode failure is never fatal: the raw bytes are stored under
//! their original extension and MIME type.
//!
//! ## Duplicates
//!
//! Identity is the SHA-256 of the bytes. The raw upload is checked first; when
//! optimization changed the bytes the processed hash is checked too, so
//! re-uploading an original whose optimized output is already stored does not
//! create a second copy. `force_upload` skips both checks.
//!
//! ## Batches
//!
//! [`ingest_batch`] runs files in parallel with rayon. A failure on one file
//! is reported for that file and the rest of the batch carries on.

use crate::config::{LimitsConfig, UploadConfig};
use crate::dedup::{content_hash, find_duplicate};
use crate::fetch::{self, FetchError};
use crate::imaging::{
    BackendError, ImageBackend, OPTIMIZABLE_EXTENSIONS, OptimizeParams, Quality, RustBackend,
    TargetFormat,
};
use crate::naming::{extension_of, opaque_filename, title_from_filename};
use crate::store::{AssetStore, StoreError};
use crate::types::{NewAsset, StoredAsset};
use rayon::prelude::*;
use reqwest::blocking::Client;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("file is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },
    #[error("file type {0:?} is not allowed")]
    DisallowedExtension(String),
}

/// Per-upload options. `None` falls back to the config.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub folder: Option<String>,
    pub alt_text: Option<String>,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub quality: Option<u32>,
    /// Store even when identical content already exists.
    pub force_upload: bool,
}

/// One upload: bytes, the uploader's filename, and options.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub options: IngestOptions,
}

impl IngestRequest {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            filename: filename.into(),
            options: IngestOptions::default(),
        }
    }

    pub fn with_options(mut self, options: IngestOptions) -> Self {
        self.options = options;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// A new asset was stored.
    Created(StoredAsset),
    /// Identical content was already stored; nothing was written.
    Duplicate(StoredAsset),
}

impl IngestOutcome {
    pub fn asset(&self) -> &StoredAsset {
        match self {
            IngestOutcome::Created(a) | IngestOutcome::Duplicate(a) => a,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, IngestOutcome::Duplicate(_))
    }
}

/// Progress events emitted by [`ingest_batch`].
#[derive(Debug, Clone)]
pub enum IngestEvent {
    Created {
        index: usize,
        source: String,
        asset: StoredAsset,
    },
    Duplicate {
        index: usize,
        source: String,
        existing: StoredAsset,
    },
    Failed {
        index: usize,
        source: String,
        error: String,
    },
}

/// Result for one file of a batch, in input order.
#[derive(Debug)]
pub struct BatchItem {
    pub source: PathBuf,
    pub result: Result<IngestOutcome, IngestError>,
}

/// Ingest one upload with the default image backend.
pub fn ingest<S: AssetStore + ?Sized>(
    store: &S,
    config: &UploadConfig,
    request: IngestRequest,
) -> Result<IngestOutcome, IngestError> {
    ingest_with_backend(store, &RustBackend::new(), config, request)
}

/// Ingest one upload using a specific backend (allows testing with mock).
pub fn ingest_with_backend<S: AssetStore + ?Sized>(
    store: &S,
    backend: &impl ImageBackend,
    config: &UploadConfig,
    request: IngestRequest,
) -> Result<IngestOutcome, IngestError> {
    let IngestRequest {
        bytes,
        filename,
        options,
    } = request;

    let extension = validate(&config.limits, &filename, bytes.len() as u64)?;

    let raw_hash = content_hash(&bytes);
    if !options.force_upload
        && let Some(existing) = find_duplicate(store, &raw_hash, bytes.len() as u64)?
    {
        info!(filename = %filename, existing_id = %existing.id, "duplicate upload");
        return Ok(IngestOutcome::Duplicate(existing));
    }

    let prepared = prepare(backend, config, &options, &filename, extension, bytes);

    let final_hash = if prepared.transformed {
        content_hash(&prepared.bytes)
    } else {
        raw_hash
    };
    if !options.force_upload
        && prepared.transformed
        && let Some(existing) = find_duplicate(store, &final_hash, prepared.bytes.len() as u64)?
    {
        info!(
            filename = %filename,
            existing_id = %existing.id,
            "optimized output matches an existing asset"
        );
        return Ok(IngestOutcome::Duplicate(existing));
    }

    persist(store, &filename, &options, prepared, final_hash)
}

/// Download `url` and ingest it with the default image backend.
pub fn ingest_remote<S: AssetStore + ?Sized>(
    store: &S,
    config: &UploadConfig,
    url: &str,
    options: IngestOptions,
) -> Result<IngestOutcome, IngestError> {
    let client = fetch::client(config)?;
    ingest_remote_with(store, &client, config, url, options)
}

/// [`ingest_remote`] through an existing HTTP client. Nothing is stored when
/// the download fails.
pub fn ingest_remote_with<S: AssetStore + ?Sized>(
    store: &S,
    client: &Client,
    config: &UploadConfig,
    url: &str,
    options: IngestOptions,
) -> Result<IngestOutcome, IngestError> {
    let fetched = fetch::fetch_with(client, config, fetch::parse_url(url)?)?;
    let request = IngestRequest::new(fetched.filename, fetched.bytes).with_options(options);
    ingest(store, config, request)
}

/// Ingest files from disk in parallel.
///
/// Each file is read inside its worker. Events go to `progress` as files
/// finish (in completion order); the returned items are in input order.
pub fn ingest_batch<S: AssetStore + ?Sized>(
    store: &S,
    backend: &impl ImageBackend,
    config: &UploadConfig,
    paths: &[PathBuf],
    options: &IngestOptions,
    progress: Option<Sender<IngestEvent>>,
) -> Vec<BatchItem> {
    paths
        .par_iter()
        .enumerate()
        .map_with(progress, |progress, (index, path)| {
            let result = ingest_path(store, backend, config, path, options);
            if let Some(tx) = progress {
                let source = path.display().to_string();
                let event = match &result {
                    Ok(IngestOutcome::Created(asset)) => IngestEvent::Created {
                        index,
                        source,
                        asset: asset.clone(),
                    },
                    Ok(IngestOutcome::Duplicate(existing)) => IngestEvent::Duplicate {
                        index,
                        source,
                        existing: existing.clone(),
                    },
                    Err(e) => IngestEvent::Failed {
                        index,
                        source,
                        error: e.to_string(),
                    },
                };
                tx.send(event).ok();
            }
            BatchItem {
                source: path.clone(),
                result,
            }
        })
        .collect()
}

/// Read and ingest a single file, checking the size before reading it.
fn ingest_path<S: AssetStore + ?Sized>(
    store: &S,
    backend: &impl ImageBackend,
    config: &UploadConfig,
    path: &Path,
    options: &IngestOptions,
) -> Result<IngestOutcome, IngestError> {
    let limit = config.limits.max_upload_bytes;
    let size = std::fs::metadata(path)?.len();
    if size > limit {
        return Err(ValidationError::TooLarge { size, limit }.into());
    }
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let bytes = std::fs::read(path)?;
    let request = IngestRequest::new(filename, bytes).with_options(options.clone());
    ingest_with_backend(store, backend, config, request)
}

/// Check size and extension. Returns the lowercased extension.
fn validate(limits: &LimitsConfig, filename: &str, size: u64) -> Result<String, ValidationError> {
    if size > limits.max_upload_bytes {
        return Err(ValidationError::TooLarge {
            size,
            limit: limits.max_upload_bytes,
        });
    }
    let Some(extension) = extension_of(filename) else {
        return Err(ValidationError::DisallowedExtension(String::new()));
    };
    if !limits.is_allowed(&extension) {
        return Err(ValidationError::DisallowedExtension(extension));
    }
    Ok(extension)
}

/// Bytes ready to persist, with the metadata that describes them.
struct Prepared {
    bytes: Vec<u8>,
    extension: String,
    mime_type: String,
    width: Option<u32>,
    height: Option<u32>,
    transformed: bool,
}

fn prepare(
    backend: &impl ImageBackend,
    config: &UploadConfig,
    options: &IngestOptions,
    filename: &str,
    extension: String,
    bytes: Vec<u8>,
) -> Prepared {
    let guessed = mime_guess::from_path(filename).first();
    let is_image = guessed
        .as_ref()
        .is_some_and(|m| m.type_() == mime_guess::mime::IMAGE);
    let mime_type = guessed
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let optimizable = is_image && OPTIMIZABLE_EXTENSIONS.contains(&extension.as_str());

    if optimizable {
        let params = OptimizeParams {
            max_width: options
                .max_width
                .filter(|w| *w > 0)
                .unwrap_or(config.images.max_width),
            max_height: options
                .max_height
                .filter(|h| *h > 0)
                .unwrap_or(config.images.max_height),
            format: TargetFormat::from_filename(filename),
            quality: Quality::new(options.quality.unwrap_or(config.images.quality)),
        };
        match backend.optimize(&bytes, &params) {
            Ok(out) => {
                info!(
                    filename,
                    from = %format!("{}x{}", out.original.width, out.original.height),
                    to = %format!("{}x{}", out.output.width, out.output.height),
                    bytes_in = bytes.len(),
                    bytes_out = out.bytes.len(),
                    "optimized image"
                );
                return Prepared {
                    bytes: out.bytes,
                    extension: out.format.extension().to_string(),
                    mime_type: out.format.mime_type().to_string(),
                    width: Some(out.output.width),
                    height: Some(out.output.height),
                    transformed: true,
                };
            }
            Err(e) => warn_passthrough(filename, &e),
        }
    }

    let (width, height) = if is_image {
        match backend.identify(&bytes) {
            Ok(dims) => (Some(dims.width), Some(dims.height)),
            Err(e) => {
                debug!(filename, error = %e, "could not read image dimensions");
                (None, None)
            }
        }
    } else {
        (None, None)
    };

    Prepared {
        bytes,
        extension,
        mime_type,
        width,
        height,
        transformed: false,
    }
}

fn warn_passthrough(filename: &str, error: &BackendError) {
    warn!(filename, error = %error, "image optimization failed, storing original bytes");
}

fn persist<S: AssetStore + ?Sized>(
    store: &S,
    filename: &str,
    options: &IngestOptions,
    prepared: Prepared,
    content_hash: String,
) -> Result<IngestOutcome, IngestError> {
    let stored_filename = opaque_filename(Some(prepared.extension.as_str()));
    store.save(&prepared.bytes, &stored_filename)?;

    let asset = NewAsset {
        stored_filename: stored_filename.clone(),
        original_filename: filename.to_string(),
        title: title_from_filename(filename),
        alt_text: non_empty(options.alt_text.as_deref()),
        description: None,
        folder: non_empty(options.folder.as_deref()),
        byte_size: prepared.bytes.len() as u64,
        mime_type: prepared.mime_type,
        width: prepared.width,
        height: prepared.height,
        content_hash,
    };

    match store.insert(asset) {
        Ok(stored) => {
            info!(
                id = %stored.id,
                filename,
                stored = %stored.stored_filename,
                "stored asset"
            );
            Ok(IngestOutcome::Created(stored))
        }
        Err(err) => {
            if let Err(cleanup) = store.delete(&stored_filename) {
                warn!(stored = %stored_filename, error = %cleanup, "failed to remove orphaned file");
            }
            match err {
                StoreError::HashConflict(existing) => {
                    info!(filename, existing_id = %existing.id, "duplicate detected at insert");
                    Ok(IngestOutcome::Duplicate(*existing))
                }
                other => Err(other.into()),
            }
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
