//! # Media Ingest
//!
//! Upload pipeline for a media library. Files come in as bytes (local files or
//! remote URLs), get fingerprinted, deduplicated, optimized when they are
//! raster images, and land in an asset store with a JSON metadata index.
//!
//! # Architecture: One Pass Per Upload
//!
//! ```text
//! Ingest → Fingerprint → Decode & Normalize → Resize → Re-encode → Persist
//! ```
//!
//! - **Ingest**: validate size and extension, read bytes (or fetch a URL).
//! - **Fingerprint**: SHA-256 the raw bytes; identical content short-circuits
//!   to the existing asset and nothing is written.
//! - **Decode & Normalize**: apply EXIF orientation, pick the colour mode the
//!   output format can hold (alpha flattened onto white for JPEG/WebP).
//! - **Resize**: fit inside the configured box, Lanczos3, never upscale.
//! - **Re-encode**: JPEG, PNG or WebP depending on the upload's extension.
//! - **Persist**: opaque stored filename, bytes first, then the record.
//!
//! Every stage is a plain function of its inputs. Config values are passed in
//! explicitly and the only shared state is the store, which guards its own
//! index, so batches of uploads run in parallel on a rayon pool.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`ingest`] | The pipeline: validation, dedup, optimization, persistence, batches |
//! | [`dedup`] | SHA-256 content hashing and duplicate lookup |
//! | [`imaging`] | Image operations: identify, normalize, resize, encode |
//! | [`store`] | [`AssetStore`](store::AssetStore) trait and the filesystem store |
//! | [`fetch`] | Remote URL download with timeouts and a streamed size cap |
//! | [`library`] | List, edit, delete and verify stored assets |
//! | [`config`] | `media.toml` loading, validation and merging |
//! | [`types`] | Asset records shared by the store, pipeline and CLI |
//! | [`naming`] | Display titles and opaque stored filenames |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Content-Addressed Identity
//!
//! Duplicates are decided by the SHA-256 of the bytes alone. Filenames, sizes
//! and MIME types are never compared, so renaming a file does not fool the
//! check and two different files of the same size never collide.
//!
//! ## Optimization Is Best-Effort
//!
//! A file that claims to be an image but fails to decode is stored unchanged.
//! The upload succeeds; the log carries a warning.
//!
//! ## Self-Contained Imaging
//!
//! Decoding goes through the `image` crate, JPEG encoding through
//! `jpeg-encoder`, and lossy WebP through libwebp vendored by the `webp`
//! crate. No ImageMagick, no libvips, no system libraries: `cargo build` is
//! the whole install.

pub mod config;
pub mod dedup;
pub mod fetch;
pub mod imaging;
pub mod ingest;
pub mod library;
pub mod naming;
pub mod output;
pub mod store;
pub mod types;
