//! Remote URL fetch for ingest.
//!
//! Downloads a file over HTTP(S) with a connect timeout, a whole-request
//! timeout, and a byte cap enforced while the body streams in, so an
//! oversized or endless response never lands fully in memory.
//!
//! ## File names
//!
//! The name handed to the pipeline comes from the last URL path segment.
//! When that segment has no extension one is inferred from `Content-Type`:
//!
//! | Content-Type | Extension |
//! |---|---|
//! | `image/jpeg` | `jpg` |
//! | `image/png` | `png` |
//! | `image/gif` | `gif` |
//! | `image/webp` | `webp` |
//! | anything else / missing | `jpg` |
//!
//! A URL with no path segment (`https://host/`) is named `downloaded_file.<ext>`.
//! Segments are percent-decoded, so `my%20photo.jpg` arrives as `my photo.jpg`.

use crate::config::UploadConfig;
use crate::naming::{extension_of, last_path_segment};
use percent_encoding::percent_decode_str;
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::io::{self, Read};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("remote server returned status {0}")]
    Status(u16),
    #[error("remote file exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// A downloaded file ready for the ingest pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Download `url`, honouring the configured timeouts and upload size cap.
pub fn fetch_remote(config: &UploadConfig, url: &str) -> Result<FetchedFile, FetchError> {
    let parsed = parse_url(url)?;
    fetch_with(&client(config)?, config, parsed)
}

/// HTTP client with the configured connect and whole-request timeouts.
pub fn client(config: &UploadConfig) -> Result<Client, FetchError> {
    Ok(Client::builder()
        .connect_timeout(config.fetch.connect_timeout())
        .timeout(config.fetch.timeout())
        .build()?)
}

/// Download through an existing client. Only the size cap is read from
/// `config`; timeouts belong to the client.
pub fn fetch_with(
    client: &Client,
    config: &UploadConfig,
    parsed: Url,
) -> Result<FetchedFile, FetchError> {
    let limit = config.limits.max_upload_bytes;
    let response = client.get(parsed.clone()).send()?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if let Some(declared) = response.content_length()
        && declared > limit
    {
        return Err(FetchError::TooLarge { limit });
    }

    let bytes = read_capped(response, limit)?;
    let filename = filename_for(&parsed, content_type.as_deref());
    info!(url = %parsed, filename = %filename, bytes = bytes.len(), "fetched remote file");

    Ok(FetchedFile {
        filename,
        bytes,
        content_type,
    })
}

/// Parse `url`, accepting only `http` and `https`.
pub fn parse_url(url: &str) -> Result<Url, FetchError> {
    let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(FetchError::InvalidUrl(format!(
            "{url}: unsupported scheme {other}"
        ))),
    }
}

/// Read at most `limit` bytes, failing as soon as one more byte shows up.
pub fn read_capped<R: Read>(reader: R, limit: u64) -> Result<Vec<u8>, FetchError> {
    let mut buf = Vec::new();
    reader.take(limit.saturating_add(1)).read_to_end(&mut buf)?;
    if buf.len() as u64 > limit {
        return Err(FetchError::TooLarge { limit });
    }
    Ok(buf)
}

/// Name for a fetched file, from its URL and `Content-Type`.
pub fn filename_for(url: &Url, content_type: Option<&str>) -> String {
    let segment = last_path_segment(url.path())
        .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned());
    match segment {
        Some(segment) if extension_of(&segment).is_some() => segment,
        Some(segment) => format!("{segment}.{}", extension_for_content_type(content_type)),
        None => format!(
            "downloaded_file.{}",
            extension_for_content_type(content_type)
        ),
    }
}

/// File extension for an image `Content-Type`, defaulting to `jpg`.
pub fn extension_for_content_type(content_type: Option<&str>) -> &'static str {
    let essence = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase());
    match essence.as_deref() {
        Some("image/png") => "png",
        Some("image/gif") => "gif",
        Some("image/webp") => "webp",
        _ => "jpg",
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use mockito::Server;
    use std::io::{Cursor, Write};

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    // =========================================================================
    // read_capped
    // =========================================================================

    #[test]
    fn read_capped_under_limit() {
        let bytes = read_capped(Cursor::new(vec![7u8; 100]), 100).unwrap();
        assert_eq!(bytes.len(), 100);
    }

    #[test]
    fn read_capped_over_limit() {
        let err = read_capped(Cursor::new(vec![7u8; 101]), 100).unwrap_err();
        assert!(matches!(err, FetchError::TooLarge { limit: 100 }));
    }

    #[test]
    fn read_capped_stops_reading_past_limit() {
        // An endless reader must not be drained.
        let err = read_capped(io::repeat(1), 1024).unwrap_err();
        assert!(matches!(err, FetchError::TooLarge { limit: 1024 }));
    }

    // =========================================================================
    // File names
    // =========================================================================

    #[test]
    fn filename_from_last_segment() {
        assert_eq!(
            filename_for(&url("https://cdn.example.com/a/b/cat.png?size=large"), None),
            "cat.png"
        );
    }

    #[test]
    fn filename_extension_from_content_type() {
        assert_eq!(
            filename_for(&url("https://example.com/photos/42"), Some("image/webp")),
            "42.webp"
        );
        assert_eq!(
            filename_for(
                &url("https://example.com/render"),
                Some("image/PNG; charset=binary")
            ),
            "render.png"
        );
    }

    #[test]
    fn filename_defaults_to_jpg() {
        assert_eq!(
            filename_for(&url("https://example.com/blob"), Some("application/octet-stream")),
            "blob.jpg"
        );
        assert_eq!(filename_for(&url("https://example.com/blob"), None), "blob.jpg");
    }

    #[test]
    fn filename_is_percent_decoded() {
        assert_eq!(
            filename_for(&url("https://x.example/my%20photo.jpg"), None),
            "my photo.jpg"
        );
        assert_eq!(
            filename_for(&url("https://x.example/caf%C3%A9"), Some("image/png")),
            "café.png"
        );
    }

    #[test]
    fn filename_without_segment() {
        assert_eq!(
            filename_for(&url("https://example.com/"), Some("image/gif")),
            "downloaded_file.gif"
        );
    }

    #[test]
    fn content_type_mapping() {
        assert_eq!(extension_for_content_type(Some("image/jpeg")), "jpg");
        assert_eq!(extension_for_content_type(Some("image/png")), "png");
        assert_eq!(extension_for_content_type(Some("image/gif")), "gif");
        assert_eq!(extension_for_content_type(Some("image/webp")), "webp");
        assert_eq!(extension_for_content_type(Some("text/html")), "jpg");
    }

    // =========================================================================
    // URL validation
    // =========================================================================

    #[test]
    fn non_http_schemes_rejected() {
        assert!(matches!(
            fetch_remote(&UploadConfig::default(), "file:///etc/passwd"),
            Err(FetchError::InvalidUrl(_))
        ));
        assert!(matches!(
            fetch_remote(&UploadConfig::default(), "not a url"),
            Err(FetchError::InvalidUrl(_))
        ));
    }

    // =========================================================================
    // HTTP
    // =========================================================================

    /// Client that talks to the local mock server directly, whatever the
    /// environment's proxy settings.
    pub(crate) fn local_client() -> Client {
        Client::builder().no_proxy().build().unwrap()
    }

    fn small_limit(limit: u64) -> UploadConfig {
        let mut config = UploadConfig::default();
        config.limits.max_upload_bytes = limit;
        config
    }

    fn fetch_local(config: &UploadConfig, url: &str) -> Result<FetchedFile, FetchError> {
        fetch_with(&local_client(), config, parse_url(url).unwrap())
    }

    #[test]
    fn fetch_returns_body_and_name() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/gallery/render")
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body(b"png-bytes")
            .create();

        let fetched = fetch_local(
            &UploadConfig::default(),
            &format!("{}/gallery/render", server.url()),
        )
        .unwrap();

        mock.assert();
        assert_eq!(fetched.filename, "render.png");
        assert_eq!(fetched.bytes, b"png-bytes");
        assert_eq!(fetched.content_type.as_deref(), Some("image/png"));
    }

    #[test]
    fn non_success_status_is_reported() {
        let mut server = Server::new();
        server.mock("GET", "/missing.jpg").with_status(404).create();

        let err = fetch_local(
            &UploadConfig::default(),
            &format!("{}/missing.jpg", server.url()),
        )
        .unwrap_err();
        assert!(matches!(err, FetchError::Status(404)));
    }

    #[test]
    fn declared_length_over_limit_is_refused() {
        let mut server = Server::new();
        server
            .mock("GET", "/big.jpg")
            .with_status(200)
            .with_body(vec![0u8; 2048])
            .create();

        let err = fetch_local(&small_limit(1024), &format!("{}/big.jpg", server.url()))
            .unwrap_err();
        assert!(matches!(err, FetchError::TooLarge { limit: 1024 }));
    }

    #[test]
    fn chunked_body_over_limit_is_cut_off() {
        let mut server = Server::new();
        server
            .mock("GET", "/stream.jpg")
            .with_status(200)
            .with_chunked_body(|w| {
                for _ in 0..8 {
                    w.write_all(&[1u8; 512])?;
                }
                Ok(())
            })
            .create();

        let err = fetch_local(&small_limit(1024), &format!("{}/stream.jpg", server.url()))
            .unwrap_err();
        assert!(matches!(err, FetchError::TooLarge { limit: 1024 }));
    }
}
