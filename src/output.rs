//! CLI output formatting.
//!
//! # Asset-First Display
//!
//! Every line leads with the asset's identity (`#id` + title). File paths,
//! stored names and hashes follow as indented context lines, so the output
//! reads as a library inventory while still tracing back to files.
//!
//! # Output Format
//!
//! ## Upload
//!
//! ```text
//! Created   #12 Beach Day (1440x1080, 312.4 KB)
//!     Source: photos/beach-day.jpg
//!     Stored: 3f2a9c0d4e5b6a7f8091a2b3c4d5e6f7.jpg
//! Duplicate #7 Beach Day
//!     Source: photos/beach-day-copy.jpg
//! Failed    photos/scan.bmp
//!     Error: file type "bmp" is not allowed
//!
//! Uploaded 1, duplicates 1, failed 1
//! ```
//!
//! ## List
//!
//! ```text
//! #12 Beach Day  image/jpeg  1440x1080  312.4 KB
//! #11 Annual Report  application/pdf  1.2 MB
//! Page 1 of 3 (45 assets)
//! ```
//!
//! ## Verify
//!
//! ```text
//! #3 missing file 81d04e.pdf
//! #5 hash mismatch 3f2a9c.jpg
//!     expected: ab12…
//!     actual:   cd34…
//! 2 problems in 40 assets
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::ingest::{BatchItem, IngestEvent, IngestOutcome};
use crate::library::{AssetPage, VerifyIssue};
use crate::types::StoredAsset;

// ============================================================================
// Shared helpers
// ============================================================================

/// Human-readable byte count using 1024-based units.
///
/// ```text
/// 512 B, 1.5 KB, 312.4 KB, 10.0 MB
/// ```
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// `#id Title`.
fn asset_header(asset: &StoredAsset) -> String {
    format!("#{} {}", asset.id, asset.title)
}

/// `(WxH, size)` or `(size)` when dimensions are unknown.
fn size_detail(asset: &StoredAsset) -> String {
    match asset.dimensions_label() {
        Some(dims) => format!("({dims}, {})", format_file_size(asset.byte_size)),
        None => format!("({})", format_file_size(asset.byte_size)),
    }
}

// ============================================================================
// Upload
// ============================================================================

/// Format one ingest progress event.
pub fn format_ingest_event(event: &IngestEvent) -> Vec<String> {
    match event {
        IngestEvent::Created { source, asset, .. } => vec![
            format!("Created   {} {}", asset_header(asset), size_detail(asset)),
            format!("    Source: {source}"),
            format!("    Stored: {}", asset.stored_filename),
        ],
        IngestEvent::Duplicate {
            source, existing, ..
        } => vec![
            format!("Duplicate {}", asset_header(existing)),
            format!("    Source: {source}"),
        ],
        IngestEvent::Failed { source, error, .. } => vec![
            format!("Failed    {source}"),
            format!("    Error: {error}"),
        ],
    }
}

/// Format the result of a single ingest (fetch command).
pub fn format_ingest_outcome(source: &str, outcome: &IngestOutcome) -> Vec<String> {
    let event = match outcome {
        IngestOutcome::Created(asset) => IngestEvent::Created {
            index: 0,
            source: source.to_string(),
            asset: asset.clone(),
        },
        IngestOutcome::Duplicate(existing) => IngestEvent::Duplicate {
            index: 0,
            source: source.to_string(),
            existing: existing.clone(),
        },
    };
    format_ingest_event(&event)
}

/// One-line tally of a batch.
pub fn format_batch_summary(items: &[BatchItem]) -> String {
    let mut created = 0;
    let mut duplicates = 0;
    let mut failed = 0;
    for item in items {
        match &item.result {
            Ok(IngestOutcome::Created(_)) => created += 1,
            Ok(IngestOutcome::Duplicate(_)) => duplicates += 1,
            Err(_) => failed += 1,
        }
    }
    format!("Uploaded {created}, duplicates {duplicates}, failed {failed}")
}

// ============================================================================
// Library
// ============================================================================

/// Format a page of assets, one line each, plus a page footer.
pub fn format_asset_page(page: &AssetPage) -> Vec<String> {
    if page.total == 0 {
        return vec!["No assets".to_string()];
    }
    let mut lines: Vec<String> = page
        .assets
        .iter()
        .map(|asset| {
            let mut line = format!("{}  {}", asset_header(asset), asset.mime_type);
            if let Some(dims) = asset.dimensions_label() {
                line.push_str(&format!("  {dims}"));
            }
            line.push_str(&format!("  {}", format_file_size(asset.byte_size)));
            line
        })
        .collect();
    lines.push(format!(
        "Page {} of {} ({} assets)",
        page.page,
        page.total_pages(),
        page.total
    ));
    lines
}

/// Full detail view of one asset.
pub fn format_asset_detail(asset: &StoredAsset) -> Vec<String> {
    let mut lines = vec![asset_header(asset)];
    lines.push(format!("    Original: {}", asset.original_filename));
    lines.push(format!("    Stored: {}", asset.stored_filename));
    lines.push(format!("    Type: {}", asset.mime_type));
    lines.push(format!("    Size: {}", format_file_size(asset.byte_size)));
    if let Some(dims) = asset.dimensions_label() {
        lines.push(format!("    Dimensions: {dims}"));
    }
    if let Some(folder) = &asset.folder {
        lines.push(format!("    Folder: {folder}"));
    }
    if let Some(alt) = &asset.alt_text {
        lines.push(format!("    Alt: {alt}"));
    }
    if let Some(desc) = &asset.description {
        lines.push(format!("    Description: {desc}"));
    }
    lines.push(format!("    SHA-256: {}", asset.content_hash));
    lines.push(format!("    Created: {}", asset.created_at.to_rfc3339()));
    lines
}

// ============================================================================
// Verify
// ============================================================================

/// Format integrity check results.
pub fn format_verify(issues: &[VerifyIssue], checked: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for issue in issues {
        match issue {
            VerifyIssue::Missing {
                id,
                stored_filename,
            } => lines.push(format!("#{id} missing file {stored_filename}")),
            VerifyIssue::HashMismatch {
                id,
                stored_filename,
                expected,
                actual,
            } => {
                lines.push(format!("#{id} hash mismatch {stored_filename}"));
                lines.push(format!("    expected: {expected}"));
                lines.push(format!("    actual:   {actual}"));
            }
        }
    }
    if issues.is_empty() {
        lines.push(format!("All {checked} assets verified"));
    } else {
        let noun = if issues.len() == 1 { "problem" } else { "problems" };
        lines.push(format!("{} {noun} in {checked} assets", issues.len()));
    }
    lines
}

// ============================================================================
// Print wrappers
// ============================================================================

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

pub fn print_asset_page(page: &AssetPage) {
    print_lines(&format_asset_page(page));
}

pub fn print_asset_detail(asset: &StoredAsset) {
    print_lines(&format_asset_detail(asset));
}

pub fn print_verify(issues: &[VerifyIssue], checked: usize) {
    print_lines(&format_verify(issues, checked));
}

pub fn print_ingest_outcome(source: &str, outcome: &IngestOutcome) {
    print_lines(&format_ingest_outcome(source, outcome));
}
