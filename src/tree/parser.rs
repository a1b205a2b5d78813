//! Chrome bookmark JSON parsing
//!
//! Chrome's `Bookmarks` file is a JSON document with a `roots` object holding
//! the `bookmark_bar`, `other` and `synced` sections. Each node is either a
//! `folder` with ordered `children` or a `url` leaf. We preserve child order
//! exactly as stored, because the processing engine's traversal order (and
//! therefore its resume positions) depend on it.

use crate::tree::{Bookmark, BookmarkEntry, BookmarkFolder};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

/// Errors from loading or parsing the bookmarks file
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to read bookmarks file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid bookmarks structure: {0}")]
    Structure(String),
}

/// Microseconds between 1601-01-01 (Chrome's epoch) and 1970-01-01
const CHROME_EPOCH_OFFSET_MICROS: i64 = 11_644_473_600_000_000;

/// Loads and parses a Chrome bookmarks file
///
/// # Arguments
///
/// * `path` - Path to the Chrome `Bookmarks` JSON file
///
/// # Returns
///
/// * `Ok(BookmarkFolder)` - Root folder with the three Chrome sections as children
/// * `Err(ParseError)` - File unreadable or structurally invalid
pub fn load_bookmarks(path: &Path) -> Result<BookmarkFolder, ParseError> {
    tracing::info!("Loading bookmarks file: {}", path.display());
    let content = std::fs::read_to_string(path)?;
    let data: Value = serde_json::from_str(&content)?;
    parse_bookmarks(&data)
}

/// Parses an already-loaded bookmarks JSON document
pub fn parse_bookmarks(data: &Value) -> Result<BookmarkFolder, ParseError> {
    let roots = data
        .get("roots")
        .and_then(Value::as_object)
        .ok_or_else(|| ParseError::Structure("missing 'roots' object".to_string()))?;

    let mut root = BookmarkFolder::new("Root");

    // Chrome's three fixed sections, with their conventional display names
    let sections = [
        ("bookmark_bar", "Bookmark Bar"),
        ("other", "Other"),
        ("synced", "Mobile"),
    ];

    for (key, display_name) in sections {
        if let Some(node) = roots.get(key) {
            if let Some(entry) = parse_node(node, display_name) {
                // Chrome's stored section names vary by locale; the
                // conventional names keep output paths stable
                let entry = match entry {
                    BookmarkEntry::Folder(mut folder) => {
                        folder.name = display_name.to_string();
                        BookmarkEntry::Folder(folder)
                    }
                    other => other,
                };
                root.entries.push(entry);
            }
        }
    }

    let total = root.count_bookmarks();
    tracing::info!(
        "Parsed bookmark tree: {} top-level sections, {} bookmarks",
        root.entries.len(),
        total
    );

    Ok(root)
}

/// Recursively parses one bookmark node
///
/// Unknown node types and url nodes without a URL are skipped with a warning
/// rather than failing the whole parse.
fn parse_node(node: &Value, default_name: &str) -> Option<BookmarkEntry> {
    let node_type = node.get("type").and_then(Value::as_str).unwrap_or("");
    let title = node
        .get("name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(default_name);

    match node_type {
        "folder" => {
            let mut folder = BookmarkFolder::new(title);
            if let Some(children) = node.get("children").and_then(Value::as_array) {
                for child in children {
                    if let Some(entry) = parse_node(child, "Untitled") {
                        folder.entries.push(entry);
                    }
                }
            }
            Some(BookmarkEntry::Folder(folder))
        }
        "url" => {
            let url = node.get("url").and_then(Value::as_str)?;
            if url.is_empty() {
                tracing::warn!("Skipping bookmark without URL: {}", title);
                return None;
            }

            let date_added = node
                .get("date_added")
                .and_then(Value::as_str)
                .and_then(|s| parse_chrome_timestamp(s, title));

            Some(BookmarkEntry::Bookmark(Bookmark {
                title: title.to_string(),
                url: url.to_string(),
                date_added,
            }))
        }
        other => {
            tracing::warn!("Unknown bookmark node type '{}' for '{}'", other, title);
            None
        }
    }
}

/// Converts Chrome's microseconds-since-1601 timestamp to a UTC datetime
fn parse_chrome_timestamp(raw: &str, title: &str) -> Option<DateTime<Utc>> {
    let micros: i64 = match raw.parse() {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("Unparseable date_added for '{}': {} ({})", title, raw, e);
            return None;
        }
    };

    let unix_micros = micros - CHROME_EPOCH_OFFSET_MICROS;
    Utc.timestamp_micros(unix_micros).single()
}
