//! Output generation
//!
//! This module turns processed bookmarks into files on disk:
//! - A markdown file per bookmark, nested to mirror the folder hierarchy
//! - An optional Mermaid diagram of the bookmark structure
//! - The end-of-run summary printed to the console

pub mod diagram;
pub mod stats;
pub mod writer;

pub use diagram::generate_diagram;
pub use stats::{print_summary, RunSummary};
pub use writer::{sanitize_filename, FileSystemWriter};

use crate::tree::WorkItem;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors from writing output files
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),
}

/// Result type for output operations
pub type OutputResult<T> = std::result::Result<T, OutputError>;

/// A fully processed bookmark, ready to be written
#[derive(Debug, Clone)]
pub struct ProcessedPage {
    pub url: String,
    pub title: String,
    pub summary: String,
    pub fetched_at: DateTime<Utc>,
}

/// Writes a processed bookmark to its destination
#[async_trait]
pub trait Writer: Send + Sync {
    /// Writes `page` for `item`, returning the relative output path
    async fn write(&self, item: &WorkItem, page: &ProcessedPage) -> OutputResult<String>;
}
