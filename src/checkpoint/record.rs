//! Checkpoint record types
//!
//! The checkpoint file is both the crash-recovery mechanism and an
//! operator-facing audit log, so the JSON shape is stable: unknown or
//! missing fields default instead of hard-failing. The one exception is
//! `config_hash`, which is compared byte-for-byte at load time.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Current checkpoint schema version
pub const CHECKPOINT_VERSION: &str = "1.0";

/// The persisted progress state, the single source of truth for resumability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRecord {
    #[serde(default)]
    pub version: String,

    /// Time of the last flush, RFC 3339
    #[serde(default)]
    pub timestamp: String,

    /// Bookmarks file this record belongs to
    #[serde(default)]
    pub source_file_path: String,

    /// Resume-compatibility hash of the active configuration
    #[serde(default)]
    pub config_hash: String,

    #[serde(default)]
    pub processed_urls: Vec<ProcessedUrl>,

    #[serde(default)]
    pub failed_urls: Vec<FailedUrl>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_position: Option<CurrentPosition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Statistics>,
}

impl CheckpointRecord {
    /// Creates an empty record for a fresh run
    pub fn new(source_file_path: impl Into<String>, config_hash: impl Into<String>) -> Self {
        Self {
            version: CHECKPOINT_VERSION.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            source_file_path: source_file_path.into(),
            config_hash: config_hash.into(),
            processed_urls: Vec::new(),
            failed_urls: Vec::new(),
            current_position: None,
            statistics: None,
        }
    }
}

/// One successfully processed bookmark
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedUrl {
    pub url: String,
    pub title: String,

    /// RFC 3339 completion time
    pub processed_at: String,

    /// Where the markdown file was written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,

    #[serde(default)]
    pub folder_path: Vec<String>,

    /// Legacy field: older checkpoints stored soft failures here. Kept for
    /// the recheck-failed fallback scan; never written by this version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One bookmark whose processing failed after retries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedUrl {
    pub url: String,
    pub title: String,

    /// RFC 3339 failure time
    pub failed_at: String,

    pub error: String,

    #[serde(default)]
    pub folder_path: Vec<String>,
}

/// Last traversal position, enough to resume a depth-first walk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentPosition {
    pub folder_path: Vec<String>,
    pub index: usize,
    pub total_in_folder: usize,
}

/// Aggregate run counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Statistics {
    #[serde(default)]
    pub total_bookmarks: u64,
    #[serde(default)]
    pub processed_count: u64,
    #[serde(default)]
    pub failed_count: u64,
    #[serde(default)]
    pub skipped_count: u64,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub last_update: String,
}
