//! Durable checkpoint persistence
//!
//! All in-memory mutations go through a mutex (single-writer discipline) and
//! are cheap; `flush` snapshots the record under the lock and performs disk
//! I/O on the copy, so processing is never blocked behind the filesystem.
//! The file itself is written atomically: temp file in the same directory,
//! then rename, so a crash mid-write leaves the previous checkpoint intact.

use crate::checkpoint::record::{
    CheckpointRecord, CurrentPosition, FailedUrl, ProcessedUrl, Statistics, CHECKPOINT_VERSION,
};
use crate::tree::WorkItem;
use chrono::Utc;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

/// Errors from loading or persisting the checkpoint
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Failed to read or write checkpoint file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid checkpoint JSON: {0}")]
    Serde(#[from] serde_json::Error),

    #[error(
        "Checkpoint was written under a different configuration \
         (stored hash {stored}, current hash {current}); \
         discard the checkpoint or restore the configuration to resume"
    )]
    ConfigMismatch { stored: String, current: String },

    #[error("Unsupported checkpoint version: {0}")]
    UnsupportedVersion(String),
}

/// Owns the live [`CheckpointRecord`] and its file on disk
pub struct CheckpointStore {
    path: PathBuf,
    inner: Mutex<CheckpointRecord>,
}

impl CheckpointStore {
    /// Creates a store with a fresh, empty record (no file read)
    pub fn create(
        path: impl Into<PathBuf>,
        source_file: impl Into<String>,
        config_hash: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            inner: Mutex::new(CheckpointRecord::new(source_file, config_hash)),
        }
    }

    /// Loads an existing checkpoint for resuming
    ///
    /// Returns `Ok(None)` when no checkpoint file exists or it belongs to a
    /// different bookmarks file (the caller then starts fresh). A config
    /// hash mismatch is a hard error, never a silent fallback.
    pub fn load(
        path: &Path,
        source_file: &str,
        config_hash: &str,
    ) -> Result<Option<Self>, CheckpointError> {
        if !path.exists() {
            tracing::debug!("No checkpoint file at {}", path.display());
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)?;
        let record: CheckpointRecord = serde_json::from_str(&content)?;

        if record.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion(record.version));
        }

        if record.config_hash != config_hash {
            return Err(CheckpointError::ConfigMismatch {
                stored: record.config_hash,
                current: config_hash.to_string(),
            });
        }

        if record.source_file_path != source_file {
            tracing::warn!(
                "Checkpoint belongs to '{}', not '{}'; starting fresh",
                record.source_file_path,
                source_file
            );
            return Ok(None);
        }

        tracing::info!(
            "Loaded checkpoint: {} processed, {} failed",
            record.processed_urls.len(),
            record.failed_urls.len()
        );

        Ok(Some(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(record),
        }))
    }

    /// Records a successful outcome for `item`
    ///
    /// Idempotent per URL: an earlier processed entry for the same URL is
    /// replaced, and the URL is removed from the failed set so it never
    /// appears in both.
    pub fn record_success(&self, item: &WorkItem, output_path: Option<String>) {
        let mut record = self.lock();

        record.failed_urls.retain(|f| f.url != item.url());
        record.processed_urls.retain(|p| p.url != item.url());
        record.processed_urls.push(ProcessedUrl {
            url: item.url().to_string(),
            title: item.title().to_string(),
            processed_at: Utc::now().to_rfc3339(),
            output_path,
            folder_path: item.folder_path.clone(),
            error: None,
        });

        Self::refresh_statistics(&mut record);
    }

    /// Records a terminal failure for `item`
    pub fn record_failure(&self, item: &WorkItem, error: &str) {
        let mut record = self.lock();

        record.processed_urls.retain(|p| p.url != item.url());
        record.failed_urls.retain(|f| f.url != item.url());
        record.failed_urls.push(FailedUrl {
            url: item.url().to_string(),
            title: item.title().to_string(),
            failed_at: Utc::now().to_rfc3339(),
            error: error.to_string(),
            folder_path: item.folder_path.clone(),
        });

        Self::refresh_statistics(&mut record);
    }

    /// Updates the resume position; called after every visited item
    /// regardless of outcome.
    pub fn mark_position(&self, item: &WorkItem) {
        let mut record = self.lock();
        record.current_position = Some(CurrentPosition {
            folder_path: item.folder_path.clone(),
            index: item.index,
            total_in_folder: item.total_in_folder,
        });
    }

    /// Initializes run statistics, preserving counts carried over from a
    /// resumed checkpoint.
    pub fn init_statistics(&self, total_bookmarks: u64) {
        let mut record = self.lock();
        let now = Utc::now().to_rfc3339();
        let processed = record.processed_urls.len() as u64;
        let failed = record.failed_urls.len() as u64;
        record.statistics = Some(Statistics {
            total_bookmarks,
            processed_count: processed,
            failed_count: failed,
            skipped_count: 0,
            start_time: now.clone(),
            last_update: now,
        });
    }

    /// Adds to the skipped counter
    pub fn add_skipped(&self, count: u64) {
        let mut record = self.lock();
        if let Some(stats) = record.statistics.as_mut() {
            stats.skipped_count += count;
        }
    }

    /// Set of URLs with a recorded successful outcome
    pub fn processed_urls(&self) -> HashSet<String> {
        self.lock()
            .processed_urls
            .iter()
            .map(|p| p.url.clone())
            .collect()
    }

    /// Set of URLs with a recorded failure
    pub fn failed_urls(&self) -> HashSet<String> {
        self.lock()
            .failed_urls
            .iter()
            .map(|f| f.url.clone())
            .collect()
    }

    /// The universe for a recheck-failed run: the failed set, or, when it is
    /// empty, processed entries carrying a legacy non-empty error field.
    pub fn recheck_universe(&self) -> HashSet<String> {
        let record = self.lock();

        let failed: HashSet<String> = record.failed_urls.iter().map(|f| f.url.clone()).collect();
        if !failed.is_empty() {
            return failed;
        }

        record
            .processed_urls
            .iter()
            .filter(|p| p.error.as_deref().is_some_and(|e| !e.is_empty()))
            .map(|p| p.url.clone())
            .collect()
    }

    /// Saved resume position, if any
    pub fn position(&self) -> Option<CurrentPosition> {
        self.lock().current_position.clone()
    }

    /// Snapshot of the current statistics
    pub fn statistics(&self) -> Statistics {
        self.lock().statistics.clone().unwrap_or_default()
    }

    /// Atomically writes the record to disk
    ///
    /// The record is cloned under the lock and serialized outside it; the
    /// bytes go to a temp file in the target directory which is then renamed
    /// over the checkpoint, so readers only ever see a complete file.
    pub fn flush(&self) -> Result<(), CheckpointError> {
        let snapshot = {
            let now = Utc::now().to_rfc3339();
            let mut record = self.lock();
            record.timestamp = now.clone();
            if let Some(stats) = record.statistics.as_mut() {
                stats.last_update = now;
            }
            record.clone()
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(&snapshot)?;

        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = std::fs::File::create(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;

        tracing::debug!(
            "Checkpoint flushed: {} processed, {} failed",
            snapshot.processed_urls.len(),
            snapshot.failed_urls.len()
        );

        Ok(())
    }

    /// Path of the checkpoint file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn refresh_statistics(record: &mut CheckpointRecord) {
        let processed = record.processed_urls.len() as u64;
        let failed = record.failed_urls.len() as u64;
        if let Some(stats) = record.statistics.as_mut() {
            stats.processed_count = processed;
            stats.failed_count = failed;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CheckpointRecord> {
        // Mutations never panic while holding the lock
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
