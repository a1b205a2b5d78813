//! Marginalia: a bookmark export and summarization engine
//!
//! This crate ingests a Chrome bookmark tree, fetches each bookmarked page,
//! generates an LLM summary for it, and writes the results to a markdown file
//! hierarchy mirroring the bookmark folders. Progress is checkpointed so an
//! interrupted run can be resumed without redoing completed work.

pub mod checkpoint;
pub mod config;
pub mod engine;
pub mod fetch;
pub mod output;
pub mod summarize;
pub mod tree;

use thiserror::Error;

/// Main error type for Marginalia operations
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Bookmark parse error: {0}")]
    Parse(#[from] tree::ParseError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] checkpoint::CheckpointError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Run halted: {0}")]
    Halted(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Classification of a per-item failure, driving the retry decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Retryable: timeouts, connection errors, 5xx responses
    Transient,

    /// Retryable after a server-signaled cool-down: HTTP 429
    RateLimited,

    /// Not retryable: other 4xx, malformed or oversized content
    Permanent,
}

/// A classified error from one processing stage (fetch, summarize, write).
///
/// Stage errors never propagate past the processing engine; they are retried
/// according to their kind and eventually recorded as a failed outcome.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct StageError {
    pub kind: ErrorKind,
    pub message: String,
}

impl StageError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Permanent,
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::RateLimited,
            message: message.into(),
        }
    }

    /// Returns true if another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::Transient | ErrorKind::RateLimited)
    }
}

/// Result type alias for Marginalia operations
pub type Result<T> = std::result::Result<T, ExportError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for a single processing stage
pub type StageResult<T> = std::result::Result<T, StageError>;

// Re-export commonly used types
pub use config::Config;
pub use engine::{ProcessingEngine, RunMode, RunOutcome};
pub use tree::{Bookmark, BookmarkEntry, BookmarkFolder, WorkItem};
