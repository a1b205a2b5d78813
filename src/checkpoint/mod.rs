//! Checkpoint persistence for resumable runs
//!
//! A checkpoint is a single JSON file recording which URLs succeeded, which
//! failed terminally, where in the bookmark tree the run stopped, and
//! aggregate statistics. [`CheckpointStore`] owns the live record and writes
//! it atomically; [`CheckpointRecord`] and friends define the file format.

pub mod record;
pub mod store;

pub use record::{
    CheckpointRecord, CurrentPosition, FailedUrl, ProcessedUrl, Statistics, CHECKPOINT_VERSION,
};
pub use store::{CheckpointError, CheckpointStore};
