//! Configuration module for Marginalia
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, and computing the resume-compatibility hash stored in checkpoints.

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, FetchConfig, LlmConfig, OutputConfig, SummarizeConfig};

// Re-export parser functions
pub use parser::{compute_resume_hash, default_config, load_config};

// Re-export validation entry points
pub use validation::{validate, validate_for_processing};
