use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let mut config: Config = toml::from_str(&content)?;

    // The API key may come from the environment instead of the file
    if config.llm.api_key.is_empty() {
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            config.llm.api_key = key;
        }
    }

    validate(&config)?;

    Ok(config)
}

/// Builds a configuration entirely from defaults and the environment
///
/// Used when no config file is given on the command line.
pub fn default_config() -> Result<Config, ConfigError> {
    let mut config = Config::default();
    if let Ok(key) = std::env::var("LLM_API_KEY") {
        config.llm.api_key = key;
    }
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash over the resume-relevant configuration subset
///
/// Two runs with the same hash produce semantically compatible output, so a
/// checkpoint written under one may be resumed under the other. The subset
/// deliberately excludes operational knobs (concurrency, retry counts) that
/// do not change what gets written.
///
/// # Arguments
///
/// * `config` - The active configuration
///
/// # Returns
///
/// Hex-encoded SHA-256 hash
pub fn compute_resume_hash(config: &Config) -> String {
    // serde_json::Value keeps map keys sorted, so serialization is canonical
    let subset = serde_json::json!({
        "llm_model": config.llm.model,
        "llm_max_tokens": config.llm.max_tokens,
        "llm_temperature": config.llm.temperature,
        "llm_rate_limit": config.llm.rate_limit,
        "fetch_timeout_secs": config.fetch.timeout_secs,
        "fetch_rate_limit": config.fetch.rate_limit,
        "output_dir": config.output.dir,
        "include_metadata": config.output.include_metadata,
        "generate_diagram": config.output.generate_diagram,
        "prompt_file": config.output.prompt_file,
    });

    let mut hasher = Sha256::new();
    hasher.update(subset.to_string().as_bytes());
    hex::encode(hasher.finalize())
}
