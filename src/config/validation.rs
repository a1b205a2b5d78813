use crate::config::types::{Config, FetchConfig, LlmConfig, OutputConfig, SummarizeConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_llm_config(&config.llm)?;
    validate_fetch_config(&config.fetch)?;
    validate_summarize_config(&config.summarize)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates LLM API configuration
fn validate_llm_config(config: &LlmConfig) -> Result<(), ConfigError> {
    if Url::parse(&config.base_url).is_err() {
        return Err(ConfigError::Validation(format!(
            "llm.base-url is not a valid URL: '{}'",
            config.base_url
        )));
    }

    if config.model.is_empty() {
        return Err(ConfigError::Validation(
            "llm.model cannot be empty".to_string(),
        ));
    }

    if config.max_tokens < 1 {
        return Err(ConfigError::Validation(format!(
            "llm.max-tokens must be >= 1, got {}",
            config.max_tokens
        )));
    }

    if !(0.0..=2.0).contains(&config.temperature) {
        return Err(ConfigError::Validation(format!(
            "llm.temperature must be between 0.0 and 2.0, got {}",
            config.temperature
        )));
    }

    Ok(())
}

/// Validates fetch configuration
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "fetch.timeout-secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    if config.max_concurrent < 1 || config.max_concurrent > 100 {
        return Err(ConfigError::Validation(format!(
            "fetch.max-concurrent must be between 1 and 100, got {}",
            config.max_concurrent
        )));
    }

    if config.max_size_mb < 1 {
        return Err(ConfigError::Validation(format!(
            "fetch.max-size-mb must be >= 1, got {}",
            config.max_size_mb
        )));
    }

    Ok(())
}

/// Validates summarize stage configuration
fn validate_summarize_config(config: &SummarizeConfig) -> Result<(), ConfigError> {
    if config.max_concurrent < 1 || config.max_concurrent > 100 {
        return Err(ConfigError::Validation(format!(
            "summarize.max-concurrent must be between 1 and 100, got {}",
            config.max_concurrent
        )));
    }

    if config.pipeline_buffer < 1 {
        return Err(ConfigError::Validation(format!(
            "summarize.pipeline-buffer must be >= 1, got {}",
            config.pipeline_buffer
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.dir.is_empty() {
        return Err(ConfigError::Validation(
            "output.dir cannot be empty".to_string(),
        ));
    }

    if config.save_interval < 1 {
        return Err(ConfigError::Validation(format!(
            "output.save-interval must be >= 1, got {}",
            config.save_interval
        )));
    }

    Ok(())
}

/// Checks that the parts needed for live processing are present
///
/// A dry run never talks to the LLM API, so the key requirement is deferred
/// to run time rather than enforced in [`validate`].
pub fn validate_for_processing(config: &Config) -> Result<(), ConfigError> {
    if config.llm.api_key.is_empty() {
        return Err(ConfigError::Validation(
            "llm.api-key is not set (config file or LLM_API_KEY environment variable)".to_string(),
        ));
    }

    if !std::path::Path::new(&config.output.prompt_file).exists() {
        return Err(ConfigError::Validation(format!(
            "prompt file not found: {}",
            config.output.prompt_file
        )));
    }

    Ok(())
}
