use serde::Deserialize;

/// Main configuration structure for Marginalia
///
/// Every field carries a serde default so a partial TOML file (or none at
/// all) still produces a usable configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub summarize: SummarizeConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// LLM API configuration (OpenAI-compatible endpoints)
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// API key; falls back to the LLM_API_KEY environment variable
    #[serde(rename = "api-key", default)]
    pub api_key: String,

    /// Base URL of the chat-completions endpoint
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum completion tokens per summary
    #[serde(rename = "max-tokens", default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum summarize requests per rolling minute (0 disables limiting)
    #[serde(rename = "rate-limit", default = "default_llm_rate_limit")]
    pub rate_limit: u32,
}

/// Content fetching configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Total request timeout in seconds
    #[serde(rename = "timeout-secs", default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    /// Maximum concurrent page fetches
    #[serde(rename = "max-concurrent", default = "default_fetch_concurrent")]
    pub max_concurrent: u32,

    /// Maximum accepted response body size in megabytes
    #[serde(rename = "max-size-mb", default = "default_max_size_mb")]
    pub max_size_mb: u32,

    /// Retries after the initial attempt for transient failures
    #[serde(rename = "retry-attempts", default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Base delay before the first retry, in milliseconds
    #[serde(rename = "retry-delay-ms", default = "default_fetch_retry_delay")]
    pub retry_delay_ms: u64,

    /// Maximum fetch requests per rolling minute (0 disables limiting)
    #[serde(rename = "rate-limit", default)]
    pub rate_limit: u32,

    /// Maximum redirects to follow
    #[serde(rename = "max-redirects", default = "default_max_redirects")]
    pub max_redirects: u32,
}

/// Summarization stage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SummarizeConfig {
    /// Maximum concurrent summarize calls
    #[serde(rename = "max-concurrent", default = "default_summarize_concurrent")]
    pub max_concurrent: u32,

    /// Retries after the initial attempt for transient failures
    #[serde(rename = "retry-attempts", default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Base delay before the first retry, in milliseconds
    #[serde(rename = "retry-delay-ms", default = "default_summarize_retry_delay")]
    pub retry_delay_ms: u64,

    /// Cool-down after an HTTP 429, distinct from ordinary backoff
    #[serde(
        rename = "rate-limit-cooldown-secs",
        default = "default_rate_limit_cooldown"
    )]
    pub rate_limit_cooldown_secs: u64,

    /// Bound on fetched-but-not-yet-summarized items held in memory
    #[serde(rename = "pipeline-buffer", default = "default_pipeline_buffer")]
    pub pipeline_buffer: u32,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory the markdown hierarchy is written to
    #[serde(default = "default_output_dir")]
    pub dir: String,

    /// Whether to prepend YAML frontmatter to each markdown file
    #[serde(rename = "include-metadata", default = "default_true")]
    pub include_metadata: bool,

    /// Whether to generate a Mermaid structure diagram
    #[serde(rename = "generate-diagram", default = "default_true")]
    pub generate_diagram: bool,

    /// Path to the prompt template ({title}/{content} placeholders)
    #[serde(rename = "prompt-file", default = "default_prompt_file")]
    pub prompt_file: String,

    /// Flush the checkpoint every N completed items
    #[serde(rename = "save-interval", default = "default_save_interval")]
    pub save_interval: u32,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.7
}

fn default_llm_rate_limit() -> u32 {
    3
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_fetch_concurrent() -> u32 {
    10
}

fn default_max_size_mb() -> u32 {
    5
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_fetch_retry_delay() -> u64 {
    1500
}

fn default_max_redirects() -> u32 {
    5
}

fn default_summarize_concurrent() -> u32 {
    2
}

fn default_summarize_retry_delay() -> u64 {
    2000
}

fn default_rate_limit_cooldown() -> u64 {
    20
}

fn default_pipeline_buffer() -> u32 {
    16
}

fn default_output_dir() -> String {
    "./bookmarks_export".to_string()
}

fn default_true() -> bool {
    true
}

fn default_prompt_file() -> String {
    "./prompts/summarize.txt".to_string()
}

fn default_save_interval() -> u32 {
    10
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            rate_limit: default_llm_rate_limit(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            max_concurrent: default_fetch_concurrent(),
            max_size_mb: default_max_size_mb(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_fetch_retry_delay(),
            rate_limit: 0,
            max_redirects: default_max_redirects(),
        }
    }
}

impl Default for SummarizeConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_summarize_concurrent(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_summarize_retry_delay(),
            rate_limit_cooldown_secs: default_rate_limit_cooldown(),
            pipeline_buffer: default_pipeline_buffer(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            include_metadata: true,
            generate_diagram: true,
            prompt_file: default_prompt_file(),
            save_interval: default_save_interval(),
        }
    }
}
