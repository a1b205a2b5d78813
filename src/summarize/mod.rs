//! LLM summarization
//!
//! This module handles the summarize stage of the pipeline:
//! - Loading the prompt template and filling in page title and content
//! - Calling an OpenAI-compatible chat completions endpoint
//! - Classifying API failures for the retry layer

use crate::config::LlmConfig;
use crate::{StageError, StageResult};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// The LLM itself can be slow on long pages; this is generous on purpose
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Produces a summary for fetched page content
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarizes `content` for the bookmark titled `title`
    async fn summarize(&self, title: &str, content: &str) -> StageResult<String>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// [`Summarizer`] backed by an OpenAI-compatible API
pub struct LlmSummarizer {
    client: Client,
    config: LlmConfig,
    prompt_template: String,
}

impl LlmSummarizer {
    /// Builds the summarizer, loading the prompt template from `prompt_file`
    ///
    /// The template uses `{title}` and `{content}` placeholders.
    pub fn new(config: LlmConfig, prompt_file: &Path) -> crate::Result<Self> {
        let prompt_template = std::fs::read_to_string(prompt_file)?;
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            config,
            prompt_template,
        })
    }

    /// Fills the prompt template, trimming content to the model's budget
    ///
    /// Content is capped at roughly three characters per output token before
    /// substitution so pathological pages cannot blow up the request.
    fn prepare_prompt(&self, title: &str, content: &str) -> String {
        let max_chars = self.config.max_tokens as usize * 3;
        let trimmed = if content.len() > max_chars {
            let mut end = max_chars;
            while end > 0 && !content.is_char_boundary(end) {
                end -= 1;
            }
            &content[..end]
        } else {
            content
        };

        self.prompt_template
            .replace("{title}", title)
            .replace("{content}", trimmed)
    }

    fn classify_status(status: StatusCode, body: &str) -> StageError {
        let message = format!("LLM API returned {status}: {body}");
        if status == StatusCode::TOO_MANY_REQUESTS {
            StageError::rate_limited(message)
        } else if status.is_client_error() {
            StageError::permanent(message)
        } else {
            StageError::transient(message)
        }
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, title: &str, content: &str) -> StageResult<String> {
        let prompt = self.prepare_prompt(title, content);

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt,
            }],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    StageError::transient("LLM request timeout")
                } else {
                    StageError::transient(format!("LLM request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| StageError::transient(format!("Invalid LLM response: {e}")))?;

        let summary = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        // An empty completion will not improve on retry
        if summary.trim().is_empty() {
            return Err(StageError::permanent("LLM returned an empty summary"));
        }

        tracing::debug!("Summarized '{}' ({} chars)", title, summary.len());
        Ok(summary.trim().to_string())
    }
}
