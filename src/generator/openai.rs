//! OpenAI-compatible chat completion generator (`/v1/chat/completions`).
//!
//! All wire types are private to this module. One `generate` call is one
//! round-trip, plus optional bounded retries for transport failures and
//! 5xx responses.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::{GenerationRequest, Generator, GeneratorError};

/// Settings for [`OpenAiCompatible`].
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full endpoint URL, e.g. `https://api.openai.com/v1/chat/completions`.
    pub api_base_url: String,
    pub model: String,
    pub system_prompt: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    /// Sent as `Authorization: Bearer <key>` when present.
    pub api_key: Option<String>,
}

/// Adapter for any HTTP endpoint implementing `/v1/chat/completions`.
///
/// Cheap to clone: `reqwest::Client` is an `Arc` internally.
#[derive(Debug, Clone)]
pub struct OpenAiCompatible {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiCompatible {
    pub fn new(config: OpenAiConfig) -> Result<Self, GeneratorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| GeneratorError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    async fn complete_once(&self, payload: &ChatCompletionRequest<'_>) -> Result<String, GeneratorError> {
        let mut req = self.client.post(&self.config.api_base_url).json(payload);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(transport_error)?;
        let response = check_status(response).await?;

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| GeneratorError::Malformed(format!("unreadable response body: {e}")))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| GeneratorError::Malformed("response has no content".into()))
    }
}

#[async_trait]
impl Generator for OpenAiCompatible {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GeneratorError> {
        let payload = ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![
                Message { role: "system", content: &self.config.system_prompt },
                Message { role: "user", content: &request.prompt },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        debug!(
            model = %self.config.model,
            temperature = request.temperature,
            max_tokens = request.max_tokens,
            prompt_len = request.prompt.len(),
            "sending generation request"
        );

        let mut attempt = 0;
        loop {
            match self.complete_once(&payload).await {
                Ok(content) => {
                    trace!(content_len = content.len(), "generation succeeded");
                    return Ok(content);
                }
                Err(err) if attempt < self.config.max_retries && is_transient(&err) => {
                    attempt += 1;
                    warn!(error = %err, attempt, "transient generator failure, retrying");
                    tokio::time::sleep(Duration::from_millis(250 * u64::from(attempt))).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn is_transient(err: &GeneratorError) -> bool {
    match err {
        GeneratorError::Timeout | GeneratorError::Transport(_) => true,
        GeneratorError::Status { status, .. } => *status >= 500,
        GeneratorError::Unconfigured | GeneratorError::Malformed(_) => false,
    }
}

fn transport_error(e: reqwest::Error) -> GeneratorError {
    if e.is_timeout() {
        GeneratorError::Timeout
    } else {
        GeneratorError::Transport(e.to_string())
    }
}

/// Pass a successful response through, or turn it into a structured error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GeneratorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());

    let message = match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(env) => env.error.message,
        Err(_) => body,
    };
    Err(GeneratorError::Status { status: status.as_u16(), message })
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// Error envelope used by OpenAI and compatible APIs.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}
