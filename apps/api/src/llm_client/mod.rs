//! LLM Client: the single point of entry for Claude API calls.
//!
//! Only the fit scorer talks to the model, and only through this module. The API key is
//! owned by `LlmClient` and is never logged.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const MODEL: &str = "claude-sonnet-4-5";
/// Fit verdicts are a score plus a couple of sentences.
const MAX_TOKENS: u32 = 512;
const MIN_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM request timed out after {0:?}")]
    Timeout(Duration),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<LlmError> },

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// How often a throttled or failing call is retried, and how long to wait in between.
#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    max_attempts: u32,
    /// Doubled after every failed attempt.
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Splits an overall budget into a per-attempt timeout, leaving room for the backoff
    /// sleeps. Falls back to a single attempt given the whole budget when the split
    /// wouldn't leave each attempt at least `MIN_ATTEMPT_TIMEOUT`.
    fn fit_to_budget(self, budget: Duration) -> (Self, Duration) {
        let attempts = self.max_attempts.max(1);
        let backoff: Duration = (0..attempts).map(|a| self.delay_before(a)).sum();
        let per_attempt = budget.saturating_sub(backoff) / attempts;
        if attempts > 1 && per_attempt >= MIN_ATTEMPT_TIMEOUT {
            (self, per_attempt)
        } else {
            (
                Self {
                    max_attempts: 1,
                    ..self
                },
                budget,
            )
        }
    }

    /// Wait before attempt `attempt` (zero-based). The first attempt never waits.
    fn delay_before(&self, attempt: u32) -> Duration {
        match attempt {
            0 => Duration::ZERO,
            n => self.base_delay * 2u32.saturating_pow(n - 1),
        }
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [UserTurn<'a>; 1],
}

#[derive(Serialize)]
struct UserTurn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
            .filter(|t| !t.trim().is_empty())
    }
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Outcome of a single HTTP attempt.
enum Attempt {
    Done(LlmResponse),
    Retry(LlmError),
    Fail(LlmError),
}

#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("model", &MODEL)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl LlmClient {
    /// `budget` bounds one whole `complete` call, retries and backoff included. Each
    /// attempt gets its share of it.
    pub fn new(api_key: String, budget: Duration) -> Result<Self, LlmError> {
        Self::build(ANTHROPIC_API_URL.to_string(), api_key, budget, RetryPolicy::default())
    }

    fn build(
        endpoint: String,
        api_key: String,
        budget: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, LlmError> {
        let (retry, timeout) = retry.fit_to_budget(budget);
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            endpoint,
            api_key,
            timeout,
            retry,
        })
    }

    /// One user turn against the Messages API. 429s, 5xx responses and transport
    /// failures are retried per the client's `RetryPolicy`; other API errors are not.
    pub async fn complete(&self, prompt: &str, system: &str) -> Result<LlmResponse, LlmError> {
        let body = MessagesRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system,
            messages: [UserTurn {
                role: "user",
                content: prompt,
            }],
        };

        let attempts = self.retry.max_attempts.max(1);
        let mut last = None;
        for attempt in 0..attempts {
            let delay = self.retry.delay_before(attempt);
            if !delay.is_zero() {
                warn!(
                    "Retrying fit-scoring call in {}ms (attempt {})",
                    delay.as_millis(),
                    attempt + 1
                );
                tokio::time::sleep(delay).await;
            }

            match self.attempt(&body).await {
                Attempt::Done(response) => {
                    debug!(
                        "LLM call succeeded: input_tokens={}, output_tokens={}",
                        response.usage.input_tokens, response.usage.output_tokens
                    );
                    return Ok(response);
                }
                Attempt::Fail(e) => return Err(e),
                Attempt::Retry(e) => {
                    warn!("LLM attempt {} failed: {e}", attempt + 1);
                    last = Some(e);
                }
            }
        }

        Err(match last {
            // a lone timeout reads better than "gave up after 1 attempt"
            Some(e @ LlmError::Timeout(_)) if attempts == 1 => e,
            Some(e) => LlmError::Exhausted {
                attempts,
                last: Box::new(e),
            },
            None => LlmError::EmptyContent,
        })
    }

    async fn attempt(&self, body: &MessagesRequest<'_>) -> Attempt {
        let sent = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
            .send()
            .await;

        let response = match sent {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return Attempt::Retry(LlmError::Timeout(self.timeout)),
            Err(e) => return Attempt::Retry(LlmError::Http(e)),
        };

        let status = response.status();
        let raw = match response.text().await {
            Ok(raw) => raw,
            Err(e) if e.is_timeout() => return Attempt::Retry(LlmError::Timeout(self.timeout)),
            Err(e) => return Attempt::Retry(LlmError::Http(e)),
        };

        if status.is_success() {
            // a 2xx body that isn't a Messages response is a malformed reply, not transport
            return match serde_json::from_str::<LlmResponse>(&raw) {
                Ok(parsed) => Attempt::Done(parsed),
                Err(e) => Attempt::Fail(LlmError::Parse(e)),
            };
        }

        let error = LlmError::Api {
            status: status.as_u16(),
            message: api_error_message(raw),
        };
        if is_retryable(status) {
            Attempt::Retry(error)
        } else {
            Attempt::Fail(error)
        }
    }

    /// Calls the model and deserializes its text reply as `T`.
    /// The prompt must instruct the model to return JSON only.
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        prompt: &str,
        system: &str,
    ) -> Result<T, LlmError> {
        let response = self.complete(prompt, system).await?;
        let text = response.text().ok_or(LlmError::EmptyContent)?;
        Ok(serde_json::from_str(strip_json_fences(text))?)
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Pulls `error.message` out of an Anthropic error body, falling back to the raw text.
fn api_error_message(raw: String) -> String {
    serde_json::from_str::<ApiErrorEnvelope>(&raw)
        .map(|envelope| envelope.error.message)
        .unwrap_or(raw)
}

/// Models sometimes wrap JSON in a ```json fence despite being told not to.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(inner) = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
    else {
        return text;
    };
    let inner = inner.trim();
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
