//! HTTP client for `OpenAI`-compatible chat completion APIs.
//!
//! Sends requests to `{base_url}/chat/completions` with a bearer token.
//! Streaming responses are read as server-sent events and the deltas are
//! concatenated; blocking responses take `choices[0].message.content`.
//! Both go through the same [`RetryPolicy`].

use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use simarena_core::completion::{ChatMessage, CompletionClient, CompletionError};
use simarena_core::config::LlmSettings;
use tracing::debug;

use crate::retry::RetryPolicy;
use crate::sse::{SseBuffer, SseEvent};

const STREAMING_OPERATION: &str = "streaming chat completion";
const BLOCKING_OPERATION: &str = "chat completion";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ResponseChoice>,
}

#[derive(Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an `OpenAI`-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    retry: RetryPolicy,
}

impl OpenAiClient {
    /// Build a client from settings.
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` error if the HTTP client cannot be constructed
    /// (for example when no TLS backend is available).
    pub fn new(settings: &LlmSettings) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", settings.base_url.trim_end_matches('/')),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            retry: RetryPolicy::with_backoff(Duration::from_millis(settings.retry_backoff_ms)),
        })
    }

    /// Replace the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The full URL requests are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Stream a completion, calling `on_delta` for every text fragment.
    ///
    /// Returns the concatenated text. On a retry, fragments from the failed
    /// attempt have already been delivered; the returned text only contains
    /// the successful attempt.
    pub async fn stream_with<F>(
        &self,
        messages: &[ChatMessage],
        token_budget: u32,
        on_delta: F,
    ) -> Result<String, CompletionError>
    where
        F: Fn(&str) + Send + Sync,
    {
        let on_delta = &on_delta;
        self.retry
            .run(STREAMING_OPERATION, move |attempt| {
                self.stream_once(messages, token_budget, attempt, on_delta)
            })
            .await
    }

    /// Request a completion in a single response.
    pub async fn complete(&self, messages: &[ChatMessage], token_budget: u32) -> Result<String, CompletionError> {
        self.retry
            .run(BLOCKING_OPERATION, move |attempt| {
                self.complete_once(messages, token_budget, attempt)
            })
            .await
    }

    async fn send(
        &self,
        messages: &[ChatMessage],
        token_budget: u32,
        stream: bool,
    ) -> Result<reqwest::Response, CompletionError> {
        let body = ChatRequest {
            model: &self.model,
            messages,
            stream,
            max_tokens: (token_budget > 0).then_some(token_budget),
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn complete_once(
        &self,
        messages: &[ChatMessage],
        token_budget: u32,
        attempt: u32,
    ) -> Result<String, CompletionError> {
        debug!(attempt, model = %self.model, token_budget, "Sending chat completion");
        let response = self.send(messages, token_budget, false).await?;
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Malformed(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or(CompletionError::EmptyChoices)
    }

    async fn stream_once<F>(
        &self,
        messages: &[ChatMessage],
        token_budget: u32,
        attempt: u32,
        on_delta: &F,
    ) -> Result<String, CompletionError>
    where
        F: Fn(&str) + Send + Sync,
    {
        debug!(attempt, model = %self.model, token_budget, "Streaming chat completion");
        let response = self.send(messages, token_budget, true).await?;

        let mut body = response.bytes_stream();
        let mut sse = SseBuffer::new();
        let mut text = String::new();
        let mut saw_choice = false;

        'read: while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| CompletionError::Transport(e.to_string()))?;
            for event in sse.push(&chunk) {
                let data = match event {
                    SseEvent::Done => break 'read,
                    SseEvent::Data(data) => data,
                };
                let Ok(parsed) = serde_json::from_str::<StreamChunk>(&data) else {
                    debug!(data = %data, "Skipping undecodable stream chunk");
                    continue;
                };
                if let Some(choice) = parsed.choices.into_iter().next() {
                    saw_choice = true;
                    if let Some(delta) = choice.delta.content.filter(|d| !d.is_empty()) {
                        on_delta(&delta);
                        text.push_str(&delta);
                    }
                }
            }
        }

        if saw_choice {
            Ok(text)
        } else {
            Err(CompletionError::EmptyChoices)
        }
    }
}

impl CompletionClient for OpenAiClient {
    async fn complete_streaming(
        &self,
        messages: &[ChatMessage],
        token_budget: u32,
    ) -> Result<String, CompletionError> {
        self.stream_with(messages, token_budget, |_| {}).await
    }

    async fn complete_blocking(
        &self,
        messages: &[ChatMessage],
        token_budget: u32,
    ) -> Result<String, CompletionError> {
        self.complete(messages, token_budget).await
    }
}
