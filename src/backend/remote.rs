//! Remote chat-completion backend.
//!
//! Sends the OpenAI-compatible subset needed for one non-streaming completion:
//! a model id, a system + user message pair and a sampling temperature.

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::backend::{BackendError, SYSTEM_PROMPT};

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Model requested from the remote API.
pub const MODEL: &str = "gpt-4";

/// Sampling temperature.
pub const TEMPERATURE: f64 = 0.7;

/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

// ─── Wire Types ────────────────────────────────────────────────────────────

/// Chat completion request (OpenAI-compatible).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat completion response (non-streaming). Unknown fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub index: usize,
    pub message: ChatMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl ChatCompletionRequest {
    /// The two-message exchange sent for `prompt`.
    pub fn for_prompt(prompt: &str) -> Self {
        Self {
            model: MODEL.to_string(),
            messages: vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)],
            temperature: TEMPERATURE,
        }
    }
}

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("response contained no choices")]
    NoChoices,
}

// ─── Backend ───────────────────────────────────────────────────────────────

/// Text generation through a hosted chat-completion API.
pub struct RemoteBackend {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl RemoteBackend {
    /// Build a backend for the default endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self, BackendError> {
        Self::with_endpoint(api_key, DEFAULT_BASE_URL)
    }

    /// Build a backend against another OpenAI-compatible base URL
    /// (`.../v1`); `/chat/completions` is appended.
    pub fn with_endpoint(
        api_key: impl Into<String>,
        base_url: &str,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BackendError::generation("failed to build HTTP client", e))?;

        let endpoint = format!("{}/chat/completions", base_url.trim_end_matches('/'));
        info!(endpoint = %endpoint, model = MODEL, "Remote backend ready");

        Ok(Self {
            client,
            endpoint,
            api_key: api_key.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one chat-completion request and return the first choice's text.
    pub async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        if prompt.trim().is_empty() {
            return Err(BackendError::Configuration(
                "prompt cannot be empty".to_string(),
            ));
        }

        let request_id = Uuid::new_v4();
        let body = ChatCompletionRequest::for_prompt(prompt);
        debug!(
            %request_id,
            messages = body.messages.len(),
            temperature = body.temperature,
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::generation("chat completion request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
            return Err(BackendError::generation(
                "remote service rejected the request",
                RemoteError::Status { status, body },
            ));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| BackendError::generation("invalid chat completion response", e))?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                BackendError::generation("invalid chat completion response", RemoteError::NoChoices)
            })?;

        info!(%request_id, chars = text.len(), "Remote generation complete");
        Ok(text)
    }
}

impl fmt::Debug for RemoteBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteBackend")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let req = ChatCompletionRequest::for_prompt("Design a URL shortener");
        assert_eq!(req.model, "gpt-4");
        assert_eq!(req.temperature, 0.7);
        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.messages[0].role, "system");
        assert_eq!(req.messages[0].content, SYSTEM_PROMPT);
        assert_eq!(req.messages[1], ChatMessage::user("Design a URL shortener"));
    }

    #[test]
    fn test_response_ignores_unknown_fields() {
        let json = r#"{
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 0,
            "model": "gpt-4",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "hi"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2}
        }"#;
        let resp: ChatCompletionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.choices[0].message.content, "hi");
    }

    #[test]
    fn test_debug_redacts_key() {
        let backend = RemoteBackend::new("sk-secret").unwrap();
        let out = format!("{backend:?}");
        assert!(!out.contains("sk-secret"));
        assert!(out.contains("api.openai.com"));
    }

    #[test]
    fn test_endpoint_appends_chat_path() {
        let backend = RemoteBackend::new("sk-abc").unwrap();
        assert_eq!(backend.endpoint(), "https://api.openai.com/v1/chat/completions");

        let backend = RemoteBackend::with_endpoint("sk-abc", "http://127.0.0.1:8080/v1/").unwrap();
        assert_eq!(backend.endpoint(), "http://127.0.0.1:8080/v1/chat/completions");
    }

    #[test]
    fn test_status_error_keeps_body() {
        let err = RemoteError::Status {
            status: reqwest::StatusCode::BAD_GATEWAY,
            body: "<unreadable body: connection reset>".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("502"));
        assert!(msg.contains("unreadable body"));
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected() {
        let backend = RemoteBackend::new("sk-abc").unwrap();
        let err = backend.generate("  ").await.unwrap_err();
        assert!(err.is_configuration());
    }
}
