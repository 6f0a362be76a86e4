//! Transport trait and the HTTP completion client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::context::{Message, Role};
use crate::error::{Error, Result};

use super::types::RequestOptions;

/// One request/response exchange with a completion endpoint.
///
/// Implementations hold no conversation state: every call carries the whole
/// history the endpoint should see.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `messages` and return the reply text.
    async fn send_messages(&self, messages: &[Message], options: &RequestOptions)
        -> Result<String>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send_messages(
        &self,
        messages: &[Message],
        options: &RequestOptions,
    ) -> Result<String> {
        (**self).send_messages(messages, options).await
    }
}

/// Configuration for the HTTP client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API key
    pub api_key: String,
    /// Base URL override
    pub base_url: Option<String>,
    /// Model identifier
    pub model: String,
    /// Connection-level timeout in seconds
    pub timeout_secs: u64,
}

impl ClientConfig {
    pub const DEFAULT_MODEL: &'static str = "claude-3-5-sonnet-20241022";

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            model: Self::DEFAULT_MODEL.to_string(),
            timeout_secs: 300,
        }
    }

    /// Create configuration from `ANTHROPIC_API_KEY`, `ANTHROPIC_BASE_URL`
    /// and `CTXSTREAM_MODEL`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| Error::Config("ANTHROPIC_API_KEY is not set".to_string()))?;
        let mut config = Self::new(api_key);
        config.base_url = std::env::var("ANTHROPIC_BASE_URL").ok();
        if let Ok(model) = std::env::var("CTXSTREAM_MODEL") {
            config.model = model;
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

fn build_http_client(timeout_secs: u64) -> Result<Client> {
    let timeout = Duration::from_secs(timeout_secs);

    // Proxy auto-detection can fail in sandboxed environments; retry without it.
    match Client::builder().timeout(timeout).build() {
        Ok(client) => Ok(client),
        Err(_) => Client::builder()
            .no_proxy()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e))),
    }
}

/// Anthropic Messages API transport.
pub struct AnthropicTransport {
    config: ClientConfig,
    http: Client,
}

impl AnthropicTransport {
    const DEFAULT_BASE_URL: &'static str = "https://api.anthropic.com";
    const API_VERSION: &'static str = "2023-06-01";

    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::Config("API key is empty".to_string()));
        }
        let http = build_http_client(config.timeout_secs)?;
        Ok(Self { config, http })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or(Self::DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }
}

// Anthropic API types
#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: String,
}

/// Map a non-success status and its body to an [`Error`].
pub fn classify_http_error(status: u16, body: &str, retry_after_secs: Option<u64>) -> Error {
    let (error_type, message) = match serde_json::from_str::<AnthropicError>(body) {
        Ok(parsed) => (Some(parsed.error.error_type), parsed.error.message),
        Err(_) if body.trim().is_empty() => (None, format!("status {}", status)),
        Err(_) => (None, body.trim().to_string()),
    };

    match (status, error_type.as_deref()) {
        (401 | 403, _) | (_, Some("authentication_error" | "permission_error")) => {
            Error::auth(message)
        }
        (429, _) | (_, Some("rate_limit_error")) => Error::rate_limited(message, retry_after_secs),
        (400 | 413, _) | (_, Some("invalid_request_error" | "request_too_large")) => {
            Error::bad_request(message)
        }
        _ => Error::http(status, message),
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

#[async_trait]
impl Transport for AnthropicTransport {
    async fn send_messages(
        &self,
        messages: &[Message],
        options: &RequestOptions,
    ) -> Result<String> {
        let api_request = AnthropicRequest {
            model: &self.config.model,
            messages: messages
                .iter()
                .map(|m| AnthropicMessage {
                    role: role_name(m.role),
                    content: &m.content,
                })
                .collect(),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        };

        let url = format!("{}/v1/messages", self.base_url());
        debug!(messages = messages.len(), %url, "Sending completion request");

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", Self::API_VERSION)
            .header("content-type", "application/json")
            .timeout(Duration::from_millis(options.timeout_ms))
            .json(&api_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::timeout(options.timeout_ms)
                } else {
                    Error::Network(e.to_string())
                }
            })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                Error::timeout(options.timeout_ms)
            } else {
                Error::Network(format!("Failed to read response: {}", e))
            }
        })?;

        if !status.is_success() {
            return Err(classify_http_error(status.as_u16(), &body, retry_after));
        }

        let api_response: AnthropicResponse = serde_json::from_str(&body)
            .map_err(|e| Error::MalformedResponse(format!("{}: {}", e, truncate(&body, 200))))?;

        Ok(api_response
            .content
            .into_iter()
            .filter_map(|c| c.text)
            .collect::<Vec<_>>()
            .join(""))
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
