//! Per-request options for transport calls.

use serde::{Deserialize, Serialize};

use crate::config::StreamingConfig;

/// Options applied to a single transport exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestOptions {
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Temperature (0.0 - 1.0)
    pub temperature: f64,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.7,
            timeout_ms: 120_000,
        }
    }
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &StreamingConfig) -> Self {
        Self {
            max_tokens: config.response_max_tokens,
            temperature: config.temperature,
            timeout_ms: config.timeout_ms,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature.clamp(0.0, 1.0);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}
