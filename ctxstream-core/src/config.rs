//! Configuration consumed by the planner and the delivery sequencer.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::strategy::StrategyMode;

/// Default per-request token budget.
pub const DEFAULT_MAX_TOKENS_PER_MESSAGE: usize = 100_000;
/// Default characters-per-token ratio for estimation.
pub const DEFAULT_TOKEN_ESTIMATION_RATIO: f64 = 4.0;
/// Default pause between parts in milliseconds.
pub const DEFAULT_INTER_PART_DELAY_MS: u64 = 1_000;

/// Configuration for context delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Hard per-request token budget enforced by the endpoint
    pub max_tokens_per_message: usize,
    /// Characters per token used by the estimator
    pub token_estimation_ratio: f64,
    /// Whether part 1 carries a summary of the whole context
    pub include_context_summary: bool,
    /// Delivery strategy selection
    pub strategy_mode: StrategyMode,
    /// Pause between acknowledged parts in milliseconds
    pub inter_part_delay_ms: u64,
    /// Maximum tokens the endpoint may generate per reply
    pub response_max_tokens: u32,
    /// Sampling temperature (0.0 - 1.0)
    pub temperature: f64,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_message: DEFAULT_MAX_TOKENS_PER_MESSAGE,
            token_estimation_ratio: DEFAULT_TOKEN_ESTIMATION_RATIO,
            include_context_summary: true,
            strategy_mode: StrategyMode::Auto,
            inter_part_delay_ms: DEFAULT_INTER_PART_DELAY_MS,
            response_max_tokens: 4096,
            temperature: 0.7,
            timeout_ms: 120_000,
        }
    }
}

impl StreamingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Create configuration from `CTXSTREAM_*` environment variables.
    ///
    /// Unset or unparsable variables fall back to the defaults.
    pub fn from_env() -> Self {
        fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
            std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
        }

        let defaults = Self::default();
        Self {
            max_tokens_per_message: parsed("CTXSTREAM_MAX_TOKENS")
                .unwrap_or(defaults.max_tokens_per_message),
            token_estimation_ratio: parsed("CTXSTREAM_TOKEN_RATIO")
                .unwrap_or(defaults.token_estimation_ratio),
            include_context_summary: std::env::var("CTXSTREAM_CONTEXT_SUMMARY")
                .map(|s| s != "0" && s.to_lowercase() != "false")
                .unwrap_or(defaults.include_context_summary),
            strategy_mode: parsed("CTXSTREAM_STRATEGY").unwrap_or(defaults.strategy_mode),
            inter_part_delay_ms: parsed("CTXSTREAM_PART_DELAY_MS")
                .unwrap_or(defaults.inter_part_delay_ms),
            response_max_tokens: parsed("CTXSTREAM_RESPONSE_MAX_TOKENS")
                .unwrap_or(defaults.response_max_tokens),
            temperature: parsed("CTXSTREAM_TEMPERATURE").unwrap_or(defaults.temperature),
            timeout_ms: parsed("CTXSTREAM_TIMEOUT_MS").unwrap_or(defaults.timeout_ms),
        }
    }

    pub fn with_max_tokens_per_message(mut self, budget: usize) -> Self {
        self.max_tokens_per_message = budget;
        self
    }

    pub fn with_token_estimation_ratio(mut self, ratio: f64) -> Self {
        self.token_estimation_ratio = ratio;
        self
    }

    pub fn with_context_summary(mut self, include: bool) -> Self {
        self.include_context_summary = include;
        self
    }

    pub fn with_strategy_mode(mut self, mode: StrategyMode) -> Self {
        self.strategy_mode = mode;
        self
    }

    pub fn with_inter_part_delay_ms(mut self, delay_ms: u64) -> Self {
        self.inter_part_delay_ms = delay_ms;
        self
    }

    pub fn with_response_max_tokens(mut self, max_tokens: u32) -> Self {
        self.response_max_tokens = max_tokens;
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

    /// Check that the values can drive a delivery.
    pub fn validate(&self) -> Result<()> {
        if self.max_tokens_per_message == 0 {
            return Err(Error::Config(
                "max_tokens_per_message must be greater than zero".to_string(),
            ));
        }
        if !self.token_estimation_ratio.is_finite() || self.token_estimation_ratio <= 0.0 {
            return Err(Error::Config(format!(
                "token_estimation_ratio must be a positive number, got {}",
                self.token_estimation_ratio
            )));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(Error::Config(format!(
                "temperature must be within 0.0..=1.0, got {}",
                self.temperature
            )));
        }
        Ok(())
    }
}
