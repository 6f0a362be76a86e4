//! Delivery strategy selection.

use serde::{Deserialize, Serialize};

/// Strategy mode requested by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyMode {
    /// Always send one message
    Single,
    /// Always deliver in parts
    Streaming,
    /// Decide from the token estimate
    #[default]
    Auto,
}

impl std::fmt::Display for StrategyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Streaming => write!(f, "streaming"),
            Self::Auto => write!(f, "auto"),
        }
    }
}

impl std::str::FromStr for StrategyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "streaming" => Ok(Self::Streaming),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown strategy mode: {}", other)),
        }
    }
}

/// Resolved delivery strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStrategy {
    Single,
    Streaming,
}

impl std::fmt::Display for DeliveryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Streaming => write!(f, "streaming"),
        }
    }
}

/// Decide how a request should be delivered.
///
/// Explicit modes are returned unchanged. `Auto` streams only when the
/// estimate is strictly above the budget.
pub fn select_strategy(
    mode: StrategyMode,
    total_estimated_tokens: usize,
    budget: usize,
) -> DeliveryStrategy {
    match mode {
        StrategyMode::Single => DeliveryStrategy::Single,
        StrategyMode::Streaming => DeliveryStrategy::Streaming,
        StrategyMode::Auto if total_estimated_tokens > budget => DeliveryStrategy::Streaming,
        StrategyMode::Auto => DeliveryStrategy::Single,
    }
}
