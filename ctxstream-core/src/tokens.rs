//! Approximate token estimation.
//!
//! This is a character-count heuristic, not a tokenizer. Estimates for
//! code-like text are inflated by a fixed margin because source code
//! tokenizes more densely than prose. The planner applies its own safety
//! margins on top of these numbers.

use regex::Regex;
use std::sync::LazyLock;

use crate::config::DEFAULT_TOKEN_ESTIMATION_RATIO;
use crate::context::ContextFile;

/// Code margin expressed as a ratio numerator over ten (1.1x).
const CODE_MARGIN_TENTHS: usize = 11;

static CODE_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"```|=>|#include|\b(?:function|def|class|import|export|const|let|var|fn|impl|struct|enum|return|public|private|static)\s",
    )
    .expect("invalid regex")
});

/// Whether text contains markers typical of source code.
pub fn looks_like_code(text: &str) -> bool {
    CODE_MARKERS.is_match(text)
}

/// Character-ratio token estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenEstimator {
    ratio: f64,
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self {
            ratio: DEFAULT_TOKEN_ESTIMATION_RATIO,
        }
    }
}

impl TokenEstimator {
    /// Create an estimator; a non-positive or non-finite ratio falls back to the default.
    pub fn new(ratio: f64) -> Self {
        if ratio.is_finite() && ratio > 0.0 {
            Self { ratio }
        } else {
            Self::default()
        }
    }

    /// Characters per token.
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Estimate the token count of `text`.
    pub fn estimate(&self, text: &str) -> usize {
        let chars = text.chars().count();
        if chars == 0 {
            return 0;
        }

        let base = (chars as f64 / self.ratio).ceil() as usize;
        if looks_like_code(text) {
            (base * CODE_MARGIN_TENTHS).div_ceil(10)
        } else {
            base
        }
    }

    /// Sum of per-file estimates.
    pub fn estimate_files(&self, files: &[ContextFile]) -> usize {
        files.iter().map(|f| self.estimate(&f.content)).sum()
    }

    /// Prompt estimate plus the per-file estimates.
    pub fn estimate_request(&self, prompt: &str, files: &[ContextFile]) -> usize {
        self.estimate(prompt) + self.estimate_files(files)
    }
}
