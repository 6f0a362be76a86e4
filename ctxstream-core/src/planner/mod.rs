//! Chunk planning: partition an ordered file list into token-bounded parts.
//!
//! The planner works against an *effective* budget of 70% of the endpoint
//! budget, leaving room for estimation error and for the instructions and
//! summary added to part 1. Files that fit are packed whole into parts in
//! order. A file that alone exceeds the effective budget is split on line
//! boundaries into chunks of at most 80% of the effective budget, each
//! delivered as its own part.
//!
//! # Invariants
//!
//! - File order is preserved across and within parts.
//! - The partial chunks of one file cover lines `1..=total_lines` exactly once,
//!   in order, and their contents concatenate to the original file.
//! - A single line is never divided, so a line larger than the split
//!   threshold produces one oversized chunk.

mod proptest;

use tracing::{debug, warn};

use crate::config::StreamingConfig;
use crate::context::{ContextFile, FileChunk, Part};
use crate::tokens::TokenEstimator;

/// Share of the endpoint budget the planner fills, in percent.
pub const SAFETY_MARGIN_PERCENT: usize = 70;
/// Share of the effective budget a line-split chunk may fill, in percent.
pub const LINE_SPLIT_PERCENT: usize = 80;

/// Partitions context files into parts under a token budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkPlanner {
    estimator: TokenEstimator,
    budget: usize,
}

impl ChunkPlanner {
    pub fn new(estimator: TokenEstimator, budget: usize) -> Self {
        Self { estimator, budget }
    }

    pub fn from_config(config: &StreamingConfig) -> Self {
        Self::new(
            TokenEstimator::new(config.token_estimation_ratio),
            config.max_tokens_per_message,
        )
    }

    pub fn estimator(&self) -> &TokenEstimator {
        &self.estimator
    }

    /// Endpoint budget in tokens.
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Budget the planner actually fills.
    pub fn effective_budget(&self) -> usize {
        self.budget.saturating_mul(SAFETY_MARGIN_PERCENT) / 100
    }

    /// Ceiling for a line-split chunk.
    pub fn line_split_threshold(&self) -> usize {
        self.effective_budget().saturating_mul(LINE_SPLIT_PERCENT) / 100
    }

    /// Plan a delivery, or `None` when one message suffices.
    ///
    /// An empty file list always yields `None`, even when the prompt alone is
    /// over budget: there is nothing to split, so the caller sends one message.
    pub fn plan(&self, files: &[ContextFile], prompt_tokens: usize) -> Option<Vec<Part>> {
        if files.is_empty() {
            return None;
        }

        let total = prompt_tokens + self.estimator.estimate_files(files);
        let effective = self.effective_budget();
        if total <= effective {
            debug!(total, effective, "Context fits in a single message");
            return None;
        }

        Some(self.partition(files))
    }

    /// Partition `files` unconditionally. Empty input yields no parts.
    pub fn partition(&self, files: &[ContextFile]) -> Vec<Part> {
        let effective = self.effective_budget();
        let mut parts = Vec::new();
        let mut current = Part::new();

        for file in files {
            let file_tokens = self.estimator.estimate(&file.content);

            if file_tokens > effective {
                // Split parts must follow whatever was accumulated before them.
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
                self.split_by_lines(file, &mut parts);
                continue;
            }

            if !current.is_empty() && current.estimated_tokens + file_tokens > effective {
                parts.push(std::mem::take(&mut current));
            }
            current.push(FileChunk::whole(&file.path, &file.content, file_tokens));
        }

        if !current.is_empty() {
            parts.push(current);
        }

        debug!(
            parts = parts.len(),
            files = files.len(),
            effective,
            "Partitioned context"
        );
        parts
    }

    fn split_by_lines(&self, file: &ContextFile, parts: &mut Vec<Part>) {
        let threshold = self.line_split_threshold();
        let total_lines = file.line_count();

        let mut buffer = String::new();
        let mut buffer_tokens = 0usize;
        let mut start_line = 1usize;
        let mut line_no = 0usize;
        let first_part = parts.len();

        for line in file.content.split_inclusive('\n') {
            line_no += 1;
            let line_tokens = self.estimator.estimate(line);

            if !buffer.is_empty() && buffer_tokens + line_tokens > threshold {
                parts.push(Part::single(FileChunk::partial(
                    &file.path,
                    std::mem::take(&mut buffer),
                    buffer_tokens,
                    start_line,
                    line_no - 1,
                    total_lines,
                )));
                buffer_tokens = 0;
                start_line = line_no;
            }

            if line_tokens > threshold {
                warn!(
                    path = %file.path,
                    line = line_no,
                    tokens = line_tokens,
                    threshold,
                    "Line exceeds split threshold; sending it as an oversized chunk"
                );
            }

            buffer.push_str(line);
            buffer_tokens += line_tokens;
        }

        if !buffer.is_empty() {
            parts.push(Part::single(FileChunk::partial(
                &file.path,
                buffer,
                buffer_tokens,
                start_line,
                line_no,
                total_lines,
            )));
        }

        debug!(
            path = %file.path,
            chunks = parts.len() - first_part,
            total_lines,
            "Split oversized file by lines"
        );
    }
}
