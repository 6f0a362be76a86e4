//! Core context types: ContextFile, FileChunk, Part, Message.

use serde::{Deserialize, Serialize};

/// A file supplied by the caller. Never mutated by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextFile {
    /// Path as shown to the endpoint
    pub path: String,
    /// Full file content
    pub content: String,
}

impl ContextFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    /// Number of lines; a trailing newline does not start a new line.
    pub fn line_count(&self) -> usize {
        self.content.split_inclusive('\n').count()
    }

    /// Content size in bytes.
    pub fn byte_len(&self) -> usize {
        self.content.len()
    }
}

/// The portion of one file carried by a [`Part`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChunk {
    pub path: String,
    pub content: String,
    /// Estimated tokens for `content`
    pub tokens: usize,
    /// Whether this chunk is a line range rather than the whole file
    pub partial: bool,
    /// First line covered, 1-based inclusive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_line: Option<usize>,
    /// Last line covered, 1-based inclusive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<usize>,
    /// Line count of the source file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_lines: Option<usize>,
}

impl FileChunk {
    /// A chunk carrying a whole file.
    pub fn whole(path: impl Into<String>, content: impl Into<String>, tokens: usize) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            tokens,
            partial: false,
            start_line: None,
            end_line: None,
            total_lines: None,
        }
    }

    /// A chunk carrying lines `start_line..=end_line` of a file with `total_lines` lines.
    pub fn partial(
        path: impl Into<String>,
        content: impl Into<String>,
        tokens: usize,
        start_line: usize,
        end_line: usize,
        total_lines: usize,
    ) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            tokens,
            partial: true,
            start_line: Some(start_line),
            end_line: Some(end_line),
            total_lines: Some(total_lines),
        }
    }

    /// Line range for partial chunks.
    pub fn line_range(&self) -> Option<(usize, usize)> {
        match (self.partial, self.start_line, self.end_line) {
            (true, Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }
}

/// One unit of a multi-message delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    /// Chunks in delivery order
    pub files: Vec<FileChunk>,
    /// Sum of chunk estimates
    pub estimated_tokens: usize,
}

impl Part {
    pub fn new() -> Self {
        Self::default()
    }

    /// A part holding a single chunk.
    pub fn single(chunk: FileChunk) -> Self {
        let mut part = Self::new();
        part.push(chunk);
        part
    }

    /// Append a chunk and account for its tokens.
    pub fn push(&mut self, chunk: FileChunk) {
        self.estimated_tokens += chunk.tokens;
        self.files.push(chunk);
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }
}

/// The role of a message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User/human input
    User,
    /// Assistant/model response
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A message in the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}
