//! State of an in-progress multi-part delivery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::{Message, Part};

/// Where a delivery stands. Exactly one phase holds at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No multi-part delivery in progress
    #[default]
    Idle,
    /// Parts are being sent and acknowledged
    Sending,
    /// All parts acknowledged; waiting on the final answer
    AwaitingFinalAnswer,
}

/// Snapshot of a session for status displays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub session_id: Option<Uuid>,
    pub phase: SessionPhase,
    pub parts_acknowledged: usize,
    pub total_parts: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

impl SessionStatus {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.phase != SessionPhase::Idle
    }
}

/// A multi-part delivery session.
///
/// `current_part_index` counts acknowledged parts: it starts at 0 and only
/// grows, one step per acknowledgment, up to `parts.len()`, at which point the
/// session awaits the final answer. History only grows until the session is
/// finished, when it is handed back to the caller.
#[derive(Debug, Clone)]
pub struct StreamingSession {
    id: Uuid,
    is_active: bool,
    parts: Vec<Part>,
    current_part_index: usize,
    context_summary: Option<String>,
    history: Vec<Message>,
    started_at: DateTime<Utc>,
}

impl StreamingSession {
    /// Start a session: `prior` conversation first, then the prompt as a user message.
    pub fn start(
        parts: Vec<Part>,
        prior: Vec<Message>,
        prompt: &str,
        context_summary: Option<String>,
    ) -> Self {
        let mut history = prior;
        history.push(Message::user(prompt));
        Self {
            id: Uuid::new_v4(),
            is_active: true,
            parts,
            current_part_index: 0,
            context_summary,
            history,
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn total_parts(&self) -> usize {
        self.parts.len()
    }

    pub fn current_part_index(&self) -> usize {
        self.current_part_index
    }

    pub fn context_summary(&self) -> Option<&str> {
        self.context_summary.as_deref()
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn phase(&self) -> SessionPhase {
        if !self.is_active {
            SessionPhase::Idle
        } else if self.current_part_index < self.parts.len() {
            SessionPhase::Sending
        } else {
            SessionPhase::AwaitingFinalAnswer
        }
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            session_id: self.is_active.then_some(self.id),
            phase: self.phase(),
            parts_acknowledged: self.current_part_index,
            total_parts: self.parts.len(),
            started_at: self.is_active.then_some(self.started_at),
        }
    }

    /// The next part to send as `(1-based index, part)`.
    pub fn next_part(&self) -> Option<(usize, &Part)> {
        if self.phase() != SessionPhase::Sending {
            return None;
        }
        self.parts
            .get(self.current_part_index)
            .map(|part| (self.current_part_index + 1, part))
    }

    /// The full message list for a request: history plus `message` as a user turn.
    pub fn request_with(&self, message: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.history.len() + 1);
        messages.extend_from_slice(&self.history);
        messages.push(Message::user(message));
        messages
    }

    /// Record the acknowledged part message and its reply, advancing one part.
    ///
    /// History grows by two entries, so later requests replay every part.
    pub fn acknowledge(&mut self, part_message: String, reply: String) {
        debug_assert_eq!(self.phase(), SessionPhase::Sending);
        self.history.push(Message::user(part_message));
        self.history.push(Message::assistant(reply));
        self.current_part_index += 1;
    }

    /// Record the final exchange, end the session, and hand back its history.
    pub fn finish(mut self, final_message: String, answer: String) -> Vec<Message> {
        debug_assert_eq!(self.phase(), SessionPhase::AwaitingFinalAnswer);
        self.history.push(Message::user(final_message));
        self.history.push(Message::assistant(answer));
        self.is_active = false;
        self.history
    }
}
