//! Delivery sequencer: drives single-shot or multi-part delivery of a context.
//!
//! ```text
//! Idle -> Sending(1..=N) -> FinalQuestion -> Complete | Failed -> Idle
//! ```
//!
//! Parts are strictly serialized: part `i + 1` is sent only after part `i`
//! was acknowledged and recorded. Every request replays the whole history
//! because the transport is stateless. Any failure abandons the delivery;
//! nothing is retried or resumed.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ctxstream_core::{DeliveryRequest, DeliverySequencer, StreamingConfig};
//! use ctxstream_core::events::CollectingSink;
//!
//! let sequencer = DeliverySequencer::new(Arc::new(transport), StreamingConfig::from_env())?;
//! let sink = CollectingSink::new();
//! let outcome = sequencer
//!     .deliver(DeliveryRequest::new("Where is the bug?", files), &sink)
//!     .await?;
//! println!("{}", outcome.response);
//! ```

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::StreamingConfig;
use crate::context::{ContextFile, ContextSummary, Message, Part};
use crate::error::{Error, Result};
use crate::events::{DeliveryEvent, EventSink};
use crate::llm::{RequestOptions, Transport};
use crate::planner::ChunkPlanner;
use crate::prompt;
use crate::session::{SessionStatus, StreamingSession};
use crate::strategy::{select_strategy, DeliveryStrategy};
use crate::tokens::TokenEstimator;

/// A prompt, its context files, and any earlier conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRequest {
    pub prompt: String,
    pub files: Vec<ContextFile>,
    /// Conversation preceding this request
    #[serde(default)]
    pub history: Vec<Message>,
    /// Budget override for this request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<usize>,
}

impl DeliveryRequest {
    pub fn new(prompt: impl Into<String>, files: Vec<ContextFile>) -> Self {
        Self {
            prompt: prompt.into(),
            files,
            history: Vec::new(),
            budget: None,
        }
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_budget(mut self, budget: usize) -> Self {
        self.budget = Some(budget);
        self
    }
}

/// How a request would be delivered, computed without contacting the endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryPlan {
    pub strategy: DeliveryStrategy,
    pub prompt_tokens: usize,
    pub file_tokens: usize,
    pub total_tokens: usize,
    pub budget: usize,
    pub effective_budget: usize,
    /// Empty for single-message delivery
    pub parts: Vec<Part>,
}

impl DeliveryPlan {
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }
}

/// Result of a completed delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub strategy: DeliveryStrategy,
    /// The endpoint's answer to the prompt
    pub response: String,
    /// Parts acknowledged before the final question (0 for single-shot)
    pub parts_sent: usize,
    /// Full conversation, now owned by the caller
    pub history: Vec<Message>,
    pub session_id: Option<Uuid>,
    pub elapsed_ms: u64,
}

/// Releases the busy flag and clears the published status when dropped,
/// including when the delivery future is cancelled.
struct ActiveGuard<'a> {
    busy: &'a AtomicBool,
    status: &'a RwLock<SessionStatus>,
}

impl<'a> ActiveGuard<'a> {
    fn acquire(busy: &'a AtomicBool, status: &'a RwLock<SessionStatus>) -> Option<Self> {
        busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { busy, status })
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        *self
            .status
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = SessionStatus::idle();
        self.busy.store(false, Ordering::Release);
    }
}

/// Drives deliveries against a transport. One delivery at a time.
pub struct DeliverySequencer {
    transport: Arc<dyn Transport>,
    config: StreamingConfig,
    estimator: TokenEstimator,
    busy: AtomicBool,
    status: RwLock<SessionStatus>,
}

impl DeliverySequencer {
    pub fn new(transport: Arc<dyn Transport>, config: StreamingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transport,
            estimator: TokenEstimator::new(config.token_estimation_ratio),
            config,
            busy: AtomicBool::new(false),
            status: RwLock::new(SessionStatus::idle()),
        })
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    /// Whether a delivery is in progress.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Current session status; idle when no multi-part delivery runs.
    pub fn status(&self) -> SessionStatus {
        self.status
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn publish(&self, status: SessionStatus) {
        *self
            .status
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = status;
    }

    /// Plan a request with the configured budget.
    pub fn preview(&self, prompt: &str, files: &[ContextFile]) -> DeliveryPlan {
        self.plan_with_budget(prompt, files, self.config.max_tokens_per_message)
    }

    fn plan_with_budget(&self, prompt: &str, files: &[ContextFile], budget: usize) -> DeliveryPlan {
        let planner = ChunkPlanner::new(self.estimator, budget);
        let prompt_tokens = self.estimator.estimate(prompt);
        let file_tokens = self.estimator.estimate_files(files);
        let total_tokens = prompt_tokens + file_tokens;

        let mut strategy = select_strategy(
            self.config.strategy_mode,
            total_tokens,
            planner.effective_budget(),
        );
        let parts = match strategy {
            DeliveryStrategy::Single => Vec::new(),
            DeliveryStrategy::Streaming => planner
                .plan(files, prompt_tokens)
                .unwrap_or_else(|| planner.partition(files)),
        };
        if strategy == DeliveryStrategy::Streaming && parts.is_empty() {
            debug!("No files to split; falling back to a single message");
            strategy = DeliveryStrategy::Single;
        }

        DeliveryPlan {
            strategy,
            prompt_tokens,
            file_tokens,
            total_tokens,
            budget,
            effective_budget: planner.effective_budget(),
            parts,
        }
    }

    /// Deliver a request, reporting progress to `sink`.
    ///
    /// Emits exactly one terminal event (`complete` or `error`), after the
    /// busy flag and status have been reset. A call made while another
    /// delivery is in progress fails with [`Error::Busy`].
    #[instrument(skip_all, fields(files = request.files.len()))]
    pub async fn deliver(
        &self,
        request: DeliveryRequest,
        sink: &dyn EventSink,
    ) -> Result<DeliveryOutcome> {
        let Some(guard) = ActiveGuard::acquire(&self.busy, &self.status) else {
            let err = Error::Busy;
            warn!("Rejected delivery: another delivery is in progress");
            sink.emit(DeliveryEvent::error(&err));
            return Err(err);
        };

        let started = Instant::now();
        let budget = request.budget.unwrap_or(self.config.max_tokens_per_message);
        let plan = self.plan_with_budget(&request.prompt, &request.files, budget);
        info!(
            strategy = %plan.strategy,
            total_tokens = plan.total_tokens,
            effective_budget = plan.effective_budget,
            parts = plan.part_count(),
            "Selected delivery strategy"
        );

        let result = match plan.strategy {
            DeliveryStrategy::Single => self.deliver_single(request).await,
            DeliveryStrategy::Streaming => self.deliver_parts(request, plan.parts, sink).await,
        };

        // Sinks see the terminal event with the sequencer already idle.
        drop(guard);

        match result {
            Ok(mut outcome) => {
                outcome.elapsed_ms = started.elapsed().as_millis() as u64;
                info!(
                    strategy = %outcome.strategy,
                    parts = outcome.parts_sent,
                    elapsed_ms = outcome.elapsed_ms,
                    "Delivery complete"
                );
                sink.emit(DeliveryEvent::complete(outcome.response.clone()));
                Ok(outcome)
            }
            Err(err) => {
                warn!(error = %err, "Delivery failed");
                sink.emit(DeliveryEvent::error(&err));
                Err(err)
            }
        }
    }

    async fn deliver_single(&self, request: DeliveryRequest) -> Result<DeliveryOutcome> {
        let DeliveryRequest {
            prompt: question,
            files,
            mut history,
            ..
        } = request;

        history.push(Message::user(prompt::single_message(&question, &files)));
        let options = RequestOptions::from_config(&self.config);
        debug!(messages = history.len(), "Sending single message");

        let response = self.transport.send_messages(&history, &options).await?;
        if response.trim().is_empty() {
            return Err(Error::EmptyResponse);
        }
        history.push(Message::assistant(response.clone()));

        Ok(DeliveryOutcome {
            strategy: DeliveryStrategy::Single,
            response,
            parts_sent: 0,
            history,
            session_id: None,
            elapsed_ms: 0,
        })
    }

    async fn deliver_parts(
        &self,
        request: DeliveryRequest,
        parts: Vec<Part>,
        sink: &dyn EventSink,
    ) -> Result<DeliveryOutcome> {
        let DeliveryRequest {
            prompt: question,
            files,
            history,
            ..
        } = request;

        let summary = self
            .config
            .include_context_summary
            .then(|| ContextSummary::from_files(&files).render());
        let mut session = StreamingSession::start(parts, history, &question, summary);
        let total = session.total_parts();
        let options = RequestOptions::from_config(&self.config);
        let delay = Duration::from_millis(self.config.inter_part_delay_ms);
        self.publish(session.status());
        info!(session = %session.id(), total, "Starting multi-part delivery");

        while let Some((index, part)) = session.next_part() {
            let message = prompt::part_message(part, index, total, session.context_summary());
            sink.emit(DeliveryEvent::progress(index, total, message.len()));
            debug!(part = index, total, bytes = message.len(), "Sending part");

            let reply = self
                .transport
                .send_messages(&session.request_with(&message), &options)
                .await?;
            if reply.trim().is_empty() {
                return Err(Error::EmptyAcknowledgment { part: index, total });
            }

            session.acknowledge(message, reply);
            self.publish(session.status());
            sink.emit(DeliveryEvent::part_complete(index, total));
            debug!(part = index, total, "Part acknowledged");

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        let final_message = prompt::final_question(&question, total);
        sink.emit(DeliveryEvent::final_processing(total));
        debug!(total, "Asking final question");

        let answer = self
            .transport
            .send_messages(&session.request_with(&final_message), &options)
            .await?;
        if answer.trim().is_empty() {
            return Err(Error::EmptyResponse);
        }

        let session_id = session.id();
        let history = session.finish(final_message, answer.clone());

        Ok(DeliveryOutcome {
            strategy: DeliveryStrategy::Streaming,
            response: answer,
            parts_sent: total,
            history,
            session_id: Some(session_id),
            elapsed_ms: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Role;
    use crate::error::ErrorKind;
    use crate::events::{CollectingSink, FnSink};
    use crate::session::SessionPhase;
    use crate::strategy::StrategyMode;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    /// Records every request and replies from a script.
    struct ScriptedTransport {
        calls: Mutex<Vec<Vec<Message>>>,
        fail_on_call: Option<usize>,
        empty_on_call: Option<usize>,
    }

    impl ScriptedTransport {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_on_call: None,
                empty_on_call: None,
            }
        }

        fn failing_on(call: usize) -> Self {
            Self {
                fail_on_call: Some(call),
                ..Self::new()
            }
        }

        fn empty_on(call: usize) -> Self {
            Self {
                empty_on_call: Some(call),
                ..Self::new()
            }
        }

        fn calls(&self) -> Vec<Vec<Message>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send_messages(
            &self,
            messages: &[Message],
            _options: &RequestOptions,
        ) -> Result<String> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(messages.to_vec());
                calls.len()
            };
            if self.fail_on_call == Some(call) {
                return Err(Error::rate_limited("slow down", Some(5)));
            }
            if self.empty_on_call == Some(call) {
                return Ok("   ".to_string());
            }
            Ok(format!("reply {}", call))
        }
    }

    /// Blocks inside the first call until released; later calls answer at once.
    struct GatedTransport {
        gated: AtomicBool,
        entered: Notify,
        release: Notify,
    }

    impl GatedTransport {
        fn new() -> Self {
            Self {
                gated: AtomicBool::new(true),
                entered: Notify::new(),
                release: Notify::new(),
            }
        }
    }

    #[async_trait]
    impl Transport for GatedTransport {
        async fn send_messages(
            &self,
            _messages: &[Message],
            _options: &RequestOptions,
        ) -> Result<String> {
            if self.gated.swap(false, Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            Ok("done".to_string())
        }
    }

    fn config(budget: usize) -> StreamingConfig {
        StreamingConfig::new()
            .with_max_tokens_per_message(budget)
            .with_context_summary(false)
            .with_inter_part_delay_ms(0)
    }

    fn three_file_request() -> DeliveryRequest {
        // 375 tokens each against an effective budget of 700: one file per part
        DeliveryRequest::new(
            "Summarize the files",
            vec![
                ContextFile::new("one.txt", "a".repeat(1500)),
                ContextFile::new("two.txt", "b".repeat(1500)),
                ContextFile::new("three.txt", "c".repeat(1500)),
            ],
        )
    }

    #[tokio::test]
    async fn test_single_shot_when_under_budget() {
        let transport = Arc::new(ScriptedTransport::new());
        let sequencer = DeliverySequencer::new(transport.clone(), config(100_000)).unwrap();
        let sink = CollectingSink::new();

        let request = DeliveryRequest::new("What does this do?", vec![ContextFile::new("a.rs", "x")])
            .with_history(vec![Message::user("hi"), Message::assistant("hello")]);
        let outcome = sequencer.deliver(request, &sink).await.unwrap();

        assert_eq!(outcome.strategy, DeliveryStrategy::Single);
        assert_eq!(outcome.response, "reply 1");
        assert_eq!(outcome.parts_sent, 0);
        assert_eq!(outcome.session_id, None);
        assert_eq!(outcome.history.len(), 4);

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].len(), 3);
        assert!(calls[0][2].content.starts_with("What does this do?\n\nContext files:"));
        assert!(calls[0][2].content.contains("--- File: a.rs ---\nx\n"));

        assert_eq!(sink.events(), vec![DeliveryEvent::complete("reply 1")]);
        assert!(!sequencer.is_busy());
    }

    #[tokio::test]
    async fn test_streaming_strict_ordering() {
        let transport = Arc::new(ScriptedTransport::new());
        let sequencer = DeliverySequencer::new(transport.clone(), config(1000)).unwrap();
        let sink = CollectingSink::new();

        let outcome = sequencer.deliver(three_file_request(), &sink).await.unwrap();

        assert_eq!(outcome.strategy, DeliveryStrategy::Streaming);
        assert_eq!(outcome.parts_sent, 3);
        assert_eq!(outcome.response, "reply 4");

        let calls = transport.calls();
        assert_eq!(calls.len(), 4);

        // Prompt first, then part 1
        assert_eq!(calls[0].len(), 2);
        assert_eq!(calls[0][0], Message::user("Summarize the files"));
        assert!(calls[0][1].content.contains("=== PART 1/3 ==="));
        assert!(calls[0][1].content.contains("--- File: one.txt ---"));

        // Each request extends the previous one by its reply and one new user turn
        for k in 1..calls.len() {
            let prev = &calls[k - 1];
            let next = &calls[k];
            assert_eq!(next.len(), prev.len() + 2);
            assert_eq!(&next[..prev.len()], &prev[..]);
            assert_eq!(next[prev.len()], Message::assistant(format!("reply {}", k)));
            assert_eq!(next[prev.len() + 1].role, Role::User);
        }
        assert!(calls[1].last().unwrap().content.contains("=== PART 2/3 ==="));
        assert!(calls[2].last().unwrap().content.contains("=== PART 3/3 ==="));
        assert!(calls[2].last().unwrap().content.contains("This was the final part"));
        let final_message = &calls[3].last().unwrap().content;
        assert!(final_message.starts_with("All 3 parts of the context have been delivered."));
        assert!(final_message.ends_with("Summarize the files"));

        assert_eq!(outcome.history.len(), calls[3].len() + 1);
        assert_eq!(outcome.history.last(), Some(&Message::assistant("reply 4")));

        assert_eq!(
            sink.type_names(),
            vec![
                "progress",
                "part_complete",
                "progress",
                "part_complete",
                "progress",
                "part_complete",
                "final_processing",
                "complete"
            ]
        );
        let events = sink.events();
        assert!(matches!(
            events[0],
            DeliveryEvent::Progress { current: 1, total: 3, message_size } if message_size == calls[0][1].content.len()
        ));
        assert_eq!(events[5], DeliveryEvent::part_complete(3, 3));
        assert_eq!(sequencer.status(), SessionStatus::idle());
    }

    #[tokio::test]
    async fn test_failure_aborts_remaining_parts() {
        let transport = Arc::new(ScriptedTransport::failing_on(2));
        let sequencer = DeliverySequencer::new(transport.clone(), config(1000)).unwrap();
        let sink = CollectingSink::new();

        let err = sequencer.deliver(three_file_request(), &sink).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert_eq!(transport.calls().len(), 2);
        assert_eq!(
            sink.type_names(),
            vec!["progress", "part_complete", "progress", "error"]
        );
        assert!(matches!(
            sink.events().last(),
            Some(DeliveryEvent::Error { kind: ErrorKind::RateLimited, .. })
        ));
        assert!(!sequencer.is_busy());
        assert_eq!(sequencer.status().phase, SessionPhase::Idle);
    }

    /// Records `(event type, busy, phase)` for every terminal event.
    fn terminal_observer(
        sequencer: &Arc<DeliverySequencer>,
    ) -> (
        FnSink<impl Fn(DeliveryEvent) + Send + Sync>,
        Arc<Mutex<Vec<(&'static str, bool, SessionStatus)>>>,
    ) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sequencer = Arc::clone(sequencer);
        let record = Arc::clone(&seen);
        let sink = FnSink(move |event: DeliveryEvent| {
            if event.is_terminal() {
                record.lock().unwrap().push((
                    event.type_name(),
                    sequencer.is_busy(),
                    sequencer.status(),
                ));
            }
        });
        (sink, seen)
    }

    #[tokio::test]
    async fn test_terminal_events_observe_idle_sequencer() {
        let failing = Arc::new(
            DeliverySequencer::new(Arc::new(ScriptedTransport::failing_on(2)), config(1000))
                .unwrap(),
        );
        let (sink, seen) = terminal_observer(&failing);
        assert!(failing.deliver(three_file_request(), &sink).await.is_err());
        assert_eq!(
            seen.lock().unwrap().clone(),
            vec![("error", false, SessionStatus::idle())]
        );

        let succeeding = Arc::new(
            DeliverySequencer::new(Arc::new(ScriptedTransport::new()), config(1000)).unwrap(),
        );
        let (sink, seen) = terminal_observer(&succeeding);
        assert!(succeeding.deliver(three_file_request(), &sink).await.is_ok());
        assert_eq!(
            seen.lock().unwrap().clone(),
            vec![("complete", false, SessionStatus::idle())]
        );
    }

    #[tokio::test]
    async fn test_empty_acknowledgment_is_terminal() {
        let transport = Arc::new(ScriptedTransport::empty_on(1));
        let sequencer = DeliverySequencer::new(transport.clone(), config(1000)).unwrap();
        let sink = CollectingSink::new();

        let err = sequencer.deliver(three_file_request(), &sink).await.unwrap_err();

        assert!(matches!(err, Error::EmptyAcknowledgment { part: 1, total: 3 }));
        assert_eq!(transport.calls().len(), 1);
        assert_eq!(sink.type_names(), vec!["progress", "error"]);
    }

    #[tokio::test]
    async fn test_final_question_failure() {
        let transport = Arc::new(ScriptedTransport::failing_on(4));
        let sequencer = DeliverySequencer::new(transport.clone(), config(1000)).unwrap();
        let sink = CollectingSink::new();

        assert!(sequencer.deliver(three_file_request(), &sink).await.is_err());
        assert_eq!(transport.calls().len(), 4);
        let names = sink.type_names();
        assert_eq!(&names[names.len() - 2..], &["final_processing", "error"]);
        assert!(!sequencer.is_busy());

        // A fresh attempt replans from scratch and can succeed.
        let retry = DeliverySequencer::new(Arc::new(ScriptedTransport::new()), config(1000)).unwrap();
        assert!(retry.deliver(three_file_request(), &CollectingSink::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_context_summary_in_first_part_only() {
        let transport = Arc::new(ScriptedTransport::new());
        let sequencer =
            DeliverySequencer::new(transport.clone(), config(1000).with_context_summary(true))
                .unwrap();

        sequencer
            .deliver(three_file_request(), &CollectingSink::new())
            .await
            .unwrap();

        let calls = transport.calls();
        let first = &calls[0][1].content;
        assert!(first.contains("Context summary: 3 files, 3 lines"));
        assert!(first.find("Context summary").unwrap() < first.find("=== PART 1/3 ===").unwrap());
        assert!(!calls[1].last().unwrap().content.contains("Context summary"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_inter_part_delay() {
        let transport = Arc::new(ScriptedTransport::new());
        let sequencer =
            DeliverySequencer::new(transport.clone(), config(1000).with_inter_part_delay_ms(1_000))
                .unwrap();

        let start = tokio::time::Instant::now();
        sequencer
            .deliver(three_file_request(), &CollectingSink::new())
            .await
            .unwrap();

        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_forced_modes() {
        let transport = Arc::new(ScriptedTransport::new());
        let forced_single = DeliverySequencer::new(
            transport.clone(),
            config(1000).with_strategy_mode(StrategyMode::Single),
        )
        .unwrap();
        let outcome = forced_single
            .deliver(three_file_request(), &CollectingSink::new())
            .await
            .unwrap();
        assert_eq!(outcome.strategy, DeliveryStrategy::Single);
        assert_eq!(transport.calls().len(), 1);

        let transport = Arc::new(ScriptedTransport::new());
        let forced_streaming = DeliverySequencer::new(
            transport.clone(),
            config(100_000).with_strategy_mode(StrategyMode::Streaming),
        )
        .unwrap();
        let request = DeliveryRequest::new("q", vec![ContextFile::new("a.txt", "small")]);
        let outcome = forced_streaming
            .deliver(request, &CollectingSink::new())
            .await
            .unwrap();
        assert_eq!(outcome.strategy, DeliveryStrategy::Streaming);
        assert_eq!(outcome.parts_sent, 1);
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_no_files_over_budget_sends_single_message() {
        let transport = Arc::new(ScriptedTransport::new());
        let sequencer = DeliverySequencer::new(transport.clone(), config(10)).unwrap();

        let request = DeliveryRequest::new("q".repeat(400), Vec::new());
        let outcome = sequencer.deliver(request, &CollectingSink::new()).await.unwrap();

        assert_eq!(outcome.strategy, DeliveryStrategy::Single);
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_delivery_is_rejected() {
        let transport = Arc::new(GatedTransport::new());
        let sequencer =
            Arc::new(DeliverySequencer::new(transport.clone(), config(1000)).unwrap());
        let sink = Arc::new(CollectingSink::new());

        let first = {
            let sequencer = Arc::clone(&sequencer);
            let sink = Arc::clone(&sink);
            tokio::spawn(async move { sequencer.deliver(three_file_request(), sink.as_ref()).await })
        };

        transport.entered.notified().await;
        assert!(sequencer.is_busy());
        let status = sequencer.status();
        assert_eq!(status.phase, SessionPhase::Sending);
        assert_eq!(status.total_parts, 3);

        let rejected_sink = CollectingSink::new();
        let err = sequencer
            .deliver(three_file_request(), &rejected_sink)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Busy));
        assert!(matches!(
            rejected_sink.events().as_slice(),
            [DeliveryEvent::Error { kind: ErrorKind::Busy, .. }]
        ));

        transport.release.notify_one();
        let outcome = first.await.unwrap().unwrap();
        assert_eq!(outcome.parts_sent, 3);
        assert!(!sequencer.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_delivery_releases_guard() {
        let transport = Arc::new(GatedTransport::new());
        let sequencer = DeliverySequencer::new(transport, config(1000)).unwrap();
        let sink = CollectingSink::new();

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            sequencer.deliver(three_file_request(), &sink),
        )
        .await;

        assert!(result.is_err());
        assert!(!sequencer.is_busy());
        assert_eq!(sequencer.status(), SessionStatus::idle());
    }

    #[test]
    fn test_preview_matches_planner() {
        let sequencer =
            DeliverySequencer::new(Arc::new(ScriptedTransport::new()), config(1000)).unwrap();
        let request = three_file_request();

        let plan = sequencer.preview(&request.prompt, &request.files);
        assert_eq!(plan.strategy, DeliveryStrategy::Streaming);
        assert_eq!(plan.effective_budget, 700);
        assert_eq!(plan.file_tokens, 1125);
        assert_eq!(plan.part_count(), 3);

        let small = sequencer.preview("q", &[ContextFile::new("a.txt", "tiny")]);
        assert_eq!(small.strategy, DeliveryStrategy::Single);
        assert!(small.parts.is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = DeliverySequencer::new(
            Arc::new(ScriptedTransport::new()),
            StreamingConfig::new().with_max_tokens_per_message(0),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
