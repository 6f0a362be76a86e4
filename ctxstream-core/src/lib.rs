//! # ctxstream-core
//!
//! Token-budget-aware delivery of large contexts to a stateless completion
//! endpoint. Contexts that fit are sent as one message; contexts that do not
//! are split into ordered parts, each acknowledged before the next is sent,
//! followed by the caller's question.
//!
//! ## Core Components
//!
//! - **Tokens**: Character-ratio token estimation with a margin for code
//! - **Strategy**: Single-shot vs multi-part decision
//! - **Planner**: File-boundary packing and line-boundary splitting
//! - **Sequencer**: Serialized part delivery with progress events
//! - **Events**: Progress and outcome events for UIs
//! - **LLM**: The transport boundary and an HTTP implementation
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ctxstream_core::{
//!     AnthropicTransport, ClientConfig, ContextFile, DeliveryRequest, DeliverySequencer,
//!     StreamingConfig,
//! };
//!
//! let transport = Arc::new(AnthropicTransport::new(ClientConfig::from_env()?)?);
//! let sequencer = DeliverySequencer::new(transport, StreamingConfig::from_env())?;
//!
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! let files = vec![ContextFile::new("src/main.rs", source)];
//! let outcome = sequencer
//!     .deliver(DeliveryRequest::new("Explain the main loop", files), &tx)
//!     .await?;
//! println!("{} ({} parts)", outcome.response, outcome.parts_sent);
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod llm;
pub mod planner;
pub mod prompt;
pub mod sequencer;
pub mod session;
pub mod strategy;
pub mod tokens;

// Re-exports for convenience
pub use config::StreamingConfig;
pub use context::{
    collect_files, ContextFile, ContextSummary, FileChunk, FileProvider, FsFileProvider,
    InMemoryFileProvider, Message, Part, Role,
};
pub use error::{Error, ErrorKind, Result};
pub use events::{CollectingSink, DeliveryEvent, EventSink, FnSink, NoopSink};
pub use llm::{AnthropicTransport, ClientConfig, RequestOptions, Transport};
pub use planner::ChunkPlanner;
pub use sequencer::{DeliveryOutcome, DeliveryPlan, DeliveryRequest, DeliverySequencer};
pub use session::{SessionPhase, SessionStatus, StreamingSession};
pub use strategy::{select_strategy, DeliveryStrategy, StrategyMode};
pub use tokens::TokenEstimator;
