//! Transport abstraction for a stateless completion endpoint.
//!
//! The endpoint keeps no session: each call to [`Transport::send_messages`]
//! carries the entire conversation. That replay is what lets the endpoint
//! see earlier parts of a multi-part delivery.
//!
//! ## Example
//!
//! ```rust,ignore
//! use ctxstream_core::llm::{AnthropicTransport, ClientConfig, RequestOptions, Transport};
//! use ctxstream_core::Message;
//!
//! let transport = AnthropicTransport::new(ClientConfig::from_env()?)?;
//! let reply = transport
//!     .send_messages(&[Message::user("Hello")], &RequestOptions::new())
//!     .await?;
//! ```

mod client;
mod types;

pub use client::{classify_http_error, AnthropicTransport, ClientConfig, Transport};
pub use types::RequestOptions;
