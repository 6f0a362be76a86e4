//! Context types for multi-part delivery.
//!
//! A context is an ordered list of [`ContextFile`]s. The planner turns it into
//! ordered [`Part`]s of [`FileChunk`]s, and the sequencer exchanges
//! [`Message`]s with the endpoint.
//!
//! ```rust,ignore
//! use ctxstream_core::context::{collect_files, ContextSummary, FsFileProvider};
//!
//! let files = collect_files(&FsFileProvider::new(), &["src/lib.rs", "src/main.rs"]).await;
//! println!("{}", ContextSummary::from_files(&files));
//! ```

mod provider;
mod summary;
mod types;

pub use provider::{collect_files, FileProvider, FsFileProvider, InMemoryFileProvider};
pub use summary::{ContextSummary, FileSummary};
pub use types::{ContextFile, FileChunk, Message, Part, Role};
