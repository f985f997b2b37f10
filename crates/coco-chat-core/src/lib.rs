//! Decoding of streamed Coco assistant replies.
//!
//! A reply arrives as newline-delimited JSON. [`ndjson::NdjsonReader`] turns
//! body fragments into JSON values, [`chunk::StreamEvent`] classifies them,
//! and [`session::ChatSession`] folds them into view state that a renderer
//! can read while the reply is still typing.

pub mod chunk;
pub mod client;
pub mod config;
pub mod driver;
pub mod error;
pub mod ndjson;
pub mod notify;
pub mod payload;
pub mod reducer;
pub mod session;
pub mod state;

// Re-export main types for convenience
pub use chunk::{ChunkKind, MessageRecord, StreamChunk, StreamEvent};
pub use client::CocoClient;
pub use config::Config;
pub use driver::{cancellable, drive, DriveOptions, StreamOutcome};
pub use error::{ChunkError, CocoError, Result};
pub use ndjson::NdjsonReader;
pub use notify::{default_translate, LogNotifier, Notifier, Translate};
pub use payload::{QueryIntent, SourceDocument};
pub use reducer::{Phase, Reducer};
pub use session::ChatSession;
pub use state::{AssistantMessage, ChatMessage, ChatRole};
