//! UI-agnostic chat state types
//!
//! These are the values a renderer reads: the assistant reply being built up
//! from stream chunks, and the finalized messages of a session.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::payload::{self, QueryIntent, SourceDocument};

/// Accumulated view state of one assistant reply
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    /// Concatenated `response` fragments, the visible reply text
    pub response: String,
    /// Concatenated `think` fragments
    pub think: String,
    pub query_intent: Option<Value>,
    pub fetch_source: Option<Value>,
    pub pick_source: Option<Value>,
    /// Title of the document currently being read
    pub deep_read: Option<String>,
    pub is_typing: bool,
    /// Set when the stream ended in a transport error or timeout
    pub failed: bool,
    pub message_id: Option<String>,
}

impl AssistantMessage {
    pub fn typing() -> Self {
        Self {
            is_typing: true,
            ..Self::default()
        }
    }

    pub fn intent(&self) -> Option<QueryIntent> {
        self.query_intent.as_ref().and_then(payload::as_query_intent)
    }

    pub fn fetched_sources(&self) -> Vec<SourceDocument> {
        self.fetch_source
            .as_ref()
            .map(payload::as_sources)
            .unwrap_or_default()
    }

    pub fn picked_sources(&self) -> Vec<SourceDocument> {
        self.pick_source
            .as_ref()
            .map(payload::as_sources)
            .unwrap_or_default()
    }
}

/// A finalized chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    /// Sealed reply state, present on assistant messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<AssistantMessage>,
}

impl ChatMessage {
    pub fn user(content: &str) -> Self {
        Self {
            role: ChatRole::User,
            content: content.to_string(),
            details: None,
        }
    }

    pub fn assistant(content: String, details: AssistantMessage) -> Self {
        Self {
            role: ChatRole::Assistant,
            content,
            details: Some(details),
        }
    }
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}
