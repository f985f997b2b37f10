//! Incremental terminal rendering of a streaming reply

use coco_chat_core::{AssistantMessage, ChatMessage, ChunkKind};
use colored::*;

/// Remembers what has already been printed so each update only emits the
/// new part of the reply.
#[derive(Debug, Default)]
pub struct ReplyPrinter {
    printed: usize,
    thinking_shown: bool,
    last_reading: Option<String>,
}

impl ReplyPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text appended to the response since the last call
    pub fn response_delta<'a>(&mut self, message: &'a AssistantMessage) -> Option<&'a str> {
        let delta = message.response.get(self.printed..)?;
        if delta.is_empty() {
            return None;
        }
        self.printed = message.response.len();
        Some(delta)
    }

    /// A status line for progress worth telling the user about, if any
    pub fn status(&mut self, message: &AssistantMessage) -> Option<String> {
        if let Some(title) = &message.deep_read {
            if self.last_reading.as_ref() != Some(title) {
                self.last_reading = Some(title.clone());
                return Some(format!("📖 {}: {}", ChunkKind::DeepRead.display_name(), title));
            }
        }
        if !self.thinking_shown && !message.think.is_empty() && message.response.is_empty() {
            self.thinking_shown = true;
            return Some(format!("🤔 {}...", ChunkKind::Think.display_name()));
        }
        None
    }
}

/// Query intent and sources of a finished reply
pub fn format_details(message: &AssistantMessage) -> String {
    let mut out = String::new();

    if let Some(intent) = message.intent() {
        out.push_str(&format!("\n{}\n", "Query Intent:".bold().blue()));
        out.push_str(&format!("  category: {}\n", intent.category));
        out.push_str(&format!("  intent:   {}\n", intent.intent));
        if !intent.keyword.is_empty() {
            out.push_str(&format!("  keywords: {}\n", intent.keyword.join(", ")));
        }
        for suggestion in &intent.suggestion {
            out.push_str(&format!("  • {}\n", suggestion.dimmed()));
        }
    }

    let sources = if message.picked_sources().is_empty() {
        message.fetched_sources()
    } else {
        message.picked_sources()
    };
    if !sources.is_empty() {
        out.push_str(&format!("\n{}\n", "Sources:".bold().blue()));
        for doc in sources {
            out.push_str(&format!("• {} {}\n", doc.title.yellow(), doc.url.dimmed()));
        }
    }

    if !message.think.is_empty() {
        out.push_str(&format!("\n{}\n{}\n", "Reasoning:".bold().blue(), message.think.dimmed()));
    }

    out
}

pub fn format_history(history: &[ChatMessage]) -> String {
    history
        .iter()
        .map(|m| format!("{:?}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_delta_only_new_text() {
        let mut printer = ReplyPrinter::new();
        let mut message = AssistantMessage::typing();

        message.response.push_str("Coc");
        assert_eq!(printer.response_delta(&message), Some("Coc"));
        assert_eq!(printer.response_delta(&message), None);

        message.response.push_str("o AI");
        assert_eq!(printer.response_delta(&message), Some("o AI"));
    }

    #[test]
    fn test_response_delta_after_rewrite_to_shorter_text() {
        let mut printer = ReplyPrinter::new();
        let mut message = AssistantMessage::typing();
        message.response = "a long partial answer".to_string();
        printer.response_delta(&message);

        message.response = "short".to_string();
        assert_eq!(printer.response_delta(&message), None);
    }

    #[test]
    fn test_status_lines() {
        colored::control::set_override(false);
        let mut printer = ReplyPrinter::new();
        let mut message = AssistantMessage::typing();

        message.think.push_str("Anal");
        assert_eq!(printer.status(&message).as_deref(), Some("🤔 Thinking..."));
        message.think.push_str("yzing");
        assert_eq!(printer.status(&message), None);

        message.deep_read = Some("User Guide".to_string());
        assert_eq!(printer.status(&message).as_deref(), Some("📖 Reading: User Guide"));
        assert_eq!(printer.status(&message), None);
    }

    #[test]
    fn test_format_details_lists_sources() {
        colored::control::set_override(false);
        let message = AssistantMessage {
            fetch_source: Some(serde_json::json!([
                {"id": "doc_1", "title": "Coco AI Documentation", "url": "https://docs.example.com"}
            ])),
            ..AssistantMessage::default()
        };
        let text = format_details(&message);
        assert!(text.contains("Sources:"));
        assert!(text.contains("Coco AI Documentation"));
    }
}
