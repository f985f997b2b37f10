//! Structured payloads carried by `query_intent`, `fetch_source` and
//! `pick_source` chunks.
//!
//! Model output usually wraps the JSON in `<JSON></JSON>` tags or a fenced
//! ```` ```json ```` block; both are unwrapped before parsing.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chunk::StreamChunk;

static JSON_MARKDOWN_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)`{3,}json(.+)`{3,}").expect("valid regex"));
static JSON_BLOCK_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<JSON>(.+)</JSON>").expect("valid regex"));

/// Intent analysis produced for the user's question
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryIntent {
    pub category: String,
    pub intent: String,
    pub query: Vec<String>,
    pub keyword: Vec<String>,
    pub suggestion: Vec<String>,
    pub need_plan_tasks: bool,
    pub need_call_tools: bool,
    pub need_network_search: bool,
}

/// A document fetched or picked while answering
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceDocument {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub url: String,
}

/// Return the JSON text inside a fenced block or `<JSON>` tags, if any
pub fn extract_json(input: &str) -> Option<&str> {
    JSON_MARKDOWN_TAG
        .captures(input)
        .or_else(|| JSON_BLOCK_TAG.captures(input))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

/// Parse wrapped or raw JSON text. Text that is not JSON is kept as a string
/// so the renderer can still show it.
pub fn parse_payload_text(text: &str) -> Value {
    let candidate = extract_json(text).unwrap_or_else(|| text.trim());
    serde_json::from_str(candidate).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// The structured payload of a chunk: an explicit `payload` field wins,
/// otherwise the chunk's text is parsed.
pub fn chunk_payload(chunk: &StreamChunk) -> Value {
    match &chunk.payload {
        Some(Value::String(text)) => parse_payload_text(text),
        Some(value) => value.clone(),
        None => parse_payload_text(chunk.text()),
    }
}

pub fn as_query_intent(value: &Value) -> Option<QueryIntent> {
    serde_json::from_value(value.clone()).ok()
}

pub fn as_sources(value: &Value) -> Vec<SourceDocument> {
    serde_json::from_value(value.clone()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkKind;
    use serde_json::json;

    #[test]
    fn test_extract_json_block() {
        let input = "Here you go:\n<JSON>\n{\"a\": 1}\n</JSON>\nthanks";
        assert_eq!(extract_json(input), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_extract_json_markdown() {
        let input = "```json\n{\"category\": \"General\"}\n```";
        assert_eq!(extract_json(input), Some("{\"category\": \"General\"}"));
        assert_eq!(extract_json("{\"a\": 1}"), None);
    }

    #[test]
    fn test_parse_payload_text_variants() {
        assert_eq!(parse_payload_text("<JSON>{\"a\": 1}</JSON>"), json!({"a": 1}));
        assert_eq!(parse_payload_text(" [1, 2] "), json!([1, 2]));
        assert_eq!(
            parse_payload_text("{\"categ"),
            Value::String("{\"categ".to_string())
        );
    }

    #[test]
    fn test_chunk_payload_prefers_structured_field() {
        let mut chunk = StreamChunk::new(ChunkKind::FetchSource, "ignored");
        chunk.payload = Some(json!([{"id": "doc_1", "title": "Coco AI Documentation"}]));

        let docs = as_sources(&chunk_payload(&chunk));
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].title, "Coco AI Documentation");
        assert_eq!(docs[0].url, "");
    }

    #[test]
    fn test_query_intent_from_chunk_text() {
        let chunk = StreamChunk::new(
            ChunkKind::QueryIntent,
            "<JSON>{\"category\":\"General Inquiry\",\"intent\":\"User Interaction\",\"keyword\":[\"test\"]}</JSON>",
        );
        let intent = as_query_intent(&chunk_payload(&chunk)).unwrap();
        assert_eq!(intent.category, "General Inquiry");
        assert_eq!(intent.keyword, vec!["test".to_string()]);
        assert!(intent.query.is_empty());
        assert!(!intent.need_network_search);
    }
}
