use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ChunkError;

/// The kind of a streamed chunk, taken from its `chunk_type` (or `type`) tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    QueryIntent,
    FetchSource,
    PickSource,
    DeepRead,
    Think,
    Response,
    ReplyStart,
    ReplyEnd,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::QueryIntent => "query_intent",
            ChunkKind::FetchSource => "fetch_source",
            ChunkKind::PickSource => "pick_source",
            ChunkKind::DeepRead => "deep_read",
            ChunkKind::Think => "think",
            ChunkKind::Response => "response",
            ChunkKind::ReplyStart => "reply_start",
            ChunkKind::ReplyEnd => "reply_end",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "query_intent" => Some(ChunkKind::QueryIntent),
            "fetch_source" => Some(ChunkKind::FetchSource),
            "pick_source" => Some(ChunkKind::PickSource),
            "deep_read" => Some(ChunkKind::DeepRead),
            "think" => Some(ChunkKind::Think),
            "response" => Some(ChunkKind::Response),
            "reply_start" => Some(ChunkKind::ReplyStart),
            "reply_end" => Some(ChunkKind::ReplyEnd),
            _ => None,
        }
    }

    pub fn all() -> Vec<ChunkKind> {
        vec![
            ChunkKind::QueryIntent,
            ChunkKind::FetchSource,
            ChunkKind::PickSource,
            ChunkKind::DeepRead,
            ChunkKind::Think,
            ChunkKind::Response,
            ChunkKind::ReplyStart,
            ChunkKind::ReplyEnd,
        ]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ChunkKind::QueryIntent => "Understanding the question",
            ChunkKind::FetchSource => "Searching sources",
            ChunkKind::PickSource => "Picking relevant documents",
            ChunkKind::DeepRead => "Reading",
            ChunkKind::Think => "Thinking",
            ChunkKind::Response => "Answer",
            ChunkKind::ReplyStart => "Reply started",
            ChunkKind::ReplyEnd => "Reply finished",
        }
    }
}

/// Envelope fields the server attaches to every chunk. All optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkEnvelope {
    pub session_id: Option<String>,
    pub message_id: Option<String>,
    pub message_type: Option<String>,
    pub reply_to_message: Option<String>,
    pub chunk_sequence: Option<i64>,
}

/// One partial update to the in-progress assistant reply
#[derive(Debug, Clone, PartialEq)]
pub struct StreamChunk {
    pub kind: ChunkKind,
    pub message_chunk: Option<String>,
    pub description: Option<String>,
    pub payload: Option<Value>,
    pub envelope: ChunkEnvelope,
}

impl StreamChunk {
    pub fn new(kind: ChunkKind, message_chunk: &str) -> Self {
        Self {
            kind,
            message_chunk: Some(message_chunk.to_string()),
            description: None,
            payload: None,
            envelope: ChunkEnvelope::default(),
        }
    }

    /// The text fragment carried by this chunk, preferring `message_chunk`
    pub fn text(&self) -> &str {
        self.message_chunk
            .as_deref()
            .or(self.description.as_deref())
            .unwrap_or_default()
    }
}

/// A search-hit shaped record (`{ _id, _source }`) sent at the end of a reply
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_source")]
    pub source: Value,
}

impl MessageRecord {
    pub fn message(&self) -> Option<&str> {
        self.source.get("message").and_then(Value::as_str)
    }

    pub fn message_type(&self) -> Option<&str> {
        self.source.get("type").and_then(Value::as_str)
    }
}

/// A classified NDJSON line
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Chunk(StreamChunk),
    Record(MessageRecord),
    /// Acknowledgement envelope (`_id`, `_source` and `result`), carries no reply state
    Ack,
}

#[derive(Deserialize)]
struct RawChunk {
    chunk_type: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    message_chunk: Option<String>,
    description: Option<String>,
    payload: Option<Value>,
    #[serde(flatten)]
    envelope: ChunkEnvelope,
}

impl StreamEvent {
    /// Classify one parsed line. Unknown or missing tags are rejected.
    pub fn from_value(value: Value) -> Result<Self, ChunkError> {
        if value.get("_id").is_some() && value.get("_source").is_some() {
            if value.get("result").is_some() {
                return Ok(StreamEvent::Ack);
            }
            let record: MessageRecord = serde_json::from_value(value)?;
            return Ok(StreamEvent::Record(record));
        }

        let raw: RawChunk = serde_json::from_value(value)?;
        let tag = raw
            .chunk_type
            .filter(|t| !t.is_empty())
            .or(raw.kind)
            .ok_or(ChunkError::MissingKind)?;
        let kind = ChunkKind::from_str(&tag).ok_or(ChunkError::UnknownKind(tag))?;

        Ok(StreamEvent::Chunk(StreamChunk {
            kind,
            message_chunk: raw.message_chunk,
            description: raw.description,
            payload: raw.payload,
            envelope: raw.envelope,
        }))
    }
}
