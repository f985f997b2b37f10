use tracing::debug;

use crate::chunk::{ChunkKind, MessageRecord, StreamChunk};
use crate::error::{CocoError, Result};
use crate::payload::chunk_payload;
use crate::state::AssistantMessage;

/// Lifecycle of one assistant reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Streaming,
    Finalized,
}

/// Folds stream chunks into an [`AssistantMessage`]
#[derive(Debug, Default)]
pub struct Reducer {
    phase: Phase,
    message: AssistantMessage,
}

impl Reducer {
    /// A reducer for a freshly submitted question: idle, but already typing.
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            message: AssistantMessage::typing(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn message(&self) -> &AssistantMessage {
        &self.message
    }


    /// Apply one chunk and return the resulting phase.
    pub fn apply(&mut self, chunk: &StreamChunk) -> Result<Phase> {
        self.ensure_open()?;
        self.phase = Phase::Streaming;

        if self.message.message_id.is_none() {
            self.message.message_id = chunk.envelope.message_id.clone();
        }

        match chunk.kind {
            ChunkKind::Response => self.message.response.push_str(chunk.text()),
            ChunkKind::Think => self.message.think.push_str(chunk.text()),
            ChunkKind::QueryIntent => self.message.query_intent = Some(chunk_payload(chunk)),
            ChunkKind::FetchSource => self.message.fetch_source = Some(chunk_payload(chunk)),
            ChunkKind::PickSource => self.message.pick_source = Some(chunk_payload(chunk)),
            ChunkKind::DeepRead => self.message.deep_read = Some(chunk.text().to_string()),
            ChunkKind::ReplyStart => {}
            ChunkKind::ReplyEnd => {
                debug!(reason = chunk.text(), "server signaled end of reply");
                self.finish();
            }
        }

        Ok(self.phase)
    }

    /// Apply a complete message record. Its id is attached to the reply and
    /// a non-empty `message` replaces the accumulated response text.
    pub fn apply_record(&mut self, record: &MessageRecord) -> Result<Phase> {
        self.ensure_open()?;
        self.phase = Phase::Streaming;

        if record.message_type() == Some("user") {
            return Ok(self.phase);
        }
        self.message.message_id = Some(record.id.clone());
        if let Some(text) = record.message().filter(|t| !t.is_empty()) {
            self.message.response = text.to_string();
        }
        Ok(self.phase)
    }

    /// Seal the reply. Per-kind slots keep their last values.
    pub fn finish(&mut self) {
        self.message.is_typing = false;
        self.phase = Phase::Finalized;
    }

    /// Seal the reply as failed
    pub fn fail(&mut self) {
        self.message.failed = true;
        self.finish();
    }

    /// Discard everything accumulated and return to idle
    pub fn abort(&mut self) {
        self.message = AssistantMessage::default();
        self.phase = Phase::Idle;
    }

    pub fn into_message(self) -> AssistantMessage {
        self.message
    }

    fn ensure_open(&self) -> Result<()> {
        if self.phase == Phase::Finalized {
            return Err(CocoError::InvalidState(
                "reply is already finalized".to_string(),
            ));
        }
        Ok(())
    }
}
