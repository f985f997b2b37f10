use std::sync::Arc;

use tracing::{debug, info};

use crate::chunk::StreamEvent;
use crate::error::{CocoError, Result};
use crate::notify::{default_translate, keys, LogNotifier, Notifier, Translate};
use crate::reducer::{Phase, Reducer};
use crate::state::{AssistantMessage, ChatMessage, ChatRole};

struct InFlight {
    question: String,
    reducer: Reducer,
}

/// One chat conversation: finalized history plus at most one reply in flight.
///
/// The session is the single writer of its history. A reply is appended,
/// together with the question that produced it, only when it is finalized;
/// an aborted reply leaves no trace.
pub struct ChatSession {
    history: Vec<ChatMessage>,
    in_flight: Option<InFlight>,
    phase: Phase,
    notifier: Arc<dyn Notifier>,
    translate: Translate,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self::with_hooks(Arc::new(LogNotifier), default_translate())
    }

    pub fn with_hooks(notifier: Arc<dyn Notifier>, translate: Translate) -> Self {
        Self {
            history: Vec::new(),
            in_flight: None,
            phase: Phase::Idle,
            notifier,
            translate,
        }
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn phase(&self) -> Phase {
        match &self.in_flight {
            Some(in_flight) => in_flight.reducer.phase(),
            None => self.phase,
        }
    }

    /// The reply currently being streamed, if any
    pub fn current(&self) -> Option<&AssistantMessage> {
        self.in_flight.as_ref().map(|f| f.reducer.message())
    }

    pub fn is_streaming(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Start a reply for `question`. A reply still in flight is aborted first.
    pub fn submit(&mut self, question: &str) {
        if self.discard().is_some() {
            debug!("superseded an in-flight reply");
        }
        self.in_flight = Some(InFlight {
            question: question.to_string(),
            reducer: Reducer::new(),
        });
        self.phase = Phase::Idle;
    }

    /// Fold one stream event into the reply in flight.
    pub fn apply(&mut self, event: StreamEvent) -> Result<Phase> {
        let in_flight = self
            .in_flight
            .as_mut()
            .ok_or_else(|| CocoError::InvalidState("no reply in flight".to_string()))?;

        let phase = match event {
            StreamEvent::Chunk(chunk) => in_flight.reducer.apply(&chunk)?,
            StreamEvent::Record(record) => in_flight.reducer.apply_record(&record)?,
            StreamEvent::Ack => in_flight.reducer.phase(),
        };

        if phase == Phase::Finalized {
            self.seal();
        }
        Ok(phase)
    }

    /// End of stream: seal the reply in flight and append it to history.
    pub fn finish(&mut self) -> Result<&ChatMessage> {
        let in_flight = self
            .in_flight
            .as_mut()
            .ok_or_else(|| CocoError::InvalidState("no reply in flight".to_string()))?;
        in_flight.reducer.finish();
        self.seal();
        self.last_reply()
    }

    /// Transport failure: seal the reply as failed. Its visible content is
    /// the timeout notice, not the partial text.
    pub fn fail(&mut self, error: &CocoError) -> Result<&ChatMessage> {
        let in_flight = self
            .in_flight
            .as_mut()
            .ok_or_else(|| CocoError::InvalidState("no reply in flight".to_string()))?;
        in_flight.reducer.fail();
        debug!(error = %error, "reply stream failed");
        self.notifier.error(&(self.translate)(keys::TIMED_OUT));
        self.seal();
        self.last_reply()
    }

    /// Drop the reply in flight without recording it. Returns whether there
    /// was one.
    pub fn abort(&mut self) -> bool {
        match self.discard() {
            Some(question) => {
                info!(question = %question, "reply aborted");
                self.notifier.info(&(self.translate)(keys::ABORTED));
                true
            }
            None => false,
        }
    }

    /// The most recent question in history, for a manual resend
    pub fn last_question(&self) -> Option<&str> {
        self.history
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::User)
            .map(|m| m.content.as_str())
    }

    /// Re-submit the most recent question, starting a fresh reply.
    pub fn resend(&mut self) -> Option<String> {
        let question = self.last_question()?.to_string();
        self.submit(&question);
        Some(question)
    }

    /// The visible text of a reply, or the timeout notice if it failed
    pub fn display_text(&self, message: &AssistantMessage) -> String {
        if message.failed {
            (self.translate)(keys::TIMED_OUT)
        } else {
            message.response.clone()
        }
    }

    fn discard(&mut self) -> Option<String> {
        let mut in_flight = self.in_flight.take()?;
        in_flight.reducer.abort();
        self.phase = Phase::Idle;
        Some(in_flight.question)
    }

    fn seal(&mut self) {
        let Some(in_flight) = self.in_flight.take() else {
            return;
        };
        let message = in_flight.reducer.into_message();
        let content = self.display_text(&message);
        self.history.push(ChatMessage::user(&in_flight.question));
        self.history.push(ChatMessage::assistant(content, message));
        self.phase = Phase::Finalized;
    }

    fn last_reply(&self) -> Result<&ChatMessage> {
        self.history
            .last()
            .ok_or_else(|| CocoError::InvalidState("history is empty".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{ChunkKind, StreamChunk};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        infos: Mutex<Vec<String>>,
        errors: Mutex<Vec<String>>,
    }

    impl Notifier for RecordingNotifier {
        fn info(&self, message: &str) {
            self.infos.lock().unwrap().push(message.to_string());
        }

        fn error(&self, message: &str) {
            self.errors.lock().unwrap().push(message.to_string());
        }
    }

    fn chunk(kind: ChunkKind, text: &str) -> StreamEvent {
        StreamEvent::Chunk(StreamChunk::new(kind, text))
    }

    #[test]
    fn test_abort_leaves_history_untouched() {
        let notifier = Arc::new(RecordingNotifier::default());
        let translate: Translate = Arc::new(|key: &str| format!("t:{key}"));
        let mut session = ChatSession::with_hooks(notifier.clone(), translate);
        session.submit("What is Coco?");
        session.apply(chunk(ChunkKind::Response, "Coco ")).unwrap();
        session.apply(chunk(ChunkKind::Response, "AI")).unwrap();
        assert_eq!(session.phase(), Phase::Streaming);

        assert!(session.abort());
        assert!(session.history().is_empty());
        assert_eq!(session.phase(), Phase::Idle);
        assert!(session.current().is_none());
        assert_eq!(*notifier.infos.lock().unwrap(), vec!["t:assistant.chat.aborted".to_string()]);

        assert!(!session.abort());
        assert_eq!(notifier.infos.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_finish_appends_question_and_reply() {
        let mut session = ChatSession::new();
        session.submit("What is Coco?");
        assert_eq!(session.phase(), Phase::Idle);
        assert!(session.current().unwrap().is_typing);

        session.apply(chunk(ChunkKind::Think, "Anal")).unwrap();
        session.apply(chunk(ChunkKind::Think, "yzing")).unwrap();
        session.apply(chunk(ChunkKind::Response, "Coco AI is...")).unwrap();
        assert!(session.current().unwrap().is_typing);

        let reply = session.finish().unwrap();
        assert_eq!(reply.role, ChatRole::Assistant);
        assert_eq!(reply.content, "Coco AI is...");
        let details = reply.details.as_ref().unwrap();
        assert_eq!(details.think, "Analyzing");
        assert!(!details.is_typing);

        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history()[0], ChatMessage::user("What is Coco?"));
        assert_eq!(session.phase(), Phase::Finalized);
        assert!(!session.is_streaming());
    }

    #[test]
    fn test_reply_end_seals_through_apply() {
        let mut session = ChatSession::new();
        session.submit("q");
        session.apply(chunk(ChunkKind::Response, "a")).unwrap();
        let phase = session
            .apply(chunk(ChunkKind::ReplyEnd, "Processing completed"))
            .unwrap();
        assert_eq!(phase, Phase::Finalized);
        assert_eq!(session.history().len(), 2);

        let err = session.apply(chunk(ChunkKind::Response, "late")).unwrap_err();
        assert!(matches!(err, CocoError::InvalidState(_)));
    }

    #[test]
    fn test_fail_shows_timeout_notice() {
        let notifier = Arc::new(RecordingNotifier::default());
        let mut session = ChatSession::with_hooks(notifier.clone(), default_translate());
        session.submit("q");
        session.apply(chunk(ChunkKind::Response, "partial")).unwrap();

        let reply = session.fail(&CocoError::Timeout(std::time::Duration::from_secs(5))).unwrap();
        assert_eq!(reply.content, "Response timed out. Please try again.");
        let details = reply.details.as_ref().unwrap();
        assert!(details.failed);
        assert_eq!(details.response, "partial");

        assert_eq!(notifier.errors.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_record_overrides_response_text() {
        let mut session = ChatSession::new();
        session.submit("q");
        session.apply(chunk(ChunkKind::Response, "Coco AI i")).unwrap();
        let record = StreamEvent::from_value(json!({
            "_id": "m9",
            "_source": {"type": "assistant", "message": "Coco AI is a search assistant."}
        }))
        .unwrap();
        session.apply(record).unwrap();
        session.apply(StreamEvent::Ack).unwrap();

        let current = session.current().unwrap();
        assert_eq!(current.response, "Coco AI is a search assistant.");
        assert_eq!(current.message_id.as_deref(), Some("m9"));
    }

    #[test]
    fn test_record_first_starts_streaming() {
        let mut session = ChatSession::new();
        session.submit("q");
        assert_eq!(session.phase(), Phase::Idle);

        let record = StreamEvent::from_value(json!({
            "_id": "m3",
            "_source": {"type": "assistant", "message": "Stored answer."}
        }))
        .unwrap();
        assert_eq!(session.apply(record).unwrap(), Phase::Streaming);
        assert_eq!(session.phase(), Phase::Streaming);
        assert_eq!(session.current().unwrap().response, "Stored answer.");
    }

    #[test]
    fn test_submit_supersedes_and_resend() {
        let mut session = ChatSession::new();
        session.submit("first");
        session.apply(chunk(ChunkKind::Response, "stale")).unwrap();
        session.submit("second");
        assert_eq!(session.current().unwrap().response, "");
        session.apply(chunk(ChunkKind::Response, "answer")).unwrap();
        session.finish().unwrap();

        assert_eq!(session.history().len(), 2);
        assert_eq!(session.last_question(), Some("second"));

        assert_eq!(session.resend().as_deref(), Some("second"));
        assert!(session.is_streaming());
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(session.history().len(), 2);
    }

    #[test]
    fn test_apply_without_question_is_rejected() {
        let mut session = ChatSession::new();
        let err = session.apply(chunk(ChunkKind::Response, "x")).unwrap_err();
        assert!(matches!(err, CocoError::InvalidState(_)));
        assert!(session.finish().is_err());
    }
}
