//! Pulls a streamed reply body through the NDJSON reader into a session.

use std::future::Future;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::chunk::StreamEvent;
use crate::error::{CocoError, Result};
use crate::ndjson::NdjsonReader;
use crate::reducer::Phase;
use crate::session::ChatSession;
use crate::state::AssistantMessage;

/// How a reply stream ended
#[derive(Debug)]
pub enum StreamOutcome {
    /// Server signaled the end or the body ended; the reply is in history.
    Completed,
    /// Transport error or idle timeout; a failed reply is in history.
    Failed(CocoError),
    /// Cancelled by the caller; nothing was recorded.
    Aborted,
}

#[derive(Debug, Clone, Default)]
pub struct DriveOptions {
    /// Longest wait for the next body chunk before treating the stream as failed
    pub idle_timeout: Option<Duration>,
}

/// Drive `body` into the reply currently in flight on `session`.
///
/// `on_update` sees the reply after every applied event. Cancelling `cancel`
/// stops reading immediately and aborts the reply. Only misuse (no reply in
/// flight) is returned as an error; transport problems end up in
/// [`StreamOutcome::Failed`].
pub async fn drive<S, B, E, F>(
    session: &mut ChatSession,
    body: S,
    cancel: &CancellationToken,
    options: &DriveOptions,
    mut on_update: F,
) -> Result<StreamOutcome>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<CocoError>,
    F: FnMut(&AssistantMessage),
{
    if !session.is_streaming() {
        return Err(CocoError::InvalidState("no reply in flight".to_string()));
    }

    let mut body = std::pin::pin!(body);
    let mut reader = NdjsonReader::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                session.abort();
                return Ok(StreamOutcome::Aborted);
            }
            next = next_chunk(&mut body, options.idle_timeout) => next,
        };

        let bytes = match next {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                if let Some(tail) = reader.finish() {
                    debug!(tail = %tail, "dropping unterminated final line");
                }
                session.finish()?;
                return Ok(StreamOutcome::Completed);
            }
            Err(err) => {
                warn!(error = %err, "reply stream failed");
                session.fail(&err)?;
                return Ok(StreamOutcome::Failed(err));
            }
        };

        for value in reader.push_bytes(bytes.as_ref()) {
            if cancel.is_cancelled() {
                session.abort();
                return Ok(StreamOutcome::Aborted);
            }
            let event = match StreamEvent::from_value(value) {
                Ok(event) => event,
                Err(err) => {
                    warn!(error = %err, "ignoring unrecognised stream event");
                    continue;
                }
            };
            if session.apply(event)? == Phase::Finalized {
                return Ok(StreamOutcome::Completed);
            }
            if let Some(message) = session.current() {
                on_update(message);
            }
        }
    }
}

/// Race a request (such as [`crate::CocoClient::ask`]) against `cancel` and an
/// optional deadline. `None` means the caller cancelled first.
pub async fn cancellable<T, F>(
    request: F,
    cancel: &CancellationToken,
    limit: Option<Duration>,
) -> Option<Result<T>>
where
    F: Future<Output = Result<T>>,
{
    let request = async {
        match limit {
            Some(limit) => tokio::time::timeout(limit, request)
                .await
                .unwrap_or(Err(CocoError::Timeout(limit))),
            None => request.await,
        }
    };
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        result = request => Some(result),
    }
}

async fn next_chunk<S, B, E>(body: &mut S, idle_timeout: Option<Duration>) -> Result<Option<B>>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    E: Into<CocoError>,
{
    let next = match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, body.next())
            .await
            .map_err(|_| CocoError::Timeout(limit))?,
        None => body.next().await,
    };
    next.transpose().map_err(Into::into)
}
