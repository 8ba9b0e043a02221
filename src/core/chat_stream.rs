//! Streaming session: one POST to the stream endpoint, decoded incrementally.
//!
//! [`open_stream`] resolves as soon as response headers arrive. Body
//! consumption continues on a detached task that owns the decode buffer and
//! the sink; the caller keeps only the [`StreamCancel`] trigger.

use std::fmt;

use futures_util::{Stream, StreamExt};
use reqwest::header::HeaderMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::api::{StreamEvent, StreamRequest, TransportError, SUBTASK_ID_HEADER, TASK_ID_HEADER};
use crate::core::cancellation::StreamCancel;
use crate::core::event_parser::EventLineParser;
use crate::utils::url::construct_api_url;

pub const STREAM_ENDPOINT: &str = "chat/stream";

/// Failures reported through [`StreamSink::on_error`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamFailure {
    /// The producer reported an error inside an otherwise valid event.
    /// The session keeps reading.
    Embedded(String),
    /// Reading the body failed for a reason other than local cancellation.
    /// The session ends.
    Network(String),
}

impl fmt::Display for StreamFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamFailure::Embedded(message) => write!(f, "{message}"),
            StreamFailure::Network(message) => write!(f, "Stream interrupted: {message}"),
        }
    }
}

/// How a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    /// A `done` event was received.
    Completed,
    /// An error was reported and no `done` event followed.
    Errored,
    /// The local cancel trigger fired.
    Cancelled,
    /// The body closed without `done` or any error.
    Ended,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    AwaitingHeaders,
    IdentifiersKnown,
    Streaming,
    Finished(SessionOutcome),
}

/// Receiver of session progress. Calls arrive in wire order on the
/// session's task.
pub trait StreamSink: Send + 'static {
    fn on_message(&mut self, event: &StreamEvent);

    /// Fired at most once, after the first `done` event has been delivered.
    fn on_complete(&mut self, task_id: Option<i64>, subtask_id: Option<i64>);

    fn on_error(&mut self, failure: StreamFailure);

    /// Final call of every session that got past `open_stream`.
    fn on_finished(&mut self, _outcome: SessionOutcome) {}
}

#[derive(Clone, Debug, PartialEq)]
pub enum StreamMessage {
    Event(StreamEvent),
    Complete {
        task_id: Option<i64>,
        subtask_id: Option<i64>,
    },
    Error(StreamFailure),
    End(SessionOutcome),
}

/// Multiplexes many sessions onto one channel, tagged by stream id.
#[derive(Clone)]
pub struct ChatStreamService {
    tx: mpsc::UnboundedSender<(StreamMessage, u64)>,
}

impl ChatStreamService {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(StreamMessage, u64)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn sink(&self, stream_id: u64) -> ChannelSink {
        ChannelSink {
            tx: self.tx.clone(),
            stream_id,
        }
    }
}

pub struct ChannelSink {
    tx: mpsc::UnboundedSender<(StreamMessage, u64)>,
    stream_id: u64,
}

impl ChannelSink {
    fn send(&self, message: StreamMessage) {
        let _ = self.tx.send((message, self.stream_id));
    }
}

impl StreamSink for ChannelSink {
    fn on_message(&mut self, event: &StreamEvent) {
        self.send(StreamMessage::Event(event.clone()));
    }

    fn on_complete(&mut self, task_id: Option<i64>, subtask_id: Option<i64>) {
        self.send(StreamMessage::Complete {
            task_id,
            subtask_id,
        });
    }

    fn on_error(&mut self, failure: StreamFailure) {
        self.send(StreamMessage::Error(failure));
    }

    fn on_finished(&mut self, outcome: SessionOutcome) {
        self.send(StreamMessage::End(outcome));
    }
}

pub struct StreamParams {
    pub client: reqwest::Client,
    pub base_url: String,
    pub token: Option<String>,
    pub request: StreamRequest,
    pub cancel: StreamCancel,
}

/// What the caller gets back once headers are in.
#[derive(Clone, Debug)]
pub struct StreamHandle {
    /// Provisional task id: the `X-Task-Id` header, else the request's.
    pub task_id: Option<i64>,
    pub subtask_id: Option<i64>,
    cancel: StreamCancel,
}

impl StreamHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Open a streaming session.
///
/// Non-success statuses and send failures are returned here and the sink is
/// never called. Once headers are in, all further progress goes through
/// `sink`.
pub async fn open_stream<S: StreamSink>(
    params: StreamParams,
    sink: S,
) -> Result<StreamHandle, TransportError> {
    let StreamParams {
        client,
        base_url,
        token,
        request,
        cancel,
    } = params;

    let mut session = StreamSession::new(sink, cancel.clone());
    let url = construct_api_url(&base_url, STREAM_ENDPOINT);
    let http_request = crate::utils::auth::add_auth_headers(
        client.post(url).header("Accept", "text/event-stream"),
        token.as_deref(),
    )
    .json(&request);

    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!(subtask_id = ?request.subtask_id, "stream cancelled before headers");
            session.finish(SessionOutcome::Cancelled);
            return Ok(StreamHandle {
                task_id: request.task_id,
                subtask_id: request.subtask_id,
                cancel,
            });
        }
        response = http_request.send() => response?,
    };

    if !response.status().is_success() {
        return Err(TransportError::from_response(response).await);
    }

    session.apply_headers(response.headers(), &request);
    let handle = StreamHandle {
        task_id: session.task_id,
        subtask_id: session.subtask_id,
        cancel,
    };

    tokio::spawn(session.consume(response.bytes_stream()));
    Ok(handle)
}

struct StreamSession<S> {
    parser: EventLineParser,
    task_id: Option<i64>,
    subtask_id: Option<i64>,
    phase: SessionPhase,
    completed: bool,
    errored: bool,
    cancel: StreamCancel,
    sink: S,
}

impl<S: StreamSink> StreamSession<S> {
    fn new(sink: S, cancel: StreamCancel) -> Self {
        Self {
            parser: EventLineParser::new(),
            task_id: None,
            subtask_id: None,
            phase: SessionPhase::AwaitingHeaders,
            completed: false,
            errored: false,
            cancel,
            sink,
        }
    }

    /// Record provisional ids and, when the caller did not already know the
    /// task, announce them with a single bookkeeping event.
    fn apply_headers(&mut self, headers: &HeaderMap, request: &StreamRequest) {
        if self.phase != SessionPhase::AwaitingHeaders {
            return;
        }

        let header_task = header_id(headers, TASK_ID_HEADER);
        let header_subtask = header_id(headers, SUBTASK_ID_HEADER);
        debug!(task_id = ?header_task, subtask_id = ?header_subtask, "stream headers received");

        self.task_id = header_task.or(request.task_id);
        self.subtask_id = header_subtask.or(request.subtask_id);
        self.phase = SessionPhase::IdentifiersKnown;

        if header_task.is_some() && request.task_id.is_none() {
            let event = StreamEvent::bookkeeping(self.task_id, self.subtask_id);
            self.sink.on_message(&event);
        }
    }

    async fn consume<B, T, E>(mut self, mut body: B)
    where
        B: Stream<Item = Result<T, E>> + Unpin,
        T: AsRef<[u8]>,
        E: fmt::Display,
    {
        self.phase = SessionPhase::Streaming;

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.finish(SessionOutcome::Cancelled);
                    return;
                }
                next = body.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    let mut parser = std::mem::take(&mut self.parser);
                    for event in parser.feed(chunk.as_ref()) {
                        if self.cancel.is_cancelled() {
                            self.finish(SessionOutcome::Cancelled);
                            return;
                        }
                        self.dispatch(event);
                    }
                    self.parser = parser;
                }
                Some(Err(err)) => {
                    if self.cancel.is_cancelled() {
                        self.finish(SessionOutcome::Cancelled);
                    } else {
                        warn!(error = %err, subtask_id = ?self.subtask_id, "stream read failed");
                        self.sink.on_error(StreamFailure::Network(err.to_string()));
                        self.finish(SessionOutcome::Errored);
                    }
                    return;
                }
                None => break,
            }
        }

        let mut parser = std::mem::take(&mut self.parser);
        for event in parser.finish() {
            self.dispatch(event);
        }

        let outcome = if self.completed {
            SessionOutcome::Completed
        } else if self.errored {
            SessionOutcome::Errored
        } else {
            SessionOutcome::Ended
        };
        self.finish(outcome);
    }

    fn dispatch(&mut self, event: StreamEvent) {
        if let Some(task_id) = event.task_id {
            self.task_id = Some(task_id);
        }
        if let Some(subtask_id) = event.subtask_id {
            self.subtask_id = Some(subtask_id);
        }

        self.sink.on_message(&event);

        if event.done && !self.completed {
            self.completed = true;
            self.sink.on_complete(self.task_id, self.subtask_id);
        }

        if let Some(message) = event.error {
            self.errored = true;
            self.sink.on_error(StreamFailure::Embedded(message));
        }
    }

    fn finish(&mut self, outcome: SessionOutcome) {
        if matches!(self.phase, SessionPhase::Finished(_)) {
            return;
        }
        if outcome == SessionOutcome::Cancelled {
            debug!(subtask_id = ?self.subtask_id, "stream cancelled locally");
        }
        self.phase = SessionPhase::Finished(outcome);
        self.sink.on_finished(outcome);
    }
}

fn header_id(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}
