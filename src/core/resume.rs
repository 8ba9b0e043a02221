//! Re-attach to a stream that was started earlier.
//!
//! The caller supplies the number of characters it already rendered; the
//! backend replays only what follows that cursor (cached content first,
//! flagged `cached`, then live output). Retrying with the same offset replays
//! the same delta again, so appending must be done through a
//! [`Transcript`](crate::core::transcript::Transcript) or equivalent.

use crate::api::{StreamRequest, TransportError};
use crate::core::cancellation::StreamCancel;
use crate::core::chat_stream::{open_stream, StreamHandle, StreamParams, StreamSink};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResumeParams {
    pub subtask_id: i64,
    /// Characters already rendered. `0` replays everything cached.
    pub offset: u64,
    pub team_id: i64,
}

impl ResumeParams {
    pub fn to_request(&self) -> StreamRequest {
        StreamRequest {
            message: String::new(),
            team_id: self.team_id,
            subtask_id: Some(self.subtask_id),
            offset: Some(self.offset),
            ..StreamRequest::default()
        }
    }
}

pub struct ResumeConnection {
    pub client: reqwest::Client,
    pub base_url: String,
    pub token: Option<String>,
    pub cancel: StreamCancel,
}

pub async fn resume_stream<S: StreamSink>(
    connection: ResumeConnection,
    params: &ResumeParams,
    sink: S,
) -> Result<StreamHandle, TransportError> {
    let ResumeConnection {
        client,
        base_url,
        token,
        cancel,
    } = connection;

    open_stream(
        StreamParams {
            client,
            base_url,
            token,
            request: params.to_request(),
            cancel,
        },
        sink,
    )
    .await
}

/// Re-subscribe by subtask id alone.
///
/// Always replays from offset 0, so everything the caller already rendered
/// arrives again.
#[deprecated(note = "replays the whole answer; use resume_stream with the rendered offset")]
pub async fn resubscribe<S: StreamSink>(
    connection: ResumeConnection,
    subtask_id: i64,
    team_id: i64,
    sink: S,
) -> Result<StreamHandle, TransportError> {
    let params = ResumeParams {
        subtask_id,
        offset: 0,
        team_id,
    };
    resume_stream(connection, &params, sink).await
}
