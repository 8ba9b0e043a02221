use crate::api::control;
use crate::api::{
    CancelResponse, DirectChatSupport, RecoveredContent, SearchEnginesResponse, StreamRequest,
    TransportError,
};
use crate::core::cancellation::StreamCancel;
use crate::core::chat_stream::{open_stream, StreamHandle, StreamParams, StreamSink};
use crate::core::config::ConnectionSettings;
use crate::core::resume::{resume_stream, ResumeConnection, ResumeParams};
use crate::utils::url::normalize_base_url;

/// Shared connection details for every call against one backend.
#[derive(Clone, Debug)]
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ChatClient {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self::with_http_client(reqwest::Client::new(), base_url, token)
    }

    pub fn with_http_client(http: reqwest::Client, base_url: &str, token: Option<String>) -> Self {
        Self {
            http,
            base_url: normalize_base_url(base_url),
            token,
        }
    }

    pub fn from_settings(settings: &ConnectionSettings) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = settings.timeout {
            builder = builder.connect_timeout(timeout);
        }
        Ok(Self::with_http_client(
            builder.build()?,
            &settings.base_url,
            settings.token.clone(),
        ))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Open a stream with a fresh cancel trigger, returned on the handle.
    pub async fn stream<S: StreamSink>(
        &self,
        request: StreamRequest,
        sink: S,
    ) -> Result<StreamHandle, TransportError> {
        self.stream_with_cancel(request, StreamCancel::new(), sink)
            .await
    }

    /// Open a stream the caller can already abort while headers are pending.
    pub async fn stream_with_cancel<S: StreamSink>(
        &self,
        request: StreamRequest,
        cancel: StreamCancel,
        sink: S,
    ) -> Result<StreamHandle, TransportError> {
        open_stream(
            StreamParams {
                client: self.http.clone(),
                base_url: self.base_url.clone(),
                token: self.token.clone(),
                request,
                cancel,
            },
            sink,
        )
        .await
    }

    pub async fn resume<S: StreamSink>(
        &self,
        params: &ResumeParams,
        sink: S,
    ) -> Result<StreamHandle, TransportError> {
        self.resume_with_cancel(params, StreamCancel::new(), sink)
            .await
    }

    pub async fn resume_with_cancel<S: StreamSink>(
        &self,
        params: &ResumeParams,
        cancel: StreamCancel,
        sink: S,
    ) -> Result<StreamHandle, TransportError> {
        resume_stream(self.resume_connection(cancel), params, sink).await
    }

    #[deprecated(note = "replays the whole answer; use resume with the rendered offset")]
    #[allow(deprecated)]
    pub async fn resubscribe<S: StreamSink>(
        &self,
        subtask_id: i64,
        team_id: i64,
        sink: S,
    ) -> Result<StreamHandle, TransportError> {
        crate::core::resume::resubscribe(
            self.resume_connection(StreamCancel::new()),
            subtask_id,
            team_id,
            sink,
        )
        .await
    }

    pub async fn streaming_content(
        &self,
        subtask_id: i64,
    ) -> Result<RecoveredContent, TransportError> {
        control::fetch_streaming_content(&self.http, &self.base_url, self.token(), subtask_id)
            .await
    }

    pub async fn cancel(
        &self,
        subtask_id: i64,
        partial_content: Option<String>,
    ) -> Result<CancelResponse, TransportError> {
        control::cancel_subtask(
            &self.http,
            &self.base_url,
            self.token(),
            subtask_id,
            partial_content,
        )
        .await
    }

    pub async fn search_engines(&self) -> Result<SearchEnginesResponse, TransportError> {
        control::fetch_search_engines(&self.http, &self.base_url, self.token()).await
    }

    pub async fn check_direct_chat(
        &self,
        team_id: i64,
    ) -> Result<DirectChatSupport, TransportError> {
        control::check_direct_chat(&self.http, &self.base_url, self.token(), team_id).await
    }

    fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn resume_connection(&self, cancel: StreamCancel) -> ResumeConnection {
        ResumeConnection {
            client: self.http.clone(),
            base_url: self.base_url.clone(),
            token: self.token.clone(),
            cancel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_normalizes_base_url() {
        let client = ChatClient::new("http://localhost:8000/api/", None);
        assert_eq!(client.base_url(), "http://localhost:8000/api");
    }

    #[test]
    fn from_settings_applies_token() {
        let settings = ConnectionSettings {
            base_url: "http://localhost:8000/api".to_string(),
            token: Some("t".to_string()),
            timeout: Some(std::time::Duration::from_secs(3)),
        };
        let client = ChatClient::from_settings(&settings).expect("client should build");
        assert_eq!(client.token(), Some("t"));
    }
}
