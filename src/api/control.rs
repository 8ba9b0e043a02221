//! Request/response calls that sit beside the stream: content recovery,
//! server-side cancellation and read-only lookups.

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::{
    CancelRequest, CancelResponse, DirectChatSupport, RecoveredContent, SearchEnginesResponse,
    TransportError,
};
use crate::utils::auth::add_auth_headers;
use crate::utils::url::construct_api_url;

pub const CANCEL_ENDPOINT: &str = "chat/cancel";
pub const SEARCH_ENGINES_ENDPOINT: &str = "chat/search-engines";

pub fn streaming_content_endpoint(subtask_id: i64) -> String {
    format!("chat/streaming-content/{subtask_id}")
}

pub fn direct_chat_endpoint(team_id: i64) -> String {
    format!("chat/check-direct-chat/{team_id}")
}

/// Best currently-available transcript of a subtask, from the fast cache or
/// the durable fallback.
pub async fn fetch_streaming_content(
    client: &reqwest::Client,
    base_url: &str,
    token: Option<&str>,
    subtask_id: i64,
) -> Result<RecoveredContent, TransportError> {
    let url = construct_api_url(base_url, &streaming_content_endpoint(subtask_id));
    let response = add_auth_headers(client.get(url), token).send().await?;
    json_response(response, "streaming content").await
}

/// Ask the backend to stop producing for `subtask_id`, optionally saving the
/// partial answer the client already shows.
pub async fn cancel_subtask(
    client: &reqwest::Client,
    base_url: &str,
    token: Option<&str>,
    subtask_id: i64,
    partial_content: Option<String>,
) -> Result<CancelResponse, TransportError> {
    let url = construct_api_url(base_url, CANCEL_ENDPOINT);
    let body = CancelRequest {
        subtask_id,
        partial_content,
    };
    debug!(subtask_id, has_partial = body.partial_content.is_some(), "sending cancel request");
    let response = add_auth_headers(client.post(url), token)
        .json(&body)
        .send()
        .await?;
    json_response(response, "cancel").await
}

pub async fn fetch_search_engines(
    client: &reqwest::Client,
    base_url: &str,
    token: Option<&str>,
) -> Result<SearchEnginesResponse, TransportError> {
    let url = construct_api_url(base_url, SEARCH_ENGINES_ENDPOINT);
    let response = add_auth_headers(client.get(url), token).send().await?;
    json_response(response, "search engines").await
}

pub async fn check_direct_chat(
    client: &reqwest::Client,
    base_url: &str,
    token: Option<&str>,
    team_id: i64,
) -> Result<DirectChatSupport, TransportError> {
    let url = construct_api_url(base_url, &direct_chat_endpoint(team_id));
    let response = add_auth_headers(client.get(url), token).send().await?;
    json_response(response, "direct chat check").await
}

async fn json_response<T: DeserializeOwned>(
    response: reqwest::Response,
    context: &'static str,
) -> Result<T, TransportError> {
    if !response.status().is_success() {
        return Err(TransportError::from_response(response).await);
    }

    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|source| TransportError::Decode { context, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_embed_identifiers() {
        assert_eq!(
            streaming_content_endpoint(100),
            "chat/streaming-content/100"
        );
        assert_eq!(direct_chat_endpoint(7), "chat/check-direct-chat/7");
    }
}
