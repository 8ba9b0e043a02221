//! Wire payloads exchanged with the chat backend.
//!
//! Request bodies serialize with absent optionals omitted; response bodies
//! tolerate missing booleans so that replayed, bookkeeping and terminal
//! events all decode into the same [`StreamEvent`] shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod control;
pub mod error;

pub use error::TransportError;

pub const TASK_ID_HEADER: &str = "x-task-id";
pub const SUBTASK_ID_HEADER: &str = "x-subtask-id";

/// Body of `POST chat/stream`, used both for fresh messages and for resumes.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct StreamRequest {
    pub message: String,
    /// Conversation group (team) the chat belongs to.
    pub team_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<i64>,
    /// Present only when resuming an existing stream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtask_id: Option<i64>,
    /// Character cursor; only meaningful together with `subtask_id`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(flatten)]
    pub options: StreamOptions,
}

/// Per-message feature toggles.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct StreamOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub force_override_bot_model: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_id: Option<i64>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub enable_web_search: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_engine: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub enable_clarification: bool,
    #[serde(flatten)]
    pub git: GitContext,
}

/// Source-control context recorded alongside a message.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct GitContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_repo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_repo_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// One decoded `data:` line of the stream.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct StreamEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtask_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(default)]
    pub cached: bool,
    #[serde(default)]
    pub cancelled: bool,
}

impl StreamEvent {
    /// Synthetic event announcing identifiers discovered in response headers.
    pub fn bookkeeping(task_id: Option<i64>, subtask_id: Option<i64>) -> Self {
        Self {
            content: Some(String::new()),
            task_id,
            subtask_id,
            ..Self::default()
        }
    }

    pub fn content_str(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// Where recovered content was read from.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentSource {
    /// Fast cache, refreshed while the producer is streaming.
    Redis,
    /// Durable fallback, refreshed less often.
    Database,
    #[serde(untagged)]
    Other(String),
}

impl ContentSource {
    pub fn as_str(&self) -> &str {
        match self {
            ContentSource::Redis => "redis",
            ContentSource::Database => "database",
            ContentSource::Other(name) => name,
        }
    }
}

/// Response of `GET chat/streaming-content/{subtask_id}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RecoveredContent {
    #[serde(default)]
    pub content: String,
    pub source: ContentSource,
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub status: String,
    /// The producer disconnected before the answer was finished.
    #[serde(default)]
    pub incomplete: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CancelRequest {
    pub subtask_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_content: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CancelResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SearchEngine {
    pub name: String,
    pub display_name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchEnginesResponse {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub engines: Vec<SearchEngine>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DirectChatSupport {
    pub supports_direct_chat: bool,
    #[serde(default)]
    pub shell_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stream_request_omits_unset_fields() {
        let request = StreamRequest {
            message: "hi".to_string(),
            team_id: 7,
            ..StreamRequest::default()
        };

        let value = serde_json::to_value(&request).expect("request should serialize");
        assert_eq!(value, json!({"message": "hi", "team_id": 7}));
    }

    #[test]
    fn stream_request_flattens_options_and_git_context() {
        let request = StreamRequest {
            message: String::new(),
            team_id: 3,
            subtask_id: Some(100),
            offset: Some(0),
            options: StreamOptions {
                enable_web_search: true,
                search_engine: Some("bing".to_string()),
                git: GitContext {
                    branch_name: Some("main".to_string()),
                    ..GitContext::default()
                },
                ..StreamOptions::default()
            },
            ..StreamRequest::default()
        };

        let value = serde_json::to_value(&request).expect("request should serialize");
        assert_eq!(
            value,
            json!({
                "message": "",
                "team_id": 3,
                "subtask_id": 100,
                "offset": 0,
                "enable_web_search": true,
                "search_engine": "bing",
                "branch_name": "main"
            })
        );
    }

    #[test]
    fn stream_event_defaults_missing_flags() {
        let event: StreamEvent =
            serde_json::from_str(r#"{"content":"He"}"#).expect("event should decode");
        assert_eq!(event.content_str(), "He");
        assert!(!event.done);
        assert!(!event.cached);
        assert!(!event.cancelled);
        assert_eq!(event.offset, None);
    }

    #[test]
    fn recovered_content_keeps_unknown_sources() {
        let recovered: RecoveredContent = serde_json::from_value(json!({
            "content": "partial",
            "source": "memory",
            "streaming": false,
            "status": "RUNNING",
            "incomplete": true
        }))
        .expect("recovered content should decode");

        assert_eq!(recovered.source, ContentSource::Other("memory".to_string()));
        assert!(recovered.incomplete);

        let cached: RecoveredContent = serde_json::from_value(json!({
            "content": "abc",
            "source": "redis",
            "streaming": true,
            "status": "RUNNING",
            "incomplete": false
        }))
        .expect("recovered content should decode");
        assert_eq!(cached.source, ContentSource::Redis);
    }
}
