use serde::Deserialize;
use std::error::Error as StdError;
use std::fmt;

/// Failures of a request/response exchange with the chat backend.
#[derive(Debug)]
pub enum TransportError {
    /// The backend answered with a non-success status.
    Status {
        status: u16,
        /// `detail` from a JSON error body, otherwise the raw body text.
        message: String,
    },
    /// The request could not be sent or the response could not be read.
    Request(reqwest::Error),
    /// A success response carried a body of the wrong shape.
    Decode {
        context: &'static str,
        source: serde_json::Error,
    },
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            TransportError::Request(err) => err.status().map(|status| status.as_u16()),
            TransportError::Decode { .. } => None,
        }
    }

    /// Build a `Status` error by draining the body of a failed response.
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        TransportError::Status {
            status,
            message: extract_error_detail(&body),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Status { status, message } => {
                write!(f, "Request failed with status {status}: {message}")
            }
            TransportError::Request(err) => write!(f, "Request failed: {err}"),
            TransportError::Decode { context, source } => {
                write!(f, "Unexpected {context} response: {source}")
            }
        }
    }
}

impl StdError for TransportError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            TransportError::Status { .. } => None,
            TransportError::Request(err) => Some(err),
            TransportError::Decode { source, .. } => Some(source),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Request(err)
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

/// Pull the human-readable message out of an error body.
///
/// A JSON body with a string `detail` yields that string; anything else,
/// including JSON without `detail`, yields the trimmed body text.
pub fn extract_error_detail(body: &str) -> String {
    let trimmed = body.trim();
    if let Ok(ErrorBody {
        detail: Some(serde_json::Value::String(detail)),
    }) = serde_json::from_str::<ErrorBody>(trimmed)
    {
        return detail;
    }

    trimmed.to_string()
}
