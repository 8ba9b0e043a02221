//! Authentication utilities for API requests
//!
//! Credentials are supplied from outside (flag, environment); this module only
//! attaches them.

/// Attach `Authorization: Bearer <token>` when a non-empty token is present
pub fn add_auth_headers(
    request: reqwest::RequestBuilder,
    token: Option<&str>,
) -> reqwest::RequestBuilder {
    match token.map(str::trim).filter(|token| !token.is_empty()) {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}
