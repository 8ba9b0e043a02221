//! URL utilities for consistent endpoint construction
//!
//! Base URLs come from flags, environment variables and the config file, so
//! they arrive with and without trailing slashes.

/// Normalize a base URL by removing trailing slashes
///
/// # Examples
///
/// ```
/// use chatrelay::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://localhost:8000/api/"), "http://localhost:8000/api");
/// assert_eq!(normalize_base_url("http://localhost:8000/api///"), "http://localhost:8000/api");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Construct a complete endpoint URL from a base URL and endpoint path
///
/// # Examples
///
/// ```
/// use chatrelay::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("http://localhost:8000/api/", "/chat/stream"),
///     "http://localhost:8000/api/chat/stream"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalized_base, endpoint)
}
