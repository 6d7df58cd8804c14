//! Endpoint URL construction shared by the gateway variants.

/// Strips trailing slashes so a configured base URL joins cleanly.
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Joins a base URL and an endpoint path without producing double slashes.
///
/// # Examples
///
/// ```
/// use miaoge::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("https://api.fireworks.ai/inference/v1", "chat/completions"),
///     "https://api.fireworks.ai/inference/v1/chat/completions"
/// );
/// assert_eq!(
///     construct_api_url("https://generativelanguage.googleapis.com/v1beta/", "/models"),
///     "https://generativelanguage.googleapis.com/v1beta/models"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        normalize_base_url(base_url),
        endpoint.trim_start_matches('/')
    )
}
