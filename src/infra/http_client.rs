use reqwest::{Client, Response};
use std::time::Duration;

/// Longest slice of a response body carried into error messages.
const BODY_SNIPPET_LEN: usize = 300;

pub fn build_client(user_agent: &str, timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .gzip(true)
        .deflate(true)
        .build()
}

/// Cookie-keeping variant for authenticated sessions.
pub fn build_session_client(user_agent: &str, timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .cookie_store(true)
        .gzip(true)
        .deflate(true)
        .build()
}

/// Consumes a non-success response into `HTTP <status>: <body prefix>`.
pub async fn describe_failure(resp: Response) -> String {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(BODY_SNIPPET_LEN).collect();
    if snippet.trim().is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("HTTP {}: {}", status.as_u16(), snippet.trim())
    }
}
