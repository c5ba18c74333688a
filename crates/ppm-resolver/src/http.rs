//! A thin `reqwest`-based transport carrying the configured user agent, timeout, and retry
//! budget.
//!
//! Unlike a reference implementation that layers `http_cache_semantics` and an on-disk
//! response cache over every request, this client does not cache HTTP responses at all — the
//! only cache in this crate is the content-addressed artifact cache in [`crate::cache`], which
//! is keyed by filename rather than by request.

use std::time::Duration;

use reqwest::{Client, StatusCode};

use crate::error::NetworkError;

/// A configured HTTP client with a bounded retry policy for transient failures.
#[derive(Debug, Clone)]
pub struct Http {
    client: Client,
    retries: u32,
}

impl Http {
    /// Builds a client carrying `user_agent`, bounded to `timeout` per request, retrying a
    /// transient failure up to `retries` times.
    pub fn new(user_agent: &str, timeout: Duration, retries: u32) -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Http { client, retries })
    }

    /// Fetches `url` and returns its body as text. Non-2xx and transport failures are returned
    /// as `Ok(None)` after retries are exhausted: a listing miss on one index is not fatal (see
    /// §4.2); callers that need a hard failure (artifact download) should use
    /// [`Http::get_bytes_strict`] instead.
    pub async fn get_text(&self, url: &str) -> Option<String> {
        let response = self.execute_with_retry(url).await.ok()?;
        if !response.status().is_success() {
            tracing::debug!(url, status = %response.status(), "listing request missed");
            return None;
        }
        response.text().await.ok()
    }

    /// Fetches `url` and returns its raw bytes, retrying transient failures up to the
    /// configured budget. Returns a [`NetworkError`] once the budget is exhausted or a non-2xx
    /// status is returned: unlike a listing miss, a download failure is fatal.
    pub async fn get_bytes_strict(&self, url: &str) -> Result<Vec<u8>, NetworkError> {
        let response = self
            .execute_with_retry(url)
            .await
            .map_err(|source| NetworkError::RetriesExhausted {
                url: url.to_string(),
                retries: self.retries,
                source,
            })?;
        if !response.status().is_success() {
            return Err(NetworkError::BadStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|source| NetworkError::RetriesExhausted {
                url: url.to_string(),
                retries: self.retries,
                source,
            })
    }

    async fn execute_with_retry(&self, url: &str) -> reqwest::Result<reqwest::Response> {
        let mut attempt = 0;
        loop {
            tracing::info!(url, attempt, "executing request");
            match self.client.get(url).send().await {
                Ok(response) if is_transient(response.status()) && attempt < self.retries => {
                    attempt += 1;
                    tracing::debug!(url, attempt, status = %response.status(), "retrying transient failure");
                    continue;
                }
                Ok(response) => return Ok(response),
                Err(err) if is_retriable_error(&err) && attempt < self.retries => {
                    attempt += 1;
                    tracing::debug!(url, attempt, error = %err, "retrying after transport error");
                    continue;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn is_transient(status: StatusCode) -> bool {
    status.is_server_error()
}

fn is_retriable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}
