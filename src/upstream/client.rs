use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::{debug, error, warn};

use super::retry::RetryPolicy;
use super::{MovieApi, UpstreamError, UpstreamResult};
use crate::config::TmdbConfig;

/// TMDB API client. Owns one pooled `reqwest::Client` shared by all requests.
#[derive(Debug, Clone)]
pub struct TmdbClient {
    http_client: Client,
    base_url: String,
    api_token: String,
    policy: RetryPolicy,
}

impl TmdbClient {
    pub fn new(
        config: &TmdbConfig,
        api_token: String,
        policy: RetryPolicy,
    ) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder()
            .user_agent(concat!("marquee/", env!("CARGO_PKG_VERSION")))
            .timeout(crate::config::seconds(config.timeout))
            .build()?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token,
            policy,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> UpstreamResult<Value> {
        let url = self.url(path);
        let method = Method::GET;
        let mut retries = 0u32;

        loop {
            debug!(url = %url, params = ?query, attempt = retries + 1, "TMDB request");

            let result = self
                .http_client
                .request(method.clone(), &url)
                .bearer_auth(&self.api_token)
                .query(query)
                .send()
                .await;

            let response = match result {
                Ok(response) => response,
                Err(e) => {
                    let transient = e.is_connect() || e.is_timeout();
                    if transient && self.policy.should_retry_transport(&method, retries) {
                        retries += 1;
                        let delay = self.policy.backoff(retries);
                        warn!(
                            url = %url,
                            retry = retries,
                            max_retries = self.policy.max_retries,
                            delay_ms = delay.as_millis() as u64,
                            "TMDB request failed ({}), retrying",
                            e
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    let err = classify(&url, &e);
                    error!(url = %url, params = ?query, status = ?e.status().map(|s| s.as_u16()), "TMDB request failed: {}", e);
                    return Err(err);
                }
            };

            let status = response.status();
            if !status.is_success() {
                if self.policy.should_retry_status(&method, status, retries) {
                    retries += 1;
                    let delay = self.policy.backoff_for_response(retries, status, response.headers());
                    warn!(
                        url = %url,
                        status = status.as_u16(),
                        retry = retries,
                        max_retries = self.policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "TMDB returned retryable status, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                if self.policy.is_retryable_status(&method, status) {
                    error!(
                        url = %url,
                        params = ?query,
                        status = status.as_u16(),
                        retries = retries,
                        "TMDB request failed, retries exhausted"
                    );
                    return Err(UpstreamError::Request {
                        message: format!("too many {} responses", status.as_u16()),
                        url,
                    });
                }
                error!(url = %url, params = ?query, status = status.as_u16(), "TMDB request failed");
                return Err(UpstreamError::Http {
                    status: status.as_u16(),
                    url,
                });
            }

            let body = match response.bytes().await {
                Ok(body) => body,
                Err(e) => {
                    error!(url = %url, params = ?query, status = status.as_u16(), "Failed to read TMDB response: {}", e);
                    return Err(classify(&url, &e));
                }
            };

            return serde_json::from_slice(&body).map_err(|e| {
                error!(url = %url, params = ?query, status = status.as_u16(), "Invalid JSON from TMDB: {}", e);
                UpstreamError::Request {
                    url: url.clone(),
                    message: format!("invalid JSON: {}", e),
                }
            });
        }
    }
}

fn classify(url: &str, e: &reqwest::Error) -> UpstreamError {
    let url = url.to_string();
    if e.is_timeout() {
        UpstreamError::Timeout { url }
    } else if e.is_connect() {
        UpstreamError::Connect { url }
    } else if let Some(status) = e.status() {
        UpstreamError::Http {
            status: status.as_u16(),
            url,
        }
    } else {
        UpstreamError::Request {
            url,
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl MovieApi for TmdbClient {
    async fn trending(&self) -> UpstreamResult<Value> {
        self.get_json("/trending/movie/day", &[]).await
    }

    async fn details(&self, movie_id: u64) -> UpstreamResult<Value> {
        self.get_json(&format!("/movie/{}", movie_id), &[]).await
    }

    async fn search(&self, query: &str) -> UpstreamResult<Value> {
        self.get_json("/search/movie", &[("query", query.to_string())])
            .await
    }
}
