use chrono::{DateTime, Utc};
use reqwest::{header::HeaderMap, Method, StatusCode};
use std::time::Duration;

use crate::config::{seconds, RetryConfig};

/// Decides whether a failed attempt is retried and how long to wait before the next one.
///
/// The policy knows nothing about the transport. The client asks it after every attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_factor: Duration,
    pub backoff_max: Duration,
    pub statuses: Vec<StatusCode>,
    pub methods: Vec<Method>,
    pub retry_transport_errors: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.total,
            backoff_factor: seconds(config.backoff_factor),
            backoff_max: seconds(config.backoff_max),
            statuses: config
                .statuses
                .iter()
                .filter_map(|s| StatusCode::from_u16(*s).ok())
                .collect(),
            methods: vec![Method::GET, Method::HEAD, Method::OPTIONS],
            retry_transport_errors: true,
        }
    }

    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn is_idempotent(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }

    pub fn is_retryable_status(&self, method: &Method, status: StatusCode) -> bool {
        self.is_idempotent(method) && self.statuses.contains(&status)
    }

    /// `retries` is the number of retries already performed.
    pub fn should_retry_status(&self, method: &Method, status: StatusCode, retries: u32) -> bool {
        retries < self.max_retries && self.is_retryable_status(method, status)
    }

    pub fn should_retry_transport(&self, method: &Method, retries: u32) -> bool {
        retries < self.max_retries && self.retry_transport_errors && self.is_idempotent(method)
    }

    /// Sleep before retry number `retry` (1-based): `factor * 2^(retry - 1)`, capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(31);
        let delay = self.backoff_factor.saturating_mul(1u32 << exp);
        delay.min(self.backoff_max)
    }

    /// Backoff for a retried response. `Retry-After` (seconds or an HTTP date)
    /// replaces the computed delay on 413, 429 and 503 only.
    pub fn backoff_for_response(&self, retry: u32, status: StatusCode, headers: &HeaderMap) -> Duration {
        let honors_header = matches!(
            status,
            StatusCode::PAYLOAD_TOO_LARGE
                | StatusCode::TOO_MANY_REQUESTS
                | StatusCode::SERVICE_UNAVAILABLE
        );
        match retry_after(headers).filter(|_| honors_header) {
            Some(delay) => delay.min(self.backoff_max),
            None => self.backoff(retry),
        }
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(reqwest::header::RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let wait = date.with_timezone(&Utc) - Utc::now();
    Some(wait.to_std().unwrap_or(Duration::ZERO))
}
