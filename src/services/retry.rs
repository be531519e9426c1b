use std::time::Duration;

use crate::configuration::RetrySettings;

/// One scheduled fetch of a URL. `attempt` is zero for the first fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub url: String,
    pub attempt: u32,
    pub delay: Duration,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        FetchRequest {
            url: url.into(),
            attempt: 0,
            delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: Duration,
}

impl RetryPolicy {
    pub fn new(settings: &RetrySettings) -> Self {
        RetryPolicy {
            max_retries: settings.max_retries,
            backoff: Duration::from_millis(settings.backoff_ms),
        }
    }

    /// Builds the follow-up request for `request`, or `None` once it has
    /// already been retried `max_retries` times.
    pub fn retry(&self, request: &FetchRequest, reason: &str) -> Option<FetchRequest> {
        let failures = request.attempt + 1;

        match failures <= self.max_retries {
            true => {
                log::info!(
                    "Retrying {} (failed {} times): {}",
                    request.url,
                    failures,
                    reason
                );
                Some(FetchRequest {
                    url: request.url.clone(),
                    attempt: failures,
                    delay: self.backoff,
                })
            }
            false => {
                log::error!(
                    "Gave up retrying {} (failed {} times): {}",
                    request.url,
                    failures,
                    reason
                );
                None
            }
        }
    }
}
