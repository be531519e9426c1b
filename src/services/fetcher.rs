use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::{configuration::ApplicationSettings, domain::page::PageResponse};

/// Statuses worth another attempt: timeouts, throttling and gateway trouble.
const RETRY_HTTP_CODES: [u16; 8] = [408, 429, 500, 502, 503, 504, 522, 524];

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{url}: request failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url}: server answered {status}")]
    Status { url: String, status: StatusCode },
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport { .. } => true,
            FetchError::Status { status, .. } => RETRY_HTTP_CODES.contains(&status.as_u16()),
        }
    }

    /// Short label used as the retry reason and in stats.
    pub fn reason(&self) -> String {
        match self {
            FetchError::Transport { source, .. } if source.is_timeout() => "timeout".to_string(),
            FetchError::Transport { .. } => "transport error".to_string(),
            FetchError::Status { status, .. } => status.as_u16().to_string(),
        }
    }
}

pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(settings: &ApplicationSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(&settings.user_agent)
            .timeout(settings.request_timeout())
            .cookie_store(true)
            .build()?;

        Ok(Fetcher { client })
    }

    /// GETs `url` and returns the body along with the final URL after
    /// redirects.
    pub async fn fetch(&self, url: &str) -> Result<PageResponse, FetchError> {
        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };

        let res = self.client.get(url).send().await.map_err(transport)?;

        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let final_url = res.url().to_string();
        let body = res.text().await.map_err(transport)?;
        log::debug!("Fetched {} ({} bytes)", final_url, body.len());

        Ok(PageResponse::new(final_url, body).with_request_url(url))
    }
}
