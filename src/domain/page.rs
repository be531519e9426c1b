#[derive(Debug, Clone, PartialEq)]
pub struct PageResponse {
    /// URL the response came from, after redirects.
    pub url: String,
    /// URL that was asked for. Retries go back to this one.
    pub request_url: String,
    pub body: String,
}

impl PageResponse {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        let url = url.into();
        PageResponse {
            request_url: url.clone(),
            url,
            body: body.into(),
        }
    }

    pub fn with_request_url(mut self, request_url: impl Into<String>) -> Self {
        self.request_url = request_url.into();
        self
    }
}
