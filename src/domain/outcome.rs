use std::fmt;

use thiserror::Error;

use super::movie::MovieRecord;

/// Result of running the extractor over one fetched page.
#[derive(Debug)]
pub enum Outcome {
    Record(MovieRecord),
    Retry(RetryRequest),
    Failure(ExtractError),
}

/// Ask the scheduler to fetch the same URL again. `url` is the requested
/// URL, not the one a redirect ended on.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryRequest {
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    MissingDataScript,
    MalformedJson,
    MissingField,
    EmptySummaryList,
    Transport,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::MissingDataScript => "missing_data_script",
            ErrorKind::MalformedJson => "malformed_json",
            ErrorKind::MissingField => "missing_field",
            ErrorKind::EmptySummaryList => "empty_summary_list",
            ErrorKind::Transport => "transport",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("{url}: data script is not valid JSON: {source}")]
    MalformedJson {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{url}: missing field `{path}`")]
    MissingField { url: String, path: String },
    #[error("{url}: summary list `{path}` is empty")]
    EmptySummaryList { url: String, path: String },
}

impl ExtractError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractError::MalformedJson { .. } => ErrorKind::MalformedJson,
            ExtractError::MissingField { .. } => ErrorKind::MissingField,
            ExtractError::EmptySummaryList { .. } => ErrorKind::EmptySummaryList,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            ExtractError::MalformedJson { url, .. }
            | ExtractError::MissingField { url, .. }
            | ExtractError::EmptySummaryList { url, .. } => url,
        }
    }
}
