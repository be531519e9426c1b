use scraper::{Html, Selector};
use serde_json::Value;
use thiserror::Error;

use crate::{
    configuration::ExtractorSettings,
    domain::{
        movie::MovieRecord,
        outcome::{ExtractError, Outcome, RetryRequest},
        page::PageResponse,
    },
};

use super::json_node::{JsonNode, MissingPath};

const CONTENT_DATA_PATH: &str = "props.pageProps.contentData";

#[derive(Debug, Error)]
#[error("invalid selector `{selector}`: {reason}")]
pub struct SelectorError {
    pub selector: String,
    pub reason: String,
}

/// Turns a fetched movie page into a [`MovieRecord`] by reading the JSON
/// payload the site embeds for client-side rendering.
pub struct PageExtractor {
    settings: ExtractorSettings,
    script_selector: Selector,
    summary_selector: Selector,
}

fn parse_selector(selector: String) -> Result<Selector, SelectorError> {
    Selector::parse(&selector).map_err(|e| SelectorError {
        reason: e.to_string(),
        selector: selector.clone(),
    })
}

impl PageExtractor {
    pub fn new(settings: ExtractorSettings) -> Result<Self, SelectorError> {
        // Attribute selectors match the whole attribute, not one class token.
        let script_selector =
            parse_selector(format!("body > script[id=\"{}\"]", settings.script_id))?;
        let summary_selector =
            parse_selector(format!("div[class=\"{}\"]", settings.summary_class))?;

        Ok(PageExtractor {
            settings,
            script_selector,
            summary_selector,
        })
    }

    pub fn settings(&self) -> &ExtractorSettings {
        &self.settings
    }

    /// Waits the configured delay, then parses. Only the calling task sleeps.
    pub async fn extract(&self, response: PageResponse) -> Outcome {
        log::info!(
            "Taking a {}s break before parsing {}",
            self.settings.delay_secs,
            response.url
        );
        tokio::time::sleep(self.settings.delay()).await;

        self.parse(&response)
    }

    pub fn parse(&self, response: &PageResponse) -> Outcome {
        let Some(movie_data) = self.find_data_script(&response.body) else {
            log::warn!(
                "No `{}` script on {}",
                self.settings.script_id,
                response.url
            );
            return Outcome::Retry(RetryRequest {
                url: response.request_url.clone(),
                reason: self.settings.retry_reason.clone(),
            });
        };

        match self.parse_movie_data(&movie_data, &response.url) {
            Ok(record) => Outcome::Record(record),
            Err(e) => Outcome::Failure(e),
        }
    }

    fn find_data_script(&self, body: &str) -> Option<String> {
        let document = Html::parse_document(body);

        document
            .select(&self.script_selector)
            .next()
            .map(|script| script.text().collect::<String>())
            .filter(|text| !text.trim().is_empty())
    }

    fn parse_movie_data(&self, movie_data: &str, url: &str) -> Result<MovieRecord, ExtractError> {
        let value: Value =
            serde_json::from_str(movie_data).map_err(|source| ExtractError::MalformedJson {
                url: url.to_string(),
                source,
            })?;

        let missing = |MissingPath(path): MissingPath| ExtractError::MissingField {
            url: url.to_string(),
            path,
        };

        let content = JsonNode::root(&value)
            .keys(CONTENT_DATA_PATH)
            .map_err(&missing)?;

        let poster_url = content
            .keys("posterData.image.url")
            .and_then(|n| n.text())
            .map_err(&missing)?;
        let title = content
            .keys("entityMetadata.titleText.text")
            .and_then(|n| n.text())
            .map_err(&missing)?;
        let id = content
            .keys("entityMetadata.id")
            .and_then(|n| n.text())
            .map_err(&missing)?;
        let plot = content
            .keys("entityMetadata.plot.plotText.plainText")
            .and_then(|n| n.text())
            .map_err(&missing)?;

        let items = content
            .key("categories")
            .and_then(|n| n.index(0))
            .and_then(|n| n.keys("section.items"))
            .map_err(&missing)?;

        // With several entries the first is the synopsis-like plot and the
        // second is the first user-written summary.
        let chosen = match items.array().map_err(&missing)?.len() {
            0 => {
                return Err(ExtractError::EmptySummaryList {
                    url: url.to_string(),
                    path: items.path().to_string(),
                })
            }
            1 => 0,
            _ => 1,
        };

        let html_content = items
            .index(chosen)
            .and_then(|n| n.key("htmlContent"))
            .and_then(|n| n.text())
            .map_err(&missing)?;

        let summary = self.summary_text(&html_content);
        if summary.is_none() {
            log::debug!("No summary text in item {} of {}", chosen, url);
        }

        Ok(MovieRecord {
            title,
            id,
            plot,
            summary,
            poster_url,
            source_url: url.to_string(),
        })
    }

    fn summary_text(&self, html_content: &str) -> Option<String> {
        let fragment = Html::parse_fragment(html_content);

        fragment
            .select(&self.summary_selector)
            .next()
            .map(|div| div.text().collect::<String>())
            .filter(|text| !text.trim().is_empty())
    }
}
