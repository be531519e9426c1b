use url::Url;

pub const DEFAULT_SEED_URLS: [&str; 3] = [
    "https://www.imdb.com/title/tt0112401/plotsummary",
    "https://www.imdb.com/title/tt0116731/plotsummary",
    "https://www.imdb.com/title/tt0112427/plotsummary",
];

/// Fixed, ordered list of pages to fetch. Iterating never consumes it.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedEnumerator {
    urls: Vec<String>,
}

impl Default for SeedEnumerator {
    fn default() -> Self {
        SeedEnumerator {
            urls: DEFAULT_SEED_URLS.iter().map(|u| u.to_string()).collect(),
        }
    }
}

impl SeedEnumerator {
    /// Builds an enumerator from configured URLs, falling back to the
    /// compiled-in list when none are given.
    pub fn from_urls(urls: Vec<String>) -> Result<Self, url::ParseError> {
        if urls.is_empty() {
            return Ok(SeedEnumerator::default());
        }

        for url in urls.iter() {
            Url::parse(url)?;
        }

        Ok(SeedEnumerator { urls })
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.urls.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}
