use serde::{Deserialize, Serialize};

/// One scraped movie, emitted once per successfully parsed page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieRecord {
    pub title: String,
    pub id: String,
    pub plot: String,
    pub summary: Option<String>,
    pub poster_url: String,
    pub source_url: String,
}
