pub mod crawl;
pub mod extractor;
pub mod fetcher;
pub mod json_node;
pub mod retry;
pub mod sink;
pub mod stats;

pub use crawl::*;
pub use extractor::*;
pub use fetcher::*;
pub use json_node::*;
pub use retry::*;
pub use sink::*;
pub use stats::*;
