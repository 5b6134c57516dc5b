pub mod cache;
pub mod progress;
pub mod scraper;
pub mod sink;
