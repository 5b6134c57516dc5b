pub mod cache;
pub mod page_fetcher;
pub mod progress;
pub mod result_sink;
