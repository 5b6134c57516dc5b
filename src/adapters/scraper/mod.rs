pub mod availability_parser;
pub mod client;
pub mod rate_limiter;
