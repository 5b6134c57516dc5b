pub mod csv_sink;
pub mod fallback;
pub mod memory_sink;
