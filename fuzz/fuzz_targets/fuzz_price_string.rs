#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = rate_shopper::adapters::scraper::availability_parser::parse_price_string(text);
    }
});
