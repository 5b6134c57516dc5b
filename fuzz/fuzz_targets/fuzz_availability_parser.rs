#![no_main]
use libfuzzer_sys::fuzz_target;
use rate_shopper::adapters::scraper::availability_parser::AvailabilityParser;

fuzz_target!(|data: &[u8]| {
    if let Ok(html) = std::str::from_utf8(data) {
        let _ = AvailabilityParser::new(2, "BRL").parse(html);
    }
});
