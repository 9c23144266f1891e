#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(filter) = noteful::query::parse_filter_json(s) {
            // Rendering back must not panic either
            let _ = noteful::query::parse_filter_value(&filter.to_json());
        }
    }
});
