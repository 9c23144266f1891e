#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(patch) = noteful::query::parse_patch_json(s) {
            let mut doc = bson::doc! {"_id": noteful::numbered_id(1), "title": "t", "meta": {"x": 1}};
            let _ = noteful::query::apply_patch(&mut doc, &patch);
        }
    }
});
