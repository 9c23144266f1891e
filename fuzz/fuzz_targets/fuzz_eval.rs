#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(filter) = noteful::query::parse_filter_json(s) {
            let docs = [
                bson::doc! {"_id": noteful::numbered_id(7), "title": "cats", "content": "x"},
                bson::doc! {"_id": noteful::numbered_id(13), "title": "dogs"},
                bson::doc! {"_id": noteful::numbered_id(20), "content": "no title", "n": 3},
            ];
            for d in &docs {
                let _ = noteful::query::eval_filter(d, &filter);
            }
        }
    }
});
