#![no_main]

use libfuzzer_sys::fuzz_target;
use propdef::{Heap, Value, merge};

// Two JSON documents separated by the first newline; merge one into the
// other and check that the dangerous keys never land on the target and that
// re-encoding never panics.
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let (left, right) = match text.find('\n') {
        Some(split) => (&text[..split], &text[split + 1..]),
        None => return,
    };
    let (Ok(left), Ok(right)) = (
        serde_json::from_str::<serde_json::Value>(left),
        serde_json::from_str::<serde_json::Value>(right),
    ) else {
        return;
    };

    let mut heap = Heap::new();
    let target = heap.from_json(&left);
    let additional = heap.from_json(&right);

    let Ok(merged) = merge(&mut heap, target, &additional) else {
        return;
    };

    if let Value::Object(handle) = &merged
        && let Ok(false) = heap.seq(*handle).map(|s| s.is_some())
    {
        for key in ["__proto__", "constructor", "prototype"] {
            let had_key = match &left {
                serde_json::Value::Object(entries) => entries.contains_key(key),
                _ => false,
            };
            if !had_key {
                assert!(!heap.has_own(*handle, key).unwrap_or(false));
            }
        }
    }

    let _ = heap.to_json(&merged);
});
