#![no_main]

use std::collections::BTreeSet;

use libfuzzer_sys::fuzz_target;
use propdef::{
    DESCRIPTOR_KEYS, Definer, Descriptor, Heap, Property, READABLE, Value, WRITABLE, is_descriptor,
};

const JUNK_KEYS: [&str; 4] = ["fake", "length", "proto", "kind"];

// Build a map from an arbitrary key selection, then check the validator
// against the plain membership predicate and drive the selection through
// composition and definition. Errors are fine; panics are not.
fuzz_target!(|data: &[u8]| {
    if data.is_empty() || data.len() > 64 {
        return;
    }

    let mut heap = Heap::new();
    let handle = heap.alloc_map();
    let mut chosen: BTreeSet<&str> = BTreeSet::new();
    for byte in data {
        let key = match byte % 10 {
            n @ 0..=5 => DESCRIPTOR_KEYS[n as usize],
            n => JUNK_KEYS[(n - 6) as usize],
        };
        chosen.insert(key);
        let value = match key {
            "value" => Value::Int(i64::from(*byte)),
            _ => Value::Bool(byte % 2 == 0),
        };
        if heap.define(handle, key, Property::data(value)).is_err() {
            return;
        }
    }

    let candidate = Value::Object(handle);
    let expected =
        !chosen.is_empty() && chosen.iter().all(|key| DESCRIPTOR_KEYS.contains(key));
    assert_eq!(is_descriptor(&heap, &candidate), expected);

    let target = heap.alloc_map();
    for pattern in [READABLE, WRITABLE, Descriptor::default()] {
        let define = Definer::with_pattern(target, pattern);
        let _ = define.define(&mut heap, "slot", candidate.clone());
        let _ = define.define_bare(&mut heap, "bare", candidate.clone());
    }
});
