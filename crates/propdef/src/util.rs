//! Generic object utilities: enumerable-property removal, recursive merge,
//! and early-stop iteration.
//!
//! `merge`'s sequence branch decides "already present" by serializing both
//! sides to JSON text and checking substring containment. That equality is
//! deliberately loose (order- and formatting-sensitive, collision-prone)
//! and callers depend on it, so it is the default;
//! [`MergeOptions`] switches to structural equality when precision matters.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::heap::Heap;
use crate::value::Value;

/// Keys the merge never copies out of untrusted input: own properties with
/// these names could shadow or poison default attribute resolution on
/// unrelated objects in a prototype-based host.
const DANGEROUS_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];

// ---------------------------------------------------------------------------
// remove
// ---------------------------------------------------------------------------

/// Delete every own enumerable property of `obj` whose name is not in
/// `keep`. Returns `false` for falsy input, `true` otherwise.
///
/// Deletion goes through the storage layer's delete, which silently refuses
/// non-configurable slots, so properties installed through a definer's
/// default pattern survive. Sequences retain only the kept index positions;
/// other truthy values are left untouched.
pub fn remove(heap: &mut Heap, obj: &Value, keep: &[&str]) -> bool {
    if !obj.truthy() {
        return false;
    }
    let Value::Object(handle) = obj else {
        return true;
    };
    let Ok(composite) = heap.get(*handle) else {
        return false;
    };
    if composite.is_seq() {
        let Ok(Some(items)) = heap.seq_mut(*handle) else {
            return false;
        };
        let retained: Vec<Value> = items
            .iter()
            .enumerate()
            .filter(|(index, _)| keep.contains(&index.to_string().as_str()))
            .map(|(_, value)| value.clone())
            .collect();
        *items = retained;
        return true;
    }
    let Ok(keys) = heap.own_keys(*handle, true) else {
        return false;
    };
    for key in keys {
        if keep.contains(&key.as_str()) {
            continue;
        }
        let _ = heap.delete(*handle, &key);
    }
    true
}

// ---------------------------------------------------------------------------
// each
// ---------------------------------------------------------------------------

/// The position handed to an [`each`] callback: a sequence index or a map
/// key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EachKey {
    Index(usize),
    Key(String),
}

impl EachKey {
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Index(i) => Some(*i),
            Self::Key(_) => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Key(k) => Some(k),
            Self::Index(_) => None,
        }
    }
}

impl fmt::Display for EachKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Key(k) => f.write_str(k),
        }
    }
}

/// Iterate a sequence by index or a map by own enumerable key, invoking
/// `f(key, value)` per element. The iteration stops the moment `f` returns
/// `false`. Values are read through the storage layer, so accessor slots
/// run their getters. Scalars iterate zero times.
pub fn each<F>(heap: &mut Heap, collection: &Value, mut f: F) -> Result<()>
where
    F: FnMut(&EachKey, &Value) -> bool,
{
    for (key, value) in entries(heap, collection)? {
        if !f(&key, &value) {
            break;
        }
    }
    Ok(())
}

/// Snapshot of a collection's (key, value) pairs, shared by `each` and the
/// merge loops.
fn entries(heap: &mut Heap, collection: &Value) -> Result<Vec<(EachKey, Value)>> {
    let Value::Object(handle) = collection else {
        return Ok(Vec::new());
    };
    if let Some(items) = heap.seq(*handle)? {
        return Ok(items
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, value)| (EachKey::Index(index), value))
            .collect());
    }
    let keys = heap.own_keys(*handle, true)?;
    let mut out = Vec::with_capacity(keys.len());
    for key in keys {
        let value = heap.get_property(*handle, &key)?;
        out.push((EachKey::Key(key), value));
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// merge
// ---------------------------------------------------------------------------

/// How `merge` decides whether a sequence already contains an element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SequenceEquality {
    /// Serialize both sides to JSON text and check substring containment.
    /// The compatible default: order- and formatting-sensitive, and `[12]`
    /// "contains" `1`.
    #[default]
    SerializedSubstring,
    /// Structural comparison of the encoded values.
    Structural,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOptions {
    pub sequence_equality: SequenceEquality,
}

/// Recursively merge `additional` into `target` with the default options.
///
/// - Sequence target: append each element of `additional` not already
///   present (see [`SequenceEquality`]; the target is re-serialized after
///   every append, so earlier appends can make later elements "present").
/// - Map target: for each own enumerable key of `additional`, skipping the
///   dangerous prototype-pollution names: assign directly when the target
///   lacks the key (the composite itself, shared by handle, not a copy),
///   recurse when it has one.
/// - Scalar target: replaced by `additional` outright.
///
/// Returns the merged value: `target` itself (mutated in place) for
/// composites, `additional` for scalars.
pub fn merge(heap: &mut Heap, target: Value, additional: &Value) -> Result<Value> {
    merge_with(heap, target, additional, &MergeOptions::default())
}

/// [`merge`] with explicit options.
pub fn merge_with(
    heap: &mut Heap,
    target: Value,
    additional: &Value,
    options: &MergeOptions,
) -> Result<Value> {
    let handle = match &target {
        Value::Object(handle) => *handle,
        _ => return Ok(additional.clone()),
    };
    if heap.get(handle)?.is_seq() {
        for (_, element) in entries(heap, additional)? {
            if !contains_element(heap, &target, &element, options)? {
                if let Some(items) = heap.seq_mut(handle)? {
                    items.push(element);
                }
            }
        }
        return Ok(target);
    }

    for (key, value) in entries(heap, additional)? {
        let key = key.to_string();
        if DANGEROUS_KEYS.contains(&key.as_str()) {
            continue;
        }
        let existing = heap.get_property(handle, &key)?;
        if existing.is_undefined() {
            heap.set_property(handle, &key, value)?;
        } else {
            let merged = merge_with(heap, existing, &value, options)?;
            heap.set_property(handle, &key, merged)?;
        }
    }
    Ok(target)
}

fn contains_element(
    heap: &mut Heap,
    target: &Value,
    element: &Value,
    options: &MergeOptions,
) -> Result<bool> {
    match options.sequence_equality {
        SequenceEquality::SerializedSubstring => {
            let target_text = heap.to_json(target)?.to_string();
            let element_text = heap.to_json(element)?.to_string();
            Ok(target_text.contains(&element_text))
        }
        SequenceEquality::Structural => {
            let element_json = heap.to_json(element)?;
            let Value::Object(handle) = target else {
                return Ok(false);
            };
            let items: Vec<Value> = match heap.seq(*handle)? {
                Some(items) => items.to_vec(),
                None => return Ok(false),
            };
            for item in &items {
                if heap.to_json(item)? == element_json {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definer::Definer;
    use crate::heap::Property;
    use crate::value::ObjectRef;

    fn seq_of(heap: &mut Heap, items: &[i64]) -> Value {
        let items = items.iter().map(|n| Value::Int(*n)).collect();
        Value::Object(heap.alloc_seq(items))
    }

    fn ints(heap: &Heap, value: &Value) -> Vec<i64> {
        let Value::Object(h) = value else { panic!("not a composite") };
        heap.seq(*h)
            .unwrap()
            .unwrap()
            .iter()
            .map(|v| match v {
                Value::Int(n) => *n,
                other => panic!("unexpected element {other:?}"),
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // remove
    // -----------------------------------------------------------------------

    #[test]
    fn remove_deletes_enumerable_keys() {
        let mut heap = Heap::new();
        let obj = heap.alloc_map();
        heap.set_property(obj, "foo", Value::from("bar")).unwrap();
        assert!(remove(&mut heap, &Value::Object(obj), &[]));
        assert!(!heap.has_own(obj, "foo").unwrap());
    }

    #[test]
    fn remove_returns_false_for_falsy_input() {
        let mut heap = Heap::new();
        assert!(!remove(&mut heap, &Value::Undefined, &[]));
        assert!(!remove(&mut heap, &Value::Null, &[]));
        assert!(!remove(&mut heap, &Value::Int(0), &[]));
        assert!(remove(&mut heap, &Value::Int(1), &[]));
    }

    #[test]
    fn remove_spares_definer_created_slots() {
        let mut heap = Heap::new();
        let obj = heap.alloc_map();
        heap.set_property(obj, "bar", Value::from("bar")).unwrap();
        Definer::new(obj).define(&mut heap, "foo", "bar").unwrap();

        assert!(remove(&mut heap, &Value::Object(obj), &[]));
        assert_eq!(heap.get_property(obj, "foo").unwrap(), Value::from("bar"));
        assert_eq!(heap.get_property(obj, "bar").unwrap(), Value::Undefined);
    }

    #[test]
    fn remove_honors_the_keep_list() {
        let mut heap = Heap::new();
        let obj = heap.alloc_map();
        heap.set_property(obj, "a", Value::Int(1)).unwrap();
        heap.set_property(obj, "b", Value::Int(2)).unwrap();
        assert!(remove(&mut heap, &Value::Object(obj), &["b"]));
        assert!(!heap.has_own(obj, "a").unwrap());
        assert!(heap.has_own(obj, "b").unwrap());
    }

    #[test]
    fn remove_retains_kept_sequence_positions() {
        let mut heap = Heap::new();
        let seq = seq_of(&mut heap, &[10, 20, 30]);
        assert!(remove(&mut heap, &seq, &["1"]));
        assert_eq!(ints(&heap, &seq), vec![20]);
    }

    // -----------------------------------------------------------------------
    // each
    // -----------------------------------------------------------------------

    #[test]
    fn each_visits_sequence_elements_in_order() {
        let mut heap = Heap::new();
        let seq = seq_of(&mut heap, &[10, 20, 30]);
        let mut seen = Vec::new();
        each(&mut heap, &seq, |key, value| {
            seen.push((key.index().unwrap(), value.clone()));
            true
        })
        .unwrap();
        assert_eq!(
            seen,
            vec![
                (0, Value::Int(10)),
                (1, Value::Int(20)),
                (2, Value::Int(30))
            ]
        );
    }

    #[test]
    fn each_stops_on_false() {
        let mut heap = Heap::new();
        let seq = seq_of(&mut heap, &[10, 20, 30]);
        let mut visited = Vec::new();
        each(&mut heap, &seq, |key, _| {
            visited.push(key.index().unwrap());
            visited.len() < 2
        })
        .unwrap();
        assert_eq!(visited, vec![0, 1]);
    }

    #[test]
    fn each_visits_own_enumerable_map_keys() {
        let mut heap = Heap::new();
        let obj = heap.alloc_map();
        heap.set_property(obj, "a", Value::Int(1)).unwrap();
        heap.define(
            obj,
            "hidden",
            Property::Data {
                value: Value::Int(2),
                writable: true,
                enumerable: false,
                configurable: true,
            },
        )
        .unwrap();
        let mut seen = Vec::new();
        each(&mut heap, &Value::Object(obj), |key, _| {
            seen.push(key.to_string());
            true
        })
        .unwrap();
        assert_eq!(seen, vec!["a"]);
    }

    #[test]
    fn each_ignores_scalars() {
        let mut heap = Heap::new();
        let mut calls = 0;
        each(&mut heap, &Value::Int(5), |_, _| {
            calls += 1;
            true
        })
        .unwrap();
        assert_eq!(calls, 0);
    }

    // -----------------------------------------------------------------------
    // merge
    // -----------------------------------------------------------------------

    #[test]
    fn merge_appends_missing_sequence_elements() {
        let mut heap = Heap::new();
        let target = seq_of(&mut heap, &[1, 2]);
        let additional = seq_of(&mut heap, &[2, 3]);
        let merged = merge(&mut heap, target.clone(), &additional).unwrap();
        assert_eq!(merged, target);
        assert_eq!(ints(&heap, &merged), vec![1, 2, 3]);
    }

    #[test]
    fn serialized_equality_is_substring_loose() {
        // "[12]" contains "1" and "2", so neither is appended.
        let mut heap = Heap::new();
        let target = seq_of(&mut heap, &[12]);
        let additional = seq_of(&mut heap, &[1, 2]);
        let merged = merge(&mut heap, target, &additional).unwrap();
        assert_eq!(ints(&heap, &merged), vec![12]);
    }

    #[test]
    fn structural_equality_fixes_the_substring_collisions() {
        let mut heap = Heap::new();
        let target = seq_of(&mut heap, &[12]);
        let additional = seq_of(&mut heap, &[1, 2, 12]);
        let options = MergeOptions {
            sequence_equality: SequenceEquality::Structural,
        };
        let merged = merge_with(&mut heap, target, &additional, &options).unwrap();
        assert_eq!(ints(&heap, &merged), vec![12, 1, 2]);
    }

    #[test]
    fn merge_assigns_missing_keys_and_recurses_into_present_ones() {
        let mut heap = Heap::new();
        let parsed: serde_json::Value =
            serde_json::from_str(r#"{"a": {"x": 1}, "b": 1}"#).unwrap();
        let target = heap.from_json(&parsed);
        let parsed: serde_json::Value =
            serde_json::from_str(r#"{"a": {"y": 2}, "c": 3}"#).unwrap();
        let additional = heap.from_json(&parsed);

        let merged = merge(&mut heap, target.clone(), &additional).unwrap();
        assert_eq!(merged, target);
        let encoded = heap.to_json(&merged).unwrap();
        assert_eq!(
            encoded.to_string(),
            r#"{"a":{"x":1,"y":2},"b":1,"c":3}"#
        );
    }

    #[test]
    fn merge_shares_newly_assigned_composites_by_handle() {
        let mut heap = Heap::new();
        let target = heap.alloc_map();
        let additional = heap.alloc_map();
        let nested = heap.alloc_map();
        heap.set_property(nested, "x", Value::Int(1)).unwrap();
        heap.set_property(additional, "inner", Value::Object(nested))
            .unwrap();

        merge(
            &mut heap,
            Value::Object(target),
            &Value::Object(additional),
        )
        .unwrap();
        let Value::Object(assigned) = heap.get_property(target, "inner").unwrap() else {
            panic!("expected a composite");
        };
        assert_eq!(assigned, nested);
    }

    #[test]
    fn merge_replaces_scalar_targets() {
        let mut heap = Heap::new();
        let merged = merge(&mut heap, Value::Int(1), &Value::from("x")).unwrap();
        assert_eq!(merged, Value::from("x"));
    }

    #[test]
    fn merge_refuses_dangerous_keys() {
        let mut heap = Heap::new();
        let parsed: serde_json::Value =
            serde_json::from_str(r#"{"__proto__": {"a": "b"}, "ok": 1}"#).unwrap();
        let additional = heap.from_json(&parsed);
        let target = heap.alloc_map();

        merge(&mut heap, Value::Object(target), &additional).unwrap();
        assert!(!heap.has_own(target, "__proto__").unwrap());
        assert_eq!(heap.get_property(target, "ok").unwrap(), Value::Int(1));

        // An unrelated fresh object resolves nothing it should not.
        let fresh: ObjectRef = heap.alloc_map();
        assert_eq!(heap.get_property(fresh, "a").unwrap(), Value::Undefined);
    }
}
