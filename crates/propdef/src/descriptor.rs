//! Descriptor validation and composition.
//!
//! A descriptor can show up in two shapes. Callers hand the definer either a
//! plain value or a *runtime map* whose keys all come from the fixed six-name
//! set; [`is_descriptor`] decides which, by key membership alone. Internally
//! the crate works with [`Descriptor`], a struct of six optional slots that
//! doubles as the pattern type; [`Descriptor::overlay`] composes two of them
//! (later slots win) and [`Descriptor::to_property`] forces the result into
//! the tagged data/accessor form the heap stores, which is where the
//! accessor-versus-value contradiction is finally rejected.
//!
//! The validator deliberately does *not* reject that contradiction: a map
//! holding both `get` and `value` is a descriptor by key membership. The
//! storage layer owns the semantic check and fails with `InvalidDescriptor`
//! at definition time.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::heap::{Composite, Heap, Property};
use crate::value::{FnRef, ObjectRef, Value};

/// The six recognized descriptor slot names.
pub const DESCRIPTOR_KEYS: [&str; 6] = [
    "configurable", // slot may be reconfigured or deleted
    "enumerable",   // slot shows up in key enumeration
    "get",          // accessor read function
    "set",          // accessor write function
    "value",        // stored literal
    "writable",     // slot may be assigned through
];

/// Pattern for read-only slots: hidden from enumeration, not assignable.
pub const READABLE: Descriptor = Descriptor {
    configurable: None,
    enumerable: Some(false),
    get: None,
    set: None,
    value: None,
    writable: Some(false),
};

/// Pattern for writable slots: hidden from enumeration, assignable,
/// reconfigurable.
pub const WRITABLE: Descriptor = Descriptor {
    configurable: Some(true),
    enumerable: Some(false),
    get: None,
    set: None,
    value: None,
    writable: Some(true),
};

// ---------------------------------------------------------------------------
// is_descriptor
// ---------------------------------------------------------------------------

/// Does `candidate` qualify as a property descriptor?
///
/// True iff it is a property map (not a sequence, not a scalar, not a
/// function) with at least one own enumerable key, every one of which is a
/// member of [`DESCRIPTOR_KEYS`]. The empty map is not a descriptor. Pure
/// predicate; no conflict checking (see the module docs).
pub fn is_descriptor(heap: &Heap, candidate: &Value) -> bool {
    descriptor_source(heap, candidate).is_some()
}

/// The map handle behind a value that validates as a descriptor.
pub(crate) fn descriptor_source(heap: &Heap, candidate: &Value) -> Option<ObjectRef> {
    let Value::Object(handle) = candidate else {
        return None;
    };
    let Ok(Composite::Map(map)) = heap.get(*handle) else {
        return None;
    };
    let keys = map.own_keys(true);
    if keys.is_empty() {
        return None;
    }
    keys.iter()
        .all(|key| DESCRIPTOR_KEYS.contains(&key.as_str()))
        .then_some(*handle)
}

// ---------------------------------------------------------------------------
// Descriptor — the loose six-slot form
// ---------------------------------------------------------------------------

/// A partial property descriptor: six optional slots.
///
/// Used both as a caller-supplied description and as a pattern of defaults.
/// Patterns are plain immutable values; composing never mutates either
/// side, so one pattern can back any number of definers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    pub configurable: Option<bool>,
    pub enumerable: Option<bool>,
    pub get: Option<FnRef>,
    pub set: Option<FnRef>,
    pub value: Option<Value>,
    pub writable: Option<bool>,
}

impl Descriptor {
    /// A descriptor carrying only a literal value.
    pub fn of_value(value: Value) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    /// Parse a validated descriptor map into the loose form.
    ///
    /// Flag slots coerce with ToBoolean. `get`/`set` must hold a function or
    /// undefined; anything else is the storage primitive's callable
    /// requirement surfacing early as `InvalidDescriptor`. Reads go through
    /// the heap, so a descriptor map may itself use accessors for its slots.
    pub fn from_object(heap: &mut Heap, source: ObjectRef, name: &str) -> Result<Self> {
        let mut desc = Self::default();
        for key in DESCRIPTOR_KEYS {
            if !heap.has_own(source, key)? {
                continue;
            }
            let value = heap.get_property(source, key)?;
            match key {
                "configurable" => desc.configurable = Some(value.truthy()),
                "enumerable" => desc.enumerable = Some(value.truthy()),
                "writable" => desc.writable = Some(value.truthy()),
                "value" => desc.value = Some(value),
                "get" | "set" => {
                    let slot = match value {
                        Value::Function(f) => Some(f),
                        Value::Undefined => None,
                        other => {
                            return Err(Error::invalid_descriptor(
                                name,
                                format!("`{key}` is a {}, not a function", other.type_name()),
                            ));
                        }
                    };
                    if key == "get" {
                        desc.get = slot;
                    } else {
                        desc.set = slot;
                    }
                }
                _ => {}
            }
        }
        Ok(desc)
    }

    /// Compose two descriptors: slots set on `over` win, everything else
    /// falls through to `self`. Neither side is mutated.
    pub fn overlay(&self, over: &Self) -> Self {
        Self {
            configurable: over.configurable.or(self.configurable),
            enumerable: over.enumerable.or(self.enumerable),
            get: over.get.or(self.get),
            set: over.set.or(self.set),
            value: over.value.clone().or_else(|| self.value.clone()),
            writable: over.writable.or(self.writable),
        }
    }

    pub fn has_accessor(&self) -> bool {
        self.get.is_some() || self.set.is_some()
    }

    /// Force into the applied form the heap stores. Unset flags default to
    /// `false`, an unset value to undefined. Accessor slots alongside
    /// `value` or `writable` are contradictory and fail here.
    pub fn to_property(&self, name: &str) -> Result<Property> {
        if self.has_accessor() {
            if self.value.is_some() || self.writable.is_some() {
                return Err(Error::invalid_descriptor(
                    name,
                    "accessors cannot be combined with `value` or `writable`",
                ));
            }
            return Ok(Property::Accessor {
                get: self.get,
                set: self.set,
                enumerable: self.enumerable.unwrap_or(false),
                configurable: self.configurable.unwrap_or(false),
            });
        }
        Ok(Property::Data {
            value: self.value.clone().unwrap_or(Value::Undefined),
            writable: self.writable.unwrap_or(false),
            enumerable: self.enumerable.unwrap_or(false),
            configurable: self.configurable.unwrap_or(false),
        })
    }
}
