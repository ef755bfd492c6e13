//! Managed object store: property maps with full descriptor semantics,
//! sequences, and a native-function table.
//!
//! This is the storage layer every other module applies descriptors through:
//!
//! - **Applied descriptors**: data vs accessor, configurable/enumerable/writable
//! - **Define-own-property**: compatibility checking against non-configurable
//!   slots; an identical redefinition always succeeds
//! - **Prototype chains**: `[[Prototype]]` slot with cycle- and depth-guarded
//!   traversal; getters and setters are invoked during get/set
//! - **Object operations**: delete, deterministic own-key order, freeze, seal,
//!   prevent-extensions
//! - **JSON bridge**: `from_json`/`to_json` for building composites from
//!   parsed text and for the merge utility's serialized equality
//!
//! `BTreeMap` keeps key order deterministic. Assignment-style writes fail
//! silently (`Ok(false)`) like sloppy-mode assignment; only `define` reports
//! descriptor conflicts as errors.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::value::{FnRef, ObjectRef, Value};

/// Maximum prototype chain depth to prevent infinite loops.
const MAX_PROTOTYPE_CHAIN_DEPTH: u32 = 1024;

// ---------------------------------------------------------------------------
// Property — the applied descriptor a slot actually stores
// ---------------------------------------------------------------------------

/// An applied property descriptor: either a stored literal or an accessor
/// pair. The loose six-slot form callers compose lives in
/// [`Descriptor`](crate::descriptor::Descriptor); by the time a descriptor
/// reaches a slot it has been forced into one of these two shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Property {
    /// Data property: a stored value plus a writability flag.
    Data {
        value: Value,
        writable: bool,
        enumerable: bool,
        configurable: bool,
    },
    /// Accessor property: getter and/or setter handles.
    Accessor {
        get: Option<FnRef>,
        set: Option<FnRef>,
        enumerable: bool,
        configurable: bool,
    },
}

impl Property {
    /// Data property with assignment semantics: writable, enumerable,
    /// configurable.
    pub fn data(value: Value) -> Self {
        Self::Data {
            value,
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    pub fn is_configurable(&self) -> bool {
        match self {
            Self::Data { configurable, .. } | Self::Accessor { configurable, .. } => *configurable,
        }
    }

    pub fn is_enumerable(&self) -> bool {
        match self {
            Self::Data { enumerable, .. } | Self::Accessor { enumerable, .. } => *enumerable,
        }
    }

    pub fn is_data(&self) -> bool {
        matches!(self, Self::Data { .. })
    }

    pub fn is_accessor(&self) -> bool {
        matches!(self, Self::Accessor { .. })
    }

    /// Is this a data property with `writable = true`? Accessors are never
    /// writable in this sense.
    pub fn is_writable(&self) -> bool {
        match self {
            Self::Data { writable, .. } => *writable,
            Self::Accessor { .. } => false,
        }
    }

    /// The stored value, if this is a data property.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Data { value, .. } => Some(value),
            Self::Accessor { .. } => None,
        }
    }

    pub fn set_non_configurable(&mut self) {
        match self {
            Self::Data { configurable, .. } | Self::Accessor { configurable, .. } => {
                *configurable = false;
            }
        }
    }

    /// No-op for accessors.
    pub fn set_non_writable(&mut self) {
        if let Self::Data { writable, .. } = self {
            *writable = false;
        }
    }
}

// ---------------------------------------------------------------------------
// MapObject — a property map with [[Prototype]] and [[Extensible]] slots
// ---------------------------------------------------------------------------

/// A composite object holding named slots with full descriptors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapObject {
    /// `[[Prototype]]` slot (`None` ends the chain).
    pub prototype: Option<ObjectRef>,
    /// `[[Extensible]]` slot: may new own slots be added?
    pub extensible: bool,
    /// Own properties keyed by name.
    pub properties: BTreeMap<String, Property>,
}

impl Default for MapObject {
    fn default() -> Self {
        Self {
            prototype: None,
            extensible: true,
            properties: BTreeMap::new(),
        }
    }
}

impl MapObject {
    pub fn with_prototype(proto: Option<ObjectRef>) -> Self {
        Self {
            prototype: proto,
            ..Self::default()
        }
    }

    /// Define or redefine a named slot.
    ///
    /// Rejections surface as [`Error::InvalidDescriptor`]: adding to a
    /// non-extensible map, or changing what a non-configurable slot does not
    /// permit (configurability, enumerability, data/accessor kind, a
    /// non-writable value, or accessor handles). Redefining a slot with an
    /// identical descriptor always succeeds.
    pub fn define_own(&mut self, name: &str, desc: Property) -> Result<()> {
        if let Some(current) = self.properties.get(name) {
            if !current.is_configurable() {
                if desc.is_configurable() {
                    return Err(Error::invalid_descriptor(
                        name,
                        "cannot make a non-configurable property configurable",
                    ));
                }
                if desc.is_enumerable() != current.is_enumerable() {
                    return Err(Error::invalid_descriptor(
                        name,
                        "cannot change enumerability of a non-configurable property",
                    ));
                }
                if current.is_data() != desc.is_data() {
                    return Err(Error::invalid_descriptor(
                        name,
                        "cannot switch a non-configurable property between data and accessor",
                    ));
                }
                if let (
                    Property::Data {
                        writable: current_writable,
                        value: current_value,
                        ..
                    },
                    Property::Data {
                        writable: new_writable,
                        value: new_value,
                        ..
                    },
                ) = (current, &desc)
                    && !current_writable
                {
                    if *new_writable {
                        return Err(Error::invalid_descriptor(
                            name,
                            "cannot make a non-writable property writable",
                        ));
                    }
                    if !current_value.same_value(new_value) {
                        return Err(Error::invalid_descriptor(
                            name,
                            "cannot change the value of a non-writable property",
                        ));
                    }
                }
                if let (
                    Property::Accessor {
                        get: current_get,
                        set: current_set,
                        ..
                    },
                    Property::Accessor {
                        get: new_get,
                        set: new_set,
                        ..
                    },
                ) = (current, &desc)
                    && (current_get != new_get || current_set != new_set)
                {
                    return Err(Error::invalid_descriptor(
                        name,
                        "cannot change accessors of a non-configurable property",
                    ));
                }
            }
            self.properties.insert(name.to_string(), desc);
            Ok(())
        } else {
            if !self.extensible {
                return Err(Error::invalid_descriptor(name, "object is not extensible"));
            }
            self.properties.insert(name.to_string(), desc);
            Ok(())
        }
    }

    /// Delete a slot. Returns `false` for a non-configurable slot, vacuous
    /// `true` for an absent one.
    pub fn delete(&mut self, name: &str) -> bool {
        if let Some(desc) = self.properties.get(name) {
            if !desc.is_configurable() {
                return false;
            }
        } else {
            return true;
        }
        self.properties.remove(name);
        true
    }

    /// Own keys in deterministic order: integer-like names first in numeric
    /// order, then the rest in map order.
    pub fn own_keys(&self, enumerable_only: bool) -> Vec<String> {
        let mut int_keys: Vec<(u64, String)> = Vec::new();
        let mut str_keys: Vec<String> = Vec::new();
        for (key, prop) in &self.properties {
            if enumerable_only && !prop.is_enumerable() {
                continue;
            }
            if let Ok(n) = key.parse::<u64>() {
                int_keys.push((n, key.clone()));
            } else {
                str_keys.push(key.clone());
            }
        }
        int_keys.sort_by_key(|(n, _)| *n);
        let mut result: Vec<String> = int_keys.into_iter().map(|(_, k)| k).collect();
        result.extend(str_keys);
        result
    }

    /// `Object.freeze` semantics: non-extensible, all slots non-configurable,
    /// data slots additionally non-writable.
    pub fn freeze(&mut self) {
        self.extensible = false;
        for desc in self.properties.values_mut() {
            desc.set_non_configurable();
            desc.set_non_writable();
        }
    }

    /// `Object.seal` semantics: non-extensible, all slots non-configurable,
    /// writability untouched.
    pub fn seal(&mut self) {
        self.extensible = false;
        for desc in self.properties.values_mut() {
            desc.set_non_configurable();
        }
    }

    pub fn is_frozen(&self) -> bool {
        !self.extensible
            && self
                .properties
                .values()
                .all(|d| !d.is_configurable() && !d.is_writable())
    }

    pub fn is_sealed(&self) -> bool {
        !self.extensible && self.properties.values().all(|d| !d.is_configurable())
    }
}

// ---------------------------------------------------------------------------
// Composite — map or sequence
// ---------------------------------------------------------------------------

/// A heap-resident composite: a property map or a sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Composite {
    Map(MapObject),
    Seq(Vec<Value>),
}

impl Composite {
    pub fn as_map(&self) -> Option<&MapObject> {
        match self {
            Self::Map(m) => Some(m),
            Self::Seq(_) => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut MapObject> {
        match self {
            Self::Map(m) => Some(m),
            Self::Seq(_) => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Self::Seq(items) => Some(items),
            Self::Map(_) => None,
        }
    }

    pub fn as_seq_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Self::Seq(items) => Some(items),
            Self::Map(_) => None,
        }
    }

    pub fn is_seq(&self) -> bool {
        matches!(self, Self::Seq(_))
    }
}

// ---------------------------------------------------------------------------
// NativeFn — host function callable with the heap and a receiver
// ---------------------------------------------------------------------------

/// A native function: getters, setters, and lazy compute hooks. Invoked with
/// the heap, the receiver the property access went through, and positional
/// arguments (empty for a get, the assigned value for a set).
#[derive(Clone)]
pub struct NativeFn(Rc<dyn Fn(&mut Heap, ObjectRef, &[Value]) -> Result<Value>>);

impl NativeFn {
    pub fn call(&self, heap: &mut Heap, this: ObjectRef, args: &[Value]) -> Result<Value> {
        (self.0)(heap, this, args)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NativeFn")
    }
}

// ---------------------------------------------------------------------------
// Heap — the managed store
// ---------------------------------------------------------------------------

/// Arena owning every composite and native function. All mutation goes
/// through `&mut Heap`, which is what makes the crate's single-threaded
/// at-most-once guarantees structural rather than locked.
#[derive(Debug, Clone, Default)]
pub struct Heap {
    objects: Vec<Composite>,
    functions: Vec<NativeFn>,
}

enum GetStep {
    Done(Value),
    Getter(FnRef),
    Proto(Option<ObjectRef>),
}

enum SetSlot {
    SeqIndex,
    DataWritable,
    Rejected,
    Setter(FnRef),
    Absent { extensible: bool },
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    // -- Allocation ---------------------------------------------------------

    /// Allocate an empty property map with no prototype.
    pub fn alloc_map(&mut self) -> ObjectRef {
        self.alloc_map_with_prototype(None)
    }

    /// Allocate an empty property map with the given prototype.
    pub fn alloc_map_with_prototype(&mut self, proto: Option<ObjectRef>) -> ObjectRef {
        let handle = ObjectRef(self.objects.len() as u32);
        self.objects
            .push(Composite::Map(MapObject::with_prototype(proto)));
        handle
    }

    /// Allocate a sequence holding `items`.
    pub fn alloc_seq(&mut self, items: Vec<Value>) -> ObjectRef {
        let handle = ObjectRef(self.objects.len() as u32);
        self.objects.push(Composite::Seq(items));
        handle
    }

    /// Register a native function and return its handle.
    pub fn alloc_function<F>(&mut self, f: F) -> FnRef
    where
        F: Fn(&mut Heap, ObjectRef, &[Value]) -> Result<Value> + 'static,
    {
        let handle = FnRef(self.functions.len() as u32);
        self.functions.push(NativeFn(Rc::new(f)));
        handle
    }

    // -- Resolution ---------------------------------------------------------

    pub fn get(&self, handle: ObjectRef) -> Result<&Composite> {
        self.objects
            .get(handle.0 as usize)
            .ok_or(Error::ObjectNotFound(handle))
    }

    pub fn get_mut(&mut self, handle: ObjectRef) -> Result<&mut Composite> {
        self.objects
            .get_mut(handle.0 as usize)
            .ok_or(Error::ObjectNotFound(handle))
    }

    /// Resolve to a property map, or fail with [`Error::NotAMap`].
    pub fn map(&self, handle: ObjectRef) -> Result<&MapObject> {
        self.get(handle)?.as_map().ok_or(Error::NotAMap(handle))
    }

    /// Mutable [`Heap::map`].
    pub fn map_mut(&mut self, handle: ObjectRef) -> Result<&mut MapObject> {
        self.get_mut(handle)?
            .as_map_mut()
            .ok_or(Error::NotAMap(handle))
    }

    /// Resolve to sequence elements, `None` if the handle is a map.
    pub fn seq(&self, handle: ObjectRef) -> Result<Option<&[Value]>> {
        Ok(self.get(handle)?.as_seq())
    }

    /// Mutable [`Heap::seq`].
    pub fn seq_mut(&mut self, handle: ObjectRef) -> Result<Option<&mut Vec<Value>>> {
        Ok(self.get_mut(handle)?.as_seq_mut())
    }

    pub fn function(&self, handle: FnRef) -> Result<NativeFn> {
        self.functions
            .get(handle.0 as usize)
            .cloned()
            .ok_or(Error::FunctionNotFound(handle))
    }

    // -- Descriptor-level operations ----------------------------------------

    /// Define or redefine a named slot on a map (see
    /// [`MapObject::define_own`] for the compatibility rules).
    pub fn define(&mut self, target: ObjectRef, name: &str, desc: Property) -> Result<()> {
        self.map_mut(target)?.define_own(name, desc)
    }

    /// The own applied descriptor for `name`, cloned as a snapshot.
    pub fn own_property(&self, target: ObjectRef, name: &str) -> Result<Option<Property>> {
        Ok(self.map(target)?.properties.get(name).cloned())
    }

    pub fn has_own(&self, target: ObjectRef, name: &str) -> Result<bool> {
        Ok(self.map(target)?.properties.contains_key(name))
    }

    /// Own keys in deterministic order; `enumerable_only` filters to the
    /// keys enumeration would visit.
    pub fn own_keys(&self, target: ObjectRef, enumerable_only: bool) -> Result<Vec<String>> {
        Ok(self.map(target)?.own_keys(enumerable_only))
    }

    /// Delete an own slot; `false` (silently) for a non-configurable one.
    pub fn delete(&mut self, target: ObjectRef, name: &str) -> Result<bool> {
        Ok(self.map_mut(target)?.delete(name))
    }

    // -- Get / set ----------------------------------------------------------

    /// Read `name` through `target`, walking the prototype chain and
    /// invoking getters with `target` as the receiver. Sequences resolve
    /// integer-like names to elements. Undefined past the chain end.
    pub fn get_property(&mut self, target: ObjectRef, name: &str) -> Result<Value> {
        let mut current = Some(target);
        let mut depth: u32 = 0;
        let mut visited = BTreeSet::new();

        while let Some(h) = current {
            if depth > MAX_PROTOTYPE_CHAIN_DEPTH {
                return Err(Error::PrototypeChainTooDeep {
                    depth,
                    max: MAX_PROTOTYPE_CHAIN_DEPTH,
                });
            }
            if !visited.insert(h) {
                return Err(Error::PrototypeCycle);
            }

            let step = match self.get(h)? {
                Composite::Seq(items) => GetStep::Done(match name.parse::<usize>() {
                    Ok(i) => items.get(i).cloned().unwrap_or(Value::Undefined),
                    Err(_) => Value::Undefined,
                }),
                Composite::Map(m) => match m.properties.get(name) {
                    Some(Property::Data { value, .. }) => GetStep::Done(value.clone()),
                    Some(Property::Accessor { get: Some(g), .. }) => GetStep::Getter(*g),
                    Some(Property::Accessor { get: None, .. }) => GetStep::Done(Value::Undefined),
                    None => GetStep::Proto(m.prototype),
                },
            };

            match step {
                GetStep::Done(value) => return Ok(value),
                GetStep::Getter(g) => return self.function(g)?.call(self, target, &[]),
                GetStep::Proto(proto) => current = proto,
            }
            depth += 1;
        }

        Ok(Value::Undefined)
    }

    /// Read an own slot's value without walking the chain or invoking
    /// getters; accessors read as undefined.
    pub fn get_own(&self, target: ObjectRef, name: &str) -> Result<Value> {
        match self.get(target)? {
            Composite::Seq(items) => Ok(match name.parse::<usize>() {
                Ok(i) => items.get(i).cloned().unwrap_or(Value::Undefined),
                Err(_) => Value::Undefined,
            }),
            Composite::Map(m) => Ok(m
                .properties
                .get(name)
                .and_then(Property::value)
                .cloned()
                .unwrap_or(Value::Undefined)),
        }
    }

    /// Assignment-style write to an own slot: invokes a setter, updates a
    /// writable data slot, creates an enumerable/writable/configurable slot
    /// on an extensible map, grows a sequence at or past its end. Returns
    /// `Ok(false)` silently when the write is refused (non-writable slot,
    /// missing setter, non-extensible map), like sloppy-mode assignment.
    pub fn set_property(&mut self, target: ObjectRef, name: &str, value: Value) -> Result<bool> {
        let slot = match self.get(target)? {
            Composite::Seq(_) => SetSlot::SeqIndex,
            Composite::Map(m) => match m.properties.get(name) {
                Some(Property::Data { writable: true, .. }) => SetSlot::DataWritable,
                Some(Property::Data {
                    writable: false, ..
                }) => SetSlot::Rejected,
                Some(Property::Accessor { set: Some(s), .. }) => SetSlot::Setter(*s),
                Some(Property::Accessor { set: None, .. }) => SetSlot::Rejected,
                None => SetSlot::Absent {
                    extensible: m.extensible,
                },
            },
        };

        match slot {
            SetSlot::SeqIndex => {
                let Ok(index) = name.parse::<usize>() else {
                    return Ok(false);
                };
                let Some(items) = self.get_mut(target)?.as_seq_mut() else {
                    return Ok(false);
                };
                if index < items.len() {
                    items[index] = value;
                } else {
                    items.resize(index, Value::Undefined);
                    items.push(value);
                }
                Ok(true)
            }
            SetSlot::DataWritable => {
                let map = self.map_mut(target)?;
                if let Some(Property::Data { value: slot, .. }) = map.properties.get_mut(name) {
                    *slot = value;
                }
                Ok(true)
            }
            SetSlot::Rejected => Ok(false),
            SetSlot::Setter(s) => {
                self.function(s)?.call(self, target, &[value])?;
                Ok(true)
            }
            SetSlot::Absent { extensible: true } => {
                self.map_mut(target)?
                    .properties
                    .insert(name.to_string(), Property::data(value));
                Ok(true)
            }
            SetSlot::Absent { extensible: false } => Ok(false),
        }
    }

    // -- Freeze / seal ------------------------------------------------------

    pub fn prevent_extensions(&mut self, target: ObjectRef) -> Result<()> {
        self.map_mut(target)?.extensible = false;
        Ok(())
    }

    pub fn freeze(&mut self, target: ObjectRef) -> Result<()> {
        self.map_mut(target)?.freeze();
        Ok(())
    }

    pub fn seal(&mut self, target: ObjectRef) -> Result<()> {
        self.map_mut(target)?.seal();
        Ok(())
    }

    pub fn is_frozen(&self, target: ObjectRef) -> Result<bool> {
        Ok(self.map(target)?.is_frozen())
    }

    pub fn is_sealed(&self, target: ObjectRef) -> Result<bool> {
        Ok(self.map(target)?.is_sealed())
    }

    // -- JSON bridge --------------------------------------------------------

    /// Build a value from parsed JSON. Maps and arrays become fresh heap
    /// composites with plain enumerable data slots; every key of the source
    /// text becomes an ordinary own key, `"__proto__"` included. Refusing
    /// to propagate that key is the merge utility's job, not the parser's.
    pub fn from_json(&mut self, json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                let values = items.iter().map(|item| self.from_json(item)).collect();
                Value::Object(self.alloc_seq(values))
            }
            serde_json::Value::Object(entries) => {
                let handle = self.alloc_map();
                for (key, item) in entries {
                    let value = self.from_json(item);
                    if let Ok(map) = self.map_mut(handle) {
                        map.properties.insert(key.clone(), Property::data(value));
                    }
                }
                Value::Object(handle)
            }
        }
    }

    /// Encode a value as JSON, resolving handles through the heap. Getters
    /// are invoked; functions and undefined encode as null inside sequences
    /// and are skipped in maps; non-finite floats encode as null. A
    /// composite appearing twice on the same path is a
    /// [`Error::CircularReference`].
    pub fn to_json(&mut self, value: &Value) -> Result<serde_json::Value> {
        let mut on_path = BTreeSet::new();
        self.encode(value, &mut on_path)
    }

    fn encode(
        &mut self,
        value: &Value,
        on_path: &mut BTreeSet<ObjectRef>,
    ) -> Result<serde_json::Value> {
        match value {
            Value::Undefined | Value::Null | Value::Function(_) => Ok(serde_json::Value::Null),
            Value::Bool(b) => Ok(serde_json::Value::from(*b)),
            Value::Int(n) => Ok(serde_json::Value::from(*n)),
            Value::Float(x) => Ok(serde_json::Number::from_f64(*x)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null)),
            Value::Str(s) => Ok(serde_json::Value::from(s.as_str())),
            Value::Object(h) => {
                if !on_path.insert(*h) {
                    return Err(Error::CircularReference);
                }
                let encoded = if let Some(items) = self.seq(*h)? {
                    let items: Vec<Value> = items.to_vec();
                    let mut out = Vec::with_capacity(items.len());
                    for item in &items {
                        out.push(self.encode(item, on_path)?);
                    }
                    serde_json::Value::Array(out)
                } else {
                    let keys = self.own_keys(*h, true)?;
                    let mut out = serde_json::Map::new();
                    for key in keys {
                        let item = self.get_property(*h, &key)?;
                        match item {
                            Value::Undefined | Value::Function(_) => {}
                            _ => {
                                out.insert(key, self.encode(&item, on_path)?);
                            }
                        }
                    }
                    serde_json::Value::Object(out)
                };
                on_path.remove(h);
                Ok(encoded)
            }
        }
    }
}
