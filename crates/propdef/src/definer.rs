//! Defining properties through a bound pattern.
//!
//! A [`Definer`] is bound at creation to one target map and one pattern of
//! default flags. Each call composes the pattern with the caller's input
//! (a plain value, a runtime descriptor map, or a typed [`Descriptor`]) and
//! applies the result through the heap. Calls return the definer again, so
//! definitions chain:
//!
//! ```
//! use propdef::{Definer, Heap, Value, WRITABLE};
//!
//! let mut heap = Heap::new();
//! let obj = heap.alloc_map();
//! let define = Definer::with_pattern(obj, WRITABLE);
//! define
//!     .define(&mut heap, "name", Value::from("propdef"))?
//!     .define(&mut heap, "answer", Value::Int(42))?;
//! # propdef::Result::Ok(())
//! ```
//!
//! [`define_bare`](Definer::define_bare) skips the pattern entirely. That is
//! how accessor properties get defined: the default [`READABLE`] pattern
//! carries `writable = false`, which the storage layer refuses to combine
//! with accessors.

use std::cell::RefCell;

use crate::descriptor::{Descriptor, READABLE, descriptor_source};
use crate::error::Result;
use crate::heap::Heap;
use crate::value::{ObjectRef, Value};

// ---------------------------------------------------------------------------
// DefineInput
// ---------------------------------------------------------------------------

/// What a definer call accepts.
///
/// A [`Value`] goes through the duck-typing rule: if it validates as a
/// descriptor map it is treated as a partial description, otherwise it is
/// wrapped as the stored value. A typed [`Descriptor`] skips the runtime
/// check.
#[derive(Debug, Clone)]
pub enum DefineInput {
    Value(Value),
    Descriptor(Descriptor),
}

impl From<Value> for DefineInput {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Descriptor> for DefineInput {
    fn from(desc: Descriptor) -> Self {
        Self::Descriptor(desc)
    }
}

impl From<&str> for DefineInput {
    fn from(s: &str) -> Self {
        Self::Value(Value::from(s))
    }
}

impl From<String> for DefineInput {
    fn from(s: String) -> Self {
        Self::Value(Value::from(s))
    }
}

impl From<bool> for DefineInput {
    fn from(b: bool) -> Self {
        Self::Value(Value::from(b))
    }
}

impl From<i64> for DefineInput {
    fn from(n: i64) -> Self {
        Self::Value(Value::from(n))
    }
}

// ---------------------------------------------------------------------------
// Definer
// ---------------------------------------------------------------------------

/// A property definer bound to one target map and one pattern.
///
/// Stateless beyond the binding; cheap to clone; any number of definers may
/// share one pattern value.
#[derive(Debug, Clone)]
pub struct Definer {
    target: ObjectRef,
    pattern: Descriptor,
}

impl Definer {
    /// Bind `target` with the default [`READABLE`] pattern.
    pub fn new(target: ObjectRef) -> Self {
        Self::with_pattern(target, READABLE)
    }

    /// Bind `target` with an explicit pattern.
    pub fn with_pattern(target: ObjectRef, pattern: Descriptor) -> Self {
        Self { target, pattern }
    }

    pub fn target(&self) -> ObjectRef {
        self.target
    }

    pub fn pattern(&self) -> &Descriptor {
        &self.pattern
    }

    /// Define `name` on the target: compose the bound pattern with the
    /// input (input slots win) and apply the result. Storage-layer failures
    /// such as accessor/value contradictions or an incompatible
    /// redefinition of a non-configurable slot propagate untouched.
    pub fn define(&self, heap: &mut Heap, name: &str, input: impl Into<DefineInput>) -> Result<&Self> {
        self.apply(heap, name, input.into(), false)
    }

    /// Define `name` applying the input as-is, ignoring the bound pattern.
    pub fn define_bare(
        &self,
        heap: &mut Heap,
        name: &str,
        input: impl Into<DefineInput>,
    ) -> Result<&Self> {
        self.apply(heap, name, input.into(), true)
    }

    fn apply(&self, heap: &mut Heap, name: &str, input: DefineInput, bare: bool) -> Result<&Self> {
        let partial = match input {
            DefineInput::Descriptor(desc) => desc,
            DefineInput::Value(value) => match descriptor_source(heap, &value) {
                Some(source) => Descriptor::from_object(heap, source, name)?,
                None => Descriptor::of_value(value),
            },
        };
        let composed = if bare {
            partial
        } else {
            self.pattern.overlay(&partial)
        };
        heap.define(self.target, name, composed.to_property(name)?)?;
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// lazy
// ---------------------------------------------------------------------------

/// Define `name` on `target` as a lazily computed, cached property.
///
/// The slot starts as a configurable, non-enumerable accessor. The first
/// read runs `compute(heap, target)`, redefines the slot through a bare
/// definer as a non-writable, non-enumerable data property holding the
/// result, and returns it; later reads hit the data slot without touching
/// the getter. `compute` runs at most once: it is taken out of its cell
/// before the getter does anything else, and `&mut Heap` rules out
/// concurrent reads.
pub fn lazy<F>(heap: &mut Heap, target: ObjectRef, name: &str, compute: F) -> Result<()>
where
    F: FnOnce(&mut Heap, ObjectRef) -> Result<Value> + 'static,
{
    let compute = RefCell::new(Some(compute));
    let slot = name.to_string();
    let getter = heap.alloc_function(move |heap, this, _args| {
        let Some(compute) = compute.borrow_mut().take() else {
            // Only reachable by a re-entrant read while the value is still
            // being computed; the slot has no value yet.
            return Ok(Value::Undefined);
        };
        let value = compute(heap, this)?;
        Definer::new(this).define_bare(
            heap,
            &slot,
            Descriptor {
                configurable: Some(true),
                enumerable: Some(false),
                writable: Some(false),
                value: Some(value.clone()),
                ..Descriptor::default()
            },
        )?;
        Ok(value)
    });
    Definer::new(target).define_bare(
        heap,
        name,
        Descriptor {
            configurable: Some(true),
            enumerable: Some(false),
            get: Some(getter),
            ..Descriptor::default()
        },
    )?;
    Ok(())
}
