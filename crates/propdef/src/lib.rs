#![forbid(unsafe_code)]

//! Property descriptor validation, composition, and definition over a
//! managed object heap.
//!
//! The crate has two layers. The storage layer ([`heap`]) is a small
//! dynamically-shaped object model: property maps whose named slots carry
//! full descriptors (configurable / enumerable / writable / get / set /
//! value), sequences, and native functions, all owned by a [`Heap`] and
//! referenced through copyable handles. On top of it sits the descriptor
//! machinery this crate exists for:
//!
//! - [`is_descriptor`]: does a runtime value qualify as a descriptor?
//!   Decided purely by membership of its keys in the fixed six-name set.
//! - [`Definer`]: bound to one target and one pattern of default flags
//!   ([`READABLE`] or [`WRITABLE`], or your own), it composes the pattern
//!   with each call's input and applies the result.
//! - [`mixin`]: descriptor-level copy of own properties between maps.
//! - [`lazy`]: a self-replacing accessor that computes its value once.
//! - [`merge`], [`remove`], [`each`]: generic object utilities.
//!
//! ```
//! use propdef::{Definer, Heap, Value};
//!
//! let mut heap = Heap::new();
//! let obj = heap.alloc_map();
//! Definer::new(obj).define(&mut heap, "foo", Value::from("bar"))?;
//!
//! // Readable-pattern slots are hidden and hold their value.
//! assert!(heap.own_keys(obj, true)?.is_empty());
//! heap.set_property(obj, "foo", Value::from("x"))?;
//! assert_eq!(heap.get_property(obj, "foo")?, Value::from("bar"));
//! # propdef::Result::Ok(())
//! ```

pub mod definer;
pub mod descriptor;
pub mod error;
pub mod heap;
pub mod mixin;
pub mod util;
pub mod value;

pub use definer::{DefineInput, Definer, lazy};
pub use descriptor::{DESCRIPTOR_KEYS, Descriptor, READABLE, WRITABLE, is_descriptor};
pub use error::{Error, Result};
pub use heap::{Composite, Heap, MapObject, NativeFn, Property};
pub use mixin::mixin;
pub use util::{EachKey, MergeOptions, SequenceEquality, each, merge, merge_with, remove};
pub use value::{FnRef, ObjectRef, Value};
