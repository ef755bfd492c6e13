//! Descriptor-level property mixing.

use crate::error::Result;
use crate::heap::Heap;
use crate::value::ObjectRef;

/// Copy every own property of each source map onto `target`, in argument
/// order. The copy is descriptor-level, not value-level, so accessor pairs
/// and flags survive it, and non-enumerable properties come along too.
/// Later sources overwrite earlier ones and any pre-existing slot of the
/// same name, subject to the storage layer's redefinition rules. The copy is
/// a snapshot: redefining a slot on a source afterwards does not reach the
/// target (nested composites stay shared by handle, as everywhere else).
///
/// Returns the mutated `target` handle.
pub fn mixin(heap: &mut Heap, target: ObjectRef, sources: &[ObjectRef]) -> Result<ObjectRef> {
    for &source in sources {
        for name in heap.own_keys(source, false)? {
            let Some(prop) = heap.own_property(source, &name)? else {
                continue;
            };
            heap.define(target, &name, prop)?;
        }
    }
    Ok(target)
}
