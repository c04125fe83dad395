//! Object and primitive-array heap representation (§3 `Object`, `PrimitiveArray`).
//!
//! Grounded on the shape of the teacher's `RawObject`/`ObjectReference`/`ArrayReference`
//! traits in `jvm/mem/raw.rs`, with the `gc`-crate tracing machinery dropped entirely
//! (§1 non-goal: no garbage collector, objects live until process exit — see
//! DESIGN.md). Storage is a simple grow-only arena of boxed values; handles are plain
//! indices, which keeps the whole heap representable in safe Rust.

use std::cell::RefCell;
use std::rc::Rc;

use crate::class::Class;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ObjectHandle(pub usize);

#[derive(Debug)]
pub enum HeapValue {
    Object(Object),
    Array(PrimitiveArray),
}

#[derive(Debug)]
pub struct Object {
    pub class: Rc<Class>,
    /// Flat instance-field storage, one 8-byte slot per field (see `FieldSlot`,
    /// §4.4/§9: a deliberate simplification of literal byte-offset packing).
    pub fields: Vec<[u8; 8]>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ArrayType {
    Byte,
    Char,
    Short,
    Int,
    Long,
    Boolean,
    Reference,
}

impl ArrayType {
    pub fn element_size(self) -> usize {
        match self {
            ArrayType::Byte | ArrayType::Boolean => 1,
            ArrayType::Char | ArrayType::Short => 2,
            ArrayType::Int => 4,
            ArrayType::Long => 8,
            ArrayType::Reference => crate::types::SZ_REF,
        }
    }
}

#[derive(Debug)]
pub struct PrimitiveArray {
    pub atype: ArrayType,
    pub data: Vec<u8>,
}

impl PrimitiveArray {
    pub fn new(atype: ArrayType, length: usize) -> Self {
        PrimitiveArray { atype, data: vec![0u8; length * atype.element_size()] }
    }

    pub fn length(&self) -> usize {
        self.data.len() / self.atype.element_size()
    }
}

/// Grow-only heap arena. Never frees: matches the §1 non-goal of no garbage collection.
#[derive(Default)]
pub struct Heap {
    values: RefCell<Vec<HeapValue>>,
}

impl Heap {
    pub fn new() -> Self {
        Heap { values: RefCell::new(Vec::new()) }
    }

    pub fn allocate_object(&self, class: Rc<Class>) -> ObjectHandle {
        let fields = vec![[0u8; 8]; class.instance_field_count];
        let mut values = self.values.borrow_mut();
        values.push(HeapValue::Object(Object { class, fields }));
        ObjectHandle(values.len() - 1)
    }

    pub fn allocate_array(&self, atype: ArrayType, length: usize) -> ObjectHandle {
        let mut values = self.values.borrow_mut();
        values.push(HeapValue::Array(PrimitiveArray::new(atype, length)));
        ObjectHandle(values.len() - 1)
    }

    pub fn with_object<R>(&self, handle: ObjectHandle, f: impl FnOnce(&Object) -> R) -> R {
        match &self.values.borrow()[handle.0] {
            HeapValue::Object(obj) => f(obj),
            HeapValue::Array(_) => panic!("handle {:?} is an array, not an object", handle),
        }
    }

    pub fn with_object_mut<R>(&self, handle: ObjectHandle, f: impl FnOnce(&mut Object) -> R) -> R {
        match &mut self.values.borrow_mut()[handle.0] {
            HeapValue::Object(obj) => f(obj),
            HeapValue::Array(_) => panic!("handle {:?} is an array, not an object", handle),
        }
    }

    pub fn with_array<R>(&self, handle: ObjectHandle, f: impl FnOnce(&PrimitiveArray) -> R) -> R {
        match &self.values.borrow()[handle.0] {
            HeapValue::Array(arr) => f(arr),
            HeapValue::Object(_) => panic!("handle {:?} is an object, not an array", handle),
        }
    }

    pub fn with_array_mut<R>(&self, handle: ObjectHandle, f: impl FnOnce(&mut PrimitiveArray) -> R) -> R {
        match &mut self.values.borrow_mut()[handle.0] {
            HeapValue::Array(arr) => f(arr),
            HeapValue::Object(_) => panic!("handle {:?} is an object, not an array", handle),
        }
    }

    pub fn class_of(&self, handle: ObjectHandle) -> Rc<Class> {
        self.with_object(handle, |o| o.class.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::empty_class;
    use std::rc::Rc;

    #[test]
    fn array_round_trip() {
        let heap = Heap::new();
        let handle = heap.allocate_array(ArrayType::Char, 5);
        heap.with_array_mut(handle, |arr| {
            arr.data[0..2].copy_from_slice(&(b'h' as u16).to_ne_bytes());
        });
        heap.with_array(handle, |arr| {
            assert_eq!(arr.length(), 5);
            assert_eq!(u16::from_ne_bytes([arr.data[0], arr.data[1]]), b'h' as u16);
        });
    }

    #[test]
    fn object_field_slots_are_independent() {
        let heap = Heap::new();
        let mut class = empty_class("A");
        class.instance_field_count = 2;
        let handle = heap.allocate_object(Rc::new(class));
        heap.with_object_mut(handle, |o| {
            o.fields[1][0..4].copy_from_slice(&7i32.to_ne_bytes());
        });
        heap.with_object(handle, |o| {
            assert_eq!(i32::from_ne_bytes(o.fields[1][0..4].try_into().unwrap()), 7);
            assert_eq!(o.fields[0], [0u8; 8]);
        });
    }
}
