//! Tagged constant-pool entries (§3, §9 "Tagged constant-pool entries").
//!
//! The resolution caches the source keeps as raw mutable struct fields become typed
//! fields here, guarded by `RefCell` since a `Class`'s constant pool is shared behind
//! an immutable `Rc<Class>` once registered.

use crate::class::{Class, Method};
use num_derive::FromPrimitive;
use std::cell::RefCell;
use std::rc::Rc;

use crate::types::FieldDescriptor;

/// Leading tag byte of a constant-pool entry, as laid out in the class file.
///
/// `Float`/`Double`/`MethodHandle`/`MethodType`/`InvokeDynamic` are listed so the parser
/// can skip their fixed-width payloads and keep later entries aligned (§10); none of
/// these variants is ever the target of this engine's resolver, since floating point and
/// `invokedynamic` call sites are both out of scope (§1).
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive)]
pub enum ConstantTag {
    Utf8 = 1,
    Integer = 3,
    Float = 4,
    Long = 5,
    Double = 6,
    Class = 7,
    String = 8,
    FieldRef = 9,
    MethodRef = 10,
    InterfaceMethodRef = 11,
    NameAndType = 12,
    MethodHandle = 15,
    MethodType = 16,
    InvokeDynamic = 18,
}

/// A resolved method binding: which class's method table the method lives in, and its
/// index in that class's `methods` vector. Kept as an index rather than a raw pointer
/// so the cache can live in safe Rust behind an `Rc`.
#[derive(Debug, Clone)]
pub struct MethodEntry {
    pub owner: Rc<Class>,
    pub method_index: usize,
}

impl MethodEntry {
    pub fn method(&self) -> &Method {
        &self.owner.methods[self.method_index]
    }
}

/// Per-call-site virtual-dispatch cache: receiver class name -> resolved method.
/// A linear scan is adequate (§9 "Virtual-dispatch cache") since any one call site only
/// ever sees a handful of distinct receiver classes in practice.
#[derive(Debug, Default)]
pub struct MethodTable {
    entries: Vec<(String, MethodEntry)>,
}

impl MethodTable {
    pub fn get(&self, receiver_class: &str) -> Option<&MethodEntry> {
        self.entries.iter().find(|(name, _)| name == receiver_class).map(|(_, e)| e)
    }

    pub fn insert(&mut self, receiver_class: String, entry: MethodEntry) {
        debug_assert!(self.get(&receiver_class).is_none());
        self.entries.push((receiver_class, entry));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Like [`MethodEntry`], carries the actual declaring class alongside the resolved slot
/// so a warm cache hit indexes the same `static_fields`/`fields` array a cold miss would
/// have (§4.4: the declaring ancestor, not whatever class the `FieldRef` itself names).
#[derive(Debug, Clone)]
pub struct FieldCache {
    pub owner: Rc<Class>,
    pub ftype: FieldDescriptor,
    pub findex: usize,
}

/// Either resolution outcome for a `MethodRef`: a direct binding (static/special
/// invocation) or a per-receiver-class `MethodTable` (virtual invocation). A given
/// constant-pool entry is only ever used by one invoke opcode in emitted bytecode, so
/// only one of these is ever populated for a given `MethodRef`.
#[derive(Debug, Default)]
pub struct MethodRefCache {
    pub direct: RefCell<Option<MethodEntry>>,
    pub args_len: RefCell<Option<usize>>,
    pub table: RefCell<MethodTable>,
}

#[derive(Debug)]
pub enum Constant {
    Utf8(String),
    Integer(i32),
    Long(i64),
    Class {
        name_index: u16,
        resolved: RefCell<Option<Rc<Class>>>,
    },
    String {
        string_index: u16,
    },
    FieldRef {
        class_index: u16,
        name_and_type_index: u16,
        cache: RefCell<Option<FieldCache>>,
    },
    MethodRef {
        class_index: u16,
        name_and_type_index: u16,
        cache: MethodRefCache,
    },
    InterfaceMethodRef {
        class_index: u16,
        name_and_type_index: u16,
        cache: MethodRefCache,
    },
    NameAndType {
        name_index: u16,
        descriptor_index: u16,
    },
    /// A structurally-parsed but otherwise inert entry (`Float`/`Double`/`MethodHandle`/
    /// `MethodType`/`InvokeDynamic`). Kept only so surrounding indices stay aligned; no
    /// resolver ever matches on this variant (§1, §9).
    Unsupported,
}

impl Constant {
    pub fn class_ref(class_index: u16) -> Self {
        Constant::Class { name_index: class_index, resolved: RefCell::new(None) }
    }

    pub fn method_ref(class_index: u16, name_and_type_index: u16) -> Self {
        Constant::MethodRef {
            class_index,
            name_and_type_index,
            cache: MethodRefCache::default(),
        }
    }

    pub fn interface_method_ref(class_index: u16, name_and_type_index: u16) -> Self {
        Constant::InterfaceMethodRef {
            class_index,
            name_and_type_index,
            cache: MethodRefCache::default(),
        }
    }

    pub fn field_ref(class_index: u16, name_and_type_index: u16) -> Self {
        Constant::FieldRef { class_index, name_and_type_index, cache: RefCell::new(None) }
    }
}
