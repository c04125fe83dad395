//! Test-only helpers for building `Class` values and raw `.class` byte fixtures without
//! a Java toolchain in the loop (§15). Two levels are offered: [`empty_class`] for tests
//! that only need a nameable `Class` handle, and [`ClassBuilder`] for tests that need
//! real bytecode run through the actual parser and dispatch loop.

use std::cell::{Cell, RefCell};
use std::path::Path;

use crate::class::{Class, ClassAccessFlags};
use crate::types::{parse_descriptor, FieldDescriptor};
use crate::version::ClassVersion;

pub fn empty_class(name: &str) -> Class {
    Class {
        name: name.to_string(),
        version: ClassVersion(0, 52),
        access_flags: ClassAccessFlags::PUBLIC,
        super_class_index: 0,
        constant_pool: Vec::new(),
        fields: Vec::new(),
        methods: Vec::new(),
        static_field_count: 0,
        instance_field_count: 0,
        parent_class: RefCell::new(None),
        clinit_runned: Cell::new(false),
        static_fields: RefCell::new(Vec::new()),
    }
}

/// Builds a constant pool incrementally, deduplicating `Utf8`/`Class`/`NameAndType`
/// entries by value, and serializes the whole class file to bytes for
/// [`Class::parse`] to consume.
pub struct ClassBuilder {
    name: String,
    super_name: Option<String>,
    pool: Vec<PoolEntry>,
    fields: Vec<FieldSpec>,
    methods: Vec<MethodSpec>,
}

enum PoolEntry {
    Utf8(String),
    Class { name_index: u16 },
    NameAndType { name_index: u16, descriptor_index: u16 },
    FieldRef { class_index: u16, nat_index: u16 },
    MethodRef { class_index: u16, nat_index: u16 },
}

struct FieldSpec {
    is_static: bool,
    name: String,
    descriptor: String,
}

struct MethodSpec {
    is_static: bool,
    is_native: bool,
    is_public: bool,
    name: String,
    descriptor: String,
    max_stack: u16,
    max_locals: u16,
    code: Vec<u8>,
}

impl ClassBuilder {
    pub fn new(name: &str, super_name: Option<&str>) -> Self {
        ClassBuilder {
            name: name.to_string(),
            super_name: super_name.map(|s| s.to_string()),
            pool: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    fn utf8(&mut self, s: &str) -> u16 {
        for (i, entry) in self.pool.iter().enumerate() {
            if let PoolEntry::Utf8(existing) = entry {
                if existing == s {
                    return (i + 1) as u16;
                }
            }
        }
        self.pool.push(PoolEntry::Utf8(s.to_string()));
        self.pool.len() as u16
    }

    pub fn class_entry(&mut self, name: &str) -> u16 {
        let name_index = self.utf8(name);
        for (i, entry) in self.pool.iter().enumerate() {
            if let PoolEntry::Class { name_index: n } = entry {
                if *n == name_index {
                    return (i + 1) as u16;
                }
            }
        }
        self.pool.push(PoolEntry::Class { name_index });
        self.pool.len() as u16
    }

    fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.pool.push(PoolEntry::NameAndType { name_index, descriptor_index });
        self.pool.len() as u16
    }

    pub fn method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class_entry(class);
        let nat_index = self.name_and_type(name, descriptor);
        self.pool.push(PoolEntry::MethodRef { class_index, nat_index });
        self.pool.len() as u16
    }

    pub fn field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class_entry(class);
        let nat_index = self.name_and_type(name, descriptor);
        self.pool.push(PoolEntry::FieldRef { class_index, nat_index });
        self.pool.len() as u16
    }

    pub fn add_field(&mut self, is_static: bool, name: &str, descriptor: &str) -> &mut Self {
        self.fields.push(FieldSpec { is_static, name: name.to_string(), descriptor: descriptor.to_string() });
        self
    }

    pub fn add_method(
        &mut self,
        is_static: bool,
        is_native: bool,
        name: &str,
        descriptor: &str,
        max_stack: u16,
        max_locals: u16,
        code: Vec<u8>,
    ) -> &mut Self {
        self.methods.push(MethodSpec {
            is_static,
            is_native,
            is_public: true,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            max_stack,
            max_locals,
            code,
        });
        self
    }

    pub fn build_bytes(mut self) -> Vec<u8> {
        let this_class = self.class_entry(&self.name.clone());
        let super_class = match self.super_name.clone() {
            Some(s) => self.class_entry(&s),
            None => 0,
        };

        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFEBABEu32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes()); // minor
        out.extend_from_slice(&52u16.to_be_bytes()); // major

        out.extend_from_slice(&((self.pool.len() + 1) as u16).to_be_bytes());
        for entry in &self.pool {
            match entry {
                PoolEntry::Utf8(s) => {
                    out.push(1);
                    out.extend_from_slice(&(s.len() as u16).to_be_bytes());
                    out.extend_from_slice(s.as_bytes());
                }
                PoolEntry::Class { name_index } => {
                    out.push(7);
                    out.extend_from_slice(&name_index.to_be_bytes());
                }
                PoolEntry::NameAndType { name_index, descriptor_index } => {
                    out.push(12);
                    out.extend_from_slice(&name_index.to_be_bytes());
                    out.extend_from_slice(&descriptor_index.to_be_bytes());
                }
                PoolEntry::FieldRef { class_index, nat_index } => {
                    out.push(9);
                    out.extend_from_slice(&class_index.to_be_bytes());
                    out.extend_from_slice(&nat_index.to_be_bytes());
                }
                PoolEntry::MethodRef { class_index, nat_index } => {
                    out.push(10);
                    out.extend_from_slice(&class_index.to_be_bytes());
                    out.extend_from_slice(&nat_index.to_be_bytes());
                }
            }
        }

        out.extend_from_slice(&(ClassAccessFlags::PUBLIC.bits()).to_be_bytes());
        out.extend_from_slice(&this_class.to_be_bytes());
        out.extend_from_slice(&super_class.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes()); // interfaces_count

        out.extend_from_slice(&(self.fields.len() as u16).to_be_bytes());
        for field in &self.fields {
            let flags: u16 = if field.is_static { 0x0009 } else { 0x0001 };
            let name_index = self.utf8_in(&field.name);
            let descriptor_index = self.utf8_in(&field.descriptor);
            out.extend_from_slice(&flags.to_be_bytes());
            out.extend_from_slice(&name_index.to_be_bytes());
            out.extend_from_slice(&descriptor_index.to_be_bytes());
            out.extend_from_slice(&0u16.to_be_bytes()); // attributes_count
        }

        let code_utf8 = self.utf8("Code");
        out.extend_from_slice(&(self.methods.len() as u16).to_be_bytes());
        for method in &self.methods {
            let mut flags: u16 = 0;
            if method.is_public {
                flags |= 0x0001;
            }
            if method.is_static {
                flags |= 0x0008;
            }
            if method.is_native {
                flags |= 0x0100;
            }
            let name_index = self.utf8_in(&method.name);
            let descriptor_index = self.utf8_in(&method.descriptor);
            out.extend_from_slice(&flags.to_be_bytes());
            out.extend_from_slice(&name_index.to_be_bytes());
            out.extend_from_slice(&descriptor_index.to_be_bytes());

            if method.is_native {
                out.extend_from_slice(&0u16.to_be_bytes());
            } else {
                out.extend_from_slice(&1u16.to_be_bytes());
                out.extend_from_slice(&code_utf8.to_be_bytes());
                let attr_len: u32 = 2 + 2 + 4 + method.code.len() as u32 + 2 + 2;
                out.extend_from_slice(&attr_len.to_be_bytes());
                out.extend_from_slice(&method.max_stack.to_be_bytes());
                out.extend_from_slice(&method.max_locals.to_be_bytes());
                out.extend_from_slice(&(method.code.len() as u32).to_be_bytes());
                out.extend_from_slice(&method.code);
                out.extend_from_slice(&0u16.to_be_bytes()); // exception_table_length
                out.extend_from_slice(&0u16.to_be_bytes()); // attributes_count
            }
        }

        out.extend_from_slice(&0u16.to_be_bytes()); // class attributes_count
        out
    }

    fn utf8_in(&self, s: &str) -> u16 {
        for (i, entry) in self.pool.iter().enumerate() {
            if let PoolEntry::Utf8(existing) = entry {
                if existing == s {
                    return (i + 1) as u16;
                }
            }
        }
        unreachable!("utf8 {:?} must be interned before use", s)
    }
}

/// Parses the descriptor-syntax convenience used throughout the test scenarios, panics
/// on malformed input since these are fixtures, not untrusted data.
pub fn descriptor(text: &str) -> FieldDescriptor {
    parse_descriptor(text).unwrap()
}

/// Writes a built class file to `dir/<name>.class`, for registry/loader tests that need
/// a real classpath directory on disk.
pub fn write_class_file(
    dir: &Path,
    name: &str,
    super_name: Option<&str>,
    fields: &[(&str, &str, bool)],
    methods: Vec<(&str, &str, bool, bool, u16, u16, Vec<u8>)>,
) {
    let mut builder = ClassBuilder::new(name, super_name);
    for (fname, descriptor, is_static) in fields {
        builder.add_field(*is_static, fname, descriptor);
    }
    for (mname, descriptor, is_static, is_native, max_stack, max_locals, code) in methods {
        builder.add_method(is_static, is_native, mname, descriptor, max_stack, max_locals, code);
    }
    let bytes = builder.build_bytes();
    std::fs::write(dir.join(format!("{}.class", name)), bytes).unwrap();
}
