//! Stack frame and byte-addressed operand stack (§3 `StackFrame`, §4.1).
//!
//! The call stack itself is kept as a plain `Vec<Frame>` in [`crate::environment::Environment`]
//! rather than as a linked list of raw "previous frame" pointers — idiomatic Rust ownership
//! in place of the source's pointer chasing, with identical externally observable behavior.

use std::rc::Rc;

use crate::class::Class;
use crate::error::JvmError;

/// A byte-addressed, growable-by-construction operand stack region. `sp` is the number
/// of live bytes; push/pop work purely in terms of byte counts, matching §4.1's single
/// block-copy argument-passing convention.
#[derive(Debug)]
pub struct OperandStack {
    bytes: Vec<u8>,
    max_stack: usize,
}

impl OperandStack {
    pub fn new(max_stack: usize) -> Self {
        OperandStack { bytes: Vec::with_capacity(max_stack), max_stack }
    }

    pub fn sp(&self) -> usize {
        self.bytes.len()
    }

    pub fn push_bytes(&mut self, data: &[u8]) {
        debug_assert!(
            self.bytes.len() + data.len() <= self.max_stack,
            "operand stack overflow: {} + {} > {}",
            self.bytes.len(),
            data.len(),
            self.max_stack
        );
        self.bytes.extend_from_slice(data);
    }

    pub fn pop_bytes(&mut self, len: usize) -> Vec<u8> {
        let start = self.bytes.len().checked_sub(len).expect("operand stack underflow");
        self.bytes.split_off(start)
    }

    pub fn push_i32(&mut self, v: i32) {
        self.push_bytes(&v.to_ne_bytes());
    }

    pub fn pop_i32(&mut self) -> i32 {
        let bytes = self.pop_bytes(4);
        i32::from_ne_bytes(bytes.try_into().unwrap())
    }

    pub fn push_i64(&mut self, v: i64) {
        self.push_bytes(&v.to_ne_bytes());
    }

    pub fn pop_i64(&mut self) -> i64 {
        let bytes = self.pop_bytes(8);
        i64::from_ne_bytes(bytes.try_into().unwrap())
    }

    pub fn push_ref(&mut self, v: Option<crate::heap::ObjectHandle>) {
        let raw: i64 = match v {
            Some(h) => h.0 as i64,
            None => -1,
        };
        self.push_bytes(&raw.to_ne_bytes());
    }

    pub fn pop_ref(&mut self) -> Option<crate::heap::ObjectHandle> {
        let bytes = self.pop_bytes(crate::types::SZ_REF);
        let raw = i64::from_ne_bytes(bytes.try_into().unwrap());
        if raw < 0 {
            None
        } else {
            Some(crate::heap::ObjectHandle(raw as usize))
        }
    }
}

/// Saved coordinates needed to resume the caller after a method returns.
#[derive(Debug, Clone)]
pub struct CallerContext {
    pub pc: usize,
    pub pc_start: usize,
    pub pc_end: usize,
    pub class: Rc<Class>,
}

#[derive(Debug)]
pub struct Frame {
    pub locals: Vec<u8>,
    pub operand_stack: OperandStack,
    pub owner_class: Rc<Class>,
    pub method_index: usize,
    pub caller: Option<CallerContext>,
    pub receiver: Option<crate::heap::ObjectHandle>,
}

impl Frame {
    pub fn new(
        owner_class: Rc<Class>,
        method_index: usize,
        caller: Option<CallerContext>,
        receiver: Option<crate::heap::ObjectHandle>,
    ) -> Result<Self, JvmError> {
        let method = &owner_class.methods[method_index];
        let code = method.code.as_ref().expect("frame requires a method with Code");
        Ok(Frame {
            locals: vec![0u8; code.max_locals],
            operand_stack: OperandStack::new(code.max_stack),
            owner_class,
            method_index,
            caller,
            receiver,
        })
    }

    pub fn code(&self) -> &[u8] {
        &self.owner_class.methods[self.method_index].code.as_ref().unwrap().code
    }

    pub fn write_local(&mut self, offset: usize, data: &[u8]) {
        self.locals[offset..offset + data.len()].copy_from_slice(data);
    }

    pub fn read_local(&self, offset: usize, len: usize) -> &[u8] {
        &self.locals[offset..offset + len]
    }
}
