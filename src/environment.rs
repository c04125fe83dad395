//! The execution engine's cursor (§3 `Environment`): PC, current class, current frame,
//! current receiver, call depth. The live frame chain is kept as a `Vec<Frame>` owned
//! here rather than a linked list of raw pointers (see frame.rs).

use std::rc::Rc;

use crate::class::Class;
use crate::frame::{CallerContext, Frame};
use crate::heap::ObjectHandle;

pub struct Environment {
    pub pc: usize,
    pub pc_start: usize,
    pub pc_end: usize,
    pub current_class: Rc<Class>,
    pub is_clinit: bool,
    pub call_depth: usize,
    frames: Vec<Frame>,
}

impl Environment {
    /// Construct a fresh environment with a single bottom frame for `method_index` on
    /// `owner_class`, no caller link (§4.6: used both for `<clinit>` and for `main`).
    pub fn new(owner_class: Rc<Class>, method_index: usize, is_clinit: bool) -> Self {
        let code_len = owner_class.methods[method_index]
            .code
            .as_ref()
            .map(|c| c.code.len())
            .unwrap_or(0);
        let frame = Frame::new(owner_class.clone(), method_index, None, None).unwrap();
        Environment {
            pc: 0,
            pc_start: 0,
            pc_end: code_len,
            current_class: owner_class,
            is_clinit,
            call_depth: 0,
            frames: vec![frame],
        }
    }

    pub fn current_frame(&self) -> &Frame {
        self.frames.last().expect("environment always has a bottom frame")
    }

    pub fn current_frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("environment always has a bottom frame")
    }

    pub fn current_receiver(&self) -> Option<ObjectHandle> {
        self.current_frame().receiver
    }

    pub fn is_bottom(&self) -> bool {
        self.frames.len() == 1
    }

    /// Push a new frame for invocation (§4.5), capturing the caller's PC triple and
    /// class so `pop_frame` can restore them. Sets the environment's cursor onto the
    /// callee.
    pub fn push_frame(&mut self, owner_class: Rc<Class>, method_index: usize, receiver: Option<ObjectHandle>) {
        let caller = CallerContext {
            pc: self.pc,
            pc_start: self.pc_start,
            pc_end: self.pc_end,
            class: self.current_class.clone(),
        };
        let code_len = owner_class.methods[method_index]
            .code
            .as_ref()
            .map(|c| c.code.len())
            .unwrap_or(0);
        let frame = Frame::new(owner_class.clone(), method_index, Some(caller), receiver).unwrap();
        self.frames.push(frame);
        self.current_class = owner_class;
        self.pc = 0;
        self.pc_start = 0;
        self.pc_end = code_len;
        self.call_depth += 1;
    }

    /// Pop the current frame on return (§4.5), restoring the caller's PC triple and
    /// class. Returns the popped frame so the caller can read its operand stack if the
    /// return value needs to be forwarded by the `return` opcode handler.
    pub fn pop_frame(&mut self) -> Frame {
        let frame = self.frames.pop().expect("cannot pop the bottom frame");
        if let Some(caller) = &frame.caller {
            self.pc = caller.pc;
            self.pc_start = caller.pc_start;
            self.pc_end = caller.pc_end;
            self.current_class = caller.class.clone();
            self.call_depth -= 1;
        }
        frame
    }
}
