//! Field access, invocation, object creation, and type checks (§4.3, §4.4, §4.5, §4.7).
//!
//! Grounded structurally on `resolveClassStaticField`/`resolveClassVirtualMethod`/etc. in
//! `examples/original_source/src/myjvm/jvm.c`, with the actual dispatch work delegated to
//! [`crate::resolve`] — these handlers are thin: decode the constant-pool index, resolve,
//! shuffle operand-stack bytes, and either call into [`crate::native`] or push a frame.

use crate::error::JvmError;
use crate::heap::ObjectHandle;
use crate::instruction::{Flow, OpCtx};
use crate::native;
use crate::resolve::{self, MethodResolution};
use crate::types::SZ_REF;

/// Encodes a reference value the same way [`crate::frame::OperandStack::push_ref`] does,
/// for writing a receiver directly into a callee's locals region (§4.5: the receiver
/// occupies locals offset 0 on virtual/special invocation).
fn ref_bytes(handle: Option<ObjectHandle>) -> [u8; SZ_REF] {
    let raw: i64 = match handle {
        Some(h) => h.0 as i64,
        None => -1,
    };
    raw.to_ne_bytes()
}

pub fn getstatic(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let index = ctx.read_u16();
    let (owner, field) = resolve::resolve_static_field(ctx.registry, ctx.env, &ctx.class, index)?;
    let width = field.ftype.byte_size()?;
    let bytes = owner.static_fields.borrow()[field.findex][..width].to_vec();
    ctx.env.current_frame_mut().operand_stack.push_bytes(&bytes);
    Ok(Flow::Continue)
}

pub fn putstatic(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let index = ctx.read_u16();
    let (owner, field) = resolve::resolve_static_field(ctx.registry, ctx.env, &ctx.class, index)?;
    let width = field.ftype.byte_size()?;
    let value = ctx.env.current_frame_mut().operand_stack.pop_bytes(width);
    let mut slot = [0u8; 8];
    slot[..width].copy_from_slice(&value);
    owner.static_fields.borrow_mut()[field.findex] = slot;
    Ok(Flow::Continue)
}

pub fn getfield(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let index = ctx.read_u16();
    let (_owner, field) = resolve::resolve_instance_field(ctx.registry, ctx.env, &ctx.class, index)?;
    let width = field.ftype.byte_size()?;
    let receiver = ctx
        .env
        .current_frame_mut()
        .operand_stack
        .pop_ref()
        .expect("getfield requires a non-null receiver");
    let bytes = ctx.heap.with_object(receiver, |o| o.fields[field.findex][..width].to_vec());
    ctx.env.current_frame_mut().operand_stack.push_bytes(&bytes);
    Ok(Flow::Continue)
}

pub fn putfield(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let index = ctx.read_u16();
    let (_owner, field) = resolve::resolve_instance_field(ctx.registry, ctx.env, &ctx.class, index)?;
    let width = field.ftype.byte_size()?;
    let value = ctx.env.current_frame_mut().operand_stack.pop_bytes(width);
    let receiver = ctx
        .env
        .current_frame_mut()
        .operand_stack
        .pop_ref()
        .expect("putfield requires a non-null receiver");
    ctx.heap.with_object_mut(receiver, |o| {
        let mut slot = [0u8; 8];
        slot[..width].copy_from_slice(&value);
        o.fields[field.findex] = slot;
    });
    Ok(Flow::Continue)
}

pub fn new(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let index = ctx.read_u16();
    let class = resolve::resolve_class_ref(ctx.registry, ctx.env, &ctx.class, index)?;
    let handle = ctx.heap.allocate_object(class);
    ctx.env.current_frame_mut().operand_stack.push_ref(Some(handle));
    Ok(Flow::Continue)
}

/// §4.5 static invocation: resolve, pop the `args_len`-byte argument block, either route
/// to the native trampoline (no frame built, §4.7) or push a frame and install the args
/// at locals offset 0.
pub fn invokestatic(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let index = ctx.read_u16();
    match resolve::resolve_static_method(ctx.registry, ctx.env, &ctx.class, index)? {
        MethodResolution::Native { class_name, method_name } => {
            let args_len = resolve::method_descriptor_args_len(&ctx.class, index)?;
            let args = ctx.env.current_frame_mut().operand_stack.pop_bytes(args_len);
            native::invoke(ctx.heap, &class_name, &method_name, None, &args);
        }
        MethodResolution::Found { owner, method_index, args_len } => {
            let args = ctx.env.current_frame_mut().operand_stack.pop_bytes(args_len);
            ctx.env.push_frame(owner, method_index, None);
            ctx.env.current_frame_mut().write_local(0, &args);
        }
    }
    Ok(Flow::Continue)
}

/// §4.5 special invocation (constructors, private/super calls): identical to static
/// except the argument block is `args_len + SZ_REF` and the receiver lands in locals
/// slot 0.
pub fn invokespecial(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let index = ctx.read_u16();
    match resolve::resolve_special_method(ctx.registry, ctx.env, &ctx.class, index)? {
        MethodResolution::Native { class_name, method_name } => {
            let args_len = resolve::method_descriptor_args_len(&ctx.class, index)?;
            let args = ctx.env.current_frame_mut().operand_stack.pop_bytes(args_len);
            let receiver = ctx.env.current_frame_mut().operand_stack.pop_ref();
            native::invoke(ctx.heap, &class_name, &method_name, receiver, &args);
        }
        MethodResolution::Found { owner, method_index, args_len } => {
            let args = ctx.env.current_frame_mut().operand_stack.pop_bytes(args_len);
            let receiver = ctx.env.current_frame_mut().operand_stack.pop_ref();
            ctx.env.push_frame(owner, method_index, receiver);
            let mut locals = ref_bytes(receiver).to_vec();
            locals.extend_from_slice(&args);
            ctx.env.current_frame_mut().write_local(0, &locals);
        }
    }
    Ok(Flow::Continue)
}

/// §4.3 mode 3 / §4.5: resolve against the receiver's runtime class via the call site's
/// `MethodTable`, then dispatch the same as `invokespecial`'s instance-invocation shape.
/// Shared by `invokevirtual` and `invokeinterface` (§9: no real interface dispatch is
/// needed since interface method tables aren't modeled separately — both opcodes resolve
/// the same way once an object's concrete class is known).
fn virtual_dispatch(ctx: &mut OpCtx, index: u16) -> Result<Flow, JvmError> {
    let args_len = resolve::method_descriptor_args_len(&ctx.class, index)?;
    let args = ctx.env.current_frame_mut().operand_stack.pop_bytes(args_len);
    let receiver = ctx
        .env
        .current_frame_mut()
        .operand_stack
        .pop_ref()
        .expect("invokevirtual/invokeinterface requires a non-null receiver");
    let receiver_class = ctx.heap.class_of(receiver);

    match resolve::resolve_virtual_method(ctx.registry, ctx.env, &ctx.class, index, &receiver_class)? {
        MethodResolution::Native { class_name, method_name } => {
            native::invoke(ctx.heap, &class_name, &method_name, Some(receiver), &args);
        }
        MethodResolution::Found { owner, method_index, .. } => {
            ctx.env.push_frame(owner, method_index, Some(receiver));
            let mut locals = ref_bytes(Some(receiver)).to_vec();
            locals.extend_from_slice(&args);
            ctx.env.current_frame_mut().write_local(0, &locals);
        }
    }
    Ok(Flow::Continue)
}

pub fn invokevirtual(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let index = ctx.read_u16();
    virtual_dispatch(ctx, index)
}

/// `invokeinterface` carries two extra operand bytes after the constant-pool index
/// (argument count and a reserved zero byte) that this engine never needed for dispatch,
/// since `args_len` always comes from the descriptor — they're read here only to keep
/// `pc` aligned with the real bytecode stream.
pub fn invokeinterface(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let index = ctx.read_u16();
    let _count = ctx.read_u8();
    let _reserved = ctx.read_u8();
    virtual_dispatch(ctx, index)
}

fn is_instance_of(ctx: &mut OpCtx, index: u16, handle: ObjectHandle) -> Result<bool, JvmError> {
    let target = resolve::resolve_class_ref(ctx.registry, ctx.env, &ctx.class, index)?;
    let mut current = Some(ctx.heap.class_of(handle));
    while let Some(class) = current {
        if class.name == target.name {
            return Ok(true);
        }
        current = class.parent_class.borrow().clone();
    }
    Ok(false)
}

/// No bytecode verifier means a bad cast is a malformed-program condition rather than a
/// modeled `JvmError` (§1 non-goal); `null` always casts successfully, matching the JVM
/// spec.
pub fn checkcast(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let index = ctx.read_u16();
    let handle = ctx.env.current_frame_mut().operand_stack.pop_ref();
    if let Some(h) = handle {
        assert!(is_instance_of(ctx, index, h)?, "checkcast: invalid cast at pc {}", ctx.opcode_pc);
    }
    ctx.env.current_frame_mut().operand_stack.push_ref(handle);
    Ok(Flow::Continue)
}

pub fn instanceof(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let index = ctx.read_u16();
    let handle = ctx.env.current_frame_mut().operand_stack.pop_ref();
    let result = match handle {
        None => false,
        Some(h) => is_instance_of(ctx, index, h)?,
    };
    ctx.env.current_frame_mut().operand_stack.push_i32(result as i32);
    Ok(Flow::Continue)
}
