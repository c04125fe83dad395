//! Array creation and element access (§3 `PrimitiveArray`, §4.1). Grounded on the
//! teacher's `newarray`/`anewarray` atype-code table in `jvm/mem/raw.rs`'s array
//! construction helpers, reimplemented against [`crate::heap::Heap`] instead of a
//! `jni`-typed `ObjectHandle::new_array::<T>()`.

use crate::error::JvmError;
use crate::heap::ArrayType;
use crate::instruction::{Flow, OpCtx};
use crate::resolve;

fn load_element(ctx: &mut OpCtx, expected: ArrayType) -> Result<(crate::heap::ObjectHandle, usize), JvmError> {
    let stack = &mut ctx.env.current_frame_mut().operand_stack;
    let index = stack.pop_i32() as usize;
    let array = stack.pop_ref().expect("array load requires a non-null arrayref");
    let atype = ctx.heap.with_array(array, |a| a.atype);
    assert_eq!(atype, expected, "array load opcode does not match array element type");
    Ok((array, index))
}

pub fn iaload(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let (array, index) = load_element(ctx, ArrayType::Int)?;
    let value = ctx.heap.with_array(array, |a| {
        i32::from_ne_bytes(a.data[index * 4..index * 4 + 4].try_into().unwrap())
    });
    ctx.env.current_frame_mut().operand_stack.push_i32(value);
    Ok(Flow::Continue)
}

pub fn laload(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let (array, index) = load_element(ctx, ArrayType::Long)?;
    let value = ctx.heap.with_array(array, |a| {
        i64::from_ne_bytes(a.data[index * 8..index * 8 + 8].try_into().unwrap())
    });
    ctx.env.current_frame_mut().operand_stack.push_i64(value);
    Ok(Flow::Continue)
}

pub fn baload(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let (array, index) = load_element(ctx, ArrayType::Byte)?;
    let value = ctx.heap.with_array(array, |a| a.data[index] as i8 as i32);
    ctx.env.current_frame_mut().operand_stack.push_i32(value);
    Ok(Flow::Continue)
}

pub fn caload(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let (array, index) = load_element(ctx, ArrayType::Char)?;
    let value = ctx.heap.with_array(array, |a| {
        u16::from_ne_bytes(a.data[index * 2..index * 2 + 2].try_into().unwrap()) as i32
    });
    ctx.env.current_frame_mut().operand_stack.push_i32(value);
    Ok(Flow::Continue)
}

pub fn saload(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let (array, index) = load_element(ctx, ArrayType::Short)?;
    let value = ctx.heap.with_array(array, |a| {
        i16::from_ne_bytes(a.data[index * 2..index * 2 + 2].try_into().unwrap()) as i32
    });
    ctx.env.current_frame_mut().operand_stack.push_i32(value);
    Ok(Flow::Continue)
}

pub fn aaload(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let (array, index) = load_element(ctx, ArrayType::Reference)?;
    let width = ArrayType::Reference.element_size();
    let raw = ctx.heap.with_array(array, |a| {
        i64::from_ne_bytes(a.data[index * width..index * width + width].try_into().unwrap())
    });
    ctx.env.current_frame_mut().operand_stack.push_ref(if raw < 0 {
        None
    } else {
        Some(crate::heap::ObjectHandle(raw as usize))
    });
    Ok(Flow::Continue)
}

fn store_prep(ctx: &mut OpCtx, width: usize) -> (crate::heap::ObjectHandle, usize, Vec<u8>) {
    let stack = &mut ctx.env.current_frame_mut().operand_stack;
    let value = stack.pop_bytes(width);
    let index = stack.pop_i32() as usize;
    let array = stack.pop_ref().expect("array store requires a non-null arrayref");
    (array, index, value)
}

pub fn iastore(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let (array, index, value) = store_prep(ctx, 4);
    assert_eq!(ctx.heap.with_array(array, |a| a.atype), ArrayType::Int);
    ctx.heap.with_array_mut(array, |a| a.data[index * 4..index * 4 + 4].copy_from_slice(&value));
    Ok(Flow::Continue)
}

pub fn lastore(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let (array, index, value) = store_prep(ctx, 8);
    assert_eq!(ctx.heap.with_array(array, |a| a.atype), ArrayType::Long);
    ctx.heap.with_array_mut(array, |a| a.data[index * 8..index * 8 + 8].copy_from_slice(&value));
    Ok(Flow::Continue)
}

pub fn bastore(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let stack = &mut ctx.env.current_frame_mut().operand_stack;
    let value = stack.pop_i32() as u8;
    let index = stack.pop_i32() as usize;
    let array = stack.pop_ref().expect("array store requires a non-null arrayref");
    assert_eq!(ctx.heap.with_array(array, |a| a.atype), ArrayType::Byte);
    ctx.heap.with_array_mut(array, |a| a.data[index] = value);
    Ok(Flow::Continue)
}

pub fn castore(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let stack = &mut ctx.env.current_frame_mut().operand_stack;
    let value = (stack.pop_i32() as u16).to_ne_bytes();
    let index = stack.pop_i32() as usize;
    let array = stack.pop_ref().expect("array store requires a non-null arrayref");
    assert_eq!(ctx.heap.with_array(array, |a| a.atype), ArrayType::Char);
    ctx.heap.with_array_mut(array, |a| a.data[index * 2..index * 2 + 2].copy_from_slice(&value));
    Ok(Flow::Continue)
}

pub fn sastore(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let stack = &mut ctx.env.current_frame_mut().operand_stack;
    let value = (stack.pop_i32() as i16).to_ne_bytes();
    let index = stack.pop_i32() as usize;
    let array = stack.pop_ref().expect("array store requires a non-null arrayref");
    assert_eq!(ctx.heap.with_array(array, |a| a.atype), ArrayType::Short);
    ctx.heap.with_array_mut(array, |a| a.data[index * 2..index * 2 + 2].copy_from_slice(&value));
    Ok(Flow::Continue)
}

pub fn aastore(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let width = ArrayType::Reference.element_size();
    let (array, index, value) = store_prep(ctx, width);
    assert_eq!(ctx.heap.with_array(array, |a| a.atype), ArrayType::Reference);
    ctx.heap.with_array_mut(array, |a| a.data[index * width..index * width + width].copy_from_slice(&value));
    Ok(Flow::Continue)
}

fn atype_from_code(code: u8) -> Result<ArrayType, JvmError> {
    Ok(match code {
        4 => ArrayType::Boolean,
        5 => ArrayType::Char,
        8 => ArrayType::Byte,
        9 => ArrayType::Short,
        10 => ArrayType::Int,
        11 => ArrayType::Long,
        6 | 7 => return Err(JvmError::UnsupportedDescriptor("float/double array".to_string())),
        other => return Err(JvmError::UnsupportedDescriptor(format!("newarray atype {}", other))),
    })
}

pub fn newarray(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let code = ctx.read_u8();
    let atype = atype_from_code(code)?;
    let length = ctx.env.current_frame_mut().operand_stack.pop_i32() as usize;
    let handle = ctx.heap.allocate_array(atype, length);
    ctx.env.current_frame_mut().operand_stack.push_ref(Some(handle));
    Ok(Flow::Continue)
}

/// The element class reference is resolved only to validate the constant-pool entry
/// (§4.2); the array itself is untyped beyond `ArrayType::Reference`, since this
/// engine's `PrimitiveArray` doesn't track a per-array element class (§9).
pub fn anewarray(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let index = ctx.read_u16();
    resolve::resolve_class_ref(ctx.registry, ctx.env, &ctx.class, index)?;
    let length = ctx.env.current_frame_mut().operand_stack.pop_i32() as usize;
    let handle = ctx.heap.allocate_array(ArrayType::Reference, length);
    ctx.env.current_frame_mut().operand_stack.push_ref(Some(handle));
    Ok(Flow::Continue)
}

pub fn arraylength(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let array = ctx.env.current_frame_mut().operand_stack.pop_ref().expect("arraylength requires a non-null arrayref");
    let length = ctx.heap.with_array(array, |a| a.length());
    ctx.env.current_frame_mut().operand_stack.push_i32(length as i32);
    Ok(Flow::Continue)
}
