//! Local variable load/store (§4.1). The byte-addressed locals region means the
//! explicit-operand forms (`iload`, `astore`, ...) take a direct byte offset, while the
//! compact `_0.._3` forms multiply their implicit index by the family's element width
//! (see [`crate::instruction::WIDTH_INT`]/[`WIDTH_WIDE`]) rather than a uniform JVM slot.

use crate::error::JvmError;
use crate::instruction::{Flow, OpCtx, WIDTH_INT, WIDTH_WIDE};

pub fn iload(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let offset = ctx.read_u8() as usize;
    load_i32(ctx, offset)
}

pub fn iload_n(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let offset = (ctx.opcode - 0x1a) as usize * WIDTH_INT;
    load_i32(ctx, offset)
}

fn load_i32(ctx: &mut OpCtx, offset: usize) -> Result<Flow, JvmError> {
    let frame = ctx.env.current_frame_mut();
    let bytes = frame.read_local(offset, WIDTH_INT);
    let value = i32::from_ne_bytes(bytes.try_into().unwrap());
    frame.operand_stack.push_i32(value);
    Ok(Flow::Continue)
}

pub fn istore(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let offset = ctx.read_u8() as usize;
    store_i32(ctx, offset)
}

pub fn istore_n(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let offset = (ctx.opcode - 0x3b) as usize * WIDTH_INT;
    store_i32(ctx, offset)
}

fn store_i32(ctx: &mut OpCtx, offset: usize) -> Result<Flow, JvmError> {
    let frame = ctx.env.current_frame_mut();
    let value = frame.operand_stack.pop_i32();
    frame.write_local(offset, &value.to_ne_bytes());
    Ok(Flow::Continue)
}

pub fn lload(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let offset = ctx.read_u8() as usize;
    load_i64(ctx, offset)
}

pub fn lload_n(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let offset = (ctx.opcode - 0x1e) as usize * WIDTH_WIDE;
    load_i64(ctx, offset)
}

fn load_i64(ctx: &mut OpCtx, offset: usize) -> Result<Flow, JvmError> {
    let frame = ctx.env.current_frame_mut();
    let bytes = frame.read_local(offset, WIDTH_WIDE);
    let value = i64::from_ne_bytes(bytes.try_into().unwrap());
    frame.operand_stack.push_i64(value);
    Ok(Flow::Continue)
}

pub fn lstore(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let offset = ctx.read_u8() as usize;
    store_i64(ctx, offset)
}

pub fn lstore_n(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let offset = (ctx.opcode - 0x3f) as usize * WIDTH_WIDE;
    store_i64(ctx, offset)
}

fn store_i64(ctx: &mut OpCtx, offset: usize) -> Result<Flow, JvmError> {
    let frame = ctx.env.current_frame_mut();
    let value = frame.operand_stack.pop_i64();
    frame.write_local(offset, &value.to_ne_bytes());
    Ok(Flow::Continue)
}

pub fn aload(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let offset = ctx.read_u8() as usize;
    load_ref(ctx, offset)
}

pub fn aload_n(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let offset = (ctx.opcode - 0x2a) as usize * WIDTH_WIDE;
    load_ref(ctx, offset)
}

fn load_ref(ctx: &mut OpCtx, offset: usize) -> Result<Flow, JvmError> {
    let frame = ctx.env.current_frame_mut();
    let bytes = frame.read_local(offset, WIDTH_WIDE).to_vec();
    frame.operand_stack.push_bytes(&bytes);
    Ok(Flow::Continue)
}

pub fn astore(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let offset = ctx.read_u8() as usize;
    store_ref(ctx, offset)
}

pub fn astore_n(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let offset = (ctx.opcode - 0x4b) as usize * WIDTH_WIDE;
    store_ref(ctx, offset)
}

fn store_ref(ctx: &mut OpCtx, offset: usize) -> Result<Flow, JvmError> {
    let frame = ctx.env.current_frame_mut();
    let bytes = frame.operand_stack.pop_bytes(WIDTH_WIDE);
    frame.write_local(offset, &bytes);
    Ok(Flow::Continue)
}
