//! Narrowing/widening conversions between the integer types this engine supports
//! (§4.1). `int`/`long` <-> `float`/`double` conversions are not registered (§1
//! non-goal).

use crate::error::JvmError;
use crate::instruction::{Flow, OpCtx};

pub fn i2l(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let stack = &mut ctx.env.current_frame_mut().operand_stack;
    let v = stack.pop_i32();
    stack.push_i64(v as i64);
    Ok(Flow::Continue)
}

pub fn l2i(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let stack = &mut ctx.env.current_frame_mut().operand_stack;
    let v = stack.pop_i64();
    stack.push_i32(v as i32);
    Ok(Flow::Continue)
}

pub fn i2b(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let stack = &mut ctx.env.current_frame_mut().operand_stack;
    let v = stack.pop_i32();
    stack.push_i32(v as i8 as i32);
    Ok(Flow::Continue)
}

pub fn i2c(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let stack = &mut ctx.env.current_frame_mut().operand_stack;
    let v = stack.pop_i32();
    stack.push_i32(v as u16 as i32);
    Ok(Flow::Continue)
}

pub fn i2s(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let stack = &mut ctx.env.current_frame_mut().operand_stack;
    let v = stack.pop_i32();
    stack.push_i32(v as i16 as i32);
    Ok(Flow::Continue)
}
