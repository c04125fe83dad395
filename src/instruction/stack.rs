//! Stack-shuffle opcodes (§4.1): `pop`/`dup`/`swap` and friends. This engine has no
//! bytecode verifier (§1 non-goal), so a handler can't know a stack value's category
//! from the opcode alone; every opcode in this family is defined over a single fixed
//! 8-byte unit (`WIDTH_WIDE`, matching `long`/reference width — see DESIGN.md). Test
//! fixtures that need to duplicate a 4-byte `int` do so via a local-variable round
//! trip rather than `dup` directly.

use crate::error::JvmError;
use crate::instruction::{Flow, OpCtx, WIDTH_WIDE};

pub fn pop(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    ctx.env.current_frame_mut().operand_stack.pop_bytes(WIDTH_WIDE);
    Ok(Flow::Continue)
}

pub fn pop2(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    ctx.env.current_frame_mut().operand_stack.pop_bytes(WIDTH_WIDE * 2);
    Ok(Flow::Continue)
}

pub fn dup(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let top = ctx.env.current_frame_mut().operand_stack.pop_bytes(WIDTH_WIDE);
    let stack = &mut ctx.env.current_frame_mut().operand_stack;
    stack.push_bytes(&top);
    stack.push_bytes(&top);
    Ok(Flow::Continue)
}

pub fn dup_x1(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let stack = &mut ctx.env.current_frame_mut().operand_stack;
    let top = stack.pop_bytes(WIDTH_WIDE);
    let second = stack.pop_bytes(WIDTH_WIDE);
    stack.push_bytes(&top);
    stack.push_bytes(&second);
    stack.push_bytes(&top);
    Ok(Flow::Continue)
}

pub fn dup_x2(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let stack = &mut ctx.env.current_frame_mut().operand_stack;
    let top = stack.pop_bytes(WIDTH_WIDE);
    let second = stack.pop_bytes(WIDTH_WIDE);
    let third = stack.pop_bytes(WIDTH_WIDE);
    stack.push_bytes(&top);
    stack.push_bytes(&third);
    stack.push_bytes(&second);
    stack.push_bytes(&top);
    Ok(Flow::Continue)
}

pub fn dup2(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let stack = &mut ctx.env.current_frame_mut().operand_stack;
    let top = stack.pop_bytes(WIDTH_WIDE);
    let second = stack.pop_bytes(WIDTH_WIDE);
    stack.push_bytes(&second);
    stack.push_bytes(&top);
    stack.push_bytes(&second);
    stack.push_bytes(&top);
    Ok(Flow::Continue)
}

pub fn dup2_x1(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let stack = &mut ctx.env.current_frame_mut().operand_stack;
    let top = stack.pop_bytes(WIDTH_WIDE);
    let second = stack.pop_bytes(WIDTH_WIDE);
    let third = stack.pop_bytes(WIDTH_WIDE);
    stack.push_bytes(&second);
    stack.push_bytes(&top);
    stack.push_bytes(&third);
    stack.push_bytes(&second);
    stack.push_bytes(&top);
    Ok(Flow::Continue)
}

pub fn dup2_x2(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let stack = &mut ctx.env.current_frame_mut().operand_stack;
    let top = stack.pop_bytes(WIDTH_WIDE);
    let second = stack.pop_bytes(WIDTH_WIDE);
    let third = stack.pop_bytes(WIDTH_WIDE);
    let fourth = stack.pop_bytes(WIDTH_WIDE);
    stack.push_bytes(&second);
    stack.push_bytes(&top);
    stack.push_bytes(&fourth);
    stack.push_bytes(&third);
    stack.push_bytes(&second);
    stack.push_bytes(&top);
    Ok(Flow::Continue)
}

pub fn swap(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let stack = &mut ctx.env.current_frame_mut().operand_stack;
    let top = stack.pop_bytes(WIDTH_WIDE);
    let second = stack.pop_bytes(WIDTH_WIDE);
    stack.push_bytes(&top);
    stack.push_bytes(&second);
    Ok(Flow::Continue)
}
