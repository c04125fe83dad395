//! Constants, branches, and returns (§4.1, §4.5): the opcodes that don't touch a field,
//! method, or array.

use crate::constant_pool::Constant;
use crate::error::JvmError;
use crate::instruction::{Flow, OpCtx};

pub fn nop(_ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    Ok(Flow::Continue)
}

pub fn aconst_null(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    ctx.env.current_frame_mut().operand_stack.push_ref(None);
    Ok(Flow::Continue)
}

/// `iconst_m1`..`iconst_5`: opcode 0x02 is -1, 0x03 is 0, ... 0x08 is 5.
pub fn iconst_n(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let value = ctx.opcode as i32 - 3;
    ctx.env.current_frame_mut().operand_stack.push_i32(value);
    Ok(Flow::Continue)
}

/// `lconst_0`/`lconst_1`: opcode 0x09 is 0, 0x0a is 1.
pub fn lconst_n(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let value = (ctx.opcode - 0x09) as i64;
    ctx.env.current_frame_mut().operand_stack.push_i64(value);
    Ok(Flow::Continue)
}

pub fn bipush(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let value = ctx.read_i8() as i32;
    ctx.env.current_frame_mut().operand_stack.push_i32(value);
    Ok(Flow::Continue)
}

pub fn sipush(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let value = ctx.read_i16() as i32;
    ctx.env.current_frame_mut().operand_stack.push_i32(value);
    Ok(Flow::Continue)
}

fn ldc_integer(ctx: &mut OpCtx, index: u16) -> Result<Flow, JvmError> {
    match ctx.class.constant_pool.get(index as usize - 1) {
        Some(Constant::Integer(v)) => {
            let v = *v;
            ctx.env.current_frame_mut().operand_stack.push_i32(v);
            Ok(Flow::Continue)
        }
        _ => Err(JvmError::UnsupportedDescriptor(format!(
            "ldc of non-Integer constant at pool index {} in {}",
            index, ctx.class.name
        ))),
    }
}

pub fn ldc(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let index = ctx.read_u8() as u16;
    ldc_integer(ctx, index)
}

pub fn ldc_w(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let index = ctx.read_u16();
    ldc_integer(ctx, index)
}

pub fn ldc2_w(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let index = ctx.read_u16();
    match ctx.class.constant_pool.get(index as usize - 1) {
        Some(Constant::Long(v)) => {
            let v = *v;
            ctx.env.current_frame_mut().operand_stack.push_i64(v);
            Ok(Flow::Continue)
        }
        _ => Err(JvmError::UnsupportedDescriptor(format!(
            "ldc2_w of non-Long constant at pool index {} in {}",
            index, ctx.class.name
        ))),
    }
}

fn branch(ctx: &mut OpCtx, taken: bool) {
    let offset = ctx.read_i16();
    if taken {
        ctx.env.pc = (ctx.opcode_pc as i64 + offset as i64) as usize;
    }
}

macro_rules! int_compare {
    ($name:ident, $op:tt) => {
        pub fn $name(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
            let value = ctx.env.current_frame_mut().operand_stack.pop_i32();
            let taken = value $op 0;
            branch(ctx, taken);
            Ok(Flow::Continue)
        }
    };
}

int_compare!(ifeq, ==);
int_compare!(ifne, !=);
int_compare!(iflt, <);
int_compare!(ifge, >=);
int_compare!(ifgt, >);
int_compare!(ifle, <=);

macro_rules! int_cmp2 {
    ($name:ident, $op:tt) => {
        pub fn $name(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
            let rhs = ctx.env.current_frame_mut().operand_stack.pop_i32();
            let lhs = ctx.env.current_frame_mut().operand_stack.pop_i32();
            let taken = lhs $op rhs;
            branch(ctx, taken);
            Ok(Flow::Continue)
        }
    };
}

int_cmp2!(if_icmpeq, ==);
int_cmp2!(if_icmpne, !=);
int_cmp2!(if_icmplt, <);
int_cmp2!(if_icmpge, >=);
int_cmp2!(if_icmpgt, >);
int_cmp2!(if_icmple, <=);

pub fn if_acmpeq(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let rhs = ctx.env.current_frame_mut().operand_stack.pop_ref();
    let lhs = ctx.env.current_frame_mut().operand_stack.pop_ref();
    branch(ctx, lhs == rhs);
    Ok(Flow::Continue)
}

pub fn if_acmpne(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let rhs = ctx.env.current_frame_mut().operand_stack.pop_ref();
    let lhs = ctx.env.current_frame_mut().operand_stack.pop_ref();
    branch(ctx, lhs != rhs);
    Ok(Flow::Continue)
}

pub fn goto(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    branch(ctx, true);
    Ok(Flow::Continue)
}

pub fn ireturn(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let v = ctx.env.current_frame_mut().operand_stack.pop_i32();
    Ok(Flow::Return(v.to_ne_bytes().to_vec()))
}

pub fn lreturn(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let v = ctx.env.current_frame_mut().operand_stack.pop_i64();
    Ok(Flow::Return(v.to_ne_bytes().to_vec()))
}

pub fn areturn(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let v = ctx.env.current_frame_mut().operand_stack.pop_bytes(crate::types::SZ_REF);
    Ok(Flow::Return(v))
}

pub fn vreturn(_ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    Ok(Flow::Return(Vec::new()))
}
