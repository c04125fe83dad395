//! Integer and long arithmetic (§4.1). `float`/`double` opcodes are not registered
//! (§1 non-goal — see [`crate::types::FieldDescriptor::byte_size`]).

use crate::error::JvmError;
use crate::instruction::{Flow, OpCtx};

macro_rules! int_binop {
    ($name:ident, $op:expr) => {
        pub fn $name(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
            let stack = &mut ctx.env.current_frame_mut().operand_stack;
            let rhs = stack.pop_i32();
            let lhs = stack.pop_i32();
            let f: fn(i32, i32) -> i32 = $op;
            stack.push_i32(f(lhs, rhs));
            Ok(Flow::Continue)
        }
    };
}

macro_rules! long_binop {
    ($name:ident, $op:expr) => {
        pub fn $name(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
            let stack = &mut ctx.env.current_frame_mut().operand_stack;
            let rhs = stack.pop_i64();
            let lhs = stack.pop_i64();
            let f: fn(i64, i64) -> i64 = $op;
            stack.push_i64(f(lhs, rhs));
            Ok(Flow::Continue)
        }
    };
}

int_binop!(iadd, |a, b| a.wrapping_add(b));
int_binop!(isub, |a, b| a.wrapping_sub(b));
int_binop!(imul, |a, b| a.wrapping_mul(b));
int_binop!(idiv, |a, b| a.wrapping_div(b));
int_binop!(irem, |a, b| a.wrapping_rem(b));
int_binop!(iand, |a, b| a & b);
int_binop!(ior, |a, b| a | b);
int_binop!(ixor, |a, b| a ^ b);
int_binop!(ishl, |a, b| a.wrapping_shl(b as u32));
int_binop!(ishr, |a, b| a.wrapping_shr(b as u32));
int_binop!(iushr, |a, b| ((a as u32).wrapping_shr(b as u32)) as i32);

long_binop!(ladd, |a, b| a.wrapping_add(b));
long_binop!(lsub, |a, b| a.wrapping_sub(b));
long_binop!(lmul, |a, b| a.wrapping_mul(b));
long_binop!(ldiv, |a, b| a.wrapping_div(b));
long_binop!(lrem, |a, b| a.wrapping_rem(b));
long_binop!(land, |a, b| a & b);
long_binop!(lor, |a, b| a | b);
long_binop!(lxor, |a, b| a ^ b);
long_binop!(lshl, |a, b: i64| a.wrapping_shl(b as u32));
long_binop!(lshr, |a, b: i64| a.wrapping_shr(b as u32));
long_binop!(lushr, |a, b: i64| ((a as u64).wrapping_shr(b as u32)) as i64);

pub fn ineg(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let stack = &mut ctx.env.current_frame_mut().operand_stack;
    let v = stack.pop_i32();
    stack.push_i32(v.wrapping_neg());
    Ok(Flow::Continue)
}

pub fn lneg(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let stack = &mut ctx.env.current_frame_mut().operand_stack;
    let v = stack.pop_i64();
    stack.push_i64(v.wrapping_neg());
    Ok(Flow::Continue)
}

pub fn lcmp(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let stack = &mut ctx.env.current_frame_mut().operand_stack;
    let rhs = stack.pop_i64();
    let lhs = stack.pop_i64();
    let result = match lhs.cmp(&rhs) {
        std::cmp::Ordering::Greater => 1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Less => -1,
    };
    stack.push_i32(result);
    Ok(Flow::Continue)
}

/// `index, const` both read as raw bytes per §4.1's byte-offset convention (matching
/// `iload`/`istore` in `locals.rs`), not a JVM word-slot index.
pub fn iinc(ctx: &mut OpCtx) -> Result<Flow, JvmError> {
    let offset = ctx.read_u8() as usize;
    let delta = ctx.read_i8() as i32;
    let frame = ctx.env.current_frame_mut();
    let bytes = frame.read_local(offset, 4);
    let current = i32::from_ne_bytes(bytes.try_into().unwrap());
    frame.write_local(offset, &current.wrapping_add(delta).to_ne_bytes());
    Ok(Flow::Continue)
}
