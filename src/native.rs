//! Native method trampoline (§4.7): a fixed allow-list, everything else a no-op.
//!
//! Grounded on the *shape* of the teacher's `jvm/hooks.rs` (named handler functions
//! registered by owning-class + method name), drastically narrowed in scope: no JNI
//! `extern "system"` signatures, no dylib loading, no `sun.misc.Unsafe`/`Class`
//! reflection hooks — just the two methods §4.7 names. Native dispatch is checked from
//! inside every resolution mode (static/special/virtual) so the caller never builds a
//! frame for a native method, per §4.7's closing sentence.

use crate::heap::{ArrayType, Heap, ObjectHandle};

/// Returns `true` if `(class_name, method_name)` is on the fixed allow-list.
pub fn is_allow_listed(class_name: &str, method_name: &str) -> bool {
    matches!(
        (class_name, method_name),
        ("java/lang/System", "arraycopy") | ("test/IOUtil", "writeString")
    )
}

/// Runs an allow-listed native given the raw argument byte block popped from the
/// caller's operand stack, laid out in descriptor order (the same layout a real frame's
/// locals region would have). `receiver` is `Some` for instance invocations.
pub fn invoke(
    heap: &Heap,
    class_name: &str,
    method_name: &str,
    receiver: Option<ObjectHandle>,
    args: &[u8],
) {
    match (class_name, method_name) {
        ("java/lang/System", "arraycopy") => arraycopy(heap, args),
        ("test/IOUtil", "writeString") => write_string(heap, receiver),
        _ => {
            warn!(
                "native method {}.{} resolved but is not on the allow-list; ignoring",
                class_name, method_name
            );
        }
    }
}

fn read_ref(args: &[u8], offset: usize) -> Option<ObjectHandle> {
    let raw = i64::from_ne_bytes(args[offset..offset + crate::types::SZ_REF].try_into().unwrap());
    if raw < 0 {
        None
    } else {
        Some(ObjectHandle(raw as usize))
    }
}

fn read_i32(args: &[u8], offset: usize) -> i32 {
    i32::from_ne_bytes(args[offset..offset + 4].try_into().unwrap())
}

/// `System.arraycopy(Object src, int srcPos, Object dest, int destPos, int length)`.
/// No bounds or type check, matching §4.7 and the original `do_arraycopy`.
fn arraycopy(heap: &Heap, args: &[u8]) {
    let src = read_ref(args, 0).expect("arraycopy src must not be null");
    let src_pos = read_i32(args, crate::types::SZ_REF) as usize;
    let dest = read_ref(args, crate::types::SZ_REF + 4).expect("arraycopy dest must not be null");
    let dest_pos = read_i32(args, crate::types::SZ_REF * 2 + 4) as usize;
    let length = read_i32(args, crate::types::SZ_REF * 2 + 8) as usize;

    debug!(
        "arraycopy src={:?}[{}..] -> dest={:?}[{}..] len={}",
        src, src_pos, dest, dest_pos, length
    );

    let (atype, chunk) = heap.with_array(src, |arr| {
        let sz = arr.atype.element_size();
        (arr.atype, arr.data[src_pos * sz..(src_pos + length) * sz].to_vec())
    });
    heap.with_array_mut(dest, |arr| {
        assert_eq!(arr.atype, atype, "arraycopy between mismatched array types");
        let sz = arr.atype.element_size();
        arr.data[dest_pos * sz..(dest_pos + length) * sz].copy_from_slice(&chunk);
    });
}

/// `test/IOUtil.writeString()`: instance-field slot 0 holds a `char[]` reference;
/// prints its contents followed by a newline (§4.7, §8 scenario 6).
fn write_string(heap: &Heap, receiver: Option<ObjectHandle>) {
    let receiver = receiver.expect("writeString requires a receiver");
    let array_handle = heap.with_object(receiver, |obj| {
        let raw = i64::from_ne_bytes(obj.fields[0][0..8].try_into().unwrap());
        if raw < 0 {
            None
        } else {
            Some(ObjectHandle(raw as usize))
        }
    });
    let array_handle = array_handle.expect("writeString's char[] field must not be null");

    let text = heap.with_array(array_handle, |arr| {
        assert_eq!(arr.atype, ArrayType::Char, "writeString field must be a char[]");
        arr.data
            .chunks_exact(2)
            .map(|pair| u16::from_ne_bytes([pair[0], pair[1]]) as u8 as char)
            .collect::<String>()
    });

    println!("{}", text);
}
