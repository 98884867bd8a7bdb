//! Built-in native routines.
//!
//! These follow the same contract as routines resolved out of a dynamic
//! library, so an embedder registers them with [`crate::Vm::register_native`]
//! and bytecode calls them like any other FFI function.

use crate::common::object::{FfiResult, ObjBody};
use crate::common::value::Value;

/// Prints the arguments space-separated, followed by a newline.
///
/// # Safety
/// `argv` must point at `argc` live values and `ret` at writable storage;
/// the VM's native-call bridge guarantees both.
pub unsafe extern "C" fn native_print(argv: *const Value, argc: u8, ret: *mut Value) -> FfiResult {
    let args = unsafe { std::slice::from_raw_parts(argv, usize::from(argc)) };

    let mut line = String::new();
    for (i, val) in args.iter().enumerate() {
        if i > 0 {
            line.push(' ');
        }
        line.push_str(&val.to_string());
    }
    println!("{}", line);

    unsafe { *ret = Value::Void };
    FfiResult::Ok
}

/// Length of a string, array, vector or dictionary.
///
/// # Safety
/// See [`native_print`].
pub unsafe extern "C" fn native_len(argv: *const Value, argc: u8, ret: *mut Value) -> FfiResult {
    if argc != 1 {
        return FfiResult::Arity;
    }
    let arg = unsafe { &*argv };

    let len = if let Some(text) = arg.as_text() {
        text.chars().count()
    } else if let Value::Obj(ptr) = arg {
        match unsafe { &(**ptr).body } {
            ObjBody::Array(a) => a.values.len(),
            ObjBody::Vector(v) => v.card(),
            ObjBody::Dict(d) => d.len(),
            _ => return FfiResult::Types,
        }
    } else {
        return FfiResult::Types;
    };

    unsafe { *ret = Value::Int(len as i64) };
    FfiResult::Ok
}
