//! Dynamic-library loading for the `DLL`/`FFN` opcodes.
//!
//! A loaded library is a first-class FFI pointer tagged [`TAG_LIBRARY`];
//! its deleter closes the OS handle when the collector sweeps it. Routines
//! resolved from a library are plain function pointers with the native call
//! contract of [`FfiFunction`]; they stay callable only while the library
//! handle is alive, which is why an emitter binds every routine it needs
//! before popping the handle.

use std::ffi::c_void;

use libloading::Library;

use crate::common::object::{FfiFunction, ObjBody, ObjFfiPointer};
use crate::vm::error::ErrorKind;

/// Tag of FFI pointers that wrap an open dynamic library.
pub const TAG_LIBRARY: u32 = 0x4D_4C_49_42; // "BILM" little-endian

extern "C" fn close_library(tag: u32, ptr: *mut c_void) {
    if tag != TAG_LIBRARY || ptr.is_null() {
        return;
    }
    drop(unsafe { Box::from_raw(ptr.cast::<Library>()) });
}

/// Opens the library at `path` and wraps the handle as an FFI pointer body.
pub(crate) fn open_library(path: &str) -> Result<ObjBody, ErrorKind> {
    let lib = unsafe { Library::new(path) }
        .map_err(|e| ErrorKind::InvalidArgument(format!("cannot open library '{}': {}", path, e)))?;

    Ok(ObjBody::FfiPointer(ObjFfiPointer {
        tag: TAG_LIBRARY,
        ptr: Box::into_raw(Box::new(lib)).cast(),
        del: Some(close_library),
    }))
}

/// Resolves `name` in an open library handle.
///
/// # Safety
/// `handle` must be the live pointer of a [`TAG_LIBRARY`] FFI pointer.
pub(crate) unsafe fn resolve(handle: *mut c_void, name: &str) -> Result<FfiFunction, ErrorKind> {
    let lib = unsafe { &*handle.cast::<Library>() };
    let mut symbol = name.as_bytes().to_vec();
    symbol.push(0);

    let fun = unsafe { lib.get::<FfiFunction>(&symbol) }
        .map_err(|e| ErrorKind::InvalidArgument(format!("cannot resolve symbol '{}': {}", name, e)))?;
    Ok(*fun)
}
