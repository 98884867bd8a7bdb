use crate::common::object::{FfiResult, ObjBody, ObjClosure, ObjFfiFunction, ObjHeapval};
use crate::common::value::Value;
use crate::vm::error::{ErrorKind, VmError};
use crate::vm::ffi;
use crate::vm::stack::RET_UNSET;
use crate::vm::Vm;

impl Vm {
    /// FRM: begin a call-time frame and reserve `n` locals above its base.
    pub(crate) fn handle_frm(&mut self, width: usize) -> Result<(), VmError> {
        let n = self.fetch_index(width)?;
        self.stack.invoke(RET_UNSET).map_err(|k| self.fail(k))?;
        for _ in 0..n {
            self.push(Value::Void)?;
        }
        Ok(())
    }

    /// CAL: pop the callee and transfer control.
    ///
    /// Bytecode functions get the current frame's return address stamped
    /// and the instruction pointer moved to their body; a closure also
    /// appends its captured cells above the arguments. A native routine is
    /// invoked immediately over the frame's slice and its frame torn down
    /// before the result is pushed.
    pub(crate) fn handle_cal(&mut self) -> Result<(), VmError> {
        let callee = self.pop_operand()?;

        let ptr = match &callee {
            Value::Obj(p) => *p,
            _ => return Err(self.fail(ErrorKind::NotCallable(callee.type_name()))),
        };

        match unsafe { &(*ptr).body } {
            ObjBody::Function(fct) => {
                let ret = self.ip();
                self.stack.frame_mut().ret = ret;
                self.jump_to(fct.offset as usize)
            }
            ObjBody::Closure(clj) => {
                let offset = match unsafe { &(*clj.fct).body } {
                    ObjBody::Function(fct) => fct.offset as usize,
                    _ => {
                        return Err(self.fail(ErrorKind::Corrupt(
                            "closure does not reference a function".into(),
                        )));
                    }
                };
                let cells = clj.cells.clone();
                let ret = self.ip();
                self.stack.frame_mut().ret = ret;
                self.jump_to(offset)?;
                for cell in cells {
                    self.push(cell)?;
                }
                Ok(())
            }
            ObjBody::FfiFunction(f) => self.call_native(f.fun),
            other => Err(self.fail(ErrorKind::NotCallable(other.type_name()))),
        }
    }

    fn call_native(&mut self, fun: crate::common::object::FfiFunction) -> Result<(), VmError> {
        let bp = self.stack.frame().bp;
        let argc = self.stack.len() - bp;
        if argc > usize::from(u8::MAX) {
            return Err(self.fail(ErrorKind::InvalidArgument(
                "too many arguments for a native call".into(),
            )));
        }

        let mut ret = Value::Void;
        let argv = self.stack.values()[bp..].as_ptr();
        // The VM blocks for the duration of the call; the routine sees the
        // frame slice and writes its result through `ret`.
        let verdict = unsafe { fun(argv, argc as u8, &mut ret) };

        let inv = self.stack.ret().map_err(|k| self.fail(k))?;
        self.stack.truncate(inv.bp);

        match verdict {
            FfiResult::Ok => self.push(ret),
            FfiResult::Error => Err(self.fail(ErrorKind::InvalidArgument(
                "native routine reported an error".into(),
            ))),
            FfiResult::Arity => Err(self.fail(ErrorKind::InvalidArgument(
                "native routine rejected the argument count".into(),
            ))),
            FfiResult::Types => Err(self.fail(ErrorKind::InvalidType(
                "native routine rejected the argument types".into(),
            ))),
        }
    }

    /// RET: pop the return value, destroy the frame, resume the caller.
    pub(crate) fn handle_ret(&mut self) -> Result<(), VmError> {
        let ret_val = self.pop_raw()?;
        let inv = self.stack.ret().map_err(|k| self.fail(k))?;
        if inv.ret == RET_UNSET {
            return Err(self.fail(ErrorKind::Corrupt(
                "return through a frame that was never called".into(),
            )));
        }
        self.stack.truncate(inv.bp);
        self.jump_to(inv.ret)?;
        self.push(ret_val)
    }

    /// CLO: pop a function and its promoted cells, push a closure.
    ///
    /// The cell count comes from the function's header; the function is on
    /// top, the last-captured cell directly beneath it.
    pub(crate) fn handle_clo(&mut self) -> Result<(), VmError> {
        let fct_val = self.pop_raw()?;
        let fct_ptr = match &fct_val {
            Value::Obj(ptr) if matches!(unsafe { &(**ptr).body }, ObjBody::Function(_)) => *ptr,
            other => {
                return Err(self.fail(ErrorKind::InvalidType(format!(
                    "closure over a value of type '{}'",
                    other.type_name()
                ))));
            }
        };

        let count = match unsafe { &(*fct_ptr).body } {
            ObjBody::Function(fct) => usize::from(fct.upvalues),
            _ => unreachable!("checked above"),
        };

        let mut cells = Vec::with_capacity(count);
        for _ in 0..count {
            let cell = self.pop_raw()?;
            if !cell.is_cell() {
                return Err(self.fail(ErrorKind::InvalidType(format!(
                    "captured value of type '{}' is not a promoted cell",
                    cell.type_name()
                ))));
            }
            cells.push(cell);
        }
        cells.reverse();

        let clj = self.alloc(ObjBody::Closure(ObjClosure {
            fct: fct_ptr,
            cells,
        }));
        self.push(Value::Obj(clj))
    }

    /// PRO: promote the popped top into a heap cell. Idempotent on values
    /// that already are cells.
    pub(crate) fn handle_pro(&mut self) -> Result<(), VmError> {
        let val = self.pop_raw()?;
        if val.is_cell() {
            return self.push(val);
        }
        let cell = self.alloc(ObjBody::Heapval(ObjHeapval { value: val }));
        self.push(Value::Obj(cell))
    }

    /// DLL: pop a library path, open it, push the tagged handle.
    pub(crate) fn handle_dll(&mut self) -> Result<(), VmError> {
        let path_val = self.pop_operand()?;
        let Some(path) = path_val.as_text() else {
            return Err(self.fail(ErrorKind::InvalidType(format!(
                "library path must be a string, got '{}'",
                path_val.type_name()
            ))));
        };

        let body = ffi::open_library(path).map_err(|k| self.fail(k))?;
        let handle = self.alloc(body);
        self.push(Value::Obj(handle))
    }

    /// FFN: pop a symbol name, peek the library handle, push the routine.
    pub(crate) fn handle_ffn(&mut self) -> Result<(), VmError> {
        let name_val = self.pop_operand()?;
        let Some(name) = name_val.as_text().map(str::to_owned) else {
            return Err(self.fail(ErrorKind::InvalidType(format!(
                "symbol name must be a string, got '{}'",
                name_val.type_name()
            ))));
        };

        let handle = self.stack.top().map_err(|k| self.fail(k))?.clone().unwrap_cell();
        let raw = match &handle {
            Value::Obj(ptr) => match unsafe { &(**ptr).body } {
                ObjBody::FfiPointer(p) if p.tag == ffi::TAG_LIBRARY => p.ptr,
                _ => {
                    return Err(self.fail(ErrorKind::InvalidType(
                        "FFN expects a library handle on the stack".into(),
                    )));
                }
            },
            _ => {
                return Err(self.fail(ErrorKind::InvalidType(
                    "FFN expects a library handle on the stack".into(),
                )));
            }
        };

        let fun = unsafe { ffi::resolve(raw, &name) }.map_err(|k| self.fail(k))?;
        let obj = self.alloc(ObjBody::FfiFunction(ObjFfiFunction { fun }));
        self.push(Value::Obj(obj))
    }
}
