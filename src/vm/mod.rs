pub mod dispatch;
pub mod env;
pub mod error;
pub mod ffi;
pub mod gc;
pub mod native;
pub mod stack;

use std::ptr;

use tracing::{debug, error};

use crate::common::opcode::OpCode;
use crate::common::value::{Symbol, Value};
use crate::program::Program;
use crate::vm::env::Environment;
use crate::vm::error::{ErrorKind, VmError};
use crate::vm::gc::GcRegistry;
use crate::vm::stack::Stack;

/// Exit status of a run; doubles as the driver's process exit code.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmStatus {
    Ok = 0,
    InvType = 1,
    InvArg = 2,
    Undef = 3,
    NotFun = 4,
}

/// Host callback invoked by the `DBG` opcode.
pub type DebugHook = fn(&Vm);

/// The Moth virtual machine.
///
/// One VM owns its value stack, invocation stack, environment and heap
/// registry; a program is borrowed for the duration of [`Vm::run`] and its
/// bytes, constants and symbols never move while the VM holds offsets into
/// them. The environment survives across runs so an embedder can execute
/// several programs against one set of bindings.
pub struct Vm {
    prg: *const Program,
    ip: usize,
    /// Offset of the opcode currently executing, for fault reports.
    op_offset: usize,
    halted: bool,
    status: VmStatus,
    pub(crate) stack: Stack,
    pub(crate) env: Environment,
    pub(crate) gc: GcRegistry,
    print_stack: bool,
    debug_hook: Option<DebugHook>,
}

impl Vm {
    pub fn new() -> Self {
        Vm {
            prg: ptr::null(),
            ip: 0,
            op_offset: 0,
            halted: false,
            status: VmStatus::Ok,
            stack: Stack::new(),
            env: Environment::new(),
            gc: GcRegistry::new(),
            print_stack: false,
            debug_hook: None,
        }
    }

    /// Executes `prg` from its first byte until `FIN` or a fatal failure.
    pub fn run(&mut self, prg: &Program) -> VmStatus {
        self.prg = prg;
        self.ip = 0;
        self.op_offset = 0;
        self.halted = false;
        self.status = VmStatus::Ok;
        self.stack.reset();

        debug!(bytes = prg.len(), "execution started");

        while !self.halted {
            // A safe point: nothing mid-instruction references the heap.
            self.collect_if_full();

            if self.print_stack {
                self.print_stack_line();
            }
            self.op_offset = self.ip;
            if let Err(err) = self.step() {
                self.status = err.kind.status();
                error!(%err, "execution fault");
                break;
            }
        }

        debug!(status = ?self.status, "execution finished");
        self.prg = ptr::null();
        self.status
    }

    fn step(&mut self) -> Result<(), VmError> {
        let byte = self.fetch_byte()?;
        let op = OpCode::try_from(byte)
            .map_err(|_| self.fail(ErrorKind::Corrupt(format!("illegal opcode {:#04x}", byte))))?;
        self.execute(op)
    }

    pub(crate) fn halt(&mut self) {
        self.halted = true;
    }

    pub(crate) fn fail(&self, kind: ErrorKind) -> VmError {
        VmError {
            kind,
            offset: self.op_offset,
        }
    }

    fn bytes(&self) -> &[u8] {
        // Null only outside `run`; no opcode executes then.
        unsafe { (*self.prg).bytes() }
    }

    pub(crate) fn fetch_byte(&mut self) -> Result<u8, VmError> {
        let bytes = self.bytes();
        if self.ip >= bytes.len() {
            return Err(self.fail(ErrorKind::Corrupt(
                "execution ran past the end of the instruction stream".into(),
            )));
        }
        let byte = bytes[self.ip];
        self.ip += 1;
        Ok(byte)
    }

    pub(crate) fn fetch_u16(&mut self) -> Result<u16, VmError> {
        let lo = self.fetch_byte()?;
        let hi = self.fetch_byte()?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    /// Little-endian pool index of the given byte width.
    pub(crate) fn fetch_index(&mut self, width: usize) -> Result<usize, VmError> {
        let mut idx: usize = 0;
        for shift in 0..width {
            idx |= usize::from(self.fetch_byte()?) << (8 * shift);
        }
        Ok(idx)
    }

    pub(crate) fn jump_to(&mut self, target: usize) -> Result<(), VmError> {
        if target > self.bytes().len() {
            return Err(self.fail(ErrorKind::Corrupt(format!(
                "jump target {:#06x} outside the instruction stream",
                target
            ))));
        }
        self.ip = target;
        Ok(())
    }

    pub(crate) fn ip(&self) -> usize {
        self.ip
    }

    pub(crate) fn constant(&self, idx: usize) -> Result<Value, VmError> {
        unsafe { (*self.prg).constant(idx) }
            .cloned()
            .ok_or_else(|| {
                self.fail(ErrorKind::Corrupt(format!(
                    "constant index {} outside the pool",
                    idx
                )))
            })
    }

    pub(crate) fn symbol(&self, idx: usize) -> Result<Symbol, VmError> {
        unsafe { (*self.prg).symbol(idx) }.cloned().ok_or_else(|| {
            self.fail(ErrorKind::Corrupt(format!(
                "symbol index {} outside the pool",
                idx
            )))
        })
    }

    pub(crate) fn push(&mut self, val: Value) -> Result<(), VmError> {
        self.stack.push(val).map_err(|k| self.fail(k))
    }

    /// Pops a raw stack entry; upvalue cells come off unopened.
    pub(crate) fn pop_raw(&mut self) -> Result<Value, VmError> {
        self.stack.pop().map_err(|k| self.fail(k))
    }

    /// Pops a computation operand, reading through an upvalue cell.
    pub(crate) fn pop_operand(&mut self) -> Result<Value, VmError> {
        Ok(self.pop_raw()?.unwrap_cell())
    }

    fn print_stack_line(&self) {
        let slots: Vec<String> = self.stack.values().iter().map(|v| v.to_string()).collect();
        println!("[{}]", slots.join(", "));
    }

    // ---- embedding surface ----

    pub fn status(&self) -> VmStatus {
        self.status
    }

    /// Top of the value stack, if any; scenario programs leave their result
    /// here.
    pub fn stack_top(&self) -> Option<&Value> {
        self.stack.values().last()
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    /// The live value-stack slots, bottom first.
    pub fn stack_values(&self) -> &[Value] {
        self.stack.values()
    }

    /// Invocation depth; one means only the outer frame is live.
    pub fn frame_depth(&self) -> usize {
        self.stack.depth()
    }

    /// Looks a binding up by identifier text, reading through an upvalue
    /// cell. Meant for embedders and tests; bytecode goes through `SYM`.
    pub fn env_lookup(&self, name: &str) -> Option<Value> {
        self.env
            .entries()
            .find(|(sym, _)| &*sym.name == name)
            .map(|(_, val)| val.clone().unwrap_cell())
    }

    /// Binds a native routine into the environment under `name`, interning
    /// the identifier in the program's symbol pool so `SYM` resolves it.
    pub fn register_native(
        &mut self,
        prg: &mut Program,
        name: &str,
        fun: crate::common::object::FfiFunction,
    ) {
        let idx = prg.intern_symbol(name);
        let sym = prg
            .symbol(idx as usize)
            .expect("freshly interned symbol")
            .clone();
        let obj = self.alloc(crate::common::object::ObjBody::FfiFunction(
            crate::common::object::ObjFfiFunction { fun },
        ));
        self.env.set(sym, Value::Obj(obj));
    }

    /// Wraps a native resource as a first-class FFI pointer and pushes it.
    /// The deleter runs exactly once, when the collector sweeps the object
    /// or the VM is dropped.
    pub fn wrap_foreign(
        &mut self,
        tag: u32,
        ptr: *mut std::ffi::c_void,
        del: Option<crate::common::object::FfiDeleter>,
    ) -> Result<(), ErrorKind> {
        let obj = self.alloc(crate::common::object::ObjBody::FfiPointer(
            crate::common::object::ObjFfiPointer { tag, ptr, del },
        ));
        self.stack.push(Value::Obj(obj))
    }

    pub fn set_debug_hook(&mut self, hook: DebugHook) {
        self.debug_hook = Some(hook);
    }

    pub(crate) fn debug_hook(&self) -> Option<DebugHook> {
        self.debug_hook
    }

    /// Prints the value stack before every instruction, the driver's `-s`
    /// behavior.
    pub fn set_print_stack(&mut self, on: bool) {
        self.print_stack = on;
    }
}

impl Default for Vm {
    fn default() -> Self {
        Vm::new()
    }
}

impl Drop for Vm {
    fn drop(&mut self) {
        // Free every registered object; FFI pointer deleters run here if
        // the object never became garbage during execution.
        for ptr in self.gc.objs.drain(..) {
            drop(unsafe { Box::from_raw(ptr) });
        }
    }
}
