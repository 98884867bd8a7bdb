use std::ffi::c_void;
use std::sync::atomic::{AtomicUsize, Ordering};

use moth::common::opcode::OpCode;
use moth::common::value::Value;
use moth::program::Program;
use moth::vm::native::{native_len, native_print};
use moth::vm::{Vm, VmStatus};

fn run(prg: &Program) -> (Vm, VmStatus) {
    let mut vm = Vm::new();
    let status = vm.run(prg);
    (vm, status)
}

/// A loop rebinding the same name to a fresh array each iteration; after
/// the final collection only the live binding's array remains registered.
#[test]
fn loop_allocated_arrays_are_collected() {
    let mut prg = Program::new();
    let i = prg.intern_symbol("i") as u8;
    let x = prg.intern_symbol("x") as u8;
    let k0 = prg.write_rodata(Value::Int(0)) as u8;
    let k1 = prg.write_rodata(Value::Int(1)) as u8;
    let k100 = prg.write_rodata(Value::Int(100)) as u8;

    prg.write_op(OpCode::Val);
    prg.write_byte(k0);
    prg.write_op(OpCode::Def);
    prg.write_byte(i);

    let loop_start = prg.len();
    prg.write_op(OpCode::Arr);
    prg.write_byte(0);
    prg.write_op(OpCode::Def);
    prg.write_byte(x);

    prg.write_op(OpCode::Sym);
    prg.write_byte(i);
    prg.write_op(OpCode::Val);
    prg.write_byte(k1);
    prg.write_op(OpCode::Add);
    prg.write_op(OpCode::Asn);
    prg.write_byte(i);

    prg.write_op(OpCode::Sym);
    prg.write_byte(i);
    prg.write_op(OpCode::Val);
    prg.write_byte(k100);
    prg.write_op(OpCode::Lt);
    prg.write_op(OpCode::Jpf);
    prg.write_u16(3); // over the backward jump

    prg.write_op(OpCode::Jbw);
    let after_jbw = prg.len() + 2;
    prg.write_u16((after_jbw - loop_start) as u16);

    prg.write_op(OpCode::Gc);
    prg.write_op(OpCode::Fin);

    let (vm, status) = run(&prg);
    assert_eq!(status, VmStatus::Ok);
    assert_eq!(vm.env_lookup("i"), Some(Value::Int(100)));
    assert_eq!(vm.stack_len(), 0);
    assert_eq!(vm.live_objects(), 1);
}

/// Environment bindings are roots: a bound array survives a collection, an
/// unbound one does not.
#[test]
fn environment_bindings_keep_objects_alive() {
    let mut prg = Program::new();
    let a = prg.intern_symbol("a") as u8;
    prg.write_op(OpCode::Arr);
    prg.write_byte(0);
    prg.write_op(OpCode::Def);
    prg.write_byte(a);
    prg.write_op(OpCode::Gc);
    prg.write_op(OpCode::Fin);

    let (vm, status) = run(&prg);
    assert_eq!(status, VmStatus::Ok);
    assert_eq!(vm.live_objects(), 1);
}

#[test]
fn unreachable_objects_are_swept() {
    let mut prg = Program::new();
    prg.write_op(OpCode::Arr);
    prg.write_byte(0);
    prg.write_op(OpCode::Pop);
    prg.write_op(OpCode::Gc);
    prg.write_op(OpCode::Fin);

    let (vm, status) = run(&prg);
    assert_eq!(status, VmStatus::Ok);
    assert_eq!(vm.live_objects(), 0);
}

/// Aggregates are traced through: an array reachable only via a dictionary
/// value survives.
#[test]
fn reachability_is_transitive() {
    let mut prg = Program::new();
    let d = prg.intern_symbol("d") as u8;
    let kk = prg.write_rodata(Value::Str("inner".into())) as u8;

    prg.write_op(OpCode::Val);
    prg.write_byte(kk);
    prg.write_op(OpCode::Arr);
    prg.write_byte(0);
    prg.write_op(OpCode::Dct);
    prg.write_byte(2);
    prg.write_op(OpCode::Def);
    prg.write_byte(d);
    prg.write_op(OpCode::Gc);
    prg.write_op(OpCode::Fin);

    let (vm, status) = run(&prg);
    assert_eq!(status, VmStatus::Ok);
    // The dictionary and the array it holds.
    assert_eq!(vm.live_objects(), 2);
}

static DROPPED_ON_VM_FREE: AtomicUsize = AtomicUsize::new(0);

extern "C" fn delete_on_vm_free(_tag: u32, ptr: *mut c_void) {
    if ptr.is_null() {
        return;
    }
    drop(unsafe { Box::from_raw(ptr.cast::<u64>()) });
    DROPPED_ON_VM_FREE.fetch_add(1, Ordering::SeqCst);
}

/// Dropping the VM releases every registered object and runs FFI deleters
/// exactly once.
#[test]
fn ffi_deleter_runs_once_on_vm_drop() {
    let payload = Box::into_raw(Box::new(7u64)).cast::<c_void>();
    let mut vm = Vm::new();
    vm.wrap_foreign(0x11, payload, Some(delete_on_vm_free)).unwrap();

    assert_eq!(DROPPED_ON_VM_FREE.load(Ordering::SeqCst), 0);
    drop(vm);
    assert_eq!(DROPPED_ON_VM_FREE.load(Ordering::SeqCst), 1);
}

static DROPPED_ON_SWEEP: AtomicUsize = AtomicUsize::new(0);

extern "C" fn delete_on_sweep(_tag: u32, ptr: *mut c_void) {
    if ptr.is_null() {
        return;
    }
    drop(unsafe { Box::from_raw(ptr.cast::<u64>()) });
    DROPPED_ON_SWEEP.fetch_add(1, Ordering::SeqCst);
}

/// A swept FFI pointer runs its deleter during collection, and not a
/// second time when the VM goes away.
#[test]
fn ffi_deleter_runs_once_on_sweep() {
    let payload = Box::into_raw(Box::new(9u64)).cast::<c_void>();
    let mut vm = Vm::new();
    vm.wrap_foreign(0x22, payload, Some(delete_on_sweep)).unwrap();

    // Entering run resets the stack, so the wrapper is garbage by the time
    // the program's GC opcode executes.
    let mut prg = Program::new();
    prg.write_op(OpCode::Gc);
    prg.write_op(OpCode::Fin);
    assert_eq!(vm.run(&prg), VmStatus::Ok);
    assert_eq!(DROPPED_ON_SWEEP.load(Ordering::SeqCst), 1);

    drop(vm);
    assert_eq!(DROPPED_ON_SWEEP.load(Ordering::SeqCst), 1);
}

/// Native routines see the frame slice as argv and their result is pushed
/// after the frame is torn down.
#[test]
fn native_call_over_the_frame_slice() {
    let mut prg = Program::new();
    let mut vm = Vm::new();
    vm.register_native(&mut prg, "len", native_len);

    let len = prg.intern_symbol("len") as u8;
    let ks = prg.write_rodata(Value::Str("abc".into())) as u8;

    prg.write_op(OpCode::Frm);
    prg.write_byte(0);
    prg.write_op(OpCode::Val);
    prg.write_byte(ks);
    prg.write_op(OpCode::Sym);
    prg.write_byte(len);
    prg.write_op(OpCode::Cal);
    prg.write_op(OpCode::Fin);

    let status = vm.run(&prg);
    assert_eq!(status, VmStatus::Ok);
    assert_eq!(vm.stack_top(), Some(&Value::Int(3)));
    assert_eq!(vm.frame_depth(), 1);
}

/// A native arity rejection halts the run.
#[test]
fn native_arity_rejection_is_fatal() {
    let mut prg = Program::new();
    let mut vm = Vm::new();
    vm.register_native(&mut prg, "len", native_len);

    let len = prg.intern_symbol("len") as u8;
    let ks = prg.write_rodata(Value::Str("abc".into())) as u8;

    prg.write_op(OpCode::Frm);
    prg.write_byte(0);
    prg.write_op(OpCode::Val);
    prg.write_byte(ks);
    prg.write_op(OpCode::Val);
    prg.write_byte(ks);
    prg.write_op(OpCode::Sym);
    prg.write_byte(len);
    prg.write_op(OpCode::Cal);
    prg.write_op(OpCode::Fin);

    let status = vm.run(&prg);
    assert_eq!(status, VmStatus::InvArg);
}

#[test]
fn native_print_accepts_any_arity() {
    let mut prg = Program::new();
    let mut vm = Vm::new();
    vm.register_native(&mut prg, "print", native_print);

    let print = prg.intern_symbol("print") as u8;
    let ks = prg.write_rodata(Value::Str("hello".into())) as u8;
    let ki = prg.write_rodata(Value::Int(42)) as u8;

    prg.write_op(OpCode::Frm);
    prg.write_byte(0);
    prg.write_op(OpCode::Val);
    prg.write_byte(ks);
    prg.write_op(OpCode::Val);
    prg.write_byte(ki);
    prg.write_op(OpCode::Sym);
    prg.write_byte(print);
    prg.write_op(OpCode::Cal);
    prg.write_op(OpCode::Fin);

    let status = vm.run(&prg);
    assert_eq!(status, VmStatus::Ok);
    assert_eq!(vm.stack_top(), Some(&Value::Void));
}

/// The DBG opcode yields to an installed hook.
#[test]
fn debug_hook_is_invoked() {
    static SEEN: AtomicUsize = AtomicUsize::new(0);

    fn hook(_vm: &Vm) {
        SEEN.fetch_add(1, Ordering::SeqCst);
    }

    let mut prg = Program::new();
    prg.write_op(OpCode::Dbg);
    prg.write_op(OpCode::Dbg);
    prg.write_op(OpCode::Fin);

    let mut vm = Vm::new();
    vm.set_debug_hook(hook);
    assert_eq!(vm.run(&prg), VmStatus::Ok);
    assert_eq!(SEEN.load(Ordering::SeqCst), 2);
}
