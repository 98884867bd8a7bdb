use moth::common::opcode::OpCode;
use moth::common::value::Value;
use moth::program::Program;
use moth::vm::{Vm, VmStatus};

fn run(prg: &Program) -> (Vm, VmStatus) {
    let mut vm = Vm::new();
    let status = vm.run(prg);
    (vm, status)
}

fn load_const(prg: &mut Program, idx: u32) {
    prg.write_op(OpCode::Val);
    prg.write_byte(idx as u8);
}

#[test]
fn integer_sum() {
    let mut prg = Program::new();
    let k2 = prg.write_rodata(Value::Int(2));
    let k3 = prg.write_rodata(Value::Int(3));
    load_const(&mut prg, k2);
    load_const(&mut prg, k3);
    prg.write_op(OpCode::Add);
    prg.write_op(OpCode::Fin);

    let (vm, status) = run(&prg);
    assert_eq!(status, VmStatus::Ok);
    assert_eq!(vm.stack_top(), Some(&Value::Int(5)));
}

#[test]
fn string_repeat() {
    let mut prg = Program::new();
    let ks = prg.write_rodata(Value::Str("ab".into()));
    let k3 = prg.write_rodata(Value::Int(3));
    load_const(&mut prg, ks);
    load_const(&mut prg, k3);
    prg.write_op(OpCode::Mul);
    prg.write_op(OpCode::Fin);

    let (vm, status) = run(&prg);
    assert_eq!(status, VmStatus::Ok);
    assert_eq!(vm.stack_top().unwrap().as_text(), Some("ababab"));
}

#[test]
fn rounded_division_by_zero_is_fatal() {
    let mut prg = Program::new();
    let k7 = prg.write_rodata(Value::Int(7));
    let k0 = prg.write_rodata(Value::Int(0));
    load_const(&mut prg, k7);
    load_const(&mut prg, k0);
    prg.write_op(OpCode::Riv);
    prg.write_op(OpCode::Fin);

    let (_, status) = run(&prg);
    assert_eq!(status, VmStatus::InvArg);
}

#[test]
fn rounded_division_truncates_toward_zero() {
    let mut prg = Program::new();
    let ka = prg.write_rodata(Value::Int(-7));
    let kb = prg.write_rodata(Value::Int(2));
    load_const(&mut prg, ka);
    load_const(&mut prg, kb);
    prg.write_op(OpCode::Riv);
    prg.write_op(OpCode::Fin);

    let (vm, status) = run(&prg);
    assert_eq!(status, VmStatus::Ok);
    assert_eq!(vm.stack_top(), Some(&Value::Int(-3)));
}

#[test]
fn integer_addition_wraps() {
    let mut prg = Program::new();
    let ka = prg.write_rodata(Value::Int(i64::MAX));
    let kb = prg.write_rodata(Value::Int(1));
    load_const(&mut prg, ka);
    load_const(&mut prg, kb);
    prg.write_op(OpCode::Add);
    prg.write_op(OpCode::Fin);

    let (vm, status) = run(&prg);
    assert_eq!(status, VmStatus::Ok);
    assert_eq!(vm.stack_top(), Some(&Value::Int(i64::MIN)));
}

#[test]
fn real_operand_promotes_both_sides() {
    let mut prg = Program::new();
    let ka = prg.write_rodata(Value::Int(3));
    let kb = prg.write_rodata(Value::Real(0.5));
    load_const(&mut prg, ka);
    load_const(&mut prg, kb);
    prg.write_op(OpCode::Mul);
    prg.write_op(OpCode::Fin);

    let (vm, status) = run(&prg);
    assert_eq!(status, VmStatus::Ok);
    assert_eq!(vm.stack_top(), Some(&Value::Real(1.5)));
}

#[test]
fn division_always_yields_real() {
    let mut prg = Program::new();
    let ka = prg.write_rodata(Value::Int(7));
    let kb = prg.write_rodata(Value::Int(2));
    load_const(&mut prg, ka);
    load_const(&mut prg, kb);
    prg.write_op(OpCode::Div);
    prg.write_op(OpCode::Fin);

    let (vm, status) = run(&prg);
    assert_eq!(status, VmStatus::Ok);
    assert_eq!(vm.stack_top(), Some(&Value::Real(3.5)));
}

#[test]
fn modulo_requires_integers() {
    let mut prg = Program::new();
    let ka = prg.write_rodata(Value::Real(7.0));
    let kb = prg.write_rodata(Value::Int(2));
    load_const(&mut prg, ka);
    load_const(&mut prg, kb);
    prg.write_op(OpCode::Mod);
    prg.write_op(OpCode::Fin);

    let (_, status) = run(&prg);
    assert_eq!(status, VmStatus::InvType);
}

#[test]
fn modulo_by_zero_is_fatal() {
    let mut prg = Program::new();
    let ka = prg.write_rodata(Value::Int(7));
    let kb = prg.write_rodata(Value::Int(0));
    load_const(&mut prg, ka);
    load_const(&mut prg, kb);
    prg.write_op(OpCode::Mod);
    prg.write_op(OpCode::Fin);

    let (_, status) = run(&prg);
    assert_eq!(status, VmStatus::InvArg);
}

#[test]
fn negative_string_repeat_is_fatal() {
    let mut prg = Program::new();
    let ks = prg.write_rodata(Value::Str("ab".into()));
    let kn = prg.write_rodata(Value::Int(-1));
    load_const(&mut prg, ks);
    load_const(&mut prg, kn);
    prg.write_op(OpCode::Mul);
    prg.write_op(OpCode::Fin);

    let (_, status) = run(&prg);
    assert_eq!(status, VmStatus::InvArg);
}

#[test]
fn adding_incompatible_types_is_fatal() {
    let mut prg = Program::new();
    let ka = prg.write_rodata(Value::Int(1));
    let kb = prg.write_rodata(Value::Str("a".into()));
    load_const(&mut prg, ka);
    load_const(&mut prg, kb);
    prg.write_op(OpCode::Add);
    prg.write_op(OpCode::Fin);

    let (_, status) = run(&prg);
    assert_eq!(status, VmStatus::InvType);
}

#[test]
fn string_concat_is_associative_on_values() {
    let mut prg = Program::new();
    let ka = prg.write_rodata(Value::Str("a".into()));
    let kb = prg.write_rodata(Value::Str("b".into()));
    let kc = prg.write_rodata(Value::Str("c".into()));

    // (a + b) + c
    load_const(&mut prg, ka);
    load_const(&mut prg, kb);
    prg.write_op(OpCode::Add);
    load_const(&mut prg, kc);
    prg.write_op(OpCode::Add);
    // a + (b + c)
    load_const(&mut prg, ka);
    load_const(&mut prg, kb);
    load_const(&mut prg, kc);
    prg.write_op(OpCode::Add);
    prg.write_op(OpCode::Add);

    prg.write_op(OpCode::Eq);
    prg.write_op(OpCode::Fin);

    let (vm, status) = run(&prg);
    assert_eq!(status, VmStatus::Ok);
    assert_eq!(vm.stack_top(), Some(&Value::Bool(true)));
}

#[test]
fn equality_is_total_and_cross_type_false() {
    let mut prg = Program::new();
    let ka = prg.write_rodata(Value::Int(1));
    let kb = prg.write_rodata(Value::Bool(true));
    load_const(&mut prg, ka);
    load_const(&mut prg, kb);
    prg.write_op(OpCode::Neq);
    prg.write_op(OpCode::Fin);

    let (vm, status) = run(&prg);
    assert_eq!(status, VmStatus::Ok);
    assert_eq!(vm.stack_top(), Some(&Value::Bool(true)));
}

#[test]
fn strings_compare_lexicographically() {
    let mut prg = Program::new();
    let ka = prg.write_rodata(Value::Str("abc".into()));
    let kb = prg.write_rodata(Value::Str("abd".into()));
    load_const(&mut prg, ka);
    load_const(&mut prg, kb);
    prg.write_op(OpCode::Lt);
    prg.write_op(OpCode::Fin);

    let (vm, status) = run(&prg);
    assert_eq!(status, VmStatus::Ok);
    assert_eq!(vm.stack_top(), Some(&Value::Bool(true)));
}

#[test]
fn ordering_on_non_comparable_types_is_fatal() {
    let mut prg = Program::new();
    let ka = prg.write_rodata(Value::Bool(true));
    let kb = prg.write_rodata(Value::Bool(false));
    load_const(&mut prg, ka);
    load_const(&mut prg, kb);
    prg.write_op(OpCode::Gt);
    prg.write_op(OpCode::Fin);

    let (_, status) = run(&prg);
    assert_eq!(status, VmStatus::InvType);
}

#[test]
fn forward_jump_skips_code() {
    let mut prg = Program::new();
    let ka = prg.write_rodata(Value::Int(1));
    let kb = prg.write_rodata(Value::Int(2));
    load_const(&mut prg, ka);
    prg.write_op(OpCode::Jmp);
    prg.write_u16(2); // over the next VAL
    load_const(&mut prg, kb);
    prg.write_op(OpCode::Fin);

    let (vm, status) = run(&prg);
    assert_eq!(status, VmStatus::Ok);
    assert_eq!(vm.stack_len(), 1);
    assert_eq!(vm.stack_top(), Some(&Value::Int(1)));
}

#[test]
fn conditional_jumps_follow_the_popped_bool() {
    // JPT over a VAL when the predicate is true.
    let mut prg = Program::new();
    let ka = prg.write_rodata(Value::Int(1));
    prg.write_op(OpCode::Tru);
    prg.write_op(OpCode::Jpt);
    prg.write_u16(2);
    load_const(&mut prg, ka);
    prg.write_op(OpCode::Fin);

    let (vm, status) = run(&prg);
    assert_eq!(status, VmStatus::Ok);
    assert_eq!(vm.stack_len(), 0);

    // JPF does not jump when the predicate is true.
    let mut prg = Program::new();
    let ka = prg.write_rodata(Value::Int(1));
    prg.write_op(OpCode::Tru);
    prg.write_op(OpCode::Jpf);
    prg.write_u16(2);
    load_const(&mut prg, ka);
    prg.write_op(OpCode::Fin);

    let (vm, status) = run(&prg);
    assert_eq!(status, VmStatus::Ok);
    assert_eq!(vm.stack_top(), Some(&Value::Int(1)));
}

#[test]
fn non_bool_jump_predicate_is_fatal() {
    let mut prg = Program::new();
    let ka = prg.write_rodata(Value::Int(1));
    load_const(&mut prg, ka);
    prg.write_op(OpCode::Jpt);
    prg.write_u16(0);
    prg.write_op(OpCode::Fin);

    let (_, status) = run(&prg);
    assert_eq!(status, VmStatus::InvType);
}

#[test]
fn literal_opcodes_push_fixed_values() {
    let mut prg = Program::new();
    prg.write_op(OpCode::Pi);
    prg.write_op(OpCode::Fin);

    let (vm, status) = run(&prg);
    assert_eq!(status, VmStatus::Ok);
    assert_eq!(vm.stack_top(), Some(&Value::Real(std::f64::consts::PI)));
}

#[test]
fn undefined_symbol_lookup_is_fatal() {
    let mut prg = Program::new();
    prg.intern_symbol("nope");
    prg.write_op(OpCode::Sym);
    prg.write_byte(0);
    prg.write_op(OpCode::Fin);

    let (_, status) = run(&prg);
    assert_eq!(status, VmStatus::Undef);
}

#[test]
fn assignment_to_unbound_symbol_is_fatal() {
    let mut prg = Program::new();
    prg.intern_symbol("nope");
    let ka = prg.write_rodata(Value::Int(1));
    load_const(&mut prg, ka);
    prg.write_op(OpCode::Asn);
    prg.write_byte(0);
    prg.write_op(OpCode::Fin);

    let (_, status) = run(&prg);
    assert_eq!(status, VmStatus::Undef);
}

#[test]
fn define_then_load_yields_the_latest_binding() {
    let mut prg = Program::new();
    let x = prg.intern_symbol("x");
    let ka = prg.write_rodata(Value::Int(1));
    let kb = prg.write_rodata(Value::Int(2));

    load_const(&mut prg, ka);
    prg.write_op(OpCode::Def);
    prg.write_byte(x as u8);
    load_const(&mut prg, kb);
    prg.write_op(OpCode::Asn);
    prg.write_byte(x as u8);
    prg.write_op(OpCode::Sym);
    prg.write_byte(x as u8);
    prg.write_op(OpCode::Fin);

    let (vm, status) = run(&prg);
    assert_eq!(status, VmStatus::Ok);
    assert_eq!(vm.stack_top(), Some(&Value::Int(2)));
    assert_eq!(vm.env_lookup("x"), Some(Value::Int(2)));
}

#[test]
fn calling_a_non_function_is_fatal() {
    let mut prg = Program::new();
    let ka = prg.write_rodata(Value::Int(1));
    load_const(&mut prg, ka);
    prg.write_op(OpCode::Cal);
    prg.write_op(OpCode::Fin);

    let (_, status) = run(&prg);
    assert_eq!(status, VmStatus::NotFun);
}

#[test]
fn value_stack_overflow_is_fatal() {
    // A loop that pushes without popping until the stack cap is hit.
    let mut prg = Program::new();
    let ka = prg.write_rodata(Value::Int(1));
    load_const(&mut prg, ka);
    prg.write_op(OpCode::Jbw);
    prg.write_u16(5);

    let (_, status) = run(&prg);
    assert_eq!(status, VmStatus::InvArg);
}

#[test]
fn invocation_stack_overflow_is_fatal() {
    let mut prg = Program::new();
    prg.write_op(OpCode::Frm);
    prg.write_byte(0);
    prg.write_op(OpCode::Jbw);
    prg.write_u16(5);

    let (_, status) = run(&prg);
    assert_eq!(status, VmStatus::InvArg);
}

#[test]
fn illegal_opcode_is_fatal() {
    let mut prg = Program::new();
    prg.write_byte(0xEE);

    let (_, status) = run(&prg);
    assert_eq!(status, VmStatus::InvArg);
}
