//! Offset-annotated disassembly of a program's instruction stream.

use crate::common::opcode::OpCode;
use crate::program::Program;

fn operand(bytes: &[u8], ofst: usize, width: usize) -> Option<u32> {
    if ofst + width > bytes.len() {
        return None;
    }
    let mut v: u32 = 0;
    for i in (0..width).rev() {
        v = v << 8 | u32::from(bytes[ofst + i]);
    }
    Some(v)
}

fn instruction(prog: &Program, ofst: usize, out: &mut String) -> usize {
    use std::fmt::Write;

    let bytes = prog.bytes();
    let Ok(op) = OpCode::try_from(bytes[ofst]) else {
        let _ = writeln!(out, "{:#06x} ??? {:#04x}", ofst, bytes[ofst]);
        return ofst + 1;
    };

    let width = op.operand_width();
    let Some(imm) = operand(bytes, ofst + 1, width) else {
        let _ = writeln!(out, "{:#06x} {} <truncated>", ofst, op.mnemonic());
        return bytes.len();
    };

    match op {
        OpCode::Val | OpCode::Val2 | OpCode::Val3 | OpCode::Val4 => {
            let _ = write!(out, "{:#06x} {} {}", ofst, op.mnemonic(), imm);
            match prog.constant(imm as usize) {
                Some(val) => {
                    let _ = writeln!(out, " ({})", val);
                }
                None => {
                    let _ = writeln!(out, " (?)");
                }
            }
        }
        OpCode::Sym
        | OpCode::Sym2
        | OpCode::Sym3
        | OpCode::Sym4
        | OpCode::Def
        | OpCode::Def2
        | OpCode::Def3
        | OpCode::Def4
        | OpCode::Asn
        | OpCode::Asn2
        | OpCode::Asn3
        | OpCode::Asn4 => {
            let _ = write!(out, "{:#06x} {} {}", ofst, op.mnemonic(), imm);
            match prog.symbol(imm as usize) {
                Some(sym) => {
                    let _ = writeln!(out, " ({})", sym.name);
                }
                None => {
                    let _ = writeln!(out, " (?)");
                }
            }
        }
        _ if width > 0 => {
            let _ = writeln!(out, "{:#06x} {} {}", ofst, op.mnemonic(), imm);
        }
        _ => {
            let _ = writeln!(out, "{:#06x} {}", ofst, op.mnemonic());
        }
    }

    ofst + 1 + width
}

pub fn disassemble(name: &str, prog: &Program) -> String {
    let mut out = format!("~~~~ {:<10} ~~~~\n", name);
    let mut ofst = 0;
    while ofst < prog.len() {
        ofst = instruction(prog, ofst, &mut out);
    }
    out
}
