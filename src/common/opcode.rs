use num_enum::TryFromPrimitive;

/// One-byte opcode set of the Moth VM.
///
/// Each opcode is followed by 0-4 bytes of little-endian immediate. The
/// `..2/..3/..4` families differ only in immediate width; an emitter picks
/// the narrowest width that fits the pool index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum OpCode {
    /// Halt with status OK.
    Fin = 0x00,
    Nop,
    /// Collection request; a safe point by construction.
    Gc,
    /// Yield to an attached debugger, otherwise a no-op.
    Dbg,

    /// Pop a library path, open it, push the library handle.
    Dll,
    /// Pop a symbol name, peek the library handle, push the resolved routine.
    Ffn,

    Pop,
    /// Push a copy of the local at base + u16.
    Psh,
    /// Write top (without popping) into the local at base + u16.
    Str,

    /// Forward jump by u16.
    Jmp,
    /// Pop a bool, forward jump by u16 if true.
    Jpt,
    /// Pop a bool, forward jump by u16 if false.
    Jpf,
    /// Backward jump by u16.
    Jbw,

    /// Pop a function and its promoted cells, push a closure.
    Clo,
    Cal,
    /// Promote the popped top into a heap cell.
    Pro,
    Ret,

    Val,
    Val2,
    Val3,
    Val4,

    Sym,
    Sym2,
    Sym3,
    Sym4,

    Def,
    Def2,
    Def3,
    Def4,

    Asn,
    Asn2,
    Asn3,
    Asn4,

    Frm,
    Frm2,
    Frm3,
    Frm4,

    Vid,
    Tru,
    Fal,

    Pi,
    Tau,
    Eul,

    /// Pop u8 reals into a vector.
    Vec,
    /// Pop u8 values into an array, order preserved.
    Arr,
    /// Pop u8 stack entries (2n, value atop its key) into a dictionary.
    Dct,

    Neg,
    Not,

    Add,
    Sub,
    Div,
    Mul,
    Riv,
    Pow,
    Mod,

    Idx,
    Ida,
    Mrg,

    Eq,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
}

impl OpCode {
    /// Width in bytes of the immediate following the opcode byte.
    pub fn operand_width(self) -> usize {
        use OpCode::*;
        match self {
            Psh | Str | Jmp | Jpt | Jpf | Jbw => 2,
            Val | Sym | Def | Asn | Frm => 1,
            Val2 | Sym2 | Def2 | Asn2 | Frm2 => 2,
            Val3 | Sym3 | Def3 | Asn3 | Frm3 => 3,
            Val4 | Sym4 | Def4 | Asn4 | Frm4 => 4,
            Vec | Arr | Dct => 1,
            _ => 0,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        use OpCode::*;
        match self {
            Fin => "FIN",
            Nop => "NOP",
            Gc => "GC",
            Dbg => "DBG",
            Dll => "DLL",
            Ffn => "FFN",
            Pop => "POP",
            Psh => "PSH",
            Str => "STR",
            Jmp => "JMP",
            Jpt => "JPT",
            Jpf => "JPF",
            Jbw => "JBW",
            Clo => "CLO",
            Cal => "CAL",
            Pro => "PRO",
            Ret => "RET",
            Val => "VAL",
            Val2 => "VAL2",
            Val3 => "VAL3",
            Val4 => "VAL4",
            Sym => "SYM",
            Sym2 => "SYM2",
            Sym3 => "SYM3",
            Sym4 => "SYM4",
            Def => "DEF",
            Def2 => "DEF2",
            Def3 => "DEF3",
            Def4 => "DEF4",
            Asn => "ASN",
            Asn2 => "ASN2",
            Asn3 => "ASN3",
            Asn4 => "ASN4",
            Frm => "FRM",
            Frm2 => "FRM2",
            Frm3 => "FRM3",
            Frm4 => "FRM4",
            Vid => "VID",
            Tru => "TRU",
            Fal => "FAL",
            Pi => "PI",
            Tau => "TAU",
            Eul => "EUL",
            Vec => "VEC",
            Arr => "ARR",
            Dct => "DCT",
            Neg => "NEG",
            Not => "NOT",
            Add => "ADD",
            Sub => "SUB",
            Div => "DIV",
            Mul => "MUL",
            Riv => "RIV",
            Pow => "POW",
            Mod => "MOD",
            Idx => "IDX",
            Ida => "IDA",
            Mrg => "MRG",
            Eq => "EQ",
            Neq => "NEQ",
            Gt => "GT",
            Lt => "LT",
            Gte => "GTE",
            Lte => "LTE",
        }
    }
}
