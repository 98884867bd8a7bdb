mod access;
mod arithmetic;
mod collection;
mod compare;
mod control;
mod frame;

use crate::common::opcode::OpCode;
use crate::vm::Vm;
use crate::vm::error::VmError;

impl Vm {
    pub(crate) fn execute(&mut self, op: OpCode) -> Result<(), VmError> {
        match op {
            OpCode::Fin => self.handle_fin(),
            OpCode::Nop => Ok(()),
            OpCode::Gc => self.handle_gc(),
            OpCode::Dbg => self.handle_dbg(),

            OpCode::Dll => self.handle_dll(),
            OpCode::Ffn => self.handle_ffn(),

            OpCode::Pop => self.handle_pop(),
            OpCode::Psh => self.handle_psh(),
            OpCode::Str => self.handle_str(),

            OpCode::Jmp => self.handle_jmp(),
            OpCode::Jpt => self.handle_jpt(),
            OpCode::Jpf => self.handle_jpf(),
            OpCode::Jbw => self.handle_jbw(),

            OpCode::Clo => self.handle_clo(),
            OpCode::Cal => self.handle_cal(),
            OpCode::Pro => self.handle_pro(),
            OpCode::Ret => self.handle_ret(),

            OpCode::Val => self.handle_val(1),
            OpCode::Val2 => self.handle_val(2),
            OpCode::Val3 => self.handle_val(3),
            OpCode::Val4 => self.handle_val(4),

            OpCode::Sym => self.handle_sym(1),
            OpCode::Sym2 => self.handle_sym(2),
            OpCode::Sym3 => self.handle_sym(3),
            OpCode::Sym4 => self.handle_sym(4),

            OpCode::Def => self.handle_def(1),
            OpCode::Def2 => self.handle_def(2),
            OpCode::Def3 => self.handle_def(3),
            OpCode::Def4 => self.handle_def(4),

            OpCode::Asn => self.handle_asn(1),
            OpCode::Asn2 => self.handle_asn(2),
            OpCode::Asn3 => self.handle_asn(3),
            OpCode::Asn4 => self.handle_asn(4),

            OpCode::Frm => self.handle_frm(1),
            OpCode::Frm2 => self.handle_frm(2),
            OpCode::Frm3 => self.handle_frm(3),
            OpCode::Frm4 => self.handle_frm(4),

            OpCode::Vid => self.handle_literal(crate::common::value::Value::Void),
            OpCode::Tru => self.handle_literal(crate::common::value::Value::Bool(true)),
            OpCode::Fal => self.handle_literal(crate::common::value::Value::Bool(false)),

            OpCode::Pi => self.handle_literal(crate::common::value::Value::Real(std::f64::consts::PI)),
            OpCode::Tau => self.handle_literal(crate::common::value::Value::Real(std::f64::consts::TAU)),
            OpCode::Eul => self.handle_literal(crate::common::value::Value::Real(std::f64::consts::E)),

            OpCode::Vec => self.handle_vec(),
            OpCode::Arr => self.handle_arr(),
            OpCode::Dct => self.handle_dct(),

            OpCode::Neg => self.handle_neg(),
            OpCode::Not => self.handle_not(),

            OpCode::Add => self.handle_add(),
            OpCode::Sub => self.handle_sub(),
            OpCode::Div => self.handle_div(),
            OpCode::Mul => self.handle_mul(),
            OpCode::Riv => self.handle_riv(),
            OpCode::Pow => self.handle_pow(),
            OpCode::Mod => self.handle_mod(),

            OpCode::Idx => self.handle_idx(),
            OpCode::Ida => self.handle_ida(),
            OpCode::Mrg => self.handle_mrg(),

            OpCode::Eq => self.handle_eq(),
            OpCode::Neq => self.handle_neq(),
            OpCode::Gt => self.handle_gt(),
            OpCode::Lt => self.handle_lt(),
            OpCode::Gte => self.handle_gte(),
            OpCode::Lte => self.handle_lte(),
        }
    }
}
