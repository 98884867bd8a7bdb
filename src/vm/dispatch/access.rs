use crate::common::object::ObjBody;
use crate::common::value::Value;
use crate::vm::Vm;
use crate::vm::error::{ErrorKind, VmError};

impl Vm {
    /// POP: discard the top entry.
    pub(crate) fn handle_pop(&mut self) -> Result<(), VmError> {
        self.pop_raw()?;
        Ok(())
    }

    /// PSH: push a verbatim copy of the local at base + u16.
    pub(crate) fn handle_psh(&mut self) -> Result<(), VmError> {
        let slot = usize::from(self.fetch_u16()?);
        let val = self.stack.get_local(slot).map_err(|k| self.fail(k))?.clone();
        self.push(val)
    }

    /// STR: write top (without popping) into base + u16, through a cell if
    /// one occupies the slot.
    pub(crate) fn handle_str(&mut self) -> Result<(), VmError> {
        let slot = usize::from(self.fetch_u16()?);
        let off = self.op_offset;
        let val = self.stack.top().map_err(|k| self.fail(k))?.clone();
        let target = self.stack.get_local_mut(slot).map_err(|k| k.at(off))?;
        write_slot(target, val);
        Ok(())
    }

    /// VAL family: push a constant-pool entry.
    pub(crate) fn handle_val(&mut self, width: usize) -> Result<(), VmError> {
        let idx = self.fetch_index(width)?;
        let val = self.constant(idx)?;
        self.push(val)
    }

    /// SYM family: push the environment's value for a symbol, reading
    /// through an upvalue cell.
    pub(crate) fn handle_sym(&mut self, width: usize) -> Result<(), VmError> {
        let idx = self.fetch_index(width)?;
        let sym = self.symbol(idx)?;
        match self.env.get(&sym) {
            Some(val) => {
                let out = val.clone().unwrap_cell();
                self.push(out)
            }
            None => Err(self.fail(ErrorKind::UndefinedSymbol(sym.name.to_string()))),
        }
    }

    /// DEF family: bind the popped top, verbatim. Defining over an existing
    /// binding replaces it.
    pub(crate) fn handle_def(&mut self, width: usize) -> Result<(), VmError> {
        let idx = self.fetch_index(width)?;
        let sym = self.symbol(idx)?;
        let val = self.pop_raw()?;
        self.env.set(sym, val);
        Ok(())
    }

    /// ASN family: assign to an existing binding, writing through an
    /// upvalue cell if one is bound.
    pub(crate) fn handle_asn(&mut self, width: usize) -> Result<(), VmError> {
        let idx = self.fetch_index(width)?;
        let sym = self.symbol(idx)?;
        let val = self.pop_raw()?;
        let off = self.op_offset;
        match self.env.get_mut(&sym) {
            Some(slot) => {
                write_slot(slot, val);
                Ok(())
            }
            None => Err(ErrorKind::UndefinedSymbol(sym.name.to_string()).at(off)),
        }
    }

    /// VID / TRU / FAL / PI / TAU / EUL.
    pub(crate) fn handle_literal(&mut self, val: Value) -> Result<(), VmError> {
        self.push(val)
    }
}

/// Stores `val` into `slot`: through the cell if the slot holds one,
/// otherwise replacing the slot. A cell never nests inside a cell.
fn write_slot(slot: &mut Value, val: Value) {
    if let Value::Obj(ptr) = slot {
        if let ObjBody::Heapval(cell) = unsafe { &mut (**ptr).body } {
            cell.value = val.unwrap_cell();
            return;
        }
    }
    *slot = val;
}
