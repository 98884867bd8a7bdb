use crate::common::value::Value;
use crate::vm::Vm;
use crate::vm::error::{ErrorKind, VmError};

impl Vm {
    /// FIN: halt with status OK.
    pub(crate) fn handle_fin(&mut self) -> Result<(), VmError> {
        self.halt();
        Ok(())
    }

    /// GC: collection request at a guaranteed safe point.
    pub(crate) fn handle_gc(&mut self) -> Result<(), VmError> {
        self.collect();
        Ok(())
    }

    /// DBG: yield to an attached debugger, otherwise do nothing.
    pub(crate) fn handle_dbg(&mut self) -> Result<(), VmError> {
        if let Some(hook) = self.debug_hook() {
            hook(self);
        }
        Ok(())
    }

    /// JMP: unconditional forward jump.
    pub(crate) fn handle_jmp(&mut self) -> Result<(), VmError> {
        let delta = self.fetch_u16()?;
        self.jump_to(self.ip() + usize::from(delta))
    }

    /// JPT: pop a bool, jump forward if true.
    pub(crate) fn handle_jpt(&mut self) -> Result<(), VmError> {
        let delta = self.fetch_u16()?;
        if self.pop_predicate()? {
            self.jump_to(self.ip() + usize::from(delta))?;
        }
        Ok(())
    }

    /// JPF: pop a bool, jump forward if false.
    pub(crate) fn handle_jpf(&mut self) -> Result<(), VmError> {
        let delta = self.fetch_u16()?;
        if !self.pop_predicate()? {
            self.jump_to(self.ip() + usize::from(delta))?;
        }
        Ok(())
    }

    /// JBW: unconditional backward jump.
    pub(crate) fn handle_jbw(&mut self) -> Result<(), VmError> {
        let delta = self.fetch_u16()?;
        let target = self.ip().checked_sub(usize::from(delta)).ok_or_else(|| {
            self.fail(ErrorKind::Corrupt(
                "backward jump before the start of the instruction stream".into(),
            ))
        })?;
        self.jump_to(target)
    }

    fn pop_predicate(&mut self) -> Result<bool, VmError> {
        match self.pop_operand()? {
            Value::Bool(b) => Ok(b),
            other => Err(self.fail(ErrorKind::InvalidType(format!(
                "jump predicate must be bool, got '{}'",
                other.type_name()
            )))),
        }
    }
}
