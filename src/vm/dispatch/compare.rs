use crate::common::value::Value;
use crate::vm::Vm;
use crate::vm::error::{ErrorKind, VmError};

impl Vm {
    /// EQ: total over all value types; a cross-type pair is unequal.
    pub(crate) fn handle_eq(&mut self) -> Result<(), VmError> {
        let b = self.pop_operand()?;
        let a = self.pop_operand()?;
        self.push(Value::Bool(a == b))
    }

    /// NEQ: complement of EQ.
    pub(crate) fn handle_neq(&mut self) -> Result<(), VmError> {
        let b = self.pop_operand()?;
        let a = self.pop_operand()?;
        self.push(Value::Bool(a != b))
    }

    pub(crate) fn handle_gt(&mut self) -> Result<(), VmError> {
        self.handle_ordering(">", |x, y| x > y, |x, y| x > y, |x, y| x > y)
    }

    pub(crate) fn handle_lt(&mut self) -> Result<(), VmError> {
        self.handle_ordering("<", |x, y| x < y, |x, y| x < y, |x, y| x < y)
    }

    pub(crate) fn handle_gte(&mut self) -> Result<(), VmError> {
        self.handle_ordering(">=", |x, y| x >= y, |x, y| x >= y, |x, y| x >= y)
    }

    pub(crate) fn handle_lte(&mut self) -> Result<(), VmError> {
        self.handle_ordering("<=", |x, y| x <= y, |x, y| x <= y, |x, y| x <= y)
    }

    /// Ordered comparison over numerics (Ints promote when mixed with a
    /// Real) or strings (lexicographic). Anything else is a type fault.
    fn handle_ordering(
        &mut self,
        op: &str,
        int_cmp: fn(i64, i64) -> bool,
        real_cmp: fn(f64, f64) -> bool,
        text_cmp: fn(&str, &str) -> bool,
    ) -> Result<(), VmError> {
        let b = self.pop_operand()?;
        let a = self.pop_operand()?;

        if let (Value::Int(x), Value::Int(y)) = (&a, &b) {
            return self.push(Value::Bool(int_cmp(*x, *y)));
        }
        if a.is_numeric() && b.is_numeric() {
            let (x, y) = (a.as_real().unwrap(), b.as_real().unwrap());
            return self.push(Value::Bool(real_cmp(x, y)));
        }
        if let (Some(x), Some(y)) = (a.as_text(), b.as_text()) {
            let res = text_cmp(x, y);
            return self.push(Value::Bool(res));
        }

        Err(self.fail(ErrorKind::InvalidType(format!(
            "operator '{}' is not defined for '{}' and '{}'",
            op,
            a.type_name(),
            b.type_name()
        ))))
    }
}
