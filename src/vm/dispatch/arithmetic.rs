use crate::common::object::{ObjBody, ObjString, ObjVector};
use crate::common::value::Value;
use crate::vm::Vm;
use crate::vm::error::{ErrorKind, VmError};

impl Vm {
    /// NEG: arithmetic negation of an Int or Real.
    pub(crate) fn handle_neg(&mut self) -> Result<(), VmError> {
        match self.pop_operand()? {
            Value::Int(i) => self.push(Value::Int(i.wrapping_neg())),
            Value::Real(r) => self.push(Value::Real(-r)),
            other => Err(self.binary_type_error("-", &other, None)),
        }
    }

    /// NOT: logical negation of truthiness, always a Bool.
    pub(crate) fn handle_not(&mut self) -> Result<(), VmError> {
        let val = self.pop_operand()?;
        self.push(Value::Bool(val.falsy()))
    }

    /// ADD: numeric addition, string or array concatenation, or
    /// component-wise vector addition.
    pub(crate) fn handle_add(&mut self) -> Result<(), VmError> {
        let b = self.pop_operand()?;
        let a = self.pop_operand()?;

        if let (Value::Int(x), Value::Int(y)) = (&a, &b) {
            return self.push(Value::Int(x.wrapping_add(*y)));
        }
        if a.is_numeric() && b.is_numeric() {
            let (x, y) = (a.as_real().unwrap(), b.as_real().unwrap());
            return self.push(Value::Real(x + y));
        }

        if let (Some(x), Some(y)) = (a.as_text(), b.as_text()) {
            let obj = self.alloc(ObjBody::Str(ObjString::concat(x, y)));
            return self.push(Value::Obj(obj));
        }

        if let (Some(x), Some(y)) = (as_array(&a), as_array(&b)) {
            if let (Some(first), Some(second)) = (x.first(), y.first()) {
                if first.type_name() != second.type_name() {
                    return Err(self.fail(ErrorKind::InvalidType(format!(
                        "cannot concatenate arrays of '{}' and '{}'",
                        first.type_name(),
                        second.type_name()
                    ))));
                }
            }
            let mut joined = x.to_vec();
            joined.extend(y.iter().cloned());
            let obj = self.alloc(ObjBody::Array(crate::common::object::ObjArray::from_raw(
                joined,
            )));
            return self.push(Value::Obj(obj));
        }

        if let (Some(x), Some(y)) = (as_vector(&a), as_vector(&b)) {
            let sum = x.plus(y).ok_or_else(|| {
                self.fail(ErrorKind::InvalidArgument(
                    "vector cardinality mismatch".into(),
                ))
            })?;
            let obj = self.alloc(ObjBody::Vector(sum));
            return self.push(Value::Obj(obj));
        }

        Err(self.binary_type_error("+", &a, Some(&b)))
    }

    /// SUB: numeric subtraction or component-wise vector subtraction.
    pub(crate) fn handle_sub(&mut self) -> Result<(), VmError> {
        let b = self.pop_operand()?;
        let a = self.pop_operand()?;

        if let (Value::Int(x), Value::Int(y)) = (&a, &b) {
            return self.push(Value::Int(x.wrapping_sub(*y)));
        }
        if a.is_numeric() && b.is_numeric() {
            let (x, y) = (a.as_real().unwrap(), b.as_real().unwrap());
            return self.push(Value::Real(x - y));
        }

        if let (Some(x), Some(y)) = (as_vector(&a), as_vector(&b)) {
            let diff = x.minus(y).ok_or_else(|| {
                self.fail(ErrorKind::InvalidArgument(
                    "vector cardinality mismatch".into(),
                ))
            })?;
            let obj = self.alloc(ObjBody::Vector(diff));
            return self.push(Value::Obj(obj));
        }

        Err(self.binary_type_error("-", &a, Some(&b)))
    }

    /// MUL: numeric product, string repetition by a non-negative Int,
    /// vector scaling, or the dot product of two vectors.
    pub(crate) fn handle_mul(&mut self) -> Result<(), VmError> {
        let b = self.pop_operand()?;
        let a = self.pop_operand()?;

        if let (Value::Int(x), Value::Int(y)) = (&a, &b) {
            return self.push(Value::Int(x.wrapping_mul(*y)));
        }
        if a.is_numeric() && b.is_numeric() {
            let (x, y) = (a.as_real().unwrap(), b.as_real().unwrap());
            return self.push(Value::Real(x * y));
        }

        let repeat = match (&a, &b) {
            (_, Value::Int(n)) if a.as_text().is_some() => Some((a.as_text().unwrap(), *n)),
            (Value::Int(n), _) if b.as_text().is_some() => Some((b.as_text().unwrap(), *n)),
            _ => None,
        };
        if let Some((text, n)) = repeat {
            if n < 0 {
                return Err(self.fail(ErrorKind::InvalidArgument(
                    "negative string repeat count".into(),
                )));
            }
            let obj = self.alloc(ObjBody::Str(ObjString::multiply(text, n)));
            return self.push(Value::Obj(obj));
        }

        let scale = match (&a, &b) {
            (_, _) if as_vector(&a).is_some() && b.is_numeric() => {
                Some((as_vector(&a).unwrap(), b.as_real().unwrap()))
            }
            (_, _) if as_vector(&b).is_some() && a.is_numeric() => {
                Some((as_vector(&b).unwrap(), a.as_real().unwrap()))
            }
            _ => None,
        };
        if let Some((vec, s)) = scale {
            let scaled = vec.scale(s);
            let obj = self.alloc(ObjBody::Vector(scaled));
            return self.push(Value::Obj(obj));
        }

        if let (Some(x), Some(y)) = (as_vector(&a), as_vector(&b)) {
            let dot = x.dot(y).ok_or_else(|| {
                self.fail(ErrorKind::InvalidArgument(
                    "vector cardinality mismatch".into(),
                ))
            })?;
            return self.push(Value::Real(dot));
        }

        Err(self.binary_type_error("*", &a, Some(&b)))
    }

    /// DIV: float division; always yields a Real.
    pub(crate) fn handle_div(&mut self) -> Result<(), VmError> {
        let b = self.pop_operand()?;
        let a = self.pop_operand()?;
        match (a.as_real(), b.as_real()) {
            (Some(x), Some(y)) => self.push(Value::Real(x / y)),
            _ => Err(self.binary_type_error("/", &a, Some(&b))),
        }
    }

    /// RIV: rounded division; yields an Int, truncating toward zero.
    pub(crate) fn handle_riv(&mut self) -> Result<(), VmError> {
        let b = self.pop_operand()?;
        let a = self.pop_operand()?;

        match (&a, &b) {
            (Value::Int(x), Value::Int(y)) => {
                if *y == 0 {
                    return Err(self.fail(ErrorKind::InvalidArgument("division by zero".into())));
                }
                self.push(Value::Int(x.wrapping_div(*y)))
            }
            _ => match (a.as_real(), b.as_real()) {
                (Some(x), Some(y)) => {
                    if y == 0.0 {
                        return Err(
                            self.fail(ErrorKind::InvalidArgument("division by zero".into()))
                        );
                    }
                    self.push(Value::Int((x / y).trunc() as i64))
                }
                _ => Err(self.binary_type_error("//", &a, Some(&b))),
            },
        }
    }

    /// POW: exponentiation, or the cross product of two 3-vectors.
    pub(crate) fn handle_pow(&mut self) -> Result<(), VmError> {
        let b = self.pop_operand()?;
        let a = self.pop_operand()?;

        if let (Value::Int(x), Value::Int(y)) = (&a, &b) {
            if let Ok(exp) = u32::try_from(*y) {
                return self.push(Value::Int(x.wrapping_pow(exp)));
            }
            // Negative or oversized exponents go through the real path.
            return self.push(Value::Real((*x as f64).powf(*y as f64)));
        }
        if a.is_numeric() && b.is_numeric() {
            let (x, y) = (a.as_real().unwrap(), b.as_real().unwrap());
            return self.push(Value::Real(x.powf(y)));
        }

        if let (Some(x), Some(y)) = (as_vector(&a), as_vector(&b)) {
            let cross = x.cross(y).ok_or_else(|| {
                self.fail(ErrorKind::InvalidArgument(
                    "cross product requires two vectors of cardinality 3".into(),
                ))
            })?;
            let obj = self.alloc(ObjBody::Vector(cross));
            return self.push(Value::Obj(obj));
        }

        Err(self.binary_type_error("**", &a, Some(&b)))
    }

    /// MOD: integer remainder.
    pub(crate) fn handle_mod(&mut self) -> Result<(), VmError> {
        let b = self.pop_operand()?;
        let a = self.pop_operand()?;
        match (&a, &b) {
            (Value::Int(x), Value::Int(y)) => {
                if *y == 0 {
                    return Err(self.fail(ErrorKind::InvalidArgument("modulo by zero".into())));
                }
                self.push(Value::Int(x.wrapping_rem(*y)))
            }
            _ => Err(self.binary_type_error("%", &a, Some(&b))),
        }
    }

    fn binary_type_error(&self, op: &str, a: &Value, b: Option<&Value>) -> VmError {
        match b {
            Some(b) => self.fail(ErrorKind::InvalidType(format!(
                "operator '{}' is not defined for '{}' and '{}'",
                op,
                a.type_name(),
                b.type_name()
            ))),
            None => self.fail(ErrorKind::InvalidType(format!(
                "operator '{}' is not defined for '{}'",
                op,
                a.type_name()
            ))),
        }
    }
}

fn as_array(val: &Value) -> Option<&[Value]> {
    match val {
        Value::Obj(ptr) => match unsafe { &(**ptr).body } {
            ObjBody::Array(arr) => Some(&arr.values),
            _ => None,
        },
        _ => None,
    }
}

fn as_vector(val: &Value) -> Option<&ObjVector> {
    match val {
        Value::Obj(ptr) => match unsafe { &(**ptr).body } {
            ObjBody::Vector(v) => Some(v),
            _ => None,
        },
        _ => None,
    }
}
