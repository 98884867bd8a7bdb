use crate::common::object::{dict_key_hash, ObjArray, ObjBody, ObjDict, ObjString, ObjVector};
use crate::common::value::Value;
use crate::vm::Vm;
use crate::vm::error::{ErrorKind, VmError};

impl Vm {
    /// VEC <n>: pop n reals into a vector, first pushed first.
    pub(crate) fn handle_vec(&mut self) -> Result<(), VmError> {
        let n = usize::from(self.fetch_byte()?);
        let mut comp = Vec::with_capacity(n);
        for _ in 0..n {
            let val = self.pop_operand()?;
            let Some(r) = val.as_real() else {
                return Err(self.fail(ErrorKind::InvalidType(format!(
                    "vector component must be numeric, got '{}'",
                    val.type_name()
                ))));
            };
            comp.push(r);
        }
        comp.reverse();

        let obj = self.alloc(ObjBody::Vector(ObjVector::from_raw(comp)));
        self.push(Value::Obj(obj))
    }

    /// ARR <n>: pop n values into an array, order preserved.
    pub(crate) fn handle_arr(&mut self) -> Result<(), VmError> {
        let n = usize::from(self.fetch_byte()?);
        let mut values = Vec::with_capacity(n);
        for _ in 0..n {
            values.push(self.pop_operand()?);
        }
        values.reverse();

        let obj = self.alloc(ObjBody::Array(ObjArray::from_raw(values)));
        self.push(Value::Obj(obj))
    }

    /// DCT <2n>: pop n key-value pairs, each value atop its key. A later
    /// pair wins over an earlier one with the same key.
    pub(crate) fn handle_dct(&mut self) -> Result<(), VmError> {
        let count = usize::from(self.fetch_byte()?);
        if count % 2 != 0 {
            return Err(self.fail(ErrorKind::Corrupt(
                "dictionary constructor needs an even entry count".into(),
            )));
        }

        let mut pairs = Vec::with_capacity(count / 2);
        for _ in 0..count / 2 {
            let value = self.pop_operand()?;
            let key = self.pop_operand()?;
            pairs.push((key, value));
        }
        pairs.reverse();

        let mut dict = ObjDict::new();
        for (key, value) in pairs {
            if !dict.insert(key.clone(), value) {
                return Err(self.fail(ErrorKind::InvalidType(format!(
                    "'{}' is not a hashable dictionary key",
                    key.type_name()
                ))));
            }
        }

        let obj = self.alloc(ObjBody::Dict(dict));
        self.push(Value::Obj(obj))
    }

    /// IDX: pop the index, then the collection; push the element.
    pub(crate) fn handle_idx(&mut self) -> Result<(), VmError> {
        let index = self.pop_operand()?;
        let coll = self.pop_operand()?;

        if let Some(text) = coll.as_text() {
            let i = self.ordered_index(&index, text.chars().count())?;
            let c = text.chars().nth(i).expect("bounds checked");
            return self.push(Value::Char(c));
        }

        let Value::Obj(ptr) = &coll else {
            return Err(self.index_type_error(&coll));
        };

        match unsafe { &(**ptr).body } {
            ObjBody::Array(arr) => {
                let i = self.ordered_index(&index, arr.values.len())?;
                let val = arr.values[i].clone();
                self.push(val)
            }
            ObjBody::Vector(vec) => {
                let i = self.ordered_index(&index, vec.card())?;
                self.push(Value::Real(vec.comp[i]))
            }
            ObjBody::Dict(dict) => {
                if dict_key_hash(&index).is_none() {
                    return Err(self.fail(ErrorKind::InvalidType(format!(
                        "'{}' is not a hashable dictionary key",
                        index.type_name()
                    ))));
                }
                let val = dict.get(&index).cloned().unwrap_or(Value::Void);
                self.push(val)
            }
            _ => Err(self.index_type_error(&coll)),
        }
    }

    /// IDA: pop the value, then the index; the collection is peeked and
    /// mutated in place. A string target is immutable, so the rewritten
    /// copy replaces it in its stack slot.
    pub(crate) fn handle_ida(&mut self) -> Result<(), VmError> {
        let value = self.pop_operand()?;
        let index = self.pop_operand()?;
        let coll = self.stack.top().map_err(|k| self.fail(k))?.clone().unwrap_cell();

        if let Some(text) = coll.as_text().map(str::to_owned) {
            let i = self.ordered_index(&index, text.chars().count())?;
            let Value::Char(c) = &value else {
                return Err(self.fail(ErrorKind::InvalidType(format!(
                    "string element must be a char, got '{}'",
                    value.type_name()
                ))));
            };
            let rewritten: String = text
                .chars()
                .enumerate()
                .map(|(j, old)| if j == i { *c } else { old })
                .collect();
            let obj = self.alloc(ObjBody::Str(ObjString::from_raw(&rewritten)));
            let off = self.op_offset;
            let slot = self.stack.top_mut().map_err(|k| k.at(off))?;
            write_through(slot, Value::Obj(obj));
            return Ok(());
        }

        let Value::Obj(ptr) = &coll else {
            return Err(self.index_type_error(&coll));
        };

        match unsafe { &mut (**ptr).body } {
            ObjBody::Array(arr) => {
                let i = self.ordered_index(&index, arr.values.len())?;
                arr.values[i] = value;
                Ok(())
            }
            ObjBody::Dict(dict) => {
                if !dict.insert(index.clone(), value) {
                    return Err(self.fail(ErrorKind::InvalidType(format!(
                        "'{}' is not a hashable dictionary key",
                        index.type_name()
                    ))));
                }
                Ok(())
            }
            _ => Err(self.index_type_error(&coll)),
        }
    }

    /// MRG: pop the top entry and append it into the collection beneath.
    pub(crate) fn handle_mrg(&mut self) -> Result<(), VmError> {
        let addition = self.pop_operand()?;
        let target = self.stack.top().map_err(|k| self.fail(k))?.clone().unwrap_cell();

        let Value::Obj(target_ptr) = &target else {
            return Err(self.fail(ErrorKind::InvalidType(format!(
                "cannot merge into a value of type '{}'",
                target.type_name()
            ))));
        };

        let target_is_array = matches!(unsafe { &(**target_ptr).body }, ObjBody::Array(_));
        if target_is_array {
            // Copy the addition out first so merging a collection into
            // itself stays sound.
            let extension: Vec<Value> = match &addition {
                Value::Obj(ptr) => match unsafe { &(**ptr).body } {
                    ObjBody::Array(arr) => arr.values.clone(),
                    _ => vec![addition.clone()],
                },
                _ => vec![addition.clone()],
            };
            if let ObjBody::Array(arr) = unsafe { &mut (**target_ptr).body } {
                arr.values.extend(extension);
            }
            return Ok(());
        }

        let target_is_dict = matches!(unsafe { &(**target_ptr).body }, ObjBody::Dict(_));
        if target_is_dict {
            let pairs: Vec<(Value, Value)> = match &addition {
                Value::Obj(ptr) => match unsafe { &(**ptr).body } {
                    ObjBody::Dict(d) => d.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                    _ => {
                        return Err(self.fail(ErrorKind::InvalidType(format!(
                            "cannot merge '{}' into a dictionary",
                            addition.type_name()
                        ))));
                    }
                },
                _ => {
                    return Err(self.fail(ErrorKind::InvalidType(format!(
                        "cannot merge '{}' into a dictionary",
                        addition.type_name()
                    ))));
                }
            };
            if let ObjBody::Dict(dict) = unsafe { &mut (**target_ptr).body } {
                for (k, v) in pairs {
                    dict.insert(k, v);
                }
            }
            return Ok(());
        }

        Err(self.fail(ErrorKind::InvalidType(format!(
            "cannot merge into a value of type '{}'",
            target.type_name()
        ))))
    }

    /// Bounds-checked index into an ordered collection.
    fn ordered_index(&self, index: &Value, len: usize) -> Result<usize, VmError> {
        let Value::Int(i) = index else {
            return Err(self.fail(ErrorKind::InvalidType(format!(
                "index must be an int, got '{}'",
                index.type_name()
            ))));
        };
        if *i < 0 || *i as usize >= len {
            return Err(self.fail(ErrorKind::InvalidArgument(format!(
                "index {} outside of length {}",
                i, len
            ))));
        }
        Ok(*i as usize)
    }

    fn index_type_error(&self, coll: &Value) -> VmError {
        self.fail(ErrorKind::InvalidType(format!(
            "cannot index a value of type '{}'",
            coll.type_name()
        )))
    }
}

/// Replaces the stack slot, writing through an upvalue cell if one sits
/// there.
fn write_through(slot: &mut Value, val: Value) {
    if let Value::Obj(ptr) = slot {
        if let ObjBody::Heapval(cell) = unsafe { &mut (**ptr).body } {
            cell.value = val;
            return;
        }
    }
    *slot = val;
}
