use std::ffi::c_void;
use std::fmt;

use crate::common::hash::fnv1a;
use crate::common::value::Value;

/// Header shared by every heap object. `reachable` belongs to the collector:
/// the mark phase sets it, the sweep phase clears it or frees the object.
#[derive(Debug)]
pub struct Object {
    pub reachable: bool,
    pub body: ObjBody,
}

impl Object {
    pub fn new(body: ObjBody) -> Self {
        Object {
            reachable: false,
            body,
        }
    }

    /// Equality between two heap objects as observed by `EQ`.
    ///
    /// Strings compare by content, vectors by components; every other
    /// variant compares by identity.
    ///
    /// # Safety
    /// Both pointers must reference live objects.
    pub unsafe fn equal(a: *mut Object, b: *mut Object) -> bool {
        if std::ptr::eq(a, b) {
            return true;
        }

        unsafe {
            match (&(*a).body, &(*b).body) {
                (ObjBody::Str(x), ObjBody::Str(y)) => x.hash == y.hash && x.data == y.data,
                (ObjBody::Vector(x), ObjBody::Vector(y)) => x.comp == y.comp,
                _ => false,
            }
        }
    }
}

#[derive(Debug)]
pub enum ObjBody {
    Str(ObjString),
    Array(ObjArray),
    Vector(ObjVector),
    Dict(ObjDict),
    Function(ObjFunction),
    Closure(ObjClosure),
    Heapval(ObjHeapval),
    FfiFunction(ObjFfiFunction),
    FfiPointer(ObjFfiPointer),
}

impl ObjBody {
    pub fn type_name(&self) -> &'static str {
        match self {
            ObjBody::Str(_) => "string",
            ObjBody::Array(_) => "array",
            ObjBody::Vector(_) => "vector",
            ObjBody::Dict(_) => "dictionary",
            ObjBody::Function(_) => "function",
            ObjBody::Closure(_) => "closure",
            ObjBody::Heapval(_) => "heapval",
            ObjBody::FfiFunction(_) => "ffi function",
            ObjBody::FfiPointer(_) => "ffi pointer",
        }
    }
}

impl fmt::Display for ObjBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjBody::Str(s) => write!(f, "'{}'", s.data),
            ObjBody::Array(a) => {
                write!(f, "[")?;
                for (i, v) in a.values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            ObjBody::Vector(v) => {
                write!(f, "(")?;
                for (i, c) in v.comp.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}", c)?;
                }
                write!(f, ")")
            }
            ObjBody::Dict(d) => {
                write!(f, "{{")?;
                for (i, (k, v)) in d.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            ObjBody::Function(fct) => write!(f, "<fn @{:#06x}>", fct.offset),
            ObjBody::Closure(clj) => write!(f, "<closure @{:p}>", clj.fct),
            ObjBody::Heapval(cell) => write!(f, "{}", cell.value),
            ObjBody::FfiFunction(_) => write!(f, "<ffi fn>"),
            ObjBody::FfiPointer(p) => write!(f, "<ffi ptr {:#010x}>", p.tag),
        }
    }
}

/// Immutable string payload. Concatenation and repetition build new objects.
#[derive(Debug)]
pub struct ObjString {
    pub hash: u32,
    pub data: String,
}

impl ObjString {
    pub fn from_raw(text: &str) -> Self {
        ObjString {
            hash: fnv1a(text),
            data: text.to_owned(),
        }
    }

    pub fn concat(a: &str, b: &str) -> Self {
        let mut data = String::with_capacity(a.len() + b.len());
        data.push_str(a);
        data.push_str(b);
        ObjString {
            hash: fnv1a(&data),
            data,
        }
    }

    pub fn multiply(text: &str, n: i64) -> Self {
        let data = text.repeat(n as usize);
        ObjString {
            hash: fnv1a(&data),
            data,
        }
    }
}

#[derive(Debug)]
pub struct ObjArray {
    pub values: Vec<Value>,
}

impl ObjArray {
    pub fn from_raw(values: Vec<Value>) -> Self {
        ObjArray { values }
    }

    pub fn append(&mut self, value: Value) {
        self.values.push(value);
    }

    pub fn remove(&mut self, i: usize) -> Option<Value> {
        if i < self.values.len() {
            Some(self.values.remove(i))
        } else {
            None
        }
    }

    pub fn swap(&mut self, i: usize, j: usize) -> bool {
        if i < self.values.len() && j < self.values.len() {
            self.values.swap(i, j);
            true
        } else {
            false
        }
    }

    pub fn concat(&mut self, other: &ObjArray) {
        self.values.extend(other.values.iter().cloned());
    }
}

/// Fixed-cardinality vector of reals.
#[derive(Debug)]
pub struct ObjVector {
    pub comp: Vec<f64>,
}

impl ObjVector {
    pub fn from_raw(comp: Vec<f64>) -> Self {
        ObjVector { comp }
    }

    pub fn card(&self) -> usize {
        self.comp.len()
    }

    pub fn plus(&self, other: &ObjVector) -> Option<ObjVector> {
        if self.card() != other.card() {
            return None;
        }
        Some(ObjVector {
            comp: self
                .comp
                .iter()
                .zip(&other.comp)
                .map(|(a, b)| a + b)
                .collect(),
        })
    }

    pub fn minus(&self, other: &ObjVector) -> Option<ObjVector> {
        if self.card() != other.card() {
            return None;
        }
        Some(ObjVector {
            comp: self
                .comp
                .iter()
                .zip(&other.comp)
                .map(|(a, b)| a - b)
                .collect(),
        })
    }

    pub fn dot(&self, other: &ObjVector) -> Option<f64> {
        if self.card() != other.card() {
            return None;
        }
        Some(self.comp.iter().zip(&other.comp).map(|(a, b)| a * b).sum())
    }

    /// Defined for cardinality 3 only.
    pub fn cross(&self, other: &ObjVector) -> Option<ObjVector> {
        if self.card() != 3 || other.card() != 3 {
            return None;
        }
        let (a, b) = (&self.comp, &other.comp);
        Some(ObjVector {
            comp: vec![
                a[1] * b[2] - a[2] * b[1],
                a[2] * b[0] - a[0] * b[2],
                a[0] * b[1] - a[1] * b[0],
            ],
        })
    }

    pub fn scale(&self, s: f64) -> ObjVector {
        ObjVector {
            comp: self.comp.iter().map(|c| c * s).collect(),
        }
    }
}

const DICT_LOAD: f64 = 0.95;

fn dict_grow(cap: usize) -> usize {
    if cap < 4 { 4 } else { cap * 2 }
}

/// Hash of a dictionary key, or `None` for unhashable values. Reals hash by
/// bit pattern; strings hash by content regardless of representation. The
/// type salt keeps `true`, `1` and `1.0` from landing on one bucket chain.
pub fn dict_key_hash(key: &Value) -> Option<u64> {
    match key {
        Value::Bool(b) => Some(3 << 56 | u64::from(*b)),
        Value::Int(i) => Some(5 << 56 ^ *i as u64),
        Value::Real(r) => Some(7 << 56 ^ r.to_bits()),
        Value::Char(c) => Some(11 << 56 | u64::from(*c as u32)),
        _ => key.as_text().map(|t| 13 << 56 | u64::from(fnv1a(t))),
    }
}

/// Key equality inside the dictionary. Reals compare by bit pattern, so a
/// NaN key can be stored and found again.
fn dict_key_equal(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (a.as_text(), b.as_text()) {
        return x == y;
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Real(x), Value::Real(y)) => x.to_bits() == y.to_bits(),
        (Value::Char(x), Value::Char(y)) => x == y,
        _ => false,
    }
}

/// Open-addressed key/value table with linear probing. Entries are never
/// deleted, so there is no tombstone state. Load stays at or below 0.95;
/// replacing an existing key never grows the table.
#[derive(Debug, Default)]
pub struct ObjDict {
    len: usize,
    entries: Vec<Option<(Value, Value)>>,
}

impl ObjDict {
    pub fn new() -> Self {
        ObjDict {
            len: 0,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries
            .iter()
            .filter_map(|slot| slot.as_ref().map(|(k, v)| (k, v)))
    }

    fn find(&self, key: &Value, hash: u64) -> Option<usize> {
        if self.entries.is_empty() {
            return None;
        }
        let cap = self.entries.len();
        let start = hash as usize % cap;
        let mut i = start;
        loop {
            match &self.entries[i] {
                None => return None,
                Some((k, _)) if dict_key_equal(k, key) => return Some(i),
                Some(_) => {}
            }
            i = (i + 1) % cap;
            if i == start {
                return None;
            }
        }
    }

    /// Inserts or replaces. Returns `false` when the key is unhashable.
    pub fn insert(&mut self, key: Value, value: Value) -> bool {
        let Some(hash) = dict_key_hash(&key) else {
            return false;
        };

        if let Some(i) = self.find(&key, hash) {
            if let Some((_, v)) = self.entries[i].as_mut() {
                *v = value;
            }
            return true;
        }

        if (self.len + 1) as f64 > self.entries.len() as f64 * DICT_LOAD {
            self.resize(dict_grow(self.entries.len()));
        }

        let cap = self.entries.len();
        let mut i = hash as usize % cap;
        while self.entries[i].is_some() {
            i = (i + 1) % cap;
        }
        self.entries[i] = Some((key, value));
        self.len += 1;
        true
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        let hash = dict_key_hash(key)?;
        self.find(key, hash).map(|i| &self.entries[i].as_ref().unwrap().1)
    }

    /// Copies every entry of `other` into `self`, overwriting collisions.
    pub fn merge(&mut self, other: &ObjDict) {
        for (k, v) in other.iter() {
            self.insert(k.clone(), v.clone());
        }
    }

    fn resize(&mut self, new_cap: usize) {
        let old = std::mem::replace(&mut self.entries, vec![None; new_cap]);
        for slot in old.into_iter().flatten() {
            let hash = dict_key_hash(&slot.0).unwrap();
            let mut i = hash as usize % new_cap;
            while self.entries[i].is_some() {
                i = (i + 1) % new_cap;
            }
            self.entries[i] = Some(slot);
        }
    }
}

/// Compiled function body. The bytecode lives inside the owning program's
/// instruction stream; the object only records where. `upvalues` is the
/// number of promoted cells a `CLO` over this function captures.
#[derive(Debug)]
pub struct ObjFunction {
    pub offset: u32,
    pub len: u32,
    pub upvalues: u8,
}

/// A function bundled with its captured upvalue cells. `fct` always points
/// at a Function object; `cells` always hold Heapval objects, first captured
/// first.
#[derive(Debug)]
pub struct ObjClosure {
    pub fct: *mut Object,
    pub cells: Vec<Value>,
}

/// Upvalue cell: one value shared between a frame's locals, an environment
/// binding, and any closures that captured it.
#[derive(Debug)]
pub struct ObjHeapval {
    pub value: Value,
}

/// Verdict of a native routine.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiResult {
    Ok = 0,
    Error,
    Arity,
    Types,
}

/// Native routine callable through `CAL`. `argv[0]` is the receiver when
/// invoked as a method. The routine writes its result through `ret` (or
/// leaves Void there) and reports a verdict.
pub type FfiFunction = unsafe extern "C" fn(argv: *const Value, argc: u8, ret: *mut Value) -> FfiResult;

/// End-of-life callback for an FFI pointer, invoked with the pointer's tag.
/// Must tolerate a null pointer.
pub type FfiDeleter = extern "C" fn(tag: u32, ptr: *mut c_void);

#[derive(Debug)]
pub struct ObjFfiFunction {
    pub fun: FfiFunction,
}

/// Opaque native resource. The tag dispatches on the pointer's meaning; the
/// deleter runs exactly once, when the collector sweeps the object or the
/// VM is dropped.
#[derive(Debug)]
pub struct ObjFfiPointer {
    pub tag: u32,
    pub ptr: *mut c_void,
    pub del: Option<FfiDeleter>,
}

impl Drop for ObjFfiPointer {
    fn drop(&mut self) {
        if let Some(del) = self.del {
            del(self.tag, self.ptr);
        }
    }
}
