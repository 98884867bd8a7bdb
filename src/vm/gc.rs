use tracing::debug;

use crate::common::object::{ObjBody, Object};
use crate::common::value::Value;
use crate::vm::Vm;

/// Initial capacity of the registry.
const GC_INIT_CAP: usize = 10;

fn grow_cap(cap: usize) -> usize {
    if cap < 4 { 4 } else { cap * 2 }
}

/// The collector's registry: every heap object allocated by the VM, in
/// allocation order. Capacity is an explicit collection trigger, not just a
/// storage bound — a full registry forces a collection at the next safe
/// point and only grows if the sweep freed nothing.
#[derive(Debug)]
pub struct GcRegistry {
    pub(crate) objs: Vec<*mut Object>,
    pub(crate) cap: usize,
}

impl GcRegistry {
    pub fn new() -> Self {
        GcRegistry {
            objs: Vec::with_capacity(GC_INIT_CAP),
            cap: GC_INIT_CAP,
        }
    }

    pub fn len(&self) -> usize {
        self.objs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objs.is_empty()
    }
}

impl Default for GcRegistry {
    fn default() -> Self {
        GcRegistry::new()
    }
}

/// Marks one object and everything reachable from it.
///
/// # Safety
/// `ptr` must reference a live object, and every object reachable from it
/// must be live as well. Holds at every safe point: the VM only collects
/// between instructions.
pub(crate) unsafe fn mark_object(ptr: *mut Object) {
    unsafe {
        if (*ptr).reachable {
            return;
        }
        (*ptr).reachable = true;

        match &(*ptr).body {
            ObjBody::Array(arr) => {
                for val in &arr.values {
                    mark_value(val);
                }
            }
            ObjBody::Dict(dict) => {
                for (key, val) in dict.iter() {
                    mark_value(key);
                    mark_value(val);
                }
            }
            ObjBody::Closure(clj) => {
                mark_object(clj.fct);
                for cell in &clj.cells {
                    mark_value(cell);
                }
            }
            ObjBody::Heapval(cell) => {
                mark_value(&cell.value);
            }
            // Strings, vectors, functions and FFI values have no
            // object-valued children.
            _ => {}
        }
    }
}

/// # Safety
/// See [`mark_object`].
pub(crate) unsafe fn mark_value(val: &Value) {
    if let Value::Obj(ptr) = val {
        unsafe { mark_object(*ptr) };
    }
}

impl Vm {
    /// Allocates a heap object and registers it with the collector before
    /// returning, so the creating instruction can rely on it surviving
    /// until the next safe point. Collection itself never runs here: an
    /// instruction may hold popped operands that no root references, so a
    /// full registry only schedules a collection for the next opcode
    /// boundary.
    pub(crate) fn alloc(&mut self, body: ObjBody) -> *mut Object {
        let ptr = Box::into_raw(Box::new(Object::new(body)));
        self.gc.objs.push(ptr);
        ptr
    }

    /// Capacity-triggered collection, run between instructions. The
    /// registry's capacity grows only when a sweep freed nothing.
    pub(crate) fn collect_if_full(&mut self) {
        if self.gc.objs.len() < self.gc.cap {
            return;
        }
        self.collect();
        while self.gc.objs.len() >= self.gc.cap {
            self.gc.cap = grow_cap(self.gc.cap);
        }
    }

    /// Stop-the-world mark and sweep. Roots are every value-stack slot and
    /// every environment binding; constants and symbols are outside the
    /// collector's jurisdiction.
    pub fn collect(&mut self) {
        unsafe {
            for val in self.stack.values() {
                mark_value(val);
            }
            for val in self.env.values() {
                mark_value(val);
            }

            let mut swept = 0usize;
            let mut i = 0;
            while i < self.gc.objs.len() {
                let ptr = self.gc.objs[i];
                if (*ptr).reachable {
                    (*ptr).reachable = false;
                    i += 1;
                } else {
                    self.gc.objs.swap_remove(i);
                    drop(Box::from_raw(ptr));
                    swept += 1;
                }
            }

            if swept > 0 {
                debug!(swept, live = self.gc.objs.len(), "sweep finished");
            }
        }
    }

    /// Number of objects currently registered with the collector.
    pub fn live_objects(&self) -> usize {
        self.gc.len()
    }
}
