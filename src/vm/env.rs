use crate::common::value::{Symbol, Value};

/// Maximum load factor before the bucket array grows.
const ENV_LOAD: f64 = 0.95;

fn grow_cap(cap: usize) -> usize {
    if cap < 4 { 4 } else { cap * 2 }
}

#[derive(Debug, Clone)]
enum Bucket {
    Empty,
    Tombstone,
    Used(Symbol, Value),
}

/// The VM's global symbol table: open addressing with linear probing.
///
/// Keys are interned symbols, so a probe compares one hash and one pointer.
/// Deletion leaves a tombstone; a lookup ends at a truly empty bucket or
/// after one full wrap, whichever comes first.
#[derive(Debug, Default)]
pub struct Environment {
    len: usize,
    buckets: Vec<Bucket>,
}

impl Environment {
    pub fn new() -> Self {
        Environment::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn find(&self, key: &Symbol) -> Option<usize> {
        if self.buckets.is_empty() {
            return None;
        }
        let cap = self.buckets.len();
        let start = key.hash as usize % cap;
        let mut i = start;
        loop {
            match &self.buckets[i] {
                Bucket::Empty => return None,
                Bucket::Used(sym, _) if sym == key => return Some(i),
                _ => {}
            }
            i = (i + 1) % cap;
            if i == start {
                return None;
            }
        }
    }

    /// First bucket usable for inserting `key`: its own bucket if present,
    /// otherwise the first empty or tombstoned slot on its probe chain.
    fn slot_for(&self, key: &Symbol) -> usize {
        let cap = self.buckets.len();
        let mut i = key.hash as usize % cap;
        loop {
            match &self.buckets[i] {
                Bucket::Empty | Bucket::Tombstone => return i,
                Bucket::Used(sym, _) if sym == key => return i,
                _ => i = (i + 1) % cap,
            }
        }
    }

    /// Inserts a new binding or updates an existing one.
    pub fn set(&mut self, key: Symbol, value: Value) {
        if let Some(i) = self.find(&key) {
            if let Bucket::Used(_, v) = &mut self.buckets[i] {
                *v = value;
            }
            return;
        }

        if (self.len + 1) as f64 > self.buckets.len() as f64 * ENV_LOAD {
            self.resize(grow_cap(self.buckets.len()));
        }

        let i = self.slot_for(&key);
        self.buckets[i] = Bucket::Used(key, value);
        self.len += 1;
    }

    /// Updates only if the binding exists; reports whether it did.
    pub fn set_existing(&mut self, key: &Symbol, value: Value) -> bool {
        if self.len == 0 {
            return false;
        }
        match self.find(key) {
            Some(i) => {
                if let Bucket::Used(_, v) = &mut self.buckets[i] {
                    *v = value;
                }
                true
            }
            None => false,
        }
    }

    pub fn get(&self, key: &Symbol) -> Option<&Value> {
        if self.len == 0 {
            return None;
        }
        self.find(key).map(|i| match &self.buckets[i] {
            Bucket::Used(_, v) => v,
            _ => unreachable!("find only returns used buckets"),
        })
    }

    pub fn get_mut(&mut self, key: &Symbol) -> Option<&mut Value> {
        if self.len == 0 {
            return None;
        }
        self.find(key).map(|i| match &mut self.buckets[i] {
            Bucket::Used(_, v) => v,
            _ => unreachable!("find only returns used buckets"),
        })
    }

    pub fn delete(&mut self, key: &Symbol) {
        if self.len == 0 {
            return;
        }
        if let Some(i) = self.find(key) {
            self.buckets[i] = Bucket::Tombstone;
            self.len -= 1;
        }
    }

    /// Every bound value, for the collector's root scan.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.buckets.iter().filter_map(|b| match b {
            Bucket::Used(_, v) => Some(v),
            _ => None,
        })
    }

    /// Every live binding, in unspecified order.
    pub fn entries(&self) -> impl Iterator<Item = (&Symbol, &Value)> {
        self.buckets.iter().filter_map(|b| match b {
            Bucket::Used(s, v) => Some((s, v)),
            _ => None,
        })
    }

    fn resize(&mut self, new_cap: usize) {
        let old = std::mem::replace(&mut self.buckets, vec![Bucket::Empty; new_cap]);
        for bucket in old {
            if let Bucket::Used(sym, val) = bucket {
                let i = self.slot_for(&sym);
                self.buckets[i] = Bucket::Used(sym, val);
            }
        }
    }
}
