//! Symbol interning. Symbols are ordinary heap objects; the table only holds
//! bucket heads, and each symbol links to its bucket neighbours so it can be
//! unlinked in constant time when finalized.

use crate::heap::Heap;
use crate::types::{Object, ObjRef, Value};

const BUCKETS: usize = 1021;

#[derive(Debug)]
pub struct Symbol {
    pub name: String,
    pub(crate) prev: Option<ObjRef>,
    pub(crate) next: Option<ObjRef>,
}

pub struct SymbolTable {
    buckets: Vec<Option<ObjRef>>,
    count: usize,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            buckets: vec![None; BUCKETS],
            count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn bucket_of(name: &str) -> usize {
        let hash = name
            .bytes()
            .fold(0usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize));
        hash % BUCKETS
    }

    /// Every interned symbol, for the collector's root set.
    pub(crate) fn roots(&self, heap: &Heap) -> Vec<Value> {
        let mut roots = Vec::with_capacity(self.count);
        for head in self.buckets.iter() {
            let mut current = *head;
            while let Some(r) = current {
                roots.push(Value::Object(r));
                current = heap.symbol(r).and_then(|s| s.next);
            }
        }
        roots
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    pub(crate) fn symbol(&self, r: ObjRef) -> Option<&Symbol> {
        match self.get(r) {
            Some(Object::Symbol(s)) => Some(s),
            _ => None,
        }
    }

    fn symbol_mut(&mut self, r: ObjRef) -> Option<&mut Symbol> {
        match self.get_mut(r) {
            Some(Object::Symbol(s)) => Some(s),
            _ => None,
        }
    }

    /// The symbol for `name`, allocating it on first use. Equal text always
    /// yields the same object.
    pub fn intern(&mut self, name: &str) -> Value {
        Value::Object(self.intern_symbol(name))
    }

    pub(crate) fn intern_symbol(&mut self, name: &str) -> ObjRef {
        let bucket = SymbolTable::bucket_of(name);
        let mut current = self.symbols.buckets[bucket];
        while let Some(r) = current {
            match self.symbol(r) {
                Some(s) if s.name == name => return r,
                Some(s) => current = s.next,
                None => break,
            }
        }

        let head = self.symbols.buckets[bucket];
        let r = self.alloc(Object::Symbol(Symbol {
            name: name.to_string(),
            prev: None,
            next: head,
        }));
        if let Some(old_head) = head.and_then(|h| self.symbol_mut(h)) {
            old_head.prev = Some(r);
        }
        self.symbols.buckets[bucket] = Some(r);
        self.symbols.count += 1;
        r
    }

    /// Look up without interning.
    pub fn find_symbol(&self, name: &str) -> Option<Value> {
        let mut current = self.symbols.buckets[SymbolTable::bucket_of(name)];
        while let Some(r) = current {
            let s = self.symbol(r)?;
            if s.name == name {
                return Some(Value::Object(r));
            }
            current = s.next;
        }
        None
    }

    pub fn symbol_name(&self, v: Value) -> Option<&str> {
        self.symbol(v.as_object()?).map(|s| s.name.as_str())
    }

    /// Unlink `r` from its bucket. Runs when a symbol is finalized.
    pub(crate) fn unintern(&mut self, r: ObjRef) {
        let (name, prev, next) = match self.symbol(r) {
            Some(s) => (s.name.clone(), s.prev, s.next),
            None => return,
        };
        let bucket = SymbolTable::bucket_of(&name);
        match prev {
            Some(p) => {
                if let Some(s) = self.symbol_mut(p) {
                    s.next = next;
                }
            }
            None => {
                if self.symbols.buckets[bucket] == Some(r) {
                    self.symbols.buckets[bucket] = next;
                }
            }
        }
        if let Some(s) = next.and_then(|n| self.symbol_mut(n)) {
            s.prev = prev;
        }
        if let Some(s) = self.symbol_mut(r) {
            s.prev = None;
            s.next = None;
        }
        self.symbols.count -= 1;
        log::trace!("uninterned {}", name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_identity() {
        let mut heap = Heap::new();
        let a = heap.intern("lambda");
        let b = heap.intern("lambda");
        let c = heap.intern("lambda2");
        assert_eq!(a.as_object(), b.as_object());
        assert_ne!(a.as_object(), c.as_object());
        assert_eq!(heap.symbol_name(c), Some("lambda2"));
        assert_eq!(heap.symbols.len(), 2);
    }

    #[test]
    fn unintern_unlinks_from_the_middle_of_a_bucket() {
        let mut heap = Heap::new();
        // Enough names that several share a bucket.
        let names: Vec<String> = (0..3000).map(|i| format!("s{}", i)).collect();
        let symbols: Vec<Value> = names.iter().map(|n| heap.intern(n)).collect();
        let victim = symbols[1500].as_object().unwrap();

        heap.unintern(victim);
        assert!(heap.find_symbol("s1500").is_none());
        assert_eq!(heap.symbols.len(), 2999);
        for (i, name) in names.iter().enumerate().filter(|(i, _)| *i != 1500) {
            assert_eq!(heap.find_symbol(name).and_then(|v| v.as_object()), symbols[i].as_object());
        }
        assert_eq!(heap.symbols.roots(&heap).len(), 2999);
    }
}
