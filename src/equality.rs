//! The three equality tiers, each strictly more permissive than the last.

use crate::heap::Heap;
use crate::types::{ObjRef, Value};

use std::cmp::Ordering;
use std::collections::HashSet;

impl Heap {
    /// `eq?`: the same object, or the same immediate.
    pub fn eq(&self, a: Value, b: Value) -> bool {
        match (a, b) {
            (Value::Null, Value::Null)
            | (Value::Unspecified, Value::Unspecified)
            | (Value::Eof, Value::Eof) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Char(x), Value::Char(y)) => x == y,
            (Value::Number(x), Value::Number(y)) => x.identical(y),
            (Value::Object(x), Value::Object(y)) => x == y,
            _ => false,
        }
    }

    /// Ordering through the type's `compare` capability. `None` when the
    /// types differ or the type is not comparable.
    pub fn compare(&self, a: Value, b: Value) -> Option<Ordering> {
        let descriptor = self.descriptor(a);
        if descriptor != self.descriptor(b) {
            return None;
        }
        descriptor.compare.and_then(|compare| compare(self, a, b))
    }

    /// `eqv?`: `eq?`, or same comparable type comparing equal.
    pub fn eqv(&self, a: Value, b: Value) -> bool {
        self.eq(a, b) || self.compare(a, b) == Some(Ordering::Equal)
    }

    /// `equal?`: `eqv?`, or the same sequence type with `equal?` elements.
    ///
    /// Walks with an explicit worklist. A pair of objects already being
    /// compared is assumed equal, so cyclic structures terminate.
    pub fn equal(&self, a: Value, b: Value) -> bool {
        let mut pending = vec![(a, b)];
        let mut in_progress: HashSet<(ObjRef, ObjRef)> = HashSet::new();
        while let Some((x, y)) = pending.pop() {
            if self.eqv(x, y) {
                continue;
            }
            let descriptor = self.descriptor(x);
            if descriptor != self.descriptor(y) {
                return false;
            }
            let (length, get) = match (descriptor.length, descriptor.get) {
                (Some(length), Some(get)) => (length, get),
                _ => return false,
            };
            if let (Some(rx), Some(ry)) = (x.as_object(), y.as_object()) {
                if !in_progress.insert((rx, ry)) {
                    continue;
                }
            }
            let n = length(self, x);
            if n != length(self, y) {
                return false;
            }
            // Pushed in reverse so elements are compared front to back.
            for i in (0..n).rev() {
                pending.push((get(self, x, i), get(self, y, i)));
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::number::Number;

    #[test]
    fn symbols_are_eq() {
        let mut heap = Heap::new();
        let a = heap.intern("a");
        let b = heap.intern("a");
        assert!(heap.eq(a, b));
    }

    #[test]
    fn fresh_lists_are_equal_but_not_eq() {
        let mut heap = Heap::new();
        let x = heap.list(&[Value::int(1)]);
        let y = heap.list(&[Value::int(1)]);
        assert!(!heap.eq(x, y));
        assert!(!heap.eqv(x, y));
        assert!(heap.equal(x, y));
    }

    #[test]
    fn eqv_compares_numbers_across_representations() {
        let heap = Heap::new();
        let exact = Value::int(2);
        let inexact = Value::Number(Number::Real(2.0));
        assert!(!heap.eq(exact, inexact));
        assert!(heap.eqv(exact, inexact));
        assert!(heap.eqv(Value::Char('x'), Value::Char('x')));
        assert!(!heap.eqv(Value::Char('x'), Value::int(120)));
    }

    #[test]
    fn strings_are_equal_by_content_only() {
        let mut heap = Heap::new();
        let a = heap.string_from("abc".into());
        let b = heap.string_from("abc".into());
        let c = heap.string_from("abd".into());
        assert!(!heap.eqv(a, b));
        assert!(heap.equal(a, b));
        assert!(!heap.equal(a, c));
    }

    #[test]
    fn improper_tails_take_part_in_equal() {
        let mut heap = Heap::new();
        let a = heap.list_with_tail(&[Value::int(1)], Value::int(2));
        let b = heap.list_with_tail(&[Value::int(1)], Value::int(3));
        assert!(!heap.equal(a, b));
    }

    #[test]
    fn vectors_and_lists_are_never_equal() {
        let mut heap = Heap::new();
        let v = heap.vector_from(vec![Value::int(1), Value::int(2)]);
        let l = heap.list(&[Value::int(1)]);
        assert!(!heap.equal(v, l));
    }

    #[test]
    fn cyclic_lists_terminate() {
        let mut heap = Heap::new();
        let a = heap.list(&[Value::int(1)]);
        let b = heap.list(&[Value::int(1)]);
        heap.pair_mut(a).unwrap().cdr = a;
        heap.pair_mut(b).unwrap().cdr = b;
        assert!(heap.equal(a, b));
    }
}
