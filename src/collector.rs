//! Mark and sweep over the heap registry. The registry slot's `locked` flag is
//! the mark bit: set during marking, cleared again by the sweep, so it is
//! false whenever no collection is running.

use crate::descriptor::object_descriptor;
use crate::heap::Heap;
use crate::interpreter::Interpreter;
use crate::types::{ObjRef, Value};

impl Heap {
    /// Free everything not reachable from `roots`. Returns how many objects
    /// were reclaimed.
    pub fn collect(&mut self, roots: Vec<Value>) -> usize {
        self.mark(roots);
        let reclaimed = self.sweep();
        self.allocated_since_collect = 0;
        reclaimed
    }

    fn mark(&mut self, mut pending: Vec<Value>) {
        while let Some(v) = pending.pop() {
            let r = match v.as_object() {
                Some(r) => r,
                None => continue,
            };
            if let Some(Some(slot)) = self.registry.get_mut(r.index()) {
                if slot.locked {
                    continue;
                }
                slot.locked = true;
                if let Some(mark) = object_descriptor(&slot.object).mark {
                    mark(&slot.object, &mut pending);
                }
            }
        }
    }

    fn sweep(&mut self) -> usize {
        let mut reclaimed = 0;
        for index in 0..self.registry.len() {
            let unreachable = match &mut self.registry[index] {
                Some(slot) if slot.locked => {
                    slot.locked = false;
                    false
                }
                Some(_) => true,
                None => false,
            };
            if unreachable {
                self.release(ObjRef(index as u32));
                reclaimed += 1;
            }
        }
        reclaimed
    }

    /// Finalize `r` and give its slot back.
    fn release(&mut self, r: ObjRef) {
        let finalize = self
            .get(r)
            .map(object_descriptor)
            .and_then(|descriptor| descriptor.finalize);
        if let Some(finalize) = finalize {
            finalize(self, r);
        }
        if let Some(slot) = self.registry.get_mut(r.index()) {
            if slot.take().is_some() {
                self.free.push(r.0);
            }
        }
    }
}

impl Drop for Heap {
    /// Teardown finalizes every remaining object, symbols included.
    fn drop(&mut self) {
        for index in 0..self.registry.len() {
            if self.registry[index].is_some() {
                self.release(ObjRef(index as u32));
            }
        }
    }
}

impl Interpreter {
    /// Run a full collection now. Returns how many objects were reclaimed.
    pub fn collect(&mut self) -> usize {
        let roots = self.roots();
        let before = self.heap.len();
        let allocated = self.heap.allocated_since_collect;
        let reclaimed = self.heap.collect(roots);
        log::debug!(
            "collected {} of {} objects ({} allocated since last collection)",
            reclaimed,
            before,
            allocated
        );
        reclaimed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Object;

    #[test]
    fn unreachable_objects_are_reclaimed_and_slots_reused() {
        let mut heap = Heap::new();
        let kept = heap.list(&[Value::int(1), Value::int(2)]);
        let dropped = heap.list(&[Value::int(3)]);
        let reclaimed = heap.collect(vec![kept]);
        assert_eq!(reclaimed, 1);
        assert!(heap.contains(kept.as_object().unwrap()));
        assert!(!heap.contains(dropped.as_object().unwrap()));

        let reused = heap.cons(Value::Null, Value::Null);
        assert_eq!(reused.as_object(), dropped.as_object());
    }

    #[test]
    fn marking_follows_cycles_and_clears_every_mark() {
        let mut heap = Heap::new();
        let a = heap.list(&[Value::int(1)]);
        heap.pair_mut(a).unwrap().cdr = a;
        let v = heap.vector_from(vec![a]);
        assert_eq!(heap.collect(vec![v]), 0);
        for slot in heap.registry.iter().flatten() {
            assert!(!slot.locked);
        }

        assert_eq!(heap.collect(Vec::new()), 2);
        assert!(heap.is_empty());
    }

    #[test]
    fn environments_keep_their_bindings_and_base() {
        let mut heap = Heap::new();
        let x = heap.intern_symbol("x");
        let outer = heap.new_environment(None);
        let value = heap.string_from("kept".into());
        heap.define(outer, x, value);
        let inner = heap.new_environment(Some(outer));
        heap.collect(vec![inner.into()]);
        assert!(heap.contains(outer));
        assert!(heap.contains(value.as_object().unwrap()));
        assert!(heap.contains(x));
    }

    #[test]
    fn ports_are_closed_when_reclaimed() {
        let mut heap = Heap::new();
        let port = heap.alloc(Object::Port(crate::types::Port {
            name: "test".into(),
            kind: crate::types::PortKind::OutputString(String::new()),
        }));
        assert_eq!(heap.collect(Vec::new()), 1);
        assert!(!heap.contains(port));
    }
}
