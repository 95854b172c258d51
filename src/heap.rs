use crate::descriptor::TypeDescriptor;
use crate::symbols::SymbolTable;
use crate::types::{Object, ObjRef, Pair, Value};

use derive_more::{Deref, DerefMut};

/// A registry slot. `locked` is the mark bit; it is only ever set while a
/// collection (or the printer's cycle check) is in progress.
pub struct HeapObject {
    pub(crate) object: Object,
    pub(crate) locked: bool,
}

#[derive(Deref, DerefMut, Default)]
pub(crate) struct Registry(Vec<Option<HeapObject>>);

/// Every allocated object lives here. `ObjRef` is an index into the registry;
/// freed slots are reused.
pub struct Heap {
    pub(crate) registry: Registry,
    pub(crate) free: Vec<u32>,
    pub(crate) symbols: SymbolTable,
    /// First-class handles onto type descriptors, one per descriptor.
    pub(crate) type_objects: Vec<(&'static TypeDescriptor, ObjRef)>,
    pub(crate) allocated_since_collect: usize,
}

impl Default for Heap {
    fn default() -> Self {
        Heap::new()
    }
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            registry: Registry::default(),
            free: Vec::new(),
            symbols: SymbolTable::new(),
            type_objects: Vec::new(),
            allocated_since_collect: 0,
        }
    }

    pub fn alloc(&mut self, object: Object) -> ObjRef {
        self.allocated_since_collect += 1;
        let slot = Some(HeapObject {
            object,
            locked: false,
        });
        if let Some(index) = self.free.pop() {
            self.registry[index as usize] = slot;
            return ObjRef(index);
        }
        let r = ObjRef(self.registry.len() as u32);
        self.registry.push(slot);
        r
    }

    pub fn get(&self, r: ObjRef) -> Option<&Object> {
        self.registry
            .get(r.index())
            .and_then(Option::as_ref)
            .map(|slot| &slot.object)
    }

    pub fn get_mut(&mut self, r: ObjRef) -> Option<&mut Object> {
        self.registry
            .get_mut(r.index())
            .and_then(Option::as_mut)
            .map(|slot| &mut slot.object)
    }

    /// Is `r` still registered? False once the collector has reclaimed it.
    pub fn contains(&self, r: ObjRef) -> bool {
        self.get(r).is_some()
    }

    /// Number of live objects in the registry.
    pub fn len(&self) -> usize {
        self.registry.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn is_locked(&self, r: ObjRef) -> bool {
        self.registry
            .get(r.index())
            .and_then(Option::as_ref)
            .map(|slot| slot.locked)
            .unwrap_or(false)
    }

    pub(crate) fn set_locked(&mut self, r: ObjRef, locked: bool) {
        if let Some(Some(slot)) = self.registry.get_mut(r.index()) {
            slot.locked = locked;
        }
    }

    /// The shared first-class value standing for `descriptor`.
    pub fn type_object(&mut self, descriptor: &'static TypeDescriptor) -> Value {
        if let Some((_, r)) = self
            .type_objects
            .iter()
            .find(|(d, _)| std::ptr::eq(*d, descriptor))
        {
            return Value::Object(*r);
        }
        let r = self.alloc(Object::Type(descriptor));
        self.type_objects.push((descriptor, r));
        Value::Object(r)
    }

    // Constructors

    pub fn cons(&mut self, car: Value, cdr: Value) -> Value {
        Value::Object(self.alloc(Object::Pair(Pair { car, cdr })))
    }

    pub fn string_from(&mut self, s: String) -> Value {
        Value::Object(self.alloc(Object::String(s)))
    }

    pub fn vector_from(&mut self, elements: Vec<Value>) -> Value {
        Value::Object(self.alloc(Object::Vector(elements)))
    }

    /// Build a proper list from a slice of values.
    pub fn list(&mut self, values: &[Value]) -> Value {
        self.list_with_tail(values, Value::Null)
    }

    pub fn list_with_tail(&mut self, values: &[Value], tail: Value) -> Value {
        values
            .iter()
            .rev()
            .fold(tail, |rest, &value| self.cons(value, rest))
    }

    // Accessors

    pub fn pair(&self, v: Value) -> Option<&Pair> {
        match self.get(v.as_object()?) {
            Some(Object::Pair(p)) => Some(p),
            _ => None,
        }
    }

    pub fn pair_mut(&mut self, v: Value) -> Option<&mut Pair> {
        match self.get_mut(v.as_object()?) {
            Some(Object::Pair(p)) => Some(p),
            _ => None,
        }
    }

    pub fn is_pair(&self, v: Value) -> bool {
        self.pair(v).is_some()
    }

    pub fn car(&self, v: Value) -> Option<Value> {
        self.pair(v).map(|p| p.car)
    }

    pub fn cdr(&self, v: Value) -> Option<Value> {
        self.pair(v).map(|p| p.cdr)
    }

    pub fn string(&self, v: Value) -> Option<&String> {
        match self.get(v.as_object()?) {
            Some(Object::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn string_mut(&mut self, v: Value) -> Option<&mut String> {
        match self.get_mut(v.as_object()?) {
            Some(Object::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn vector(&self, v: Value) -> Option<&Vec<Value>> {
        match self.get(v.as_object()?) {
            Some(Object::Vector(e)) => Some(e),
            _ => None,
        }
    }

    pub fn vector_mut(&mut self, v: Value) -> Option<&mut Vec<Value>> {
        match self.get_mut(v.as_object()?) {
            Some(Object::Vector(e)) => Some(e),
            _ => None,
        }
    }

    pub fn is_symbol(&self, v: Value) -> bool {
        matches!(v.as_object().and_then(|r| self.get(r)), Some(Object::Symbol(_)))
    }

    pub fn is_environment(&self, v: Value) -> bool {
        matches!(
            v.as_object().and_then(|r| self.get(r)),
            Some(Object::Environment(_))
        )
    }

    pub fn is_procedure(&self, v: Value) -> bool {
        matches!(
            v.as_object().and_then(|r| self.get(r)),
            Some(Object::Primitive(_))
                | Some(Object::Compound(_))
                | Some(Object::Continuation(_))
        )
    }

    /// The elements of a possibly improper list and its final cdr. None if
    /// the spine is cyclic.
    pub fn list_parts(&self, list: Value) -> Option<(Vec<Value>, Value)> {
        let mut items = Vec::new();
        let mut fast = list;
        let mut slow = list;
        while let Some(p) = self.pair(fast) {
            items.push(p.car);
            fast = p.cdr;
            if items.len() % 2 == 0 {
                slow = self.cdr(slow)?;
                if self.eq(fast, slow) && self.is_pair(fast) {
                    return None;
                }
            }
        }
        Some((items, fast))
    }

    /// Collect a proper list into a Vec. Returns None if not a proper list,
    /// cyclic ones included.
    pub fn list_to_vec(&self, list: Value) -> Option<Vec<Value>> {
        match self.list_parts(list)? {
            (items, Value::Null) => Some(items),
            _ => None,
        }
    }

    /// Length of a proper list, or None.
    pub fn list_length(&self, list: Value) -> Option<usize> {
        self.list_to_vec(list).map(|items| items.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_round_trip_through_vecs() {
        let mut heap = Heap::new();
        let list = heap.list(&[Value::int(1), Value::int(2), Value::int(3)]);
        assert_eq!(heap.list_length(list), Some(3));
        let elements = heap.list_to_vec(list).unwrap();
        assert!(matches!(elements[2].as_number(), Some(crate::number::Number::Int(3))));
    }

    #[test]
    fn cyclic_lists_are_not_proper() {
        let mut heap = Heap::new();
        let c = heap.list(&[Value::int(1)]);
        heap.pair_mut(c).unwrap().cdr = c;
        assert!(heap.list_to_vec(c).is_none());
        assert_eq!(heap.list_length(c), None);

        let longer = heap.list(&[Value::int(1), Value::int(2), Value::int(3)]);
        let second = heap.cdr(longer).unwrap();
        let last = heap.cdr(second).unwrap();
        heap.pair_mut(last).unwrap().cdr = second;
        assert!(heap.list_to_vec(longer).is_none());
    }

    #[test]
    fn improper_lists_are_not_lists() {
        let mut heap = Heap::new();
        let dotted = heap.list_with_tail(&[Value::int(1)], Value::int(2));
        assert!(heap.list_to_vec(dotted).is_none());
        assert!(heap.list_length(dotted).is_none());
        assert!(heap.is_pair(dotted));
    }

    #[test]
    fn type_objects_are_shared() {
        let mut heap = Heap::new();
        let a = heap.type_object(&crate::descriptor::PAIR);
        let b = heap.type_object(&crate::descriptor::PAIR);
        let c = heap.type_object(&crate::descriptor::VECTOR);
        assert_eq!(a.as_object(), b.as_object());
        assert_ne!(a.as_object(), c.as_object());
    }
}
