//! Per-type capability tables. Every value's behaviour under the collector,
//! the printer, comparison and the generic sequence protocol is looked up here
//! rather than matched on at each use site, so host code can add new types by
//! supplying a new table.

use crate::evaluator;
use crate::heap::Heap;
use crate::interpreter::Interpreter;
use crate::printer::Writer;
use crate::types::{Object, ObjRef, Value};

use std::cmp::Ordering;
use std::fmt;

pub type MarkFn = fn(&Object, &mut Vec<Value>);
pub type WriteFn = fn(&mut Writer<'_>, Value);
pub type CompareFn = fn(&Heap, Value, Value) -> Option<Ordering>;
pub type LengthFn = fn(&Heap, Value) -> usize;
pub type RefFn = fn(&Heap, Value, usize) -> Value;
pub type SetFn = fn(&mut Heap, Value, usize, Value) -> evaluator::Result<()>;
pub type FinalizeFn = fn(&mut Heap, ObjRef);
pub type ConstructFn = fn(&mut Interpreter, &[Value]) -> evaluator::Result;

pub struct TypeDescriptor {
    pub name: &'static str,
    /// Push every value this object keeps alive.
    pub mark: Option<MarkFn>,
    pub write: Option<WriteFn>,
    pub compare: Option<CompareFn>,
    pub length: Option<LengthFn>,
    /// Called with an index already checked against `length`.
    pub get: Option<RefFn>,
    pub set: Option<SetFn>,
    /// Release external resources before the collector drops the object.
    pub finalize: Option<FinalizeFn>,
    pub construct: Option<ConstructFn>,
}

impl TypeDescriptor {
    pub const fn named(name: &'static str) -> Self {
        TypeDescriptor {
            name,
            mark: None,
            write: None,
            compare: None,
            length: None,
            get: None,
            set: None,
            finalize: None,
            construct: None,
        }
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeDescriptor({})", self.name)
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

fn compare_numbers(_: &Heap, a: Value, b: Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.compare(y),
        _ => None,
    }
}

fn compare_chars(_: &Heap, a: Value, b: Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Char(x), Value::Char(y)) => Some(x.cmp(&y)),
        _ => None,
    }
}

fn compare_booleans(_: &Heap, a: Value, b: Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(&y)),
        _ => None,
    }
}

fn mark_pair(obj: &Object, children: &mut Vec<Value>) {
    if let Object::Pair(p) = obj {
        children.push(p.car);
        children.push(p.cdr);
    }
}

fn mark_vector(obj: &Object, children: &mut Vec<Value>) {
    if let Object::Vector(elements) = obj {
        children.extend(elements.iter().copied());
    }
}

fn mark_compound(obj: &Object, children: &mut Vec<Value>) {
    if let Object::Compound(c) = obj {
        if let Some(name) = c.name {
            children.push(name.into());
        }
        children.push(c.parameters);
        children.push(c.body);
        children.push(c.env.into());
    }
}

fn mark_macro(obj: &Object, children: &mut Vec<Value>) {
    if let Object::Macro(m) = obj {
        children.push(m.transformer);
    }
}

fn mark_environment(obj: &Object, children: &mut Vec<Value>) {
    if let Object::Environment(frame) = obj {
        for (symbol, value) in frame.bindings.iter() {
            children.push((*symbol).into());
            children.push(*value);
        }
        if let Some(base) = frame.base {
            children.push(base.into());
        }
    }
}

fn mark_continuation(obj: &Object, children: &mut Vec<Value>) {
    if let Object::Continuation(k) = obj {
        for activation in &k.activations {
            activation.trace(children);
        }
    }
}

// Pairs expose their two slots: 0 is the car, 1 the cdr.
fn pair_length(_: &Heap, _: Value) -> usize {
    2
}

fn pair_ref(heap: &Heap, v: Value, i: usize) -> Value {
    match heap.pair(v) {
        Some(p) if i == 0 => p.car,
        Some(p) => p.cdr,
        None => Value::Unspecified,
    }
}

fn pair_set(heap: &mut Heap, v: Value, i: usize, new: Value) -> evaluator::Result<()> {
    if let Some(p) = heap.pair_mut(v) {
        match i {
            0 => p.car = new,
            _ => p.cdr = new,
        }
    }
    Ok(())
}

fn vector_length(heap: &Heap, v: Value) -> usize {
    heap.vector(v).map(|e| e.len()).unwrap_or(0)
}

fn vector_ref(heap: &Heap, v: Value, i: usize) -> Value {
    heap.vector(v)
        .and_then(|e| e.get(i).copied())
        .unwrap_or(Value::Unspecified)
}

fn vector_set(heap: &mut Heap, v: Value, i: usize, new: Value) -> evaluator::Result<()> {
    if let Some(slot) = heap.vector_mut(v).and_then(|e| e.get_mut(i)) {
        *slot = new;
    }
    Ok(())
}

fn string_length(heap: &Heap, v: Value) -> usize {
    heap.string(v).map(|s| s.chars().count()).unwrap_or(0)
}

fn string_ref(heap: &Heap, v: Value, i: usize) -> Value {
    heap.string(v)
        .and_then(|s| s.chars().nth(i))
        .map(Value::Char)
        .unwrap_or(Value::Unspecified)
}

fn string_set(heap: &mut Heap, v: Value, i: usize, new: Value) -> evaluator::Result<()> {
    let c = match new {
        Value::Char(c) => c,
        got => {
            return Err(evaluator::Error::WrongType {
                expected: "character",
                got,
            }
            .into())
        }
    };
    if let Some(s) = heap.string_mut(v) {
        *s = s
            .chars()
            .enumerate()
            .map(|(j, old)| if j == i { c } else { old })
            .collect();
    }
    Ok(())
}

fn finalize_symbol(heap: &mut Heap, r: ObjRef) {
    heap.unintern(r);
}

fn finalize_port(heap: &mut Heap, r: ObjRef) {
    if let Some(Object::Port(port)) = heap.get_mut(r) {
        log::debug!("closing port {}", port.name);
        port.kind = crate::types::PortKind::Closed;
    }
}

fn construct_pair(interp: &mut Interpreter, args: &[Value]) -> evaluator::Result {
    crate::types::Arity::exactly(2)
        .validate_for(args.len(), "pair")
        .map_err(evaluator::Error::BadArgCount)?;
    Ok(interp.heap.cons(args[0], args[1]))
}

fn construct_vector(interp: &mut Interpreter, args: &[Value]) -> evaluator::Result {
    Ok(interp.heap.vector_from(args.to_vec()))
}

fn construct_string(interp: &mut Interpreter, args: &[Value]) -> evaluator::Result {
    let mut s = String::new();
    for arg in args {
        match arg {
            Value::Char(c) => s.push(*c),
            got => {
                return Err(evaluator::Error::WrongType {
                    expected: "character",
                    got: *got,
                }
                .into())
            }
        }
    }
    Ok(interp.heap.string_from(s))
}

pub static NULL: TypeDescriptor = TypeDescriptor {
    write: Some(crate::printer::write_atom),
    ..TypeDescriptor::named("null")
};

pub static BOOLEAN: TypeDescriptor = TypeDescriptor {
    write: Some(crate::printer::write_atom),
    compare: Some(compare_booleans),
    ..TypeDescriptor::named("boolean")
};

pub static NUMBER: TypeDescriptor = TypeDescriptor {
    write: Some(crate::printer::write_atom),
    compare: Some(compare_numbers),
    ..TypeDescriptor::named("number")
};

pub static CHARACTER: TypeDescriptor = TypeDescriptor {
    write: Some(crate::printer::write_atom),
    compare: Some(compare_chars),
    ..TypeDescriptor::named("character")
};

pub static UNSPECIFIED: TypeDescriptor = TypeDescriptor {
    write: Some(crate::printer::write_atom),
    ..TypeDescriptor::named("unspecified")
};

pub static EOF: TypeDescriptor = TypeDescriptor {
    write: Some(crate::printer::write_atom),
    ..TypeDescriptor::named("eof")
};

pub static STRING: TypeDescriptor = TypeDescriptor {
    write: Some(crate::printer::write_string),
    length: Some(string_length),
    get: Some(string_ref),
    set: Some(string_set),
    construct: Some(construct_string),
    ..TypeDescriptor::named("string")
};

pub static SYMBOL: TypeDescriptor = TypeDescriptor {
    write: Some(crate::printer::write_symbol),
    finalize: Some(finalize_symbol),
    ..TypeDescriptor::named("symbol")
};

pub static PAIR: TypeDescriptor = TypeDescriptor {
    mark: Some(mark_pair),
    write: Some(crate::printer::write_pair),
    length: Some(pair_length),
    get: Some(pair_ref),
    set: Some(pair_set),
    construct: Some(construct_pair),
    ..TypeDescriptor::named("pair")
};

pub static VECTOR: TypeDescriptor = TypeDescriptor {
    mark: Some(mark_vector),
    write: Some(crate::printer::write_vector),
    length: Some(vector_length),
    get: Some(vector_ref),
    set: Some(vector_set),
    construct: Some(construct_vector),
    ..TypeDescriptor::named("vector")
};

pub static PRIMITIVE: TypeDescriptor = TypeDescriptor {
    write: Some(crate::printer::write_opaque),
    ..TypeDescriptor::named("primitive")
};

pub static COMPOUND: TypeDescriptor = TypeDescriptor {
    mark: Some(mark_compound),
    write: Some(crate::printer::write_opaque),
    ..TypeDescriptor::named("compound-procedure")
};

pub static MACRO: TypeDescriptor = TypeDescriptor {
    mark: Some(mark_macro),
    write: Some(crate::printer::write_opaque),
    ..TypeDescriptor::named("macro")
};

pub static ENVIRONMENT: TypeDescriptor = TypeDescriptor {
    mark: Some(mark_environment),
    write: Some(crate::printer::write_opaque),
    ..TypeDescriptor::named("environment")
};

pub static PORT: TypeDescriptor = TypeDescriptor {
    write: Some(crate::printer::write_opaque),
    finalize: Some(finalize_port),
    ..TypeDescriptor::named("port")
};

pub static CONTINUATION: TypeDescriptor = TypeDescriptor {
    mark: Some(mark_continuation),
    write: Some(crate::printer::write_opaque),
    ..TypeDescriptor::named("continuation")
};

pub static TYPE: TypeDescriptor = TypeDescriptor {
    write: Some(crate::printer::write_opaque),
    ..TypeDescriptor::named("type")
};

impl Heap {
    /// The capability table for `v`'s type. Userdata report their own table.
    pub fn descriptor(&self, v: Value) -> &'static TypeDescriptor {
        match v {
            Value::Null => &NULL,
            Value::Bool(_) => &BOOLEAN,
            Value::Number(_) => &NUMBER,
            Value::Char(_) => &CHARACTER,
            Value::Unspecified => &UNSPECIFIED,
            Value::Eof => &EOF,
            Value::Object(r) => match self.get(r) {
                Some(object) => object_descriptor(object),
                None => &UNSPECIFIED,
            },
        }
    }
}

/// The table the collector uses for a heap object.
pub(crate) fn object_descriptor(object: &Object) -> &'static TypeDescriptor {
    match object {
        Object::String(_) => &STRING,
        Object::Symbol(_) => &SYMBOL,
        Object::Pair(_) => &PAIR,
        Object::Vector(_) => &VECTOR,
        Object::Primitive(_) => &PRIMITIVE,
        Object::Compound(_) => &COMPOUND,
        Object::Macro(_) => &MACRO,
        Object::Environment(_) => &ENVIRONMENT,
        Object::Port(_) => &PORT,
        Object::Continuation(_) => &CONTINUATION,
        Object::Type(_) => &TYPE,
        Object::Userdata(u) => u.descriptor,
    }
}
