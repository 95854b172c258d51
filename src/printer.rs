use crate::heap::Heap;
use crate::strings::{char_repr, string_repr};
use crate::types::{Object, ObjRef, Value};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PrintMode {
    /// `write`: output the reader can read back.
    ReadableRepresentation,
    /// `display`: strings and characters as their raw text.
    Directly,
}

/// Rendering state. Pairs and vectors on the path currently being printed are
/// locked, so meeting a locked one means the structure refers back to itself.
pub struct Writer<'a> {
    pub(crate) heap: &'a mut Heap,
    pub(crate) out: String,
    pub(crate) mode: PrintMode,
}

impl<'a> Writer<'a> {
    pub fn new(heap: &'a mut Heap, mode: PrintMode) -> Self {
        Writer {
            heap,
            out: String::new(),
            mode,
        }
    }

    pub fn write(&mut self, v: Value) {
        match self.heap.descriptor(v).write {
            Some(write) => write(self, v),
            None => write_opaque(self, v),
        }
    }

    pub fn push_str(&mut self, s: &str) {
        self.out.push_str(s);
    }

    pub fn heap(&self) -> &Heap {
        self.heap
    }

    pub fn mode(&self) -> PrintMode {
        self.mode
    }

    pub fn finish(self) -> String {
        self.out
    }
}

pub fn pr_str(heap: &mut Heap, v: Value, mode: PrintMode) -> String {
    let mut writer = Writer::new(heap, mode);
    writer.write(v);
    writer.finish()
}

pub(crate) fn write_atom(w: &mut Writer<'_>, v: Value) {
    let text = match v {
        Value::Null => "()".to_string(),
        Value::Bool(true) => "#t".to_string(),
        Value::Bool(false) => "#f".to_string(),
        Value::Number(n) => n.to_string(),
        Value::Char(c) => match w.mode {
            PrintMode::ReadableRepresentation => char_repr(c),
            PrintMode::Directly => c.to_string(),
        },
        Value::Unspecified => "#!unspecified".to_string(),
        Value::Eof => "#!eof".to_string(),
        Value::Object(_) => return write_opaque(w, v),
    };
    w.out.push_str(&text);
}

pub(crate) fn write_string(w: &mut Writer<'_>, v: Value) {
    let text = match (w.heap.string(v), w.mode) {
        (Some(s), PrintMode::ReadableRepresentation) => string_repr(s),
        (Some(s), PrintMode::Directly) => s.clone(),
        (None, _) => return write_opaque(w, v),
    };
    w.out.push_str(&text);
}

pub(crate) fn write_symbol(w: &mut Writer<'_>, v: Value) {
    let name = w.heap.symbol_name(v).unwrap_or("").to_string();
    w.out.push_str(&name);
}

pub(crate) fn write_pair(w: &mut Writer<'_>, v: Value) {
    let first = match v.as_object() {
        Some(r) => r,
        None => return write_opaque(w, v),
    };
    if w.heap.is_locked(first) {
        w.out.push_str("...");
        return;
    }
    let mut spine: Vec<ObjRef> = Vec::new();
    w.out.push('(');
    let mut current = v;
    loop {
        let (r, car, cdr) = match (current.as_object(), w.heap.pair(current)) {
            (Some(r), Some(p)) => (r, p.car, p.cdr),
            _ => break,
        };
        w.heap.set_locked(r, true);
        spine.push(r);
        w.write(car);
        match cdr {
            Value::Null => break,
            next if w.heap.is_pair(next) => {
                if next.as_object().map(|n| w.heap.is_locked(n)).unwrap_or(false) {
                    w.out.push_str(" . ...");
                    break;
                }
                w.out.push(' ');
                current = next;
            }
            tail => {
                w.out.push_str(" . ");
                w.write(tail);
                break;
            }
        }
    }
    w.out.push(')');
    for r in spine {
        w.heap.set_locked(r, false);
    }
}

pub(crate) fn write_vector(w: &mut Writer<'_>, v: Value) {
    let r = match v.as_object() {
        Some(r) => r,
        None => return write_opaque(w, v),
    };
    if w.heap.is_locked(r) {
        w.out.push_str("#(...)");
        return;
    }
    let elements = w.heap.vector(v).cloned().unwrap_or_default();
    w.heap.set_locked(r, true);
    w.out.push_str("#(");
    for (i, element) in elements.into_iter().enumerate() {
        if i > 0 {
            w.out.push(' ');
        }
        w.write(element);
    }
    w.out.push(')');
    w.heap.set_locked(r, false);
}

pub(crate) fn write_opaque(w: &mut Writer<'_>, v: Value) {
    let descriptor = w.heap.descriptor(v);
    let detail = match v.as_object().and_then(|r| w.heap.get(r)) {
        Some(Object::Primitive(f)) => Some(f.name.to_string()),
        Some(Object::Compound(c)) => c
            .name
            .and_then(|n| w.heap.symbol_name(n.into()))
            .map(str::to_string),
        Some(Object::Port(p)) => Some(p.name.clone()),
        Some(Object::Type(d)) => Some(d.name.to_string()),
        _ => None,
    };
    let text = match detail {
        Some(detail) => format!("#[{} {}]", descriptor.name, detail),
        None => format!("#[{}]", descriptor.name),
    };
    w.out.push_str(&text);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_write_differ_for_text() {
        let mut heap = Heap::new();
        let s = heap.string_from("a \"b\"".into());
        let list = heap.list(&[s, Value::Char(' ')]);
        assert_eq!(
            pr_str(&mut heap, list, PrintMode::ReadableRepresentation),
            "(\"a \\\"b\\\"\" #\\space)"
        );
        assert_eq!(pr_str(&mut heap, list, PrintMode::Directly), "(a \"b\"  )");
    }

    #[test]
    fn cycles_print_an_ellipsis_and_leave_nothing_locked() {
        let mut heap = Heap::new();
        let list = heap.list(&[Value::int(1), Value::int(2)]);
        let second = heap.cdr(list).unwrap();
        heap.pair_mut(second).unwrap().cdr = list;
        assert_eq!(
            pr_str(&mut heap, list, PrintMode::ReadableRepresentation),
            "(1 2 . ...)"
        );

        let v = heap.vector_from(vec![Value::int(0)]);
        heap.vector_mut(v).unwrap()[0] = v;
        assert_eq!(pr_str(&mut heap, v, PrintMode::ReadableRepresentation), "#(#(...))");

        for slot in heap.registry.iter().flatten() {
            assert!(!slot.locked);
        }
    }

    #[test]
    fn shared_structure_is_not_a_cycle() {
        let mut heap = Heap::new();
        let shared = heap.list(&[Value::int(1)]);
        let outer = heap.list(&[shared, shared]);
        assert_eq!(
            pr_str(&mut heap, outer, PrintMode::ReadableRepresentation),
            "((1) (1))"
        );
    }

    #[test]
    fn opaque_values_name_their_type() {
        let mut heap = Heap::new();
        let t = heap.type_object(&crate::descriptor::PAIR);
        assert_eq!(pr_str(&mut heap, t, PrintMode::Directly), "#[type pair]");
    }
}
