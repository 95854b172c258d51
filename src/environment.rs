use crate::evaluator::Error;
use crate::heap::Heap;
use crate::types::{Arity, BadArgCount, Object, ObjRef, Value};

use derive_more::{Deref, DerefMut};
use std::collections::HashMap;

#[derive(Deref, DerefMut, Debug, Default)]
pub struct Bindings(pub Vec<(ObjRef, Value)>);

// Frames this large (in practice the global one) also keep a symbol index.
const INDEX_THRESHOLD: usize = 16;

/// One level of lexical scope. At most one binding per symbol.
#[derive(Debug, Default)]
pub struct Frame {
    pub bindings: Bindings,
    pub base: Option<ObjRef>,
    index: HashMap<ObjRef, usize>,
}

impl Frame {
    fn position(&self, symbol: ObjRef) -> Option<usize> {
        match self.index.is_empty() {
            true => self.bindings.iter().position(|(s, _)| *s == symbol),
            false => self.index.get(&symbol).copied(),
        }
    }

    fn push(&mut self, symbol: ObjRef, value: Value) {
        self.bindings.push((symbol, value));
        if self.bindings.len() == INDEX_THRESHOLD {
            self.index = self
                .bindings
                .iter()
                .enumerate()
                .map(|(i, (s, _))| (*s, i))
                .collect();
        } else if self.bindings.len() > INDEX_THRESHOLD {
            self.index.insert(symbol, self.bindings.len() - 1);
        }
    }
}

fn symbol_ref(v: Value) -> Result<ObjRef, Error> {
    v.as_object().ok_or(Error::WrongType {
        expected: "symbol",
        got: v,
    })
}

impl Heap {
    pub fn new_environment(&mut self, base: Option<ObjRef>) -> ObjRef {
        self.alloc(Object::Environment(Frame {
            base,
            ..Frame::default()
        }))
    }

    pub(crate) fn frame(&self, env: ObjRef) -> Option<&Frame> {
        match self.get(env) {
            Some(Object::Environment(frame)) => Some(frame),
            _ => None,
        }
    }

    fn frame_mut(&mut self, env: ObjRef) -> Option<&mut Frame> {
        match self.get_mut(env) {
            Some(Object::Environment(frame)) => Some(frame),
            _ => None,
        }
    }

    /// A new frame under `parent` binding `formals` to `actuals` positionally.
    /// A formals list ending in a bare symbol collects the remaining actuals.
    pub fn extend(
        &mut self,
        parent: ObjRef,
        formals: Value,
        actuals: &[Value],
        procedure: &str,
    ) -> Result<ObjRef, Error> {
        let env = self.new_environment(Some(parent));
        let mut bindings = Vec::new();
        let mut formals_left = formals;
        let mut consumed = 0;
        let mismatch = |fixed: usize, variadic: bool| {
            Error::BadArgCount(BadArgCount {
                name: procedure.to_string(),
                expected: match variadic {
                    true => Arity::at_least(fixed),
                    false => Arity::exactly(fixed),
                },
                got: actuals.len(),
            })
        };
        loop {
            match formals_left {
                Value::Null if consumed == actuals.len() => break,
                Value::Null => return Err(mismatch(consumed, false)),
                _ => match self.pair(formals_left) {
                    Some(p) => {
                        let (name, rest) = (p.car, p.cdr);
                        match actuals.get(consumed) {
                            Some(actual) => bindings.push((symbol_ref(name)?, *actual)),
                            None => {
                                let (fixed, variadic) = self.count_formals(formals);
                                return Err(mismatch(fixed, variadic));
                            }
                        }
                        consumed += 1;
                        formals_left = rest;
                    }
                    None => {
                        let rest = self.list(&actuals[consumed..]);
                        bindings.push((symbol_ref(formals_left)?, rest));
                        break;
                    }
                },
            }
        }
        for (symbol, value) in bindings {
            self.define(env, symbol, value);
        }
        Ok(env)
    }

    fn count_formals(&self, formals: Value) -> (usize, bool) {
        let mut fixed = 0;
        let mut current = formals;
        while let Some(p) = self.pair(current) {
            fixed += 1;
            current = p.cdr;
        }
        (fixed, !current.is_null())
    }

    /// Bind in `env`'s own frame, overwriting an existing binding.
    pub fn define(&mut self, env: ObjRef, symbol: ObjRef, value: Value) {
        if let Some(frame) = self.frame_mut(env) {
            match frame.position(symbol) {
                Some(i) => frame.bindings[i].1 = value,
                None => frame.push(symbol, value),
            }
        }
    }

    /// Innermost binding frame for `symbol`, with the binding's index.
    fn find_binding(&self, env: ObjRef, symbol: ObjRef) -> Option<(ObjRef, usize)> {
        let mut current = Some(env);
        while let Some(e) = current {
            let frame = self.frame(e)?;
            if let Some(i) = frame.position(symbol) {
                return Some((e, i));
            }
            current = frame.base;
        }
        None
    }

    pub fn lookup(&self, env: ObjRef, symbol: ObjRef) -> Result<Value, Error> {
        self.find_binding(env, symbol)
            .and_then(|(e, i)| self.frame(e).map(|f| f.bindings[i].1))
            .ok_or(Error::UnboundVariable(Value::Object(symbol)))
    }

    /// Mutate the innermost existing binding. Never defines.
    pub fn assign(&mut self, env: ObjRef, symbol: ObjRef, value: Value) -> Result<(), Error> {
        let (e, i) = self
            .find_binding(env, symbol)
            .ok_or(Error::UnboundVariable(Value::Object(symbol)))?;
        if let Some(frame) = self.frame_mut(e) {
            frame.bindings[i].1 = value;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::number::Number;

    fn sym(heap: &mut Heap, name: &str) -> ObjRef {
        heap.intern(name).as_object().unwrap()
    }

    fn int_of(v: Value) -> i64 {
        match v {
            Value::Number(Number::Int(i)) => i,
            other => panic!("not an integer: {:?}", other),
        }
    }

    #[test]
    fn inner_define_shadows_without_touching_outer() {
        let mut heap = Heap::new();
        let x = sym(&mut heap, "x");
        let outer = heap.new_environment(None);
        heap.define(outer, x, Value::int(1));
        let inner = heap.new_environment(Some(outer));
        heap.define(inner, x, Value::int(2));

        assert_eq!(int_of(heap.lookup(inner, x).unwrap()), 2);
        assert_eq!(int_of(heap.lookup(outer, x).unwrap()), 1);
    }

    #[test]
    fn define_overwrites_within_a_frame() {
        let mut heap = Heap::new();
        let x = sym(&mut heap, "x");
        let env = heap.new_environment(None);
        heap.define(env, x, Value::int(1));
        heap.define(env, x, Value::int(5));
        assert_eq!(heap.frame(env).unwrap().bindings.len(), 1);
        assert_eq!(int_of(heap.lookup(env, x).unwrap()), 5);
    }

    #[test]
    fn assign_mutates_innermost_existing_binding() {
        let mut heap = Heap::new();
        let x = sym(&mut heap, "x");
        let y = sym(&mut heap, "y");
        let outer = heap.new_environment(None);
        heap.define(outer, x, Value::int(1));
        let inner = heap.new_environment(Some(outer));

        heap.assign(inner, x, Value::int(9)).unwrap();
        assert_eq!(int_of(heap.lookup(outer, x).unwrap()), 9);
        assert!(heap.frame(inner).unwrap().bindings.is_empty());

        assert!(matches!(
            heap.assign(inner, y, Value::int(0)),
            Err(Error::UnboundVariable(_))
        ));
        assert!(matches!(heap.lookup(inner, y), Err(Error::UnboundVariable(_))));
    }

    #[test]
    fn large_frames_stay_consistent_once_indexed() {
        let mut heap = Heap::new();
        let env = heap.new_environment(None);
        let symbols: Vec<ObjRef> = (0..40).map(|i| sym(&mut heap, &format!("v{}", i))).collect();
        for (i, s) in symbols.iter().enumerate() {
            heap.define(env, *s, Value::int(i as i64));
        }
        heap.define(env, symbols[3], Value::int(-3));
        assert_eq!(heap.frame(env).unwrap().bindings.len(), 40);
        assert_eq!(int_of(heap.lookup(env, symbols[3]).unwrap()), -3);
        assert_eq!(int_of(heap.lookup(env, symbols[39]).unwrap()), 39);
    }

    #[test]
    fn extend_binds_fixed_and_rest_parameters() {
        let mut heap = Heap::new();
        let a = heap.intern("a");
        let rest = heap.intern("rest");
        let global = heap.new_environment(None);
        let formals = heap.list_with_tail(&[a], rest);
        let env = heap
            .extend(global, formals, &[Value::int(1), Value::int(2), Value::int(3)], "f")
            .unwrap();

        assert_eq!(int_of(heap.lookup(env, a.as_object().unwrap()).unwrap()), 1);
        let tail = heap.lookup(env, rest.as_object().unwrap()).unwrap();
        assert_eq!(heap.list_length(tail), Some(2));
    }

    #[test]
    fn extend_with_bare_symbol_is_fully_variadic() {
        let mut heap = Heap::new();
        let args = heap.intern("args");
        let global = heap.new_environment(None);
        let env = heap.extend(global, args, &[], "f").unwrap();
        let bound = heap.lookup(env, args.as_object().unwrap()).unwrap();
        assert!(bound.is_null());
    }

    #[test]
    fn extend_reports_arity_mismatch_with_procedure_name() {
        let mut heap = Heap::new();
        let a = heap.intern("a");
        let b = heap.intern("b");
        let global = heap.new_environment(None);
        let formals = heap.list(&[a, b]);

        match heap.extend(global, formals, &[Value::int(1)], "pair-up") {
            Err(Error::BadArgCount(e)) => {
                assert_eq!(e.name, "pair-up");
                assert_eq!(e.got, 1);
            }
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
        assert!(heap
            .extend(global, formals, &[Value::int(1), Value::int(2), Value::int(3)], "pair-up")
            .is_err());
    }
}
