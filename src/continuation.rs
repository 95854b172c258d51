//! Escape continuations by replay.
//!
//! Every nested evaluation runs under an [`Activation`] on the interpreter's
//! frame stack. Capturing a continuation copies that stack. Invoking one
//! unwinds to the nearest activation started from host code that the
//! continuation covers. That activation rebuilds the captured expressions
//! inside it from the inside out: the innermost becomes `(quote v)`, and each
//! enclosing expression gets the rebuilt one substituted where its inner
//! activation started. Evaluation then resumes there.

use crate::evaluator::{self, Error, Escape, Unwind};
use crate::heap::Heap;
use crate::interpreter::Interpreter;
use crate::types::{Continuation, Object, ObjRef, Value};

#[derive(Debug, Clone, Copy)]
pub struct Activation {
    pub(crate) id: u64,
    /// The subexpression of the enclosing activation this one is evaluating.
    /// `None` when started from host code (a primitive or the driver).
    pub origin: Option<Value>,
    /// What this activation is evaluating right now. Tail calls replace it.
    pub expr: Value,
    pub env: ObjRef,
}

impl Activation {
    pub(crate) fn trace(&self, children: &mut Vec<Value>) {
        if let Some(origin) = self.origin {
            children.push(origin);
        }
        children.push(self.expr);
        children.push(self.env.into());
    }
}

impl Interpreter {
    /// Reify the current frame stack, innermost first.
    pub(crate) fn capture_continuation(&mut self) -> Value {
        let activations: Vec<Activation> = self.frames.iter().rev().copied().collect();
        log::debug!("captured continuation over {} frames", activations.len());
        let r = self.heap.alloc(Object::Continuation(Continuation {
            activations,
            spent: false,
        }));
        Value::Object(r)
    }

    /// Start the non-local transfer for `(k v)`.
    pub(crate) fn throw_to(&mut self, k: ObjRef, args: &[Value]) -> Unwind {
        let value = match args {
            [] => Value::Unspecified,
            [v] => *v,
            _ => self.heap.list(args),
        };
        let innermost = match self.heap.get_mut(k) {
            Some(Object::Continuation(c)) if !c.spent => {
                c.spent = true;
                c.activations.first().map(|a| a.id)
            }
            _ => return Error::ContinuationExpired.into(),
        };
        let live = match innermost {
            Some(id) => self.frames.iter().any(|a| a.id == id),
            None => false,
        };
        match live {
            true => Escape {
                continuation: k,
                value,
            }
            .into(),
            false => Error::ContinuationExpired.into(),
        }
    }

    /// Whether the activation `id` is part of what `escape` resumes.
    pub(crate) fn captured_under(&self, escape: &Escape, id: u64) -> bool {
        match self.heap.get(escape.continuation) {
            Some(Object::Continuation(c)) => c.activations.iter().any(|a| a.id == id),
            _ => false,
        }
    }

    /// Rebuild the expression to resume after `escape` in the activation
    /// `boundary`, and the environment to resume it in.
    pub(crate) fn replay(&mut self, escape: Escape, boundary: u64) -> evaluator::Result<(Value, ObjRef)> {
        let activations = match self.heap.get(escape.continuation) {
            Some(Object::Continuation(c)) => c.activations.clone(),
            _ => return Err(Error::ContinuationExpired.into()),
        };
        let end = activations
            .iter()
            .position(|a| a.id == boundary)
            .ok_or(Error::ContinuationUnsupported)?;
        let activations = &activations[..=end];
        let innermost = activations.first().ok_or(Error::ContinuationExpired)?;
        log::info!("replaying continuation over {} frames", activations.len());

        let quote = self.keywords.quote;
        let mut rebuilt = self.heap.list(&[quote.into(), escape.value]);
        let mut rebuilt_env = innermost.env;
        for pair in activations.windows(2) {
            let (inner, outer) = (&pair[0], &pair[1]);
            let origin = inner.origin.ok_or(Error::ContinuationUnsupported)?;
            let replacement = match rebuilt_env == outer.env || self.is_quote_form(rebuilt) {
                true => rebuilt,
                false => self.in_environment(rebuilt, rebuilt_env),
            };
            rebuilt = self
                .substitute(outer.expr, origin, replacement)
                .ok_or(Error::ContinuationUnsupported)?;
            rebuilt_env = outer.env;
        }
        Ok((rebuilt, rebuilt_env))
    }

    fn is_quote_form(&self, v: Value) -> bool {
        self.heap
            .car(v)
            .and_then(Value::as_object)
            .map(|head| head == self.keywords.quote)
            .unwrap_or(false)
    }

    /// `(eval 'expr 'env)`, built with the `eval` procedure itself in head
    /// position so that rebinding the name cannot break the replay.
    fn in_environment(&mut self, expr: Value, env: ObjRef) -> Value {
        let quote = Value::Object(self.keywords.quote);
        let quoted_expr = self.heap.list(&[quote, expr]);
        let quoted_env = self.heap.list(&[quote, env.into()]);
        self.heap.list(&[self.eval_procedure, quoted_expr, quoted_env])
    }

    /// A copy of `expr` with the first occurrence (depth first, by identity)
    /// of `target` replaced. `(begin e1 .. en)` with `target` at `ej` drops the
    /// already-evaluated `e1 .. ej-1`.
    fn substitute(&mut self, expr: Value, target: Value, replacement: Value) -> Option<Value> {
        let elements = sequence_of(&self.heap, expr)?;
        let is_begin = elements
            .first()
            .and_then(|head| head.as_object())
            .map(|head| head == self.keywords.begin)
            .unwrap_or(false);
        for (i, element) in elements.iter().enumerate() {
            if identical(*element, target) {
                return Some(match is_begin && i > 0 {
                    true => {
                        let rest = nth_tail(&self.heap, expr, i + 1)?;
                        let begin = elements[0];
                        self.heap.list_with_tail(&[begin, replacement], rest)
                    }
                    false => self.replace_at(expr, i, replacement)?,
                });
            }
            if self.heap.is_pair(*element) {
                if let Some(inner) = self.substitute(*element, target, replacement) {
                    return self.replace_at(expr, i, inner);
                }
            }
        }
        None
    }

    /// Fresh spine for the list `expr` with element `index` swapped out. The
    /// tail past `index` is shared.
    fn replace_at(&mut self, expr: Value, index: usize, element: Value) -> Option<Value> {
        let elements = sequence_of(&self.heap, expr)?;
        let rest = nth_tail(&self.heap, expr, index + 1)?;
        let mut prefix = elements[..index].to_vec();
        prefix.push(element);
        Some(self.heap.list_with_tail(&prefix, rest))
    }
}

fn identical(a: Value, b: Value) -> bool {
    match (a, b) {
        (Value::Object(x), Value::Object(y)) => x == y,
        _ => false,
    }
}

/// The elements of a (possibly improper) list, without its tail.
fn sequence_of(heap: &Heap, list: Value) -> Option<Vec<Value>> {
    let mut elements = Vec::new();
    let mut current = list;
    while let Some(p) = heap.pair(current) {
        elements.push(p.car);
        current = p.cdr;
    }
    match elements.is_empty() {
        true => None,
        false => Some(elements),
    }
}

fn nth_tail(heap: &Heap, list: Value, n: usize) -> Option<Value> {
    let mut current = list;
    for _ in 0..n {
        current = heap.cdr(current)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::{pr_str, PrintMode};
    use crate::reader::read_str;

    fn show(interp: &mut Interpreter, v: Value) -> String {
        pr_str(&mut interp.heap, v, PrintMode::ReadableRepresentation)
    }

    #[test]
    fn substitution_is_by_identity_and_copies_the_path() {
        let mut interp = Interpreter::new();
        let expr = read_str(&mut interp.heap, "(+ 1 (f (g 2)) (g 2))").unwrap();
        let third = interp.heap.list_to_vec(expr).unwrap()[2];
        let target = interp.heap.list_to_vec(third).unwrap()[1];
        let ten = Value::int(10);
        let rebuilt = interp.substitute(expr, target, ten).unwrap();
        assert_eq!(show(&mut interp, rebuilt), "(+ 1 (f 10) (g 2))");
        assert_eq!(show(&mut interp, expr), "(+ 1 (f (g 2)) (g 2))");
    }

    #[test]
    fn substitution_into_begin_drops_evaluated_prefix() {
        let mut interp = Interpreter::new();
        let expr = read_str(&mut interp.heap, "(begin (a) (b) (c))").unwrap();
        let target = interp.heap.list_to_vec(expr).unwrap()[2];
        let rebuilt = interp.substitute(expr, target, Value::int(5)).unwrap();
        assert_eq!(show(&mut interp, rebuilt), "(begin 5 (c))");
    }

    #[test]
    fn missing_target_is_reported() {
        let mut interp = Interpreter::new();
        let expr = read_str(&mut interp.heap, "(a b)").unwrap();
        let elsewhere = read_str(&mut interp.heap, "(a b)").unwrap();
        assert!(interp.substitute(expr, elsewhere, Value::int(1)).is_none());
    }
}
