use crate::continuation::Activation;
use crate::descriptor::TypeDescriptor;
use crate::environment::Frame;
use crate::evaluator;
use crate::interpreter::Interpreter;
use crate::number::Number;
use crate::symbols::Symbol;

use std::any::Any;
use std::fmt;
use std::fmt::Formatter;
use std::ops::{RangeFrom, RangeInclusive};

/// Index into the heap registry. This is the GC handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjRef(pub(crate) u32);

impl ObjRef {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ObjRef({})", self.0)
    }
}

/// A tagged value. Immediates are stored inline; everything with identity or
/// mutable state lives in the heap and is reached through an `ObjRef`.
#[derive(Debug, Clone, Copy)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    Char(char),
    Unspecified,
    Eof,
    Object(ObjRef),
}

impl Value {
    pub fn is_true(self) -> bool {
        !matches!(self, Value::Bool(false))
    }

    pub fn is_null(self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_object(self) -> Option<ObjRef> {
        match self {
            Value::Object(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_number(self) -> Option<Number> {
        match self {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn int(i: i64) -> Self {
        Value::Number(Number::Int(i))
    }
}

impl From<ObjRef> for Value {
    fn from(r: ObjRef) -> Self {
        Value::Object(r)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Value::Number(n)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Pair {
    pub car: Value,
    pub cdr: Value,
}

#[derive(Debug, Clone, Copy)]
pub struct Compound {
    pub name: Option<ObjRef>,
    pub parameters: Value,
    /// `(begin . body)`, so that body expressions are subtrees of the form
    /// the trampoline is running.
    pub body: Value,
    pub env: ObjRef,
}

impl Compound {
    /// Number of positional parameters, and whether a rest parameter follows.
    pub fn declared_arity(&self, heap: &crate::heap::Heap) -> (usize, bool) {
        let mut fixed = 0;
        let mut formals = self.parameters;
        loop {
            match heap.pair(formals) {
                Some(p) => {
                    fixed += 1;
                    formals = p.cdr;
                }
                None => return (fixed, !formals.is_null()),
            }
        }
    }
}

/// An unhygienic macro: the transformer receives syntax, not values.
#[derive(Debug, Clone, Copy)]
pub struct Macro {
    pub transformer: Value,
}

/// Escape-only continuation: the evaluation frames live at the moment of
/// capture, innermost first. Usable once, and only while the innermost of
/// those frames is still running.
#[derive(Debug, Clone)]
pub struct Continuation {
    pub activations: Vec<Activation>,
    pub(crate) spent: bool,
}

pub enum PortKind {
    InputString { text: String, position: usize },
    OutputString(String),
    Stdout,
    Closed,
}

pub struct Port {
    pub name: String,
    pub kind: PortKind,
}

impl fmt::Debug for Port {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Port({})", self.name)
    }
}

/// Opaque host data. Its behaviour, including release of the handle, comes
/// from the descriptor it was created with.
pub struct Userdata {
    pub descriptor: &'static TypeDescriptor,
    pub handle: Option<Box<dyn Any>>,
}

impl fmt::Debug for Userdata {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Userdata({})", self.descriptor.name)
    }
}

#[derive(Debug)]
pub enum Object {
    String(String),
    Symbol(Symbol),
    Pair(Pair),
    Vector(Vec<Value>),
    Primitive(&'static PrimitiveFn),
    Compound(Compound),
    Macro(Macro),
    Environment(Frame),
    Port(Port),
    Continuation(Continuation),
    Type(&'static TypeDescriptor),
    Userdata(Userdata),
}

#[derive(Debug, Clone)]
pub enum Arity {
    Between(RangeInclusive<usize>),
    AtLeast(RangeFrom<usize>),
}

#[derive(Debug)]
pub struct BadArgCount {
    pub name: String,
    pub expected: Arity,
    pub got: usize,
}

impl fmt::Display for BadArgCount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "When evaluating {} expected {} arguments, but received {} arguments",
            self.name, self.expected, self.got
        )
    }
}

impl Arity {
    pub const fn exactly(n: usize) -> Self {
        Self::Between(n..=n)
    }

    pub const fn at_least(n: usize) -> Self {
        Self::AtLeast(n..)
    }

    pub fn contains(&self, n: usize) -> bool {
        match self {
            Self::Between(range) => range.contains(&n),
            Self::AtLeast(range) => range.contains(&n),
        }
    }

    pub fn min(&self) -> usize {
        match self {
            Self::Between(range) => *range.start(),
            Self::AtLeast(range) => range.start,
        }
    }

    pub fn validate_for(&self, n: usize, name: &str) -> Result<(), BadArgCount> {
        match self.contains(n) {
            true => Ok(()),
            false => Err(BadArgCount {
                name: name.to_string(),
                expected: self.clone(),
                got: n,
            }),
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Between(r) => {
                if r.start() == r.end() {
                    write!(f, "exactly {}", r.start())
                } else {
                    write!(f, "from {} to {}", r.start(), r.end())
                }
            }
            Arity::AtLeast(r) => write!(f, "at least {}", r.start),
        }
    }
}

/// What a primitive hands back to the trampoline.
pub enum ApplyOutcome {
    Finished(Value),
    /// Keep going with this expression, in tail position.
    EvaluateFurther(Value, ObjRef),
    /// Apply this procedure to these (already evaluated) arguments, in tail
    /// position.
    Apply(Value, Vec<Value>),
}

pub type PrimitiveBody = fn(&mut Interpreter, &[Value]) -> evaluator::Result;
pub type TailPrimitiveBody = fn(&mut Interpreter, &[Value]) -> evaluator::Result<ApplyOutcome>;

#[derive(Clone, Copy)]
pub enum NativeFn {
    Value(PrimitiveBody),
    Tail(TailPrimitiveBody),
}

pub struct PrimitiveFn {
    pub name: &'static str,
    pub arity: Arity,
    pub fn_ptr: NativeFn,
}

impl PrimitiveFn {
    /// Primitives check their own argument counts; the evaluator never does.
    pub fn call(
        &'static self,
        interp: &mut Interpreter,
        args: &[Value],
    ) -> evaluator::Result<ApplyOutcome> {
        self.arity
            .validate_for(args.len(), self.name)
            .map_err(evaluator::Error::BadArgCount)?;
        log::trace!("Call {} with {} args", self.name, args.len());
        match self.fn_ptr {
            NativeFn::Value(f) => f(interp, args).map(ApplyOutcome::Finished),
            NativeFn::Tail(f) => f(interp, args),
        }
    }
}

impl fmt::Debug for PrimitiveFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "primitive function #<{}>", self.name)
    }
}
