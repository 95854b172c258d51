use crate::evaluator::{self, Error};
use crate::heap::Heap;
use crate::interpreter::Interpreter;
use crate::number::Number;
use crate::printer::{pr_str, PrintMode};
use crate::reader;
use crate::types::{
    ApplyOutcome, Arity, Macro, NativeFn, Object, Port, PortKind, PrimitiveFn, Value,
};
use itertools::Itertools;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::io::Write;

fn wrong_type(expected: &'static str, got: Value) -> evaluator::Unwind {
    Error::WrongType { expected, got }.into()
}

fn grab_numbers(args: &[Value]) -> evaluator::Result<Vec<Number>> {
    args.iter()
        .map(|v| v.as_number().ok_or_else(|| wrong_type("number", *v)))
        .collect()
}

fn grab_int(v: Value) -> evaluator::Result<i64> {
    match v {
        Value::Number(Number::Int(i)) => Ok(i),
        got => Err(wrong_type("exact integer", got)),
    }
}

fn grab_list(heap: &Heap, v: Value) -> evaluator::Result<Vec<Value>> {
    heap.list_to_vec(v).ok_or_else(|| wrong_type("list", v))
}

fn grab_string(heap: &Heap, v: Value) -> evaluator::Result<String> {
    heap.string(v).cloned().ok_or_else(|| wrong_type("string", v))
}

// Arithmetic

const SUM: PrimitiveFn = PrimitiveFn {
    name: "+",
    fn_ptr: NativeFn::Value(sum_),
    arity: Arity::at_least(0),
};

fn sum_(_: &mut Interpreter, args: &[Value]) -> evaluator::Result {
    let value = grab_numbers(args)?
        .into_iter()
        .fold(Number::Int(0), Number::add);
    Ok(value.into())
}

const SUB: PrimitiveFn = PrimitiveFn {
    name: "-",
    fn_ptr: NativeFn::Value(sub_),
    arity: Arity::at_least(1),
};

fn sub_(_: &mut Interpreter, args: &[Value]) -> evaluator::Result {
    match grab_numbers(args)?.as_slice() {
        [x] => Ok(Number::Int(0).sub(*x).into()),
        [x, rest @ ..] => Ok(rest.iter().fold(*x, |acc, y| acc.sub(*y)).into()),
        [] => unreachable!(),
    }
}

const MUL: PrimitiveFn = PrimitiveFn {
    name: "*",
    fn_ptr: NativeFn::Value(mul_),
    arity: Arity::at_least(0),
};

fn mul_(_: &mut Interpreter, args: &[Value]) -> evaluator::Result {
    let value = grab_numbers(args)?
        .into_iter()
        .fold(Number::Int(1), Number::mul);
    Ok(value.into())
}

const DIV: PrimitiveFn = PrimitiveFn {
    name: "/",
    fn_ptr: NativeFn::Value(div_),
    arity: Arity::at_least(1),
};

fn div_(_: &mut Interpreter, args: &[Value]) -> evaluator::Result {
    let numbers = grab_numbers(args)?;
    let (first, rest) = match numbers.as_slice() {
        [x] => (Number::Int(1), std::slice::from_ref(x)),
        [x, rest @ ..] => (*x, rest),
        [] => unreachable!(),
    };
    rest.iter()
        .try_fold(first, |acc, y| acc.div(*y))
        .map(Value::from)
        .ok_or_else(|| Error::DivideByZero.into())
}

fn integer_division(
    args: &[Value],
    op: fn(i64, i64) -> Number,
) -> evaluator::Result {
    match (grab_int(args[0])?, grab_int(args[1])?) {
        (_, 0) => Err(Error::DivideByZero.into()),
        (x, y) => Ok(op(x, y).into()),
    }
}

fn quotient(x: i64, y: i64) -> Number {
    x.checked_div(y)
        .map(Number::Int)
        .unwrap_or_else(|| Number::Real((x as f64 / y as f64).trunc()))
}

const QUOTIENT: PrimitiveFn = PrimitiveFn {
    name: "quotient",
    fn_ptr: NativeFn::Value(|_: &mut Interpreter, args: &[Value]| {
        integer_division(args, quotient)
    }),
    arity: Arity::exactly(2),
};

const REMAINDER: PrimitiveFn = PrimitiveFn {
    name: "remainder",
    fn_ptr: NativeFn::Value(|_: &mut Interpreter, args: &[Value]| {
        integer_division(args, |x, y| Number::Int(x.wrapping_rem(y)))
    }),
    arity: Arity::exactly(2),
};

/// Remainder with the sign of the divisor.
fn modulo(x: i64, y: i64) -> Number {
    let r = x.wrapping_rem(y);
    Number::Int(match r != 0 && (r < 0) != (y < 0) {
        true => r + y,
        false => r,
    })
}

const MODULO: PrimitiveFn = PrimitiveFn {
    name: "modulo",
    fn_ptr: NativeFn::Value(|_: &mut Interpreter, args: &[Value]| {
        integer_division(args, modulo)
    }),
    arity: Arity::exactly(2),
};

const ABS: PrimitiveFn = PrimitiveFn {
    name: "abs",
    fn_ptr: NativeFn::Value(abs_),
    arity: Arity::exactly(1),
};

fn abs_(_: &mut Interpreter, args: &[Value]) -> evaluator::Result {
    let n = match grab_numbers(args)?[0] {
        Number::Int(i) => i
            .checked_abs()
            .map(Number::Int)
            .unwrap_or_else(|| Number::Real((i as f64).abs())),
        Number::Real(r) => Number::Real(r.abs()),
    };
    Ok(n.into())
}

fn extremum(args: &[Value], keep: Ordering) -> evaluator::Result {
    let numbers = grab_numbers(args)?;
    let mut best = numbers[0];
    for n in &numbers[1..] {
        if n.compare(best) == Some(keep) {
            best = *n;
        }
    }
    Ok(best.into())
}

const MIN: PrimitiveFn = PrimitiveFn {
    name: "min",
    fn_ptr: NativeFn::Value(|_: &mut Interpreter, args: &[Value]| extremum(args, Ordering::Less)),
    arity: Arity::at_least(1),
};

const MAX: PrimitiveFn = PrimitiveFn {
    name: "max",
    fn_ptr: NativeFn::Value(|_: &mut Interpreter, args: &[Value]| {
        extremum(args, Ordering::Greater)
    }),
    arity: Arity::at_least(1),
};

fn comparison_(args: &[Value], comp: fn(Ordering) -> bool) -> evaluator::Result {
    let numbers = grab_numbers(args)?;
    let holds = numbers
        .iter()
        .tuple_windows()
        .all(|(x, y)| x.compare(*y).map(comp).unwrap_or(false));
    Ok(Value::Bool(holds))
}

macro_rules! comparison_primitive {
    ($SYMBOL:tt, $NAME:ident) => {
        paste::item! {
            const $NAME: PrimitiveFn = PrimitiveFn {
                name: stringify!($SYMBOL),
                fn_ptr: NativeFn::Value(|_: &mut Interpreter, args: &[Value]| {
                    comparison_(args, Ordering::[<is_ $NAME:lower>])
                }),
                arity: Arity::at_least(1),
            };
        }
    };
}

comparison_primitive!(=, EQ);
comparison_primitive!(<, LT);
comparison_primitive!(<=, LE);
comparison_primitive!(>, GT);
comparison_primitive!(>=, GE);

const NUMBER_TO_STRING: PrimitiveFn = PrimitiveFn {
    name: "number->string",
    fn_ptr: NativeFn::Value(number_to_string_),
    arity: Arity::exactly(1),
};

fn number_to_string_(interp: &mut Interpreter, args: &[Value]) -> evaluator::Result {
    let n = grab_numbers(args)?[0];
    Ok(interp.heap.string_from(n.to_string()))
}

const STRING_TO_NUMBER: PrimitiveFn = PrimitiveFn {
    name: "string->number",
    fn_ptr: NativeFn::Value(string_to_number_),
    arity: Arity::exactly(1),
};

fn string_to_number_(interp: &mut Interpreter, args: &[Value]) -> evaluator::Result {
    let text = grab_string(&interp.heap, args[0])?;
    Ok(Number::parse(&text)
        .map(Value::from)
        .unwrap_or(Value::Bool(false)))
}

// Casting and testing

fn predicate(
    interp: &mut Interpreter,
    args: &[Value],
    test: fn(&Heap, Value) -> bool,
) -> evaluator::Result {
    Ok(Value::Bool(test(&interp.heap, args[0])))
}

macro_rules! predicate_primitive {
    ($NAME:ident, $SYMBOL:expr, $TEST:expr) => {
        const $NAME: PrimitiveFn = PrimitiveFn {
            name: $SYMBOL,
            fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| {
                predicate(interp, args, $TEST)
            }),
            arity: Arity::exactly(1),
        };
    };
}

fn is_number_where(v: Value, test: fn(Number) -> bool) -> bool {
    v.as_number().map(test).unwrap_or(false)
}

predicate_primitive!(NOT, "not", |_, v| matches!(v, Value::Bool(false)));
predicate_primitive!(NULL_TEST, "null?", |_, v| v.is_null());
predicate_primitive!(PAIR_TEST, "pair?", |heap, v| heap.is_pair(v));
predicate_primitive!(LIST_TEST, "list?", |heap, v| heap.list_length(v).is_some());
predicate_primitive!(SYMBOL_TEST, "symbol?", |heap, v| heap.is_symbol(v));
predicate_primitive!(STRING_TEST, "string?", |heap, v| heap.string(v).is_some());
predicate_primitive!(VECTOR_TEST, "vector?", |heap, v| heap.vector(v).is_some());
predicate_primitive!(CHAR_TEST, "char?", |_, v| matches!(v, Value::Char(_)));
predicate_primitive!(BOOLEAN_TEST, "boolean?", |_, v| matches!(v, Value::Bool(_)));
predicate_primitive!(NUMBER_TEST, "number?", |_, v| v.as_number().is_some());
predicate_primitive!(INTEGER_TEST, "integer?", |_, v| is_number_where(v, |n| match n {
    Number::Int(_) => true,
    Number::Real(r) => r.is_finite() && r.fract() == 0.0,
}));
predicate_primitive!(ZERO_TEST, "zero?", |_, v| is_number_where(v, Number::is_zero));
predicate_primitive!(POSITIVE_TEST, "positive?", |_, v| is_number_where(v, |n| {
    n.compare(Number::Int(0)) == Some(Ordering::Greater)
}));
predicate_primitive!(NEGATIVE_TEST, "negative?", |_, v| is_number_where(v, |n| {
    n.compare(Number::Int(0)) == Some(Ordering::Less)
}));
predicate_primitive!(PROCEDURE_TEST, "procedure?", |heap, v| heap.is_procedure(v));
predicate_primitive!(EOF_TEST, "eof-object?", |_, v| matches!(v, Value::Eof));
predicate_primitive!(ENVIRONMENT_TEST, "environment?", |heap, v| heap.is_environment(v));
predicate_primitive!(MACRO_TEST, "macro?", |heap, v| matches!(
    v.as_object().and_then(|r| heap.get(r)),
    Some(Object::Macro(_))
));

const TYPE_OF: PrimitiveFn = PrimitiveFn {
    name: "type-of",
    fn_ptr: NativeFn::Value(type_of_),
    arity: Arity::exactly(1),
};

fn type_of_(interp: &mut Interpreter, args: &[Value]) -> evaluator::Result {
    let descriptor = interp.heap.descriptor(args[0]);
    Ok(interp.heap.type_object(descriptor))
}

// Equality

fn equality(interp: &mut Interpreter, args: &[Value], same: fn(&Heap, Value, Value) -> bool) -> evaluator::Result {
    Ok(Value::Bool(same(&interp.heap, args[0], args[1])))
}

const EQ_TEST: PrimitiveFn = PrimitiveFn {
    name: "eq?",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| equality(interp, args, Heap::eq)),
    arity: Arity::exactly(2),
};

const EQV_TEST: PrimitiveFn = PrimitiveFn {
    name: "eqv?",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| equality(interp, args, Heap::eqv)),
    arity: Arity::exactly(2),
};

const EQUAL_TEST: PrimitiveFn = PrimitiveFn {
    name: "equal?",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| {
        equality(interp, args, Heap::equal)
    }),
    arity: Arity::exactly(2),
};

// Working with pairs and lists

const CONS: PrimitiveFn = PrimitiveFn {
    name: "cons",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| {
        Ok(interp.heap.cons(args[0], args[1]))
    }),
    arity: Arity::exactly(2),
};

fn grab_pair(heap: &Heap, v: Value) -> evaluator::Result<crate::types::Pair> {
    heap.pair(v).copied().ok_or_else(|| wrong_type("pair", v))
}

const CAR: PrimitiveFn = PrimitiveFn {
    name: "car",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| {
        Ok(grab_pair(&interp.heap, args[0])?.car)
    }),
    arity: Arity::exactly(1),
};

const CDR: PrimitiveFn = PrimitiveFn {
    name: "cdr",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| {
        Ok(grab_pair(&interp.heap, args[0])?.cdr)
    }),
    arity: Arity::exactly(1),
};

const CADR: PrimitiveFn = PrimitiveFn {
    name: "cadr",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| {
        let rest = grab_pair(&interp.heap, args[0])?.cdr;
        Ok(grab_pair(&interp.heap, rest)?.car)
    }),
    arity: Arity::exactly(1),
};

const CDDR: PrimitiveFn = PrimitiveFn {
    name: "cddr",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| {
        let rest = grab_pair(&interp.heap, args[0])?.cdr;
        Ok(grab_pair(&interp.heap, rest)?.cdr)
    }),
    arity: Arity::exactly(1),
};

const SET_CAR: PrimitiveFn = PrimitiveFn {
    name: "set-car!",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| {
        let pair = interp
            .heap
            .pair_mut(args[0])
            .ok_or_else(|| wrong_type("pair", args[0]))?;
        pair.car = args[1];
        Ok(Value::Unspecified)
    }),
    arity: Arity::exactly(2),
};

const SET_CDR: PrimitiveFn = PrimitiveFn {
    name: "set-cdr!",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| {
        let pair = interp
            .heap
            .pair_mut(args[0])
            .ok_or_else(|| wrong_type("pair", args[0]))?;
        pair.cdr = args[1];
        Ok(Value::Unspecified)
    }),
    arity: Arity::exactly(2),
};

const LIST: PrimitiveFn = PrimitiveFn {
    name: "list",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| Ok(interp.heap.list(args))),
    arity: Arity::at_least(0),
};

const LENGTH: PrimitiveFn = PrimitiveFn {
    name: "length",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| {
        let items = grab_list(&interp.heap, args[0])?;
        Ok(Value::int(items.len() as i64))
    }),
    arity: Arity::exactly(1),
};

const APPEND: PrimitiveFn = PrimitiveFn {
    name: "append",
    fn_ptr: NativeFn::Value(append_),
    arity: Arity::at_least(0),
};

/// Every argument but the last is copied; the last becomes the shared tail.
fn append_(interp: &mut Interpreter, args: &[Value]) -> evaluator::Result {
    let (tail, lists) = match args.split_last() {
        Some((tail, lists)) => (*tail, lists),
        None => return Ok(Value::Null),
    };
    let mut items = Vec::new();
    for list in lists {
        items.extend(grab_list(&interp.heap, *list)?);
    }
    Ok(interp.heap.list_with_tail(&items, tail))
}

const REVERSE: PrimitiveFn = PrimitiveFn {
    name: "reverse",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| {
        let mut items = grab_list(&interp.heap, args[0])?;
        items.reverse();
        Ok(interp.heap.list(&items))
    }),
    arity: Arity::exactly(1),
};

const LIST_REF: PrimitiveFn = PrimitiveFn {
    name: "list-ref",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| {
        let items = grab_list(&interp.heap, args[0])?;
        let i = grab_index(args[1], items.len())?;
        Ok(items[i])
    }),
    arity: Arity::exactly(2),
};

fn member_(interp: &mut Interpreter, args: &[Value], same: fn(&Heap, Value, Value) -> bool) -> evaluator::Result {
    let heap = &interp.heap;
    let mut current = args[1];
    while let Some(p) = heap.pair(current) {
        if same(heap, args[0], p.car) {
            return Ok(current);
        }
        current = p.cdr;
    }
    Ok(Value::Bool(false))
}

fn assoc_(interp: &mut Interpreter, args: &[Value], same: fn(&Heap, Value, Value) -> bool) -> evaluator::Result {
    let heap = &interp.heap;
    let mut current = args[1];
    while let Some(p) = heap.pair(current) {
        match heap.pair(p.car) {
            Some(entry) if same(heap, args[0], entry.car) => return Ok(p.car),
            Some(_) => {}
            None => return Err(wrong_type("association list", args[1])),
        }
        current = p.cdr;
    }
    Ok(Value::Bool(false))
}

macro_rules! search_primitive {
    ($NAME:ident, $SYMBOL:expr, $SEARCH:ident, $SAME:path) => {
        const $NAME: PrimitiveFn = PrimitiveFn {
            name: $SYMBOL,
            fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| {
                $SEARCH(interp, args, $SAME)
            }),
            arity: Arity::exactly(2),
        };
    };
}

search_primitive!(MEMQ, "memq", member_, Heap::eq);
search_primitive!(MEMV, "memv", member_, Heap::eqv);
search_primitive!(MEMBER, "member", member_, Heap::equal);
search_primitive!(ASSQ, "assq", assoc_, Heap::eq);
search_primitive!(ASSV, "assv", assoc_, Heap::eqv);
search_primitive!(ASSOC, "assoc", assoc_, Heap::equal);

const MAP: PrimitiveFn = PrimitiveFn {
    name: "map",
    fn_ptr: NativeFn::Value(map_),
    arity: Arity::exactly(2),
};

/// Results wait on the scratch stack so a collection triggered by the
/// procedure cannot reclaim them.
fn map_(interp: &mut Interpreter, args: &[Value]) -> evaluator::Result {
    let items = grab_list(&interp.heap, args[1])?;
    let mark = interp.scratch.len();
    for item in items {
        match interp.apply_procedure(args[0], &[item]) {
            Ok(v) => interp.scratch.push(v),
            Err(e) => {
                interp.scratch.truncate(mark);
                return Err(e);
            }
        }
    }
    let results = interp.scratch.split_off(mark);
    Ok(interp.heap.list(&results))
}

const FOR_EACH: PrimitiveFn = PrimitiveFn {
    name: "for-each",
    fn_ptr: NativeFn::Value(for_each_),
    arity: Arity::exactly(2),
};

fn for_each_(interp: &mut Interpreter, args: &[Value]) -> evaluator::Result {
    for item in grab_list(&interp.heap, args[1])? {
        interp.apply_procedure(args[0], &[item])?;
    }
    Ok(Value::Unspecified)
}

// Generic sequences

fn grab_index(v: Value, length: usize) -> evaluator::Result<usize> {
    let i = grab_int(v)?;
    match i >= 0 && (i as u64) < length as u64 {
        true => Ok(i as usize),
        false => Err(Error::BadIndex(i, 0..length).into()),
    }
}

/// `(ref seq i)` through the type's sequence capability.
fn sequence_ref(heap: &Heap, seq: Value, index: Value) -> evaluator::Result {
    let descriptor = heap.descriptor(seq);
    match (descriptor.length, descriptor.get) {
        (Some(length), Some(get)) => {
            let i = grab_index(index, length(heap, seq))?;
            Ok(get(heap, seq, i))
        }
        _ => Err(wrong_type("sequence", seq)),
    }
}

fn sequence_put(heap: &mut Heap, seq: Value, index: Value, value: Value) -> evaluator::Result {
    let descriptor = heap.descriptor(seq);
    match (descriptor.length, descriptor.set) {
        (Some(length), Some(set)) => {
            let i = grab_index(index, length(heap, seq))?;
            set(heap, seq, i, value)?;
            Ok(Value::Unspecified)
        }
        _ => Err(wrong_type("mutable sequence", seq)),
    }
}

fn sequence_length(heap: &Heap, seq: Value) -> evaluator::Result<usize> {
    heap.descriptor(seq)
        .length
        .map(|length| length(heap, seq))
        .ok_or_else(|| wrong_type("sequence", seq))
}

const REF: PrimitiveFn = PrimitiveFn {
    name: "ref",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| {
        sequence_ref(&interp.heap, args[0], args[1])
    }),
    arity: Arity::exactly(2),
};

const PUT: PrimitiveFn = PrimitiveFn {
    name: "put!",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| {
        sequence_put(&mut interp.heap, args[0], args[1], args[2])
    }),
    arity: Arity::exactly(3),
};

const LENGTH_OF: PrimitiveFn = PrimitiveFn {
    name: "length-of",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| {
        sequence_length(&interp.heap, args[0]).map(|n| Value::int(n as i64))
    }),
    arity: Arity::exactly(1),
};

// Working with vectors

fn check_vector(heap: &Heap, v: Value) -> evaluator::Result<()> {
    match heap.vector(v) {
        Some(_) => Ok(()),
        None => Err(wrong_type("vector", v)),
    }
}

const VECTOR: PrimitiveFn = PrimitiveFn {
    name: "vector",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| {
        Ok(interp.heap.vector_from(args.to_vec()))
    }),
    arity: Arity::at_least(0),
};

const MAKE_VECTOR: PrimitiveFn = PrimitiveFn {
    name: "make-vector",
    fn_ptr: NativeFn::Value(make_vector_),
    arity: Arity::Between(1..=2),
};

/// Largest vector `make-vector` will allocate.
const MAX_VECTOR_LENGTH: usize = 1 << 24;

fn make_vector_(interp: &mut Interpreter, args: &[Value]) -> evaluator::Result {
    let n = grab_int(args[0])?;
    if n < 0 {
        return Err(wrong_type("non-negative integer", args[0]));
    }
    if n > MAX_VECTOR_LENGTH as i64 {
        return Err(Error::BadIndex(n, 0..MAX_VECTOR_LENGTH + 1).into());
    }
    let fill = args.get(1).copied().unwrap_or(Value::Unspecified);
    Ok(interp.heap.vector_from(vec![fill; n as usize]))
}

const VECTOR_REF: PrimitiveFn = PrimitiveFn {
    name: "vector-ref",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| {
        check_vector(&interp.heap, args[0])?;
        sequence_ref(&interp.heap, args[0], args[1])
    }),
    arity: Arity::exactly(2),
};

const VECTOR_SET: PrimitiveFn = PrimitiveFn {
    name: "vector-set!",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| {
        check_vector(&interp.heap, args[0])?;
        sequence_put(&mut interp.heap, args[0], args[1], args[2])
    }),
    arity: Arity::exactly(3),
};

const VECTOR_LENGTH: PrimitiveFn = PrimitiveFn {
    name: "vector-length",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| {
        check_vector(&interp.heap, args[0])?;
        sequence_length(&interp.heap, args[0]).map(|n| Value::int(n as i64))
    }),
    arity: Arity::exactly(1),
};

const LIST_TO_VECTOR: PrimitiveFn = PrimitiveFn {
    name: "list->vector",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| {
        let items = grab_list(&interp.heap, args[0])?;
        Ok(interp.heap.vector_from(items))
    }),
    arity: Arity::exactly(1),
};

const VECTOR_TO_LIST: PrimitiveFn = PrimitiveFn {
    name: "vector->list",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| {
        let items = interp
            .heap
            .vector(args[0])
            .cloned()
            .ok_or_else(|| wrong_type("vector", args[0]))?;
        Ok(interp.heap.list(&items))
    }),
    arity: Arity::exactly(1),
};

// Working with strings and symbols

fn check_string(heap: &Heap, v: Value) -> evaluator::Result<()> {
    match heap.string(v) {
        Some(_) => Ok(()),
        None => Err(wrong_type("string", v)),
    }
}

const STRING_LENGTH: PrimitiveFn = PrimitiveFn {
    name: "string-length",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| {
        check_string(&interp.heap, args[0])?;
        sequence_length(&interp.heap, args[0]).map(|n| Value::int(n as i64))
    }),
    arity: Arity::exactly(1),
};

const STRING_REF: PrimitiveFn = PrimitiveFn {
    name: "string-ref",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| {
        check_string(&interp.heap, args[0])?;
        sequence_ref(&interp.heap, args[0], args[1])
    }),
    arity: Arity::exactly(2),
};

const STRING_SET: PrimitiveFn = PrimitiveFn {
    name: "string-set!",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| {
        check_string(&interp.heap, args[0])?;
        sequence_put(&mut interp.heap, args[0], args[1], args[2])
    }),
    arity: Arity::exactly(3),
};

const STRING_APPEND: PrimitiveFn = PrimitiveFn {
    name: "string-append",
    fn_ptr: NativeFn::Value(string_append_),
    arity: Arity::at_least(0),
};

fn string_append_(interp: &mut Interpreter, args: &[Value]) -> evaluator::Result {
    let parts: Vec<String> = args
        .iter()
        .map(|arg| grab_string(&interp.heap, *arg))
        .collect::<evaluator::Result<_>>()?;
    Ok(interp.heap.string_from(parts.concat()))
}

const SYMBOL_TO_STRING: PrimitiveFn = PrimitiveFn {
    name: "symbol->string",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| {
        let name = interp
            .heap
            .symbol_name(args[0])
            .map(str::to_string)
            .ok_or_else(|| wrong_type("symbol", args[0]))?;
        Ok(interp.heap.string_from(name))
    }),
    arity: Arity::exactly(1),
};

const STRING_TO_SYMBOL: PrimitiveFn = PrimitiveFn {
    name: "string->symbol",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| {
        let name = grab_string(&interp.heap, args[0])?;
        Ok(interp.heap.intern(&name))
    }),
    arity: Arity::exactly(1),
};

// Exceptions

const ERROR: PrimitiveFn = PrimitiveFn {
    name: "error",
    fn_ptr: NativeFn::Value(error_),
    arity: Arity::at_least(1),
};

fn error_(interp: &mut Interpreter, args: &[Value]) -> evaluator::Result {
    let message = match interp.heap.string(args[0]) {
        Some(s) => s.clone(),
        None => interp.show(args[0]),
    };
    Err(Error::User {
        message,
        irritants: args[1..].to_vec(),
    }
    .into())
}

const RAISE: PrimitiveFn = PrimitiveFn {
    name: "raise",
    fn_ptr: NativeFn::Value(|_: &mut Interpreter, args: &[Value]| Err(Error::Raise(args[0]).into())),
    arity: Arity::exactly(1),
};

// Output and ports

fn grab_port(heap: &mut Heap, v: Value) -> evaluator::Result<&mut Port> {
    let r = v.as_object().ok_or_else(|| wrong_type("port", v))?;
    match heap.get_mut(r) {
        Some(Object::Port(port)) => Ok(port),
        _ => Err(wrong_type("port", v)),
    }
}

fn write_stdout(text: &str) -> evaluator::Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(text.as_bytes()).map_err(Error::from)?;
    stdout.flush().map_err(Error::from)?;
    Ok(())
}

/// Send `text` to `port`, or to standard output when there is none.
fn emit(interp: &mut Interpreter, text: &str, port: Option<Value>) -> evaluator::Result {
    let port = match port {
        Some(port) => port,
        None => return write_stdout(text).map(|()| Value::Unspecified),
    };
    match &mut grab_port(&mut interp.heap, port)?.kind {
        PortKind::OutputString(buffer) => buffer.push_str(text),
        PortKind::Stdout => write_stdout(text)?,
        _ => return Err(wrong_type("open output port", port)),
    }
    Ok(Value::Unspecified)
}

fn print_(interp: &mut Interpreter, args: &[Value], mode: PrintMode) -> evaluator::Result {
    let text = pr_str(&mut interp.heap, args[0], mode);
    emit(interp, &text, args.get(1).copied())
}

const DISPLAY: PrimitiveFn = PrimitiveFn {
    name: "display",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| {
        print_(interp, args, PrintMode::Directly)
    }),
    arity: Arity::Between(1..=2),
};

const WRITE: PrimitiveFn = PrimitiveFn {
    name: "write",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| {
        print_(interp, args, PrintMode::ReadableRepresentation)
    }),
    arity: Arity::Between(1..=2),
};

const NEWLINE: PrimitiveFn = PrimitiveFn {
    name: "newline",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| {
        emit(interp, "\n", args.first().copied())
    }),
    arity: Arity::Between(0..=1),
};

fn make_port(interp: &mut Interpreter, name: &str, kind: PortKind) -> Value {
    Value::Object(interp.heap.alloc(Object::Port(Port {
        name: name.to_string(),
        kind,
    })))
}

const CURRENT_OUTPUT_PORT: PrimitiveFn = PrimitiveFn {
    name: "current-output-port",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, _: &[Value]| {
        Ok(make_port(interp, "stdout", PortKind::Stdout))
    }),
    arity: Arity::exactly(0),
};

const OPEN_INPUT_STRING: PrimitiveFn = PrimitiveFn {
    name: "open-input-string",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| {
        let text = grab_string(&interp.heap, args[0])?;
        Ok(make_port(
            interp,
            "input string",
            PortKind::InputString { text, position: 0 },
        ))
    }),
    arity: Arity::exactly(1),
};

const OPEN_OUTPUT_STRING: PrimitiveFn = PrimitiveFn {
    name: "open-output-string",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, _: &[Value]| {
        Ok(make_port(interp, "output string", PortKind::OutputString(String::new())))
    }),
    arity: Arity::exactly(0),
};

const GET_OUTPUT_STRING: PrimitiveFn = PrimitiveFn {
    name: "get-output-string",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| {
        let text = match &grab_port(&mut interp.heap, args[0])?.kind {
            PortKind::OutputString(buffer) => buffer.clone(),
            _ => return Err(wrong_type("string output port", args[0])),
        };
        Ok(interp.heap.string_from(text))
    }),
    arity: Arity::exactly(1),
};

const READ: PrimitiveFn = PrimitiveFn {
    name: "read",
    fn_ptr: NativeFn::Value(read_),
    arity: Arity::exactly(1),
};

/// The next datum from a string input port, or the eof object.
fn read_(interp: &mut Interpreter, args: &[Value]) -> evaluator::Result {
    let (text, mut position) = match &grab_port(&mut interp.heap, args[0])?.kind {
        PortKind::InputString { text, position } => (text.clone(), *position),
        _ => return Err(wrong_type("open input port", args[0])),
    };
    let datum = reader::read_datum(&mut interp.heap, &text, &mut position).map_err(Error::from)?;
    if let PortKind::InputString { position: p, .. } = &mut grab_port(&mut interp.heap, args[0])?.kind {
        *p = position;
    }
    Ok(datum.unwrap_or(Value::Eof))
}

const CLOSE_PORT: PrimitiveFn = PrimitiveFn {
    name: "close-port",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| {
        grab_port(&mut interp.heap, args[0])?.kind = PortKind::Closed;
        Ok(Value::Unspecified)
    }),
    arity: Arity::exactly(1),
};

const EOF_OBJECT: PrimitiveFn = PrimitiveFn {
    name: "eof-object",
    fn_ptr: NativeFn::Value(|_: &mut Interpreter, _: &[Value]| Ok(Value::Eof)),
    arity: Arity::exactly(0),
};

// Evaluation and control

const APPLY: PrimitiveFn = PrimitiveFn {
    name: "apply",
    fn_ptr: NativeFn::Tail(apply_),
    arity: Arity::at_least(1),
};

/// `(apply f a b '(c d))` calls `(f a b c d)` in tail position.
fn apply_(interp: &mut Interpreter, args: &[Value]) -> evaluator::Result<ApplyOutcome> {
    let (procedure, rest) = match args.split_first() {
        Some((procedure, rest)) => (*procedure, rest),
        None => unreachable!(),
    };
    let mut call_args = Vec::new();
    if let Some((last, leading)) = rest.split_last() {
        call_args.extend_from_slice(leading);
        call_args.extend(grab_list(&interp.heap, *last)?);
    }
    Ok(ApplyOutcome::Apply(procedure, call_args))
}

const CALL_CC: PrimitiveFn = PrimitiveFn {
    name: "call/cc",
    fn_ptr: NativeFn::Tail(call_cc_),
    arity: Arity::exactly(1),
};

const CALL_WITH_CURRENT_CONTINUATION: PrimitiveFn = PrimitiveFn {
    name: "call-with-current-continuation",
    fn_ptr: NativeFn::Tail(call_cc_),
    arity: Arity::exactly(1),
};

fn call_cc_(interp: &mut Interpreter, args: &[Value]) -> evaluator::Result<ApplyOutcome> {
    if !interp.heap.is_procedure(args[0]) {
        return Err(Error::NotApplicable(args[0]).into());
    }
    let k = interp.capture_continuation();
    Ok(ApplyOutcome::Apply(args[0], vec![k]))
}

pub(crate) const EVAL: PrimitiveFn = PrimitiveFn {
    name: "eval",
    fn_ptr: NativeFn::Tail(eval_),
    arity: Arity::Between(1..=2),
};

fn eval_(interp: &mut Interpreter, args: &[Value]) -> evaluator::Result<ApplyOutcome> {
    let env = match args.get(1) {
        None => interp.global,
        Some(v) => match v.as_object() {
            Some(r) if interp.heap.is_environment(*v) => r,
            _ => return Err(wrong_type("environment", *v)),
        },
    };
    Ok(ApplyOutcome::EvaluateFurther(args[0], env))
}

const INTERACTION_ENVIRONMENT: PrimitiveFn = PrimitiveFn {
    name: "interaction-environment",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, _: &[Value]| Ok(interp.global.into())),
    arity: Arity::exactly(0),
};

const MACRO: PrimitiveFn = PrimitiveFn {
    name: "macro",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, args: &[Value]| {
        if !interp.heap.is_procedure(args[0]) {
            return Err(wrong_type("procedure", args[0]));
        }
        let m = interp.heap.alloc(Object::Macro(Macro {
            transformer: args[0],
        }));
        Ok(m.into())
    }),
    arity: Arity::exactly(1),
};

const MACROEXPAND: PrimitiveFn = PrimitiveFn {
    name: "macroexpand",
    fn_ptr: NativeFn::Value(macroexpand_),
    arity: Arity::exactly(1),
};

/// Expand `form` for as long as its head names a global macro.
fn macroexpand_(interp: &mut Interpreter, args: &[Value]) -> evaluator::Result {
    let global = interp.global;
    let mut form = args[0];
    loop {
        let (head, operands) = match interp.heap.pair(form) {
            Some(p) => (p.car, p.cdr),
            None => return Ok(form),
        };
        let transformer = match head.as_object() {
            Some(symbol) if interp.heap.is_symbol(head) => {
                match interp.heap.lookup(global, symbol) {
                    Ok(Value::Object(r)) => match interp.heap.get(r) {
                        Some(Object::Macro(m)) => m.transformer,
                        _ => return Ok(form),
                    },
                    _ => return Ok(form),
                }
            }
            _ => return Ok(form),
        };
        form = interp.expand(transformer, operands, global)?;
        interp.scratch.push(form);
    }
}

const GC: PrimitiveFn = PrimitiveFn {
    name: "gc",
    fn_ptr: NativeFn::Value(|interp: &mut Interpreter, _: &[Value]| {
        Ok(Value::int(interp.collect() as i64))
    }),
    arity: Arity::exactly(0),
};

type Namespace = HashMap<&'static str, &'static PrimitiveFn>;
lazy_static! {
    pub static ref CORE: Namespace = {
        let mut map = Namespace::new();
        for func in [
            // Arithmetic
            SUM,
            SUB,
            MUL,
            DIV,
            QUOTIENT,
            REMAINDER,
            MODULO,
            ABS,
            MIN,
            MAX,
            NUMBER_TO_STRING,
            STRING_TO_NUMBER,
            // Comparisons
            EQ,
            LT,
            LE,
            GT,
            GE,
            // Casting and testing
            NOT,
            NULL_TEST,
            PAIR_TEST,
            LIST_TEST,
            SYMBOL_TEST,
            STRING_TEST,
            VECTOR_TEST,
            CHAR_TEST,
            BOOLEAN_TEST,
            NUMBER_TEST,
            INTEGER_TEST,
            ZERO_TEST,
            POSITIVE_TEST,
            NEGATIVE_TEST,
            PROCEDURE_TEST,
            EOF_TEST,
            ENVIRONMENT_TEST,
            MACRO_TEST,
            TYPE_OF,
            EQ_TEST,
            EQV_TEST,
            EQUAL_TEST,
            // Working with lists
            CONS,
            CAR,
            CDR,
            CADR,
            CDDR,
            SET_CAR,
            SET_CDR,
            LIST,
            LENGTH,
            APPEND,
            REVERSE,
            LIST_REF,
            MEMQ,
            MEMV,
            MEMBER,
            ASSQ,
            ASSV,
            ASSOC,
            MAP,
            FOR_EACH,
            // Generic sequences
            REF,
            PUT,
            LENGTH_OF,
            // Working with vectors
            VECTOR,
            MAKE_VECTOR,
            VECTOR_REF,
            VECTOR_SET,
            VECTOR_LENGTH,
            LIST_TO_VECTOR,
            VECTOR_TO_LIST,
            // Working with strings
            STRING_LENGTH,
            STRING_REF,
            STRING_SET,
            STRING_APPEND,
            SYMBOL_TO_STRING,
            STRING_TO_SYMBOL,
            // Exceptions
            ERROR,
            RAISE,
            // Ports
            DISPLAY,
            WRITE,
            NEWLINE,
            CURRENT_OUTPUT_PORT,
            OPEN_INPUT_STRING,
            OPEN_OUTPUT_STRING,
            GET_OUTPUT_STRING,
            READ,
            CLOSE_PORT,
            EOF_OBJECT,
            // Evaluation and control
            APPLY,
            CALL_CC,
            CALL_WITH_CURRENT_CONTINUATION,
            EVAL,
            INTERACTION_ENVIRONMENT,
            MACRO,
            MACROEXPAND,
            GC,
        ].iter() {
            map.insert(func.name, func);
        }
        map
    };
}

/// Bind every core primitive in the global environment.
pub(crate) fn install(interp: &mut Interpreter) {
    for func in CORE.values() {
        let value = interp.primitive(*func);
        interp.define_global(func.name, value);
    }
    log::debug!("installed {} core primitives", CORE.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(interp: &mut Interpreter, source: &str) -> String {
        let v = interp.eval_str(source).unwrap();
        pr_str(&mut interp.heap, v, PrintMode::ReadableRepresentation)
    }

    #[test]
    fn arithmetic_keeps_exactness_until_it_cannot() {
        let mut interp = Interpreter::new();
        assert_eq!(run(&mut interp, "(+ 1 2 3)"), "6");
        assert_eq!(run(&mut interp, "(- 5)"), "-5");
        assert_eq!(run(&mut interp, "(/ 6 3)"), "2");
        assert_eq!(run(&mut interp, "(/ 1 2)"), "0.5");
        assert_eq!(run(&mut interp, "(modulo -7 2)"), "1");
        assert_eq!(run(&mut interp, "(remainder -7 2)"), "-1");
        assert!(matches!(
            interp.eval_str("(quotient 1 0)"),
            Err(Error::DivideByZero)
        ));
    }

    #[test]
    fn integer_division_overflows_to_inexact() {
        let mut interp = Interpreter::new();
        match interp.eval_str("(quotient -9223372036854775808 -1)") {
            Ok(Value::Number(Number::Real(r))) => assert_eq!(r, 9223372036854775808.0),
            other => panic!("expected an inexact quotient, got {:?}", other),
        }
        assert_eq!(run(&mut interp, "(remainder -9223372036854775808 -1)"), "0");
        assert_eq!(run(&mut interp, "(modulo -9223372036854775808 -1)"), "0");
        assert_eq!(run(&mut interp, "(quotient -7 2)"), "-3");
    }

    #[test]
    fn comparisons_chain() {
        let mut interp = Interpreter::new();
        assert_eq!(run(&mut interp, "(< 1 2 3)"), "#t");
        assert_eq!(run(&mut interp, "(< 1 3 2)"), "#f");
        assert_eq!(run(&mut interp, "(>= 3 3 1)"), "#t");
        assert_eq!(run(&mut interp, "(= 1 1.0)"), "#t");
    }

    #[test]
    fn list_operations() {
        let mut interp = Interpreter::new();
        assert_eq!(run(&mut interp, "(append '(1 2) '(3) '() 4)"), "(1 2 3 . 4)");
        assert_eq!(run(&mut interp, "(reverse '(1 2 3))"), "(3 2 1)");
        assert_eq!(run(&mut interp, "(memv 2 '(1 2 3))"), "(2 3)");
        assert_eq!(run(&mut interp, "(assoc \"b\" '((\"a\" . 1) (\"b\" . 2)))"), "(\"b\" . 2)");
        assert_eq!(run(&mut interp, "(map (lambda (x) (* x x)) '(1 2 3))"), "(1 4 9)");
        assert_eq!(
            run(&mut interp, "(define l (list 1 2)) (set-cdr! (cdr l) l) (list? l)"),
            "#f"
        );
    }

    #[test]
    fn generic_sequence_protocol() {
        let mut interp = Interpreter::new();
        assert_eq!(run(&mut interp, "(ref \"abc\" 1)"), "#\\b");
        assert_eq!(run(&mut interp, "(ref '(1 . 2) 1)"), "2");
        assert_eq!(run(&mut interp, "(length-of (vector 1 2 3))"), "3");
        assert_eq!(
            run(&mut interp, "(define v (make-vector 2 0)) (put! v 1 'x) v"),
            "#(0 x)"
        );
        match interp.eval_str("(vector-ref (vector 1 2) 2)") {
            Err(Error::BadIndex(2, range)) => assert_eq!(range, 0..2),
            other => panic!("expected a range error, got {:?}", other),
        }
    }

    #[test]
    fn make_vector_refuses_huge_lengths() {
        let mut interp = Interpreter::new();
        match interp.eval_str("(make-vector 4611686018427387904 0)") {
            Err(Error::BadIndex(n, range)) => {
                assert_eq!(n, 4611686018427387904);
                assert_eq!(range.end, MAX_VECTOR_LENGTH + 1);
            }
            other => panic!("expected a range error, got {:?}", other),
        }
        assert!(matches!(
            interp.eval_str("(make-vector -1)"),
            Err(Error::WrongType { .. })
        ));
        assert_eq!(run(&mut interp, "(vector-length (make-vector 3))"), "3");
    }

    #[test]
    fn string_ports() {
        let mut interp = Interpreter::new();
        assert_eq!(
            run(
                &mut interp,
                "(define p (open-output-string)) (write \"hi\" p) (display #\\! p) (get-output-string p)"
            ),
            "\"\\\"hi\\\"!\""
        );
        assert_eq!(
            run(
                &mut interp,
                "(define in (open-input-string \"(a b) 7\")) (list (read in) (read in) (eof-object? (read in)))"
            ),
            "((a b) 7 #t)"
        );
    }

    #[test]
    fn every_primitive_is_bound() {
        let interp = Interpreter::new();
        for name in CORE.keys() {
            assert!(interp.lookup_global(name).is_some(), "{} is unbound", name);
        }
    }
}
