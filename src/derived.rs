//! Derived syntax. Each form is a primitive that rewrites its operand list
//! into simpler code, installed in the global environment as a macro so the
//! evaluator reaches it through ordinary macro expansion.

use crate::evaluator::{self, syntax};
use crate::heap::Heap;
use crate::interpreter::Interpreter;
use crate::types::{Arity, Macro, NativeFn, Object, PrimitiveFn, Value};

/// The operands of `form` as a vector. `form` names the syntax in errors.
fn parts(heap: &Heap, form: &'static str, operands: Value) -> evaluator::Result<Vec<Value>> {
    heap.list_to_vec(operands)
        .ok_or_else(|| syntax(form, "improper form", operands))
}

fn is_named(heap: &Heap, v: Value, name: &str) -> bool {
    heap.symbol_name(v) == Some(name)
}

fn tail_after(heap: &Heap, list: Value, n: usize) -> Value {
    (0..n).fold(list, |current, _| heap.cdr(current).unwrap_or(Value::Null))
}

/// `((var init) ...)` split into the variables and the initialisers.
fn bindings_of(
    heap: &Heap,
    form: &'static str,
    bindings: Value,
) -> evaluator::Result<(Vec<Value>, Vec<Value>)> {
    let mut vars = Vec::new();
    let mut inits = Vec::new();
    for binding in parts(heap, form, bindings)? {
        match heap.list_to_vec(binding).as_deref() {
            Some([var, init]) if heap.is_symbol(*var) => {
                vars.push(*var);
                inits.push(*init);
            }
            _ => return Err(syntax(form, "bindings must look like (variable init)", bindings)),
        }
    }
    Ok((vars, inits))
}

fn body_after(heap: &Heap, form: &'static str, operands: Value, n: usize) -> evaluator::Result {
    let body = tail_after(heap, operands, n);
    match heap.is_pair(body) {
        true => Ok(body),
        false => Err(syntax(form, "expects a body", operands)),
    }
}

const LET: PrimitiveFn = PrimitiveFn {
    name: "let",
    fn_ptr: NativeFn::Value(let_),
    arity: Arity::exactly(1),
};

fn let_(interp: &mut Interpreter, args: &[Value]) -> evaluator::Result {
    let heap = &mut interp.heap;
    let operands = args[0];
    let ops = parts(heap, "let", operands)?;
    let first = *ops
        .first()
        .ok_or_else(|| syntax("let", "expects bindings and a body", operands))?;

    if heap.is_symbol(first) {
        // (let name ((v i) ...) body...) =>
        //   ((letrec ((name (named-lambda (name v ...) body...))) name) i ...)
        let bindings = ops
            .get(1)
            .copied()
            .ok_or_else(|| syntax("let", "named let expects bindings", operands))?;
        let (vars, inits) = bindings_of(heap, "let", bindings)?;
        let body = body_after(heap, "let", operands, 2)?;
        let formals = heap.list(&vars);
        let signature = heap.cons(first, formals);
        let named_lambda = heap.intern("named-lambda");
        let procedure = heap.list_with_tail(&[named_lambda, signature], body);
        let binding = heap.list(&[first, procedure]);
        let binding_list = heap.list(&[binding]);
        let letrec = heap.intern("letrec");
        let letrec_form = heap.list(&[letrec, binding_list, first]);
        let actuals = heap.list(&inits);
        return Ok(heap.cons(letrec_form, actuals));
    }

    // (let ((v i) ...) body...) => ((lambda (v ...) body...) i ...)
    let (vars, inits) = bindings_of(heap, "let", first)?;
    let body = body_after(heap, "let", operands, 1)?;
    let lambda = heap.intern("lambda");
    let formals = heap.list(&vars);
    let procedure = heap.list_with_tail(&[lambda, formals], body);
    let actuals = heap.list(&inits);
    Ok(heap.cons(procedure, actuals))
}

const LET_STAR: PrimitiveFn = PrimitiveFn {
    name: "let*",
    fn_ptr: NativeFn::Value(let_star),
    arity: Arity::exactly(1),
};

fn let_star(interp: &mut Interpreter, args: &[Value]) -> evaluator::Result {
    let heap = &mut interp.heap;
    let operands = args[0];
    let bindings = heap
        .car(operands)
        .ok_or_else(|| syntax("let*", "expects bindings and a body", operands))?;
    let all = parts(heap, "let*", bindings)?;
    let body = body_after(heap, "let*", operands, 1)?;
    let let_ = heap.intern("let");
    match all.split_first() {
        None => Ok(heap.list_with_tail(&[let_, Value::Null], body)),
        Some((first, rest)) => {
            let let_star = heap.intern("let*");
            let rest = heap.list(rest);
            let inner = heap.list_with_tail(&[let_star, rest], body);
            let outer_bindings = heap.list(&[*first]);
            Ok(heap.list(&[let_, outer_bindings, inner]))
        }
    }
}

const LETREC: PrimitiveFn = PrimitiveFn {
    name: "letrec",
    fn_ptr: NativeFn::Value(letrec),
    arity: Arity::exactly(1),
};

const LETREC_STAR: PrimitiveFn = PrimitiveFn {
    name: "letrec*",
    fn_ptr: NativeFn::Value(letrec),
    arity: Arity::exactly(1),
};

/// `(letrec ((v i) ...) body...)` => `(let () (define v i) ... body...)`.
/// Both `letrec` and `letrec*` initialise left to right.
fn letrec(interp: &mut Interpreter, args: &[Value]) -> evaluator::Result {
    let heap = &mut interp.heap;
    let operands = args[0];
    let bindings = heap
        .car(operands)
        .ok_or_else(|| syntax("letrec", "expects bindings and a body", operands))?;
    let (vars, inits) = bindings_of(heap, "letrec", bindings)?;
    let body = body_after(heap, "letrec", operands, 1)?;
    let define = heap.intern("define");
    let mut forms = vec![heap.intern("let"), Value::Null];
    for (var, init) in vars.into_iter().zip(inits) {
        forms.push(heap.list(&[define, var, init]));
    }
    Ok(heap.list_with_tail(&forms, body))
}

const AND: PrimitiveFn = PrimitiveFn {
    name: "and",
    fn_ptr: NativeFn::Value(and),
    arity: Arity::exactly(1),
};

/// `(and a b ...)` => `(if a (and b ...) #f)`.
fn and(interp: &mut Interpreter, args: &[Value]) -> evaluator::Result {
    let heap = &mut interp.heap;
    let ops = parts(heap, "and", args[0])?;
    match ops.as_slice() {
        [] => Ok(Value::Bool(true)),
        [only] => Ok(*only),
        [first, ..] => {
            let if_ = heap.intern("if");
            let and = heap.intern("and");
            let rest = heap.cons(and, tail_after(heap, args[0], 1));
            Ok(heap.list(&[if_, *first, rest, Value::Bool(false)]))
        }
    }
}

const OR: PrimitiveFn = PrimitiveFn {
    name: "or",
    fn_ptr: NativeFn::Value(or),
    arity: Arity::exactly(1),
};

/// `(or a b ...)` => `(let ((%or-value a)) (if %or-value %or-value (or b ...)))`.
fn or(interp: &mut Interpreter, args: &[Value]) -> evaluator::Result {
    let heap = &mut interp.heap;
    let ops = parts(heap, "or", args[0])?;
    match ops.as_slice() {
        [] => Ok(Value::Bool(false)),
        [only] => Ok(*only),
        [first, ..] => {
            let temp = heap.intern("%or-value");
            let or = heap.intern("or");
            let rest = heap.cons(or, tail_after(heap, args[0], 1));
            let if_ = heap.intern("if");
            let test = heap.list(&[if_, temp, temp, rest]);
            let binding = heap.list(&[temp, *first]);
            let bindings = heap.list(&[binding]);
            let let_ = heap.intern("let");
            Ok(heap.list(&[let_, bindings, test]))
        }
    }
}

const WHEN: PrimitiveFn = PrimitiveFn {
    name: "when",
    fn_ptr: NativeFn::Value(when),
    arity: Arity::exactly(1),
};

fn when(interp: &mut Interpreter, args: &[Value]) -> evaluator::Result {
    let heap = &mut interp.heap;
    let test = heap
        .car(args[0])
        .ok_or_else(|| syntax("when", "expects a test", args[0]))?;
    let body = tail_after(heap, args[0], 1);
    let begin = heap.intern("begin");
    let consequent = heap.cons(begin, body);
    let if_ = heap.intern("if");
    Ok(heap.list(&[if_, test, consequent]))
}

const UNLESS: PrimitiveFn = PrimitiveFn {
    name: "unless",
    fn_ptr: NativeFn::Value(unless),
    arity: Arity::exactly(1),
};

fn unless(interp: &mut Interpreter, args: &[Value]) -> evaluator::Result {
    let heap = &mut interp.heap;
    let test = heap
        .car(args[0])
        .ok_or_else(|| syntax("unless", "expects a test", args[0]))?;
    let body = tail_after(heap, args[0], 1);
    let begin = heap.intern("begin");
    let alternative = heap.cons(begin, body);
    let nothing = heap.list(&[begin]);
    let if_ = heap.intern("if");
    Ok(heap.list(&[if_, test, nothing, alternative]))
}

const COND: PrimitiveFn = PrimitiveFn {
    name: "cond",
    fn_ptr: NativeFn::Value(cond),
    arity: Arity::exactly(1),
};

/// Expands the first clause; the rest stay as a smaller `cond`.
fn cond(interp: &mut Interpreter, args: &[Value]) -> evaluator::Result {
    let heap = &mut interp.heap;
    let operands = args[0];
    let clauses = parts(heap, "cond", operands)?;
    let if_ = heap.intern("if");
    let (clause, rest) = match clauses.split_first() {
        None => return Ok(heap.list(&[if_, Value::Bool(false), Value::Bool(false)])),
        Some((clause, rest)) => (*clause, rest),
    };
    let clause_parts = match heap.list_to_vec(clause) {
        Some(p) if !p.is_empty() => p,
        _ => return Err(syntax("cond", "clauses must be non-empty lists", operands)),
    };
    let test = clause_parts[0];
    let body = tail_after(heap, clause, 1);
    let begin = heap.intern("begin");

    if is_named(heap, test, "else") {
        if !rest.is_empty() {
            return Err(syntax("cond", "else clause must come last", operands));
        }
        return Ok(heap.cons(begin, body));
    }

    let otherwise = match rest.is_empty() {
        true => None,
        false => {
            let cond = heap.intern("cond");
            let remaining = tail_after(heap, operands, 1);
            Some(heap.cons(cond, remaining))
        }
    };
    match clause_parts.as_slice() {
        [test] => {
            let or = heap.intern("or");
            Ok(match otherwise {
                Some(otherwise) => heap.list(&[or, *test, otherwise]),
                None => *test,
            })
        }
        [test, arrow, receiver] if is_named(heap, *arrow, "=>") => {
            let temp = heap.intern("%cond-value");
            let call = heap.list(&[*receiver, temp]);
            let branch = match otherwise {
                Some(otherwise) => heap.list(&[if_, temp, call, otherwise]),
                None => heap.list(&[if_, temp, call]),
            };
            let binding = heap.list(&[temp, *test]);
            let bindings = heap.list(&[binding]);
            let let_ = heap.intern("let");
            Ok(heap.list(&[let_, bindings, branch]))
        }
        [_, arrow, ..] if is_named(heap, *arrow, "=>") => {
            Err(syntax("cond", "=> takes exactly one receiver", operands))
        }
        _ => {
            let consequent = heap.cons(begin, body);
            Ok(match otherwise {
                Some(otherwise) => heap.list(&[if_, test, consequent, otherwise]),
                None => heap.list(&[if_, test, consequent]),
            })
        }
    }
}

const CASE: PrimitiveFn = PrimitiveFn {
    name: "case",
    fn_ptr: NativeFn::Value(case),
    arity: Arity::exactly(1),
};

/// `(case key ((d ...) body...) ... (else body...))` =>
/// `(let ((%case-key key)) (cond ((memv %case-key '(d ...)) body...) ...))`.
fn case(interp: &mut Interpreter, args: &[Value]) -> evaluator::Result {
    let heap = &mut interp.heap;
    let operands = args[0];
    let ops = parts(heap, "case", operands)?;
    let (key, clauses) = match ops.split_first() {
        Some((key, clauses)) => (*key, clauses.to_vec()),
        None => return Err(syntax("case", "expects a key", operands)),
    };
    let temp = heap.intern("%case-key");
    let memv = heap.intern("memv");
    let quote = heap.intern("quote");
    let mut cond_clauses = Vec::with_capacity(clauses.len());
    for clause in clauses {
        let (data, body) = match heap.pair(clause) {
            Some(p) if heap.is_pair(p.cdr) => (p.car, p.cdr),
            _ => return Err(syntax("case", "clauses need data and a body", operands)),
        };
        if is_named(heap, data, "else") {
            cond_clauses.push(clause);
            continue;
        }
        if heap.list_length(data).is_none() {
            return Err(syntax("case", "clause data must be a list", operands));
        }
        let quoted = heap.list(&[quote, data]);
        let test = heap.list(&[memv, temp, quoted]);
        cond_clauses.push(heap.cons(test, body));
    }
    let cond = heap.intern("cond");
    let cond_clauses = heap.list(&cond_clauses);
    let dispatch = heap.cons(cond, cond_clauses);
    let binding = heap.list(&[temp, key]);
    let bindings = heap.list(&[binding]);
    let let_ = heap.intern("let");
    Ok(heap.list(&[let_, bindings, dispatch]))
}

const DO: PrimitiveFn = PrimitiveFn {
    name: "do",
    fn_ptr: NativeFn::Value(do_),
    arity: Arity::exactly(1),
};

/// `(do ((var init step) ...) (test result...) command...)` =>
/// `(let %do-loop ((var init) ...)
///    (if test (begin result...) (begin command... (%do-loop step ...))))`
fn do_(interp: &mut Interpreter, args: &[Value]) -> evaluator::Result {
    let heap = &mut interp.heap;
    let operands = args[0];
    let ops = parts(heap, "do", operands)?;
    if ops.len() < 2 {
        return Err(syntax("do", "expects variable specs and a test clause", operands));
    }
    let mut bindings = Vec::new();
    let mut steps = Vec::new();
    for spec in parts(heap, "do", ops[0])? {
        match heap.list_to_vec(spec).as_deref() {
            Some([var, init]) if heap.is_symbol(*var) => {
                bindings.push(heap.list(&[*var, *init]));
                steps.push(*var);
            }
            Some([var, init, step]) if heap.is_symbol(*var) => {
                bindings.push(heap.list(&[*var, *init]));
                steps.push(*step);
            }
            _ => return Err(syntax("do", "variable specs look like (var init [step])", operands)),
        }
    }
    let (test, results) = match heap.pair(ops[1]) {
        Some(p) => (p.car, p.cdr),
        None => return Err(syntax("do", "expects a (test result...) clause", operands)),
    };
    let commands = tail_after(heap, operands, 2);
    let loop_name = heap.intern("%do-loop");
    let begin = heap.intern("begin");

    let steps = heap.list(&steps);
    let recur = heap.cons(loop_name, steps);
    let mut body_forms = vec![begin];
    body_forms.extend(heap.list_to_vec(commands).unwrap_or_default());
    body_forms.push(recur);
    let again = heap.list(&body_forms);
    let finish = heap.cons(begin, results);
    let if_ = heap.intern("if");
    let body = heap.list(&[if_, test, finish, again]);
    let bindings = heap.list(&bindings);
    let let_ = heap.intern("let");
    Ok(heap.list(&[let_, loop_name, bindings, body]))
}

const ASSERT: PrimitiveFn = PrimitiveFn {
    name: "assert",
    fn_ptr: NativeFn::Value(assert),
    arity: Arity::exactly(1),
};

/// `(assert e)` => `(if e #t (error "assertion failed:" 'e))`.
fn assert(interp: &mut Interpreter, args: &[Value]) -> evaluator::Result {
    let heap = &mut interp.heap;
    let ops = parts(heap, "assert", args[0])?;
    let assertion = match ops.as_slice() {
        [e] => *e,
        _ => return Err(syntax("assert", "expects one expression", args[0])),
    };
    let quote = heap.intern("quote");
    let quoted = heap.list(&[quote, assertion]);
    let message = heap.string_from("assertion failed:".to_string());
    let error = heap.intern("error");
    let failure = heap.list(&[error, message, quoted]);
    let if_ = heap.intern("if");
    Ok(heap.list(&[if_, assertion, Value::Bool(true), failure]))
}

const CASE_LAMBDA: PrimitiveFn = PrimitiveFn {
    name: "case-lambda",
    fn_ptr: NativeFn::Value(case_lambda),
    arity: Arity::exactly(1),
};

/// `(case-lambda (formals body...) ...)` => a variadic lambda dispatching on
/// argument count with `%formals-accept?`, then `apply`ing the first clause
/// that fits.
fn case_lambda(interp: &mut Interpreter, args: &[Value]) -> evaluator::Result {
    let heap = &mut interp.heap;
    let operands = args[0];
    let clauses = parts(heap, "case-lambda", operands)?;
    let arguments = heap.intern("%case-lambda-args");
    let accepts = heap.intern("%formals-accept?");
    let length = heap.intern("length");
    let apply = heap.intern("apply");
    let lambda = heap.intern("lambda");
    let quote = heap.intern("quote");
    let count = heap.list(&[length, arguments]);

    let mut cond_clauses = Vec::with_capacity(clauses.len() + 1);
    for clause in clauses {
        let (formals, body) = match heap.pair(clause) {
            Some(p) if heap.is_pair(p.cdr) => (p.car, p.cdr),
            _ => return Err(syntax("case-lambda", "clauses need formals and a body", operands)),
        };
        let quoted = heap.list(&[quote, formals]);
        let test = heap.list(&[accepts, quoted, count]);
        let procedure = heap.list_with_tail(&[lambda, formals], body);
        let call = heap.list(&[apply, procedure, arguments]);
        cond_clauses.push(heap.list(&[test, call]));
    }
    let else_ = heap.intern("else");
    let error = heap.intern("error");
    let message = heap.string_from("case-lambda: no clause accepts".to_string());
    let failure = heap.list(&[error, message, arguments]);
    cond_clauses.push(heap.list(&[else_, failure]));

    let cond = heap.intern("cond");
    let cond_clauses = heap.list(&cond_clauses);
    let dispatch = heap.cons(cond, cond_clauses);
    Ok(heap.list(&[lambda, arguments, dispatch]))
}

const DEFINE_MACRO: PrimitiveFn = PrimitiveFn {
    name: "define-macro",
    fn_ptr: NativeFn::Value(define_macro),
    arity: Arity::exactly(1),
};

/// `(define-macro (name . formals) body...)` =>
/// `(define name (macro (lambda (%operands) (apply (named-lambda (name . formals) body...) %operands))))`
/// and `(define-macro name transformer)` => `(define name (macro transformer))`.
fn define_macro(interp: &mut Interpreter, args: &[Value]) -> evaluator::Result {
    let heap = &mut interp.heap;
    let operands = args[0];
    let (target, rest) = match heap.pair(operands) {
        Some(p) => (p.car, p.cdr),
        None => return Err(syntax("define-macro", "expects a name", operands)),
    };
    let define = heap.intern("define");
    let macro_ = heap.intern("macro");

    if heap.is_symbol(target) {
        let transformer = match heap.list_to_vec(rest).as_deref() {
            Some([transformer]) => *transformer,
            _ => return Err(syntax("define-macro", "expects one transformer", operands)),
        };
        let wrapped = heap.list(&[macro_, transformer]);
        return Ok(heap.list(&[define, target, wrapped]));
    }

    let name = match heap.car(target) {
        Some(name) if heap.is_symbol(name) => name,
        _ => return Err(syntax("define-macro", "signature must start with a name", operands)),
    };
    if !heap.is_pair(rest) {
        return Err(syntax("define-macro", "expects a body", operands));
    }
    let named_lambda = heap.intern("named-lambda");
    let expander = heap.list_with_tail(&[named_lambda, target], rest);
    let operands_name = heap.intern("%operands");
    let apply = heap.intern("apply");
    let call = heap.list(&[apply, expander, operands_name]);
    let lambda = heap.intern("lambda");
    let formals = heap.list(&[operands_name]);
    let transformer = heap.list(&[lambda, formals, call]);
    let wrapped = heap.list(&[macro_, transformer]);
    Ok(heap.list(&[define, name, wrapped]))
}

const FORMALS_ACCEPT: PrimitiveFn = PrimitiveFn {
    name: "%formals-accept?",
    fn_ptr: NativeFn::Value(formals_accept),
    arity: Arity::exactly(2),
};

/// Would a lambda list `formals` take `n` arguments?
fn formals_accept(interp: &mut Interpreter, args: &[Value]) -> evaluator::Result {
    let n = match args[1] {
        Value::Number(crate::number::Number::Int(n)) if n >= 0 => n as usize,
        got => {
            return Err(evaluator::Error::WrongType {
                expected: "non-negative integer",
                got,
            }
            .into())
        }
    };
    let mut fixed = 0;
    let mut current = args[0];
    while let Some(p) = interp.heap.pair(current) {
        fixed += 1;
        current = p.cdr;
    }
    Ok(Value::Bool(match current.is_null() {
        true => n == fixed,
        false => n >= fixed,
    }))
}

/// Bind every derived form, wrapped as a macro, in the global environment.
pub(crate) fn install(interp: &mut Interpreter) {
    for form in [
        LET,
        LET_STAR,
        LETREC,
        LETREC_STAR,
        AND,
        OR,
        WHEN,
        UNLESS,
        COND,
        CASE,
        DO,
        ASSERT,
        CASE_LAMBDA,
        DEFINE_MACRO,
    ]
    .iter()
    {
        let transformer = interp.primitive(form);
        let wrapped = interp.heap.alloc(Object::Macro(Macro { transformer }));
        interp.define_global(form.name, wrapped.into());
    }
    let accepts = interp.primitive(&FORMALS_ACCEPT);
    interp.define_global(FORMALS_ACCEPT.name, accepts);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::{pr_str, PrintMode};
    use crate::reader::read_str;

    fn expand_once(source: &str) -> String {
        let mut interp = Interpreter::new();
        let form = read_str(&mut interp.heap, source).unwrap();
        let operands = interp.heap.cdr(form).unwrap();
        let name = interp.heap.car(form).unwrap();
        let transformer = match interp.lookup_global(interp.heap.symbol_name(name).unwrap()) {
            Some(Value::Object(r)) => match interp.heap.get(r) {
                Some(Object::Macro(m)) => m.transformer,
                _ => panic!("not a macro"),
            },
            _ => panic!("unbound"),
        };
        let expansion = interp.apply_procedure(transformer, &[operands]).ok().unwrap();
        pr_str(&mut interp.heap, expansion, PrintMode::ReadableRepresentation)
    }

    #[test]
    fn let_becomes_a_lambda_application() {
        assert_eq!(
            expand_once("(let ((x 1) (y 2)) (+ x y))"),
            "((lambda (x y) (+ x y)) 1 2)"
        );
        assert_eq!(
            expand_once("(let loop ((i 0)) (loop i))"),
            "((letrec ((loop (named-lambda (loop i) (loop i)))) loop) 0)"
        );
    }

    #[test]
    fn let_star_nests() {
        assert_eq!(
            expand_once("(let* ((a 1) (b a)) b)"),
            "(let ((a 1)) (let* ((b a)) b))"
        );
        assert_eq!(expand_once("(let* () 1)"), "(let () 1)");
    }

    #[test]
    fn letrec_defines_in_a_fresh_scope() {
        assert_eq!(
            expand_once("(letrec ((f g) (g 1)) (f))"),
            "(let () (define f g) (define g 1) (f))"
        );
    }

    #[test]
    fn and_or_peel_one_operand() {
        assert_eq!(expand_once("(and)"), "#t");
        assert_eq!(expand_once("(and a b c)"), "(if a (and b c) #f)");
        assert_eq!(expand_once("(or a)"), "a");
        assert_eq!(
            expand_once("(or a b)"),
            "(let ((%or-value a)) (if %or-value %or-value (or b)))"
        );
    }

    #[test]
    fn cond_clauses() {
        assert_eq!(
            expand_once("(cond (a 1) (else 2))"),
            "(if a (begin 1) (cond (else 2)))"
        );
        assert_eq!(expand_once("(cond (else 2))"), "(begin 2)");
        assert_eq!(
            expand_once("(cond (a => f))"),
            "(let ((%cond-value a)) (if %cond-value (f %cond-value)))"
        );
    }

    #[test]
    fn case_uses_memv() {
        assert_eq!(
            expand_once("(case k ((1 2) 'low) (else 'high))"),
            "(let ((%case-key k)) (cond ((memv %case-key (quote (1 2))) (quote low)) (else (quote high))))"
        );
    }

    #[test]
    fn do_loops_through_a_named_let() {
        assert_eq!(
            expand_once("(do ((i 0 (+ i 1))) ((= i 3) i) (display i))"),
            "(let %do-loop ((i 0)) (if (= i 3) (begin i) (begin (display i) (%do-loop (+ i 1)))))"
        );
    }

    #[test]
    fn malformed_forms_are_syntax_errors() {
        let mut interp = Interpreter::new();
        for source in &["(let ((x)) x)", "(let ((x 1)))", "(cond (else 1) (a 2))", "(do ((i 0)))"] {
            let err = interp.eval_str(source).unwrap_err();
            assert!(
                matches!(err, evaluator::Error::Syntax { .. }),
                "{} gave {}",
                source,
                err
            );
        }
    }
}
