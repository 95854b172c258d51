use crate::continuation::Activation;
use crate::heap::Heap;
use crate::interpreter::Interpreter;
use crate::printer::{pr_str, PrintMode};
use crate::reader;
use crate::types::{ApplyOutcome, Arity, BadArgCount, Compound, Object, ObjRef, PrimitiveFn, Value};

use derive_more::From;
use std::fmt;
use std::ops::Range;

pub type Result<T = Value> = std::result::Result<T, Unwind>;

#[derive(Debug)]
pub enum Error {
    Syntax {
        form: &'static str,
        message: &'static str,
        expr: Value,
    },
    UnboundVariable(Value),
    WrongType {
        expected: &'static str,
        got: Value,
    },
    BadArgCount(BadArgCount),
    BadIndex(i64, Range<usize>),
    NotApplicable(Value),
    UnknownExpression(Value),
    DivideByZero,
    User {
        message: String,
        irritants: Vec<Value>,
    },
    /// `(raise obj)`: `try` hands `obj` itself to the handler.
    Raise(Value),
    ContinuationExpired,
    ContinuationUnsupported,
    /// Nested evaluations went deeper than `Config::max_depth`.
    RecursionLimit(usize),
    Read(reader::Error),
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Syntax { form, message, .. } => write!(f, "bad syntax in {}: {}", form, message),
            Error::UnboundVariable(_) => write!(f, "unbound variable"),
            Error::WrongType { expected, .. } => {
                write!(f, "wrong type argument: expected {}", expected)
            }
            Error::BadArgCount(e) => write!(f, "{}", e),
            Error::BadIndex(i, r) => {
                write!(f, "bad index: {} not in range [{}, {})", i, r.start, r.end)
            }
            Error::NotApplicable(_) => write!(f, "not applicable"),
            Error::UnknownExpression(_) => write!(f, "unknown expression type"),
            Error::DivideByZero => write!(f, "division by zero"),
            Error::User { message, .. } => write!(f, "{}", message),
            Error::Raise(_) => write!(f, "uncaught raise"),
            Error::ContinuationExpired => {
                write!(f, "continuation invoked outside the extent of its capture")
            }
            Error::ContinuationUnsupported => {
                write!(f, "continuation cannot be resumed through a host procedure call")
            }
            Error::RecursionLimit(max) => {
                write!(f, "recursion depth limit exceeded (max: {})", max)
            }
            Error::Read(e) => write!(f, "read error: {}", e),
            Error::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl From<reader::Error> for Error {
    fn from(e: reader::Error) -> Self {
        Self::Read(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// A pending continuation invocation travelling back to the top level.
#[derive(Debug)]
pub struct Escape {
    pub(crate) continuation: ObjRef,
    pub(crate) value: Value,
}

/// Everything that leaves an evaluation early. Only errors are catchable.
#[derive(Debug, From)]
pub enum Unwind {
    Error(Error),
    Escape(Escape),
}

pub(crate) fn syntax(form: &'static str, message: &'static str, expr: Value) -> Unwind {
    Error::Syntax {
        form,
        message,
        expr,
    }
    .into()
}

/// One trampoline transition.
pub(crate) enum Step {
    Value(Value),
    Eval(Value, ObjRef),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Form {
    Quote,
    Quasiquote,
    If,
    Lambda,
    NamedLambda,
    Define,
    Set,
    Begin,
    Try,
}

/// The symbols the trampoline dispatches on, interned once.
pub(crate) struct Keywords {
    pub quote: ObjRef,
    pub quasiquote: ObjRef,
    pub unquote: ObjRef,
    pub unquote_splicing: ObjRef,
    pub if_: ObjRef,
    pub lambda: ObjRef,
    pub named_lambda: ObjRef,
    pub define: ObjRef,
    pub set: ObjRef,
    pub begin: ObjRef,
    pub try_: ObjRef,
    pub catch: ObjRef,
}

impl Keywords {
    pub(crate) fn intern(heap: &mut Heap) -> Self {
        Keywords {
            quote: heap.intern_symbol("quote"),
            quasiquote: heap.intern_symbol("quasiquote"),
            unquote: heap.intern_symbol("unquote"),
            unquote_splicing: heap.intern_symbol("unquote-splicing"),
            if_: heap.intern_symbol("if"),
            lambda: heap.intern_symbol("lambda"),
            named_lambda: heap.intern_symbol("named-lambda"),
            define: heap.intern_symbol("define"),
            set: heap.intern_symbol("set!"),
            begin: heap.intern_symbol("begin"),
            try_: heap.intern_symbol("try"),
            catch: heap.intern_symbol("catch"),
        }
    }

    fn form_of(&self, symbol: ObjRef) -> Option<Form> {
        [
            (self.quote, Form::Quote),
            (self.quasiquote, Form::Quasiquote),
            (self.if_, Form::If),
            (self.lambda, Form::Lambda),
            (self.named_lambda, Form::NamedLambda),
            (self.define, Form::Define),
            (self.set, Form::Set),
            (self.begin, Form::Begin),
            (self.try_, Form::Try),
        ]
        .iter()
        .find(|(keyword, _)| *keyword == symbol)
        .map(|(_, form)| *form)
    }
}

impl Interpreter {
    /// Evaluate `expr` in `env` as one top-level evaluation. Continuation
    /// escapes are replayed inside it; only errors leave.
    pub fn eval_in(&mut self, expr: Value, env: ObjRef) -> std::result::Result<Value, Error> {
        match self.eval_nested(None, expr, env) {
            Ok(v) => Ok(v),
            Err(Unwind::Error(e)) => Err(e),
            Err(Unwind::Escape(_)) => Err(Error::ContinuationUnsupported),
        }
    }

    /// Run `expr` to a value under a new activation. `origin` is the
    /// subexpression of the current activation being evaluated, if any.
    ///
    /// An activation started from host code is the top of its own
    /// trampoline: an escape to a continuation captured inside it is
    /// replayed here instead of unwinding through the host caller.
    pub(crate) fn eval_nested(&mut self, origin: Option<Value>, expr: Value, env: ObjRef) -> Result {
        let depth = self.frames.len();
        if depth >= self.config.max_depth {
            return Err(Error::RecursionLimit(self.config.max_depth).into());
        }
        let scratch = self.scratch.len();
        self.next_activation += 1;
        let id = self.next_activation;
        self.frames.push(Activation {
            id,
            origin,
            expr,
            env,
        });
        let mut result = self.run(expr, env);
        while let Err(Unwind::Escape(escape)) = result {
            if origin.is_some() || !self.captured_under(&escape, id) {
                result = Err(escape.into());
                break;
            }
            self.frames.truncate(depth + 1);
            self.scratch.truncate(scratch);
            result = match self.replay(escape, id) {
                Ok((next, next_env)) => {
                    if let Some(top) = self.frames.last_mut() {
                        top.expr = next;
                        top.env = next_env;
                    }
                    self.run(next, next_env)
                }
                Err(unwind) => Err(unwind),
            };
        }
        self.frames.truncate(depth);
        self.scratch.truncate(scratch);
        result
    }

    /// The trampoline. Tail positions replace the top activation's
    /// expression instead of nesting.
    fn run(&mut self, mut expr: Value, mut env: ObjRef) -> Result {
        loop {
            if log::log_enabled!(log::Level::Trace) {
                let text = self.show(expr);
                log::trace!("eval {}", text);
            }
            match self.step(expr, env)? {
                Step::Value(v) => return Ok(v),
                Step::Eval(next, next_env) => {
                    expr = next;
                    env = next_env;
                    if let Some(top) = self.frames.last_mut() {
                        top.expr = expr;
                        top.env = env;
                    }
                    self.tick();
                }
            }
        }
    }

    fn step(&mut self, expr: Value, env: ObjRef) -> Result<Step> {
        let r = match expr {
            Value::Object(r) => r,
            Value::Null => return Err(Error::UnknownExpression(expr).into()),
            _ => return Ok(Step::Value(expr)),
        };
        let (head, operands) = match self.heap.get(r) {
            Some(Object::Symbol(_)) => return Ok(Step::Value(self.heap.lookup(env, r)?)),
            Some(Object::Pair(p)) => (p.car, p.cdr),
            Some(_) => return Ok(Step::Value(expr)),
            None => return Err(Error::UnknownExpression(expr).into()),
        };
        if let Some(form) = head.as_object().and_then(|h| self.keywords.form_of(h)) {
            return self.special_form(form, expr, operands, env);
        }
        self.application(head, operands, env)
    }

    /// Evaluate a subexpression of the current activation's expression.
    pub(crate) fn eval_operand(&mut self, expr: Value, env: ObjRef) -> Result {
        if self.heap.is_pair(expr) {
            return self.eval_nested(Some(expr), expr, env);
        }
        match self.step(expr, env)? {
            Step::Value(v) => Ok(v),
            Step::Eval(next, next_env) => self.eval_nested(None, next, next_env),
        }
    }

    fn operand_list(&self, form: &'static str, expr: Value, operands: Value) -> Result<Vec<Value>> {
        self.heap
            .list_to_vec(operands)
            .ok_or_else(|| syntax(form, "improper operand list", expr))
    }

    fn special_form(&mut self, form: Form, expr: Value, operands: Value, env: ObjRef) -> Result<Step> {
        match form {
            Form::Quote => {
                let ops = self.operand_list("quote", expr, operands)?;
                match ops.as_slice() {
                    [datum] => Ok(Step::Value(*datum)),
                    _ => Err(syntax("quote", "expects exactly one operand", expr)),
                }
            }
            Form::Quasiquote => {
                let ops = self.operand_list("quasiquote", expr, operands)?;
                match ops.as_slice() {
                    [template] => self.quasiquote(*template, env, 1).map(Step::Value),
                    _ => Err(syntax("quasiquote", "expects exactly one operand", expr)),
                }
            }
            Form::If => {
                let ops = self.operand_list("if", expr, operands)?;
                if !(2..=3).contains(&ops.len()) {
                    return Err(syntax("if", "expects a test, a consequent and an optional alternative", expr));
                }
                let test = self.eval_operand(ops[0], env)?;
                match (test.is_true(), ops.get(2)) {
                    (true, _) => Ok(Step::Eval(ops[1], env)),
                    (false, Some(alternative)) => Ok(Step::Eval(*alternative, env)),
                    (false, None) => Ok(Step::Value(Value::Unspecified)),
                }
            }
            Form::Lambda => {
                let (formals, body) = match self.heap.pair(operands) {
                    Some(p) if self.heap.is_pair(p.cdr) => (p.car, p.cdr),
                    _ => return Err(syntax("lambda", "expects formals and a body", expr)),
                };
                self.make_compound("lambda", None, formals, body, env, expr)
                    .map(Step::Value)
            }
            Form::NamedLambda => {
                let (signature, body) = match self.heap.pair(operands) {
                    Some(p) if self.heap.is_pair(p.cdr) => (p.car, p.cdr),
                    _ => return Err(syntax("named-lambda", "expects a signature and a body", expr)),
                };
                let (name, formals) = match self.heap.pair(signature) {
                    Some(p) if self.heap.is_symbol(p.car) => (p.car, p.cdr),
                    _ => return Err(syntax("named-lambda", "signature must start with a name", expr)),
                };
                self.make_compound("named-lambda", name.as_object(), formals, body, env, expr)
                    .map(Step::Value)
            }
            Form::Define => self.define_form(expr, operands, env),
            Form::Set => {
                let ops = self.operand_list("set!", expr, operands)?;
                let (target, value_expr) = match ops.as_slice() {
                    [target, value_expr] if self.heap.is_symbol(*target) => (*target, *value_expr),
                    _ => return Err(syntax("set!", "expects a variable and a value", expr)),
                };
                let value = self.eval_operand(value_expr, env)?;
                let symbol = target.as_object().ok_or(Error::WrongType {
                    expected: "symbol",
                    got: target,
                })?;
                self.heap.assign(env, symbol, value)?;
                Ok(Step::Value(Value::Unspecified))
            }
            Form::Begin => {
                let ops = self.operand_list("begin", expr, operands)?;
                match ops.split_last() {
                    None => Ok(Step::Value(Value::Unspecified)),
                    Some((last, init)) => {
                        for e in init {
                            self.eval_operand(*e, env)?;
                        }
                        Ok(Step::Eval(*last, env))
                    }
                }
            }
            Form::Try => self.try_form(expr, operands, env),
        }
    }

    fn check_formals(&self, form: &'static str, formals: Value, expr: Value) -> Result<()> {
        let (parameters, rest) = self
            .heap
            .list_parts(formals)
            .ok_or_else(|| syntax(form, "cyclic parameter list", expr))?;
        let symbols = parameters.iter().all(|p| self.heap.is_symbol(*p));
        match symbols && (rest.is_null() || self.heap.is_symbol(rest)) {
            true => Ok(()),
            false => Err(syntax(form, "parameters must be symbols", expr)),
        }
    }

    fn make_compound(
        &mut self,
        form: &'static str,
        name: Option<ObjRef>,
        parameters: Value,
        body: Value,
        env: ObjRef,
        expr: Value,
    ) -> Result {
        self.check_formals(form, parameters, expr)?;
        if self.heap.list_length(body).is_none() {
            return Err(syntax(form, "improper body", expr));
        }
        let body = self.heap.cons(self.keywords.begin.into(), body);
        let r = self.heap.alloc(Object::Compound(Compound {
            name,
            parameters,
            body,
            env,
        }));
        Ok(Value::Object(r))
    }

    fn define_form(&mut self, expr: Value, operands: Value, env: ObjRef) -> Result<Step> {
        let (target, rest) = match self.heap.pair(operands) {
            Some(p) => (p.car, p.cdr),
            None => return Err(syntax("define", "expects a target", expr)),
        };
        if let Some(signature) = self.heap.pair(target).copied() {
            if !self.heap.is_pair(rest) {
                return Err(syntax("define", "procedure definition needs a body", expr));
            }
            // (define (name . formals) body...) and the curried
            // (define ((name . outer) . inner) body...)
            let define = Value::Object(self.keywords.define);
            let rewritten = match self.heap.is_symbol(signature.car) {
                true => {
                    let named_lambda = Value::Object(self.keywords.named_lambda);
                    let lambda = self.heap.list_with_tail(&[named_lambda, target], rest);
                    self.heap.list(&[define, signature.car, lambda])
                }
                false => {
                    let keyword = Value::Object(self.keywords.lambda);
                    let lambda = self.heap.list_with_tail(&[keyword, signature.cdr], rest);
                    self.heap.list(&[define, signature.car, lambda])
                }
            };
            return Ok(Step::Eval(rewritten, env));
        }

        let symbol = match target.as_object() {
            Some(r) if self.heap.is_symbol(target) => r,
            _ => return Err(syntax("define", "target must be a symbol or a signature", expr)),
        };
        let ops = self.operand_list("define", expr, rest)?;
        let value = match ops.as_slice() {
            [] => Value::Unspecified,
            [value_expr] => self.eval_operand(*value_expr, env)?,
            _ => return Err(syntax("define", "expects at most one value", expr)),
        };
        if let Some(Object::Compound(c)) = value.as_object().and_then(|r| self.heap.get_mut(r)) {
            if c.name.is_none() {
                c.name = Some(symbol);
            }
        }
        self.heap.define(env, symbol, value);
        log::debug!("define {}", self.heap.symbol_name(target).unwrap_or("?"));
        Ok(Step::Value(target))
    }

    /// `(try body (catch name handler...))`. Errors from `body` bind `name`
    /// in a fresh frame; continuation escapes pass straight through.
    fn try_form(&mut self, expr: Value, operands: Value, env: ObjRef) -> Result<Step> {
        let ops = self.operand_list("try", expr, operands)?;
        let handler = match ops.as_slice() {
            [_] => None,
            [_, clause] => {
                let parts = self.heap.list_to_vec(*clause).unwrap_or_default();
                match parts.as_slice() {
                    [keyword, name, ..]
                        if keyword.as_object() == Some(self.keywords.catch)
                            && self.heap.is_symbol(*name) =>
                    {
                        Some((*name, self.heap.cdr(*clause).and_then(|c| self.heap.cdr(c))))
                    }
                    _ => return Err(syntax("try", "second operand must be (catch name handler...)", expr)),
                }
            }
            _ => return Err(syntax("try", "expects a body and an optional catch clause", expr)),
        };
        let outcome = self.eval_operand(ops[0], env);
        let error = match outcome {
            Ok(v) => return Ok(Step::Value(v)),
            Err(Unwind::Error(e)) => e,
            Err(escape) => return Err(escape),
        };
        let (name, handlers) = match handler {
            Some((name, Some(handlers))) => (name, handlers),
            _ => return Err(error.into()),
        };
        log::debug!("caught: {}", error);
        let condition = self.condition_value(error);
        let formals = self.heap.list(&[name]);
        let handler_env = self.heap.extend(env, formals, &[condition], "catch")?;
        let body = self.heap.cons(self.keywords.begin.into(), handlers);
        Ok(Step::Eval(body, handler_env))
    }

    /// What a `catch` clause sees for `error`.
    fn condition_value(&mut self, error: Error) -> Value {
        match error {
            Error::Raise(obj) => obj,
            other => {
                let text = self.describe(&other);
                self.heap.string_from(text)
            }
        }
    }

    fn application(&mut self, head: Value, operands: Value, env: ObjRef) -> Result<Step> {
        let procedure = self.eval_operand(head, env)?;
        if let Some(Object::Macro(m)) = procedure.as_object().and_then(|r| self.heap.get(r)) {
            let transformer = m.transformer;
            let expansion = self.expand(transformer, operands, env)?;
            return Ok(Step::Eval(expansion, env));
        }

        let mark = self.scratch.len();
        self.scratch.push(procedure);
        let operand_exprs = self
            .heap
            .list_to_vec(operands)
            .ok_or_else(|| syntax("application", "improper argument list", operands))?;
        for operand in operand_exprs {
            let arg = self.eval_operand(operand, env)?;
            self.scratch.push(arg);
        }
        let args = self.scratch.split_off(mark + 1);
        self.scratch.truncate(mark);
        self.apply_tail(procedure, args)
    }

    /// Apply with the result left to the trampoline: compound bodies come back
    /// as `Step::Eval` so they run in tail position.
    pub(crate) fn apply_tail(&mut self, procedure: Value, args: Vec<Value>) -> Result<Step> {
        let mut procedure = procedure;
        let mut args = args;
        loop {
            let r = procedure
                .as_object()
                .ok_or(Error::NotApplicable(procedure))?;
            let outcome = match self.heap.get(r) {
                Some(Object::Primitive(f)) => {
                    let f: &'static PrimitiveFn = *f;
                    let mark = self.scratch.len();
                    self.scratch.push(procedure);
                    self.scratch.extend_from_slice(&args);
                    let outcome = f.call(self, &args);
                    self.scratch.truncate(mark);
                    outcome?
                }
                Some(Object::Compound(c)) => {
                    let c = *c;
                    return self.enter_compound(&c, &args);
                }
                Some(Object::Continuation(_)) => return Err(self.throw_to(r, &args)),
                Some(Object::Type(descriptor)) => {
                    let construct = descriptor.construct;
                    match construct {
                        Some(construct) => ApplyOutcome::Finished(construct(self, &args)?),
                        None => return Err(Error::NotApplicable(procedure).into()),
                    }
                }
                _ => return Err(Error::NotApplicable(procedure).into()),
            };
            match outcome {
                ApplyOutcome::Finished(v) => return Ok(Step::Value(v)),
                ApplyOutcome::EvaluateFurther(expr, env) => return Ok(Step::Eval(expr, env)),
                ApplyOutcome::Apply(next, next_args) => {
                    procedure = next;
                    args = next_args;
                }
            }
        }
    }

    fn enter_compound(&mut self, c: &Compound, args: &[Value]) -> Result<Step> {
        match self.heap.extend(c.env, c.parameters, args, "") {
            Ok(env) => Ok(Step::Eval(c.body, env)),
            Err(Error::BadArgCount(mut e)) => {
                e.name = self.procedure_name(c);
                Err(Error::BadArgCount(e).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn procedure_name(&self, c: &Compound) -> String {
        c.name
            .and_then(|n| self.heap.symbol_name(n.into()))
            .unwrap_or("#[compound-procedure]")
            .to_string()
    }

    /// Apply `procedure` and run it to a value. For host code (primitives,
    /// macro expansion) that needs the result before carrying on.
    pub fn apply_procedure(&mut self, procedure: Value, args: &[Value]) -> Result {
        let mark = self.scratch.len();
        self.scratch.push(procedure);
        self.scratch.extend_from_slice(args);
        let result = match self.apply_tail(procedure, args.to_vec()) {
            Ok(Step::Value(v)) => Ok(v),
            Ok(Step::Eval(expr, env)) => self.eval_nested(None, expr, env),
            Err(unwind) => Err(unwind),
        };
        self.scratch.truncate(mark);
        result
    }

    /// One macro expansion. The transformer always gets the operands; one
    /// declaring two parameters also gets the calling environment, and one
    /// declaring more (or a rest parameter) also its own definition
    /// environment.
    pub(crate) fn expand(&mut self, transformer: Value, operands: Value, env: ObjRef) -> Result {
        let (fixed, variadic, definition_env) =
            match transformer.as_object().and_then(|r| self.heap.get(r)) {
                Some(Object::Compound(c)) => {
                    let (fixed, variadic) = c.declared_arity(&self.heap);
                    (fixed, variadic, c.env)
                }
                Some(Object::Primitive(f)) => {
                    (f.arity.min(), matches!(f.arity, Arity::AtLeast(_)), self.global)
                }
                _ => return Err(Error::NotApplicable(transformer).into()),
            };
        let args = match (fixed, variadic) {
            (0..=1, false) => vec![operands],
            (2, false) => vec![operands, env.into()],
            _ => vec![operands, env.into(), definition_env.into()],
        };
        let expansion = self.apply_procedure(transformer, &args)?;
        if log::log_enabled!(log::Level::Debug) {
            let text = self.show(expansion);
            log::debug!("expanded to {}", text);
        }
        Ok(expansion)
    }

    /// If `head . rest` is `(keyword operand)`, the operand.
    fn form_operand(&self, head: Value, rest: Value, keyword: ObjRef) -> Option<Value> {
        if head.as_object() != Some(keyword) {
            return None;
        }
        match self.heap.pair(rest) {
            Some(p) if p.cdr.is_null() => Some(p.car),
            _ => None,
        }
    }

    fn quasiquote(&mut self, template: Value, env: ObjRef, depth: usize) -> Result {
        if let Some(elements) = self.heap.vector(template).cloned() {
            let mark = self.scratch.len();
            let result = self.quasiquote_elements(&elements, env, depth).map(|()| {
                let items = self.scratch[mark..].to_vec();
                self.heap.vector_from(items)
            });
            self.scratch.truncate(mark);
            return result;
        }
        let (head, rest) = match self.heap.pair(template) {
            Some(p) => (p.car, p.cdr),
            None => return Ok(template),
        };
        if let Some(operand) = self.form_operand(head, rest, self.keywords.unquote) {
            if depth == 1 {
                return self.eval_operand(operand, env);
            }
            let inner = self.quasiquote(operand, env, depth - 1)?;
            return Ok(self.heap.list(&[head, inner]));
        }
        if let Some(operand) = self.form_operand(head, rest, self.keywords.quasiquote) {
            let inner = self.quasiquote(operand, env, depth + 1)?;
            return Ok(self.heap.list(&[head, inner]));
        }

        if self.heap.list_parts(template).is_none() {
            return Err(Error::WrongType {
                expected: "acyclic list",
                got: template,
            }
            .into());
        }
        let mut elements = Vec::new();
        let mut current = template;
        while let Some(p) = self.heap.pair(current).copied() {
            // `(a . ,b)` reads as `(a unquote b)`.
            if !elements.is_empty() && self.form_operand(p.car, p.cdr, self.keywords.unquote).is_some() {
                break;
            }
            elements.push(p.car);
            current = p.cdr;
        }
        let mark = self.scratch.len();
        let result = self
            .quasiquote_elements(&elements, env, depth)
            .and_then(|()| self.quasiquote(current, env, depth))
            .map(|tail| {
                let items = self.scratch[mark..].to_vec();
                self.heap.list_with_tail(&items, tail)
            });
        self.scratch.truncate(mark);
        result
    }

    /// Push the expansion of each element template onto the scratch stack,
    /// splicing `(unquote-splicing e)` at the current depth.
    fn quasiquote_elements(&mut self, elements: &[Value], env: ObjRef, depth: usize) -> Result<()> {
        for element in elements {
            let splice = self
                .heap
                .pair(*element)
                .copied()
                .and_then(|p| self.form_operand(p.car, p.cdr, self.keywords.unquote_splicing));
            match splice {
                Some(operand) if depth == 1 => {
                    let spliced = self.eval_operand(operand, env)?;
                    let items = self.heap.list_to_vec(spliced).ok_or(Error::WrongType {
                        expected: "list",
                        got: spliced,
                    })?;
                    self.scratch.extend(items);
                }
                Some(operand) => {
                    let inner = self.quasiquote(operand, env, depth - 1)?;
                    let keyword = Value::Object(self.keywords.unquote_splicing);
                    let rebuilt = self.heap.list(&[keyword, inner]);
                    self.scratch.push(rebuilt);
                }
                None => {
                    let v = self.quasiquote(*element, env, depth)?;
                    self.scratch.push(v);
                }
            }
        }
        Ok(())
    }

    pub(crate) fn show(&mut self, v: Value) -> String {
        pr_str(&mut self.heap, v, PrintMode::ReadableRepresentation)
    }

    /// Full text for `error`, with the values it carries rendered. Call this
    /// before the next collection.
    pub fn describe(&mut self, error: &Error) -> String {
        match error {
            Error::Syntax {
                form,
                message,
                expr,
            } => format!("bad syntax in {}: {}: {}", form, message, self.show(*expr)),
            Error::UnboundVariable(v) => format!("unbound variable: {}", self.show(*v)),
            Error::WrongType { expected, got } => format!(
                "wrong type argument: expected {}, got {}",
                expected,
                self.show(*got)
            ),
            Error::NotApplicable(v) => format!("not applicable: {}", self.show(*v)),
            Error::UnknownExpression(v) => {
                format!("unknown expression type: {}", self.show(*v))
            }
            Error::User { message, irritants } => {
                let mut text = message.clone();
                for irritant in irritants {
                    text.push(' ');
                    text.push_str(&self.show(*irritant));
                }
                text
            }
            Error::Raise(v) => format!("uncaught raise: {}", self.show(*v)),
            other => other.to_string(),
        }
    }
}
