use crate::continuation::Activation;
use crate::descriptor::TypeDescriptor;
use crate::evaluator::{Error, Keywords};
use crate::heap::Heap;
use crate::reader;
use crate::types::{Object, ObjRef, Userdata, Value};
use crate::{core, derived};

use std::any::Any;

/// Default for `Config::max_depth`.
pub const MAX_EVAL_DEPTH: usize = 512;

#[derive(Debug, Clone)]
pub struct Config {
    /// Trampoline steps between collections inside a single evaluation.
    /// Zero turns in-evaluation collection off.
    pub step_budget: usize,
    /// Collect after every top-level form of `eval_str`.
    pub collect_between_forms: bool,
    /// Most nested evaluations allowed at once. Deeper non-tail recursion
    /// fails with `Error::RecursionLimit` instead of exhausting the host stack.
    pub max_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            step_budget: 100_000,
            collect_between_forms: true,
            max_depth: MAX_EVAL_DEPTH,
        }
    }
}

/// One interpreter instance: its heap, global environment and evaluation
/// state. Instances share nothing.
pub struct Interpreter {
    pub heap: Heap,
    pub global: ObjRef,
    pub config: Config,
    /// Evaluation activations, outermost first.
    pub(crate) frames: Vec<Activation>,
    /// Values held by host code mid-evaluation, kept alive for the collector.
    pub(crate) scratch: Vec<Value>,
    pub(crate) keywords: Keywords,
    /// The `eval` primitive, for rebuilding continuations across environments.
    pub(crate) eval_procedure: Value,
    pub(crate) next_activation: u64,
    steps: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let mut heap = Heap::new();
        let keywords = Keywords::intern(&mut heap);
        let global = heap.new_environment(None);
        let mut interpreter = Interpreter {
            heap,
            global,
            config,
            frames: Vec::new(),
            scratch: Vec::new(),
            keywords,
            eval_procedure: Value::Unspecified,
            next_activation: 0,
            steps: 0,
        };
        core::install(&mut interpreter);
        derived::install(&mut interpreter);
        interpreter.eval_procedure = interpreter.primitive(&core::EVAL);
        interpreter
    }

    /// Evaluate `expr` in the global environment.
    pub fn eval(&mut self, expr: Value) -> Result<Value, Error> {
        self.eval_in(expr, self.global)
    }

    /// Read and evaluate every form in `text` in turn, returning the last
    /// value. Stops at the first error, before collecting, so the values the
    /// error carries are still there to describe.
    pub fn eval_str(&mut self, text: &str) -> Result<Value, Error> {
        let mut position = 0;
        let mut last = Value::Unspecified;
        while let Some(form) = reader::read_datum(&mut self.heap, text, &mut position)? {
            last = self.eval(form)?;
            if self.config.collect_between_forms {
                self.scratch.push(last);
                self.collect();
                self.scratch.pop();
            }
        }
        Ok(last)
    }

    pub fn define_global(&mut self, name: &str, value: Value) {
        let symbol = self.heap.intern_symbol(name);
        self.heap.define(self.global, symbol, value);
    }

    pub fn lookup_global(&self, name: &str) -> Option<Value> {
        let symbol = self.heap.find_symbol(name)?.as_object()?;
        self.heap.lookup(self.global, symbol).ok()
    }

    pub fn primitive(&mut self, f: &'static crate::types::PrimitiveFn) -> Value {
        Value::Object(self.heap.alloc(Object::Primitive(f)))
    }

    /// Wrap a host handle. `descriptor` decides how the value prints,
    /// compares and is released.
    pub fn wrap_userdata(&mut self, descriptor: &'static TypeDescriptor, handle: Box<dyn Any>) -> Value {
        Value::Object(self.heap.alloc(Object::Userdata(Userdata {
            descriptor,
            handle: Some(handle),
        })))
    }

    pub(crate) fn tick(&mut self) {
        if self.config.step_budget == 0 {
            return;
        }
        self.steps += 1;
        if self.steps >= self.config.step_budget {
            self.steps = 0;
            self.collect();
        }
    }

    /// Everything the collector must treat as live.
    pub(crate) fn roots(&self) -> Vec<Value> {
        let mut roots = vec![Value::Object(self.global), self.eval_procedure];
        roots.extend(self.heap.symbols.roots(&self.heap));
        roots.extend(self.heap.type_objects.iter().map(|(_, r)| Value::Object(*r)));
        for activation in &self.frames {
            activation.trace(&mut roots);
        }
        roots.extend(self.scratch.iter().copied());
        roots
    }
}
