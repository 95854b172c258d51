pub mod cmdline;
pub mod printer;
pub mod reader;

#[macro_use]
extern crate lazy_static;

pub mod collector;
pub mod continuation;
mod core;
mod derived;
pub mod descriptor;
pub mod environment;
pub mod equality;
pub mod evaluator;
pub mod heap;
pub mod interpreter;
pub mod number;
mod strings;
pub mod symbols;
mod tokens;
pub mod types;

pub use evaluator::Error;
pub use interpreter::{Config, Interpreter, MAX_EVAL_DEPTH};
pub use types::Value;
